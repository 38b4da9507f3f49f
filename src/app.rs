use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{unbounded, Receiver, TryRecvError};
use log::{debug, warn};

use crate::activity::{PlaybackPhase, PlayerState};
use crate::cli::{Args, Command};
use crate::config::{self, Config};
use crate::content;
use crate::data::{
    ApiCategoryService, ApiContentService, CategoryService, ContentService, MockCategoryService,
    MockContentService,
};
use crate::feed::{Effect, Feed, FeedEvent, FeedStatus, Filter};
use crate::player::Director;
use crate::resolve;
use crate::runtime::Runtime;

const TICK: Duration = Duration::from_millis(100);
/// Slack on top of the HTTP timeout before a blocking command gives up.
const SETTLE_MARGIN: Duration = Duration::from_secs(5);

pub fn run(args: Args) -> Result<()> {
    let cfg = config::load(config::LoadOptions {
        config_file: args.config.clone(),
        env_prefix: None,
    })
    .context("load config")?;
    let config_path = args.config.clone().or_else(config::default_path);

    let services = if args.offline {
        Services::offline()
    } else {
        Services::from_config(&cfg, config_path.as_ref())?
    };

    let command = args.command.unwrap_or(Command::Feed {
        topic: None,
        pages: 1,
    });
    let stdout = io::stdout();
    match command {
        Command::Categories => print_categories(&services, &mut stdout.lock()),
        Command::Feed { topic, pages } => {
            let filter = filter_for(topic, &cfg);
            print_feed(&services, &cfg, filter, pages, &mut stdout.lock())
        }
        Command::Play {
            topic,
            video,
            no_player,
        } => {
            let filter = filter_for(topic, &cfg);
            let director = (cfg.player.enabled && !no_player)
                .then(|| Director::new(cfg.player.video_command.clone()));
            play(&services, &cfg, filter, video, director)
        }
    }
}

pub struct Services {
    pub content: Arc<dyn ContentService>,
    pub categories: Arc<dyn CategoryService>,
}

impl Services {
    pub fn offline() -> Self {
        Self {
            content: Arc::new(MockContentService::demo()),
            categories: Arc::new(MockCategoryService),
        }
    }

    pub fn from_config(cfg: &Config, config_path: Option<&PathBuf>) -> Result<Self> {
        if cfg.api.base_url.trim().is_empty() {
            bail!(
                "no content API configured: set api.base_url in {} or LUMENS_API__BASE_URL, or pass --offline",
                friendly_path(config_path)
            );
        }
        let client = content::Client::new(content::ClientConfig {
            base_url: cfg.api.base_url.clone(),
            user_agent: cfg.api.user_agent.clone(),
            timeout: Some(cfg.api.timeout),
            http_client: None,
        })
        .context("create content client")?;
        let client = Arc::new(client);
        Ok(Self {
            content: Arc::new(ApiContentService::new(client.clone())),
            categories: Arc::new(ApiCategoryService::new(client)),
        })
    }
}

fn filter_for(topic: Option<String>, cfg: &Config) -> Filter {
    let filter = match topic {
        Some(slug) => Filter::topic(slug),
        None => Filter::latest(),
    };
    filter.with_language(cfg.feed.language.clone())
}

fn print_categories(services: &Services, out: &mut impl Write) -> Result<()> {
    let categories = services.categories.list_categories()?;
    if categories.is_empty() {
        writeln!(out, "no categories")?;
    }
    for category in categories {
        writeln!(out, "{:<16} {}", category.slug, category.label)?;
    }
    Ok(())
}

fn print_feed(
    services: &Services,
    cfg: &Config,
    filter: Filter,
    pages: u32,
    out: &mut impl Write,
) -> Result<()> {
    let timeout = cfg.api.timeout + SETTLE_MARGIN;
    let mut runtime = Runtime::new(services.content.clone(), cfg.feed.page_size);
    runtime.open(filter, None);
    runtime.settle(timeout);

    for _ in 1..pages.max(1) {
        if !runtime.feed().has_more() || runtime.feed().error().is_some() {
            break;
        }
        runtime.dispatch(FeedEvent::LoadMore);
        runtime.settle(timeout);
    }

    let feed = runtime.feed();
    if feed.is_fetching() {
        bail!("timed out waiting for {}", feed.filter().label());
    }
    if let Some(err) = feed.error() {
        if feed.items().is_empty() {
            return Err(anyhow!(err.clone()));
        }
        warn!("{err}");
    }
    if feed.status() == FeedStatus::Empty {
        writeln!(out, "no videos for {}", feed.filter().label())?;
        return Ok(());
    }

    for (index, item) in feed.items().iter().enumerate() {
        let id = resolve::video_id(item).unwrap_or_else(|| "external".to_string());
        writeln!(
            out,
            "{:>3}  {:<14} {:<20} {}",
            index + 1,
            id,
            item.channel_title.as_deref().unwrap_or("-"),
            item.display_title()
        )?;
    }
    if let Some(cursor) = feed.cursor() {
        writeln!(out, "(more after {cursor})")?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Next,
    Prev,
    Goto(usize),
    Ended,
    More,
    Reload,
    Open,
    Topic(Option<String>),
    List,
    Help,
    Quit,
}

fn parse_input(line: &str) -> Option<Input> {
    let mut parts = line.split_whitespace();
    let head = parts.next()?;
    let arg = parts.next();
    let input = match head {
        "n" | "j" | "next" => Input::Next,
        "p" | "k" | "prev" => Input::Prev,
        "g" | "go" => Input::Goto(arg?.parse::<usize>().ok()?.checked_sub(1)?),
        "e" | "end" => Input::Ended,
        "m" | "more" => Input::More,
        "r" | "reload" => Input::Reload,
        "o" | "open" => Input::Open,
        "t" | "topic" => Input::Topic(arg.map(str::to_string)),
        "l" | "ls" | "list" => Input::List,
        "h" | "?" | "help" => Input::Help,
        "q" | "quit" | "exit" => Input::Quit,
        _ => return None,
    };
    Some(input)
}

const HELP: &str = "n/p next/previous  g N jump  e end playback  m load more  r reload\no open external link  t [TOPIC] switch feed  l list  q quit";

fn spawn_input() -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn play(
    services: &Services,
    cfg: &Config,
    filter: Filter,
    video: Option<String>,
    mut director: Option<Director>,
) -> Result<()> {
    let mut runtime = Runtime::new(services.content.clone(), cfg.feed.page_size);
    let language = filter.language.clone();
    runtime.open(filter, video);
    let input = spawn_input();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{HELP}")?;

    let mut shown = String::new();
    let mut stdin_open = true;
    loop {
        for effect in runtime.wait(TICK) {
            if let Effect::ScrollTo(index) = effect {
                debug!("scroll to position {index}");
            }
        }

        // Commands wait while the first page is loading.
        while stdin_open && !runtime.feed().loading() {
            match input.try_recv() {
                Ok(line) => {
                    let Some(cmd) = parse_input(&line) else {
                        if !line.trim().is_empty() {
                            writeln!(out, "unknown command {:?} (h for help)", line.trim())?;
                        }
                        continue;
                    };
                    if cmd == Input::Quit {
                        return shutdown(director);
                    }
                    apply_input(&mut runtime, cmd, &language, &mut out)?;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => stdin_open = false,
            }
        }

        if let Some(active) = director.as_mut() {
            if let Err(err) = active.sync(&runtime.feed().slots(), &runtime.sender()) {
                warn!("player disabled: {err:#}");
                writeln!(out, "player disabled: {err:#}")?;
                director = None;
            }
        }

        let line = render(runtime.feed());
        if line != shown {
            writeln!(out, "{line}")?;
            shown = line;
        }

        let player_idle = director.as_ref().map_or(true, |d| d.current().is_none());
        if !stdin_open && !runtime.feed().is_fetching() && player_idle {
            return shutdown(director);
        }
    }
}

fn shutdown(director: Option<Director>) -> Result<()> {
    if let Some(mut director) = director {
        director.stop();
    }
    Ok(())
}

fn apply_input(
    runtime: &mut Runtime,
    cmd: Input,
    language: &str,
    out: &mut impl Write,
) -> Result<()> {
    let feed = runtime.feed();
    let len = feed.items().len();
    let active = feed.active();
    match cmd {
        Input::Next => {
            let next = active.map_or(0, |i| i + 1);
            if next < len {
                runtime.dispatch(FeedEvent::Visible(next));
            }
            // Mirrors onEndReached: ask for more when the last item is near.
            if next + 1 >= len && runtime.feed().has_more() {
                runtime.dispatch(FeedEvent::LoadMore);
            }
        }
        Input::Prev => {
            if let Some(index) = active.and_then(|i| i.checked_sub(1)) {
                runtime.dispatch(FeedEvent::Visible(index));
            }
        }
        Input::Goto(index) => {
            if index < len {
                runtime.dispatch(FeedEvent::Visible(index));
            } else {
                writeln!(out, "only {len} videos loaded")?;
            }
        }
        Input::Ended => {
            if let Some(index) = active {
                runtime.dispatch(FeedEvent::Player {
                    index,
                    state: PlayerState::Ended,
                });
            }
        }
        Input::More => {
            runtime.dispatch(FeedEvent::LoadMore);
        }
        Input::Reload => {
            runtime.dispatch(FeedEvent::Reload);
        }
        Input::Open => {
            let url = active
                .and_then(|i| feed.slots().into_iter().nth(i))
                .and_then(|slot| match slot.video_id {
                    Some(id) => Some(resolve::watch_url(&id)),
                    None => slot.external_url,
                });
            match url {
                Some(url) => {
                    if let Err(err) = webbrowser::open(&url) {
                        writeln!(out, "could not open {url}: {err}")?;
                    }
                }
                None => writeln!(out, "nothing to open")?,
            }
        }
        Input::Topic(topic) => {
            let filter = match topic {
                Some(slug) => Filter::topic(slug),
                None => Filter::latest(),
            };
            runtime.open(filter.with_language(language), None);
        }
        Input::List => {
            for (index, item) in feed.items().iter().enumerate() {
                let marker = if Some(index) == active { '>' } else { ' ' };
                writeln!(out, "{marker}{:>3}  {}", index + 1, item.display_title())?;
            }
        }
        Input::Help => writeln!(out, "{HELP}")?,
        Input::Quit => {}
    }
    Ok(())
}

/// One status line for the live feed.
fn render(feed: &Feed) -> String {
    let label = feed.filter().label();
    match feed.status() {
        FeedStatus::Idle => format!("{label}: idle"),
        FeedStatus::Loading => format!("{label}: loading..."),
        FeedStatus::Failed => match feed.error() {
            Some(err) => format!("{label}: {err} (r to retry)"),
            None => format!("{label}: failed (r to retry)"),
        },
        FeedStatus::Empty => format!("{label}: no videos"),
        FeedStatus::Ready => {
            let Some(index) = feed.active() else {
                return format!("{label}: {} videos", feed.items().len());
            };
            let more = if feed.has_more() { "+" } else { "" };
            let position = format!("[{}/{}{more}]", index + 1, feed.items().len());
            let title = feed
                .items()
                .get(index)
                .map(|item| item.display_title())
                .unwrap_or_default();
            let Some(slot) = feed.slots().into_iter().nth(index) else {
                return format!("{position} {title}");
            };
            let mut line = match (&slot.video_id, &slot.external_url) {
                (Some(id), _) => format!("{position} {title} ({id})"),
                (None, Some(url)) => format!("{position} {title} - external: {url} (o to open)"),
                (None, None) => format!("{position} {title} - unavailable"),
            };
            if slot.phase == PlaybackPhase::Ended {
                line.push_str(" [ended]");
            }
            if feed.loading_more() {
                line.push_str(" ...");
            }
            if let Some(err) = feed.error() {
                line.push_str(&format!(" [{err}, m to retry]"));
            }
            line
        }
    }
}

fn friendly_path(path: Option<&PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/lumens/config.yaml".to_string()
    }
}
