use anyhow::Result;
use log::{debug, info, warn};

use crate::activity::{ActivityTracker, PlayerState, Slot};
use crate::autoplay::{Advance, AutoplayAdvancer};
use crate::cache::PageCache;
use crate::content::{ContentItem, ContentPage, ContentQuery, DEFAULT_LANGUAGE, DEFAULT_PAGE_SIZE};
use crate::resolve;

/// Topic and language scoping a feed. No topic means the global latest feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub topic: Option<String>,
    pub language: String,
}

impl Default for Filter {
    fn default() -> Self {
        Self::latest()
    }
}

impl Filter {
    pub fn latest() -> Self {
        Self {
            topic: None,
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    pub fn topic(slug: impl Into<String>) -> Self {
        let slug = slug.into();
        Self {
            topic: Some(slug).filter(|s| !s.trim().is_empty()),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        let language = language.into();
        if !language.trim().is_empty() {
            self.language = language;
        }
        self
    }

    pub fn label(&self) -> &str {
        self.topic.as_deref().unwrap_or("latest")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Replace,
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub generation: u64,
    pub request_id: u64,
    pub mode: LoadMode,
    pub query: ContentQuery,
}

#[derive(Debug)]
pub struct FetchResponse {
    pub generation: u64,
    pub request_id: u64,
    pub result: Result<ContentPage>,
}

#[derive(Debug)]
pub enum FeedEvent {
    Reload,
    LoadMore,
    Visible(usize),
    Player { index: usize, state: PlayerState },
    Fetched(FetchResponse),
}

/// Work the feed asks its host to carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Fetch(FetchRequest),
    ScrollTo(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("failed to load content: {0}")]
    Fetch(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Idle,
    Loading,
    Ready,
    Empty,
    Failed,
}

struct PendingFetch {
    request_id: u64,
    mode: LoadMode,
}

/// One open feed: its filter, loaded pages, active position and the single
/// fetch it may have in flight.
pub struct Feed {
    generation: u64,
    filter: Filter,
    page_size: u32,
    target: Option<String>,
    cache: PageCache,
    activity: ActivityTracker,
    autoplay: AutoplayAdvancer,
    pending: Option<PendingFetch>,
    next_request_id: u64,
    error: Option<FeedError>,
    loaded: bool,
}

impl Feed {
    pub fn new(generation: u64, filter: Filter, target: Option<String>) -> Self {
        Self {
            generation,
            filter,
            page_size: DEFAULT_PAGE_SIZE,
            target: target.filter(|t| !t.trim().is_empty()),
            cache: PageCache::new(),
            activity: ActivityTracker::new(),
            autoplay: AutoplayAdvancer::new(),
            pending: None,
            next_request_id: 1,
            error: None,
            loaded: false,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        if page_size > 0 {
            self.page_size = page_size;
        }
        self
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn items(&self) -> &[ContentItem] {
        self.cache.items()
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cache.cursor()
    }

    pub fn has_more(&self) -> bool {
        self.cache.has_more()
    }

    pub fn active(&self) -> Option<usize> {
        self.activity.active()
    }

    pub fn loading(&self) -> bool {
        matches!(&self.pending, Some(p) if p.mode == LoadMode::Replace)
    }

    pub fn loading_more(&self) -> bool {
        matches!(&self.pending, Some(p) if p.mode == LoadMode::Append)
    }

    pub fn is_fetching(&self) -> bool {
        self.pending.is_some()
    }

    pub fn error(&self) -> Option<&FeedError> {
        self.error.as_ref()
    }

    pub fn status(&self) -> FeedStatus {
        if self.loading() {
            FeedStatus::Loading
        } else if self.error.is_some() && self.cache.is_empty() {
            FeedStatus::Failed
        } else if !self.loaded {
            FeedStatus::Idle
        } else if self.cache.is_empty() && !self.cache.has_more() {
            FeedStatus::Empty
        } else {
            FeedStatus::Ready
        }
    }

    pub fn slots(&self) -> Vec<Slot> {
        self.activity.slots(&self.cache)
    }

    pub fn handle(&mut self, event: FeedEvent) -> Vec<Effect> {
        match event {
            FeedEvent::Reload => self.load_initial(),
            FeedEvent::LoadMore => self.load_more(),
            FeedEvent::Visible(index) => {
                self.on_visibility_changed(index);
                Vec::new()
            }
            FeedEvent::Player { index, state } => self.on_player_state(index, state),
            FeedEvent::Fetched(response) => self.on_fetched(response),
        }
    }

    /// Fetches the first page, replacing whatever is loaded once it lands.
    /// A pending load-more is superseded; a pending initial load wins.
    pub fn load_initial(&mut self) -> Vec<Effect> {
        if self.loading() {
            debug!("feed {}: initial load already in flight", self.filter.label());
            return Vec::new();
        }
        self.autoplay.cancel();
        self.error = None;
        vec![Effect::Fetch(self.issue(LoadMode::Replace, None))]
    }

    pub fn load_more(&mut self) -> Vec<Effect> {
        if self.pending.is_some() {
            return Vec::new();
        }
        let Some(cursor) = self.cache.cursor().map(str::to_string) else {
            return Vec::new();
        };
        vec![Effect::Fetch(self.issue(LoadMode::Append, Some(cursor)))]
    }

    fn issue(&mut self, mode: LoadMode, cursor: Option<String>) -> FetchRequest {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        self.pending = Some(PendingFetch { request_id, mode });
        debug!(
            "feed {} gen {}: request {} ({:?}, cursor {:?})",
            self.filter.label(),
            self.generation,
            request_id,
            mode,
            cursor
        );
        FetchRequest {
            generation: self.generation,
            request_id,
            mode,
            query: ContentQuery {
                topic: self.filter.topic.clone(),
                language: self.filter.language.clone(),
                limit: self.page_size,
                cursor,
            },
        }
    }

    pub fn on_visibility_changed(&mut self, index: usize) {
        if self.activity.on_visibility_changed(index, self.cache.len()) {
            self.autoplay.cancel();
        }
    }

    pub fn on_player_state(&mut self, index: usize, state: PlayerState) -> Vec<Effect> {
        if !matches!(state, PlayerState::Ended | PlayerState::Error) {
            return Vec::new();
        }
        let active = self.activity.active();
        let advance = self.autoplay.on_ended(index, active, &self.cache);
        if advance == Advance::Ignored {
            debug!("ignoring {state:?} from inactive position {index} (active {active:?})");
            return Vec::new();
        }
        self.activity.mark_ended(index);
        self.apply_advance(advance)
    }

    fn apply_advance(&mut self, advance: Advance) -> Vec<Effect> {
        match advance {
            Advance::MoveTo(next) => {
                self.activity.activate(next, self.cache.len());
                vec![Effect::ScrollTo(next)]
            }
            // An in-flight page re-evaluates the advance when it lands.
            Advance::AwaitPage => self.load_more(),
            Advance::Stop => {
                info!("autoplay reached the end of {}", self.filter.label());
                Vec::new()
            }
            Advance::Ignored => Vec::new(),
        }
    }

    pub fn on_fetched(&mut self, response: FetchResponse) -> Vec<Effect> {
        if response.generation != self.generation {
            debug!(
                "dropping response for generation {} (live {})",
                response.generation, self.generation
            );
            return Vec::new();
        }
        let Some(pending) = &self.pending else {
            return Vec::new();
        };
        if pending.request_id != response.request_id {
            debug!("dropping superseded response {}", response.request_id);
            return Vec::new();
        }
        let mode = pending.mode;
        self.pending = None;

        match response.result {
            Ok(page) => {
                self.error = None;
                self.apply_page(mode, page)
            }
            Err(err) => {
                warn!("feed {}: fetch failed: {err:#}", self.filter.label());
                self.autoplay.cancel();
                self.error = Some(FeedError::Fetch(format!("{err:#}")));
                Vec::new()
            }
        }
    }

    fn apply_page(&mut self, mode: LoadMode, page: ContentPage) -> Vec<Effect> {
        match mode {
            LoadMode::Replace => self.apply_first_page(page),
            LoadMode::Append => {
                let added = self.cache.apply_page(page, true);
                debug!(
                    "feed {}: appended {} items, {} total",
                    self.filter.label(),
                    added,
                    self.cache.len()
                );
                match self.autoplay.on_page_applied(&self.cache) {
                    Some(advance) => self.apply_advance(advance),
                    None => Vec::new(),
                }
            }
        }
    }

    fn apply_first_page(&mut self, page: ContentPage) -> Vec<Effect> {
        self.cache.apply_page(page, false);
        self.activity.clear();
        self.autoplay.cancel();
        self.loaded = true;

        let start = self
            .target
            .as_deref()
            .and_then(|target| self.cache.position_of(target))
            .or_else(|| (!self.cache.is_empty()).then_some(0));
        match start {
            Some(index) => {
                self.activity.activate(index, self.cache.len());
                let mut effects = vec![Effect::ScrollTo(index)];
                // Nothing will ever report on an item that cannot play.
                if !self.cache.get(index).is_some_and(resolve::is_playable) {
                    debug!("feed {}: skipping unplayable start {index}", self.filter.label());
                    effects.extend(self.on_player_state(index, PlayerState::Ended));
                }
                effects
            }
            None => {
                info!("feed {} is empty", self.filter.label());
                Vec::new()
            }
        }
    }
}
