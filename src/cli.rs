use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Lumens - browse and autoplay short video feeds from the terminal.
#[derive(Parser, Debug)]
#[command(name = "lumens", author, version, about, long_about = None)]
pub struct Args {
    /// Read configuration from this file instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Serve a built-in demo catalogue instead of calling the content API
    #[arg(long, global = true)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the available categories
    Categories,
    /// Print a feed page by page (the latest feed when no topic is given)
    Feed {
        /// Category slug to filter by
        #[arg(short, long)]
        topic: Option<String>,
        /// Number of pages to load
        #[arg(short, long, default_value_t = 1)]
        pages: u32,
    },
    /// Swipe through a feed with autoplay
    Play {
        /// Category slug to filter by
        #[arg(short, long)]
        topic: Option<String>,
        /// Start at this video identifier if it is on the first page
        #[arg(short, long, value_name = "ID")]
        video: Option<String>,
        /// Do not launch the external player; use `e` to simulate playback ending
        #[arg(long)]
        no_player: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_play_with_deep_link() {
        let args = Args::parse_from(["lumens", "play", "--topic", "quran", "--video", "abc123"]);
        assert_eq!(
            args.command,
            Some(Command::Play {
                topic: Some("quran".into()),
                video: Some("abc123".into()),
                no_player: false,
            })
        );
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let args = Args::parse_from(["lumens", "feed", "--pages", "3", "--offline"]);
        assert!(args.offline);
        assert_eq!(
            args.command,
            Some(Command::Feed {
                topic: None,
                pages: 3
            })
        );
    }
}
