use std::collections::HashSet;

use crate::cache::PageCache;
use crate::resolve;

/// Where a single feed position is in its playback lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackPhase {
    #[default]
    NotStarted,
    Playing,
    Ended,
}

/// State signals reported by the playback collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Started,
    Playing,
    Paused,
    Ended,
    Error,
}

impl PlayerState {
    /// Accepts the iframe player's state names as well as our own.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "started" | "unstarted" | "cued" | "buffering" => Some(PlayerState::Started),
            "playing" => Some(PlayerState::Playing),
            "paused" => Some(PlayerState::Paused),
            "ended" => Some(PlayerState::Ended),
            "error" => Some(PlayerState::Error),
            _ => None,
        }
    }
}

/// What the renderer should do with one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub index: usize,
    pub video_id: Option<String>,
    pub play: bool,
    pub phase: PlaybackPhase,
    /// Source link for items that cannot play inline.
    pub external_url: Option<String>,
}

impl Slot {
    pub fn is_degraded(&self) -> bool {
        self.video_id.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActivityTracker {
    active: Option<usize>,
    ended: HashSet<usize>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn clear(&mut self) {
        self.active = None;
        self.ended.clear();
    }

    /// Makes `index` the active position. Out-of-range indices are ignored.
    pub fn activate(&mut self, index: usize, len: usize) -> bool {
        if index >= len {
            return false;
        }
        if self.active == Some(index) {
            return false;
        }
        self.ended.remove(&index);
        self.active = Some(index);
        true
    }

    pub fn on_visibility_changed(&mut self, observed: usize, len: usize) -> bool {
        self.activate(observed, len)
    }

    pub fn mark_ended(&mut self, index: usize) {
        self.ended.insert(index);
    }

    pub fn phase(&self, index: usize) -> PlaybackPhase {
        if self.ended.contains(&index) {
            PlaybackPhase::Ended
        } else if self.active == Some(index) {
            PlaybackPhase::Playing
        } else {
            PlaybackPhase::NotStarted
        }
    }

    /// Builds one slot per loaded item. Only the active, playable, not-yet-ended
    /// position gets `play = true`.
    pub fn slots(&self, cache: &PageCache) -> Vec<Slot> {
        cache
            .items()
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let video_id = resolve::video_id(item);
                let phase = self.phase(index);
                let play = self.active == Some(index)
                    && video_id.is_some()
                    && phase == PlaybackPhase::Playing;
                let external_url = if video_id.is_none() {
                    item.url.clone().filter(|u| !u.trim().is_empty())
                } else {
                    None
                };
                Slot {
                    index,
                    video_id,
                    play,
                    phase,
                    external_url,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentItem, ContentPage};

    fn cache(ids: &[Option<&str>]) -> PageCache {
        let mut cache = PageCache::new();
        cache.apply_page(
            ContentPage {
                items: ids
                    .iter()
                    .map(|id| match id {
                        Some(id) => ContentItem {
                            video_id: Some(id.to_string()),
                            ..ContentItem::default()
                        },
                        None => ContentItem {
                            url: Some("https://example.org/read".into()),
                            ..ContentItem::default()
                        },
                    })
                    .collect(),
                next_cursor: None,
            },
            false,
        );
        cache
    }

    fn playing(slots: &[Slot]) -> Vec<usize> {
        slots.iter().filter(|s| s.play).map(|s| s.index).collect()
    }

    #[test]
    fn visibility_moves_the_single_playing_slot() {
        let cache = cache(&[Some("aaaaaa"), Some("bbbbbb"), Some("cccccc")]);
        let mut tracker = ActivityTracker::new();
        assert!(playing(&tracker.slots(&cache)).is_empty());

        assert!(tracker.on_visibility_changed(0, cache.len()));
        assert_eq!(playing(&tracker.slots(&cache)), vec![0]);

        assert!(tracker.on_visibility_changed(2, cache.len()));
        assert_eq!(playing(&tracker.slots(&cache)), vec![2]);
    }

    #[test]
    fn out_of_range_visibility_is_ignored() {
        let cache = cache(&[Some("aaaaaa")]);
        let mut tracker = ActivityTracker::new();
        tracker.activate(0, cache.len());
        assert!(!tracker.on_visibility_changed(5, cache.len()));
        assert_eq!(tracker.active(), Some(0));
    }

    #[test]
    fn degraded_item_is_active_but_not_playing() {
        let cache = cache(&[Some("aaaaaa"), None]);
        let mut tracker = ActivityTracker::new();
        tracker.activate(1, cache.len());
        let slots = tracker.slots(&cache);
        assert!(playing(&slots).is_empty());
        assert!(slots[1].is_degraded());
        assert_eq!(slots[1].external_url.as_deref(), Some("https://example.org/read"));
    }

    #[test]
    fn ended_item_stops_playing_until_reactivated() {
        let cache = cache(&[Some("aaaaaa"), Some("bbbbbb")]);
        let mut tracker = ActivityTracker::new();
        tracker.activate(0, cache.len());
        tracker.mark_ended(0);
        assert_eq!(tracker.phase(0), PlaybackPhase::Ended);
        assert!(playing(&tracker.slots(&cache)).is_empty());

        tracker.activate(1, cache.len());
        tracker.activate(0, cache.len());
        assert_eq!(tracker.phase(0), PlaybackPhase::Playing);
        assert_eq!(playing(&tracker.slots(&cache)), vec![0]);
    }

    #[test]
    fn parses_iframe_state_names() {
        assert_eq!(PlayerState::parse("ended"), Some(PlayerState::Ended));
        assert_eq!(PlayerState::parse("BUFFERING"), Some(PlayerState::Started));
        assert_eq!(PlayerState::parse("bogus"), None);
    }
}
