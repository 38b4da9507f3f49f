use crate::content::{ContentItem, ContentPage};
use crate::resolve;

/// Loaded items in display order plus the cursor for the next page.
#[derive(Debug, Clone, Default)]
pub struct PageCache {
    items: Vec<ContentItem>,
    cursor: Option<String>,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.items.clear();
        self.cursor = None;
    }

    /// Replaces or extends the item list with `page` and adopts its cursor.
    /// Returns how many items were added.
    ///
    /// Pages are taken as-is: the listing's cursor contract is what keeps
    /// appended pages free of repeats.
    pub fn apply_page(&mut self, page: ContentPage, append: bool) -> usize {
        let added = page.items.len();
        if append {
            self.items.extend(page.items);
        } else {
            self.items = page.items;
        }
        self.cursor = page.next_cursor.filter(|c| !c.trim().is_empty());
        added
    }

    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&ContentItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn position_of(&self, video_id: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| resolve::video_id(item).as_deref() == Some(video_id))
    }

    /// First position after `index` whose item resolves to a playable id.
    pub fn next_playable_after(&self, index: usize) -> Option<usize> {
        self.items
            .iter()
            .enumerate()
            .skip(index.saturating_add(1))
            .find(|(_, item)| resolve::is_playable(item))
            .map(|(pos, _)| pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> ContentItem {
        ContentItem {
            video_id: Some(id.into()),
            ..ContentItem::default()
        }
    }

    fn page(ids: &[&str], cursor: Option<&str>) -> ContentPage {
        ContentPage {
            items: ids.iter().map(|id| item(id)).collect(),
            next_cursor: cursor.map(str::to_string),
        }
    }

    #[test]
    fn replace_then_append_keeps_prefix() {
        let mut cache = PageCache::new();
        assert_eq!(cache.apply_page(page(&["aaaaaa", "bbbbbb"], Some("c1")), false), 2);
        let before: Vec<_> = cache.items().to_vec();

        assert_eq!(cache.apply_page(page(&["cccccc"], Some("c2")), true), 1);
        assert_eq!(cache.len(), 3);
        assert_eq!(&cache.items()[..2], before.as_slice());
        assert_eq!(cache.cursor(), Some("c2"));
    }

    #[test]
    fn append_does_not_deduplicate() {
        let mut cache = PageCache::new();
        cache.apply_page(page(&["aaaaaa"], Some("c1")), false);
        cache.apply_page(page(&["aaaaaa"], None), true);
        assert_eq!(cache.len(), 2);
        assert!(!cache.has_more());
    }

    #[test]
    fn replace_discards_previous_items() {
        let mut cache = PageCache::new();
        cache.apply_page(page(&["aaaaaa", "bbbbbb"], Some("c1")), false);
        cache.apply_page(page(&["zzzzzz"], None), false);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.position_of("zzzzzz"), Some(0));
        assert_eq!(cache.position_of("aaaaaa"), None);
    }

    #[test]
    fn reset_clears_items_and_cursor() {
        let mut cache = PageCache::new();
        cache.apply_page(page(&["aaaaaa"], Some("c1")), false);
        cache.reset();
        assert!(cache.is_empty());
        assert!(!cache.has_more());
    }

    #[test]
    fn blank_cursor_is_end_of_data() {
        let mut cache = PageCache::new();
        cache.apply_page(page(&["aaaaaa"], Some("")), false);
        assert!(!cache.has_more());
    }

    #[test]
    fn next_playable_skips_unresolvable_items() {
        let mut cache = PageCache::new();
        let mut p = page(&["aaaaaa"], None);
        p.items.push(ContentItem {
            url: Some("https://example.org/post".into()),
            ..ContentItem::default()
        });
        p.items.push(item("cccccc"));
        cache.apply_page(p, false);
        assert_eq!(cache.next_playable_after(0), Some(2));
        assert_eq!(cache.next_playable_after(2), None);
    }
}
