use once_cell::sync::Lazy;
use regex::Regex;

use crate::content::ContentItem;

static EMBED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/embed/([A-Za-z0-9_-]{6,})").expect("embed pattern compiles")
});

static WATCH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[?&]v=([A-Za-z0-9_-]{6,})").expect("watch pattern compiles")
});

/// Resolves the playable video identifier for an item.
///
/// Order: explicit `video_id`, then an `/embed/<id>` path in the embed URL,
/// then a `v=<id>` query parameter in the source URL.
pub fn video_id(item: &ContentItem) -> Option<String> {
    if let Some(id) = item.video_id.as_deref() {
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }
    capture(&EMBED_PATTERN, item.embed.as_deref())
        .or_else(|| capture(&WATCH_PATTERN, item.url.as_deref()))
}

pub fn is_playable(item: &ContentItem) -> bool {
    video_id(item).is_some()
}

fn capture(pattern: &Regex, haystack: Option<&str>) -> Option<String> {
    let haystack = haystack?;
    pattern
        .captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_explicit_video_id() {
        let item = ContentItem {
            video_id: Some("abc123".into()),
            embed: Some("https://yt.com/embed/xyz789?x=1".into()),
            ..ContentItem::default()
        };
        assert_eq!(video_id(&item).as_deref(), Some("abc123"));
    }

    #[test]
    fn extracts_from_embed_url() {
        let item = ContentItem {
            embed: Some("https://yt.com/embed/xyz789?x=1".into()),
            url: Some("https://yt.com/watch?v=qqq111".into()),
            ..ContentItem::default()
        };
        assert_eq!(video_id(&item).as_deref(), Some("xyz789"));
    }

    #[test]
    fn extracts_from_watch_url() {
        let item = ContentItem {
            url: Some("https://yt.com/watch?v=qqq111&t=5".into()),
            ..ContentItem::default()
        };
        assert_eq!(video_id(&item).as_deref(), Some("qqq111"));

        let item = ContentItem {
            url: Some("https://yt.com/watch?list=L1&v=a-b_c9".into()),
            ..ContentItem::default()
        };
        assert_eq!(video_id(&item).as_deref(), Some("a-b_c9"));
    }

    #[test]
    fn empty_video_id_falls_through() {
        let item = ContentItem {
            video_id: Some(String::new()),
            url: Some("https://yt.com/watch?v=qqq111".into()),
            ..ContentItem::default()
        };
        assert_eq!(video_id(&item).as_deref(), Some("qqq111"));
    }

    #[test]
    fn short_tokens_do_not_match() {
        let item = ContentItem {
            embed: Some("https://yt.com/embed/abc".into()),
            url: Some("https://yt.com/watch?v=12345".into()),
            ..ContentItem::default()
        };
        assert_eq!(video_id(&item), None);
    }

    #[test]
    fn requires_query_boundary_before_v() {
        let item = ContentItem {
            url: Some("https://yt.com/watch?nav=abcdefgh".into()),
            ..ContentItem::default()
        };
        assert_eq!(video_id(&item), None);
        assert!(!is_playable(&item));
    }

    #[test]
    fn empty_item_resolves_to_none() {
        assert_eq!(video_id(&ContentItem::default()), None);
    }
}
