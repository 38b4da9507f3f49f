use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;

use crate::content::{self, Category, ContentItem, ContentPage, ContentQuery};

pub trait ContentService: Send + Sync {
    fn list_content(&self, query: ContentQuery) -> Result<ContentPage>;
}

pub trait CategoryService: Send + Sync {
    fn list_categories(&self) -> Result<Vec<Category>>;
}

pub struct ApiContentService {
    client: Arc<content::Client>,
}

impl ApiContentService {
    pub fn new(client: Arc<content::Client>) -> Self {
        Self { client }
    }
}

impl ContentService for ApiContentService {
    fn list_content(&self, query: ContentQuery) -> Result<ContentPage> {
        self.client.list_content(query).context("fetch content page")
    }
}

pub struct ApiCategoryService {
    client: Arc<content::Client>,
}

impl ApiCategoryService {
    pub fn new(client: Arc<content::Client>) -> Self {
        Self { client }
    }
}

impl CategoryService for ApiCategoryService {
    fn list_categories(&self) -> Result<Vec<Category>> {
        self.client
            .list_categories()
            .context("fetch category listing")
    }
}

/// Serves pages from a script, in order, and records every query it sees.
#[derive(Default)]
pub struct MockContentService {
    script: Mutex<VecDeque<std::result::Result<ContentPage, String>>>,
    queries: Mutex<Vec<ContentQuery>>,
}

impl MockContentService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_page(&self, page: ContentPage) {
        self.script.lock().push_back(Ok(page));
    }

    pub fn push_error(&self, message: impl Into<String>) {
        self.script.lock().push_back(Err(message.into()));
    }

    pub fn queries(&self) -> Vec<ContentQuery> {
        self.queries.lock().clone()
    }

    /// Offline catalogue: three pages per topic, with one item that has no
    /// playable identifier.
    pub fn demo() -> Self {
        Self::default()
    }
}

impl ContentService for MockContentService {
    fn list_content(&self, query: ContentQuery) -> Result<ContentPage> {
        self.queries.lock().push(query.clone());
        if let Some(next) = self.script.lock().pop_front() {
            return next.map_err(|message| anyhow!(message));
        }
        Ok(demo_page(&query))
    }
}

const DEMO_PAGES: usize = 3;
const DEMO_PAGE_LEN: usize = 4;

fn demo_page(query: &ContentQuery) -> ContentPage {
    let topic = query.topic.as_deref().unwrap_or("latest");
    let page = query
        .cursor
        .as_deref()
        .and_then(|cursor| cursor.strip_prefix("page-"))
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(0);
    if page >= DEMO_PAGES {
        return ContentPage::default();
    }

    let items = (0..DEMO_PAGE_LEN)
        .map(|slot| {
            let n = page * DEMO_PAGE_LEN + slot;
            let stem: String = topic
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .take(4)
                .collect();
            let id = format!("{stem}{n:03}vid");
            let mut item = ContentItem {
                title: Some(format!("{topic} #{}", n + 1)),
                channel_title: Some("Lumens Demo".into()),
                published_at: Some(format!("2024-01-{:02}T00:00:00Z", 28 - n.min(27))),
                ..ContentItem::default()
            };
            match n % 5 {
                0 => item.video_id = Some(id),
                1 => item.embed = Some(format!("https://www.youtube.com/embed/{id}?rel=0")),
                2 => item.url = Some(format!("https://www.youtube.com/watch?v={id}")),
                3 => item.url = Some("https://example.org/article".into()),
                _ => item.video_id = Some(id),
            }
            item
        })
        .collect();

    ContentPage {
        items,
        next_cursor: (page + 1 < DEMO_PAGES).then(|| format!("page-{}", page + 1)),
    }
}

#[derive(Default)]
pub struct MockCategoryService;

impl CategoryService for MockCategoryService {
    fn list_categories(&self) -> Result<Vec<Category>> {
        Ok([
            ("prophets", "Prophets"),
            ("duas", "Duas & Supplications"),
            ("ramadan", "Ramadan"),
            ("seerah", "Seerah"),
            ("nasheeds", "Nasheeds"),
        ]
        .into_iter()
        .map(|(slug, label)| Category {
            slug: slug.into(),
            label: label.into(),
        })
        .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve;

    #[test]
    fn scripted_responses_are_served_in_order() {
        let service = MockContentService::new();
        service.push_error("HTTP 500");
        service.push_page(ContentPage {
            items: vec![ContentItem::default()],
            next_cursor: None,
        });

        let err = service.list_content(ContentQuery::default()).unwrap_err();
        assert!(err.to_string().contains("HTTP 500"));
        let page = service.list_content(ContentQuery::default()).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(service.queries().len(), 2);
    }

    #[test]
    fn demo_catalogue_paginates_to_the_end() {
        let service = MockContentService::demo();
        let mut query = ContentQuery {
            topic: Some("quran".into()),
            ..ContentQuery::default()
        };
        let mut total = 0;
        let mut pages = 0;
        loop {
            let page = service.list_content(query.clone()).unwrap();
            total += page.items.len();
            pages += 1;
            match page.next_cursor {
                Some(cursor) => query.cursor = Some(cursor),
                None => break,
            }
        }
        assert_eq!(pages, DEMO_PAGES);
        assert_eq!(total, DEMO_PAGES * DEMO_PAGE_LEN);
    }

    #[test]
    fn demo_catalogue_mixes_playable_and_external_items() {
        let page = demo_page(&ContentQuery::default());
        let playable = page.items.iter().filter(|i| resolve::is_playable(i)).count();
        assert_eq!(playable, 3);
        assert!(!resolve::is_playable(&page.items[3]));
    }

    #[test]
    fn mock_categories_have_slugs() {
        let cats = MockCategoryService.list_categories().unwrap();
        assert!(cats.iter().any(|c| c.slug == "ramadan"));
    }
}
