use crate::cache::PageCache;

/// Outcome of a playback-ended signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The signal came from a position that is no longer active.
    Ignored,
    MoveTo(usize),
    /// Nothing playable is loaded past the ended position, but the cursor
    /// says more exists. Load the next page and re-evaluate.
    AwaitPage,
    Stop,
}

#[derive(Debug, Clone)]
struct PendingAdvance {
    from: usize,
    cursor: Option<String>,
}

/// Decides where playback goes after a video ends.
///
/// Positions whose item has no playable identifier are skipped, as if they
/// ended the moment they became active.
#[derive(Debug, Clone, Default)]
pub struct AutoplayAdvancer {
    pending: Option<PendingAdvance>,
}

impl AutoplayAdvancer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn on_ended(&mut self, index: usize, active: Option<usize>, cache: &PageCache) -> Advance {
        if active != Some(index) {
            return Advance::Ignored;
        }
        self.evaluate(index, cache)
    }

    /// Re-evaluates a pending advance after a page was appended. Returns
    /// `None` when nothing was waiting on the page.
    pub fn on_page_applied(&mut self, cache: &PageCache) -> Option<Advance> {
        let pending = self.pending.take()?;
        if let Some(next) = cache.next_playable_after(pending.from) {
            return Some(Advance::MoveTo(next));
        }
        // An empty page that leaves the cursor where it was would loop forever.
        if cache.has_more() && cache.cursor() != pending.cursor.as_deref() {
            return Some(self.evaluate(pending.from, cache));
        }
        Some(Advance::Stop)
    }

    fn evaluate(&mut self, from: usize, cache: &PageCache) -> Advance {
        if let Some(next) = cache.next_playable_after(from) {
            self.pending = None;
            return Advance::MoveTo(next);
        }
        if cache.has_more() {
            self.pending = Some(PendingAdvance {
                from,
                cursor: cache.cursor().map(str::to_string),
            });
            return Advance::AwaitPage;
        }
        self.pending = None;
        Advance::Stop
    }
}
