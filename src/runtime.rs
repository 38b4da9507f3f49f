use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::debug;

use crate::data::ContentService;
use crate::feed::{Effect, Feed, FeedEvent, FetchRequest, FetchResponse, Filter};

/// Drives one live feed from a single ordered event queue.
///
/// Fetches run on worker threads and come back through the same queue as
/// `FeedEvent::Fetched`, so every state change happens on the thread that
/// owns the runtime, one event at a time.
pub struct Runtime {
    service: Arc<dyn ContentService>,
    feed: Feed,
    page_size: u32,
    next_generation: u64,
    events_tx: Sender<FeedEvent>,
    events_rx: Receiver<FeedEvent>,
}

impl Runtime {
    pub fn new(service: Arc<dyn ContentService>, page_size: u32) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            service,
            feed: Feed::new(0, Filter::latest(), None),
            page_size,
            next_generation: 1,
            events_tx,
            events_rx,
        }
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    /// Handle for collaborators (players, input threads) to post events.
    pub fn sender(&self) -> Sender<FeedEvent> {
        self.events_tx.clone()
    }

    /// Replaces the live feed with a fresh one for `filter` and starts its
    /// first load. Responses still in flight for the old feed are dropped
    /// when they arrive.
    pub fn open(&mut self, filter: Filter, target: Option<String>) -> Vec<Effect> {
        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1);
        debug!("opening feed {} as generation {}", filter.label(), generation);
        self.feed = Feed::new(generation, filter, target).with_page_size(self.page_size);
        let effects = self.feed.load_initial();
        self.execute(effects)
    }

    /// Queues `event` behind anything already waiting, then processes the
    /// queue. Returns the effects the host has to act on.
    pub fn dispatch(&mut self, event: FeedEvent) -> Vec<Effect> {
        let _ = self.events_tx.send(event);
        self.pump()
    }

    pub fn pump(&mut self) -> Vec<Effect> {
        let mut out = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            out.extend(self.process(event));
        }
        out
    }

    /// Blocks for up to `timeout` for the next event, then drains the queue.
    pub fn wait(&mut self, timeout: Duration) -> Vec<Effect> {
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => {
                let mut out = self.process(event);
                out.extend(self.pump());
                out
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Vec::new(),
        }
    }

    /// Processes events until the live feed has no fetch in flight or the
    /// deadline passes.
    pub fn settle(&mut self, timeout: Duration) -> Vec<Effect> {
        let deadline = Instant::now() + timeout;
        let mut out = self.pump();
        while self.feed.is_fetching() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            out.extend(self.wait(deadline - now));
        }
        out
    }

    fn process(&mut self, event: FeedEvent) -> Vec<Effect> {
        let effects = self.feed.handle(event);
        self.execute(effects)
    }

    fn execute(&mut self, effects: Vec<Effect>) -> Vec<Effect> {
        let mut host = Vec::new();
        for effect in effects {
            match effect {
                Effect::Fetch(request) => self.spawn_fetch(request),
                other => host.push(other),
            }
        }
        host
    }

    fn spawn_fetch(&self, request: FetchRequest) {
        let service = self.service.clone();
        let tx = self.events_tx.clone();
        thread::spawn(move || {
            let FetchRequest {
                generation,
                request_id,
                query,
                ..
            } = request;
            let result = service.list_content(query);
            let _ = tx.send(FeedEvent::Fetched(FetchResponse {
                generation,
                request_id,
                result,
            }));
        });
    }
}
