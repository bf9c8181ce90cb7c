//! Synchronous execution of reader commands.
//!
//! [`ReaderDriver`] owns a [`ReaderSession`] and its collaborators. Each
//! operation forwards to the session and then drains the resulting command
//! queue, feeding every completion back before returning.

use crate::autonav::{AutoNavTick, AutoNavigator, ReadNextCountdown, ReadNextTick};
use crate::error::FetchError;
use crate::session::{ReaderCommand, ReaderSession};
use reader_model::{
    CollectionId, PageId, PageQuery, PageReadEvent, PageSlice, ProfileQuery, ProfileResponse,
    Scaling,
};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::VecDeque;
use tracing::{info, trace, warn};

/// Upper bound on commands executed for a single operation.
pub const MAX_ROUNDS: usize = 10_000;

pub trait PageSource {
    fn fetch_pages(&self, query: &PageQuery) -> Result<PageSlice, FetchError>;
}

pub trait ProfileSource {
    fn fetch_profiles(&self, query: &ProfileQuery) -> Result<ProfileResponse, FetchError>;
}

pub trait ReadEventSink {
    fn page_read(&self, event: PageReadEvent);
}

impl<T: PageSource + ?Sized> PageSource for &T {
    fn fetch_pages(&self, query: &PageQuery) -> Result<PageSlice, FetchError> {
        (**self).fetch_pages(query)
    }
}

impl<T: ProfileSource + ?Sized> ProfileSource for &T {
    fn fetch_profiles(&self, query: &ProfileQuery) -> Result<ProfileResponse, FetchError> {
        (**self).fetch_profiles(query)
    }
}

impl<T: ReadEventSink + ?Sized> ReadEventSink for &T {
    fn page_read(&self, event: PageReadEvent) {
        (**self).page_read(event)
    }
}

/// Keeps every read event in emission order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: RefCell<Vec<PageReadEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PageReadEvent> {
        self.events.borrow().clone()
    }

    pub fn page_ids(&self) -> Vec<PageId> {
        self.events.borrow().iter().map(|event| event.item_id).collect()
    }
}

impl ReadEventSink for RecordingSink {
    fn page_read(&self, event: PageReadEvent) {
        self.events.borrow_mut().push(event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DriverStats {
    pub slice_fetches: u32,
    pub profile_batches: u32,
    pub slice_failures: u32,
    pub profile_failures: u32,
    pub read_events: u32,
}

impl DriverStats {
    pub fn failures(&self) -> u32 {
        self.slice_failures + self.profile_failures
    }
}

pub struct ReaderDriver<S, P, E> {
    session: ReaderSession,
    pages: S,
    profiles: P,
    events: E,
    stats: DriverStats,
}

impl<S, P, E> ReaderDriver<S, P, E>
where
    S: PageSource,
    P: ProfileSource,
    E: ReadEventSink,
{
    pub fn new(session: ReaderSession, pages: S, profiles: P, events: E) -> Self {
        Self { session, pages, profiles, events, stats: DriverStats::default() }
    }

    pub fn start(&mut self) {
        let commands = self.session.start();
        self.run(commands);
    }

    pub fn focus_child(&mut self, position: usize) {
        let commands = self.session.focus_child(position);
        self.run(commands);
    }

    pub fn go_to_page(&mut self, number: u32) {
        let commands = self.session.go_to_page(number);
        self.run(commands);
    }

    pub fn clear_profile(&mut self, id: PageId) {
        let commands = self.session.clear_profile(id);
        self.run(commands);
    }

    pub fn set_scaling(&mut self, scaling: Scaling) {
        let commands = self.session.set_scaling(scaling);
        self.run(commands);
    }

    pub fn set_collection(&mut self, collection_id: CollectionId) {
        let commands = self.session.set_collection(collection_id);
        self.run(commands);
    }

    pub fn reconcile(&mut self) {
        let commands = self.session.reconcile();
        self.run(commands);
    }

    pub fn reach_end(&mut self) -> bool {
        self.session.reach_end()
    }

    /// Runs one auto-navigation second against the current focus, moving to
    /// the next window position when the interval elapses.
    pub fn auto_navigate(&mut self, navigator: &mut AutoNavigator, panning: bool) -> AutoNavTick {
        let tick =
            navigator.tick(panning, self.session.focus(), self.session.local_window().len());
        if let AutoNavTick::Advance(position) = tick {
            self.focus_child(position);
        }
        tick
    }

    /// Runs one read-next second. The countdown only moves once the end of
    /// the collection is reached; when it expires the session switches to
    /// the chosen collection.
    pub fn read_next(&mut self, countdown: &mut ReadNextCountdown) -> ReadNextTick {
        if self.session.on_last_page() && !self.session.end_reached() {
            self.session.reach_end();
        }

        let tick = countdown.tick(self.session.end_reached());
        if let ReadNextTick::Navigate(source, collection_id) = tick {
            info!(?source, collection = collection_id.0, "reading next collection");
            self.set_collection(collection_id);
        }
        tick
    }

    pub fn session(&self) -> &ReaderSession {
        &self.session
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    fn run(&mut self, commands: Vec<ReaderCommand>) {
        let mut queue: VecDeque<ReaderCommand> = commands.into();
        let mut rounds = 0;

        while let Some(command) = queue.pop_front() {
            rounds += 1;
            if rounds > MAX_ROUNDS {
                warn!(pending = queue.len() + 1, "command limit reached, dropping remaining commands");
                break;
            }

            trace!(?command, "executing reader command");
            let follow_up = match command {
                ReaderCommand::FetchSlice(request) => {
                    self.stats.slice_fetches += 1;
                    let result = self.pages.fetch_pages(&request.query);
                    if result.is_err() {
                        self.stats.slice_failures += 1;
                    }
                    self.session.complete_slice(request.ticket, result)
                }
                ReaderCommand::FetchProfiles(request) => {
                    self.stats.profile_batches += 1;
                    let result = self.profiles.fetch_profiles(&request.query);
                    if result.is_err() {
                        self.stats.profile_failures += 1;
                    }
                    self.session.complete_profiles(request.ticket, result)
                }
                ReaderCommand::EmitPageRead(event) => {
                    self.stats.read_events += 1;
                    self.events.page_read(event);
                    Vec::new()
                }
            };

            queue.extend(follow_up);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::memory::InMemoryCollection;

    fn driver<'a>(
        collection: &'a InMemoryCollection,
        sink: &'a RecordingSink,
        config: SessionConfig,
    ) -> ReaderDriver<&'a InMemoryCollection, &'a InMemoryCollection, &'a RecordingSink> {
        let session = ReaderSession::new(config).expect("valid config");
        ReaderDriver::new(session, collection, collection, sink)
    }

    #[test]
    fn start_loads_slice_and_window_profiles() {
        let collection = InMemoryCollection::new(100);
        let sink = RecordingSink::new();
        let mut driver = driver(&collection, &sink, SessionConfig::new(CollectionId(1)));

        driver.start();

        let session = driver.session();
        assert_eq!(session.page_count(), 100);
        assert_eq!(session.pages().len(), 40);
        assert!(session.rendered_pages().all(|page| page.has_profile()));
        assert_eq!(driver.stats().slice_fetches, 1);
        assert_eq!(driver.stats().profile_batches, 1);
    }

    #[test]
    fn focus_moves_emit_read_events_through_sink() {
        let collection = InMemoryCollection::new(20);
        let sink = RecordingSink::new();
        let mut driver = driver(&collection, &sink, SessionConfig::new(CollectionId(1)));

        driver.start();
        driver.focus_child(1);
        driver.focus_child(2);

        assert_eq!(sink.page_ids(), vec![PageId(1001), PageId(1002)]);
        assert_eq!(driver.stats().read_events, 2);
    }

    #[test]
    fn auto_navigation_advances_focus_each_interval() {
        let collection = InMemoryCollection::new(20);
        let sink = RecordingSink::new();
        let mut driver = driver(&collection, &sink, SessionConfig::new(CollectionId(1)));
        driver.start();

        let mut navigator = AutoNavigator::new(2);
        navigator.set_enabled(true);

        assert_eq!(driver.auto_navigate(&mut navigator, false), AutoNavTick::Counting(1));
        assert_eq!(driver.auto_navigate(&mut navigator, false), AutoNavTick::Advance(1));
        assert_eq!(driver.session().page_number(), 2);

        assert_eq!(driver.auto_navigate(&mut navigator, true), AutoNavTick::Paused);
        assert_eq!(driver.session().page_number(), 2);
        assert_eq!(sink.page_ids(), vec![PageId(1001)]);
    }

    #[test]
    fn read_next_waits_for_last_page_then_switches_collection() {
        use crate::autonav::{ReadNextCandidates, ReadNextSource};

        let collection = InMemoryCollection::new(3);
        let sink = RecordingSink::new();
        let mut driver = driver(&collection, &sink, SessionConfig::new(CollectionId(1)));
        driver.start();

        let candidates = ReadNextCandidates { chapter: Some(CollectionId(8)), ..Default::default() };
        let mut countdown = ReadNextCountdown::new(2, candidates);

        assert_eq!(driver.read_next(&mut countdown), ReadNextTick::Idle);
        assert!(!driver.session().end_reached());

        driver.go_to_page(3);
        assert_eq!(driver.read_next(&mut countdown), ReadNextTick::Counting(1));
        assert!(driver.session().end_reached());

        assert_eq!(
            driver.read_next(&mut countdown),
            ReadNextTick::Navigate(ReadNextSource::Chapter, CollectionId(8))
        );
        assert_eq!(driver.session().config().collection_id, CollectionId(8));
        assert_eq!(driver.session().page_number(), 1);
        assert!(!driver.session().end_reached());
    }

    #[test]
    fn failed_slice_is_counted_and_absorbed() {
        let collection = InMemoryCollection::new(10).with_failing_slices(1);
        let sink = RecordingSink::new();
        let mut driver = driver(&collection, &sink, SessionConfig::new(CollectionId(1)));

        driver.start();
        assert_eq!(driver.stats().slice_failures, 1);
        assert!(driver.session().pages().is_empty());
        assert!(!driver.session().is_fetching());

        driver.go_to_page(1);
        assert_eq!(driver.session().page_count(), 10);
        assert_eq!(driver.stats().failures(), 1);
    }
}
