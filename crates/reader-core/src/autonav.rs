//! Timed navigation: auto-advance between pages and the "read next"
//! countdown shown once the end of a collection is reached.
//!
//! Both are driven by the caller once per second through `tick`.

use reader_model::CollectionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoNavTick {
    Idle,
    Paused,
    Counting(u32),
    /// Move the focus to this window position.
    Advance(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoNavigator {
    enabled: bool,
    interval: u32,
    counter: u32,
}

impl AutoNavigator {
    pub fn new(interval_secs: u32) -> Self {
        let interval = interval_secs.max(1);
        Self { enabled: false, interval, counter: interval }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.counter = self.interval;
    }

    /// Seconds left before the next advance.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn tick(&mut self, panning: bool, focus: usize, window_len: usize) -> AutoNavTick {
        if !self.enabled || focus + 1 >= window_len {
            self.counter = self.interval;
            return AutoNavTick::Idle;
        }

        if panning {
            return AutoNavTick::Paused;
        }

        self.counter = self.counter.saturating_sub(1);
        if self.counter == 0 {
            self.counter = self.interval;
            return AutoNavTick::Advance(focus + 1);
        }

        AutoNavTick::Counting(self.counter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadNextSource {
    Queue,
    Chapter,
    ReadingList,
}

/// Collections that may follow the current one, by source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadNextCandidates {
    pub queue: Option<CollectionId>,
    pub chapter: Option<CollectionId>,
    pub reading_list: Option<CollectionId>,
}

impl ReadNextCandidates {
    /// Queue first, then the next chapter, then the reading list.
    pub fn pick(&self) -> Option<(ReadNextSource, CollectionId)> {
        self.queue
            .map(|id| (ReadNextSource::Queue, id))
            .or(self.chapter.map(|id| (ReadNextSource::Chapter, id)))
            .or(self.reading_list.map(|id| (ReadNextSource::ReadingList, id)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadNextTick {
    Idle,
    Counting(u32),
    Navigate(ReadNextSource, CollectionId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadNextCountdown {
    target: Option<(ReadNextSource, CollectionId)>,
    remaining: u32,
}

impl ReadNextCountdown {
    pub fn new(countdown_secs: u32, candidates: ReadNextCandidates) -> Self {
        Self { target: candidates.pick(), remaining: countdown_secs }
    }

    pub fn target(&self) -> Option<(ReadNextSource, CollectionId)> {
        self.target
    }

    pub fn cancel(&mut self) {
        self.target = None;
    }

    pub fn tick(&mut self, end_reached: bool) -> ReadNextTick {
        let Some((source, id)) = self.target else {
            return ReadNextTick::Idle;
        };

        if !end_reached || self.remaining == 0 {
            return ReadNextTick::Idle;
        }

        if self.remaining == 1 {
            self.remaining = 0;
            return ReadNextTick::Navigate(source, id);
        }

        self.remaining -= 1;
        ReadNextTick::Counting(self.remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_after_interval() {
        let mut nav = AutoNavigator::new(3);
        nav.set_enabled(true);

        assert_eq!(nav.tick(false, 0, 5), AutoNavTick::Counting(2));
        assert_eq!(nav.tick(false, 0, 5), AutoNavTick::Counting(1));
        assert_eq!(nav.tick(false, 0, 5), AutoNavTick::Advance(1));
        assert_eq!(nav.counter(), 3);
    }

    #[test]
    fn panning_pauses_countdown() {
        let mut nav = AutoNavigator::new(2);
        nav.set_enabled(true);

        assert_eq!(nav.tick(false, 0, 5), AutoNavTick::Counting(1));
        assert_eq!(nav.tick(true, 0, 5), AutoNavTick::Paused);
        assert_eq!(nav.tick(false, 0, 5), AutoNavTick::Advance(1));
    }

    #[test]
    fn idle_when_disabled_or_on_last_page() {
        let mut nav = AutoNavigator::new(2);
        assert_eq!(nav.tick(false, 0, 5), AutoNavTick::Idle);

        nav.set_enabled(true);
        assert_eq!(nav.tick(false, 4, 5), AutoNavTick::Idle);
        assert_eq!(nav.tick(false, 0, 0), AutoNavTick::Idle);
    }

    #[test]
    fn zero_interval_is_treated_as_one_second() {
        let mut nav = AutoNavigator::new(0);
        nav.set_enabled(true);
        assert_eq!(nav.tick(false, 2, 5), AutoNavTick::Advance(3));
    }

    #[test]
    fn read_next_prefers_queue_then_chapter() {
        let candidates = ReadNextCandidates {
            queue: None,
            chapter: Some(CollectionId(4)),
            reading_list: Some(CollectionId(9)),
        };
        assert_eq!(candidates.pick(), Some((ReadNextSource::Chapter, CollectionId(4))));

        let with_queue = ReadNextCandidates { queue: Some(CollectionId(2)), ..candidates };
        assert_eq!(with_queue.pick(), Some((ReadNextSource::Queue, CollectionId(2))));
    }

    #[test]
    fn read_next_counts_down_only_at_end() {
        let candidates = ReadNextCandidates { chapter: Some(CollectionId(4)), ..Default::default() };
        let mut countdown = ReadNextCountdown::new(3, candidates);

        assert_eq!(countdown.tick(false), ReadNextTick::Idle);
        assert_eq!(countdown.tick(true), ReadNextTick::Counting(2));
        assert_eq!(countdown.tick(true), ReadNextTick::Counting(1));
        assert_eq!(countdown.tick(true), ReadNextTick::Navigate(ReadNextSource::Chapter, CollectionId(4)));
        assert_eq!(countdown.tick(true), ReadNextTick::Idle);
    }

    #[test]
    fn cancelled_countdown_never_navigates() {
        let candidates = ReadNextCandidates { queue: Some(CollectionId(1)), ..Default::default() };
        let mut countdown = ReadNextCountdown::new(1, candidates);

        countdown.cancel();
        assert_eq!(countdown.tick(true), ReadNextTick::Idle);
        assert_eq!(countdown.target(), None);
    }
}
