//! Edge-proximity trigger for remote window refetches.
//!
//! When the focus comes within a few pages of either end of the fetched
//! slice, and more pages exist past that end, the remote window has to be
//! re-anchored around the focused page.

use reader_model::Page;
use tracing::trace;

/// How close (in window positions) the focus must come to the slice edge.
pub const MAX_EDGE_OFFSET: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDirection {
    /// More pages exist before the first fetched page.
    Left,
    /// More pages exist after the last fetched page.
    Right,
    /// Nothing is windowed yet but the collection is known to have pages.
    Initial,
}

pub fn edge_offset(local_window_size: usize) -> usize {
    (local_window_size / 2).min(MAX_EDGE_OFFSET)
}

/// Decides whether the remote window must be refetched.
///
/// `window` holds slice indices, `focus_pos` is a position within `window`.
/// When both edges qualify the left edge wins.
pub fn edge_direction(
    window: &[usize],
    focus_pos: usize,
    pages: &[Page],
    total_count: u32,
    offset: usize,
) -> Option<FetchDirection> {
    let Some(last_pos) = window.len().checked_sub(1) else {
        return (!pages.is_empty() || total_count > 0).then_some(FetchDirection::Initial);
    };

    let focus_pos = focus_pos.min(last_pos);
    let left_index = window[focus_pos.saturating_sub(offset)];
    let right_index = window[focus_pos.saturating_add(offset).min(last_pos)];

    if left_index == 0 && pages.first().is_some_and(|page| page.number != 1) {
        return Some(FetchDirection::Left);
    }

    let at_last = pages.len().checked_sub(1) == Some(right_index);
    if at_last && pages.get(right_index).is_some_and(|page| page.number != total_count) {
        return Some(FetchDirection::Right);
    }

    None
}

/// De-duplicates remote window fetches.
///
/// Only one slice fetch is in flight at a time, and a fetch anchored at the
/// same page number as the previously triggered one is suppressed while a
/// slice is loaded. A fresh gate has no previous anchor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SliceFetchGate {
    in_flight: bool,
    previous_number: Option<u32>,
}

impl SliceFetchGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the gate for a fetch anchored at `target_number`.
    ///
    /// Returns `false` when the fetch must be suppressed.
    pub fn try_begin(&mut self, target_number: u32, slice_empty: bool) -> bool {
        if self.in_flight {
            trace!(target_number, "slice fetch suppressed: already in flight");
            return false;
        }

        if !slice_empty && self.previous_number == Some(target_number) {
            trace!(target_number, "slice fetch suppressed: same anchor as previous fetch");
            return false;
        }

        self.previous_number = Some(target_number);
        self.in_flight = true;
        true
    }

    /// Releases the gate. Called on every resolution, success or failure.
    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn previous_number(&self) -> Option<u32> {
        self.previous_number
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reader_model::PageId;

    fn pages(numbers: std::ops::RangeInclusive<u32>) -> Vec<Page> {
        numbers.map(|number| Page::new(PageId(1000 + u64::from(number)), number)).collect()
    }

    #[test]
    fn offset_is_capped() {
        assert_eq!(edge_offset(10), 3);
        assert_eq!(edge_offset(4), 2);
        assert_eq!(edge_offset(1), 0);
    }

    #[test]
    fn right_fetch_when_window_touches_last_fetched_page() {
        let slice = pages(1..=40);
        let window: Vec<usize> = (34..=39).collect();

        let direction = edge_direction(&window, 2, &slice, 100, 3);
        assert_eq!(direction, Some(FetchDirection::Right));
    }

    #[test]
    fn no_right_fetch_at_collection_end() {
        let slice = pages(61..=100);
        let window: Vec<usize> = (34..=39).collect();

        assert_eq!(edge_direction(&window, 2, &slice, 100, 3), None);
    }

    #[test]
    fn left_fetch_when_slice_does_not_start_at_page_one() {
        let slice = pages(21..=60);
        let window: Vec<usize> = (0..=5).collect();

        assert_eq!(edge_direction(&window, 1, &slice, 100, 3), Some(FetchDirection::Left));
    }

    #[test]
    fn no_fetch_in_middle_of_slice() {
        let slice = pages(21..=60);
        let window: Vec<usize> = (15..=25).collect();

        assert_eq!(edge_direction(&window, 5, &slice, 100, 3), None);
    }

    #[test]
    fn left_wins_when_both_edges_qualify() {
        let slice = pages(5..=8);
        let window: Vec<usize> = (0..=3).collect();

        assert_eq!(edge_direction(&window, 1, &slice, 20, 3), Some(FetchDirection::Left));
    }

    #[test]
    fn empty_window_requests_initial_load_only_when_pages_are_known() {
        assert_eq!(edge_direction(&[], 0, &[], 12, 3), Some(FetchDirection::Initial));
        assert_eq!(edge_direction(&[], 0, &pages(1..=2), 0, 3), Some(FetchDirection::Initial));
        assert_eq!(edge_direction(&[], 0, &[], 0, 3), None);
    }

    #[test]
    fn gate_suppresses_while_in_flight() {
        let mut gate = SliceFetchGate::new();

        assert!(gate.try_begin(40, false));
        assert!(!gate.try_begin(41, false));

        gate.finish();
        assert!(gate.try_begin(41, false));
    }

    #[test]
    fn gate_suppresses_repeated_anchor() {
        let mut gate = SliceFetchGate::new();
        assert_eq!(gate.previous_number(), None);

        assert!(gate.try_begin(40, false));
        gate.finish();
        assert!(!gate.try_begin(40, false));
        assert_eq!(gate.previous_number(), Some(40));
    }

    #[test]
    fn fresh_gate_allows_first_anchor_with_loaded_slice() {
        let mut gate = SliceFetchGate::new();
        assert!(gate.try_begin(22, false));
        gate.finish();

        gate.reset();
        assert!(gate.try_begin(22, false));
    }

    #[test]
    fn gate_allows_repeated_anchor_for_empty_slice() {
        let mut gate = SliceFetchGate::new();

        assert!(gate.try_begin(1, true));
        gate.finish();
        assert!(gate.try_begin(1, true));
    }

    #[test]
    fn failure_path_releases_gate() {
        let mut gate = SliceFetchGate::new();
        assert!(gate.try_begin(7, false));
        assert!(gate.is_in_flight());

        gate.finish();
        assert!(!gate.is_in_flight());
    }
}
