//! Local window calculation.
//!
//! The reader keeps two windows: the remote window (the slice of page
//! metadata fetched from the server) and the local window, a smaller run of
//! slice indices whose images are actually mounted. This module computes the
//! local window and the sizes of both windows.

/// Remote windows never shrink below this many pages.
pub const MIN_REMOTE_WINDOW: usize = 40;

/// Computes the slice indices to keep mounted around `focus_index`.
///
/// Walks up to `window_size / 2` steps backward (never below `start_index`)
/// and up to `ceil(window_size / 2)` steps forward (never past `max_index`).
/// A negative `max_index` denotes an empty collection and yields no indices.
///
/// The result is strictly ascending, contains the clamped focus exactly once
/// and holds at most `window_size + 1` indices.
///
/// ```
/// use reader_core::compute_window;
///
/// assert_eq!(compute_window(5, 10, 20, 0), (0..=10).collect::<Vec<_>>());
/// assert_eq!(compute_window(0, 10, 20, 0), vec![0, 1, 2, 3, 4, 5]);
/// assert!(compute_window(3, 10, -1, 0).is_empty());
/// ```
pub fn compute_window(
    focus_index: isize,
    window_size: usize,
    max_index: isize,
    start_index: isize,
) -> Vec<usize> {
    if max_index < 0 {
        return Vec::new();
    }

    let start = start_index.max(0);
    if start > max_index {
        return Vec::new();
    }

    let focus = focus_index.clamp(start, max_index) as usize;
    let (start, max) = (start as usize, max_index as usize);

    let backward = window_size / 2;
    let forward = window_size.div_ceil(2);

    let lower = focus.saturating_sub(backward).max(start);
    let upper = focus.saturating_add(forward).min(max);

    (lower..=upper).collect()
}

/// Effective local and remote window sizes for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSizes {
    pub local: usize,
    pub remote: usize,
}

impl WindowSizes {
    /// Derives both sizes from the requested values and the number of pages
    /// known so far. An unknown (zero) count keeps the requested local size.
    pub fn derive(requested_local: usize, requested_remote: Option<usize>, known_count: usize) -> Self {
        let local = Self::local_for(requested_local, known_count);
        let remote = requested_remote.unwrap_or(local.saturating_mul(2)).max(MIN_REMOTE_WINDOW);
        Self { local, remote }
    }

    pub fn local_for(requested_local: usize, known_count: usize) -> usize {
        if known_count == 0 {
            requested_local
        } else {
            requested_local.min(known_count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_well_formed(window: &[usize], focus: usize, size: usize, max: usize) {
        assert!(window.windows(2).all(|pair| pair[0] < pair[1]), "not ascending: {window:?}");
        assert!(window.len() <= size + 1, "too long: {window:?}");
        assert!(window.iter().all(|index| *index <= max), "out of range: {window:?}");
        assert_eq!(window.iter().filter(|index| **index == focus).count(), 1);
    }

    #[test]
    fn window_spans_both_sides_of_focus() {
        assert_eq!(compute_window(5, 10, 20, 0), vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn window_at_start_only_walks_forward() {
        assert_eq!(compute_window(0, 10, 20, 0), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn window_at_end_only_walks_backward() {
        assert_eq!(compute_window(20, 10, 20, 0), vec![15, 16, 17, 18, 19, 20]);
    }

    #[test]
    fn empty_collection_yields_empty_window() {
        assert!(compute_window(0, 10, -1, 0).is_empty());
        assert!(compute_window(4, 3, -5, 0).is_empty());
    }

    #[test]
    fn single_page_collection_keeps_its_page() {
        assert_eq!(compute_window(0, 10, 0, 0), vec![0]);
    }

    #[test]
    fn focus_is_clamped_into_range() {
        assert_eq!(compute_window(50, 4, 9, 0), vec![7, 8, 9]);
        assert_eq!(compute_window(-3, 4, 9, 0), vec![0, 1, 2]);
    }

    #[test]
    fn start_index_bounds_backward_walk() {
        assert_eq!(compute_window(4, 10, 20, 3), vec![3, 4, 5, 6, 7, 8, 9]);
        assert!(compute_window(0, 10, 2, 5).is_empty());
    }

    #[test]
    fn odd_sizes_lean_forward() {
        assert_eq!(compute_window(5, 5, 20, 0), vec![3, 4, 5, 6, 7, 8]);
        assert_eq!(compute_window(5, 1, 20, 0), vec![5, 6]);
        assert_eq!(compute_window(5, 0, 20, 0), vec![5]);
    }

    #[test]
    fn window_invariants_hold_across_inputs() {
        for max in 0..12_isize {
            for size in 0..14_usize {
                for focus in -2..(max + 3) {
                    let window = compute_window(focus, size, max, 0);
                    let clamped = focus.clamp(0, max) as usize;
                    assert_well_formed(&window, clamped, size, max as usize);
                    assert_eq!(window, compute_window(focus, size, max, 0));
                }
            }
        }
    }

    #[test]
    fn sizes_clamp_local_to_known_pages() {
        assert_eq!(WindowSizes::derive(10, None, 0), WindowSizes { local: 10, remote: 40 });
        assert_eq!(WindowSizes::derive(10, None, 4), WindowSizes { local: 4, remote: 40 });
        assert_eq!(WindowSizes::derive(30, None, 100), WindowSizes { local: 30, remote: 60 });
        assert_eq!(WindowSizes::derive(10, Some(25), 100), WindowSizes { local: 10, remote: 40 });
        assert_eq!(WindowSizes::derive(10, Some(80), 100), WindowSizes { local: 10, remote: 80 });
    }
}
