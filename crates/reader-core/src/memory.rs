//! An in-memory page collection implementing both remote sources.
//!
//! Used by the CLI simulator and by tests. Slices are anchored so the
//! requested page sits in the middle of the returned run whenever the
//! collection allows it.

use crate::driver::{PageSource, ProfileSource};
use crate::error::FetchError;
use reader_model::{ImageProfile, Page, PageId, PageQuery, PageSlice, ProfileQuery, ProfileResponse};
use std::cell::Cell;
use std::collections::HashSet;
use tracing::debug;

/// Page ids of generated collections start here: page `n` has id `1000 + n`.
pub const GENERATED_ID_BASE: u64 = 1000;

#[derive(Debug, Default)]
pub struct InMemoryCollection {
    pages: Vec<Page>,
    broken: HashSet<PageId>,
    failing_slices: Cell<u32>,
}

impl InMemoryCollection {
    pub fn new(count: u32) -> Self {
        let pages = (1..=count)
            .map(|number| Page::new(PageId(GENERATED_ID_BASE + u64::from(number)), number))
            .collect();
        Self::from_pages(pages)
    }

    pub fn from_pages(mut pages: Vec<Page>) -> Self {
        pages.sort_by_key(|page| page.number);
        Self { pages, broken: HashSet::new(), failing_slices: Cell::new(0) }
    }

    /// Pages whose profile is never returned.
    pub fn with_broken(mut self, ids: impl IntoIterator<Item = PageId>) -> Self {
        self.broken.extend(ids);
        self
    }

    /// Makes the next `count` slice requests fail.
    pub fn with_failing_slices(self, count: u32) -> Self {
        self.failing_slices.set(count);
        self
    }

    pub fn count(&self) -> u32 {
        u32::try_from(self.pages.len()).unwrap_or(u32::MAX)
    }

    fn anchor(&self, number: u32, window: usize) -> u32 {
        let count = i64::from(self.count());
        let window = i64::try_from(window).unwrap_or(i64::MAX).max(1);
        let upper = (count - window + 1).max(1);
        let start = (i64::from(number) - window / 2).clamp(1, upper);
        u32::try_from(start).unwrap_or(1)
    }
}

impl PageSource for InMemoryCollection {
    fn fetch_pages(&self, query: &PageQuery) -> Result<PageSlice, FetchError> {
        let failing = self.failing_slices.get();
        if failing > 0 {
            self.failing_slices.set(failing - 1);
            return Err(FetchError::Network("injected slice failure".to_owned()));
        }

        let window = query.window_size.max(1);
        let start = self.anchor(query.number, window);
        let items: Vec<Page> = self
            .pages
            .iter()
            .skip_while(|page| page.number < start)
            .take(window)
            .cloned()
            .collect();

        debug!(number = query.number, start, items = items.len(), "serving page slice");
        Ok(PageSlice::new(items, self.count()))
    }
}

impl ProfileSource for InMemoryCollection {
    fn fetch_profiles(&self, query: &ProfileQuery) -> Result<ProfileResponse, FetchError> {
        let size = query.profile_options.size;
        let response = query
            .item_ids
            .iter()
            .filter(|id| !self.broken.contains(*id))
            .filter_map(|id| self.pages.iter().find(|page| page.id == *id))
            .map(|page| {
                let profile =
                    ImageProfile { data: format!("page-{}", page.number), size: Some(size) };
                (page.id, profile)
            })
            .collect();
        Ok(response)
    }
}
