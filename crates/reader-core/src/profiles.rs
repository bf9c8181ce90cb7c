//! Image profile fetching for windowed pages.
//!
//! Tracks which page ids are awaiting a profile response and how many
//! attempts each page has used. A page that reaches the retry ceiling is
//! skipped for the rest of the session and stays profile-less.

use crate::error::FetchError;
use reader_model::{ImageSize, ItemType, Page, PageId, ProfileOptions, ProfileQuery, ProfileResponse};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProfileTicket {
    generation: u64,
    batch: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRequest {
    pub ticket: ProfileTicket,
    pub query: ProfileQuery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileOutcome {
    Merged {
        /// Profiles written into pages of the current slice
        merged: usize,
        /// Requested ids the response did not cover
        missing: Vec<PageId>,
    },
    Failed(FetchError),
    Stale,
}

#[derive(Debug)]
pub struct ProfileFetcher {
    ceiling: u32,
    retries: HashMap<PageId, i32>,
    in_flight: HashSet<PageId>,
    batches: HashMap<u64, Vec<PageId>>,
    generation: u64,
    next_batch: u64,
}

impl ProfileFetcher {
    pub fn new(ceiling: u32) -> Self {
        Self {
            ceiling,
            retries: HashMap::new(),
            in_flight: HashSet::new(),
            batches: HashMap::new(),
            generation: 0,
            next_batch: 0,
        }
    }

    /// Attempts recorded for a page: `-1` before the first dispatch, `0`
    /// after it, and so on. `None` for pages never considered.
    pub fn retry_count(&self, id: PageId) -> Option<i32> {
        self.retries.get(&id).copied()
    }

    pub fn is_in_flight(&self, id: PageId) -> bool {
        self.in_flight.contains(&id)
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_exhausted(&self, id: PageId) -> bool {
        self.retries.get(&id).is_some_and(|count| *count >= self.ceiling_i32())
    }

    /// Picks the pages that need a profile request and marks them in flight.
    pub fn select<'a>(&mut self, pages: impl IntoIterator<Item = &'a Page>) -> Vec<PageId> {
        let ceiling = self.ceiling_i32();
        let mut selected = Vec::new();

        for page in pages {
            if page.has_profile() || self.in_flight.contains(&page.id) {
                continue;
            }

            let count = self.retries.entry(page.id).or_insert(-1);
            if *count >= ceiling {
                continue;
            }

            *count += 1;
            self.in_flight.insert(page.id);
            selected.push(page.id);
        }

        selected
    }

    /// Builds one batched request for every page still missing a profile.
    pub fn fill_missing<'a>(
        &mut self,
        pages: impl IntoIterator<Item = &'a Page>,
        size: ImageSize,
    ) -> Option<ProfileRequest> {
        let item_ids = self.select(pages);
        if item_ids.is_empty() {
            return None;
        }

        self.next_batch += 1;
        let ticket = ProfileTicket { generation: self.generation, batch: self.next_batch };
        self.batches.insert(ticket.batch, item_ids.clone());

        debug!(batch = ticket.batch, ids = ?item_ids, ?size, "requesting image profiles");

        Some(ProfileRequest {
            ticket,
            query: ProfileQuery {
                item_type: ItemType::Page,
                item_ids,
                profile_options: ProfileOptions { size },
            },
        })
    }

    /// Applies a profile response to the pages of the current slice.
    ///
    /// Every id of the batch leaves the in-flight set. Ids that are no longer
    /// part of `pages` are dropped without touching anything else.
    pub fn resolve(
        &mut self,
        ticket: ProfileTicket,
        result: Result<ProfileResponse, FetchError>,
        pages: &mut [Page],
    ) -> ProfileOutcome {
        if ticket.generation != self.generation {
            debug!(batch = ticket.batch, "discarding stale profile response");
            return ProfileOutcome::Stale;
        }

        let requested = self.batches.remove(&ticket.batch).unwrap_or_default();
        for id in &requested {
            self.in_flight.remove(id);
        }

        let response = match result {
            Ok(response) => response,
            Err(error) => {
                warn!(batch = ticket.batch, %error, "profile request failed");
                return ProfileOutcome::Failed(error);
            }
        };

        let mut merged = 0;
        for (id, profile) in response {
            self.in_flight.remove(&id);

            let Some(page) = pages.iter_mut().find(|page| page.id == id) else {
                debug!(%id, "profile for page outside current slice ignored");
                continue;
            };

            page.profile = Some(profile);
            self.retries.remove(&id);
            merged += 1;
        }

        let missing: Vec<PageId> = requested
            .into_iter()
            .filter(|id| pages.iter().any(|page| page.id == *id && !page.has_profile()))
            .collect();

        if !missing.is_empty() {
            debug!(batch = ticket.batch, ids = ?missing, "profiles not returned");
        }

        ProfileOutcome::Merged { merged, missing }
    }

    /// Drops a page's profile so it is fetched again, unless the page has
    /// already used all of its attempts. Returns whether the profile was cleared.
    pub fn clear_profile(&self, id: PageId, pages: &mut [Page]) -> bool {
        if self.is_exhausted(id) {
            return false;
        }

        match pages.iter_mut().find(|page| page.id == id) {
            Some(page) => {
                page.profile = None;
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.retries.clear();
        self.in_flight.clear();
        self.batches.clear();
        self.generation += 1;
    }

    fn ceiling_i32(&self) -> i32 {
        i32::try_from(self.ceiling).unwrap_or(i32::MAX)
    }
}
