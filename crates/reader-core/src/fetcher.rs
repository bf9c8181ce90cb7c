//! Remote window fetcher.
//!
//! Builds page-slice queries and interprets their responses. Requests are
//! identified by a ticket carrying the fetcher generation; tickets issued
//! before the last reset resolve as stale and are discarded.

use crate::error::FetchError;
use reader_model::{CollectionId, PageQuery, PageSlice, PAGE_FIELDS};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SliceTicket {
    generation: u64,
    serial: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceRequest {
    pub ticket: SliceTicket,
    pub query: PageQuery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceOutcome {
    /// The response supersedes the current slice.
    Replace(PageSlice),
    /// The request failed; the current slice stays.
    Failed(FetchError),
    /// The request predates the last reset.
    Stale,
}

#[derive(Debug)]
pub struct SliceFetcher {
    collection_id: CollectionId,
    generation: u64,
    next_serial: u64,
}

impl SliceFetcher {
    pub fn new(collection_id: CollectionId) -> Self {
        Self { collection_id, generation: 0, next_serial: 0 }
    }

    /// Invalidates every outstanding ticket.
    pub fn begin_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn set_collection(&mut self, collection_id: CollectionId) {
        self.collection_id = collection_id;
        self.begin_generation();
    }

    pub fn request(&mut self, target_number: u32, window_size: usize) -> SliceRequest {
        self.next_serial += 1;
        let ticket = SliceTicket { generation: self.generation, serial: self.next_serial };

        debug!(
            collection = self.collection_id.0,
            target_number,
            window_size,
            serial = ticket.serial,
            "requesting page slice"
        );

        SliceRequest {
            ticket,
            query: PageQuery {
                collection_id: self.collection_id,
                number: target_number,
                window_size,
                fields: PAGE_FIELDS.iter().map(|field| (*field).to_owned()).collect(),
            },
        }
    }

    pub fn resolve(
        &self,
        ticket: SliceTicket,
        result: Result<PageSlice, FetchError>,
    ) -> SliceOutcome {
        if ticket.generation != self.generation {
            debug!(serial = ticket.serial, "discarding stale page slice response");
            return SliceOutcome::Stale;
        }

        match result {
            Ok(slice) => {
                if !slice.is_contiguous() {
                    warn!(serial = ticket.serial, "page slice numbers are not contiguous");
                }
                debug!(
                    serial = ticket.serial,
                    items = slice.len(),
                    count = slice.count,
                    "page slice received"
                );
                SliceOutcome::Replace(slice)
            }
            Err(error) => {
                warn!(serial = ticket.serial, %error, "page slice request failed");
                SliceOutcome::Failed(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reader_model::{Page, PageId};

    fn slice(numbers: std::ops::RangeInclusive<u32>, count: u32) -> PageSlice {
        PageSlice::new(numbers.map(|n| Page::new(PageId(u64::from(n) + 500), n)).collect(), count)
    }

    #[test]
    fn request_carries_anchor_and_size() {
        let mut fetcher = SliceFetcher::new(CollectionId(9));
        let request = fetcher.request(17, 40);

        assert_eq!(request.query.collection_id, CollectionId(9));
        assert_eq!(request.query.number, 17);
        assert_eq!(request.query.window_size, 40);
        assert!(request.query.fields.iter().any(|field| field == "number"));
    }

    #[test]
    fn successful_response_replaces_slice() {
        let mut fetcher = SliceFetcher::new(CollectionId(1));
        let request = fetcher.request(1, 40);

        let outcome = fetcher.resolve(request.ticket, Ok(slice(1..=40, 100)));
        assert_eq!(outcome, SliceOutcome::Replace(slice(1..=40, 100)));
    }

    #[test]
    fn failure_is_reported_not_raised() {
        let mut fetcher = SliceFetcher::new(CollectionId(1));
        let request = fetcher.request(1, 40);

        let outcome = fetcher.resolve(request.ticket, Err(FetchError::Timeout));
        assert_eq!(outcome, SliceOutcome::Failed(FetchError::Timeout));
    }

    #[test]
    fn tickets_from_previous_generation_are_stale() {
        let mut fetcher = SliceFetcher::new(CollectionId(1));
        let old = fetcher.request(1, 40);

        fetcher.set_collection(CollectionId(2));
        let fresh = fetcher.request(1, 40);

        assert_eq!(fetcher.resolve(old.ticket, Ok(slice(1..=3, 3))), SliceOutcome::Stale);
        assert!(matches!(
            fetcher.resolve(fresh.ticket, Ok(slice(1..=3, 3))),
            SliceOutcome::Replace(_)
        ));
        assert_eq!(fresh.query.collection_id, CollectionId(2));
    }
}
