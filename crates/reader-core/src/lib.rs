//! Windowing core of the paged reader.
//!
//! A collection may hold thousands of pages; only a slice of them is
//! fetched from the server (the remote window) and only a handful of those
//! are mounted around the focused page (the local window). [`ReaderSession`]
//! keeps both windows aligned with the focus and tells the caller which
//! requests to issue; [`ReaderDriver`] executes them against concrete
//! sources.

pub mod autonav;
pub mod config;
pub mod driver;
pub mod error;
pub mod fetcher;
pub mod memory;
pub mod profiles;
pub mod session;
pub mod state;
pub mod trigger;
pub mod window;

pub use autonav::{
    AutoNavTick, AutoNavigator, ReadNextCandidates, ReadNextCountdown, ReadNextSource, ReadNextTick,
};
pub use config::{SessionConfig, DEFAULT_RETRY_CEILING, DEFAULT_WINDOW_SIZE};
pub use driver::{
    DriverStats, PageSource, ProfileSource, ReadEventSink, ReaderDriver, RecordingSink,
};
pub use error::{ConfigError, FetchError, StoreError};
pub use fetcher::{SliceFetcher, SliceOutcome, SliceRequest, SliceTicket};
pub use memory::InMemoryCollection;
pub use profiles::{ProfileFetcher, ProfileOutcome, ProfileRequest, ProfileTicket};
pub use session::{ReaderCommand, ReaderSession};
pub use state::{Atom, KeyValueStore, MemoryStore, ReaderSettings, Subscription};
pub use trigger::{FetchDirection, SliceFetchGate};
pub use window::{compute_window, WindowSizes, MIN_REMOTE_WINDOW};
