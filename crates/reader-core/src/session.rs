//! Reader session: the dual-window pagination state machine.
//!
//! The session never performs I/O. Every operation updates state, runs
//! [`ReaderSession::reconcile`] and returns the commands the caller must
//! execute (remote fetches and read events). Responses are fed back through
//! `complete_slice` / `complete_profiles` in whatever order they arrive.
//!
//! Data flow on every reconcile:
//! 1. recompute the local window around the current page number,
//! 2. ask the edge trigger whether the remote window must move,
//! 3. request profiles for windowed pages still lacking an image,
//! 4. emit a read event when the focused page changed.

use crate::config::SessionConfig;
use crate::error::{ConfigError, FetchError};
use crate::fetcher::{SliceFetcher, SliceOutcome, SliceRequest, SliceTicket};
use crate::profiles::{ProfileFetcher, ProfileOutcome, ProfileRequest, ProfileTicket};
use crate::trigger::{edge_direction, edge_offset, FetchDirection, SliceFetchGate};
use crate::window::{compute_window, WindowSizes};
use reader_model::{
    CollectionId, ImageSize, Page, PageId, PageReadEvent, PageSlice, ProfileResponse, Scaling,
};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderCommand {
    FetchSlice(SliceRequest),
    FetchProfiles(ProfileRequest),
    EmitPageRead(PageReadEvent),
}

#[derive(Debug)]
pub struct ReaderSession {
    config: SessionConfig,
    sizes: WindowSizes,
    slice: PageSlice,
    page_number: u32,
    focus: usize,
    window: Vec<usize>,
    gate: SliceFetchGate,
    slices: SliceFetcher,
    profiles: ProfileFetcher,
    last_focused: Option<PageId>,
    end_reached: bool,
    initial_data: bool,
}

impl ReaderSession {
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            sizes: WindowSizes::derive(config.window_size, config.remote_window_size, 0),
            slice: PageSlice::default(),
            page_number: config.start_page,
            focus: 0,
            window: Vec::new(),
            gate: SliceFetchGate::new(),
            slices: SliceFetcher::new(config.collection_id),
            profiles: ProfileFetcher::new(config.retry_ceiling),
            last_focused: None,
            end_reached: false,
            initial_data: false,
            config,
        })
    }

    /// Seeds the session with an already fetched slice; `start` then skips
    /// the initial remote request.
    pub fn with_initial_data(mut self, slice: PageSlice) -> Self {
        self.sizes =
            WindowSizes::derive(self.config.window_size, self.config.remote_window_size, slice.len());
        self.slice = slice;
        self.initial_data = true;
        self
    }

    pub fn start(&mut self) -> Vec<ReaderCommand> {
        let mut commands = Vec::new();
        if !self.initial_data && self.slice.is_empty() {
            self.request_slice(self.page_number, &mut commands);
        }
        self.reconcile_into(true, &mut commands);
        commands
    }

    /// Moves the focus to a position of the local window, as reported by
    /// the reader surface after scrolling.
    pub fn focus_child(&mut self, position: usize) -> Vec<ReaderCommand> {
        self.focus = position.min(self.window.len().saturating_sub(1));

        let focused = self.window.get(self.focus).and_then(|index| self.slice.items.get(*index));
        if let Some(page) = focused {
            self.page_number = page.number;
        }

        self.reconcile()
    }

    /// Navigates to a page by number, refetching the remote window when the
    /// page lies outside the fetched slice.
    pub fn go_to_page(&mut self, number: u32) -> Vec<ReaderCommand> {
        let mut number = number.max(1);
        if self.slice.count > 0 {
            number = number.min(self.slice.count);
        }
        self.page_number = number;

        let mut commands = Vec::new();
        if self.slice.position_of_number(number).is_none() {
            self.request_slice(number, &mut commands);
        }
        self.reconcile_into(true, &mut commands);
        commands
    }

    /// Applies a page-slice response. The in-flight flag is released for
    /// every response of the current generation, including failures.
    pub fn complete_slice(
        &mut self,
        ticket: SliceTicket,
        result: Result<PageSlice, FetchError>,
    ) -> Vec<ReaderCommand> {
        match self.slices.resolve(ticket, result) {
            SliceOutcome::Stale => return Vec::new(),
            SliceOutcome::Failed(_) => self.gate.finish(),
            SliceOutcome::Replace(slice) => {
                self.gate.finish();
                if !self.initial_data {
                    self.sizes.local =
                        WindowSizes::local_for(self.config.window_size, slice.count as usize);
                }
                self.slice = slice;
            }
        }

        self.reconcile()
    }

    /// Applies a profile response. Pages the response skipped are retried on
    /// a later reconcile, not immediately: callers must keep calling
    /// [`ReaderSession::reconcile`] (or another operation) to use up the
    /// remaining attempts.
    pub fn complete_profiles(
        &mut self,
        ticket: ProfileTicket,
        result: Result<ProfileResponse, FetchError>,
    ) -> Vec<ReaderCommand> {
        match self.profiles.resolve(ticket, result, &mut self.slice.items) {
            ProfileOutcome::Stale => Vec::new(),
            ProfileOutcome::Failed(_) | ProfileOutcome::Merged { .. } => {
                let mut commands = Vec::new();
                self.reconcile_into(false, &mut commands);
                commands
            }
        }
    }

    /// Drops a page's image (for instance after a load error) so it is
    /// fetched again, within the retry ceiling.
    pub fn clear_profile(&mut self, id: PageId) -> Vec<ReaderCommand> {
        if !self.profiles.clear_profile(id, &mut self.slice.items) {
            return Vec::new();
        }
        self.reconcile()
    }

    pub fn set_scaling(&mut self, scaling: Scaling) -> Vec<ReaderCommand> {
        if self.config.scaling == scaling {
            return Vec::new();
        }
        self.config.scaling = scaling;
        self.reset()
    }

    pub fn set_collection(&mut self, collection_id: CollectionId) -> Vec<ReaderCommand> {
        self.config.collection_id = collection_id;
        self.slices.set_collection(collection_id);
        self.reset()
    }

    /// Marks the end of the collection as reached. Refused while a slice is
    /// loading or while known pages are not windowed yet.
    pub fn reach_end(&mut self) -> bool {
        if self.gate.is_in_flight() {
            return false;
        }
        if self.slice.count > 0 && self.window.is_empty() {
            return false;
        }
        self.end_reached = true;
        true
    }

    pub fn clear_end(&mut self) {
        self.end_reached = false;
    }

    /// Re-runs the windowing pipeline against the current state.
    pub fn reconcile(&mut self) -> Vec<ReaderCommand> {
        let mut commands = Vec::new();
        self.reconcile_into(true, &mut commands);
        commands
    }

    fn reset(&mut self) -> Vec<ReaderCommand> {
        info!(
            collection = self.config.collection_id.0,
            scaling = ?self.config.scaling,
            "resetting reader session"
        );

        self.page_number = 1;
        self.focus = 0;
        self.slice = PageSlice::default();
        self.window.clear();
        self.end_reached = false;
        self.initial_data = false;
        self.sizes = WindowSizes::derive(self.config.window_size, self.config.remote_window_size, 0);
        self.profiles.reset();
        self.slices.begin_generation();
        self.gate.reset();

        let mut commands = Vec::new();
        self.request_slice(1, &mut commands);
        self.reconcile_into(true, &mut commands);
        commands
    }

    fn reconcile_into(&mut self, fill_profiles: bool, commands: &mut Vec<ReaderCommand>) {
        if self.slice.count > 0 && self.page_number > self.slice.count {
            self.page_number = 1;
        }

        if !self.gate.is_in_flight() {
            self.recompute_window();
        }

        if let Some(direction) = self.edge_direction() {
            let target = self.focused_page().map_or(self.page_number, |page| page.number);
            debug!(?direction, target, "edge trigger fired");
            self.request_slice(target, commands);
        }

        if fill_profiles {
            let size = self.image_size();
            let pages = self.window.iter().filter_map(|index| self.slice.items.get(*index));
            if let Some(request) = self.profiles.fill_missing(pages, size) {
                commands.push(ReaderCommand::FetchProfiles(request));
            }
        }

        let focused = self.focused_page().map(|page| page.id);
        if focused != self.last_focused {
            if let Some(previous) = self.last_focused {
                commands.push(ReaderCommand::EmitPageRead(PageReadEvent { item_id: previous }));
            }
            self.last_focused = focused;
        }
    }

    fn recompute_window(&mut self) {
        let index = self.slice.position_of_number(self.page_number).unwrap_or(0);
        let max_index = self.slice.len() as isize - 1;
        let window = compute_window(index as isize, self.sizes.local, max_index, 0);

        let corrected = window
            .iter()
            .position(|slice_index| self.slice.items[*slice_index].number == self.page_number);
        if let Some(position) = corrected {
            self.focus = position;
        }
        self.focus = self.focus.min(window.len().saturating_sub(1));

        if window != self.window {
            debug!(
                page_number = self.page_number,
                focus = self.focus,
                first = ?window.first(),
                last = ?window.last(),
                "local window recomputed"
            );
            self.window = window;
        }
    }

    fn edge_direction(&self) -> Option<FetchDirection> {
        edge_direction(
            &self.window,
            self.focus,
            &self.slice.items,
            self.slice.count,
            edge_offset(self.sizes.local),
        )
    }

    fn request_slice(&mut self, target: u32, commands: &mut Vec<ReaderCommand>) {
        if self.gate.try_begin(target, self.slice.is_empty()) {
            let request = self.slices.request(target, self.sizes.remote);
            commands.push(ReaderCommand::FetchSlice(request));
        }
    }

    fn image_size(&self) -> ImageSize {
        self.config.scaling.resolve(self.config.viewport_width_px)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn pages(&self) -> &[Page] {
        &self.slice.items
    }

    pub fn page_count(&self) -> u32 {
        self.slice.count
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn local_window(&self) -> &[usize] {
        &self.window
    }

    pub fn window_sizes(&self) -> WindowSizes {
        self.sizes
    }

    /// Pages currently mounted, in reading order.
    pub fn rendered_pages(&self) -> impl Iterator<Item = &Page> + '_ {
        self.window.iter().filter_map(|index| self.slice.items.get(*index))
    }

    pub fn focused_page(&self) -> Option<&Page> {
        self.window.get(self.focus).and_then(|index| self.slice.items.get(*index))
    }

    /// True when the focused page is the last page of the collection.
    pub fn on_last_page(&self) -> bool {
        self.slice.count > 0 && self.focused_page().is_some_and(|page| page.number == self.slice.count)
    }

    pub fn is_fetching(&self) -> bool {
        self.gate.is_in_flight()
    }

    pub fn end_reached(&self) -> bool {
        self.end_reached
    }

    pub fn retry_count(&self, id: PageId) -> Option<i32> {
        self.profiles.retry_count(id)
    }

    pub fn is_profile_in_flight(&self, id: PageId) -> bool {
        self.profiles.is_in_flight(id)
    }
}
