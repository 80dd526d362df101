//! Per-view pagination bookkeeping.

use serde::{Deserialize, Serialize};

/// Whether the server has more pages for a view. `Unknown` until the
/// first page result arrives; after that, whatever the server said
/// last.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoreFlag {
    #[default]
    Unknown,
    More,
    End,
}

impl MoreFlag {
    /// The upstream encodes this as a boolean-like field; anything
    /// that is not `false` counts as more available.
    pub fn from_wire(more: bool) -> Self {
        if more {
            MoreFlag::More
        } else {
            MoreFlag::End
        }
    }

    pub fn is_end(self) -> bool {
        self == MoreFlag::End
    }

    pub fn is_more(self) -> bool {
        self == MoreFlag::More
    }
}

/// Pagination state for one view: the highest page merged so far, the
/// more-available flag, and the in-flight guard that serializes loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    page: u32,
    more: MoreFlag,
    in_flight: bool,
    initial_loaded: bool,
}

impl Default for PageState {
    fn default() -> Self {
        PageState {
            page: 1,
            more: MoreFlag::Unknown,
            in_flight: false,
            initial_loaded: false,
        }
    }
}

impl PageState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest loaded page number, starting at 1.
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn more(&self) -> MoreFlag {
        self.more
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Whether the first full load for this view has completed.
    pub fn initial_loaded(&self) -> bool {
        self.initial_loaded
    }

    /// Mark a load started. Returns false (and changes nothing) if one
    /// is already in flight.
    pub(crate) fn start_load(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    /// A page result was merged.
    pub(crate) fn finish_page(&mut self, page: u32, more: MoreFlag) {
        self.page = page;
        self.more = more;
        self.in_flight = false;
        self.initial_loaded = true;
    }

    /// A load failed: only the in-flight guard is cleared, so the next
    /// user action can retry against unchanged state.
    pub(crate) fn fail(&mut self) {
        self.in_flight = false;
    }

    /// Back to the mount state (page 1, more unknown).
    pub fn reset(&mut self) {
        *self = PageState::default();
    }
}
