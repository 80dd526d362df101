//! The cache object itself: entity table, views, pagination state and
//! the epoch that fences off stale responses.
//!
//! One `FeedCache` is created per signed-in session and dropped at
//! sign-out. It is owned by a single cooperative task; every mutation
//! runs as one synchronous step, so readers always observe a fully
//! merged snapshot.

use crate::{
    loader::LoadPhase,
    pagination::{MoreFlag, PageState},
    post::Post,
    table::EntityTable,
    view::{View, ViewKey},
    PostId, UserId,
};

#[derive(Debug)]
pub(crate) struct AuthorSlot {
    pub(crate) user_id: UserId,
    pub(crate) view: View,
    pub(crate) pages: PageState,
}

/// Entity table plus the derived views over it. Passed by reference to
/// every consumer; there is no ambient global.
#[derive(Debug, Default)]
pub struct FeedCache {
    pub(crate) table: EntityTable,
    pub(crate) home: View,
    pub(crate) home_pages: PageState,
    pub(crate) author: Option<AuthorSlot>,
    epoch: u64,
}

impl FeedCache {
    /// An empty cache, as handed out at sign-in.
    pub fn new() -> Self {
        Self::default()
    }

    /// Epoch fence. Captured when a request starts; a response whose
    /// captured epoch no longer matches is dropped instead of merged.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn table(&self) -> &EntityTable {
        &self.table
    }

    // ***
    // Read selectors
    // ***

    pub fn post_by_id(&self, id: PostId) -> Option<&Post> {
        self.table.get(id)
    }

    /// The global feed, in view order. Ids in a view always resolve,
    /// so this never skips a row.
    pub fn feed_view(&self) -> Vec<&Post> {
        self.resolve(&self.home)
    }

    /// The per-author feed, if that author's view is currently
    /// mounted.
    pub fn author_view(&self, user_id: UserId) -> Option<Vec<&Post>> {
        let slot = self.author.as_ref().filter(|slot| slot.user_id == user_id)?;
        Some(self.resolve(&slot.view))
    }

    pub fn page_state(&self, key: ViewKey) -> Option<&PageState> {
        match key {
            ViewKey::Home => Some(&self.home_pages),
            ViewKey::Author(user_id) => self
                .author
                .as_ref()
                .filter(|slot| slot.user_id == user_id)
                .map(|slot| &slot.pages),
        }
    }

    /// Derived pagination status for a view: loading while a fetch is
    /// in flight, exhausted once the server said there is no more.
    pub fn pagination_status(&self, key: ViewKey) -> LoadPhase {
        match self.page_state(key) {
            Some(pages) if pages.in_flight() => LoadPhase::Loading,
            Some(pages) if pages.more().is_end() => LoadPhase::Exhausted,
            _ => LoadPhase::Idle,
        }
    }

    fn resolve(&self, view: &View) -> Vec<&Post> {
        view.ids()
            .iter()
            .filter_map(|id| self.table.get(*id))
            .collect()
    }

    // ***
    // Lifecycle
    // ***

    /// Point the author view at `user_id`. Navigating to a different
    /// author tears the old view down: fresh empty view, pagination
    /// back to page 1, and a new epoch so in-flight responses for the
    /// old author are ignored on arrival. Returns whether anything
    /// changed.
    pub fn set_author(&mut self, user_id: UserId) -> bool {
        if matches!(&self.author, Some(slot) if slot.user_id == user_id) {
            return false;
        }
        self.author = Some(AuthorSlot {
            user_id,
            view: View::new(),
            pages: PageState::new(),
        });
        self.bump_epoch();
        true
    }

    pub(crate) fn bump_epoch(&mut self) {
        self.epoch += 1;
    }

    /// Raise the in-flight guard for a view. Returns false when the
    /// view is not mounted or a load is already in flight, in which
    /// case nothing may be fetched.
    pub fn begin_load(&mut self, key: ViewKey) -> bool {
        match self.page_state_mut(key) {
            Some(pages) => pages.start_load(),
            None => false,
        }
    }

    /// Record a merged page result: cursor, more-flag, guard down.
    pub fn finish_load(&mut self, key: ViewKey, page: u32, more: MoreFlag) {
        if let Some(pages) = self.page_state_mut(key) {
            pages.finish_page(page, more);
        }
    }

    /// A fetch failed: drop the guard, touch nothing else, so the next
    /// user action can retry.
    pub fn fail_load(&mut self, key: ViewKey) {
        if let Some(pages) = self.page_state_mut(key) {
            pages.fail();
        }
    }

    /// Split borrow used by the merge engine: the table to sort
    /// against plus the view being rewritten. `None` when the keyed
    /// view is not mounted.
    pub(crate) fn table_and_view_mut(&mut self, key: ViewKey) -> Option<(&EntityTable, &mut View)> {
        match key {
            ViewKey::Home => Some((&self.table, &mut self.home)),
            ViewKey::Author(user_id) => self
                .author
                .as_mut()
                .filter(|slot| slot.user_id == user_id)
                .map(|slot| (&self.table, &mut slot.view)),
        }
    }

    pub(crate) fn page_state_mut(&mut self, key: ViewKey) -> Option<&mut PageState> {
        match key {
            ViewKey::Home => Some(&mut self.home_pages),
            ViewKey::Author(user_id) => self
                .author
                .as_mut()
                .filter(|slot| slot.user_id == user_id)
                .map(|slot| &mut slot.pages),
        }
    }
}
