//! The merge engine: every way fetched data enters the cache is one
//! variant of a closed sum type, handled by one exhaustive match.

use crate::{
    cache::FeedCache,
    post::{LikeOutcome, Post},
    view::ViewKey,
    PostId,
};
use tracing::debug;

/// The closed set of update operations the cache understands.
#[derive(Debug, Clone)]
pub enum StoreUpdate {
    /// First page of a fresh query, or an explicit refresh: the target
    /// view is rebuilt from exactly these posts.
    Replace { view: ViewKey, posts: Vec<Post> },
    /// A subsequent page: novel identifiers join the view, duplicates
    /// still refresh the entity table.
    Append { view: ViewKey, posts: Vec<Post> },
    /// Single-post ingestion (detail fetch, mutation result). Views
    /// are left structurally unchanged so a like or edit on a visible
    /// post never reshuffles the list under the user.
    Upsert { post: Post },
    /// Remove the post from the table and from every view that
    /// references it, in one step.
    Delete { id: PostId },
    /// Apply a server-confirmed like toggle to the cached post.
    ToggleLike { id: PostId, outcome: LikeOutcome },
}

impl FeedCache {
    /// Apply one update as a single, non-interruptible state
    /// transition. Readers never see a half-merged cache.
    pub fn apply(&mut self, update: StoreUpdate) {
        match update {
            StoreUpdate::Replace { view, posts } => {
                let ids: Vec<PostId> = posts.iter().map(|post| post.id()).collect();
                debug!(?view, count = ids.len(), "replace view");
                for post in posts {
                    self.table.upsert(post);
                }
                if let Some((table, target)) = self.table_and_view_mut(view) {
                    target.replace(table, ids);
                }
            }

            StoreUpdate::Append { view, posts } => {
                // Duplicates are upserted too: an overlapping page may
                // carry fresher engagement counters.
                let ids: Vec<PostId> = posts.iter().map(|post| post.id()).collect();
                debug!(?view, count = ids.len(), "append to view");
                for post in posts {
                    self.table.upsert(post);
                }
                if let Some((table, target)) = self.table_and_view_mut(view) {
                    target.append(table, ids);
                }
            }

            StoreUpdate::Upsert { post } => {
                debug!(id = post.id(), "upsert single post");
                self.table.upsert(post);
            }

            StoreUpdate::Delete { id } => {
                debug!(id, "delete post");
                self.table.remove(id);
                self.home.remove(id);
                if let Some(slot) = &mut self.author {
                    slot.view.remove(id);
                }
            }

            StoreUpdate::ToggleLike { id, outcome } => match self.table.get_mut(id) {
                Some(post) => match outcome {
                    LikeOutcome::Added(like) => post.apply_like(like),
                    LikeOutcome::Removed(like_id) => post.remove_like(like_id),
                },
                // Cache miss: the follow-up detail fetch upserts the
                // authoritative copy.
                None => debug!(id, "like toggle for unknown post"),
            },
        }
    }

    /// Epoch-fenced apply: merges only if `epoch` still matches, i.e.
    /// the owning view was not torn down while the request was in
    /// flight. Returns whether the update was applied.
    pub fn apply_at(&mut self, epoch: u64, update: StoreUpdate) -> bool {
        if epoch != self.epoch() {
            debug!(captured = epoch, current = self.epoch(), "stale response ignored");
            return false;
        }
        self.apply(update);
        true
    }
}
