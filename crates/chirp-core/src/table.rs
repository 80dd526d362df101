//! The entity table: one canonical copy of every fetched post.

use crate::{post::Post, PostId};
use std::collections::HashMap;

/// Normalized store of posts keyed by identifier. Insertion order is
/// irrelevant; the views keep the ordering.
///
/// Invariant: at most one entry per identifier, and the most recently
/// ingested version of a post always wins.
#[derive(Debug, Default)]
pub struct EntityTable {
    posts: HashMap<PostId, Post>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite by identifier. Upserting an already-present
    /// identifier is success, not an error. Replies are re-sorted on
    /// the way in.
    pub fn upsert(&mut self, mut post: Post) {
        post.normalize();
        self.posts.insert(post.id(), post);
    }

    /// Delete the entry, returning it if it was present.
    pub fn remove(&mut self, id: PostId) -> Option<Post> {
        self.posts.remove(&id)
    }

    pub fn get(&self, id: PostId) -> Option<&Post> {
        self.posts.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: PostId) -> Option<&mut Post> {
        self.posts.get_mut(&id)
    }

    pub fn contains(&self, id: PostId) -> bool {
        self.posts.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn clear(&mut self) {
        self.posts.clear();
    }
}
