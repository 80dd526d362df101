//! Ordered views over the entity table.

use crate::{table::EntityTable, PostId, UserId};
use std::collections::HashSet;

/// Names one of the concurrently maintained feed listings. Single-post
/// lookups go straight to the entity table and need no view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ViewKey {
    Home,
    Author(UserId),
}

/// An ordered, deduplicated sequence of post identifiers. Every id in
/// a view resolves in the entity table; a view never holds a dangling
/// reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct View {
    ids: Vec<PostId>,
}

impl View {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &[PostId] {
        &self.ids
    }

    pub fn contains(&self, id: PostId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drop one identifier, keeping the rest in order.
    pub(crate) fn remove(&mut self, id: PostId) {
        self.ids.retain(|existing| *existing != id);
    }

    /// Replace the whole view with the assembled candidates.
    pub(crate) fn replace(&mut self, table: &EntityTable, candidates: Vec<PostId>) {
        self.ids = assemble(table, candidates);
    }

    /// Keep the current content, add the novel candidates, and re-sort
    /// the whole view. Sorting everything (not just the appended tail)
    /// keeps interleavings from concurrent single-post refreshes in
    /// the right place.
    pub(crate) fn append(&mut self, table: &EntityTable, candidates: Vec<PostId>) {
        let mut merged = std::mem::take(&mut self.ids);
        merged.extend(candidates);
        self.ids = assemble(table, merged);
    }
}

/// Produce a deduplicated sequence ordered newest-first (ties broken
/// by id descending). Candidates that do not resolve in the table are
/// dropped rather than left dangling.
fn assemble(table: &EntityTable, candidates: Vec<PostId>) -> Vec<PostId> {
    let mut seen: HashSet<PostId> = HashSet::with_capacity(candidates.len());
    let mut ids: Vec<PostId> = candidates
        .into_iter()
        .filter(|id| table.contains(*id) && seen.insert(*id))
        .collect();
    ids.sort_by(|a, b| {
        let a = table.get(*a).expect("assembled ids resolve");
        let b = table.get(*b).expect("assembled ids resolve");
        a.feed_ordering(b)
    });
    ids
}
