//! The store facade: the one object the rendering layer talks to.
//! Read selectors delegate to the cache; imperative intents run the
//! fetch-then-merge cycle against the transport.
//!
//! The store is owned by a single cooperative task. Every intent takes
//! `&mut self` and suspends only at transport awaits, so state updates
//! are discrete steps and the per-view in-flight flag is the only
//! re-entrancy guard needed.

use chirp_core::{
    cache::FeedCache,
    config::ChirpConfig,
    loader::{LoadController, LoadPhase, ProximityEvent},
    merge::StoreUpdate,
    pagination::{MoreFlag, PageState},
    post::{Author, Post},
    view::ViewKey,
    PostId, UserId,
};
use tokio::time::Instant;
use tracing::warn;

use crate::transport::{ApiError, Deleted, Transport};

pub struct Store<T: Transport> {
    cache: FeedCache,
    transport: T,
    user: Author,
    page_size: u32,
    home_loader: LoadController,
    author_loader: LoadController,
}

impl<T: Transport> Store<T> {
    pub fn new(user: Author, transport: T, config: &ChirpConfig) -> Self {
        Store {
            cache: FeedCache::new(),
            transport,
            user,
            page_size: config.page_size,
            home_loader: LoadController::new(config.cooldown()),
            author_loader: LoadController::new(config.cooldown()),
        }
    }

    // ***
    // Read selectors
    // ***

    pub fn cache(&self) -> &FeedCache {
        &self.cache
    }

    pub fn session_user(&self) -> &Author {
        &self.user
    }

    pub fn feed_view(&self) -> Vec<&Post> {
        self.cache.feed_view()
    }

    pub fn author_view(&self, user_id: UserId) -> Option<Vec<&Post>> {
        self.cache.author_view(user_id)
    }

    pub fn post_by_id(&self, id: PostId) -> Option<&Post> {
        self.cache.post_by_id(id)
    }

    pub fn pagination_status(&self, view: ViewKey) -> LoadPhase {
        self.cache.pagination_status(view)
    }

    // ***
    // Imperative intents
    // ***

    /// First full load of the global feed. A second call while one is
    /// in flight is a no-op.
    pub async fn initial_load(&mut self) -> Result<(), ApiError> {
        if self.home_pages().in_flight() {
            return Ok(());
        }
        self.home_loader.begin(Instant::now());
        self.fetch_home(1, true).await
    }

    /// Explicit refresh: re-fetch page 1 with replace semantics. The
    /// view keeps its current content until the response lands.
    pub async fn refresh(&mut self, view: ViewKey) -> Result<(), ApiError> {
        match view {
            ViewKey::Home => {
                if self.home_pages().in_flight() {
                    return Ok(());
                }
                self.home_loader.begin(Instant::now());
                self.fetch_home(1, true).await
            }
            ViewKey::Author(user_id) => self.open_author(user_id).await,
        }
    }

    /// Imperative "load more". Respects every controller guard except
    /// the genuine-scroll requirement, which only applies to viewport
    /// signals. Returns whether a request was actually issued.
    pub async fn load_next_page(&mut self, view: ViewKey) -> Result<bool, ApiError> {
        let now = Instant::now();
        let fired = match view {
            ViewKey::Home => match self.cache.page_state(view) {
                Some(pages) => self.home_loader.request(now, pages),
                None => false,
            },
            ViewKey::Author(_) => match self.cache.page_state(view) {
                Some(pages) => self.author_loader.request(now, pages),
                None => false,
            },
        };
        if !fired {
            return Ok(false);
        }
        self.fetch_next(view).await.map(|_| true)
    }

    /// Feed a proximity event into the controller for `view`, issuing
    /// a next-page request when the guards allow one. Returns whether
    /// a request was issued.
    pub async fn handle_proximity(
        &mut self,
        view: ViewKey,
        event: ProximityEvent,
    ) -> Result<bool, ApiError> {
        match event {
            ProximityEvent::Scrolled => {
                self.loader_mut(view).note_scroll();
                Ok(false)
            }
            ProximityEvent::NearEnd => {
                let now = Instant::now();
                let fired = match view {
                    ViewKey::Home => match self.cache.page_state(view) {
                        Some(pages) => self.home_loader.on_near(now, pages),
                        None => false,
                    },
                    ViewKey::Author(_) => match self.cache.page_state(view) {
                        Some(pages) => self.author_loader.on_near(now, pages),
                        None => false,
                    },
                };
                if !fired {
                    return Ok(false);
                }
                self.fetch_next(view).await.map(|_| true)
            }
        }
    }

    /// Mount the author view for `user_id` and load it. Switching to a
    /// different author resets the view, its pagination and the
    /// controller, and fences off any response still in flight for the
    /// old author.
    pub async fn open_author(&mut self, user_id: UserId) -> Result<(), ApiError> {
        if self.cache.set_author(user_id) {
            self.author_loader.reset();
        }
        let key = ViewKey::Author(user_id);
        if self.cache.page_state(key).map(PageState::in_flight).unwrap_or(false) {
            return Ok(());
        }
        self.author_loader.begin(Instant::now());
        self.fetch_author(user_id).await
    }

    /// Detail fetch: single-item ingestion, no view reshuffling.
    pub async fn open_post(&mut self, id: PostId) -> Result<(), ApiError> {
        let epoch = self.cache.epoch();
        let post = self.transport.fetch_post_detail(id).await?;
        self.cache.apply_at(epoch, StoreUpdate::Upsert { post });
        Ok(())
    }

    /// Create a post. The creation response enters the feed like a
    /// one-item page, so it sorts straight to the top.
    pub async fn submit_post(&mut self, content: &str) -> Result<PostId, ApiError> {
        let epoch = self.cache.epoch();
        let post = self.transport.create_post(content).await?;
        let id = post.id();
        let mine = ViewKey::Author(self.user.id);
        if self.cache.page_state(mine).is_some() {
            self.cache.apply_at(
                epoch,
                StoreUpdate::Append { view: mine, posts: vec![post.clone()] },
            );
        }
        self.cache
            .apply_at(epoch, StoreUpdate::Append { view: ViewKey::Home, posts: vec![post] });
        Ok(id)
    }

    /// Edit a post. The response replaces the cached entity wholesale;
    /// if the id was not cached yet it simply becomes a new entry.
    pub async fn submit_edit(&mut self, id: PostId, content: &str) -> Result<(), ApiError> {
        let epoch = self.cache.epoch();
        let post = self.transport.update_post(id, content).await?;
        self.cache.apply_at(epoch, StoreUpdate::Upsert { post });
        Ok(())
    }

    /// Delete a post everywhere: table and every view, one step.
    pub async fn submit_delete(&mut self, id: PostId) -> Result<(), ApiError> {
        let Deleted { id } = self.transport.delete_post(id).await?;
        self.cache.apply(StoreUpdate::Delete { id });
        Ok(())
    }

    /// Toggle the session user's like on a post, then re-fetch the
    /// post so the cached counters never drift from the server for
    /// longer than one round trip.
    pub async fn toggle_like(&mut self, id: PostId) -> Result<(), ApiError> {
        let epoch = self.cache.epoch();
        let outcome = self.transport.toggle_like(id).await?;
        self.cache.apply_at(epoch, StoreUpdate::ToggleLike { id, outcome });

        let post = self.transport.fetch_post_detail(id).await?;
        self.cache.apply_at(epoch, StoreUpdate::Upsert { post });
        Ok(())
    }

    // ***
    // Helpers
    // ***

    fn home_pages(&self) -> &PageState {
        self.cache.page_state(ViewKey::Home).expect("home view is always mounted")
    }

    fn loader_mut(&mut self, view: ViewKey) -> &mut LoadController {
        match view {
            ViewKey::Home => &mut self.home_loader,
            ViewKey::Author(_) => &mut self.author_loader,
        }
    }

    /// Controller already in `Loading`; run the actual next-page fetch.
    async fn fetch_next(&mut self, view: ViewKey) -> Result<(), ApiError> {
        match view {
            ViewKey::Home => {
                let next = self.home_pages().page() + 1;
                self.fetch_home(next, false).await
            }
            // The author feed arrives whole, so there is never a next
            // page to fetch; the guards keep this arm unreachable.
            ViewKey::Author(_) => {
                self.author_loader.fail();
                Ok(())
            }
        }
    }

    /// Fetch one page of the global feed and merge it. The home view
    /// lives as long as the session, so its merges are not epoch
    /// fenced; the in-flight guard already serializes them.
    async fn fetch_home(&mut self, page: u32, replace: bool) -> Result<(), ApiError> {
        if !self.cache.begin_load(ViewKey::Home) {
            return Ok(());
        }

        match self.transport.fetch_feed_page(page, self.page_size).await {
            Ok(fetched) => {
                let more = MoreFlag::from_wire(fetched.more);
                let update = if replace {
                    StoreUpdate::Replace { view: ViewKey::Home, posts: fetched.items }
                } else {
                    StoreUpdate::Append { view: ViewKey::Home, posts: fetched.items }
                };
                self.cache.apply(update);
                self.cache.finish_load(ViewKey::Home, fetched.page, more);
                self.home_loader.finish(more);
                Ok(())
            }
            Err(err) => {
                self.cache.fail_load(ViewKey::Home);
                self.home_loader.fail();
                warn!(%err, page, "feed page fetch failed");
                Err(err)
            }
        }
    }

    /// Fetch the whole author feed and replace the author view with
    /// it. Epoch fenced: if the user navigated to a different author
    /// while this was in flight, the response is dropped.
    async fn fetch_author(&mut self, user_id: UserId) -> Result<(), ApiError> {
        let key = ViewKey::Author(user_id);
        if !self.cache.begin_load(key) {
            return Ok(());
        }
        let epoch = self.cache.epoch();

        match self.transport.fetch_author_feed(user_id).await {
            Ok(feed) => {
                // the upstream returns the whole author feed at once
                if self
                    .cache
                    .apply_at(epoch, StoreUpdate::Replace { view: key, posts: feed.items })
                {
                    self.cache.finish_load(key, 1, MoreFlag::End);
                    self.author_loader.finish(MoreFlag::End);
                }
                Ok(())
            }
            Err(err) => {
                self.cache.fail_load(key);
                self.author_loader.fail();
                warn!(%err, user_id, "author feed fetch failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockServer;
    use std::time::Duration;

    fn me() -> Author {
        Author {
            id: 1,
            username: "me".into(),
            display_name: "ME".into(),
            avatar: None,
        }
    }

    fn config(page_size: u32) -> ChirpConfig {
        let mut config = ChirpConfig::default();
        config.page_size = page_size;
        config
    }

    fn post_by(author: &Author, id: PostId, created_at: u64, content: &str) -> Post {
        let mut post = Post::new(id, author.clone(), content.to_string()).unwrap();
        post.created_at = created_at;
        post
    }

    fn store_over(server: MockServer, page_size: u32) -> Store<MockServer> {
        Store::new(me(), server, &config(page_size))
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_pages_merge_without_duplicates() {
        let server = MockServer::seeded(me(), 20);
        let mut store = store_over(server, 10);

        store.initial_load().await.unwrap();
        assert_eq!(store.feed_view().len(), 10);
        let pages = store.cache().page_state(ViewKey::Home).unwrap();
        assert_eq!(pages.page(), 1);
        assert!(pages.more().is_more());

        // two new posts land upstream, shifting page 2 so it overlaps
        // with two posts the client already has
        let now = 4_000_000_000u64;
        let ada = Author { id: 2, username: "ada".into(), display_name: "ADA".into(), avatar: None };
        store.transport.push_post(post_by(&ada, 900, now, "fresh one"));
        store.transport.push_post(post_by(&ada, 901, now + 1, "fresh two"));

        tokio::time::advance(Duration::from_millis(1100)).await;
        assert!(store.load_next_page(ViewKey::Home).await.unwrap());

        let feed = store.feed_view();
        assert_eq!(feed.len(), 18);
        for pair in feed.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }
        let pages = store.cache().page_state(ViewKey::Home).unwrap();
        assert_eq!(pages.page(), 2);
        assert!(pages.more().is_more());
        assert_eq!(store.pagination_status(ViewKey::Home), LoadPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_proximity_signals_issue_one_request() {
        let server = MockServer::seeded(me(), 30);
        let mut store = store_over(server, 10);

        store.initial_load().await.unwrap();
        store.handle_proximity(ViewKey::Home, ProximityEvent::Scrolled).await.unwrap();

        tokio::time::advance(Duration::from_millis(1100)).await;
        let first = store.handle_proximity(ViewKey::Home, ProximityEvent::NearEnd).await.unwrap();
        tokio::time::advance(Duration::from_millis(200)).await;
        let second = store.handle_proximity(ViewKey::Home, ProximityEvent::NearEnd).await.unwrap();

        assert!(first);
        assert!(!second);
        // initial load + exactly one next page
        assert_eq!(store.transport.feed_requests(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn proximity_without_scroll_never_fires() {
        let server = MockServer::seeded(me(), 30);
        let mut store = store_over(server, 10);
        store.initial_load().await.unwrap();

        tokio::time::advance(Duration::from_millis(1100)).await;
        let fired = store.handle_proximity(ViewKey::Home, ProximityEvent::NearEnd).await.unwrap();
        assert!(!fired);
        assert_eq!(store.transport.feed_requests(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn scrolling_to_the_end_exhausts_the_feed() {
        let server = MockServer::seeded(me(), 25);
        let mut store = store_over(server, 10);

        store.initial_load().await.unwrap();
        store.handle_proximity(ViewKey::Home, ProximityEvent::Scrolled).await.unwrap();

        loop {
            tokio::time::advance(Duration::from_millis(1100)).await;
            if !store.handle_proximity(ViewKey::Home, ProximityEvent::NearEnd).await.unwrap() {
                break;
            }
        }

        assert_eq!(store.feed_view().len(), 25);
        assert_eq!(store.pagination_status(ViewKey::Home), LoadPhase::Exhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_page_load_degrades_to_idle_and_retries() {
        let server = MockServer::seeded(me(), 30);
        let mut store = store_over(server, 10);

        store.initial_load().await.unwrap();
        let before: Vec<PostId> = store.feed_view().iter().map(|p| p.id()).collect();

        store.transport.fail_next(ApiError::Http { status: 503, message: "unavailable".into() });
        tokio::time::advance(Duration::from_millis(1100)).await;
        let err = store.load_next_page(ViewKey::Home).await.unwrap_err();
        assert!(!err.is_recoverable());

        // content untouched, guard cleared, phase back to idle
        let after: Vec<PostId> = store.feed_view().iter().map(|p| p.id()).collect();
        assert_eq!(before, after);
        let pages = store.cache().page_state(ViewKey::Home).unwrap();
        assert_eq!(pages.page(), 1);
        assert!(!pages.in_flight());
        assert_eq!(store.pagination_status(ViewKey::Home), LoadPhase::Idle);

        // the next user-driven attempt succeeds
        tokio::time::advance(Duration::from_millis(1100)).await;
        assert!(store.load_next_page(ViewKey::Home).await.unwrap());
        assert_eq!(store.feed_view().len(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_replaces_the_view_with_page_one() {
        let server = MockServer::seeded(me(), 30);
        let mut store = store_over(server, 10);

        store.initial_load().await.unwrap();
        tokio::time::advance(Duration::from_millis(1100)).await;
        store.load_next_page(ViewKey::Home).await.unwrap();
        assert_eq!(store.feed_view().len(), 20);

        store.refresh(ViewKey::Home).await.unwrap();
        assert_eq!(store.feed_view().len(), 10);
        let pages = store.cache().page_state(ViewKey::Home).unwrap();
        assert_eq!(pages.page(), 1);
        assert!(pages.more().is_more());
    }

    #[tokio::test]
    async fn deletion_reaches_every_view() {
        let server = MockServer::new(me());
        let ada = Author { id: 2, username: "ada".into(), display_name: "ADA".into(), avatar: None };
        server.push_post(post_by(&ada, 42, 1_000, "doomed"));
        server.push_post(post_by(&ada, 43, 2_000, "kept"));
        let mut store = store_over(server, 10);

        store.initial_load().await.unwrap();
        store.open_author(2).await.unwrap();
        assert!(store.feed_view().iter().any(|p| p.id() == 42));
        assert!(store.author_view(2).unwrap().iter().any(|p| p.id() == 42));

        store.submit_delete(42).await.unwrap();

        assert!(store.post_by_id(42).is_none());
        assert!(!store.feed_view().iter().any(|p| p.id() == 42));
        assert!(!store.author_view(2).unwrap().iter().any(|p| p.id() == 42));
    }

    #[tokio::test]
    async fn like_toggle_updates_counter_but_not_order() {
        let server = MockServer::seeded(me(), 5);
        let mut store = store_over(server, 10);
        store.initial_load().await.unwrap();

        let order_before: Vec<PostId> = store.feed_view().iter().map(|p| p.id()).collect();
        let target = order_before[2];
        let baseline = store.post_by_id(target).unwrap().like_count();

        store.toggle_like(target).await.unwrap();
        assert_eq!(store.post_by_id(target).unwrap().like_count(), baseline + 1);
        assert!(store.post_by_id(target).unwrap().liked_by(1).is_some());

        store.toggle_like(target).await.unwrap();
        assert_eq!(store.post_by_id(target).unwrap().like_count(), baseline);

        let order_after: Vec<PostId> = store.feed_view().iter().map(|p| p.id()).collect();
        assert_eq!(order_before, order_after);
    }

    #[tokio::test]
    async fn created_post_sorts_to_the_top() {
        let server = MockServer::seeded(me(), 5);
        let mut store = store_over(server, 10);
        store.initial_load().await.unwrap();

        let id = store.submit_post("hello feed").await.unwrap();
        assert_eq!(store.feed_view().first().unwrap().id(), id);
        assert_eq!(store.feed_view().len(), 6);
    }

    #[tokio::test]
    async fn rejected_post_leaves_state_unchanged() {
        let server = MockServer::seeded(me(), 5);
        let mut store = store_over(server, 10);
        store.initial_load().await.unwrap();

        let err = store.submit_post("").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));
        assert_eq!(store.feed_view().len(), 5);
    }

    #[tokio::test]
    async fn detail_fetch_fills_a_cache_miss() {
        let server = MockServer::seeded(me(), 15);
        let mut store = store_over(server, 10);
        store.initial_load().await.unwrap();

        // an id from page 2, never loaded into any view
        let unseen = {
            let page = store.transport.fetch_feed_page(2, 10).await.unwrap();
            page.items.first().unwrap().id()
        };
        assert!(store.post_by_id(unseen).is_none());

        store.open_post(unseen).await.unwrap();
        assert!(store.post_by_id(unseen).is_some());
        // still only page 1 in the view
        assert_eq!(store.feed_view().len(), 10);
    }

    #[tokio::test]
    async fn switching_author_resets_the_author_view() {
        let server = MockServer::new(me());
        let ada = Author { id: 2, username: "ada".into(), display_name: "ADA".into(), avatar: None };
        let lin = Author { id: 3, username: "lin".into(), display_name: "LIN".into(), avatar: None };
        server.push_post(post_by(&ada, 1, 1_000, "by ada"));
        server.push_post(post_by(&lin, 2, 2_000, "by lin"));
        let mut store = store_over(server, 10);

        store.open_author(2).await.unwrap();
        assert_eq!(store.author_view(2).unwrap().len(), 1);
        assert_eq!(store.pagination_status(ViewKey::Author(2)), LoadPhase::Exhausted);

        store.open_author(3).await.unwrap();
        assert!(store.author_view(2).is_none());
        assert_eq!(store.author_view(3).unwrap().len(), 1);
    }
}
