//! An in-memory stand-in for the real API server. Honest paging over
//! a sorted fixture feed, plus scriptable failure injection, so the
//! whole store can be exercised without a network.

use crate::transport::{ApiError, AuthorFeed, Deleted, FeedPage, Transport};
use chirp_core::{
    post::{Author, Like, LikeOutcome, Post},
    LikeId, PostId, UserId,
};
use rand::{thread_rng, Rng};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

pub struct MockServer {
    inner: Mutex<Inner>,
}

struct Inner {
    session_user: Author,
    /// Kept sorted newest-first, like the real feed endpoint.
    posts: Vec<Post>,
    next_post_id: PostId,
    next_like_id: LikeId,
    fail_next: Option<ApiError>,
    feed_requests: u32,
}

impl MockServer {
    pub fn new(session_user: Author) -> Self {
        MockServer {
            inner: Mutex::new(Inner {
                session_user,
                posts: Vec::new(),
                next_post_id: 1,
                next_like_id: 1,
                fail_next: None,
                feed_requests: 0,
            }),
        }
    }

    /// A server with `count` posts from a small pool of authors, with
    /// strictly descending timestamps and random gaps between them.
    pub fn seeded(session_user: Author, count: usize) -> Self {
        let server = Self::new(session_user);
        {
            let mut inner = server.lock();
            let pool = [
                (2, "ada"),
                (3, "lin"),
                (4, "kit"),
            ];
            let mut created_at = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock before unix epoch")
                .as_secs();
            let mut rng = thread_rng();
            for n in 0..count {
                let (author_id, username) = pool[n % pool.len()];
                let author = Author {
                    id: author_id,
                    username: username.into(),
                    display_name: username.to_uppercase(),
                    avatar: None,
                };
                let id = inner.next_post_id;
                inner.next_post_id += 1;
                let mut post =
                    Post::new(id, author, format!("chirp #{id} from @{username}")).unwrap();
                created_at -= rng.gen_range(30..=3600);
                post.created_at = created_at;
                inner.posts.push(post);
            }
        }
        server
    }

    /// Add a fixture post directly, keeping the feed sorted.
    pub fn push_post(&self, post: Post) {
        let mut inner = self.lock();
        inner.posts.push(post);
        inner.posts.sort_by(|a, b| a.feed_ordering(b));
        if let Some(max) = inner.posts.iter().map(|p| p.id()).max() {
            inner.next_post_id = inner.next_post_id.max(max + 1);
        }
    }

    /// Make the next request fail with `err`.
    pub fn fail_next(&self, err: ApiError) {
        self.lock().fail_next = Some(err);
    }

    /// How many feed-page requests the server has seen.
    pub fn feed_requests(&self) -> u32 {
        self.lock().feed_requests
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("mock server lock poisoned")
    }
}

impl Inner {
    fn take_failure(&mut self) -> Result<(), ApiError> {
        match self.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn find_mut(&mut self, id: PostId) -> Result<&mut Post, ApiError> {
        self.posts
            .iter_mut()
            .find(|post| post.id() == id)
            .ok_or_else(|| ApiError::not_found("Post"))
    }
}

impl Transport for MockServer {
    async fn fetch_feed_page(&self, page: u32, page_size: u32) -> Result<FeedPage, ApiError> {
        let mut inner = self.lock();
        inner.take_failure()?;
        inner.feed_requests += 1;

        let start = (page.saturating_sub(1) as usize) * page_size as usize;
        let items: Vec<Post> = inner
            .posts
            .iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect();
        let more = start + items.len() < inner.posts.len();
        Ok(FeedPage { items, more, page })
    }

    async fn fetch_author_feed(&self, user_id: UserId) -> Result<AuthorFeed, ApiError> {
        let mut inner = self.lock();
        inner.take_failure()?;

        let items: Vec<Post> = inner
            .posts
            .iter()
            .filter(|post| post.author.id == user_id)
            .cloned()
            .collect();
        let user = items
            .first()
            .map(|post| post.author.clone())
            .or_else(|| (inner.session_user.id == user_id).then(|| inner.session_user.clone()))
            .ok_or_else(|| ApiError::not_found("Author"))?;
        Ok(AuthorFeed { user, items })
    }

    async fn fetch_post_detail(&self, id: PostId) -> Result<Post, ApiError> {
        let mut inner = self.lock();
        inner.take_failure()?;
        inner.find_mut(id).map(|post| post.clone())
    }

    async fn create_post(&self, content: &str) -> Result<Post, ApiError> {
        let mut inner = self.lock();
        inner.take_failure()?;

        let id = inner.next_post_id;
        let author = inner.session_user.clone();
        let post = Post::new(id, author, content.to_string())
            .map_err(|e| ApiError::Validation { errors: vec![e.to_string()] })?;
        inner.next_post_id += 1;
        inner.posts.push(post.clone());
        inner.posts.sort_by(|a, b| a.feed_ordering(b));
        Ok(post)
    }

    async fn update_post(&self, id: PostId, content: &str) -> Result<Post, ApiError> {
        let mut inner = self.lock();
        inner.take_failure()?;

        let post = inner.find_mut(id)?;
        post.update_content(content.to_string())
            .map_err(|e| ApiError::Validation { errors: vec![e.to_string()] })?;
        Ok(post.clone())
    }

    async fn delete_post(&self, id: PostId) -> Result<Deleted, ApiError> {
        let mut inner = self.lock();
        inner.take_failure()?;

        let idx = inner
            .posts
            .iter()
            .position(|post| post.id() == id)
            .ok_or_else(|| ApiError::not_found("Post"))?;
        inner.posts.remove(idx);
        Ok(Deleted { id })
    }

    async fn toggle_like(&self, id: PostId) -> Result<LikeOutcome, ApiError> {
        let mut inner = self.lock();
        inner.take_failure()?;

        let user_id = inner.session_user.id;
        let next_like_id = inner.next_like_id;
        let post = inner.find_mut(id)?;
        match post.liked_by(user_id) {
            Some(like) => {
                let like_id = like.id;
                post.remove_like(like_id);
                Ok(LikeOutcome::Removed(like_id))
            }
            None => {
                let like = Like { id: next_like_id, user_id };
                post.apply_like(like.clone());
                inner.next_like_id += 1;
                Ok(LikeOutcome::Added(like))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn me() -> Author {
        Author {
            id: 1,
            username: "me".into(),
            display_name: "ME".into(),
            avatar: None,
        }
    }

    #[tokio::test]
    async fn paging_is_honest_about_the_end() {
        let server = MockServer::seeded(me(), 45);

        let page = server.fetch_feed_page(1, 20).await.unwrap();
        assert_eq!(page.items.len(), 20);
        assert!(page.more);

        let page = server.fetch_feed_page(3, 20).await.unwrap();
        assert_eq!(page.items.len(), 5);
        assert!(!page.more);

        assert_eq!(server.feed_requests(), 2);
    }

    #[tokio::test]
    async fn seeded_feed_is_sorted_descending() {
        let server = MockServer::seeded(me(), 20);
        let page = server.fetch_feed_page(1, 20).await.unwrap();
        for pair in page.items.windows(2) {
            assert!(pair[0].created_at > pair[1].created_at);
        }
    }

    #[tokio::test]
    async fn like_toggle_round_trips() {
        let server = MockServer::seeded(me(), 3);

        let outcome = server.toggle_like(1).await.unwrap();
        let like_id = match outcome {
            LikeOutcome::Added(like) => {
                assert_eq!(like.user_id, 1);
                like.id
            }
            LikeOutcome::Removed(_) => panic!("first toggle must add"),
        };

        let outcome = server.toggle_like(1).await.unwrap();
        assert_eq!(outcome, LikeOutcome::Removed(like_id));
        assert_eq!(server.fetch_post_detail(1).await.unwrap().like_count(), 0);
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let server = MockServer::seeded(me(), 3);
        server.fail_next(ApiError::Network);

        assert!(server.fetch_feed_page(1, 20).await.is_err());
        assert!(server.fetch_feed_page(1, 20).await.is_ok());
    }

    #[tokio::test]
    async fn empty_content_is_a_validation_error() {
        let server = MockServer::new(me());
        let err = server.create_post("").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));
    }
}
