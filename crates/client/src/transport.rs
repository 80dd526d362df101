//! The boundary to the network layer. Only the shapes cross it: the
//! real HTTP client lives elsewhere, everything here is payloads and
//! the `Transport` capability the store is generic over.

use chirp_core::{
    post::{Author, LikeOutcome, Post},
    PostId, UserId,
};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// One page of the global feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPage {
    pub items: Vec<Post>,
    /// The upstream encodes this boolean-like: sometimes `true`,
    /// sometimes `"true"`. Anything that is not false-like counts as
    /// more available.
    #[serde(deserialize_with = "bool_or_string", default)]
    pub more: bool,
    pub page: u32,
}

/// The complete feed of one author; the upstream does not paginate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorFeed {
    pub user: Author,
    pub items: Vec<Post>,
}

/// Acknowledgement of a deletion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Deleted {
    pub id: PostId,
}

fn bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => b,
        Raw::Text(s) => s != "false",
    })
}

/// Errors crossing the transport boundary, always handed back as data
/// so presentation decides what to show. The status class splits
/// recoverable problems (validation, 4xx) from generic failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Field-level messages from a 4xx validation response. State is
    /// left unchanged.
    #[error("{}", errors.join("; "))]
    Validation { errors: Vec<String> },
    /// Any other HTTP failure, classed by status code.
    #[error("Request failed with status {status}: {message}")]
    Http { status: u16, message: String },
    /// The request never completed.
    #[error("An error occurred. Please try again.")]
    Network,
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        ApiError::Http {
            status: 404,
            message: format!("{what} not found"),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            ApiError::Validation { .. } => true,
            ApiError::Http { status, .. } => *status < 500,
            ApiError::Network => false,
        }
    }

    /// Messages for presentation: field errors when recoverable, the
    /// generic retry message otherwise.
    pub fn messages(&self) -> Vec<String> {
        match self {
            ApiError::Validation { errors } => errors.clone(),
            ApiError::Http { status, message } if *status < 500 => vec![message.clone()],
            _ => vec!["An error occurred. Please try again.".into()],
        }
    }
}

/// Everything the store needs from the network. Implemented by the
/// real HTTP client and by `MockServer` for tests.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn fetch_feed_page(&self, page: u32, page_size: u32) -> Result<FeedPage, ApiError>;
    async fn fetch_author_feed(&self, user_id: UserId) -> Result<AuthorFeed, ApiError>;
    async fn fetch_post_detail(&self, id: PostId) -> Result<Post, ApiError>;
    async fn create_post(&self, content: &str) -> Result<Post, ApiError>;
    async fn update_post(&self, id: PostId, content: &str) -> Result<Post, ApiError>;
    async fn delete_post(&self, id: PostId) -> Result<Deleted, ApiError>;
    async fn toggle_like(&self, id: PostId) -> Result<LikeOutcome, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn more_accepts_bool_or_string() {
        let page: FeedPage =
            serde_json::from_str(r#"{"items": [], "more": true, "page": 1}"#).unwrap();
        assert!(page.more);

        let page: FeedPage =
            serde_json::from_str(r#"{"items": [], "more": "true", "page": 1}"#).unwrap();
        assert!(page.more);

        let page: FeedPage =
            serde_json::from_str(r#"{"items": [], "more": false, "page": 1}"#).unwrap();
        assert!(!page.more);

        let page: FeedPage =
            serde_json::from_str(r#"{"items": [], "more": "false", "page": 1}"#).unwrap();
        assert!(!page.more);

        // absent counts as no more, not a parse failure
        let page: FeedPage = serde_json::from_str(r#"{"items": [], "page": 1}"#).unwrap();
        assert!(!page.more);
    }

    #[test]
    fn status_class_drives_recoverability() {
        let err = ApiError::Validation { errors: vec!["Content is required".into()] };
        assert!(err.is_recoverable());
        assert_eq!(err.messages(), vec!["Content is required".to_string()]);

        let err = ApiError::not_found("Post");
        assert!(err.is_recoverable());

        let err = ApiError::Http { status: 500, message: "boom".into() };
        assert!(!err.is_recoverable());
        assert_eq!(err.messages(), vec!["An error occurred. Please try again.".to_string()]);

        assert!(!ApiError::Network.is_recoverable());
    }
}
