//! This module defines the `Post` struct, the single entity everything
//! else in the cache derives from.

use crate::{constant, AttachmentId, ChirpError, ChirpResult, LikeId, PostId, ReplyId, UserId};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::time::SystemTime;
use textwrap::core::display_width;
use textwrap::{self, wrap};

/// The author fields embedded in every fetched post and reply.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Author {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub avatar: Option<String>,
}

/// An image attached to a post or a reply.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub url: String,
}

/// One like on a post, as returned by the server. The entry whose
/// `user_id` matches the session user is what makes an instant
/// un-like possible without another round trip.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Like {
    pub id: LikeId,
    pub user_id: UserId,
}

/// Result of toggling a like server-side: either the freshly created
/// record or the identifier of the record that was removed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LikeOutcome {
    Added(Like),
    Removed(LikeId),
}

/// A reply has the same shape as a post, minus nested replies.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Reply {
    pub id: ReplyId,
    pub author: Author,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub created_at: u64,
    pub likes: Vec<Like>,
}

/// Every post fetched from the server lands in this struct. A post is
/// always replaced wholesale on update, never patched field by field,
/// so a stale copy can never shine through a fresher one.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Post {
    id: PostId,
    pub author: Author,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub created_at: u64,
    pub likes: Vec<Like>,
    pub replies: Vec<Reply>,
}

impl Post {
    /// Create a new post with the given `author` and `content` body.
    pub fn new(id: PostId, author: Author, content: String) -> ChirpResult<Self> {
        verify_content(&content)?;
        Ok(Post {
            id,
            author,
            content,
            attachments: Vec::new(),
            created_at: time_in_sec(SystemTime::now())?,
            likes: Vec::new(),
            replies: Vec::new(),
        })
    }

    /// Update the body of an existing post.
    pub fn update_content(&mut self, new_content: String) -> ChirpResult<()> {
        verify_content(&new_content)?;
        self.content = new_content;
        Ok(())
    }

    pub fn id(&self) -> PostId {
        self.id
    }

    pub fn like_count(&self) -> usize {
        self.likes.len()
    }

    pub fn reply_count(&self) -> usize {
        self.replies.len()
    }

    /// The like record the given user holds on this post, if any.
    pub fn liked_by(&self, user_id: UserId) -> Option<&Like> {
        self.likes.iter().find(|like| like.user_id == user_id)
    }

    /// Record a like. Liking is idempotent per user: a second like by
    /// the same user leaves the post untouched.
    pub fn apply_like(&mut self, like: Like) {
        if self.liked_by(like.user_id).is_none() {
            self.likes.push(like);
        }
    }

    /// Drop the like with the given record id, if present.
    pub fn remove_like(&mut self, like_id: LikeId) {
        self.likes.retain(|like| like.id != like_id);
    }

    /// Sort key for feed ordering: newest first, ties broken by id
    /// descending so the order is deterministic.
    pub fn feed_ordering(&self, other: &Self) -> Ordering {
        (other.created_at, other.id).cmp(&(self.created_at, self.id))
    }

    /// Re-sort the embedded reply list newest-first. Applied on every
    /// ingestion into the entity table so nested order never depends
    /// on what the server happened to send.
    pub(crate) fn normalize(&mut self) {
        self.replies
            .sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
    }
}

pub(crate) fn time_in_sec(time: SystemTime) -> ChirpResult<u64> {
    Ok(time.duration_since(std::time::UNIX_EPOCH)?.as_secs())
}

/// Some necessary checks for a post's body.
fn verify_content(content: &str) -> ChirpResult<()> {
    if content.is_empty() {
        return Err(ChirpError::EmptyPost.into());
    }
    if content.len() > constant::MAX_POST_LEN as usize {
        return Err(ChirpError::InvalidPostLength {
            max_size: constant::MAX_POST_LEN as usize,
            curr_size: content.len(),
        }
        .into());
    }
    Ok(())
}

impl Display for Post {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:-<54}\n", "")?;
        write!(f, "\\ {:^50} /\n/ {:50} \\\n", format!("@{}", self.author.username), "")?;
        let mut count = 0u8;
        let content_width = 50;
        let wrapping_config = textwrap::Options::new(content_width).break_words(true);
        for line in wrap(&format!("{}\n", self.content), wrapping_config) {
            let (left_closure, right_closure) = if count % 2 == 0 {
                ("\\ ", " /")
            } else {
                ("/ ", " \\")
            };
            let text_width = display_width(&line);
            let whitespace = if content_width >= text_width {
                content_width - text_width
            } else {
                0
            };
            write!(
                f,
                "{left_closure}{}{}{right_closure}\n",
                line,
                " ".repeat(whitespace)
            )?;
            count += 1;
        }
        write!(
            f,
            "\\ {:<50} /\n{:-<54}",
            format!("♥ {}  ↩ {}", self.like_count(), self.reply_count()),
            ""
        )
    }
}
