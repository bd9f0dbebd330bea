//! Post comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::user::UserBrief;

/// Minimum comment length in characters
pub const COMMENT_MIN_CHARS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    /// Reply target; replies are removed together with their parent
    pub parent_id: Option<i64>,
    pub content: String,
    pub likes_count: i64,
    /// Unapproved comments are hidden and not counted
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(post_id: i64, author_id: i64, parent_id: Option<i64>, content: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            post_id,
            author_id,
            parent_id,
            content,
            likes_count: 0,
            is_approved: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// Comment with its author and approved replies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: UserBrief,
    pub replies: Vec<CommentView>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentInput {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

impl CreateCommentInput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            parent_id: None,
        }
    }

    pub fn reply_to(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// Arrange flat comments (oldest first) into root threads
///
/// Replies whose parent is absent from `comments` are dropped.
pub fn build_threads(comments: Vec<CommentView>) -> Vec<CommentView> {
    let mut children: HashMap<Option<i64>, Vec<CommentView>> = HashMap::new();
    for comment in comments {
        children
            .entry(comment.comment.parent_id)
            .or_default()
            .push(comment);
    }
    take_children(None, &mut children)
}

fn take_children(
    parent: Option<i64>,
    children: &mut HashMap<Option<i64>, Vec<CommentView>>,
) -> Vec<CommentView> {
    let mut nodes = children.remove(&parent).unwrap_or_default();
    for node in nodes.iter_mut() {
        node.replies = take_children(Some(node.comment.id), children);
    }
    nodes
}
