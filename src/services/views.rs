//! Card assembly shared by the blog and archive services
//!
//! Listings return posts and files together with their author, category and
//! tags. [`ContentViews`] batches those lookups so a page of N items costs a
//! fixed number of queries.

use crate::db::repositories::{
    CategoryRepository, ProfileRepository, TagLink, TagRepository, UserRepository,
};
use crate::models::{
    ArchiveFile, CategoryBrief, Comment, CommentView, FileComment, FileCommentView, FileView,
    Post, PostView, UserBrief,
};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

pub struct ContentViews {
    users: Arc<dyn UserRepository>,
    profiles: Arc<dyn ProfileRepository>,
    categories: Arc<dyn CategoryRepository>,
    file_categories: Arc<dyn CategoryRepository>,
    tags: Arc<dyn TagRepository>,
}

impl ContentViews {
    pub fn new(
        users: Arc<dyn UserRepository>,
        profiles: Arc<dyn ProfileRepository>,
        categories: Arc<dyn CategoryRepository>,
        file_categories: Arc<dyn CategoryRepository>,
        tags: Arc<dyn TagRepository>,
    ) -> Self {
        Self {
            users,
            profiles,
            categories,
            file_categories,
            tags,
        }
    }

    /// Author cards keyed by user id, avatars included
    pub async fn user_briefs(&self, ids: &[i64]) -> Result<HashMap<i64, UserBrief>> {
        let ids = unique(ids.iter().copied());
        let users = self.users.get_by_ids(&ids).await?;
        let avatars = self.profiles.avatars(&ids).await?;

        Ok(users
            .iter()
            .map(|user| {
                let mut brief = UserBrief::from(user);
                if let Some(avatar) = avatars.get(&user.id) {
                    brief.avatar = avatar.clone();
                }
                (user.id, brief)
            })
            .collect())
    }

    pub async fn user_brief(&self, id: i64) -> Result<UserBrief> {
        let mut briefs = self.user_briefs(&[id]).await?;
        Ok(briefs.remove(&id).unwrap_or_else(|| missing_user(id)))
    }

    pub async fn post_views(&self, posts: Vec<Post>) -> Result<Vec<PostView>> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }
        let post_ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        let authors = self
            .user_briefs(&posts.iter().map(|p| p.author_id).collect::<Vec<_>>())
            .await?;
        let category_ids = unique(posts.iter().filter_map(|p| p.category_id));
        let categories: HashMap<i64, CategoryBrief> = self
            .categories
            .get_by_ids(&category_ids)
            .await?
            .iter()
            .map(|c| (c.id, CategoryBrief::from(c)))
            .collect();
        let mut tags = self.tags.get_linked_many(TagLink::Post, &post_ids).await?;

        Ok(posts
            .into_iter()
            .map(|post| PostView {
                author: authors
                    .get(&post.author_id)
                    .cloned()
                    .unwrap_or_else(|| missing_user(post.author_id)),
                category: post.category_id.and_then(|id| categories.get(&id).cloned()),
                tag_list: tags.remove(&post.id).unwrap_or_default(),
                post,
            })
            .collect())
    }

    pub async fn post_view(&self, post: Post) -> Result<PostView> {
        let id = post.id;
        self.post_views(vec![post])
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Post {} vanished while building its card", id))
    }

    pub async fn file_views(&self, files: Vec<ArchiveFile>) -> Result<Vec<FileView>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let file_ids: Vec<i64> = files.iter().map(|f| f.id).collect();
        let uploaders = self
            .user_briefs(&files.iter().map(|f| f.uploaded_by).collect::<Vec<_>>())
            .await?;
        let category_ids = unique(files.iter().filter_map(|f| f.category_id));
        let categories: HashMap<i64, _> = self
            .file_categories
            .get_by_ids(&category_ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        let mut tags = self.tags.get_linked_many(TagLink::File, &file_ids).await?;

        Ok(files
            .into_iter()
            .map(|file| FileView {
                file_size_display: file.file_size_display(),
                file_extension: file.file_extension(),
                uploader: uploaders
                    .get(&file.uploaded_by)
                    .cloned()
                    .unwrap_or_else(|| missing_user(file.uploaded_by)),
                category: file.category_id.and_then(|id| categories.get(&id).cloned()),
                tag_list: tags.remove(&file.id).unwrap_or_default(),
                file,
            })
            .collect())
    }

    pub async fn file_view(&self, file: ArchiveFile) -> Result<FileView> {
        let id = file.id;
        self.file_views(vec![file])
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("File {} vanished while building its card", id))
    }

    /// Flat comment views, replies not yet attached
    pub async fn comment_views(&self, comments: Vec<Comment>) -> Result<Vec<CommentView>> {
        let authors = self
            .user_briefs(&comments.iter().map(|c| c.author_id).collect::<Vec<_>>())
            .await?;
        Ok(comments
            .into_iter()
            .map(|comment| CommentView {
                author: authors
                    .get(&comment.author_id)
                    .cloned()
                    .unwrap_or_else(|| missing_user(comment.author_id)),
                comment,
                replies: Vec::new(),
            })
            .collect())
    }

    pub async fn file_comment_views(
        &self,
        comments: Vec<FileComment>,
    ) -> Result<Vec<FileCommentView>> {
        let authors = self
            .user_briefs(&comments.iter().map(|c| c.author_id).collect::<Vec<_>>())
            .await?;
        Ok(comments
            .into_iter()
            .map(|comment| FileCommentView {
                author: authors
                    .get(&comment.author_id)
                    .cloned()
                    .unwrap_or_else(|| missing_user(comment.author_id)),
                comment,
            })
            .collect())
    }
}

fn unique(ids: impl Iterator<Item = i64>) -> Vec<i64> {
    let mut ids: Vec<i64> = ids.collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn missing_user(id: i64) -> UserBrief {
    UserBrief {
        id,
        username: String::new(),
        full_name: String::new(),
        avatar: String::new(),
    }
}
