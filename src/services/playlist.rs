//! Playlists of archive files

use crate::db::repositories::{ArchiveFileRepository, PlaylistRepository};
use crate::models::{
    ArchiveFile, CreatePlaylistInput, ListParams, PagedResult, Playlist, PlaylistDetail,
    PlaylistView, User, PLAYLIST_NAME_MIN,
};
use crate::services::views::ContentViews;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

pub const PLAYLIST_NAME_MAX: usize = 200;
pub const PLAYLISTS_PER_PAGE: u32 = 12;

#[derive(Debug, thiserror::Error)]
pub enum PlaylistError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Permission denied")]
    Forbidden,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct PlaylistService {
    repo: Arc<dyn PlaylistRepository>,
    files: Arc<dyn ArchiveFileRepository>,
    views: Arc<ContentViews>,
}

impl PlaylistService {
    pub fn new(
        repo: Arc<dyn PlaylistRepository>,
        files: Arc<dyn ArchiveFileRepository>,
        views: Arc<ContentViews>,
    ) -> Self {
        Self { repo, files, views }
    }

    pub async fn create(
        &self,
        user: &User,
        input: CreatePlaylistInput,
    ) -> Result<PlaylistView, PlaylistError> {
        let name = input.name.trim();
        let len = name.chars().count();
        if len < PLAYLIST_NAME_MIN {
            return Err(PlaylistError::ValidationError(format!(
                "Name must be at least {} characters",
                PLAYLIST_NAME_MIN
            )));
        }
        if len > PLAYLIST_NAME_MAX {
            return Err(PlaylistError::ValidationError(format!(
                "Name must be at most {} characters",
                PLAYLIST_NAME_MAX
            )));
        }

        let now = Utc::now();
        let playlist = Playlist {
            id: 0,
            name: name.to_string(),
            description: input.description.trim().to_string(),
            created_by: user.id,
            is_public: input.is_public,
            created_at: now,
            updated_at: now,
        };
        let created = self
            .repo
            .create(&playlist)
            .await
            .context("Failed to create playlist")?;
        tracing::debug!("{} created playlist #{}", user.username, created.id);
        self.view(created).await
    }

    pub async fn list_public(&self, page: u32) -> Result<PagedResult<PlaylistView>, PlaylistError> {
        let params = ListParams::new(page, PLAYLISTS_PER_PAGE);
        let (playlists, total) = self.repo.list_public(&params).await?;
        let mut items = Vec::with_capacity(playlists.len());
        for playlist in playlists {
            items.push(self.view(playlist).await?);
        }
        Ok(PagedResult::new(items, total, &params))
    }

    pub async fn my_playlists(&self, user: &User) -> Result<Vec<PlaylistView>, PlaylistError> {
        let mut views = Vec::new();
        for playlist in self.repo.list_by_user(user.id).await? {
            views.push(self.view(playlist).await?);
        }
        Ok(views)
    }

    /// Playlist with its files
    ///
    /// Private playlists are shown to their owner and staff only; other
    /// viewers never see files that are still waiting for moderation.
    pub async fn detail(&self, id: i64, viewer: Option<&User>) -> Result<PlaylistDetail, PlaylistError> {
        let playlist = self.visible(id, viewer).await?;
        let is_owner = viewer.is_some_and(|u| u.can_edit(playlist.created_by));

        let mut files: Vec<ArchiveFile> = Vec::new();
        for file_id in self.repo.file_ids(id).await? {
            if let Some(file) = self.files.get_by_id(file_id).await? {
                if file.is_public || is_owner {
                    files.push(file);
                }
            }
        }

        Ok(PlaylistDetail {
            playlist: self.view(playlist).await?,
            files: self.views.file_views(files).await?,
        })
    }

    /// Returns `false` when the file was already in the playlist
    pub async fn add_file(&self, user: &User, id: i64, file_id: i64) -> Result<bool, PlaylistError> {
        let playlist = self.owned(user, id).await?;
        match self.files.get_by_id(file_id).await? {
            Some(file) if file.is_public || user.can_edit(file.uploaded_by) => {}
            _ => return Err(PlaylistError::NotFound("File")),
        }
        Ok(self.repo.add_file(playlist.id, file_id).await?)
    }

    pub async fn remove_file(&self, user: &User, id: i64, file_id: i64) -> Result<bool, PlaylistError> {
        let playlist = self.owned(user, id).await?;
        Ok(self.repo.remove_file(playlist.id, file_id).await?)
    }

    pub async fn delete(&self, user: &User, id: i64) -> Result<(), PlaylistError> {
        let playlist = self.owned(user, id).await?;
        self.repo
            .delete(playlist.id)
            .await
            .context("Failed to delete playlist")?;
        Ok(())
    }

    async fn view(&self, playlist: Playlist) -> Result<PlaylistView, PlaylistError> {
        let owner = self.views.user_brief(playlist.created_by).await?;
        let files_count = self.repo.count_files(playlist.id).await?;
        Ok(PlaylistView {
            playlist,
            owner,
            files_count,
        })
    }

    async fn visible(&self, id: i64, viewer: Option<&User>) -> Result<Playlist, PlaylistError> {
        match self.repo.get_by_id(id).await? {
            Some(p) if p.is_public || viewer.is_some_and(|u| u.can_edit(p.created_by)) => Ok(p),
            _ => Err(PlaylistError::NotFound("Playlist")),
        }
    }

    async fn owned(&self, user: &User, id: i64) -> Result<Playlist, PlaylistError> {
        let playlist = self
            .repo
            .get_by_id(id)
            .await?
            .ok_or(PlaylistError::NotFound("Playlist"))?;
        if !user.can_edit(playlist.created_by) {
            return Err(PlaylistError::Forbidden);
        }
        Ok(playlist)
    }
}
