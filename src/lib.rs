//! NLPers - content platform for the NLPers community
//!
//! A blog with comments, likes and follows, a moderated file archive with
//! playlists, and site-wide settings, served as a JSON API over axum.

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
