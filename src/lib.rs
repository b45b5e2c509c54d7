#![forbid(unsafe_code)]

//! Shared library behind the gallery feed tools.
//!
//! `fetch_videos` pulls the authenticated user's catalog and playlist
//! memberships from the YouTube Data API into two raw JSON artifacts;
//! `make_video_list` turns those artifacts into the simplified,
//! visibility-partitioned lists the gallery frontend consumes.

pub mod artifacts;
pub mod auth;
pub mod config;
pub mod security;
pub mod simplify;
pub mod youtube;
