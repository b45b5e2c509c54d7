#![forbid(unsafe_code)]

//! Projection from raw detail records to the simplified gallery feed.
//!
//! Pure data shaping, no I/O. Raw records stay `serde_json::Value` on disk;
//! only the fields the simplified shape needs are deserialized here, with
//! everything optional defaulted the way the gallery expects.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::youtube::Membership;

/// A playlist a video belongs to, as exposed in the simplified record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistRef {
    pub id: String,
    pub title: String,
}

/// The standard and high-resolution thumbnail variants, carried verbatim
/// from the raw record (`null` when the source had neither).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailPair {
    pub high: Option<Value>,
    pub standard: Option<Value>,
}

/// One entry of the derived gallery feed. Field names serialize in the
/// camelCase shape the frontend consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimplifiedVideo {
    pub id: String,
    pub url: String,
    pub title: String,
    pub description: String,
    pub upload_date: String,
    pub tags: Vec<String>,
    pub privacy_status: String,
    pub thumbnails: ThumbnailPair,
    pub channel_id: String,
    pub category_id: Option<String>,
    pub view_count: String,
    pub playlists: Vec<PlaylistRef>,
}

impl SimplifiedVideo {
    pub fn is_private(&self) -> bool {
        self.privacy_status == "private"
    }
}

/// Subset of a raw video resource the projection reads. Required fields
/// missing from a record make the whole run fail, mirroring the strictness
/// of the fetch output.
#[derive(Debug, Deserialize)]
struct RawVideo {
    id: String,
    snippet: RawSnippet,
    status: RawStatus,
    #[serde(default)]
    statistics: RawStatistics,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnippet {
    title: String,
    #[serde(default)]
    description: String,
    published_at: String,
    #[serde(default)]
    tags: Vec<String>,
    channel_id: String,
    #[serde(default)]
    category_id: Option<String>,
    #[serde(default)]
    thumbnails: RawThumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct RawThumbnails {
    #[serde(default)]
    high: Option<Value>,
    #[serde(default)]
    standard: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStatus {
    privacy_status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStatistics {
    #[serde(default)]
    view_count: Option<String>,
}

/// Groups membership rows by video id, preserving the order rows arrived in.
/// Videos without any row simply have no key; look up with
/// `index.get(id).cloned().unwrap_or_default()`.
pub fn build_membership_index(memberships: &[Membership]) -> HashMap<String, Vec<PlaylistRef>> {
    let mut index: HashMap<String, Vec<PlaylistRef>> = HashMap::new();
    for membership in memberships {
        index
            .entry(membership.video_id.clone())
            .or_default()
            .push(PlaylistRef {
                id: membership.playlist_id.clone(),
                title: membership.playlist_title.clone(),
            });
    }
    index
}

/// Projects one raw detail record into the simplified shape, attaching the
/// playlists gathered in `index`.
pub fn simplify_video(
    item: &Value,
    index: &HashMap<String, Vec<PlaylistRef>>,
) -> Result<SimplifiedVideo> {
    let raw: RawVideo = serde_json::from_value(item.clone()).with_context(|| {
        let id = item
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("<unknown>");
        format!("video record {id} is missing required fields")
    })?;

    let high = raw.snippet.thumbnails.high;
    // Standard mirrors high when the source never rendered one.
    let standard = raw.snippet.thumbnails.standard.or_else(|| high.clone());

    Ok(SimplifiedVideo {
        url: format!("https://www.youtube.com/watch?v={}", raw.id),
        id: raw.id.clone(),
        title: raw.snippet.title,
        description: raw.snippet.description,
        upload_date: raw.snippet.published_at,
        tags: raw.snippet.tags,
        privacy_status: raw.status.privacy_status,
        thumbnails: ThumbnailPair { high, standard },
        channel_id: raw.snippet.channel_id,
        category_id: raw.snippet.category_id,
        view_count: raw.statistics.view_count.unwrap_or_else(|| "0".to_string()),
        playlists: index.get(&raw.id).cloned().unwrap_or_default(),
    })
}
