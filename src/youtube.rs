#![forbid(unsafe_code)]

//! YouTube Data API client for the fetch stage.
//!
//! Everything here is synchronous and sequential: one request at a time, the
//! next page or batch only after the previous response has landed. Resources
//! destined for the raw artifacts are kept as `serde_json::Value` so the
//! files stay byte-faithful to what the API returned; only the handful of
//! fields the fetch logic needs are deserialized into minimal structs.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Page size for every paginated endpoint and the per-request cap on the
/// batched detail lookup. 50 is the API maximum.
pub const MAX_RESULTS: usize = 50;
const MAX_RESULTS_PARAM: &str = "50";

/// The facets requested for each video in the detail lookup.
const VIDEO_PARTS: &str = "snippet,contentDetails,statistics,status";

/// Narrow view of the remote API used by the fetch routines. Production
/// traffic goes through [`HttpApi`]; tests script canned pages through the
/// same seam and count the calls.
pub trait YouTubeApi {
    fn get(&mut self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value>;
}

/// Bearer-authenticated `ureq` transport. One agent is reused for every call
/// in a run.
pub struct HttpApi {
    agent: ureq::Agent,
    base_url: String,
    access_token: String,
}

impl HttpApi {
    pub fn new(agent: ureq::Agent, base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            agent,
            base_url: base_url.into(),
            access_token: access_token.into(),
        }
    }
}

impl YouTubeApi for HttpApi {
    fn get(&mut self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/{endpoint}", self.base_url.trim_end_matches('/'));
        let mut request = self
            .agent
            .get(&url)
            .set("Authorization", &format!("Bearer {}", self.access_token));
        for (name, value) in params {
            request = request.query(name, value);
        }

        match request.call() {
            Ok(response) => response
                .into_json()
                .with_context(|| format!("decoding {endpoint} response")),
            Err(ureq::Error::Status(status @ (401 | 403), _)) => {
                bail!(
                    "{endpoint} request rejected with status {status}; \
                     the access token is invalid or expired"
                )
            }
            Err(ureq::Error::Status(status, _)) => {
                bail!("{endpoint} request failed with status {status}")
            }
            Err(err) => Err(err).with_context(|| format!("{endpoint} request failed")),
        }
    }
}

/// Common envelope of every list endpoint: the items plus an optional
/// continuation cursor.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    items: Vec<Value>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Repeats a list request, feeding each response's continuation cursor into
/// the next request, until a response carries no cursor. Items are
/// concatenated in response order. There is no iteration ceiling; an
/// upstream that always returns a cursor would loop forever.
fn collect_pages(
    api: &mut impl YouTubeApi,
    endpoint: &str,
    base_params: &[(&str, &str)],
) -> Result<Vec<Value>> {
    let mut items = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
        let mut params = base_params.to_vec();
        if let Some(token) = page_token.as_deref() {
            params.push(("pageToken", token));
        }
        let response = api.get(endpoint, &params)?;
        let page: ListPage = serde_json::from_value(response)
            .with_context(|| format!("parsing {endpoint} page"))?;
        items.extend(page.items);
        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }
    Ok(items)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelItem {
    content_details: ChannelContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

/// Resolves the implicit uploads playlist of the authenticated user's
/// channel. One request; an account without a channel is a hard error.
pub fn uploads_playlist_id(api: &mut impl YouTubeApi) -> Result<String> {
    let response = api.get("channels", &[("part", "contentDetails"), ("mine", "true")])?;
    let parsed: ChannelListResponse =
        serde_json::from_value(response).context("parsing channels response")?;
    let channel = parsed
        .items
        .into_iter()
        .next()
        .context("the authenticated user has no channel with an uploads playlist")?;
    Ok(channel.content_details.related_playlists.uploads)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadEntry {
    content_details: UploadContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadContentDetails {
    video_id: String,
}

/// Every video id in `playlist_id`, in upstream order across however many
/// pages the listing takes.
pub fn all_video_ids(api: &mut impl YouTubeApi, playlist_id: &str) -> Result<Vec<String>> {
    let items = collect_pages(
        api,
        "playlistItems",
        &[
            ("playlistId", playlist_id),
            ("part", "contentDetails"),
            ("maxResults", MAX_RESULTS_PARAM),
        ],
    )?;

    items
        .into_iter()
        .map(|item| {
            let entry: UploadEntry =
                serde_json::from_value(item).context("parsing playlist item")?;
            Ok(entry.content_details.video_id)
        })
        .collect()
}

/// Full detail records for `ids`, fetched in chunks of at most
/// [`MAX_RESULTS`] ids per request and concatenated in chunk order. Empty
/// input issues no requests at all.
pub fn video_details(api: &mut impl YouTubeApi, ids: &[String]) -> Result<Vec<Value>> {
    let mut all_videos = Vec::with_capacity(ids.len());
    for batch in ids.chunks(MAX_RESULTS) {
        let joined = batch.join(",");
        let response = api.get("videos", &[("id", &joined), ("part", VIDEO_PARTS)])?;
        let page: ListPage =
            serde_json::from_value(response).context("parsing videos response")?;
        all_videos.extend(page.items);
    }
    Ok(all_videos)
}

/// Raw playlist resources for every playlist owned by the caller.
pub fn all_playlists(api: &mut impl YouTubeApi) -> Result<Vec<Value>> {
    collect_pages(
        api,
        "playlists",
        &[
            ("mine", "true"),
            ("part", "snippet"),
            ("maxResults", MAX_RESULTS_PARAM),
        ],
    )
}

/// One row per (playlist, video) pairing. Duplicates are meaningful: a video
/// listed in two playlists yields two rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub playlist_id: String,
    pub playlist_title: String,
    pub video_id: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistHead {
    id: String,
    snippet: PlaylistHeadSnippet,
}

#[derive(Debug, Deserialize)]
struct PlaylistHeadSnippet {
    title: String,
}

#[derive(Debug, Deserialize)]
struct MembershipEntry {
    snippet: MembershipSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MembershipSnippet {
    resource_id: ResourceRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceRef {
    kind: String,
    #[serde(default)]
    video_id: Option<String>,
}

/// Walks every playlist (in the order given) and flattens its items into
/// membership rows. Items whose resource kind is not `youtube#video` (e.g. a
/// nested playlist reference) are skipped silently.
pub fn playlist_memberships(
    api: &mut impl YouTubeApi,
    playlists: &[Value],
) -> Result<Vec<Membership>> {
    let mut memberships = Vec::new();
    for playlist in playlists {
        let head: PlaylistHead = serde_json::from_value(playlist.clone())
            .context("parsing playlist resource")?;
        let items = collect_pages(
            api,
            "playlistItems",
            &[
                ("playlistId", &head.id),
                ("part", "snippet"),
                ("maxResults", MAX_RESULTS_PARAM),
            ],
        )?;
        for item in items {
            let entry: MembershipEntry =
                serde_json::from_value(item).context("parsing playlist item")?;
            let resource = entry.snippet.resource_id;
            if resource.kind != "youtube#video" {
                continue;
            }
            let video_id = resource
                .video_id
                .context("video resource reference is missing videoId")?;
            memberships.push(Membership {
                playlist_id: head.id.clone(),
                playlist_title: head.snippet.title.clone(),
                video_id,
            });
        }
    }
    Ok(memberships)
}
