#![forbid(unsafe_code)]

//! Stage one: pulls the authenticated user's entire video catalog and
//! playlist memberships from the YouTube Data API and writes the two raw
//! JSON artifacts under the data root. Stage two (`make_video_list`) turns
//! those into the gallery feed.

use anyhow::{Result, bail};
use chrono::Utc;
use gallery_tools::artifacts::{
    PLAYLISTS_FULL_FILE, PlaylistsArtifact, VIDEOS_FULL_FILE, write_json,
};
use gallery_tools::auth;
use gallery_tools::config::{RuntimeOverrides, resolve_runtime_paths};
use gallery_tools::security::ensure_not_root;
use gallery_tools::youtube::{self, HttpApi, YouTubeApi};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
struct FetchArgs {
    data_root: PathBuf,
    token_file: PathBuf,
    api_base: String,
}

impl FetchArgs {
    fn parse() -> Result<Self> {
        Self::from_iter(env::args().skip(1))
    }

    #[cfg(test)]
    fn from_slice(values: &[&str]) -> Result<Self> {
        Self::from_iter(values.iter().map(|value| value.to_string()))
    }

    fn from_iter<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut data_root_override: Option<PathBuf> = None;
        let mut token_file_override: Option<PathBuf> = None;
        let mut args = iter.into_iter();

        while let Some(arg) = args.next() {
            if let Some(value) = arg.strip_prefix("--data-root=") {
                data_root_override = Some(PathBuf::from(value));
                continue;
            }
            if let Some(value) = arg.strip_prefix("--token-file=") {
                token_file_override = Some(PathBuf::from(value));
                continue;
            }

            match arg.as_str() {
                "--data-root" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--data-root requires a value"))?;
                    data_root_override = Some(PathBuf::from(value));
                }
                "--token-file" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--token-file requires a value"))?;
                    token_file_override = Some(PathBuf::from(value));
                }
                _ => {
                    bail!("unknown argument: {arg}");
                }
            }
        }

        let runtime_paths = resolve_runtime_paths(RuntimeOverrides {
            data_root: data_root_override,
            token_file: token_file_override,
            ..RuntimeOverrides::default()
        })?;

        Ok(Self {
            data_root: runtime_paths.data_root,
            token_file: runtime_paths.token_file,
            api_base: runtime_paths.api_base,
        })
    }
}

fn main() -> Result<()> {
    ensure_not_root("fetch_videos")?;

    let FetchArgs {
        data_root,
        token_file,
        api_base,
    } = FetchArgs::parse()?;

    let agent = ureq::agent();
    let credential = auth::load_credential(&token_file)?;
    let credential = auth::ensure_fresh(credential, &token_file, Utc::now(), |current| {
        auth::refresh_access_token(&agent, current)
    })?;

    let mut api = HttpApi::new(agent, api_base, credential.token);
    run(&mut api, &data_root)
}

/// Full fetch pass. Everything is collected before either artifact is
/// written, so a failure along the way persists nothing.
fn run(api: &mut impl YouTubeApi, data_root: &Path) -> Result<()> {
    println!("Fetching channel info...");
    let uploads_id = youtube::uploads_playlist_id(api)?;

    println!("Fetching video IDs...");
    let video_ids = youtube::all_video_ids(api, &uploads_id)?;
    println!("Found {} videos. Fetching metadata...", video_ids.len());
    let videos = youtube::video_details(api, &video_ids)?;

    println!("Fetching playlists...");
    let playlists = youtube::all_playlists(api)?;
    println!(
        "Found {} playlists. Fetching playlist memberships...",
        playlists.len()
    );
    let memberships = youtube::playlist_memberships(api, &playlists)?;

    let videos_path = data_root.join(VIDEOS_FULL_FILE);
    write_json(&videos_path, &videos)?;
    println!("Wrote {} videos to {}", videos.len(), videos_path.display());

    let playlists_path = data_root.join(PLAYLISTS_FULL_FILE);
    let artifact = PlaylistsArtifact {
        playlists,
        memberships,
    };
    write_json(&playlists_path, &artifact)?;
    println!(
        "Wrote {} playlists and {} memberships to {}",
        artifact.playlists.len(),
        artifact.memberships.len(),
        playlists_path.display()
    );

    Ok(())
}
