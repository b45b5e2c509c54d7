#![forbid(unsafe_code)]

//! JSON artifact files shared by the two stages.
//!
//! The fetch stage writes the two raw files; the projection stage reads them
//! and writes the two derived ones. All four live directly under the data
//! root. Writes go through a `.tmp` sibling and a rename so a crashed run
//! never leaves a half-written artifact behind.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{
    fs::{self, File},
    io::BufReader,
    path::Path,
};

use crate::youtube::Membership;

/// Raw detail records, exactly as returned by the API.
pub const VIDEOS_FULL_FILE: &str = "videos_full.json";
/// Raw playlists plus the flattened membership rows.
pub const PLAYLISTS_FULL_FILE: &str = "playlists_full.json";
/// Simplified records with public or unlisted visibility.
pub const VIDEOS_PUBLIC_FILE: &str = "videos.json";
/// Simplified records with private visibility.
pub const VIDEOS_PRIVATE_FILE: &str = "videos_private.json";

/// Contents of `playlists_full.json`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistsArtifact {
    pub playlists: Vec<Value>,
    pub memberships: Vec<Membership>,
}

/// Pretty-prints `value` to `path` atomically, creating parent directories
/// as needed.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let payload = serde_json::to_vec_pretty(value)
        .with_context(|| format!("serializing {}", path.display()))?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, payload).with_context(|| format!("writing {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

/// Reads a required upstream artifact. Absence is fatal and the error names
/// the specific missing file so the operator knows which stage to rerun.
pub fn read_required<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        bail!(
            "input file not found: {}; run fetch_videos first",
            path.display()
        );
    }
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))
}
