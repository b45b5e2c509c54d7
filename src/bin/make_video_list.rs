#![forbid(unsafe_code)]

//! Stage two: reads the raw artifacts written by `fetch_videos` and derives
//! the simplified gallery feed, split into a public list (public and
//! unlisted videos) and a private one.

use anyhow::{Result, bail};
use gallery_tools::artifacts::{
    PLAYLISTS_FULL_FILE, PlaylistsArtifact, VIDEOS_FULL_FILE, VIDEOS_PRIVATE_FILE,
    VIDEOS_PUBLIC_FILE, read_required, write_json,
};
use gallery_tools::config::{RuntimeOverrides, resolve_runtime_paths};
use gallery_tools::security::ensure_not_root;
use gallery_tools::simplify::{SimplifiedVideo, build_membership_index, simplify_video};
use serde_json::Value;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
struct ListArgs {
    data_root: PathBuf,
}

impl ListArgs {
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
        let mut args = iter.into_iter();

        while let Some(arg) = args.next() {
            if let Some(value) = arg.strip_prefix("--data-root=") {
                data_root_override = Some(PathBuf::from(value));
                continue;
            }

            match arg.as_str() {
                "--data-root" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--data-root requires a value"))?;
                    data_root_override = Some(PathBuf::from(value));
                }
                _ => {
                    bail!("unknown argument: {arg}");
                }
            }
        }

        let runtime_paths = resolve_runtime_paths(RuntimeOverrides {
            data_root: data_root_override,
            ..RuntimeOverrides::default()
        })?;

        Ok(Self {
            data_root: runtime_paths.data_root,
        })
    }
}

#[derive(Debug)]
struct ProjectionSummary {
    public: usize,
    private: usize,
}

fn main() -> Result<()> {
    ensure_not_root("make_video_list")?;

    let ListArgs { data_root } = ListArgs::parse()?;
    let summary = run(&data_root)?;

    println!(
        "Wrote {} videos to {}",
        summary.public,
        data_root.join(VIDEOS_PUBLIC_FILE).display()
    );
    println!(
        "Wrote {} private videos to {}",
        summary.private,
        data_root.join(VIDEOS_PRIVATE_FILE).display()
    );
    Ok(())
}

/// Projects every raw record and partitions the result by visibility. The
/// video artifact is checked before the playlist one so a fresh checkout
/// reports the right file to regenerate first.
fn run(data_root: &Path) -> Result<ProjectionSummary> {
    let videos_full: Vec<Value> = read_required(&data_root.join(VIDEOS_FULL_FILE))?;
    let playlists_full: PlaylistsArtifact =
        read_required(&data_root.join(PLAYLISTS_FULL_FILE))?;

    let index = build_membership_index(&playlists_full.memberships);
    let simplified = videos_full
        .iter()
        .map(|item| simplify_video(item, &index))
        .collect::<Result<Vec<_>>>()?;

    let (public, private): (Vec<SimplifiedVideo>, Vec<SimplifiedVideo>) =
        simplified.into_iter().partition(|video| !video.is_private());

    write_json(&data_root.join(VIDEOS_PUBLIC_FILE), &public)?;
    write_json(&data_root.join(VIDEOS_PRIVATE_FILE), &private)?;

    Ok(ProjectionSummary {
        public: public.len(),
        private: private.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gallery_tools::youtube::Membership;
    use serde_json::json;
    use tempfile::tempdir;

    fn raw_video(id: &str, privacy: &str) -> Value {
        json!({
            "id": id,
            "snippet": {
                "title": format!("Video {id}"),
                "description": "desc",
                "publishedAt": "2024-01-15T10:00:00Z",
                "channelId": "UCchannel123",
                "thumbnails": {"high": {"url": "h.jpg"}},
            },
            "status": {"privacyStatus": privacy},
            "statistics": {"viewCount": "7"},
        })
    }

    fn membership(video_id: &str, playlist_id: &str, title: &str) -> Membership {
        Membership {
            playlist_id: playlist_id.into(),
            playlist_title: title.into(),
            video_id: video_id.into(),
        }
    }

    fn write_fixtures(data_root: &Path, videos: &[Value], memberships: Vec<Membership>) {
        write_json(&data_root.join(VIDEOS_FULL_FILE), &videos.to_vec()).unwrap();
        write_json(
            &data_root.join(PLAYLISTS_FULL_FILE),
            &PlaylistsArtifact {
                playlists: vec![],
                memberships,
            },
        )
        .unwrap();
    }

    #[test]
    fn args_accept_data_root_override() {
        let args = ListArgs::from_slice(&["--data-root=/srv/gallery"]).unwrap();
        assert_eq!(args.data_root, PathBuf::from("/srv/gallery"));
    }

    #[test]
    fn args_reject_unknown_flags() {
        let err = ListArgs::from_slice(&["--bogus"]).unwrap_err();
        assert!(err.to_string().contains("unknown argument"));
    }

    #[test]
    fn run_partitions_by_visibility_and_attaches_playlists() -> Result<()> {
        let dir = tempdir()?;
        write_fixtures(
            dir.path(),
            &[
                raw_video("pub1", "public"),
                raw_video("pub2", "unlisted"),
                raw_video("priv1", "private"),
            ],
            vec![membership("pub1", "PL1", "My Playlist")],
        );

        let summary = run(dir.path())?;
        assert_eq!(summary.public, 2);
        assert_eq!(summary.private, 1);

        let public: Vec<SimplifiedVideo> =
            read_required(&dir.path().join(VIDEOS_PUBLIC_FILE))?;
        assert!(public.iter().all(|video| !video.is_private()));
        let pub1 = public.iter().find(|video| video.id == "pub1").unwrap();
        assert_eq!(pub1.playlists.len(), 1);
        assert_eq!(pub1.playlists[0].id, "PL1");
        let pub2 = public.iter().find(|video| video.id == "pub2").unwrap();
        assert!(pub2.playlists.is_empty());

        let private: Vec<SimplifiedVideo> =
            read_required(&dir.path().join(VIDEOS_PRIVATE_FILE))?;
        assert_eq!(private.len(), 1);
        assert_eq!(private[0].id, "priv1");
        Ok(())
    }

    #[test]
    fn run_preserves_record_order_within_each_partition() -> Result<()> {
        let dir = tempdir()?;
        write_fixtures(
            dir.path(),
            &[
                raw_video("a", "public"),
                raw_video("b", "private"),
                raw_video("c", "unlisted"),
                raw_video("d", "public"),
            ],
            vec![],
        );

        run(dir.path())?;
        let public: Vec<SimplifiedVideo> =
            read_required(&dir.path().join(VIDEOS_PUBLIC_FILE))?;
        let order: Vec<&str> = public.iter().map(|video| video.id.as_str()).collect();
        assert_eq!(order, vec!["a", "c", "d"]);
        Ok(())
    }

    #[test]
    fn missing_video_artifact_is_reported_first() {
        let dir = tempdir().unwrap();
        let err = run(dir.path()).unwrap_err();
        assert!(err.to_string().contains(VIDEOS_FULL_FILE));
    }

    #[test]
    fn missing_playlist_artifact_is_reported_when_videos_exist() {
        let dir = tempdir().unwrap();
        write_json(&dir.path().join(VIDEOS_FULL_FILE), &Vec::<Value>::new()).unwrap();
        let err = run(dir.path()).unwrap_err();
        assert!(err.to_string().contains(PLAYLISTS_FULL_FILE));
    }

    #[test]
    fn malformed_record_aborts_the_run() {
        let dir = tempdir().unwrap();
        write_fixtures(
            dir.path(),
            &[json!({"id": "broken", "snippet": {"title": "t"}})],
            vec![],
        );
        let err = run(dir.path()).unwrap_err();
        assert!(err.to_string().contains("broken"));
        assert!(!dir.path().join(VIDEOS_PUBLIC_FILE).exists());
    }

    #[test]
    fn empty_inputs_produce_two_empty_outputs() -> Result<()> {
        let dir = tempdir()?;
        write_fixtures(dir.path(), &[], vec![]);

        let summary = run(dir.path())?;
        assert_eq!(summary.public, 0);
        assert_eq!(summary.private, 0);
        let public: Vec<SimplifiedVideo> =
            read_required(&dir.path().join(VIDEOS_PUBLIC_FILE))?;
        assert!(public.is_empty());
        Ok(())
    }
}
