#![forbid(unsafe_code)]

//! OAuth credential handling for the fetch stage.
//!
//! The token file is produced once by the browser-flow login helper; this
//! module only loads it, refreshes the access token when it has expired, and
//! rewrites the file so later runs pick up the fresh token. The refresh is a
//! guard clause with exactly two outcomes: refreshed-and-saved, or used
//! as-is.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// On-disk credential as written by the login bootstrap (Google
/// authorized-user format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl StoredCredential {
    /// A credential without an expiry stamp is assumed usable.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }
}

/// Fresh token pair handed back by the token endpoint.
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expiry: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    expires_in: i64,
}

pub fn load_credential(path: &Path) -> Result<StoredCredential> {
    if !path.exists() {
        bail!(
            "credential file not found: {}; run the OAuth login bootstrap first to generate it",
            path.display()
        );
    }
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Refreshes `credential` when it is expired and carries a refresh token;
/// otherwise hands it back untouched. A successful refresh rewrites the
/// token file immediately, independent of whatever the rest of the run does.
///
/// The token-endpoint exchange is injected so tests can script it; production
/// callers pass [`refresh_access_token`].
pub fn ensure_fresh(
    mut credential: StoredCredential,
    path: &Path,
    now: DateTime<Utc>,
    exchange: impl FnOnce(&StoredCredential) -> Result<RefreshedToken>,
) -> Result<StoredCredential> {
    if !credential.is_expired(now) || credential.refresh_token.is_none() {
        return Ok(credential);
    }

    let refreshed = exchange(&credential).context("refreshing expired credential")?;
    credential.token = refreshed.access_token;
    credential.expiry = Some(refreshed.expiry);
    save_credential(path, &credential)?;
    Ok(credential)
}

/// One POST to the credential's token endpoint trading the refresh token for
/// a new access token.
pub fn refresh_access_token(
    agent: &ureq::Agent,
    credential: &StoredCredential,
) -> Result<RefreshedToken> {
    let refresh_token = credential
        .refresh_token
        .as_deref()
        .context("credential has no refresh token")?;

    let response = match agent.post(&credential.token_uri).send_form(&[
        ("grant_type", "refresh_token"),
        ("client_id", &credential.client_id),
        ("client_secret", &credential.client_secret),
        ("refresh_token", refresh_token),
    ]) {
        Ok(response) => response,
        Err(ureq::Error::Status(status, _)) => {
            bail!("token endpoint rejected the refresh with status {status}")
        }
        Err(err) => return Err(err).context("token refresh request failed"),
    };

    let body: TokenEndpointResponse = response
        .into_json()
        .context("decoding token endpoint response")?;
    Ok(RefreshedToken {
        access_token: body.access_token,
        expiry: Utc::now() + Duration::seconds(body.expires_in),
    })
}

fn save_credential(path: &Path, credential: &StoredCredential) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let payload =
        serde_json::to_vec_pretty(credential).context("serializing refreshed credential")?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, payload).with_context(|| format!("writing {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::cell::Cell;
    use tempfile::tempdir;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn sample_credential(expiry: Option<DateTime<Utc>>, refresh: Option<&str>) -> StoredCredential {
        StoredCredential {
            token: "old-access".into(),
            refresh_token: refresh.map(str::to_owned),
            token_uri: "https://oauth2.example/token".into(),
            client_id: "client".into(),
            client_secret: "secret".into(),
            scopes: vec!["https://www.googleapis.com/auth/youtube.readonly".into()],
            expiry,
        }
    }

    #[test]
    fn load_credential_missing_file_names_bootstrap() {
        let dir = tempdir().unwrap();
        let err = load_credential(&dir.path().join("token.json")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("token.json"));
        assert!(message.contains("login bootstrap"));
    }

    #[test]
    fn load_credential_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("token.json");
        let credential = sample_credential(Some(fixed_now()), Some("refresh"));
        fs::write(&path, serde_json::to_vec(&credential)?)?;

        let loaded = load_credential(&path)?;
        assert_eq!(loaded.token, "old-access");
        assert_eq!(loaded.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(loaded.expiry, Some(fixed_now()));
        Ok(())
    }

    #[test]
    fn valid_credential_skips_the_exchange() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("token.json");
        let future = fixed_now() + Duration::hours(1);
        let credential = sample_credential(Some(future), Some("refresh"));

        let called = Cell::new(false);
        let result = ensure_fresh(credential, &path, fixed_now(), |_| {
            called.set(true);
            bail!("should not be reached")
        })?;

        assert!(!called.get());
        assert_eq!(result.token, "old-access");
        assert!(!path.exists(), "no rewrite without a refresh");
        Ok(())
    }

    #[test]
    fn expired_without_refresh_token_is_used_as_is() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("token.json");
        let past = fixed_now() - Duration::hours(1);
        let credential = sample_credential(Some(past), None);

        let called = Cell::new(false);
        let result = ensure_fresh(credential, &path, fixed_now(), |_| {
            called.set(true);
            bail!("should not be reached")
        })?;

        assert!(!called.get());
        assert_eq!(result.token, "old-access");
        Ok(())
    }

    #[test]
    fn expired_credential_refreshes_and_rewrites_the_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("token.json");
        let past = fixed_now() - Duration::hours(1);
        let new_expiry = fixed_now() + Duration::hours(1);
        let credential = sample_credential(Some(past), Some("refresh"));
        fs::write(&path, serde_json::to_vec(&credential)?)?;

        let result = ensure_fresh(credential, &path, fixed_now(), |current| {
            assert_eq!(current.refresh_token.as_deref(), Some("refresh"));
            Ok(RefreshedToken {
                access_token: "new-access".into(),
                expiry: new_expiry,
            })
        })?;

        assert_eq!(result.token, "new-access");
        assert_eq!(result.expiry, Some(new_expiry));

        let on_disk: StoredCredential = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(on_disk.token, "new-access");
        assert_eq!(on_disk.expiry, Some(new_expiry));
        assert_eq!(on_disk.refresh_token.as_deref(), Some("refresh"));
        Ok(())
    }

    #[test]
    fn failed_exchange_aborts_the_run() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");
        let past = fixed_now() - Duration::hours(1);
        let credential = sample_credential(Some(past), Some("refresh"));

        let err = ensure_fresh(credential, &path, fixed_now(), |_| bail!("endpoint down"))
            .unwrap_err();
        assert!(err.to_string().contains("refreshing expired credential"));
    }

    #[test]
    fn missing_expiry_counts_as_usable() {
        let credential = sample_credential(None, Some("refresh"));
        assert!(!credential.is_expired(fixed_now()));
    }
}
