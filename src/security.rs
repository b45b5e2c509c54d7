#![forbid(unsafe_code)]

//! Shared safety checks for the gallery binaries.

use anyhow::{Result, bail};
use nix::unistd::Uid;

/// Fails fast when a binary is started as root. These tools read and rewrite
/// an OAuth token file and write artifacts into the data root; doing that as
/// an unprivileged user keeps ownership sane.
pub fn ensure_not_root(process: &str) -> Result<()> {
    ensure_not_root_for(Uid::current(), process)
}

fn ensure_not_root_for(uid: Uid, process: &str) -> Result<()> {
    if uid.is_root() {
        bail!("{process} must not be run as root; use the account that owns the data root");
    }
    Ok(())
}
