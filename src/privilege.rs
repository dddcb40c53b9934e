//! Filesystem operations that may need elevated privileges.
//!
//! Global installs acquire the elevation helper's credentials once, up front, and every
//! worker afterwards runs the helper non-interactively so concurrent workers never
//! race each other for a password prompt.

use anyhow::{bail, Context, Result};
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Privilege {
    /// Run everything as the current user.
    User,
    /// Run filesystem changes through `helper -n <cmd>` (e.g. sudo).
    Elevated { helper: String },
}

impl Privilege {
    /// Ask for credentials once by running an elevated no-op.
    pub async fn acquire(helper: &str) -> Result<Self> {
        log::debug!("acquiring elevation via {helper}");
        let status = Command::new(helper)
            .arg("true")
            .status()
            .await
            .with_context(|| format!("failed to run {helper}"))?;
        if !status.success() {
            bail!("{helper} refused elevation ({status})");
        }
        Ok(Privilege::Elevated {
            helper: helper.to_string(),
        })
    }

    /// Build a command for `program`, prefixed with the elevation helper if needed.
    pub fn command(&self, program: impl AsRef<OsStr>) -> Command {
        match self {
            Privilege::User => Command::new(program),
            Privilege::Elevated { helper } => {
                let mut cmd = Command::new(helper);
                cmd.arg("-n").arg(program);
                cmd
            }
        }
    }

    pub async fn create_dir_all(&self, path: &Path) -> Result<()> {
        match self {
            Privilege::User => tokio::fs::create_dir_all(path)
                .await
                .with_context(|| format!("failed to create {}", path.display())),
            Privilege::Elevated { .. } => {
                let mut cmd = self.command("mkdir");
                cmd.arg("-p").arg(path);
                run_checked(cmd, "mkdir").await
            }
        }
    }

    /// Move a file or directory with `mv`, which also handles cross-device moves
    /// out of the temp directory.
    pub async fn move_path(&self, from: &Path, to: &Path) -> Result<()> {
        let mut cmd = self.command("mv");
        cmd.arg(from).arg(to);
        run_checked(cmd, "mv")
            .await
            .with_context(|| format!("failed to move {} to {}", from.display(), to.display()))
    }
}

/// Run a command to completion; a non-zero exit becomes an error carrying its stderr.
async fn run_checked(mut cmd: Command, what: &str) -> Result<()> {
    log::debug!("running {:?}", cmd.as_std());
    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .with_context(|| format!("failed to spawn {what}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{what} exited with {}: {}", output.status, stderr.trim());
    }
    Ok(())
}
