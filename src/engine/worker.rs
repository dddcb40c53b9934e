//! One font's lifecycle: overwrite check, bounded download+extract retries, final move.

use crate::engine::{AttemptError, Confirm, Extractor, Fetcher, Shared};
use crate::model::{FontOutcome, InstallEvent};
use anyhow::{Context, Result};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Chunks buffered between the download and the extractor.
const STREAM_BUFFER_CHUNKS: usize = 16;

const STAGING_PREFIX: &str = "nerdfont-install-";

pub(crate) async fn install_font<F, X, C>(
    shared: &Shared<F, X, C>,
    font: &str,
    event_tx: &mpsc::UnboundedSender<InstallEvent>,
) -> FontOutcome
where
    F: Fetcher,
    X: Extractor,
    C: Confirm,
{
    let target = shared.layout.font_dir(font);

    if target.exists() {
        match make_room(shared, font, &target).await {
            Ok(Some(backup)) => {
                let _ = event_tx.send(InstallEvent::BackedUp {
                    font: font.to_string(),
                    backup,
                });
            }
            Ok(None) => {
                let _ = event_tx.send(InstallEvent::Skipped {
                    font: font.to_string(),
                });
                return FontOutcome::Skipped {
                    font: font.to_string(),
                };
            }
            Err(e) => {
                log::warn!("{font}: {e:#}");
                return FontOutcome::Failed {
                    font: font.to_string(),
                    attempts: 0,
                    reason: format!("{e:#}"),
                };
            }
        }
    }

    let url = match shared.cfg.archive_url(font) {
        Ok(url) => url,
        Err(e) => {
            return FontOutcome::Failed {
                font: font.to_string(),
                attempts: 0,
                reason: format!("{e:#}"),
            }
        }
    };

    let _ = event_tx.send(InstallEvent::FontStarted {
        font: font.to_string(),
    });

    let max_attempts = shared.cfg.max_attempts.max(1);
    let mut last_error = String::new();
    for attempt in 1..=max_attempts {
        let staging = match tempfile::Builder::new()
            .prefix(&format!("{STAGING_PREFIX}{font}-"))
            .tempdir()
        {
            Ok(dir) => dir,
            Err(e) => {
                last_error = format!("failed to create staging directory: {e}");
                report_attempt(event_tx, font, attempt, max_attempts, &last_error);
                retry_pause(shared, attempt, max_attempts).await;
                continue;
            }
        };

        match run_attempt(shared, url.clone(), staging.path()).await {
            Ok(bytes) => {
                log::debug!("{font}: extracted {bytes} bytes on attempt {attempt}");
                // `staging` is gone after the move; its drop then has nothing to clean up.
                return match finish_install(shared, staging.path(), &target).await {
                    Ok(()) => {
                        let _ = event_tx.send(InstallEvent::Installed {
                            font: font.to_string(),
                            path: target.clone(),
                            bytes,
                        });
                        FontOutcome::Installed {
                            font: font.to_string(),
                            path: target,
                            attempts: attempt,
                            bytes,
                        }
                    }
                    Err(e) => {
                        log::warn!("{font}: {e:#}");
                        let _ = event_tx.send(InstallEvent::GaveUp {
                            font: font.to_string(),
                            attempts: attempt,
                        });
                        FontOutcome::Failed {
                            font: font.to_string(),
                            attempts: attempt,
                            reason: format!("{e:#}"),
                        }
                    }
                };
            }
            Err(e) => {
                last_error = e.to_string();
                report_attempt(event_tx, font, attempt, max_attempts, &last_error);
                retry_pause(shared, attempt, max_attempts).await;
            }
        }
    }

    let _ = event_tx.send(InstallEvent::GaveUp {
        font: font.to_string(),
        attempts: max_attempts,
    });
    FontOutcome::Failed {
        font: font.to_string(),
        attempts: max_attempts,
        reason: last_error,
    }
}

/// Ask before replacing an existing install. `Ok(None)` means the user declined;
/// otherwise the old install now lives at the returned backup path.
async fn make_room<F, X, C>(
    shared: &Shared<F, X, C>,
    font: &str,
    target: &Path,
) -> Result<Option<PathBuf>>
where
    C: Confirm,
{
    let answer = shared
        .confirm
        .ask(format!(
            "{font} already exists. Would you like to override it? (y/N) "
        ))
        .await
        .context("failed to read answer")?;
    if !shared.cfg.overwrite_answers.accepts(&answer) {
        return Ok(None);
    }

    shared
        .privilege
        .create_dir_all(&shared.layout.backup_dir())
        .await?;
    let backup = shared.layout.backup_target(font);
    shared.privilege.move_path(target, &backup).await?;
    Ok(Some(backup))
}

/// Stream the archive through a bounded channel into the extractor, within the attempt timeout.
async fn run_attempt<F, X, C>(
    shared: &Shared<F, X, C>,
    url: reqwest::Url,
    staging: &Path,
) -> Result<u64, AttemptError>
where
    F: Fetcher,
    X: Extractor,
{
    let (tx, rx) = mpsc::channel::<Bytes>(STREAM_BUFFER_CHUNKS);
    let both = async {
        tokio::join!(
            shared.fetcher.fetch(url, tx),
            shared.extractor.extract(rx, staging)
        )
    };
    let (fetched, extracted) = tokio::time::timeout(shared.cfg.attempt_timeout, both)
        .await
        .map_err(|_| AttemptError::Timeout(shared.cfg.attempt_timeout))?;

    match (fetched, extracted) {
        (Ok(bytes), Ok(())) => Ok(bytes),
        // The extractor gave up first; its error is the interesting one.
        (Err(AttemptError::SinkClosed), Err(e)) | (Ok(_), Err(e)) => Err(e),
        (Err(e), _) => Err(e),
    }
}

async fn finish_install<F, X, C>(
    shared: &Shared<F, X, C>,
    staging: &Path,
    target: &Path,
) -> Result<()> {
    make_world_readable(staging)?;
    shared.privilege.create_dir_all(shared.layout.root()).await?;
    shared.privilege.move_path(staging, target).await
}

/// Temp dirs are created 0700; installed fonts must be readable by everyone.
fn make_world_readable(dir: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o755))
            .with_context(|| format!("failed to set permissions on {}", dir.display()))?;
    }
    Ok(())
}

fn report_attempt(
    event_tx: &mpsc::UnboundedSender<InstallEvent>,
    font: &str,
    attempt: u32,
    max_attempts: u32,
    reason: &str,
) {
    log::debug!("{font}: attempt {attempt}/{max_attempts} failed: {reason}");
    let _ = event_tx.send(InstallEvent::AttemptFailed {
        font: font.to_string(),
        attempt,
        max_attempts,
        reason: reason.to_string(),
    });
}

async fn retry_pause<F, X, C>(shared: &Shared<F, X, C>, attempt: u32, max_attempts: u32) {
    if attempt < max_attempts {
        tokio::time::sleep(shared.cfg.retry_delay).await;
    }
}
