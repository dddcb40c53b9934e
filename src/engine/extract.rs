use crate::engine::{AttemptError, Extractor};
use bytes::Bytes;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Pipes archive bytes into an external `tar` process.
#[derive(Debug, Clone)]
pub struct TarExtractor {
    program: String,
    flags: Vec<String>,
}

impl Default for TarExtractor {
    fn default() -> Self {
        Self::new("tar", &["-xJ"])
    }
}

impl TarExtractor {
    pub fn new(program: &str, flags: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            flags: flags.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl Extractor for TarExtractor {
    async fn extract(
        &self,
        source: mpsc::Receiver<Bytes>,
        dest: &Path,
    ) -> Result<(), AttemptError> {
        let mut child = Command::new(&self.program)
            .args(&self.flags)
            .arg("-C")
            .arg(dest)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let (Some(mut stdin), Some(mut stderr)) = (child.stdin.take(), child.stderr.take()) else {
            return Err(AttemptError::Io(std::io::Error::other(
                "extractor pipes unavailable",
            )));
        };

        let feed = async move {
            let mut source = source;
            while let Some(chunk) = source.recv().await {
                if let Err(e) = stdin.write_all(&chunk).await {
                    // tar quit early; its exit status says why.
                    log::debug!("extractor input closed: {e}");
                    break;
                }
            }
            // Dropping stdin signals EOF; dropping source tells the fetcher to stop.
        };
        let drain_stderr = async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        };

        let ((), err_buf) = tokio::join!(feed, drain_stderr);
        let status = child.wait().await?;
        if !status.success() {
            return Err(AttemptError::Extract {
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&err_buf).trim().to_string(),
            });
        }
        Ok(())
    }
}
