mod extract;
mod fetch;
mod worker;

pub use extract::TarExtractor;
pub use fetch::HttpFetcher;

use crate::layout::FontLayout;
use crate::model::{FontOutcome, InfoEvent, InstallEvent, RunConfig, RunSummary};
use crate::privilege::Privilege;
use anyhow::Result;
use bytes::Bytes;
use reqwest::Url;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

/// Why a single download+extract attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("extractor stopped reading input")]
    SinkClosed,
    #[error("extractor exited with {status}: {stderr}")]
    Extract { status: String, stderr: String },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Streams an archive into `sink`, returning the number of bytes sent.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(
        &self,
        url: Url,
        sink: mpsc::Sender<Bytes>,
    ) -> impl Future<Output = Result<u64, AttemptError>> + Send;
}

/// Unpacks the archive bytes arriving on `source` into `dest`.
pub trait Extractor: Send + Sync + 'static {
    fn extract(
        &self,
        source: mpsc::Receiver<Bytes>,
        dest: &Path,
    ) -> impl Future<Output = Result<(), AttemptError>> + Send;
}

/// Asks the user a question and returns the raw answer.
pub trait Confirm: Send + Sync + 'static {
    fn ask(&self, question: String) -> impl Future<Output = Result<String>> + Send;
}

/// State shared by every worker of one run.
pub(crate) struct Shared<F, X, C> {
    cfg: RunConfig,
    layout: FontLayout,
    privilege: Privilege,
    fetcher: F,
    extractor: X,
    confirm: C,
}

pub struct InstallEngine<F, X, C> {
    shared: Arc<Shared<F, X, C>>,
}

impl<F, X, C> InstallEngine<F, X, C>
where
    F: Fetcher,
    X: Extractor,
    C: Confirm,
{
    pub fn new(
        cfg: RunConfig,
        layout: FontLayout,
        privilege: Privilege,
        fetcher: F,
        extractor: X,
        confirm: C,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                cfg,
                layout,
                privilege,
                fetcher,
                extractor,
                confirm,
            }),
        }
    }

    /// Install every font with at most `cfg.concurrency` workers in flight.
    /// Returns once all workers are done, whatever their outcome.
    pub async fn run(
        self,
        fonts: Vec<String>,
        event_tx: mpsc::UnboundedSender<InstallEvent>,
    ) -> RunSummary {
        let workers = self.shared.cfg.concurrency.max(1);
        let _ = event_tx.send(InstallEvent::Info(InfoEvent::Dispatching {
            fonts: fonts.len(),
            workers,
        }));

        let slots = Arc::new(Semaphore::new(workers));
        let mut handles = Vec::with_capacity(fonts.len());
        for font in fonts {
            let shared = self.shared.clone();
            let slots = slots.clone();
            let tx = event_tx.clone();
            let task_font = font.clone();
            let handle = tokio::spawn(async move {
                let Ok(_slot) = slots.acquire_owned().await else {
                    return FontOutcome::Failed {
                        font: task_font,
                        attempts: 0,
                        reason: "worker pool closed".into(),
                    };
                };
                worker::install_font(&shared, &task_font, &tx).await
            });
            handles.push((font, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (font, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!("worker for {font} failed: {e}");
                    FontOutcome::Failed {
                        font,
                        attempts: 0,
                        reason: format!("worker task failed: {e}"),
                    }
                }
            };
            outcomes.push(outcome);
        }

        RunSummary {
            timestamp_utc: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "now".into()),
            scope: self.shared.layout.scope(),
            fonts_root: self.shared.layout.root().to_path_buf(),
            config: self.shared.cfg.clone(),
            outcomes,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scriptable stand-ins for the network, the extractor and the terminal.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub struct StaticFetcher {
        pub body: Bytes,
        pub delay: Duration,
        pub calls: AtomicUsize,
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
    }

    impl StaticFetcher {
        pub fn new(body: &'static [u8]) -> Self {
            Self {
                body: Bytes::from_static(body),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    impl Fetcher for StaticFetcher {
        async fn fetch(&self, _url: Url, sink: mpsc::Sender<Bytes>) -> Result<u64, AttemptError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let res = match sink.send(self.body.clone()).await {
                Ok(()) => Ok(self.body.len() as u64),
                Err(_) => Err(AttemptError::SinkClosed),
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            res
        }
    }

    /// Fetcher that never finishes, to exercise the attempt timeout.
    pub struct StalledFetcher;

    impl Fetcher for StalledFetcher {
        async fn fetch(&self, _url: Url, _sink: mpsc::Sender<Bytes>) -> Result<u64, AttemptError> {
            futures::future::pending().await
        }
    }

    /// Writes the received bytes to `<dest>/font.ttf`, failing the first `fail_first` calls.
    pub struct ScriptedExtractor {
        pub fail_first: usize,
        pub calls: AtomicUsize,
    }

    impl ScriptedExtractor {
        pub fn failing(fail_first: usize) -> Self {
            Self {
                fail_first,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Extractor for ScriptedExtractor {
        async fn extract(
            &self,
            mut source: mpsc::Receiver<Bytes>,
            dest: &Path,
        ) -> Result<(), AttemptError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let mut data = Vec::new();
            while let Some(chunk) = source.recv().await {
                data.extend_from_slice(&chunk);
            }
            if call <= self.fail_first {
                return Err(AttemptError::Extract {
                    status: "exit status: 2".into(),
                    stderr: format!("xz: (stdin): File format not recognized (call {call})"),
                });
            }
            let mut content = format!("call {call}: ").into_bytes();
            content.extend_from_slice(&data);
            tokio::fs::write(dest.join("font.ttf"), content).await?;
            Ok(())
        }
    }

    /// Replays canned answers and records the questions asked.
    #[derive(Default)]
    pub struct Answers {
        pub answers: Mutex<Vec<String>>,
        pub asked: Mutex<Vec<String>>,
    }

    impl Answers {
        pub fn new(answers: &[&str]) -> Self {
            Self {
                answers: Mutex::new(answers.iter().rev().map(|a| a.to_string()).collect()),
                asked: Mutex::new(Vec::new()),
            }
        }
    }

    impl Confirm for Answers {
        async fn ask(&self, question: String) -> Result<String> {
            self.asked.lock().unwrap().push(question);
            Ok(self.answers.lock().unwrap().pop().unwrap_or_default())
        }
    }
}
