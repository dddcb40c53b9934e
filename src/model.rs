use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Where fonts are installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Machine-wide, under /usr/share/fonts
    Global,
    /// Current user only, under ~/.local/share/fonts
    Local,
}

/// Decides whether a typed answer to a yes/no question counts as "yes".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnswerPolicy {
    /// Only "y" or "yes", case-insensitive
    #[default]
    Strict,
    /// Any non-empty answer
    Lenient,
}

impl AnswerPolicy {
    pub fn accepts(self, answer: &str) -> bool {
        let answer = answer.trim();
        match self {
            AnswerPolicy::Strict => {
                answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
            }
            AnswerPolicy::Lenient => !answer.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub base_url: String,
    pub release: String,
    pub concurrency: usize,
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub attempt_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
    pub overwrite_answers: AnswerPolicy,
    pub user_agent: String,
    pub elevation_helper: String,
    pub cache_tool: String,
}

impl RunConfig {
    /// Release archive URL for a font, `<base>/<release>/<font>.tar.xz`.
    pub fn archive_url(&self, font: &str) -> Result<Url> {
        let base = self.base_url.trim_end_matches('/');
        let raw = format!("{base}/{}/{font}.tar.xz", self.release);
        Url::parse(&raw).with_context(|| format!("invalid archive URL: {raw}"))
    }
}

/// Progress events emitted by install workers and consumed by the CLI layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InstallEvent {
    FontStarted {
        font: String,
    },
    BackedUp {
        font: String,
        backup: PathBuf,
    },
    AttemptFailed {
        font: String,
        attempt: u32,
        max_attempts: u32,
        reason: String,
    },
    Installed {
        font: String,
        path: PathBuf,
        bytes: u64,
    },
    Skipped {
        font: String,
    },
    GaveUp {
        font: String,
        attempts: u32,
    },
    Info(InfoEvent),
}

impl InstallEvent {
    /// Failures go to stderr, everything else to stdout.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            InstallEvent::AttemptFailed { .. } | InstallEvent::GaveUp { .. }
        )
    }

    /// Render a human-readable line for the terminal.
    pub fn to_message(&self) -> String {
        match self {
            InstallEvent::FontStarted { font } => format!("Fetching {font}"),
            InstallEvent::BackedUp { font, backup } => {
                format!("{font}: previous install moved to {}", backup.display())
            }
            InstallEvent::AttemptFailed {
                font,
                attempt,
                max_attempts,
                reason,
            } => {
                if attempt < max_attempts {
                    format!(
                        "{font}: download and extraction failed (attempt {attempt}/{max_attempts}): {reason}. Retrying..."
                    )
                } else {
                    format!(
                        "{font}: download and extraction failed (attempt {attempt}/{max_attempts}): {reason}"
                    )
                }
            }
            InstallEvent::Installed { font, path, bytes } => {
                let size_mb = *bytes as f64 / 1024.0 / 1024.0;
                format!(
                    "Font {font} download & extraction successful ({size_mb:.2} MB) -> {}",
                    path.display()
                )
            }
            InstallEvent::Skipped { font } => format!("{font}: keeping existing install"),
            InstallEvent::GaveUp { font, attempts } => format!(
                "{font}: maximum number of retries reached after {attempts} attempt(s). Download and extraction failed."
            ),
            InstallEvent::Info(info) => info.to_message(),
        }
    }
}

/// Structured info events that are not tied to a single attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InfoEvent {
    Dispatching { fonts: usize, workers: usize },
}

impl InfoEvent {
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Dispatching { fonts, workers } => {
                format!("Installing {fonts} font(s) with up to {workers} concurrent downloads")
            }
        }
    }
}

/// Final state of one font after its worker finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FontOutcome {
    Installed {
        font: String,
        path: PathBuf,
        attempts: u32,
        bytes: u64,
    },
    Skipped {
        font: String,
    },
    Failed {
        font: String,
        attempts: u32,
        reason: String,
    },
}

impl FontOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, FontOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default)]
    pub timestamp_utc: String,
    pub scope: Scope,
    pub fonts_root: PathBuf,
    pub config: RunConfig,
    pub outcomes: Vec<FontOutcome>,
}

impl RunSummary {
    pub fn installed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FontOutcome::Installed { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FontOutcome::Skipped { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn test_config() -> RunConfig {
        RunConfig {
            base_url: "https://github.com/ryanoasis/nerd-fonts/releases/download".into(),
            release: "v3.0.2".into(),
            concurrency: 5,
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(10),
            retry_delay: Duration::from_secs(1),
            overwrite_answers: AnswerPolicy::Strict,
            user_agent: "nerdfont-install/test".into(),
            elevation_helper: "sudo".into(),
            cache_tool: "fc-cache".into(),
        }
    }

    #[test]
    fn strict_policy_only_accepts_yes() {
        let p = AnswerPolicy::Strict;
        assert!(p.accepts("y"));
        assert!(p.accepts("Y\n"));
        assert!(p.accepts(" yes "));
        assert!(!p.accepts("n"));
        assert!(!p.accepts("no"));
        assert!(!p.accepts(""));
        assert!(!p.accepts("nope, keep it"));
    }

    #[test]
    fn lenient_policy_accepts_anything_typed() {
        let p = AnswerPolicy::Lenient;
        assert!(p.accepts("y"));
        assert!(p.accepts("n"));
        assert!(!p.accepts("   \n"));
    }

    #[test]
    fn archive_url_follows_release_layout() {
        let cfg = test_config();
        let url = cfg.archive_url("JetBrainsMono").unwrap();
        assert_eq!(
            url.as_str(),
            "https://github.com/ryanoasis/nerd-fonts/releases/download/v3.0.2/JetBrainsMono.tar.xz"
        );

        let mut trailing = test_config();
        trailing.base_url.push('/');
        assert_eq!(trailing.archive_url("Hack").unwrap().path().matches("//").count(), 0);
    }

    #[test]
    fn summary_counts_outcomes() {
        let summary = RunSummary {
            timestamp_utc: String::new(),
            scope: Scope::Local,
            fonts_root: PathBuf::from("/tmp/fonts"),
            config: test_config(),
            outcomes: vec![
                FontOutcome::Installed {
                    font: "Hack".into(),
                    path: PathBuf::from("/tmp/fonts/Hack"),
                    attempts: 1,
                    bytes: 10,
                },
                FontOutcome::Skipped {
                    font: "Agave".into(),
                },
                FontOutcome::Failed {
                    font: "Noto".into(),
                    attempts: 3,
                    reason: "timed out".into(),
                },
            ],
        };
        assert_eq!(summary.installed(), 1);
        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.failed(), 1);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["outcomes"][2]["status"], "failed");
        assert_eq!(json["config"]["attempt_timeout"], "10s");
    }
}

#[cfg(test)]
pub(crate) use tests::test_config;
