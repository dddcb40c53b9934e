//! Text summary builder for CLI output.

use crate::model::{FontOutcome, RunSummary};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

pub(crate) fn build_text_summary(summary: &RunSummary) -> TextSummary {
    let mut lines = Vec::new();

    lines.push(String::new());
    lines.push(format!("Fonts directory: {}", summary.fonts_root.display()));
    for outcome in &summary.outcomes {
        lines.push(match outcome {
            FontOutcome::Installed {
                font, attempts, ..
            } if *attempts > 1 => format!("  {font}: installed (after {attempts} attempts)"),
            FontOutcome::Installed { font, .. } => format!("  {font}: installed"),
            FontOutcome::Skipped { font } => format!("  {font}: kept existing"),
            FontOutcome::Failed { font, reason, .. } => format!("  {font}: FAILED ({reason})"),
        });
    }

    let failed = summary.failed();
    if failed == 0 {
        lines.push("Download, extraction, and install successful!".to_string());
    } else {
        lines.push(format!(
            "{} installed, {} kept, {} failed",
            summary.installed(),
            summary.skipped(),
            failed
        ));
    }

    TextSummary { lines }
}
