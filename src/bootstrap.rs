//! Environment preparation before any download, and the font cache refresh after.

use crate::layout::FontLayout;
use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Make sure the per-user fonts directory exists and is registered with fontconfig.
/// Returns the path of the written fontconfig fragment.
pub fn prepare_local(layout: &FontLayout) -> Result<std::path::PathBuf> {
    std::fs::create_dir_all(layout.root())
        .with_context(|| format!("failed to create {}", layout.root().display()))?;
    std::fs::create_dir_all(layout.fontconfig_dir())
        .with_context(|| format!("failed to create {}", layout.fontconfig_dir().display()))?;

    let fragment = layout.fontconfig_fragment();
    std::fs::write(&fragment, fontconfig_fragment(layout.root()))
        .with_context(|| format!("failed to write {}", fragment.display()))?;
    log::debug!("wrote {}", fragment.display());
    Ok(fragment)
}

fn fontconfig_fragment(fonts_dir: &Path) -> String {
    let dir = fonts_dir
        .display()
        .to_string()
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!(
        r#"<?xml version="1.0"?>
<!DOCTYPE fontconfig SYSTEM "fonts.dtd">
<fontconfig>
  <dir>{dir}</dir>
</fontconfig>
"#
    )
}

/// Start the font cache rebuild without waiting for it.
pub fn spawn_cache_refresh(tool: &str) -> Result<()> {
    log::debug!("spawning {tool}");
    Command::new(tool)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to start {tool}"))?;
    Ok(())
}
