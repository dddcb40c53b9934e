//! Filesystem locations for installed fonts, backups, and the fontconfig fragment.

use crate::model::Scope;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const GLOBAL_FONTS_DIR: &str = "/usr/share/fonts";
const BACKUP_DIR_NAME: &str = ".bkp";
const FONTCONFIG_FRAGMENT: &str = "61-user-fonts.conf";

#[derive(Debug, Clone)]
pub struct FontLayout {
    scope: Scope,
    root: PathBuf,
    fontconfig_dir: PathBuf,
}

impl FontLayout {
    pub fn new(scope: Scope, root: impl Into<PathBuf>, fontconfig_dir: impl Into<PathBuf>) -> Self {
        Self {
            scope,
            root: root.into(),
            fontconfig_dir: fontconfig_dir.into(),
        }
    }

    /// Resolve the standard locations for `scope` from the user's home and config dirs.
    pub fn resolve(scope: Scope) -> Result<Self> {
        let config = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .context("could not determine the user config directory")?;
        let fontconfig_dir = config.join("fontconfig").join("conf.d");

        let root = match scope {
            Scope::Global => PathBuf::from(GLOBAL_FONTS_DIR),
            Scope::Local => dirs::home_dir()
                .context("could not determine the home directory")?
                .join(".local")
                .join("share")
                .join("fonts"),
        };
        Ok(Self::new(scope, root, fontconfig_dir))
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn font_dir(&self, font: &str) -> PathBuf {
        self.root.join(font)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join(BACKUP_DIR_NAME)
    }

    /// First free backup slot: `.bkp/<font>`, then `.bkp/<font>.1`, `.bkp/<font>.2`, ...
    pub fn backup_target(&self, font: &str) -> PathBuf {
        let dir = self.backup_dir();
        let first = dir.join(font);
        if !first.exists() {
            return first;
        }
        (1u32..)
            .map(|n| dir.join(format!("{font}.{n}")))
            .find(|p| !p.exists())
            .unwrap_or(first)
    }

    pub fn fontconfig_dir(&self) -> &Path {
        &self.fontconfig_dir
    }

    pub fn fontconfig_fragment(&self) -> PathBuf {
        self.fontconfig_dir.join(FONTCONFIG_FRAGMENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn paths_hang_off_the_root() {
        let layout = FontLayout::new(Scope::Global, "/usr/share/fonts", "/etc/conf.d");
        assert_eq!(layout.font_dir("Hack"), PathBuf::from("/usr/share/fonts/Hack"));
        assert_eq!(layout.backup_dir(), PathBuf::from("/usr/share/fonts/.bkp"));
        assert_eq!(
            layout.fontconfig_fragment(),
            PathBuf::from("/etc/conf.d/61-user-fonts.conf")
        );
    }

    #[test]
    fn backup_target_skips_taken_slots() {
        let dir = tempdir().unwrap();
        let layout = FontLayout::new(Scope::Local, dir.path(), dir.path().join("conf.d"));

        assert_eq!(layout.backup_target("Hack"), dir.path().join(".bkp/Hack"));

        std::fs::create_dir_all(dir.path().join(".bkp/Hack")).unwrap();
        std::fs::create_dir_all(dir.path().join(".bkp/Hack.1")).unwrap();
        assert_eq!(layout.backup_target("Hack"), dir.path().join(".bkp/Hack.2"));
    }

    #[test]
    fn global_scope_uses_system_fonts_dir() {
        if dirs::home_dir().is_none() {
            return;
        }
        let layout = FontLayout::resolve(Scope::Global).unwrap();
        assert_eq!(layout.root(), Path::new("/usr/share/fonts"));
        assert!(layout.fontconfig_fragment().ends_with("fontconfig/conf.d/61-user-fonts.conf"));
    }
}
