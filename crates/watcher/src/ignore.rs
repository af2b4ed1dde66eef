//! Ignore predicates for snapshot building
//!
//! Anything that can answer "should this path be skipped?" is an [`Ignore`]:
//! plain closures, [`NoIgnore`], [`IgnoreSet`], or [`IgnoreRules`], which combines:
//! 1. Built-in patterns (VCS metadata, editor temp files - always active)
//! 2. .gitignore patterns from the watched root (optional, enabled by default)
//! 3. Config-based patterns (gitignore syntax)
//! 4. A suffix allow-list for files (e.g. only `.tex`)

use crate::Result;
use ::ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Decides whether a path is left out of snapshots entirely
///
/// Called with the full path of every entry below a watched root. Returning
/// `true` for a directory skips its whole subtree.
pub trait Ignore: Send + Sync {
    fn is_ignored(&self, path: &Path) -> bool;

    /// Same decision for a walked entry whose link type is already known
    ///
    /// Rule sets that care about directories override this to skip the stat
    /// `is_ignored` would need.
    fn is_ignored_entry(&self, path: &Path, _is_dir: bool) -> bool {
        self.is_ignored(path)
    }
}

impl<F> Ignore for F
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    fn is_ignored(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Ignores nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIgnore;

impl Ignore for NoIgnore {
    fn is_ignored(&self, _path: &Path) -> bool {
        false
    }
}

/// Ignore rule set for one watched root
pub struct IgnoreRules {
    /// Watched root directory
    root: PathBuf,

    /// Gitignore patterns from `<root>/.gitignore` (optional)
    gitignore: Option<Gitignore>,

    /// Patterns from `IgnoreConfig::additional_patterns` (optional)
    extra: Option<Gitignore>,

    /// Configuration
    config: IgnoreConfig,
}

impl IgnoreRules {
    /// Load ignore rules for a watched root
    pub fn load(root: &Path, config: IgnoreConfig) -> Result<Self> {
        let mut rules = Self {
            root: root.to_path_buf(),
            gitignore: None,
            extra: None,
            config,
        };

        rules.reload()?;
        Ok(rules)
    }

    /// Re-read .gitignore and rebuild config patterns
    pub fn reload(&mut self) -> Result<()> {
        self.gitignore = None;
        if self.config.use_gitignore {
            let gitignore_path = self.root.join(".gitignore");
            if gitignore_path.is_file() {
                let mut builder = GitignoreBuilder::new(&self.root);
                if let Some(err) = builder.add(&gitignore_path) {
                    return Err(err.into());
                }
                self.gitignore = Some(builder.build()?);
            }
        }

        self.extra = None;
        if !self.config.additional_patterns.is_empty() {
            let mut builder = GitignoreBuilder::new(&self.root);
            for pattern in &self.config.additional_patterns {
                builder.add_line(None, pattern)?;
            }
            self.extra = Some(builder.build()?);
        }

        Ok(())
    }

    /// Check if path matches built-in ignore patterns
    ///
    /// These are always enforced regardless of configuration
    fn is_builtin_ignored(path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };

        // Version control metadata
        if matches!(name, ".git" | ".hg" | ".svn" | ".jj") {
            return true;
        }

        // Vim swap files and Vim/Emacs backups
        if name.ends_with(".swp") || name.ends_with(".swo") || name.ends_with('~') {
            return true;
        }

        // Emacs auto-save (#*#) and lock files (.#*)
        if (name.starts_with('#') && name.ends_with('#')) || name.starts_with(".#") {
            return true;
        }

        // MacOS / Windows system files
        matches!(name, ".DS_Store" | "Thumbs.db" | "desktop.ini") || name.starts_with("._")
    }

    fn matches_suffix(&self, path: &Path) -> bool {
        let name = path.to_string_lossy();
        self.config.suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
    }

    /// Number of active ignore sources
    pub fn active_sources(&self) -> usize {
        let mut count = 1; // Built-in always active
        if self.gitignore.is_some() {
            count += 1;
        }
        if self.extra.is_some() {
            count += 1;
        }
        if !self.config.suffixes.is_empty() {
            count += 1;
        }
        count
    }

    /// Watched root these rules were loaded for
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Update configuration and reload
    pub fn update_config(&mut self, config: IgnoreConfig) -> Result<()> {
        self.config = config;
        self.reload()
    }
}

impl Ignore for IgnoreRules {
    fn is_ignored(&self, path: &Path) -> bool {
        // Link metadata, matching what the snapshot records
        let is_dir = path
            .symlink_metadata()
            .map(|m| m.is_dir())
            .unwrap_or(false);
        self.is_ignored_entry(path, is_dir)
    }

    fn is_ignored_entry(&self, path: &Path, is_dir: bool) -> bool {
        // 1. Built-in patterns (highest priority - always enforced)
        if Self::is_builtin_ignored(path) {
            return true;
        }

        // 2. .gitignore and config patterns
        for rules in [&self.gitignore, &self.extra].into_iter().flatten() {
            if rules.matched(path, is_dir).is_ignore() {
                return true;
            }
        }

        // 3. Suffix allow-list applies to files only so nested matches are still reached
        !is_dir && !self.config.suffixes.is_empty() && !self.matches_suffix(path)
    }
}

/// Rules for several watched roots
///
/// Each path is judged by the rules of the deepest root containing it.
pub struct IgnoreSet {
    rules: Vec<IgnoreRules>,
}

impl IgnoreSet {
    /// Load one rule set per root, all sharing `config`
    pub fn load<P: AsRef<Path>>(roots: &[P], config: &IgnoreConfig) -> Result<Self> {
        let rules = roots
            .iter()
            .map(|root| IgnoreRules::load(root.as_ref(), config.clone()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Rule sets in load order
    pub fn rules(&self) -> &[IgnoreRules] {
        &self.rules
    }

    fn rules_for(&self, path: &Path) -> Option<&IgnoreRules> {
        self.rules
            .iter()
            .filter(|rules| path.starts_with(rules.root()))
            .max_by_key(|rules| rules.root().components().count())
    }
}

impl Ignore for IgnoreSet {
    fn is_ignored(&self, path: &Path) -> bool {
        self.rules_for(path).map_or(false, |rules| rules.is_ignored(path))
    }

    fn is_ignored_entry(&self, path: &Path, is_dir: bool) -> bool {
        self.rules_for(path)
            .map_or(false, |rules| rules.is_ignored_entry(path, is_dir))
    }
}

/// Ignore configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreConfig {
    /// Use `<root>/.gitignore` patterns (default: true)
    #[serde(default = "default_true")]
    pub use_gitignore: bool,

    /// Only watch files ending in one of these (empty = all files)
    #[serde(default)]
    pub suffixes: Vec<String>,

    /// Additional gitignore-syntax patterns
    #[serde(default)]
    pub additional_patterns: Vec<String>,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            use_gitignore: true,
            suffixes: Vec::new(),
            additional_patterns: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn rules(root: &Path, config: IgnoreConfig) -> IgnoreRules {
        IgnoreRules::load(root, config).unwrap()
    }

    #[test]
    fn test_closure_is_an_ignore() {
        let not_tex = |p: &Path| !p.to_string_lossy().ends_with(".tex");

        assert!(not_tex.is_ignored(Path::new("notes.txt")));
        assert!(!not_tex.is_ignored(Path::new("paper/main.tex")));
        assert!(!NoIgnore.is_ignored(Path::new("anything")));
    }

    #[test]
    fn test_builtin_patterns() {
        let temp_dir = TempDir::new().unwrap();
        let rules = rules(temp_dir.path(), IgnoreConfig::default());

        assert!(rules.is_ignored(&temp_dir.path().join(".git")));
        assert!(rules.is_ignored(&temp_dir.path().join(".jj")));
        assert!(rules.is_ignored(&temp_dir.path().join(".main.tex.swp")));
        assert!(rules.is_ignored(&temp_dir.path().join("main.tex~")));
        assert!(rules.is_ignored(&temp_dir.path().join("#main.tex#")));
        assert!(rules.is_ignored(&temp_dir.path().join(".DS_Store")));
        assert!(!rules.is_ignored(&temp_dir.path().join("main.tex")));
    }

    #[test]
    fn test_gitignore_patterns() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join(".gitignore"), "*.aux\nbuild/\n").unwrap();
        fs::create_dir(root.join("build")).unwrap();

        let rules = rules(root, IgnoreConfig::default());

        assert!(rules.is_ignored(&root.join("main.aux")));
        assert!(rules.is_ignored(&root.join("build")));
        assert!(!rules.is_ignored(&root.join("main.tex")));
        assert_eq!(rules.active_sources(), 2);
    }

    #[test]
    fn test_gitignore_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join(".gitignore"), "*.aux\n").unwrap();

        let config = IgnoreConfig {
            use_gitignore: false,
            ..IgnoreConfig::default()
        };
        let rules = rules(root, config);

        assert!(!rules.is_ignored(&root.join("main.aux")));
        // Built-ins still apply
        assert!(rules.is_ignored(&root.join(".git")));
        assert_eq!(rules.active_sources(), 1);
    }

    #[test]
    fn test_additional_patterns() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let config = IgnoreConfig {
            use_gitignore: false,
            suffixes: vec![],
            additional_patterns: vec!["*.log".to_string(), "_minted-*".to_string()],
        };

        let rules = rules(root, config);

        assert!(rules.is_ignored(&root.join("main.log")));
        assert!(rules.is_ignored(&root.join("_minted-main")));
        assert!(!rules.is_ignored(&root.join("main.tex")));
    }

    #[test]
    fn test_suffix_filter_keeps_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("chapters")).unwrap();
        fs::write(root.join("chapters/intro.tex"), b"x").unwrap();
        fs::write(root.join("chapters/intro.pdf"), b"x").unwrap();

        let config = IgnoreConfig {
            use_gitignore: false,
            suffixes: vec![".tex".to_string()],
            additional_patterns: vec![],
        };
        let rules = rules(root, config);

        assert!(!rules.is_ignored(&root.join("chapters")));
        assert!(!rules.is_ignored(&root.join("chapters/intro.tex")));
        assert!(rules.is_ignored(&root.join("chapters/intro.pdf")));
    }

    #[test]
    fn test_entry_kind_is_taken_from_caller() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let config = IgnoreConfig {
            use_gitignore: false,
            suffixes: vec![".tex".to_string()],
            additional_patterns: vec!["build/".to_string()],
        };
        let rules = rules(root, config.clone());

        // Nothing exists on disk; only the hint says what kind these are
        let chapters = root.join("chapters");
        assert!(!rules.is_ignored_entry(&chapters, true));
        assert!(rules.is_ignored_entry(&chapters, false));
        assert!(rules.is_ignored_entry(&root.join("build"), true));
        assert!(!rules.is_ignored_entry(&root.join("main.tex"), false));

        let set = IgnoreSet::load(&[root], &config).unwrap();
        assert!(!set.is_ignored_entry(&chapters, true));
        assert!(set.is_ignored_entry(&chapters, false));
    }

    #[test]
    fn test_reload_picks_up_new_gitignore() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let mut rules = rules(root, IgnoreConfig::default());

        assert!(!rules.is_ignored(&root.join("main.aux")));

        fs::write(root.join(".gitignore"), "*.aux\n").unwrap();
        rules.reload().unwrap();

        assert!(rules.is_ignored(&root.join("main.aux")));
    }

    #[test]
    fn test_set_uses_deepest_root() {
        let temp_dir = TempDir::new().unwrap();
        let outer = temp_dir.path();
        let inner = outer.join("inner");
        fs::create_dir(&inner).unwrap();
        fs::write(outer.join(".gitignore"), "*.pdf\n").unwrap();
        fs::write(inner.join(".gitignore"), "*.aux\n").unwrap();

        let set = IgnoreSet::load(&[outer.to_path_buf(), inner.clone()], &IgnoreConfig::default()).unwrap();

        assert_eq!(set.rules().len(), 2);
        assert!(set.is_ignored(&outer.join("main.pdf")));
        assert!(set.is_ignored(&inner.join("main.aux")));
        assert!(!set.is_ignored(&inner.join("main.pdf")));
        assert!(!set.is_ignored(Path::new("/elsewhere/main.pdf")));
    }

    #[test]
    fn test_config_defaults_from_toml() {
        let config: IgnoreConfig = toml::from_str("suffixes = [\".tex\"]").unwrap();

        assert!(config.use_gitignore);
        assert_eq!(config.suffixes, vec![".tex".to_string()]);
        assert!(config.additional_patterns.is_empty());
    }
}
