//! Glob-style ignore patterns applied while enumerating static files.

use glob::Pattern;

use crate::error::DiscoveryError;

/// Patterns skipped by every finder unless configured otherwise
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &["CVS", ".*", "*~"];

/// Compiled set of ignore patterns
///
/// A file is ignored when either its basename or its path relative to the
/// storage root matches. Directories are pruned on their basename only.
#[derive(Debug, Clone, Default)]
pub struct IgnorePatterns {
    patterns: Vec<Pattern>,
}

impl IgnorePatterns {
    /// Compile a list of shell-style patterns
    pub fn new<I, S>(patterns: I) -> Result<Self, DiscoveryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                Pattern::new(p).map_err(|e| DiscoveryError::InvalidPattern {
                    pattern: p.to_string(),
                    message: e.msg.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Patterns matching nothing
    pub fn none() -> Self {
        Self::default()
    }

    fn any_match(&self, candidate: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(candidate))
    }

    /// Check a file by basename and by relative path
    pub fn ignores_file(&self, relative_path: &str) -> bool {
        let basename = relative_path.rsplit('/').next().unwrap_or(relative_path);
        self.any_match(basename) || self.any_match(relative_path)
    }

    /// Check a directory by its basename
    pub fn ignores_dir(&self, name: &str) -> bool {
        self.any_match(name)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> IgnorePatterns {
        IgnorePatterns::new(DEFAULT_IGNORE_PATTERNS).unwrap()
    }

    #[test]
    fn test_default_patterns_skip_hidden_and_backup_files() {
        let ignore = defaults();
        assert!(ignore.ignores_file(".DS_Store"));
        assert!(ignore.ignores_file("css/.hidden"));
        assert!(ignore.ignores_file("js/app.js~"));
        assert!(!ignore.ignores_file("js/app.js"));
    }

    #[test]
    fn test_directories_match_on_basename() {
        let ignore = defaults();
        assert!(ignore.ignores_dir("CVS"));
        assert!(ignore.ignores_dir(".git"));
        assert!(!ignore.ignores_dir("vendor"));
    }

    #[test]
    fn test_full_relative_path_match() {
        let ignore = IgnorePatterns::new(["vendor/*.map"]).unwrap();
        assert!(ignore.ignores_file("vendor/jquery.min.map"));
        assert!(!ignore.ignores_file("jquery.min.map"));
    }

    #[test]
    fn test_invalid_pattern_is_a_discovery_error() {
        let err = IgnorePatterns::new(["[unclosed"]).unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidPattern { .. }));
    }

    #[test]
    fn test_none_matches_nothing() {
        let ignore = IgnorePatterns::none();
        assert!(ignore.is_empty());
        assert!(!ignore.ignores_file(".hidden"));
    }
}
