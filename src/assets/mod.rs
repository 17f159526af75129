//! Static asset registry.
//!
//! Aggregates files reported by a sequence of [`AssetFinder`]s into a single
//! mapping keyed by public path. The first finder (and the first file within
//! it) to claim a public path wins; later duplicates are dropped silently, so
//! finder order encodes override precedence between asset sources.

pub mod finder;
pub mod ignore;

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::error::DiscoveryError;

pub use finder::{AppDirectoriesFinder, AssetFinder, AssetStorage, DirectoryFinder, FoundFile};
pub use ignore::{IgnorePatterns, DEFAULT_IGNORE_PATTERNS};

/// A static file resolved to its physical location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticAsset {
    pub public_path: String,
    pub location: PathBuf,
    pub relative_path: String,
}

impl StaticAsset {
    /// Absolute path of the file on disk
    pub fn source_path(&self) -> PathBuf {
        self.location.join(&self.relative_path)
    }
}

/// Deduplicated mapping from public path to [`StaticAsset`], in discovery order
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    assets: IndexMap<String, StaticAsset>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file unless its public path is already claimed.
    ///
    /// Returns true when the file was inserted.
    pub fn insert(&mut self, found: FoundFile) -> bool {
        let public_path = found.storage.public_path(&found.relative_path);
        if self.assets.contains_key(&public_path) {
            return false;
        }
        self.assets.insert(
            public_path.clone(),
            StaticAsset {
                public_path,
                location: found.storage.location,
                relative_path: found.relative_path,
            },
        );
        true
    }

    pub fn get(&self, public_path: &str) -> Option<&StaticAsset> {
        self.assets.get(public_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StaticAsset> {
        self.assets.values()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// `{ public_path: [location, relative_path] }` in registry order
    pub fn listing(&self) -> IndexMap<&str, ListingEntry<'_>> {
        self.assets
            .iter()
            .map(|(k, a)| (k.as_str(), ListingEntry(a.location.display().to_string(), &a.relative_path)))
            .collect()
    }
}

/// Serialized as a two-element array
#[derive(Debug, Serialize)]
pub struct ListingEntry<'a>(pub String, pub &'a str);

/// Run every finder in order and build the registry.
///
/// A failing finder aborts the whole collection.
pub fn collect(
    finders: &[Box<dyn AssetFinder>],
    ignore: &IgnorePatterns,
) -> Result<AssetRegistry, DiscoveryError> {
    let mut registry = AssetRegistry::new();
    for finder in finders {
        let found = finder.list(ignore)?;
        let total = found.len();
        let inserted = found.into_iter().filter(|f| registry.insert(f.clone())).count();
        debug!(finder = finder.name(), total, inserted, "Collected static files");
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedFinder {
        name: &'static str,
        files: Vec<FoundFile>,
    }

    impl FixedFinder {
        fn new(name: &'static str, location: &str, paths: &[&str]) -> Self {
            let storage = AssetStorage::new(location);
            Self {
                name,
                files: paths
                    .iter()
                    .map(|p| FoundFile {
                        relative_path: (*p).to_string(),
                        storage: storage.clone(),
                    })
                    .collect(),
            }
        }
    }

    impl AssetFinder for FixedFinder {
        fn name(&self) -> &str {
            self.name
        }

        fn list(&self, _ignore: &IgnorePatterns) -> Result<Vec<FoundFile>, DiscoveryError> {
            Ok(self.files.clone())
        }
    }

    struct FailingFinder;

    impl AssetFinder for FailingFinder {
        fn name(&self) -> &str {
            "failing"
        }

        fn list(&self, _ignore: &IgnorePatterns) -> Result<Vec<FoundFile>, DiscoveryError> {
            Err(DiscoveryError::Other {
                finder: "failing".to_string(),
                message: "boom".to_string(),
            })
        }
    }

    #[test]
    fn test_first_finder_wins_in_either_order() {
        let first: Vec<Box<dyn AssetFinder>> = vec![
            Box::new(FixedFinder::new("a", "/a", &["js/app.js"])),
            Box::new(FixedFinder::new("b", "/b", &["js/app.js"])),
        ];
        let registry = collect(&first, &IgnorePatterns::none()).unwrap();
        assert_eq!(registry.get("js/app.js").unwrap().location, PathBuf::from("/a"));

        let reversed: Vec<Box<dyn AssetFinder>> = vec![
            Box::new(FixedFinder::new("b", "/b", &["js/app.js"])),
            Box::new(FixedFinder::new("a", "/a", &["js/app.js"])),
        ];
        let registry = collect(&reversed, &IgnorePatterns::none()).unwrap();
        assert_eq!(registry.get("js/app.js").unwrap().location, PathBuf::from("/b"));
    }

    #[test]
    fn test_prefix_forms_public_path() {
        let mut registry = AssetRegistry::new();
        let inserted = registry.insert(FoundFile {
            relative_path: "app.js".to_string(),
            storage: AssetStorage::new("/src").with_prefix("js"),
        });
        assert!(inserted);

        let asset = registry.get("js/app.js").unwrap();
        assert_eq!(asset.relative_path, "app.js");
        assert_eq!(asset.source_path(), PathBuf::from("/src/app.js"));
    }

    #[test]
    fn test_duplicate_insert_is_dropped() {
        let mut registry = AssetRegistry::new();
        let file = FoundFile {
            relative_path: "a.css".to_string(),
            storage: AssetStorage::new("/one"),
        };
        assert!(registry.insert(file.clone()));
        assert!(!registry.insert(FoundFile {
            storage: AssetStorage::new("/two"),
            ..file
        }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_preserves_discovery_order() {
        let finders: Vec<Box<dyn AssetFinder>> = vec![
            Box::new(FixedFinder::new("a", "/a", &["z.js", "a.js"])),
            Box::new(FixedFinder::new("b", "/b", &["m.js", "z.js"])),
        ];
        let registry = collect(&finders, &IgnorePatterns::none()).unwrap();
        let order: Vec<&str> = registry.iter().map(|a| a.public_path.as_str()).collect();
        assert_eq!(order, vec!["z.js", "a.js", "m.js"]);
    }

    #[test]
    fn test_failing_finder_propagates() {
        let finders: Vec<Box<dyn AssetFinder>> = vec![
            Box::new(FixedFinder::new("a", "/a", &["a.js"])),
            Box::new(FailingFinder),
        ];
        let err = collect(&finders, &IgnorePatterns::none()).unwrap_err();
        assert!(matches!(err, DiscoveryError::Other { .. }));
    }

    #[test]
    fn test_listing_serializes_as_pairs() {
        let finders: Vec<Box<dyn AssetFinder>> =
            vec![Box::new(FixedFinder::new("a", "/src", &["app.js"]))];
        let registry = collect(&finders, &IgnorePatterns::none()).unwrap();
        let json = serde_json::to_value(registry.listing()).unwrap();
        assert_eq!(json, serde_json::json!({ "app.js": ["/src", "app.js"] }));
    }
}
