//! Request path matching for the static URL prefix.

use crate::static_url::StaticPrefix;

/// Decides which request paths belong to the built static output
#[derive(Debug, Clone)]
pub struct StaticMatcher {
    prefix: StaticPrefix,
}

impl StaticMatcher {
    pub fn new(prefix: StaticPrefix) -> Self {
        Self { prefix }
    }

    pub fn prefix(&self) -> &StaticPrefix {
        &self.prefix
    }

    /// Path relative to the prefix, or `None` when the request is not static.
    ///
    /// Pure string operation; the filesystem is never consulted.
    pub fn match_path<'a>(&self, request_path: &'a str) -> Option<&'a str> {
        self.prefix.strip(request_path)
    }
}
