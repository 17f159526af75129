//! Normalized static URL prefix.
//!
//! The same [`StaticPrefix`] value feeds the copy destinations written into the
//! webpack config and the request matcher that serves the build output. Any
//! divergence between the two turns a successful build into 404s.

use std::fmt;

/// Normalized static URL path, without leading or trailing slashes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StaticPrefix(String);

impl StaticPrefix {
    /// Normalize a static URL such as `/static/`, `static` or `/assets//v1/../v2/`
    pub fn new(static_url: &str) -> Self {
        let mut segments: Vec<&str> = Vec::new();
        for segment in static_url.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                s => segments.push(s),
            }
        }
        Self(segments.join("/"))
    }

    /// `static` for a static URL of `/static/`; empty when serving from the root
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// URL form with surrounding slashes, e.g. `/static/`
    pub fn url_prefix(&self) -> String {
        if self.is_root() {
            "/".to_string()
        } else {
            format!("/{}/", self.0)
        }
    }

    /// Output-relative destination for a public path, e.g. `static/js/app.js`
    pub fn join(&self, public_path: &str) -> String {
        let public_path = public_path.trim_start_matches('/');
        if self.is_root() {
            public_path.to_string()
        } else {
            format!("{}/{}", self.0, public_path)
        }
    }

    /// Remainder of `path` after the prefix, if the prefix matches at the start.
    ///
    /// A single leading `/` on `path` is accepted, so both `/static/a.js` and
    /// `static/a.js` yield `a.js`.
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        let path = path.strip_prefix('/').unwrap_or(path);
        if self.is_root() {
            return Some(path);
        }
        path.strip_prefix(self.0.as_str())?.strip_prefix('/')
    }
}

impl fmt::Display for StaticPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        assert_eq!(StaticPrefix::new("/static/").as_str(), "static");
        assert_eq!(StaticPrefix::new("static").as_str(), "static");
        assert_eq!(StaticPrefix::new("static/").as_str(), "static");
        assert_eq!(StaticPrefix::new("/assets//v1/../v2/").as_str(), "assets/v2");
        assert_eq!(StaticPrefix::new("/./").as_str(), "");
    }

    #[test]
    fn test_url_prefix() {
        assert_eq!(StaticPrefix::new("static").url_prefix(), "/static/");
        assert_eq!(StaticPrefix::new("/").url_prefix(), "/");
    }

    #[test]
    fn test_join() {
        let prefix = StaticPrefix::new("/static/");
        assert_eq!(prefix.join("js/app.js"), "static/js/app.js");
        assert_eq!(StaticPrefix::new("/").join("js/app.js"), "js/app.js");
    }

    #[test]
    fn test_strip_requires_match_at_start() {
        let prefix = StaticPrefix::new("/static/");
        assert_eq!(prefix.strip("/static/js/app.js"), Some("js/app.js"));
        assert_eq!(prefix.strip("static/js/app.js"), Some("js/app.js"));
        assert_eq!(prefix.strip("/static/"), Some(""));
        assert_eq!(prefix.strip("/static"), None);
        assert_eq!(prefix.strip("/staticfiles/a.js"), None);
        assert_eq!(prefix.strip("/app/static/a.js"), None);
    }

    #[test]
    fn test_join_then_strip_is_identity() {
        for url in ["/static/", "/assets/v2/", "/"] {
            let prefix = StaticPrefix::new(url);
            for p in ["app.js", "js/app.js", "img/deep/logo.svg"] {
                assert_eq!(prefix.strip(&prefix.join(p)), Some(p));
            }
        }
    }
}
