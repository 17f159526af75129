//! HTML directory index for the development server.

use std::io;
use std::path::Path;

use handlebars::Handlebars;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Serialize;
use serde_json::json;

const LISTING_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta http-equiv="Content-type" content="text/html; charset=utf-8">
    <meta http-equiv="Content-Language" content="en-us">
    <meta name="robots" content="NONE,NOARCHIVE">
    <title>Index of {{directory}}</title>
  </head>
  <body>
    <h1>Index of {{directory}}</h1>
    <ul>
{{#if parent}}
      <li><a href="../">../</a></li>
{{/if}}
{{#each entries}}
      <li><a href="{{href}}">{{name}}</a></li>
{{/each}}
    </ul>
  </body>
</html>
"#;

/// Bytes escaped in a relative link to a single path segment
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`');

#[derive(Debug, Serialize, PartialEq, Eq)]
struct Entry {
    name: String,
    href: String,
}

/// Sorted entries of `dir`, hidden files skipped, directories suffixed with `/`
fn entries(dir: &Path) -> io::Result<Vec<Entry>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        let href = utf8_percent_encode(&name, SEGMENT).to_string();
        let entry = if entry.path().is_dir() {
            Entry {
                name: format!("{name}/"),
                href: format!("{href}/"),
            }
        } else {
            Entry { name, href }
        };
        entries.push(entry);
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Render the index page for `dir`, displayed as `url_path`
pub fn render_listing(url_path: &str, dir: &Path) -> io::Result<String> {
    let directory = if url_path.ends_with('/') {
        url_path.to_string()
    } else {
        format!("{url_path}/")
    };
    let parent = directory != "/";
    let context = json!({
        "directory": directory,
        "parent": parent,
        "entries": entries(dir)?,
    });

    Handlebars::new()
        .render_template(LISTING_TEMPLATE, &context)
        .map_err(io::Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_entries_sorted_with_dirs_marked() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("js")).unwrap();
        std::fs::write(temp.path().join("app.css"), "").unwrap();
        std::fs::write(temp.path().join(".hidden"), "").unwrap();

        let names: Vec<String> = entries(temp.path()).unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["app.css", "js/"]);
    }

    #[test]
    fn test_listing_escapes_names() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a<b>.js"), "").unwrap();

        let html = render_listing("/static/js", temp.path()).unwrap();
        assert!(html.contains("<title>Index of /static/js/</title>"));
        assert!(html.contains("a&lt;b&gt;.js"));
        assert!(html.contains(r#"<a href="../">../</a>"#));
    }

    #[test]
    fn test_hrefs_are_percent_encoded() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a#b?.js"), "").unwrap();
        std::fs::create_dir(temp.path().join("my dir")).unwrap();

        let entries = entries(temp.path()).unwrap();
        assert_eq!(
            entries,
            vec![
                Entry {
                    name: "a#b?.js".to_string(),
                    href: "a%23b%3F.js".to_string(),
                },
                Entry {
                    name: "my dir/".to_string(),
                    href: "my%20dir/".to_string(),
                },
            ]
        );

        let html = render_listing("/static/", temp.path()).unwrap();
        assert!(html.contains(r#"<a href="a%23b%3F.js">a#b?.js</a>"#));
    }

    #[test]
    fn test_root_listing_has_no_parent_link() {
        let temp = TempDir::new().unwrap();
        let html = render_listing("/", temp.path()).unwrap();
        assert!(!html.contains(r#"href="../""#));
    }
}
