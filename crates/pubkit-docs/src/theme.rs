//! The Jekyll theme shipped with pubkit.
//!
//! The files are embedded in the binary and written verbatim into the staging
//! tree on every serve or publish run.

use std::fs;
use std::io;
use std::path::Path;

/// Theme location, relative to the staging root.
pub const THEME_DIR: &str = "themes/jekyll";

/// A file inside the theme directory.
#[derive(Debug, Clone, Copy)]
pub struct ThemeFile {
    /// Path relative to [`THEME_DIR`]
    pub path: &'static str,
    pub contents: &'static str,
}

/// Every file that makes up the theme.
pub const THEME_FILES: &[ThemeFile] = &[
    ThemeFile {
        path: "_layouts/default.html",
        contents: DEFAULT_LAYOUT,
    },
    ThemeFile {
        path: "_includes/release-nav.html",
        contents: RELEASE_NAV,
    },
    ThemeFile {
        path: "css/main.css",
        contents: MAIN_CSS,
    },
];

/// Bundler manifest staged next to `_config.yml` so `bundle exec jekyll` resolves.
pub const GEMFILE: &str = r#"source "https://rubygems.org"

gem "jekyll", "~> 4.3"
gem "webrick", "~> 1.8"
"#;

/// Write the theme under `staging_root`. Returns the number of files written.
pub fn install(staging_root: &Path) -> io::Result<usize> {
    let theme_root = staging_root.join(THEME_DIR);

    for file in THEME_FILES {
        let dest = theme_root.join(file.path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, file.contents)?;
    }

    Ok(THEME_FILES.len())
}

const DEFAULT_LAYOUT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{% if page.title %}{{ page.title }} - {% endif %}{{ site.title }}</title>
  <link rel="stylesheet" href="{{ '/themes/jekyll/css/main.css' | relative_url }}">
</head>
<body>
  <header class="site-header">
    <a class="site-title" href="{{ '/' | relative_url }}">{{ site.title }}</a>
  </header>
  <div class="layout">
    <nav class="sidebar">
      {% include release-nav.html %}
    </nav>
    <main class="content">
      {{ content }}
    </main>
  </div>
</body>
</html>
"#;

const RELEASE_NAV: &str = r#"{% assign releases = site.data.releases %}
{% if releases %}
<h2>Reference Docs</h2>
<ul class="release-list">
  {% for channel in releases %}
    {% if channel[0] != 'other' %}
    <li>
      <a href="{{ channel[1].latest | relative_url }}">Latest {{ channel[0] }}</a>
      <ul>
        {% for path in channel[1].all %}
        <li><a href="{{ path | relative_url }}">{{ path | split: '/' | last }}</a></li>
        {% endfor %}
      </ul>
    </li>
    {% endif %}
  {% endfor %}
  {% for path in releases.other %}
  <li><a href="{{ path | relative_url }}">{{ path | split: '/' | last }}</a></li>
  {% endfor %}
</ul>
{% endif %}
"#;

const MAIN_CSS: &str = r#"* {
  box-sizing: border-box;
}

body {
  margin: 0;
  font-family: system-ui, -apple-system, sans-serif;
  color: #212121;
  line-height: 1.6;
}

.site-header {
  padding: 1rem 2rem;
  background: #263238;
}

.site-title {
  color: #fff;
  font-weight: 700;
  text-decoration: none;
}

.layout {
  display: grid;
  grid-template-columns: 240px 1fr;
  min-height: calc(100vh - 3.5rem);
}

.sidebar {
  padding: 1.5rem;
  background: #eceff1;
}

.release-list {
  list-style: none;
  padding: 0;
}

.release-list ul {
  list-style: none;
  padding-left: 1rem;
}

.content {
  padding: 2rem;
  max-width: 860px;
}

.content pre {
  padding: 1rem;
  overflow-x: auto;
  background: #f5f5f5;
  border-radius: 0.25rem;
}

@media (max-width: 800px) {
  .layout {
    grid-template-columns: 1fr;
  }
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn installs_every_theme_file() {
        let temp = tempdir().unwrap();

        let written = install(temp.path()).unwrap();

        assert_eq!(written, THEME_FILES.len());
        for file in THEME_FILES {
            let path = temp.path().join(THEME_DIR).join(file.path);
            assert_eq!(fs::read_to_string(path).unwrap(), file.contents);
        }
    }

    #[test]
    fn layout_includes_release_navigation() {
        assert!(DEFAULT_LAYOUT.contains("{% include release-nav.html %}"));
        assert!(RELEASE_NAV.contains("site.data.releases"));
    }
}
