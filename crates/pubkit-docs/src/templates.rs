//! Project scaffolding written by `pubkit init`.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use minijinja::{context, Environment};

use crate::theme::GEMFILE;

/// Values substituted into the scaffold templates.
#[derive(Debug, Clone)]
pub struct ScaffoldContext {
    /// Package name, used as the site title
    pub project_name: String,
    /// One-line project description
    pub description: String,
}

impl Default for ScaffoldContext {
    fn default() -> Self {
        Self {
            project_name: "My Library".to_string(),
            description: "Documentation for My Library".to_string(),
        }
    }
}

/// A file created by `init`, relative to the project root.
#[derive(Debug, Clone, Copy)]
pub struct ScaffoldFile {
    pub path: &'static str,
    pub template: &'static str,
}

/// Every file `init` creates.
pub const SCAFFOLD_FILES: &[ScaffoldFile] = &[
    ScaffoldFile {
        path: "docs/_config.yml",
        template: CONFIG_TEMPLATE,
    },
    ScaffoldFile {
        path: "docs/index.md",
        template: INDEX_TEMPLATE,
    },
    ScaffoldFile {
        path: "Gemfile",
        template: GEMFILE,
    },
    ScaffoldFile {
        path: ".ruby-version",
        template: RUBY_VERSION,
    },
    ScaffoldFile {
        path: "jsdoc.conf",
        template: JSDOC_TEMPLATE,
    },
    ScaffoldFile {
        path: "pubkit.toml",
        template: PUBKIT_CONFIG,
    },
];

/// What `init` did.
#[derive(Debug, Default)]
pub struct ScaffoldReport {
    /// Files written
    pub created: Vec<PathBuf>,
    /// Files left alone because they already existed
    pub skipped: Vec<PathBuf>,
}

/// Errors from scaffolding.
#[derive(Debug, thiserror::Error)]
pub enum ScaffoldError {
    #[error("Failed to render {path}: {source}")]
    Render {
        path: &'static str,
        #[source]
        source: minijinja::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Template engine using minijinja.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Create an engine with every scaffold template loaded.
    pub fn new() -> Result<Self, ScaffoldError> {
        let mut env = Environment::new();

        for file in SCAFFOLD_FILES {
            env.add_template(file.path, file.template)
                .map_err(|source| ScaffoldError::Render {
                    path: file.path,
                    source,
                })?;
        }

        Ok(Self { env })
    }

    /// Render one scaffold file.
    pub fn render(&self, path: &'static str, ctx: &ScaffoldContext) -> Result<String, ScaffoldError> {
        let render = || -> Result<String, minijinja::Error> {
            let tmpl = self.env.get_template(path)?;
            tmpl.render(context! {
                project_name => yaml_safe(&ctx.project_name),
                description => yaml_safe(&ctx.description),
            })
        };

        render().map_err(|source| ScaffoldError::Render { path, source })
    }
}

/// Strip characters that would break a double-quoted YAML scalar.
fn yaml_safe(value: &str) -> String {
    value.replace(['"', '\\'], "'").replace('\n', " ")
}

/// Write every scaffold file under `project_root`, never overwriting.
pub fn scaffold(project_root: &Path, ctx: &ScaffoldContext) -> Result<ScaffoldReport, ScaffoldError> {
    let engine = TemplateEngine::new()?;
    let mut report = ScaffoldReport::default();

    for file in SCAFFOLD_FILES {
        let dest = project_root.join(file.path);
        if dest.exists() {
            tracing::info!("Skipping {} (already exists)", file.path);
            report.skipped.push(dest);
            continue;
        }

        let contents = engine.render(file.path, ctx)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| ScaffoldError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        match write_new(&dest, &contents) {
            Ok(()) => {
                tracing::info!("Created {}", file.path);
                report.created.push(dest);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                report.skipped.push(dest);
            }
            Err(source) => return Err(ScaffoldError::Write { path: dest, source }),
        }
    }

    Ok(report)
}

fn write_new(path: &Path, contents: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(contents.as_bytes())
}

const CONFIG_TEMPLATE: &str = r#"# Site settings
title: "{{ project_name }}"
description: "{{ description }}"

# Theme installed by pubkit on every serve/publish run
layouts_dir: themes/jekyll/_layouts
includes_dir: themes/jekyll/_includes

defaults:
  - scope:
      path: ""
    values:
      layout: default

exclude:
  - Gemfile
  - Gemfile.lock
"#;

const INDEX_TEMPLATE: &str = r#"---
title: Home
---

# {{ project_name }}

{{ description }}

## Getting Started

Edit `docs/index.md` to change this page, then run `pubkit serve` to preview it.
"#;

const RUBY_VERSION: &str = "3.2.2\n";

const JSDOC_TEMPLATE: &str = r#"{
  "source": {
    "include": ["src"],
    "includePattern": ".+\\.js$"
  },
  "opts": {
    "recurse": true
  }
}
"#;

const PUBKIT_CONFIG: &str = r#"# pubkit configuration

[docs]
# Authored documentation sources
dir = "docs"

# Reference doc generator and its configuration file
doc_generator = "jsdoc"
doc_generator_config = "jsdoc.conf"

[pages]
# Checkout directory for the pages branch (must not exist before publishing)
dir = "gh-pages"
branch = "gh-pages"
remote = "origin"

[release]
# Releasing from any other branch asks for confirmation
primary_branch = "master"
"#;
