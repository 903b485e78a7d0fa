//! Per-directory declarations.
//!
//! A source directory may carry any of these files; all are optional:
//!
//! ```text
//! website/blog/
//! ├── variables.yaml   # name → value, visible here and below
//! ├── locale.yaml      # name → {language → string}, plus path_name overrides
//! ├── tag.yaml         # tag: blog
//! ├── sidebar.html     # fragment `sidebar`
//! └── intro.html       # fragment `intro`
//! ```
//!
//! A missing file yields an empty declaration. A file that exists but does
//! not parse, or has the wrong shape, is an error naming the file.
//!
//! `locale.yaml` looks like this:
//!
//! ```yaml
//! path_name:        # localized directory name per alternate language
//!   fr: nouvelles
//! title:
//!   en: News
//!   fr: Nouvelles
//! ```

use crate::expr::render_value;
use crate::scope::Frame;
use regex::Regex;
use serde_yaml::Value;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

pub const VARIABLES_FILE: &str = "variables.yaml";
pub const LOCALE_FILE: &str = "locale.yaml";
pub const TAG_FILE: &str = "tag.yaml";

/// Key inside `locale.yaml` holding the localized directory names.
pub const PATH_NAME_KEY: &str = "path_name";

const FRAGMENT_EXTENSION: &str = "html";

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("YAML error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{0} has no `tag` entry")]
    MissingTag(PathBuf),
    #[error("invalid {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

static HTML_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

/// Remove every `<!-- ... -->` comment.
pub fn strip_html_comments(html: &str) -> String {
    HTML_COMMENT.replace_all(html, "").into_owned()
}

/// Read and parse a YAML file. `Ok(None)` when the file does not exist.
pub fn read_yaml(path: &Path) -> Result<Option<Value>, ContentError> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Some(Value::Null));
    }
    serde_yaml::from_str(&content)
        .map(Some)
        .map_err(|source| ContentError::Yaml {
            path: path.to_path_buf(),
            source,
        })
}

/// Top-level mapping of a YAML file; null and missing both count as empty.
fn read_mapping(path: &Path) -> Result<serde_yaml::Mapping, ContentError> {
    match read_yaml(path)? {
        None | Some(Value::Null) => Ok(serde_yaml::Mapping::new()),
        Some(Value::Mapping(map)) => Ok(map),
        Some(_) => Err(ContentError::Invalid {
            path: path.to_path_buf(),
            reason: "expected a mapping at the top level".to_string(),
        }),
    }
}

/// Load `variables.yaml` from `dir` as a variable frame.
pub fn load_variables(dir: &Path) -> Result<Frame<Value>, ContentError> {
    let map = read_mapping(&dir.join(VARIABLES_FILE))?;
    Ok(map
        .into_iter()
        .map(|(k, v)| (render_value(&k), v))
        .collect())
}

/// Load every `*.html` file in `dir` as a fragment frame, comments stripped.
pub fn load_fragments(dir: &Path) -> Result<Frame<String>, ContentError> {
    let mut frame = Frame::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_fragment = path.is_file()
            && path
                .extension()
                .map(|e| e == FRAGMENT_EXTENSION)
                .unwrap_or(false);
        if !is_fragment {
            continue;
        }
        let Some(stem) = path.file_stem() else {
            continue;
        };
        let html = fs::read_to_string(&path)?;
        frame.insert(stem.to_string_lossy().to_string(), strip_html_comments(&html));
    }
    Ok(frame)
}

/// Parsed `locale.yaml`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocaleDecl {
    /// Localized directory name per language.
    pub path_names: HashMap<String, String>,
    /// Entry name → language → string.
    pub entries: HashMap<String, HashMap<String, String>>,
}

impl LocaleDecl {
    /// The locale frame for one language: every entry that has a translation for it.
    pub fn frame_for(&self, language: &str) -> Frame<String> {
        self.entries
            .iter()
            .filter_map(|(name, by_lang)| {
                by_lang
                    .get(language)
                    .map(|s| (name.clone(), s.clone()))
            })
            .collect()
    }

    pub fn path_name(&self, language: &str) -> Option<&str> {
        self.path_names.get(language).map(String::as_str)
    }
}

/// Load `locale.yaml` from `dir`.
pub fn load_locale(dir: &Path) -> Result<LocaleDecl, ContentError> {
    let path = dir.join(LOCALE_FILE);
    let mut decl = LocaleDecl::default();
    for (key, value) in read_mapping(&path)? {
        let name = render_value(&key);
        let by_lang = language_map(&path, &name, value)?;
        if name == PATH_NAME_KEY {
            decl.path_names = by_lang;
        } else {
            decl.entries.insert(name, by_lang);
        }
    }
    Ok(decl)
}

fn language_map(
    path: &Path,
    name: &str,
    value: Value,
) -> Result<HashMap<String, String>, ContentError> {
    match value {
        Value::Null => Ok(HashMap::new()),
        Value::Mapping(map) => Ok(map
            .iter()
            .map(|(lang, s)| (render_value(lang), render_value(s)))
            .collect()),
        _ => Err(ContentError::Invalid {
            path: path.to_path_buf(),
            reason: format!("entry `{name}` must map language codes to strings"),
        }),
    }
}

/// Load the explicit tag from `tag.yaml` in `dir`, if the file exists.
pub fn load_tag(dir: &Path) -> Result<Option<String>, ContentError> {
    let path = dir.join(TAG_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let map = read_mapping(&path)?;
    match map.get("tag") {
        Some(Value::Null) | None => Err(ContentError::MissingTag(path)),
        Some(value) => {
            let tag = render_value(value);
            if tag.is_empty() {
                Err(ContentError::MissingTag(path))
            } else {
                Ok(Some(tag))
            }
        }
    }
}
