//! Configuration.
//!
//! Two files configure a build, both in the project root:
//!
//! ```text
//! project/
//! ├── treeweave.toml   # project settings (optional): directory names, watch, serve
//! ├── config.yaml      # site globals (required): base URL, languages, static path
//! ├── template.html
//! ├── website/
//! ├── static/
//! └── public/
//! ```
//!
//! ## Project settings
//!
//! `treeweave.toml` is sparse: every key has a stock default and the file
//! only overrides what it names. Loading merges the file over the stock
//! defaults table with [`merge_toml`], rejects unknown keys, and validates
//! the result.
//!
//! ```toml
//! source_dir = "website"
//! output_dir = "public"
//! static_dir = "static"
//!
//! [watch]
//! interval_ms = 400
//!
//! [serve]
//! address = "localhost"
//! port = 8000
//! ```
//!
//! ## Site globals
//!
//! `config.yaml` must define `LOCATION`, `STATIC` and `DEFAULT_LANGUAGE`;
//! `ALT_LANGUAGES` and `DEFAULT_LANGUAGE_SUBDIRECTORY` are optional. Every
//! key in the file, required or not, is also exposed to templates as a
//! variable (`{$LOCATION$}`).

use crate::content::{self, ContentError};
use crate::expr::render_value;
use crate::scope::Frame;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

pub const PROJECT_CONFIG_FILE: &str = "treeweave.toml";
pub const SITE_CONFIG_FILE: &str = "config.yaml";
pub const TEMPLATE_FILE: &str = "template.html";

/// Keys `config.yaml` must define, checked in this order.
pub const REQUIRED_SITE_KEYS: [&str; 3] = ["LOCATION", "STATIC", "DEFAULT_LANGUAGE"];

/// Language that is always part of the working set.
pub const META_LANGUAGE: &str = "meta";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error("{file} not found in {dir}")]
    MissingFile { file: &'static str, dir: PathBuf },
    #[error("config.yaml is missing required key `{0}`")]
    MissingField(&'static str),
    #[error("Config validation error: {0}")]
    Validation(String),
}

// =============================================================================
// Project settings (treeweave.toml)
// =============================================================================

/// Project settings loaded from `treeweave.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Source tree, relative to the project root.
    pub source_dir: String,
    /// Output tree, relative to the project root. Emptied on every build.
    pub output_dir: String,
    /// Static assets, relative to the project root.
    pub static_dir: String,
    pub watch: WatchConfig,
    pub serve: ServeConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            source_dir: "website".to_string(),
            output_dir: "public".to_string(),
            static_dir: "static".to_string(),
            watch: WatchConfig::default(),
            serve: ServeConfig::default(),
        }
    }
}

impl ProjectConfig {
    /// Validate directory names and ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("source_dir", &self.source_dir),
            ("output_dir", &self.output_dir),
            ("static_dir", &self.static_dir),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        self.validate_layout(Path::new(""))?;
        if self.watch.interval_ms == 0 {
            return Err(ConfigError::Validation(
                "watch.interval_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Reject an `output_dir` that would erase inputs when it is emptied.
    ///
    /// Directories are compared by their components after joining them to
    /// `root`, so `website/`, `./website` and `website` are the same place.
    /// The output dir may not be `root` or one of its ancestors, and may not
    /// equal, contain, or sit inside `source_dir` or `static_dir`.
    pub fn validate_layout(&self, root: &Path) -> Result<(), ConfigError> {
        let root = normalize_path(root);
        let output = normalize_path(&root.join(&self.output_dir));
        if root.starts_with(&output) {
            return Err(ConfigError::Validation(format!(
                "output_dir `{}` must not be the project root",
                self.output_dir
            )));
        }
        for (key, value) in [("source_dir", &self.source_dir), ("static_dir", &self.static_dir)] {
            let dir = normalize_path(&root.join(value));
            if output.starts_with(&dir) || dir.starts_with(&output) {
                return Err(ConfigError::Validation(format!(
                    "output_dir `{}` overlaps {key} `{value}`",
                    self.output_dir
                )));
            }
        }
        Ok(())
    }
}

/// Lexically resolve `.` and `..` components. The filesystem is not consulted.
fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}

/// Rebuild loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// Milliseconds between two checksum polls.
    pub interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { interval_ms: 400 }
    }
}

/// Preview server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServeConfig {
    pub address: String,
    pub port: u16,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            address: "localhost".to_string(),
            port: 8000,
        }
    }
}

/// Returns the stock project settings as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ProjectConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `treeweave.toml` from the project root, over the stock defaults.
///
/// A missing file yields the defaults.
pub fn load_project_config(root: &Path) -> Result<ProjectConfig, ConfigError> {
    let path = root.join(PROJECT_CONFIG_FILE);
    let merged = if path.exists() {
        let overlay: toml::Value = toml::from_str(&fs::read_to_string(&path)?)?;
        merge_toml(stock_defaults_value()?, overlay)
    } else {
        stock_defaults_value()?
    };
    let config: ProjectConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// A fully commented stock `treeweave.toml`, printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# treeweave project settings
# ==========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Source tree: one page is rendered per directory.
source_dir = "website"

# Output tree. Its contents are deleted at the start of every build.
output_dir = "public"

# Static assets, copied to <output_dir>/<STATIC> after each build.
static_dir = "static"

# ---------------------------------------------------------------------------
# Watch mode
# ---------------------------------------------------------------------------
[watch]
# Milliseconds between two checks for changed input files.
interval_ms = 400

# ---------------------------------------------------------------------------
# Preview server (watch mode only)
# ---------------------------------------------------------------------------
[serve]
address = "localhost"
port = 8000
"##
}

// =============================================================================
// Site globals (config.yaml)
// =============================================================================

/// Site globals from `config.yaml`. Immutable for the duration of a build.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteConfig {
    /// Base URL every link is prefixed with.
    pub location: String,
    /// Static asset base path, relative to the output root.
    pub static_path: String,
    pub default_language: String,
    pub alt_languages: Vec<String>,
    /// Nest default-language pages under `{default_language}/`.
    pub default_language_subdirectory: bool,
    /// Every key of the file, exposed as the bottom variable frame.
    pub variables: Frame<Value>,
}

impl SiteConfig {
    /// Build from the parsed `config.yaml` mapping.
    pub fn from_mapping(map: serde_yaml::Mapping) -> Result<Self, ConfigError> {
        for key in REQUIRED_SITE_KEYS {
            if !map.contains_key(key) {
                return Err(ConfigError::MissingField(key));
            }
        }

        let text = |key: &str| map.get(key).map(render_value).unwrap_or_default();

        let alt_languages = match map.get("ALT_LANGUAGES") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(items)) => items.iter().map(render_value).collect(),
            Some(other) => vec![render_value(other)],
        };

        let default_language_subdirectory = match map.get("DEFAULT_LANGUAGE_SUBDIRECTORY") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(_) => {
                return Err(ConfigError::Validation(
                    "DEFAULT_LANGUAGE_SUBDIRECTORY must be true or false".into(),
                ));
            }
        };

        let config = Self {
            location: text("LOCATION"),
            static_path: text("STATIC"),
            default_language: text("DEFAULT_LANGUAGE"),
            alt_languages,
            default_language_subdirectory,
            variables: map
                .iter()
                .map(|(k, v)| (render_value(k), v.clone()))
                .collect(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_language.is_empty() {
            return Err(ConfigError::Validation(
                "DEFAULT_LANGUAGE must not be empty".into(),
            ));
        }
        if self.alt_languages.iter().any(|l| l.is_empty()) {
            return Err(ConfigError::Validation(
                "ALT_LANGUAGES must not contain empty codes".into(),
            ));
        }
        Ok(())
    }
}

/// Load `config.yaml` from the project root.
pub fn load_site_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let path = root.join(SITE_CONFIG_FILE);
    match content::read_yaml(&path)? {
        None => Err(ConfigError::MissingFile {
            file: SITE_CONFIG_FILE,
            dir: root.to_path_buf(),
        }),
        Some(Value::Mapping(map)) => SiteConfig::from_mapping(map),
        Some(Value::Null) => SiteConfig::from_mapping(serde_yaml::Mapping::new()),
        Some(_) => Err(ConfigError::Validation(format!(
            "{SITE_CONFIG_FILE} must be a mapping"
        ))),
    }
}

/// Load `template.html` from the project root, comments stripped.
pub fn load_template(root: &Path) -> Result<String, ConfigError> {
    let path = root.join(TEMPLATE_FILE);
    if !path.is_file() {
        return Err(ConfigError::MissingFile {
            file: TEMPLATE_FILE,
            dir: root.to_path_buf(),
        });
    }
    Ok(content::strip_html_comments(&fs::read_to_string(path)?))
}
