//! Build orchestration.
//!
//! A build is a fixed sequence of phases:
//!
//! ```text
//! Idle → LoadGlobals → BuildPass → LinkPass → Emit → Done
//!            └──────────────┴──────────┴────────┴──→ Failed
//! ```
//!
//! - **LoadGlobals** reads `config.yaml`, `template.html` and the optional
//!   project-root `variables.yaml` and `locale.yaml`, and seeds the stacks.
//! - **BuildPass** walks the source tree. Entering a directory pushes its
//!   declarations, renders the template once per working language, registers
//!   the directory's tag, and buffers the page with its links still
//!   unresolved. Leaving it pops the declarations again.
//! - **LinkPass** resolves every link against the now complete
//!   [`TagRegistry`]. Nothing has been written yet, so a failure here (or in
//!   the build pass) leaves the output directory untouched.
//! - **Emit** clears the output directory and writes every page.
//! - **Done** copies the static assets; copy failures are logged, not fatal.
//!
//! All mutable state of a build lives in one [`BuildContext`] value.

use crate::assets::{self, AssetReport};
use crate::config::{self, ConfigError, ProjectConfig, SiteConfig};
use crate::content::{self, ContentError};
use crate::expr::{self, ExprError, LinkRef, LinkTarget, PageBody, STATIC_LINK};
use crate::locale::Localizer;
use crate::scope::{Frame, ScopeError, ScopedStack};
use crate::tags::{LinkError, TagRegistry, fingerprint_tag};
use crate::walk::{self, DirVisitor};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// File written into every output directory.
pub const INDEX_FILE: &str = "index.html";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error("scope stacks out of balance: {0}")]
    Scope(#[from] ScopeError),
    #[error("source directory {0} not found")]
    MissingSource(PathBuf),
    #[error("cannot render {dir}: {source}")]
    Render {
        dir: PathBuf,
        #[source]
        source: ExprError,
    },
    #[error(transparent)]
    Link(#[from] LinkError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Idle,
    LoadGlobals,
    BuildPass,
    LinkPass,
    Emit,
    Done,
    Failed,
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::LoadGlobals => "load-globals",
            Self::BuildPass => "build-pass",
            Self::LinkPass => "link-pass",
            Self::Emit => "emit",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A rendered page whose links are not resolved yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPage {
    pub language: String,
    /// Source-relative directory the page was rendered from (`""` for the root).
    pub source: String,
    pub body: PageBody,
}

/// One emitted page, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReport {
    /// Output-relative file path, e.g. `fr/nouvelles/index.html`.
    pub path: String,
    pub language: String,
    pub source: String,
}

/// Result of a successful build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub output_dir: PathBuf,
    pub languages: Vec<String>,
    pub pages: Vec<PageReport>,
    /// Number of `(tag, language)` registrations.
    pub tags: usize,
    pub assets: AssetReport,
}

// ============================================================================
// Build context
// ============================================================================

/// Everything one build pass mutates.
#[derive(Debug)]
pub struct BuildContext {
    site: SiteConfig,
    template: String,
    source_root: PathBuf,
    variables: ScopedStack<Value>,
    fragments: ScopedStack<String>,
    localizer: Localizer,
    tags: TagRegistry,
    /// Keyed by output-relative file path.
    pending: BTreeMap<String, PendingPage>,
}

impl BuildContext {
    /// Context with the config frame on the variable stack and the `static`
    /// pseudo-tag registered.
    pub fn new(site: SiteConfig, template: String, source_root: PathBuf) -> Self {
        let mut variables = ScopedStack::new();
        variables.push(site.variables.clone());
        let mut tags = TagRegistry::new();
        tags.register_static(&site.static_path);
        let localizer = Localizer::new(&site);
        Self {
            site,
            template,
            source_root,
            variables,
            fragments: ScopedStack::new(),
            localizer,
            tags,
            pending: BTreeMap::new(),
        }
    }

    /// Load the project globals from `root` and seed the stacks.
    pub fn load(root: &Path, source_root: &Path) -> Result<Self, BuildError> {
        let site = config::load_site_config(root)?;
        let template = config::load_template(root)?;
        let mut ctx = Self::new(site, template, source_root.to_path_buf());
        ctx.variables.push(content::load_variables(root)?);
        ctx.variables.push(timestamp_frame());
        ctx.localizer.push_global(&content::load_locale(root)?);
        tracing::debug!(
            languages = ?ctx.localizer.languages().collect::<Vec<_>>(),
            "Loaded project globals"
        );
        Ok(ctx)
    }

    /// Walk the source tree, rendering and buffering every page.
    pub fn build_pass(&mut self) -> Result<(), BuildError> {
        if !self.source_root.is_dir() {
            return Err(BuildError::MissingSource(self.source_root.clone()));
        }
        let root = self.source_root.clone();
        walk::walk(&root, self)
    }

    /// Resolve every buffered page. Keys are output-relative file paths.
    pub fn link_pass(&self) -> Result<BTreeMap<String, String>, BuildError> {
        let mut pages = BTreeMap::new();
        for (path, page) in &self.pending {
            let html = page.body.resolve(|link| self.link_url(link, path))?;
            pages.insert(path.clone(), html);
        }
        Ok(pages)
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    pub fn pending(&self) -> &BTreeMap<String, PendingPage> {
        &self.pending
    }

    pub fn languages(&self) -> Vec<String> {
        self.localizer.languages().map(str::to_string).collect()
    }

    /// Depth of the variable and fragment stacks plus every per-language
    /// stack, for balance checks.
    pub fn depths(&self) -> (usize, usize, Vec<(String, usize, usize)>) {
        (
            self.variables.depth(),
            self.fragments.depth(),
            self.localizer.depths(),
        )
    }

    fn link_url(&self, link: &LinkRef, page: &str) -> Result<String, LinkError> {
        let relative = match &link.target {
            LinkTarget::Static => self.tags.resolve_static(),
            LinkTarget::Tag { name, .. } => self.tags.resolve(name, link.lookup_language()),
        };
        match relative {
            Some(url) => Ok(format!("{}{}", self.site.location, url)),
            None => Err(LinkError::UnknownTag {
                tag: match &link.target {
                    LinkTarget::Static => STATIC_LINK.to_string(),
                    LinkTarget::Tag { name, .. } => name.clone(),
                },
                language: link.lookup_language().to_string(),
                page: page.to_string(),
            }),
        }
    }

    /// Source-relative path of `dir` with a trailing `/`, empty for the root.
    fn relative_path(&self, dir: &Path) -> String {
        let Ok(relative) = dir.strip_prefix(&self.source_root) else {
            return String::new();
        };
        relative
            .components()
            .map(|c| format!("{}/", c.as_os_str().to_string_lossy()))
            .collect()
    }

    /// Render every language variant of the current directory.
    fn render(&mut self, dir: &Path, relative: &str, tag: &str) -> Result<(), BuildError> {
        let render_error = |source| BuildError::Render {
            dir: dir.to_path_buf(),
            source,
        };
        let composed = expr::expand_fragments(&self.template, &self.fragments)
            .and_then(|text| expr::expand_variables(&text, &self.variables))
            .map_err(render_error)?;

        let variants: Vec<(String, String)> = self
            .localizer
            .languages()
            .filter_map(|lang| {
                self.localizer
                    .output_path(lang, relative)
                    .map(|url| (lang.to_string(), url))
            })
            .collect();

        for (language, url) in variants {
            self.tags.register(tag, &language, &url);
            let Some(locale) = self.localizer.locale(&language) else {
                continue;
            };
            let localized = expr::expand_locale(&composed, locale).map_err(render_error)?;
            let body = expr::extract_links(&localized, &language, tag).map_err(render_error)?;

            let path = format!("{url}{INDEX_FILE}");
            let page = PendingPage {
                language,
                source: relative.to_string(),
                body,
            };
            if let Some(previous) = self.pending.insert(path.clone(), page) {
                tracing::warn!(
                    path = %path,
                    previous = %previous.source,
                    source = %relative,
                    "Two pages share one output path, keeping the later one"
                );
            }
        }
        Ok(())
    }
}

impl DirVisitor for BuildContext {
    type Error = BuildError;

    fn enter(&mut self, dir: &Path) -> Result<(), BuildError> {
        let relative = self.relative_path(dir);
        let dir_name = if relative.is_empty() {
            None
        } else {
            dir.file_name().map(|n| n.to_string_lossy().to_string())
        };

        let variables = content::load_variables(dir)?;
        let fragments = content::load_fragments(dir)?;
        let locale = content::load_locale(dir)?;
        let tag = match content::load_tag(dir)? {
            Some(tag) => tag,
            None => fingerprint_tag(&relative),
        };

        self.variables.push(variables);
        self.fragments.push(fragments);
        self.localizer.enter(dir_name.as_deref(), &locale);

        tracing::debug!(dir = %dir.display(), tag = %tag, "Rendering directory");
        self.render(dir, &relative, &tag)
    }

    fn exit(&mut self, _dir: &Path) -> Result<(), BuildError> {
        self.variables.pop()?;
        self.fragments.pop()?;
        self.localizer.exit()?;
        Ok(())
    }
}

fn timestamp_frame() -> Frame<Value> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    Frame::from([("timestamp".to_string(), Value::String(millis.to_string()))])
}

// ============================================================================
// Emit
// ============================================================================

/// Empty `output_dir` (creating it if needed) and write every page into it.
pub fn emit(output_dir: &Path, pages: &BTreeMap<String, String>) -> io::Result<()> {
    clear_dir(output_dir)?;
    for (relative, html) in pages {
        let path = output_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, html)?;
        tracing::debug!(page = %relative, "Wrote page");
    }
    Ok(())
}

fn clear_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

// ============================================================================
// Builder
// ============================================================================

/// Runs the phases in order and tracks which one is current.
pub struct Builder<'a> {
    root: &'a Path,
    config: &'a ProjectConfig,
    static_list: Option<&'a Path>,
    phase: BuildPhase,
}

impl<'a> Builder<'a> {
    pub fn new(root: &'a Path, config: &'a ProjectConfig) -> Self {
        Self {
            root,
            config,
            static_list: None,
            phase: BuildPhase::Idle,
        }
    }

    /// Copy only the static entries named in `list`.
    pub fn static_list(mut self, list: Option<&'a Path>) -> Self {
        self.static_list = list;
        self
    }

    pub fn phase(&self) -> BuildPhase {
        self.phase
    }

    /// Run every phase. On error the builder is left in [`BuildPhase::Failed`].
    pub fn run(&mut self) -> Result<BuildReport, BuildError> {
        let result = self.run_phases();
        if let Err(e) = &result {
            tracing::error!(phase = %self.phase, error = %e, "Build failed");
            self.phase = BuildPhase::Failed;
        }
        result
    }

    fn advance(&mut self, phase: BuildPhase) {
        tracing::info!(phase = %phase, "Build phase");
        self.phase = phase;
    }

    fn run_phases(&mut self) -> Result<BuildReport, BuildError> {
        self.config.validate()?;
        self.config.validate_layout(self.root)?;
        let source_dir = self.root.join(&self.config.source_dir);
        let output_dir = self.root.join(&self.config.output_dir);

        self.advance(BuildPhase::LoadGlobals);
        let mut ctx = BuildContext::load(self.root, &source_dir)?;

        self.advance(BuildPhase::BuildPass);
        ctx.build_pass()?;

        self.advance(BuildPhase::LinkPass);
        let pages = ctx.link_pass()?;

        self.advance(BuildPhase::Emit);
        emit(&output_dir, &pages)?;

        self.advance(BuildPhase::Done);
        let assets = assets::copy_static(
            &self.root.join(&self.config.static_dir),
            &output_dir.join(ctx.site().static_path.trim_matches('/')),
            self.static_list,
        );

        let pages = ctx
            .pending()
            .iter()
            .map(|(path, page)| PageReport {
                path: path.clone(),
                language: page.language.clone(),
                source: page.source.clone(),
            })
            .collect();

        Ok(BuildReport {
            output_dir,
            languages: ctx.languages(),
            pages,
            tags: ctx.tags().len(),
            assets,
        })
    }
}

/// Run one full build of the project at `root`.
pub fn build(
    root: &Path,
    config: &ProjectConfig,
    static_list: Option<&Path>,
) -> Result<BuildReport, BuildError> {
    Builder::new(root, config).static_list(static_list).run()
}
