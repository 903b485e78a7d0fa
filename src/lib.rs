//! # Treeweave
//!
//! A static site composer for multilingual websites. Your directory tree is
//! the site: every directory under the source root becomes one page per
//! language, rendered from a single shared template.
//!
//! # Architecture: Scoped Depth-First Composition
//!
//! A build walks the source tree once. Each directory may declare variables,
//! HTML fragments, locale strings and a tag; those declarations are visible
//! to the directory and everything below it, with nearer declarations
//! shadowing farther ones.
//!
//! ```text
//! 1. Load globals   config.yaml, template.html   →  seeded stacks
//! 2. Build pass     website/                     →  pending pages (links unresolved)
//! 3. Link pass      pending pages + tag registry →  final HTML
//! 4. Emit           final HTML                   →  public/
//! ```
//!
//! Links are resolved in a separate pass so that a page can reference any
//! directory by tag, including ones the walk has not reached yet.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`build`] | Phase sequencing, the build context, link resolution and emit |
//! | [`scope`] | Generic push/pop frame stack with nearest-enclosing lookup |
//! | [`walk`] | Directory-only DFS with enter/exit hooks |
//! | [`expr`] | The four template markers and the ordered expansion passes |
//! | [`tags`] | `(tag, language)` → URL registry and fingerprint tags |
//! | [`locale`] | Working languages, per-language locale stacks, localized output paths |
//! | [`content`] | Loaders for per-directory `variables.yaml`, `locale.yaml`, `tag.yaml` and fragments |
//! | [`config`] | `treeweave.toml` project settings and `config.yaml` site globals |
//! | [`assets`] | Static asset copy, whole tree or from a list file |
//! | [`watch`] | Checksum polling and rebuild loop |
//! | [`serve`] | Preview HTTP server |
//! | [`output`] | CLI output formatting of build results |
//!
//! # Template Markers
//!
//! ```text
//! {#nav#}                 fragment `nav.html` from the nearest directory declaring it
//! {$title$}               variable `title`
//! {%(greeting)Hello%}     locale string `greeting`, or `Hello` if untranslated
//! {_blog_}                URL of the directory tagged `blog`, in the page's language
//! {_blog[fr]_}            URL of the French version of `blog`
//! {_static_}, {_self_}    static asset base, the current directory
//! ```
//!
//! # Design Decisions
//!
//! ## Typed Link Placeholders
//!
//! Between the build pass and the link pass, pages are held in memory as a
//! list of text and link segments ([`expr::PageBody`]) rather than as text
//! with escaped markers. Nothing is written until every link resolved, so a
//! broken link never leaves a half-updated output directory.
//!
//! ## One Frame Per Directory, Always
//!
//! Every directory pushes exactly one frame onto every stack, empty or not,
//! and pops it on exit. That makes stack balance a property of the walk
//! rather than of the content, and it is checked in the tests after every
//! build pass.

pub mod assets;
pub mod build;
pub mod config;
pub mod content;
pub mod expr;
pub mod locale;
pub mod output;
pub mod scope;
pub mod serve;
pub mod tags;
pub mod walk;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;
