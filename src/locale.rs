//! Languages, locale stacks and localized output paths.
//!
//! The working language set is the default language, then every configured
//! alternate, then the implicit `meta` language. Each working language owns
//! one locale [`ScopedStack`]; each alternate language also owns a path
//! accumulator. Both move in lock-step with the directory traversal: every
//! directory pushes one frame onto every stack on entry and pops it on exit,
//! whether or not it declares locale data.
//!
//! ## Output paths
//!
//! ```text
//! source                    default (en)          alternate (fr)
//! website/                  index.html            fr/index.html
//! website/news/             news/index.html       fr/nouvelles/index.html   (path_name: {fr: nouvelles})
//! website/news/2024/        news/2024/index.html  fr/nouvelles/2024/index.html
//! ```
//!
//! With `DEFAULT_LANGUAGE_SUBDIRECTORY: true` the default column is nested
//! under `en/` as well.

use crate::config::{META_LANGUAGE, SiteConfig};
use crate::content::LocaleDecl;
use crate::scope::{ScopeError, ScopedStack};

#[derive(Debug, Clone)]
struct Language {
    code: String,
    locale: ScopedStack<String>,
    /// Accumulated localized path per open directory. Unused for the default language.
    paths: Vec<String>,
}

impl Language {
    fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            locale: ScopedStack::new(),
            paths: Vec::new(),
        }
    }

    fn current_path(&self) -> &str {
        self.paths.last().map(String::as_str).unwrap_or("")
    }
}

/// Per-language state for one build.
#[derive(Debug, Clone)]
pub struct Localizer {
    /// Default language first, `meta` last.
    languages: Vec<Language>,
    default_language_subdirectory: bool,
}

impl Localizer {
    pub fn new(site: &SiteConfig) -> Self {
        let mut codes: Vec<&str> = vec![site.default_language.as_str()];
        for code in site
            .alt_languages
            .iter()
            .map(String::as_str)
            .chain([META_LANGUAGE])
        {
            if !codes.contains(&code) {
                codes.push(code);
            }
        }
        Self {
            languages: codes.into_iter().map(Language::new).collect(),
            default_language_subdirectory: site.default_language_subdirectory,
        }
    }

    pub fn default_language(&self) -> &str {
        &self.languages[0].code
    }

    /// Every working language, default first.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.languages.iter().map(|l| l.code.as_str())
    }

    /// Working languages other than the default, `meta` included.
    pub fn alternate_languages(&self) -> impl Iterator<Item = &str> {
        self.languages[1..].iter().map(|l| l.code.as_str())
    }

    pub fn is_default(&self, language: &str) -> bool {
        self.default_language() == language
    }

    /// Push the project-wide locale frame. Does not touch the path accumulators.
    pub fn push_global(&mut self, decl: &LocaleDecl) {
        for lang in &mut self.languages {
            lang.locale.push(decl.frame_for(&lang.code));
        }
    }

    /// Enter a directory: push one locale frame per language and one path
    /// segment per alternate language.
    ///
    /// `dir_name` is the literal source directory name, `None` for the source root.
    pub fn enter(&mut self, dir_name: Option<&str>, decl: &LocaleDecl) {
        for (i, lang) in self.languages.iter_mut().enumerate() {
            lang.locale.push(decl.frame_for(&lang.code));
            if i == 0 {
                continue;
            }
            let segment = decl
                .path_name(&lang.code)
                .or(dir_name)
                .unwrap_or("")
                .trim_matches('/');
            let parent = lang.current_path();
            let path = if segment.is_empty() {
                parent.to_string()
            } else {
                format!("{parent}{segment}/")
            };
            lang.paths.push(path);
        }
    }

    /// Leave a directory, undoing the matching [`enter`](Self::enter).
    pub fn exit(&mut self) -> Result<(), ScopeError> {
        for (i, lang) in self.languages.iter_mut().enumerate() {
            lang.locale.pop()?;
            if i > 0 {
                lang.paths.pop().ok_or(ScopeError::Empty)?;
            }
        }
        Ok(())
    }

    /// Locale stack of `language`, if it is a working language.
    pub fn locale(&self, language: &str) -> Option<&ScopedStack<String>> {
        self.find(language).map(|l| &l.locale)
    }

    /// Output-relative directory of the current page in `language`.
    ///
    /// `relative_path` is the source-relative path of the directory, ending
    /// in `/` (empty for the source root). Always ends in `/` or is empty.
    pub fn output_path(&self, language: &str, relative_path: &str) -> Option<String> {
        if self.is_default(language) {
            return Some(if self.default_language_subdirectory {
                format!("{language}/{relative_path}")
            } else {
                relative_path.to_string()
            });
        }
        self.find(language)
            .map(|l| format!("{}/{}", l.code, l.current_path()))
    }

    /// Depth of every stack, for balance checks.
    pub fn depths(&self) -> Vec<(String, usize, usize)> {
        self.languages
            .iter()
            .map(|l| (l.code.clone(), l.locale.depth(), l.paths.len()))
            .collect()
    }

    fn find(&self, language: &str) -> Option<&Language> {
        self.languages.iter().find(|l| l.code == language)
    }
}
