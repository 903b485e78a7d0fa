//! CLI output formatting for build results.
//!
//! Output is **source-centric**: each source directory is listed once with a
//! positional index, and its pages (one per working language) are shown as
//! indented `language → output path` lines underneath.
//!
//! ```text
//! 001 (root)
//!     en → index.html
//!     fr → fr/index.html
//!     meta → meta/index.html
//! 002 news/
//!     en → news/index.html
//!     fr → fr/nouvelles/index.html
//!     meta → meta/news/index.html
//!
//! Generated 6 pages from 2 directories in 3 languages (en, fr, meta)
//! Registered 6 tags
//! Static: 4 files copied
//! ```
//!
//! Each `format_*` function returns lines for testability; the `print_*`
//! wrapper writes them to stdout. Format functions are pure.

use crate::build::{BuildReport, PageReport};
use std::collections::BTreeMap;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn source_label(source: &str) -> &str {
    if source.is_empty() { "(root)" } else { source }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{} {}", n, if n == 1 { one } else { many })
}

pub fn format_build_output(report: &BuildReport) -> Vec<String> {
    let mut by_source: BTreeMap<&str, Vec<&PageReport>> = BTreeMap::new();
    for page in &report.pages {
        by_source.entry(page.source.as_str()).or_default().push(page);
    }

    let language_rank = |lang: &str| {
        report
            .languages
            .iter()
            .position(|l| l == lang)
            .unwrap_or(usize::MAX)
    };

    let mut lines = Vec::new();
    for (i, (source, mut pages)) in by_source.into_iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), source_label(source)));
        pages.sort_by_key(|p| language_rank(&p.language));
        for page in pages {
            lines.push(format!("{}{} → {}", indent(1), page.language, page.path));
        }
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }

    let directories = report
        .pages
        .iter()
        .map(|p| p.source.as_str())
        .collect::<std::collections::BTreeSet<_>>()
        .len();
    lines.push(format!(
        "Generated {} from {} in {} ({})",
        plural(report.pages.len(), "page", "pages"),
        plural(directories, "directory", "directories"),
        plural(report.languages.len(), "language", "languages"),
        report.languages.join(", ")
    ));
    lines.push(format!("Registered {}", plural(report.tags, "tag", "tags")));

    let mut assets = format!("Static: {} copied", plural(report.assets.copied, "file", "files"));
    if report.assets.failed > 0 {
        assets.push_str(&format!(", {} failed", report.assets.failed));
    }
    lines.push(assets);

    lines
}

/// Print build output to stdout.
pub fn print_build_output(report: &BuildReport) {
    for line in format_build_output(report) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetReport;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn page(path: &str, language: &str, source: &str) -> PageReport {
        PageReport {
            path: path.to_string(),
            language: language.to_string(),
            source: source.to_string(),
        }
    }

    fn report() -> BuildReport {
        BuildReport {
            output_dir: PathBuf::from("public"),
            languages: vec!["en".into(), "fr".into(), "meta".into()],
            // BTreeMap order of output paths, not language order
            pages: vec![
                page("fr/index.html", "fr", ""),
                page("fr/nouvelles/index.html", "fr", "news/"),
                page("index.html", "en", ""),
                page("meta/index.html", "meta", ""),
                page("meta/news/index.html", "meta", "news/"),
                page("news/index.html", "en", "news/"),
            ],
            tags: 6,
            assets: AssetReport {
                copied: 4,
                failed: 0,
            },
        }
    }

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn build_output_groups_by_source_in_language_order() {
        assert_eq!(
            format_build_output(&report()),
            vec![
                "001 (root)",
                "    en → index.html",
                "    fr → fr/index.html",
                "    meta → meta/index.html",
                "002 news/",
                "    en → news/index.html",
                "    fr → fr/nouvelles/index.html",
                "    meta → meta/news/index.html",
                "",
                "Generated 6 pages from 2 directories in 3 languages (en, fr, meta)",
                "Registered 6 tags",
                "Static: 4 files copied",
            ]
        );
    }

    #[test]
    fn build_output_reports_failed_assets() {
        let mut r = report();
        r.assets = AssetReport {
            copied: 1,
            failed: 2,
        };
        let lines = format_build_output(&r);
        assert_eq!(lines.last().unwrap(), "Static: 1 file copied, 2 failed");
    }

    #[test]
    fn build_output_singulars() {
        let r = BuildReport {
            output_dir: PathBuf::from("public"),
            languages: vec!["en".into()],
            pages: vec![page("index.html", "en", "")],
            tags: 1,
            assets: AssetReport::default(),
        };
        let lines = format_build_output(&r);
        assert!(lines.contains(&"Generated 1 page from 1 directory in 1 language (en)".to_string()));
        assert!(lines.contains(&"Registered 1 tag".to_string()));
    }
}
