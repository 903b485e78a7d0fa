//! The marker language embedded in the template.
//!
//! Four marker kinds are recognised, each wrapped in a two-character
//! open/close pair:
//!
//! | Marker | Meaning |
//! |--------|---------|
//! | `{#name#}` | include the nearest fragment called `name` |
//! | `{$name$}` | interpolate the nearest variable called `name` |
//! | `{%(name)default%}` | nearest locale string `name` for the rendering language, else `default` |
//! | `{_name_}`, `{_name[lang]_}` | link to the directory tagged `name` |
//!
//! Two link names are special: `self` is the current directory's own tag,
//! and a bare `{_static_}` is the static asset base. `{_static[lang]_}`
//! carries a language and is looked up like any other tag.
//!
//! A page is rendered in four passes, strictly in this order:
//!
//! 1. [`expand_fragments`] until no fragment marker is left. Fragments may
//!    contain any marker kind; later kinds are left for later passes.
//! 2. [`expand_variables`].
//! 3. [`expand_locale`], once per rendering language.
//! 4. [`extract_links`], which splits the text into a [`PageBody`] whose
//!    link segments are resolved only after every directory has registered
//!    its tag.
//!
//! Within a pass, substituted text is scanned again, so a variable whose
//! value contains `{$other$}` expands `other` as well. A marker whose close
//! delimiter never appears is a structural error for the whole page.

use crate::scope::ScopedStack;
use serde_yaml::Value;
use std::fmt;
use thiserror::Error;

/// Upper bound on substitutions in one pass over one page.
pub const MAX_SUBSTITUTIONS: usize = 10_000;

/// Link name that resolves to the static asset base.
pub const STATIC_LINK: &str = "static";

/// Link name that resolves to the rendering directory's own tag.
pub const SELF_LINK: &str = "self";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExprError {
    #[error("unterminated {kind} marker at byte {offset}: missing `{close}`", close = .kind.close())]
    Unterminated { kind: MarkerKind, offset: usize },
    #[error("malformed locale marker `{{%{0}%}}`: expected `(name)default`")]
    MalformedLocale(String),
    #[error("more than {max} {0} substitutions, probably a self-referencing definition", max = MAX_SUBSTITUTIONS)]
    ExpansionLimit(MarkerKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Fragment,
    Variable,
    Locale,
    Link,
}

impl MarkerKind {
    pub fn open(self) -> &'static str {
        match self {
            MarkerKind::Fragment => "{#",
            MarkerKind::Variable => "{$",
            MarkerKind::Locale => "{%",
            MarkerKind::Link => "{_",
        }
    }

    pub fn close(self) -> &'static str {
        match self {
            MarkerKind::Fragment => "#}",
            MarkerKind::Variable => "$}",
            MarkerKind::Locale => "%}",
            MarkerKind::Link => "_}",
        }
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MarkerKind::Fragment => "fragment",
            MarkerKind::Variable => "variable",
            MarkerKind::Locale => "locale",
            MarkerKind::Link => "link",
        };
        f.write_str(name)
    }
}

/// Location of one marker inside a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    /// Byte offset of the open delimiter.
    start: usize,
    /// Byte offset of the close delimiter.
    close: usize,
}

impl Span {
    fn body<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start + 2..self.close]
    }

    fn end(&self) -> usize {
        self.close + 2
    }
}

/// Find the first marker of `kind` at or after `from`.
fn find_marker(text: &str, kind: MarkerKind, from: usize) -> Result<Option<Span>, ExprError> {
    let Some(rel) = text[from..].find(kind.open()) else {
        return Ok(None);
    };
    let start = from + rel;
    let body_start = start + kind.open().len();
    match text[body_start..].find(kind.close()) {
        Some(rel_close) => Ok(Some(Span {
            start,
            close: body_start + rel_close,
        })),
        None => Err(ExprError::Unterminated {
            kind,
            offset: start,
        }),
    }
}

/// Replace every marker of `kind` with whatever `resolve` returns for its body.
///
/// Scanning resumes at the start of each replacement.
fn substitute<F>(text: &str, kind: MarkerKind, mut resolve: F) -> Result<String, ExprError>
where
    F: FnMut(&str) -> Result<String, ExprError>,
{
    let mut out = text.to_string();
    let mut pos = 0;
    let mut count = 0;
    while let Some(span) = find_marker(&out, kind, pos)? {
        count += 1;
        if count > MAX_SUBSTITUTIONS {
            return Err(ExprError::ExpansionLimit(kind));
        }
        let replacement = resolve(span.body(&out))?;
        out.replace_range(span.start..span.end(), &replacement);
        pos = span.start;
    }
    Ok(out)
}

/// Pass 1: inline fragments. A missing fragment expands to nothing.
pub fn expand_fragments(text: &str, fragments: &ScopedStack<String>) -> Result<String, ExprError> {
    substitute(text, MarkerKind::Fragment, |name| {
        Ok(match fragments.lookup(name) {
            Some(html) => html.clone(),
            None => {
                tracing::debug!(fragment = %name, "Fragment not found, expanding to nothing");
                String::new()
            }
        })
    })
}

/// Pass 2: interpolate variables. A missing variable expands to nothing.
pub fn expand_variables(text: &str, variables: &ScopedStack<Value>) -> Result<String, ExprError> {
    substitute(text, MarkerKind::Variable, |name| {
        Ok(match variables.lookup(name) {
            Some(value) => render_value(value),
            None => {
                tracing::debug!(variable = %name, "Variable not found, expanding to nothing");
                String::new()
            }
        })
    })
}

/// Pass 3: localized strings for one language, falling back to the inline default.
pub fn expand_locale(text: &str, locale: &ScopedStack<String>) -> Result<String, ExprError> {
    substitute(text, MarkerKind::Locale, |body| {
        let (name, default) = parse_locale_body(body)?;
        Ok(match locale.lookup(name) {
            Some(s) => s.clone(),
            None => default.to_string(),
        })
    })
}

/// Split `(name)default` into its two halves.
fn parse_locale_body(body: &str) -> Result<(&str, &str), ExprError> {
    body.strip_prefix('(')
        .and_then(|rest| rest.split_once(')'))
        .ok_or_else(|| ExprError::MalformedLocale(body.to_string()))
}

/// Stringify a variable value for interpolation.
///
/// Strings are inserted verbatim, null becomes the empty string, and
/// collections use a compact flow notation (`[a, b]`, `{k: v}`).
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(items) => {
            let inner: Vec<String> = items.iter().map(render_value).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Mapping(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", render_value(k), render_value(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
        Value::Tagged(tagged) => render_value(&tagged.value),
    }
}

// ============================================================================
// Link placeholders
// ============================================================================

/// What a link marker points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// The static asset base (`{_static_}`).
    Static,
    /// A directory tag, optionally looked up in another language's tree.
    Tag {
        name: String,
        language: Option<String>,
    },
}

/// A link marker waiting for the tag registry to be complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    pub target: LinkTarget,
    /// Language the page containing the link is rendered in.
    pub rendering_language: String,
}

impl LinkRef {
    /// Language whose tag tree the link resolves against.
    pub fn lookup_language(&self) -> &str {
        match &self.target {
            LinkTarget::Tag {
                language: Some(lang),
                ..
            } => lang,
            _ => &self.rendering_language,
        }
    }
}

impl fmt::Display for LinkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            LinkTarget::Static => write!(f, "{{_{STATIC_LINK}_}}"),
            LinkTarget::Tag {
                name,
                language: Some(lang),
            } => write!(f, "{{_{name}[{lang}]_}}"),
            LinkTarget::Tag {
                name,
                language: None,
            } => write!(f, "{{_{name}_}}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Link(LinkRef),
}

/// A rendered page whose links are still placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageBody {
    pub segments: Vec<Segment>,
}

impl PageBody {
    /// Every unresolved link, in document order.
    pub fn links(&self) -> impl Iterator<Item = &LinkRef> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Link(link) => Some(link),
            Segment::Text(_) => None,
        })
    }

    /// Produce the final text, asking `resolve` for the URL of every link.
    pub fn resolve<F, E>(&self, mut resolve: F) -> Result<String, E>
    where
        F: FnMut(&LinkRef) -> Result<String, E>,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Link(link) => out.push_str(&resolve(link)?),
            }
        }
        Ok(out)
    }
}

/// Pass 4: turn every link marker into a placeholder segment.
///
/// `self_tag` is substituted for the special `self` name so the placeholder
/// already carries the concrete tag.
pub fn extract_links(
    text: &str,
    rendering_language: &str,
    self_tag: &str,
) -> Result<PageBody, ExprError> {
    let mut segments = Vec::new();
    let mut pos = 0;
    while let Some(span) = find_marker(text, MarkerKind::Link, pos)? {
        if span.start > pos {
            segments.push(Segment::Text(text[pos..span.start].to_string()));
        }
        segments.push(Segment::Link(LinkRef {
            target: parse_link_body(span.body(text), self_tag),
            rendering_language: rendering_language.to_string(),
        }));
        pos = span.end();
    }
    if pos < text.len() {
        segments.push(Segment::Text(text[pos..].to_string()));
    }
    Ok(PageBody { segments })
}

fn parse_link_body(body: &str, self_tag: &str) -> LinkTarget {
    let (name, language) = match body.strip_suffix(']').and_then(|b| b.split_once('[')) {
        Some((name, lang)) => (name, Some(lang.to_string())),
        None => (body, None),
    };
    // `static[lang]` is an ordinary tag lookup, not the asset base
    if name == STATIC_LINK && language.is_none() {
        return LinkTarget::Static;
    }
    let name = if name == SELF_LINK { self_tag } else { name };
    LinkTarget::Tag {
        name: name.to_string(),
        language,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Frame;
    use pretty_assertions::assert_eq;

    fn string_stack(frames: &[&[(&str, &str)]]) -> ScopedStack<String> {
        let mut stack = ScopedStack::new();
        for pairs in frames {
            stack.push(
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            );
        }
        stack
    }

    fn var_stack(yaml: &str) -> ScopedStack<Value> {
        let frame: Frame<Value> = serde_yaml::from_str(yaml).unwrap();
        let mut stack = ScopedStack::new();
        stack.push(frame);
        stack
    }

    // =========================================================================
    // Fragments
    // =========================================================================

    #[test]
    fn fragment_is_inlined() {
        let frags = string_stack(&[&[("nav", "<nav>menu</nav>")]]);
        let out = expand_fragments("<body>{#nav#}</body>", &frags).unwrap();
        assert_eq!(out, "<body><nav>menu</nav></body>");
    }

    #[test]
    fn nested_fragments_expand_until_none_remain() {
        let frags = string_stack(&[&[("page", "<main>{#footer#}</main>"), ("footer", "<footer/>")]]);
        let out = expand_fragments("{#page#}", &frags).unwrap();
        assert_eq!(out, "<main><footer/></main>");
    }

    #[test]
    fn fragment_leaves_other_markers_for_later_passes() {
        let frags = string_stack(&[&[("title", "<h1>{$title$} {%(hi)Hi%} {_home_}</h1>")]]);
        let out = expand_fragments("{#title#}", &frags).unwrap();
        assert_eq!(out, "<h1>{$title$} {%(hi)Hi%} {_home_}</h1>");
    }

    #[test]
    fn missing_fragment_expands_to_nothing() {
        let frags = string_stack(&[]);
        let out = expand_fragments("a{#nope#}b", &frags).unwrap();
        assert_eq!(out, "ab");
    }

    #[test]
    fn repeated_fragment_is_expanded_everywhere() {
        let frags = string_stack(&[&[("hr", "<hr>")]]);
        let out = expand_fragments("{#hr#}x{#hr#}", &frags).unwrap();
        assert_eq!(out, "<hr>x<hr>");
    }

    #[test]
    fn self_including_fragment_hits_the_limit() {
        let frags = string_stack(&[&[("loop", "again {#loop#}")]]);
        let err = expand_fragments("{#loop#}", &frags).unwrap_err();
        assert_eq!(err, ExprError::ExpansionLimit(MarkerKind::Fragment));
    }

    #[test]
    fn self_referencing_variable_hits_the_limit() {
        let vars = var_stack("a: '{$a$}'");
        let err = expand_variables("{$a$}", &vars).unwrap_err();
        assert_eq!(err, ExprError::ExpansionLimit(MarkerKind::Variable));
    }

    #[test]
    fn self_referencing_locale_string_hits_the_limit() {
        let locale = string_stack(&[&[("a", "{%(a)x%}")]]);
        let err = expand_locale("{%(a)x%}", &locale).unwrap_err();
        assert_eq!(err, ExprError::ExpansionLimit(MarkerKind::Locale));
    }

    #[test]
    fn unterminated_fragment_is_error() {
        let frags = string_stack(&[&[("nav", "x")]]);
        let err = expand_fragments("ok {#nav", &frags).unwrap_err();
        assert_eq!(
            err,
            ExprError::Unterminated {
                kind: MarkerKind::Fragment,
                offset: 3
            }
        );
    }

    #[test]
    fn close_delimiter_before_open_does_not_count() {
        let frags = string_stack(&[&[("nav", "x")]]);
        let err = expand_fragments("#} {#nav", &frags).unwrap_err();
        assert!(matches!(err, ExprError::Unterminated { .. }));
    }

    // =========================================================================
    // Variables
    // =========================================================================

    #[test]
    fn variable_is_interpolated() {
        let vars = var_stack("title: Home\ncount: 3\nratio: 0.5\ndraft: false");
        let out = expand_variables("{$title$}/{$count$}/{$ratio$}/{$draft$}", &vars).unwrap();
        assert_eq!(out, "Home/3/0.5/false");
    }

    #[test]
    fn missing_variable_expands_to_nothing() {
        let vars = var_stack("a: 1");
        let out = expand_variables("[{$b$}]", &vars).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn variable_value_is_expanded_again() {
        let vars = var_stack("full: '{$first$} Doe'\nfirst: Jane");
        let out = expand_variables("{$full$}", &vars).unwrap();
        assert_eq!(out, "Jane Doe");
    }

    #[test]
    fn variable_pass_ignores_fragment_markers() {
        let vars = var_stack("a: 1");
        let out = expand_variables("{#frag#}{$a$}", &vars).unwrap();
        assert_eq!(out, "{#frag#}1");
    }

    #[test]
    fn unterminated_variable_is_error() {
        let vars = var_stack("a: 1");
        let err = expand_variables("{$a", &vars).unwrap_err();
        assert!(matches!(
            err,
            ExprError::Unterminated {
                kind: MarkerKind::Variable,
                ..
            }
        ));
    }

    #[test]
    fn render_value_forms() {
        let v: Value = serde_yaml::from_str("[1, two, {k: v}]").unwrap();
        assert_eq!(render_value(&v), "[1, two, {k: v}]");
        assert_eq!(render_value(&Value::Null), "");
        assert_eq!(render_value(&Value::Bool(true)), "true");
    }

    // =========================================================================
    // Locale
    // =========================================================================

    #[test]
    fn locale_entry_is_used_when_present() {
        let fr = string_stack(&[&[("greeting", "Bonjour")]]);
        let out = expand_locale("{%(greeting)Hello%}!", &fr).unwrap();
        assert_eq!(out, "Bonjour!");
    }

    #[test]
    fn locale_falls_back_to_inline_default() {
        let en = string_stack(&[&[]]);
        let out = expand_locale("{%(greeting)Hello%}", &en).unwrap();
        assert_eq!(out, "Hello");
    }

    #[test]
    fn locale_default_may_be_empty_or_contain_parens() {
        let empty = string_stack(&[]);
        assert_eq!(expand_locale("<{%(x)%}>", &empty).unwrap(), "<>");
        assert_eq!(expand_locale("{%(x)a (b)%}", &empty).unwrap(), "a (b)");
    }

    #[test]
    fn locale_nearest_frame_wins() {
        let stack = string_stack(&[&[("t", "outer")], &[("t", "inner")]]);
        assert_eq!(expand_locale("{%(t)x%}", &stack).unwrap(), "inner");
    }

    #[test]
    fn malformed_locale_marker_is_error() {
        let stack = string_stack(&[]);
        let err = expand_locale("{%greeting%}", &stack).unwrap_err();
        assert_eq!(err, ExprError::MalformedLocale("greeting".to_string()));
    }

    // =========================================================================
    // Links
    // =========================================================================

    #[test]
    fn links_become_placeholder_segments() {
        let body = extract_links(r#"<a href="{_home_}">home</a>"#, "en", "abc").unwrap();
        assert_eq!(
            body.segments,
            vec![
                Segment::Text(r#"<a href=""#.to_string()),
                Segment::Link(LinkRef {
                    target: LinkTarget::Tag {
                        name: "home".to_string(),
                        language: None
                    },
                    rendering_language: "en".to_string(),
                }),
                Segment::Text(r#"">home</a>"#.to_string()),
            ]
        );
    }

    #[test]
    fn explicit_language_override_is_kept() {
        let body = extract_links("{_home[fr]_}", "en", "abc").unwrap();
        let link = body.links().next().unwrap();
        assert_eq!(link.lookup_language(), "fr");
        assert_eq!(link.rendering_language, "en");
        assert_eq!(link.to_string(), "{_home[fr]_}");
    }

    #[test]
    fn self_and_static_are_special() {
        let body = extract_links("{_self_}|{_static_}|{_self[de]_}", "en", "t-42").unwrap();
        let links: Vec<&LinkRef> = body.links().collect();
        assert_eq!(
            links[0].target,
            LinkTarget::Tag {
                name: "t-42".to_string(),
                language: None
            }
        );
        assert_eq!(links[1].target, LinkTarget::Static);
        assert_eq!(links[2].lookup_language(), "de");
    }

    #[test]
    fn static_with_language_is_an_ordinary_tag() {
        let body = extract_links("{_static[fr]_}", "en", "s").unwrap();
        let link = body.links().next().unwrap();
        assert_eq!(
            link.target,
            LinkTarget::Tag {
                name: "static".to_string(),
                language: Some("fr".to_string())
            }
        );
    }

    #[test]
    fn resolve_concatenates_segments() {
        let body = extract_links("a{_x_}b{_y_}c", "en", "s").unwrap();
        let out: Result<String, ()> = body.resolve(|link| Ok(format!("<{link}>")));
        assert_eq!(out.unwrap(), "a<{_x_}>b<{_y_}>c");
    }

    #[test]
    fn text_without_links_is_one_segment() {
        let body = extract_links("plain", "en", "s").unwrap();
        assert_eq!(body.segments, vec![Segment::Text("plain".to_string())]);
        assert_eq!(body.links().count(), 0);
    }

    #[test]
    fn unterminated_link_is_error() {
        let err = extract_links("{_home", "en", "s").unwrap_err();
        assert!(matches!(
            err,
            ExprError::Unterminated {
                kind: MarkerKind::Link,
                ..
            }
        ));
    }

    #[test]
    fn full_pipeline_order() {
        let frags = string_stack(&[&[("head", "<title>{$title$} - {%(site)Site%}</title>")]]);
        let vars = var_stack("title: Blog");
        let fr = string_stack(&[&[("site", "Le Site")]]);

        let text = expand_fragments("{#head#}<a href=\"{_home_}\">", &frags).unwrap();
        let text = expand_variables(&text, &vars).unwrap();
        let text = expand_locale(&text, &fr).unwrap();
        let body = extract_links(&text, "fr", "s").unwrap();
        let html: Result<String, ()> = body.resolve(|_| Ok("https://x.org/fr/".to_string()));

        assert_eq!(
            html.unwrap(),
            "<title>Blog - Le Site</title><a href=\"https://x.org/fr/\">"
        );
    }
}
