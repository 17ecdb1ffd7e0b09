//! Content-type detection and pre-compression normalization patterns.

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::codec::Algorithm;
use crate::error::{CompressError, Result};

/// Detected (or declared) shape of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    /// Plain prose
    Text,
    /// Structural markup
    Html,
    /// Object or array document
    Json,
    /// Markdown source
    Markdown,
    /// Editor output with inline formatting tags
    RichText,
}

impl ContentType {
    /// All content types
    pub fn all() -> &'static [ContentType] {
        &[
            ContentType::Text,
            ContentType::Html,
            ContentType::Json,
            ContentType::Markdown,
            ContentType::RichText,
        ]
    }

    /// Tag name
    pub fn name(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Html => "html",
            ContentType::Json => "json",
            ContentType::Markdown => "markdown",
            ContentType::RichText => "rich-text",
        }
    }

    /// Minimum size in bytes worth compressing
    pub fn threshold(&self) -> usize {
        match self {
            ContentType::Text => 512,
            ContentType::Html | ContentType::Json | ContentType::Markdown => 1024,
            ContentType::RichText => 2048,
        }
    }

    /// Codec that suits this shape best
    pub fn default_algorithm(&self) -> Algorithm {
        match self {
            ContentType::Html | ContentType::RichText => Algorithm::Brotli,
            ContentType::Text | ContentType::Json | ContentType::Markdown => Algorithm::Gzip,
        }
    }

    /// Typical compressed/original ratio. Heuristic, not measured.
    pub fn estimated_ratio(&self) -> f64 {
        match self {
            ContentType::Text => 0.7,
            ContentType::Html => 0.3,
            ContentType::Json => 0.4,
            ContentType::Markdown => 0.6,
            ContentType::RichText => 0.4,
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ContentType {
    type Err = CompressError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(ContentType::Text),
            "html" => Ok(ContentType::Html),
            "json" => Ok(ContentType::Json),
            "markdown" | "md" => Ok(ContentType::Markdown),
            "rich-text" | "richtext" => Ok(ContentType::RichText),
            other => Err(CompressError::Config(format!("Unknown content type: {other}"))),
        }
    }
}

/// Tags that mark editor formatting rather than document structure.
///
/// Deliberately limited to inline emphasis and headings: markup built only
/// from structural tags such as `p`, `div`, `ul` or `li` stays html.
const FORMATTING_TAGS: &[&str] = &["strong", "em", "u", "h1", "h2", "h3", "h4", "h5", "h6"];

/// Markdown constructs, any one of which classifies a payload as markdown
static MARKDOWN_PATTERNS: &[(&str, &str)] = &[
    ("header", r"(?m)^#{1,6}\s+\S"),
    ("bullet_list", r"(?m)^\s*[-*+]\s+\S"),
    ("numbered_list", r"(?m)^\s*\d+\.\s+\S"),
    ("image", r"!\[[^\]]*\]\([^)\s]+\)"),
    ("link", r"\[[^\]]+\]\([^)\s]+\)"),
    ("fenced_code", r"(?m)^```"),
    ("inline_code", r"`[^`\n]+`"),
    ("blockquote", r"(?m)^>\s?\S"),
];

/// HTML normalization, applied in order
static HTML_RULES: &[(&str, &str)] = &[(r">\s+<", "><"), (r"\s+", " ")];

/// Markdown normalization, applied in order
static MARKDOWN_RULES: &[(&str, &str)] = &[(r"(?m)[ \t]+$", ""), (r"\n{3,}", "\n\n")];

lazy_static! {
    static ref TAG_REGEX: Option<Regex> =
        Regex::new(r"</?([A-Za-z][A-Za-z0-9]*)(?:\s[^<>]*)?/?>").ok();

    static ref MARKDOWN_REGEX: Vec<(&'static str, Regex)> = MARKDOWN_PATTERNS
        .iter()
        .filter_map(|(name, pattern)| Regex::new(pattern).ok().map(|r| (*name, r)))
        .collect();

    static ref HTML_REGEX: Vec<(Regex, &'static str)> = compile_rules(HTML_RULES);
    static ref MARKDOWN_RULE_REGEX: Vec<(Regex, &'static str)> = compile_rules(MARKDOWN_RULES);
}

fn compile_rules(rules: &'static [(&'static str, &'static str)]) -> Vec<(Regex, &'static str)> {
    rules
        .iter()
        .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|r| (r, *replacement)))
        .collect()
}

fn apply_rules(content: &str, rules: &[(Regex, &'static str)]) -> String {
    rules.iter().fold(content.to_string(), |text, (re, replacement)| {
        re.replace_all(&text, *replacement).into_owned()
    })
}

/// Classify a payload.
///
/// Markup wins over everything else, then strict JSON, then markdown
/// patterns. Anything left is plain text.
pub fn detect_content_type(content: &str) -> ContentType {
    let mut saw_tag = false;
    let tags = TAG_REGEX.iter().flat_map(|re| re.captures_iter(content));
    for captures in tags {
        saw_tag = true;
        let name = captures
            .get(1)
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default();
        if FORMATTING_TAGS.contains(&name.as_str()) {
            return ContentType::RichText;
        }
    }
    if saw_tag {
        return ContentType::Html;
    }

    if is_json_document(content) {
        return ContentType::Json;
    }

    if MARKDOWN_REGEX.iter().any(|(_, re)| re.is_match(content)) {
        return ContentType::Markdown;
    }

    ContentType::Text
}

fn is_json_document(content: &str) -> bool {
    let trimmed = content.trim();
    (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
}

/// Deterministic normalization that only drops insignificant bytes.
///
/// Content that fails to parse as its declared type is returned unchanged.
pub fn optimize_for_compression(content: &str, content_type: ContentType) -> Cow<'_, str> {
    match content_type {
        ContentType::Html => Cow::Owned(apply_rules(content, &HTML_REGEX).trim().to_string()),
        ContentType::Json => match serde_json::from_str::<serde_json::Value>(content) {
            Ok(value) => match serde_json::to_string(&value) {
                Ok(compact) => Cow::Owned(compact),
                Err(_) => Cow::Borrowed(content),
            },
            Err(_) => Cow::Borrowed(content),
        },
        ContentType::Markdown => Cow::Owned(apply_rules(content, &MARKDOWN_RULE_REGEX)),
        ContentType::Text | ContentType::RichText => Cow::Borrowed(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_cases() {
        assert_eq!(detect_content_type("<ul><li>a</li></ul>"), ContentType::Html);
        assert_eq!(
            detect_content_type("<ul><li><strong>a</strong></li></ul>"),
            ContentType::RichText
        );
        assert_eq!(detect_content_type("<h2>Groceries</h2>"), ContentType::RichText);
        assert_eq!(detect_content_type(r#"{"a":1}"#), ContentType::Json);
        assert_eq!(detect_content_type("[1, 2, 3]"), ContentType::Json);
        assert_eq!(detect_content_type("# Title\n- item"), ContentType::Markdown);
        assert_eq!(detect_content_type("see [docs](http://x.io)"), ContentType::Markdown);
        assert_eq!(detect_content_type("plain sentence"), ContentType::Text);
    }

    #[test]
    fn test_scalars_are_not_json() {
        assert_eq!(detect_content_type("42"), ContentType::Text);
        assert_eq!(detect_content_type("\"quoted\""), ContentType::Text);
        assert_eq!(detect_content_type("{not json"), ContentType::Text);
    }

    #[test]
    fn test_comparison_is_not_markup() {
        assert_eq!(detect_content_type("if a < b and c > d"), ContentType::Text);
    }

    #[test]
    fn test_type_table() {
        assert_eq!(ContentType::Text.threshold(), 512);
        assert_eq!(ContentType::RichText.threshold(), 2048);
        assert_eq!(ContentType::Html.default_algorithm(), Algorithm::Brotli);
        assert_eq!(ContentType::Json.default_algorithm(), Algorithm::Gzip);
        for ty in ContentType::all() {
            assert_eq!(ty.name().parse::<ContentType>().unwrap(), *ty);
        }
    }

    #[test]
    fn test_optimize_html() {
        let html = "<div>\n   <p>Hello    world</p>\n</div>\n";
        assert_eq!(
            optimize_for_compression(html, ContentType::Html),
            "<div><p>Hello world</p></div>"
        );
    }

    #[test]
    fn test_optimize_json() {
        let json = "{\n  \"a\": 1,\n  \"b\": [1, 2]\n}";
        assert_eq!(
            optimize_for_compression(json, ContentType::Json),
            r#"{"a":1,"b":[1,2]}"#
        );
        assert_eq!(optimize_for_compression("{oops", ContentType::Json), "{oops");
    }

    #[test]
    fn test_optimize_markdown() {
        let md = "# Title   \n\n\n\n- item\t\nend";
        assert_eq!(
            optimize_for_compression(md, ContentType::Markdown),
            "# Title\n\n- item\nend"
        );
    }
}
