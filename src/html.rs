//! HTML sanitizing and HTML-to-text conversion

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Cleans untrusted HTML before it is handed to a renderer
pub trait HtmlSanitizer {
    fn clean(&self, html: &str) -> String;
}

static DANGEROUS_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|iframe|object|applet|embed|frameset|head)\b.*?</(script|style|iframe|object|applet|embed|frameset|head)\s*>").unwrap()
});

static DANGEROUS_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(script|style|iframe|object|applet|embed|frame|frameset|meta|link|base|html|head|body|title)\b[^>]*>").unwrap()
});

static EVENT_ATTRS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).unwrap()
});

static SCRIPT_URLS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(href|src)\s*=\s*(["']?)\s*(?:java|vb)script:[^"'\s>]*"#).unwrap()
});

/// Regex-based sanitizer: drops scripts, styles, frames, embedded objects,
/// page structure, meta/link tags, event handlers and `javascript:` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicSanitizer;

impl HtmlSanitizer for BasicSanitizer {
    fn clean(&self, html: &str) -> String {
        let html = DANGEROUS_BLOCKS.replace_all(html, "");
        let html = DANGEROUS_TAGS.replace_all(&html, "");
        let html = EVENT_ATTRS.replace_all(&html, "");
        SCRIPT_URLS
            .replace_all(&html, "$1=$2#")
            .trim()
            .to_string()
    }
}

static IMGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\s+[^>]*src=['"]?([^'">]+)[^>]*>"#).unwrap()
});

static IMG_ALT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\s+[^>]*alt=['"]?([^'">]+)[^>]*>"#).unwrap()
});

static LINKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s+[^>]*href=['"]?([^'">]+)[^>]*>([^<]*)</a>"#).unwrap()
});

static BORING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+|<style[^>]*>[^<>]*</style>").unwrap());

static NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(<br|</(?:tr|table))").unwrap());

static PARAGRAPHS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(</?p|</?(?:title|div|html|body))").unwrap());

static EXCESS_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n\s*").unwrap());

/// Render HTML as plain text.
///
/// Links become `text[N]` with a `Links:` list appended, images become
/// `[Image N]` (or their `alt` text) with an `Images:` list appended.
/// Links whose text already is a URL, and `mailto:` links, are inlined.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let mut links: Vec<String> = Vec::new();
    let mut images: Vec<String> = Vec::new();

    let html = IMGS.replace_all(html, |caps: &Captures<'_>| {
        let tag = &caps[0];
        if tag.contains(" alt=")
            && let Some(alt) = IMG_ALT.captures(tag)
        {
            return alt[1].trim().to_string();
        }
        images.push(format!(" [{}] {}", images.len() + 1, &caps[1]));
        format!("[Image {}]", images.len())
    });

    let html = LINKS.replace_all(&html, |caps: &Captures<'_>| {
        let url = &caps[1];
        let text = caps[2].trim();
        if text.starts_with("http") || text.starts_with("www.") {
            return text.to_string();
        }
        if let Some(address) = url.strip_prefix("mailto:") {
            return if text.contains('@') {
                text.to_string()
            } else {
                format!("{text} ({address})")
            };
        }
        let label = if text.is_empty() {
            String::new()
        } else {
            format!("{text}: ")
        };
        links.push(format!(" [{}] {label}{url}", links.len() + 1));
        format!("{text}[{}]", links.len())
    });

    let html = BORING.replace_all(&html, " ");
    let html = NEWLINES.replace_all(&html, "\n$1");
    let html = PARAGRAPHS.replace_all(&html, "\n\n$1");

    let mut text = if html.trim().is_empty() {
        String::new()
    } else {
        text_content(&html)
    };
    if !links.is_empty() {
        text.push_str("\n\nLinks:\n");
        text.push_str(&links.join("\n"));
    }
    if !images.is_empty() {
        text.push_str("\n\nImages:\n");
        text.push_str(&images.join("\n"));
    }

    EXCESS_WHITESPACE
        .replace_all(&text, "\n\n")
        .trim()
        .to_string()
}

/// Drop tags (and script/style contents), then decode common entities
fn text_content(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut in_script = false;
    let mut in_style = false;

    let lower = html.to_lowercase();
    let lower_chars: Vec<char> = lower.chars().collect();
    let chars: Vec<char> = html.chars().collect();
    // Lowercasing can change the char count for a few scripts
    let aligned = lower_chars.len() == chars.len();

    for (i, &c) in chars.iter().enumerate() {
        if !in_tag && c == '<' {
            if aligned {
                let rest: String = lower_chars[i..lower_chars.len().min(i + 9)]
                    .iter()
                    .collect();
                if rest.starts_with("<script") {
                    in_script = true;
                } else if rest.starts_with("<style") {
                    in_style = true;
                } else if rest.starts_with("</script") {
                    in_script = false;
                } else if rest.starts_with("</style") {
                    in_style = false;
                }
            }
            in_tag = true;
        } else if in_tag && c == '>' {
            in_tag = false;
        } else if !in_tag && !in_script && !in_style {
            result.push(c);
        }
    }

    result
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
