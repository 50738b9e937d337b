//! Answer and source rendering.

use crate::document::{Document, SourceType};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::error;
use url::Url;

pub const REDDIT_DISCLAIMER: &str = "⚠️ Note: Some of this information comes from Reddit community experiences \
     and should be verified with official sources.\n\n";
pub const PREVIEW_CHARS: usize = 200;

pub const SOURCE_CSS: &str = "<style>\
.source-block{background-color:#ffffff;border:1px solid #e1e4e8;margin:15px 0;padding:20px;border-radius:8px;}\
.source-block h4{color:#0366d6;margin:0 0 15px 0;border-bottom:2px solid #0366d6;padding-bottom:5px;}\
.source-content{margin-left:10px;}\
.preview-box{background-color:#f6f8fa;padding:10px;border-radius:5px;margin-top:10px;}\
.preview-text{font-family:monospace;font-size:0.9em;line-height:1.4;white-space:pre-wrap;}\
</style>";

static RE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static RE_TRIPLE_QUOTE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?s)""".*?""""#).unwrap());
static RE_INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]+)`").unwrap());
// Closing paren optional: previews are cut mid-link.
static RE_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)?").unwrap());
static RE_EMPHASIS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[*_~]").unwrap());
static RE_HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*#+\s*").unwrap());

pub fn clean_markdown(text: &str) -> String {
    let text = RE_FENCE.replace_all(text, "");
    let text = RE_TRIPLE_QUOTE.replace_all(&text, "");
    let text = RE_INLINE_CODE.replace_all(&text, "$1");
    let text = RE_LINK.replace_all(&text, "$1");
    let text = RE_EMPHASIS.replace_all(&text, "");
    let text = RE_HEADING.replace_all(&text, "");
    text.trim().to_string()
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn has_reddit_sources(sources: &[Document]) -> bool {
    sources.iter().any(|doc| doc.source_type() == SourceType::Reddit)
}

/// Prepend the community disclaimer when any source came from Reddit.
pub fn format_answer(result: &str, sources: &[Document]) -> String {
    if has_reddit_sources(sources) {
        format!("{}{}", REDDIT_DISCLAIMER, result)
    } else {
        result.to_string()
    }
}

/// Split sources into (official, community) preserving order.
pub fn partition_sources(sources: &[Document]) -> (Vec<Document>, Vec<Document>) {
    sources
        .iter()
        .cloned()
        .partition(|doc| doc.source_type().is_official())
}

pub fn source_link(doc: &Document, docs_dir: &Path) -> String {
    let source = &doc.metadata.source;
    match doc.source_type() {
        SourceType::Web | SourceType::Reddit => match Url::parse(source) {
            Ok(url) if url.host_str().is_some_and(|host| !host.is_empty()) => {
                format!("<a href='{}' target='_blank'>{} 🔗</a>", source, source)
            }
            _ => "Invalid URL ❌".to_string(),
        },
        SourceType::Pdf => {
            let Some(filename) = Path::new(source).file_name() else {
                return "Source unavailable ❌".to_string();
            };
            let full_path = docs_dir.join(filename);
            if !full_path.is_file() {
                return "Source unavailable ❌".to_string();
            }
            match fs::read(&full_path) {
                Ok(bytes) => format!(
                    "<a href='data:application/pdf;base64,{}' download='{}'>Download {} 📄</a>",
                    STANDARD.encode(bytes),
                    filename.to_string_lossy(),
                    filename.to_string_lossy()
                ),
                Err(e) => {
                    error!("Error encoding PDF {}: {}", full_path.display(), e);
                    "Source link error ⚠️".to_string()
                }
            }
        }
    }
}

pub fn preview(doc: &Document) -> String {
    let raw: String = doc.content.chars().take(PREVIEW_CHARS).collect();
    escape_html(&clean_markdown(raw.replace('\n', " ").trim()))
}

/// Numbered HTML blocks with type, link and a short escaped preview.
pub fn format_sources(sources: &[Document], docs_dir: &Path) -> String {
    let blocks: Vec<String> = sources
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            [
                "<div class='source-block'>".to_string(),
                format!("<h4>Source {}</h4>", i + 1),
                "<div class='source-content'>".to_string(),
                format!("<p><strong>Type:</strong> {}</p>", doc.source_type().as_str().to_uppercase()),
                format!("<p><strong>Source:</strong> {}</p>", source_link(doc, docs_dir)),
                "<div class='preview-box'>".to_string(),
                "<p><strong>Preview:</strong></p>".to_string(),
                format!("<p class='preview-text'>{}...</p>", preview(doc)),
                "</div>".to_string(),
                "</div>".to_string(),
                "</div>".to_string(),
            ]
            .join("\n")
        })
        .collect();
    format!("{}{}", SOURCE_CSS, blocks.join("\n\n\n\n"))
}
