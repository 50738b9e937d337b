use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// Page furniture dropped before scoring; it repeats on every page of a site
/// and would otherwise dominate keyword counts.
pub const BOILERPLATE_TAGS: &[&str] = &["nav", "header", "footer", "aside", "script", "style", "noscript"];

/// Remove every element matching one of `tags` from the parsed document.
pub fn strip_elements(document: &mut Html, tags: &[&str]) {
    let mut doomed = Vec::new();
    for tag in tags {
        if let Ok(selector) = Selector::parse(tag) {
            doomed.extend(document.select(&selector).map(|element| element.id()));
        }
    }
    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn joined_text<'a>(pieces: impl Iterator<Item = &'a str>) -> String {
    pieces
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the page's `<main>` region with boilerplate removed, falling back
/// to the whole document when there is no `<main>`.
pub fn extract_main_content(html: &str) -> String {
    let mut document = Html::parse_document(html);
    strip_elements(&mut document, BOILERPLATE_TAGS);

    if let Ok(main_selector) = Selector::parse("main")
        && let Some(main) = document.select(&main_selector).next()
    {
        return joined_text(main.text());
    }
    joined_text(document.root_element().text())
}

pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let base_url = Url::parse(base).ok()?;
    let mut resolved = base_url.join(href).ok()?;
    resolved.set_fragment(None);

    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

pub fn is_same_domain(url: &str, base_domain: &str) -> bool {
    if let Ok(parsed) = Url::parse(url)
        && let Some(host) = parsed.host_str()
    {
        return host == base_domain || host.ends_with(&format!(".{}", base_domain));
    }
    false
}

/// Absolute http(s) links on the page that stay within `base_domain`, in
/// document order and without repeats.
pub fn extract_links(html: &str, current_url: &str, base_domain: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(link_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for element in document.select(&link_selector) {
        if let Some(href) = element.value().attr("href")
            && let Some(absolute_url) = resolve_url(current_url, href)
        {
            if !is_same_domain(&absolute_url, base_domain) {
                debug!("Skipping off-domain link {}", absolute_url);
                continue;
            }
            if seen.insert(absolute_url.clone()) {
                links.push(absolute_url);
            }
        }
    }
    links
}
