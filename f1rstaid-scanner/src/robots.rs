//! Minimal robots.txt support: fetch, tokenize, and prefix-match paths.
//!
//! The parser ignores user-agent groups and wildcards; every
//! `Allow:`/`Disallow:` directive in the file applies to the crawler.

use crate::error::Result;
use crate::fetch::{RetryPolicy, get_with_retries};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const ROBOTS_TIMEOUT: Duration = Duration::from_secs(10);
pub const ROBOTS_RETRY: RetryPolicy = RetryPolicy::new(3, Duration::from_millis(300));

/// Base URL -> robots.txt collapsed onto a single line.
pub type RobotsMapping = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotsPolicy {
    pub disallowed: Vec<String>,
    pub allowed: Vec<String>,
}

impl RobotsPolicy {
    pub fn parse(robots_txt: &str) -> Self {
        let (disallowed, allowed) = parse_robots_txt(robots_txt);
        Self {
            disallowed,
            allowed,
        }
    }

    pub fn is_allowed(&self, url: &str) -> bool {
        is_allowed(url, &self.disallowed, &self.allowed)
    }
}

/// Download `<base_url>/robots.txt`. Any failure or non-200 status yields an
/// empty string, which parses to an allow-everything policy.
pub async fn fetch_robots_txt(client: &Client, base_url: &str, retry: RetryPolicy) -> String {
    let robots_url = format!("{}/robots.txt", base_url.trim_end_matches('/'));
    match get_with_retries(client, &robots_url, retry).await {
        Ok(response) if response.status().as_u16() == 200 => match response.text().await {
            Ok(body) => {
                info!("Fetched robots.txt from {}", robots_url);
                collapse_whitespace(&body)
            }
            Err(e) => {
                warn!("Could not read robots.txt body from {}: {}", robots_url, e);
                String::new()
            }
        },
        Ok(response) => {
            warn!(
                "Received status code {} for {}",
                response.status().as_u16(),
                robots_url
            );
            String::new()
        }
        Err(e) => {
            warn!("Error fetching {}: {}", robots_url, e);
            String::new()
        }
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract `(disallowed, allowed)` path lists from robots.txt text. The path
/// may be glued to the directive (`Disallow:/admin`) or be the next token.
pub fn parse_robots_txt(robots_txt: &str) -> (Vec<String>, Vec<String>) {
    let mut disallowed = Vec::new();
    let mut allowed = Vec::new();
    let tokens: Vec<&str> = robots_txt.split_whitespace().collect();

    for (i, token) in tokens.iter().enumerate() {
        let lowered = token.to_ascii_lowercase();
        let (target, directive_len) = if lowered.starts_with("disallow:") {
            (&mut disallowed, "disallow:".len())
        } else if lowered.starts_with("allow:") {
            (&mut allowed, "allow:".len())
        } else {
            continue;
        };

        let inline = &token[directive_len..];
        let path = if !inline.is_empty() {
            inline
        } else {
            match tokens.get(i + 1) {
                // A bare directive followed by another directive has no path.
                Some(next) if !next.ends_with(':') => *next,
                _ => "",
            }
        };
        if !path.is_empty() {
            target.push(path.to_string());
        }
    }

    (disallowed, allowed)
}

/// Allowed prefixes win unconditionally; otherwise any disallowed prefix
/// rejects; otherwise the URL is allowed.
pub fn is_allowed(url: &str, disallowed: &[String], allowed: &[String]) -> bool {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    };

    if allowed
        .iter()
        .any(|prefix| !prefix.is_empty() && path.starts_with(prefix.as_str()))
    {
        return true;
    }
    if let Some(prefix) = disallowed
        .iter()
        .find(|prefix| !prefix.is_empty() && path.starts_with(prefix.as_str()))
    {
        debug!("URL {} is disallowed because it starts with {}", url, prefix);
        return false;
    }
    true
}

pub fn save_robots_mapping(path: &Path, mapping: &RobotsMapping) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(mapping)?)?;
    info!("Saved robots.txt mapping to {}", path.display());
    Ok(())
}

pub fn load_robots_mapping(path: &Path) -> Result<RobotsMapping> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
