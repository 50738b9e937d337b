use crate::error::{CoreError, Result};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use tracing::{debug, info};

pub const DEFAULT_USER_AGENT: &str = "f1rstaid:v1.0";

/// Runtime settings. Every field has a default; the CLI overrides a few.
#[derive(Debug, Clone)]
pub struct Settings {
    pub docs_dir: PathBuf,
    pub index_dir: PathBuf,
    pub chat_model: String,
    pub temperature: f32,
    pub relevance_temperature: f32,
    pub search_k: usize,
    pub embedding_model: String,
    pub embed_batch_size: usize,
    pub openai_base_url: String,
    pub reddit_auth_url: String,
    pub reddit_api_url: String,
    pub load_concurrency: usize,
    pub robots_mapping_file: PathBuf,
    pub relevant_urls_file: PathBuf,
    pub checkpoint_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("docs"),
            index_dir: PathBuf::from("knowledge_index"),
            chat_model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            relevance_temperature: 0.3,
            search_k: 5,
            embedding_model: "text-embedding-3-small".to_string(),
            embed_batch_size: 100,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            reddit_auth_url: "https://www.reddit.com/api/v1/access_token".to_string(),
            reddit_api_url: "https://oauth.reddit.com".to_string(),
            load_concurrency: 8,
            robots_mapping_file: PathBuf::from("websites_robots.json"),
            relevant_urls_file: PathBuf::from("relevant_urls.txt"),
            checkpoint_file: PathBuf::from("crawler_state.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForumCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

/// Layered secret lookup: an explicit override set for this session wins,
/// then the `GROUP_KEY` environment variable (e.g. `OPENAI_API_KEY`).
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    overrides: HashMap<(String, String), String>,
}

pub fn env_var_name(group: &str, key: &str) -> String {
    format!("{}_{}", group.to_uppercase(), key.to_uppercase())
}

impl Secrets {
    /// Load `.env` (if present) into the process environment and start with
    /// no overrides.
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(_) => debug!("No .env file loaded"),
        }
        Self::default()
    }

    pub fn with_override(mut self, group: &str, key: &str, value: impl Into<String>) -> Self {
        self.overrides
            .insert((group.to_string(), key.to_string()), value.into());
        self
    }

    pub fn get(&self, group: &str, key: &str) -> Option<String> {
        self.get_with(group, key, |name| env::var(name).ok())
    }

    pub fn get_with(&self, group: &str, key: &str, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        let explicit = self
            .overrides
            .get(&(group.to_string(), key.to_string()))
            .filter(|value| !value.trim().is_empty());
        if let Some(value) = explicit {
            return Some(value.clone());
        }
        let name = env_var_name(group, key);
        info!("Fetching secret: {}/{} (environment variable {})", group, key, name);
        lookup(&name).filter(|value| !value.trim().is_empty())
    }

    pub fn openai_api_key(&self) -> Result<String> {
        self.get("openai", "api_key")
            .ok_or_else(|| CoreError::Config(format!("{} not found", env_var_name("openai", "api_key"))))
    }

    /// Reddit API credentials, or `None` when the id or secret is missing.
    pub fn forum_credentials(&self) -> Option<ForumCredentials> {
        Some(ForumCredentials {
            client_id: self.get("reddit", "client_id")?,
            client_secret: self.get("reddit", "client_secret")?,
            user_agent: self
                .get("reddit", "user_agent")
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_name() {
        assert_eq!(env_var_name("openai", "api_key"), "OPENAI_API_KEY");
        assert_eq!(env_var_name("reddit", "client_id"), "REDDIT_CLIENT_ID");
    }

    #[test]
    fn test_override_wins_over_environment() {
        let secrets = Secrets::default().with_override("openai", "api_key", "sk-session");
        let value = secrets.get_with("openai", "api_key", |_| Some("sk-env".to_string()));
        assert_eq!(value.as_deref(), Some("sk-session"));
    }

    #[test]
    fn test_blank_values_fall_through() {
        let secrets = Secrets::default().with_override("openai", "api_key", "  ");
        let value = secrets.get_with("openai", "api_key", |name| {
            (name == "OPENAI_API_KEY").then(|| "sk-env".to_string())
        });
        assert_eq!(value.as_deref(), Some("sk-env"));
        assert!(secrets.get_with("openai", "api_key", |_| Some(String::new())).is_none());
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.chat_model, "gpt-3.5-turbo");
        assert_eq!(settings.search_k, 5);
        assert_eq!(settings.index_dir, PathBuf::from("knowledge_index"));
    }
}
