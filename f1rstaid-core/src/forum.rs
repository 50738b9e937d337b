//! Reddit search over the OAuth API (application-only, client credentials).

use crate::config::ForumCredentials;
use crate::document::{Document, Metadata, SourceType};
use crate::error::{CoreError, Result};
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

pub const POSTS_PER_TERM: usize = 10;
pub const COMMENTS_PER_POST: usize = 5;
pub const MIN_FORUM_CHARS: usize = 100;
const FORUM_TIMEOUT: Duration = Duration::from_secs(30);
const PERMALINK_BASE: &str = "https://reddit.com";

pub struct ForumClient {
    client: Client,
    credentials: ForumCredentials,
    auth_url: String,
    api_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Listing<T> {
    data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
struct ListingData<T> {
    children: Vec<Thing<T>>,
}

#[derive(Debug, Deserialize)]
struct Thing<T> {
    kind: String,
    data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub score: i64,
    pub permalink: String,
    #[serde(default)]
    pub created_utc: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub created_utc: f64,
}

fn created_at(created_utc: f64) -> Option<String> {
    chrono::DateTime::from_timestamp(created_utc as i64, 0).map(|ts| ts.to_rfc3339())
}

/// Posts with a body over the minimum length become documents laid out as
/// `Title/Content/Score`.
pub fn post_document(post: &Post, subreddit: &str) -> Option<Document> {
    if post.selftext.chars().count() <= MIN_FORUM_CHARS {
        return None;
    }
    let mut metadata = Metadata::new(format!("{}{}", PERMALINK_BASE, post.permalink), SourceType::Reddit);
    metadata.score = Some(post.score);
    metadata.created_at = created_at(post.created_utc);
    metadata.subreddit = Some(subreddit.to_string());
    metadata.title = Some(post.title.clone());
    Some(Document::new(
        format!(
            "Title: {}\n\nContent: {}\n\nScore: {}",
            post.title, post.selftext, post.score
        ),
        metadata,
    ))
}

pub fn comment_document(comment: &Comment, post: &Post, subreddit: &str) -> Option<Document> {
    if comment.body.chars().count() <= MIN_FORUM_CHARS {
        return None;
    }
    let mut metadata = Metadata::new(format!("{}{}", PERMALINK_BASE, comment.permalink), SourceType::Reddit);
    metadata.score = Some(comment.score);
    metadata.created_at = created_at(comment.created_utc);
    metadata.subreddit = Some(subreddit.to_string());
    metadata.parent_title = Some(post.title.clone());
    Some(Document::new(
        format!(
            "Comment on: {}\n\nContent: {}\n\nScore: {}",
            post.title, comment.body, comment.score
        ),
        metadata,
    ))
}

impl ForumClient {
    pub fn new(credentials: ForumCredentials, auth_url: &str, api_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(FORUM_TIMEOUT)
            .user_agent(credentials.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            credentials,
            auth_url: auth_url.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    async fn authenticate(&mut self) -> Result<String> {
        if let Some(ref token) = self.token {
            return Ok(token.clone());
        }
        let response = self
            .client
            .post(&self.auth_url)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .header(USER_AGENT, &self.credentials.user_agent)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CoreError::Provider(format!(
                "Reddit authentication failed with status {}",
                response.status()
            )));
        }
        let token: TokenResponse = response.json().await?;
        self.token = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&mut self, url: Url) -> Result<T> {
        let token = self.authenticate().await?;
        let response = self.client.get(url.clone()).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            return Err(CoreError::Provider(format!("{} returned {}", url, response.status())));
        }
        Ok(response.json().await?)
    }

    pub async fn search(&mut self, subreddit: &str, term: &str) -> Result<Vec<Post>> {
        let mut url = Url::parse(&format!("{}/r/{}/search", self.api_url, subreddit))?;
        url.query_pairs_mut()
            .append_pair("q", term)
            .append_pair("restrict_sr", "1")
            .append_pair("sort", "relevance")
            .append_pair("limit", &POSTS_PER_TERM.to_string())
            .append_pair("raw_json", "1");
        let listing: Listing<Post> = self.get_json(url).await?;
        Ok(listing
            .data
            .children
            .into_iter()
            .filter(|thing| thing.kind == "t3")
            .map(|thing| thing.data)
            .take(POSTS_PER_TERM)
            .collect())
    }

    /// First top-level comments of a post, "load more" stubs excluded.
    pub async fn top_comments(&mut self, post: &Post) -> Result<Vec<Comment>> {
        let mut url = Url::parse(&format!("{}/comments/{}", self.api_url, post.id))?;
        url.query_pairs_mut()
            .append_pair("limit", &COMMENTS_PER_POST.to_string())
            .append_pair("depth", "1")
            .append_pair("raw_json", "1");
        let (_, comments): (serde_json::Value, Listing<serde_json::Value>) = self.get_json(url).await?;
        let mut out = Vec::new();
        for thing in comments.data.children {
            if thing.kind != "t1" {
                continue;
            }
            out.push(serde_json::from_value(thing.data)?);
            if out.len() == COMMENTS_PER_POST {
                break;
            }
        }
        Ok(out)
    }

    async fn scrape_subreddit(&mut self, subreddit: &str, terms: &[String]) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for term in terms {
            for post in self.search(subreddit, term).await? {
                if let Some(doc) = post_document(&post, subreddit) {
                    documents.push(doc);
                }
                for comment in self.top_comments(&post).await? {
                    if let Some(doc) = comment_document(&comment, &post, subreddit) {
                        documents.push(doc);
                    }
                }
            }
        }
        Ok(documents)
    }

    /// Posts and comments for every subreddit/term pair. A subreddit that
    /// fails is logged and skipped.
    pub async fn scrape(&mut self, subreddits: &[String], terms: &[String]) -> Vec<Document> {
        info!("Starting Reddit content scraping...");
        let mut documents = Vec::new();
        for subreddit in subreddits {
            debug!("Scraping r/{}", subreddit);
            match self.scrape_subreddit(subreddit, terms).await {
                Ok(docs) => documents.extend(docs),
                Err(e) => error!("Error scraping subreddit {}: {}", subreddit, e),
            }
        }
        info!("Scraped {} Reddit documents", documents.len());
        documents
    }
}
