// Tests for the Reddit client against a mock API

use f1rstaid_core::config::ForumCredentials;
use f1rstaid_core::document::SourceType;
use f1rstaid_core::forum::ForumClient;
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path, query_param},
};

fn long_text(topic: &str) -> String {
    format!("{} ", topic).repeat(12)
}

fn credentials() -> ForumCredentials {
    ForumCredentials {
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        user_agent: "f1rstaid:test".to_string(),
    }
}

fn post(id: &str, title: &str, body: &str) -> Value {
    json!({
        "kind": "t3",
        "data": {
            "id": id,
            "title": title,
            "selftext": body,
            "score": 42,
            "permalink": format!("/r/f1visa/comments/{}/post/", id),
            "created_utc": 1700000000.0
        }
    })
}

fn comment(id: &str, body: &str) -> Value {
    json!({
        "kind": "t1",
        "data": {
            "body": body,
            "score": 7,
            "permalink": format!("/r/f1visa/comments/p1/post/{}/", id),
            "created_utc": 1700000100.0
        }
    })
}

async fn mount_auth(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok", "expires_in": 3600})))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_thread(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/r/f1visa/search"))
        .and(query_param("q", "OPT"))
        .and(query_param("restrict_sr", "1"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "Listing",
            "data": {"children": [
                post("p1", "OPT travel", &long_text("Travelling on OPT with an EAD card.")),
                post("p2", "Short", "too short")
            ]}
        })))
        .mount(server)
        .await;
    for id in ["p1", "p2"] {
        Mock::given(method("GET"))
            .and(path(format!("/comments/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"kind": "Listing", "data": {"children": []}},
                {"kind": "Listing", "data": {"children": [
                    comment("c1", &long_text("Bring your I-20 with a travel signature.")),
                    comment("c2", "thanks!"),
                    {"kind": "more", "data": {"count": 3, "children": ["x"]}}
                ]}}
            ])))
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_scrape_builds_post_and_comment_documents() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_thread(&server).await;

    let auth_url = format!("{}/api/v1/access_token", server.uri());
    let mut client = ForumClient::new(credentials(), &auth_url, &server.uri()).unwrap();
    let docs = client
        .scrape(&["f1visa".to_string()], &["OPT".to_string()])
        .await;

    // one long post plus one long comment under each of the two posts
    assert_eq!(docs.len(), 3);
    assert!(docs.iter().all(|d| d.source_type() == SourceType::Reddit));

    let post_doc = &docs[0];
    assert!(post_doc.content.starts_with("Title: OPT travel\n\nContent: Travelling"));
    assert!(post_doc.content.ends_with("\n\nScore: 42"));
    assert_eq!(post_doc.metadata.source, "https://reddit.com/r/f1visa/comments/p1/post/");
    assert_eq!(post_doc.metadata.subreddit.as_deref(), Some("f1visa"));
    assert_eq!(post_doc.metadata.title.as_deref(), Some("OPT travel"));
    assert!(post_doc.metadata.created_at.as_deref().unwrap().starts_with("2023-11-14"));

    let comment_doc = &docs[1];
    assert!(comment_doc.content.starts_with("Comment on: OPT travel\n\nContent: Bring"));
    assert_eq!(comment_doc.metadata.parent_title.as_deref(), Some("OPT travel"));
    assert_eq!(comment_doc.metadata.score, Some(7));
}

#[tokio::test]
async fn test_failing_subreddit_is_skipped() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_thread(&server).await;
    Mock::given(method("GET"))
        .and(path("/r/private_sub/search"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let auth_url = format!("{}/api/v1/access_token", server.uri());
    let mut client = ForumClient::new(credentials(), &auth_url, &server.uri()).unwrap();
    let docs = client
        .scrape(
            &["private_sub".to_string(), "f1visa".to_string()],
            &["OPT".to_string()],
        )
        .await;

    assert_eq!(docs.len(), 3);
}

#[tokio::test]
async fn test_auth_failure_yields_no_documents() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let auth_url = format!("{}/api/v1/access_token", server.uri());
    let mut client = ForumClient::new(credentials(), &auth_url, &server.uri()).unwrap();
    assert!(client.search("f1visa", "OPT").await.is_err());
    assert!(client.scrape(&["f1visa".to_string()], &["OPT".to_string()]).await.is_empty());
}
