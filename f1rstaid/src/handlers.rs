use anyhow::{Context, anyhow};
use clap::ArgMatches;
use colored::Colorize;
use f1rstaid_core::assistant::{Answer, Assistant, CANCELLED_MESSAGE};
use f1rstaid_core::crawl::{CrawlOptions, execute_crawl, generate_crawl_report};
use f1rstaid_core::document::Document;
use f1rstaid_core::format::{clean_markdown, format_answer, format_sources, partition_sources};
use f1rstaid_core::forum::ForumClient;
use f1rstaid_core::ingest::{ForumQuery, IngestReport, build_knowledge_base, update_knowledge_base};
use f1rstaid_core::providers::{openai_chat, openai_embedder};
use f1rstaid_core::sources::{self, CRAWL_SEEDS, SEARCH_TERMS, SUBREDDITS, WEBSITE_SOURCES};
use f1rstaid_core::store::KnowledgeIndex;
use f1rstaid_core::validator::{ValidationReport, validate_index};
use f1rstaid_core::{Secrets, Settings};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use url::Url;

pub const PREVIEW_CHARS: usize = 200;

/// Install the fmt subscriber. `RUST_LOG` wins; otherwise `info`, or
/// `warn` when running quietly.
pub fn init_tracing(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

pub fn print_banner() {
    println!("{}", "F1rstAid".bright_cyan().bold());
    println!("{}", "Your assistant for F-1 visa, OPT and CPT questions".bright_white());
    println!();
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_heading(title: &str) {
    print_divider();
    println!("  {}", title.bright_white().bold());
    print_divider();
    println!();
}

fn print_failure(context: &str, error: &anyhow::Error) {
    eprintln!("{} {}: {:#}", "✗".red().bold(), context, error);
}

/// Expand `~` in a path argument.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

fn path_arg(args: &ArgMatches, id: &str) -> Option<PathBuf> {
    if let Ok(Some(path)) = args.try_get_one::<PathBuf>(id) {
        return Some(expand_path(&path.to_string_lossy()));
    }
    match args.try_get_one::<String>(id) {
        Ok(Some(raw)) => Some(expand_path(raw)),
        _ => None,
    }
}

/// Settings with whatever the subcommand's arguments override.
pub fn settings_from_args(args: &ArgMatches) -> Settings {
    let mut settings = Settings::default();
    if let Some(dir) = path_arg(args, "docs-dir") {
        settings.docs_dir = dir;
    }
    if let Some(dir) = path_arg(args, "index-dir") {
        settings.index_dir = dir;
    }
    if let Ok(Some(model)) = args.try_get_one::<String>("model") {
        settings.chat_model = model.clone();
    }
    if let Ok(Some(k)) = args.try_get_one::<usize>("top-k") {
        settings.search_k = (*k).max(1);
    }
    settings
}

pub fn secrets_from_args(args: &ArgMatches) -> Secrets {
    let secrets = Secrets::load();
    match args.try_get_one::<String>("api-key") {
        Ok(Some(key)) => secrets.with_override("openai", "api_key", key.clone()),
        _ => secrets,
    }
}

/// Load and parse URLs from a file
pub fn load_urls_from_file(path: &Path) -> Result<Vec<String>, String> {
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read URL file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| parse_url_line(line.trim()))
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as a URL, trying to add https:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if let Ok(url) = Url::parse(line)
        && url.host_str().is_some()
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("https://{}", line);
    if let Ok(url) = Url::parse(&with_scheme)
        && url.host_str().is_some_and(|host| host.contains('.'))
    {
        return Some(with_scheme);
    }

    eprintln!("{} Skipping invalid URL '{}'", "⚠".yellow(), line);
    None
}

/// Built-in website sources plus any extra URLs, without duplicates.
pub fn merge_sources(extra: Vec<String>) -> Vec<String> {
    let mut websites = sources::owned(WEBSITE_SOURCES);
    for url in extra {
        if !websites.contains(&url) {
            websites.push(url);
        }
    }
    websites
}

fn forum_client(settings: &Settings, secrets: &Secrets) -> anyhow::Result<Option<ForumClient>> {
    match secrets.forum_credentials() {
        Some(credentials) => Ok(Some(ForumClient::new(
            credentials,
            &settings.reddit_auth_url,
            &settings.reddit_api_url,
        )?)),
        None => Ok(None),
    }
}

fn preview_text(doc: &Document) -> String {
    let raw: String = doc.content.chars().take(PREVIEW_CHARS).collect();
    clean_markdown(raw.replace('\n', " ").trim())
}

fn render_group(out: &mut String, title: &str, docs: &[Document], start: usize) {
    if docs.is_empty() {
        return;
    }
    out.push_str(&format!("\n{}\n", title));
    for (i, doc) in docs.iter().enumerate() {
        out.push_str(&format!(
            "  {}. [{}] {}\n",
            start + i,
            doc.source_type().as_str().to_uppercase(),
            doc.metadata.source
        ));
        out.push_str(&format!("     {}...\n", preview_text(doc)));
    }
}

/// Plain-text rendering of an answer: the (possibly disclaimed) result, then
/// official and community sources listed separately.
pub fn render_answer(answer: &Answer) -> String {
    let mut out = format_answer(clean_markdown(&answer.result).trim(), &answer.sources);
    out.push('\n');
    let (official, community) = partition_sources(&answer.sources);
    render_group(&mut out, "Official Sources", &official, 1);
    render_group(&mut out, "Community Experiences (Reddit)", &community, official.len() + 1);
    out
}

pub fn render_validation_report(report: &ValidationReport) -> String {
    let mut out = String::new();
    out.push_str("=== Knowledge Index Validation Report ===\n");
    out.push_str(&format!("Index path: {}\n", report.index_path));
    for outcome in &report.outcomes {
        out.push_str(&format!("\n📍 Query: {}\n", outcome.query));
        match outcome.failure {
            Some(ref failure) => out.push_str(&format!("❌ Validation failed: {}\n", failure)),
            None => {
                out.push_str("✅ Results:\n");
                for (i, result) in outcome.results.iter().enumerate() {
                    out.push_str(&format!(
                        "  Result {}: {} characters from {}\n    Preview: {}...\n",
                        i + 1,
                        result.length,
                        result.source,
                        result.preview
                    ));
                }
            }
        }
    }
    out
}

pub async fn handle_crawl(args: &ArgMatches) -> bool {
    let seeds: Vec<String> = match args.get_many::<Url>("seed") {
        Some(urls) => urls.map(|url| url.as_str().to_string()).collect(),
        None => sources::owned(CRAWL_SEEDS),
    };
    let settings = Settings::default();
    let mut options = CrawlOptions::from_settings(&settings, seeds);
    options.resume = !args.get_flag("fresh");
    if let Some(path) = path_arg(args, "state-file") {
        options.checkpoint_file = path;
    }
    if let Some(path) = path_arg(args, "robots-file") {
        options.robots_mapping_file = path;
    }
    if let Some(path) = path_arg(args, "output") {
        options.relevant_urls_file = path;
    }
    options.show_progress_bars = true;

    println!("\n🕷️  Crawling {} seed(s)", options.seeds.len());
    for seed in &options.seeds {
        println!("  {} {}", "→".blue(), seed.bright_white());
    }
    println!(
        "Checkpoint: {} ({})\n",
        options.checkpoint_file.display(),
        if options.resume { "resume" } else { "fresh" }
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    options.shutdown = Some(shutdown.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, saving crawl state...");
            shutdown.store(true, Ordering::SeqCst);
        }
    });

    let output = options.relevant_urls_file.clone();
    match execute_crawl(options).await {
        Ok(outcome) => {
            print!("\n{}", generate_crawl_report(&outcome.summaries));
            if outcome.interrupted() {
                println!(
                    "{} Crawl interrupted; progress saved. Run again to resume.",
                    "⚠".yellow().bold()
                );
            } else {
                println!("{} Crawl complete!", "✓".green().bold());
            }
            println!(
                "{} {} relevant URLs written to {}",
                "✓".green().bold(),
                outcome.relevant_urls.len().to_string().cyan(),
                output.display().to_string().bright_white()
            );
            true
        }
        Err(e) => {
            print_failure("Crawl failed", &anyhow!(e));
            false
        }
    }
}

async fn run_ingest(args: &ArgMatches, settings: &Settings, secrets: &Secrets) -> anyhow::Result<IngestReport> {
    let api_key = secrets.openai_api_key()?;
    let embedder = openai_embedder(settings, &api_key)?;

    let extra = match path_arg(args, "urls-file") {
        Some(path) => load_urls_from_file(&path).map_err(anyhow::Error::msg)?,
        None => Vec::new(),
    };
    let websites = merge_sources(extra);

    let mut forum = if args.get_flag("no-reddit") {
        None
    } else {
        forum_client(settings, secrets)?
    };
    let subreddits = sources::owned(SUBREDDITS);
    let terms = sources::owned(SEARCH_TERMS);
    let query = forum.as_mut().map(|client| ForumQuery {
        client,
        subreddits: &subreddits,
        terms: &terms,
    });

    build_knowledge_base(settings, &websites, query, embedder)
        .await
        .context("Knowledge base build failed")
}

pub async fn handle_ingest(args: &ArgMatches) -> bool {
    print_heading("F1RSTAID INGESTION");
    let settings = settings_from_args(args);
    let secrets = secrets_from_args(args);

    match run_ingest(args, &settings, &secrets).await {
        Ok(report) => {
            println!();
            println!("{} Knowledge base created successfully", "✓".green().bold());
            println!("  {} documents loaded", report.documents.to_string().cyan());
            println!("  {} chunks indexed", report.chunks.to_string().cyan());
            println!(
                "  {} {}",
                "Index:".bright_white(),
                settings.index_dir.display().to_string().bright_white()
            );
            true
        }
        Err(e) => {
            print_failure("Ingestion failed", &e);
            false
        }
    }
}

async fn run_update(settings: &Settings, secrets: &Secrets) -> anyhow::Result<bool> {
    let api_key = secrets.openai_api_key()?;
    let embedder = openai_embedder(settings, &api_key)?;
    let mut client = forum_client(settings, secrets)?
        .ok_or_else(|| anyhow!("Reddit credentials not found (REDDIT_CLIENT_ID / REDDIT_CLIENT_SECRET)"))?;
    let subreddits = sources::owned(SUBREDDITS);
    let terms = sources::owned(SEARCH_TERMS);
    let query = ForumQuery {
        client: &mut client,
        subreddits: &subreddits,
        terms: &terms,
    };
    Ok(update_knowledge_base(settings, query, embedder).await)
}

pub async fn handle_update(args: &ArgMatches) -> bool {
    let started = local_timestamp();
    println!("\n🔄 Starting knowledge base update at {}", started);
    let settings = settings_from_args(args);
    let secrets = secrets_from_args(args);

    match run_update(&settings, &secrets).await {
        Ok(true) => {
            println!("\n{} Knowledge base update complete!", "✓".green().bold());
            println!("Last updated: {}", local_timestamp());
            true
        }
        Ok(false) => {
            println!("\n{} Knowledge base update failed.", "✗".red().bold());
            println!("Check the log output above for details.");
            false
        }
        Err(e) => {
            print_failure("Knowledge base update failed", &e);
            false
        }
    }
}

fn local_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

pub async fn handle_validate(args: &ArgMatches) -> bool {
    println!("\n🔍 Starting knowledge index validation...");
    let settings = settings_from_args(args);
    let secrets = secrets_from_args(args);

    let result = async {
        let api_key = secrets.openai_api_key()?;
        let embedder = openai_embedder(&settings, &api_key)?;
        validate_index(&settings.index_dir, embedder)
            .await
            .context("Knowledge index validation failed")
    }
    .await;

    match result {
        Ok(report) => {
            if args.get_flag("json") {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => warn!("Could not serialize report: {}", e),
                }
            } else {
                print!("{}", render_validation_report(&report));
            }
            if report.passed() {
                println!("\n{} Knowledge index validation PASSED!", "✓".green().bold());
                println!("All queries returned valid, unique results.");
                true
            } else {
                println!("\n{} Knowledge index validation FAILED!", "✗".red().bold());
                println!("{} of {} queries failed.", report.failures().count(), report.outcomes.len());
                false
            }
        }
        Err(e) => {
            print_failure("Validation failed", &e);
            false
        }
    }
}

pub async fn handle_ask(args: &ArgMatches) -> bool {
    let question = args
        .get_many::<String>("QUESTION")
        .map(|words| words.cloned().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();
    let settings = settings_from_args(args);
    let secrets = secrets_from_args(args);

    let assistant = async {
        let api_key = secrets.openai_api_key()?;
        let embedder = openai_embedder(&settings, &api_key)?;
        let chat = openai_chat(&settings, &api_key)?;
        let index = KnowledgeIndex::open(&settings.index_dir, embedder)
            .context("Knowledge index not available; run `f1rstaid ingest` first")?;
        anyhow::Ok(
            Assistant::new(chat, Arc::new(index))
                .with_search_k(settings.search_k)
                .with_temperatures(settings.temperature, settings.relevance_temperature),
        )
    }
    .await;

    let assistant = match assistant {
        Ok(assistant) => assistant,
        Err(e) => {
            print_failure("Could not start the assistant", &e);
            return false;
        }
    };

    let answer = tokio::select! {
        answer = assistant.get_answer(&question) => answer,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, abandoning the request");
            Answer::message(CANCELLED_MESSAGE)
        }
    };
    if args.get_flag("html") {
        println!("{}", format_answer(clean_markdown(&answer.result).trim(), &answer.sources));
        if !answer.sources.is_empty() {
            println!("\n{}", format_sources(&answer.sources, &settings.docs_dir));
        }
    } else {
        print!("{}", render_answer(&answer));
    }
    true
}
