use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;
use url::Url;

fn api_key_arg() -> clap::Arg {
    arg!(--"api-key" <KEY>)
        .required(false)
        .help("OpenAI API key (default: OPENAI_API_KEY from the environment or .env)")
}

fn index_dir_arg() -> clap::Arg {
    arg!(-i --"index-dir" <PATH>)
        .required(false)
        .help("Directory holding the knowledge index")
        .default_value("knowledge_index")
}

fn docs_dir_arg() -> clap::Arg {
    arg!(-d --"docs-dir" <PATH>)
        .required(false)
        .help("Directory of PDF documents")
        .default_value("docs")
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("f1rstaid")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("f1rstaid")
        .about("Retrieval-augmented assistant for F-1 visa, OPT and CPT questions")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(true)
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl university international-office sites for OPT/CPT pages, honoring \
                robots.txt. Resumable; Ctrl-C saves progress.",
                )
                .arg(
                    arg!(-s --"seed" <URL>)
                        .required(false)
                        .help("Seed URL to crawl (repeatable; default: built-in university seeds)")
                        .value_parser(clap::value_parser!(Url))
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(--"fresh")
                        .required(false)
                        .help("Ignore any saved checkpoint and start from the seeds")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"state-file" <PATH>)
                        .required(false)
                        .help("Checkpoint file")
                        .value_parser(clap::value_parser!(PathBuf))
                        .default_value("crawler_state.json"),
                )
                .arg(
                    arg!(--"robots-file" <PATH>)
                        .required(false)
                        .help("Where to save the robots.txt mapping")
                        .value_parser(clap::value_parser!(PathBuf))
                        .default_value("websites_robots.json"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Relevant URL list, one per line")
                        .value_parser(clap::value_parser!(PathBuf))
                        .default_value("relevant_urls.txt"),
                ),
        )
        .subcommand(
            command!("ingest")
                .about("Load PDFs, websites and Reddit posts and build a fresh knowledge index")
                .arg(docs_dir_arg())
                .arg(index_dir_arg())
                .arg(
                    arg!(-u --"urls-file" <PATH>)
                        .required(false)
                        .help("Newline-delimited URLs to load in addition to the built-in sources")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"no-reddit")
                        .required(false)
                        .help("Skip Reddit even when credentials are configured")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(api_key_arg()),
        )
        .subcommand(
            command!("update")
                .about("Scrape Reddit again and append new chunks to the existing index")
                .arg(index_dir_arg())
                .arg(api_key_arg()),
        )
        .subcommand(
            command!("validate")
                .about("Run the fixed query battery against the knowledge index")
                .arg(index_dir_arg())
                .arg(
                    arg!(--"json")
                        .required(false)
                        .help("Print the report as JSON")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(api_key_arg()),
        )
        .subcommand(
            command!("ask")
                .about("Ask a question about F-1 visas, OPT or CPT")
                .arg(arg!(<QUESTION>).help("The question to ask").num_args(1..))
                .arg(index_dir_arg())
                .arg(docs_dir_arg())
                .arg(
                    arg!(-k --"top-k" <NUM>)
                        .required(false)
                        .help("Number of chunks to retrieve")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("5"),
                )
                .arg(
                    arg!(-m --"model" <MODEL>)
                        .required(false)
                        .help("Chat model name")
                        .default_value("gpt-3.5-turbo"),
                )
                .arg(
                    arg!(--"html")
                        .required(false)
                        .help("Print sources as HTML blocks instead of plain text")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(api_key_arg()),
        )
}
