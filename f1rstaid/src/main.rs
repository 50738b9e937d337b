use commands::command_argument_builder;
use f1rstaid::handlers::{
    handle_ask, handle_crawl, handle_ingest, handle_update, handle_validate, init_tracing, print_banner,
};

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    if !quiet {
        print_banner();
    }
    init_tracing(quiet);

    let succeeded = match chosen_command.subcommand() {
        Some(("crawl", primary_command)) => handle_crawl(primary_command).await,
        Some(("ingest", primary_command)) => handle_ingest(primary_command).await,
        Some(("update", primary_command)) => handle_update(primary_command).await,
        Some(("validate", primary_command)) => handle_validate(primary_command).await,
        Some(("ask", primary_command)) => handle_ask(primary_command).await,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if !succeeded {
        std::process::exit(1);
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
