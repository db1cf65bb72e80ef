//! Quire CLI - collaborative note editing from the terminal

mod cli;
mod commands;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::resolve_db_path;
use crate::commands::config::run_config;
use crate::commands::create::run_create;
use crate::commands::edit::run_edit;
use crate::commands::list::run_list;
use crate::commands::show::run_show;
use crate::commands::simulate::run_simulate;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let user = cli.user.as_deref();

    match cli.command {
        Commands::Create {
            title,
            content,
            tags,
        } => run_create(&title, &content, &tags, user, &db_path).await,
        Commands::List { limit, json } => run_list(limit, json, &db_path).await,
        Commands::Show { id, json } => run_show(&id, json, &db_path).await,
        Commands::Edit { id, title, content } => {
            run_edit(&id, title.as_deref(), &content, user, &db_path).await
        }
        Commands::Simulate { scenario, json } => run_simulate(scenario, json).await,
        Commands::Config { json } => run_config(json, user, &db_path),
    }
}

fn init_tracing() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "quire=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
