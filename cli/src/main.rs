//! NucLex CLI Entry Point
//!
//! Loads the corpus, builds the index and answers queries:
//! - `search <query>`: one query, then exit
//! - `interactive`: one query per stdin line against a single loaded corpus
//! - `stats`: corpus and index counts

use clap::Parser;
use nuclex_cli::output::{render_results, render_stats};
use nuclex_cli::{Args, CliError, CliResult, Command};
use nuclex_retrieval::SearchEngine;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nuclex=info,nuclex_retrieval=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(args).await {
        tracing::error!("{}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(args: Args) -> CliResult<()> {
    let config = args.retrieval_config()?;
    let k = args.command.k().unwrap_or(config.default_k);
    let provider = nuclex_cli::provider(args.local)?;

    tracing::info!("Data directory: {:?}", config.data_dir);
    let engine = SearchEngine::open(config, provider).await?;

    match &args.command {
        Command::Search { query, .. } => {
            let query = query.join(" ");
            if query.trim().is_empty() {
                return Err(CliError::EmptyQuery);
            }
            let results = engine.try_search(&query, k).await?;
            println!("{}", render_results(&query, &results, args.json)?);
        }
        Command::Interactive { .. } => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                let query = line.trim();
                if query.is_empty() {
                    continue;
                }
                let results = engine.search(query, k).await;
                println!("{}", render_results(query, &results, args.json)?);
            }
        }
        Command::Stats => {
            println!("{}", render_stats(&engine.stats(), args.json)?);
        }
    }
    Ok(())
}
