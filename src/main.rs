use anyhow::Result;
use article_crawler::config::AppConfig;
use article_crawler::pipeline::{Pipeline, RunOptions};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "article-crawler", about = "Paginated article crawler with CSV export", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl the source, write the CSV and download linked files
    Run {
        /// Only crawl and write the CSV
        #[arg(long, env = "SKIP_DOWNLOADS")]
        skip_downloads: bool,
    },

    /// Print the resolved configuration and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "article_crawler=info,warn",
        1 => "article_crawler=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Run { skip_downloads } => {
            let stats = Pipeline::new(config)
                .run(&RunOptions { skip_downloads })
                .await?;
            info!(
                "Done: {} articles -> {:?}, {} files downloaded, {} failed",
                stats.articles, stats.output, stats.downloads.succeeded, stats.downloads.failed
            );
        }

        Command::Check => {
            println!("─────────────────────────────────");
            println!("  Source   : {}", config.source.name);
            println!("  Start    : {}", config.source.start_url);
            println!("  CSV      : {}", config.source.output_csv().display());
            println!("  Files    : {}", config.source.files_dir().display());
            println!("  Pages    : up to {}", config.crawl.max_pages);
            println!("  Parallel : {} detail pages", config.crawl.detail_concurrency);
            println!("─────────────────────────────────");
        }
    }

    Ok(())
}
