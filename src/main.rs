mod attachments;
mod config;
mod crawl;
mod extract;
mod fetch;
mod listing;
mod normalize;
mod notify;
mod quality;
mod recency;
mod sitemap;
mod store;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use crate::config::CrawlConfig;
use crate::crawl::{CrawlOutcome, Crawler, PageContext};
use crate::normalize::SourceType;
use crate::store::DocumentStore;

#[derive(Parser)]
#[command(name = "kit_crawler", about = "Campus notice crawler with incremental JSON storage")]
struct Cli {
    /// Path to a JSON config file (built-in sources when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl all configured sources (pages, schedule, menus, boards, sitemap)
    Run,
    /// Crawl a single page URL
    Page {
        url: String,
        /// Treat the page as a board posting
        #[arg(long)]
        board: bool,
        /// Board name recorded on the document
        #[arg(long)]
        name: Option<String>,
    },
    /// Crawl static pages discovered from the configured sitemap
    Sitemap,
    /// Show statistics of the stored index
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let config = CrawlConfig::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Run => {
            let mut crawler = Crawler::new(config)?;
            crawler.run().await?;
            println!("Crawl finished.");
            crawler.stats.print();
            Ok(())
        }
        Commands::Page { url, board, name } => {
            let mut crawler = Crawler::new(config)?;
            let ctx = PageContext {
                source_type: board.then_some(SourceType::Board),
                board_name: name.clone(),
                name,
                ..PageContext::default()
            };
            let outcome = crawler.crawl_page(&url, ctx).await;
            crawler.finish()?;
            match outcome {
                CrawlOutcome::Saved(path) => println!("Saved: {}", path.display()),
                CrawlOutcome::Skipped => println!("Skipped: already crawled."),
                CrawlOutcome::Filtered(reason) => println!("Filtered: {}", reason),
                CrawlOutcome::Failed(reason) => println!("Failed: {}", reason),
            }
            Ok(())
        }
        Commands::Sitemap => {
            let Some(target) = config.sitemap.clone() else {
                println!("No sitemap configured.");
                return Ok(());
            };
            let mut crawler = Crawler::new(config)?;
            crawler.crawl_sitemap(&target).await;
            crawler.finish()?;
            crawler.stats.print();
            Ok(())
        }
        Commands::Stats => {
            let store = DocumentStore::new(&config.output_dir)?;
            let loaded = store.load_index();
            println!("Indexed pages: {}", loaded.pages.len());
            let total_text: usize = loaded.pages.iter().map(|p| p.text_length).sum();
            println!("Total text:    {} chars", total_text);
            if loaded.pages.is_empty() {
                println!("(empty index: run 'kit_crawler run' first)");
            }
            for (key, value) in loaded.meta.entries() {
                println!("  {} = {}", key, value);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
