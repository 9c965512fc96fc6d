//! Catalog-Harvest main entry point
//!
//! This is the command-line interface for the Catalog-Harvest image harvester.

use anyhow::Context;
use catalog_harvest::config::{load_config_with_hash, Config};
use catalog_harvest::crawler::{run_harvest, Coordinator};
use catalog_harvest::output::print_summary;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Catalog-Harvest: a rendered catalog image harvester
///
/// Catalog-Harvest renders paginated search pages in a headless browser,
/// follows the product pages they list, and downloads the product images
/// into a folder named after the page range.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A rendered catalog image harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without launching a browser
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(config)
    } else {
        handle_harvest(config).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvest=info,warn"),
            1 => EnvFilter::new("catalog_harvest=debug,info"),
            2 => EnvFilter::new("catalog_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the planned search pages and output folder
fn handle_dry_run(config: Config) -> anyhow::Result<()> {
    println!("=== Catalog-Harvest Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  Image type: {}", config.site.image_mime_type);
    println!("  Headless: {}", config.browser.headless);

    println!("\nStages:");
    println!(
        "  Search: {} workers, {} attempts, >= {} links per page",
        config.search.workers, config.search.max_attempts, config.search.min_links
    );
    println!(
        "  Product: {} workers, {} attempts, >= {} images per page",
        config.product.workers, config.product.max_attempts, config.product.min_images
    );
    println!("  Download: {} workers", config.download.workers);

    let coordinator = Coordinator::new(config).context("failed to prepare harvest")?;
    let search_pages = coordinator.search_page_urls();

    println!("\nSearch pages ({}):", search_pages.len());
    for url in &search_pages {
        println!("  - {}", url);
    }

    println!("\nOutput folder: {}", coordinator.output_dir().display());
    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Harvesting pages {}..{} of {}",
        config.search.page_start,
        config.search.page_end,
        config.site.base_url
    );

    let summary = run_harvest(config).await.context("harvest failed")?;
    print_summary(&summary);

    Ok(())
}
