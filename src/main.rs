use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use planogram_vision::pipeline::analyze_with_config;
use planogram_vision::presentation::{format_price, frame_gallery, product_grid, timeline_markers};
use planogram_vision::product_name::is_unknown;
use planogram_vision::shopping::{split_price_range, ProductCategory, ProductQuery, ProductRecord, ShoppingSearch, SortBy};
use planogram_vision::{Config, MediaKind, VideoProcessor};

#[derive(Parser)]
#[command(name = "planogram-vision")]
#[command(version, about = "Retail shelf video analysis and price comparison")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question about a shelf video or image
    Analyze {
        /// Video (mp4, mov, avi, mkv) or image (jpg, jpeg, png)
        file: PathBuf,
        /// Question about the shelf, e.g. "Where is Tide detergent?"
        #[arg(short, long)]
        question: String,
        /// Analyze every Nth frame
        #[arg(long)]
        frame_interval: Option<u64>,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
        /// Search prices for the detected product
        #[arg(long)]
        prices: bool,
        /// Pack size for the price search, e.g. "1L"
        #[arg(long)]
        quantity: Option<String>,
        /// recommendation, price_low, price_high, rating, reviews or delivery
        #[arg(long, default_value_t = SortBy::Recommendation)]
        sort: SortBy,
        #[arg(long)]
        limit: Option<usize>,
        /// Write the timeline and product grid HTML here
        #[arg(long)]
        html: Option<PathBuf>,
        /// Save the frame at each detected timestamp as a JPEG in this directory
        #[arg(long)]
        frames_dir: Option<PathBuf>,
    },
    /// Search prices for a product
    Prices {
        /// Product name; price bounds like "under ₹500" are understood
        name: String,
        #[arg(long)]
        quantity: Option<String>,
        #[arg(long)]
        min_price: Option<f64>,
        #[arg(long)]
        max_price: Option<f64>,
        #[arg(long, default_value_t = SortBy::Recommendation)]
        sort: SortBy,
        #[arg(long)]
        limit: Option<usize>,
        /// Write the product grid HTML here
        #[arg(long)]
        html: Option<PathBuf>,
        /// Print products as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the effective configuration
    Config {
        /// Write the configuration to this TOML file
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Run the HTTP API
    #[cfg(feature = "api")]
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose { "debug" } else { config.output.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("planogram_vision={},warn", level)));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load()?;
    init_logging(&config, cli.verbose);

    if cli.verbose {
        info!("Verbose logging enabled");
    }

    match cli.command {
        Commands::Analyze {
            file,
            question,
            frame_interval,
            json,
            prices,
            quantity,
            sort,
            limit,
            html,
            frames_dir,
        } => {
            config.validate()?;
            if !file.exists() {
                return Err(anyhow!("File not found: {}", file.display()));
            }

            info!("🚀 Planogram Vision starting...");
            let report = analyze_with_config(&config, &file, &question, frame_interval).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }

            if let Some(error) = &report.error {
                return Err(anyhow!("{}", error));
            }

            if !json {
                println!("{}", report.summary);
                if !report.formatted_timestamps.is_empty() {
                    println!("\nSeen at: {}", report.formatted_timestamps.join(", "));
                }
                println!("Product: {}", report.product_name);
                info!(
                    "🎉 Analyzed {} frames ({} skipped) in {:.2}s",
                    report.frames.len(),
                    report.frames_skipped,
                    report.processing_time.as_secs_f64()
                );
            }

            let mut page = timeline_markers(&report.timestamps_ms, report.duration_ms);

            if let Some(dir) = frames_dir {
                if MediaKind::from_path(&file) != Some(MediaKind::Video) || report.timestamps_ms.is_empty() {
                    info!("No detected timestamps, no frames to save");
                } else {
                    let saved = VideoProcessor::new()
                        .save_frames_at(&file, &report.timestamps_ms, &dir, config.sampling.jpeg_quality)
                        .await?;
                    let gallery: Vec<(u64, String)> = saved
                        .into_iter()
                        .map(|(ts, path)| (ts, path.display().to_string()))
                        .collect();
                    page.push_str(&frame_gallery(&gallery));
                }
            }

            if prices {
                if is_unknown(&report.product_name) {
                    warn!("No product name detected, skipping price search");
                } else {
                    let mut query = ProductQuery::new(report.product_name.clone()).with_sort(sort);
                    query.quantity = quantity;
                    query.limit = limit;
                    let (products, grid) = search_prices(&config, &query).await?;
                    if !json {
                        print_products(&products, &config.shopping.currency_symbol);
                    }
                    page.push_str(&grid);
                }
            }

            if let Some(path) = html {
                write_html(&path, &page).await?;
            }
        }

        Commands::Prices {
            name,
            quantity,
            min_price,
            max_price,
            sort,
            limit,
            html,
            json,
        } => {
            let (product, stated) = split_price_range(&name);
            let stated = stated.unwrap_or_default();

            let mut query = ProductQuery::new(product.clone()).with_sort(sort);
            query.quantity = quantity;
            query.limit = limit;
            query.min_price = min_price.or(stated.min);
            query.max_price = max_price.or(stated.max);

            if query.quantity.is_none() {
                let category = ProductCategory::detect(&product);
                info!("💡 Common sizes: {}", category.suggested_quantities().join(", "));
            }

            let (products, grid) = search_prices(&config, &query).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&products)?);
            } else {
                print_products(&products, &config.shopping.currency_symbol);
            }

            if let Some(path) = html {
                write_html(&path, &grid).await?;
            }
        }

        Commands::Config { save } => {
            println!("{}", config.summary());
            if let Some(path) = save {
                config.save(&path.to_string_lossy())?;
            }
        }

        #[cfg(feature = "api")]
        Commands::Serve { port } => {
            config.validate()?;
            let server = planogram_vision::api::ApiServer::new(std::sync::Arc::new(config), port);
            server.start().await?;
        }
    }

    Ok(())
}

async fn search_prices(config: &Config, query: &ProductQuery) -> Result<(Vec<ProductRecord>, String)> {
    let search = ShoppingSearch::new(config.shopping.clone());
    let products = search.search(query).await?;
    let grid = product_grid(&products, query, &config.shopping.currency_symbol);
    Ok((products, grid))
}

fn print_products(products: &[ProductRecord], currency: &str) {
    if products.is_empty() {
        println!("No products found.");
        return;
    }

    for product in products {
        let price = if product.has_price() {
            format_price(product.price, currency)
        } else {
            product.price_display.clone()
        };
        println!(
            "{:>2}. {} | {} | {} | ★ {:.1} ({}) | {}",
            product.rank, product.title, price, product.platform_name, product.rating, product.reviews, product.link
        );
    }
}

async fn write_html(path: &Path, html: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, html).await?;
    info!("💾 HTML written to: {}", path.display());
    Ok(())
}
