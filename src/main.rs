pub mod types;
pub mod config;
pub mod error;
pub mod data;
pub mod filter;
pub mod popup;
pub mod markers;
pub mod render;
pub mod page;
pub mod server;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::data::DatasetCache;
use crate::filter::CategorySelection;
use crate::markers::CategoryPalette;
use crate::page::{error_page, render_page, FilterControls};
use crate::render::{render_pass, LeafletMap};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the map page to a standalone HTML file
    Generate {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// Only show these categories (repeatable); all of them by default
        #[arg(long = "category", value_name = "NAME")]
        categories: Vec<String>,
        /// Overrides `output.html_file` from the config
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Serve the interactive map
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { config, categories, output } => {
            info!(config = %config.display(), "Generating map page");
            let app_config = AppConfig::load_or_default(&config)?;
            let output = output.unwrap_or_else(|| app_config.output.html_file.clone());
            generate(&app_config, &categories, &output)?;
        }
        Commands::Serve { config } => {
            info!(config = %config.display(), "Serving map");
            let app_config = AppConfig::load_or_default(&config)?;
            server::start_server(app_config).await?;
        }
    }

    Ok(())
}

fn generate(config: &AppConfig, categories: &[String], output: &Path) -> anyhow::Result<()> {
    let mut cache = DatasetCache::new(config.delimiter_byte()?);

    // A load failure still produces a page, but the command fails
    let dataset = match cache.get(&config.input.data_csv) {
        Ok(dataset) => dataset,
        Err(e) => {
            std::fs::write(output, error_page(&e))
                .with_context(|| format!("Failed to write {:?}", output))?;
            return Err(e.into());
        }
    };

    let known = dataset.distinct_categories();
    let selection = if categories.is_empty() {
        CategorySelection::with_all_enabled(known)
    } else {
        for unknown in categories.iter().filter(|c| !known.contains(*c)) {
            warn!(category = %unknown, "Category not present in dataset");
        }
        CategorySelection::only(&known, categories.iter().filter(|c| known.contains(*c)).cloned())
    };

    let palette = CategoryPalette::from_config(&config.categories);
    let map = LeafletMap::from_config(&config.map);
    let rendered = render_pass(&dataset, &selection, &palette, &map);
    if let Err(e) = &rendered {
        warn!(error = %e, "Map not rendered");
    }

    let page = render_page(&selection, &palette, &map, FilterControls::ReadOnly, &rendered);
    std::fs::write(output, page).with_context(|| format!("Failed to write {:?}", output))?;
    info!(output = %output.display(), "Map page written");

    Ok(())
}
