mod build_info;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use clap::Parser;
#[allow(unused_imports)]
use log::{debug, info, warn, error};
use serde::Serialize;
use thiserror::Error;

use node_image_atlas::config::{BorderColor, BorderOptions, BorderRendering, BorderSize, BorderSizeMode};
use node_image_atlas::logging;
use node_image_atlas::{
    AtlasConsumer, AtlasError, AtlasManager, AtlasRect, AtlasSettings, ConfigError, ImageKey,
    NodeImage, SettingsError,
};

use crate::build_info::{BuildInfo, LONG_VERSION};

const APP_NAME: &str = "node-image-atlas";

#[derive(Parser)]
#[command(
    name = "node-image-atlas",
    about = "Pack images into a node texture atlas",
    version,
    long_version = LONG_VERSION
)]
struct Cli {
    /// Image sources: file paths, file:// or http(s):// URLs
    #[arg(required = true)]
    sources: Vec<String>,
    /// Where to write the atlas PNG
    #[arg(short, long, default_value = "atlas.png")]
    output: PathBuf,
    /// Where to write the rectangle table as JSON
    #[arg(long)]
    table: Option<PathBuf>,
    /// Settings file (defaults to the platform config directory)
    #[arg(long)]
    settings: Option<String>,
    /// Write the effective settings back to the settings file
    #[arg(long)]
    save_settings: bool,
    #[arg(long)]
    max_texture_size: Option<u32>,
    #[arg(long)]
    max_canvas_width: Option<u32>,
    /// Bake a border of this CSS color into every image
    #[arg(long)]
    border_color: Option<String>,
    /// Border width, relative to the node radius unless --node-size is given
    #[arg(long, default_value_t = 0.1)]
    border_width: f32,
    /// Node size the border width is expressed for (switches to pixel widths)
    #[arg(long)]
    node_size: Option<f32>,
    /// Export the captured log lines to the log directory before exiting
    #[arg(long)]
    export_logs: bool,
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Atlas(#[from] AtlasError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("failed to write atlas image: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to write table: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize table: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no image could be loaded")]
    NothingPacked,
}

#[derive(Serialize)]
struct TableEntry {
    #[serde(flatten)]
    rect: AtlasRect,
    uv: [f32; 4],
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let log_buffer = match logging::setup_logger(cli.verbose) {
        Ok(buffer) => Some(buffer),
        Err(e) => {
            eprintln!("Failed to set up logging: {e}");
            None
        }
    };
    if let Some(buffer) = &log_buffer {
        logging::setup_panic_hook(APP_NAME, buffer.clone());
    }
    info!("{} {}", APP_NAME, BuildInfo::display_version());

    let result = run(&cli).await;

    if cli.export_logs {
        if let Some(buffer) = &log_buffer {
            match logging::export_debug_logs(APP_NAME, buffer) {
                Ok(path) => println!("Debug logs exported to: {}", path.display()),
                Err(e) => eprintln!("Failed to export debug logs: {e}"),
            }
        }
    }

    if let Err(e) = result {
        error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<(), CliError> {
    let settings = effective_settings(cli);
    if cli.save_settings {
        match &cli.settings {
            Some(path) => settings.save_to(Path::new(path))?,
            None => settings.save()?,
        }
    }

    let manager = AtlasManager::with_source_fetcher(settings.atlas.clone())?;
    let mut consumer = AtlasConsumer::new(manager.clone(), settings.node.clone(), None)?;

    let node_size = cli.node_size.unwrap_or(1.0);
    let nodes: Vec<NodeImage> = cli
        .sources
        .iter()
        .map(|source| NodeImage::new(source.as_str(), node_size))
        .collect();
    for node in &nodes {
        consumer.texture_coords(node);
    }

    manager.wait_idle().await;
    manager.flush_if_scheduled();
    consumer.refresh();

    let stats = manager.stats();
    info!(
        "Packed {} of {} images into {}x{} ({} failed)",
        stats.ready, stats.requested, stats.width, stats.height, stats.failed
    );
    if stats.ready == 0 {
        return Err(CliError::NothingPacked);
    }
    for node in &nodes {
        if let Some(key) = consumer.image_key(node) {
            if !consumer.atlas().contains_key(&key) {
                warn!("Skipped {}: image failed to load", key);
            }
        }
    }

    consumer.texture().save(&cli.output)?;
    println!("Wrote {}x{} atlas to {}", stats.width, stats.height, cli.output.display());

    if let Some(path) = &cli.table {
        let (width, height) = consumer.texture().dimensions();
        let table: BTreeMap<&ImageKey, TableEntry> = consumer
            .atlas()
            .iter()
            .map(|(key, rect)| {
                let entry = TableEntry { rect: *rect, uv: rect.normalized(width, height) };
                (key, entry)
            })
            .collect();
        serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), &table)?;
        println!("Wrote {} rectangles to {}", table.len(), path.display());
    }
    Ok(())
}

fn effective_settings(cli: &Cli) -> AtlasSettings {
    let mut settings = AtlasSettings::load(cli.settings.as_deref());

    if let Some(size) = cli.max_texture_size {
        settings.atlas.max_texture_size = size;
    }
    if let Some(width) = cli.max_canvas_width {
        settings.atlas.max_canvas_width = width;
    }
    // Flushed by hand once every fetch has settled
    settings.atlas.frame_interval_ms = None;

    if let Some(color) = &cli.border_color {
        let mode = if cli.node_size.is_some() {
            BorderSizeMode::Pixels
        } else {
            BorderSizeMode::Relative
        };
        settings.node.border = Some(BorderOptions {
            color: BorderColor::Value(color.clone()),
            size: BorderSize::Value { value: cli.border_width, mode },
            rendering: BorderRendering::Baked,
        });
    }
    debug!("Effective settings: {:?}", settings);
    settings
}
