use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rei_reader::settings::{
    default_settings_path, load_reader_settings, save_reader_settings, ReaderSettings,
};

/// 本地漫画与画廊阅读服务
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file; defaults to `reader_settings.json` in the working directory.
    #[arg(long, env = "REI_READER_CONFIG")]
    config: Option<PathBuf>,

    /// Write the default settings to the settings file and exit.
    #[arg(long)]
    init_config: bool,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    manga_root: Option<PathBuf>,

    #[arg(long)]
    gallery_root: Option<PathBuf>,

    /// Increase verbosity (use multiple times for more).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rei_reader={level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_settings(path: &Path) -> Result<ReaderSettings> {
    match load_reader_settings(path) {
        Ok(settings) => {
            info!(path = %path.display(), "loaded settings");
            Ok(settings)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "settings file not found, using defaults");
            Ok(ReaderSettings::default())
        }
        Err(err) => {
            Err(err).with_context(|| format!("failed to read settings from {}", path.display()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| default_settings_path(Path::new(".")));

    if cli.init_config {
        save_reader_settings(&config_path, &ReaderSettings::default())
            .with_context(|| format!("failed to write {}", config_path.display()))?;
        info!(path = %config_path.display(), "wrote default settings");
        return Ok(());
    }

    let mut settings = load_settings(&config_path)?;
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(root) = cli.manga_root {
        settings.manga.root = root;
    }
    if let Some(root) = cli.gallery_root {
        settings.gallery.root = root;
    }

    rei_reader::serve(settings.normalize()).await?;
    Ok(())
}
