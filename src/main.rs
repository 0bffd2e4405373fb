//! Papierek: clock and weather on a 400x300 red/black/white e-ink panel.
//!
//! - Shows the time, the sunrise/sunset phrases and the current weather
//! - Optionally draws over a photo reduced to the panel's three colours
//! - Serves a small upload page for changing that photo
//! - Stops cleanly on SIGTERM so systemd restarts stay quick

mod canvas;
mod config;
mod display;
mod image_proc;
mod panel;
mod scheduler;
mod solar;
mod weather;
mod web;

use anyhow::Context;
use canvas::Palette;
use clap::Parser;
use config::Config;
use display::DisplayController;
use panel::Panel;
use scheduler::Scheduler;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use weather::{FixedLocation, GeolocationDb, GeolocationSource, OpenWeatherMap};

#[derive(Parser, Debug)]
#[command(name = "papierek")]
#[command(about = "Clock and weather panel for the Inky wHAT")]
#[command(version)]
struct Args {
    /// JSON config file
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Background photo (overrides config)
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// OpenWeatherMap API key (overrides config)
    #[arg(short = 'a', long = "apikey")]
    api_key: Option<String>,

    /// Draw one frame and exit
    #[arg(short = '1', long)]
    oneshot: bool,

    /// Upload page port (overrides config)
    #[arg(long = "http-port")]
    http_port: Option<u16>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Only run a photo through the preparation pipeline and exit
    #[arg(long, value_name = "IN")]
    prepare: Option<PathBuf>,

    /// Where --prepare writes its PNG (default: <IN>_prepared.png)
    #[arg(long, value_name = "OUT", requires = "prepare")]
    output: Option<PathBuf>,
}

/// One core on the Pi Zero W, so one thread
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(args.verbose);

    let mut config = Config::load_or_default(&args.config);

    if let Some(input) = &args.prepare {
        return prepare_only(&config, input, args.output.as_deref());
    }

    tracing::info!("Starting papierek {}", env!("CARGO_PKG_VERSION"));

    // Command line wins over the config file
    if let Some(key) = args.api_key {
        config.api_key = key;
    }
    if let Some(image) = args.image {
        config.background_image = Some(image);
    }
    if let Some(port) = args.http_port {
        config.web_port = port;
    }
    config.validate()?;
    if !config.has_api_key() {
        anyhow::bail!(
            "No OpenWeatherMap API key: pass --apikey or set api_key in {}",
            args.config.display()
        );
    }

    let weather = OpenWeatherMap::new(config.api_key.clone(), config.language.clone());
    let location: Box<dyn GeolocationSource> = match config.coordinates() {
        Some(coords) => {
            tracing::info!("Using configured position {}", coords);
            Box::new(FixedLocation(coords))
        }
        None => Box::new(GeolocationDb::new()),
    };
    let display = DisplayController::new(display::detect_sink(config.border, &config.preview_path));

    let mut panel = Panel::new(Box::new(weather), location, display);

    if let Some(path) = config.background_image.clone() {
        load_background(&mut panel, &config, path).await?;
    }

    if args.oneshot {
        let outcome = scheduler::run_once(&mut panel).await?;
        tracing::info!("One-shot frame done: {:?}", outcome);
        return Ok(());
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let (scheduler, commands) = Scheduler::new(panel, config.display_every_min);
    let mut scheduler_handle = tokio::spawn(scheduler.run(shutdown_tx.subscribe()));

    let web_handle = if config.web_enabled {
        let port = config.web_port;
        let web_server = web::WebServer::new(
            Arc::new(RwLock::new(config)),
            args.config.clone(),
            commands,
        );
        let web_shutdown = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = web_server.run_with_shutdown(port, web_shutdown).await {
                tracing::error!("Upload page unavailable: {}", e);
            }
        }))
    } else {
        None
    };

    let outcome = tokio::select! {
        _ = wait_for_shutdown() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(5), &mut scheduler_handle).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!("Refresh loop did not stop in time");
                    Ok(Ok(()))
                }
            }
        }
        result = &mut scheduler_handle => {
            let _ = shutdown_tx.send(());
            result
        }
    };

    if let Some(handle) = web_handle {
        if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
            tracing::warn!("Upload server did not stop in time");
        }
    }

    outcome?.context("Refresh cycle failed")?;
    tracing::info!("Stopped");
    Ok(())
}

/// Prepare the startup background; a photo that cannot be used leaves the
/// solid fill in place
async fn load_background(panel: &mut Panel, config: &Config, path: PathBuf) -> anyhow::Result<()> {
    let options = config.prepare_options();
    let source = path.clone();
    let prepared = tokio::task::spawn_blocking(move || {
        image_proc::load_image(&source).and_then(|img| image_proc::prepare_background(&img, &options))
    })
    .await?;

    match prepared {
        Ok(background) => panel.set_background(background)?,
        Err(e) => tracing::error!("Background {} rejected: {}", path.display(), e),
    }
    Ok(())
}

/// `--prepare`: write the three-colour version of a photo as PNG
fn prepare_only(config: &Config, input: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let output = output.map(Path::to_path_buf).unwrap_or_else(|| {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo".to_string());
        input.with_file_name(format!("{stem}_prepared.png"))
    });

    let photo = image_proc::load_image(input)
        .with_context(|| format!("Cannot read {}", input.display()))?;
    let prepared = image_proc::prepare_background(&photo, &config.prepare_options())
        .with_context(|| format!("Cannot prepare {}", input.display()))?;

    prepared
        .image
        .to_rgb(&Palette::PANEL)
        .save_with_format(&output, image::ImageFormat::Png)
        .with_context(|| format!("Cannot write {}", output.display()))?;

    println!(
        "{} -> {} (brightness {:.1} -> {:.1}, {:?} theme)",
        input.display(),
        output.display(),
        prepared.input_brightness,
        prepared.achieved_brightness,
        prepared.theme
    );
    Ok(())
}

/// Logs go to the journal; `warn` keeps SD card writes down unless
/// `--verbose` or `RUST_LOG` asks for more
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "papierek=debug" } else { "papierek=warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Resolves on SIGTERM (systemd stop) or SIGINT
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).expect("SIGTERM handler");
    let mut int = signal(SignalKind::interrupt()).expect("SIGINT handler");

    let name = tokio::select! {
        _ = term.recv() => "SIGTERM",
        _ = int.recv() => "SIGINT",
    };
    tracing::info!("{} received, stopping", name);
}
