//! Sticker background removal CLI
//!
//! Removes the background of a single image, optionally keeping the region
//! under a seed point, and writes the cutout as PNG.

use crate::{
    cache::{format_size, ModelCache},
    compositor::output_file_name,
    config::{BackendKind, ExecutionProvider, RemovalConfig},
    loader::{ImageLoader, ImageSource},
    models::ModelSource,
    processor::{BackgroundRemover, SeedRequest},
    region::SeedPoint,
    seed::{DisplayPoint, DisplaySize, OverlaySurface},
    services::TracingProgressReporter,
    tracing_config::init_cli_tracing,
    types::CutoutResult,
};
use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Sticker background removal tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "sticker-bgremove")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image path or http(s) URL (use "-" for stdin)
    #[arg(
        value_name = "INPUT",
        required_unless_present_any = &["show_backends", "list_models", "clear_cache", "show_cache_dir"]
    )]
    pub input: Option<String>,

    /// Output PNG file [default: <stem>-nobg.png next to the input]. Use "-" for stdout.
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Seed point "X,Y" on the subject to keep; working pixels unless --display is given
    #[arg(short, long, value_name = "X,Y", value_parser = parse_point)]
    pub seed: Option<(f64, f64)>,

    /// Displayed image size "WxH" the seed was picked on
    #[arg(long, value_name = "WxH", value_parser = parse_size, requires = "seed")]
    pub display: Option<(f64, f64)>,

    /// Saliency threshold (1-255)
    #[arg(short, long)]
    pub threshold: Option<u8>,

    /// Feather radius in working pixels (0 disables feathering)
    #[arg(short, long)]
    pub feather: Option<u32>,

    /// Longest side of the working image
    #[arg(long)]
    pub max_side: Option<u32>,

    /// Inference backend (tract, onnx, mock)
    #[arg(short, long)]
    pub backend: Option<BackendKind>,

    /// Execution provider for the onnx backend (auto, cpu, cuda, coreml)
    #[arg(short, long)]
    pub execution_provider: Option<ExecutionProvider>,

    /// Number of intra-op threads (0 = let the runtime decide)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Model file path or URL
    #[arg(short, long)]
    pub model: Option<String>,

    /// JSON configuration file; flags override its values
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Also write the selected binary mask as a grayscale PNG
    #[arg(long, value_name = "PATH")]
    pub save_mask: Option<PathBuf>,

    /// Render the seed marker overlay for the display size to this PNG
    #[arg(long, value_name = "PATH", requires = "display")]
    pub overlay: Option<PathBuf>,

    /// Device pixel ratio used for --overlay
    #[arg(long, default_value_t = 1.0)]
    pub pixel_ratio: f64,

    /// Print processing metadata as JSON to stderr
    #[arg(long)]
    pub metadata: bool,

    /// List backends compiled into this build and exit
    #[arg(long)]
    pub show_backends: bool,

    /// List downloaded models and exit
    #[arg(long)]
    pub list_models: bool,

    /// Delete downloaded models and exit
    #[arg(long)]
    pub clear_cache: bool,

    /// Show the model cache directory and exit
    #[arg(long)]
    pub show_cache_dir: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn parse_pair(value: &str, separator: char) -> std::result::Result<(f64, f64), String> {
    let (a, b) = value
        .split_once(separator)
        .ok_or_else(|| format!("expected two numbers separated by '{separator}'"))?;
    let a: f64 = a.trim().parse().map_err(|e| format!("'{a}': {e}"))?;
    let b: f64 = b.trim().parse().map_err(|e| format!("'{b}': {e}"))?;
    if !a.is_finite() || !b.is_finite() {
        return Err("values must be finite".to_string());
    }
    Ok((a, b))
}

fn parse_point(value: &str) -> std::result::Result<(f64, f64), String> {
    parse_pair(value, ',')
}

fn parse_size(value: &str) -> std::result::Result<(f64, f64), String> {
    let (w, h) = parse_pair(&value.to_ascii_lowercase(), 'x')?;
    if w <= 0.0 || h <= 0.0 {
        return Err("display size must be positive".to_string());
    }
    Ok((w, h))
}

/// Main CLI entry point
///
/// # Errors
/// - Invalid arguments or configuration
/// - Background removal failure
/// - Output cannot be written
pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_cli_tracing(cli.verbose).context("Failed to initialize tracing")?;
    debug!(?cli, "Parsed arguments");

    if cli.show_backends {
        show_backends();
        return Ok(());
    }
    if cli.list_models || cli.clear_cache || cli.show_cache_dir {
        return manage_cache(&cli);
    }

    let config = build_config(&cli)?;
    let seed = seed_request(&cli);
    if let (Some(path), Some(display)) = (&cli.overlay, seed_display(&cli)) {
        write_overlay(path, display, seed_point(&cli), cli.pixel_ratio)?;
    }

    let input = cli.input.as_deref().context("No input given")?;

    let remover = BackgroundRemover::new(config)
        .context("Failed to create background remover")?
        .with_progress_reporter(Arc::new(TracingProgressReporter::new(cli.verbose > 0)));

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .context("Invalid progress template")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Removing background from {input}"));

    let outcome = run_removal(&remover, input, seed).await;
    spinner.finish_and_clear();

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{}", e.user_message());
            std::process::exit(1);
        },
    };

    write_outputs(&cli, input, &result)?;
    Ok(())
}

async fn run_removal(
    remover: &BackgroundRemover,
    input: &str,
    seed: Option<SeedRequest>,
) -> crate::error::Result<CutoutResult> {
    if input == "-" {
        let image = ImageLoader::load_from_reader(tokio::io::stdin()).await?;
        remover.process_image(&image, seed).await
    } else {
        remover
            .remove_background(&ImageSource::parse(input), seed)
            .await
    }
}

fn build_config(cli: &Cli) -> Result<RemovalConfig> {
    let mut config = match &cli.config {
        Some(path) => RemovalConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RemovalConfig::default(),
    };

    if let Some(threshold) = cli.threshold {
        config.threshold = threshold;
    }
    if let Some(feather) = cli.feather {
        config.feather_radius = feather;
    }
    if let Some(max_side) = cli.max_side {
        config.max_side = max_side;
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(provider) = cli.execution_provider {
        config.execution_provider = provider;
    }
    if let Some(threads) = cli.threads {
        config.intra_threads = threads;
    }
    if let Some(model) = &cli.model {
        config.model = ModelSource::parse(model);
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn seed_display(cli: &Cli) -> Option<DisplaySize> {
    cli.display.map(|(w, h)| DisplaySize::new(w, h))
}

fn seed_point(cli: &Cli) -> Option<DisplayPoint> {
    cli.seed.map(|(x, y)| DisplayPoint::new(x, y))
}

fn seed_request(cli: &Cli) -> Option<SeedRequest> {
    let point = seed_point(cli)?;
    Some(match seed_display(cli) {
        Some(display) => SeedRequest::Display { point, display },
        None => SeedRequest::Working(SeedPoint::new(point.x.round() as i64, point.y.round() as i64)),
    })
}

fn write_overlay(
    path: &Path,
    display: DisplaySize,
    marker: Option<DisplayPoint>,
    pixel_ratio: f64,
) -> Result<()> {
    let surface = OverlaySurface::new(display, pixel_ratio);
    surface
        .render(marker)
        .save(path)
        .with_context(|| format!("Failed to write overlay to {}", path.display()))?;
    info!(path = %path.display(), "Wrote seed overlay");
    Ok(())
}

fn default_output_path(input: &str) -> PathBuf {
    if input == "-" {
        return PathBuf::from(output_file_name(None));
    }
    let input_path = Path::new(input);
    let name = output_file_name(input_path.file_name().and_then(|n| n.to_str()));
    if input.starts_with("http://") || input.starts_with("https://") {
        return PathBuf::from(name);
    }
    input_path.with_file_name(name)
}

fn write_outputs(cli: &Cli, input: &str, result: &CutoutResult) -> Result<()> {
    match cli.output.as_deref() {
        Some("-") => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&result.png)
                .and_then(|()| stdout.flush())
                .context("Failed to write PNG to stdout")?;
        },
        output => {
            let path = output.map_or_else(|| default_output_path(input), PathBuf::from);
            result
                .save_png(&path)
                .with_context(|| format!("Failed to save {}", path.display()))?;
            let (width, height) = result.dimensions();
            info!(
                path = %path.display(),
                width,
                height,
                total_ms = result.metadata.timings.total_ms,
                "💾 Saved cutout"
            );
        },
    }

    if let Some(path) = &cli.save_mask {
        result
            .save_mask(path)
            .with_context(|| format!("Failed to save mask to {}", path.display()))?;
    }

    if result.metadata.seed.is_some() && !result.metadata.seed_used {
        warn!("Seed was not on the subject; kept the largest region instead");
    }

    if cli.metadata {
        let json = result
            .metadata
            .to_json()
            .context("Failed to serialize metadata")?;
        eprintln!("{json}");
    }
    Ok(())
}

fn show_backends() {
    use crate::processor::{BackendFactory, DefaultBackendFactory};

    println!("Available backends:");
    for backend in DefaultBackendFactory.available_backends() {
        println!("  {backend}");
    }
}

fn manage_cache(cli: &Cli) -> Result<()> {
    let cache = ModelCache::new().context("Failed to open model cache")?;

    if cli.show_cache_dir {
        println!("{}", cache.cache_dir().display());
    }
    if cli.list_models {
        let models = cache
            .list_cached_models()
            .context("Failed to list cached models")?;
        if models.is_empty() {
            println!("No cached models in {}", cache.cache_dir().display());
        }
        for model in models {
            println!("  {}  {}", model.model_id, format_size(model.size_bytes));
        }
    }
    if cli.clear_cache {
        let removed = cache.clear_cache().context("Failed to clear model cache")?;
        println!("Removed {removed} cached model(s)");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point_and_size() {
        assert_eq!(parse_point("12,34.5").unwrap(), (12.0, 34.5));
        assert_eq!(parse_size("400x300").unwrap(), (400.0, 300.0));
        assert_eq!(parse_size("400X300").unwrap(), (400.0, 300.0));
        assert!(parse_point("12").is_err());
        assert!(parse_size("0x300").is_err());
        assert!(parse_point("a,b").is_err());
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path("photos/cat.jpg"),
            PathBuf::from("photos/cat-nobg.png")
        );
        assert_eq!(
            default_output_path("https://example.com/dog.webp"),
            PathBuf::from("dog-nobg.png")
        );
        assert_eq!(default_output_path("-"), PathBuf::from("image-nobg.png"));
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "sticker-bgremove",
            "in.png",
            "--threshold",
            "100",
            "--feather",
            "0",
            "--backend",
            "mock",
            "--seed",
            "10,20",
            "--display",
            "200x100",
        ]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.threshold, 100);
        assert_eq!(config.feather_radius, 0);
        assert_eq!(config.backend, BackendKind::Mock);
        assert!(matches!(
            seed_request(&cli),
            Some(SeedRequest::Display { .. })
        ));
    }
}
