use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use studio_refs::collage::{CollageBuilder, ReferenceItem};
use studio_refs::config::{self, PipelineConfig};
use studio_refs::detect::select_detector;
use studio_refs::imaging::{ImageBackend, RustBackend};
use studio_refs::output;
use studio_refs::sanitize::FaceSanitizer;
use studio_refs::storage::{StorageConfig, normalize_upload_path};

#[derive(Parser)]
#[command(name = "studio-refs")]
#[command(about = "Prepare reference images for image generation")]
#[command(long_about = "\
Prepare reference images for image generation

Two pipelines turn uploaded photos into derived images next to them in
<data-dir>/uploads/:

  identity-collage-v2-<hash>.jpg   Labeled grid of identity references
  <name>.scene-noface.jpg          Scene image with every face blurred

Paths are given in the public form (/uploads/<file>) or the storage form
(uploads/<file>). Anything else is passed through untouched.

Derived images are reused while they are newer than their sources.

Run 'studio-refs gen-config' to generate a documented studio-refs.toml.")]
#[command(version)]
struct Cli {
    /// Data root holding the uploads/ directory [default: ./data]
    #[arg(long, env = "DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Blur faces in scene images and print the path to use for each
    Sanitize {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Pre-build the sanitized copy of a scene image; never fails
    Warm { path: String },
    /// Build an identity collage from INDEX[:ROLE]=PATH references
    Collage {
        #[arg(required = true)]
        items: Vec<ReferenceItem>,
    },
    /// Run the configured face detector on one image
    Detect { path: String },
    /// Print a stock studio-refs.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let backend: Arc<dyn ImageBackend> = Arc::new(RustBackend::new());

    match cli.command {
        Command::Sanitize { paths } => {
            let (pipeline_config, storage) = load_context(cli.config.as_deref(), cli.data_dir.as_deref())?;
            let sanitizer = build_sanitizer(&pipeline_config, storage, backend);
            for raw in &paths {
                let lines = match sanitizer.sanitize_with_outcome(raw).await {
                    Ok(outcome) => output::format_sanitize_outcome(raw, &outcome),
                    Err(e) => {
                        tracing::warn!(path = %raw, "sanitizing failed, using original: {e}");
                        output::format_sanitize_failure(raw, &e)
                    }
                };
                output::print_lines(&lines);
            }
        }
        Command::Warm { path } => {
            let (pipeline_config, storage) = load_context(cli.config.as_deref(), cli.data_dir.as_deref())?;
            let sanitizer = build_sanitizer(&pipeline_config, storage, backend);
            sanitizer.warm(Some(&path)).await;
        }
        Command::Collage { items } => {
            let (pipeline_config, storage) = load_context(cli.config.as_deref(), cli.data_dir.as_deref())?;
            let builder = CollageBuilder::new(storage, pipeline_config.collage.clone(), backend);
            let outcome = builder.build(&items).await?;
            output::print_collage_output(&items, outcome.as_ref());
        }
        Command::Detect { path } => {
            let (pipeline_config, storage) = load_context(cli.config.as_deref(), cli.data_dir.as_deref())?;
            // Upload paths resolve under the data root; anything else is a
            // filesystem path.
            let image = match normalize_upload_path(&path) {
                Some(upload) => storage.resolve(&upload),
                None => PathBuf::from(&path),
            };
            let image = std::path::absolute(&image)?;
            let detector = select_detector(&pipeline_config.detector);
            let detection = detector.detect(&image).await;
            output::print_detection(&image, detection.as_ref());
        }
        Command::GenConfig => print!("{}", config::stock_config_toml()),
    }

    Ok(())
}

/// Load configuration, apply the data-dir override, and size the rayon pool.
fn load_context(
    config_path: Option<&Path>,
    data_dir: Option<&Path>,
) -> Result<(PipelineConfig, StorageConfig), config::ConfigError> {
    let pipeline_config = config::load_config(config_path)?;
    let root = data_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| pipeline_config.data_dir.clone());
    init_thread_pool(&pipeline_config.processing);
    Ok((pipeline_config, StorageConfig::new(root)))
}

fn build_sanitizer(
    config: &PipelineConfig,
    storage: StorageConfig,
    backend: Arc<dyn ImageBackend>,
) -> FaceSanitizer {
    FaceSanitizer::new(
        storage,
        config.sanitizer.clone(),
        backend,
        select_detector(&config.detector),
    )
}

/// Log to stderr so stdout carries only results.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("studio_refs=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
