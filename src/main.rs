use boxscale::config::{self, Config};
use boxscale::downscale::{DownscaleRequest, Downscaler};
use boxscale::imaging::rust_backend::data_url;
use boxscale::imaging::{ImageFormat, Output, OutputKind};
use boxscale::output::{self, BatchEntry, BatchOutcome};
use boxscale::source::Source;
use boxscale::timing;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "boxscale")]
#[command(about = "Box-filter image downscaler")]
#[command(long_about = "\
Box-filter image downscaler

Crops the source to the target aspect ratio (centred unless --source-x /
--source-y say otherwise), then averages blocks of source pixels down to the
target size.

Sources: a file path or an http(s) URL.

Batch files hold one request per line, in the same form as the scale
arguments with key=value options:

  photos/cat.jpg 200 200
  https://img.test/dog.png 640 480 format=png
  photos/wide.jpg 100 100 source_x=0 quality=0.6
  # comments and blank lines are skipped

Every request in a batch shares one decoded-source cache, so a source listed
several times is read and decoded once.

Set RUST_LOG to control log output (default: warn).
Run 'boxscale gen-config' to generate a documented boxscale.toml.")]
#[command(version)]
struct Cli {
    /// Config file (optional; stock defaults apply when it is absent)
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct ScaleArgs {
    /// Image file path or http(s) URL
    source: String,
    /// Target width in pixels
    width: u32,
    /// Target height in pixels
    height: u32,
    /// Left edge of the crop (default: centred)
    #[arg(long)]
    source_x: Option<u32>,
    /// Top edge of the crop (default: centred)
    #[arg(long)]
    source_y: Option<u32>,
    /// Output format: jpeg, png, webp, bmp (default: from --out extension, then config)
    #[arg(long)]
    format: Option<ImageFormat>,
    /// JPEG quality, 0.0 - 1.0
    #[arg(long)]
    quality: Option<f32>,
    /// Write the encoded image here
    #[arg(long)]
    out: Option<PathBuf>,
    /// Print the result as a data URL (the default when --out is not given)
    #[arg(long)]
    data_url: bool,
    /// Log a per-phase timing table
    #[arg(long)]
    debug: bool,
}

#[derive(clap::Args)]
struct BatchArgs {
    /// File with one request per line
    file: PathBuf,
    /// Directory for the encoded results
    #[arg(long, default_value = "scaled")]
    out_dir: PathBuf,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Downscale one image
    Scale(ScaleArgs),
    /// Downscale every request listed in a file, sharing decoded sources
    Batch(BatchArgs),
    /// Print a stock boxscale.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(matches!(&cli.command, Command::Scale(args) if args.debug));

    match &cli.command {
        Command::Scale(args) => {
            let config = config::load_config(&cli.config)?;
            init_thread_pool(&config.processing);
            run_scale(&config, args).await?;
        }
        Command::Batch(args) => {
            let config = config::load_config(&cli.config)?;
            init_thread_pool(&config.processing);
            run_batch(&config, args).await?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

async fn run_scale(config: &Config, args: &ScaleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let downscaler = Downscaler::with_config(config)?;

    let format = args
        .format
        .or_else(|| args.out.as_deref().and_then(format_from_extension))
        .unwrap_or(config.output.format);
    if args.quality.is_some() && !format.is_lossy() {
        warn!(%format, "--quality only affects JPEG output");
    }
    let kind = if args.out.is_some() {
        OutputKind::Bytes
    } else {
        OutputKind::DataUrl
    };

    let mut request = DownscaleRequest::new(Source::parse(&args.source)?, args.width, args.height)
        .with_options(downscaler.defaults())
        .format(format)
        .output(kind)
        .debug(args.debug);
    if let Some(x) = args.source_x {
        request = request.source_x(x);
    }
    if let Some(y) = args.source_y {
        request = request.source_y(y);
    }
    if let Some(q) = args.quality {
        request = request.quality(q);
    }

    match (downscaler.downscale(request).await?, &args.out) {
        (Output::Encoded { mime, data }, Some(out)) => {
            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(out, &data).await?;
            println!(
                "{}",
                output::format_scale_output(&args.source, out, args.width, args.height, data.len())
            );
            if args.data_url {
                println!("{}", data_url(mime, &data));
            }
        }
        (Output::DataUrl(url), _) => println!("{}", url),
        (other, _) => {
            return Err(format!("unexpected {:?} output", other.kind()).into());
        }
    }
    Ok(())
}

async fn run_batch(config: &Config, args: &BatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let downscaler = Downscaler::with_config(config)?;
    let content = tokio::fs::read_to_string(&args.file).await?;
    tokio::fs::create_dir_all(&args.out_dir).await?;

    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect();
    info!(
        requests = lines.len(),
        file = %args.file.display(),
        capacity = ?downscaler.cache().capacity(),
        "starting batch"
    );

    let mut entries = Vec::new();
    let mut accepted = Vec::new();
    let mut requests = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let index = i + 1;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match DownscaleRequest::parse_with(&tokens, downscaler.defaults()) {
            Ok(request) => {
                let request = request.output(OutputKind::Bytes);
                accepted.push((index, *line, request.clone()));
                requests.push(request);
            }
            Err(e) => entries.push(failed(index, line, e)),
        }
    }

    let results = downscaler.downscale_all(requests).await;
    for ((index, line, request), result) in accepted.into_iter().zip(results) {
        let entry = match result {
            Ok(Output::Encoded { data, .. }) => {
                let name = output::output_filename(
                    index,
                    &request.source,
                    request.dest_width,
                    request.dest_height,
                    request.options.format,
                );
                let path = args.out_dir.join(name);
                match tokio::fs::write(&path, &data).await {
                    Ok(()) => BatchEntry {
                        index,
                        request: line.to_string(),
                        outcome: BatchOutcome::Written {
                            path,
                            bytes: data.len(),
                        },
                    },
                    Err(e) => failed(index, line, e),
                }
            }
            Ok(other) => failed(index, line, format!("unexpected {:?} output", other.kind())),
            Err(e) => failed(index, line, e),
        };
        entries.push(entry);
    }
    entries.sort_by_key(|e| e.index);

    let stats = downscaler.cache_stats();
    if args.json {
        println!("{}", output::format_batch_json(&entries, &stats)?);
    } else {
        output::print_batch_report(&entries, &stats);
    }

    let failures = entries.iter().filter(|e| e.is_failure()).count();
    if failures > 0 {
        return Err(format!("{} of {} requests failed", failures, entries.len()).into());
    }
    Ok(())
}

fn failed(index: usize, line: &str, error: impl std::fmt::Display) -> BatchEntry {
    BatchEntry {
        index,
        request: line.to_string(),
        outcome: BatchOutcome::Failed {
            error: error.to_string(),
        },
    }
}

fn format_from_extension(path: &Path) -> Option<ImageFormat> {
    path.extension()?.to_str()?.parse().ok()
}

/// Install the log subscriber. `RUST_LOG` wins over the default level.
///
/// Timing tables stay visible at the default level, so `debug=true` on a
/// batch line reports without `--debug`.
fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(timing::default_log_filter(debug)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
