use clap::{Parser, Subcommand};
use pixpress::imaging::{self, CompressRequest, OutputFormat, Quality, RustBackend};
use pixpress::{config, output, process};
use std::path::{Path, PathBuf};

fn version_string() -> &'static str {
    let on_tag = env!("PIXPRESS_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("PIXPRESS_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Called once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "pixpress")]
#[command(about = "Proportional-fit image compression")]
#[command(long_about = "\
Proportional-fit image compression

Scales images so their limiting axis just reaches a minimum bounding box
(never enlarging), optionally rotates them, and re-encodes to JPEG, PNG or
WebP. JPEG output that needs no pixel work is copied byte-for-byte.

Examples:

  pixpress plan photo.jpg --min-width 1280 --min-height 720
  pixpress compress photo.jpg -o small.jpg --quality 80
  pixpress batch photos/ -o out/ --format webp

Defaults come from ./pixpress.toml (or --config). Flags override them.
Run 'pixpress gen-config' to generate a documented pixpress.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (default: ./pixpress.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log detail (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Request flags shared by every command that plans or compresses.
#[derive(clap::Args, Clone, Default)]
struct RequestArgs {
    /// Minimum bounding box width
    #[arg(long)]
    min_width: Option<u32>,

    /// Minimum bounding box height
    #[arg(long)]
    min_height: Option<u32>,

    /// Lossy quality, 0-100 (out-of-range values clamp)
    #[arg(long, allow_negative_numbers = true)]
    quality: Option<i64>,

    /// Clockwise rotation in degrees
    #[arg(long, allow_negative_numbers = true)]
    rotate: Option<i32>,

    /// Output format: jpeg, png, heic, webp (or 0-3)
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Extra integer downscale divisor
    #[arg(long)]
    sample: Option<u32>,

    /// Carry EXIF, IPTC and JFIF blocks into JPEG output
    #[arg(long)]
    keep_exif: bool,

    /// Leave EXIF orientation out of the pixels
    #[arg(long)]
    no_auto_correction: bool,
}

impl RequestArgs {
    /// Apply flags on top of the configured defaults.
    fn apply(&self, mut request: CompressRequest) -> CompressRequest {
        if let Some(w) = self.min_width {
            request.min_width = w;
        }
        if let Some(h) = self.min_height {
            request.min_height = h;
        }
        if let Some(q) = self.quality {
            request.quality = Quality::new(q);
        }
        if let Some(r) = self.rotate {
            request.rotate = r;
        }
        if let Some(f) = self.format {
            request.format = f;
        }
        if let Some(s) = self.sample {
            request.in_sample_size = s;
        }
        if self.keep_exif {
            request.keep_exif = true;
        }
        if self.no_auto_correction {
            request.auto_correction = false;
        }
        request
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print the compression plan for an image as JSON, without encoding
    Plan {
        input: PathBuf,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Compress a single image
    Compress {
        input: PathBuf,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Compress every supported image under a directory
    Batch {
        input: PathBuf,
        /// Output directory (mirrors the input tree)
        #[arg(short, long)]
        output: PathBuf,
        /// Parallel workers (default: from config, else 4-6 by core count)
        #[arg(long)]
        workers: Option<usize>,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Print a stock pixpress.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if matches!(cli.command, Command::GenConfig) {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let cfg = config::load_config(cli.config.as_deref(), Path::new("."))?;
    let backend = RustBackend::new();

    match cli.command {
        Command::Plan { input, request } => {
            let request = request.apply(cfg.defaults.to_request());
            let data = std::fs::read(&input)?;
            let (source, plan) = imaging::plan_source(&backend, &data, &request)?;
            println!("{}", output::format_plan_json(&source, &plan)?);
        }
        Command::Compress {
            input,
            output: out,
            request,
        } => {
            let request = request.apply(cfg.defaults.to_request());
            let outcome = imaging::compress_file(&backend, &input, &out, &request)?;
            output::print_compress_output(&input, &out, &outcome);
        }
        Command::Batch {
            input,
            output: out,
            workers,
            request,
        } => {
            let request = request.apply(cfg.defaults.to_request());
            let mut processing = cfg.processing.clone();
            if workers.is_some() {
                processing.max_workers = workers;
            }
            let workers = config::effective_workers(&processing);

            let jobs = process::collect_jobs(&input, &out, request.format)?;
            let report =
                process::run_batch(&backend, &jobs, &request, workers, output::print_batch_event)?;
            println!();
            println!("{}", output::format_batch_summary(&report));
            if report.failed() > 0 {
                std::process::exit(1);
            }
        }
        // Printed above, before any config file is read
        Command::GenConfig => {}
    }

    Ok(())
}

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins when set; otherwise `-v` raises the level from `warn`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("pixpress={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
