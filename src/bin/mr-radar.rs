use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mr_radar::{
    Consumer, FrameTemplate, NoLocator, RadarError, RenderJob, Settings, SiteLocator,
    StateSnapshot, StationTable,
};

#[derive(Parser, Debug)]
#[command(name = "mr-radar", version, about = "Derive and cache radar map geometry")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prepare the base map for a site and print its manifest.
    Map(MapArgs),
    /// Prepare the frame loop for a site, print its manifest and trim surplus frames.
    Frames(FramesArgs),
    /// Print the cached state of a site without any lookup.
    DumpVars(DumpArgs),
    /// Delete frames beyond COUNT in DIR.
    Prune(PruneArgs),
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Site identifier, e.g. KSJT.
    site: String,

    /// Radius around the site, in miles (1-500). Defaults to the last run's, else 150.
    #[arg(short, long)]
    radius: Option<i64>,

    /// Root directory for site state and images.
    #[arg(short = 'D', long, env = "RLG_OUTPUT_ROOT")]
    output_root: Option<PathBuf>,

    /// Image directory; relative paths resolve against the output root.
    #[arg(short = 'o', long)]
    image_dir: Option<PathBuf>,

    /// Output file base name. Defaults to the last run's, else map / frame.
    #[arg(short = 'f', long)]
    file_name: Option<String>,

    /// Station table (JSON object of site code to [lat, lon]).
    #[arg(long, env = "RLG_STATIONS")]
    stations: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct MapArgs {
    #[command(flatten)]
    out: OutputArgs,
}

#[derive(Args, Debug)]
struct FramesArgs {
    #[command(flatten)]
    out: OutputArgs,

    /// Number of frames to keep (1-100). Defaults to the last run's, else 12.
    #[arg(short = 'n', long)]
    frames: Option<i64>,

    /// Radar product. Defaults to the last run's, else Reflectivity.
    #[arg(short, long)]
    product: Option<String>,
}

#[derive(Args, Debug)]
struct DumpArgs {
    /// Site identifier.
    site: String,

    /// Root directory for site state.
    #[arg(short = 'D', long, env = "RLG_OUTPUT_ROOT")]
    output_root: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PruneArgs {
    /// Directory holding the frames.
    dir: PathBuf,
    /// Frame template, e.g. frame_%d. Without an extension .png is assumed, so frame_%d
    /// matches frame_0.png but not frame_0.jpg.
    template: String,
    /// Number of frames to keep.
    count: usize,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.cmd) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if is_expected(&err) {
                tracing::error!("generation aborted: {err:#}");
            } else {
                tracing::error!(error = ?err, "unexpected failure");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Map(args) => {
            let settings = build_settings(&args.out, |s, name| s.map_file_name = Some(name))?;
            cmd_render(Consumer::Map, &args.out.site, settings)
        }
        Command::Frames(args) => {
            let mut settings =
                build_settings(&args.out, |s, name| s.frame_file_name = Some(name))?;
            if let Some(frames) = args.frames {
                settings = settings.with_frames(frames)?;
            }
            if let Some(product) = args.product {
                settings.product = Some(product);
            }
            cmd_render(Consumer::Frames, &args.out.site, settings)
        }
        Command::DumpVars(args) => cmd_dump_vars(args),
        Command::Prune(args) => cmd_prune(args),
    }
}

fn build_settings(
    args: &OutputArgs,
    set_name: impl FnOnce(&mut Settings, String),
) -> anyhow::Result<Settings> {
    let mut settings = Settings::from_env();
    if let Some(root) = &args.output_root {
        settings.output_root = root.clone();
    }
    if let Some(radius) = args.radius {
        settings = settings.with_radius(radius)?;
    }
    if let Some(dir) = &args.image_dir {
        settings.image_dir = Some(dir.clone());
    }
    if let Some(name) = &args.file_name {
        set_name(&mut settings, name.clone());
    }
    if let Some(stations) = &args.stations {
        settings.stations = Some(stations.clone());
    }
    Ok(settings)
}

fn make_locator(stations: Option<&Path>) -> anyhow::Result<Box<dyn SiteLocator>> {
    match stations {
        Some(path) => {
            let table = StationTable::from_path(path)?;
            tracing::debug!(path = %path.display(), stations = table.len(), "station table loaded");
            Ok(Box::new(table))
        }
        None => {
            tracing::debug!("no station table configured, relying on cached coordinates");
            Ok(Box::new(NoLocator))
        }
    }
}

fn cmd_render(consumer: Consumer, site: &str, settings: Settings) -> anyhow::Result<()> {
    let locator = make_locator(settings.stations.as_deref())?;
    let mut job = RenderJob::new(consumer, settings, locator)?;

    let result = drive(&mut job, site);
    if let Err(err) = &result
        && !is_expected(err)
    {
        tracing::error!(snapshot = %job.snapshot(), "derived state at failure");
    }
    result
}

fn drive(job: &mut RenderJob, site: &str) -> anyhow::Result<()> {
    job.open(site)?;
    let manifest = job.prepare()?;
    println!(
        "{}",
        serde_json::to_string_pretty(&manifest).context("serialize manifest")?
    );

    if let Some(report) = job.finish()? {
        tracing::debug!(
            existing = report.existing,
            deleted = report.deleted.len(),
            "frames reconciled"
        );
    }
    Ok(())
}

fn cmd_dump_vars(args: DumpArgs) -> anyhow::Result<()> {
    let root = args
        .output_root
        .unwrap_or_else(|| Settings::from_env().output_root);
    let snapshot = StateSnapshot::load(&root, &args.site)?;
    println!("{}", snapshot.to_json()?);
    Ok(())
}

fn cmd_prune(args: PruneArgs) -> anyhow::Result<()> {
    let template = FrameTemplate::parse(&args.template)?;
    let report = mr_radar::reconcile(&args.dir, &template, args.count)
        .with_context(|| format!("prune frames in '{}'", args.dir.display()))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serialize report")?
    );
    Ok(())
}

fn is_expected(err: &anyhow::Error) -> bool {
    err.downcast_ref::<RadarError>()
        .is_some_and(RadarError::is_expected)
}
