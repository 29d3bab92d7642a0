use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "facewarp", version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug with warp diagnostics, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Warp a single image with landmarks from a JSON file and write a PNG.
    Warp(WarpArgs),
    /// Parse a rule file and print what it contains.
    Rules(RulesArgs),
}

#[derive(Parser, Debug)]
struct WarpArgs {
    /// Input image (any format the `image` crate decodes).
    #[arg(long)]
    image: PathBuf,

    /// Landmark JSON: `{"faces": [[{"x": .., "y": .., "z": ..}, ...]]}` in normalized coordinates.
    #[arg(long)]
    landmarks: PathBuf,

    /// Deformation rule file.
    #[arg(long)]
    rules: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Engine config JSON; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Effect strength in [-10, 10]; negative inverts the effect.
    #[arg(long, allow_hyphen_values = true)]
    intensity: Option<f64>,

    /// Solver grid spacing in pixels.
    #[arg(long)]
    grid: Option<u32>,

    /// Weight fall-off exponent.
    #[arg(long)]
    fall_off: Option<f64>,

    /// Disable source/destination area equalization.
    #[arg(long)]
    no_pre_scale: bool,

    /// Warp each rule group in its own region.
    #[arg(long)]
    per_group: bool,

    /// Border anchor layout.
    #[arg(long, value_enum)]
    anchors: Option<AnchorChoice>,

    /// Solve displacement rows on the rayon pool.
    #[arg(long)]
    parallel: bool,

    /// Write the frame outcome as JSON.
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RulesArgs {
    /// Deformation rule file.
    #[arg(long)]
    rules: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AnchorChoice {
    None,
    Corners,
    Ring,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Warp(args) => cmd_warp(args, cli.verbose),
        Command::Rules(args) => cmd_rules(args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_config(args: &WarpArgs) -> anyhow::Result<facewarp::EngineConfig> {
    let mut config = match &args.config {
        Some(path) => facewarp::EngineConfig::from_json_file(path)?,
        None => facewarp::EngineConfig::default(),
    };
    config.rules_path = Some(args.rules.clone());
    config.strict_rules = true;
    config.log_every = 1;
    if let Some(v) = args.intensity {
        config.intensity = v;
    }
    if let Some(v) = args.grid {
        config.solver.grid_size = v;
    }
    if let Some(v) = args.fall_off {
        config.solver.fall_off = v;
    }
    if args.no_pre_scale {
        config.solver.pre_scale = false;
    }
    if args.parallel {
        config.solver.parallel = true;
    }
    if args.per_group {
        config.region.mode = facewarp::RegionMode::PerGroup;
    }
    if let Some(choice) = args.anchors {
        config.region.anchors = match choice {
            AnchorChoice::None => facewarp::AnchorStrategy::None,
            AnchorChoice::Corners => facewarp::AnchorStrategy::Corners,
            AnchorChoice::Ring => facewarp::AnchorStrategy::Ring { step: None },
        };
    }
    if args.report.is_some() {
        config.debug_overlay = true;
    }
    config.validate()?;
    Ok(config)
}

fn cmd_warp(args: WarpArgs, verbose: u8) -> anyhow::Result<()> {
    let config = build_config(&args)?;
    let diagnostics: Box<dyn facewarp::WarpDiagnostics> = if verbose >= 2 {
        Box::new(facewarp::TracingDiagnostics::default())
    } else {
        Box::new(facewarp::NoDiagnostics)
    };
    let mut engine = facewarp::DeformEngine::new(config, diagnostics)?;
    let mut source = facewarp::StaticLandmarks::from_json_file(&args.landmarks)?;
    engine.prepare_source(&mut source)?;

    let img = image::open(&args.image)
        .with_context(|| format!("decode image '{}'", args.image.display()))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    let mut data = img.into_raw();

    let outcome = {
        let mut frame =
            facewarp::FrameMut::packed(&mut data, width, height, facewarp::PixelFormat::Rgba8)?;
        engine.process_frame(&mut frame, 0, &mut source)?
    };
    match &outcome {
        facewarp::FrameOutcome::Warped(report) => eprintln!(
            "warped {} control points in {} region(s)",
            report.control_points,
            report.regions.len()
        ),
        facewarp::FrameOutcome::PassThrough(reason) => {
            eprintln!("frame passed through: {reason:?}")
        }
        facewarp::FrameOutcome::Drop => eprintln!("no face detected; frame would be dropped"),
    }

    ensure_parent_dir(&args.out)?;
    image::save_buffer_with_format(
        &args.out,
        &data,
        width,
        height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;
    eprintln!("wrote {}", args.out.display());

    if let Some(path) = &args.report {
        ensure_parent_dir(path)?;
        let f = std::fs::File::create(path)
            .with_context(|| format!("create report '{}'", path.display()))?;
        serde_json::to_writer_pretty(f, &outcome).with_context(|| "write report JSON")?;
        eprintln!("wrote {}", path.display());
    }
    Ok(())
}

fn cmd_rules(args: RulesArgs) -> anyhow::Result<()> {
    let rules = facewarp::RuleSet::load(&args.rules)?;
    println!("rules:        {}", rules.len());
    println!("skipped:      {}", rules.skipped_lines());
    let groups: Vec<String> = rules.group_ids().iter().map(i32::to_string).collect();
    println!("groups:       {}", groups.join(", "));
    match rules.max_landmark_index() {
        Some(max) => println!("max landmark: {max}"),
        None => println!("max landmark: -"),
    }
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}
