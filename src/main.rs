use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use turing_patterns::{
    config,
    input::{self, Action},
    logging,
    render::TerminalPreview,
    Backend, FrameSink, Pipeline, PipelineError, PngSequence, RayonBackend, Settings,
};

#[derive(Parser, Debug)]
#[command(version, about = "Multiscale Turing pattern renderer")]
struct Args {
    /// settings JSON (default: per-user settings.json, then built-ins)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    width: Option<usize>,

    #[arg(long)]
    height: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// frames to render (default: unbounded with --preview, 300 otherwise)
    #[arg(long)]
    frames: Option<u64>,

    /// directory for frame-NNNN.png files (default: render/<timestamp>)
    #[arg(long)]
    out: Option<PathBuf>,

    /// don't write PNG frames
    #[arg(long, default_value_t = false)]
    no_save: bool,

    /// live braille preview in the terminal
    #[arg(long, default_value_t = false)]
    preview: bool,

    /// preview frame cap
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// worker threads (default: one per core)
    #[arg(long)]
    threads: Option<usize>,

    /// multiply every radius, handy on small domains
    #[arg(long)]
    radius_scale: Option<f32>,

    /// consecutive dropped frames tolerated before giving up
    #[arg(long, default_value_t = 3)]
    max_failures: u32,

    /// print the effective settings as JSON and exit
    #[arg(long, default_value_t = false)]
    print_config: bool,
}

fn effective_settings(args: &Args) -> Result<Settings> {
    let mut settings = config::resolve_settings(args.config.as_deref())?;
    if let Some(w) = args.width {
        settings.width = w;
    }
    if let Some(h) = args.height {
        settings.height = h;
    }
    if let Some(seed) = args.seed {
        settings.seed = seed;
    }
    if let Some(factor) = args.radius_scale {
        settings = settings.scaled(factor);
    }
    Ok(settings)
}

struct RunLimits {
    frames: Option<u64>,
    frame_budget: Option<Duration>,
    max_failures: u32,
}

fn run<B: Backend>(
    pipeline: &mut Pipeline<B>,
    sinks: &mut [Box<dyn FrameSink>],
    mut preview: Option<&mut TerminalPreview>,
    limits: &RunLimits,
) -> Result<()> {
    let mut failures = 0u32;
    let mut paused = false;

    loop {
        if limits.frames.is_some_and(|n| pipeline.frame_index() >= n) {
            return Ok(());
        }
        let tick = Instant::now();

        if let Some(p) = preview.as_deref_mut() {
            for action in input::poll_actions(Duration::ZERO)? {
                match action {
                    Action::Quit => return Ok(()),
                    Action::TogglePause => paused = !paused,
                }
            }
            if paused {
                p.set_status("[paused]");
                let shown = pipeline.frame_index().saturating_sub(1);
                p.present(shown, pipeline.output())?;
                std::thread::sleep(limits.frame_budget.unwrap_or(Duration::from_millis(50)));
                continue;
            }
            p.set_status("");
        }

        let index = pipeline.frame_index();
        match pipeline.step() {
            Ok(image) => {
                failures = 0;
                for sink in sinks.iter_mut() {
                    sink.present(index, image)?;
                }
                if let Some(p) = preview.as_deref_mut() {
                    p.present(index, image)?;
                }
                info!(frames = index + 1, "completed frames");
            }
            Err(e @ PipelineError::FrameFailed { .. }) => {
                failures += 1;
                warn!(error = %e, failures, "frame dropped");
                if failures > limits.max_failures {
                    return Err(e).context("too many consecutive dropped frames");
                }
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(budget) = limits.frame_budget {
            let elapsed = tick.elapsed();
            if elapsed < budget {
                std::thread::sleep(budget - elapsed);
            }
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_tracing(if args.preview { "warn" } else { "info" })?;

    let settings = effective_settings(&args)?;
    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    let backend = match args.threads {
        Some(n) => RayonBackend::with_threads(n)?,
        None => RayonBackend::new(),
    };
    info!(threads = backend.threads(), "compute backend ready");
    let mut pipeline = Pipeline::new(&settings, backend).context("could not set up pipeline")?;

    let mut sinks: Vec<Box<dyn FrameSink>> = Vec::new();
    if !args.no_save {
        let dir = args.out.clone().unwrap_or_else(PngSequence::default_dir);
        sinks.push(Box::new(PngSequence::create(dir)?));
    }
    if sinks.is_empty() && !args.preview {
        warn!("--no-save without --preview: frames are computed and discarded");
    }

    let limits = RunLimits {
        frames: match (args.frames, args.preview) {
            (Some(n), _) => Some(n),
            (None, true) => None,
            (None, false) => Some(300),
        },
        frame_budget: args
            .preview
            .then(|| Duration::from_secs_f64(1.0 / args.fps.max(1) as f64)),
        max_failures: args.max_failures,
    };

    let mut preview = if args.preview {
        Some(TerminalPreview::begin()?)
    } else {
        None
    };
    let result = run(&mut pipeline, &mut sinks, preview.as_mut(), &limits);
    if let Some(mut p) = preview {
        p.end()?;
    }
    result?;

    info!(frames = pipeline.frame_index(), "done");
    Ok(())
}
