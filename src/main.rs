use std::path::Path;
use std::process::exit;

use clap::Parser;

mod config;
mod error;
mod history;
mod material;
mod mesh;
mod post_processor;
mod solver;
mod source;
mod zones;

use error::WeldSimError;
use solver::{RunOptions, Solver};

/// Transient thermal simulation of fusion welding on a 2D plate.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the JSON simulation configuration
    config: String,

    /// Directory for field and history CSV output
    #[arg(long, default_value = "output")]
    output: String,

    /// Capture animation frames to this JSON-lines file
    #[arg(long)]
    frames: Option<String>,

    /// Record a frame every N steps when --frames is set
    #[arg(long, default_value_t = 10)]
    frame_interval: usize,

    /// Suppress the progress bar and periodic status lines
    #[arg(long)]
    quiet: bool,
}

fn run(cli: &Cli) -> Result<(), WeldSimError> {
    let config = config::load(&cli.config)?;
    config.summary();

    let (solver, mut state) = Solver::new(&config)?;

    std::fs::create_dir_all(&cli.output).map_err(|err| {
        WeldSimError::PostProcessor(format!(
            "Unable to create output directory {}: {}",
            cli.output, err
        ))
    })?;

    let frame_writer = match &cli.frames {
        Some(path) => Some(post_processor::FrameWriter::spawn(path)?),
        None => None,
    };

    let t_end = solver.end_time();
    println!("info: integrating to t={:.3} s", t_end);
    {
        let opts = RunOptions {
            progress: !cli.quiet,
            cancel: None,
            snapshot_every: if frame_writer.is_some() {
                cli.frame_interval.max(1)
            } else {
                0
            },
            sink: frame_writer.as_ref().map(|(tx, _)| tx.clone()),
        };
        solver.run_to(&mut state, t_end, &opts)?;
    }

    if let Some((tx, writer)) = frame_writer {
        drop(tx);
        writer.finish()?;
    }

    let zone_map = zones::classify(solver.mesh(), solver.layout(), &state.peak);

    let field_path = Path::new(&cli.output).join("field.csv");
    let history_path = Path::new(&cli.output).join("history.csv");
    post_processor::write_field_csv(
        &field_path.to_string_lossy(),
        &solver,
        &state,
        &zone_map,
    )?;
    post_processor::write_history_csv(&history_path.to_string_lossy(), &state)?;

    post_processor::print_summary(&solver, &state, &zone_map, config.phase.as_ref());

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        println!("{}", err);
        exit(1);
    }
}
