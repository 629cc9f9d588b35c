//! Pose Coach CLI
//!
//! Replays recorded keypoint frames through the analysis engine and prints
//! one JSON result per frame followed by the session report.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use pose_coach::{BodyProfile, EngineConfig, Landmark, PoseCoach};

#[derive(Parser)]
#[command(name = "pose-coach")]
#[command(about = "Pose Coach - real-time exercise form analysis", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a recorded session
    ///
    /// Reads one JSON object per line: {"timestamp": <seconds>, "landmarks": [33 x {x, y, z, visibility}]}
    Replay {
        /// JSON-lines frame file
        #[arg(short, long, value_name = "PATH")]
        input: PathBuf,

        /// Exercise id (squat, deadlift, overhead_press, bench_press, plank, ...)
        #[arg(short, long, default_value = "squat")]
        exercise: String,

        /// Body weight (kg)
        #[arg(long)]
        weight: Option<f64>,

        /// Body height (cm)
        #[arg(long)]
        height: Option<f64>,

        /// Seed for coaching phrase selection
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the default configuration as TOML
    Config,
}

#[derive(Deserialize)]
struct FrameLine {
    timestamp: f64,
    landmarks: Vec<Landmark>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Info)
        .init();

    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => EngineConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Config => {
            println!("{}", config.to_toml_string()?);
        }
        Commands::Replay {
            input,
            exercise,
            weight,
            height,
            seed,
        } => {
            if seed.is_some() {
                config.feedback_seed = seed;
            }
            let mut profile = config.default_profile;
            if let Some(weight) = weight {
                profile.weight_kg = weight;
            }
            if let Some(height) = height {
                profile.height_cm = height;
            }
            replay(config, &input, &exercise, profile)?;
        }
    }

    Ok(())
}

fn replay(config: EngineConfig, input: &Path, exercise: &str, profile: BodyProfile) -> Result<()> {
    let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let coach = PoseCoach::new(config);
    let session = coach.start_session(exercise, Some(profile))?;

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let frame: FrameLine =
            serde_json::from_str(&line).with_context(|| format!("{}:{}: invalid frame", input.display(), line_no + 1))?;
        let result = coach.process_frame(session, &frame.landmarks, exercise, frame.timestamp)?;
        serde_json::to_writer(&mut out, &result)?;
        writeln!(out)?;
    }

    let report = coach.complete_session(session)?;
    serde_json::to_writer_pretty(&mut out, &report)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
