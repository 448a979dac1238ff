//! CLI application for building an average face.
//!
//! Usage:
//!   average-face <input_dir>                      # writes output_data/myaverageface.jpg
//!   average-face <input_dir> out.png              # custom output path
//!   average-face <input_dir> --json               # JSON run summary on stdout
//!   average-face <input_dir> --landmarks-out avg.json

use std::path::PathBuf;

use average_face::{io, EyeCorners, Pipeline, PipelineConfig, LEFT_EYE_OUTER, RIGHT_EYE_OUTER};
use clap::{CommandFactory, Parser};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "average-face")]
#[command(
    author,
    version,
    about = "Average faces from portraits and landmark files",
    long_about = None
)]
struct Args {
    /// Directory with one `<name>.txt` landmark file per face next to its image
    input_dir: Option<PathBuf>,

    /// Output image path
    #[arg(default_value = "output_data/myaverageface.jpg")]
    output: PathBuf,

    /// Output canvas width
    #[arg(long, default_value_t = 600)]
    width: u32,

    /// Output canvas height
    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Landmark index of the left outer eye corner
    #[arg(long, default_value_t = LEFT_EYE_OUTER)]
    left_eye: usize,

    /// Landmark index of the right outer eye corner
    #[arg(long, default_value_t = RIGHT_EYE_OUTER)]
    right_eye: usize,

    /// Also write the averaged landmark layout (JSON if the path ends in .json)
    #[arg(long)]
    landmarks_out: Option<PathBuf>,

    /// Skip faces that fail to load or align instead of aborting
    #[arg(long)]
    skip_invalid: bool,

    /// Align and warp faces one at a time (pixel rows are still resampled in parallel)
    #[arg(long)]
    sequential: bool,

    /// Print a JSON run summary to stdout
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Output structure for JSON serialization
#[derive(Serialize)]
struct Summary {
    input_dir: String,
    output: String,
    width: u32,
    height: u32,
    faces: usize,
    /// Points in the average layout, boundary points included
    landmarks: usize,
    triangles: usize,
    skipped: Vec<String>,
    landmarks_out: Option<String>,
}

fn main() {
    let args = Args::parse();

    let filter = match args.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let Some(input_dir) = args.input_dir.clone() else {
        // Nothing to do without an input directory.
        let _ = Args::command().print_help();
        println!();
        return;
    };

    if let Err(e) = run(&args, input_dir) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args, input_dir: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineConfig {
        width: args.width,
        height: args.height,
        eye_corners: EyeCorners::new(args.left_eye, args.right_eye),
        parallel: !args.sequential,
        skip_invalid: args.skip_invalid,
    };
    let pipeline = Pipeline::new(config)?;

    let (samples, mut skipped) = io::load_faces(&input_dir, args.skip_invalid)?;
    let average = pipeline.run(samples)?;
    skipped.extend(average.skipped.iter().cloned());

    io::save_image(&average.image, &args.output)?;
    info!("Average of {} faces written to {}", average.num_faces, args.output.display());

    if let Some(ref path) = args.landmarks_out {
        io::write_landmarks(&average.landmarks, path)?;
        info!("Average landmarks written to {}", path.display());
    }

    if args.json {
        let summary = Summary {
            input_dir: input_dir.display().to_string(),
            output: args.output.display().to_string(),
            width: args.width,
            height: args.height,
            faces: average.num_faces,
            landmarks: average.landmarks.num_landmarks(),
            triangles: average.triangles.len(),
            skipped,
            landmarks_out: args.landmarks_out.as_ref().map(|p| p.display().to_string()),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}
