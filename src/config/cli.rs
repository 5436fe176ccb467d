use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "geoharness")]
#[command(about = "Map-offset correction and cross-source POI verification for Korea")]
pub struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Predict the correction vector for a WGS84 point
    Predict {
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lng: f64,
    },

    /// Correct a point and report the offset distance and harness score
    Verify {
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lng: f64,
        #[arg(long, default_value = "")]
        name: String,
    },

    /// Show whether a model artifact is loaded
    ModelStatus,

    /// EPSG:5179 round trip plus refinement against the matching landmark
    Transform {
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lng: f64,
        /// Skip the reasoning-service refinement
        #[arg(long)]
        no_harness: bool,
    },

    /// Refine a point toward an explicit ground truth
    Refine {
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lng: f64,
        #[arg(long)]
        truth_lat: f64,
        #[arg(long)]
        truth_lng: f64,
        #[arg(long, default_value = "CLI Request Point")]
        label: String,
        /// Override reasoning.max_iterations
        #[arg(long)]
        max_iterations: Option<u32>,
    },

    /// Classify whether a place still exists using a competing-source candidate
    Classify {
        #[arg(long)]
        name: String,
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lng: f64,
        /// Competing-source title; omit to classify as absent
        #[arg(long)]
        candidate_title: Option<String>,
        #[arg(long, requires = "candidate_lng")]
        candidate_lat: Option<f64>,
        #[arg(long, requires = "candidate_lat")]
        candidate_lng: Option<f64>,
    },

    /// Evaluate the landmark set without calling the reasoning service
    Batch {
        /// Overrides data.landmarks_path
        #[arg(long)]
        landmarks: Option<PathBuf>,
    },

    /// Show the triangulation features of a point against an anchor CSV
    Features {
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lng: f64,
        /// Overrides data.anchors_path
        #[arg(long)]
        anchors: Option<PathBuf>,
    },
}
