//! Command-line arguments for the `sprocket` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "sprocket")]
#[command(about = "Drive the simulated base with the configured motion controllers")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Tuning file (defaults to `sprocket.toml` in the working directory)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Drive the simulated base to (X, Y), optionally arriving at HEADING_DEG
    /// (counter-clockwise from +X)
    Move {
        #[arg(value_parser = finite, allow_negative_numbers = true)]
        x: f64,
        #[arg(value_parser = finite, allow_negative_numbers = true)]
        y: f64,
        #[arg(value_parser = finite, allow_negative_numbers = true)]
        heading_deg: Option<f64>,
    },
    /// Print the trapezoidal plan for a straight drive
    Profile {
        #[arg(value_parser = finite, allow_negative_numbers = true)]
        distance: f64,
    },
    /// Print the effective configuration as TOML
    Config,
}

fn finite(raw: &str) -> Result<f64, String> {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("expected a finite number, got `{raw}`")),
    }
}
