use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::sequence::Naming;
use crate::session::types::{ComponentQuantities, PackoutOptions};
use crate::session::SessionSetup;
use crate::types::{LogLevel, Mode};

#[derive(Parser, Debug)]
#[command(
    name = "fai-capture",
    version,
    about = "Guided FAI photo capture with crash-safe session recovery"
)]
pub struct Cli {
    /// Directory holding the session descriptor and photo database
    #[arg(long, env = "FAI_CAPTURE_DATA_DIR", default_value = "~/.fai-capture", global = true)]
    pub data_dir: String,

    /// Log level
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,

    /// Retries for a failed store write before it is reported
    #[arg(long, default_value_t = 3, global = true)]
    pub max_retries: u32,

    /// Base delay between store write retries, in milliseconds
    #[arg(long, default_value_t = 50, global = true)]
    pub retry_delay_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the photo queue a session would walk through
    Plan(SessionArgs),

    /// Show the saved session, if any
    Status,

    /// Capture photos interactively, resuming a saved session if present
    Run(RunArgs),

    /// Write the saved session's photos to a directory
    Export(ExportArgs),

    /// Discard the saved session
    Reset(ResetArgs),
}

/// Options that determine the photo queue.
#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
    /// Which photo set to capture
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Part number (PN), used in filenames
    #[arg(long = "part-number", visible_alias = "pn")]
    pub part_number: Option<String>,

    /// Serial number (SN), used in filenames
    #[arg(long = "serial-number", visible_alias = "sn")]
    pub serial_number: Option<String>,

    /// Number of switch stacks
    #[arg(long, default_value_t = 0)]
    pub switches: u32,

    /// Number of server groups
    #[arg(long, default_value_t = 0)]
    pub servers: u32,

    /// Number of Corning edge units
    #[arg(long, default_value_t = 0)]
    pub corning_edge: u32,

    /// Number of cable types to label
    #[arg(long, default_value_t = 0)]
    pub cable_labels: u32,

    /// Number of cable bend tests
    #[arg(long, default_value_t = 0)]
    pub cable_bend: u32,

    /// Add the door branding photos (packout only)
    #[arg(long)]
    pub door_branding: bool,

    /// Session date for fallback filenames (YYYY-MM-DD, default today)
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

impl SessionArgs {
    pub fn quantities(&self) -> ComponentQuantities {
        ComponentQuantities::new()
            .with("switches", self.switches)
            .with("servers", self.servers)
            .with("corning_edge", self.corning_edge)
            .with("cable_labels", self.cable_labels)
            .with("cable_bend", self.cable_bend)
    }

    /// Build the session setup, or `None` if no mode was given.
    pub fn setup(&self, today: NaiveDate) -> Option<SessionSetup> {
        let mode = self.mode?;
        Some(SessionSetup {
            mode,
            naming: Naming::new(
                self.part_number.as_deref(),
                self.serial_number.as_deref(),
                self.date.unwrap_or(today),
            ),
            quantities: self.quantities(),
            packout: PackoutOptions {
                door_branding: self.door_branding,
            },
        })
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Resume a saved session without asking
    #[arg(long, conflicts_with = "fresh")]
    pub resume: bool,

    /// Discard any saved session without asking
    #[arg(long)]
    pub fresh: bool,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output directory; photos land in a subdirectory named after PN/SN
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}
