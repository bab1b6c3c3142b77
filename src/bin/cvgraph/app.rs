use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// cvgraph - type graph reconstruction from CodeView symbol dumps
#[derive(Debug, Parser)]
#[command(name = "cvgraph", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconstruct the type graph and write diagnostics to an output directory.
    Build {
        /// Path to the JSON symbol database.
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Output directory; degradation logs land under <DIR>/log/.
        #[arg(short, long, value_name = "DIR")]
        out: PathBuf,

        /// Image load base added to every resolved address (hex like 0x140000000 or decimal).
        #[arg(long, value_name = "ADDR")]
        image_base: Option<String>,

        /// Root namespace whose functions are excluded from emission. Repeatable.
        #[arg(long, value_name = "NAME")]
        block_namespace: Vec<String>,

        /// Degrade member functions to plain procedures with an explicit this parameter.
        #[arg(long)]
        no_methods: bool,

        /// Cap on dependency-ordering passes before the run is declared stuck.
        #[arg(long, value_name = "N")]
        max_order_passes: Option<usize>,
    },

    /// Display symbol database overview: record counts per table.
    Info {
        /// Path to the JSON symbol database.
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}
