use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// keepscope - JVM class file inspection and entry-probe instrumentation
#[derive(Debug, Parser)]
#[command(name = "keepscope", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags accepted by every subcommand.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Print the report as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Log per-unit decisions and failures.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show a class file's name, kind and members, marking which would receive a probe.
    Inspect {
        /// Path to the .class file.
        #[arg(value_name = "CLASS")]
        path: PathBuf,
    },

    /// Inject entry probes into a .class file or every .class file under a directory.
    Instrument {
        /// Input .class file or directory.
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output .class file or directory (mirrors the input layout).
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Additional comma-separated ignore rules.
        #[arg(long, value_name = "RULES")]
        ignore: Option<String>,

        /// Probe method as `owner.Class#method` (default: keepscope.Probe#memberUsed).
        #[arg(long, value_name = "OWNER#METHOD")]
        probe: Option<String>,
    },
}
