mod app;
mod commands;
mod output;

use clap::Parser;

use crate::app::{Cli, Command, GlobalOptions};

fn main() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        eprintln!("\nInterrupted.");
        std::process::exit(130);
    })?;

    let cli = Cli::parse();
    init_logging(&cli.global);

    match &cli.command {
        Command::Inspect { path } => commands::inspect::run(path, &cli.global),
        Command::Instrument {
            input,
            output,
            ignore,
            probe,
        } => {
            let opts = commands::instrument::InstrumentOptions {
                ignore: ignore.as_deref(),
                probe: probe.as_deref(),
                global: &cli.global,
            };
            commands::instrument::run(input, output, &opts)
        }
    }
}

/// Bare log messages on stderr. The library and this binary share the `keepscope` module
/// prefix. Under `--json` only warnings show unless `RUST_LOG` overrides.
fn init_logging(global: &GlobalOptions) {
    let level = match (global.json, global.verbose) {
        (_, true) => log::LevelFilter::Debug,
        (true, false) => log::LevelFilter::Warn,
        (false, false) => log::LevelFilter::Info,
    };

    env_logger::Builder::new()
        .filter_module("keepscope", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_target(false)
        .init();
}
