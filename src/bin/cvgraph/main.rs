mod app;
mod commands;
mod output;

use clap::Parser;

use crate::app::{Cli, Command};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Show cvgraph info+ on stderr unless --json; --verbose enables debug; RUST_LOG overrides
    if !cli.global.json {
        let level = if cli.global.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_module("cvgraph", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    match &cli.command {
        Command::Build {
            input,
            out,
            image_base,
            block_namespace,
            no_methods,
            max_order_passes,
        } => commands::build::run(
            input,
            out,
            &commands::build::BuildArgs {
                image_base: image_base.as_deref(),
                block_namespaces: block_namespace,
                no_methods: *no_methods,
                max_order_passes: *max_order_passes,
            },
            &cli.global,
        ),
        Command::Info { input } => commands::info::run(input, &cli.global),
    }
}
