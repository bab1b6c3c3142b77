use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use cvgraph::prelude::*;

use crate::{app::GlobalOptions, output::print_output};

/// Flags of the `build` subcommand, pre-parsed by clap.
pub struct BuildArgs<'a> {
    pub image_base: Option<&'a str>,
    pub block_namespaces: &'a [String],
    pub no_methods: bool,
    pub max_order_passes: Option<usize>,
}

#[derive(Debug, Serialize)]
struct BuildSummary {
    nodes: usize,
    top_level_declarations: usize,
    reflection_entries: usize,
    diagnostics: usize,
    diagnostics_by_category: Vec<CategoryCount>,
}

#[derive(Debug, Serialize)]
struct CategoryCount {
    category: String,
    count: usize,
}

fn parse_address(text: &str) -> anyhow::Result<u64> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.with_context(|| format!("invalid address: {text}"))
}

pub fn run(
    input: &Path,
    out: &Path,
    args: &BuildArgs<'_>,
    opts: &GlobalOptions,
) -> anyhow::Result<()> {
    let db = SymbolDatabase::from_file(input)
        .with_context(|| format!("failed to load symbol database from {}", input.display()))?;

    let mut options = BuildOptions {
        method_aware: !args.no_methods,
        blocked_root_namespaces: args.block_namespaces.to_vec(),
        max_order_passes: args.max_order_passes,
        ..BuildOptions::default()
    };
    if let Some(text) = args.image_base {
        options.image_base = parse_address(text)?;
    }

    let diag = DiagnosticLog::new();
    let frozen = reconstruct(&db, &options, &diag).context("reconstruction failed")?;

    diag.write_to_dir(&out.join("log"))
        .with_context(|| format!("failed to write logs under {}", out.display()))?;

    let summary = BuildSummary {
        nodes: frozen.graph().len(),
        top_level_declarations: frozen.order().len(),
        reflection_entries: frozen.reflection().len(),
        diagnostics: diag.len(),
        diagnostics_by_category: diag
            .by_category()
            .into_iter()
            .map(|(category, messages)| CategoryCount {
                category: category.to_string(),
                count: messages.len(),
            })
            .collect(),
    };

    print_output(&summary, opts, |s| {
        println!("Nodes:                  {}", s.nodes);
        println!("Top-level declarations: {}", s.top_level_declarations);
        println!("Reflection entries:     {}", s.reflection_entries);
        println!("Diagnostics:            {}", s.diagnostics);
        for entry in &s.diagnostics_by_category {
            println!("  {:<28} {}", entry.category, entry.count);
        }
    })
}
