use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use cvgraph::SymbolDatabase;

use crate::{app::GlobalOptions, output::print_output};

#[derive(Debug, Serialize)]
struct DatabaseInfo {
    types: usize,
    procedures: usize,
    data: usize,
    sections: usize,
    names: usize,
}

pub fn run(input: &Path, opts: &GlobalOptions) -> anyhow::Result<()> {
    let db = SymbolDatabase::from_file(input)
        .with_context(|| format!("failed to load symbol database from {}", input.display()))?;

    let info = DatabaseInfo {
        types: db.type_count(),
        procedures: db.proc_count(),
        data: db.data_count(),
        sections: db.section_count(),
        names: db.name_count(),
    };

    print_output(&info, opts, |i| {
        println!("Type records:      {}", i.types);
        println!("Procedure records: {}", i.procedures);
        println!("Data records:      {}", i.data);
        println!("Section records:   {}", i.sections);
        println!("Name records:      {}", i.names);
    })
}
