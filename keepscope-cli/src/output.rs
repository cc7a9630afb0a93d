use comfy_table::{presets, ContentArrangement, Table};
use serde::Serialize;

use crate::app::GlobalOptions;

/// Emit `report` as pretty JSON under `--json`, otherwise hand it to `human`.
pub fn print_output<T: Serialize>(
    report: &T,
    opts: &GlobalOptions,
    human: impl FnOnce(&T),
) -> anyhow::Result<()> {
    if opts.json {
        let json = serde_json::to_string_pretty(report)?;
        println!("{json}");
    } else {
        human(report);
    }
    Ok(())
}

/// Borderless, left-aligned columns.
pub struct Columns {
    table: Table,
}

impl Columns {
    pub fn new(headers: &[&str]) -> Self {
        let mut table = Table::new();
        table
            .load_preset(presets::NOTHING)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(headers.iter().copied());

        // one space between columns, none at the edges
        let last = headers.len().saturating_sub(1);
        for index in 0..headers.len() {
            if let Some(column) = table.column_mut(index) {
                column.set_padding((0, u16::from(index != last)));
            }
        }

        Columns { table }
    }

    pub fn push(&mut self, cells: impl IntoIterator<Item = String>) {
        self.table.add_row(cells.into_iter().collect::<Vec<_>>());
    }

    pub fn print(&self) {
        for line in self.table.to_string().lines() {
            println!("{}", line.trim_end());
        }
    }
}
