//! Output stage: pair records with the accumulated column list and write CSV.

use crate::models::{ArticleRecord, Schema};
use anyhow::{Context, Result};
use csv::{QuoteStyle, WriterBuilder};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Records plus the exact column order they are written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub records: Vec<ArticleRecord>,
    pub columns: Vec<String>,
}

/// Pure pairing step; columns keep the schema's accumulation order.
pub fn assemble(records: Vec<ArticleRecord>, schema: Schema) -> Table {
    Table {
        records,
        columns: schema.into_names(),
    }
}

impl Table {
    /// One row of cells per record, aligned with `columns`.
    /// A column the record lacks is an empty cell.
    pub fn rows(&self) -> impl Iterator<Item = Vec<&str>> + '_ {
        self.records.iter().map(|record| {
            let fields: HashMap<String, &str> = record.fields().into_iter().collect();
            self.columns
                .iter()
                .map(|col| fields.get(col).copied().unwrap_or(""))
                .collect()
        })
    }

    /// Write a header and every row, all cells quoted.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .from_writer(writer);

        wtr.write_record(&self.columns)?;
        for row in self.rows() {
            wtr.write_record(&row)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Write `table` to `path`, creating parent directories as needed.
pub fn write_table(path: &Path, table: &Table) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Could not create dir {:?}", parent))?;
    }

    let file = std::fs::File::create(path)
        .with_context(|| format!("Could not create {:?}", path))?;
    table
        .write_csv(file)
        .with_context(|| format!("Failed to write {:?}", path))?;

    info!(
        "Wrote {} rows x {} columns to {:?}",
        table.records.len(),
        table.columns.len(),
        path
    );
    Ok(())
}
