//! Saving flag commands to a `FLAG_CMD` table or a text file, and clearing
//! them out again.

use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use log::info;
use thiserror::Error;

use crate::{
    record::{FlagCommandRecord, FlagCommands},
    table::{FlagCmdRow, FlagCmdTable, FlagCmdTableError},
};

#[derive(Error, Debug)]
pub enum PersistError {
    #[error(transparent)]
    Table(#[from] FlagCmdTableError),

    #[error("Error writing lines to file {path}: {source}")]
    IO {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("There is no flag command with id {0} to save")]
    UnknownRecord(usize),
}

fn to_row(record: &FlagCommandRecord, applied: bool) -> FlagCmdRow {
    FlagCmdRow {
        time: record.time,
        interval: record.interval,
        flag_type: record.flag_type.as_str().to_string(),
        reason: record.reason.clone(),
        level: record.level,
        severity: record.severity,
        applied,
        command: record.command_with_default_mode(),
    }
}

fn select<'a>(
    flag_cmds: &'a FlagCommands,
    ids: &[usize],
) -> Result<Vec<&'a FlagCommandRecord>, PersistError> {
    ids.iter()
        .map(|id| flag_cmds.get(id).ok_or(PersistError::UnknownRecord(*id)))
        .collect()
}

/// Append the commands `ids` to `table`, with `APPLIED` set to `applied`.
/// Returns the number of rows written.
pub fn write_to_table(
    table: &mut dyn FlagCmdTable,
    flag_cmds: &FlagCommands,
    ids: &[usize],
    applied: bool,
) -> Result<usize, PersistError> {
    if ids.is_empty() {
        info!("Saved zero rows to FLAG_CMD; no flags found");
        return Ok(0);
    }
    let rows: Vec<FlagCmdRow> = select(flag_cmds, ids)?
        .into_iter()
        .map(|r| to_row(r, applied))
        .collect();
    info!("There are {} rows already in FLAG_CMD", table.num_rows()?);
    table.append(&rows)?;
    info!("Saved {} rows to FLAG_CMD", rows.len());
    Ok(rows.len())
}

/// How a command is written to a text file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandText {
    /// The command with its reason, as listed.
    WithReason,

    /// The command as it goes into `FLAG_CMD`, with `mode='manual'` spelled
    /// out and no reason.
    WithDefaultMode,
}

impl CommandText {
    fn render(self, record: &FlagCommandRecord) -> String {
        match self {
            CommandText::WithReason => record.command_with_reason(),
            CommandText::WithDefaultMode => record.command_with_default_mode(),
        }
    }
}

/// Append the commands `ids` to the text file `path`, one per line.
pub fn append_to_file(
    path: &Path,
    flag_cmds: &FlagCommands,
    ids: &[usize],
    text: CommandText,
) -> Result<usize, PersistError> {
    let records = select(flag_cmds, ids)?;
    let io_err = |source| PersistError::IO {
        path: path.to_path_buf(),
        source,
    };
    info!("Appending flag commands to {}", path.display());
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    for record in &records {
        writeln!(file, "{}", text.render(record)).map_err(io_err)?;
    }
    Ok(records.len())
}

/// Set the `APPLIED` column of the rows `ids`.
pub fn update_applied(
    table: &mut dyn FlagCmdTable,
    ids: &[usize],
    applied: bool,
) -> Result<(), PersistError> {
    if ids.is_empty() {
        return Ok(());
    }
    table.set_applied(ids, applied)?;
    info!("Updated {} rows of FLAG_CMD table in MS", ids.len());
    Ok(())
}

/// Remove the rows `rows` from `table`, or every row if `rows` is empty.
/// Returns how many rows there were beforehand.
pub fn clear(table: &mut dyn FlagCmdTable, rows: &[usize]) -> Result<usize, PersistError> {
    let num_rows = table.num_rows()?;
    info!("There were {num_rows} rows in FLAG_CMD");
    if num_rows == 0 {
        info!("No rows to clear");
        return Ok(0);
    }
    if rows.is_empty() {
        table.remove_all()?;
        info!("Deleted {num_rows} rows from FLAG_CMD table in MS");
    } else {
        table.remove_rows(rows)?;
        info!("Deleted {} rows from FLAG_CMD table in MS", rows.len());
    }
    let left = table.num_rows()?;
    if left > 0 {
        info!("{left} rows are left in FLAG_CMD");
    }
    Ok(num_rows)
}
