//! Readers turning each kind of flag-command source into [`FlagCommands`].

pub mod table;
pub mod text;
pub mod xml;

use std::path::PathBuf;

use thiserror::Error;

pub use table::TableReader;
pub use text::{CmdListReader, TextFileReader};
pub use xml::AsdmReader;

use crate::{list::ListMode, record::FlagCommands, table::FlagCmdTableError};

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Error reading flag commands from the FLAG_CMD table: {0}")]
    Table(#[from] FlagCmdTableError),

    #[error("Error reading {path}: {source}")]
    IO {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} is not valid XML: {message}")]
    Xml { path: PathBuf, message: String },
}

/// A source of flag commands. Malformed individual commands are skipped with a
/// warning; only problems with the source as a whole are errors.
pub trait FlagCmdRead {
    fn read_flag_cmds(&mut self) -> Result<FlagCommands, ReadError>;

    /// How commands from this source are best listed.
    fn list_mode(&self) -> ListMode;
}
