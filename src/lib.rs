//! Compile flag commands from a dataset's `FLAG_CMD` table, text files, command
//! lists or ASDM online flags into agents for a flagging engine, and keep the
//! command log and flag versions in step.

pub mod agents;
pub mod dispatch;
pub mod engine;
mod error;
pub mod list;
pub mod modes;
pub mod ms;
pub mod parse;
pub mod persist;
pub mod plot;
pub mod read;
pub mod record;
pub mod selection;
pub mod table;
pub mod time;
pub mod versions;

pub use dispatch::{Action, DispatchOptions, FlagCmdInput, InputMode, Outcome, Session};
pub use error::FlagCmdError;
pub use record::{FlagCommandRecord, FlagCommands};
