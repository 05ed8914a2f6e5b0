//! The error type of this crate's top-level operations.

use thiserror::Error;

use crate::{
    agents::AgentError,
    engine::EngineError,
    modes::CoercionError,
    ms::MsError,
    parse::ParseError,
    persist::PersistError,
    plot::PlotError,
    read::ReadError,
    table::FlagCmdTableError,
    time::TimeError,
    versions::VersionError,
};

#[derive(Error, Debug)]
pub enum FlagCmdError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error(transparent)]
    Time(#[from] TimeError),

    #[error(transparent)]
    Table(#[from] FlagCmdTableError),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Ms(#[from] MsError),

    #[error(transparent)]
    Plot(#[from] PlotError),
}
