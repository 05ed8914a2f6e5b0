//! The boundary with the flagging engine, the thing that actually changes the
//! flags of a dataset.

mod dry_run;

pub use dry_run::DryRunEngine;

use thiserror::Error;

use crate::{
    agents::AgentDescriptor,
    selection::SelectionUnion,
    versions::{FlagVersionStore, VersionError},
};

#[derive(Error, Debug)]
pub enum EngineError {
    /// The descriptor can never be run; the whole batch stops.
    #[error("Agent {name} is invalid: {reason}")]
    InvalidDescriptor { name: String, reason: String },

    /// The engine won't run this agent, but the others are fine.
    #[error("Failed to parse parameters of agent {name}: {reason}")]
    Rejected { name: String, reason: String },

    #[error("The flagging engine failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Version(#[from] VersionError),
}

/// What one agent did during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStats {
    pub name: String,
    pub num_flagged: u64,
    pub num_unflagged: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub agents: Vec<AgentStats>,
}

/// A flagging engine. Calls come in this order: [`FlagEngine::select_data`],
/// [`FlagEngine::register_agent`] for each agent (in the order they should
/// run), [`FlagEngine::init`], [`FlagEngine::run`] and [`FlagEngine::done`].
/// Nothing that has been done can be undone through this interface.
pub trait FlagEngine: FlagVersionStore {
    /// Narrow the data the agents will see.
    fn select_data(&mut self, union: &SelectionUnion) -> Result<(), EngineError>;

    fn register_agent(&mut self, agent: &AgentDescriptor) -> Result<(), EngineError>;

    fn init(&mut self) -> Result<(), EngineError>;

    /// Run every registered agent. If `write_flags` is false, the dataset is
    /// left alone.
    fn run(&mut self, write_flags: bool) -> Result<RunStats, EngineError>;

    fn done(&mut self) -> Result<(), EngineError>;
}
