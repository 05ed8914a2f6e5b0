use std::path::Path;

use itertools::Itertools;
use log::{debug, info, trace};

use super::{AgentStats, EngineError, FlagEngine, RunStats};
use crate::{
    agents::AgentDescriptor,
    selection::SelectionUnion,
    versions::{FlagVersion, FlagVersionList, FlagVersionStore, VersionError},
};

/// An engine that records what it's asked to do, but doesn't touch any flags.
/// Flag versions are only bookkeeping.
#[derive(Debug, Default)]
pub struct DryRunEngine {
    versions: FlagVersionList,
    union: Option<SelectionUnion>,
    agents: Vec<AgentDescriptor>,

    /// Agents with these names are refused at registration.
    refuse: Vec<String>,

    initialised: bool,
    runs: usize,
}

impl DryRunEngine {
    pub fn in_memory() -> DryRunEngine {
        DryRunEngine::default()
    }

    /// Keep the flag version list in `versions_dir` (e.g.
    /// `<vis>.flagversions`).
    pub fn with_version_dir<P: AsRef<Path>>(versions_dir: P) -> Result<DryRunEngine, VersionError> {
        Ok(DryRunEngine {
            versions: FlagVersionList::load(versions_dir)?,
            ..Default::default()
        })
    }

    /// Refuse to register the agents with these names.
    pub fn refusing(mut self, names: &[&str]) -> Self {
        self.refuse = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// The agents registered so far, in order.
    pub fn agents(&self) -> &[AgentDescriptor] {
        &self.agents
    }

    pub fn union(&self) -> Option<&SelectionUnion> {
        self.union.as_ref()
    }

    pub fn num_runs(&self) -> usize {
        self.runs
    }
}

impl FlagVersionStore for DryRunEngine {
    fn list_versions(&self) -> Result<Vec<FlagVersion>, VersionError> {
        self.versions.list_versions()
    }

    fn save_version(&mut self, name: &str, comment: &str) -> Result<(), VersionError> {
        self.versions.save_version(name, comment)
    }

    fn restore_version(&mut self, name: &str) -> Result<(), VersionError> {
        self.versions.restore_version(name)
    }

    fn rename_version(&mut self, old: &str, new: &str, comment: &str) -> Result<(), VersionError> {
        self.versions.rename_version(old, new, comment)
    }
}

impl FlagEngine for DryRunEngine {
    fn select_data(&mut self, union: &SelectionUnion) -> Result<(), EngineError> {
        debug!("Selecting data: {union}");
        self.union = Some(union.clone());
        Ok(())
    }

    fn register_agent(&mut self, agent: &AgentDescriptor) -> Result<(), EngineError> {
        if agent.name.is_empty() {
            return Err(EngineError::InvalidDescriptor {
                name: agent.name.clone(),
                reason: "agents must have a name".to_string(),
            });
        }
        if self.agents.iter().any(|a| a.name == agent.name) {
            return Err(EngineError::InvalidDescriptor {
                name: agent.name.clone(),
                reason: "an agent with this name is already registered".to_string(),
            });
        }
        if self.refuse.contains(&agent.name) {
            return Err(EngineError::Rejected {
                name: agent.name.clone(),
                reason: "refused".to_string(),
            });
        }
        trace!(
            "Registered {} (apply={}): {} {}",
            agent.name,
            agent.apply,
            agent
                .selection
                .iter()
                .map(|(k, v)| format!("{}='{v}'", k.as_str()))
                .join(" "),
            agent
                .params
                .to_pairs()
                .into_iter()
                .map(|(k, v)| format!("{k}={v}"))
                .join(" ")
        );
        self.agents.push(agent.clone());
        Ok(())
    }

    fn init(&mut self) -> Result<(), EngineError> {
        self.initialised = true;
        Ok(())
    }

    fn run(&mut self, write_flags: bool) -> Result<RunStats, EngineError> {
        if !self.initialised {
            return Err(EngineError::Failed(
                "run was called before init".to_string(),
            ));
        }
        self.runs += 1;
        if !write_flags {
            info!("Not writing flags");
        }
        info!("Dry run of {} agents; no flags are changed", self.agents.len());
        Ok(RunStats {
            agents: self
                .agents
                .iter()
                .map(|a| AgentStats {
                    name: a.name.clone(),
                    num_flagged: 0,
                    num_unflagged: 0,
                })
                .collect(),
        })
    }

    fn done(&mut self) -> Result<(), EngineError> {
        self.initialised = false;
        Ok(())
    }
}
