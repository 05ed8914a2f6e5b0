//! Turning flag commands into agents for the flagging engine.

use indicatif::ProgressBar;
use log::{debug, warn};
use thiserror::Error;

use crate::{
    engine::{EngineError, FlagEngine},
    modes::{CoercionError, FlagMode, ModeParams},
    record::{FlagCommandRecord, FlagCommands},
    selection::Selection,
};

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Flag command {id}: {source}")]
    Coercion { id: usize, source: CoercionError },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Everything the engine needs to run one flag command.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentDescriptor {
    /// Mode and record id, e.g. "Quack_3".
    pub name: String,
    pub selection: Selection,
    pub params: ModeParams,

    /// Flag (true) or unflag (false) the selected data.
    pub apply: bool,
}

impl AgentDescriptor {
    pub fn mode(&self) -> FlagMode {
        self.params.mode()
    }
}

/// The agents that were registered, and the commands that should be saved
/// because of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registered {
    pub descriptors: Vec<AgentDescriptor>,

    /// The ids of the records whose agents were accepted and that were not
    /// merely re-applied.
    pub valid: Vec<usize>,
}

/// Build the descriptor for one record. `single` is set when the record is
/// the only one in the batch; its data selection is then left to the engine's
/// working-set narrowing.
pub fn describe(
    record: &FlagCommandRecord,
    apply: bool,
    single: bool,
) -> Result<AgentDescriptor, CoercionError> {
    let params = ModeParams::coerce(record.effective_mode(), &record.params)?;
    let selection = if single {
        record.selection.without_data_selection()
    } else {
        record.selection.clone()
    };
    Ok(AgentDescriptor {
        name: format!("{}_{}", params.mode().capitalised(), record.id),
        selection,
        params,
        apply,
    })
}

/// Register an agent for each of `flag_cmds`, in ascending id order.
///
/// When unapplying (`apply` is false) with `unapply_rows`, only those rows are
/// unapplied; other commands that were applied are re-applied, and other
/// commands that weren't are skipped.
///
/// An illegal mode parameter stops everything. Agents registered before then
/// stay registered. An agent refused by the engine is skipped.
pub fn register_agents<E: FlagEngine + ?Sized>(
    engine: &mut E,
    flag_cmds: &FlagCommands,
    unapply_rows: &[usize],
    apply: bool,
    progress: Option<&ProgressBar>,
) -> Result<Registered, AgentError> {
    let mut registered = Registered::default();
    if flag_cmds.is_empty() {
        warn!("There are no flag commands to set up");
        return Ok(registered);
    }
    let single = flag_cmds.len() == 1;

    for (&id, record) in flag_cmds {
        let mut agent_apply = apply;
        let mut newly_valid = true;
        if !apply && !unapply_rows.is_empty() {
            if unapply_rows.contains(&id) {
                agent_apply = false;
            } else if !record.applied {
                debug!("Skipping {id}; it isn't applied and wasn't selected to unapply");
                if let Some(pb) = progress {
                    pb.inc(1);
                }
                continue;
            } else {
                // Re-affirm flags that stay applied.
                agent_apply = true;
                newly_valid = false;
            }
        }

        let descriptor = describe(record, agent_apply, single)
            .map_err(|source| AgentError::Coercion { id, source })?;
        debug!(
            "Parsing parameters of mode {} in row {id}",
            descriptor.mode()
        );

        match engine.register_agent(&descriptor) {
            Ok(()) => {
                if newly_valid {
                    registered.valid.push(id);
                }
                registered.descriptors.push(descriptor);
            }
            Err(e @ EngineError::Rejected { .. }) => warn!("{e}; skipping it"),
            Err(e) => return Err(e.into()),
        }
        if let Some(pb) = progress {
            pb.inc(1);
        }
    }

    debug!("Valid commands: {:?}", registered.valid);
    Ok(registered)
}
