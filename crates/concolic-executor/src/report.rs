//! Serialisable summary of an exploration's terminal states

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

use concrete_interpreter::{ConcreteEnv, EnvDisplay};
use symbolic_engine::{SymState, SymbolicError};

use crate::state::ConcolicState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateStatus {
    Valid,
    Error,
    Infeasible,
}

impl StateStatus {
    pub fn label(self) -> &'static str {
        match self {
            StateStatus::Valid => "valid",
            StateStatus::Error => "error",
            StateStatus::Infeasible => "infeasible",
        }
    }
}

impl fmt::Display for StateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One terminal state, detached from the Z3 context it was built in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateReport {
    pub status: StateStatus,
    /// Concrete witness
    pub concrete: ConcreteEnv,
    /// Variable name -> printed symbolic term
    pub symbolic: BTreeMap<String, String>,
    /// Path condition constraints in the order they were added
    pub path_condition: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smt2: Option<String>,
}

impl StateReport {
    pub fn from_state(state: &ConcolicState<'_>, include_smt2: bool) -> Self {
        Self::build(
            state.status(),
            state.concrete.clone(),
            &state.symbolic,
            include_smt2,
        )
    }

    /// A symbolic state has no witness of its own, one is asked of the
    /// solver. When none is available the concrete map is left empty.
    pub fn from_symbolic(
        state: &mut SymState<'_>,
        include_smt2: bool,
    ) -> Result<Self, SymbolicError> {
        let status = if state.is_error() {
            StateStatus::Error
        } else {
            StateStatus::Valid
        };
        let concrete = match state.pick_concrete_i64()? {
            Some(witness) => witness,
            None => {
                warn!("no i64 witness for symbolic state, concrete values omitted\n{}", state);
                ConcreteEnv::new()
            }
        };
        Ok(Self::build(status, concrete, state, include_smt2))
    }

    fn build(
        status: StateStatus,
        concrete: ConcreteEnv,
        symbolic: &SymState<'_>,
        include_smt2: bool,
    ) -> Self {
        Self {
            status,
            concrete,
            symbolic: symbolic
                .env()
                .iter()
                .map(|(name, term)| (name.clone(), term.to_string()))
                .collect(),
            path_condition: symbolic.path().iter().map(|c| c.to_string()).collect(),
            smt2: include_smt2.then(|| symbolic.to_smt2()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == StateStatus::Valid
    }
}

impl fmt::Display for StateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Concrete State:")?;
        write!(f, "{}", EnvDisplay(&self.concrete))?;
        writeln!(f, "Symbolic State:")?;
        for (name, term) in &self.symbolic {
            writeln!(f, "{}: {}", name, term)?;
        }
        writeln!(f, "pc: [{}]", self.path_condition.join(", "))
    }
}

/// Result of one exploration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExplorationReport {
    /// Terminal states in exploration order
    pub states: Vec<StateReport>,
    pub valid: usize,
    pub errors: usize,
    pub infeasible: usize,
}

impl ExplorationReport {
    pub fn from_states(states: Vec<StateReport>) -> Self {
        let mut report = Self::default();
        for state in &states {
            match state.status {
                StateStatus::Valid => report.valid += 1,
                StateStatus::Error => report.errors += 1,
                StateStatus::Infeasible => report.infeasible += 1,
            }
        }
        report.states = states;
        report
    }

    /// Valid states and invalid states, each in exploration order
    pub fn partition(&self) -> (Vec<&StateReport>, Vec<&StateReport>) {
        self.states.iter().partition(|s| s.is_valid())
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}
