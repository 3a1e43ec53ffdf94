//! Conversation state tag.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{StateMachine, ValidationError};

/// Where a conversation currently sits in the intake flow.
///
/// A missing record is equivalent to `Init`. Termination is an action,
/// not a state: the record is archived and deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntakeState {
    #[default]
    Init,
    Collecting,
    ConfirmAnalysis,
    /// Only found on records written by the older synchronous flow.
    Analyzing,
    PostAnalysis,
}

impl IntakeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntakeState::Init => "INIT",
            IntakeState::Collecting => "COLLECTING",
            IntakeState::ConfirmAnalysis => "CONFIRM_ANALYSIS",
            IntakeState::Analyzing => "ANALYZING",
            IntakeState::PostAnalysis => "POST_ANALYSIS",
        }
    }
}

impl fmt::Display for IntakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntakeState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INIT" => Ok(IntakeState::Init),
            "COLLECTING" => Ok(IntakeState::Collecting),
            "CONFIRM_ANALYSIS" => Ok(IntakeState::ConfirmAnalysis),
            "ANALYZING" => Ok(IntakeState::Analyzing),
            "POST_ANALYSIS" => Ok(IntakeState::PostAnalysis),
            other => Err(ValidationError::invalid_format(
                "state",
                format!("unknown state tag '{}'", other),
            )),
        }
    }
}

impl StateMachine for IntakeState {
    fn valid_transitions(&self) -> Vec<Self> {
        use IntakeState::*;
        match self {
            Init => vec![Collecting],
            // A deferred analysis may land after the user resumed talking.
            Collecting => vec![Collecting, ConfirmAnalysis, PostAnalysis],
            // Stays put while the deferred job runs; the job moves it on.
            ConfirmAnalysis => vec![ConfirmAnalysis, Collecting, PostAnalysis],
            Analyzing => vec![Analyzing, Collecting, PostAnalysis],
            PostAnalysis => vec![Collecting, PostAnalysis],
        }
    }
}
