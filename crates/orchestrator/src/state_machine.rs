//! The session state machine.
//!
//! A session is RingBell → Instruct → End with End terminal. Triggers are a
//! closed enum; the cancellation trigger carries a human-readable diagnostic
//! payload but dispatch never depends on it.

use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    RingBell,
    Instruct,
    End,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RingBell => "ring_bell",
            Self::Instruct => "instruct",
            Self::End => "end",
        }
    }
}

/// What moved the session. `Cancelled` keeps the surfaced reason purely as
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTrigger {
    BellRung,
    Completed,
    ScheduleEnded,
    Cancelled(String),
    TeacherIncapacitated,
}

impl SessionTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BellRung => "bell_rung",
            Self::Completed => "completed",
            Self::ScheduleEnded => "schedule_ended",
            Self::Cancelled(_) => "cancelled",
            Self::TeacherIncapacitated => "teacher_incapacitated",
        }
    }
}

pub struct SessionStateMachine;

impl SessionStateMachine {
    /// Target state for a trigger, or `None` when the trigger is ignored in
    /// the current state.
    pub fn next_state_for(from: SessionState, trigger: &SessionTrigger) -> Option<SessionState> {
        match (from, trigger) {
            (SessionState::RingBell, SessionTrigger::BellRung) => Some(SessionState::Instruct),
            (SessionState::RingBell, SessionTrigger::ScheduleEnded)
            | (SessionState::RingBell, SessionTrigger::Cancelled(_))
            | (SessionState::RingBell, SessionTrigger::TeacherIncapacitated) => {
                Some(SessionState::End)
            }
            (SessionState::Instruct, SessionTrigger::Completed)
            | (SessionState::Instruct, SessionTrigger::ScheduleEnded)
            | (SessionState::Instruct, SessionTrigger::Cancelled(_))
            | (SessionState::Instruct, SessionTrigger::TeacherIncapacitated) => {
                Some(SessionState::End)
            }
            _ => None,
        }
    }

    pub fn allowed_transitions(from: SessionState) -> Vec<SessionState> {
        match from {
            SessionState::RingBell => vec![SessionState::Instruct, SessionState::End],
            SessionState::Instruct => vec![SessionState::End],
            SessionState::End => vec![],
        }
    }

    pub fn validate_transition(from: SessionState, to: SessionState) -> Result<()> {
        if Self::allowed_transitions(from).contains(&to) {
            Ok(())
        } else {
            Err(OrchestratorError::InvalidTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }

    pub fn can_transition(from: SessionState, to: SessionState) -> bool {
        Self::validate_transition(from, to).is_ok()
    }
}
