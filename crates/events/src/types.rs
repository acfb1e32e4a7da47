//! Event types emitted by the session engine.

use chrono::{DateTime, Utc};
use classworks_core::{ClassroomId, GroupId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping every event with identity and wall-clock metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: Event,
}

impl EventEnvelope {
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// How prominently a consumer should surface an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Caution,
    Negative,
    Positive,
}

/// Everything the engine reports to the outside world.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A session group was authored and scheduled.
    #[serde(rename = "group.created")]
    GroupCreated { group_id: GroupId, name: String },

    /// A session group was removed; its schedule rows are already cleared.
    #[serde(rename = "group.removed")]
    GroupRemoved { group_id: GroupId, name: String },

    /// A classroom was removed together with the listed groups.
    #[serde(rename = "classroom.removed")]
    ClassroomRemoved {
        classroom_id: ClassroomId,
        orphaned_groups: Vec<GroupId>,
    },

    /// The launcher created a coordinator for this group.
    #[serde(rename = "session.launched")]
    SessionLaunched { group_id: GroupId, name: String },

    /// The gathering signal fired.
    #[serde(rename = "session.bell_rung")]
    BellRung { group_id: GroupId, automatic: bool },

    /// The group reached its goal. `graduates` lists every student by name.
    #[serde(rename = "session.completed")]
    SessionCompleted {
        group_id: GroupId,
        name: String,
        graduates: Vec<String>,
    },

    /// The session ended early; `reason` is human-readable.
    #[serde(rename = "session.cancelled")]
    SessionCancelled {
        group_id: GroupId,
        name: String,
        reason: String,
    },

    /// The scheduled window ran out.
    #[serde(rename = "session.expired")]
    SessionExpired { group_id: GroupId, name: String },

    /// The teacher died, went down or broke mid-session.
    #[serde(rename = "session.teacher_lost")]
    TeacherLost {
        group_id: GroupId,
        name: String,
        teacher: String,
    },

    /// Launch preconditions failed; emitted once per failure episode.
    #[serde(rename = "session.precondition_failed")]
    PreconditionFailed {
        group_id: GroupId,
        name: String,
        reason: String,
    },

    /// A finite-goal session started without its full roster.
    #[serde(rename = "session.partial_attendance")]
    PartialAttendance { group_id: GroupId, name: String },

    /// The window ended while the teacher never rang the manual bell.
    #[serde(rename = "session.bell_missed")]
    BellMissed { group_id: GroupId, name: String },

    /// A certification session's window ended without a single active tick.
    #[serde(rename = "session.never_active")]
    SessionNeverActive { group_id: GroupId, name: String },
}

impl Event {
    pub fn severity(&self) -> Severity {
        match self {
            Self::GroupCreated { .. }
            | Self::GroupRemoved { .. }
            | Self::ClassroomRemoved { .. }
            | Self::SessionLaunched { .. }
            | Self::BellRung { .. }
            | Self::SessionExpired { .. } => Severity::Info,
            Self::SessionCompleted { .. } => Severity::Positive,
            Self::PartialAttendance { .. } | Self::PreconditionFailed { .. } => Severity::Caution,
            Self::SessionCancelled { .. }
            | Self::TeacherLost { .. }
            | Self::BellMissed { .. }
            | Self::SessionNeverActive { .. } => Severity::Negative,
        }
    }
}
