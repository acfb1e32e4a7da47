//! Structured accept/reject results.
//!
//! Validation in this engine never raises: callers get an `Acceptance` and
//! decide what to do with a rejection (show it, cancel a session, skip a
//! candidate). The reason survives as typed data so messages stay uniform.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{CredentialTier, GroupId, SkillId, StationKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Acceptance {
    Accepted,
    Rejected(RejectReason),
}

impl Acceptance {
    pub fn accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn reason(&self) -> Option<&RejectReason> {
        match self {
            Self::Accepted => None,
            Self::Rejected(reason) => Some(reason),
        }
    }

    /// Keep the first rejection, otherwise evaluate the next check.
    pub fn and_then(self, next: impl FnOnce() -> Acceptance) -> Acceptance {
        match self {
            Self::Accepted => next(),
            rejected => rejected,
        }
    }
}

impl From<RejectReason> for Acceptance {
    fn from(reason: RejectReason) -> Self {
        Self::Rejected(reason)
    }
}

/// Why a candidate, group or running session was turned down.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    #[error("already committed to '{group_name}' ({start_hour}:00-{end_hour}:00)")]
    ScheduleConflict {
        group_id: GroupId,
        group_name: String,
        start_hour: u32,
        end_hour: u32,
    },

    #[error("a session group needs a name")]
    EmptyName,
    #[error("a session group needs a teacher")]
    NoTeacher,
    #[error("a session group needs at least one student")]
    NoStudents,

    #[error("only adults can teach")]
    TeacherMustBeAdult,
    #[error("teaching requires a usable social skill")]
    TeacherSocialDisabled,
    #[error("teaching {skill} requires level {required} or better")]
    TeacherUnderqualified { skill: SkillId, required: u32 },
    #[error("teaching this course requires the {required} credential")]
    TeacherLacksCredential { required: CredentialTier },
    #[error("cannot study {skill}: the skill is disabled")]
    StudentSkillDisabled { skill: SkillId },
    #[error("already holds the {tier} credential")]
    StudentAlreadyCertified { tier: CredentialTier },
    #[error("childcare only takes children")]
    StudentMustBeChild,
    #[error("no learning need to satisfy")]
    StudentNoLearningNeed,

    #[error("the classroom fixture is missing or unusable")]
    FixtureMissing,
    #[error("no signal device on this site")]
    NoSignalDevice,
    #[error("not enough workstations: {needed} {kind:?} needed, {present} present")]
    NotEnoughStations {
        kind: StationKind,
        needed: usize,
        present: usize,
    },
    #[error("the teacher is off-site")]
    TeacherOffSite,
    #[error("students are off-site")]
    StudentsOffSite,
    #[error("students no longer qualify")]
    StudentsUnqualified,

    #[error("{0}")]
    Other(String),
}
