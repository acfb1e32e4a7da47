use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::FixtureId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassroomId(pub u64);

impl fmt::Display for ClassroomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "classroom_{}", self.0)
    }
}

/// A room anchored to an instructional fixture. Several session groups can
/// share one classroom at different hours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classroom {
    pub id: ClassroomId,
    pub name: String,
    /// The board or comparable fixture lessons are held at.
    pub fixture: FixtureId,
    /// Force-interrupt non-members squatting on reserved workstations when a
    /// session launches.
    #[serde(default)]
    pub restrict_stations: bool,
    /// Only interrupt activities on the configured allow-list at bell time,
    /// instead of everything.
    #[serde(default)]
    pub gentle_interrupts: bool,
}

impl Classroom {
    pub fn new(id: ClassroomId, name: impl Into<String>, fixture: FixtureId) -> Self {
        Self {
            id,
            name: name.into(),
            fixture,
            restrict_stations: false,
            gentle_interrupts: false,
        }
    }
}
