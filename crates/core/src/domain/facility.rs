//! Facility identities and the reservation/workstation directory trait.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::AgentId;

/// A map/level in the host world.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SiteId(pub Uuid);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A placed building or installation (board, desk, bell).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FixtureId(pub Uuid);

impl fmt::Display for FixtureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Kinds of workstation a subject can hold its lessons at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StationKind {
    Desk,
    SparringMat,
    ShootingRange,
}

/// A bell or comparable signal mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalDevice {
    pub id: FixtureId,
    pub site: SiteId,
    pub automatic: bool,
    pub powered: bool,
}

impl SignalDevice {
    /// Automatic devices only ring while powered.
    pub fn rings_automatically(&self) -> bool {
        self.automatic && self.powered
    }
}

/// The host's view of placed facilities and their linkage.
///
/// Occupancy is owned by the host's reservation system; the engine only
/// queries it and asks for interruptions through the agent directory.
pub trait FacilityDirectory {
    /// Fixture still exists, is placed, and is not walled off.
    fn fixture_usable(&self, fixture: FixtureId) -> bool;
    fn fixture_site(&self, fixture: FixtureId) -> Option<SiteId>;
    /// Workstations of the given kind linked to the instructional fixture.
    fn linked_stations(&self, fixture: FixtureId, kind: StationKind) -> Vec<FixtureId>;
    fn signal_devices(&self, site: SiteId) -> Vec<SignalDevice>;
    /// Agent currently using/reserving the station, if any.
    fn occupant(&self, station: FixtureId) -> Option<AgentId>;
    /// Learning modifier of the room around the fixture (board quality,
    /// projectors). Neutral is 1.0.
    fn environment_modifier(&self, fixture: FixtureId) -> f32;
}
