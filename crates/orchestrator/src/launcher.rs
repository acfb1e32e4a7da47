//! The fixed-cadence launcher.
//!
//! Scans every registered group and spins up a coordinator when the group's
//! schedule is live and its preconditions hold. Precondition warnings are
//! edge-triggered: one notice per failure episode, re-armed once the group
//! validates again.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use classworks_core::{
    AgentDirectory, AgentId, FacilityDirectory, GroupId, GroupRegistry, ScheduleRegistry,
    Settings,
};
use events::{Event, EventBus};

use crate::coordinator::SessionCoordinator;
use crate::validation::validate_session_status;

#[derive(Debug, Default, Clone)]
pub struct SessionLauncher {
    /// Groups whose last validation failed; cleared when they pass again.
    warned: HashSet<GroupId>,
}

impl SessionLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// One launch pass. Returns the freshly created coordinators; the engine
    /// owns inserting them into its registry.
    #[allow(clippy::too_many_arguments)]
    pub fn scan(
        &mut self,
        registry: &mut GroupRegistry,
        schedule: &mut ScheduleRegistry,
        settings: &Settings,
        agents: &mut dyn AgentDirectory,
        facilities: &dyn FacilityDirectory,
        bus: &EventBus,
        now: u64,
        coordinators: &HashMap<GroupId, SessionCoordinator>,
    ) -> Vec<SessionCoordinator> {
        let mut busy: HashSet<AgentId> = coordinators
            .values()
            .flat_map(|coordinator| coordinator.members().iter().copied())
            .collect();
        let mut launched = Vec::new();
        let hour = settings.hour_of_day(now);

        for id in registry.group_ids() {
            self.run_lifecycle(registry, schedule, agents, id);

            let Some(group) = registry.group(id).cloned() else {
                continue;
            };
            if group.suspended {
                continue;
            }
            if !schedule.is_scheduled_for(group.teacher, id, hour) {
                continue;
            }
            if coordinators.contains_key(&id) {
                debug!(group_id = %id, "Coordinator already running");
                continue;
            }
            if busy.contains(&group.teacher) {
                debug!(group_id = %id, "Teacher already held by another session");
                continue;
            }

            let report = validate_session_status(registry, &*agents, facilities, &group);
            if let Some(reason) = report.reason() {
                if self.warned.insert(id) {
                    warn!(group_id = %id, %reason, "Session cannot launch");
                    bus.emit(Event::PreconditionFailed {
                        group_id: id,
                        name: group.name.clone(),
                        reason: reason.to_string(),
                    });
                }
                continue;
            }
            self.warned.remove(&id);

            self.evict_squatters(registry, agents, facilities, &group.id);

            info!(group_id = %id, name = %group.name, "Launching session");
            bus.emit(Event::SessionLaunched {
                group_id: id,
                name: group.name.clone(),
            });
            busy.insert(group.teacher);
            launched.push(SessionCoordinator::new(&group));
        }
        launched
    }

    /// Subject-driven roster upkeep, run for every group on cadence whether
    /// or not it launches (childcare drops students that aged out).
    fn run_lifecycle(
        &self,
        registry: &mut GroupRegistry,
        schedule: &mut ScheduleRegistry,
        agents: &dyn AgentDirectory,
        id: GroupId,
    ) {
        let Some(group) = registry.group(id) else {
            return;
        };
        let ejected = group.subject.lifecycle_ejections(agents, &group.students);
        if ejected.is_empty() {
            return;
        }
        let window = group.window;
        if let Some(stored) = registry.group_mut(id) {
            for agent in &ejected {
                stored.remove_student(*agent);
                info!(group_id = %id, agent = %agent, "Student left the session group");
            }
        }
        schedule.clear_schedule(window, &ejected);
    }

    /// When the classroom restricts its stations, force-interrupt any
    /// non-member currently occupying one.
    fn evict_squatters(
        &self,
        registry: &GroupRegistry,
        agents: &mut dyn AgentDirectory,
        facilities: &dyn FacilityDirectory,
        id: &GroupId,
    ) {
        let Some(group) = registry.group(*id) else {
            return;
        };
        let Some(classroom) = registry.classroom(group.classroom) else {
            return;
        };
        if !classroom.restrict_stations {
            return;
        }
        for station in
            facilities.linked_stations(classroom.fixture, group.subject.station_kind())
        {
            if let Some(occupant) = facilities.occupant(station) {
                if !group.is_member(occupant) {
                    debug!(group_id = %id, agent = %occupant, "Evicting station squatter");
                    agents.interrupt(occupant);
                }
            }
        }
    }
}
