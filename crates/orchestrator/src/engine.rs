//! The per-world session engine.
//!
//! One `SessionEngine` is constructed per simulated world and passed
//! everything it needs explicitly — there is no global registry. The host
//! calls `tick` from its own loop and the CRUD surface from its UI; world
//! access arrives through the two directory traits each call.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use classworks_core::{
    AgentDirectory, AgentId, ClassroomId, FacilityDirectory, FixtureId, GroupId, GroupRegistry,
    RejectReason, ScheduleRegistry, ScheduleWindow, SessionGroup, Settings, Subject,
};
use events::{Event, EventBus};

use crate::coordinator::{SessionCoordinator, TickCtx};
use crate::error::{OrchestratorError, Result};
use crate::launcher::SessionLauncher;
use crate::roles::{role_eligibility, RoleId};
use crate::state_machine::{SessionState, SessionTrigger};
use crate::validation::validate_prerequisites;

/// Authoring input for a new session group.
#[derive(Debug, Clone)]
pub struct CreateGroupRequest {
    pub name: String,
    pub teacher: AgentId,
    pub students: Vec<AgentId>,
    pub subject: Subject,
    /// Completion goal; defaults to the subject's preset when absent.
    pub goal: Option<f32>,
    pub window: ScheduleWindow,
    pub classroom: ClassroomId,
}

/// The persistent slice of engine state. Coordinators are deliberately not
/// part of it; the launcher rebuilds them from group state after a reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSave {
    pub registry: GroupRegistry,
    pub schedule: ScheduleRegistry,
}

pub struct SessionEngine {
    registry: GroupRegistry,
    schedule: ScheduleRegistry,
    coordinators: HashMap<GroupId, SessionCoordinator>,
    launcher: SessionLauncher,
    settings: Settings,
    bus: EventBus,
}

impl SessionEngine {
    pub fn new(settings: Settings) -> Self {
        let schedule = ScheduleRegistry::new(&settings);
        Self {
            registry: GroupRegistry::new(),
            schedule,
            coordinators: HashMap::new(),
            launcher: SessionLauncher::new(),
            settings,
            bus: EventBus::new(),
        }
    }

    /// Rebuild an engine from persisted state. Active sessions are not
    /// restored; the next launch scan recreates them where schedules still
    /// apply.
    pub fn restore(settings: Settings, save: WorldSave) -> Self {
        Self {
            registry: save.registry,
            schedule: save.schedule,
            coordinators: HashMap::new(),
            launcher: SessionLauncher::new(),
            settings,
            bus: EventBus::new(),
        }
    }

    pub fn save(&self) -> WorldSave {
        WorldSave {
            registry: self.registry.clone(),
            schedule: self.schedule.clone(),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &GroupRegistry {
        &self.registry
    }

    pub fn schedule(&self) -> &ScheduleRegistry {
        &self.schedule
    }

    pub fn group(&self, id: GroupId) -> Option<&SessionGroup> {
        self.registry.group(id)
    }

    pub fn has_active_session(&self, id: GroupId) -> bool {
        self.coordinators.contains_key(&id)
    }

    pub fn session_state(&self, id: GroupId) -> Option<SessionState> {
        self.coordinators.get(&id).map(|c| c.state())
    }

    /// Advance the engine by one host tick. Runs the launch scan on its
    /// cadence, then every live coordinator (supervisory check strictly
    /// before duty logic inside each), then reaps ended sessions.
    pub fn tick(
        &mut self,
        now: u64,
        agents: &mut dyn AgentDirectory,
        facilities: &dyn FacilityDirectory,
    ) {
        if now % self.settings.launch_interval == 0 {
            let launched = self.launcher.scan(
                &mut self.registry,
                &mut self.schedule,
                &self.settings,
                agents,
                facilities,
                &self.bus,
                now,
                &self.coordinators,
            );
            for coordinator in launched {
                self.coordinators.insert(coordinator.group_id(), coordinator);
            }
        }

        let ids: Vec<GroupId> = self.coordinators.keys().copied().collect();
        for id in ids {
            let busy_elsewhere: HashSet<AgentId> = self
                .coordinators
                .iter()
                .filter(|(other, _)| **other != id)
                .flat_map(|(_, c)| c.members().iter().copied())
                .collect();
            let Some(mut coordinator) = self.coordinators.remove(&id) else {
                continue;
            };
            {
                let mut ctx = TickCtx {
                    registry: &mut self.registry,
                    schedule: &self.schedule,
                    settings: &self.settings,
                    bus: &self.bus,
                    agents: &mut *agents,
                    facilities,
                    now,
                    busy_elsewhere: &busy_elsewhere,
                };
                coordinator.tick(&mut ctx);
            }
            if coordinator.state() == SessionState::End {
                debug!(group_id = %id, "Session coordinator finished");
                if coordinator.group_removal_pending() {
                    if let Err(error) = self.delete_group(id) {
                        debug!(group_id = %id, %error, "Group was already removed");
                    }
                }
            } else {
                self.coordinators.insert(id, coordinator);
            }
        }
    }

    /// Validate and register a new group, then write its schedule. Returns
    /// the allocated id.
    pub fn create_group(
        &mut self,
        request: CreateGroupRequest,
        agents: &dyn AgentDirectory,
        facilities: &dyn FacilityDirectory,
    ) -> Result<GroupId> {
        if self.registry.classroom(request.classroom).is_none() {
            return Err(OrchestratorError::ClassroomNotFound(request.classroom));
        }
        let goal = request.goal.unwrap_or_else(|| request.subject.default_goal());
        let id = self.registry.allocate_group_id();
        let group = SessionGroup::new(
            id,
            request.name,
            request.teacher,
            request.students,
            request.subject,
            goal,
            request.window,
            request.classroom,
        );

        if let Some(reason) = group.validate().reason() {
            return Err(OrchestratorError::Validation(reason.clone()));
        }
        let teacher_report =
            role_eligibility(&self.registry, agents, &group, group.teacher, RoleId::Teacher);
        if let Some(reason) = teacher_report.reason() {
            return Err(OrchestratorError::Validation(reason.clone()));
        }
        for student in &group.students {
            let report =
                role_eligibility(&self.registry, agents, &group, *student, RoleId::Student);
            if let Some(reason) = report.reason() {
                return Err(OrchestratorError::Validation(reason.clone()));
            }
        }
        if let Some(reason) = validate_prerequisites(&self.registry, facilities, &group)
            .reason()
        {
            return Err(OrchestratorError::Validation(reason.clone()));
        }

        self.schedule
            .apply_schedule(id, group.window, &group.participants());
        self.bus.emit(Event::GroupCreated {
            group_id: id,
            name: group.name.clone(),
        });
        self.registry.add_group(group);
        Ok(id)
    }

    /// Remove a group and revert its schedule rows. A live session for it is
    /// cancelled cooperatively at its next tick.
    pub fn remove_group(&mut self, id: GroupId) -> Result<()> {
        if let Some(coordinator) = self.coordinators.get_mut(&id) {
            coordinator.post(SessionTrigger::Cancelled(
                "the session group was removed".to_string(),
            ));
        }
        self.delete_group(id)
    }

    fn delete_group(&mut self, id: GroupId) -> Result<()> {
        let group = self
            .registry
            .remove_group(id)
            .ok_or(OrchestratorError::GroupNotFound(id))?;
        self.schedule
            .clear_schedule(group.window, &group.participants());
        self.schedule.scrub_group(id);
        self.bus.emit(Event::GroupRemoved {
            group_id: id,
            name: group.name,
        });
        Ok(())
    }

    /// Move a group to a new window. Fails on a conflict with any other
    /// group a participant is committed to.
    pub fn reschedule_group(&mut self, id: GroupId, window: ScheduleWindow) -> Result<()> {
        let group = self
            .registry
            .group(id)
            .ok_or(OrchestratorError::GroupNotFound(id))?
            .clone();
        for participant in group.participants() {
            for other in self.registry.groups() {
                if other.id != id
                    && other.is_member(participant)
                    && ScheduleRegistry::has_conflict(window, other.window)
                {
                    return Err(OrchestratorError::Validation(
                        RejectReason::ScheduleConflict {
                            group_id: other.id,
                            group_name: other.name.clone(),
                            start_hour: other.window.start_hour,
                            end_hour: other.window.end_hour,
                        },
                    ));
                }
            }
        }
        self.schedule
            .clear_schedule(group.window, &group.participants());
        if let Some(stored) = self.registry.group_mut(id) {
            stored.window = window;
        }
        self.schedule
            .apply_schedule(id, window, &group.participants());
        info!(group_id = %id, start = window.start_hour, end = window.end_hour, "Group rescheduled");
        Ok(())
    }

    /// Suspend launches for a group; a running session is cancelled
    /// cooperatively.
    pub fn suspend_group(&mut self, id: GroupId) -> Result<()> {
        let group = self
            .registry
            .group_mut(id)
            .ok_or(OrchestratorError::GroupNotFound(id))?;
        group.suspended = true;
        if let Some(coordinator) = self.coordinators.get_mut(&id) {
            coordinator.post(SessionTrigger::Cancelled(
                "the session group was suspended".to_string(),
            ));
        }
        Ok(())
    }

    pub fn resume_group(&mut self, id: GroupId) -> Result<()> {
        let group = self
            .registry
            .group_mut(id)
            .ok_or(OrchestratorError::GroupNotFound(id))?;
        group.suspended = false;
        Ok(())
    }

    /// Replace a group's roster from a picker result and rewrite schedules
    /// for the old and new participant sets.
    pub fn apply_roster(
        &mut self,
        id: GroupId,
        teacher: AgentId,
        students: Vec<AgentId>,
    ) -> Result<()> {
        let group = self
            .registry
            .group(id)
            .ok_or(OrchestratorError::GroupNotFound(id))?
            .clone();
        self.schedule
            .clear_schedule(group.window, &group.participants());
        if let Some(stored) = self.registry.group_mut(id) {
            stored.teacher = teacher;
            stored.students.clear();
            for student in students {
                stored.add_student(student);
            }
        }
        let participants = self
            .registry
            .group(id)
            .map(|g| g.participants())
            .unwrap_or_default();
        self.schedule.apply_schedule(id, group.window, &participants);
        Ok(())
    }

    /// Pure data hook for subject reconfiguration: swap subject and/or goal
    /// on the stored group.
    pub fn configure_subject(
        &mut self,
        id: GroupId,
        subject: Subject,
        goal: Option<f32>,
    ) -> Result<()> {
        let group = self
            .registry
            .group_mut(id)
            .ok_or(OrchestratorError::GroupNotFound(id))?;
        group.goal = goal.unwrap_or_else(|| subject.default_goal());
        group.subject = subject;
        Ok(())
    }

    pub fn add_classroom(&mut self, name: impl Into<String>, fixture: FixtureId) -> ClassroomId {
        self.registry.add_classroom(name, fixture)
    }

    /// Remove a classroom; every group held in it goes too, schedules
    /// included.
    pub fn remove_classroom(&mut self, id: ClassroomId) -> Result<()> {
        if self.registry.classroom(id).is_none() {
            return Err(OrchestratorError::ClassroomNotFound(id));
        }
        let orphaned = self.registry.remove_classroom(id);
        for group_id in &orphaned {
            if let Some(coordinator) = self.coordinators.get_mut(group_id) {
                coordinator.post(SessionTrigger::Cancelled(
                    "the classroom was removed".to_string(),
                ));
            }
            self.schedule.scrub_group(*group_id);
        }
        self.bus.emit(Event::ClassroomRemoved {
            classroom_id: id,
            orphaned_groups: orphaned,
        });
        Ok(())
    }

    /// Host report: the teacher finished operating a manual signal device.
    pub fn post_bell_rung(&mut self, id: GroupId) -> Result<()> {
        let coordinator = self
            .coordinators
            .get_mut(&id)
            .ok_or(OrchestratorError::NoActiveSession(id))?;
        self.bus.emit(Event::BellRung {
            group_id: id,
            automatic: false,
        });
        coordinator.post(SessionTrigger::BellRung);
        Ok(())
    }

    /// Host-posted cancellation, consumed at the session's next tick.
    pub fn cancel_session(&mut self, id: GroupId, reason: impl Into<String>) -> Result<()> {
        let coordinator = self
            .coordinators
            .get_mut(&id)
            .ok_or(OrchestratorError::NoActiveSession(id))?;
        coordinator.post(SessionTrigger::Cancelled(reason.into()));
        Ok(())
    }

    /// Explicit external removal of a participant (death, emigration). The
    /// supervisory check picks up the consequences next tick.
    pub fn remove_participant(&mut self, id: GroupId, agent: AgentId) -> Result<()> {
        let group = self
            .registry
            .group_mut(id)
            .ok_or(OrchestratorError::GroupNotFound(id))?;
        if group.teacher == agent {
            // The group keeps its teacher slot for the UI to refill; the
            // running session cannot continue without one.
            if let Some(coordinator) = self.coordinators.get_mut(&id) {
                coordinator.post(SessionTrigger::Cancelled(
                    "the teacher was removed from the group".to_string(),
                ));
            }
            return Ok(());
        }
        let removed = group.remove_student(agent);
        let window = group.window;
        if removed {
            self.schedule.clear_schedule(window, &[agent]);
        }
        Ok(())
    }
}
