//! The per-session coordinator.
//!
//! One coordinator exists per active session, created by the launcher and
//! never persisted; after a reload the launcher rebuilds it from group state.
//! Each tick runs in a fixed order: posted triggers from the previous tick
//! boundary, then the supervisory check, then the current state's duty
//! logic. Membership only changes inside transition actions.

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use classworks_core::{
    ActivityKind, AgentDirectory, AgentId, Duty, FacilityDirectory, FixtureId, GroupId,
    GroupRegistry, ScheduleRegistry, SessionGroup, Settings, SkillId, Subject,
};
use events::{Event, EventBus};

use crate::roles::{role_eligibility, RoleId};
use crate::state_machine::{SessionState, SessionStateMachine, SessionTrigger};
use crate::validation::validate_session_status;

/// Social practice the teacher accrues per actively-taught tick.
const TEACHER_PRACTICE_XP: f32 = 0.1;

/// Borrowed world access for one coordinator tick.
pub struct TickCtx<'a> {
    pub registry: &'a mut GroupRegistry,
    pub schedule: &'a ScheduleRegistry,
    pub settings: &'a Settings,
    pub bus: &'a EventBus,
    pub agents: &'a mut dyn AgentDirectory,
    pub facilities: &'a dyn FacilityDirectory,
    pub now: u64,
    /// Agents currently held by *other* coordinators; they are neither
    /// interrupted nor admitted here.
    pub busy_elsewhere: &'a HashSet<AgentId>,
}

#[derive(Debug)]
pub struct SessionCoordinator {
    group_id: GroupId,
    state: SessionState,
    ticks_in_state: u64,
    /// Teacher plus the students admitted at bell time.
    members: Vec<AgentId>,
    /// Externally posted triggers, consumed at the next tick boundary.
    mailbox: Vec<SessionTrigger>,
    bell_rung: bool,
    ever_fully_attended: bool,
    partial_warning_sent: bool,
    waiting_ticks: u64,
    stations: HashMap<AgentId, FixtureId>,
    taught_skill: Option<SkillId>,
    rng: StdRng,
    remove_group: bool,
}

impl SessionCoordinator {
    pub fn new(group: &SessionGroup) -> Self {
        info!(group_id = %group.id, name = %group.name, "Session coordinator created");
        Self {
            group_id: group.id,
            state: SessionState::RingBell,
            ticks_in_state: 0,
            members: vec![group.teacher],
            mailbox: Vec::new(),
            bell_rung: false,
            ever_fully_attended: false,
            partial_warning_sent: false,
            waiting_ticks: 0,
            stations: HashMap::new(),
            taught_skill: None,
            rng: StdRng::seed_from_u64(group.id.0),
            remove_group: false,
        }
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn ticks_in_state(&self) -> u64 {
        self.ticks_in_state
    }

    pub fn members(&self) -> &[AgentId] {
        &self.members
    }

    /// Group should be deleted once this coordinator is reaped.
    pub fn group_removal_pending(&self) -> bool {
        self.remove_group
    }

    /// Queue a trigger for the next tick boundary. Cancellation is
    /// cooperative: nothing is preempted mid-tick.
    pub fn post(&mut self, trigger: SessionTrigger) {
        self.mailbox.push(trigger);
    }

    /// Advance one tick. Supervisory checks always run before duty logic so
    /// a cancellation is observed before any further accrual.
    pub fn tick(&mut self, ctx: &mut TickCtx<'_>) {
        if self.state == SessionState::End {
            return;
        }

        for trigger in std::mem::take(&mut self.mailbox) {
            if self.state == SessionState::End {
                break;
            }
            self.fire(trigger, ctx);
        }
        if self.state == SessionState::End {
            return;
        }

        if let Some(trigger) = self.supervisory_check(ctx) {
            self.fire(trigger, ctx);
        }

        match self.state {
            SessionState::RingBell => self.ring_bell_tick(ctx),
            SessionState::Instruct => self.instruct_tick(ctx),
            SessionState::End => return,
        }
        self.ticks_in_state += 1;
    }

    /// Why the session must stop right now, if anything.
    fn supervisory_check(&self, ctx: &TickCtx<'_>) -> Option<SessionTrigger> {
        let Some(group) = ctx.registry.group(self.group_id) else {
            return Some(SessionTrigger::Cancelled(
                "the session group no longer exists".to_string(),
            ));
        };
        if !ctx.agents.vitals(group.teacher).fit() {
            return Some(SessionTrigger::TeacherIncapacitated);
        }
        if !self.members.contains(&group.teacher) {
            return Some(SessionTrigger::Cancelled(
                "the teacher left the session".to_string(),
            ));
        }
        let hour = ctx.settings.hour_of_day(ctx.now);
        if !ctx.schedule.is_scheduled_for(group.teacher, self.group_id, hour) {
            return Some(SessionTrigger::ScheduleEnded);
        }
        let report = validate_session_status(&*ctx.registry, &*ctx.agents, ctx.facilities, group);
        report
            .reason()
            .map(|reason| SessionTrigger::Cancelled(reason.to_string()))
    }

    /// Apply a trigger through the transition table, running the pre/post
    /// actions around the state change. Triggers with no matching transition
    /// are dropped.
    fn fire(&mut self, trigger: SessionTrigger, ctx: &mut TickCtx<'_>) {
        let Some(next) = SessionStateMachine::next_state_for(self.state, &trigger) else {
            debug!(
                group_id = %self.group_id,
                state = self.state.as_str(),
                trigger = trigger.as_str(),
                "Trigger ignored in current state"
            );
            return;
        };

        // Pre-actions.
        match (&self.state, &trigger) {
            (SessionState::RingBell, SessionTrigger::BellRung) => {
                self.bell_rung = true;
                self.interrupt_participants(ctx);
            }
            (SessionState::RingBell, SessionTrigger::ScheduleEnded) => {
                self.warn_bell_missed(ctx);
            }
            (SessionState::Instruct, SessionTrigger::ScheduleEnded) => {
                self.warn_never_active(ctx);
            }
            _ => {}
        }

        info!(
            group_id = %self.group_id,
            from = self.state.as_str(),
            to = next.as_str(),
            trigger = trigger.as_str(),
            "Session transition"
        );
        self.state = next;
        self.ticks_in_state = 0;

        // Post-actions.
        match self.state {
            SessionState::Instruct => self.enter_instruct(ctx),
            SessionState::End => self.enter_end(&trigger, ctx),
            SessionState::RingBell => {}
        }
    }

    /// Bell pre-action: stop whatever the participants are doing so the
    /// attend/teach duties can take over. With gentle interruption only the
    /// configured allow-list is broken; ceremonies and protected rest never
    /// are.
    fn interrupt_participants(&self, ctx: &mut TickCtx<'_>) {
        let Some(group) = ctx.registry.group(self.group_id) else {
            return;
        };
        let gentle = ctx
            .registry
            .classroom(group.classroom)
            .map(|classroom| classroom.gentle_interrupts)
            .unwrap_or(false);
        for agent in group.participants() {
            if ctx.busy_elsewhere.contains(&agent) {
                continue;
            }
            let activity = ctx.agents.activity(agent);
            let interruptible = if gentle {
                ctx.settings.interruptible.contains(&activity)
            } else {
                !matches!(activity, ActivityKind::Ceremony | ActivityKind::ProtectedRest)
            };
            if interruptible {
                debug!(group_id = %self.group_id, agent = %agent, "Interrupting for class");
                ctx.agents.interrupt(agent);
            }
        }
    }

    /// Instruct post-action: admit every still-eligible student that is not
    /// already held by another coordinator, reserve stations in roster order,
    /// and hand out duties.
    fn enter_instruct(&mut self, ctx: &mut TickCtx<'_>) {
        let Some(group) = ctx.registry.group(self.group_id).cloned() else {
            return;
        };
        for student in &group.students {
            if self.members.contains(student) || ctx.busy_elsewhere.contains(student) {
                continue;
            }
            let report =
                role_eligibility(ctx.registry, &*ctx.agents, &group, *student, RoleId::Student);
            if report.accepted() {
                debug!(group_id = %self.group_id, student = %student, "Student admitted");
                self.members.push(*student);
            } else if let Some(reason) = report.reason() {
                warn!(
                    group_id = %self.group_id,
                    student = %student,
                    %reason,
                    "Student not admitted"
                );
            }
        }

        let Some(classroom) = ctx.registry.classroom(group.classroom) else {
            return;
        };
        let fixture = classroom.fixture;
        let stations =
            ctx.facilities.linked_stations(fixture, group.subject.station_kind());
        self.stations.clear();
        let roster: Vec<AgentId> = group
            .students
            .iter()
            .copied()
            .filter(|student| self.members.contains(student))
            .collect();
        for (student, station) in roster.iter().zip(stations.iter()) {
            self.stations.insert(*student, *station);
            ctx.agents.set_duty(*student, Duty::Attend { station: *station });
        }
        ctx.agents.set_duty(group.teacher, Duty::Teach { fixture });
    }

    /// Terminal actions: per-cause notices, then unconditional teardown of
    /// duties and membership.
    fn enter_end(&mut self, cause: &SessionTrigger, ctx: &mut TickCtx<'_>) {
        if let Some(group) = ctx.registry.group(self.group_id) {
            match cause {
                SessionTrigger::Completed => {
                    // Rewards and the completion notice were issued at the
                    // moment the goal was detected.
                }
                SessionTrigger::ScheduleEnded => {
                    ctx.bus.emit(Event::SessionExpired {
                        group_id: group.id,
                        name: group.name.clone(),
                    });
                }
                SessionTrigger::Cancelled(reason) => {
                    warn!(group_id = %group.id, reason = %reason, "Session cancelled");
                    ctx.bus.emit(Event::SessionCancelled {
                        group_id: group.id,
                        name: group.name.clone(),
                        reason: reason.clone(),
                    });
                }
                SessionTrigger::TeacherIncapacitated => {
                    ctx.bus.emit(Event::TeacherLost {
                        group_id: group.id,
                        name: group.name.clone(),
                        teacher: ctx.agents.name(group.teacher),
                    });
                    // A dead teacher never comes back; retire the group.
                    if !ctx.agents.vitals(group.teacher).alive {
                        self.remove_group = true;
                    }
                }
                SessionTrigger::BellRung => {}
            }
        }

        for member in &self.members {
            ctx.agents.clear_duty(*member);
        }
        self.members.clear();
        self.stations.clear();
    }

    /// RingBell duty logic: poll for an automatic device on the configured
    /// interval; otherwise send the teacher to a manual one. A missing
    /// device is transient — the session keeps waiting, it does not fail.
    fn ring_bell_tick(&mut self, ctx: &mut TickCtx<'_>) {
        if self.bell_rung {
            return;
        }
        let Some((teacher, site)) = ctx.registry.group(self.group_id).and_then(|group| {
            ctx.registry
                .classroom(group.classroom)
                .and_then(|classroom| ctx.facilities.fixture_site(classroom.fixture))
                .map(|site| (group.teacher, site))
        }) else {
            return;
        };
        let devices = ctx.facilities.signal_devices(site);

        if self.ticks_in_state % ctx.settings.bell_poll_interval == 0 {
            if let Some(device) = devices.iter().find(|device| device.rings_automatically()) {
                info!(group_id = %self.group_id, device = %device.id, "Automatic bell rung");
                ctx.bus.emit(Event::BellRung {
                    group_id: self.group_id,
                    automatic: true,
                });
                self.fire(SessionTrigger::BellRung, ctx);
                return;
            }
        }

        if let Some(manual) = devices.iter().find(|device| !device.automatic) {
            let duty = Duty::RingBell { device: manual.id };
            if ctx.agents.current_duty(teacher) != Some(duty) {
                ctx.agents.set_duty(teacher, duty);
            }
        }
    }

    /// Instruct duty logic: completion first, then attendance bookkeeping,
    /// then accrual and the per-student tick effects.
    fn instruct_tick(&mut self, ctx: &mut TickCtx<'_>) {
        let Some(group) = ctx.registry.group(self.group_id).cloned() else {
            return;
        };

        if group.is_completed() {
            self.complete(&group, ctx);
            return;
        }

        let Some(classroom) = ctx.registry.classroom(group.classroom) else {
            return;
        };
        let environment = ctx.facilities.environment_modifier(classroom.fixture);

        let roster: Vec<AgentId> = group
            .students
            .iter()
            .copied()
            .filter(|student| self.members.contains(student))
            .collect();
        let present: Vec<AgentId> = roster
            .iter()
            .copied()
            .filter(|student| {
                self.stations
                    .get(student)
                    .is_some_and(|station| ctx.agents.is_at(*student, *station))
            })
            .collect();
        let all_present = !roster.is_empty() && present.len() == roster.len();
        if all_present {
            self.ever_fully_attended = true;
        }

        let finite = !group.subject.is_infinite();
        let active = all_present
            || (finite && self.waiting_ticks >= ctx.settings.max_wait_ticks && !present.is_empty());
        if !all_present {
            self.waiting_ticks += 1;
            if active && !self.partial_warning_sent {
                self.partial_warning_sent = true;
                ctx.bus.emit(Event::PartialAttendance {
                    group_id: group.id,
                    name: group.name.clone(),
                });
            }
        }

        if active {
            if finite {
                let per_tick = group.subject.progress_per_tick(
                    &*ctx.agents,
                    group.teacher,
                    environment,
                    ctx.settings,
                );
                if let Some(stored) = ctx.registry.group_mut(self.group_id) {
                    stored.add_progress(per_tick);
                }
            }

            if matches!(group.subject, Subject::Childcare(_))
                && (self.taught_skill.is_none()
                    || self.ticks_in_state % ctx.settings.lesson_reroll_interval == 0)
            {
                self.taught_skill = group.subject.choose_taught_skill(
                    &*ctx.agents,
                    group.teacher,
                    &roster,
                    &mut self.rng,
                );
                debug!(group_id = %self.group_id, skill = ?self.taught_skill, "Lesson skill rolled");
            }

            ctx.agents
                .grant_skill_xp(group.teacher, SkillId::Social, TEACHER_PRACTICE_XP);
            for student in &present {
                group.subject.apply_teaching_tick(
                    ctx.agents,
                    *student,
                    self.taught_skill,
                    environment,
                    ctx.settings,
                );
                group.subject.apply_learning_tick(
                    ctx.agents,
                    group.teacher,
                    *student,
                    environment,
                    ctx.settings,
                );
            }
        }

        // Wayward students drift off once their attend job ends; put them
        // back on task.
        for student in &roster {
            if present.contains(student) {
                continue;
            }
            if ctx.agents.activity(*student) == ActivityKind::Idle {
                if let Some(station) = self.stations.get(student) {
                    ctx.agents.interrupt(*student);
                    ctx.agents.set_duty(*student, Duty::Attend { station: *station });
                }
            }
        }
    }

    /// Goal reached: grant rewards, publish the graduate list, retire the
    /// group, and leave Instruct.
    fn complete(&mut self, group: &SessionGroup, ctx: &mut TickCtx<'_>) {
        info!(group_id = %group.id, name = %group.name, "Session goal reached");
        group
            .subject
            .grant_completion_rewards(ctx.agents, &group.students);
        let graduates = group
            .students
            .iter()
            .map(|student| ctx.agents.name(*student))
            .collect();
        ctx.bus.emit(Event::SessionCompleted {
            group_id: group.id,
            name: group.name.clone(),
            graduates,
        });
        self.remove_group = true;
        self.fire(SessionTrigger::Completed, ctx);
    }

    /// A manual bell existed but the window ran out before the teacher rang
    /// it.
    fn warn_bell_missed(&self, ctx: &mut TickCtx<'_>) {
        if self.bell_rung {
            return;
        }
        let Some(group) = ctx.registry.group(self.group_id) else {
            return;
        };
        let has_manual = ctx
            .registry
            .classroom(group.classroom)
            .and_then(|classroom| ctx.facilities.fixture_site(classroom.fixture))
            .map(|site| {
                ctx.facilities
                    .signal_devices(site)
                    .iter()
                    .any(|device| !device.automatic)
            })
            .unwrap_or(false);
        if has_manual {
            ctx.bus.emit(Event::BellMissed {
                group_id: group.id,
                name: group.name.clone(),
            });
        }
    }

    /// A certification course that never got a single active tick is worth a
    /// louder note than a quiet expiry.
    fn warn_never_active(&self, ctx: &mut TickCtx<'_>) {
        if self.ever_fully_attended {
            return;
        }
        let Some(group) = ctx.registry.group(self.group_id) else {
            return;
        };
        if matches!(group.subject, Subject::Certification(_)) {
            ctx.bus.emit(Event::SessionNeverActive {
                group_id: group.id,
                name: group.name.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classworks_core::testing::{MockAgents, MockFacilities};
    use classworks_core::{ScheduleWindow, StationKind};

    struct Harness {
        agents: MockAgents,
        facilities: MockFacilities,
        registry: GroupRegistry,
        schedule: ScheduleRegistry,
        settings: Settings,
        bus: EventBus,
        group_id: GroupId,
        teacher: AgentId,
        coordinator: SessionCoordinator,
    }

    /// 8:00 sharp, inside the (8, 12) window every harness group uses.
    const IN_WINDOW: u64 = 8 * 2500;

    impl Harness {
        fn new(automatic_bell: bool) -> Self {
            let mut agents = MockAgents::new();
            let mut facilities = MockFacilities::new(agents.site());
            facilities.add_stations(StationKind::Desk, 2);
            facilities.add_device(automatic_bell, automatic_bell);

            let settings = Settings::default();
            let mut registry = GroupRegistry::new();
            let classroom = registry.add_classroom("room", facilities.fixture());
            let teacher = agents.add_adult("teacher");
            agents.set_skill(teacher, SkillId::Social, 40.0);
            agents.set_skill(teacher, SkillId::Cooking, 40.0);
            agents.set_skill(teacher, SkillId::Intellectual, 40.0);
            let students = vec![agents.add_child("a"), agents.add_child("b")];

            let id = registry.allocate_group_id();
            let group = SessionGroup::new(
                id,
                "afternoon cooking",
                teacher,
                students,
                Subject::skill(SkillId::Cooking),
                1000.0,
                ScheduleWindow::new(8, 12),
                classroom,
            );
            let mut schedule = ScheduleRegistry::new(&settings);
            schedule.apply_schedule(id, group.window, &group.participants());
            let coordinator = SessionCoordinator::new(&group);
            registry.add_group(group);

            Self {
                agents,
                facilities,
                registry,
                schedule,
                settings,
                bus: EventBus::new(),
                group_id: id,
                teacher,
                coordinator,
            }
        }

        fn tick(&mut self, now: u64) {
            let busy = HashSet::new();
            let mut ctx = TickCtx {
                registry: &mut self.registry,
                schedule: &self.schedule,
                settings: &self.settings,
                bus: &self.bus,
                agents: &mut self.agents,
                facilities: &self.facilities,
                now,
                busy_elsewhere: &busy,
            };
            self.coordinator.tick(&mut ctx);
        }

        fn progress(&self) -> f32 {
            self.registry.group(self.group_id).unwrap().progress
        }
    }

    #[test]
    fn test_automatic_bell_skips_teacher_travel() {
        let mut harness = Harness::new(true);
        harness.tick(IN_WINDOW);
        assert_eq!(harness.coordinator.state(), SessionState::Instruct);
        assert!(matches!(
            harness.agents.duty(harness.teacher),
            Some(Duty::Teach { .. })
        ));
    }

    #[test]
    fn test_progress_constant_while_ringing() {
        let mut harness = Harness::new(false);
        for offset in 0..200 {
            harness.tick(IN_WINDOW + offset);
        }
        assert_eq!(harness.coordinator.state(), SessionState::RingBell);
        assert!(matches!(
            harness.agents.duty(harness.teacher),
            Some(Duty::RingBell { .. })
        ));
        assert_eq!(harness.progress(), 0.0);
    }

    #[test]
    fn test_progress_monotonic_while_instructing() {
        let mut harness = Harness::new(true);
        let mut last = 0.0f32;
        for offset in 0..50 {
            harness.tick(IN_WINDOW + offset);
            let progress = harness.progress();
            assert!(progress >= last);
            last = progress;
        }
        assert!(last > 0.0);
    }

    #[test]
    fn test_posted_cancel_consumed_at_next_boundary() {
        let mut harness = Harness::new(true);
        harness.tick(IN_WINDOW);
        assert_eq!(harness.coordinator.state(), SessionState::Instruct);

        harness.coordinator.post(SessionTrigger::Cancelled("drill".to_string()));
        // The trigger sits in the mailbox until the next tick starts.
        assert_eq!(harness.coordinator.state(), SessionState::Instruct);

        harness.tick(IN_WINDOW + 1);
        assert_eq!(harness.coordinator.state(), SessionState::End);
        assert!(harness.coordinator.members().is_empty());
        assert!(harness.agents.duty(harness.teacher).is_none());
    }

    #[test]
    fn test_schedule_end_detected_by_supervisory_check() {
        let mut harness = Harness::new(true);
        harness.tick(IN_WINDOW);
        assert_eq!(harness.coordinator.state(), SessionState::Instruct);

        // 14:00 is outside the (8, 12) window.
        harness.tick(14 * 2500);
        assert_eq!(harness.coordinator.state(), SessionState::End);
    }

    #[test]
    fn test_dead_teacher_marks_group_for_removal() {
        let mut harness = Harness::new(true);
        harness.tick(IN_WINDOW);
        harness.agents.kill(harness.teacher);
        harness.tick(IN_WINDOW + 1);
        assert_eq!(harness.coordinator.state(), SessionState::End);
        assert!(harness.coordinator.group_removal_pending());
    }

    #[test]
    fn test_incapacitated_teacher_keeps_group() {
        let mut harness = Harness::new(true);
        harness.tick(IN_WINDOW);
        harness.agents.incapacitate(harness.teacher);
        harness.tick(IN_WINDOW + 1);
        assert_eq!(harness.coordinator.state(), SessionState::End);
        assert!(!harness.coordinator.group_removal_pending());
    }
}
