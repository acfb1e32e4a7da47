//! Role assignment: who teaches and who attends.
//!
//! `RoleAssignments` is the picker surface an interactive roster dialog
//! drives; `role_eligibility` is the shared predicate the coordinator and
//! launcher re-check against while a session runs. Buckets keep pool order
//! so greedy passes stay deterministic.

use std::collections::HashMap;

use tracing::debug;

use classworks_core::{
    Acceptance, AgentDirectory, AgentId, FacilityDirectory, GroupRegistry, LifeStage,
    RejectReason, ScheduleRegistry, SessionGroup, SkillId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleId {
    Teacher,
    Student,
}

impl RoleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Role {
    pub id: RoleId,
    pub min: usize,
    pub max: usize,
}

/// Everything eligibility needs to look at. The group under edit may not be
/// registered yet; conflict checks skip it by id.
pub struct RosterCtx<'a> {
    pub registry: &'a GroupRegistry,
    pub agents: &'a dyn AgentDirectory,
    pub facilities: &'a dyn FacilityDirectory,
    pub group: &'a SessionGroup,
}

/// Combined eligibility: schedule conflicts against every other group the
/// agent is committed to, role-independent gates, then the subject's own
/// qualification rules.
pub fn role_eligibility(
    registry: &GroupRegistry,
    agents: &dyn AgentDirectory,
    group: &SessionGroup,
    agent: AgentId,
    role: RoleId,
) -> Acceptance {
    for other in registry.groups() {
        if other.id != group.id
            && other.is_member(agent)
            && ScheduleRegistry::has_conflict(group.window, other.window)
        {
            return RejectReason::ScheduleConflict {
                group_id: other.id,
                group_name: other.name.clone(),
                start_hour: other.window.start_hour,
                end_hour: other.window.end_hour,
            }
            .into();
        }
    }
    match role {
        RoleId::Teacher => {
            if agents.life_stage(agent) < LifeStage::Adult {
                return RejectReason::TeacherMustBeAdult.into();
            }
            if agents.skill(agent, SkillId::Social).disabled {
                return RejectReason::TeacherSocialDisabled.into();
            }
            group.subject.teacher_qualified(agents, agent)
        }
        RoleId::Student => group.subject.student_qualified(agents, agent),
    }
}

/// Ordered role buckets plus a spectator overflow. An agent occupies at most
/// one bucket at any time.
#[derive(Debug, Clone)]
pub struct RoleAssignments {
    roles: Vec<Role>,
    assigned: HashMap<RoleId, Vec<AgentId>>,
    spectators: Vec<AgentId>,
    spectators_allowed: bool,
    forced: HashMap<AgentId, RoleId>,
    pool: Vec<AgentId>,
}

impl RoleAssignments {
    /// Teacher-first declared order; the student cap is a hard ceiling, the
    /// effective class size comes from the workstation count during
    /// `auto_assign_best`.
    pub fn new(pool: Vec<AgentId>) -> Self {
        let roles = vec![
            Role {
                id: RoleId::Teacher,
                min: 1,
                max: 1,
            },
            Role {
                id: RoleId::Student,
                min: 1,
                max: 99,
            },
        ];
        let mut assigned = HashMap::new();
        for role in &roles {
            assigned.insert(role.id, Vec::new());
        }
        Self {
            roles,
            assigned,
            spectators: Vec::new(),
            spectators_allowed: false,
            forced: HashMap::new(),
            pool,
        }
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn pool(&self) -> &[AgentId] {
        &self.pool
    }

    pub fn assigned(&self, role: RoleId) -> &[AgentId] {
        self.assigned.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first_assigned(&self, role: RoleId) -> Option<AgentId> {
        self.assigned(role).first().copied()
    }

    pub fn teacher(&self) -> Option<AgentId> {
        self.first_assigned(RoleId::Teacher)
    }

    pub fn students(&self) -> &[AgentId] {
        self.assigned(RoleId::Student)
    }

    pub fn role_for(&self, agent: AgentId) -> Option<RoleId> {
        self.assigned
            .iter()
            .find(|(_, bucket)| bucket.contains(&agent))
            .map(|(role, _)| *role)
    }

    pub fn participating(&self, agent: AgentId) -> bool {
        self.role_for(agent).is_some() || self.spectators.contains(&agent)
    }

    pub fn forced_role(&self, agent: AgentId) -> Option<RoleId> {
        self.forced.get(&agent).copied()
    }

    pub fn set_forced_role(&mut self, agent: AgentId, role: RoleId) {
        self.forced.insert(agent, role);
    }

    fn role(&self, id: RoleId) -> &Role {
        self.roles
            .iter()
            .find(|role| role.id == id)
            .unwrap_or(&self.roles[0])
    }

    /// Eligibility for one specific role.
    pub fn can_accept(&self, ctx: &RosterCtx<'_>, agent: AgentId, role: RoleId) -> Acceptance {
        role_eligibility(ctx.registry, ctx.agents, ctx.group, agent, role)
    }

    /// Whether any role would take the agent; the reason is the first
    /// rejection encountered in declared order.
    pub fn can_participate(&self, ctx: &RosterCtx<'_>, agent: AgentId) -> Acceptance {
        let mut first_reason: Option<RejectReason> = None;
        for role in &self.roles {
            match self.can_accept(ctx, agent, role.id) {
                Acceptance::Accepted => return Acceptance::Accepted,
                Acceptance::Rejected(reason) => {
                    first_reason.get_or_insert(reason);
                }
            }
        }
        match first_reason {
            Some(reason) => reason.into(),
            None => Acceptance::Accepted,
        }
    }

    /// Assign `agent` to `role`, pulling it out of any other bucket first.
    /// `insert_before` preserves picker ordering when given.
    pub fn try_assign(
        &mut self,
        ctx: &RosterCtx<'_>,
        agent: AgentId,
        role: RoleId,
        insert_before: Option<AgentId>,
    ) -> bool {
        if let Some(forced) = self.forced_role(agent) {
            if forced != role {
                debug!(agent = %agent, role = role.as_str(), "Rejected: forced to another role");
                return false;
            }
        }
        if !self.can_accept(ctx, agent, role).accepted() {
            return false;
        }
        let max = self.role(role).max;
        if self.assigned(role).len() >= max {
            return false;
        }
        self.remove_everywhere(agent);
        let bucket = self.assigned.entry(role).or_default();
        match insert_before.and_then(|before| bucket.iter().position(|a| *a == before)) {
            Some(index) => bucket.insert(index, agent),
            None => bucket.push(agent),
        }
        true
    }

    /// Remove the agent from whichever role holds it. Forced roles stay put.
    pub fn try_unassign(&mut self, agent: AgentId) -> bool {
        let Some(role) = self.role_for(agent) else {
            return false;
        };
        if self.forced_role(agent) == Some(role) {
            return false;
        }
        if let Some(bucket) = self.assigned.get_mut(&role) {
            bucket.retain(|a| *a != agent);
        }
        true
    }

    pub fn remove_participant(&mut self, agent: AgentId) {
        self.try_unassign(agent);
        self.spectators.retain(|a| *a != agent);
    }

    fn remove_everywhere(&mut self, agent: AgentId) {
        for bucket in self.assigned.values_mut() {
            bucket.retain(|a| *a != agent);
        }
        self.spectators.retain(|a| *a != agent);
    }

    /// First role in declared order that would accept the agent.
    pub fn suggest_role(&self, ctx: &RosterCtx<'_>, agent: AgentId) -> Option<RoleId> {
        self.roles
            .iter()
            .map(|role| role.id)
            .find(|role| self.can_accept(ctx, agent, *role).accepted())
    }

    /// Greedy fill: clear everything, then walk the pool assigning each live
    /// candidate to the first role with spare capacity that accepts it.
    pub fn auto_fill(&mut self, ctx: &RosterCtx<'_>) {
        for bucket in self.assigned.values_mut() {
            bucket.clear();
        }
        self.spectators.clear();
        for agent in self.pool.clone() {
            if !ctx.agents.vitals(agent).fit() {
                continue;
            }
            let mut placed = false;
            for role in self.roles.clone() {
                if self.assigned(role.id).len() < role.max
                    && self.can_accept(ctx, agent, role.id).accepted()
                {
                    self.assigned.entry(role.id).or_default().push(agent);
                    placed = true;
                    break;
                }
            }
            if !placed && self.spectators_allowed {
                self.spectators.push(agent);
            }
        }
    }

    /// Best-teacher assignment: prune stale picks, promote the highest
    /// scoring candidate to teacher (demoting the incumbent to student when
    /// still eligible), then fill the student role up to the workstation
    /// count in pool order.
    pub fn auto_assign_best(&mut self, ctx: &RosterCtx<'_>) {
        // 1. Drop anyone who stopped qualifying for the bucket it holds.
        for role in self.roles.clone() {
            for agent in self.assigned(role.id).to_vec() {
                if !self.can_accept(ctx, agent, role.id).accepted() {
                    debug!(agent = %agent, role = role.id.as_str(), "Unassigned: no longer eligible");
                    self.try_unassign(agent);
                }
            }
        }

        // 2. Promote the best-scoring eligible teacher; ties keep pool order.
        let mut best: Option<(AgentId, f32)> = None;
        for agent in &self.pool {
            if !self.can_accept(ctx, *agent, RoleId::Teacher).accepted() {
                continue;
            }
            let score = ctx.group.subject.teacher_score(ctx.agents, *agent);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((*agent, score));
            }
        }
        if let Some((winner, _)) = best {
            let incumbent = self.first_assigned(RoleId::Teacher);
            if incumbent != Some(winner) {
                if let Some(previous) = incumbent {
                    self.try_unassign(previous);
                    if self.can_accept(ctx, previous, RoleId::Student).accepted() {
                        self.try_assign(ctx, previous, RoleId::Student, None);
                    }
                }
                self.try_assign(ctx, winner, RoleId::Teacher, None);
            }
        }

        // 3. Size the class to the room.
        let capacity = station_capacity(ctx);
        let enrolled = self.assigned(RoleId::Student).len();
        if enrolled > capacity {
            for agent in self.assigned(RoleId::Student).to_vec().into_iter().take(enrolled - capacity) {
                self.try_unassign(agent);
            }
        } else if enrolled < capacity {
            let mut open = capacity - enrolled;
            for agent in self.pool.clone() {
                if open == 0 {
                    break;
                }
                if self.participating(agent)
                    || !self.can_accept(ctx, agent, RoleId::Student).accepted()
                {
                    continue;
                }
                if self.try_assign(ctx, agent, RoleId::Student, None) {
                    open -= 1;
                }
            }
        }
    }
}

/// Workstations available for this group's subject.
fn station_capacity(ctx: &RosterCtx<'_>) -> usize {
    ctx.registry
        .classroom(ctx.group.classroom)
        .map(|classroom| ctx.group.subject.available_stations(ctx.facilities, classroom.fixture))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use classworks_core::testing::{MockAgents, MockFacilities};
    use classworks_core::{
        GroupId, ScheduleWindow, SessionGroup, StationKind, Subject,
    };

    struct Fixture {
        agents: MockAgents,
        facilities: MockFacilities,
        registry: GroupRegistry,
        group: SessionGroup,
    }

    impl Fixture {
        fn new() -> Self {
            let mut agents = MockAgents::new();
            let mut facilities = MockFacilities::new(agents.site());
            facilities.add_stations(StationKind::Desk, 2);

            let mut registry = GroupRegistry::new();
            let classroom = registry.add_classroom("room", facilities.fixture());

            let teacher = agents.add_adult("teacher");
            agents.set_skill(teacher, SkillId::Cooking, 8.0);
            let group = SessionGroup::new(
                GroupId(100),
                "Cooking basics",
                teacher,
                vec![],
                Subject::skill(SkillId::Cooking),
                1000.0,
                ScheduleWindow::new(8, 10),
                classroom,
            );
            Self {
                agents,
                facilities,
                registry,
                group,
            }
        }

        fn ctx(&self) -> RosterCtx<'_> {
            RosterCtx {
                registry: &self.registry,
                agents: &self.agents,
                facilities: &self.facilities,
                group: &self.group,
            }
        }
    }

    #[test]
    fn test_agent_never_holds_two_roles() {
        let mut fixture = Fixture::new();
        let adult = fixture.agents.add_adult("adult");
        fixture.agents.set_skill(adult, SkillId::Cooking, 9.0);
        let mut picker = RoleAssignments::new(vec![adult]);

        assert!(picker.try_assign(&fixture.ctx(), adult, RoleId::Student, None));
        assert!(picker.try_assign(&fixture.ctx(), adult, RoleId::Teacher, None));
        assert_eq!(picker.role_for(adult), Some(RoleId::Teacher));
        assert!(picker.students().is_empty());

        assert!(picker.try_unassign(adult));
        assert!(!picker.try_unassign(adult));
        assert!(picker.role_for(adult).is_none());
    }

    #[test]
    fn test_teacher_cardinality_is_one() {
        let mut fixture = Fixture::new();
        let first = fixture.agents.add_adult("first");
        let second = fixture.agents.add_adult("second");
        for agent in [first, second] {
            fixture.agents.set_skill(agent, SkillId::Cooking, 9.0);
        }
        let mut picker = RoleAssignments::new(vec![first, second]);

        assert!(picker.try_assign(&fixture.ctx(), first, RoleId::Teacher, None));
        assert!(!picker.try_assign(&fixture.ctx(), second, RoleId::Teacher, None));
    }

    #[test]
    fn test_insert_before_preserves_order() {
        let mut fixture = Fixture::new();
        let a = fixture.agents.add_child("a");
        let b = fixture.agents.add_child("b");
        let c = fixture.agents.add_child("c");
        let mut picker = RoleAssignments::new(vec![a, b, c]);

        let ctx = RosterCtx {
            registry: &fixture.registry,
            agents: &fixture.agents,
            facilities: &fixture.facilities,
            group: &fixture.group,
        };
        assert!(picker.try_assign(&ctx, a, RoleId::Student, None));
        assert!(picker.try_assign(&ctx, b, RoleId::Student, None));
        assert!(picker.try_assign(&ctx, c, RoleId::Student, Some(b)));
        assert_eq!(picker.students(), &[a, c, b]);
    }

    #[test]
    fn test_auto_fill_respects_eligibility_and_capacity() {
        let mut fixture = Fixture::new();
        let qualified = fixture.agents.add_adult("qualified");
        fixture.agents.set_skill(qualified, SkillId::Cooking, 7.0);
        let disabled = fixture.agents.add_child("disabled");
        fixture.agents.disable_skill(disabled, SkillId::Cooking);
        let downed = fixture.agents.add_child("downed");
        fixture.agents.incapacitate(downed);
        let student = fixture.agents.add_child("student");

        let mut picker = RoleAssignments::new(vec![qualified, disabled, downed, student]);
        picker.auto_fill(&fixture.ctx());

        assert_eq!(picker.teacher(), Some(qualified));
        assert_eq!(picker.students(), &[student]);
        assert!(!picker.participating(disabled));
        assert!(!picker.participating(downed));
    }

    #[test]
    fn test_suggest_role_prefers_teacher() {
        let mut fixture = Fixture::new();
        let adult = fixture.agents.add_adult("adult");
        fixture.agents.set_skill(adult, SkillId::Cooking, 6.0);
        let child = fixture.agents.add_child("child");
        let picker = RoleAssignments::new(vec![adult, child]);

        assert_eq!(
            picker.suggest_role(&fixture.ctx(), adult),
            Some(RoleId::Teacher)
        );
        assert_eq!(
            picker.suggest_role(&fixture.ctx(), child),
            Some(RoleId::Student)
        );
    }

    #[test]
    fn test_auto_assign_best_promotes_top_scorer() {
        let mut fixture = Fixture::new();
        let modest = fixture.agents.add_adult("modest");
        fixture.agents.set_skill(modest, SkillId::Cooking, 6.0);
        let expert = fixture.agents.add_adult("expert");
        fixture.agents.set_skill(expert, SkillId::Cooking, 15.0);
        fixture.agents.set_skill(expert, SkillId::Social, 12.0);
        let pupil = fixture.agents.add_child("pupil");

        let mut picker = RoleAssignments::new(vec![modest, expert, pupil]);
        let ctx = fixture.ctx();
        assert!(picker.try_assign(&ctx, modest, RoleId::Teacher, None));
        picker.auto_assign_best(&ctx);

        assert_eq!(picker.teacher(), Some(expert));
        // Incumbent demoted to student; class sized to the two desks.
        assert!(picker.students().contains(&modest));
        assert!(picker.students().contains(&pupil));
        assert_eq!(picker.students().len(), 2);
    }

    #[test]
    fn test_schedule_conflict_names_other_group() {
        let mut fixture = Fixture::new();
        let shared = fixture.agents.add_child("shared");

        let other_classroom = fixture.group.classroom;
        let other = SessionGroup::new(
            GroupId(1),
            "Morning drills",
            fixture.agents.add_adult("other teacher"),
            vec![shared],
            Subject::skill(SkillId::Melee),
            500.0,
            ScheduleWindow::new(8, 10),
            other_classroom,
        );
        fixture.registry.add_group(other);
        fixture.group.window = ScheduleWindow::new(9, 11);

        let report = role_eligibility(
            &fixture.registry,
            &fixture.agents,
            &fixture.group,
            shared,
            RoleId::Student,
        );
        match report.reason() {
            Some(RejectReason::ScheduleConflict { group_name, .. }) => {
                assert_eq!(group_name, "Morning drills");
            }
            other => panic!("expected schedule conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_forced_role_blocks_reassignment() {
        let mut fixture = Fixture::new();
        let child = fixture.agents.add_child("child");
        let mut picker = RoleAssignments::new(vec![child]);
        picker.set_forced_role(child, RoleId::Student);

        assert!(picker.try_assign(&fixture.ctx(), child, RoleId::Student, None));
        assert!(!picker.try_assign(&fixture.ctx(), child, RoleId::Teacher, None));
        assert!(!picker.try_unassign(child));
    }
}
