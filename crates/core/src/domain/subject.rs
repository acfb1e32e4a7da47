//! Subject policies: what a session teaches, who qualifies, and how fast it
//! progresses.
//!
//! Subjects are a closed sum type dispatched by pattern matching so every
//! capability stays exhaustiveness-checked. Progress functions are pure over
//! (teacher attributes, environment modifier, configured multiplier); the
//! only mutation happens in the explicit tick appliers, which write through
//! the agent directory.

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::{
    Acceptance, AgentDirectory, AgentId, FacilityDirectory, FixtureId, LifeStage, RejectReason,
    SkillId, StationKind,
};
use crate::settings::Settings;

/// Scale shared by the score-based progress formulas.
const SCORE_SCALE: f32 = 0.05;
/// Learning-need satisfaction per attended tick, before rate factors.
const LEARNING_NEED_PER_TICK: f32 = 1.2e-5;
/// Lesson XP per childcare teaching tick, before rate factors.
const LESSON_XP_PER_TICK: f32 = 0.1;
/// Minimum skill level to teach a skill session.
const TEACHING_SKILL_FLOOR: u32 = 5;
/// Course length defaults, in progress points.
const STANDARD_COURSE_GOAL: f32 = 60_000.0;
const ADVANCED_COURSE_GOAL: f32 = 120_000.0;
const SKILL_COURSE_GOAL: f32 = 10_000.0;
/// How many of the teacher's best skills a childcare lesson rolls between.
const LESSON_SKILL_POOL: usize = 4;

/// Tiered operating credential. Ordered: a higher tier subsumes the lower
/// ones. Everyone starts at `Basic`; sessions teach the upper tiers.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum CredentialTier {
    #[default]
    Basic,
    Standard,
    Advanced,
}

impl CredentialTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Standard => "standard",
            Self::Advanced => "advanced",
        }
    }
}

impl fmt::Display for CredentialTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillSubject {
    pub focus: SkillId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CertificationSubject {
    pub focus: CredentialTier,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChildcareSubject {}

/// Per-subject policy, consumed by groups, role assignment and coordinators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Subject {
    Skill(SkillSubject),
    Certification(CertificationSubject),
    Childcare(ChildcareSubject),
}

impl Subject {
    pub fn skill(focus: SkillId) -> Self {
        Self::Skill(SkillSubject { focus })
    }

    pub fn certification(focus: CredentialTier) -> Self {
        Self::Certification(CertificationSubject { focus })
    }

    pub fn childcare() -> Self {
        Self::Childcare(ChildcareSubject {})
    }

    pub fn description(&self) -> String {
        match self {
            Self::Skill(subject) => format!("{} training", subject.focus),
            Self::Certification(subject) => format!("{} certification course", subject.focus),
            Self::Childcare(_) => "childcare".to_string(),
        }
    }

    /// Infinite subjects never report completion and skip progress accrual.
    pub fn is_infinite(&self) -> bool {
        matches!(self, Self::Childcare(_))
    }

    /// Goal preset applied when the author does not pick one.
    pub fn default_goal(&self) -> f32 {
        match self {
            Self::Skill(_) => SKILL_COURSE_GOAL,
            Self::Certification(subject) => match subject.focus {
                CredentialTier::Advanced => ADVANCED_COURSE_GOAL,
                _ => STANDARD_COURSE_GOAL,
            },
            Self::Childcare(_) => 0.0,
        }
    }

    /// Workstations of this subject's kind linked to the instructional
    /// fixture; the effective class capacity.
    pub fn available_stations(
        &self,
        facilities: &dyn FacilityDirectory,
        fixture: FixtureId,
    ) -> usize {
        facilities.linked_stations(fixture, self.station_kind()).len()
    }

    /// Workstation kind the lessons are held at.
    pub fn station_kind(&self) -> StationKind {
        match self {
            Self::Skill(subject) => match subject.focus {
                SkillId::Melee => StationKind::SparringMat,
                SkillId::Shooting => StationKind::ShootingRange,
                _ => StationKind::Desk,
            },
            Self::Certification(_) | Self::Childcare(_) => StationKind::Desk,
        }
    }

    /// Ranking score for picking the best teacher among candidates.
    pub fn teacher_score(&self, agents: &dyn AgentDirectory, teacher: AgentId) -> f32 {
        match self {
            Self::Skill(subject) => {
                let social = agents.skill(teacher, SkillId::Social).level;
                let focus = agents.skill(teacher, subject.focus).level;
                let intellect = agents.skill(teacher, SkillId::Intellectual).level;
                (social * 0.4 + focus * 0.3 + intellect * 0.3) * SCORE_SCALE
            }
            Self::Certification(subject) => {
                let social = agents.skill(teacher, SkillId::Social).level;
                let intellect = agents.skill(teacher, SkillId::Intellectual).level;
                let held = agents.credential(teacher);
                let modifier: f32 = if held == subject.focus {
                    1.2
                } else if held > CredentialTier::Basic {
                    0.9
                } else {
                    1.0
                };
                (social * 0.6 + intellect * 0.4) * modifier.max(0.1) * SCORE_SCALE
            }
            Self::Childcare(_) => agents.social_impact(teacher),
        }
    }

    pub fn teacher_qualified(&self, agents: &dyn AgentDirectory, teacher: AgentId) -> Acceptance {
        match self {
            Self::Skill(subject) => {
                let skill = agents.skill(teacher, subject.focus);
                if skill.disabled || skill.level < TEACHING_SKILL_FLOOR as f32 {
                    RejectReason::TeacherUnderqualified {
                        skill: subject.focus,
                        required: TEACHING_SKILL_FLOOR,
                    }
                    .into()
                } else {
                    Acceptance::Accepted
                }
            }
            Self::Certification(subject) => {
                if agents.credential(teacher) >= subject.focus {
                    Acceptance::Accepted
                } else {
                    RejectReason::TeacherLacksCredential {
                        required: subject.focus,
                    }
                    .into()
                }
            }
            Self::Childcare(_) => {
                if agents.life_stage(teacher) >= LifeStage::Adult {
                    Acceptance::Accepted
                } else {
                    RejectReason::TeacherMustBeAdult.into()
                }
            }
        }
    }

    pub fn student_qualified(&self, agents: &dyn AgentDirectory, student: AgentId) -> Acceptance {
        match self {
            Self::Skill(subject) => {
                if agents.skill(student, subject.focus).disabled {
                    RejectReason::StudentSkillDisabled {
                        skill: subject.focus,
                    }
                    .into()
                } else {
                    Acceptance::Accepted
                }
            }
            Self::Certification(subject) => {
                let held = agents.credential(student);
                if held >= subject.focus {
                    RejectReason::StudentAlreadyCertified { tier: held }.into()
                } else {
                    Acceptance::Accepted
                }
            }
            Self::Childcare(_) => {
                if agents.life_stage(student) != LifeStage::Child {
                    RejectReason::StudentMustBeChild.into()
                } else if agents.learning_rate(student) <= 0.0 {
                    RejectReason::StudentNoLearningNeed.into()
                } else {
                    Acceptance::Accepted
                }
            }
        }
    }

    /// Progress accrued per actively-taught tick. Pure over the teacher's
    /// attributes, the room's environment modifier and the configured
    /// multipliers; infinite subjects always yield zero.
    pub fn progress_per_tick(
        &self,
        agents: &dyn AgentDirectory,
        teacher: AgentId,
        environment: f32,
        settings: &Settings,
    ) -> f32 {
        match self {
            Self::Skill(_) => {
                self.teacher_score(agents, teacher) * environment * settings.skill_session_speed
            }
            Self::Certification(_) => {
                self.teacher_score(agents, teacher)
                    * environment
                    * settings.certification_session_speed
            }
            Self::Childcare(_) => 0.0,
        }
    }

    /// Per-tick effect applied through the student's own attendance duty.
    pub fn apply_learning_tick(
        &self,
        agents: &mut dyn AgentDirectory,
        teacher: AgentId,
        student: AgentId,
        environment: f32,
        settings: &Settings,
    ) {
        let rate = agents.learning_rate(student);
        if agents.life_stage(student) == LifeStage::Child {
            agents.grant_growth_tick(student);
        }
        let speed = match self {
            Self::Skill(_) => settings.skill_session_speed,
            Self::Certification(_) => settings.certification_session_speed,
            Self::Childcare(_) => settings.childcare_session_speed,
        };
        agents.satisfy_learning(
            student,
            LEARNING_NEED_PER_TICK * rate * environment * speed * settings.global_learning_speed,
        );

        if let Self::Skill(subject) = self {
            let xp = self.progress_per_tick(agents, teacher, environment, settings);
            agents.grant_skill_xp(student, subject.focus, xp);
        }
    }

    /// Per-tick effect applied through the teacher's teaching duty.
    /// `taught_skill` is the coordinator's current childcare lesson pick.
    pub fn apply_teaching_tick(
        &self,
        agents: &mut dyn AgentDirectory,
        student: AgentId,
        taught_skill: Option<SkillId>,
        environment: f32,
        settings: &Settings,
    ) {
        if let Self::Childcare(_) = self {
            let Some(skill) = taught_skill else {
                return;
            };
            if agents.skill(student, skill).disabled {
                return;
            }
            let xp = LESSON_XP_PER_TICK
                * agents.learning_rate(student)
                * environment
                * settings.childcare_session_speed;
            agents.grant_skill_xp(student, skill, xp);
        }
    }

    /// Pick the childcare lesson skill: one of the teacher's top skills that
    /// at least one student can still learn. `None` for other subjects or
    /// when no skill is shared.
    pub fn choose_taught_skill(
        &self,
        agents: &dyn AgentDirectory,
        teacher: AgentId,
        students: &[AgentId],
        rng: &mut impl Rng,
    ) -> Option<SkillId> {
        if !matches!(self, Self::Childcare(_)) {
            return None;
        }
        let mut candidates: Vec<(SkillId, f32)> = agents
            .skills(teacher)
            .into_iter()
            .filter(|(skill, level)| {
                !level.disabled
                    && students
                        .iter()
                        .any(|student| !agents.skill(*student, *skill).disabled)
            })
            .map(|(skill, level)| (skill, level.level))
            .collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
        candidates.truncate(LESSON_SKILL_POOL);
        candidates.choose(rng).map(|(skill, _)| *skill)
    }

    /// One-shot rewards at completion. Only certification courses grant
    /// anything persistent.
    pub fn grant_completion_rewards(&self, agents: &mut dyn AgentDirectory, students: &[AgentId]) {
        if let Self::Certification(subject) = self {
            for student in students {
                agents.grant_credential(*student, subject.focus);
            }
        }
    }

    /// Students that stopped qualifying for reasons the session should react
    /// to on its own (childcare students aging out). Returns the agents to
    /// remove; the caller owns the membership mutation.
    pub fn lifecycle_ejections(
        &self,
        agents: &dyn AgentDirectory,
        students: &[AgentId],
    ) -> Vec<AgentId> {
        match self {
            Self::Childcare(_) => students
                .iter()
                .copied()
                .filter(|student| agents.life_stage(*student) != LifeStage::Child)
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::testing::MockAgents;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_skill_teacher_score_weighting() {
        let mut agents = MockAgents::new();
        let teacher = agents.add_adult("teacher");
        agents.set_skill(teacher, SkillId::Social, 10.0);
        agents.set_skill(teacher, SkillId::Medicine, 10.0);
        agents.set_skill(teacher, SkillId::Intellectual, 10.0);

        let subject = Subject::skill(SkillId::Medicine);
        let score = subject.teacher_score(&agents, teacher);
        assert!((score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_skill_teacher_needs_level_five() {
        let mut agents = MockAgents::new();
        let teacher = agents.add_adult("teacher");
        agents.set_skill(teacher, SkillId::Cooking, 4.0);

        let subject = Subject::skill(SkillId::Cooking);
        assert!(!subject.teacher_qualified(&agents, teacher).accepted());

        agents.set_skill(teacher, SkillId::Cooking, 5.0);
        assert!(subject.teacher_qualified(&agents, teacher).accepted());
    }

    #[test]
    fn test_certification_gates_by_tier() {
        let mut agents = MockAgents::new();
        let holder = agents.add_adult("holder");
        let novice = agents.add_adult("novice");
        agents.set_credential(holder, CredentialTier::Standard);

        let subject = Subject::certification(CredentialTier::Standard);
        assert!(subject.teacher_qualified(&agents, holder).accepted());
        assert!(!subject.teacher_qualified(&agents, novice).accepted());
        assert!(subject.student_qualified(&agents, novice).accepted());
        assert!(!subject.student_qualified(&agents, holder).accepted());
    }

    #[test]
    fn test_certification_matching_credential_bonus() {
        let mut agents = MockAgents::new();
        let teacher = agents.add_adult("teacher");
        agents.set_skill(teacher, SkillId::Social, 10.0);
        agents.set_skill(teacher, SkillId::Intellectual, 10.0);

        agents.set_credential(teacher, CredentialTier::Standard);
        let matching = Subject::certification(CredentialTier::Standard);
        let mismatched = Subject::certification(CredentialTier::Advanced);

        let base = 10.0 * 0.6 + 10.0 * 0.4;
        assert!(
            (matching.teacher_score(&agents, teacher) - base * 1.2 * SCORE_SCALE).abs() < 1e-6
        );
        assert!(
            (mismatched.teacher_score(&agents, teacher) - base * 0.9 * SCORE_SCALE).abs() < 1e-6
        );
    }

    #[test]
    fn test_childcare_never_completes() {
        let subject = Subject::childcare();
        assert!(subject.is_infinite());
        let agents = MockAgents::new();
        assert_eq!(
            subject.progress_per_tick(&agents, AgentId::new(), 1.0, &Settings::default()),
            0.0
        );
    }

    #[test]
    fn test_childcare_ejects_grown_students() {
        let mut agents = MockAgents::new();
        let child = agents.add_child("child");
        let grown = agents.add_adult("grown");

        let subject = Subject::childcare();
        let ejected = subject.lifecycle_ejections(&agents, &[child, grown]);
        assert_eq!(ejected, vec![grown]);
    }

    #[test]
    fn test_taught_skill_shared_with_students() {
        let mut agents = MockAgents::new();
        let teacher = agents.add_adult("teacher");
        let student = agents.add_child("student");
        agents.set_skill(teacher, SkillId::Cooking, 12.0);
        agents.set_skill(teacher, SkillId::Melee, 9.0);
        agents.disable_skill(student, SkillId::Melee);

        let subject = Subject::childcare();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..16 {
            let pick = subject.choose_taught_skill(&agents, teacher, &[student], &mut rng);
            assert_eq!(pick, Some(SkillId::Cooking));
        }
    }

    #[test]
    fn test_completion_rewards_grant_credential() {
        let mut agents = MockAgents::new();
        let student = agents.add_adult("student");

        let subject = Subject::certification(CredentialTier::Advanced);
        subject.grant_completion_rewards(&mut agents, &[student]);
        assert_eq!(agents.credential(student), CredentialTier::Advanced);
    }
}
