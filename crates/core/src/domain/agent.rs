//! Agent identity and the directory trait through which the engine observes
//! and commands the host simulation's characters.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{CredentialTier, FixtureId, SiteId};

/// Stable identity of a controllable character. Allocation is the host's
/// concern; the engine only stores and compares ids.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LifeStage {
    Newborn,
    Child,
    Adult,
}

/// Life/incapacitation snapshot used by the supervisory check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentVitals {
    pub alive: bool,
    pub incapacitated: bool,
    pub mentally_broken: bool,
}

impl AgentVitals {
    pub fn healthy() -> Self {
        Self {
            alive: true,
            incapacitated: false,
            mentally_broken: false,
        }
    }

    /// Able to hold a duty right now.
    pub fn fit(&self) -> bool {
        self.alive && !self.incapacitated && !self.mentally_broken
    }
}

/// Coarse classification of what an agent is currently doing, used to decide
/// whether the bell may interrupt it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Idle,
    Asleep,
    Leisure,
    Meditation,
    Research,
    Labor,
    /// Weddings, rituals and similar group activities outrank a class.
    Ceremony,
    /// Rest states that must never be broken.
    ProtectedRest,
}

/// Skills the subject policies can score and train.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SkillId {
    Social,
    Intellectual,
    Melee,
    Shooting,
    Construction,
    Cooking,
    Medicine,
    Crafting,
    Plants,
    Mining,
    Animals,
    Artistic,
}

impl SkillId {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Social => "social",
            Self::Intellectual => "intellectual",
            Self::Melee => "melee",
            Self::Shooting => "shooting",
            Self::Construction => "construction",
            Self::Cooking => "cooking",
            Self::Medicine => "medicine",
            Self::Crafting => "crafting",
            Self::Plants => "plants",
            Self::Mining => "mining",
            Self::Animals => "animals",
            Self::Artistic => "artistic",
        }
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One skill measurement. A disabled skill can never gain XP and disqualifies
/// the agent from sessions focused on it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkillLevel {
    pub level: f32,
    pub disabled: bool,
}

impl SkillLevel {
    pub fn new(level: f32) -> Self {
        Self {
            level,
            disabled: false,
        }
    }

    pub fn disabled() -> Self {
        Self {
            level: 0.0,
            disabled: true,
        }
    }
}

/// A tick-driven task assignment directing an agent's moment-to-moment
/// behavior while a coordinator is active. The host's job system decides how
/// to execute a duty; the engine only issues and clears them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duty {
    /// Travel to and operate a manual signal device.
    RingBell { device: FixtureId },
    /// Hold the lesson at the instructional fixture.
    Teach { fixture: FixtureId },
    /// Sit at the reserved workstation and attend.
    Attend { station: FixtureId },
}

/// The host simulation's view of its characters.
///
/// Query methods must be cheap; they run every tick. Command methods are
/// requests — the host may fulfil them over several ticks (travel, job
/// switching) and reports outcomes back through queries.
pub trait AgentDirectory {
    fn agents_at(&self, site: SiteId) -> Vec<AgentId>;
    fn name(&self, agent: AgentId) -> String;
    fn vitals(&self, agent: AgentId) -> AgentVitals;
    /// Site the agent currently counts as being on. Agents inside a
    /// transported sub-location (vehicle hold, pocket dimension anchored to a
    /// site) report the source site.
    fn site_of(&self, agent: AgentId) -> Option<SiteId>;
    fn life_stage(&self, agent: AgentId) -> LifeStage;
    fn skill(&self, agent: AgentId, skill: SkillId) -> SkillLevel;
    /// Every skill the agent has, for top-skill selection.
    fn skills(&self, agent: AgentId) -> Vec<(SkillId, SkillLevel)>;
    fn credential(&self, agent: AgentId) -> CredentialTier;
    /// Social-impact stat, the childcare teacher score.
    fn social_impact(&self, agent: AgentId) -> f32;
    /// Per-agent learning-rate factor (age, traits, implants).
    fn learning_rate(&self, agent: AgentId) -> f32;
    fn activity(&self, agent: AgentId) -> ActivityKind;
    /// Duty the engine last issued that is still in force, if any.
    fn current_duty(&self, agent: AgentId) -> Option<Duty>;
    /// Whether the agent is standing/sitting at the given station, close
    /// enough to take part in the lesson.
    fn is_at(&self, agent: AgentId, station: FixtureId) -> bool;
    fn can_reach(&self, agent: AgentId, fixture: FixtureId) -> bool;

    /// Stop the agent's current task so a duty can take over.
    fn interrupt(&mut self, agent: AgentId);
    fn set_duty(&mut self, agent: AgentId, duty: Duty);
    fn clear_duty(&mut self, agent: AgentId);
    fn grant_skill_xp(&mut self, agent: AgentId, skill: SkillId, xp: f32);
    /// Satisfy the learning need by `amount` (pre-scaled by the caller).
    fn satisfy_learning(&mut self, agent: AgentId, amount: f32);
    /// Accrue one tick's worth of growth points on a child.
    fn grant_growth_tick(&mut self, agent: AgentId);
    fn grant_credential(&mut self, agent: AgentId, tier: CredentialTier);
}
