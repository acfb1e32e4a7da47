//! In-memory directories for tests.
//!
//! `MockAgents` and `MockFacilities` implement the host-facing traits with
//! plain hash maps plus a few shortcuts (agents teleport to their station as
//! soon as an attend duty lands) so scenario tests can drive the engine
//! without a simulation behind it.

use std::collections::HashMap;

use uuid::Uuid;

use crate::domain::{
    ActivityKind, AgentDirectory, AgentId, AgentVitals, CredentialTier, Duty, FacilityDirectory,
    FixtureId, LifeStage, SignalDevice, SiteId, SkillId, SkillLevel, StationKind,
};

#[derive(Debug, Clone)]
struct MockAgent {
    name: String,
    vitals: AgentVitals,
    site: SiteId,
    off_site: bool,
    life_stage: LifeStage,
    skills: HashMap<SkillId, SkillLevel>,
    credential: CredentialTier,
    social_impact: f32,
    learning_rate: f32,
    activity: ActivityKind,
    duty: Option<Duty>,
    interrupts: u32,
    xp: HashMap<SkillId, f32>,
    learning: f32,
    growth_ticks: u32,
}

#[derive(Debug, Clone)]
pub struct MockAgents {
    site: SiteId,
    agents: HashMap<AgentId, MockAgent>,
    order: Vec<AgentId>,
    /// Agents under an attend duty count as present at their station.
    pub auto_attend: bool,
}

impl MockAgents {
    pub fn new() -> Self {
        Self {
            site: SiteId(Uuid::new_v4()),
            agents: HashMap::new(),
            order: Vec::new(),
            auto_attend: true,
        }
    }

    pub fn site(&self) -> SiteId {
        self.site
    }

    fn add(&mut self, name: &str, life_stage: LifeStage) -> AgentId {
        let id = AgentId::new();
        self.agents.insert(
            id,
            MockAgent {
                name: name.to_string(),
                vitals: AgentVitals::healthy(),
                site: self.site,
                off_site: false,
                life_stage,
                skills: HashMap::new(),
                credential: CredentialTier::Basic,
                social_impact: 1.0,
                learning_rate: 1.0,
                activity: ActivityKind::Idle,
                duty: None,
                interrupts: 0,
                xp: HashMap::new(),
                learning: 0.0,
                growth_ticks: 0,
            },
        );
        self.order.push(id);
        id
    }

    pub fn add_adult(&mut self, name: &str) -> AgentId {
        self.add(name, LifeStage::Adult)
    }

    pub fn add_child(&mut self, name: &str) -> AgentId {
        self.add(name, LifeStage::Child)
    }

    fn agent_mut(&mut self, id: AgentId) -> &mut MockAgent {
        self.agents.get_mut(&id).expect("unknown mock agent")
    }

    pub fn set_skill(&mut self, id: AgentId, skill: SkillId, level: f32) {
        self.agent_mut(id).skills.insert(skill, SkillLevel::new(level));
    }

    pub fn disable_skill(&mut self, id: AgentId, skill: SkillId) {
        self.agent_mut(id).skills.insert(skill, SkillLevel::disabled());
    }

    pub fn set_credential(&mut self, id: AgentId, tier: CredentialTier) {
        self.agent_mut(id).credential = tier;
    }

    pub fn set_social_impact(&mut self, id: AgentId, value: f32) {
        self.agent_mut(id).social_impact = value;
    }

    pub fn set_activity(&mut self, id: AgentId, activity: ActivityKind) {
        self.agent_mut(id).activity = activity;
    }

    pub fn set_life_stage(&mut self, id: AgentId, stage: LifeStage) {
        self.agent_mut(id).life_stage = stage;
    }

    pub fn kill(&mut self, id: AgentId) {
        self.agent_mut(id).vitals.alive = false;
    }

    pub fn incapacitate(&mut self, id: AgentId) {
        self.agent_mut(id).vitals.incapacitated = true;
    }

    pub fn send_off_site(&mut self, id: AgentId) {
        self.agent_mut(id).off_site = true;
    }

    pub fn duty(&self, id: AgentId) -> Option<Duty> {
        self.agents[&id].duty
    }

    pub fn interrupt_count(&self, id: AgentId) -> u32 {
        self.agents[&id].interrupts
    }

    pub fn skill_xp(&self, id: AgentId, skill: SkillId) -> f32 {
        self.agents[&id].xp.get(&skill).copied().unwrap_or(0.0)
    }

    pub fn learning_gained(&self, id: AgentId) -> f32 {
        self.agents[&id].learning
    }

    pub fn growth_ticks(&self, id: AgentId) -> u32 {
        self.agents[&id].growth_ticks
    }
}

impl Default for MockAgents {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentDirectory for MockAgents {
    fn agents_at(&self, site: SiteId) -> Vec<AgentId> {
        self.order
            .iter()
            .copied()
            .filter(|id| {
                let agent = &self.agents[id];
                agent.site == site && !agent.off_site
            })
            .collect()
    }

    fn name(&self, agent: AgentId) -> String {
        self.agents
            .get(&agent)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| agent.to_string())
    }

    fn vitals(&self, agent: AgentId) -> AgentVitals {
        self.agents[&agent].vitals
    }

    fn site_of(&self, agent: AgentId) -> Option<SiteId> {
        let record = &self.agents[&agent];
        (!record.off_site).then_some(record.site)
    }

    fn life_stage(&self, agent: AgentId) -> LifeStage {
        self.agents[&agent].life_stage
    }

    fn skill(&self, agent: AgentId, skill: SkillId) -> SkillLevel {
        self.agents[&agent]
            .skills
            .get(&skill)
            .copied()
            .unwrap_or(SkillLevel::new(0.0))
    }

    fn skills(&self, agent: AgentId) -> Vec<(SkillId, SkillLevel)> {
        let mut skills: Vec<(SkillId, SkillLevel)> = self.agents[&agent]
            .skills
            .iter()
            .map(|(skill, level)| (*skill, *level))
            .collect();
        skills.sort_by_key(|(skill, _)| skill.label());
        skills
    }

    fn credential(&self, agent: AgentId) -> CredentialTier {
        self.agents[&agent].credential
    }

    fn social_impact(&self, agent: AgentId) -> f32 {
        self.agents[&agent].social_impact
    }

    fn learning_rate(&self, agent: AgentId) -> f32 {
        self.agents[&agent].learning_rate
    }

    fn activity(&self, agent: AgentId) -> ActivityKind {
        self.agents[&agent].activity
    }

    fn current_duty(&self, agent: AgentId) -> Option<Duty> {
        self.agents[&agent].duty
    }

    fn is_at(&self, agent: AgentId, station: FixtureId) -> bool {
        self.auto_attend
            && matches!(
                self.agents[&agent].duty,
                Some(Duty::Attend { station: s }) if s == station
            )
    }

    fn can_reach(&self, agent: AgentId, _fixture: FixtureId) -> bool {
        !self.agents[&agent].off_site
    }

    fn interrupt(&mut self, agent: AgentId) {
        let record = self.agent_mut(agent);
        record.interrupts += 1;
        record.activity = ActivityKind::Idle;
    }

    fn set_duty(&mut self, agent: AgentId, duty: Duty) {
        self.agent_mut(agent).duty = Some(duty);
    }

    fn clear_duty(&mut self, agent: AgentId) {
        self.agent_mut(agent).duty = None;
    }

    fn grant_skill_xp(&mut self, agent: AgentId, skill: SkillId, xp: f32) {
        *self.agent_mut(agent).xp.entry(skill).or_insert(0.0) += xp;
    }

    fn satisfy_learning(&mut self, agent: AgentId, amount: f32) {
        self.agent_mut(agent).learning += amount;
    }

    fn grant_growth_tick(&mut self, agent: AgentId) {
        self.agent_mut(agent).growth_ticks += 1;
    }

    fn grant_credential(&mut self, agent: AgentId, tier: CredentialTier) {
        self.agent_mut(agent).credential = tier;
    }
}

#[derive(Debug, Clone)]
pub struct MockFacilities {
    site: SiteId,
    fixture: FixtureId,
    fixture_usable: bool,
    stations: HashMap<StationKind, Vec<FixtureId>>,
    devices: Vec<SignalDevice>,
    occupants: HashMap<FixtureId, AgentId>,
    environment: f32,
}

impl MockFacilities {
    /// One classroom fixture on the given site, no stations or devices yet.
    pub fn new(site: SiteId) -> Self {
        Self {
            site,
            fixture: FixtureId(Uuid::new_v4()),
            fixture_usable: true,
            stations: HashMap::new(),
            devices: Vec::new(),
            occupants: HashMap::new(),
            environment: 1.0,
        }
    }

    pub fn fixture(&self) -> FixtureId {
        self.fixture
    }

    pub fn add_stations(&mut self, kind: StationKind, count: usize) -> Vec<FixtureId> {
        let new: Vec<FixtureId> = (0..count).map(|_| FixtureId(Uuid::new_v4())).collect();
        self.stations.entry(kind).or_default().extend(&new);
        new
    }

    pub fn add_device(&mut self, automatic: bool, powered: bool) -> FixtureId {
        let id = FixtureId(Uuid::new_v4());
        self.devices.push(SignalDevice {
            id,
            site: self.site,
            automatic,
            powered,
        });
        id
    }

    pub fn set_occupant(&mut self, station: FixtureId, agent: AgentId) {
        self.occupants.insert(station, agent);
    }

    pub fn set_environment(&mut self, modifier: f32) {
        self.environment = modifier;
    }

    pub fn destroy_fixture(&mut self) {
        self.fixture_usable = false;
    }

    pub fn restore_fixture(&mut self) {
        self.fixture_usable = true;
    }
}

impl FacilityDirectory for MockFacilities {
    fn fixture_usable(&self, fixture: FixtureId) -> bool {
        fixture == self.fixture && self.fixture_usable
    }

    fn fixture_site(&self, fixture: FixtureId) -> Option<SiteId> {
        (fixture == self.fixture).then_some(self.site)
    }

    fn linked_stations(&self, fixture: FixtureId, kind: StationKind) -> Vec<FixtureId> {
        if fixture != self.fixture {
            return Vec::new();
        }
        self.stations.get(&kind).cloned().unwrap_or_default()
    }

    fn signal_devices(&self, site: SiteId) -> Vec<SignalDevice> {
        self.devices
            .iter()
            .copied()
            .filter(|device| device.site == site)
            .collect()
    }

    fn occupant(&self, station: FixtureId) -> Option<AgentId> {
        self.occupants.get(&station).copied()
    }

    fn environment_modifier(&self, _fixture: FixtureId) -> f32 {
        self.environment
    }
}
