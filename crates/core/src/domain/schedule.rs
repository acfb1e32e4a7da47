//! Per-agent per-hour activity tables and window conflict detection.
//!
//! Every agent has exactly one label per hour of the day. Session windows are
//! circular: `(22, 3)` covers 22:00 through 03:00 across midnight. All writes
//! go through the registry so the one-label-per-hour invariant holds.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{AgentId, GroupId};
use crate::settings::Settings;

pub const HOURS_PER_DAY: usize = 24;

/// What an hour is reserved for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLabel {
    Day,
    Night,
    Session(GroupId),
}

/// A circular `[start_hour, end_hour]` window, inclusive on both ends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl ScheduleWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    /// Containment with wraparound: a window whose start is past its end
    /// crosses midnight.
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour <= self.end_hour
        } else {
            hour >= self.start_hour || hour <= self.end_hour
        }
    }

    pub fn hours(&self) -> impl Iterator<Item = u32> + '_ {
        (0..HOURS_PER_DAY as u32).filter(|hour| self.contains(*hour))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleRegistry {
    tables: HashMap<AgentId, Vec<ActivityLabel>>,
    day_start_hour: u32,
    day_end_hour: u32,
}

impl ScheduleRegistry {
    pub fn new(settings: &Settings) -> Self {
        Self {
            tables: HashMap::new(),
            day_start_hour: settings.day_start_hour,
            day_end_hour: settings.day_end_hour,
        }
    }

    /// Rest label outside sessions: day for the configured daytime range,
    /// night otherwise.
    pub fn default_label(&self, hour: u32) -> ActivityLabel {
        if hour >= self.day_start_hour && hour <= self.day_end_hour {
            ActivityLabel::Day
        } else {
            ActivityLabel::Night
        }
    }

    /// True iff some hour of the day lies inside both windows. Symmetric, and
    /// reflexive for any window (every window contains its own start hour).
    pub fn has_conflict(first: ScheduleWindow, second: ScheduleWindow) -> bool {
        (0..HOURS_PER_DAY as u32).any(|hour| first.contains(hour) && second.contains(hour))
    }

    pub fn set_assignment(&mut self, agent: AgentId, hour: u32, label: ActivityLabel) {
        let table = self.table_mut(agent);
        if let Some(slot) = table.get_mut(hour as usize) {
            *slot = label;
        }
    }

    pub fn assignment(&self, agent: AgentId, hour: u32) -> ActivityLabel {
        self.tables
            .get(&agent)
            .and_then(|table| table.get(hour as usize).copied())
            .unwrap_or_else(|| self.default_label(hour))
    }

    /// Whether the agent's slot at `hour` belongs to the given group.
    pub fn is_scheduled_for(&self, agent: AgentId, group_id: GroupId, hour: u32) -> bool {
        self.assignment(agent, hour) == ActivityLabel::Session(group_id)
    }

    /// Write the group's label into every window hour of every participant.
    pub fn apply_schedule(&mut self, group_id: GroupId, window: ScheduleWindow, agents: &[AgentId]) {
        for agent in agents {
            for hour in window.hours() {
                self.set_assignment(*agent, hour, ActivityLabel::Session(group_id));
            }
        }
    }

    /// Reset every window hour of every participant to the per-hour default.
    pub fn clear_schedule(&mut self, window: ScheduleWindow, agents: &[AgentId]) {
        for agent in agents {
            for hour in window.hours() {
                let label = self.default_label(hour);
                self.set_assignment(*agent, hour, label);
            }
        }
    }

    /// Remove every remaining trace of a group, wherever it ended up. Covers
    /// rows orphaned by reschedules or student removals.
    pub fn scrub_group(&mut self, group_id: GroupId) {
        let defaults: Vec<ActivityLabel> =
            (0..HOURS_PER_DAY as u32).map(|h| self.default_label(h)).collect();
        for table in self.tables.values_mut() {
            for (hour, slot) in table.iter_mut().enumerate() {
                if *slot == ActivityLabel::Session(group_id) {
                    *slot = defaults[hour];
                }
            }
        }
    }

    /// Fetch an agent's table, repairing missing or short tables by padding
    /// with default labels. Malformed tables are never an error.
    fn table_mut(&mut self, agent: AgentId) -> &mut Vec<ActivityLabel> {
        let day_start = self.day_start_hour;
        let day_end = self.day_end_hour;
        let table = self.tables.entry(agent).or_default();
        if table.len() < HOURS_PER_DAY {
            for hour in table.len() as u32..HOURS_PER_DAY as u32 {
                let label = if hour >= day_start && hour <= day_end {
                    ActivityLabel::Day
                } else {
                    ActivityLabel::Night
                };
                table.push(label);
            }
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ScheduleRegistry {
        ScheduleRegistry::new(&Settings::default())
    }

    #[test]
    fn test_window_wraparound_contains() {
        let window = ScheduleWindow::new(22, 3);
        let inside: Vec<u32> = (0..24).filter(|h| window.contains(*h)).collect();
        assert_eq!(inside, vec![0, 1, 2, 3, 22, 23]);
    }

    #[test]
    fn test_conflict_symmetric() {
        for (a, b, c, d) in [(8, 10, 9, 11), (22, 3, 2, 5), (0, 0, 23, 1), (4, 6, 8, 10)] {
            let first = ScheduleWindow::new(a, b);
            let second = ScheduleWindow::new(c, d);
            assert_eq!(
                ScheduleRegistry::has_conflict(first, second),
                ScheduleRegistry::has_conflict(second, first),
            );
        }
    }

    #[test]
    fn test_conflict_reflexive() {
        let window = ScheduleWindow::new(13, 15);
        assert!(ScheduleRegistry::has_conflict(window, window));
    }

    #[test]
    fn test_disjoint_windows_do_not_conflict() {
        assert!(!ScheduleRegistry::has_conflict(
            ScheduleWindow::new(4, 6),
            ScheduleWindow::new(8, 10),
        ));
    }

    #[test]
    fn test_apply_and_clear_schedule() {
        let mut registry = registry();
        let agent = AgentId::new();
        let window = ScheduleWindow::new(20, 2);
        registry.apply_schedule(GroupId(1), window, &[agent]);

        assert_eq!(
            registry.assignment(agent, 21),
            ActivityLabel::Session(GroupId(1))
        );
        assert_eq!(
            registry.assignment(agent, 1),
            ActivityLabel::Session(GroupId(1))
        );
        assert_eq!(registry.assignment(agent, 12), ActivityLabel::Day);

        registry.clear_schedule(window, &[agent]);
        assert_eq!(registry.assignment(agent, 21), ActivityLabel::Day);
        assert_eq!(registry.assignment(agent, 1), ActivityLabel::Night);
    }

    #[test]
    fn test_clear_schedule_idempotent() {
        let mut registry = registry();
        let agent = AgentId::new();
        let window = ScheduleWindow::new(8, 10);
        registry.apply_schedule(GroupId(2), window, &[agent]);

        registry.clear_schedule(window, &[agent]);
        let once: Vec<ActivityLabel> =
            (0..24).map(|h| registry.assignment(agent, h)).collect();
        registry.clear_schedule(window, &[agent]);
        let twice: Vec<ActivityLabel> =
            (0..24).map(|h| registry.assignment(agent, h)).collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_short_table_repaired_on_write() {
        let mut registry = registry();
        let agent = AgentId::new();
        registry
            .tables
            .insert(agent, vec![ActivityLabel::Day; 5]);

        registry.set_assignment(agent, 23, ActivityLabel::Session(GroupId(4)));
        assert_eq!(registry.tables[&agent].len(), HOURS_PER_DAY);
        assert_eq!(
            registry.assignment(agent, 23),
            ActivityLabel::Session(GroupId(4))
        );
        assert_eq!(registry.assignment(agent, 10), ActivityLabel::Day);
    }

    #[test]
    fn test_scrub_group_clears_orphans() {
        let mut registry = registry();
        let agent = AgentId::new();
        registry.apply_schedule(GroupId(7), ScheduleWindow::new(9, 11), &[agent]);
        registry.scrub_group(GroupId(7));
        assert_eq!(registry.assignment(agent, 10), ActivityLabel::Day);
    }
}
