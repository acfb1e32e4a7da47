//! Engine tuning values.
//!
//! Everything here is plain data with serde defaults so a partially written
//! config reloads cleanly. Hosts construct one `Settings` per world and hand
//! it to the engine; nothing in this crate reads global state.

use serde::{Deserialize, Serialize};

use crate::domain::ActivityKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Multiplier applied to every learning-need gain.
    pub global_learning_speed: f32,
    /// Multiplier for skill-session progress and XP.
    pub skill_session_speed: f32,
    /// Multiplier for certification-session progress.
    pub certification_session_speed: f32,
    /// Multiplier for childcare lesson XP.
    pub childcare_session_speed: f32,

    /// First hour of the daytime default label (exclusive lower bound is
    /// `day_start_hour - 1`).
    pub day_start_hour: u32,
    /// Last hour of the daytime default label (inclusive).
    pub day_end_hour: u32,

    /// Simulated ticks per in-world hour.
    pub ticks_per_hour: u64,
    /// Cadence of the launcher scan, in ticks.
    pub launch_interval: u64,
    /// Cadence of the automatic signal-device poll while ringing, in ticks.
    pub bell_poll_interval: u64,
    /// Grace period before a finite-goal session may start with a partial
    /// class, in ticks.
    pub max_wait_ticks: u64,
    /// How often a childcare session re-rolls its taught skill, in ticks.
    pub lesson_reroll_interval: u64,

    /// Activities a bell is allowed to interrupt when the classroom asks for
    /// gentle interruption.
    pub interruptible: Vec<ActivityKind>,
}

impl Settings {
    /// Daytime test used for default schedule labels.
    pub fn is_daytime(&self, hour: u32) -> bool {
        hour >= self.day_start_hour && hour <= self.day_end_hour
    }

    pub fn hour_of_day(&self, now: u64) -> u32 {
        ((now / self.ticks_per_hour) % 24) as u32
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            global_learning_speed: 1.0,
            skill_session_speed: 1.0,
            certification_session_speed: 1.0,
            childcare_session_speed: 1.0,
            day_start_hour: 6,
            day_end_hour: 21,
            ticks_per_hour: 2500,
            launch_interval: 180,
            bell_poll_interval: 60,
            max_wait_ticks: 2500,
            lesson_reroll_interval: 2500,
            interruptible: vec![
                ActivityKind::Idle,
                ActivityKind::Asleep,
                ActivityKind::Leisure,
                ActivityKind::Meditation,
                ActivityKind::Research,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daytime_boundary() {
        let settings = Settings::default();
        assert!(!settings.is_daytime(5));
        assert!(settings.is_daytime(6));
        assert!(settings.is_daytime(21));
        assert!(!settings.is_daytime(22));
    }

    #[test]
    fn test_hour_of_day_wraps() {
        let settings = Settings::default();
        assert_eq!(settings.hour_of_day(0), 0);
        assert_eq!(settings.hour_of_day(2500 * 23), 23);
        assert_eq!(settings.hour_of_day(2500 * 24), 0);
    }

    #[test]
    fn test_partial_config_reloads() {
        let settings: Settings = serde_json::from_str(r#"{"day_end_hour": 20}"#).unwrap();
        assert_eq!(settings.day_end_hour, 20);
        assert_eq!(settings.launch_interval, 180);
    }
}
