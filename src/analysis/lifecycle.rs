// src/analysis/lifecycle.rs
//
// Alert episode state machine for one entity.
//
//   Idle ──non-Normal──▶ Active ──Normal──▶ Idle
//                          │
//                          └─elapsed ≥ max (any label)──▶ Idle + cooldown stamp
//
// Cooldown is not a stored state: it is the `last_cooldown` timestamp,
// checked by the decision engine before any other rule.

use super::decision::BehaviorLabel;
use crate::types::Config;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AlertState {
    /// Start of the running episode
    pub alert_start: Option<f64>,
    /// When the last episode was force-ended
    pub last_cooldown: Option<f64>,
}

impl AlertState {
    pub fn is_active(&self) -> bool {
        self.alert_start.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Normal and no episode running
    Idle,
    /// Idle → Active. The only transition that captures a clip.
    Started,
    /// Active self-loop
    Continuing,
    /// Active → Idle because the classification returned to Normal
    Cleared,
    /// Active → Idle because the episode hit the max duration
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct AlertLifecycle {
    max_duration_seconds: f64,
}

impl AlertLifecycle {
    pub fn new(config: &Config) -> Self {
        Self {
            max_duration_seconds: config.alert.max_duration_seconds,
        }
    }

    /// Advance the episode for a freshly classified label. Returns the label
    /// to display (Normal after a timeout) and the transition taken.
    pub fn apply(
        &self,
        state: &mut AlertState,
        label: BehaviorLabel,
        now: f64,
    ) -> (BehaviorLabel, Transition) {
        // An overdue episode times out whatever the new label is
        match state.alert_start {
            Some(start) if now - start >= self.max_duration_seconds => {
                state.alert_start = None;
                state.last_cooldown = Some(now);
                (BehaviorLabel::Normal, Transition::TimedOut)
            }
            Some(_) if !label.is_alert() => {
                state.alert_start = None;
                (BehaviorLabel::Normal, Transition::Cleared)
            }
            Some(_) => (label, Transition::Continuing),
            None if !label.is_alert() => (BehaviorLabel::Normal, Transition::Idle),
            None => {
                state.alert_start = Some(now);
                (label, Transition::Started)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lifecycle() -> AlertLifecycle {
        AlertLifecycle::new(&Config::default())
    }

    #[test]
    fn test_start_then_continue() {
        let lc = lifecycle();
        let mut state = AlertState::default();

        let (label, t) = lc.apply(&mut state, BehaviorLabel::Scanning, 5.0);
        assert_eq!(t, Transition::Started);
        assert_eq!(label, BehaviorLabel::Scanning);
        assert_eq!(state.alert_start, Some(5.0));

        let (label, t) = lc.apply(&mut state, BehaviorLabel::Pacing, 8.0);
        assert_eq!(t, Transition::Continuing);
        assert_eq!(label, BehaviorLabel::Pacing);
        assert_eq!(state.alert_start, Some(5.0));
    }

    #[test]
    fn test_natural_clear_keeps_no_cooldown() {
        let lc = lifecycle();
        let mut state = AlertState::default();
        lc.apply(&mut state, BehaviorLabel::Scanning, 5.0);

        let (label, t) = lc.apply(&mut state, BehaviorLabel::Normal, 6.0);
        assert_eq!(t, Transition::Cleared);
        assert_eq!(label, BehaviorLabel::Normal);
        assert_eq!(state, AlertState::default());

        let (_, t) = lc.apply(&mut state, BehaviorLabel::Normal, 7.0);
        assert_eq!(t, Transition::Idle);
    }

    #[test]
    fn test_timeout_forces_normal_and_stamps_cooldown() {
        let lc = lifecycle();
        let mut state = AlertState::default();
        lc.apply(&mut state, BehaviorLabel::LoiteringStill, 100.0);

        let (_, t) = lc.apply(&mut state, BehaviorLabel::LoiteringStill, 109.9);
        assert_eq!(t, Transition::Continuing);

        let (label, t) = lc.apply(&mut state, BehaviorLabel::LoiteringStill, 110.0);
        assert_eq!(t, Transition::TimedOut);
        assert_eq!(label, BehaviorLabel::Normal);
        assert_eq!(state.alert_start, None);
        assert_eq!(state.last_cooldown, Some(110.0));
    }

    #[test]
    fn test_overdue_episode_times_out_even_when_normal() {
        let lc = lifecycle();
        let mut state = AlertState::default();
        lc.apply(&mut state, BehaviorLabel::Scanning, 100.0);

        let (label, t) = lc.apply(&mut state, BehaviorLabel::Normal, 110.5);
        assert_eq!(t, Transition::TimedOut);
        assert_eq!(label, BehaviorLabel::Normal);
        assert_eq!(state.alert_start, None);
        assert_eq!(state.last_cooldown, Some(110.5));
    }

    #[test]
    fn test_new_episode_after_clear_starts_again() {
        let lc = lifecycle();
        let mut state = AlertState::default();
        lc.apply(&mut state, BehaviorLabel::Scanning, 1.0);
        lc.apply(&mut state, BehaviorLabel::Normal, 2.0);
        let (_, t) = lc.apply(&mut state, BehaviorLabel::Scanning, 3.0);
        assert_eq!(t, Transition::Started);
    }
}
