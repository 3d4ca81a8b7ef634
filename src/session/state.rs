//! Per-attempt session state.

use tokio::time::Instant;

/// Lifecycle of one reconnect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Disconnected,
    Connecting,
    Active,
    /// Terminal: the reconnect loop ends after this.
    Stopped,
}

/// State owned by one [`Session`](super::Session). Created fresh for every
/// reconnect attempt; only the wear score is carried over.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub status: Status,
    pub catches: u64,
    /// Set on a catch and on a timeout fallback, nothing else.
    pub last_action_at: Option<Instant>,
    /// Never negative.
    pub wear_score: f64,
    pub idle_requested: bool,
    /// Cleared at the start of every supervisor tick.
    pub recently_acted: bool,
}

impl SessionState {
    pub fn new(wear_score: f64) -> Self {
        Self {
            status: Status::Disconnected,
            catches: 0,
            last_action_at: None,
            wear_score: wear_score.max(0.0),
            idle_requested: false,
            recently_acted: false,
        }
    }

    pub fn mark_action(&mut self, now: Instant) {
        self.last_action_at = Some(now);
        self.recently_acted = true;
    }

    pub fn add_wear(&mut self, amount: f64) {
        self.wear_score = (self.wear_score + amount).max(0.0);
    }

    pub fn relieve_wear(&mut self, amount: f64) {
        self.wear_score = (self.wear_score - amount).max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_zeroed_except_wear() {
        let state = SessionState::new(7.5);
        assert_eq!(state.status, Status::Disconnected);
        assert_eq!(state.catches, 0);
        assert!(state.last_action_at.is_none());
        assert!(!state.idle_requested);
        assert!((state.wear_score - 7.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_wear_floor() {
        let mut state = SessionState::new(-3.0);
        assert!(state.wear_score.abs() < f64::EPSILON);
        state.add_wear(2.5);
        state.relieve_wear(2.0);
        state.relieve_wear(2.0);
        assert!(state.wear_score.abs() < f64::EPSILON);
        for _ in 0..10 {
            state.relieve_wear(1.0);
            state.add_wear(0.25);
            assert!(state.wear_score >= 0.0);
        }
    }

    #[test]
    fn test_mark_action() {
        let mut state = SessionState::new(0.0);
        let now = Instant::now();
        state.mark_action(now);
        assert_eq!(state.last_action_at, Some(now));
        assert!(state.recently_acted);
    }
}
