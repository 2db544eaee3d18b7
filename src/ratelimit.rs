use std::time::{Duration, Instant};

/// Cooldown gate for in-progress notifications.
///
/// Jobs can finish far faster than anyone wants their Slack client to
/// buzz, so mid-run reports pass through this gate: at most one allowance
/// per cooldown window. Run-start and run-end reports never consult it.
pub struct NotifyGate {
    cooldown: Duration,
    last_allowed: Option<Instant>,
}

impl NotifyGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_allowed: None,
        }
    }

    /// True when the cooldown window since the last allowance has fully
    /// elapsed. The first call always allows. A denied call leaves the
    /// window untouched.
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        match self.last_allowed {
            Some(last) if now.duration_since(last) <= self.cooldown => false,
            _ => {
                self.last_allowed = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_call_allows() {
        let mut gate = NotifyGate::new(Duration::from_secs(60));
        assert!(gate.allow());
    }

    #[test]
    fn test_calls_within_cooldown_denied() {
        let mut gate = NotifyGate::new(Duration::from_secs(60));
        assert!(gate.allow());
        assert!(!gate.allow());
        assert!(!gate.allow());
    }

    #[test]
    fn test_allows_again_after_cooldown() {
        let mut gate = NotifyGate::new(Duration::from_millis(50));
        assert!(gate.allow());
        assert!(!gate.allow());
        std::thread::sleep(Duration::from_millis(80));
        assert!(gate.allow());
    }

    #[test]
    fn test_denied_call_does_not_extend_window() {
        let mut gate = NotifyGate::new(Duration::from_millis(200));
        assert!(gate.allow());
        std::thread::sleep(Duration::from_millis(50));
        assert!(!gate.allow());
        std::thread::sleep(Duration::from_millis(250));
        // 300ms since the allowance; the denied call at 50ms must not count
        assert!(gate.allow());
    }
}
