/// Lifecycle of one supervised run.
///
/// A run moves through `Started` into `Running` and ends in exactly one of
/// the terminal states. The enum carries no presentation: emoji and other
/// channel-specific decoration belong to the reporter that renders it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Started,
    Running,
    /// Every job ran and exited zero.
    Completed,
    /// Every job ran, at least one exited nonzero.
    CompletedWithErrors,
    /// An interrupt stopped the run before the job list was exhausted.
    Interrupted,
    /// The supervisor itself hit an unrecoverable error.
    Crashed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Started | RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RunStatus::Started => "STARTED",
            RunStatus::Running => "RUNNING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::CompletedWithErrors => "COMPLETED WITH ERRORS",
            RunStatus::Interrupted => "INTERRUPTED",
            RunStatus::Crashed => "CRASHED",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_labels() {
        assert_eq!(RunStatus::Started.to_string(), "STARTED");
        assert_eq!(RunStatus::CompletedWithErrors.to_string(), "COMPLETED WITH ERRORS");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!RunStatus::Started.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::CompletedWithErrors.is_terminal());
        assert!(RunStatus::Interrupted.is_terminal());
        assert!(RunStatus::Crashed.is_terminal());
    }
}
