//! Experiment type definitions

use std::fmt;

/// Experiments the orchestrator knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Experiment {
    /// Timed concurrent job fan-out
    Tasks,
    /// Shared counter under LOCKED and/or ATOMIC discipline
    Counter,
    /// Producer/consumer handoff over a channel
    Pipeline,
    /// Odd/even split across two workers
    Parity,
}

impl Experiment {
    /// Parse experiment from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "tasks" | "task" | "jobs" => Some(Self::Tasks),
            "counter" | "count" => Some(Self::Counter),
            "pipeline" | "channel" => Some(Self::Pipeline),
            "parity" | "odd-even" | "odd_even" => Some(Self::Parity),
            _ => None,
        }
    }

    /// Get display name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tasks => "TASKS",
            Self::Counter => "COUNTER",
            Self::Pipeline => "PIPELINE",
            Self::Parity => "PARITY",
        }
    }

    pub fn all() -> &'static [Experiment] {
        &[Self::Tasks, Self::Counter, Self::Pipeline, Self::Parity]
    }
}

impl fmt::Display for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(Experiment::parse("tasks"), Some(Experiment::Tasks));
        assert_eq!(Experiment::parse(" Counter "), Some(Experiment::Counter));
        assert_eq!(Experiment::parse("channel"), Some(Experiment::Pipeline));
        assert_eq!(Experiment::parse("odd-even"), Some(Experiment::Parity));
        assert_eq!(Experiment::parse("sql"), None);
    }

    #[test]
    fn test_round_trip_names() {
        for exp in Experiment::all() {
            assert_eq!(Experiment::parse(exp.as_str()), Some(*exp));
        }
    }
}
