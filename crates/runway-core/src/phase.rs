//! Lifecycle phases of a runnable.

use std::fmt;

/// Phase of a runnable through its lifecycle.
///
/// ```text
/// created → initializing → running → cleaning_up → succeeded
///         ↘ cancelled    ↘ cancelled              → cancelled
///                        ↘ failed                 → failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Created,
    Initializing,
    Running,
    CleaningUp,
    Succeeded,
    Cancelled,
    Failed,
}

impl Phase {
    /// Valid next phases from the current phase.
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Created => &[Self::Initializing, Self::Cancelled, Self::Failed],
            Self::Initializing => &[Self::Running, Self::Cancelled, Self::Failed],
            Self::Running => &[Self::CleaningUp],
            Self::CleaningUp => &[Self::Succeeded, Self::Cancelled, Self::Failed],
            Self::Succeeded | Self::Cancelled | Self::Failed => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Cancelled | Self::Failed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::CleaningUp => "cleaning_up",
            Self::Succeeded => "succeeded",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
