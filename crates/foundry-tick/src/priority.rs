//! Task priority tiers.

/// Relative importance of a scheduled task.
///
/// Within a tick, ready tasks sharing an execute-tick are released
/// highest-priority first. [`Priority::Critical`] tasks are also exempt
/// from budget-based deferral: they always run this tick even if the
/// global budget has already been spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Normal,
    High,
    /// Never deferred for budget reasons.
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}
