//! Error types for budget accounting.

/// Errors from configuring or querying the budget manager.
#[derive(Debug, thiserror::Error)]
pub enum BudgetError {
    /// The global tick budget fell outside `[1ms, 100ms)`.
    #[error("global tick budget {given_ms}ms is outside the allowed range [1ms, 100ms)")]
    InvalidGlobalBudget { given_ms: f64 },
}
