//! The unit lifecycle state machine.

/// The lifecycle state of a loaded unit.
///
/// Legal transitions:
///
/// ```text
/// Discovered → Loading → {Loaded, Failed}
/// Loaded → Enabling → {Enabled, Failed}
/// Enabled → Disabling → Disabled
/// Disabled → Enabling → Enabled   (re-enable)
/// {Loaded, Disabled} → Unloading → Unloaded
/// ```
///
/// `Failed` is terminal until the unit is unloaded. Only `Enabled` is
/// "active" — the state a unit's dependents should expect it to be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitState {
    Discovered,
    Loading,
    Loaded,
    Enabling,
    Enabled,
    Disabling,
    Disabled,
    Unloading,
    Unloaded,
    Failed,
}

impl UnitState {
    /// Whether `self` can legally transition directly to `target`.
    pub fn can_transition_to(self, target: Self) -> bool {
        use UnitState::*;
        matches!(
            (self, target),
            (Discovered, Loading)
                | (Loading, Loaded)
                | (Loading, Failed)
                | (Loaded, Enabling)
                | (Enabling, Enabled)
                | (Enabling, Failed)
                | (Enabled, Disabling)
                | (Disabling, Disabled)
                | (Disabled, Enabling)
                | (Loaded, Unloading)
                | (Disabled, Unloading)
                | (Unloading, Unloaded)
        )
    }

    /// Whether this unit is currently running its active lifecycle hooks.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

impl std::fmt::Display for UnitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Discovered => "Discovered",
            Self::Loading => "Loading",
            Self::Loaded => "Loaded",
            Self::Enabling => "Enabling",
            Self::Enabled => "Enabled",
            Self::Disabling => "Disabling",
            Self::Disabled => "Disabled",
            Self::Unloading => "Unloading",
            Self::Unloaded => "Unloaded",
            Self::Failed => "Failed",
        };
        write!(f, "{name}")
    }
}
