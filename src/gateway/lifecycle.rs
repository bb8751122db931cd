//! Gateway lifecycle: `installing → activating → active`.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Populating the static generation from the install manifest.
    Installing,
    /// Deleting stale generations.
    Activating,
    /// Intercepting requests.
    Active,
}

impl LifecycleState {
    /// The state a successful handler for `self` moves to.
    pub fn next(&self) -> Option<LifecycleState> {
        match self {
            LifecycleState::Installing => Some(LifecycleState::Activating),
            LifecycleState::Activating => Some(LifecycleState::Active),
            LifecycleState::Active => None,
        }
    }

    pub fn can_intercept(&self) -> bool {
        matches!(self, LifecycleState::Active)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Installing => write!(f, "installing"),
            LifecycleState::Activating => write!(f, "activating"),
            LifecycleState::Active => write!(f, "active"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        assert_eq!(LifecycleState::Installing.next(), Some(LifecycleState::Activating));
        assert_eq!(LifecycleState::Activating.next(), Some(LifecycleState::Active));
        assert_eq!(LifecycleState::Active.next(), None);
        assert!(LifecycleState::Active.can_intercept());
        assert!(!LifecycleState::Activating.can_intercept());
    }
}
