//! Desired presence of a managed path.

use serde::{Deserialize, Serialize};

/// Whether a managed path should exist.
///
/// # Examples
///
/// ```
/// use fr_core::ResourceState;
///
/// assert_eq!(ResourceState::default(), ResourceState::Present);
/// assert_eq!(ResourceState::Absent.label(), "absent");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    /// The path must exist and match the desired content.
    #[default]
    Present,

    /// The path must not exist.
    Absent,
}

impl ResourceState {
    /// Returns the configuration spelling of this state.
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }

    /// Returns `true` for [`ResourceState::Absent`].
    #[inline]
    #[must_use]
    pub const fn is_absent(self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serialization() {
        assert_eq!(
            serde_json::to_string(&ResourceState::Present).expect("serialize"),
            r#""present""#
        );
        let parsed: ResourceState = serde_json::from_str(r#""absent""#).expect("deserialize");
        assert!(parsed.is_absent());
    }

    #[test]
    fn test_state_rejects_unknown() {
        assert!(serde_json::from_str::<ResourceState>(r#""exists""#).is_err());
    }
}
