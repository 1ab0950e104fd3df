//! Step identities, including the two terminal sentinels.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::OnceLock;

/// Stable identity of a migration step.
///
/// Names double as keys in the run's aggregate status, so they are
/// upper-case identifiers such as `EXECUTE_CDI_DETAIL_TABLE_MIGRATION`.
/// `END` and `ERROR` are reserved for the terminal states.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepName(String);

impl StepName {
    /// Name of the successful terminal state.
    pub const END: &'static str = "END";
    /// Name of the failed terminal state.
    pub const ERROR: &'static str = "ERROR";

    /// Creates a step name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The successful terminal state.
    #[must_use]
    pub fn end() -> Self {
        Self(Self::END.to_string())
    }

    /// The failed terminal state.
    #[must_use]
    pub fn error() -> Self {
        Self(Self::ERROR.to_string())
    }

    /// Builds the conventional name of the step migrating `table`.
    ///
    /// ```
    /// use datamigration::core::StepName;
    ///
    /// let name = StepName::for_table("cdi_detail");
    /// assert_eq!(name.as_str(), "EXECUTE_CDI_DETAIL_TABLE_MIGRATION");
    /// ```
    #[must_use]
    pub fn for_table(table: &str) -> Self {
        Self(format!("EXECUTE_{}_TABLE_MIGRATION", table.trim().to_uppercase()))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for `END`.
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.0 == Self::END
    }

    /// Returns true for `ERROR`.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.0 == Self::ERROR
    }

    /// Returns true if the driver must halt on this state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.is_end() || self.is_error()
    }

    /// Returns true if the name is an upper-case identifier.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        identifier_pattern().is_some_and(|pattern| pattern.is_match(&self.0))
    }
}

fn identifier_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").ok())
        .as_ref()
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StepName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for StepName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for StepName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_terminal_sentinels() {
        assert!(StepName::end().is_terminal());
        assert!(StepName::error().is_terminal());
        assert!(StepName::end().is_end());
        assert!(StepName::error().is_error());
        assert!(!StepName::new("EXECUTE_CODIFICHE_TABLE_MIGRATION").is_terminal());
    }

    #[test]
    fn test_for_table() {
        assert_eq!(
            StepName::for_table("intermediari_psp").as_str(),
            "EXECUTE_INTERMEDIARI_PSP_TABLE_MIGRATION"
        );
    }

    #[test]
    fn test_well_formed() {
        assert!(StepName::new("EXECUTE_CDI_DETAIL_TABLE_MIGRATION").is_well_formed());
        assert!(StepName::end().is_well_formed());
        assert!(!StepName::new("cdi detail").is_well_formed());
        assert!(!StepName::new("").is_well_formed());
        assert!(!StepName::new("1_STEP").is_well_formed());
    }

    #[test]
    fn test_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(StepName::new("A"), 1);
        assert_eq!(map.get("A"), Some(&1));
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let json = serde_json::to_string(&StepName::end()).unwrap();
        assert_eq!(json, r#""END""#);

        let name: StepName = serde_json::from_str(r#""ERROR""#).unwrap();
        assert!(name.is_error());
    }
}
