use serde::{Deserialize, Serialize};
use timebank_core::{AppError, AppResult, NonEmptyString};

/// Maximum length of one identifier part, matching PostgreSQL's `NAMEDATALEN - 1`.
pub const RELATION_IDENTIFIER_MAX_LENGTH: usize = 63;

/// A named precomputed aggregate view refreshed on a cadence.
///
/// `relation` is the storage-level target the store refreshes. It is kept
/// separate from `name` so operators can rename a view's relation without
/// changing how it is reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateViewDefinition {
    name: NonEmptyString,
    relation: String,
    concurrent_refresh_supported: bool,
}

impl AggregateViewDefinition {
    /// Creates a validated aggregate view definition.
    ///
    /// The relation must be a plain or schema-qualified lowercase identifier,
    /// since it is interpolated into refresh statements rather than bound.
    pub fn new(
        name: impl Into<String>,
        relation: impl Into<String>,
        concurrent_refresh_supported: bool,
    ) -> AppResult<Self> {
        let name = NonEmptyString::new(name)?;
        let relation = relation.into();
        validate_relation(relation.as_str())?;

        Ok(Self {
            name,
            relation,
            concurrent_refresh_supported,
        })
    }

    /// Creates a definition whose relation has the same name as the view.
    pub fn named(name: impl Into<String>, concurrent_refresh_supported: bool) -> AppResult<Self> {
        let name = name.into();
        Self::new(name.clone(), name, concurrent_refresh_supported)
    }

    /// Returns the unique view name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the storage relation refreshed for this view.
    #[must_use]
    pub fn relation(&self) -> &str {
        self.relation.as_str()
    }

    /// Returns whether the view can be refreshed without blocking readers.
    #[must_use]
    pub fn concurrent_refresh_supported(&self) -> bool {
        self.concurrent_refresh_supported
    }
}

fn validate_relation(relation: &str) -> AppResult<()> {
    let parts: Vec<&str> = relation.split('.').collect();
    if parts.len() > 2 {
        return Err(AppError::Validation(format!(
            "aggregate relation '{relation}' may have at most one schema qualifier"
        )));
    }

    for part in parts {
        if !is_valid_identifier(part) {
            return Err(AppError::Validation(format!(
                "aggregate relation '{relation}' contains invalid identifier '{part}'"
            )));
        }
    }

    Ok(())
}

fn is_valid_identifier(part: &str) -> bool {
    let mut characters = part.chars();
    let Some(first) = characters.next() else {
        return false;
    };

    part.len() <= RELATION_IDENTIFIER_MAX_LENGTH
        && (first.is_ascii_lowercase() || first == '_')
        && characters.all(|character| {
            character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_'
        })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::AggregateViewDefinition;

    #[test]
    fn schema_qualified_relation_is_accepted() {
        let view = AggregateViewDefinition::new("reputation", "reporting.mv_user_reputation", true);
        assert!(view.is_ok());
        assert_eq!(
            view.ok().map(|view| view.relation().to_owned()),
            Some("reporting.mv_user_reputation".to_owned())
        );
    }

    #[test]
    fn injection_attempts_are_rejected() {
        assert!(AggregateViewDefinition::named("mv; DROP TABLE users", false).is_err());
        assert!(AggregateViewDefinition::named("a.b.c", false).is_err());
        assert!(AggregateViewDefinition::named("\"quoted\"", false).is_err());
        assert!(AggregateViewDefinition::named("", false).is_err());
    }

    proptest! {
        #[test]
        fn lowercase_identifiers_are_accepted(relation in "[a-z_][a-z0-9_]{0,62}") {
            prop_assert!(AggregateViewDefinition::named(relation, false).is_ok());
        }

        #[test]
        fn identifiers_with_uppercase_are_rejected(relation in "[a-z_]{0,10}[A-Z][a-z_]{0,10}") {
            prop_assert!(AggregateViewDefinition::named(relation, true).is_err());
        }
    }
}
