use serde::Serialize;

use super::entities::IdentityDomain;

/// One alternative of the tagged union: discriminant value plus its FK column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExclusivityArm {
    pub domain: IdentityDomain,
    pub column: String,
}

/// Mutual-exclusivity invariant of a polymorphic owner reference.
///
/// A row satisfies the predicate when either the discriminant and every
/// reference column are null, or the discriminant names exactly one arm whose
/// column is set while all other reference columns are null. A discriminant
/// value with no matching arm never satisfies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExclusivityPredicate {
    pub discriminant: String,
    pub arms: Vec<ExclusivityArm>,
}

impl ExclusivityPredicate {
    pub fn new(discriminant: impl Into<String>, arms: Vec<ExclusivityArm>) -> Self {
        Self {
            discriminant: discriminant.into(),
            arms,
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.discriminant.as_str())
            .chain(self.arms.iter().map(|a| a.column.as_str()))
    }

    /// Evaluates the predicate for one row.
    ///
    /// `is_set` reports whether a reference column holds a non-null value.
    pub fn holds<F>(&self, discriminant: Option<&str>, is_set: F) -> bool
    where
        F: Fn(&str) -> bool,
    {
        match discriminant {
            None => self.arms.iter().all(|arm| !is_set(&arm.column)),
            Some(tag) => match self.arms.iter().find(|arm| arm.domain.tag() == tag) {
                None => false,
                Some(active) => self.arms.iter().all(|arm| {
                    if arm.column == active.column {
                        is_set(&arm.column)
                    } else {
                        !is_set(&arm.column)
                    }
                }),
            },
        }
    }
}
