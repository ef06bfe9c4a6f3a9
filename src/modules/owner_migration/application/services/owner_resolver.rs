use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::owner_migration::application::domain::{
    entities::{IdentityDomain, Owner},
    relation_spec::PolymorphicOwnerSpec,
};

/// Which legacy ids exist in which identity table, for one batch of rows.
#[derive(Debug, Clone, Default)]
pub struct CandidateMembership {
    present: HashMap<IdentityDomain, HashSet<Uuid>>,
}

impl CandidateMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, domain: IdentityDomain, ids: HashSet<Uuid>) {
        self.present.entry(domain).or_default().extend(ids);
    }

    pub fn contains(&self, domain: IdentityDomain, id: Uuid) -> bool {
        self.present
            .get(&domain)
            .is_some_and(|ids| ids.contains(&id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Legacy column was null.
    NoOwner,
    Resolved(Owner),
    /// Legacy id matched no candidate table.
    Orphan(Uuid),
}

impl Resolution {
    pub fn owner(&self) -> Owner {
        match self {
            Resolution::Resolved(owner) => *owner,
            Resolution::NoOwner | Resolution::Orphan(_) => Owner::Unset,
        }
    }
}

pub struct OwnerResolver;

impl OwnerResolver {
    /// Returns the first domain in `spec.precedence` whose table holds `legacy_id`.
    pub fn resolve(
        legacy_id: Option<Uuid>,
        spec: &PolymorphicOwnerSpec,
        membership: &CandidateMembership,
    ) -> Resolution {
        let Some(id) = legacy_id else {
            return Resolution::NoOwner;
        };

        spec.precedence
            .iter()
            .find(|domain| membership.contains(**domain, id))
            .map(|domain| Resolution::Resolved(Owner::from_domain(*domain, id)))
            .unwrap_or(Resolution::Orphan(id))
    }
}
