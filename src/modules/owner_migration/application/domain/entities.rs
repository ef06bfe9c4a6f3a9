use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One of the three disjoint identity domains a record owner can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityDomain {
    /// Service-provider staff (`users`).
    Provider,
    /// Organization-affiliated users (`org_users`).
    Organization,
    /// Client-company users (`client_users`).
    Client,
}

impl IdentityDomain {
    /// Column order used for DDL: provider, organization, client.
    pub const ALL: [IdentityDomain; 3] = [
        IdentityDomain::Provider,
        IdentityDomain::Organization,
        IdentityDomain::Client,
    ];

    /// Discriminant value stored in `<prefix>_type`.
    pub fn tag(&self) -> &'static str {
        match self {
            IdentityDomain::Provider => "provider",
            IdentityDomain::Organization => "organization",
            IdentityDomain::Client => "client",
        }
    }

    /// Identity table backing this domain. Primary key is always `id`.
    pub fn table(&self) -> &'static str {
        match self {
            IdentityDomain::Provider => "users",
            IdentityDomain::Organization => "org_users",
            IdentityDomain::Client => "client_users",
        }
    }

    /// Suffix appended to a relation's owner prefix to name the FK column.
    pub fn column_suffix(&self) -> &'static str {
        match self {
            IdentityDomain::Provider => "user_id",
            IdentityDomain::Organization => "org_user_id",
            IdentityDomain::Client => "client_user_id",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "provider" => Some(IdentityDomain::Provider),
            "organization" => Some(IdentityDomain::Organization),
            "client" => Some(IdentityDomain::Client),
            _ => None,
        }
    }
}

impl fmt::Display for IdentityDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

//
// ──────────────────────────────────────────────────────────
// Owner (tagged union)
// ──────────────────────────────────────────────────────────
// Relational encoding:
// - Unset           => type NULL,           every ref NULL
// - Provider(id)    => type 'provider',     only provider ref set
// - Organization(id)=> type 'organization', only organization ref set
// - Client(id)      => type 'client',       only client ref set
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Owner {
    #[default]
    Unset,
    Provider(Uuid),
    Organization(Uuid),
    Client(Uuid),
}

impl Owner {
    pub fn from_domain(domain: IdentityDomain, id: Uuid) -> Self {
        match domain {
            IdentityDomain::Provider => Owner::Provider(id),
            IdentityDomain::Organization => Owner::Organization(id),
            IdentityDomain::Client => Owner::Client(id),
        }
    }

    pub fn domain(&self) -> Option<IdentityDomain> {
        match self {
            Owner::Unset => None,
            Owner::Provider(_) => Some(IdentityDomain::Provider),
            Owner::Organization(_) => Some(IdentityDomain::Organization),
            Owner::Client(_) => Some(IdentityDomain::Client),
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        match self {
            Owner::Unset => None,
            Owner::Provider(id) | Owner::Organization(id) | Owner::Client(id) => Some(*id),
        }
    }

    /// Reference stored in the FK column of `domain`, `None` for every other domain.
    pub fn reference_for(&self, domain: IdentityDomain) -> Option<Uuid> {
        if self.domain() == Some(domain) {
            self.id()
        } else {
            None
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Owner::Unset)
    }

    pub fn to_columns(&self) -> OwnerColumns {
        OwnerColumns {
            owner_type: self.domain().map(|d| d.tag().to_string()),
            provider_ref: self.reference_for(IdentityDomain::Provider),
            organization_ref: self.reference_for(IdentityDomain::Organization),
            client_ref: self.reference_for(IdentityDomain::Client),
        }
    }
}

/// Raw column values of one polymorphic reference, as read from storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerColumns {
    pub owner_type: Option<String>,
    pub provider_ref: Option<Uuid>,
    pub organization_ref: Option<Uuid>,
    pub client_ref: Option<Uuid>,
}

impl OwnerColumns {
    fn reference(&self, domain: IdentityDomain) -> Option<Uuid> {
        match domain {
            IdentityDomain::Provider => self.provider_ref,
            IdentityDomain::Organization => self.organization_ref,
            IdentityDomain::Client => self.client_ref,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OwnerColumnsError {
    #[error("Unknown owner type: {0}")]
    UnknownType(String),

    #[error("Owner type is {0} but its reference column is null")]
    MissingReference(IdentityDomain),

    #[error("Owner type is {owner_type} but the {stray} reference is also set")]
    StrayReference {
        owner_type: String,
        stray: IdentityDomain,
    },
}

impl TryFrom<OwnerColumns> for Owner {
    type Error = OwnerColumnsError;

    fn try_from(columns: OwnerColumns) -> Result<Self, Self::Error> {
        let domain = match columns.owner_type.as_deref() {
            None => None,
            Some(tag) => Some(
                IdentityDomain::from_tag(tag)
                    .ok_or_else(|| OwnerColumnsError::UnknownType(tag.to_string()))?,
            ),
        };

        for other in IdentityDomain::ALL {
            if Some(other) != domain && columns.reference(other).is_some() {
                return Err(OwnerColumnsError::StrayReference {
                    owner_type: columns.owner_type.clone().unwrap_or_else(|| "null".into()),
                    stray: other,
                });
            }
        }

        match domain {
            None => Ok(Owner::Unset),
            Some(domain) => columns
                .reference(domain)
                .map(|id| Owner::from_domain(domain, id))
                .ok_or(OwnerColumnsError::MissingReference(domain)),
        }
    }
}
