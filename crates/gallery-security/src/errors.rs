use gallery_core::{AlbumId, DomainError, GalleryId, Permission};
use serde::Serialize;

/// The safety rule a rejected role mutation ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationRule {
    LastSiteAdministrator,
    SelfLockout,
    Elevation,
    GalleryScope,
    DuplicateRole,
    Rename,
    OwnerRoleAdministration,
}

impl MutationRule {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LastSiteAdministrator => "last_site_administrator",
            Self::SelfLockout => "self_lockout",
            Self::Elevation => "elevation",
            Self::GalleryScope => "gallery_scope",
            Self::DuplicateRole => "duplicate_role",
            Self::Rename => "rename",
            Self::OwnerRoleAdministration => "owner_role_administration",
        }
    }
}

impl std::fmt::Display for MutationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyFault {
    Cycle,
    DanglingReference,
}

impl HierarchyFault {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cycle => "cycle",
            Self::DanglingReference => "dangling_reference",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SecurityError {
    #[error("access denied: {permissions:?} on album {album_id} in gallery {gallery_id}")]
    AccessDenied {
        permissions: Vec<Permission>,
        album_id: AlbumId,
        gallery_id: GalleryId,
    },
    #[error("access denied: {0}")]
    NotAdministrator(String),
    #[error("role not found: {0}")]
    RoleNotFound(String),
    #[error("invalid role mutation ({rule}): {reason}")]
    InvalidRoleMutation { rule: MutationRule, reason: String },
    #[error("malformed album hierarchy at album {album_id}: {}", fault.as_str())]
    MalformedAlbumHierarchy {
        album_id: AlbumId,
        fault: HierarchyFault,
    },
    #[error("role repository failure: {0}")]
    Repository(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl SecurityError {
    pub(crate) fn mutation(rule: MutationRule, reason: impl Into<String>) -> Self {
        Self::InvalidRoleMutation {
            rule,
            reason: reason.into(),
        }
    }

    /// True for the refusal kinds callers surface as "forbidden".
    #[must_use]
    pub const fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. } | Self::NotAdministrator(_))
    }
}

pub type Result<T, E = SecurityError> = std::result::Result<T, E>;

/// Installs the JSON tracing subscriber hosts use in production.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(true)
        .with_span_list(true)
        .try_init();
}
