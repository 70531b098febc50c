#![forbid(unsafe_code)]

mod admin_scope;
mod config;
mod errors;
mod hierarchy;
mod identity;
mod locks;
mod memory;
mod metrics;
mod naming;
mod owner_roles;
mod repository;
mod resolver;
mod role_store;
mod service;
mod validator;

pub use admin_scope::{
    administrable_galleries, can_view_role, is_gallery_administrator, is_site_administrator,
    GalleryScope,
};
pub use config::{
    SecurityConfig, DEFAULT_MIN_OWNER_TITLE_CHARS, DEFAULT_OWNER_ROLE_PREFIX,
    DEFAULT_TEMPLATE_ROLE_PREFIX,
};
pub use errors::{init_tracing, HierarchyFault, MutationRule, Result, SecurityError};
pub use hierarchy::{effective_album, AlbumHierarchy, GallerySettings, GallerySettingsProvider};
pub use identity::{CurrentIdentity, IdentityProvider};
pub use locks::RoleLocks;
pub use memory::{
    InMemoryAlbumTree, InMemoryRoleRepository, StaticGallerySettings, StaticIdentity,
};
pub use metrics::render_metrics;
pub use naming::RoleNaming;
pub use owner_roles::{AlbumOwnershipRoleManager, RetireOutcome};
pub use repository::RoleRepository;
pub use resolver::{AuthorizationRequest, PermissionDecision, PermissionResolver};
pub use role_store::{inflate, InflatedRole, Inflation, RoleCache, RoleSnapshot, RoleStore};
pub use service::SecurityService;
pub use validator::{MutationContext, RoleMutation, RoleMutationValidator};
