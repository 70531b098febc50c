use std::{collections::BTreeSet, sync::Arc};

use gallery_core::GalleryId;

use crate::{naming::RoleNaming, role_store::InflatedRole};

/// Galleries an actor may administer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryScope {
    All,
    Galleries(BTreeSet<GalleryId>),
}

impl GalleryScope {
    #[must_use]
    pub fn contains(&self, gallery_id: GalleryId) -> bool {
        match self {
            Self::All => true,
            Self::Galleries(galleries) => galleries.contains(&gallery_id),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Galleries(galleries) if galleries.is_empty())
    }
}

#[must_use]
pub fn is_site_administrator(roles: &[Arc<InflatedRole>]) -> bool {
    roles.iter().any(|role| role.is_site_admin())
}

/// Site administrators administer every gallery.
#[must_use]
pub fn is_gallery_administrator(roles: &[Arc<InflatedRole>], gallery_id: GalleryId) -> bool {
    roles.iter().any(|role| {
        role.is_site_admin() || (role.is_gallery_admin() && role.covers_gallery(gallery_id))
    })
}

#[must_use]
pub fn administrable_galleries(roles: &[Arc<InflatedRole>]) -> GalleryScope {
    if is_site_administrator(roles) {
        return GalleryScope::All;
    }
    GalleryScope::Galleries(
        roles
            .iter()
            .filter(|role| role.is_gallery_admin())
            .flat_map(|role| role.gallery_ids.iter().copied())
            .collect(),
    )
}

/// Whether an actor holding `roles` may see `role` in role management.
#[must_use]
pub fn can_view_role(roles: &[Arc<InflatedRole>], role: &InflatedRole, naming: &RoleNaming) -> bool {
    if is_site_administrator(roles) {
        return true;
    }
    if let Some(gallery_id) = naming.template_gallery(role.name()) {
        return is_gallery_administrator(roles, gallery_id);
    }
    let scope = administrable_galleries(roles);
    if scope.is_empty() || role.is_site_admin() {
        return false;
    }
    role.gallery_ids.iter().all(|gallery_id| scope.contains(*gallery_id))
}
