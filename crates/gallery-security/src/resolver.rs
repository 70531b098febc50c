use std::sync::Arc;

use gallery_core::{
    mask_permissions, Album, AlbumId, AlbumResolution, GalleryId, MatchMode, Permission,
    PermissionSet,
};
use serde::Serialize;

use crate::{
    errors::{Result, SecurityError},
    hierarchy::{resolve_album, AlbumHierarchy, GallerySettings, GallerySettingsProvider},
    metrics::{
        record_authorization_denial, DENIAL_REASON_ANONYMOUS, DENIAL_REASON_EMPTY_REQUEST,
        DENIAL_REASON_NO_GRANT, DENIAL_REASON_UNRESOLVED_ROOT,
    },
    role_store::InflatedRole,
};

#[derive(Debug, Clone, Copy)]
pub struct AuthorizationRequest<'a> {
    pub permissions: PermissionSet,
    pub roles: &'a [Arc<InflatedRole>],
    pub album_id: AlbumId,
    pub gallery_id: GalleryId,
    pub is_authenticated: bool,
    pub is_private: bool,
    pub is_virtual: bool,
    pub match_mode: MatchMode,
}

impl<'a> AuthorizationRequest<'a> {
    /// Builds a request for `album`, taking privacy and virtual kind from it.
    #[must_use]
    pub fn for_album(
        permissions: PermissionSet,
        roles: &'a [Arc<InflatedRole>],
        album: &Album,
        is_authenticated: bool,
    ) -> Self {
        Self {
            permissions,
            roles,
            album_id: album.id,
            gallery_id: album.gallery_id,
            is_authenticated,
            is_private: album.is_private,
            is_virtual: album.virtual_type.is_virtual(),
            match_mode: MatchMode::default(),
        }
    }

    #[must_use]
    pub fn with_match_mode(mut self, match_mode: MatchMode) -> Self {
        self.match_mode = match_mode;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PermissionDecision {
    pub granted: bool,
    pub evaluated_against: AlbumId,
}

pub struct PermissionResolver {
    hierarchy: Arc<dyn AlbumHierarchy>,
    settings: Arc<dyn GallerySettingsProvider>,
}

impl PermissionResolver {
    pub fn new(
        hierarchy: Arc<dyn AlbumHierarchy>,
        settings: Arc<dyn GallerySettingsProvider>,
    ) -> Self {
        Self {
            hierarchy,
            settings,
        }
    }

    #[must_use]
    pub fn is_authorized(&self, request: &AuthorizationRequest<'_>) -> bool {
        self.decide(request).granted
    }

    #[must_use]
    pub fn decide(&self, request: &AuthorizationRequest<'_>) -> PermissionDecision {
        self.evaluate(request).0
    }

    /// Same check as [`Self::is_authorized`], surfaced as an error.
    ///
    /// # Errors
    /// Returns [`SecurityError::AccessDenied`] when no grant applies.
    pub fn ensure_authorized(&self, request: &AuthorizationRequest<'_>) -> Result<()> {
        let (decision, reason) = self.evaluate(request);
        if decision.granted {
            return Ok(());
        }
        let reason = reason.unwrap_or(DENIAL_REASON_NO_GRANT);
        record_authorization_denial(reason);
        tracing::debug!(
            album_id = %request.album_id,
            gallery_id = %request.gallery_id,
            evaluated_against = %decision.evaluated_against,
            reason,
            "authorization denied"
        );
        Err(SecurityError::AccessDenied {
            permissions: request.permissions.iter().collect(),
            album_id: request.album_id,
            gallery_id: request.gallery_id,
        })
    }

    fn evaluate(&self, request: &AuthorizationRequest<'_>) -> (PermissionDecision, Option<&'static str>) {
        let resolution = if request.is_virtual {
            AlbumResolution::GalleryRoot
        } else {
            AlbumResolution::SelfAlbum
        };
        let Some(effective) = resolve_album(
            self.hierarchy.as_ref(),
            request.album_id,
            request.gallery_id,
            resolution,
        ) else {
            return (
                denied(request.album_id),
                Some(DENIAL_REASON_UNRESOLVED_ROOT),
            );
        };

        let (known, unknown) = mask_permissions(request.permissions.bits());
        if known.is_empty() || (unknown != 0 && request.match_mode == MatchMode::RequireAll) {
            return (denied(effective), Some(DENIAL_REASON_EMPTY_REQUEST));
        }

        if !request.is_authenticated {
            let settings = self.settings.settings(request.gallery_id).unwrap_or_default();
            let granted = !request.is_private
                && matches_mode(known, request.match_mode, |permission| {
                    anonymous_allows(permission, &settings)
                });
            return (
                PermissionDecision {
                    granted,
                    evaluated_against: effective,
                },
                (!granted).then_some(DENIAL_REASON_ANONYMOUS),
            );
        }

        let granted = matches_mode(known, request.match_mode, |permission| {
            request
                .roles
                .iter()
                .any(|role| role_grants(role, permission, effective, request.gallery_id))
        });
        (
            PermissionDecision {
                granted,
                evaluated_against: effective,
            },
            None,
        )
    }
}

fn denied(album_id: AlbumId) -> PermissionDecision {
    PermissionDecision {
        granted: false,
        evaluated_against: album_id,
    }
}

fn matches_mode(
    permissions: PermissionSet,
    match_mode: MatchMode,
    check: impl FnMut(Permission) -> bool,
) -> bool {
    let mut permissions = permissions.iter();
    match match_mode {
        MatchMode::RequireAll => permissions.all(check),
        MatchMode::RequireOne => permissions.any(check),
    }
}

/// Anonymous callers only ever view, and only where the gallery allows it.
fn anonymous_allows(permission: Permission, settings: &GallerySettings) -> bool {
    match permission {
        Permission::ViewAlbumOrMediaObject => settings.allow_anonymous_browsing,
        Permission::ViewOriginalMediaObject => {
            settings.allow_anonymous_browsing && settings.allow_anonymous_original_download
        }
        _ => false,
    }
}

/// Grants are additive: an album grant, a gallery-admin scope and site admin
/// are each sufficient on their own.
pub(crate) fn role_grants(
    role: &InflatedRole,
    permission: Permission,
    album_id: AlbumId,
    gallery_id: GalleryId,
) -> bool {
    if role.is_site_admin() {
        return true;
    }
    if role.is_gallery_admin()
        && role.covers_gallery(gallery_id)
        && permission != Permission::AdministerSite
    {
        return true;
    }
    role.role.permissions.contains(permission) && role.grants_album(album_id)
}
