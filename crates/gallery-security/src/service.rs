use std::sync::Arc;

use gallery_core::{Album, GalleryId, MatchMode, PermissionSet, Role};

use crate::{
    admin_scope::{self, GalleryScope},
    config::SecurityConfig,
    errors::{Result, SecurityError},
    hierarchy::{AlbumHierarchy, GallerySettingsProvider},
    identity::CurrentIdentity,
    locks::RoleLocks,
    naming::RoleNaming,
    owner_roles::{AlbumOwnershipRoleManager, RetireOutcome},
    repository::RoleRepository,
    resolver::{AuthorizationRequest, PermissionDecision, PermissionResolver},
    role_store::{InflatedRole, RoleCache, RoleStore},
    validator::{MutationContext, RoleMutation, RoleMutationValidator},
};

/// Entry point hosts use for every authorization and role management call.
pub struct SecurityService {
    naming: Arc<RoleNaming>,
    store: Arc<RoleStore>,
    resolver: PermissionResolver,
    validator: RoleMutationValidator,
    owners: AlbumOwnershipRoleManager,
    locks: Arc<RoleLocks>,
}

impl SecurityService {
    /// # Errors
    /// Returns an error when the configured role prefixes cannot be used to
    /// recognise template role names.
    pub fn new(
        config: &SecurityConfig,
        repository: Arc<dyn RoleRepository>,
        hierarchy: Arc<dyn AlbumHierarchy>,
        settings: Arc<dyn GallerySettingsProvider>,
        cache: Arc<RoleCache>,
    ) -> anyhow::Result<Self> {
        let naming = Arc::new(RoleNaming::new(config)?);
        let store = Arc::new(RoleStore::new(repository, Arc::clone(&hierarchy), cache));
        let locks = Arc::new(RoleLocks::new());
        Ok(Self {
            resolver: PermissionResolver::new(Arc::clone(&hierarchy), Arc::clone(&settings)),
            validator: RoleMutationValidator::new(hierarchy, Arc::clone(&naming)),
            owners: AlbumOwnershipRoleManager::new(
                Arc::clone(&store),
                Arc::clone(&naming),
                settings,
                Arc::clone(&locks),
            ),
            locks,
            naming,
            store,
        })
    }

    #[must_use]
    pub fn naming(&self) -> &RoleNaming {
        &self.naming
    }

    #[must_use]
    pub fn store(&self) -> &RoleStore {
        &self.store
    }

    /// Call when albums are added, removed or moved.
    pub fn invalidate_roles(&self) {
        self.store.invalidate();
    }

    /// # Errors
    /// Propagates repository failures.
    pub fn roles_for(&self, identity: &CurrentIdentity) -> Result<Vec<Arc<InflatedRole>>> {
        self.store.roles_for_identity(identity)
    }

    /// Fails closed: a role lookup failure denies.
    #[must_use]
    pub fn is_authorized(
        &self,
        identity: &CurrentIdentity,
        permissions: PermissionSet,
        album: &Album,
        match_mode: MatchMode,
    ) -> bool {
        self.decide(identity, permissions, album, match_mode)
            .is_ok_and(|decision| decision.granted)
    }

    /// # Errors
    /// Propagates repository failures.
    pub fn decide(
        &self,
        identity: &CurrentIdentity,
        permissions: PermissionSet,
        album: &Album,
        match_mode: MatchMode,
    ) -> Result<PermissionDecision> {
        let roles = self.roles_or_warn(identity)?;
        let request =
            AuthorizationRequest::for_album(permissions, &roles, album, identity.is_authenticated)
                .with_match_mode(match_mode);
        Ok(self.resolver.decide(&request))
    }

    /// # Errors
    /// Returns [`SecurityError::AccessDenied`] when no grant applies and
    /// propagates repository failures.
    pub fn ensure_authorized(
        &self,
        identity: &CurrentIdentity,
        permissions: PermissionSet,
        album: &Album,
        match_mode: MatchMode,
    ) -> Result<()> {
        let roles = self.roles_or_warn(identity)?;
        let request =
            AuthorizationRequest::for_album(permissions, &roles, album, identity.is_authenticated)
                .with_match_mode(match_mode);
        self.resolver.ensure_authorized(&request)
    }

    #[must_use]
    pub fn is_site_administrator(&self, identity: &CurrentIdentity) -> bool {
        self.roles_or_warn(identity)
            .is_ok_and(|roles| admin_scope::is_site_administrator(&roles))
    }

    #[must_use]
    pub fn is_gallery_administrator(&self, identity: &CurrentIdentity, gallery_id: GalleryId) -> bool {
        self.roles_or_warn(identity)
            .is_ok_and(|roles| admin_scope::is_gallery_administrator(&roles, gallery_id))
    }

    /// # Errors
    /// Propagates repository failures.
    pub fn administrable_galleries(&self, identity: &CurrentIdentity) -> Result<GalleryScope> {
        Ok(admin_scope::administrable_galleries(&self.roles_for(identity)?))
    }

    /// Roles `identity` may see in role management.
    ///
    /// # Errors
    /// Propagates repository failures.
    pub fn visible_roles(&self, identity: &CurrentIdentity) -> Result<Vec<Arc<InflatedRole>>> {
        let actor_roles = self.roles_for(identity)?;
        Ok(self
            .store
            .all_roles()?
            .into_iter()
            .filter(|role| admin_scope::can_view_role(&actor_roles, role, &self.naming))
            .collect())
    }

    /// Checks `mutation` without applying it.
    ///
    /// # Errors
    /// See [`RoleMutationValidator::validate`].
    pub fn validate_role_mutation(
        &self,
        identity: &CurrentIdentity,
        mutation: &RoleMutation,
    ) -> Result<()> {
        let actor_roles = self.roles_for(identity)?;
        let all_roles = self.store.all_roles()?;
        self.validator.validate(
            mutation,
            &MutationContext {
                actor: identity,
                actor_roles: &actor_roles,
                all_roles: &all_roles,
            },
        )
    }

    /// Creates or replaces `role` after validation, then retires it if it is
    /// an owner role left without albums or members.
    ///
    /// # Errors
    /// Validation failures and repository failures.
    pub fn save_role(&self, identity: &CurrentIdentity, role: Role) -> Result<RetireOutcome> {
        let name = role.name.as_str().to_owned();
        self.locks.with_lock(&name, || {
            let mutation = match self.store.repository().load_role(&name)? {
                Some(before) => RoleMutation::Update {
                    before,
                    after: role,
                },
                None => RoleMutation::Create(role),
            };
            self.validate_role_mutation(identity, &mutation)?;
            let Some(after) = mutation.after() else {
                return Ok(RetireOutcome::Kept);
            };
            self.store.repository().save_role(after)?;
            self.store.invalidate();
            tracing::info!(
                role = name.as_str(),
                actor = identity.user_name(),
                albums = after.root_album_ids.len(),
                members = after.members.len(),
                "role saved"
            );
            self.owners.retire_owner_role_if_orphaned(&name)
        })
    }

    /// # Errors
    /// [`SecurityError::RoleNotFound`], validation failures and repository
    /// failures.
    pub fn delete_role(&self, identity: &CurrentIdentity, name: &str) -> Result<()> {
        self.locks.with_lock(name, || {
            let role = self
                .store
                .repository()
                .load_role(name)?
                .ok_or_else(|| SecurityError::RoleNotFound(name.to_owned()))?;
            self.validate_role_mutation(identity, &RoleMutation::Delete(role))?;
            self.store.repository().delete_role(name)?;
            self.store.invalidate();
            tracing::info!(role = name, actor = identity.user_name(), "role deleted");
            Ok(())
        })
    }

    /// # Errors
    /// Propagates repository failures.
    pub fn ensure_owner_role(&self, album: &Album) -> Result<Option<String>> {
        let Some(name) = self.owners.owner_role_name(album) else {
            return Ok(None);
        };
        self.locks
            .with_lock(&name, || self.owners.ensure_owner_role(album))
    }

    /// Detaches `album` from its owner role, e.g. when it is deleted or its
    /// owner changes.
    ///
    /// # Errors
    /// Propagates repository failures.
    pub fn release_album_owner(&self, album: &Album) -> Result<RetireOutcome> {
        let Some(name) = album.owner_role_name.as_deref() else {
            return Ok(RetireOutcome::NotOwnerRole);
        };
        self.locks
            .with_lock(name, || self.owners.release_album(album))
    }

    fn roles_or_warn(&self, identity: &CurrentIdentity) -> Result<Vec<Arc<InflatedRole>>> {
        self.roles_for(identity).inspect_err(|error| {
            tracing::warn!(
                user = identity.user_name(),
                error = %error,
                "role lookup failed"
            );
        })
    }
}
