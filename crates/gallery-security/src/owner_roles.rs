use std::sync::Arc;

use gallery_core::{content_permissions, Album, AlbumId, GalleryId, Permission, Role, RoleName};

use crate::{
    errors::{Result, SecurityError},
    hierarchy::GallerySettingsProvider,
    locks::RoleLocks,
    naming::RoleNaming,
    role_store::RoleStore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetireOutcome {
    /// The role was deleted; these albums still name it as their owner role.
    Retired { albums_to_clear: Vec<AlbumId> },
    Kept,
    NotOwnerRole,
}

/// Keeps one role per album owner, seeded from a per-gallery template.
pub struct AlbumOwnershipRoleManager {
    store: Arc<RoleStore>,
    naming: Arc<RoleNaming>,
    settings: Arc<dyn GallerySettingsProvider>,
    locks: Arc<RoleLocks>,
}

impl AlbumOwnershipRoleManager {
    pub fn new(
        store: Arc<RoleStore>,
        naming: Arc<RoleNaming>,
        settings: Arc<dyn GallerySettingsProvider>,
        locks: Arc<RoleLocks>,
    ) -> Self {
        Self {
            store,
            naming,
            settings,
            locks,
        }
    }

    /// Role name `album` should be owned through, or `None` without an owner.
    #[must_use]
    pub fn owner_role_name(&self, album: &Album) -> Option<String> {
        let user = album.owner_user_name.as_deref().filter(|user| !user.trim().is_empty())?;
        let existing = album
            .owner_role_name
            .as_deref()
            .filter(|name| self.naming.is_owner_role(name));
        Some(existing.map_or_else(|| self.naming.owner_role_name(album, user), str::to_owned))
    }

    /// Loads the template role of `gallery_id`, creating it on first use.
    ///
    /// Runs under the template name's lock and reads the template from the
    /// repository, never from the cached snapshot.
    ///
    /// # Errors
    /// Propagates repository failures.
    pub fn ensure_template_role(&self, gallery_id: GalleryId) -> Result<Role> {
        let description = self
            .settings
            .settings(gallery_id)
            .map(|settings| settings.description)
            .unwrap_or_default();
        let name = self.naming.template_role_name(gallery_id, &description);
        self.locks
            .with_lock(&name, || self.load_or_create_template(gallery_id, name.as_str()))
    }

    fn load_or_create_template(&self, gallery_id: GalleryId, name: &str) -> Result<Role> {
        let repository = self.store.repository();
        if let Some(existing) = repository.load_role(name)? {
            return Ok(existing);
        }
        // Templates saved under an older gallery description.
        let renamed = self
            .store
            .snapshot()?
            .roles()
            .find(|role| self.naming.template_gallery(role.name()) == Some(gallery_id))
            .map(|role| role.name().to_owned());
        if let Some(renamed) = renamed {
            if let Some(existing) = repository.load_role(&renamed)? {
                return Ok(existing);
            }
        }

        let template = Role::new(RoleName::try_from(name)?, content_permissions());
        repository.save_role(&template)?;
        self.store.invalidate();
        tracing::info!(
            role = template.name.as_str(),
            gallery_id = gallery_id.get(),
            "created album owner template role"
        );
        Ok(template)
    }

    /// Makes the album's owner the sole member of a role granting the album.
    ///
    /// # Errors
    /// Propagates repository failures and invalid generated names.
    pub fn ensure_owner_role(&self, album: &Album) -> Result<Option<String>> {
        let (Some(name), Some(user)) = (self.owner_role_name(album), album.owner_user_name.as_deref())
        else {
            return Ok(None);
        };

        let template = self.ensure_template_role(album.gallery_id)?;
        let mut role = match self.store.repository().load_role(&name)? {
            Some(role) => role,
            None => Role::new(RoleName::try_from(name.clone())?, template.permissions),
        };
        role.permissions.remove(Permission::AdministerSite);
        role.permissions.remove(Permission::AdministerGallery);
        role.root_album_ids.insert(album.id);
        role.members.clear();
        role.members.insert(user.trim().to_owned());

        self.store.repository().save_role(&role)?;
        self.store.invalidate();
        tracing::info!(
            role = name.as_str(),
            album_id = album.id.get(),
            gallery_id = album.gallery_id.get(),
            "album owner role ensured"
        );
        Ok(Some(name))
    }

    /// Removes `album` from its owner role and retires the role when nothing
    /// is left in it.
    ///
    /// # Errors
    /// Propagates repository failures.
    pub fn release_album(&self, album: &Album) -> Result<RetireOutcome> {
        let Some(name) = album
            .owner_role_name
            .as_deref()
            .filter(|name| self.naming.is_owner_role(name))
        else {
            return Ok(RetireOutcome::NotOwnerRole);
        };
        let Some(mut role) = self.store.repository().load_role(name)? else {
            return Ok(RetireOutcome::Retired {
                albums_to_clear: vec![album.id],
            });
        };
        if role.root_album_ids.remove(&album.id) {
            self.store.repository().save_role(&role)?;
            self.store.invalidate();
        }
        match self.retire_owner_role_if_orphaned(name)? {
            RetireOutcome::Retired {
                mut albums_to_clear,
            } => {
                albums_to_clear.push(album.id);
                albums_to_clear.sort_unstable();
                albums_to_clear.dedup();
                Ok(RetireOutcome::Retired { albums_to_clear })
            }
            outcome => Ok(outcome),
        }
    }

    /// Deletes an owner role left without albums or members.
    ///
    /// # Errors
    /// Returns [`SecurityError::RoleNotFound`] for unknown owner roles and
    /// propagates repository failures.
    pub fn retire_owner_role_if_orphaned(&self, name: &str) -> Result<RetireOutcome> {
        if !self.naming.is_owner_role(name) {
            return Ok(RetireOutcome::NotOwnerRole);
        }
        let role = self
            .store
            .repository()
            .load_role(name)?
            .ok_or_else(|| SecurityError::RoleNotFound(name.to_owned()))?;
        if !role.root_album_ids.is_empty() && !role.members.is_empty() {
            return Ok(RetireOutcome::Kept);
        }

        self.store.repository().delete_role(name)?;
        self.store.invalidate();
        let albums_to_clear: Vec<_> = role.root_album_ids.into_iter().collect();
        tracing::info!(
            role = name,
            albums = albums_to_clear.len(),
            "retired orphaned album owner role"
        );
        Ok(RetireOutcome::Retired { albums_to_clear })
    }
}
