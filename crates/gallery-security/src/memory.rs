use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicUsize, Ordering},
        RwLock,
    },
};

use gallery_core::{Album, AlbumId, GalleryId, Role};

use crate::{
    errors::{Result, SecurityError},
    hierarchy::{AlbumHierarchy, GallerySettings, GallerySettingsProvider},
    identity::IdentityProvider,
    repository::RoleRepository,
};

/// Album tree held in memory, used when the host has no album store at hand.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAlbumTree {
    albums: HashMap<AlbumId, Album>,
    children: HashMap<AlbumId, Vec<AlbumId>>,
    roots: HashMap<GalleryId, AlbumId>,
}

impl InMemoryAlbumTree {
    pub fn insert(&mut self, album: Album) {
        match album.parent_id {
            Some(parent) => self.link_child(parent, album.id),
            None => {
                self.roots.insert(album.gallery_id, album.id);
            }
        }
        self.albums.insert(album.id, album);
    }

    pub fn insert_root(&mut self, id: AlbumId, gallery_id: GalleryId) {
        self.insert(Album::new(id, gallery_id, None));
    }

    /// Adds `id` below `parent` in the parent's gallery. Returns false when
    /// the parent is unknown.
    #[must_use]
    pub fn insert_child(&mut self, id: AlbumId, parent: AlbumId) -> bool {
        let Some(gallery_id) = self.albums.get(&parent).map(|album| album.gallery_id) else {
            return false;
        };
        self.insert(Album::new(id, gallery_id, Some(parent)));
        true
    }

    /// Records a child edge without touching the child's own record.
    pub fn link_child(&mut self, parent: AlbumId, child: AlbumId) {
        let entry = self.children.entry(parent).or_default();
        if !entry.contains(&child) {
            entry.push(child);
        }
    }

    pub fn album_mut(&mut self, id: AlbumId) -> Option<&mut Album> {
        self.albums.get_mut(&id)
    }
}

impl AlbumHierarchy for InMemoryAlbumTree {
    fn album(&self, id: AlbumId) -> Option<Album> {
        self.albums.get(&id).cloned()
    }

    fn children(&self, id: AlbumId) -> Vec<AlbumId> {
        self.children.get(&id).cloned().unwrap_or_default()
    }

    fn root_album(&self, gallery_id: GalleryId) -> Option<AlbumId> {
        self.roots.get(&gallery_id).copied()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRoleRepository {
    roles: RwLock<BTreeMap<String, Role>>,
    full_loads: AtomicUsize,
}

impl InMemoryRoleRepository {
    #[must_use]
    pub fn with_roles(roles: impl IntoIterator<Item = Role>) -> Self {
        let repository = Self::default();
        if let Ok(mut guard) = repository.roles.write() {
            for role in roles {
                guard.insert(role.name.as_str().to_owned(), role);
            }
        }
        repository
    }

    /// Number of `load_all_roles` calls served so far.
    pub fn full_loads(&self) -> usize {
        self.full_loads.load(Ordering::Relaxed)
    }

    pub fn role_names(&self) -> Vec<String> {
        self.roles
            .read()
            .map(|guard| guard.keys().cloned().collect())
            .unwrap_or_default()
    }
}

fn poisoned() -> SecurityError {
    SecurityError::Repository(String::from("role table lock poisoned"))
}

impl RoleRepository for InMemoryRoleRepository {
    fn load_role(&self, name: &str) -> Result<Option<Role>> {
        let guard = self.roles.read().map_err(|_| poisoned())?;
        Ok(guard.get(name).cloned())
    }

    fn load_all_roles(&self) -> Result<Vec<Role>> {
        self.full_loads.fetch_add(1, Ordering::Relaxed);
        let guard = self.roles.read().map_err(|_| poisoned())?;
        Ok(guard.values().cloned().collect())
    }

    fn save_role(&self, role: &Role) -> Result<()> {
        let mut guard = self.roles.write().map_err(|_| poisoned())?;
        guard.insert(role.name.as_str().to_owned(), role.clone());
        Ok(())
    }

    fn delete_role(&self, name: &str) -> Result<()> {
        let mut guard = self.roles.write().map_err(|_| poisoned())?;
        guard.remove(name);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user_name: Option<String>,
    is_authenticated: bool,
    roles: HashMap<String, Vec<String>>,
}

impl StaticIdentity {
    #[must_use]
    pub fn new(user_name: impl Into<String>, is_authenticated: bool) -> Self {
        Self {
            user_name: Some(user_name.into()),
            is_authenticated,
            roles: HashMap::new(),
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_roles<S: Into<String>>(
        mut self,
        user_name: &str,
        role_names: impl IntoIterator<Item = S>,
    ) -> Self {
        self.roles.insert(
            user_name.to_owned(),
            role_names.into_iter().map(Into::into).collect(),
        );
        self
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_name(&self) -> Option<String> {
        self.user_name.clone()
    }

    fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    fn role_names_for_user(&self, user_name: &str) -> Vec<String> {
        self.roles.get(user_name).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticGallerySettings {
    galleries: HashMap<GalleryId, GallerySettings>,
}

impl StaticGallerySettings {
    #[must_use]
    pub fn with_gallery(mut self, gallery_id: GalleryId, settings: GallerySettings) -> Self {
        self.galleries.insert(gallery_id, settings);
        self
    }
}

impl GallerySettingsProvider for StaticGallerySettings {
    fn settings(&self, gallery_id: GalleryId) -> Option<GallerySettings> {
        self.galleries.get(&gallery_id).cloned()
    }
}
