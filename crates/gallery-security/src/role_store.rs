use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
};

use gallery_core::{Album, AlbumId, GalleryId, Role};

use crate::{
    errors::{HierarchyFault, Result, SecurityError},
    hierarchy::AlbumHierarchy,
    identity::CurrentIdentity,
    metrics::record_hierarchy_fault,
    repository::RoleRepository,
};

/// A role together with every album and gallery its root albums reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InflatedRole {
    pub role: Role,
    pub all_album_ids: BTreeSet<AlbumId>,
    pub gallery_ids: BTreeSet<GalleryId>,
}

impl InflatedRole {
    #[must_use]
    pub fn name(&self) -> &str {
        self.role.name.as_str()
    }

    #[must_use]
    pub fn is_site_admin(&self) -> bool {
        self.role.is_site_admin()
    }

    #[must_use]
    pub fn is_gallery_admin(&self) -> bool {
        self.role.is_gallery_admin()
    }

    #[must_use]
    pub fn grants_album(&self, album_id: AlbumId) -> bool {
        self.all_album_ids.contains(&album_id)
    }

    #[must_use]
    pub fn covers_gallery(&self, gallery_id: GalleryId) -> bool {
        self.gallery_ids.contains(&gallery_id)
    }
}

#[derive(Debug)]
pub struct Inflation {
    pub role: InflatedRole,
    pub faults: Vec<SecurityError>,
}

/// Walks the album tree below each root album of `role`.
///
/// Each root is walked with its own visited set, so a revisit inside one walk
/// is a cycle. A child whose parent link disagrees with the edge it was
/// reached through, or which the hierarchy cannot resolve, is dangling. A
/// fault prunes that subtree only.
pub fn inflate(role: &Role, hierarchy: &dyn AlbumHierarchy) -> Inflation {
    let mut all_album_ids = BTreeSet::new();
    let mut gallery_ids = BTreeSet::new();
    let mut faults = Vec::new();
    let mut report = |album_id: AlbumId, fault: HierarchyFault| {
        tracing::warn!(
            role = role.name.as_str(),
            album_id = %album_id,
            fault = fault.as_str(),
            "album hierarchy fault during role inflation"
        );
        record_hierarchy_fault(fault.as_str());
        faults.push(SecurityError::MalformedAlbumHierarchy { album_id, fault });
    };

    for root_id in &role.root_album_ids {
        let Some(root) = hierarchy.album(*root_id) else {
            report(*root_id, HierarchyFault::DanglingReference);
            continue;
        };
        let mut visited = HashSet::from([root.id]);
        all_album_ids.insert(root.id);
        gallery_ids.insert(root.gallery_id);

        let mut stack: Vec<Album> = vec![root];
        while let Some(current) = stack.pop() {
            for child_id in hierarchy.children(current.id) {
                if !visited.insert(child_id) {
                    report(child_id, HierarchyFault::Cycle);
                    continue;
                }
                let Some(child) = hierarchy.album(child_id) else {
                    report(child_id, HierarchyFault::DanglingReference);
                    continue;
                };
                if child.parent_id != Some(current.id) {
                    report(child_id, HierarchyFault::DanglingReference);
                    continue;
                }
                all_album_ids.insert(child.id);
                gallery_ids.insert(child.gallery_id);
                stack.push(child);
            }
        }
    }

    Inflation {
        role: InflatedRole {
            role: role.clone(),
            all_album_ids,
            gallery_ids,
        },
        faults,
    }
}

/// Immutable view of every inflated role at one point in time.
#[derive(Debug, Default)]
pub struct RoleSnapshot {
    roles: BTreeMap<String, Arc<InflatedRole>>,
}

impl RoleSnapshot {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<InflatedRole>> {
        self.roles.get(name).cloned()
    }

    pub fn roles(&self) -> impl Iterator<Item = &Arc<InflatedRole>> {
        self.roles.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// Host-owned cache of inflated roles.
///
/// Readers always get a whole snapshot. Rebuilds happen outside the lock and
/// are only installed when no invalidation happened while they ran.
#[derive(Debug, Default)]
pub struct RoleCache {
    snapshot: RwLock<Option<Arc<RoleSnapshot>>>,
    generation: AtomicU64,
}

impl RoleCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the current snapshot. Call after a role is saved or deleted, or
    /// when albums are added, removed or moved.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.snapshot.write() {
            *guard = None;
        }
        tracing::debug!("role cache invalidated");
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn current(&self) -> Option<Arc<RoleSnapshot>> {
        self.snapshot.read().ok().and_then(|guard| guard.clone())
    }

    fn install(&self, generation: u64, snapshot: &Arc<RoleSnapshot>) {
        if let Ok(mut guard) = self.snapshot.write() {
            if self.generation.load(Ordering::SeqCst) == generation {
                *guard = Some(Arc::clone(snapshot));
            }
        }
    }
}

pub struct RoleStore {
    repository: Arc<dyn RoleRepository>,
    hierarchy: Arc<dyn AlbumHierarchy>,
    cache: Arc<RoleCache>,
}

impl RoleStore {
    pub fn new(
        repository: Arc<dyn RoleRepository>,
        hierarchy: Arc<dyn AlbumHierarchy>,
        cache: Arc<RoleCache>,
    ) -> Self {
        Self {
            repository,
            hierarchy,
            cache,
        }
    }

    #[must_use]
    pub fn hierarchy(&self) -> &dyn AlbumHierarchy {
        self.hierarchy.as_ref()
    }

    #[must_use]
    pub fn repository(&self) -> &dyn RoleRepository {
        self.repository.as_ref()
    }

    pub fn inflate(&self, role: &Role) -> Inflation {
        inflate(role, self.hierarchy.as_ref())
    }

    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    /// Current snapshot, rebuilt from the repository when invalidated.
    ///
    /// # Errors
    /// Propagates repository failures.
    pub fn snapshot(&self) -> Result<Arc<RoleSnapshot>> {
        if let Some(snapshot) = self.cache.current() {
            return Ok(snapshot);
        }

        let generation = self.cache.generation();
        let mut roles = BTreeMap::new();
        for role in self.repository.load_all_roles()? {
            let inflation = self.inflate(&role);
            roles.insert(role.name.as_str().to_owned(), Arc::new(inflation.role));
        }
        let snapshot = Arc::new(RoleSnapshot { roles });
        self.cache.install(generation, &snapshot);
        tracing::debug!(roles = snapshot.len(), generation, "role snapshot rebuilt");
        Ok(snapshot)
    }

    /// # Errors
    /// Propagates repository failures.
    pub fn all_roles(&self) -> Result<Vec<Arc<InflatedRole>>> {
        Ok(self.snapshot()?.roles().cloned().collect())
    }

    /// # Errors
    /// Returns [`SecurityError::RoleNotFound`] for unknown names.
    pub fn role(&self, name: &str) -> Result<Arc<InflatedRole>> {
        self.snapshot()?
            .get(name)
            .ok_or_else(|| SecurityError::RoleNotFound(name.to_owned()))
    }

    /// Inflated roles for the given names. Unknown names are skipped.
    ///
    /// # Errors
    /// Propagates repository failures.
    pub fn roles_for_names<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Arc<InflatedRole>>> {
        let snapshot = self.snapshot()?;
        let mut roles = Vec::with_capacity(names.len());
        for name in names {
            match snapshot.get(name.as_ref()) {
                Some(role) => roles.push(role),
                None => tracing::debug!(role = name.as_ref(), "skipping unknown role name"),
            }
        }
        Ok(roles)
    }

    /// # Errors
    /// Propagates repository failures.
    pub fn roles_for_identity(&self, identity: &CurrentIdentity) -> Result<Vec<Arc<InflatedRole>>> {
        if !identity.is_authenticated {
            return Ok(Vec::new());
        }
        self.roles_for_names(&identity.role_names)
    }

    /// Roles reaching any album of the gallery, plus every site-admin role.
    ///
    /// # Errors
    /// Propagates repository failures.
    pub fn roles_for_gallery(&self, gallery_id: GalleryId) -> Result<Vec<Arc<InflatedRole>>> {
        Ok(self
            .snapshot()?
            .roles()
            .filter(|role| role.is_site_admin() || role.covers_gallery(gallery_id))
            .cloned()
            .collect())
    }
}
