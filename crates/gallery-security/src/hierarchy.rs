use gallery_core::{Album, AlbumId, AlbumResolution, GalleryId, VirtualAlbumType};

/// Read-only view over the album tree owned by the host.
pub trait AlbumHierarchy: Send + Sync {
    fn album(&self, id: AlbumId) -> Option<Album>;

    fn children(&self, id: AlbumId) -> Vec<AlbumId>;

    fn root_album(&self, gallery_id: GalleryId) -> Option<AlbumId>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GallerySettings {
    pub description: String,
    pub allow_anonymous_browsing: bool,
    pub allow_anonymous_original_download: bool,
}

pub trait GallerySettingsProvider: Send + Sync {
    fn settings(&self, gallery_id: GalleryId) -> Option<GallerySettings>;
}

/// Maps a requested album to the album whose grants decide the request.
///
/// Returns `None` when a virtual album's gallery has no resolvable root.
pub fn effective_album(
    hierarchy: &dyn AlbumHierarchy,
    album_id: AlbumId,
    gallery_id: GalleryId,
    virtual_type: VirtualAlbumType,
) -> Option<AlbumId> {
    resolve_album(hierarchy, album_id, gallery_id, virtual_type.resolution())
}

pub(crate) fn resolve_album(
    hierarchy: &dyn AlbumHierarchy,
    album_id: AlbumId,
    gallery_id: GalleryId,
    resolution: AlbumResolution,
) -> Option<AlbumId> {
    match resolution {
        AlbumResolution::SelfAlbum => Some(album_id),
        AlbumResolution::GalleryRoot => hierarchy.root_album(gallery_id),
    }
}
