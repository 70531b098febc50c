#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Upper bound on role name length, counted in characters.
pub const MAX_ROLE_NAME_CHARS: usize = 256;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("role name is invalid")]
    InvalidRoleName,
    #[error("virtual album type is invalid")]
    InvalidVirtualAlbumType,
    #[error("permission is invalid")]
    InvalidPermission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlbumId(i64);

impl AlbumId {
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for AlbumId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl core::fmt::Display for AlbumId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GalleryId(i64);

impl GalleryId {
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for GalleryId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl core::fmt::Display for GalleryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How an album id is mapped to the album whose grants are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlbumResolution {
    SelfAlbum,
    GalleryRoot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VirtualAlbumType {
    #[default]
    NotVirtual,
    Root,
    Tag,
    People,
    Search,
    TitleOrCaption,
    MostRecentlyAdded,
    Rated,
}

impl VirtualAlbumType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotVirtual => "not_virtual",
            Self::Root => "root",
            Self::Tag => "tag",
            Self::People => "people",
            Self::Search => "search",
            Self::TitleOrCaption => "title_or_caption",
            Self::MostRecentlyAdded => "most_recently_added",
            Self::Rated => "rated",
        }
    }

    #[must_use]
    pub const fn is_virtual(self) -> bool {
        !matches!(self, Self::NotVirtual)
    }

    /// Virtual albums carry no ACL of their own and borrow the gallery root's.
    #[must_use]
    pub const fn resolution(self) -> AlbumResolution {
        match self {
            Self::NotVirtual => AlbumResolution::SelfAlbum,
            Self::Root
            | Self::Tag
            | Self::People
            | Self::Search
            | Self::TitleOrCaption
            | Self::MostRecentlyAdded
            | Self::Rated => AlbumResolution::GalleryRoot,
        }
    }
}

impl TryFrom<String> for VirtualAlbumType {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "not_virtual" => Ok(Self::NotVirtual),
            "root" => Ok(Self::Root),
            "tag" => Ok(Self::Tag),
            "people" => Ok(Self::People),
            "search" => Ok(Self::Search),
            "title_or_caption" => Ok(Self::TitleOrCaption),
            "most_recently_added" => Ok(Self::MostRecentlyAdded),
            "rated" => Ok(Self::Rated),
            _ => Err(DomainError::InvalidVirtualAlbumType),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: AlbumId,
    pub gallery_id: GalleryId,
    pub parent_id: Option<AlbumId>,
    pub is_private: bool,
    pub virtual_type: VirtualAlbumType,
    pub title: String,
    pub owner_user_name: Option<String>,
    pub owner_role_name: Option<String>,
}

impl Album {
    #[must_use]
    pub fn new(id: AlbumId, gallery_id: GalleryId, parent_id: Option<AlbumId>) -> Self {
        Self {
            id,
            gallery_id,
            parent_id,
            is_private: false,
            virtual_type: VirtualAlbumType::NotVirtual,
            title: String::new(),
            owner_user_name: None,
            owner_role_name: None,
        }
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewAlbumOrMediaObject,
    ViewOriginalMediaObject,
    AddChildAlbum,
    AddMediaObject,
    EditAlbum,
    EditMediaObject,
    DeleteAlbum,
    DeleteChildAlbum,
    DeleteMediaObject,
    Synchronize,
    AdministerSite,
    AdministerGallery,
    HideWatermark,
}

pub const KNOWN_PERMISSIONS: [Permission; 13] = [
    Permission::ViewAlbumOrMediaObject,
    Permission::ViewOriginalMediaObject,
    Permission::AddChildAlbum,
    Permission::AddMediaObject,
    Permission::EditAlbum,
    Permission::EditMediaObject,
    Permission::DeleteAlbum,
    Permission::DeleteChildAlbum,
    Permission::DeleteMediaObject,
    Permission::Synchronize,
    Permission::AdministerSite,
    Permission::AdministerGallery,
    Permission::HideWatermark,
];

impl Permission {
    #[must_use]
    pub const fn is_view(self) -> bool {
        matches!(
            self,
            Self::ViewAlbumOrMediaObject | Self::ViewOriginalMediaObject
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(u64);

impl PermissionSet {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn contains(self, permission: Permission) -> bool {
        self.0 & permission_mask(permission) != 0
    }

    pub fn insert(&mut self, permission: Permission) {
        self.0 |= permission_mask(permission);
    }

    pub fn remove(&mut self, permission: Permission) {
        self.0 &= !permission_mask(permission);
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub fn with(mut self, permission: Permission) -> Self {
        self.insert(permission);
        self
    }

    /// Known permissions present in the set, in declaration order.
    pub fn iter(self) -> impl Iterator<Item = Permission> {
        KNOWN_PERMISSIONS
            .into_iter()
            .filter(move |permission| self.contains(*permission))
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        let mut set = Self::empty();
        for permission in iter {
            set.insert(permission);
        }
        set
    }
}

impl From<Permission> for PermissionSet {
    fn from(value: Permission) -> Self {
        Self(permission_mask(value))
    }
}

/// Whether a composite request needs every permission or any one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    RequireAll,
    #[default]
    RequireOne,
}

#[must_use]
pub fn known_permission_mask() -> u64 {
    KNOWN_PERMISSIONS
        .into_iter()
        .fold(0_u64, |bits, permission| bits | permission_mask(permission))
}

#[must_use]
pub fn all_permissions() -> PermissionSet {
    PermissionSet::from_bits(known_permission_mask())
}

/// Splits raw stored bits into the known permission set and leftover bits.
#[must_use]
pub fn mask_permissions(raw_bits: u64) -> (PermissionSet, u64) {
    let mask = known_permission_mask();
    (PermissionSet::from_bits(raw_bits & mask), raw_bits & !mask)
}

/// Everything an album owner may do inside their own album.
#[must_use]
pub fn content_permissions() -> PermissionSet {
    [
        Permission::ViewAlbumOrMediaObject,
        Permission::ViewOriginalMediaObject,
        Permission::AddChildAlbum,
        Permission::AddMediaObject,
        Permission::EditAlbum,
        Permission::EditMediaObject,
        Permission::DeleteAlbum,
        Permission::DeleteChildAlbum,
        Permission::DeleteMediaObject,
    ]
    .into_iter()
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleName(String);

impl RoleName {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoleName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_role_name(&value)?;
        Ok(Self(value))
    }
}

impl TryFrom<&str> for RoleName {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_owned())
    }
}

impl From<RoleName> for String {
    fn from(value: RoleName) -> Self {
        value.0
    }
}

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: RoleName,
    pub permissions: PermissionSet,
    pub root_album_ids: BTreeSet<AlbumId>,
    pub members: BTreeSet<String>,
}

impl Role {
    #[must_use]
    pub fn new(name: RoleName, permissions: PermissionSet) -> Self {
        Self {
            name,
            permissions,
            root_album_ids: BTreeSet::new(),
            members: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_albums(mut self, albums: impl IntoIterator<Item = AlbumId>) -> Self {
        self.root_album_ids.extend(albums);
        self
    }

    #[must_use]
    pub fn with_members<S: Into<String>>(mut self, members: impl IntoIterator<Item = S>) -> Self {
        self.members.extend(members.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn is_site_admin(&self) -> bool {
        self.permissions.contains(Permission::AdministerSite)
    }

    #[must_use]
    pub fn is_gallery_admin(&self) -> bool {
        self.permissions.contains(Permission::AdministerGallery)
    }

    #[must_use]
    pub fn has_member(&self, user_name: &str) -> bool {
        self.members.contains(user_name)
    }
}

const fn permission_mask(permission: Permission) -> u64 {
    match permission {
        Permission::ViewAlbumOrMediaObject => 1 << 0,
        Permission::ViewOriginalMediaObject => 1 << 1,
        Permission::AddChildAlbum => 1 << 2,
        Permission::AddMediaObject => 1 << 3,
        Permission::EditAlbum => 1 << 4,
        Permission::EditMediaObject => 1 << 5,
        Permission::DeleteAlbum => 1 << 6,
        Permission::DeleteChildAlbum => 1 << 7,
        Permission::DeleteMediaObject => 1 << 8,
        Permission::Synchronize => 1 << 9,
        Permission::AdministerSite => 1 << 10,
        Permission::AdministerGallery => 1 << 11,
        Permission::HideWatermark => 1 << 12,
    }
}

fn validate_role_name(value: &str) -> Result<(), DomainError> {
    let chars = value.chars().count();
    if !(1..=MAX_ROLE_NAME_CHARS).contains(&chars) {
        return Err(DomainError::InvalidRoleName);
    }
    if value.trim() != value {
        return Err(DomainError::InvalidRoleName);
    }
    if value.chars().any(|c| c == ',' || c.is_control()) {
        return Err(DomainError::InvalidRoleName);
    }
    Ok(())
}
