use std::sync::Arc;

use gallery_core::{
    Album, AlbumId, GalleryId, MatchMode, Permission, PermissionSet, Role, RoleName,
    VirtualAlbumType,
};
use gallery_security::{
    inflate, render_metrics, CurrentIdentity, GallerySettings, InMemoryAlbumTree,
    InMemoryRoleRepository, RoleCache, SecurityConfig, SecurityError, SecurityService,
    StaticGallerySettings,
};

const GALLERY: GalleryId = GalleryId::new(1);
const OTHER_GALLERY: GalleryId = GalleryId::new(2);

fn album_tree() -> InMemoryAlbumTree {
    let mut tree = InMemoryAlbumTree::default();
    tree.insert_root(AlbumId::new(1), GALLERY);
    assert!(tree.insert_child(AlbumId::new(10), AlbumId::new(1)));
    assert!(tree.insert_child(AlbumId::new(11), AlbumId::new(10)));
    assert!(tree.insert_child(AlbumId::new(12), AlbumId::new(10)));
    assert!(tree.insert_child(AlbumId::new(13), AlbumId::new(11)));
    assert!(tree.insert_child(AlbumId::new(20), AlbumId::new(1)));
    tree.insert_root(AlbumId::new(100), OTHER_GALLERY);
    assert!(tree.insert_child(AlbumId::new(101), AlbumId::new(100)));
    tree
}

fn role(name: &str, permissions: &[Permission], albums: &[i64], members: &[&str]) -> Role {
    Role::new(
        RoleName::try_from(name).expect("role name should be valid"),
        permissions.iter().copied().collect(),
    )
    .with_albums(albums.iter().copied().map(AlbumId::new))
    .with_members(members.iter().copied())
}

fn test_service(roles: Vec<Role>) -> SecurityService {
    let settings = StaticGallerySettings::default()
        .with_gallery(
            GALLERY,
            GallerySettings {
                description: String::from("Main"),
                allow_anonymous_browsing: true,
                allow_anonymous_original_download: false,
            },
        )
        .with_gallery(
            OTHER_GALLERY,
            GallerySettings {
                description: String::from("Closed"),
                ..GallerySettings::default()
            },
        );
    SecurityService::new(
        &SecurityConfig::default(),
        Arc::new(InMemoryRoleRepository::with_roles(roles)),
        Arc::new(album_tree()),
        Arc::new(settings),
        Arc::new(RoleCache::new()),
    )
    .expect("service should build")
}

fn album(id: i64, gallery_id: GalleryId) -> Album {
    Album::new(AlbumId::new(id), gallery_id, None)
}

fn single(permission: Permission) -> PermissionSet {
    PermissionSet::from(permission)
}

#[test]
fn editors_reach_every_descendant_of_their_root() {
    let editors = role("Editors", &[Permission::EditAlbum], &[10], &["bob"]);
    let inflated = inflate(&editors, &album_tree()).role;
    let expected: Vec<_> = [10, 11, 12, 13].into_iter().map(AlbumId::new).collect();
    assert_eq!(inflated.all_album_ids.iter().copied().collect::<Vec<_>>(), expected);

    let service = test_service(vec![editors]);
    let bob = CurrentIdentity::authenticated("bob", ["Editors"]);
    assert!(service.is_authorized(
        &bob,
        single(Permission::EditAlbum),
        &album(13, GALLERY),
        MatchMode::RequireOne
    ));
    assert!(!service.is_authorized(
        &bob,
        single(Permission::EditAlbum),
        &album(999, GALLERY),
        MatchMode::RequireOne
    ));
    assert!(!service.is_authorized(
        &bob,
        single(Permission::EditAlbum),
        &album(20, GALLERY),
        MatchMode::RequireOne
    ));
}

#[test]
fn anonymous_callers_only_ever_view() {
    let service = test_service(Vec::new());
    let anonymous = CurrentIdentity::anonymous();
    let public = album(11, GALLERY);
    let mut private = album(12, GALLERY);
    private.is_private = true;

    assert!(service.is_authorized(
        &anonymous,
        single(Permission::ViewAlbumOrMediaObject),
        &public,
        MatchMode::RequireOne
    ));
    assert!(!service.is_authorized(
        &anonymous,
        single(Permission::ViewAlbumOrMediaObject),
        &private,
        MatchMode::RequireOne
    ));
    assert!(!service.is_authorized(
        &anonymous,
        single(Permission::ViewOriginalMediaObject),
        &public,
        MatchMode::RequireOne
    ));
    assert!(!service.is_authorized(
        &anonymous,
        single(Permission::ViewAlbumOrMediaObject),
        &album(101, OTHER_GALLERY),
        MatchMode::RequireOne
    ));

    for permission in gallery_core::KNOWN_PERMISSIONS
        .iter()
        .copied()
        .filter(|permission| !permission.is_view())
    {
        assert!(
            !service.is_authorized(&anonymous, single(permission), &public, MatchMode::RequireOne),
            "{permission:?} must never be granted anonymously"
        );
    }
}

#[test]
fn anonymous_callers_ignore_role_assignments() {
    let service = test_service(vec![role(
        "Admins",
        &[Permission::AdministerSite],
        &[],
        &["alice"],
    )]);
    let spoofed = CurrentIdentity {
        user_name: Some(String::from("alice")),
        is_authenticated: false,
        role_names: vec![String::from("Admins")],
    };
    assert!(!service.is_authorized(
        &spoofed,
        single(Permission::EditAlbum),
        &album(11, GALLERY),
        MatchMode::RequireOne
    ));
    assert!(!service.is_site_administrator(&spoofed));
}

#[test]
fn site_admins_are_granted_everything_everywhere() {
    let service = test_service(vec![role(
        "Admins",
        &[Permission::AdministerSite],
        &[],
        &["alice"],
    )]);
    let alice = CurrentIdentity::authenticated("alice", ["Admins"]);
    let mut private = album(101, OTHER_GALLERY);
    private.is_private = true;

    for target in [album(13, GALLERY), private, album(-4, GALLERY)] {
        for permission in gallery_core::KNOWN_PERMISSIONS {
            assert!(service.is_authorized(
                &alice,
                single(permission),
                &target,
                MatchMode::RequireAll
            ));
        }
    }
    assert!(service.is_site_administrator(&alice));
    assert!(service.is_gallery_administrator(&alice, OTHER_GALLERY));
}

#[test]
fn gallery_admins_are_scoped_to_their_galleries() {
    let service = test_service(vec![role(
        "Main gallery admins",
        &[Permission::AdministerGallery],
        &[1],
        &["erin"],
    )]);
    let erin = CurrentIdentity::authenticated("erin", ["Main gallery admins"]);

    assert!(service.is_authorized(
        &erin,
        single(Permission::DeleteMediaObject),
        &album(13, GALLERY),
        MatchMode::RequireOne
    ));
    assert!(!service.is_authorized(
        &erin,
        single(Permission::DeleteMediaObject),
        &album(101, OTHER_GALLERY),
        MatchMode::RequireOne
    ));
    assert!(!service.is_authorized(
        &erin,
        single(Permission::AdministerSite),
        &album(13, GALLERY),
        MatchMode::RequireOne
    ));
    assert!(service.is_gallery_administrator(&erin, GALLERY));
    assert!(!service.is_gallery_administrator(&erin, OTHER_GALLERY));
    assert!(!service.is_site_administrator(&erin));
}

#[test]
fn virtual_albums_are_judged_by_the_gallery_root() {
    let service = test_service(vec![
        role("Root viewers", &[Permission::ViewAlbumOrMediaObject], &[1], &["rita"]),
        role("Branch viewers", &[Permission::ViewAlbumOrMediaObject], &[10], &["bram"]),
    ]);
    let rita = CurrentIdentity::authenticated("rita", ["Root viewers"]);
    let bram = CurrentIdentity::authenticated("bram", ["Branch viewers"]);
    let view = single(Permission::ViewAlbumOrMediaObject);

    let mut tag_album = album(-1, GALLERY);
    tag_album.virtual_type = VirtualAlbumType::Tag;
    let root = album(1, GALLERY);

    for identity in [&rita, &bram] {
        assert_eq!(
            service.is_authorized(identity, view, &tag_album, MatchMode::RequireOne),
            service.is_authorized(identity, view, &root, MatchMode::RequireOne)
        );
    }
    let decision = service
        .decide(&rita, view, &tag_album, MatchMode::RequireOne)
        .expect("decision should be computed");
    assert!(decision.granted);
    assert_eq!(decision.evaluated_against, AlbumId::new(1));

    let mut orphan = album(-2, GalleryId::new(404));
    orphan.virtual_type = VirtualAlbumType::Search;
    assert!(!service.is_authorized(&rita, view, &orphan, MatchMode::RequireOne));
}

#[test]
fn match_modes_combine_requested_permissions() {
    let service = test_service(vec![role(
        "Contributors",
        &[Permission::AddMediaObject],
        &[10],
        &["cleo"],
    )]);
    let cleo = CurrentIdentity::authenticated("cleo", ["Contributors"]);
    let requested = PermissionSet::from(Permission::AddMediaObject).with(Permission::EditMediaObject);
    let target = album(11, GALLERY);

    assert!(service.is_authorized(&cleo, requested, &target, MatchMode::RequireOne));
    assert!(!service.is_authorized(&cleo, requested, &target, MatchMode::RequireAll));
    assert!(!service.is_authorized(
        &cleo,
        PermissionSet::empty(),
        &target,
        MatchMode::RequireOne
    ));
}

#[test]
fn ensure_authorized_reports_the_denied_request() {
    let service = test_service(vec![role(
        "Editors",
        &[Permission::EditAlbum],
        &[10],
        &["bob"],
    )]);
    let bob = CurrentIdentity::authenticated("bob", ["Editors"]);
    service
        .ensure_authorized(
            &bob,
            single(Permission::EditAlbum),
            &album(12, GALLERY),
            MatchMode::RequireOne,
        )
        .expect("bob may edit below his root");

    let error = service
        .ensure_authorized(
            &bob,
            single(Permission::DeleteAlbum),
            &album(12, GALLERY),
            MatchMode::RequireOne,
        )
        .expect_err("delete is not granted");
    assert!(error.is_access_denied());
    assert_eq!(
        error,
        SecurityError::AccessDenied {
            permissions: vec![Permission::DeleteAlbum],
            album_id: AlbumId::new(12),
            gallery_id: GALLERY,
        }
    );
    assert!(render_metrics().contains("gallery_authorization_denials_total{reason=\"no_grant\"}"));
}

#[test]
fn inflation_is_idempotent() {
    let tree = album_tree();
    let roles = [
        role("Editors", &[Permission::EditAlbum], &[10, 11], &[]),
        role("Everything", &[Permission::ViewAlbumOrMediaObject], &[1, 100], &[]),
        role("Nothing", &[], &[], &[]),
    ];
    for role in &roles {
        let first = inflate(role, &tree);
        let second = inflate(role, &tree);
        assert!(first.faults.is_empty());
        assert_eq!(first.role, second.role);
    }
}

#[test]
fn invalidation_rebuilds_the_snapshot() {
    let service = test_service(vec![role(
        "Editors",
        &[Permission::EditAlbum],
        &[10],
        &["bob"],
    )]);
    let bob = CurrentIdentity::authenticated("bob", ["Editors"]);
    let edit = single(Permission::EditAlbum);
    assert!(service.is_authorized(&bob, edit, &album(11, GALLERY), MatchMode::RequireOne));

    service.invalidate_roles();
    assert!(service.is_authorized(&bob, edit, &album(11, GALLERY), MatchMode::RequireOne));
    assert_eq!(
        service
            .store()
            .role("Editors")
            .expect("role should be cached")
            .gallery_ids
            .iter()
            .copied()
            .collect::<Vec<_>>(),
        vec![GALLERY]
    );
}
