use std::{collections::BTreeSet, sync::Arc};

use gallery_core::{AlbumId, GalleryId, Role};

use crate::{
    admin_scope::{administrable_galleries, is_site_administrator},
    errors::{MutationRule, Result, SecurityError},
    hierarchy::AlbumHierarchy,
    identity::CurrentIdentity,
    metrics::{record_authorization_denial, record_mutation_rejection, DENIAL_REASON_NOT_ADMINISTRATOR},
    naming::RoleNaming,
    role_store::InflatedRole,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleMutation {
    Create(Role),
    Update { before: Role, after: Role },
    Delete(Role),
}

impl RoleMutation {
    #[must_use]
    pub fn role_name(&self) -> &str {
        match self {
            Self::Create(role) | Self::Delete(role) | Self::Update { before: role, .. } => {
                role.name.as_str()
            }
        }
    }

    #[must_use]
    pub fn before(&self) -> Option<&Role> {
        match self {
            Self::Create(_) => None,
            Self::Update { before, .. } => Some(before),
            Self::Delete(role) => Some(role),
        }
    }

    #[must_use]
    pub fn after(&self) -> Option<&Role> {
        match self {
            Self::Create(role) => Some(role),
            Self::Update { after, .. } => Some(after),
            Self::Delete(_) => None,
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Update { .. } => "update",
            Self::Delete(_) => "delete",
        }
    }
}

/// Who is asking, and the role table the request is judged against.
#[derive(Debug, Clone, Copy)]
pub struct MutationContext<'a> {
    pub actor: &'a CurrentIdentity,
    pub actor_roles: &'a [Arc<InflatedRole>],
    pub all_roles: &'a [Arc<InflatedRole>],
}

pub struct RoleMutationValidator {
    hierarchy: Arc<dyn AlbumHierarchy>,
    naming: Arc<RoleNaming>,
}

impl RoleMutationValidator {
    pub fn new(hierarchy: Arc<dyn AlbumHierarchy>, naming: Arc<RoleNaming>) -> Self {
        Self { hierarchy, naming }
    }

    /// Runs every safety rule in order and stops at the first violation.
    ///
    /// # Errors
    /// [`SecurityError::NotAdministrator`] when the actor administers nothing,
    /// [`SecurityError::RoleNotFound`] when an update or delete names an
    /// unknown role, and [`SecurityError::InvalidRoleMutation`] for rule
    /// violations.
    pub fn validate(&self, mutation: &RoleMutation, context: &MutationContext<'_>) -> Result<()> {
        let outcome = self.run(mutation, context);
        match &outcome {
            Ok(()) => tracing::debug!(
                role = mutation.role_name(),
                actor = context.actor.user_name(),
                kind = mutation.kind(),
                "role mutation accepted"
            ),
            Err(SecurityError::InvalidRoleMutation { rule, reason }) => {
                record_mutation_rejection(rule.as_str());
                tracing::info!(
                    role = mutation.role_name(),
                    actor = context.actor.user_name(),
                    kind = mutation.kind(),
                    rule = rule.as_str(),
                    reason = reason.as_str(),
                    "role mutation rejected"
                );
            }
            Err(SecurityError::NotAdministrator(_)) => {
                record_authorization_denial(DENIAL_REASON_NOT_ADMINISTRATOR);
            }
            Err(_) => {}
        }
        outcome
    }

    fn run(&self, mutation: &RoleMutation, context: &MutationContext<'_>) -> Result<()> {
        let actor_is_site_admin = is_site_administrator(context.actor_roles);
        if !context.actor.is_authenticated
            || (!actor_is_site_admin && administrable_galleries(context.actor_roles).is_empty())
        {
            return Err(SecurityError::NotAdministrator(format!(
                "{} cannot manage roles",
                display_actor(context.actor)
            )));
        }

        check_existence(mutation, context.all_roles)?;
        self.check_owner_role_flags(mutation)?;
        check_last_site_administrator(mutation, context.all_roles)?;
        check_self_lockout(mutation, context)?;
        if actor_is_site_admin {
            return Ok(());
        }
        check_elevation(mutation)?;
        self.check_gallery_scope(mutation, context)
    }

    /// Owner roles never carry admin flags, whoever saves them.
    fn check_owner_role_flags(&self, mutation: &RoleMutation) -> Result<()> {
        let Some(after) = mutation.after() else {
            return Ok(());
        };
        if !self.naming.is_owner_role(after.name.as_str())
            || !(after.is_site_admin() || after.is_gallery_admin())
        {
            return Ok(());
        }
        Err(SecurityError::mutation(
            MutationRule::OwnerRoleAdministration,
            format!("album owner role '{}' cannot carry admin permissions", after.name),
        ))
    }

    /// Owner roles are exempt only for album additions, album removals and
    /// deletion. Creating one, or changing its flags or members, is scoped.
    fn check_gallery_scope(
        &self,
        mutation: &RoleMutation,
        context: &MutationContext<'_>,
    ) -> Result<()> {
        let name = mutation.role_name();
        let owner_role = self.naming.is_owner_role(name);

        let mut touched_albums = BTreeSet::new();
        match mutation {
            RoleMutation::Delete(_) if owner_role => return Ok(()),
            RoleMutation::Create(role) | RoleMutation::Delete(role) => {
                touched_albums.extend(role.root_album_ids.iter().copied());
            }
            RoleMutation::Update { before, after } => {
                if !owner_role {
                    touched_albums.extend(
                        before
                            .root_album_ids
                            .symmetric_difference(&after.root_album_ids)
                            .copied(),
                    );
                }
                if before.permissions != after.permissions || before.members != after.members {
                    touched_albums.extend(before.root_album_ids.iter().copied());
                    touched_albums.extend(after.root_album_ids.iter().copied());
                }
            }
        }

        let mut touched = self.galleries_of(&touched_albums).map_err(|album_id| {
            SecurityError::mutation(
                MutationRule::GalleryScope,
                format!("album {album_id} of role '{name}' cannot be resolved"),
            )
        })?;
        touched.extend(self.naming.template_gallery(name));

        let scope = administrable_galleries(context.actor_roles);
        if let Some(gallery_id) = touched.iter().find(|gallery_id| !scope.contains(**gallery_id)) {
            return Err(SecurityError::mutation(
                MutationRule::GalleryScope,
                format!(
                    "{} does not administer gallery {gallery_id} touched by role '{name}'",
                    display_actor(context.actor)
                ),
            ));
        }
        Ok(())
    }

    fn galleries_of(
        &self,
        album_ids: &BTreeSet<AlbumId>,
    ) -> std::result::Result<BTreeSet<GalleryId>, AlbumId> {
        album_ids
            .iter()
            .map(|album_id| {
                self.hierarchy
                    .album(*album_id)
                    .map(|album| album.gallery_id)
                    .ok_or(*album_id)
            })
            .collect()
    }
}

fn display_actor(actor: &CurrentIdentity) -> String {
    actor
        .user_name
        .clone()
        .unwrap_or_else(|| String::from("anonymous user"))
}

fn check_existence(mutation: &RoleMutation, all_roles: &[Arc<InflatedRole>]) -> Result<()> {
    let exists = |name: &str| all_roles.iter().any(|role| role.name() == name);
    match mutation {
        RoleMutation::Create(role) => {
            if exists(role.name.as_str()) {
                return Err(SecurityError::mutation(
                    MutationRule::DuplicateRole,
                    format!("role '{}' already exists", role.name),
                ));
            }
        }
        RoleMutation::Update { before, after } => {
            if !exists(before.name.as_str()) {
                return Err(SecurityError::RoleNotFound(before.name.to_string()));
            }
            if before.name != after.name {
                return Err(SecurityError::mutation(
                    MutationRule::Rename,
                    format!("role '{}' cannot be renamed to '{}'", before.name, after.name),
                ));
            }
        }
        RoleMutation::Delete(role) => {
            if !exists(role.name.as_str()) {
                return Err(SecurityError::RoleNotFound(role.name.to_string()));
            }
        }
    }
    Ok(())
}

fn check_last_site_administrator(
    mutation: &RoleMutation,
    all_roles: &[Arc<InflatedRole>],
) -> Result<()> {
    let Some(before) = mutation.before().filter(|role| role.is_site_admin()) else {
        return Ok(());
    };
    let loses_site_admin = match mutation.after() {
        Some(after) => !after.is_site_admin() || after.members.is_empty(),
        None => true,
    };
    if !loses_site_admin {
        return Ok(());
    }

    let another_remains = all_roles.iter().any(|role| {
        role.name() != before.name.as_str() && role.is_site_admin() && !role.role.members.is_empty()
    });
    if another_remains {
        return Ok(());
    }
    Err(SecurityError::mutation(
        MutationRule::LastSiteAdministrator,
        format!(
            "role '{}' is the last site administrator role with members",
            before.name
        ),
    ))
}

fn check_self_lockout(mutation: &RoleMutation, context: &MutationContext<'_>) -> Result<()> {
    let Some(before) = mutation.before() else {
        return Ok(());
    };
    let actor = context.actor.user_name();
    let name = before.name.as_str();
    let is_member = before.has_member(actor)
        || context.actor_roles.iter().any(|role| role.name() == name);
    if !is_member {
        return Ok(());
    }

    let keeps_elsewhere = context
        .actor_roles
        .iter()
        .filter(|role| role.name() != name)
        .any(|role| {
            role.is_site_admin() || (role.is_gallery_admin() && !role.gallery_ids.is_empty())
        });
    let keeps_here = mutation.after().is_some_and(|after| {
        after.has_member(actor)
            && (after.is_site_admin()
                || (after.is_gallery_admin() && !after.root_album_ids.is_empty()))
    });
    if keeps_elsewhere || keeps_here {
        return Ok(());
    }
    Err(SecurityError::mutation(
        MutationRule::SelfLockout,
        format!("change to role '{name}' would remove {actor}'s own administrative access"),
    ))
}

fn check_elevation(mutation: &RoleMutation) -> Result<()> {
    let touches_site_admin = mutation.before().is_some_and(Role::is_site_admin)
        || mutation.after().is_some_and(Role::is_site_admin);
    if !touches_site_admin {
        return Ok(());
    }
    Err(SecurityError::mutation(
        MutationRule::Elevation,
        format!(
            "only site administrators may manage site administrator role '{}'",
            mutation.role_name()
        ),
    ))
}
