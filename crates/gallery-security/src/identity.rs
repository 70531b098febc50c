/// Host-side source of the caller's identity and role assignments.
pub trait IdentityProvider: Send + Sync {
    fn current_user_name(&self) -> Option<String>;

    fn is_authenticated(&self) -> bool;

    fn role_names_for_user(&self, user_name: &str) -> Vec<String>;
}

/// Identity snapshot shared by every check made during one request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CurrentIdentity {
    pub user_name: Option<String>,
    pub is_authenticated: bool,
    pub role_names: Vec<String>,
}

impl CurrentIdentity {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn authenticated<S: Into<String>>(
        user_name: impl Into<String>,
        role_names: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            user_name: Some(user_name.into()),
            is_authenticated: true,
            role_names: role_names.into_iter().map(Into::into).collect(),
        }
    }

    /// Resolves the snapshot once; anonymous callers never carry roles.
    pub fn resolve(provider: &dyn IdentityProvider) -> Self {
        let user_name = provider.current_user_name();
        let is_authenticated = provider.is_authenticated() && user_name.is_some();
        let role_names = match (&user_name, is_authenticated) {
            (Some(name), true) => provider.role_names_for_user(name),
            _ => Vec::new(),
        };
        Self {
            user_name,
            is_authenticated,
            role_names,
        }
    }

    #[must_use]
    pub fn user_name(&self) -> &str {
        self.user_name.as_deref().unwrap_or_default()
    }
}
