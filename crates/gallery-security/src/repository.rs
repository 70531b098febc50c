use gallery_core::Role;

use crate::errors::Result;

/// Durable role storage owned by the host.
pub trait RoleRepository: Send + Sync {
    /// # Errors
    /// Returns [`crate::SecurityError::Repository`] when storage fails.
    fn load_role(&self, name: &str) -> Result<Option<Role>>;

    /// # Errors
    /// Returns [`crate::SecurityError::Repository`] when storage fails.
    fn load_all_roles(&self) -> Result<Vec<Role>>;

    /// # Errors
    /// Returns [`crate::SecurityError::Repository`] when storage fails.
    fn save_role(&self, role: &Role) -> Result<()>;

    /// # Errors
    /// Returns [`crate::SecurityError::Repository`] when storage fails.
    fn delete_role(&self, name: &str) -> Result<()>;
}
