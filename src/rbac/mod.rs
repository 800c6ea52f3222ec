pub mod capability;
mod resolver;

pub use capability::{Capabilities, Capability};
pub use resolver::{parse_role_permissions, BoundRole, NamespacePermissions, RbacEnforcer, RoleKind};
