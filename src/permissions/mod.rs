pub mod resolver;
pub mod store;

pub use resolver::{is_authorized, resolve_access, AccessLevel, Actor};
pub use store::{
    OverrideKind, OverrideStore, OverrideStoreError, OverrideSubject, PermissionOverride,
    SqliteOverrideStore,
};
