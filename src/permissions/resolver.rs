use super::store::{OverrideStore, OverrideStoreError};
use crate::shared::{RoleId, TenantId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role_ids: Vec<RoleId>,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Admin,
    Granted,
    Denied,
}

impl AccessLevel {
    pub fn is_authorized(self) -> bool {
        !matches!(self, Self::Denied)
    }
}

pub fn resolve_access(
    store: &dyn OverrideStore,
    actor: &Actor,
    tenant_id: &TenantId,
) -> Result<AccessLevel, OverrideStoreError> {
    if actor.is_admin {
        return Ok(AccessLevel::Admin);
    }
    let Some(record) = store.get(tenant_id)? else {
        return Ok(AccessLevel::Denied);
    };
    let granted = record.users.contains(&actor.user_id)
        || actor.role_ids.iter().any(|role| record.roles.contains(role));
    Ok(if granted {
        AccessLevel::Granted
    } else {
        AccessLevel::Denied
    })
}

pub fn is_authorized(
    store: &dyn OverrideStore,
    actor: &Actor,
    tenant_id: &TenantId,
) -> Result<bool, OverrideStoreError> {
    resolve_access(store, actor, tenant_id).map(AccessLevel::is_authorized)
}
