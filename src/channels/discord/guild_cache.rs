use crate::shared::{RoleId, TenantId, UserId};
use serde::Deserialize;
use std::collections::HashMap;

pub const BAN_MEMBERS: u64 = 1 << 2;
pub const ADMINISTRATOR: u64 = 1 << 3;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserPayload {
    pub(crate) id: UserId,
    #[serde(default)]
    pub(crate) bot: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct MemberPayload {
    #[serde(default)]
    pub(crate) user: Option<UserPayload>,
    #[serde(default)]
    pub(crate) roles: Vec<RoleId>,
    #[serde(default)]
    pub(crate) permissions: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RolePayload {
    pub(crate) id: RoleId,
    #[serde(default)]
    pub(crate) permissions: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GuildPayload {
    pub(crate) id: TenantId,
    #[serde(default)]
    pub(crate) owner_id: Option<UserId>,
    #[serde(default)]
    pub(crate) roles: Vec<RolePayload>,
    #[serde(default)]
    pub(crate) members: Vec<MemberPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GuildDeletePayload {
    pub(crate) id: TenantId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleUpsertPayload {
    pub(crate) guild_id: TenantId,
    pub(crate) role: RolePayload,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleDeletePayload {
    pub(crate) guild_id: TenantId,
    pub(crate) role_id: RoleId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MemberUpdatePayload {
    pub(crate) guild_id: TenantId,
    pub(crate) user: UserPayload,
    #[serde(default)]
    pub(crate) roles: Vec<RoleId>,
}

pub(crate) fn parse_permission_bits(raw: &str) -> u64 {
    raw.trim().parse::<u64>().unwrap_or(0)
}

#[derive(Debug, Clone, Default)]
struct GuildState {
    owner_id: Option<UserId>,
    role_permissions: HashMap<RoleId, u64>,
    bot_roles: Vec<RoleId>,
}

#[derive(Debug, Default)]
pub struct GuildCache {
    bot_user_id: Option<UserId>,
    guilds: HashMap<TenantId, GuildState>,
}

impl GuildCache {
    pub fn set_bot_user(&mut self, user_id: UserId) {
        self.bot_user_id = Some(user_id);
    }

    pub fn bot_user_id(&self) -> Option<&UserId> {
        self.bot_user_id.as_ref()
    }

    pub fn guild_count(&self) -> usize {
        self.guilds.len()
    }

    pub(crate) fn apply_guild(&mut self, payload: GuildPayload) {
        let bot_roles = self
            .bot_user_id
            .as_ref()
            .and_then(|bot| {
                payload.members.iter().find(|member| {
                    member
                        .user
                        .as_ref()
                        .map(|user| &user.id == bot)
                        .unwrap_or(false)
                })
            })
            .map(|member| member.roles.clone());
        let state = self.guilds.entry(payload.id).or_default();
        state.owner_id = payload.owner_id;
        state.role_permissions = payload
            .roles
            .into_iter()
            .map(|role| (role.id, parse_permission_bits(&role.permissions)))
            .collect();
        if let Some(roles) = bot_roles {
            state.bot_roles = roles;
        }
    }

    pub(crate) fn remove_guild(&mut self, payload: GuildDeletePayload) {
        self.guilds.remove(&payload.id);
    }

    pub(crate) fn upsert_role(&mut self, payload: RoleUpsertPayload) {
        self.guilds
            .entry(payload.guild_id)
            .or_default()
            .role_permissions
            .insert(
                payload.role.id,
                parse_permission_bits(&payload.role.permissions),
            );
    }

    pub(crate) fn remove_role(&mut self, payload: RoleDeletePayload) {
        if let Some(state) = self.guilds.get_mut(&payload.guild_id) {
            state.role_permissions.remove(&payload.role_id);
            state.bot_roles.retain(|role| role != &payload.role_id);
        }
    }

    pub(crate) fn update_member(&mut self, payload: MemberUpdatePayload) {
        if self.bot_user_id.as_ref() != Some(&payload.user.id) {
            return;
        }
        self.guilds.entry(payload.guild_id).or_default().bot_roles = payload.roles;
    }

    pub fn member_permissions(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
        role_ids: &[RoleId],
    ) -> u64 {
        let Some(state) = self.guilds.get(tenant_id) else {
            return 0;
        };
        if state.owner_id.as_ref() == Some(user_id) {
            return u64::MAX;
        }
        // @everyone shares the guild id
        let everyone = state
            .role_permissions
            .get(tenant_id.as_str())
            .copied()
            .unwrap_or(0);
        role_ids
            .iter()
            .filter_map(|role| state.role_permissions.get(role))
            .fold(everyone, |acc, bits| acc | bits)
    }

    pub fn is_admin(&self, tenant_id: &TenantId, user_id: &UserId, role_ids: &[RoleId]) -> bool {
        self.member_permissions(tenant_id, user_id, role_ids) & ADMINISTRATOR != 0
    }

    pub fn bot_can_ban(&self, tenant_id: &TenantId) -> bool {
        let Some(bot) = self.bot_user_id.as_ref() else {
            return false;
        };
        let roles = self
            .guilds
            .get(tenant_id)
            .map(|state| state.bot_roles.clone())
            .unwrap_or_default();
        let bits = self.member_permissions(tenant_id, bot, &roles);
        bits & (ADMINISTRATOR | BAN_MEMBERS) != 0
    }
}
