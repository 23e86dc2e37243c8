use crate::shared::{RoleId, TenantId, UserId};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverrideKind {
    User,
    Role,
}

impl OverrideKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Role => "role",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "role" => Ok(Self::Role),
            _ => Err("kind must be one of: user, role".to_string()),
        }
    }
}

impl std::fmt::Display for OverrideKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideSubject {
    User(UserId),
    Role(RoleId),
}

impl OverrideSubject {
    pub fn kind(&self) -> OverrideKind {
        match self {
            Self::User(_) => OverrideKind::User,
            Self::Role(_) => OverrideKind::Role,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::User(id) => id.as_str(),
            Self::Role(id) => id.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionOverride {
    pub tenant_id: TenantId,
    pub users: BTreeSet<UserId>,
    pub roles: BTreeSet<RoleId>,
}

impl PermissionOverride {
    pub fn empty(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            users: BTreeSet::new(),
            roles: BTreeSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.roles.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OverrideStoreError {
    #[error("sqlite open failed at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to create override database parent {path}: {source}")]
    CreateParent {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sqlite statement failed: {source}")]
    Sql {
        #[source]
        source: rusqlite::Error,
    },
    #[error("invalid override kind `{value}` in database")]
    InvalidKind { value: String },
    #[error("invalid override subject `{value}` in database: {reason}")]
    InvalidSubject { value: String, reason: String },
}

pub trait OverrideStore: Send + Sync {
    fn get(&self, tenant_id: &TenantId) -> Result<Option<PermissionOverride>, OverrideStoreError>;

    fn grant(
        &self,
        tenant_id: &TenantId,
        subject: &OverrideSubject,
    ) -> Result<bool, OverrideStoreError>;

    fn revoke(
        &self,
        tenant_id: &TenantId,
        subject: &OverrideSubject,
    ) -> Result<bool, OverrideStoreError>;
}

#[derive(Debug, Clone)]
pub struct SqliteOverrideStore {
    db_path: PathBuf,
}

impl SqliteOverrideStore {
    pub fn open(db_path: &Path) -> Result<Self, OverrideStoreError> {
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent).map_err(|source| OverrideStoreError::CreateParent {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let store = Self {
            db_path: db_path.to_path_buf(),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn ensure_schema(&self) -> Result<(), OverrideStoreError> {
        self.connect()?
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS permission_tenants (
                    tenant_id TEXT NOT NULL PRIMARY KEY,
                    created_at INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS permission_overrides (
                    tenant_id TEXT NOT NULL,
                    kind TEXT NOT NULL,
                    subject_id TEXT NOT NULL,
                    granted_at INTEGER NOT NULL,
                    PRIMARY KEY (tenant_id, kind, subject_id)
                );
                ",
            )
            .map_err(|source| OverrideStoreError::Sql { source })
    }

    fn connect(&self) -> Result<Connection, OverrideStoreError> {
        Connection::open(&self.db_path).map_err(|source| OverrideStoreError::Open {
            path: self.db_path.display().to_string(),
            source,
        })
    }
}

impl OverrideStore for SqliteOverrideStore {
    fn get(&self, tenant_id: &TenantId) -> Result<Option<PermissionOverride>, OverrideStoreError> {
        let connection = self.connect()?;
        let exists = connection
            .query_row(
                "SELECT 1 FROM permission_tenants WHERE tenant_id = ?1",
                params![tenant_id.as_str()],
                |_| Ok(()),
            )
            .optional()
            .map_err(|source| OverrideStoreError::Sql { source })?;
        if exists.is_none() {
            return Ok(None);
        }

        let mut statement = connection
            .prepare(
                "SELECT kind, subject_id FROM permission_overrides
                 WHERE tenant_id = ?1 ORDER BY kind, subject_id",
            )
            .map_err(|source| OverrideStoreError::Sql { source })?;
        let rows = statement
            .query_map(params![tenant_id.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|source| OverrideStoreError::Sql { source })?;

        let mut record = PermissionOverride::empty(tenant_id.clone());
        for row in rows {
            let (kind, subject_id) = row.map_err(|source| OverrideStoreError::Sql { source })?;
            let invalid = |reason: String| OverrideStoreError::InvalidSubject {
                value: subject_id.clone(),
                reason,
            };
            match OverrideKind::parse(&kind) {
                Ok(OverrideKind::User) => {
                    record
                        .users
                        .insert(UserId::parse(&subject_id).map_err(invalid)?);
                }
                Ok(OverrideKind::Role) => {
                    record
                        .roles
                        .insert(RoleId::parse(&subject_id).map_err(invalid)?);
                }
                Err(_) => return Err(OverrideStoreError::InvalidKind { value: kind }),
            }
        }
        Ok(Some(record))
    }

    fn grant(
        &self,
        tenant_id: &TenantId,
        subject: &OverrideSubject,
    ) -> Result<bool, OverrideStoreError> {
        let mut connection = self.connect()?;
        let tx = connection
            .transaction()
            .map_err(|source| OverrideStoreError::Sql { source })?;
        tx.execute(
            "INSERT INTO permission_tenants (tenant_id, created_at)
             VALUES (?1, strftime('%s','now'))
             ON CONFLICT(tenant_id) DO NOTHING",
            params![tenant_id.as_str()],
        )
        .map_err(|source| OverrideStoreError::Sql { source })?;
        let inserted = tx
            .execute(
                "INSERT INTO permission_overrides (tenant_id, kind, subject_id, granted_at)
                 VALUES (?1, ?2, ?3, strftime('%s','now'))
                 ON CONFLICT(tenant_id, kind, subject_id) DO NOTHING",
                params![tenant_id.as_str(), subject.kind().as_str(), subject.id()],
            )
            .map_err(|source| OverrideStoreError::Sql { source })?;
        tx.commit()
            .map_err(|source| OverrideStoreError::Sql { source })?;
        Ok(inserted > 0)
    }

    fn revoke(
        &self,
        tenant_id: &TenantId,
        subject: &OverrideSubject,
    ) -> Result<bool, OverrideStoreError> {
        let removed = self
            .connect()?
            .execute(
                "DELETE FROM permission_overrides
                 WHERE tenant_id = ?1 AND kind = ?2 AND subject_id = ?3",
                params![tenant_id.as_str(), subject.kind().as_str(), subject.id()],
            )
            .map_err(|source| OverrideStoreError::Sql { source })?;
        Ok(removed > 0)
    }
}
