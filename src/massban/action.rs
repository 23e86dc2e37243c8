use super::request::BanParams;
use crate::shared::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanFailureCause {
    RateLimited,
    NotFound,
    Forbidden,
    Other,
}

impl BanFailureCause {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::Other => "other",
        }
    }

    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            404 => Self::NotFound,
            401 | 403 => Self::Forbidden,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for BanFailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("ban failed ({cause}): {detail}")]
pub struct BanActionError {
    pub cause: BanFailureCause,
    pub detail: String,
}

impl BanActionError {
    pub fn new(cause: BanFailureCause, detail: impl Into<String>) -> Self {
        Self {
            cause,
            detail: detail.into(),
        }
    }
}

pub trait BanAction: Send + Sync {
    fn ban(
        &self,
        tenant_id: &TenantId,
        candidate_id: &str,
        params: &BanParams,
    ) -> Result<(), BanActionError>;
}
