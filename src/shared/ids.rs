use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

const TOKEN_BYTES: usize = 8;

pub fn validate_snowflake_value(kind: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{kind} must be non-empty"));
    }
    if value.len() > 20 {
        return Err(format!("{kind} must be at most 20 digits"));
    }
    if value.chars().all(|ch| ch.is_ascii_digit()) {
        return Ok(());
    }
    Err(format!("{kind} must use only ASCII digits"))
}

pub fn validate_token_value(kind: &str, value: &str) -> Result<(), String> {
    if value.len() != TOKEN_BYTES * 2 {
        return Err(format!("{kind} must be {} characters", TOKEN_BYTES * 2));
    }
    if value
        .chars()
        .all(|ch| ch.is_ascii_digit() || ('a'..='f').contains(&ch))
    {
        return Ok(());
    }
    Err(format!("{kind} must use only lowercase hex digits"))
}

pub(crate) fn random_hex_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    if getrandom::getrandom(&mut bytes).is_err() {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        bytes = nanos.to_le_bytes();
    }
    let mut out = String::with_capacity(TOKEN_BYTES * 2);
    const HEX: &[u8; 16] = b"0123456789abcdef";
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

macro_rules! define_id_type {
    ($name:ident, $kind:literal, $validate:path) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn parse(raw: &str) -> Result<Self, String> {
                $validate($kind, raw)?;
                Ok(Self(raw.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.as_str()
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).map_err(|err| {
                    D::Error::custom(format!("invalid {} `{}`: {}", $kind, raw, err))
                })
            }
        }
    };
}

macro_rules! define_token_type {
    ($name:ident, $kind:literal) => {
        define_id_type!($name, $kind, validate_token_value);

        impl $name {
            pub fn generate() -> Self {
                Self(random_hex_token())
            }
        }
    };
}

define_id_type!(TenantId, "tenant id", validate_snowflake_value);
define_id_type!(UserId, "user id", validate_snowflake_value);
define_id_type!(RoleId, "role id", validate_snowflake_value);
define_id_type!(ChannelId, "channel id", validate_snowflake_value);
define_id_type!(MessageId, "message id", validate_snowflake_value);
define_token_type!(JobId, "job id");
define_token_type!(ConfirmationToken, "confirmation token");
