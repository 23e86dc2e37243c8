pub const MAX_PURGE_DAYS: u8 = 7;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BanParams {
    pub purge_days: u8,
    pub reason: Option<String>,
}

impl BanParams {
    pub fn delete_message_seconds(&self) -> u32 {
        u32::from(self.purge_days) * 86_400
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListSource {
    Url(String),
    Attachment(String),
}

impl ListSource {
    pub fn url(&self) -> &str {
        match self {
            Self::Url(url) | Self::Attachment(url) => url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MassbanRequest {
    pub params: BanParams,
    pub source: ListSource,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("purge days argument `{0}` is outside 0..={MAX_PURGE_DAYS}")]
    PurgeDaysOutOfRange(String),
    #[error("expected at most one attachment, got {0}")]
    TooManyAttachments(usize),
    #[error("both a url and an attachment were provided")]
    SourceConflict,
    #[error("no url or attachment was provided")]
    MissingSource,
    #[error("source `{0}` is not an http(s) url")]
    InvalidUrl(String),
    #[error("reason is {actual} characters, limit is {limit}")]
    ReasonTooLong { actual: usize, limit: usize },
}

impl RequestError {
    pub fn user_message(&self) -> String {
        match self {
            Self::PurgeDaysOutOfRange(_) => {
                format!("Purge days argument should be between 0 and {MAX_PURGE_DAYS}.")
            }
            Self::TooManyAttachments(_) => "Please attach at most one file.".to_string(),
            Self::SourceConflict => {
                "Provide either a URL or one attached file, not both.".to_string()
            }
            Self::MissingSource => "Provide a URL or attach a file with the IDs.".to_string(),
            Self::InvalidUrl(_) => ":x: Invalid URL!".to_string(),
            Self::ReasonTooLong { limit, .. } => {
                format!("The reason must be at most {limit} characters.")
            }
        }
    }
}

fn split_first_token(raw: &str) -> (&str, &str) {
    let raw = raw.trim_start();
    match raw.find(char::is_whitespace) {
        Some(idx) => (&raw[..idx], raw[idx..].trim_start()),
        None => (raw, ""),
    }
}

fn looks_like_url(token: &str) -> bool {
    token.starts_with("http://") || token.starts_with("https://")
}

pub fn parse_massban_args(
    raw: &str,
    attachments: &[String],
    max_reason_chars: usize,
) -> Result<MassbanRequest, RequestError> {
    if attachments.len() > 1 {
        return Err(RequestError::TooManyAttachments(attachments.len()));
    }

    let mut rest = raw.trim();
    let mut purge_days = 0u8;
    let (first, after_first) = split_first_token(rest);
    if !first.is_empty() && first.chars().all(|ch| ch.is_ascii_digit()) {
        purge_days = first
            .parse::<u8>()
            .ok()
            .filter(|days| *days <= MAX_PURGE_DAYS)
            .ok_or_else(|| RequestError::PurgeDaysOutOfRange(first.to_string()))?;
        rest = after_first;
    }

    let (source, reason) = match attachments.first() {
        Some(attachment) => {
            let (first, _) = split_first_token(rest);
            if looks_like_url(first) {
                return Err(RequestError::SourceConflict);
            }
            (ListSource::Attachment(attachment.clone()), rest)
        }
        None => {
            let (url, reason) = split_first_token(rest);
            if url.is_empty() {
                return Err(RequestError::MissingSource);
            }
            if !looks_like_url(url) {
                return Err(RequestError::InvalidUrl(url.to_string()));
            }
            (ListSource::Url(url.to_string()), reason)
        }
    };

    let reason = reason.trim();
    let reason_chars = reason.chars().count();
    if reason_chars > max_reason_chars {
        return Err(RequestError::ReasonTooLong {
            actual: reason_chars,
            limit: max_reason_chars,
        });
    }

    Ok(MassbanRequest {
        params: BanParams {
            purge_days,
            reason: (!reason.is_empty()).then(|| reason.to_string()),
        },
        source,
    })
}
