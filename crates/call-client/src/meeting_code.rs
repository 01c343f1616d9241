//! Meeting code resolution.
//!
//! Users paste whatever they were sent: a bare code, a full invite link, or a
//! link missing its scheme. [`resolve`] reduces all of these to the meeting
//! identifier.

use common::types::MeetingId;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

/// `/call/<token>` anywhere in text that does not parse as a URL.
#[allow(clippy::expect_used)] // Literal pattern, checked by tests
static CALL_PATH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/call/([A-Za-z0-9-]+)").expect("valid call path pattern"));

/// Path segment that precedes the identifier in invite links.
const CALL_SEGMENT: &str = "call";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Meeting code is empty")]
    Empty,

    #[error("No meeting code found in {0:?}")]
    NoToken(String),
}

/// Resolve free-form input to a meeting identifier.
///
/// 1. Parse as a URL (prefixing `https://` when there is no `scheme://`) and
///    take the segment after `call`, else the last non-empty segment.
/// 2. If that fails, take the token of a `/call/<token>` match.
/// 3. Keep only what follows the final `/` of whatever remains.
///
/// # Errors
///
/// `Empty` for blank input, `NoToken` when resolution ends in an empty token
/// (for example `https://host/call/`).
pub fn resolve(input: &str) -> Result<MeetingId, ResolveError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ResolveError::Empty);
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let token = match Url::parse(&candidate) {
        Ok(url) => token_from_path(url.path()).unwrap_or_else(|| trimmed.to_string()),
        Err(_) => CALL_PATH_PATTERN
            .captures(trimmed)
            .and_then(|captures| captures.get(1))
            .map_or_else(|| trimmed.to_string(), |m| m.as_str().to_string()),
    };

    let token = match token.rsplit_once('/') {
        Some((_, last)) => last.to_string(),
        None => token,
    };

    if token.is_empty() {
        return Err(ResolveError::NoToken(trimmed.to_string()));
    }
    Ok(MeetingId::new(token))
}

/// Segment after `call`, else the last non-empty segment.
fn token_from_path(path: &str) -> Option<String> {
    let segments: Vec<&str> = path.split('/').collect();

    if let Some(next) = segments
        .iter()
        .position(|segment| *segment == CALL_SEGMENT)
        .and_then(|index| segments.get(index + 1))
    {
        return Some((*next).to_string());
    }

    segments
        .iter()
        .rev()
        .find(|segment| !segment.is_empty())
        .map(|segment| (*segment).to_string())
}
