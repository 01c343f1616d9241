//! Application routes: the home page and the call page.

use crate::meeting_code::{self, ResolveError};
use common::types::MeetingId;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Home page path.
pub const HOME_PATH: &str = "/";

/// Call page path; the meeting identifier is an optional trailing segment.
pub const CALL_PATH: &str = "/call";

/// Where the user is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", rename_all = "lowercase")]
pub enum Route {
    /// Create or join a call.
    Home,
    /// The call page. `None` hosts a new call, `Some` joins that call.
    Call { target: Option<MeetingId> },
}

impl Route {
    /// Host a new call.
    #[must_use]
    pub const fn host() -> Self {
        Route::Call { target: None }
    }

    /// Join `target`.
    #[must_use]
    pub const fn join(target: MeetingId) -> Self {
        Route::Call {
            target: Some(target),
        }
    }

    /// Render as a path.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Route::Home => HOME_PATH.to_string(),
            Route::Call { target: None } => CALL_PATH.to_string(),
            Route::Call {
                target: Some(target),
            } => format!("{CALL_PATH}/{target}"),
        }
    }

    /// Parse a path. Query and fragment are ignored, as is a trailing `/`.
    /// Unknown paths yield `None`.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let path = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('/');

        if path.is_empty() {
            return Some(Route::Home);
        }

        let rest = path.strip_prefix(CALL_PATH)?;
        if rest.is_empty() {
            return Some(Route::host());
        }

        let segment = rest.strip_prefix('/')?;
        if segment.is_empty() || segment.contains('/') {
            return None;
        }
        Some(Route::join(MeetingId::new(segment)))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Shareable link that joins `id`: the base URL without its trailing `/`,
/// then `/call/<id>`.
#[must_use]
pub fn invite_link(base_url: &Url, id: &MeetingId) -> String {
    let base = base_url.as_str().trim_end_matches('/');
    format!("{base}{}", Route::join(id.clone()).path())
}

/// Resolve a typed meeting code and route to it.
///
/// # Errors
///
/// Returns the resolver's error for blank or tokenless input.
pub fn join_route(input: &str) -> Result<Route, ResolveError> {
    meeting_code::resolve(input).map(Route::join)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(Route::Home.path(), "/");
        assert_eq!(Route::host().path(), "/call");
        assert_eq!(Route::join(MeetingId::new("abc")).path(), "/call/abc");
    }

    #[test]
    fn test_parse_round_trips_paths() {
        for route in [Route::Home, Route::host(), Route::join(MeetingId::new("a-1"))] {
            assert_eq!(Route::parse(&route.path()), Some(route));
        }
    }

    #[test]
    fn test_parse_tolerates_trailing_slash_and_query() {
        assert_eq!(Route::parse("/call/"), Some(Route::host()));
        assert_eq!(
            Route::parse("/call/abc/?utm=x"),
            Some(Route::join(MeetingId::new("abc")))
        );
        assert_eq!(Route::parse(""), Some(Route::Home));
    }

    #[test]
    fn test_parse_rejects_unknown_paths() {
        assert_eq!(Route::parse("/calls"), None);
        assert_eq!(Route::parse("/settings"), None);
        assert_eq!(Route::parse("/call/a/b"), None);
    }

    #[test]
    fn test_invite_link_strips_trailing_slash() {
        let id = MeetingId::new("abc123");
        let base = Url::parse("http://localhost:5173/").unwrap();
        assert_eq!(invite_link(&base, &id), "http://localhost:5173/call/abc123");

        let base = Url::parse("https://example.com/app/").unwrap();
        assert_eq!(invite_link(&base, &id), "https://example.com/app/call/abc123");
    }

    #[test]
    fn test_invite_link_resolves_back_to_id() {
        let id = MeetingId::new("0f1e-77");
        let base = Url::parse("https://example.com/").unwrap();
        let route = join_route(&invite_link(&base, &id)).unwrap();
        assert_eq!(route, Route::join(id));
    }

    #[test]
    fn test_join_route_rejects_blank() {
        assert_eq!(join_route("  "), Err(ResolveError::Empty));
    }

    #[test]
    fn test_route_serializes_tagged() {
        let json = serde_json::to_value(Route::join(MeetingId::new("abc"))).unwrap();
        assert_eq!(json["route"], "call");
        assert_eq!(json["target"], "abc");
    }
}
