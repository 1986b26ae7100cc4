//! Access check gating protected views

use serde::{Deserialize, Serialize};

/// Result of a route check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// Send the user to `to`, remembering where they were going
    Redirect { to: String, return_to: String },
}

impl GuardDecision {
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Gate for protected path prefixes.
///
/// Prefixes match on whole path segments: `/dashboard` protects
/// `/dashboard` and `/dashboard/alerts`, not `/dashboards`. A `/` prefix
/// protects everything except the landing path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteGuard {
    landing: String,
    protected: Vec<String>,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new("/login", ["/dashboard", "/profile", "/settings"])
    }
}

impl RouteGuard {
    pub fn new<I, S>(landing: impl Into<String>, protected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            landing: normalize(&landing.into()),
            protected: protected
                .into_iter()
                .map(|prefix| normalize(&prefix.into()))
                .collect(),
        }
    }

    /// Where unauthenticated users are sent
    pub fn landing(&self) -> &str {
        &self.landing
    }

    pub fn protected_prefixes(&self) -> &[String] {
        &self.protected
    }

    pub fn is_protected(&self, path: &str) -> bool {
        let path = normalize(path);
        if path == self.landing {
            return false;
        }
        self.protected.iter().any(|prefix| {
            prefix == "/"
                || path == *prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Allow public paths; allow protected paths only with a non-empty token
    pub fn check(&self, path: &str, token: Option<&str>) -> GuardDecision {
        let has_token = token.is_some_and(|t| !t.trim().is_empty());
        if has_token || !self.is_protected(path) {
            GuardDecision::Allow
        } else {
            GuardDecision::Redirect {
                to: self.landing.clone(),
                return_to: path.to_string(),
            }
        }
    }
}

/// Strip query and fragment, collapse repeated slashes, ensure a leading
/// slash and drop a trailing one
pub(crate) fn normalize(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default().trim();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> RouteGuard {
        RouteGuard::new("/login", ["/dashboard", "/profile"])
    }

    #[test]
    fn test_denies_every_protected_path_without_token() {
        let guard = guard();
        for path in [
            "/dashboard",
            "/dashboard/",
            "/dashboard/alerts",
            "/dashboard?tab=beds",
            "/profile",
            "profile/edit",
            "//dashboard",
            "/dashboard//alerts",
        ] {
            for token in [None, Some(""), Some("   ")] {
                assert_eq!(
                    guard.check(path, token),
                    GuardDecision::Redirect {
                        to: "/login".into(),
                        return_to: path.into(),
                    },
                    "path {path:?} with token {token:?}"
                );
            }
        }
    }

    #[test]
    fn test_allows_protected_path_with_token() {
        assert!(guard().check("/dashboard/alerts", Some("tok")).is_allowed());
    }

    #[test]
    fn test_public_paths_are_allowed() {
        let guard = guard();
        for path in ["/", "/login", "/about", "/dashboards", "/profiles/x"] {
            assert!(guard.check(path, None).is_allowed(), "path {path:?}");
        }
    }

    #[test]
    fn test_root_prefix_protects_everything_but_landing() {
        let guard = RouteGuard::new("/signin/", ["/"]);
        assert_eq!(guard.landing(), "/signin");
        assert!(guard.is_protected("/"));
        assert!(guard.is_protected("/anything"));
        assert!(!guard.is_protected("/signin"));
        assert!(!guard.is_protected("/signin?next=/x"));
    }

    #[test]
    fn test_repeated_slashes_collapse() {
        assert_eq!(normalize("//dashboard//alerts/"), "/dashboard/alerts");
        assert_eq!(normalize("///"), "/");
        assert_eq!(normalize(""), "/");
        assert_eq!(RouteGuard::new("//login", ["/dashboard"]).landing(), "/login");
    }
}
