//! Route table and route access rules.
//!
//! The access rules here decide where the client *navigates*. They are a
//! user-experience convenience only: the back end must enforce authentication
//! and admin authorization on every request independently.

use serde::{Deserialize, Serialize};

/// Named client routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteName {
    Login,
    Register,
    Home,
    Profile,
    Users,
    Settings,
}

impl std::fmt::Display for RouteName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(Route::get(*self).path)
    }
}

/// Static access requirements attached to a route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub requires_admin: bool,
}

impl RouteMeta {
    /// Public route.
    pub const PUBLIC: Self = Self {
        requires_auth: false,
        requires_admin: false,
    };
    /// Any logged-in user.
    pub const AUTH: Self = Self {
        requires_auth: true,
        requires_admin: false,
    };
    /// Logged-in admins only.
    pub const ADMIN: Self = Self {
        requires_auth: true,
        requires_admin: true,
    };

    /// Check the session-dependent rules, auth before admin.
    ///
    /// Returns the redirect to take, or `None` when the session satisfies
    /// this route's requirements.
    #[must_use]
    pub const fn access_redirect(self, is_logged_in: bool, is_admin: bool) -> Option<Navigation> {
        if self.requires_auth && !is_logged_in {
            Some(Navigation::Redirect(RouteName::Login))
        } else if self.requires_admin && !is_admin {
            Some(Navigation::Redirect(RouteName::Home))
        } else {
            None
        }
    }
}

/// A route definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub name: RouteName,
    pub path: &'static str,
    /// Page title shown next to the system name.
    pub title: &'static str,
    pub meta: RouteMeta,
}

/// Every client route. Children of the authenticated layout (`/`) carry the
/// layout's `requires_auth` merged into their own meta.
pub static ROUTES: [Route; 6] = [
    Route {
        name: RouteName::Login,
        path: "/login",
        title: "Login",
        meta: RouteMeta::PUBLIC,
    },
    Route {
        name: RouteName::Register,
        path: "/register",
        title: "Register",
        meta: RouteMeta::PUBLIC,
    },
    Route {
        name: RouteName::Home,
        path: "/",
        title: "Home",
        meta: RouteMeta::AUTH,
    },
    Route {
        name: RouteName::Profile,
        path: "/profile",
        title: "Profile",
        meta: RouteMeta::AUTH,
    },
    Route {
        name: RouteName::Users,
        path: "/users",
        title: "Users",
        meta: RouteMeta::ADMIN,
    },
    Route {
        name: RouteName::Settings,
        path: "/settings",
        title: "System Settings",
        meta: RouteMeta::ADMIN,
    },
];

impl Route {
    /// Look up a route by name.
    #[must_use]
    pub fn get(name: RouteName) -> &'static Self {
        // ROUTES lists every RouteName variant in declaration order.
        match name {
            RouteName::Login => &ROUTES[0],
            RouteName::Register => &ROUTES[1],
            RouteName::Home => &ROUTES[2],
            RouteName::Profile => &ROUTES[3],
            RouteName::Users => &ROUTES[4],
            RouteName::Settings => &ROUTES[5],
        }
    }

    /// Look up a route by path. A trailing slash is ignored.
    #[must_use]
    pub fn find_by_path(path: &str) -> Option<&'static Self> {
        let trimmed = path.trim();
        let normalized = match trimmed.trim_end_matches('/') {
            "" => "/",
            p => p,
        };
        ROUTES.iter().find(|route| route.path == normalized)
    }

    /// Whether this is the self-service registration route.
    #[must_use]
    pub fn is_registration(&self) -> bool {
        self.name == RouteName::Register
    }
}

/// Outcome of a navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "to")]
pub enum Navigation {
    /// Continue to the requested route.
    Proceed,
    /// Go to another route instead.
    Redirect(RouteName),
}

/// The full navigation decision table, first match wins:
///
/// 1. auth required and not logged in: redirect to login
/// 2. admin required and not admin: redirect to home
/// 3. registration route while registration is closed: redirect to login
/// 4. otherwise proceed
#[must_use]
pub fn decide(
    route: &Route,
    is_logged_in: bool,
    is_admin: bool,
    allow_registration: bool,
) -> Navigation {
    if let Some(redirect) = route.meta.access_redirect(is_logged_in, is_admin) {
        return redirect;
    }
    if route.is_registration() && !allow_registration {
        return Navigation::Redirect(RouteName::Login);
    }
    Navigation::Proceed
}
