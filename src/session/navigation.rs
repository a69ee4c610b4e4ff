//! Root navigator decision
//!
//! The app shows a loading screen while the session is initializing, the
//! auth stack when signed out, and the main tabs when signed in.

use super::state::{AuthState, SessionSnapshot};
use std::fmt;

/// Screens of the unauthenticated stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScreen {
    Login,
    SignUp,
    OtpVerification,
}

/// Tabs of the authenticated navigator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainTab {
    Feed,
    Projects,
    Hackathons,
    College,
    Profile,
}

impl AuthScreen {
    pub const ALL: [AuthScreen; 3] = [
        AuthScreen::Login,
        AuthScreen::SignUp,
        AuthScreen::OtpVerification,
    ];
}

impl MainTab {
    pub const ALL: [MainTab; 5] = [
        MainTab::Feed,
        MainTab::Projects,
        MainTab::Hackathons,
        MainTab::College,
        MainTab::Profile,
    ];

    /// Icon name shown in the tab bar
    #[must_use]
    pub fn icon(self) -> &'static str {
        match self {
            MainTab::Feed => "home",
            MainTab::Projects => "folder",
            MainTab::Hackathons => "award",
            MainTab::College => "book-open",
            MainTab::Profile => "user",
        }
    }
}

/// Which navigator the root should render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootRoute {
    Loading,
    Auth,
    Main,
}

impl RootRoute {
    #[must_use]
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        match snapshot.state() {
            AuthState::Initializing => RootRoute::Loading,
            AuthState::Unauthenticated => RootRoute::Auth,
            AuthState::Authenticated => RootRoute::Main,
        }
    }

    /// Screen the route opens on, `None` while loading
    #[must_use]
    pub fn initial_screen(self) -> Option<&'static str> {
        match self {
            RootRoute::Loading => None,
            RootRoute::Auth => Some("Login"),
            RootRoute::Main => Some("Feed"),
        }
    }
}

impl fmt::Display for RootRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootRoute::Loading => write!(f, "loading"),
            RootRoute::Auth => write!(f, "auth"),
            RootRoute::Main => write!(f, "main"),
        }
    }
}
