//! Session Management Module
//!
//! Tracks who is signed in and exposes it to the rest of the app.
//!
//! # Modules
//!
//! - [`manager`] - Owner of the session snapshot and mediator of auth actions
//! - [`state`] - The published `{session, user, loading}` snapshot
//! - [`navigation`] - Which root navigator a snapshot calls for

pub mod manager;
pub mod navigation;
pub mod state;

pub use manager::{SessionManager, SessionManagerConfig};
pub use navigation::{AuthScreen, MainTab, RootRoute};
pub use state::{AuthState, SessionSnapshot};
