#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the launchhub client
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod backend;
pub mod models;
pub mod session;
pub mod settings;
pub mod utils;
pub mod validation;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use backend::{AuthBackend, FileSessionStore, GoTrueClient, MemorySessionStore, SessionStore};
pub use models::{AuthError, AuthErrorKind, AuthResult, ProfileUpdate, Session, User, UserMetadata};
pub use session::{AuthState, RootRoute, SessionManager, SessionManagerConfig, SessionSnapshot};
pub use settings::LaunchhubSettings;
