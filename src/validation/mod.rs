//! Validation Module
//!
//! Client-side checks for the auth screens. The session manager never calls
//! these; the screens run them before submitting so obviously bad input
//! never reaches the backend.
//!
//! # Usage
//!
//! ```rust
//! use launchhub::validation::{LoginForm, ValidationError};
//!
//! let form = LoginForm { email: "not-an-email".into(), password: String::new() };
//! assert_eq!(form.validate_otp_request(), Err(ValidationError::InvalidEmail));
//! ```

pub mod forms;

pub use forms::{
    is_valid_email, validate_otp_code, LoginForm, SignUpForm, ValidationError,
    MIN_PASSWORD_LENGTH,
};
