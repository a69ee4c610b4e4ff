//! Form checks run by the login, sign-up and verification screens before
//! they call the session manager
//!
//! Each validator returns the first failing field, in the order the fields
//! appear on screen.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Default minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 6;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email regex")
});

/// Why a form cannot be submitted; the message is shown verbatim
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter your full name")]
    MissingFullName,
    #[error("Please enter your email address")]
    MissingEmail,
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Please enter your college name")]
    MissingCollege,
    #[error("Please enter a password")]
    MissingNewPassword,
    #[error("Please enter your password")]
    MissingPassword,
    #[error("Password must be at least {0} characters")]
    PasswordTooShort(usize),
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Please enter the verification code")]
    MissingCode,
}

impl ValidationError {
    /// Form field the error belongs to
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingFullName => "full_name",
            ValidationError::MissingEmail | ValidationError::InvalidEmail => "email",
            ValidationError::MissingCollege => "college",
            ValidationError::MissingNewPassword
            | ValidationError::MissingPassword
            | ValidationError::PasswordTooShort(_) => "password",
            ValidationError::PasswordMismatch => "confirm_password",
            ValidationError::MissingCode => "code",
        }
    }
}

/// Whether `email` looks like an address (`name@host.tld`)
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn check_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::MissingEmail);
    }
    if !is_valid_email(email) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(email.to_string())
}

/// Login screen input
#[derive(Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    /// Validate for a password sign-in, returning the trimmed e-mail
    ///
    /// # Errors
    /// Returns the first field that fails
    pub fn validate_password_login(&self) -> Result<String, ValidationError> {
        let email = check_email(&self.email)?;
        if self.password.is_empty() {
            return Err(ValidationError::MissingPassword);
        }
        Ok(email)
    }

    /// Validate for a one-time-code request; only the e-mail matters
    ///
    /// # Errors
    /// Returns [`ValidationError::MissingEmail`] or [`ValidationError::InvalidEmail`]
    pub fn validate_otp_request(&self) -> Result<String, ValidationError> {
        check_email(&self.email)
    }
}

/// Sign-up screen input
#[derive(Clone, Default)]
pub struct SignUpForm {
    pub full_name: String,
    pub email: String,
    pub college: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignUpForm {
    /// Validate every field, requiring passwords of `min_password_length`
    ///
    /// # Errors
    /// Returns the first field that fails
    pub fn validate(&self, min_password_length: usize) -> Result<(), ValidationError> {
        if self.full_name.trim().is_empty() {
            return Err(ValidationError::MissingFullName);
        }
        check_email(&self.email)?;
        if self.college.trim().is_empty() {
            return Err(ValidationError::MissingCollege);
        }
        if self.password.is_empty() {
            return Err(ValidationError::MissingNewPassword);
        }
        if self.password.chars().count() < min_password_length {
            return Err(ValidationError::PasswordTooShort(min_password_length));
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        Ok(())
    }
}

/// Validate a verification code, returning it trimmed
///
/// # Errors
/// Returns [`ValidationError::MissingCode`] for a blank code
pub fn validate_otp_code(code: &str) -> Result<String, ValidationError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(ValidationError::MissingCode);
    }
    Ok(code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_up_form() -> SignUpForm {
        SignUpForm {
            full_name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            college: "Test College".to_string(),
            password: "secret123".to_string(),
            confirm_password: "secret123".to_string(),
        }
    }

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last+tag@uni.ac.in"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.de"));
        assert!(!is_valid_email("@c.de"));
        assert!(!is_valid_email("a@@c.de"));
    }

    #[test]
    fn test_login_form() {
        let mut form = LoginForm::default();
        assert_eq!(form.validate_otp_request(), Err(ValidationError::MissingEmail));

        form.email = "nope".to_string();
        assert_eq!(
            form.validate_otp_request().unwrap_err().to_string(),
            "Please enter a valid email address"
        );

        form.email = "  test@example.com ".to_string();
        assert_eq!(form.validate_otp_request().unwrap(), "test@example.com");
        assert_eq!(
            form.validate_password_login(),
            Err(ValidationError::MissingPassword)
        );

        form.password = "x".to_string();
        assert!(form.validate_password_login().is_ok());
    }

    #[test]
    fn test_sign_up_form_reports_first_failure() {
        assert!(sign_up_form().validate(MIN_PASSWORD_LENGTH).is_ok());

        let form = SignUpForm {
            full_name: " ".to_string(),
            college: String::new(),
            ..sign_up_form()
        };
        assert_eq!(
            form.validate(MIN_PASSWORD_LENGTH),
            Err(ValidationError::MissingFullName)
        );

        let form = SignUpForm {
            college: String::new(),
            ..sign_up_form()
        };
        assert_eq!(
            form.validate(MIN_PASSWORD_LENGTH).unwrap_err().to_string(),
            "Please enter your college name"
        );
    }

    #[test]
    fn test_sign_up_passwords() {
        let form = SignUpForm {
            password: "abc".to_string(),
            confirm_password: "abc".to_string(),
            ..sign_up_form()
        };
        let error = form.validate(MIN_PASSWORD_LENGTH).unwrap_err();
        assert_eq!(error.to_string(), "Password must be at least 6 characters");
        assert_eq!(error.field(), "password");
        assert!(form.validate(3).is_ok());

        let form = SignUpForm {
            confirm_password: "secret124".to_string(),
            ..sign_up_form()
        };
        assert_eq!(
            form.validate(MIN_PASSWORD_LENGTH),
            Err(ValidationError::PasswordMismatch)
        );
    }

    #[test]
    fn test_otp_code() {
        assert_eq!(validate_otp_code("   "), Err(ValidationError::MissingCode));
        assert_eq!(validate_otp_code(" 123456 ").unwrap(), "123456");
    }
}
