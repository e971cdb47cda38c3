//! Identity-provider error mapping and sign-up validation. The provider
//! itself is external; the daemon only turns its error codes into text the UI
//! can show, and runs the synchronous checks that must reject before any
//! provider call is made.

/// Where an auth failure happened, used to pick the generic fallback text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthContext {
    SignUp,
    SignIn,
}

impl AuthContext {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "signUp" => Some(Self::SignUp),
            "signIn" => Some(Self::SignIn),
            _ => None,
        }
    }
}

/// Map a provider error code to a user-facing message. Unrecognized codes
/// fall back to a generic message for the given context.
pub fn friendly_auth_message(code: &str, context: AuthContext) -> &'static str {
    match code {
        "auth/email-already-in-use" => "This email is already registered. Please log in instead.",
        "auth/invalid-email" => "Invalid email address format.",
        "auth/weak-password" => "Password is too weak. Use at least 6 characters.",
        "auth/user-not-found" | "auth/wrong-password" => "Invalid email or password.",
        "auth/too-many-requests" => "Too many failed attempts. Please try again later.",
        _ => match context {
            AuthContext::SignUp => "Error creating account. Please try again.",
            AuthContext::SignIn => "Error logging in. Please try again.",
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordIssue {
    Mismatch,
    TooShort,
}

impl PasswordIssue {
    pub fn message(self) -> &'static str {
        match self {
            Self::Mismatch => "Passwords do not match. Please try again.",
            Self::TooShort => "Password must be at least 6 characters long.",
        }
    }
}

/// Sign-up form checks, run before the provider is ever contacted.
pub fn validate_new_password(password: &str, confirm: &str) -> Result<(), PasswordIssue> {
    if password != confirm {
        return Err(PasswordIssue::Mismatch);
    }
    if password.chars().count() < 6 {
        return Err(PasswordIssue::TooShort);
    }
    Ok(())
}
