use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Login password, wiped from memory when dropped and redacted in logs.
///
/// [`AuthService::login`](crate::services::AuthService::login) reads it
/// only while serializing the request body.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecureCredential {
    data: String,
}

impl SecureCredential {
    pub fn new(data: String) -> Self {
        Self { data }
    }

    /// Borrow the password for the outgoing login body.
    pub fn as_str(&self) -> &str {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<String> for SecureCredential {
    fn from(data: String) -> Self {
        Self::new(data)
    }
}

impl From<&str> for SecureCredential {
    fn from(data: &str) -> Self {
        Self::new(data.to_string())
    }
}

impl fmt::Debug for SecureCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureCredential([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_the_password() {
        let password = SecureCredential::from("hunter2");
        assert_eq!(format!("{password:?}"), "SecureCredential([REDACTED])");
        assert_eq!(password.as_str(), "hunter2");
    }

    #[test]
    fn blank_password_is_empty() {
        assert!(SecureCredential::from(String::new()).is_empty());
        assert!(!SecureCredential::from("x").is_empty());
    }
}
