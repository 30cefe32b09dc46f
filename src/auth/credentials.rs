use std::collections::HashMap;
use std::fmt;

use anyhow::Context;
use subtle::ConstantTimeEq;

use super::Role;
use crate::errors::AuthError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub password: String,
    pub role: Role,
}

/// Username → credential lookup. The token issuer only sees this trait, so the
/// backing table can move to a database without touching authorization.
pub trait CredentialStore: Send + Sync {
    fn lookup(&self, username: &str) -> Option<Credential>;

    /// Checks a username/password pair and returns the caller's role.
    fn authenticate(&self, username: &str, password: &str) -> Result<Role, AuthError> {
        let cred = self
            .lookup(username)
            .ok_or(AuthError::InvalidCredentials)?;

        if bool::from(cred.password.as_bytes().ct_eq(password.as_bytes())) {
            Ok(cred.role)
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Fixed credential table built from configuration.
#[derive(Clone, Default)]
pub struct StaticCredentials {
    users: HashMap<String, Credential>,
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.users.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("StaticCredentials").field("users", &names).finish()
    }
}

impl StaticCredentials {
    /// Parses `user:password:role` entries separated by commas.
    /// The password may itself contain `:`.
    pub fn parse(spec: &str) -> anyhow::Result<Self> {
        let mut users = HashMap::new();
        for entry in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (username, rest) = entry
                .split_once(':')
                .with_context(|| format!("credential entry for '{}' has no password", entry))?;
            let (password, role) = rest
                .rsplit_once(':')
                .with_context(|| format!("credential entry for '{}' has no role", username))?;

            if username.is_empty() || password.is_empty() {
                anyhow::bail!("credential entry '{}' has an empty username or password", username);
            }
            let role: Role = role
                .parse()
                .with_context(|| format!("credential entry for '{}'", username))?;

            users.insert(
                username.to_string(),
                Credential {
                    password: password.to_string(),
                    role,
                },
            );
        }

        if users.is_empty() {
            anyhow::bail!("no credentials defined");
        }
        Ok(Self { users })
    }

    /// Development users: `admin_user/admin123` and `normal_user/user123`.
    pub fn demo() -> Self {
        let mut users = HashMap::new();
        users.insert(
            "admin_user".to_string(),
            Credential {
                password: "admin123".to_string(),
                role: Role::Admin,
            },
        );
        users.insert(
            "normal_user".to_string(),
            Credential {
                password: "user123".to_string(),
                role: Role::User,
            },
        );
        Self { users }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl CredentialStore for StaticCredentials {
    fn lookup(&self, username: &str) -> Option<Credential> {
        self.users.get(username).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entries() {
        let creds = StaticCredentials::parse("ops:s3:cr3t:admin, reader:pw:user").unwrap();
        assert_eq!(creds.len(), 2);
        assert_eq!(
            creds.lookup("ops"),
            Some(Credential {
                password: "s3:cr3t".into(),
                role: Role::Admin
            })
        );
        assert_eq!(creds.lookup("reader").unwrap().role, Role::User);
    }

    #[test]
    fn test_parse_rejects_bad_entries() {
        assert!(StaticCredentials::parse("").is_err());
        assert!(StaticCredentials::parse("nobody").is_err());
        assert!(StaticCredentials::parse("ops:pw").is_err());
        assert!(StaticCredentials::parse("ops:pw:root").is_err());
        assert!(StaticCredentials::parse(":pw:admin").is_err());
    }

    #[test]
    fn test_authenticate() {
        let creds = StaticCredentials::demo();
        assert_eq!(creds.authenticate("admin_user", "admin123").unwrap(), Role::Admin);
        assert_eq!(creds.authenticate("normal_user", "user123").unwrap(), Role::User);
        assert!(matches!(
            creds.authenticate("admin_user", "admin1234"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            creds.authenticate("ghost", "admin123"),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
