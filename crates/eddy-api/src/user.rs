// Authenticated-user model returned by the gateway's cookie-auth endpoint.

use serde::{Deserialize, Serialize};

/// The identity the gateway holds for the current cookie session.
///
/// Uses `#[serde(flatten)]` to capture custom claims beyond the core
/// set, so nothing the identity provider adds is silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Identity provider that authenticated this user, e.g. `"github"`.
    #[serde(default)]
    pub provider: Option<String>,

    /// User id scoped to the provider.
    #[serde(default)]
    pub provider_id: Option<String>,

    /// Stable user id assigned by the gateway.
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub avatar_url: Option<String>,

    /// Roles granted by the gateway's authorization config.
    #[serde(default)]
    pub roles: Vec<String>,

    /// All remaining claims the provider sends.
    #[serde(flatten)]
    pub custom_claims: serde_json::Value,
}

impl User {
    /// Whether the user carries the given role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_user_with_custom_claims() {
        let json = r#"{
            "provider": "github",
            "provider_id": "99",
            "user_id": "u-42",
            "name": "Ada",
            "email": "ada@example.com",
            "roles": ["admin"],
            "company": "Analytical Engines Ltd"
        }"#;

        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.name.as_deref(), Some("Ada"));
        assert!(user.has_role("admin"));
        assert!(!user.has_role("user"));
        assert_eq!(user.custom_claims["company"], "Analytical Engines Ltd");
    }

    #[test]
    fn deserialize_minimal_user() {
        let user: User = serde_json::from_str("{}").unwrap();
        assert!(user.name.is_none());
        assert!(user.roles.is_empty());
    }
}
