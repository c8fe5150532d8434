// ── Operation keys ──
//
// A cache entry and a logical subscription are both addressed by the
// pair (operation name, input). Equality is structural: the input is
// canonicalized to JSON text at construction (serde_json orders object
// keys, so two structurally equal inputs canonicalize identically).

use std::fmt;

use serde_json::Value;

/// Cache key for the current-user entry.
pub const USER_KEY_NAME: &str = "eddy_user";

/// Identifies one cache entry / logical subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationKey {
    name: String,
    input: Option<String>,
}

impl OperationKey {
    pub fn new(name: impl Into<String>, input: Option<&Value>) -> Self {
        Self {
            name: name.into(),
            input: input.map(|v| {
                serde_json::to_string(v).expect("JSON value always serializes")
            }),
        }
    }

    /// Key for the fixed current-user cache entry.
    pub fn user() -> Self {
        Self::new(USER_KEY_NAME, None)
    }

    /// The operation name half of the key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The canonical-JSON input half of the key, if any.
    pub fn input_json(&self) -> Option<&str> {
        self.input.as_deref()
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.input {
            Some(input) => write!(f, "{}?{input}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn structural_equality() {
        let a = OperationKey::new("users/get", Some(&json!({"id": "42", "scope": "full"})));
        let b = OperationKey::new("users/get", Some(&json!({"scope": "full", "id": "42"})));
        assert_eq!(a, b);
    }

    #[test]
    fn different_inputs_differ() {
        let a = OperationKey::new("users/get", Some(&json!({"id": "42"})));
        let b = OperationKey::new("users/get", Some(&json!({"id": "43"})));
        let c = OperationKey::new("users/get", None);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn display_shape() {
        let key = OperationKey::new("users/get", Some(&json!({"id": "42"})));
        assert_eq!(key.to_string(), r#"users/get?{"id":"42"}"#);
        assert_eq!(OperationKey::user().to_string(), "eddy_user");
    }
}
