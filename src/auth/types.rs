//! Auth payload types
//!
//! Wire shapes of the login, register and current-user endpoints. Field
//! names follow the server's camelCase JSON.

use serde::{Deserialize, Serialize};

/// Role assigned to a dashboard user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    Waiter,
    Chef,
    Manager,
    Admin,
}

/// Authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Credentials posted to the login endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Payload posted to the register endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterData {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub name: String,
}

/// Response of the login and register endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

#[cfg(test)]
mod type_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auth_response_decodes() {
        let resp: AuthResponse = serde_json::from_value(json!({
            "accessToken": "a1",
            "refreshToken": "r1",
            "user": {"id": "u1", "email": "ada@example.com", "name": "Ada", "role": "manager"}
        }))
        .unwrap();

        assert_eq!(resp.access_token, "a1");
        assert_eq!(resp.user.role, Some(UserRole::Manager));
        assert!(resp.user.avatar.is_none());
    }

    #[test]
    fn test_register_data_casing() {
        let data = RegisterData {
            email: "ada@example.com".into(),
            password: "pw".into(),
            confirm_password: "pw".into(),
            name: "Ada".into(),
        };
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["confirmPassword"], "pw");
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let result: Result<User, _> = serde_json::from_value(json!({
            "id": "u1", "email": "e", "name": "n", "role": "owner"
        }));
        assert!(result.is_err());
    }
}
