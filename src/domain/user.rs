use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub department_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            &self.username
        } else {
            &self.full_name
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "TEXT")]
pub enum Role {
    Employee,
    Manager,
    #[serde(rename = "GM")]
    #[sqlx(rename = "GM")]
    GeneralManager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "Employee",
            Role::Manager => "Manager",
            Role::GeneralManager => "GM",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Employee => "Employee",
            Role::Manager => "Manager",
            Role::GeneralManager => "General Manager",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "employee" => Some(Role::Employee),
            "manager" => Some(Role::Manager),
            "gm" | "general_manager" | "general-manager" => Some(Role::GeneralManager),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub role: Role,
}

impl CreateUserRequest {
    /// Usernames are stored trimmed and e-mail addresses trimmed and lower-cased.
    pub fn normalized(mut self) -> Self {
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self.full_name = self.full_name.trim().to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_create_request() {
        let request = CreateUserRequest {
            username: "  alice ".to_string(),
            email: " Alice@Example.COM ".to_string(),
            full_name: "Alice Doe ".to_string(),
            password: "secret".to_string(),
            role: Role::Employee,
        }
        .normalized();

        assert_eq!(request.username, "alice");
        assert_eq!(request.email, "alice@example.com");
        assert_eq!(request.full_name, "Alice Doe");
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("GM"), Some(Role::GeneralManager));
        assert_eq!(Role::parse("manager"), Some(Role::Manager));
        assert_eq!(Role::parse("Employee"), Some(Role::Employee));
        assert_eq!(Role::parse("admin"), None);
    }
}
