use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// A saved delivery address belonging to one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub id: Uuid,
    pub user_id: String,
    pub label: Option<String>,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: String,
    pub instructions: Option<String>,
    pub is_default: bool,
}

impl Address {
    pub fn from_draft(user_id: &str, draft: AddressDraft) -> Self {
        Self {
            id: draft.id.unwrap_or_else(Uuid::new_v4),
            user_id: user_id.to_string(),
            label: draft.label,
            line1: draft.line1.trim().to_string(),
            line2: draft.line2,
            city: draft.city.trim().to_string(),
            state: draft.state,
            postal_code: draft.postal_code.trim().to_string(),
            instructions: draft.instructions,
            is_default: draft.is_default,
        }
    }

    /// One-line rendering used in summaries and logs.
    pub fn one_line(&self) -> String {
        match &self.line2 {
            Some(line2) if !line2.trim().is_empty() => {
                format!("{}, {}, {} {}", self.line1, line2, self.city, self.postal_code)
            }
            _ => format!("{}, {} {}", self.line1, self.city, self.postal_code),
        }
    }
}

/// Address form payload. `id` is set when editing an existing address.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressDraft {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub label: Option<String>,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressDraft {
    /// Required-field checks performed before the draft reaches the service.
    pub fn validate(&self) -> CoreResult<()> {
        let mut missing = Vec::new();
        if self.line1.trim().is_empty() {
            missing.push("line1");
        }
        if self.city.trim().is_empty() {
            missing.push("city");
        }
        if self.postal_code.trim().is_empty() {
            missing.push("postal_code");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CoreError::ValidationError(format!(
                "missing required address fields: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Storage for a user's saved addresses.
#[async_trait]
pub trait AddressService: Send + Sync {
    async fn get_user_addresses(&self, user_id: &str) -> CoreResult<Vec<Address>>;

    /// Persist a new address built from a draft and return it with its id.
    async fn save_address(&self, user_id: &str, draft: AddressDraft) -> CoreResult<Address>;

    /// Replace an existing address, matched by id.
    async fn update_address(&self, address: Address) -> CoreResult<Address>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> AddressDraft {
        AddressDraft {
            line1: "12 Souq Street".to_string(),
            city: "Amman".to_string(),
            postal_code: "11118".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_draft_validation_accepts_required_fields() {
        assert!(draft().validate().is_ok());
    }

    #[test]
    fn test_draft_validation_lists_blank_fields() {
        let mut d = draft();
        d.line1 = "   ".to_string();
        d.postal_code = String::new();

        let err = d.validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("line1"));
        assert!(msg.contains("postal_code"));
        assert!(!msg.contains("city"));
    }

    #[test]
    fn test_from_draft_keeps_existing_id() {
        let id = Uuid::new_v4();
        let mut d = draft();
        d.id = Some(id);
        let address = Address::from_draft("user-1", d);
        assert_eq!(address.id, id);
        assert_eq!(address.user_id, "user-1");
        assert_eq!(address.one_line(), "12 Souq Street, Amman 11118");
    }
}
