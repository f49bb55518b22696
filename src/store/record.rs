//! User record types.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A stored user.
///
/// Only the store constructs these; everyone else works on clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Assigned by the store, never reused.
    pub id: u64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub is_active: bool,
    #[serde(with = "crate::timestamp")]
    pub created_at: NaiveDateTime,
    /// Stamped at creation; nothing revises it.
    #[serde(with = "crate::timestamp")]
    pub updated_at: NaiveDateTime,
}

/// Fields supplied by the caller when creating a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
}

impl NewUser {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        full_name: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            full_name: full_name.into(),
        }
    }

    pub(crate) fn into_record(self, id: u64, now: NaiveDateTime) -> UserRecord {
        UserRecord {
            id,
            username: self.username,
            email: self.email,
            full_name: self.full_name,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_record_wire_shape() {
        let now = NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let record = NewUser::new("john_doe", "john@example.com", "John Doe").into_record(1, now);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["username"], "john_doe");
        assert_eq!(json["fullName"], "John Doe");
        assert_eq!(json["isActive"], true);
        assert_eq!(json["createdAt"], "2025-01-02 03:04:05");
        assert_eq!(json["updatedAt"], "2025-01-02 03:04:05");
    }

    #[test]
    fn test_new_user_requires_all_fields() {
        let missing: Result<NewUser, _> =
            serde_json::from_str(r#"{"username":"a","email":"a@example.com"}"#);
        assert!(missing.is_err());

        let empty: NewUser =
            serde_json::from_str(r#"{"username":"","email":"","fullName":""}"#).unwrap();
        assert_eq!(empty, NewUser::new("", "", ""));
    }
}
