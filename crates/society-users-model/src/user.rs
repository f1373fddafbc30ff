//! The `User` resource and its JSON wire form.

use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::UsersError;

/// A person belonging to a family within a society.
///
/// `id`, `avatar_url`, `status`, `date_created` and `date_updated` are
/// assigned by the service; values supplied by clients are discarded with
/// [`User::clear_read_only`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    /// Encoded key; present once persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Encoded key of the owning family.
    #[serde(deserialize_with = "null_as_default")]
    pub parent_id: String,
    /// Given name; required.
    #[serde(deserialize_with = "null_as_default")]
    pub firstname: String,
    /// Middle name.
    #[serde(
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub middlename: String,
    /// Family name.
    #[serde(
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub lastname: String,
    /// Email addresses, de-duplicated before persistence.
    #[serde(deserialize_with = "null_as_default")]
    pub email_ids: Vec<String>,
    /// Ten-digit numbers without formatting.
    #[serde(deserialize_with = "null_as_default")]
    pub phone_numbers: Vec<String>,
    /// Date of birth.
    #[serde(with = "crate::timestamp::option", skip_serializing_if = "Option::is_none")]
    pub dob: Option<DateTime<Utc>>,
    /// Role within the family.
    #[serde(
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub role: String,
    /// Profile image location; read-only.
    #[serde(
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub avatar_url: String,
    /// Blood group, free text.
    #[serde(
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub blood_group: String,
    /// Set once at first persistence.
    #[serde(with = "crate::timestamp::option", skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateTime<Utc>>,
    /// Set on every persistence.
    #[serde(with = "crate::timestamp::option", skip_serializing_if = "Option::is_none")]
    pub date_updated: Option<DateTime<Utc>>,
    /// Account status; read-only.
    #[serde(
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub status: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
static PHONE_RE: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
            .unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    })
}

fn phone_regex() -> &'static Regex {
    PHONE_RE.get_or_init(|| {
        Regex::new(r"^[0-9]{10}$")
            .unwrap_or_else(|error| panic!("phone regex failed to compile: {error}"))
    })
}

impl User {
    /// Encode this user as wire JSON.
    ///
    /// # Errors
    ///
    /// Returns `InternalEncodingFailure` if serialization fails.
    pub fn to_wire(&self) -> Result<Vec<u8>, UsersError> {
        serde_json::to_vec(self).map_err(|e| {
            crate::users_error!(InternalEncodingFailure, format!("failed to encode user: {e}"))
                .with_source(e)
        })
    }

    /// Encode a list of users as a wire JSON array.
    ///
    /// # Errors
    ///
    /// Returns `InternalEncodingFailure` if serialization fails.
    pub fn list_to_wire(users: &[User]) -> Result<Vec<u8>, UsersError> {
        serde_json::to_vec(users).map_err(|e| {
            crate::users_error!(InternalEncodingFailure, format!("failed to encode users: {e}"))
                .with_source(e)
        })
    }

    /// Decode a user from wire JSON. Unknown fields are ignored.
    ///
    /// # Errors
    ///
    /// Returns `MalformedBody` on invalid JSON or a field of the wrong type.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, UsersError> {
        serde_json::from_slice(bytes).map_err(|e| {
            UsersError::malformed_body(format!("invalid user document: {e}")).with_source(e)
        })
    }

    /// Check the semantic constraints a decoded body must satisfy.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailed` naming the first offending field.
    pub fn validate(&self) -> Result<(), UsersError> {
        if self.firstname.trim().is_empty() {
            return Err(UsersError::validation("firstname is required"));
        }
        if let Some(bad) = self.email_ids.iter().find(|e| !email_regex().is_match(e)) {
            return Err(UsersError::validation(format!(
                "email_ids contains an invalid address: {bad:?}"
            )));
        }
        if let Some(bad) = self.phone_numbers.iter().find(|p| !phone_regex().is_match(p)) {
            return Err(UsersError::validation(format!(
                "phone_numbers must be 10 digits, got {bad:?}"
            )));
        }
        Ok(())
    }

    /// Discard fields clients may not set.
    pub fn clear_read_only(&mut self) {
        self.id = None;
        self.avatar_url.clear();
        self.status.clear();
        self.date_created = None;
        self.date_updated = None;
    }

    /// Remove repeated email addresses and phone numbers, keeping the first
    /// occurrence of each.
    pub fn dedup_contacts(&mut self) {
        dedup_in_order(&mut self.email_ids);
        dedup_in_order(&mut self.phone_numbers);
    }
}

fn dedup_in_order(values: &mut Vec<String>) {
    let mut seen = HashSet::with_capacity(values.len());
    values.retain(|v| seen.insert(v.clone()));
}
