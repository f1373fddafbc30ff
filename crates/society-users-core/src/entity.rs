//! Mapping between [`User`] and stored [`Entity`] properties.
//!
//! Property names match the wire field names. `id` is the entity key and
//! `parent_id` is the key's parent, so neither is stored as a property.
//! Optional strings are omitted when empty and timestamps are stored as
//! native timestamps.

use chrono::{DateTime, Duration, Utc};

use society_datastore::{Entity, Key, Value};
use society_users_model::error::UsersError;
use society_users_model::user::User;

/// Entity kind of stored users.
pub const USERS_KIND: &str = "Users";

const FIRSTNAME: &str = "firstname";
const MIDDLENAME: &str = "middlename";
const LASTNAME: &str = "lastname";
const EMAIL_IDS: &str = "email_ids";
const PHONE_NUMBERS: &str = "phone_numbers";
const DOB: &str = "dob";
const ROLE: &str = "role";
const AVATAR_URL: &str = "avatar_url";
const BLOOD_GROUP: &str = "blood_group";
const DATE_CREATED: &str = "date_created";
const DATE_UPDATED: &str = "date_updated";
const STATUS: &str = "status";

/// Properties that only the service writes and that survive an update.
const CARRIED_ON_UPDATE: [&str; 3] = [DATE_CREATED, AVATAR_URL, STATUS];

/// Build the stored form of a user.
#[must_use]
pub fn user_to_entity(user: &User) -> Entity {
    let mut entity = Entity::new()
        .with(FIRSTNAME, user.firstname.as_str())
        .with(EMAIL_IDS, user.email_ids.clone())
        .with(PHONE_NUMBERS, user.phone_numbers.clone());

    for (name, value) in [
        (MIDDLENAME, &user.middlename),
        (LASTNAME, &user.lastname),
        (ROLE, &user.role),
        (AVATAR_URL, &user.avatar_url),
        (BLOOD_GROUP, &user.blood_group),
        (STATUS, &user.status),
    ] {
        if !value.is_empty() {
            entity.set(name, value.as_str());
        }
    }
    for (name, value) in [
        (DOB, user.dob),
        (DATE_CREATED, user.date_created),
        (DATE_UPDATED, user.date_updated),
    ] {
        if let Some(ts) = value {
            entity.set(name, ts);
        }
    }
    entity
}

/// Rebuild a user from its key and stored properties.
///
/// # Errors
///
/// Returns `InternalError` when a stored property has an unexpected type.
pub fn entity_to_user(key: &Key, entity: &Entity) -> Result<User, UsersError> {
    Ok(User {
        id: Some(key.encode()),
        parent_id: key.parent().map(Key::encode).unwrap_or_default(),
        firstname: string_prop(key, entity, FIRSTNAME)?,
        middlename: string_prop(key, entity, MIDDLENAME)?,
        lastname: string_prop(key, entity, LASTNAME)?,
        email_ids: string_list_prop(key, entity, EMAIL_IDS)?,
        phone_numbers: string_list_prop(key, entity, PHONE_NUMBERS)?,
        dob: timestamp_prop(key, entity, DOB)?,
        role: string_prop(key, entity, ROLE)?,
        avatar_url: string_prop(key, entity, AVATAR_URL)?,
        blood_group: string_prop(key, entity, BLOOD_GROUP)?,
        date_created: timestamp_prop(key, entity, DATE_CREATED)?,
        date_updated: timestamp_prop(key, entity, DATE_UPDATED)?,
        status: string_prop(key, entity, STATUS)?,
    })
}

/// Merge the stored state into a replacement entity.
///
/// Copies the creation timestamp, avatar and status from `existing`, and sets
/// the update timestamp to `now`, or one millisecond past the stored update
/// timestamp when `now` does not move past it.
pub fn carry_forward(existing: &Entity, replacement: &mut Entity, now: DateTime<Utc>) {
    for name in CARRIED_ON_UPDATE {
        match existing.get(name) {
            Some(value) => {
                replacement.set(name, value.clone());
            }
            None => {
                replacement.remove(name);
            }
        }
    }
    let updated = match existing.get(DATE_UPDATED).and_then(Value::as_timestamp) {
        Some(previous) if now <= previous => previous + Duration::milliseconds(1),
        _ => now,
    };
    replacement.set(DATE_UPDATED, updated);
}

fn type_error(key: &Key, name: &str, value: &Value, expected: &str) -> UsersError {
    UsersError::internal_error(format!(
        "stored property {name} of {key} is {}, expected {expected}",
        value.type_name()
    ))
}

fn string_prop(key: &Key, entity: &Entity, name: &str) -> Result<String, UsersError> {
    match entity.get(name) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(type_error(key, name, other, "string")),
    }
}

fn string_list_prop(key: &Key, entity: &Entity, name: &str) -> Result<Vec<String>, UsersError> {
    match entity.get(name) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| type_error(key, name, item, "string"))
            })
            .collect(),
        Some(other) => Err(type_error(key, name, other, "array")),
    }
}

fn timestamp_prop(
    key: &Key,
    entity: &Entity,
    name: &str,
) -> Result<Option<DateTime<Utc>>, UsersError> {
    match entity.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Timestamp(ts)) => Ok(Some(*ts)),
        Some(other) => Err(type_error(key, name, other, "timestamp")),
    }
}
