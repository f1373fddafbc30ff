//! Users provider implementing the resource lifecycle.
//!
//! Each operation walks the same states, traced at debug level:
//!
//! ```text
//! Received ──> Validated ──> StoreOperationInFlight ──> Committed
//!     │            │                    │
//!     └────────────┴────────────────────┴──────────> Rejected
//! ```
//!
//! Client input is decoded and validated before the store is touched, so a
//! malformed id or body never reaches it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use society_datastore::{Datastore, DatastoreError, Key, Query, run_in_transaction};
use society_users_model::error::UsersError;
use society_users_model::timestamp::truncate_to_millis;
use society_users_model::user::User;

use crate::config::UsersConfig;
use crate::entity::{USERS_KIND, carry_forward, entity_to_user, user_to_entity};
use crate::error::datastore_error_to_users;

/// The users resource service.
#[derive(Debug)]
pub struct SocietyUsers {
    store: Arc<dyn Datastore>,
    config: UsersConfig,
}

impl SocietyUsers {
    /// Create a provider over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Datastore>, config: UsersConfig) -> Self {
        Self { store, config }
    }

    /// The service configuration.
    #[must_use]
    pub fn config(&self) -> &UsersConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Create a user from a wire body.
    ///
    /// # Errors
    ///
    /// `MalformedBody`, `ValidationFailed`, `BadRequest` for a missing or
    /// foreign `parent_id`, and `UpstreamUnavailable` when the store fails.
    pub async fn handle_create_user(&self, body: &[u8]) -> Result<User, UsersError> {
        debug!(state = "Received", operation = "CreateUser");
        let mut user = decode_and_validate(body)?;
        if user.parent_id.is_empty() {
            return Err(rejected(UsersError::bad_request("parent_id is required")));
        }
        let parent = self.decode_key(&user.parent_id, "parent_id")?;

        let now = now();
        user.date_created = Some(now);
        user.date_updated = Some(now);
        debug!(state = "Validated", operation = "CreateUser", parent = %parent);

        let key = Key::incomplete(USERS_KIND, Some(parent), self.config.namespace.as_str());
        debug!(state = "StoreOperationInFlight", operation = "CreateUser", key = %key);
        let key = self
            .store
            .put(key, user_to_entity(&user))
            .await
            .map_err(store_rejected)?;

        user.id = Some(key.encode());
        user.parent_id = key.parent().map(Key::encode).unwrap_or_default();
        debug!(state = "Committed", operation = "CreateUser", key = %key);
        Ok(user)
    }

    /// Fetch one user.
    ///
    /// # Errors
    ///
    /// `BadRequest` for a malformed id, `NotFound` when absent, and
    /// `UpstreamUnavailable` when the store fails.
    pub async fn handle_get_user(&self, id: &str) -> Result<User, UsersError> {
        debug!(state = "Received", operation = "GetUser");
        let key = self.decode_user_key(id)?;
        debug!(state = "StoreOperationInFlight", operation = "GetUser", key = %key);
        let entity = self
            .store
            .get(&key)
            .await
            .map_err(store_rejected)?
            .ok_or_else(|| rejected(UsersError::not_found(format!("user {key} not found"))))?;
        let user = entity_to_user(&key, &entity)?;
        debug!(state = "Committed", operation = "GetUser", key = %key);
        Ok(user)
    }

    /// List up to the configured number of users in the namespace.
    ///
    /// # Errors
    ///
    /// `UpstreamUnavailable` when the store fails, `InternalError` for
    /// undecodable stored data.
    pub async fn handle_list_users(&self) -> Result<Vec<User>, UsersError> {
        debug!(state = "Received", operation = "ListUsers");
        let query = Query::new(USERS_KIND)
            .namespace(self.config.namespace.as_str())
            .limit(self.config.list_limit);
        debug!(state = "StoreOperationInFlight", operation = "ListUsers", limit = self.config.list_limit);
        let results = self.store.query(&query).await.map_err(store_rejected)?;
        let users = results
            .iter()
            .map(|(key, entity)| entity_to_user(key, entity))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(state = "Committed", operation = "ListUsers", count = users.len());
        Ok(users)
    }

    /// Replace a user's mutable fields inside a transaction.
    ///
    /// The creation timestamp, avatar and status are kept from the stored
    /// user; the update timestamp always moves forward.
    ///
    /// # Errors
    ///
    /// `BadRequest`, `MalformedBody`, `ValidationFailed`, `NotFound` when the
    /// user is absent, `Conflict` when a concurrent write wins, and
    /// `UpstreamUnavailable` when the store fails.
    pub async fn handle_update_user(&self, id: &str, body: &[u8]) -> Result<User, UsersError> {
        debug!(state = "Received", operation = "UpdateUser");
        let key = self.decode_user_key(id)?;
        let replacement = decode_and_validate(body)?;
        debug!(state = "Validated", operation = "UpdateUser", key = %key);

        let mut entity = user_to_entity(&replacement);
        let now = now();
        let tx_key = key.clone();
        debug!(state = "StoreOperationInFlight", operation = "UpdateUser", key = %key);
        let stored = run_in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let existing = tx
                    .get(&tx_key)
                    .await?
                    .ok_or_else(|| DatastoreError::NoSuchEntity(format!("user {tx_key} not found")))?;
                carry_forward(&existing, &mut entity, now);
                tx.put(tx_key, entity.clone()).await?;
                Ok(entity)
            })
        })
        .await
        .map_err(store_rejected)?;

        let user = entity_to_user(&key, &stored)?;
        debug!(state = "Committed", operation = "UpdateUser", key = %key);
        Ok(user)
    }

    /// Delete a user. Deleting an absent user succeeds.
    ///
    /// # Errors
    ///
    /// `BadRequest` for a malformed id and `UpstreamUnavailable` when the
    /// store fails.
    pub async fn handle_delete_user(&self, id: &str) -> Result<(), UsersError> {
        debug!(state = "Received", operation = "DeleteUser");
        let key = self.decode_user_key(id)?;
        debug!(state = "StoreOperationInFlight", operation = "DeleteUser", key = %key);
        self.store.delete(&key).await.map_err(store_rejected)?;
        debug!(state = "Committed", operation = "DeleteUser", key = %key);
        Ok(())
    }

    /// Accept a profile image for a user. Nothing is stored.
    ///
    /// # Errors
    ///
    /// `BadRequest` for a malformed id.
    pub fn handle_upload_profile_image(&self, id: &str, image_len: usize) -> Result<(), UsersError> {
        let key = self.decode_user_key(id)?;
        debug!(operation = "UploadProfileImage", key = %key, image_len, "profile image accepted, not stored");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Keys
    // -----------------------------------------------------------------------

    /// Decode a client-supplied key and require it to be in our namespace.
    fn decode_key(&self, encoded: &str, field: &str) -> Result<Key, UsersError> {
        let key = Key::decode(encoded).map_err(|e| {
            rejected(UsersError::bad_request(format!("invalid {field}: {e}")).with_source(e))
        })?;
        if key.namespace() != self.config.namespace {
            return Err(rejected(UsersError::bad_request(format!(
                "{field} belongs to namespace {:?}, expected {:?}",
                key.namespace(),
                self.config.namespace
            ))));
        }
        Ok(key)
    }

    fn decode_user_key(&self, id: &str) -> Result<Key, UsersError> {
        let key = self.decode_key(id, "id")?;
        if key.kind() != USERS_KIND {
            return Err(rejected(UsersError::bad_request(format!(
                "id refers to a {} entity, not a user",
                key.kind()
            ))));
        }
        Ok(key)
    }
}

/// Decode a body, drop read-only fields and check it.
fn decode_and_validate(body: &[u8]) -> Result<User, UsersError> {
    let mut user = User::from_wire(body).map_err(rejected)?;
    user.validate().map_err(rejected)?;
    user.clear_read_only();
    user.dedup_contacts();
    Ok(user)
}

fn now() -> DateTime<Utc> {
    truncate_to_millis(Utc::now())
}

fn rejected(err: UsersError) -> UsersError {
    debug!(state = "Rejected", code = %err.code, message = %err.message);
    err
}

fn store_rejected(err: DatastoreError) -> UsersError {
    rejected(datastore_error_to_users(err))
}

#[cfg(test)]
mod tests {
    use society_datastore::MemoryDatastore;
    use society_users_model::error::UsersErrorCode;

    use super::*;

    const NS: &str = "NeverLand";

    fn family() -> Key {
        let society = Key::id_key("Society", 5_066_549_580_791_808, None, NS);
        Key::id_key("Family", 5_668_600_916_475_904, Some(society), NS)
    }

    fn provider() -> (MemoryDatastore, SocietyUsers) {
        let store = MemoryDatastore::new();
        let users = SocietyUsers::new(Arc::new(store.clone()), UsersConfig::default());
        (store, users)
    }

    fn body(firstname: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "parent_id": family().encode(),
            "firstname": firstname,
            "email_ids": ["ann@example.com", "ann@example.com"],
            "phone_numbers": ["9876543210"],
            "status": "forged",
            "date_created": "2001-01-01T00:00:00.000Z",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_should_create_user_under_parent() {
        let (store, users) = provider();
        let user = users.handle_create_user(&body("Ann")).await.unwrap();

        let id = user.id.clone().unwrap();
        let key = Key::decode(&id).unwrap();
        assert_eq!(key.kind(), USERS_KIND);
        assert_eq!(key.namespace(), NS);
        assert_eq!(key.parent(), Some(&family()));
        assert_eq!(user.parent_id, family().encode());
        assert_eq!(user.email_ids, ["ann@example.com"]);
        assert!(user.status.is_empty());
        assert_eq!(user.date_created, user.date_updated);
        assert!(user.date_created.unwrap().timestamp() > 978_307_200);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_should_reject_create_without_valid_parent() {
        let (store, users) = provider();

        let err = users
            .handle_create_user(br#"{"firstname":"Ann"}"#)
            .await
            .unwrap_err();
        assert_eq!(err.code, UsersErrorCode::BadRequest);

        let err = users
            .handle_create_user(br#"{"firstname":"Ann","parent_id":"%%%"}"#)
            .await
            .unwrap_err();
        assert_eq!(err.code, UsersErrorCode::BadRequest);

        let foreign = Key::id_key("Family", 1, None, "Atlantis").encode();
        let foreign_body = serde_json::to_vec(&serde_json::json!({
            "firstname": "Ann",
            "parent_id": foreign,
        }))
        .unwrap();
        let err = users.handle_create_user(&foreign_body).await.unwrap_err();
        assert_eq!(err.code, UsersErrorCode::BadRequest);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_should_check_body_before_parent() {
        let (_, users) = provider();
        let err = users.handle_create_user(b"{oops").await.unwrap_err();
        assert_eq!(err.code, UsersErrorCode::MalformedBody);

        let err = users
            .handle_create_user(br#"{"firstname":"","parent_id":"%%%"}"#)
            .await
            .unwrap_err();
        assert_eq!(err.code, UsersErrorCode::ValidationFailed);
    }

    #[tokio::test]
    async fn test_should_get_created_user() {
        let (_, users) = provider();
        let created = users.handle_create_user(&body("Ann")).await.unwrap();
        let fetched = users
            .handle_get_user(created.id.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_should_reject_bad_ids_without_store_access() {
        let (store, users) = provider();
        store.set_available(false);

        let family_id = family().encode();
        for id in ["not-a-key", "", family_id.as_str()] {
            let err = users.handle_get_user(id).await.unwrap_err();
            assert_eq!(err.code, UsersErrorCode::BadRequest, "{id:?}");
        }
        let foreign = Key::id_key(USERS_KIND, 1, None, "Atlantis").encode();
        assert_eq!(
            users.handle_delete_user(&foreign).await.unwrap_err().code,
            UsersErrorCode::BadRequest
        );
    }

    #[tokio::test]
    async fn test_should_report_missing_user() {
        let (_, users) = provider();
        let id = Key::id_key(USERS_KIND, 99, Some(family()), NS).encode();
        let err = users.handle_get_user(&id).await.unwrap_err();
        assert_eq!(err.code, UsersErrorCode::NotFound);
        let err = users.handle_update_user(&id, &body("Ann")).await.unwrap_err();
        assert_eq!(err.code, UsersErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_should_list_up_to_limit() {
        let store = MemoryDatastore::new();
        let config = UsersConfig {
            list_limit: 2,
            ..UsersConfig::default()
        };
        let users = SocietyUsers::new(Arc::new(store), config);
        assert!(users.handle_list_users().await.unwrap().is_empty());

        for name in ["Ann", "Bob", "Cy"] {
            users.handle_create_user(&body(name)).await.unwrap();
        }
        let listed = users.handle_list_users().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|u| u.id.is_some()));
    }

    #[tokio::test]
    async fn test_should_update_preserving_created_and_read_only_fields() {
        let (store, users) = provider();
        let created = users.handle_create_user(&body("Ann")).await.unwrap();
        let id = created.id.clone().unwrap();

        // Give the stored user an avatar and status, as only the service would.
        let key = Key::decode(&id).unwrap();
        let mut entity = store.get(&key).await.unwrap().unwrap();
        entity.set("avatar_url", "http://img/ann.png");
        entity.set("status", "active");
        store.put(key, entity).await.unwrap();

        let replacement = serde_json::to_vec(&serde_json::json!({
            "firstname": "Anne",
            "lastname": "Lee",
            "avatar_url": "http://evil",
            "date_created": "1999-01-01T00:00:00Z",
        }))
        .unwrap();
        let updated = users.handle_update_user(&id, &replacement).await.unwrap();

        assert_eq!(updated.id.as_deref(), Some(id.as_str()));
        assert_eq!(updated.parent_id, created.parent_id);
        assert_eq!(updated.firstname, "Anne");
        assert_eq!(updated.lastname, "Lee");
        assert!(updated.email_ids.is_empty());
        assert_eq!(updated.avatar_url, "http://img/ann.png");
        assert_eq!(updated.status, "active");
        assert_eq!(updated.date_created, created.date_created);
        assert!(updated.date_updated > created.date_updated);

        let again = users.handle_update_user(&id, &replacement).await.unwrap();
        assert!(again.date_updated > updated.date_updated);
        assert_eq!(users.handle_get_user(&id).await.unwrap(), again);
    }

    #[tokio::test]
    async fn test_should_validate_update_body() {
        let (_, users) = provider();
        let created = users.handle_create_user(&body("Ann")).await.unwrap();
        let id = created.id.unwrap();
        let err = users
            .handle_update_user(&id, br#"{"firstname":"Ann","phone_numbers":["12"]}"#)
            .await
            .unwrap_err();
        assert_eq!(err.code, UsersErrorCode::ValidationFailed);
        let err = users.handle_update_user(&id, b"[1,2").await.unwrap_err();
        assert_eq!(err.code, UsersErrorCode::MalformedBody);
    }

    #[tokio::test]
    async fn test_should_delete_idempotently() {
        let (store, users) = provider();
        let created = users.handle_create_user(&body("Ann")).await.unwrap();
        let id = created.id.unwrap();

        users.handle_delete_user(&id).await.unwrap();
        assert!(store.is_empty());
        users.handle_delete_user(&id).await.unwrap();
        assert_eq!(
            users.handle_get_user(&id).await.unwrap_err().code,
            UsersErrorCode::NotFound
        );
    }

    #[tokio::test]
    async fn test_should_surface_store_outage() {
        let (store, users) = provider();
        let created = users.handle_create_user(&body("Ann")).await.unwrap();
        let id = created.id.unwrap();
        store.set_available(false);

        let codes = [
            users.handle_create_user(&body("Bob")).await.unwrap_err().code,
            users.handle_get_user(&id).await.unwrap_err().code,
            users.handle_list_users().await.unwrap_err().code,
            users.handle_update_user(&id, &body("Bob")).await.unwrap_err().code,
            users.handle_delete_user(&id).await.unwrap_err().code,
        ];
        assert!(codes.iter().all(|c| *c == UsersErrorCode::UpstreamUnavailable));
    }

    #[test]
    fn test_should_accept_profile_image_for_valid_id() {
        let (_, users) = provider();
        let id = Key::id_key(USERS_KIND, 7, Some(family()), NS).encode();
        assert!(users.handle_upload_profile_image(&id, 1024).is_ok());
        assert_eq!(
            users.handle_upload_profile_image("bogus", 0).unwrap_err().code,
            UsersErrorCode::BadRequest
        );
    }

    #[tokio::test]
    async fn test_should_let_one_of_two_racing_updates_win() {
        let (store, users) = provider();
        let created = users.handle_create_user(&body("Ann")).await.unwrap();
        let key = Key::decode(created.id.as_deref().unwrap()).unwrap();

        // Interleave two transactions by hand: both read, then both commit.
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        let seen = first.get(&key).await.unwrap().unwrap();
        second.get(&key).await.unwrap();
        first.put(key.clone(), seen.clone()).await.unwrap();
        second.put(key.clone(), seen).await.unwrap();
        first.commit().await.unwrap();
        let err = datastore_error_to_users(second.commit().await.unwrap_err());
        assert_eq!(err.code, UsersErrorCode::Conflict);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_should_never_mix_fields_of_concurrent_updates() {
        let (_, users) = provider();
        let users = Arc::new(users);
        let created = users.handle_create_user(&body("Ann")).await.unwrap();
        let id = created.id.unwrap();

        let payloads = [("Anne", "Lee", "head"), ("Bea", "Kay", "guest")];
        for _ in 0..50 {
            let tasks: Vec<_> = payloads
                .iter()
                .map(|&(firstname, lastname, role)| {
                    let users = Arc::clone(&users);
                    let id = id.clone();
                    let doc = serde_json::to_vec(&serde_json::json!({
                        "firstname": firstname,
                        "lastname": lastname,
                        "role": role,
                    }))
                    .unwrap();
                    tokio::spawn(async move { users.handle_update_user(&id, &doc).await })
                })
                .collect();

            let mut won = 0;
            for task in tasks {
                match task.await.unwrap() {
                    Ok(user) => {
                        won += 1;
                        let fields = (
                            user.firstname.as_str(),
                            user.lastname.as_str(),
                            user.role.as_str(),
                        );
                        assert!(payloads.contains(&fields), "mixed update result: {fields:?}");
                    }
                    Err(err) => assert_eq!(err.code, UsersErrorCode::Conflict),
                }
            }
            assert!(won >= 1);

            let stored = users.handle_get_user(&id).await.unwrap();
            let fields = (
                stored.firstname.as_str(),
                stored.lastname.as_str(),
                stored.role.as_str(),
            );
            assert!(payloads.contains(&fields), "mixed stored state: {fields:?}");
            assert_eq!(stored.date_created, created.date_created);
        }
    }
}
