//! User resource model for Society.
//!
//! This crate holds the wire-facing types of the users service: the [`User`]
//! resource and its JSON serializer, the fixed timestamp layout shared by every
//! timestamp on the wire, the [`UsersError`] taxonomy and the
//! [`UsersOperation`] enum used for routing and logging.
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod operations;
pub mod timestamp;
pub mod user;

pub use error::{UsersError, UsersErrorCode};
pub use operations::UsersOperation;
pub use user::User;
