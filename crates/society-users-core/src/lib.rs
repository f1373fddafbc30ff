//! Users business logic for Society.
//!
//! [`provider::SocietyUsers`] implements the users resource lifecycle over a
//! [`society_datastore::Datastore`]; [`handler::SocietyUsersHandler`] exposes
//! it to the HTTP layer.
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod entity;
pub mod error;
pub mod handler;
pub mod provider;

pub use config::UsersConfig;
pub use handler::SocietyUsersHandler;
pub use provider::SocietyUsers;
