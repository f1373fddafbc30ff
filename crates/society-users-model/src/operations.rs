//! Users operation enum.

use std::fmt;

/// All operations exposed by the users service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsersOperation {
    /// CORS preflight / capability document.
    Preflight,
    /// Create a user under a parent.
    CreateUser,
    /// List users in the namespace.
    ListUsers,
    /// Fetch one user.
    GetUser,
    /// Replace a user's mutable fields.
    UpdateUser,
    /// Delete a user.
    DeleteUser,
    /// Accept a profile image upload (not stored).
    UploadProfileImage,
}

impl UsersOperation {
    /// Returns the operation name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preflight => "Preflight",
            Self::CreateUser => "CreateUser",
            Self::ListUsers => "ListUsers",
            Self::GetUser => "GetUser",
            Self::UpdateUser => "UpdateUser",
            Self::DeleteUser => "DeleteUser",
            Self::UploadProfileImage => "UploadProfileImage",
        }
    }

    /// Parse an operation name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Preflight" => Some(Self::Preflight),
            "CreateUser" => Some(Self::CreateUser),
            "ListUsers" => Some(Self::ListUsers),
            "GetUser" => Some(Self::GetUser),
            "UpdateUser" => Some(Self::UpdateUser),
            "DeleteUser" => Some(Self::DeleteUser),
            "UploadProfileImage" => Some(Self::UploadProfileImage),
            _ => None,
        }
    }

    /// Whether the operation needs a `{id}` path parameter.
    #[must_use]
    pub fn takes_id(&self) -> bool {
        matches!(
            self,
            Self::GetUser | Self::UpdateUser | Self::DeleteUser | Self::UploadProfileImage
        )
    }
}

impl fmt::Display for UsersOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
