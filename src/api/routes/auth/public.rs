//! Public types for the auth API
use serde::{Deserialize, Serialize};

pub use crate::auth::{AuthResponse, User, UserRole};

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub access_key: String,
}
