//! Court domain entities

use chrono::{DateTime, Utc};
use rand::RngCore;

/// Routing key used when a court has no device key configured.
pub const DEFAULT_DEVICE_KEY: &str = "default";

/// Parent court (a venue with one lighting controller)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Court {
    pub id: i32,
    /// Owning user
    pub owner_id: i32,
    pub name: String,
    /// Key the venue's light controller subscribes with
    pub device_key: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Court {
    pub fn is_owned_by(&self, user_id: i32) -> bool {
        self.owner_id == user_id
    }

    /// Device routing key, falling back to [`DEFAULT_DEVICE_KEY`].
    pub fn routing_key(&self) -> &str {
        routing_key(self.device_key.as_deref())
    }
}

/// Resolve a possibly blank device key to the one used on the wire.
pub fn routing_key(device_key: Option<&str>) -> &str {
    device_key
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .unwrap_or(DEFAULT_DEVICE_KEY)
}

/// Fresh 16-hex-digit device key.
pub fn generate_device_key() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Individually bookable playing surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubCourt {
    pub id: i32,
    pub court_id: i32,
    pub name: String,
    pub is_active: bool,
}

/// Court registration input
#[derive(Debug, Clone)]
pub struct NewCourt {
    pub owner_id: i32,
    pub name: String,
    pub sub_court_names: Vec<String>,
    pub created_at: DateTime<Utc>,
}
