//! Scheduled light events and the wire payload sent to court controllers

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::court::routing_key;

/// What a scheduled event does to the lights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LightEventKind {
    Activate,
    Deactivate,
}

impl LightEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activate => "ACTIVATE",
            Self::Deactivate => "DEACTIVATE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ACTIVATE" => Some(Self::Activate),
            "DEACTIVATE" => Some(Self::Deactivate),
            _ => None,
        }
    }

    pub fn command(&self) -> LightCommand {
        match self {
            Self::Activate => LightCommand::On,
            Self::Deactivate => LightCommand::Off,
        }
    }
}

impl fmt::Display for LightEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command understood by the light controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LightCommand {
    On,
    Off,
}

// ── Job identity ────────────────────────────────────────────────

/// Fields that define one scheduled event. Two submissions with equal keys
/// are the same job.
///
/// `window_start` tells apart separate windows of one reservation on the
/// same sub-court; both events of a window carry the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub reservation_id: i32,
    pub sub_court_id: i32,
    pub window_start: DateTime<Utc>,
    pub kind: LightEventKind,
}

impl JobKey {
    pub fn new(
        reservation_id: i32,
        sub_court_id: i32,
        window_start: DateTime<Utc>,
        kind: LightEventKind,
    ) -> Self {
        Self {
            reservation_id,
            sub_court_id,
            window_start,
            kind,
        }
    }

    /// Both keys of one reservation window on one sub-court.
    pub fn window(reservation_id: i32, sub_court_id: i32, window_start: DateTime<Utc>) -> [JobKey; 2] {
        [
            Self::new(reservation_id, sub_court_id, window_start, LightEventKind::Activate),
            Self::new(reservation_id, sub_court_id, window_start, LightEventKind::Deactivate),
        ]
    }

    /// Stable job identifier: SHA-256 over the length-prefixed fields.
    ///
    /// Length prefixes keep `(1, 23)` and `(12, 3)` apart without any
    /// delimiter escaping.
    pub fn job_id(&self) -> String {
        let mut hasher = Sha256::new();
        for field in [
            "reservation".as_bytes(),
            self.reservation_id.to_string().as_bytes(),
            self.sub_court_id.to_string().as_bytes(),
            self.window_start.timestamp().to_string().as_bytes(),
            self.kind.as_str().as_bytes(),
        ] {
            hasher.update((field.len() as u32).to_be_bytes());
            hasher.update(field);
        }
        let digest = hasher.finalize();
        format!("light-{}", hex::encode(&digest[..16]))
    }
}

// ── Queue entry ─────────────────────────────────────────────────

/// Queue-side state of a scheduled event. Delivered jobs are deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Waiting for its fire time (or for a retry)
    Queued,
    /// Claimed by a dispatcher
    Dispatching,
    /// All attempts failed
    Exhausted,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "Queued",
            Self::Dispatching => "Dispatching",
            Self::Exhausted => "Exhausted",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "Dispatching" => Self::Dispatching,
            "Exhausted" => Self::Exhausted,
            _ => Self::Queued,
        }
    }
}

/// One scheduled light event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightJob {
    pub id: String,
    pub key: JobKey,
    pub court_id: i32,
    /// Raw device key of the court at scheduling time
    pub device_key: Option<String>,
    /// Instant the event should fire (moves forward on retry)
    pub run_at: DateTime<Utc>,
    pub state: JobState,
    /// Failed attempts so far
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LightJob {
    pub fn new(
        key: JobKey,
        court_id: i32,
        device_key: Option<String>,
        fire_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: key.job_id(),
            key,
            court_id,
            device_key,
            run_at: fire_at,
            state: JobState::Queued,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn topic(&self) -> String {
        light_topic(self.court_id, self.device_key.as_deref())
    }

    pub fn payload(&self) -> LightPayload {
        LightPayload {
            zone: extract_zone(&self.key.sub_court_id.to_string()),
            cmd: self.key.kind.command(),
            booking_id: self.key.reservation_id.to_string(),
        }
    }
}

/// Time left until `fire_at`, never negative.
pub fn delay_until(fire_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (fire_at - now).max(Duration::zero())
}

/// `field/{courtId}/{deviceKey}/light`
pub fn light_topic(court_id: i32, device_key: Option<&str>) -> String {
    format!("field/{}/{}/light", court_id, routing_key(device_key))
}

/// First run of digits in a sub-court identifier, e.g. `"sub-12"` → 12.
pub fn extract_zone(sub_court_ref: &str) -> Option<u32> {
    let digits: String = sub_court_ref
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Message published to the court controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightPayload {
    pub zone: Option<u32>,
    pub cmd: LightCommand,
    pub booking_id: String,
}
