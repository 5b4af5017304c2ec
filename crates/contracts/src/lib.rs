//! v1 cross-boundary contracts shared by the pet engine, API facade, server, and CLI.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod serde_u64_string;

pub const SCHEMA_VERSION_V1: &str = "1.0";

/// A candidate image returned by the remote random-image source. Only `id`
/// and `url` are consumed; any extra provider fields are ignored on decode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageResult {
    pub id: String,
    pub url: String,
}

/// The active pet. Immutable once created; replaced wholesale when a new pet
/// is acquired or a favorite is loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pet {
    pub image_id: String,
    pub image_url: String,
    pub name: String,
    pub is_special: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    pub schema_version: String,
    #[serde(with = "serde_u64_string")]
    pub seed: u64,
    pub starting_coins: u32,
    pub hunger_decay_per_tick: f32,
    pub hungry_threshold: f32,
    pub special_chance: f32,
    pub feeding_cooldown_ms: u64,
    pub tick_interval_ms: u64,
    pub notes: Option<String>,
}

impl EngineConfig {
    /// Ticks from a full meter to the floor at the configured decay rate.
    pub fn ticks_to_starve(&self) -> u64 {
        if self.hunger_decay_per_tick <= 0.0 {
            return u64::MAX;
        }
        (1.0 / self.hunger_decay_per_tick).ceil() as u64
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            seed: 1337,
            starting_coins: 10,
            hunger_decay_per_tick: 0.0167,
            hungry_threshold: 0.3,
            special_chance: 0.10,
            feeding_cooldown_ms: 2000,
            tick_interval_ms: 1000,
            notes: None,
        }
    }
}

/// Read-only copy of the engine state, produced after every command and tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineSnapshot {
    pub schema_version: String,
    #[serde(with = "serde_u64_string")]
    pub session: u64,
    pub session_ticks: u64,
    pub active_pet: Option<Pet>,
    pub hunger: f32,
    pub coins: u32,
    pub is_feeding: bool,
    pub has_warned_hungry: bool,
}

/// Outcome of one hunger tick. `BecameHungry` fires once per continuous
/// interval below the hungry threshold; the presenter maps it to a notice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TickOutcome {
    Normal,
    BecameHungry,
}

/// Returned by a successful feed. The caller schedules `end_feeding` with
/// this generation after `cooldown_ms`; a pet switch or a newer feed makes
/// the generation stale and the completion a no-op.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedingStarted {
    pub generation: u64,
    pub cooldown_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EngineError {
    InsufficientFunds,
    NoPetActive,
    FeedingInProgress,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientFunds => write!(f, "not enough coins to acquire a pet"),
            Self::NoPetActive => write!(f, "no pet is active"),
            Self::FeedingInProgress => write!(f, "feeding is already in progress"),
        }
    }
}

impl std::error::Error for EngineError {}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    AcquirePet,
    LoadFavorite,
    Feed,
    EndFeeding,
    SaveFavorite,
    RemoveFavorite,
}

/// One entry in the presenter's command audit log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandRecord {
    pub schema_version: String,
    pub sequence: u64,
    pub kind: CommandKind,
    #[serde(with = "serde_u64_string")]
    pub session: u64,
    pub accepted: bool,
    pub error: Option<String>,
}

impl CommandRecord {
    pub fn accepted(sequence: u64, kind: CommandKind, session: u64) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            sequence,
            kind,
            session,
            accepted: true,
            error: None,
        }
    }

    pub fn rejected(sequence: u64, kind: CommandKind, session: u64, error: String) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            sequence,
            kind,
            session,
            accepted: false,
            error: Some(error),
        }
    }
}

/// Favorites list rendering mode requested by the presenter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FavoriteView {
    Full,
    Compact,
}

impl FavoriteView {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "full" => Some(Self::Full),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InsufficientFunds,
    NoPetActive,
    FeedingInProgress,
    ImageFetchFailed,
    DuplicateFavorite,
    FavoriteNotFound,
    InvalidQuery,
    InternalError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub schema_version: String,
    pub error_code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(error_code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            error_code,
            message: message.into(),
            details,
        }
    }

    pub fn from_engine(error: EngineError) -> Self {
        let code = match error {
            EngineError::InsufficientFunds => ErrorCode::InsufficientFunds,
            EngineError::NoPetActive => ErrorCode::NoPetActive,
            EngineError::FeedingInProgress => ErrorCode::FeedingInProgress,
        };
        Self::new(code, error.to_string(), None)
    }
}
