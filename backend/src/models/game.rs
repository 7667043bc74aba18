//! Game record model and the closed vocabularies used by submissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Genre catalogue. Closed set of 14 values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Genre {
    Action,
    Puzzle,
    Arcade,
    Strategy,
    Sports,
    Racing,
    Adventure,
    Casual,
    Multiplayer,
    Casino,
    Idle,
    Simulation,
    Rpg,
    Other,
}

impl Genre {
    pub const ALL: [Genre; 14] = [
        Genre::Action,
        Genre::Puzzle,
        Genre::Arcade,
        Genre::Strategy,
        Genre::Sports,
        Genre::Racing,
        Genre::Adventure,
        Genre::Casual,
        Genre::Multiplayer,
        Genre::Casino,
        Genre::Idle,
        Genre::Simulation,
        Genre::Rpg,
        Genre::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Action => "action",
            Genre::Puzzle => "puzzle",
            Genre::Arcade => "arcade",
            Genre::Strategy => "strategy",
            Genre::Sports => "sports",
            Genre::Racing => "racing",
            Genre::Adventure => "adventure",
            Genre::Casual => "casual",
            Genre::Multiplayer => "multiplayer",
            Genre::Casino => "casino",
            Genre::Idle => "idle",
            Genre::Simulation => "simulation",
            Genre::Rpg => "rpg",
            Genre::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.as_str() == value)
    }
}

/// Public game format. Zip bundles publish as `html`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum GameFormat {
    Html,
    Script,
}

impl GameFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameFormat::Html => "html",
            GameFormat::Script => "script",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "html" => Some(GameFormat::Html),
            "script" => Some(GameFormat::Script),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
pub enum Dimensions {
    #[serde(rename = "2d")]
    #[sqlx(rename = "2d")]
    TwoD,
    #[serde(rename = "3d")]
    #[sqlx(rename = "3d")]
    ThreeD,
}

impl Dimensions {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimensions::TwoD => "2d",
            Dimensions::ThreeD => "3d",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "2d" => Some(Dimensions::TwoD),
            "3d" => Some(Dimensions::ThreeD),
            _ => None,
        }
    }
}

/// Size bracket for zip asset bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
pub enum Tier {
    #[serde(rename = "2d_basic")]
    #[sqlx(rename = "2d_basic")]
    Basic2d,
    #[serde(rename = "2d_rich")]
    #[sqlx(rename = "2d_rich")]
    Rich2d,
    #[serde(rename = "3d_standard")]
    #[sqlx(rename = "3d_standard")]
    Standard3d,
    #[serde(rename = "3d_premium")]
    #[sqlx(rename = "3d_premium")]
    Premium3d,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Basic2d, Tier::Rich2d, Tier::Standard3d, Tier::Premium3d];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Basic2d => "2d_basic",
            Tier::Rich2d => "2d_rich",
            Tier::Standard3d => "3d_standard",
            Tier::Premium3d => "3d_premium",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }

    /// Bundle-level byte ceiling.
    pub fn ceiling_bytes(&self) -> u64 {
        const MB: u64 = 1024 * 1024;
        match self {
            Tier::Basic2d => 5 * MB,
            Tier::Rich2d => 15 * MB,
            Tier::Standard3d => 25 * MB,
            Tier::Premium3d => 50 * MB,
        }
    }
}

/// Published game. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub title: String,
    pub description: String,
    pub genre: Genre,
    pub tags: Vec<String>,
    pub format: GameFormat,
    pub dimensions: Dimensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    pub libs: Vec<String>,
    pub size_bytes: i64,
    pub thumbnail_url: String,
    pub file_url: String,
    pub play_url: String,
    pub runtime_url: String,
    pub created_at: DateTime<Utc>,
}

/// Raw `games` row; list columns are stored as JSON text.
#[derive(Debug, Clone, FromRow)]
pub struct GameRow {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub title: String,
    pub description: String,
    pub genre: Genre,
    pub tags: String,
    pub format: GameFormat,
    pub dimensions: Dimensions,
    pub tier: Option<Tier>,
    pub libs: String,
    pub size_bytes: i64,
    pub thumbnail_url: String,
    pub file_url: String,
    pub play_url: String,
    pub runtime_url: String,
    pub created_at: DateTime<Utc>,
}

/// Column list matching [`GameRow`].
pub const GAME_COLUMNS: &str = "id, agent_id, title, description, genre, tags, format, \
     dimensions, tier, libs, size_bytes, thumbnail_url, file_url, play_url, runtime_url, created_at";

impl TryFrom<GameRow> for GameRecord {
    type Error = AppError;

    fn try_from(row: GameRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            agent_id: row.agent_id,
            title: row.title,
            description: row.description,
            genre: row.genre,
            tags: serde_json::from_str(&row.tags)?,
            format: row.format,
            dimensions: row.dimensions,
            tier: row.tier,
            libs: serde_json::from_str(&row.libs)?,
            size_bytes: row.size_bytes,
            thumbnail_url: row.thumbnail_url,
            file_url: row.file_url,
            play_url: row.play_url,
            runtime_url: row.runtime_url,
            created_at: row.created_at,
        })
    }
}
