use serde::{Deserialize, Serialize};
use std::fmt;

use crate::coords::{Point, Rectangle, Size, TileCoord};
use crate::error::{DomainError, DomainResult};

/// Lifecycle state of a project. The numeric codes are the values stored in
/// the `project.state` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectState {
    Active,
    Passive,
    Inactive,
    Creating,
}

impl ProjectState {
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Self::Active => 0,
            Self::Passive => 10,
            Self::Inactive => 20,
            Self::Creating => 30,
        }
    }

    pub fn from_code(code: i64) -> DomainResult<Self> {
        match code {
            0 => Ok(Self::Active),
            10 => Ok(Self::Passive),
            20 => Ok(Self::Inactive),
            30 => Ok(Self::Creating),
            other => Err(DomainError::UnknownCode(format!(
                "project state {other}"
            ))),
        }
    }
}

/// Status of one diff event. The numeric codes are the values stored in the
/// `history_change.status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    NotStarted,
    InProgress,
    Complete,
}

impl DiffStatus {
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Self::NotStarted => 0,
            Self::InProgress => 10,
            Self::Complete => 20,
        }
    }

    pub fn from_code(code: i64) -> DomainResult<Self> {
        match code {
            0 => Ok(Self::NotStarted),
            10 => Ok(Self::InProgress),
            20 => Ok(Self::Complete),
            other => Err(DomainError::UnknownCode(format!("diff status {other}"))),
        }
    }
}

/// Category of a change event for streak tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakKind {
    None,
    Progress,
    Regress,
    Mixed,
}

impl StreakKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Progress => "progress",
            Self::Regress => "regress",
            Self::Mixed => "mixed",
        }
    }

    pub fn parse(value: &str) -> DomainResult<Self> {
        match value {
            "none" => Ok(Self::None),
            "progress" => Ok(Self::Progress),
            "regress" => Ok(Self::Regress),
            "mixed" => Ok(Self::Mixed),
            other => Err(DomainError::UnknownCode(format!("streak kind '{other}'"))),
        }
    }
}

impl fmt::Display for StreakKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A person who can own projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub id: i64,
    pub name: String,
    pub discord_id: Option<i64>,
    pub access: u32,
    pub watched_tiles_count: i64,
    pub active_projects_count: i64,
}

/// Persistent metadata for one project: bounds, lifecycle state, and the
/// statistics maintained by the diff engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub state: ProjectState,

    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,

    pub first_seen: i64,
    pub last_check: i64,
    pub last_snapshot: i64,

    // Best completion ever reached (the ratchet).
    pub max_completion_pixels: i64,
    pub max_completion_percent: f64,
    pub max_completion_time: i64,

    pub total_progress: i64,
    pub total_regress: i64,

    pub largest_regress_pixels: i64,
    pub largest_regress_time: i64,

    pub change_streak_kind: StreakKind,
    pub change_streak_count: i64,
    pub nochange_streak_count: i64,

    pub recent_rate_pixels_per_hour: f64,
    pub recent_rate_window_start: i64,

    pub has_missing_tiles: bool,
    pub last_log_message: String,
}

impl ProjectRecord {
    /// A fresh record for a project first seen `now` over `rect`.
    #[must_use]
    pub fn from_rect(owner_id: i64, name: &str, rect: Rectangle, now: i64) -> Self {
        let point = rect.point();
        let size = rect.size();
        Self {
            id: 0,
            owner_id,
            name: name.to_owned(),
            state: ProjectState::Active,
            x: point.x,
            y: point.y,
            width: size.w,
            height: size.h,
            first_seen: now,
            last_check: now,
            last_snapshot: 0,
            max_completion_pixels: 0,
            max_completion_percent: 0.0,
            max_completion_time: 0,
            total_progress: 0,
            total_regress: 0,
            largest_regress_pixels: 0,
            largest_regress_time: 0,
            change_streak_kind: StreakKind::None,
            change_streak_count: 0,
            nochange_streak_count: 0,
            recent_rate_pixels_per_hour: 0.0,
            recent_rate_window_start: 0,
            has_missing_tiles: true,
            last_log_message: String::new(),
        }
    }

    #[must_use]
    pub fn rectangle(&self) -> Rectangle {
        Rectangle::from_point_size(Point::new(self.x, self.y), Size::new(self.width, self.height))
    }

    /// Canonical target file name derived from the rectangle origin:
    /// `<tx>_<ty>_<px>_<py>.png`.
    #[must_use]
    pub fn filename(&self) -> String {
        format!("{}.png", Point::new(self.x, self.y))
    }
}

/// Persistent metadata for a single canvas tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRecord {
    pub tile: TileCoord,
    pub heat: u16,
    pub last_checked: i64,
    pub last_update: i64,
    pub etag: String,
}

impl TileRecord {
    /// Advisory heat for tiles that never graduated from the burning queue.
    pub const BURNING_HEAT: u16 = 999;

    #[must_use]
    pub fn new_burning(tile: TileCoord) -> Self {
        Self {
            tile,
            heat: Self::BURNING_HEAT,
            last_checked: 0,
            last_update: 0,
            etag: String::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.tile.id()
    }

    /// True until the tile has been successfully polled once.
    #[must_use]
    pub fn is_burning(&self) -> bool {
        self.last_checked == 0
    }
}

/// Append-only record of one diff event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryChange {
    pub id: i64,
    pub project_id: i64,
    pub timestamp: i64,
    pub status: DiffStatus,
    pub num_remaining: i64,
    pub num_target: i64,
    pub completion_percent: f64,
    pub progress_pixels: i64,
    pub regress_pixels: i64,
}
