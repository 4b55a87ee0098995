//! Map size profiles

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::util::Vec2;

use super::GameError;

/// Pitch sizes offered to rooms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapSize {
    Small,
    Medium,
    Big,
}

impl Default for MapSize {
    fn default() -> Self {
        Self::Medium
    }
}

impl MapSize {
    /// Multiplier applied to every shot impulse on this map
    pub fn shooting_modifier(self) -> f32 {
        match self {
            MapSize::Small => 1.0,
            MapSize::Medium => 1.1,
            MapSize::Big => 1.18,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MapSize::Small => "small",
            MapSize::Medium => "medium",
            MapSize::Big => "big",
        }
    }
}

impl fmt::Display for MapSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MapSize {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(MapSize::Small),
            "medium" => Ok(MapSize::Medium),
            "big" => Ok(MapSize::Big),
            other => Err(GameError::UnknownMapSize(other.to_string())),
        }
    }
}

/// Pitch dimensions. The playable rectangle spans `(0, 0)` to
/// `(width, height)`; goals sit outside it on the left and right.
#[derive(Debug, Clone, PartialEq)]
pub struct MapProfile {
    pub size: MapSize,
    pub width: f32,
    pub height: f32,
    /// Height of the goal mouth (the gap in the side walls)
    pub goal_height: f32,
    /// How far the net reaches behind the goal line
    pub goal_depth: f32,
    pub post_radius: f32,
    pub corner_radius: f32,
    /// Arc samples per rounded corner
    pub corner_points: usize,
    pub center_circle_radius: f32,
    /// Arc samples for the half-lock notch
    pub center_circle_points: usize,
    pub wall_thickness: f32,
}

impl MapProfile {
    pub fn for_size(size: MapSize) -> Self {
        match size {
            MapSize::Small => Self {
                size,
                width: 800.0,
                height: 400.0,
                goal_height: 140.0,
                goal_depth: 40.0,
                post_radius: 6.0,
                corner_radius: 40.0,
                corner_points: 8,
                center_circle_radius: 60.0,
                center_circle_points: 16,
                wall_thickness: 20.0,
            },
            MapSize::Medium => Self {
                size,
                width: 1100.0,
                height: 550.0,
                goal_height: 170.0,
                goal_depth: 50.0,
                post_radius: 7.0,
                corner_radius: 50.0,
                corner_points: 8,
                center_circle_radius: 80.0,
                center_circle_points: 16,
                wall_thickness: 20.0,
            },
            MapSize::Big => Self {
                size,
                width: 1400.0,
                height: 700.0,
                goal_height: 200.0,
                goal_depth: 60.0,
                post_radius: 8.0,
                corner_radius: 60.0,
                corner_points: 10,
                center_circle_radius: 100.0,
                center_circle_points: 20,
                wall_thickness: 20.0,
            },
        }
    }

    /// Reject geometry that cannot produce a sane pitch
    pub fn validate(&self) -> Result<(), GameError> {
        let lengths = [
            ("width", self.width),
            ("height", self.height),
            ("goal_height", self.goal_height),
            ("goal_depth", self.goal_depth),
            ("post_radius", self.post_radius),
            ("corner_radius", self.corner_radius),
            ("center_circle_radius", self.center_circle_radius),
            ("wall_thickness", self.wall_thickness),
        ];
        for (name, value) in lengths {
            if !value.is_finite() || value <= 0.0 {
                return Err(GameError::InvalidProfile(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if self.corner_points < 2 || self.center_circle_points < 2 {
            return Err(GameError::InvalidProfile(
                "arcs need at least 2 sample points".to_string(),
            ));
        }
        if self.goal_height + 2.0 * self.corner_radius >= self.height {
            return Err(GameError::InvalidProfile(
                "goal mouth and corners do not fit the pitch height".to_string(),
            ));
        }
        if 2.0 * self.corner_radius >= self.width {
            return Err(GameError::InvalidProfile(
                "corners do not fit the pitch width".to_string(),
            ));
        }
        if 2.0 * self.center_circle_radius >= self.height {
            return Err(GameError::InvalidProfile(
                "center circle does not fit the pitch".to_string(),
            ));
        }
        Ok(())
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }

    /// Y of the upper goal post
    pub fn goal_top(&self) -> f32 {
        (self.height - self.goal_height) / 2.0
    }

    /// Y of the lower goal post
    pub fn goal_bottom(&self) -> f32 {
        (self.height + self.goal_height) / 2.0
    }

    /// Distance from the pitch lines to the outer border
    pub fn border_margin(&self) -> f32 {
        self.goal_depth * 2.0
    }
}
