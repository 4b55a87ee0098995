//! Gameplay calibration constants

use std::time::Duration;

/// Read-only tuning table shared by every entity in a room
#[derive(Debug, Clone)]
pub struct Tuning {
    pub player_radius: f32,
    pub player_mass: f32,
    pub player_damping: f32,
    /// Force magnitude applied per held direction
    pub player_max_speed: f32,
    /// Lower cap while the shoot key is held
    pub player_shooting_speed: f32,

    pub ball_radius: f32,
    pub ball_mass: f32,
    pub ball_damping: f32,

    /// Impulse magnitude of a shot before the map modifier
    pub shot_strength: f32,
    /// Max gap between player and ball surfaces for a shot to connect
    pub shot_contact_tolerance: f32,
    pub shoot_cooldown: Duration,

    pub dash_speed: f32,
    pub dash_duration: Duration,
    pub dash_cooldown: Duration,

    pub powerup_radius: f32,
    pub powerup_spawn_delay: Duration,
    /// Where an inactive powerup is parked
    pub powerup_parking: (f32, f32),
    /// Max speed multiplier for `Speed`
    pub powerup_speed_factor: f32,
    /// Shot strength multiplier for `Strength`
    pub powerup_strength_factor: f32,
    /// Dash speed multiplier for `Dash`
    pub powerup_dash_factor: f32,

    pub goal_reset_delay: Duration,
    /// Velocity on either axis above which a body counts as moving
    pub moving_threshold: f32,
    /// Horizontal distance of each team's kickoff line from the center line
    pub kickoff_offset_ratio: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            player_radius: 15.0,
            player_mass: 1.0,
            player_damping: 0.5,
            player_max_speed: 300.0,
            player_shooting_speed: 200.0,

            ball_radius: 10.0,
            ball_mass: 0.5,
            ball_damping: 0.3,

            shot_strength: 200.0,
            shot_contact_tolerance: 4.0,
            shoot_cooldown: Duration::from_millis(300),

            dash_speed: 450.0,
            dash_duration: Duration::from_millis(150),
            dash_cooldown: Duration::from_millis(1500),

            powerup_radius: 12.0,
            powerup_spawn_delay: Duration::from_secs(10),
            powerup_parking: (-10_000.0, -10_000.0),
            powerup_speed_factor: 1.25,
            powerup_strength_factor: 1.5,
            powerup_dash_factor: 1.5,

            goal_reset_delay: Duration::from_secs(3),
            moving_threshold: 0.01,
            kickoff_offset_ratio: 0.25,
        }
    }
}
