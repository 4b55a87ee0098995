//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::tuning::Tuning;
use crate::game::{RoomRegistry, SimulationOptions};
use crate::util::rate_limit::{create_limiter, Limiter, ROOM_CREATE_RATE_LIMIT};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rooms: Arc<RoomRegistry>,
    /// Global cap on room creation
    pub room_create_limiter: Arc<Limiter>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        let options = SimulationOptions {
            tuning: Tuning::default(),
            tick_rate: config.tick_rate,
            send_rate: config.send_rate,
            max_steps_per_run: config.max_steps_per_run,
            seed: 0,
        };
        let rooms = Arc::new(RoomRegistry::new(options, config.room_idle_timeout));

        Self {
            config,
            rooms,
            room_create_limiter: create_limiter(ROOM_CREATE_RATE_LIMIT),
        }
    }
}
