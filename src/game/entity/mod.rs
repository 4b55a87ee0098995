//! Entities living in a room's physics world

pub mod ball;
pub mod goal;
pub mod map;
pub mod player;
pub mod powerup;

pub use ball::Ball;
pub use goal::Goal;
pub use map::PitchMap;
pub use player::Player;
pub use powerup::Powerup;
