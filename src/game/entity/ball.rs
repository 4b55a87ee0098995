//! The match ball

use crate::game::physics::{group, mask, Body, BodyHandle, Material, Shape, World};
use crate::game::tuning::Tuning;
use crate::util::Vec2;

#[derive(Debug)]
pub struct Ball {
    pub body: BodyHandle,
    pub radius: f32,
}

impl Ball {
    pub fn spawn(world: &mut World, at: Vec2, tuning: &Tuning) -> Self {
        let body = Body::dynamic(at, tuning.ball_mass, tuning.ball_damping).with_shape(
            Shape::circle(tuning.ball_radius, group::BALL, mask::BALL, Material::Ball),
        );
        Self {
            body: world.add_body(body),
            radius: tuning.ball_radius,
        }
    }

    pub fn position(&self, world: &World) -> Vec2 {
        world.body(self.body).map(|b| b.position).unwrap_or_default()
    }

    pub fn velocity(&self, world: &World) -> Vec2 {
        world.body(self.body).map(|b| b.velocity).unwrap_or_default()
    }

    pub fn is_moving(&self, world: &World, threshold: f32) -> bool {
        self.velocity(world).exceeds_on_any_axis(threshold)
    }

    pub fn apply_impulse(&self, world: &mut World, impulse: Vec2) {
        if let Some(body) = world.body_mut(self.body) {
            body.apply_impulse(impulse);
        }
    }

    pub fn reset(&self, world: &mut World, at: Vec2) {
        if let Some(body) = world.body_mut(self.body) {
            body.reset_to(at);
        }
    }
}
