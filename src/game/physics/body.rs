//! Rigid bodies and their shapes

use crate::util::Vec2;

use super::collision::Material;

/// Generational handle into a [`super::World`]. A handle outlives its body
/// safely: lookups after removal simply miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle {
    pub(super) index: u32,
    pub(super) generation: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Circle { radius: f32 },
    /// Closed loop of edges in body-local coordinates
    Loop { points: Vec<Vec2> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub geometry: Geometry,
    pub group: u32,
    pub mask: u32,
    pub material: Material,
}

impl Shape {
    pub fn circle(radius: f32, group: u32, mask: u32, material: Material) -> Self {
        Self {
            geometry: Geometry::Circle { radius },
            group,
            mask,
            material,
        }
    }

    pub fn closed_loop(points: Vec<Vec2>, group: u32, mask: u32, material: Material) -> Self {
        Self {
            geometry: Geometry::Loop { points },
            group,
            mask,
            material,
        }
    }

    pub fn radius(&self) -> Option<f32> {
        match self.geometry {
            Geometry::Circle { radius } => Some(radius),
            Geometry::Loop { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Body {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Cleared after every step
    pub force: Vec2,
    /// Fraction of velocity lost per second
    pub damping: f32,
    inv_mass: f32,
    pub shapes: Vec<Shape>,
}

impl Body {
    pub fn dynamic(position: Vec2, mass: f32, damping: f32) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            force: Vec2::ZERO,
            damping: damping.clamp(0.0, 1.0),
            inv_mass: if mass > 0.0 { 1.0 / mass } else { 0.0 },
            shapes: Vec::new(),
        }
    }

    /// Immovable body (mass 0)
    pub fn fixed(position: Vec2) -> Self {
        Self::dynamic(position, 0.0, 0.0)
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shapes.push(shape);
        self
    }

    pub fn is_static(&self) -> bool {
        self.inv_mass == 0.0
    }

    pub fn inv_mass(&self) -> f32 {
        self.inv_mass
    }

    /// Instant velocity change of `impulse / mass`
    pub fn apply_impulse(&mut self, impulse: Vec2) {
        self.velocity += impulse * self.inv_mass;
    }

    /// Zero velocity and pending force, then teleport
    pub fn reset_to(&mut self, position: Vec2) {
        self.position = position;
        self.velocity = Vec2::ZERO;
        self.force = Vec2::ZERO;
    }

    /// Radius of the first circle shape
    pub fn radius(&self) -> f32 {
        self.shapes
            .iter()
            .find_map(Shape::radius)
            .unwrap_or(0.0)
    }

    /// Semi-implicit Euler. The force is left in place; the world clears
    /// it once the whole step is done.
    pub(super) fn integrate(&mut self, dt: f32) {
        if self.is_static() {
            return;
        }
        self.velocity += self.force * (self.inv_mass * dt);
        self.velocity = self.velocity * (1.0 - self.damping).powf(dt);
        self.position += self.velocity * dt;
    }
}
