//! Pitch walls, outer border and the kickoff half-locks

use tracing::debug;

use crate::game::geometry::{PitchGeometry, Side};
use crate::game::physics::{group, mask, Body, BodyHandle, Material, Shape, World};
use crate::util::Vec2;

#[derive(Debug)]
pub struct PitchMap {
    pub geometry: PitchGeometry,
    pub walls: [BodyHandle; 2],
    pub border: BodyHandle,
    lock: Option<(Side, BodyHandle)>,
}

impl PitchMap {
    pub fn spawn(world: &mut World, geometry: PitchGeometry) -> Self {
        let wall = |points: &[Vec2]| {
            Body::fixed(Vec2::ZERO).with_shape(Shape::closed_loop(
                points.to_vec(),
                group::MAP,
                mask::MAP,
                Material::Map,
            ))
        };
        let walls = [
            world.add_body(wall(&geometry.top)),
            world.add_body(wall(&geometry.bottom)),
        ];
        let border = world.add_body(Body::fixed(Vec2::ZERO).with_shape(Shape::closed_loop(
            geometry.border.clone(),
            group::MAP_BORDER,
            mask::MAP_BORDER,
            Material::Border,
        )));

        Self {
            geometry,
            walls,
            border,
            lock: None,
        }
    }

    /// Side currently locked, if any
    pub fn lock_side(&self) -> Option<Side> {
        self.lock.map(|(side, _)| side)
    }

    pub fn lock_body(&self) -> Option<BodyHandle> {
        self.lock.map(|(_, handle)| handle)
    }

    /// Put up the barrier for `side`, replacing any other lock
    pub fn insert_lock(&mut self, world: &mut World, side: Side) {
        if self.lock_side() == Some(side) {
            return;
        }
        self.remove_lock(world);
        let body = Body::fixed(Vec2::ZERO).with_shape(Shape::closed_loop(
            self.geometry.lock(side).to_vec(),
            group::MAP_BORDER,
            mask::HALF_LOCK,
            Material::Border,
        ));
        self.lock = Some((side, world.add_body(body)));
        debug!(?side, "Half-lock inserted");
    }

    /// True if a lock was present
    pub fn remove_lock(&mut self, world: &mut World) -> bool {
        match self.lock.take() {
            Some((side, handle)) => {
                world.remove_body(handle);
                debug!(?side, "Half-lock removed");
                true
            }
            None => false,
        }
    }
}
