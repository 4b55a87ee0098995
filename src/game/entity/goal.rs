//! Goals: a static net plus two posts

use crate::game::geometry::{PitchGeometry, Side};
use crate::game::physics::{group, mask, Body, BodyHandle, Material, Shape, World};
use crate::game::profile::MapProfile;
use crate::util::Vec2;

#[derive(Debug)]
pub struct Goal {
    pub side: Side,
    pub net: BodyHandle,
    pub posts: [BodyHandle; 2],
}

impl Goal {
    pub fn spawn(world: &mut World, geometry: &PitchGeometry, profile: &MapProfile, side: Side) -> Self {
        let (outline, post_centers) = match side {
            Side::Left => (&geometry.left_net, geometry.left_posts),
            Side::Right => (&geometry.right_net, geometry.right_posts),
        };

        let net = world.add_body(Body::fixed(Vec2::ZERO).with_shape(Shape::closed_loop(
            outline.clone(),
            group::GOAL,
            mask::GOAL,
            Material::Goal,
        )));

        let posts = post_centers.map(|center| {
            world.add_body(Body::fixed(center).with_shape(Shape::circle(
                profile.post_radius,
                group::GOAL_POST,
                mask::GOAL_POST,
                Material::Post,
            )))
        });

        Self { side, net, posts }
    }

    pub fn bodies(&self) -> [BodyHandle; 3] {
        [self.net, self.posts[0], self.posts[1]]
    }
}
