//! Collision filtering, contact materials and narrowphase tests

use std::collections::HashMap;

use crate::util::Vec2;

/// Collision identity bits. A shape carries exactly one as its group.
pub mod group {
    pub const MAP: u32 = 1 << 0;
    pub const MAP_BORDER: u32 = 1 << 1;
    pub const PLAYER: u32 = 1 << 2;
    pub const BALL: u32 = 1 << 3;
    pub const GOAL: u32 = 1 << 4;
    pub const GOAL_POST: u32 = 1 << 5;
}

/// What each identity is allowed to touch
pub mod mask {
    use super::group;

    pub const MAP: u32 = group::BALL;
    pub const MAP_BORDER: u32 = group::PLAYER | group::BALL;
    pub const PLAYER: u32 = group::PLAYER | group::MAP_BORDER | group::BALL | group::GOAL_POST;
    pub const BALL: u32 =
        group::PLAYER | group::MAP | group::GOAL | group::GOAL_POST | group::MAP_BORDER;
    pub const GOAL: u32 = group::BALL;
    pub const GOAL_POST: u32 = group::PLAYER | group::BALL;
    /// Half-locks reuse the border identity but only stop players
    pub const HALF_LOCK: u32 = group::PLAYER;
}

/// Both shapes must accept each other
pub fn can_collide(group_a: u32, mask_a: u32, group_b: u32, mask_b: u32) -> bool {
    (group_a & mask_b) != 0 && (group_b & mask_a) != 0
}

/// Surface kinds; contact tuning is looked up per pair of these
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Material {
    Player,
    Ball,
    Map,
    Border,
    Goal,
    Post,
}

/// Contact tuning for a pair of materials
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactMaterial {
    /// Coulomb friction coefficient
    pub friction: f32,
    /// Bounciness, 0 = no bounce, 1 = perfectly elastic
    pub restitution: f32,
    /// Share of the penetration removed per step, in `0..=1`
    pub stiffness: f32,
}

impl Default for ContactMaterial {
    fn default() -> Self {
        Self {
            friction: 0.0,
            restitution: 0.5,
            stiffness: 0.8,
        }
    }
}

/// Pairwise contact tuning table
#[derive(Debug, Clone, Default)]
pub struct ContactMaterials {
    pairs: HashMap<(Material, Material), ContactMaterial>,
    fallback: ContactMaterial,
}

impl ContactMaterials {
    pub fn new(fallback: ContactMaterial) -> Self {
        Self {
            pairs: HashMap::new(),
            fallback,
        }
    }

    /// The table used by every pitch
    pub fn pitch() -> Self {
        let mut table = Self::new(ContactMaterial::default());
        let mut set = |a, b, friction, restitution, stiffness| {
            table.insert(
                a,
                b,
                ContactMaterial {
                    friction,
                    restitution,
                    stiffness,
                },
            );
        };
        set(Material::Player, Material::Player, 0.0, 0.3, 0.8);
        set(Material::Player, Material::Ball, 0.0, 0.6, 0.9);
        set(Material::Player, Material::Border, 0.0, 0.0, 1.0);
        set(Material::Player, Material::Post, 0.0, 0.2, 1.0);
        set(Material::Ball, Material::Map, 0.0, 0.7, 1.0);
        set(Material::Ball, Material::Border, 0.0, 0.5, 1.0);
        set(Material::Ball, Material::Goal, 0.5, 0.1, 1.0);
        set(Material::Ball, Material::Post, 0.0, 0.9, 1.0);
        table
    }

    pub fn insert(&mut self, a: Material, b: Material, contact: ContactMaterial) {
        self.pairs.insert(Self::key(a, b), contact);
    }

    /// Order-independent lookup
    pub fn get(&self, a: Material, b: Material) -> ContactMaterial {
        self.pairs
            .get(&Self::key(a, b))
            .copied()
            .unwrap_or(self.fallback)
    }

    fn key(a: Material, b: Material) -> (Material, Material) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

/// A single contact point between two shapes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Manifold {
    /// Unit normal pointing from the first shape towards the second
    pub normal: Vec2,
    pub penetration: f32,
}

/// Circle against circle
pub fn circle_circle(a: Vec2, ra: f32, b: Vec2, rb: f32) -> Option<Manifold> {
    let delta = b - a;
    let reach = ra + rb;
    let dist_sq = delta.length_squared();
    if dist_sq >= reach * reach {
        return None;
    }
    let dist = dist_sq.sqrt();
    let normal = if dist > f32::EPSILON {
        delta * (1.0 / dist)
    } else {
        // concentric, push apart along x
        Vec2::new(1.0, 0.0)
    };
    Some(Manifold {
        normal,
        penetration: reach - dist,
    })
}

/// Closest point to `p` on the segment `a..b`
pub fn closest_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Circle against the edges of a closed loop. The normal points from the
/// circle towards the loop, matching the argument order.
pub fn circle_loop(center: Vec2, radius: f32, points: &[Vec2]) -> Option<Manifold> {
    if points.len() < 2 {
        return None;
    }
    let mut best: Option<(f32, Vec2, Vec2, Vec2)> = None;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        let q = closest_on_segment(center, a, b);
        let dist = center.distance(q);
        if dist < radius && best.map_or(true, |(d, ..)| dist < d) {
            best = Some((dist, q, a, b));
        }
    }
    best.map(|(dist, q, a, b)| {
        let away = if dist > f32::EPSILON {
            (center - q) * (1.0 / dist)
        } else {
            (b - a).perp().normalize()
        };
        Manifold {
            normal: -away,
            penetration: radius - dist,
        }
    })
}
