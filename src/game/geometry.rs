//! Static pitch geometry
//!
//! Everything here is pure: a [`MapProfile`] goes in, closed vertex loops
//! come out. The physics world treats each loop as a ring of edges, so loops
//! only need to be closed, not convex.

use std::f32::consts::{FRAC_PI_2, PI};

use crate::util::Vec2;

use super::profile::MapProfile;

/// Sample the interior of a circular arc.
///
/// Returns `points_amount - 1` points strictly between the two arc ends;
/// callers push the exact corner endpoints themselves. `clock_wise` must be
/// `1.0` or `-1.0` and flips the sweep direction (angles grow with `+1` in
/// the y-down pitch frame).
pub fn arc_points(
    center: Vec2,
    radius: f32,
    points_amount: usize,
    start_angle: f32,
    sweep: f32,
    clock_wise: f32,
) -> Vec<Vec2> {
    if points_amount < 2 {
        return Vec::new();
    }
    let step = sweep / points_amount as f32;
    (1..points_amount)
        .map(|i| {
            let angle = start_angle + clock_wise * step * i as f32;
            center + Vec2::from_angle(angle) * radius
        })
        .collect()
}

/// Which half of the pitch a piece of geometry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// All static outlines for one pitch
#[derive(Debug, Clone)]
pub struct PitchGeometry {
    /// Upper pitch wall, from the left goal's top post round to the right one
    pub top: Vec<Vec2>,
    pub bottom: Vec<Vec2>,
    /// Outer frame only players collide with
    pub border: Vec<Vec2>,
    /// Blocks the left half plus the center circle
    pub left_lock: Vec<Vec2>,
    pub right_lock: Vec<Vec2>,
    pub left_net: Vec<Vec2>,
    pub right_net: Vec<Vec2>,
    /// Post centers as `[upper, lower]`
    pub left_posts: [Vec2; 2],
    pub right_posts: [Vec2; 2],
}

impl PitchGeometry {
    pub fn build(profile: &MapProfile) -> Self {
        Self {
            top: top_wall(profile),
            bottom: bottom_wall(profile),
            border: border(profile),
            left_lock: half_lock(profile, Side::Left),
            right_lock: half_lock(profile, Side::Right),
            left_net: net(profile, Side::Left),
            right_net: net(profile, Side::Right),
            left_posts: [
                Vec2::new(0.0, profile.goal_top()),
                Vec2::new(0.0, profile.goal_bottom()),
            ],
            right_posts: [
                Vec2::new(profile.width, profile.goal_top()),
                Vec2::new(profile.width, profile.goal_bottom()),
            ],
        }
    }

    pub fn lock(&self, side: Side) -> &[Vec2] {
        match side {
            Side::Left => &self.left_lock,
            Side::Right => &self.right_lock,
        }
    }
}

fn top_wall(p: &MapProfile) -> Vec<Vec2> {
    let (w, r, t) = (p.width, p.corner_radius, p.wall_thickness);
    let mut points = vec![Vec2::new(0.0, p.goal_top()), Vec2::new(0.0, r)];
    points.extend(arc_points(Vec2::new(r, r), r, p.corner_points, PI, FRAC_PI_2, 1.0));
    points.push(Vec2::new(r, 0.0));
    points.push(Vec2::new(w - r, 0.0));
    points.extend(arc_points(
        Vec2::new(w - r, r),
        r,
        p.corner_points,
        3.0 * FRAC_PI_2,
        FRAC_PI_2,
        1.0,
    ));
    points.push(Vec2::new(w, r));
    points.push(Vec2::new(w, p.goal_top()));
    points.extend([
        Vec2::new(w + t, p.goal_top()),
        Vec2::new(w + t, -t),
        Vec2::new(-t, -t),
        Vec2::new(-t, p.goal_top()),
    ]);
    points
}

fn bottom_wall(p: &MapProfile) -> Vec<Vec2> {
    let (w, h, r, t) = (p.width, p.height, p.corner_radius, p.wall_thickness);
    let mut points = vec![Vec2::new(0.0, p.goal_bottom()), Vec2::new(0.0, h - r)];
    points.extend(arc_points(Vec2::new(r, h - r), r, p.corner_points, PI, FRAC_PI_2, -1.0));
    points.push(Vec2::new(r, h));
    points.push(Vec2::new(w - r, h));
    points.extend(arc_points(
        Vec2::new(w - r, h - r),
        r,
        p.corner_points,
        FRAC_PI_2,
        FRAC_PI_2,
        -1.0,
    ));
    points.push(Vec2::new(w, h - r));
    points.push(Vec2::new(w, p.goal_bottom()));
    points.extend([
        Vec2::new(w + t, p.goal_bottom()),
        Vec2::new(w + t, h + t),
        Vec2::new(-t, h + t),
        Vec2::new(-t, p.goal_bottom()),
    ]);
    points
}

fn border(p: &MapProfile) -> Vec<Vec2> {
    let m = p.border_margin();
    vec![
        Vec2::new(-m, -m),
        Vec2::new(p.width + m, -m),
        Vec2::new(p.width + m, p.height + m),
        Vec2::new(-m, p.height + m),
    ]
}

/// One half of the pitch out to the border, plus the whole center circle
/// bulging into the opposite half.
fn half_lock(p: &MapProfile, side: Side) -> Vec<Vec2> {
    let m = p.border_margin();
    let center = p.center();
    let radius = p.center_circle_radius;
    let (far_x, clock_wise) = match side {
        Side::Left => (-m, -1.0),
        Side::Right => (p.width + m, 1.0),
    };

    let mut points = vec![
        Vec2::new(center.x, -m),
        Vec2::new(far_x, -m),
        Vec2::new(far_x, p.height + m),
        Vec2::new(center.x, p.height + m),
        Vec2::new(center.x, center.y + radius),
    ];
    points.extend(arc_points(
        center,
        radius,
        p.center_circle_points,
        FRAC_PI_2,
        PI,
        clock_wise,
    ));
    points.push(Vec2::new(center.x, center.y - radius));
    points
}

/// U-shaped net behind a goal line, open towards the pitch
fn net(p: &MapProfile, side: Side) -> Vec<Vec2> {
    let (top, bottom) = (p.goal_top(), p.goal_bottom());
    let d = p.goal_depth;
    let t = p.wall_thickness / 2.0;
    let left = [
        Vec2::new(0.0, top - t),
        Vec2::new(-d - t, top - t),
        Vec2::new(-d - t, bottom + t),
        Vec2::new(0.0, bottom + t),
        Vec2::new(0.0, bottom),
        Vec2::new(-d, bottom),
        Vec2::new(-d, top),
        Vec2::new(0.0, top),
    ];
    match side {
        Side::Left => left.to_vec(),
        Side::Right => left
            .iter()
            .map(|v| Vec2::new(p.width - v.x, v.y))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::profile::MapSize;

    fn close(a: Vec2, b: Vec2) -> bool {
        a.distance(b) < 1e-3
    }

    #[test]
    fn arc_yields_interior_points_only() {
        let pts = arc_points(Vec2::ZERO, 10.0, 4, 0.0, FRAC_PI_2, 1.0);
        assert_eq!(pts.len(), 3);
        for p in &pts {
            assert!((p.length() - 10.0).abs() < 1e-4);
            assert!(!close(*p, Vec2::new(10.0, 0.0)));
            assert!(!close(*p, Vec2::new(0.0, 10.0)));
        }
        // halfway sample of a quarter turn
        assert!(close(pts[1], Vec2::from_angle(FRAC_PI_2 / 2.0) * 10.0));
    }

    #[test]
    fn arc_direction_flips_with_clock_wise() {
        let cw = arc_points(Vec2::ZERO, 1.0, 2, 0.0, PI, 1.0);
        let ccw = arc_points(Vec2::ZERO, 1.0, 2, 0.0, PI, -1.0);
        assert!(close(cw[0], Vec2::new(0.0, 1.0)));
        assert!(close(ccw[0], Vec2::new(0.0, -1.0)));
    }

    #[test]
    fn degenerate_arc_is_empty() {
        assert!(arc_points(Vec2::ZERO, 1.0, 1, 0.0, PI, 1.0).is_empty());
    }

    #[test]
    fn walls_leave_goal_gap() {
        let profile = MapProfile::for_size(MapSize::Small);
        let geo = PitchGeometry::build(&profile);
        let top_lowest = geo
            .top
            .iter()
            .filter(|v| v.x >= 0.0 && v.x <= profile.width)
            .map(|v| v.y)
            .fold(f32::MIN, f32::max);
        let bottom_highest = geo
            .bottom
            .iter()
            .filter(|v| v.x >= 0.0 && v.x <= profile.width)
            .map(|v| v.y)
            .fold(f32::MAX, f32::min);
        assert!((top_lowest - profile.goal_top()).abs() < 1e-4);
        assert!((bottom_highest - profile.goal_bottom()).abs() < 1e-4);
        assert!((bottom_highest - top_lowest - profile.goal_height).abs() < 1e-4);
    }

    #[test]
    fn corners_are_rounded_inside_pitch() {
        let profile = MapProfile::for_size(MapSize::Medium);
        let geo = PitchGeometry::build(&profile);
        let expected = 2 + 2 * (profile.corner_points - 1) + 4 + 4;
        assert_eq!(geo.top.len(), expected);
        assert_eq!(geo.bottom.len(), expected);
        for v in geo.bottom.iter().take(expected - 4) {
            assert!(v.y <= profile.height + 1e-4);
        }
    }

    #[test]
    fn locks_bulge_into_opposite_half() {
        let profile = MapProfile::for_size(MapSize::Medium);
        let geo = PitchGeometry::build(&profile);
        let center = profile.center();
        let reach = profile.center_circle_radius;

        let right_min_x = geo.right_lock.iter().map(|v| v.x).fold(f32::MAX, f32::min);
        assert!((right_min_x - (center.x - reach)).abs() < 1e-3);

        let left_max_x = geo.left_lock.iter().map(|v| v.x).fold(f32::MIN, f32::max);
        assert!((left_max_x - (center.x + reach)).abs() < 1e-3);
    }

    #[test]
    fn nets_mirror_each_other() {
        let profile = MapProfile::for_size(MapSize::Big);
        let geo = PitchGeometry::build(&profile);
        assert_eq!(geo.left_net.len(), geo.right_net.len());
        for (l, r) in geo.left_net.iter().zip(&geo.right_net) {
            assert!((l.x + r.x - profile.width).abs() < 1e-4);
            assert_eq!(l.y, r.y);
        }
        assert!(geo.left_net.iter().all(|v| v.x <= 0.0));
    }
}
