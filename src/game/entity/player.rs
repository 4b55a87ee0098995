//! Player entity: body, keys, and action cooldowns

use crate::game::input::KeysMap;
use crate::game::physics::{group, mask, Body, BodyHandle, Material, Shape, World};
use crate::game::timer::{RoomTask, Scheduler, TimerId};
use crate::game::tuning::Tuning;
use crate::game::{PlayerId, RoomUser};
use crate::util::Vec2;
use crate::ws::protocol::{PlayerDescriptor, PowerupKind, Team};

#[derive(Debug)]
pub struct Player {
    pub id: PlayerId,
    pub nickname: String,
    pub avatar: String,
    pub team: Team,
    pub body: BodyHandle,
    pub radius: f32,
    pub keys: KeysMap,
    /// Mirrors the shoot key
    pub shooting: bool,
    pub shooting_cooldown: bool,
    pub dashing: bool,
    pub power: Option<PowerupKind>,
    shoot_timer: Option<TimerId>,
    dash_timer: Option<TimerId>,
}

impl Player {
    pub fn spawn(world: &mut World, user: &RoomUser, at: Vec2, tuning: &Tuning) -> Self {
        let body = Body::dynamic(at, tuning.player_mass, tuning.player_damping).with_shape(
            Shape::circle(tuning.player_radius, group::PLAYER, mask::PLAYER, Material::Player),
        );
        Self {
            id: user.id,
            nickname: user.nickname.clone(),
            avatar: user.avatar.clone(),
            team: user.team,
            body: world.add_body(body),
            radius: tuning.player_radius,
            keys: KeysMap::default(),
            shooting: false,
            shooting_cooldown: false,
            dashing: false,
            power: None,
            shoot_timer: None,
            dash_timer: None,
        }
    }

    pub fn position(&self, world: &World) -> Option<Vec2> {
        world.body(self.body).map(|b| b.position)
    }

    pub fn descriptor(&self, world: &World) -> PlayerDescriptor {
        PlayerDescriptor {
            id: self.id,
            nickname: self.nickname.clone(),
            avatar: self.avatar.clone(),
            team: self.team,
            position: self.position(world).unwrap_or_default(),
            power: self.power,
        }
    }

    /// Force cap for this tick; lower while aiming a shot
    pub fn max_speed(&self, tuning: &Tuning) -> f32 {
        let base = if self.shooting {
            tuning.player_shooting_speed
        } else {
            tuning.player_max_speed
        };
        if self.power == Some(PowerupKind::Speed) {
            base * tuning.powerup_speed_factor
        } else {
            base
        }
    }

    /// Turn the current key snapshot into this tick's force
    pub fn logic(&mut self, world: &mut World, timers: &mut Scheduler<RoomTask>, tuning: &Tuning) {
        self.shooting = self.keys.shoot;
        let max = self.max_speed(tuning);

        let mut force = Vec2::ZERO;
        if self.keys.up {
            force.y = -max;
        }
        if self.keys.down {
            force.y = max;
        }
        if self.keys.left {
            force.x = -max;
        }
        if self.keys.right {
            force.x = max;
        }

        if let Some(body) = world.body_mut(self.body) {
            body.force = force.clamp_length(max);
        }

        if self.keys.dash && self.keys.any_direction() && !self.dashing {
            self.dash(world, timers, tuning);
        }
    }

    /// Burst along the current heading. Returns false if already dashing.
    pub fn dash(&mut self, world: &mut World, timers: &mut Scheduler<RoomTask>, tuning: &Tuning) -> bool {
        if self.dashing {
            return false;
        }
        let Some(body) = world.body_mut(self.body) else {
            return false;
        };

        let saved = body.velocity;
        let heading = saved.normalize();
        let mut speed = tuning.dash_speed;
        if self.power == Some(PowerupKind::Dash) {
            speed *= tuning.powerup_dash_factor;
            self.power = None;
        }
        body.velocity = heading * speed;

        self.dashing = true;
        self.replace_dash_timer(
            timers,
            tuning.dash_duration,
            RoomTask::DashRestore {
                player: self.id,
                velocity: saved,
            },
        );
        true
    }

    /// Dash burst is over: restore the pre-dash velocity and start the cooldown
    pub fn finish_dash(
        &mut self,
        world: &mut World,
        timers: &mut Scheduler<RoomTask>,
        velocity: Vec2,
        tuning: &Tuning,
    ) {
        self.dash_timer = None;
        if let Some(body) = world.body_mut(self.body) {
            body.velocity = velocity;
        }
        self.replace_dash_timer(timers, tuning.dash_cooldown, RoomTask::DashCooldownEnd(self.id));
    }

    pub fn end_dash_cooldown(&mut self) {
        self.dash_timer = None;
        self.dashing = false;
    }

    /// Start the shot cooldown
    pub fn shoot(&mut self, timers: &mut Scheduler<RoomTask>, tuning: &Tuning) {
        if let Some(timer) = self.shoot_timer.take() {
            timers.cancel(timer);
        }
        self.shooting_cooldown = true;
        self.shoot_timer = Some(timers.schedule(tuning.shoot_cooldown, RoomTask::ShootCooldownEnd(self.id)));
    }

    pub fn end_shoot_cooldown(&mut self) {
        self.shoot_timer = None;
        self.shooting_cooldown = false;
    }

    /// Shot strength for this player, spending a held `Strength` power
    pub fn take_shot_strength(&mut self, tuning: &Tuning) -> f32 {
        if self.power == Some(PowerupKind::Strength) {
            self.power = None;
            tuning.shot_strength * tuning.powerup_strength_factor
        } else {
            tuning.shot_strength
        }
    }

    /// Drop every pending timer owned by this player
    pub fn cancel_timers(&mut self, timers: &mut Scheduler<RoomTask>) {
        if let Some(timer) = self.shoot_timer.take() {
            timers.cancel(timer);
        }
        if let Some(timer) = self.dash_timer.take() {
            timers.cancel(timer);
        }
    }

    /// Back to kickoff: stationary, no pending actions
    pub fn reset(&mut self, world: &mut World, timers: &mut Scheduler<RoomTask>, at: Vec2) {
        self.cancel_timers(timers);
        self.shooting_cooldown = false;
        self.dashing = false;
        if self.power == Some(PowerupKind::Speed) {
            self.power = None;
        }
        if let Some(body) = world.body_mut(self.body) {
            body.reset_to(at);
        }
    }

    pub fn has_pending_timers(&self) -> bool {
        self.shoot_timer.is_some() || self.dash_timer.is_some()
    }

    fn replace_dash_timer(&mut self, timers: &mut Scheduler<RoomTask>, delay: std::time::Duration, task: RoomTask) {
        if let Some(timer) = self.dash_timer.take() {
            timers.cancel(timer);
        }
        self.dash_timer = Some(timers.schedule(delay, task));
    }
}
