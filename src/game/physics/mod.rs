//! Minimal 2D rigid-body world
//!
//! Circles are the only dynamic geometry; static bodies may also carry
//! closed edge loops. Filtering uses group/mask bits and contact response
//! uses per-material-pair tuning.

pub mod body;
pub mod collision;

use std::collections::{HashMap, HashSet};

use crate::util::Vec2;

pub use body::{Body, BodyHandle, Geometry, Shape};
pub use collision::{group, mask, ContactMaterial, ContactMaterials, Material};

use collision::{can_collide, circle_circle, circle_loop, Manifold};

/// Overlap tolerated before positional correction kicks in
const PENETRATION_SLOP: f32 = 0.01;

/// Upper bound on the split of a single step
const MAX_SUBSTEPS: u32 = 32;

/// Pair of bodies that started touching during a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Contact {
    pub a: BodyHandle,
    pub b: BodyHandle,
}

impl Contact {
    pub fn involves(&self, handle: BodyHandle) -> bool {
        self.a == handle || self.b == handle
    }

    /// The other body, if `handle` is part of this contact
    pub fn other(&self, handle: BodyHandle) -> Option<BodyHandle> {
        if self.a == handle {
            Some(self.b)
        } else if self.b == handle {
            Some(self.a)
        } else {
            None
        }
    }
}

/// Subscription to begin-contact events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u32);

#[derive(Debug)]
struct Slot {
    generation: u32,
    body: Option<Body>,
}

struct ResolvedContact {
    a: BodyHandle,
    b: BodyHandle,
    manifold: Manifold,
    material: ContactMaterial,
}

pub struct World {
    slots: Vec<Slot>,
    free: Vec<u32>,
    materials: ContactMaterials,
    touching: HashSet<(BodyHandle, BodyHandle)>,
    listeners: HashMap<ListenerId, Vec<Contact>>,
    next_listener: u32,
}

impl World {
    pub fn new(materials: ContactMaterials) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            materials,
            touching: HashSet::new(),
            listeners: HashMap::new(),
            next_listener: 0,
        }
    }

    pub fn add_body(&mut self, body: Body) -> BodyHandle {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.generation += 1;
                slot.body = Some(body);
                BodyHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    body: Some(body),
                });
                BodyHandle {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }

    /// Returns the body if it was still present. A second removal with the
    /// same handle is a no-op.
    pub fn remove_body(&mut self, handle: BodyHandle) -> Option<Body> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let body = slot.body.take()?;
        self.free.push(handle.index);
        self.touching.retain(|(a, b)| *a != handle && *b != handle);
        Some(body)
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.body(handle).is_some()
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.body.as_ref())
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.body.as_mut())
    }

    pub fn body_count(&self) -> usize {
        self.slots.iter().filter(|s| s.body.is_some()).count()
    }

    pub fn subscribe_contacts(&mut self) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.insert(id, Vec::new());
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Begin-contact events buffered for a listener since its last drain
    pub fn drain_contacts(&mut self, id: ListenerId) -> Vec<Contact> {
        self.listeners
            .get_mut(&id)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Advance the world by `dt` seconds. Fast bodies are handled by
    /// splitting the step so no circle moves more than half its radius
    /// between contact passes.
    pub fn step(&mut self, dt: f32) {
        let substeps = self.substeps_for(dt);
        let h = dt / substeps as f32;
        for _ in 0..substeps {
            self.substep(h);
        }
        for slot in &mut self.slots {
            if let Some(body) = slot.body.as_mut() {
                body.force = Vec2::ZERO;
            }
        }
    }

    fn substep(&mut self, h: f32) {
        for slot in &mut self.slots {
            if let Some(body) = slot.body.as_mut() {
                body.integrate(h);
            }
        }

        let contacts = self.find_contacts();
        for contact in &contacts {
            self.resolve(contact);
        }

        let now: HashSet<(BodyHandle, BodyHandle)> =
            contacts.iter().map(|c| (c.a, c.b)).collect();
        let mut began: Vec<(BodyHandle, BodyHandle)> =
            now.difference(&self.touching).copied().collect();
        began.sort_unstable();
        for (a, b) in began {
            for events in self.listeners.values_mut() {
                events.push(Contact { a, b });
            }
        }
        self.touching = now;
    }

    /// Smallest split of `dt` that keeps every circle's travel per substep
    /// under half its radius
    fn substeps_for(&self, dt: f32) -> u32 {
        let mut substeps = 1u32;
        for body in self.slots.iter().filter_map(|s| s.body.as_ref()) {
            if body.is_static() {
                continue;
            }
            let radius = body.radius();
            if radius <= 0.0 {
                continue;
            }
            let speed = body.velocity.length() + body.force.length() * body.inv_mass() * dt;
            let travel = speed * dt;
            let needed = (travel / (radius * 0.5)).ceil();
            if needed.is_finite() && needed > substeps as f32 {
                substeps = (needed as u32).min(MAX_SUBSTEPS);
            }
        }
        substeps
    }

    fn handles(&self) -> Vec<BodyHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.body.is_some())
            .map(|(index, slot)| BodyHandle {
                index: index as u32,
                generation: slot.generation,
            })
            .collect()
    }

    fn find_contacts(&self) -> Vec<ResolvedContact> {
        let handles = self.handles();
        let mut contacts = Vec::new();
        for (i, &ha) in handles.iter().enumerate() {
            for &hb in &handles[i + 1..] {
                let (Some(a), Some(b)) = (self.body(ha), self.body(hb)) else {
                    continue;
                };
                if a.is_static() && b.is_static() {
                    continue;
                }
                if let Some((manifold, material)) = self.deepest_contact(a, b) {
                    contacts.push(ResolvedContact {
                        a: ha,
                        b: hb,
                        manifold,
                        material,
                    });
                }
            }
        }
        contacts
    }

    fn deepest_contact(&self, a: &Body, b: &Body) -> Option<(Manifold, ContactMaterial)> {
        let mut best: Option<(Manifold, ContactMaterial)> = None;
        for sa in &a.shapes {
            for sb in &b.shapes {
                if !can_collide(sa.group, sa.mask, sb.group, sb.mask) {
                    continue;
                }
                let manifold = match (&sa.geometry, &sb.geometry) {
                    (Geometry::Circle { radius: ra }, Geometry::Circle { radius: rb }) => {
                        circle_circle(a.position, *ra, b.position, *rb)
                    }
                    (Geometry::Circle { radius }, Geometry::Loop { points }) => {
                        let local = a.position - b.position;
                        circle_loop(local, *radius, points)
                    }
                    (Geometry::Loop { points }, Geometry::Circle { radius }) => {
                        let local = b.position - a.position;
                        circle_loop(local, *radius, points).map(|m| Manifold {
                            normal: -m.normal,
                            penetration: m.penetration,
                        })
                    }
                    (Geometry::Loop { .. }, Geometry::Loop { .. }) => None,
                };
                if let Some(m) = manifold {
                    if best.map_or(true, |(current, _)| m.penetration > current.penetration) {
                        best = Some((m, self.materials.get(sa.material, sb.material)));
                    }
                }
            }
        }
        best
    }

    fn resolve(&mut self, contact: &ResolvedContact) {
        let (Some(a), Some(b)) = (self.body(contact.a), self.body(contact.b)) else {
            return;
        };
        let (inv_a, inv_b) = (a.inv_mass(), b.inv_mass());
        let inv_sum = inv_a + inv_b;
        if inv_sum <= 0.0 {
            return;
        }
        let n = contact.manifold.normal;
        let relative = b.velocity - a.velocity;
        let closing = relative.dot(n);

        let mut delta_a = Vec2::ZERO;
        let mut delta_b = Vec2::ZERO;

        if closing < 0.0 {
            let j = -(1.0 + contact.material.restitution) * closing / inv_sum;
            delta_a -= n * (j * inv_a);
            delta_b += n * (j * inv_b);

            let tangent = (relative - n * closing).normalize();
            if tangent != Vec2::ZERO && contact.material.friction > 0.0 {
                let limit = contact.material.friction * j;
                let jt = (-relative.dot(tangent) / inv_sum).clamp(-limit, limit);
                delta_a -= tangent * (jt * inv_a);
                delta_b += tangent * (jt * inv_b);
            }
        }

        let depth = (contact.manifold.penetration - PENETRATION_SLOP).max(0.0);
        let correction = n * (depth * contact.material.stiffness / inv_sum);

        if let Some(a) = self.body_mut(contact.a) {
            a.velocity += delta_a;
            a.position -= correction * inv_a;
        }
        if let Some(b) = self.body_mut(contact.b) {
            b.velocity += delta_b;
            b.position += correction * inv_b;
        }
    }
}
