//! Simulated user activity.

use glam::Vec3;
use holoshare_core::{ObjectId, ObjectKind, Transform};
use holoshare_harness::World;
use rand::{Rng, seq::IteratorRandom};
use tracing::info;

use crate::DemoError;

/// One user gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    /// Place a new primitive.
    Spawn,
    /// Drag an existing object.
    Move,
    /// Remove an existing object.
    Delete,
}

impl Gesture {
    fn pick<R: Rng>(rng: &mut R, scene_is_empty: bool) -> Self {
        if scene_is_empty {
            return Self::Spawn;
        }
        match rng.gen_range(0..10) {
            0..=2 => Self::Spawn,
            3..=8 => Self::Move,
            _ => Self::Delete,
        }
    }
}

fn random_position<R: Rng>(rng: &mut R) -> Vec3 {
    Vec3::new(rng.gen_range(-2.0..2.0), rng.gen_range(0.0..2.0), rng.gen_range(-2.0..2.0))
}

/// Have the user at `client` do something to their scene.
pub fn act<R: Rng>(world: &mut World, client: usize, rng: &mut R) -> Result<Gesture, DemoError> {
    let ids = world.client(client).ids();
    let gesture = Gesture::pick(rng, ids.is_empty());
    let target = ids.into_iter().choose(rng);
    let user = world.client_mut(client);

    match (gesture, target) {
        (Gesture::Move, Some(object_id)) => {
            let position = random_position(rng);
            user.move_object(&object_id, position);
            info!(user = user.name(), %object_id, ?position, "move");
        },
        (Gesture::Delete, Some(object_id)) => {
            user.delete(&ObjectId::new(object_id.clone())?);
            info!(user = user.name(), %object_id, "delete");
        },
        _ => {
            let kind = ObjectKind::ALL[rng.gen_range(0..ObjectKind::ALL.len())];
            let transform = Transform::spawn_default(kind, random_position(rng))?;
            let object_id = user.spawn_new(kind, transform)?;
            info!(user = user.name(), %object_id, %kind, "spawn");
            return Ok(Gesture::Spawn);
        },
    }
    Ok(gesture)
}
