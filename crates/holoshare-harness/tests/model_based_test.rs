//! Model-based property tests.
//!
//! Random sequences of local edits are applied both to a plain map (the
//! reference scene) and to a world of real clients. After every operation the
//! world is allowed to settle; every client must then hold exactly the
//! reference scene and further ticks must publish nothing.
//!
//! Delivery is immediate so that all clients see one global order of
//! messages. Under reordering, concurrent creates and deletes of the same id
//! may legitimately leave clients apart.

use std::collections::BTreeMap;

use glam::Vec3;
use holoshare_core::{ObjectId, ObjectKind, ReplicaError, Transform};
use holoshare_harness::World;
use proptest::prelude::*;

const CLIENTS: usize = 3;
const SLOTS: u8 = 6;

#[derive(Debug, Clone)]
enum Operation {
    Spawn { client: usize, slot: u8, kind: ObjectKind, position: Vec3 },
    Move { client: usize, slot: u8, position: Vec3 },
    Delete { client: usize, slot: u8 },
    Idle,
}

fn slot_id(slot: u8) -> String {
    format!("obj-{slot}")
}

fn coordinate() -> impl Strategy<Value = f32> {
    // Binary fractions survive the decimal wire format exactly.
    (-4096i32..4096).prop_map(|n| n as f32 / 16.0)
}

fn position() -> impl Strategy<Value = Vec3> {
    (coordinate(), coordinate(), coordinate()).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn kind() -> impl Strategy<Value = ObjectKind> {
    prop::sample::select(ObjectKind::ALL.to_vec())
}

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        3 => (0..CLIENTS, 0..SLOTS, kind(), position())
            .prop_map(|(client, slot, kind, position)| Operation::Spawn { client, slot, kind, position }),
        4 => (0..CLIENTS, 0..SLOTS, position())
            .prop_map(|(client, slot, position)| Operation::Move { client, slot, position }),
        2 => (0..CLIENTS, 0..SLOTS).prop_map(|(client, slot)| Operation::Delete { client, slot }),
        1 => Just(Operation::Idle),
    ]
}

/// Reference scene: kind and position per id.
type Model = BTreeMap<String, (ObjectKind, Vec3)>;

fn apply(world: &mut World, model: &mut Model, op: &Operation) -> Result<(), TestCaseError> {
    match op {
        Operation::Spawn { client, slot, kind, position } => {
            let object_id = ObjectId::new(slot_id(*slot)).unwrap();
            let transform = Transform::spawn_default(*kind, *position).unwrap();
            let result = world.client_mut(*client).spawn(*kind, object_id.clone(), transform);
            if model.contains_key(object_id.as_str()) {
                prop_assert_eq!(result, Err(ReplicaError::DuplicateObject(object_id)));
            } else {
                prop_assert_eq!(result, Ok(()));
                model.insert(slot_id(*slot), (*kind, *position));
            }
        },
        Operation::Move { client, slot, position } => {
            let moved = world.client_mut(*client).move_object(&slot_id(*slot), *position);
            prop_assert_eq!(moved, model.contains_key(&slot_id(*slot)));
            if let Some((_, current)) = model.get_mut(&slot_id(*slot)) {
                *current = *position;
            }
        },
        Operation::Delete { client, slot } => {
            let object_id = ObjectId::new(slot_id(*slot)).unwrap();
            let deleted = world.client_mut(*client).delete(&object_id);
            prop_assert_eq!(deleted, model.remove(&slot_id(*slot)).is_some());
        },
        Operation::Idle => {},
    }
    Ok(())
}

fn assert_matches_model(world: &World, model: &Model) -> Result<(), TestCaseError> {
    for client in world.clients() {
        let scene: Model = client
            .snapshot()
            .into_iter()
            .map(|(id, (kind, transform))| (id, (kind, transform.position())))
            .collect();
        prop_assert_eq!(&scene, model, "client {} diverged from model", client.name());
    }
    Ok(())
}

fn run(ops: &[Operation], seed: u64, duplicate: bool) -> Result<(), TestCaseError> {
    let mut world = World::new(seed);
    for name in ["a", "b", "c"] {
        world.add_client(name).unwrap();
    }
    world.broker().duplicate_deliveries(duplicate);

    let mut model = Model::new();
    for op in ops {
        apply(&mut world, &mut model, op)?;
        prop_assert!(world.settle(8).is_some(), "world did not settle after {:?}", op);
        assert_matches_model(&world, &model)?;
        prop_assert!(world.converged());
    }

    for report in world.tick_all() {
        prop_assert!(report.is_quiescent(), "idle tick was not quiescent: {:?}", report);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn clients_converge_on_reference_scene(
        ops in prop::collection::vec(operation(), 1..40),
        seed in any::<u64>(),
    ) {
        run(&ops, seed, false)?;
    }

    #[test]
    fn duplicate_delivery_does_not_affect_convergence(
        ops in prop::collection::vec(operation(), 1..40),
        seed in any::<u64>(),
    ) {
        run(&ops, seed, true)?;
    }
}
