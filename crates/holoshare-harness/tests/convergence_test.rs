//! Multi-client replication scenarios over the in-process broker.
//!
//! Every client runs the production connection and replica; only the broker
//! and the scene are simulated.

use glam::Vec3;
use holoshare_core::{ObjectId, ObjectKind, Transform};
use holoshare_harness::{Delivery, MemoryBroker, World};

fn id(s: &str) -> ObjectId {
    ObjectId::new(s).unwrap()
}

fn cube_at(position: Vec3) -> Transform {
    Transform::spawn_default(ObjectKind::Cube, position).unwrap()
}

fn pair(seed: u64) -> World {
    let mut world = World::new(seed);
    world.add_client("a").unwrap();
    world.add_client("b").unwrap();
    world
}

#[test]
fn spawn_then_move_reaches_peer() {
    let mut world = pair(1);

    world.client_mut(0).spawn(ObjectKind::Cube, id("c1"), cube_at(Vec3::ZERO)).unwrap();
    assert!(world.client_mut(0).move_object("c1", Vec3::new(1.0, 0.0, 0.0)));

    let reports = world.tick_all();
    assert_eq!(reports[0].published, 1);
    // a ticks first, so b's queue already holds Create then Manipulate.
    assert_eq!(reports[1].spawned, 1);
    assert_eq!(reports[1].moved, 1);
    assert_eq!(reports[1].published, 0);

    let b = world.client(1);
    assert_eq!(b.transform_of("c1").unwrap().position(), Vec3::new(1.0, 0.0, 0.0));
    assert_eq!(b.replica().entry("c1").unwrap().kind(), ObjectKind::Cube);

    assert!(world.settle(5).is_some());
    assert!(world.converged());
}

#[test]
fn quiet_world_publishes_nothing() {
    let mut world = pair(2);
    world.client_mut(0).spawn(ObjectKind::Sphere, id("s1"), cube_at(Vec3::Y)).unwrap();
    world.settle(5).unwrap();

    let published = world.broker().published();
    for _ in 0..3 {
        assert!(world.tick_all().iter().all(|report| report.is_quiescent()));
    }
    assert_eq!(world.broker().published(), published);
}

#[test]
fn delete_wins_over_late_manipulate() {
    let mut world = pair(3);
    world.client_mut(0).spawn(ObjectKind::Cube, id("c1"), cube_at(Vec3::ZERO)).unwrap();
    world.settle(5).unwrap();

    // a's move is published into b's queue, then b deletes before ticking.
    world.client_mut(0).move_object("c1", Vec3::X);
    world.client_mut(0).tick();
    assert!(world.client_mut(1).delete(&id("c1")));

    let b_report = world.client_mut(1).tick();
    assert_eq!(b_report.unknown_manipulates, 1);

    let a_report = world.client_mut(0).tick();
    assert_eq!(a_report.deleted, 1);
    assert_eq!(a_report.published, 0);

    assert!(world.settle(5).is_some());
    assert!(world.client(0).ids().is_empty());
    assert!(world.converged());
}

#[test]
fn remote_delete_is_not_echoed_back() {
    let mut world = pair(4);
    world.client_mut(0).spawn(ObjectKind::Skeleton, id("k1"), cube_at(Vec3::ZERO)).unwrap();
    world.settle(5).unwrap();

    let before = world.broker().published();
    world.client_mut(0).delete(&id("k1"));
    world.settle(5).unwrap();

    assert_eq!(world.broker().published(), before + 1);
    assert!(world.converged());
}

#[test]
fn own_messages_never_reach_own_queue() {
    let mut world = pair(5);
    world.client_mut(0).spawn(ObjectKind::Cube, id("c1"), cube_at(Vec3::ZERO)).unwrap();

    // Delivered to both subscribers, publisher included.
    assert_eq!(world.broker().delivered(), 2);
    assert!(world.client(0).connection().inbound().is_empty());
    assert_eq!(world.client(1).connection().inbound().len(), 1);
}

#[test]
fn duplicate_delivery_is_idempotent() {
    let mut world = pair(6);
    world.broker().duplicate_deliveries(true);

    world.client_mut(0).spawn(ObjectKind::Cube, id("c1"), cube_at(Vec3::ZERO)).unwrap();
    let report = world.client_mut(1).tick();
    assert_eq!(report.spawned, 1);
    assert_eq!(report.duplicate_creates, 1);

    world.client_mut(0).delete(&id("c1"));
    let report = world.client_mut(1).tick();
    assert_eq!(report.deleted, 1);
    assert_eq!(report.unknown_deletes, 1);

    assert_eq!(world.client(1).replica().factory().spawned(), 1);
    assert!(world.converged());
}

#[test]
fn lost_create_is_an_accepted_gap() {
    let mut world = pair(7);
    world.broker().drop_next(1);

    world.client_mut(0).spawn(ObjectKind::Cube, id("c1"), cube_at(Vec3::ZERO)).unwrap();
    world.client_mut(0).move_object("c1", Vec3::Z);
    let reports = world.tick_all();

    assert_eq!(reports[1].unknown_manipulates, 1);
    assert!(world.client(1).ids().is_empty());
    assert!(world.settle(5).is_some());
    assert!(!world.converged());
}

#[test]
fn concurrent_moves_resolve_in_arrival_order() {
    let mut world = pair(8);
    world.client_mut(0).spawn(ObjectKind::Cube, id("c1"), cube_at(Vec3::ZERO)).unwrap();
    world.settle(5).unwrap();

    world.client_mut(0).move_object("c1", Vec3::X);
    world.client_mut(1).move_object("c1", Vec3::Y);

    // a publishes first; b applies it before its own detect phase, so b's
    // pending edit is overwritten and never sent.
    let reports = world.tick_all();
    assert_eq!(reports[0].published, 1);
    assert_eq!(reports[1].moved, 1);
    assert_eq!(reports[1].published, 0);

    world.settle(5).unwrap();
    assert!(world.converged());
    assert_eq!(world.client(1).transform_of("c1").unwrap().position(), Vec3::X);
}

#[test]
fn deferred_delivery_preserves_publish_order() {
    let mut world = World::with_broker(MemoryBroker::with_delivery(Delivery::Deferred), 9);
    world.add_client("a").unwrap();
    world.add_client("b").unwrap();

    world.client_mut(0).spawn(ObjectKind::Sphere, id("s1"), cube_at(Vec3::ZERO)).unwrap();
    world.client_mut(0).move_object("s1", Vec3::new(0.5, 0.25, 0.0));
    world.client_mut(0).tick();

    assert!(world.client(1).ids().is_empty());
    assert_eq!(world.broker().in_flight(), 2);

    assert_eq!(world.broker().flush(), 2);
    let report = world.client_mut(1).tick();
    assert_eq!(report.spawned, 1);
    assert_eq!(report.moved, 1);

    assert!(world.settle(5).is_some());
    assert!(world.converged());
}

#[test]
fn generated_ids_replicate() {
    let mut world = pair(10);
    world.add_client("c").unwrap();

    let mut spawned = Vec::new();
    for (index, kind) in ObjectKind::ALL.into_iter().enumerate() {
        let transform = Transform::spawn_default(kind, Vec3::splat(index as f32)).unwrap();
        spawned.push(world.client_mut(index).spawn_new(kind, transform).unwrap());
    }
    world.settle(5).unwrap();

    assert!(world.converged());
    let ids = world.client(2).ids();
    assert_eq!(ids.len(), 3);
    for object_id in &spawned {
        assert!(ids.contains(object_id.as_str()));
    }
}
