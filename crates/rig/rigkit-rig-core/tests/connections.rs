//! Plug/socket connections, transform links and the guide-apply pipeline.

use rigkit_api_core::{Scene, Transform};
use rigkit_rig::link::{self, LinkType};
use rigkit_rig::{apply, plug, EventKind, RigError};
use rigkit_test_fixtures::{two_arm_rig, EventRecorder};

#[test]
fn connecting_a_plug_swaps_out_the_previous_socket() {
    let mut rig = two_arm_rig().unwrap();
    let log = EventRecorder::install(
        &mut rig.fixture.service,
        &[EventKind::PlugConnected, EventKind::PlugDisconnected],
    );

    let mut ctx = rig.fixture.ctx();
    assert_eq!(
        plug::connected_socket(&ctx, rig.left.plug),
        Some(rig.torso.socket)
    );
    plug::connect_to_socket(&mut ctx, rig.left.plug, rig.right.socket).unwrap();

    assert_eq!(
        plug::connected_socket(&ctx, rig.left.plug),
        Some(rig.right.socket)
    );
    assert_eq!(
        ctx.scene
            .graph_forward(rigkit_rig::tags::GRAPH_PLUG_SOCKET, rig.left.plug),
        vec![rig.right.socket]
    );
    assert_eq!(
        *log.lock().unwrap(),
        vec![EventKind::PlugDisconnected, EventKind::PlugConnected]
    );
}

#[test]
fn same_module_connection_is_a_silent_noop() {
    let mut rig = two_arm_rig().unwrap();
    let log = EventRecorder::install(
        &mut rig.fixture.service,
        &[EventKind::PlugConnected, EventKind::PlugDisconnected],
    );

    let mut ctx = rig.fixture.ctx();
    plug::connect_to_socket(&mut ctx, rig.left.plug, rig.left.socket).unwrap();

    assert_eq!(
        plug::connected_socket(&ctx, rig.left.plug),
        Some(rig.torso.socket)
    );
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn a_link_cannot_drive_itself() {
    let mut rig = two_arm_rig().unwrap();
    let mut ctx = rig.fixture.ctx();
    let err = link::new_link(
        &mut ctx,
        rig.left.upper,
        rig.left.upper,
        LinkType::DynaParent,
        false,
    )
    .unwrap_err();
    assert!(matches!(err, RigError::InvalidArgument(_)));
}

#[test]
fn guide_apply_runs_phases_in_order() {
    let mut rig = two_arm_rig().unwrap();
    let log = EventRecorder::install(
        &mut rig.fixture.service,
        &[
            EventKind::GuideApplyInit,
            EventKind::GuideApplyItemScan,
            EventKind::GuideApplyPre,
            EventKind::GuideApplyPost,
            EventKind::GuideApplyPost2,
        ],
    );

    let mut ctx = rig.fixture.ctx();
    apply::guide_apply(&mut ctx).unwrap();

    let log = log.lock().unwrap();
    let n = log.len();
    assert!(n > 4);
    assert_eq!(log[0], EventKind::GuideApplyInit);
    assert_eq!(log[n - 3], EventKind::GuideApplyPre);
    assert_eq!(log[n - 2], EventKind::GuideApplyPost);
    assert_eq!(log[n - 1], EventKind::GuideApplyPost2);
    assert!(log[1..n - 3]
        .iter()
        .all(|k| *k == EventKind::GuideApplyItemScan));
}

#[test]
fn guide_apply_audits_the_link_lifecycle() {
    let mut rig = two_arm_rig().unwrap();
    let mut ctx = rig.fixture.ctx();
    apply::guide_apply(&mut ctx).unwrap();

    let bag = &ctx.rig.apply_bag;
    assert_eq!(bag.links, vec![rig.left.plug]);
    assert_eq!(bag.deactivated, bag.links);
    assert_eq!(bag.rest_updated, bag.links);
    assert_eq!(bag.reactivated, bag.links);
    assert_eq!(bag.plugs, vec![rig.left.plug]);
    // the link came back on
    assert!(link::link_of(&ctx, rig.left.plug).unwrap().active);
}

#[test]
fn guide_apply_is_idempotent() {
    let mut rig = two_arm_rig().unwrap();
    let controllers = [rig.left.upper, rig.left.lower, rig.left.hand];

    let first: Vec<Transform> = {
        let mut ctx = rig.fixture.ctx();
        apply::guide_apply(&mut ctx).unwrap();
        controllers
            .iter()
            .map(|c| ctx.scene.world_transform(*c).unwrap())
            .collect()
    };
    let second: Vec<Transform> = {
        let mut ctx = rig.fixture.ctx();
        apply::guide_apply(&mut ctx).unwrap();
        controllers
            .iter()
            .map(|c| ctx.scene.world_transform(*c).unwrap())
            .collect()
    };

    for (a, b) in first.iter().zip(second.iter()) {
        for axis in 0..3 {
            assert!((a.pos[axis] - b.pos[axis]).abs() < 1e-4);
            assert!((a.rot[axis] - b.rot[axis]).abs() < 1e-4);
        }
    }
    // controllers landed on their guides
    assert!((first[0].pos[0] - 1.0).abs() < 1e-4);
    assert!((first[2].pos[0] - 3.0).abs() < 1e-4);
}

#[test]
fn guide_apply_caches_the_plug_parent_offset() {
    let mut rig = two_arm_rig().unwrap();
    let mut ctx = rig.fixture.ctx();
    apply::guide_apply(&mut ctx).unwrap();

    // plug at the module origin, socket at [0.5, 3.0, 0.0]
    let (pos, rot) = plug::cached_offset(&ctx, rig.left.plug);
    assert_ne!(pos, [0.0, 0.0, 0.0]);
    assert!((pos[0] - -0.5).abs() < 1e-4);
    assert!((pos[1] - -3.0).abs() < 1e-4);
    assert!((pos[2]).abs() < 1e-4);
    assert_eq!(rot, [0.0, 0.0, 0.0]);
}
