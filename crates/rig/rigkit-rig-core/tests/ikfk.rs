//! IK/FK chain matching through the switcher feature.

use rigkit_api_core::{ChannelAction, Scene, Transform, Value};
use rigkit_rig::context::ContextKind;
use rigkit_rig::ikfk::{self, MatchTarget, SyncMode};
use rigkit_test_fixtures::{two_arm_rig, wire_ikfk, IkFkFixture, TwoArmRig};

/// Pose the IK chain away from the FK chain so a match has work to do.
fn pose_ik_chain(rig: &mut TwoArmRig, chains: &IkFkFixture) {
    let mut ctx = rig.fixture.ctx();
    for (ix, ik) in chains.ik_chain.iter().enumerate() {
        ctx.scene.match_world_transform(
            *ik,
            &Transform::from_pos([ix as f32, 4.0, 1.0]),
            true,
            false,
        );
    }
    ctx.scene.evaluate();
}

#[test]
fn matching_fk_to_ik_snaps_partners_together() {
    let mut rig = two_arm_rig().unwrap();
    let chains = wire_ikfk(&mut rig.fixture, &rig.left).unwrap();
    pose_ik_chain(&mut rig, &chains);

    rig.fixture.service.current_context = ContextKind::Animate;
    let mut ctx = rig.fixture.ctx();
    ikfk::match_chains(&mut ctx, chains.switcher, MatchTarget::Fk, SyncMode::CurrentTime)
        .unwrap();

    for (fk, ik) in chains.fk_chain.iter().zip(chains.ik_chain.iter()) {
        let matched = ctx.scene.world_transform(*fk).unwrap();
        let reference = ctx.scene.world_transform(*ik).unwrap();
        for axis in 0..3 {
            assert!(
                (matched.pos[axis] - reference.pos[axis]).abs() < 1e-3,
                "axis {axis}: {} vs {}",
                matched.pos[axis],
                reference.pos[axis]
            );
        }
    }

    // the blend snapped to the FK side, keyed
    let time = ctx.scene.time();
    assert_eq!(
        ctx.scene
            .read(chains.switcher, ikfk::CHAN_BLEND, time, ChannelAction::Edit),
        Some(Value::Float(0.0))
    );
    // chain controllers got keyframed so the pose survives scrubbing
    assert!(!ctx
        .scene
        .keyframes(chains.fk_chain[0], "pos.X", ChannelAction::Edit)
        .is_empty());
}

#[test]
fn matching_outside_the_animate_context_is_a_noop() {
    let mut rig = two_arm_rig().unwrap();
    let chains = wire_ikfk(&mut rig.fixture, &rig.left).unwrap();
    pose_ik_chain(&mut rig, &chains);

    // service still sits in the default assembly context
    let mut ctx = rig.fixture.ctx();
    ikfk::match_chains(&mut ctx, chains.switcher, MatchTarget::Fk, SyncMode::CurrentTime)
        .unwrap();

    for fk in &chains.fk_chain {
        assert_eq!(ctx.scene.world_transform(*fk).unwrap().pos, [0.0, 0.0, 0.0]);
    }
    let time = ctx.scene.time();
    assert_eq!(
        ctx.scene
            .read(chains.switcher, ikfk::CHAN_BLEND, time, ChannelAction::Edit),
        Some(Value::Float(1.0))
    );
}

#[test]
fn a_disabled_switcher_never_matches() {
    let mut rig = two_arm_rig().unwrap();
    let chains = wire_ikfk(&mut rig.fixture, &rig.left).unwrap();
    pose_ik_chain(&mut rig, &chains);

    rig.fixture.service.current_context = ContextKind::Animate;
    let mut ctx = rig.fixture.ctx();
    ctx.scene
        .write(
            chains.switcher,
            ikfk::CHAN_ENABLE,
            Value::Bool(false),
            0.0,
            ChannelAction::Setup,
            false,
        )
        .unwrap();
    ikfk::match_chains(&mut ctx, chains.switcher, MatchTarget::Fk, SyncMode::CurrentTime)
        .unwrap();

    for fk in &chains.fk_chain {
        assert_eq!(ctx.scene.world_transform(*fk).unwrap().pos, [0.0, 0.0, 0.0]);
    }
}
