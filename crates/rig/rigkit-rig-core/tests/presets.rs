//! Preset save/load: content round trips, auto-mirroring and envelopes.

use rigkit_api_core::{ChannelAction, Scene, Side, Value};
use rigkit_rig::events::SceneEventArgs;
use rigkit_rig::preset::{self, LoadOptions, PresetPayload};
use rigkit_rig::{item, module, tags, Ctx, RigError};
use rigkit_test_fixtures::two_arm_rig;

fn edit_f32(ctx: &Ctx<'_>, item: rigkit_api_core::ItemId, channel: &str) -> f32 {
    ctx.scene
        .read(item, channel, 0.0, ChannelAction::Edit)
        .and_then(|v| v.as_f32())
        .unwrap()
}

#[test]
fn pose_presets_round_trip_through_a_content_item() {
    let mut rig = two_arm_rig().unwrap();
    let mut ctx = rig.fixture.ctx();
    ctx.scene
        .write(
            rig.left.upper,
            "pos.Y",
            Value::Float(1.25),
            0.0,
            ChannelAction::Edit,
            false,
        )
        .unwrap();

    let doc = preset::save_pose(&mut ctx, Some(rig.left.root), "rest pose");
    assert_eq!(doc.kind, "pose");
    assert_eq!(doc.side, Some(Side::Left));
    // three controllers, six animated channels each
    assert_eq!(doc.channels.len(), 18);

    let content = preset::spawn_content(&mut ctx, &doc).unwrap();
    let restored = preset::doc_from_content(&ctx, content);
    assert_eq!(restored.kind, "pose");
    assert_eq!(restored.side, Some(Side::Left));
    assert_eq!(restored.channels.len(), doc.channels.len());

    let upper_y = restored
        .channels
        .iter()
        .find(|c| c.address.item_name == "upper" && c.address.channel == "pos.Y")
        .unwrap();
    match &upper_y.payload {
        PresetPayload::Static { value, .. } => assert_eq!(*value, Value::Float(1.25)),
        other => panic!("expected a static payload, got {other:?}"),
    }

    item::release_item(&mut ctx, content, true);
    assert!(!ctx.scene.exists(content));
}

#[test]
fn one_sided_presets_mirror_onto_the_opposite_module() {
    let mut rig = two_arm_rig().unwrap();
    let mut ctx = rig.fixture.ctx();
    ctx.scene
        .write(
            rig.left.upper,
            "pos.X",
            Value::Float(2.0),
            0.0,
            ChannelAction::Edit,
            false,
        )
        .unwrap();
    ctx.scene
        .write(
            rig.left.upper,
            "pos.Y",
            Value::Float(0.5),
            0.0,
            ChannelAction::Edit,
            false,
        )
        .unwrap();

    let doc = preset::save_pose(&mut ctx, Some(rig.left.root), "");
    let options = LoadOptions {
        destination: Some(rig.right.root),
        ..LoadOptions::default()
    };
    preset::load(&mut ctx, &doc, &options).unwrap();

    // pos.X negates across the mirror, pos.Y copies through
    assert_eq!(edit_f32(&ctx, rig.right.upper, "pos.X"), -2.0);
    assert_eq!(edit_f32(&ctx, rig.right.upper, "pos.Y"), 0.5);
}

#[test]
fn mirroring_twice_restores_the_original_pose() {
    let mut rig = two_arm_rig().unwrap();
    let mut ctx = rig.fixture.ctx();
    ctx.scene
        .write(
            rig.left.upper,
            "pos.X",
            Value::Float(2.0),
            0.0,
            ChannelAction::Edit,
            false,
        )
        .unwrap();

    let doc = preset::save_pose(&mut ctx, Some(rig.left.root), "");
    preset::load(
        &mut ctx,
        &doc,
        &LoadOptions {
            destination: Some(rig.right.root),
            ..LoadOptions::default()
        },
    )
    .unwrap();
    assert_eq!(edit_f32(&ctx, rig.right.upper, "pos.X"), -2.0);

    let back = preset::save_pose(&mut ctx, Some(rig.right.root), "");
    assert_eq!(back.side, Some(Side::Right));
    preset::load(
        &mut ctx,
        &back,
        &LoadOptions {
            destination: Some(rig.left.root),
            ..LoadOptions::default()
        },
    )
    .unwrap();
    assert_eq!(edit_f32(&ctx, rig.left.upper, "pos.X"), 2.0);
}

#[test]
fn newer_content_warns_but_still_loads() {
    let mut rig = two_arm_rig().unwrap();
    let content = {
        let mut ctx = rig.fixture.ctx();
        ctx.scene
            .write(
                rig.left.upper,
                "pos.Y",
                Value::Float(1.25),
                0.0,
                ChannelAction::Edit,
                false,
            )
            .unwrap();
        let doc = preset::save_pose(&mut ctx, Some(rig.left.root), "");
        ctx.scene
            .write(
                rig.left.upper,
                "pos.Y",
                Value::Float(0.0),
                0.0,
                ChannelAction::Edit,
                false,
            )
            .unwrap();
        let content = preset::spawn_content(&mut ctx, &doc).unwrap();
        // pretend the content came from a future release
        ctx.scene.set_tag(
            content,
            tags::TAG_VERSION,
            Some(&(tags::SYSTEM_VERSION + 1).to_string()),
        );
        content
    };

    let args = SceneEventArgs {
        item: Some(content),
        payload: String::new(),
    };
    preset::drop_content(
        &mut rig.fixture.rig,
        &mut rig.fixture.scene,
        &mut rig.fixture.service,
        &args,
    )
    .unwrap();

    let ctx = rig.fixture.ctx();
    assert!(!ctx.scene.exists(content));
    assert_eq!(edit_f32(&ctx, rig.left.upper, "pos.Y"), 1.25);

    // the gate itself still errors for callers that want to block
    assert!(matches!(
        module::check_version(tags::SYSTEM_VERSION + 1),
        Err(RigError::Version { .. })
    ));
    assert!(module::check_version(tags::SYSTEM_VERSION).is_ok());
}

#[test]
fn action_presets_capture_edit_envelopes() {
    let mut rig = two_arm_rig().unwrap();
    let mut ctx = rig.fixture.ctx();
    for (time, value) in [(1.0, 0.25), (2.0, 0.75)] {
        ctx.scene
            .write(
                rig.left.upper,
                "pos.Z",
                Value::Float(value),
                time,
                ChannelAction::Edit,
                true,
            )
            .unwrap();
    }

    let doc = preset::save_action(&mut ctx, Some(rig.left.root), "wave");
    assert_eq!(doc.kind, "action");
    let upper_z = doc
        .channels
        .iter()
        .find(|c| c.address.item_name == "upper" && c.address.channel == "pos.Z")
        .unwrap();
    match &upper_z.payload {
        PresetPayload::Envelope { keys } => {
            assert_eq!(keys.len(), 2);
            assert_eq!(keys[0], (1.0, Value::Float(0.25)));
            assert_eq!(keys[1], (2.0, Value::Float(0.75)));
        }
        other => panic!("expected an envelope payload, got {other:?}"),
    }
    // unkeyed channels stay static
    let upper_x = doc
        .channels
        .iter()
        .find(|c| c.address.item_name == "upper" && c.address.channel == "pos.X")
        .unwrap();
    assert!(matches!(upper_x.payload, PresetPayload::Static { .. }));
}
