//! Item, setup and standardisation lifecycle over a small two-arm rig.

use rigkit_api_core::{ChannelAction, ChannelType, Scene, Value};
use rigkit_rig::{elements, item, resolution, setup, standardize, tags, EventKind, SideMode};
use rigkit_test_fixtures::{add_arm, two_arm_rig, EventRecorder, RigFixture};

#[test]
fn locator_members_stay_under_their_setup_root() {
    let rig = two_arm_rig().unwrap();
    let scene = &rig.fixture.scene;
    for s in rig.fixture.rig.setups.iter() {
        for member in &s.members {
            let locator = scene
                .host_type(*member)
                .map(|t| t.is_locator())
                .unwrap_or(false);
            if locator {
                assert!(
                    setup::in_hierarchy(scene, s.root, *member),
                    "member {member:?} of '{}' escaped its setup root",
                    s.identifier
                );
            }
        }
    }
}

#[test]
fn adding_to_another_setup_transfers_the_item() {
    let mut rig = two_arm_rig().unwrap();
    let (left_setup, right_setup) = {
        let modules = &rig.fixture.rig.modules;
        (
            modules.get(&rig.left.root).unwrap().setup,
            modules.get(&rig.right.root).unwrap().setup,
        )
    };
    let item_id = {
        let mut ctx = rig.fixture.ctx();
        item::create_item(
            &mut ctx,
            tags::TYPE_CONTROLLER,
            "extra",
            SideMode::InheritModule,
            Some(left_setup),
        )
        .unwrap()
    };

    let log = EventRecorder::install(
        &mut rig.fixture.service,
        &[EventKind::ItemRemoved, EventKind::ItemAdded],
    );
    let mut ctx = rig.fixture.ctx();
    setup::add_item(&mut ctx, right_setup, item_id, false);

    // the old home hears about the removal before the new one adds
    assert_eq!(
        *log.lock().unwrap(),
        vec![EventKind::ItemRemoved, EventKind::ItemAdded]
    );
    assert_eq!(
        ctx.rig.items.get(&item_id).and_then(|r| r.setup),
        Some(right_setup)
    );
    assert!(!ctx
        .rig
        .setups
        .get(left_setup)
        .unwrap()
        .members
        .contains(&item_id));
    assert!(ctx
        .rig
        .setups
        .get(right_setup)
        .unwrap()
        .members
        .contains(&item_id));
    let right_root = ctx.rig.setups.get(right_setup).unwrap().root;
    assert!(setup::in_hierarchy(ctx.scene, right_root, item_id));
}

#[test]
fn self_validate_reattaches_escaped_locators() {
    let mut rig = two_arm_rig().unwrap();
    let left_setup = rig.fixture.rig.modules.get(&rig.left.root).unwrap().setup;
    let mut ctx = rig.fixture.ctx();
    let setup_root = ctx.rig.setups.get(left_setup).unwrap().root;

    // yank the controller out from under its setup root
    let rig_root = ctx.rig.root;
    ctx.scene.set_parent(rig.left.upper, Some(rig_root));
    assert!(!setup::in_hierarchy(ctx.scene, setup_root, rig.left.upper));

    setup::self_validate(&mut ctx, left_setup);
    assert_eq!(ctx.scene.parent(rig.left.upper), Some(setup_root));
    assert!(setup::in_hierarchy(ctx.scene, setup_root, rig.left.upper));
}

#[test]
fn releasing_an_item_forgets_the_record_but_keeps_the_host_item() {
    let mut rig = two_arm_rig().unwrap();
    let upper = rig.left.upper;
    let left_setup = rig.fixture.rig.modules.get(&rig.left.root).unwrap().setup;

    let mut ctx = rig.fixture.ctx();
    item::release_item(&mut ctx, upper, false);

    assert!(!ctx.rig.items.contains_key(&upper));
    assert!(ctx.scene.exists(upper));
    assert!(!ctx
        .rig
        .setups
        .get(left_setup)
        .unwrap()
        .members
        .contains(&upper));
}

#[test]
fn standardize_strips_rig_data_but_keeps_channel_connections() {
    let mut rig = two_arm_rig().unwrap();
    let (upper, lower, plug) = (rig.left.upper, rig.left.lower, rig.left.plug);
    {
        let mut ctx = rig.fixture.ctx();
        ctx.scene
            .add_channel(lower, "follow", ChannelType::Float, Value::Float(0.0))
            .unwrap();
        ctx.scene.link((upper, "pos.X"), (lower, "follow")).unwrap();
    }

    let mut ctx = rig.fixture.ctx();
    standardize::standardize_rig(&mut ctx, false);

    assert!(ctx.rig.items.is_empty());
    assert!(ctx.rig.links.is_empty());
    assert_eq!(
        ctx.scene.links_into(lower, "follow"),
        vec![(upper, "pos.X".to_string())]
    );
    assert!(ctx.scene.tag(upper, tags::TAG_ITEM_TYPE).is_none());
    assert!(ctx.scene.tag(upper, tags::TAG_FEATURES).is_none());
    assert!(ctx
        .scene
        .graph_forward(tags::GRAPH_PLUG_SOCKET, plug)
        .is_empty());
    // the host hierarchy survives untouched
    assert!(ctx.scene.exists(upper));
    assert!(ctx.scene.parent(upper).is_some());
}

#[test]
fn reference_names_mirror_across_sides() {
    let mut rig = two_arm_rig().unwrap();
    let upper = rig.left.upper;
    let chest = rig.torso.chest;
    let ctx = rig.fixture.ctx();

    assert_eq!(item::reference_name(&ctx, upper), "L:Arm.upper");
    assert_eq!(item::mirrored_reference_name(&ctx, upper), "R:Arm.upper");
    // center names never flip
    assert_eq!(item::reference_name(&ctx, chest), "C:Torso.chest");
    assert_eq!(item::mirrored_reference_name(&ctx, chest), "C:Torso.chest");
}

#[test]
fn resolutions_default_to_everything_visible() {
    let mut f = RigFixture::new("Solo").unwrap();
    let arm = add_arm(&mut f, "Arm", rigkit_api_core::Side::Left).unwrap();
    let mut ctx = f.ctx();

    // no resolutions at all: every item is a member
    assert!(resolution::is_member(&ctx, arm.upper, None));

    resolution::add(&mut ctx, "high", false).unwrap();
    resolution::add(&mut ctx, "low", false).unwrap();
    // the first added resolution became current
    assert_eq!(resolution::current(&ctx).as_deref(), Some("high"));
    // unrestricted items belong to every resolution
    assert!(resolution::is_member(&ctx, arm.upper, Some("high")));

    resolution::set_membership(&mut ctx, arm.upper, &["low".to_string()]);
    assert!(!resolution::is_member(&ctx, arm.upper, Some("high")));
    assert!(resolution::is_member(&ctx, arm.upper, Some("low")));

    resolution::set_current(&mut ctx, "low").unwrap();
    resolution::remove(&mut ctx, "low").unwrap();
    assert_eq!(resolution::current(&ctx).as_deref(), Some("high"));

    resolution::set_membership(&mut ctx, arm.lower, &["high".to_string()]);
    resolution::rename(&mut ctx, "high", "render").unwrap();
    assert_eq!(resolution::current(&ctx).as_deref(), Some("render"));
    // memberships follow renames
    assert_eq!(
        resolution::membership(&ctx, arm.lower),
        vec!["render".to_string()]
    );
    assert!(resolution::is_member(&ctx, arm.lower, Some("render")));
}

#[test]
fn visibility_reset_reaches_members_outside_the_current_resolution() {
    let mut f = RigFixture::new("Meshy").unwrap();
    let arm = add_arm(&mut f, "Arm", rigkit_api_core::Side::Left).unwrap();
    let setup = f.rig.modules.get(&arm.root).unwrap().setup;
    let mut ctx = f.ctx();

    let body = item::create_item(
        &mut ctx,
        tags::TYPE_BIND_MESH,
        "body",
        SideMode::InheritModule,
        Some(setup),
    )
    .unwrap();
    let cloth = item::create_item(
        &mut ctx,
        tags::TYPE_BIND_MESH,
        "cloth",
        SideMode::InheritModule,
        Some(setup),
    )
    .unwrap();
    resolution::add(&mut ctx, "high", true).unwrap();
    resolution::add(&mut ctx, "low", false).unwrap();
    resolution::set_membership(&mut ctx, cloth, &["low".to_string()]);

    let visible = |ctx: &rigkit_rig::Ctx<'_>, item| {
        ctx.scene.read(item, "visible", 0.0, ChannelAction::Setup)
    };

    // hiding the set leaves the out-of-resolution mesh alone
    elements::set_visible(&mut ctx, "bindMeshes", false).unwrap();
    assert_eq!(visible(&ctx, body), Some(Value::Bool(false)));
    assert_eq!(visible(&ctx, cloth), Some(Value::Bool(true)));

    // the reset restores the set default on every member
    ctx.scene
        .write(
            cloth,
            "visible",
            Value::Bool(false),
            0.0,
            ChannelAction::Setup,
            false,
        )
        .unwrap();
    elements::reset_visible(&mut ctx, "bindMeshes");
    assert_eq!(visible(&ctx, body), Some(Value::Bool(true)));
    assert_eq!(visible(&ctx, cloth), Some(Value::Bool(true)));
}
