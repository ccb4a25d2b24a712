//! Module construction, symmetry, mirror groups and serial piece chains.

use rigkit_api_core::{ChannelAction, ItemId, Scene, Side, Transform, Value};
use rigkit_rig::piece::{self, PieceFactory};
use rigkit_rig::{elements, item, module, tags, Ctx, Piece, RigError, SideMode};
use rigkit_test_fixtures::{two_arm_rig, RigFixture};

fn read_setup_f32(ctx: &Ctx<'_>, item: ItemId, channel: &str) -> f32 {
    ctx.scene
        .read(item, channel, 0.0, ChannelAction::Setup)
        .and_then(|v| v.as_f32())
        .unwrap()
}

#[test]
fn module_side_channels_follow_the_side() {
    let mut f = RigFixture::new("Sides").unwrap();
    let mut ctx = f.ctx();
    let right = module::new_module(&mut ctx, "arm", "Arm", Side::Right).unwrap();
    let center = module::new_module(&mut ctx, "spine", "Spine", Side::Center).unwrap();

    assert_eq!(read_setup_f32(&ctx, right, "side.factor"), -1.0);
    assert_eq!(read_setup_f32(&ctx, right, "mirror.angle"), 180.0);
    assert_eq!(read_setup_f32(&ctx, center, "side.factor"), 1.0);
    assert_eq!(read_setup_f32(&ctx, center, "mirror.angle"), 0.0);

    module::set_side(&mut ctx, right, Side::Left).unwrap();
    assert_eq!(read_setup_f32(&ctx, right, "side.factor"), 1.0);
    assert_eq!(read_setup_f32(&ctx, right, "mirror.angle"), 180.0);
}

#[test]
fn symmetry_requires_opposite_lateral_sides() {
    let mut rig = two_arm_rig().unwrap();
    let mut ctx = rig.fixture.ctx();

    // the fixture already paired the arms
    assert_eq!(
        ctx.rig.modules.get(&rig.left.root).unwrap().symmetry,
        Some(rig.right.root)
    );
    assert_eq!(
        ctx.rig.modules.get(&rig.right.root).unwrap().symmetry,
        Some(rig.left.root)
    );

    let err = module::set_symmetric_module(&mut ctx, rig.left.root, rig.torso.root).unwrap_err();
    assert!(matches!(err, RigError::InvalidArgument(_)));

    module::clear_symmetry(&mut ctx, rig.left.root);
    assert!(ctx.rig.modules.get(&rig.left.root).unwrap().symmetry.is_none());
    assert!(ctx.rig.modules.get(&rig.right.root).unwrap().symmetry.is_none());
}

#[test]
fn mirror_groups_negate_their_member_channels() {
    let mut rig = two_arm_rig().unwrap();
    let setup = rig.fixture.rig.modules.get(&rig.left.root).unwrap().setup;
    let mut ctx = rig.fixture.ctx();

    let group = item::create_item(
        &mut ctx,
        tags::TYPE_MIRROR_GROUP,
        "mirror",
        SideMode::InheritModule,
        Some(setup),
    )
    .unwrap();
    let flip = item::create_item(
        &mut ctx,
        tags::TYPE_CONTROLLER,
        "flip",
        SideMode::InheritModule,
        Some(setup),
    )
    .unwrap();
    module::add_to_mirror_group(&mut ctx, group, flip);
    ctx.scene
        .write(
            flip,
            "pos.X",
            Value::Float(2.0),
            0.0,
            ChannelAction::Setup,
            false,
        )
        .unwrap();

    module::mirror_key_channels(&mut ctx, rig.left.root).unwrap();

    assert_eq!(read_setup_f32(&ctx, flip, "pos.X"), -2.0);
    assert_eq!(
        ctx.scene.read(flip, "visible", 0.0, ChannelAction::Setup),
        Some(Value::Bool(false))
    );
    // items outside the group are untouched
    assert_eq!(
        ctx.scene.read(rig.left.upper, "visible", 0.0, ChannelAction::Setup),
        Some(Value::Bool(true))
    );
}

fn build_segment(ctx: &mut Ctx<'_>, module_root: ItemId, index: u32) -> rigkit_rig::Result<Piece> {
    let mut p = piece::new_piece(ctx, module_root, &format!("segment{index}"), index)?;
    let ctrl = item::create_item(
        ctx,
        tags::TYPE_CONTROLLER,
        "seg#",
        SideMode::InheritModule,
        Some(p.setup),
    )?;
    let guide = item::create_item(
        ctx,
        tags::TYPE_CONTROLLER_GUIDE,
        "seg#Guide",
        SideMode::InheritModule,
        Some(p.setup),
    )?;
    p.key_items.insert("segCtrl".to_string(), ctrl);
    p.key_items.insert("segGuide".to_string(), guide);
    Ok(p)
}

fn segment_factory() -> PieceFactory {
    let mut factory = PieceFactory::new("segment", build_segment);
    factory.guide_key = Some("segGuide".to_string());
    factory
}

#[test]
fn serial_pieces_install_number_and_shrink() {
    let mut rig = two_arm_rig().unwrap();
    rig.fixture
        .service
        .registry
        .register(Box::new(segment_factory()));
    {
        // give the guide chain a span to fit against
        let mut ctx = rig.fixture.ctx();
        ctx.scene.set_local_transform(
            rig.left.upper,
            &Transform::from_pos([1.0, 2.0, 0.0]),
            ChannelAction::Setup,
            false,
        );
        ctx.scene.set_local_transform(
            rig.left.hand,
            &Transform::from_pos([3.0, 2.0, 0.0]),
            ChannelAction::Setup,
            false,
        );
        ctx.scene.evaluate();
    }

    let mut ctx = rig.fixture.ctx();
    piece::install_serial_pieces(&mut ctx, rig.left.root, 3, "segment").unwrap();

    let pieces: Vec<Piece> = ctx
        .rig
        .modules
        .get(&rig.left.root)
        .unwrap()
        .pieces
        .clone();
    assert_eq!(pieces.len(), 3);
    assert_eq!(
        pieces.iter().map(|p| p.index).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    // serial numbers show up in rendered names
    let second_ctrl = pieces[1].key_items["segCtrl"];
    assert_eq!(ctx.scene.name(second_ctrl).unwrap(), "L_Arm_seg2_ctrl");

    // counts persisted on the rig sub-assembly
    let rig_asm = ctx.rig.modules.get(&rig.left.root).unwrap().rig_assembly;
    assert_eq!(
        ctx.scene
            .read(rig_asm, piece::CHAN_PIECE_COUNT, 0.0, ChannelAction::Setup),
        Some(Value::Int(3))
    );
    assert_eq!(
        ctx.scene.read(
            rig_asm,
            piece::CHAN_PIECE_LAST_SERIAL,
            0.0,
            ChannelAction::Setup
        ),
        Some(Value::Int(3))
    );

    // guides fitted linearly between chainStart and chainEnd
    for (ix, p) in pieces.iter().enumerate() {
        let guide = p.key_items["segGuide"];
        let world = ctx.scene.world_transform(guide).unwrap();
        let expected_x = 1.0 + 2.0 * (ix as f32 + 1.0) / 4.0;
        assert!((world.pos[0] - expected_x).abs() < 1e-4);
        assert!((world.pos[1] - 2.0).abs() < 1e-4);
    }

    // shrinking removes from the tail and re-persists
    let tail_root = pieces[2].root;
    piece::install_serial_pieces(&mut ctx, rig.left.root, 2, "segment").unwrap();
    assert_eq!(
        ctx.rig.modules.get(&rig.left.root).unwrap().pieces.len(),
        2
    );
    assert!(!ctx.scene.exists(tail_root));
    assert_eq!(
        ctx.scene
            .read(rig_asm, piece::CHAN_PIECE_COUNT, 0.0, ChannelAction::Setup),
        Some(Value::Int(2))
    );
}

#[test]
fn piece_hierarchy_survives_a_cache_and_restore() {
    let mut rig = two_arm_rig().unwrap();
    let mut ctx = rig.fixture.ctx();

    let p = piece::new_piece(&mut ctx, rig.left.root, "flap", 1).unwrap();
    let root = p.root;
    ctx.rig
        .modules
        .get_mut(&rig.left.root)
        .unwrap()
        .pieces
        .push(p);

    // hang the piece under the chain-start key item, then cache that edge
    ctx.scene.set_parent(root, Some(rig.left.upper));
    piece::cache_hierarchy(&mut ctx, rig.left.root, root);
    assert_eq!(
        ctx.rig
            .items
            .get(&root)
            .and_then(|r| r.settings.get_str(tags::SET_HIER_PARENT)),
        Some(piece::KEY_CHAIN_START)
    );

    ctx.scene.set_parent(root, Some(rig.left.root));
    piece::restore_hierarchy(&mut ctx, rig.left.root, root);
    assert_eq!(ctx.scene.parent(root), Some(rig.left.upper));
}

#[test]
fn element_sets_filter_by_module() {
    let mut rig = two_arm_rig().unwrap();
    let ctx = rig.fixture.ctx();

    let left_ctrls = elements::members(&ctx, "controllers", Some(rig.left.root));
    assert_eq!(left_ctrls.len(), 3);
    assert!(left_ctrls.contains(&rig.left.upper));
    assert!(left_ctrls.contains(&rig.left.hand));

    assert_eq!(elements::members(&ctx, "controllers", None).len(), 7);
    assert_eq!(elements::members(&ctx, "sockets", None).len(), 3);
    assert_eq!(
        elements::members(&ctx, "guides", Some(rig.left.root)).len(),
        3
    );
    assert_eq!(module::plugs(&ctx, rig.left.root), vec![rig.left.plug]);
    assert_eq!(module::sockets(&ctx, rig.torso.root), vec![rig.torso.socket]);
}
