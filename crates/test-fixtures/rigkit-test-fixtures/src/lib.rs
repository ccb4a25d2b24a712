//! Shared rig fixtures for integration tests: a memory-scene rig shell and
//! builders for small but complete module arrangements (arms with guides,
//! plugs and IK/FK chains, a torso with sockets).

use std::sync::{Arc, Mutex};

use anyhow::Result;
use rigkit_api_core::{ChannelAction, ItemId, Scene, Side, Transform};
use rigkit_rig::features::{self, controller};
use rigkit_rig::item::{self, SideMode};
use rigkit_rig::{apply, ikfk, module, plug, rig, tags, Ctx, Event, EventHandler, EventKind, Rig, Service};
use rigkit_scene_core::MemoryScene;

/// A scene, a service with the built-in system installed, and one rig.
pub struct RigFixture {
    pub scene: MemoryScene,
    pub service: Service,
    pub rig: Rig,
}

impl RigFixture {
    pub fn new(name: &str) -> Result<Self> {
        let mut scene = MemoryScene::new();
        let mut service = Service::new();
        rig::install_system(&mut service);
        let rig = Rig::create(&mut scene, &mut service, name)?;
        Ok(RigFixture {
            scene,
            service,
            rig,
        })
    }

    pub fn ctx(&mut self) -> Ctx<'_> {
        Ctx::new(&mut self.rig, &mut self.scene, &mut self.service)
    }

    pub fn evaluate(&mut self) {
        self.scene.evaluate();
    }
}

/// Records the event kinds it subscribes to, in dispatch order, for
/// assertions on what a lifecycle operation posted.
pub struct EventRecorder {
    kinds: Vec<EventKind>,
    log: Arc<Mutex<Vec<EventKind>>>,
}

impl EventRecorder {
    pub fn install(service: &mut Service, kinds: &[EventKind]) -> Arc<Mutex<Vec<EventKind>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        service.bus.register(Box::new(EventRecorder {
            kinds: kinds.to_vec(),
            log: log.clone(),
        }));
        log
    }
}

impl EventHandler for EventRecorder {
    fn name(&self) -> &str {
        "fixtures.recorder"
    }

    fn subscribed(&self, kind: EventKind) -> bool {
        self.kinds.contains(&kind)
    }

    fn handle(
        &mut self,
        event: &Event,
        _rig: &mut Rig,
        _scene: &mut dyn Scene,
        _service: &mut Service,
    ) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(event.kind());
        Ok(())
    }
}

/// A three-controller arm module with matching guides, a shoulder plug and
/// a wrist socket. Guides are staggered along X so world transforms differ
/// per joint.
pub struct ArmFixture {
    pub root: ItemId,
    pub plug: ItemId,
    pub socket: ItemId,
    pub upper: ItemId,
    pub lower: ItemId,
    pub hand: ItemId,
    pub upper_guide: ItemId,
    pub lower_guide: ItemId,
    pub hand_guide: ItemId,
}

pub fn add_arm(f: &mut RigFixture, name: &str, side: Side) -> Result<ArmFixture> {
    let mut ctx = f.ctx();
    let root = module::new_module(&mut ctx, "arm", name, side)?;
    let setup = ctx
        .rig
        .modules
        .get(&root)
        .map(|m| m.setup)
        .expect("module just created");

    let mut joints = Vec::new();
    for (ix, base) in ["upper", "lower", "hand"].iter().enumerate() {
        let ctrl = item::create_item(
            &mut ctx,
            tags::TYPE_CONTROLLER,
            base,
            SideMode::InheritModule,
            Some(setup),
        )?;
        let guide = item::create_item(
            &mut ctx,
            tags::TYPE_CONTROLLER_GUIDE,
            &format!("{base}Guide"),
            SideMode::InheritModule,
            Some(setup),
        )?;
        let pos = [ix as f32 + 1.0, 2.0, 0.0];
        ctx.scene.set_local_transform(
            guide,
            &Transform::from_pos(pos),
            ChannelAction::Setup,
            false,
        );
        apply::set_guide(&mut ctx, ctrl, Some(guide));
        joints.push((ctrl, guide));
    }
    let (upper, upper_guide) = joints[0];
    let (lower, lower_guide) = joints[1];
    let (hand, hand_guide) = joints[2];
    item::set_identifier(&mut ctx, upper, Some(rigkit_rig::piece::KEY_CHAIN_START));
    item::set_identifier(&mut ctx, hand, Some(rigkit_rig::piece::KEY_CHAIN_END));

    let plug = item::create_item(
        &mut ctx,
        tags::TYPE_PLUG,
        "shoulder",
        SideMode::InheritModule,
        Some(setup),
    )?;
    let socket = item::create_item(
        &mut ctx,
        tags::TYPE_SOCKET,
        "wrist",
        SideMode::InheritModule,
        Some(setup),
    )?;
    ctx.scene.evaluate();

    Ok(ArmFixture {
        root,
        plug,
        socket,
        upper,
        lower,
        hand,
        upper_guide,
        lower_guide,
        hand_guide,
    })
}

/// A torso module exposing one socket for arm plugs.
pub struct TorsoFixture {
    pub root: ItemId,
    pub socket: ItemId,
    pub chest: ItemId,
}

pub fn add_torso(f: &mut RigFixture) -> Result<TorsoFixture> {
    let mut ctx = f.ctx();
    let root = module::new_module(&mut ctx, "torso", "Torso", Side::Center)?;
    let setup = ctx
        .rig
        .modules
        .get(&root)
        .map(|m| m.setup)
        .expect("module just created");
    let chest = item::create_item(
        &mut ctx,
        tags::TYPE_CONTROLLER,
        "chest",
        SideMode::InheritModule,
        Some(setup),
    )?;
    let socket = item::create_item(
        &mut ctx,
        tags::TYPE_SOCKET,
        "shoulderL",
        SideMode::InheritModule,
        Some(setup),
    )?;
    ctx.scene.set_local_transform(
        socket,
        &Transform::from_pos([0.5, 3.0, 0.0]),
        ChannelAction::Setup,
        false,
    );
    ctx.scene.evaluate();
    Ok(TorsoFixture {
        root,
        socket,
        chest,
    })
}

/// IK/FK wiring over an arm: a switcher on the hand controller, FK and IK
/// chain groups over duplicated chains, and a blend on the switcher itself.
pub struct IkFkFixture {
    pub switcher: ItemId,
    pub fk_group: ItemId,
    pub ik_group: ItemId,
    pub fk_chain: Vec<ItemId>,
    pub ik_chain: Vec<ItemId>,
}

pub fn wire_ikfk(f: &mut RigFixture, arm: &ArmFixture) -> Result<IkFkFixture> {
    let mut ctx = f.ctx();
    let setup = ctx
        .rig
        .modules
        .get(&arm.root)
        .map(|m| m.setup)
        .expect("arm module");

    let mut fk_chain = Vec::new();
    let mut ik_chain = Vec::new();
    for (base, chain) in [("Fk", &mut fk_chain), ("Ik", &mut ik_chain)] {
        for joint in ["upper", "lower", "hand"] {
            let ctrl = item::create_item(
                &mut ctx,
                tags::TYPE_CONTROLLER,
                &format!("{joint}{base}"),
                SideMode::InheritModule,
                Some(setup),
            )?;
            features::add_feature(&mut ctx, ctrl, features::FEAT_MATCH_TRANSFORMS)?;
            chain.push(ctrl);
        }
    }
    // cross-reference: each IK joint matches its FK partner and vice versa
    for (fk, ik) in fk_chain.iter().zip(ik_chain.iter()) {
        features::match_transforms::set_reference(&mut ctx, *fk, Some(*ik));
        features::match_transforms::set_reference(&mut ctx, *ik, Some(*fk));
    }

    let switcher = arm.hand;
    features::add_feature(&mut ctx, switcher, features::FEAT_IKFK_SWITCHER)?;
    let fk_group = ikfk::new_chain_group(&mut ctx, arm.root, "fkChain")?;
    let ik_group = ikfk::new_chain_group(&mut ctx, arm.root, "ikChain")?;
    for member in &fk_chain {
        ikfk::add_chain_member(&mut ctx, fk_group, *member);
    }
    for member in &ik_chain {
        ikfk::add_chain_member(&mut ctx, ik_group, *member);
    }
    ikfk::set_fk_chain(&mut ctx, switcher, Some(fk_group));
    ikfk::set_ik_chain(&mut ctx, switcher, Some(ik_group));
    ikfk::set_blend_item(&mut ctx, switcher, Some(switcher));
    ctx.scene.evaluate();

    Ok(IkFkFixture {
        switcher,
        fk_group,
        ik_group,
        fk_chain,
        ik_chain,
    })
}

/// The standard small rig: a torso and two lateral arms, symmetry-paired,
/// left arm plugged into the torso socket.
pub struct TwoArmRig {
    pub fixture: RigFixture,
    pub torso: TorsoFixture,
    pub left: ArmFixture,
    pub right: ArmFixture,
}

pub fn two_arm_rig() -> Result<TwoArmRig> {
    let mut fixture = RigFixture::new("Biped")?;
    let torso = add_torso(&mut fixture)?;
    let left = add_arm(&mut fixture, "Arm", Side::Left)?;
    let right = add_arm(&mut fixture, "Arm", Side::Right)?;
    {
        let mut ctx = fixture.ctx();
        module::set_symmetric_module(&mut ctx, left.root, right.root)?;
        plug::connect_to_socket(&mut ctx, left.plug, torso.socket)?;
    }
    Ok(TwoArmRig {
        fixture,
        torso,
        left,
        right,
    })
}

/// Convenience: key a controller's channels at a time so envelope-based
/// tests have animation to work with.
pub fn key_controller(f: &mut RigFixture, item: ItemId, time: f32) -> Result<()> {
    let mut ctx = f.ctx();
    ctx.scene.set_time(time);
    ctx.scene.evaluate();
    controller::keyframe(&mut ctx, item, time)?;
    Ok(())
}
