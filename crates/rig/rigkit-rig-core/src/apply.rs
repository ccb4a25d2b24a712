//! The guide-apply pipeline: recompute the rest pose of the runtime graph
//! from the user-edited guide channels.
//!
//! Phase order is fixed: INIT, one ITEM_SCAN per item, PRE, a host
//! evaluation with every transform link inert, POST, POST2. Rest poses are
//! taken from the inert evaluation; links reactivate in POST2 before the
//! plugs cache their parent offsets (handler registration order).

use crate::color;
use crate::context::ContextKind;
use crate::error::Result;
use crate::events::{Event, EventHandler, EventKind};
use crate::features::{self, FEAT_COLOR};
use crate::link;
use crate::plug;
use crate::rig::Rig;
use crate::service::{Ctx, Service};
use crate::setup;
use crate::tags::{GRAPH_GUIDE, SET_REF_SIZE, TYPE_CONTROLLER, TYPE_PLUG};
use rigkit_api_core::{ChannelAction, ChannelType, ItemId, Scene, Value};

/// Cross-handler scratch state for one apply run. Reset at INIT; the
/// stage vectors double as an audit trail of the link lifecycle.
#[derive(Clone, Debug, Default)]
pub struct ApplyBag {
    /// Driven items of every live link, cached at INIT.
    pub links: Vec<ItemId>,
    /// Plugs collected during the item scan.
    pub plugs: Vec<ItemId>,
    pub deactivated: Vec<ItemId>,
    pub rest_updated: Vec<ItemId>,
    pub reactivated: Vec<ItemId>,
}

/// Run the pipeline. Scene listening pauses and the guide context holds
/// for the duration.
pub fn guide_apply(ctx: &mut Ctx<'_>) -> Result<()> {
    let state = ctx.service.execute_start(ContextKind::Guide);
    ctx.rig.apply_bag = ApplyBag::default();

    ctx.post(Event::GuideApplyInit);

    let mut items = Vec::new();
    setup::iterate_over_hierarchy(ctx.scene, ctx.rig.root, true, &mut |item| items.push(item));
    for item in items {
        ctx.post(Event::GuideApplyItemScan { item });
    }

    ctx.post(Event::GuideApplyPre);
    ctx.scene.evaluate();
    ctx.post(Event::GuideApplyPost);
    ctx.post(Event::GuideApplyPost2);
    ctx.scene.evaluate();

    ctx.service.execute_end(state);
    Ok(())
}

pub fn register_handlers(service: &mut Service) {
    // links before plugs: offset caching must see reactivated modifiers
    service.bus.register(Box::new(LinkApplyHandler));
    service.bus.register(Box::new(PlugApplyHandler));
    service.bus.register(Box::new(MatchToGuideHandler));
    service.bus.register(Box::new(ColorApplyHandler));
    service.bus.register(Box::new(RigSizeHandler));
}

/// Deactivate / update-rest-pose / reactivate every transform link, once
/// each per run.
struct LinkApplyHandler;

impl EventHandler for LinkApplyHandler {
    fn name(&self) -> &str {
        "apply.links"
    }

    fn subscribed(&self, kind: EventKind) -> bool {
        matches!(
            kind,
            EventKind::GuideApplyInit
                | EventKind::GuideApplyPre
                | EventKind::GuideApplyPost
                | EventKind::GuideApplyPost2
        )
    }

    fn handle(
        &mut self,
        event: &Event,
        rig: &mut Rig,
        scene: &mut dyn Scene,
        service: &mut Service,
    ) -> anyhow::Result<()> {
        let mut ctx = Ctx::new(rig, scene, service);
        match event {
            Event::GuideApplyInit => {
                let driven: Vec<ItemId> = ctx.rig.links.iter().map(|l| l.driven).collect();
                for item in &driven {
                    link::clear_from_item_if_not_valid(&mut ctx, *item);
                }
                ctx.rig.apply_bag.links =
                    ctx.rig.links.iter().map(|l| l.driven).collect();
            }
            Event::GuideApplyPre => {
                for item in ctx.rig.apply_bag.links.clone() {
                    link::deactivate(&mut ctx, item)?;
                    ctx.rig.apply_bag.deactivated.push(item);
                }
            }
            Event::GuideApplyPost => {
                for item in ctx.rig.apply_bag.links.clone() {
                    link::update_rest_pose(&mut ctx, item)?;
                    ctx.rig.apply_bag.rest_updated.push(item);
                }
            }
            Event::GuideApplyPost2 => {
                for item in ctx.rig.apply_bag.links.clone() {
                    link::reactivate(&mut ctx, item)?;
                    ctx.rig.apply_bag.reactivated.push(item);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Collects connected plugs during the scan and re-caches their parent
/// offsets after the links are live again.
struct PlugApplyHandler;

impl EventHandler for PlugApplyHandler {
    fn name(&self) -> &str {
        "apply.plugs"
    }

    fn subscribed(&self, kind: EventKind) -> bool {
        matches!(
            kind,
            EventKind::GuideApplyItemScan | EventKind::GuideApplyPost2
        )
    }

    fn handle(
        &mut self,
        event: &Event,
        rig: &mut Rig,
        scene: &mut dyn Scene,
        service: &mut Service,
    ) -> anyhow::Result<()> {
        let mut ctx = Ctx::new(rig, scene, service);
        match event {
            Event::GuideApplyItemScan { item } => {
                if ctx.rig.item_type(*item) == Some(TYPE_PLUG)
                    && plug::connected_socket(&ctx, *item).is_some()
                {
                    ctx.rig.apply_bag.plugs.push(*item);
                }
            }
            Event::GuideApplyPost2 => {
                for p in ctx.rig.apply_bag.plugs.clone() {
                    plug::cache_parent_offset(&mut ctx, p)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Snap items with a guide edge to their guide's post-eval world pose
/// (setup action).
struct MatchToGuideHandler;

impl EventHandler for MatchToGuideHandler {
    fn name(&self) -> &str {
        "apply.matchToGuide"
    }

    fn subscribed(&self, kind: EventKind) -> bool {
        kind == EventKind::GuideApplyPost
    }

    fn handle(
        &mut self,
        event: &Event,
        rig: &mut Rig,
        scene: &mut dyn Scene,
        service: &mut Service,
    ) -> anyhow::Result<()> {
        if !matches!(event, Event::GuideApplyPost) {
            return Ok(());
        }
        let mut ctx = Ctx::new(rig, scene, service);
        let items = ctx.scene.all_items();
        for item in items {
            if !ctx.rig.items.contains_key(&item) {
                continue;
            }
            let Some(guide) = ctx.scene.graph_forward(GRAPH_GUIDE, item).first().copied()
            else {
                continue;
            };
            let Some(guide_world) = ctx.scene.world_transform(guide) else {
                continue;
            };
            let parent_world = ctx
                .scene
                .parent(item)
                .and_then(|p| ctx.scene.world_transform(p))
                .unwrap_or_default();
            let local = guide_world.relative_to(&parent_world);
            ctx.scene
                .set_local_transform(item, &local, ChannelAction::Setup, false);
        }
        Ok(())
    }
}

/// Re-resolve item colors once the rest pose settles.
struct ColorApplyHandler;

impl EventHandler for ColorApplyHandler {
    fn name(&self) -> &str {
        "apply.colors"
    }

    fn subscribed(&self, kind: EventKind) -> bool {
        kind == EventKind::GuideApplyPost
    }

    fn handle(
        &mut self,
        event: &Event,
        rig: &mut Rig,
        scene: &mut dyn Scene,
        service: &mut Service,
    ) -> anyhow::Result<()> {
        if !matches!(event, Event::GuideApplyPost) {
            return Ok(());
        }
        let mut ctx = Ctx::new(rig, scene, service);
        for item in ctx.scene.all_items() {
            if features::has_feature(&ctx, item, FEAT_COLOR) {
                color::reapply_color(&mut ctx, item)?;
            }
        }
        Ok(())
    }
}

/// Push the rig reference size onto every controller's draw-size channel.
struct RigSizeHandler;

impl EventHandler for RigSizeHandler {
    fn name(&self) -> &str {
        "apply.rigSize"
    }

    fn subscribed(&self, kind: EventKind) -> bool {
        kind == EventKind::GuideApplyPost
    }

    fn handle(
        &mut self,
        event: &Event,
        rig: &mut Rig,
        scene: &mut dyn Scene,
        service: &mut Service,
    ) -> anyhow::Result<()> {
        if !matches!(event, Event::GuideApplyPost) {
            return Ok(());
        }
        let mut ctx = Ctx::new(rig, scene, service);
        let Some(size) = ctx
            .rig
            .root_settings()
            .and_then(|s| s.get_f32(SET_REF_SIZE))
        else {
            return Ok(());
        };
        for item in ctx.scene.all_items() {
            if ctx.rig.item_type(item) != Some(TYPE_CONTROLLER) {
                continue;
            }
            if !ctx.scene.has_channel(item, "drawSize") {
                ctx.scene
                    .add_channel(item, "drawSize", ChannelType::Float, Value::Float(1.0))?;
            }
            ctx.scene.write(
                item,
                "drawSize",
                Value::Float(size),
                0.0,
                ChannelAction::Setup,
                false,
            )?;
        }
        Ok(())
    }
}

/// Attach an item to a guide so apply snaps it to the guide's rest pose.
pub fn set_guide(ctx: &mut Ctx<'_>, item: ItemId, guide: Option<ItemId>) {
    ctx.scene.graph_clear_item(GRAPH_GUIDE, item);
    if let Some(guide) = guide {
        ctx.scene.graph_connect(GRAPH_GUIDE, item, guide);
    }
}

/// Guide an item is matched to during apply.
pub fn guide_of(ctx: &Ctx<'_>, item: ItemId) -> Option<ItemId> {
    ctx.scene.graph_forward(GRAPH_GUIDE, item).first().copied()
}
