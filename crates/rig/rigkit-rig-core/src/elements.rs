//! Element sets and meta-groups: rig-scoped views of items by role.
//!
//! An element set is a queryable view declared by item types; a meta-group
//! is its materialised host group, kept current by an event handler so the
//! host UI can select by role without the core present.

use crate::error::Result;
use crate::events::{Event, EventHandler, EventKind};
use crate::registry::{ComponentKind, SystemComponent};
use crate::resolution;
use crate::rig::Rig;
use crate::service::{Ctx, Service};
use crate::tags::GRAPH_META_GROUP;
use rigkit_api_core::{ChannelAction, HostType, ItemId, Scene, Value};
use std::any::Any;

#[derive(Clone, Debug)]
pub struct ElementSetDesc {
    pub ident: String,
    pub member_types: Vec<String>,
    /// Visibility applied on context reset.
    pub default_visible: bool,
    /// When set, visibility changes only touch members of the current
    /// resolution; reset still covers everyone.
    pub resolution_aware: bool,
}

impl ElementSetDesc {
    pub fn new(ident: &str, member_types: &[&str], default_visible: bool) -> Self {
        ElementSetDesc {
            ident: ident.to_string(),
            member_types: member_types.iter().map(|t| t.to_string()).collect(),
            default_visible,
            resolution_aware: false,
        }
    }

    pub fn resolution_aware(mut self) -> Self {
        self.resolution_aware = true;
        self
    }

    fn matches(&self, item_type: &str) -> bool {
        self.member_types.iter().any(|t| t == item_type)
    }
}

impl SystemComponent for ElementSetDesc {
    fn kind(&self) -> ComponentKind {
        ComponentKind::ElementSet
    }
    fn ident(&self) -> String {
        self.ident.clone()
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub fn set_idents(ctx: &Ctx<'_>) -> Vec<String> {
    ctx.service.registry.idents_of(ComponentKind::ElementSet)
}

fn desc(ctx: &Ctx<'_>, ident: &str) -> Option<ElementSetDesc> {
    ctx.service
        .registry
        .get_as::<ElementSetDesc>(ComponentKind::ElementSet, ident)
        .cloned()
}

/// Members of a set, in item creation order, optionally filtered to one
/// module.
pub fn members(ctx: &Ctx<'_>, ident: &str, module: Option<ItemId>) -> Vec<ItemId> {
    let Some(desc) = desc(ctx, ident) else {
        return Vec::new();
    };
    ctx.scene
        .all_items()
        .into_iter()
        .filter(|id| {
            let Some(record) = ctx.rig.items.get(id) else {
                return false;
            };
            if !desc.matches(&record.item_type) {
                return false;
            }
            match module {
                Some(root) => ctx.rig.module_of_item(*id) == Some(root),
                None => true,
            }
        })
        .collect()
}

/// Show or hide a set. Resolution-aware sets leave members outside the
/// current resolution untouched.
pub fn set_visible(ctx: &mut Ctx<'_>, ident: &str, visible: bool) -> Result<()> {
    let Some(desc) = desc(ctx, ident) else {
        return Ok(());
    };
    let current = resolution::current(ctx);
    for item in members(ctx, ident, None) {
        if desc.resolution_aware
            && !resolution::is_member(ctx, item, current.as_deref())
        {
            continue;
        }
        write_visible(ctx, item, visible)?;
    }
    Ok(())
}

/// Force every member, in or out of the current resolution, back to the
/// set's declared default visibility.
pub fn reset_visible(ctx: &mut Ctx<'_>, ident: &str) {
    let Some(desc) = desc(ctx, ident) else {
        return;
    };
    for item in members(ctx, ident, None) {
        if let Err(err) = write_visible(ctx, item, desc.default_visible) {
            log::warn!("element set '{ident}': visibility reset on {item:?} failed: {err}");
        }
    }
}

fn write_visible(ctx: &mut Ctx<'_>, item: ItemId, visible: bool) -> Result<()> {
    ctx.scene.write(
        item,
        "visible",
        Value::Bool(visible),
        0.0,
        ChannelAction::Setup,
        false,
    )?;
    Ok(())
}

/// Materialise the host group backing a set, creating it on first use.
pub fn ensure_meta_group(ctx: &mut Ctx<'_>, ident: &str) -> ItemId {
    if let Some(group) = ctx.rig.meta_groups.get(ident) {
        return *group;
    }
    let name = format!("{}_{ident}", ctx.rig.name);
    let group = ctx.scene.create_item(HostType::Group, &name);
    ctx.rig.meta_groups.insert(ident.to_string(), group);
    for member in members(ctx, ident, None) {
        ctx.scene.graph_connect(GRAPH_META_GROUP, group, member);
    }
    group
}

pub fn meta_group_members(ctx: &Ctx<'_>, ident: &str) -> Vec<ItemId> {
    ctx.rig
        .meta_groups
        .get(ident)
        .map(|group| ctx.scene.graph_forward(GRAPH_META_GROUP, *group))
        .unwrap_or_default()
}

/// Keeps materialised meta-groups in sync with item membership.
pub struct MetaGroupHandler;

impl EventHandler for MetaGroupHandler {
    fn name(&self) -> &str {
        "metaGroups"
    }

    fn subscribed(&self, kind: EventKind) -> bool {
        matches!(kind, EventKind::ItemAdded | EventKind::ItemRemoved)
    }

    fn handle(
        &mut self,
        event: &Event,
        rig: &mut Rig,
        scene: &mut dyn Scene,
        service: &mut Service,
    ) -> anyhow::Result<()> {
        let (item, adding) = match event {
            Event::ItemAdded { item, .. } => (*item, true),
            Event::ItemRemoved { item, .. } => (*item, false),
            _ => return Ok(()),
        };
        let Some(item_type) = rig.items.get(&item).map(|r| r.item_type.clone()) else {
            return Ok(());
        };
        for ident in service.registry.idents_of(ComponentKind::ElementSet) {
            let Some(desc) =
                service
                    .registry
                    .get_as::<ElementSetDesc>(ComponentKind::ElementSet, &ident)
            else {
                continue;
            };
            if !desc.matches(&item_type) {
                continue;
            }
            let Some(group) = rig.meta_groups.get(&ident).copied() else {
                continue;
            };
            if adding {
                scene.graph_connect(GRAPH_META_GROUP, group, item);
            } else {
                scene.graph_disconnect(GRAPH_META_GROUP, group, item);
            }
        }
        Ok(())
    }
}
