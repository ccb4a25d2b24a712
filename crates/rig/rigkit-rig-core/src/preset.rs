//! Channel-valued presets: pose, action, guide and shape content saved as
//! addressed channel sets, with mirroring and world-space-offset rewriting
//! on load.
//!
//! The in-memory form is a `PresetDoc`; the host-facing form is a
//! transient content item carrying one channel per address plus a
//! settings group with the preset metadata.

use crate::error::Result;
use crate::events::SceneEventArgs;
use crate::features::controller::{self, AnimationSpace};
use crate::item;
use crate::rig::Rig;
use crate::service::{Ctx, Service};
use crate::tags::{
    self, DROP_PRESET, SET_DROP_ACTION, TAG_PRESET_ID, TYPE_MIRROR_GROUP, TYPE_PRESET_CONTENT,
};
use rigkit_api_core::{
    ChannelAction, ChannelAddress, ChannelType, ItemId, Scene, Side, Value, Vec3,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PresetPayload {
    Static { value: Value, keyed: bool },
    Envelope { keys: Vec<(f32, Value)> },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PresetChannel {
    pub address: ChannelAddress,
    pub payload: PresetPayload,
    /// Value negates/flips when the preset loads mirrored.
    pub mirror: bool,
    /// Position channel of a world-space controller; offset rewriting
    /// applies to these.
    pub world_space: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetDoc {
    /// `pose`, `action`, `guide` or `shapes`.
    pub kind: String,
    /// Present when every lateral source item sits on one side.
    pub side: Option<Side>,
    pub description: String,
    /// Reference world-space controller: its address and saved world
    /// position, for destination offset rewriting.
    pub world_ref: Option<(ChannelAddress, Vec3)>,
    /// Opaque drop behaviour consumed by the host UI.
    pub drop_action: Option<String>,
    pub channels: Vec<PresetChannel>,
}

#[derive(Clone, Debug)]
pub struct LoadOptions {
    pub mirror: bool,
    pub action: ChannelAction,
    pub key: bool,
    /// Module whose side decides auto-mirroring for one-sided presets.
    pub destination: Option<ItemId>,
    pub world_offset: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            mirror: false,
            action: ChannelAction::Edit,
            key: false,
            destination: None,
            world_offset: true,
        }
    }
}

fn in_mirror_group(ctx: &Ctx<'_>, item: ItemId) -> bool {
    let mut current = ctx.scene.parent(item);
    while let Some(id) = current {
        if ctx.rig.item_type(id) == Some(TYPE_MIRROR_GROUP) {
            return true;
        }
        current = ctx.scene.parent(id);
    }
    false
}

fn address_of(ctx: &Ctx<'_>, item: ItemId, channel: &str) -> Option<ChannelAddress> {
    let record = ctx.rig.items.get(&item)?;
    let module_name = ctx
        .rig
        .module_of_item(item)
        .and_then(|root| ctx.rig.modules.get(&root))
        .map(|m| m.name.clone())?;
    Some(ChannelAddress::new(
        item::evaluated_side(ctx, item),
        &module_name,
        &record.item_type,
        &record.base_name,
        channel,
    ))
}

/// Save a static pose preset from the controllers of one module (or the
/// whole rig).
pub fn save_pose(ctx: &mut Ctx<'_>, module: Option<ItemId>, description: &str) -> PresetDoc {
    let mut doc = PresetDoc {
        kind: "pose".to_string(),
        description: description.to_string(),
        ..PresetDoc::default()
    };
    let time = ctx.scene.time();
    let mut sides: Vec<Side> = Vec::new();

    for item in crate::elements::members(ctx, "controllers", module) {
        let side = item::evaluated_side(ctx, item);
        if side.is_lateral() && !sides.contains(&side) {
            sides.push(side);
        }
        let world_space =
            controller::animation_space(ctx, item) == AnimationSpace::Dynamic;
        if world_space && doc.world_ref.is_none() {
            if let (Some(address), Some(world)) = (
                address_of(ctx, item, "pos.X"),
                ctx.scene.world_transform(item),
            ) {
                doc.world_ref = Some((address, world.pos));
            }
        }
        let mirror = in_mirror_group(ctx, item);
        for channel in controller::animated_channels(ctx, item) {
            let Some(address) = address_of(ctx, item, &channel) else {
                continue;
            };
            let Some(value) = ctx.scene.read_eval(item, &channel, time) else {
                continue;
            };
            doc.channels.push(PresetChannel {
                address,
                payload: PresetPayload::Static {
                    value,
                    keyed: false,
                },
                mirror,
                world_space: world_space && channel.starts_with("pos."),
            });
        }
    }
    if let [side] = sides[..] {
        doc.side = Some(side);
    }
    doc
}

/// Save a full-envelope action preset: every key on every animated
/// controller channel.
pub fn save_action(ctx: &mut Ctx<'_>, module: Option<ItemId>, description: &str) -> PresetDoc {
    let mut doc = save_pose(ctx, module, description);
    doc.kind = "action".to_string();
    for ch in &mut doc.channels {
        let Some(target) = resolve_target(ctx, &ch.address) else {
            continue;
        };
        let times = ctx
            .scene
            .keyframes(target, &ch.address.channel, ChannelAction::Edit);
        if times.is_empty() {
            continue;
        }
        let keys = times
            .into_iter()
            .filter_map(|t| {
                ctx.scene
                    .read(target, &ch.address.channel, t, ChannelAction::Edit)
                    .map(|v| (t, v))
            })
            .collect();
        ch.payload = PresetPayload::Envelope { keys };
    }
    doc
}

/// Find the item a preset address targets, by side, module name, item
/// type and folded base name.
pub fn resolve_target(ctx: &Ctx<'_>, address: &ChannelAddress) -> Option<ItemId> {
    ctx.scene.all_items().into_iter().find(|id| {
        let Some(record) = ctx.rig.items.get(id) else {
            return false;
        };
        if record.item_type != address.item_type {
            return false;
        }
        if rigkit_api_core::address::fold_name(&record.base_name) != address.item_name {
            return false;
        }
        if item::evaluated_side(ctx, *id) != address.side {
            return false;
        }
        let module_name = ctx
            .rig
            .module_of_item(*id)
            .and_then(|root| ctx.rig.modules.get(&root))
            .map(|m| m.name.clone())
            .unwrap_or_default();
        rigkit_api_core::address::fold_name(&module_name) == address.module
    })
}

fn mirror_value(address: &ChannelAddress, mirror_flag: bool, value: &Value) -> Value {
    let negate = mirror_flag
        || address.channel == "pos.X"
        || (address.side == Side::Center
            && (address.channel == "rot.Y" || address.channel == "rot.Z"));
    if negate {
        value.mirrored()
    } else {
        value.clone()
    }
}

/// Load a preset. One-sided presets dropped on the opposite side mirror
/// automatically; a missing target channel skips that channel only.
pub fn load(ctx: &mut Ctx<'_>, doc: &PresetDoc, options: &LoadOptions) -> Result<()> {
    let destination_side = options
        .destination
        .and_then(|root| ctx.rig.modules.get(&root))
        .map(|m| m.side);
    let mirror = options.mirror
        || matches!(
            (doc.side, destination_side),
            (Some(preset), Some(dest)) if preset.is_lateral() && dest == preset.opposite()
        );

    // world-space offset between the stored reference pose and where the
    // destination reference controller stands now
    let mut world_offset: Option<Vec3> = None;
    if options.world_offset {
        if let Some((ref_address, saved_pos)) = &doc.world_ref {
            let lookup = if mirror {
                ref_address.mirrored()
            } else {
                ref_address.clone()
            };
            if let Some(dest_item) = resolve_target(ctx, &lookup) {
                if let Some(world) = ctx.scene.world_transform(dest_item) {
                    let offset = rigkit_api_core::transform::vec3_sub(world.pos, *saved_pos);
                    if offset != [0.0, 0.0, 0.0] {
                        world_offset = Some(offset);
                    }
                }
            }
        }
    }

    let time = ctx.scene.time();
    for ch in &doc.channels {
        let (address, value_map): (ChannelAddress, fn(&ChannelAddress, bool, &Value) -> Value) =
            if mirror {
                (ch.address.mirrored(), mirror_value)
            } else {
                (ch.address.clone(), |_, _, v| v.clone())
            };
        let Some(target) = resolve_target(ctx, &address) else {
            continue;
        };
        if !ctx.scene.has_channel(target, &address.channel) {
            continue;
        }
        let offset_for = |value: &Value| -> Value {
            let Some(offset) = world_offset else {
                return value.clone();
            };
            if !ch.world_space {
                return value.clone();
            }
            let axis = match address.channel.as_str() {
                "pos.X" => 0,
                "pos.Y" => 1,
                "pos.Z" => 2,
                _ => return value.clone(),
            };
            match value.as_f32() {
                Some(v) => Value::Float(v + offset[axis]),
                None => value.clone(),
            }
        };
        match &ch.payload {
            PresetPayload::Static { value, keyed } => {
                let value = offset_for(&value_map(&ch.address, ch.mirror, value));
                let key = options.key || *keyed;
                ctx.scene
                    .write(target, &address.channel, value, time, options.action, key)?;
            }
            PresetPayload::Envelope { keys } => {
                for (t, value) in keys {
                    let value = offset_for(&value_map(&ch.address, ch.mirror, value));
                    ctx.scene
                        .write(target, &address.channel, value, *t, ChannelAction::Edit, true)?;
                }
            }
        }
    }
    Ok(())
}

/// Materialise the doc as a transient host content item: one channel per
/// address, metadata in the `pst` settings group.
pub fn spawn_content(ctx: &mut Ctx<'_>, doc: &PresetDoc) -> Result<ItemId> {
    let root = item::create_item(
        ctx,
        TYPE_PRESET_CONTENT,
        &format!("preset_{}", doc.kind),
        item::SideMode::Own(Side::Center),
        None,
    )?;
    ctx.scene.set_tag(root, TAG_PRESET_ID, Some(&doc.kind));
    ctx.scene
        .set_tag(root, tags::TAG_DROP_SCRIPT, Some(DROP_PRESET));
    ctx.scene
        .set_tag(root, tags::TAG_VERSION, Some(&tags::SYSTEM_VERSION.to_string()));

    if let Some(record) = ctx.rig.items.get_mut(&root) {
        record.settings.group_set("pst", "kind", doc.kind.clone().into());
        record
            .settings
            .group_set("pst", "description", doc.description.clone().into());
        if let Some(side) = doc.side {
            record
                .settings
                .group_set("pst", "side", side.letter().to_string().into());
        }
        if let Some((address, pos)) = &doc.world_ref {
            record
                .settings
                .group_set("pst", "worldRef", address.to_string().into());
            record
                .settings
                .group_set("pst", "worldRefPos", serde_json::json!(pos));
        }
        if let Some(action) = &doc.drop_action {
            record
                .settings
                .group_set("pst", SET_DROP_ACTION, action.clone().into());
        }
    }
    item::flush_settings(ctx, root);

    for ch in &doc.channels {
        let name = ch.address.to_string();
        let (ty, default) = match &ch.payload {
            PresetPayload::Static { value, .. } => (channel_type_of(value), value.clone()),
            PresetPayload::Envelope { keys } => {
                let first = keys
                    .first()
                    .map(|(_, v)| v.clone())
                    .unwrap_or(Value::Float(0.0));
                (channel_type_of(&first), first)
            }
        };
        ctx.scene.add_channel(root, &name, ty, default.clone())?;
        match &ch.payload {
            PresetPayload::Static { value, .. } => {
                ctx.scene
                    .write(root, &name, value.clone(), 0.0, ChannelAction::Setup, false)?;
            }
            PresetPayload::Envelope { keys } => {
                for (t, value) in keys {
                    ctx.scene
                        .write(root, &name, value.clone(), *t, ChannelAction::Edit, true)?;
                }
            }
        }
        if ch.mirror {
            ctx.scene
                .set_tag(root, &format!("RSPM:{name}"), Some("1"));
        }
        if ch.world_space {
            ctx.scene
                .set_tag(root, &format!("RSPW:{name}"), Some("1"));
        }
    }
    Ok(root)
}

/// Rebuild a doc from a host content item; mis-typed channels are skipped
/// without failing the read.
pub fn doc_from_content(ctx: &Ctx<'_>, root: ItemId) -> PresetDoc {
    let mut doc = PresetDoc::default();
    if let Some(record) = ctx.rig.items.get(&root) {
        let group = &record.settings;
        doc.kind = group
            .group_get("pst", "kind")
            .and_then(|v| v.as_str())
            .unwrap_or("pose")
            .to_string();
        doc.description = group
            .group_get("pst", "description")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        doc.side = group
            .group_get("pst", "side")
            .and_then(|v| v.as_str())
            .and_then(|s| s.chars().next())
            .and_then(Side::from_letter);
        doc.drop_action = group
            .group_get("pst", SET_DROP_ACTION)
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let world_ref = group
            .group_get("pst", "worldRef")
            .and_then(|v| v.as_str())
            .and_then(|s| ChannelAddress::parse(s).ok());
        let world_pos = group.group_get("pst", "worldRefPos").and_then(|v| {
            let a = v.as_array()?;
            Some([
                a.first()?.as_f64()? as f32,
                a.get(1)?.as_f64()? as f32,
                a.get(2)?.as_f64()? as f32,
            ])
        });
        if let (Some(address), Some(pos)) = (world_ref, world_pos) {
            doc.world_ref = Some((address, pos));
        }
    }
    for name in ctx.scene.channel_names(root) {
        let Ok(address) = ChannelAddress::parse(&name) else {
            continue;
        };
        let keys = ctx.scene.keyframes(root, &name, ChannelAction::Edit);
        let payload = if keys.is_empty() {
            let Some(value) = ctx.scene.read(root, &name, 0.0, ChannelAction::Setup) else {
                continue;
            };
            PresetPayload::Static {
                value,
                keyed: false,
            }
        } else {
            PresetPayload::Envelope {
                keys: keys
                    .into_iter()
                    .filter_map(|t| {
                        ctx.scene
                            .read(root, &name, t, ChannelAction::Edit)
                            .map(|v| (t, v))
                    })
                    .collect(),
            }
        };
        doc.channels.push(PresetChannel {
            address,
            payload,
            mirror: ctx.scene.tag(root, &format!("RSPM:{name}")).is_some(),
            world_space: ctx.scene.tag(root, &format!("RSPW:{name}")).is_some(),
        });
    }
    doc
}

fn channel_type_of(value: &Value) -> ChannelType {
    match value {
        Value::Float(_) => ChannelType::Float,
        Value::Int(_) => ChannelType::Int,
        Value::Bool(_) => ChannelType::Bool,
        Value::Text(_) => ChannelType::Text,
        Value::Matrix(_) => ChannelType::Matrix,
    }
}

/// Save through the host: spawn the content item, select it, run the host
/// preset save, then always clean the transient content up again.
pub fn save_preset(ctx: &mut Ctx<'_>, doc: &PresetDoc, filename: &str) -> anyhow::Result<()> {
    let selection = ctx.scene.selection();
    let root = spawn_content(ctx, doc)?;
    ctx.scene.select(&[root], false);
    let result = ctx
        .scene
        .run_command(&format!(
            "preset.save \"{filename}\" \"{}\"",
            doc.description
        ))
        .map_err(anyhow::Error::from);
    item::release_item(ctx, root, true);
    ctx.scene.select(&selection, false);
    result
}

/// Drop-script entry point: a preset content item landed in the scene;
/// load it and dispose of the content.
pub fn drop_content(
    rig: &mut Rig,
    scene: &mut dyn Scene,
    service: &mut Service,
    args: &SceneEventArgs,
) -> anyhow::Result<()> {
    let Some(root) = args.item else {
        return Ok(());
    };
    let mut ctx = Ctx::new(rig, scene, service);
    if ctx.scene.tag(root, TAG_PRESET_ID).is_none() {
        return Ok(());
    }
    if ctx.rig.items.get(&root).is_none() {
        // content arrived raw from the host; adopt it before reading
        item::convert_item(
            &mut ctx,
            root,
            TYPE_PRESET_CONTENT,
            "preset",
            item::SideMode::Own(Side::Center),
            None,
        )?;
        let settings = crate::settings::SettingsStore::load(ctx.scene, root);
        if let Some(record) = ctx.rig.items.get_mut(&root) {
            record.settings = settings;
        }
    }
    if let Some(found) = ctx
        .scene
        .tag(root, tags::TAG_VERSION)
        .and_then(|v| v.parse::<u32>().ok())
    {
        if let Err(err) = crate::module::check_version(found) {
            log::warn!("{err}; loading anyway");
        }
    }
    let doc = doc_from_content(&ctx, root);
    let result = load(&mut ctx, &doc, &LoadOptions::default());
    item::release_item(&mut ctx, root, true);
    result?;
    Ok(())
}
