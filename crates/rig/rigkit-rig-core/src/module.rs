//! Modules: self-contained, parameterised sub-rigs and the principal unit
//! of composition.
//!
//! Construction materialises the root, the main assembly, a rig and a
//! guide sub-assembly, and four identified folders. Side and name changes
//! re-render every descendant name and post their events.

use crate::error::{Result, RigError};
use crate::events::Event;
use crate::item::{self, SideMode};
use crate::piece::Piece;
use crate::plug;
use crate::service::Ctx;
use crate::setup::{self, SetupId};
use crate::tags::{
    self, GRAPH_SYMMETRY, SYSTEM_VERSION, TAG_VERSION,
};
use indexmap::IndexMap;
use rigkit_api_core::{ChannelAction, HostType, ItemId, Side, Value};

#[derive(Clone, Debug)]
pub struct Module {
    pub root: ItemId,
    pub setup: SetupId,
    /// May repeat across a rig; key items are unique only within a module.
    pub identifier: String,
    pub name: String,
    pub side: Side,
    /// Side the module was authored on; governs mirroring on load.
    pub first_side: Side,
    pub key_items: IndexMap<String, ItemId>,
    /// Root of the symmetric partner module, when paired.
    pub symmetry: Option<ItemId>,
    pub sub_module_of: Option<ItemId>,
    pub pieces: Vec<Piece>,
    pub rig_assembly: ItemId,
    pub guide_assembly: ItemId,
    pub preset_filename: Option<String>,
    pub thumbnail: Option<String>,
}

/// Create a module under the rig root setup and return its root item.
pub fn new_module(ctx: &mut Ctx<'_>, identifier: &str, name: &str, side: Side) -> Result<ItemId> {
    let root = ctx.scene.create_item(HostType::Locator, name);
    let assembly = ctx
        .scene
        .create_item(HostType::Assembly, &format!("{name}_assembly"));
    let parent = ctx.rig.root_setup;
    let setup = setup::new_setup(ctx, identifier, root, assembly, Some(parent));
    ctx.scene.set_parent(root, Some(ctx.rig.root));

    let rig_assembly = ctx
        .scene
        .create_item(HostType::Assembly, &format!("{name}_rig"));
    let guide_assembly = ctx
        .scene
        .create_item(HostType::Assembly, &format!("{name}_guide"));
    ctx.scene.set_parent(rig_assembly, Some(assembly));
    ctx.scene.set_parent(guide_assembly, Some(assembly));

    ctx.rig.modules.insert(
        root,
        Module {
            root,
            setup,
            identifier: identifier.to_string(),
            name: name.to_string(),
            side,
            first_side: side,
            key_items: IndexMap::new(),
            symmetry: None,
            sub_module_of: None,
            pieces: Vec::new(),
            rig_assembly,
            guide_assembly,
            preset_filename: None,
            thumbnail: None,
        },
    );

    ctx.scene
        .set_tag(root, TAG_VERSION, Some(&SYSTEM_VERSION.to_string()));
    item::convert_item(
        ctx,
        root,
        tags::TYPE_MODULE_ROOT,
        name,
        SideMode::InheritModule,
        Some(setup),
    )?;
    write_side_channels(ctx, root, side)?;

    for (base, ident) in [
        ("Guide", tags::FOLDER_GUIDE),
        ("EditGuide", tags::FOLDER_EDIT_GUIDE),
        ("Rig", tags::FOLDER_RIG),
        ("BindSkeleton", tags::FOLDER_BIND_SKELETON),
    ] {
        let folder = item::create_item(
            ctx,
            tags::TYPE_FOLDER,
            base,
            SideMode::InheritModule,
            Some(setup),
        )?;
        item::set_identifier(ctx, folder, Some(ident));
    }
    Ok(root)
}

fn write_side_channels(ctx: &mut Ctx<'_>, root: ItemId, side: Side) -> Result<()> {
    let factor = if side == Side::Right { -1.0 } else { 1.0 };
    let angle = if side.is_lateral() { 180.0 } else { 0.0 };
    ctx.scene.write(
        root,
        "side.factor",
        Value::Float(factor),
        0.0,
        ChannelAction::Setup,
        false,
    )?;
    ctx.scene.write(
        root,
        "mirror.angle",
        Value::Float(angle),
        0.0,
        ChannelAction::Setup,
        false,
    )?;
    Ok(())
}

fn module_items(ctx: &Ctx<'_>, root: ItemId) -> Vec<ItemId> {
    ctx.scene
        .all_items()
        .into_iter()
        .filter(|id| ctx.rig.module_of_item(*id) == Some(root))
        .collect()
}

/// Change a module's side: derived channels, descendant names and the
/// `ModuleSideChanged` event.
pub fn set_side(ctx: &mut Ctx<'_>, root: ItemId, side: Side) -> Result<()> {
    {
        let module = ctx
            .rig
            .modules
            .get_mut(&root)
            .ok_or_else(|| RigError::Lookup(format!("module {root:?}")))?;
        module.side = side;
    }
    write_side_channels(ctx, root, side)?;
    for item in module_items(ctx, root) {
        item::render_name(ctx, item);
    }
    ctx.post(Event::ModuleSideChanged { module: root, side });
    Ok(())
}

pub fn set_name(ctx: &mut Ctx<'_>, root: ItemId, name: &str) -> Result<()> {
    {
        let module = ctx
            .rig
            .modules
            .get_mut(&root)
            .ok_or_else(|| RigError::Lookup(format!("module {root:?}")))?;
        module.name = name.to_string();
    }
    for item in module_items(ctx, root) {
        item::render_name(ctx, item);
    }
    ctx.post(Event::ModuleNameChanged { module: root });
    Ok(())
}

pub fn key_item(ctx: &Ctx<'_>, root: ItemId, identifier: &str) -> Option<ItemId> {
    ctx.rig
        .modules
        .get(&root)
        .and_then(|m| m.key_items.get(identifier))
        .copied()
}

/// Pair two modules as symmetric partners. Both must sit on opposite
/// lateral sides; the link is bidirectional.
pub fn set_symmetric_module(ctx: &mut Ctx<'_>, a: ItemId, b: ItemId) -> Result<()> {
    let side_a = ctx
        .rig
        .modules
        .get(&a)
        .map(|m| m.side)
        .ok_or_else(|| RigError::Lookup(format!("module {a:?}")))?;
    let side_b = ctx
        .rig
        .modules
        .get(&b)
        .map(|m| m.side)
        .ok_or_else(|| RigError::Lookup(format!("module {b:?}")))?;
    if !side_a.is_lateral() || side_b != side_a.opposite() {
        return Err(RigError::InvalidArgument(
            "symmetry requires opposite lateral sides".to_string(),
        ));
    }
    clear_symmetry(ctx, a);
    clear_symmetry(ctx, b);
    if let Some(module) = ctx.rig.modules.get_mut(&a) {
        module.symmetry = Some(b);
    }
    if let Some(module) = ctx.rig.modules.get_mut(&b) {
        module.symmetry = Some(a);
    }
    ctx.scene.graph_connect(GRAPH_SYMMETRY, a, b);
    ctx.scene.graph_connect(GRAPH_SYMMETRY, b, a);
    Ok(())
}

pub fn clear_symmetry(ctx: &mut Ctx<'_>, root: ItemId) {
    let partner = ctx.rig.modules.get(&root).and_then(|m| m.symmetry);
    if let Some(module) = ctx.rig.modules.get_mut(&root) {
        module.symmetry = None;
    }
    if let Some(partner) = partner {
        if let Some(module) = ctx.rig.modules.get_mut(&partner) {
            module.symmetry = None;
        }
        ctx.scene.graph_disconnect(GRAPH_SYMMETRY, root, partner);
        ctx.scene.graph_disconnect(GRAPH_SYMMETRY, partner, root);
    }
}

/// Negate every channel value inside the module's mirror-channel groups:
/// booleans flip, numerics negate (setup action).
pub fn mirror_key_channels(ctx: &mut Ctx<'_>, root: ItemId) -> Result<()> {
    let groups: Vec<ItemId> = module_items(ctx, root)
        .into_iter()
        .filter(|id| ctx.rig.item_type(*id) == Some(tags::TYPE_MIRROR_GROUP))
        .collect();
    for group in groups {
        for member in ctx.scene.children(group) {
            for channel in ctx.scene.channel_names(member) {
                let Some(value) = ctx.scene.read(member, &channel, 0.0, ChannelAction::Setup)
                else {
                    continue;
                };
                if matches!(value, Value::Float(_) | Value::Int(_) | Value::Bool(_)) {
                    ctx.scene.write(
                        member,
                        &channel,
                        value.mirrored(),
                        0.0,
                        ChannelAction::Setup,
                        false,
                    )?;
                }
            }
        }
    }
    Ok(())
}

pub fn plugs(ctx: &Ctx<'_>, root: ItemId) -> Vec<ItemId> {
    crate::elements::members(ctx, "plugs", Some(root))
}

pub fn sockets(ctx: &Ctx<'_>, root: ItemId) -> Vec<ItemId> {
    crate::elements::members(ctx, "sockets", Some(root))
}

/// Disconnect this module's plugs from sockets in `other`, or from every
/// foreign module when `other` is `None`.
pub fn disconnect_from_module(ctx: &mut Ctx<'_>, root: ItemId, other: Option<ItemId>) -> Result<()> {
    for p in plugs(ctx, root) {
        let Some(socket) = plug::connected_socket(ctx, p) else {
            continue;
        };
        let socket_module = ctx.rig.module_of_item(socket);
        if other.is_none() || socket_module == other {
            plug::disconnect_from_socket(ctx, p)?;
        }
    }
    Ok(())
}

/// Items in a mirror-channel group are its hierarchy children; use this to
/// enrol a controller's channels for side mirroring.
pub fn add_to_mirror_group(ctx: &mut Ctx<'_>, group: ItemId, item: ItemId) {
    ctx.scene.set_parent(item, Some(group));
}

/// Preset filename for a piece of this module: dots become underscores.
pub fn piece_filename(module_ident: &str, piece_ident: &str) -> String {
    format!(
        "{}_{}.lxp",
        module_ident.replace('.', "_"),
        piece_ident.replace('.', "_")
    )
}

/// Save the module as a host assembly preset. Stamps the current system
/// version and brackets the save with its events.
pub fn save(ctx: &mut Ctx<'_>, root: ItemId, filename: &str) -> anyhow::Result<()> {
    let setup = ctx
        .rig
        .modules
        .get(&root)
        .map(|m| m.setup)
        .ok_or_else(|| anyhow::anyhow!("module {root:?} does not exist"))?;
    ctx.scene
        .set_tag(root, TAG_VERSION, Some(&SYSTEM_VERSION.to_string()));
    ctx.post(Event::ModuleSavePre { module: root });
    let result = setup::save(ctx, setup, filename);
    ctx.post(Event::ModuleSavePost { module: root });
    if result.is_ok() {
        if let Some(module) = ctx.rig.modules.get_mut(&root) {
            module.preset_filename = Some(filename.to_string());
        }
    }
    result
}

/// Content authored at a newer system version errors here; load paths
/// downgrade the error to a warning and proceed.
pub fn check_version(found: u32) -> Result<()> {
    if found > SYSTEM_VERSION {
        return Err(RigError::Version {
            found,
            current: SYSTEM_VERSION,
        });
    }
    Ok(())
}
