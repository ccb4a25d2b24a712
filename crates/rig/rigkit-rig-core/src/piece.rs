//! Pieces: optional or repeated sub-assemblies inside a module, and the
//! serial-piece operator that keeps a parameter-driven chain of them wired.
//!
//! Serial chains auto-wire channels by name prefix (`gd__`, `mod__`,
//! `rig__`, `next__`, `prev__` on piece inputs; `first__`/`last__` on the
//! module's guide and rig assemblies) and fit their guides linearly between
//! the module's chain-start and chain-end guides.

use crate::error::{Result, RigError};
use crate::features::{self, item_link};
use crate::item::{self, SideMode};
use crate::registry::{ComponentKind, SystemComponent};
use crate::service::Ctx;
use crate::setup::{self, SetupId};
use crate::tags;
use indexmap::IndexMap;
use rigkit_api_core::transform::vec3_lerp;
use rigkit_api_core::{ChannelAction, ChannelType, HostType, ItemId, Transform, Value};
use serde_json::json;
use std::any::Any;

/// Name token in piece item base names replaced by the serial number.
pub const SERIAL_TOKEN: char = '#';

// Input-channel prefixes resolved during serial rewiring.
pub const PREFIX_GUIDE: &str = "gd__";
pub const PREFIX_MODULE: &str = "mod__";
pub const PREFIX_RIG: &str = "rig__";
pub const PREFIX_NEXT: &str = "next__";
pub const PREFIX_PREV: &str = "prev__";
pub const PREFIX_FIRST: &str = "first__";
pub const PREFIX_LAST: &str = "last__";

/// Channels on the module rig sub-assembly persisting the serial count.
pub const CHAN_PIECE_COUNT: &str = "pieces.count";
pub const CHAN_PIECE_LAST_SERIAL: &str = "pieces.lastSerial";

// Module key items bounding a serial guide chain.
pub const KEY_CHAIN_START: &str = "chainStart";
pub const KEY_CHAIN_END: &str = "chainEnd";

#[derive(Clone, Debug)]
pub struct Piece {
    pub identifier: String,
    /// Factory ident for serial pieces; empty for singletons.
    pub factory: String,
    /// 1-based position in the module's chain.
    pub index: u32,
    pub root: ItemId,
    pub setup: SetupId,
    pub key_items: IndexMap<String, ItemId>,
    /// Cache hierarchy connections into settings before a module save.
    pub cache_on_save: bool,
}

pub fn assembly(ctx: &Ctx<'_>, piece: &Piece) -> Option<ItemId> {
    ctx.rig.setups.get(piece.setup).map(|s| s.assembly)
}

pub type PieceBuilder = fn(&mut Ctx<'_>, ItemId, u32) -> Result<Piece>;
/// `(piece root, previous piece root, next piece root)`.
pub type PieceAddedHook = fn(&mut Ctx<'_>, ItemId, Option<ItemId>, Option<ItemId>) -> Result<()>;

/// Declarative recipe for one serial piece class, registered as a system
/// component so modules can install chains by identifier.
#[derive(Clone)]
pub struct PieceFactory {
    pub ident: String,
    /// Serial number of the first piece; indices start at 1 regardless.
    pub sequence_start: u32,
    /// Key item in a new piece -> key item on the previous piece (or on the
    /// module for the first) it parents under.
    pub piece_hierarchy: Vec<(String, String)>,
    /// Module key item -> key item on the tail piece it parents under.
    pub module_hierarchy: Vec<(String, String)>,
    /// Per-piece guide key item fitted along the module chain and drawn
    /// with item links between neighbours.
    pub guide_key: Option<String>,
    pub build: PieceBuilder,
    pub on_piece_added: Option<PieceAddedHook>,
}

impl PieceFactory {
    pub fn new(ident: &str, build: PieceBuilder) -> Self {
        PieceFactory {
            ident: ident.to_string(),
            sequence_start: 1,
            piece_hierarchy: Vec::new(),
            module_hierarchy: Vec::new(),
            guide_key: None,
            build,
            on_piece_added: None,
        }
    }
}

impl SystemComponent for PieceFactory {
    fn kind(&self) -> ComponentKind {
        ComponentKind::ComponentSetup
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

/// Serial number carried by the piece owning this item, when it sits in a
/// piece setup. Naming substitutes it for the serial token.
pub fn serial_of_item(ctx: &Ctx<'_>, item: ItemId) -> Option<u32> {
    let record_setup = ctx.rig.items.get(&item)?.setup?;
    let module_root = ctx.rig.module_of_item(item)?;
    let module = ctx.rig.modules.get(&module_root)?;
    let piece = module
        .pieces
        .iter()
        .find(|p| setup_within(ctx, record_setup, p.setup))?;
    let start = ctx
        .service
        .registry
        .get_as::<PieceFactory>(ComponentKind::ComponentSetup, &piece.factory)
        .map(|f| f.sequence_start)
        .unwrap_or(1);
    Some(start + piece.index - 1)
}

fn setup_within(ctx: &Ctx<'_>, mut id: SetupId, ancestor: SetupId) -> bool {
    loop {
        if id == ancestor {
            return true;
        }
        match ctx.rig.setups.get(id).and_then(|s| s.parent) {
            Some(parent) => id = parent,
            None => return false,
        }
    }
}

/// Materialise an empty piece shell: root, assembly and a self-destroying
/// setup nested under the module's. Builders fill in the items.
pub fn new_piece(
    ctx: &mut Ctx<'_>,
    module_root: ItemId,
    identifier: &str,
    index: u32,
) -> Result<Piece> {
    let parent_setup = ctx
        .rig
        .modules
        .get(&module_root)
        .map(|m| m.setup)
        .ok_or_else(|| RigError::Lookup(format!("module at {module_root:?}")))?;
    let root = ctx.scene.create_item(HostType::Locator, identifier);
    let group = ctx
        .scene
        .create_item(HostType::Assembly, &format!("{identifier}_assembly"));
    let setup = setup::new_setup(ctx, identifier, root, group, Some(parent_setup));
    if let Some(s) = ctx.rig.setups.get_mut(setup) {
        s.self_destroy_when_empty = true;
        s.create_drop_script = Some(tags::DROP_PIECE.to_string());
    }
    ctx.scene.set_parent(root, Some(module_root));
    item::convert_item(
        ctx,
        root,
        tags::TYPE_PIECE_ROOT,
        identifier,
        SideMode::InheritModule,
        Some(setup),
    )?;
    Ok(Piece {
        identifier: identifier.to_string(),
        factory: String::new(),
        index,
        root,
        setup,
        key_items: IndexMap::new(),
        cache_on_save: false,
    })
}

/// Delete a piece: every item in its setup goes, the setup self-destroys
/// with the last member, and the module forgets the piece.
pub fn remove_piece(ctx: &mut Ctx<'_>, module_root: ItemId, piece_root: ItemId) {
    let Some(piece) = ctx.rig.modules.get_mut(&module_root).and_then(|m| {
        m.pieces
            .iter()
            .position(|p| p.root == piece_root)
            .map(|pos| m.pieces.remove(pos))
    }) else {
        return;
    };
    let mut members: Vec<ItemId> = ctx
        .rig
        .setups
        .get(piece.setup)
        .map(|s| s.members.clone())
        .unwrap_or_default();
    members.retain(|m| *m != piece.root);
    for member in members {
        item::release_item(ctx, member, true);
    }
    item::release_item(ctx, piece.root, true);
}

/// Load a saved piece preset into the module. The host fires the piece
/// drop script during the load, which adopts the content; afterwards the
/// cached cross-setup hierarchy is restored and the piece is indexed.
pub fn add_piece(ctx: &mut Ctx<'_>, module_root: ItemId, identifier: &str) -> Result<ItemId> {
    let module_ident = ctx
        .rig
        .modules
        .get(&module_root)
        .map(|m| m.identifier.clone())
        .ok_or_else(|| RigError::Lookup(format!("module at {module_root:?}")))?;
    let filename = crate::module::piece_filename(&module_ident, identifier);
    ctx.scene.run_command(&format!("preset.load \"{filename}\""))?;
    let root = ctx
        .rig
        .modules
        .get(&module_root)
        .and_then(|m| m.pieces.iter().find(|p| p.identifier == identifier))
        .map(|p| p.root)
        .ok_or_else(|| RigError::Lookup(format!("piece '{identifier}' after load")))?;
    restore_hierarchy(ctx, module_root, root);
    let index = ctx
        .rig
        .modules
        .get(&module_root)
        .map(|m| m.pieces.len() as u32)
        .unwrap_or(1);
    if let Some(piece) = ctx
        .rig
        .modules
        .get_mut(&module_root)
        .and_then(|m| m.pieces.iter_mut().find(|p| p.root == root))
    {
        piece.index = index;
    }
    Ok(root)
}

/// Record which module key item the piece root hangs under and which module
/// key items hang under piece items, so a saved piece can re-reference its
/// surroundings on load.
pub fn cache_hierarchy(ctx: &mut Ctx<'_>, module_root: ItemId, piece_root: ItemId) {
    let Some(module) = ctx.rig.modules.get(&module_root) else {
        return;
    };
    let parent_key = ctx.scene.parent(piece_root).and_then(|parent| {
        module
            .key_items
            .iter()
            .find(|(_, id)| **id == parent)
            .map(|(key, _)| key.clone())
    });
    let mut children: Vec<(String, String)> = Vec::new();
    if let Some(piece) = module.pieces.iter().find(|p| p.root == piece_root) {
        for (module_key, module_item) in &module.key_items {
            let Some(parent) = ctx.scene.parent(*module_item) else {
                continue;
            };
            if let Some((piece_key, _)) = piece.key_items.iter().find(|(_, id)| **id == parent) {
                children.push((piece_key.clone(), module_key.clone()));
            }
        }
    }
    if let Some(record) = ctx.rig.items.get_mut(&piece_root) {
        match parent_key {
            Some(key) => record.settings.set(tags::SET_HIER_PARENT, json!(key)),
            None => {
                record.settings.remove(tags::SET_HIER_PARENT);
            }
        }
        record.settings.set(tags::SET_HIER_CHILD, json!(children));
    }
    item::flush_settings(ctx, piece_root);
}

/// Inverse of [`cache_hierarchy`]: re-parent the piece root and the cached
/// module items from the identifiers stored in settings.
pub fn restore_hierarchy(ctx: &mut Ctx<'_>, module_root: ItemId, piece_root: ItemId) {
    let parent_key = ctx
        .rig
        .items
        .get(&piece_root)
        .and_then(|r| r.settings.get_str(tags::SET_HIER_PARENT))
        .map(str::to_string);
    let children: Vec<(String, String)> = ctx
        .rig
        .items
        .get(&piece_root)
        .and_then(|r| r.settings.get(tags::SET_HIER_CHILD))
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();

    if let Some(key) = parent_key {
        if let Some(parent) = crate::module::key_item(ctx, module_root, &key) {
            ctx.scene.set_parent(piece_root, Some(parent));
        }
    }
    for (piece_key, module_key) in children {
        let parent = ctx
            .rig
            .modules
            .get(&module_root)
            .and_then(|m| m.pieces.iter().find(|p| p.root == piece_root))
            .and_then(|p| p.key_items.get(&piece_key).copied());
        let child = crate::module::key_item(ctx, module_root, &module_key);
        if let (Some(parent), Some(child)) = (parent, child) {
            ctx.scene.set_parent(child, Some(parent));
        }
    }
}

/// Bring the module's serial chain for `factory_ident` to exactly `count`
/// pieces: build additions at the tail, delete removals from the tail, then
/// rewire, re-fit and persist.
pub fn install_serial_pieces(
    ctx: &mut Ctx<'_>,
    module_root: ItemId,
    count: u32,
    factory_ident: &str,
) -> Result<()> {
    let factory = ctx
        .service
        .registry
        .get_as::<PieceFactory>(ComponentKind::ComponentSetup, factory_ident)
        .cloned()
        .ok_or_else(|| RigError::Lookup(format!("piece factory '{factory_ident}'")))?;

    let mut chain = serial_chain(ctx, module_root, &factory.ident);
    while chain.len() as u32 > count {
        if let Some(root) = chain.pop() {
            remove_piece(ctx, module_root, root);
        }
    }
    while (chain.len() as u32) < count {
        let index = chain.len() as u32 + 1;
        let prev_root = chain.last().copied();
        let mut piece = (factory.build)(ctx, module_root, index)?;
        piece.factory = factory.ident.clone();
        piece.index = index;
        for (child_key, parent_key) in &factory.piece_hierarchy {
            let child = piece.key_items.get(child_key).copied();
            let parent = match prev_root {
                Some(prev) => piece_key_item(ctx, module_root, prev, parent_key),
                None => crate::module::key_item(ctx, module_root, parent_key),
            };
            if let (Some(child), Some(parent)) = (child, parent) {
                ctx.scene.set_parent(child, Some(parent));
            }
        }
        let root = piece.root;
        let setup = piece.setup;
        if let Some(module) = ctx.rig.modules.get_mut(&module_root) {
            module.pieces.push(piece);
        }
        // names rendered during build predate registration; the serial token
        // only resolves now
        render_piece_names(ctx, setup);
        chain.push(root);
    }

    rewire_serial_connections(ctx, module_root, &chain);
    if let Some(tail) = chain.last().copied() {
        for (module_key, tail_key) in &factory.module_hierarchy {
            let child = crate::module::key_item(ctx, module_root, module_key);
            let parent = piece_key_item(ctx, module_root, tail, tail_key);
            if let (Some(child), Some(parent)) = (child, parent) {
                ctx.scene.set_parent(child, Some(parent));
            }
        }
    }
    if let Some(guide_key) = &factory.guide_key {
        fit_guide_chain(ctx, module_root, &chain, guide_key)?;
    }
    if let Some(hook) = factory.on_piece_added {
        for (ix, root) in chain.iter().enumerate() {
            let prev = ix.checked_sub(1).and_then(|p| chain.get(p)).copied();
            let next = chain.get(ix + 1).copied();
            hook(ctx, *root, prev, next)?;
        }
    }
    persist_counts(ctx, module_root, &factory, chain.len() as u32)?;
    Ok(())
}

fn serial_chain(ctx: &Ctx<'_>, module_root: ItemId, factory_ident: &str) -> Vec<ItemId> {
    let Some(module) = ctx.rig.modules.get(&module_root) else {
        return Vec::new();
    };
    let mut pieces: Vec<(u32, ItemId)> = module
        .pieces
        .iter()
        .filter(|p| p.factory == factory_ident)
        .map(|p| (p.index, p.root))
        .collect();
    pieces.sort_by_key(|(index, _)| *index);
    pieces.into_iter().map(|(_, root)| root).collect()
}

fn piece_key_item(
    ctx: &Ctx<'_>,
    module_root: ItemId,
    piece_root: ItemId,
    key: &str,
) -> Option<ItemId> {
    ctx.rig
        .modules
        .get(&module_root)
        .and_then(|m| m.pieces.iter().find(|p| p.root == piece_root))
        .and_then(|p| p.key_items.get(key).copied())
}

fn render_piece_names(ctx: &mut Ctx<'_>, setup: SetupId) {
    let members = ctx
        .rig
        .setups
        .get(setup)
        .map(|s| {
            let mut v = s.members.clone();
            v.push(s.root);
            v
        })
        .unwrap_or_default();
    for member in members {
        if ctx.rig.items.contains_key(&member) {
            item::render_name(ctx, member);
        }
    }
}

/// Clear and rebuild every prefix-wired connection of the chain, plus the
/// `first__`/`last__` bindings on the module's guide and rig assemblies.
fn rewire_serial_connections(ctx: &mut Ctx<'_>, module_root: ItemId, chain: &[ItemId]) {
    let Some((guide_asm, rig_asm)) = ctx
        .rig
        .modules
        .get(&module_root)
        .map(|m| (m.guide_assembly, m.rig_assembly))
    else {
        return;
    };
    let assemblies: Vec<ItemId> = chain
        .iter()
        .filter_map(|root| {
            ctx.rig
                .modules
                .get(&module_root)
                .and_then(|m| m.pieces.iter().find(|p| p.root == *root))
                .and_then(|p| assembly(ctx, p))
        })
        .collect();

    for (ix, asm) in assemblies.iter().copied().enumerate() {
        for channel in ctx.scene.channel_names(asm) {
            let (source_item, name) = if let Some(name) = channel.strip_prefix(PREFIX_GUIDE) {
                (Some(guide_asm), name)
            } else if let Some(name) = channel.strip_prefix(PREFIX_MODULE) {
                (Some(module_root), name)
            } else if let Some(name) = channel.strip_prefix(PREFIX_RIG) {
                (Some(rig_asm), name)
            } else if let Some(name) = channel.strip_prefix(PREFIX_NEXT) {
                (neighbour_or_fallback(ctx, assemblies.get(ix + 1), guide_asm, rig_asm, name), name)
            } else if let Some(name) = channel.strip_prefix(PREFIX_PREV) {
                let prev = ix.checked_sub(1).and_then(|p| assemblies.get(p));
                (neighbour_or_fallback(ctx, prev, guide_asm, rig_asm, name), name)
            } else {
                continue;
            };
            relink(ctx, source_item, name, asm, &channel);
        }
    }

    for module_item in [guide_asm, rig_asm] {
        for channel in ctx.scene.channel_names(module_item) {
            let (piece_asm, name) = if let Some(name) = channel.strip_prefix(PREFIX_FIRST) {
                (assemblies.first().copied(), name)
            } else if let Some(name) = channel.strip_prefix(PREFIX_LAST) {
                (assemblies.last().copied(), name)
            } else {
                continue;
            };
            relink(ctx, piece_asm, name, module_item, &channel);
        }
    }
}

fn neighbour_or_fallback(
    ctx: &Ctx<'_>,
    neighbour: Option<&ItemId>,
    guide_asm: ItemId,
    rig_asm: ItemId,
    name: &str,
) -> Option<ItemId> {
    if let Some(asm) = neighbour {
        return Some(*asm);
    }
    if ctx.scene.has_channel(rig_asm, name) {
        Some(rig_asm)
    } else if ctx.scene.has_channel(guide_asm, name) {
        Some(guide_asm)
    } else {
        None
    }
}

fn relink(ctx: &mut Ctx<'_>, source: Option<ItemId>, name: &str, dst: ItemId, dst_channel: &str) {
    for (old_src, old_channel) in ctx.scene.links_into(dst, dst_channel) {
        ctx.scene.unlink((old_src, &old_channel), (dst, dst_channel));
    }
    let Some(source) = source else {
        return;
    };
    if !ctx.scene.has_channel(source, name) {
        return;
    }
    if let Err(err) = ctx.scene.link((source, name), (dst, dst_channel)) {
        log::warn!("serial wiring '{dst_channel}' failed: {err}");
    }
}

/// Linearly interpolate piece guide positions between the module's
/// chain-start and chain-end guides, and draw item links between
/// neighbouring guides.
fn fit_guide_chain(
    ctx: &mut Ctx<'_>,
    module_root: ItemId,
    chain: &[ItemId],
    guide_key: &str,
) -> Result<()> {
    let guides: Vec<ItemId> = chain
        .iter()
        .filter_map(|root| piece_key_item(ctx, module_root, *root, guide_key))
        .collect();
    if guides.is_empty() {
        return Ok(());
    }
    let start = crate::module::key_item(ctx, module_root, KEY_CHAIN_START)
        .and_then(|item| ctx.scene.world_transform(item));
    let end = crate::module::key_item(ctx, module_root, KEY_CHAIN_END)
        .and_then(|item| ctx.scene.world_transform(item));
    if let (Some(start), Some(end)) = (start, end) {
        let count = guides.len() as f32;
        for (ix, guide) in guides.iter().copied().enumerate() {
            let t = (ix as f32 + 1.0) / (count + 1.0);
            let target = Transform::from_pos(vec3_lerp(start.pos, end.pos, t));
            ctx.scene.match_world_transform(guide, &target, true, false);
        }
    }
    for pair in guides.windows(2) {
        features::add_feature(ctx, pair[0], features::FEAT_ITEM_LINK)?;
        item_link::set_target(ctx, pair[0], Some(pair[1]));
    }
    Ok(())
}

fn persist_counts(
    ctx: &mut Ctx<'_>,
    module_root: ItemId,
    factory: &PieceFactory,
    count: u32,
) -> Result<()> {
    let Some(rig_asm) = ctx.rig.modules.get(&module_root).map(|m| m.rig_assembly) else {
        return Ok(());
    };
    for (channel, value) in [
        (CHAN_PIECE_COUNT, count as i32),
        (
            CHAN_PIECE_LAST_SERIAL,
            (factory.sequence_start + count).saturating_sub(1) as i32,
        ),
    ] {
        if !ctx.scene.has_channel(rig_asm, channel) {
            ctx.scene
                .add_channel(rig_asm, channel, ChannelType::Int, Value::Int(0))?;
        }
        ctx.scene.write(
            rig_asm,
            channel,
            Value::Int(value),
            0.0,
            ChannelAction::Setup,
            false,
        )?;
    }
    Ok(())
}
