//! Component setups: a container assembly plus a root item.
//!
//! Invariant A (containment): every locator-type item in the assembly is
//! also in the hierarchy rooted at the setup root; `self_validate` repairs
//! violations. Invariant B (single home): an item is in at most one setup.
//! Invariant C: a setup flagged `self_destroy_when_empty` removes itself
//! when its assembly empties out.

use crate::events::Event;
use crate::service::Ctx;
use crate::tags::{GRAPH_SETUP, TAG_SETUP};
use indexmap::IndexMap;
use rigkit_api_core::{HostType, ItemId, Scene};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct SetupId(pub u32);

#[derive(Clone, Debug)]
pub struct ComponentSetup {
    pub id: SetupId,
    pub identifier: String,
    pub root: ItemId,
    pub assembly: ItemId,
    pub parent: Option<SetupId>,
    pub children: Vec<SetupId>,
    /// Assembly membership in add order; the root item is not a member.
    pub members: Vec<ItemId>,
    pub self_destroy_when_empty: bool,
    pub description: Option<String>,
    pub create_drop_script: Option<String>,
}

/// Arena of setups owned by a rig. Ids are rig-scoped and never reused.
#[derive(Default)]
pub struct Setups {
    next: u32,
    map: IndexMap<SetupId, ComponentSetup>,
}

impl Setups {
    pub fn get(&self, id: SetupId) -> Option<&ComponentSetup> {
        self.map.get(&id)
    }

    pub fn get_mut(&mut self, id: SetupId) -> Option<&mut ComponentSetup> {
        self.map.get_mut(&id)
    }

    pub fn ids(&self) -> Vec<SetupId> {
        self.map.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentSetup> {
        self.map.values()
    }

    fn insert(&mut self, mut setup: ComponentSetup) -> SetupId {
        let id = SetupId(self.next);
        self.next += 1;
        setup.id = id;
        self.map.insert(id, setup);
        id
    }

    fn remove(&mut self, id: SetupId) -> Option<ComponentSetup> {
        self.map.shift_remove(&id)
    }
}

/// Create a setup over an existing root and assembly. Root and assembly are
/// tagged with the setup identifier and wired through the setup graph; with
/// a parent, the assembly nests under the parent assembly.
pub fn new_setup(
    ctx: &mut Ctx<'_>,
    identifier: &str,
    root: ItemId,
    assembly: ItemId,
    parent: Option<SetupId>,
) -> SetupId {
    ctx.scene.set_tag(root, TAG_SETUP, Some(identifier));
    ctx.scene.set_tag(assembly, TAG_SETUP, Some(identifier));
    ctx.scene.graph_connect(GRAPH_SETUP, assembly, root);

    if let Some(parent_id) = parent {
        if let Some(parent_setup) = ctx.rig.setups.get(parent_id) {
            let parent_assembly = parent_setup.assembly;
            ctx.scene.set_parent(assembly, Some(parent_assembly));
        }
    }

    let id = ctx.rig.setups.insert(ComponentSetup {
        id: SetupId(0), // replaced by the arena
        identifier: identifier.to_string(),
        root,
        assembly,
        parent,
        children: Vec::new(),
        members: Vec::new(),
        self_destroy_when_empty: false,
        description: None,
        create_drop_script: None,
    });
    if let Some(parent_id) = parent {
        if let Some(parent_setup) = ctx.rig.setups.get_mut(parent_id) {
            parent_setup.children.push(id);
        }
    }
    id
}

/// Walk up to the topmost parent setup.
pub fn root_setup(ctx: &Ctx<'_>, mut id: SetupId) -> SetupId {
    while let Some(parent) = ctx.rig.setups.get(id).and_then(|s| s.parent) {
        id = parent;
    }
    id
}

/// Add an item to a setup. Groups route to sub-assembly nesting; locator
/// items not already under the setup root are reparented there; an item
/// homed elsewhere is transferred (`ItemRemoved` fires against the old
/// setup before the move completes).
pub fn add_item(ctx: &mut Ctx<'_>, setup: SetupId, item: ItemId, add_hierarchy: bool) {
    let Some(host_type) = ctx.scene.host_type(item) else {
        return;
    };
    let previous = ctx.rig.items.get(&item).and_then(|r| r.setup);
    if previous == Some(setup) {
        return;
    }
    if let Some(old) = previous {
        ctx.post(Event::ItemRemoved { item, setup: old });
        if let Some(old_setup) = ctx.rig.setups.get_mut(old) {
            old_setup.members.retain(|m| *m != item);
        }
        maybe_self_destroy(ctx, old);
    }

    let Some(s) = ctx.rig.setups.get(setup) else {
        return;
    };
    let root = s.root;
    if let Some(record) = ctx.rig.items.get_mut(&item) {
        record.setup = Some(setup);
    }
    if let Some(s) = ctx.rig.setups.get_mut(setup) {
        if !s.members.contains(&item) {
            s.members.push(item);
        }
    }

    // invariant A: locator items live under the setup root; groups nest
    // under the assembly instead
    if host_type.is_group() {
        add_sub_assembly(ctx, setup, item);
    } else if host_type.is_locator() && !in_hierarchy(ctx.scene, root, item) {
        ctx.scene.set_parent(item, Some(root));
    }

    ctx.post(Event::ItemAdded { item, setup });

    if add_hierarchy {
        for child in ctx.scene.children(item) {
            if ctx.rig.items.contains_key(&child) {
                add_item(ctx, setup, child, true);
            }
        }
    }
}

fn add_sub_assembly(ctx: &mut Ctx<'_>, setup: SetupId, group: ItemId) {
    if let Some(s) = ctx.rig.setups.get(setup) {
        let assembly = s.assembly;
        ctx.scene.set_parent(group, Some(assembly));
    }
}

/// Remove an item from its setup and unparent it.
pub fn remove_item(ctx: &mut Ctx<'_>, setup: SetupId, item: ItemId) {
    clear_item(ctx, setup, item);
    ctx.scene.set_parent(item, None);
}

/// Remove from the setup but leave hierarchy parenting intact.
pub fn clear_item(ctx: &mut Ctx<'_>, setup: SetupId, item: ItemId) {
    let homed = ctx.rig.items.get(&item).and_then(|r| r.setup) == Some(setup);
    if !homed {
        return;
    }
    ctx.post(Event::ItemRemoved { item, setup });
    if let Some(s) = ctx.rig.setups.get_mut(setup) {
        s.members.retain(|m| *m != item);
    }
    if let Some(record) = ctx.rig.items.get_mut(&item) {
        record.setup = None;
    }
    maybe_self_destroy(ctx, setup);
}

/// Invariant C. A self-destroying setup whose assembly emptied removes
/// itself: members gone, host assembly deleted, root untagged.
pub fn maybe_self_destroy(ctx: &mut Ctx<'_>, setup: SetupId) {
    let Some(s) = ctx.rig.setups.get(setup) else {
        return;
    };
    if !s.self_destroy_when_empty || !s.members.is_empty() {
        return;
    }
    let (root, assembly, parent) = (s.root, s.assembly, s.parent);
    if let Some(parent_id) = parent {
        if let Some(p) = ctx.rig.setups.get_mut(parent_id) {
            p.children.retain(|c| *c != setup);
        }
    }
    ctx.rig.setups.remove(setup);
    ctx.scene.set_tag(root, TAG_SETUP, None);
    ctx.scene.graph_disconnect(GRAPH_SETUP, assembly, root);
    ctx.scene.delete_item(assembly);
}

/// Enforce invariant A over the current membership.
pub fn self_validate(ctx: &mut Ctx<'_>, setup: SetupId) {
    let Some(s) = ctx.rig.setups.get(setup) else {
        return;
    };
    let root = s.root;
    let members = s.members.clone();
    for item in members {
        let locator = ctx
            .scene
            .host_type(item)
            .map(|t| t.is_locator())
            .unwrap_or(false);
        if locator && !in_hierarchy(ctx.scene, root, item) {
            ctx.scene.set_parent(item, Some(root));
        }
    }
}

/// Deterministic iteration: members in add order, then sub-setup members
/// depth-first when requested. The callback may inspect but not mutate.
pub fn iterate_over_items(
    ctx: &Ctx<'_>,
    setup: SetupId,
    include_subassemblies: bool,
    cb: &mut dyn FnMut(ItemId),
) {
    let Some(s) = ctx.rig.setups.get(setup) else {
        return;
    };
    for item in &s.members {
        cb(*item);
    }
    if include_subassemblies {
        for child in s.children.clone() {
            iterate_over_items(ctx, child, true, cb);
        }
    }
}

/// Depth-first over the hierarchy rooted at the setup root, children in
/// host-defined order.
pub fn iterate_over_hierarchy(
    scene: &dyn Scene,
    root: ItemId,
    include_root: bool,
    cb: &mut dyn FnMut(ItemId),
) {
    if include_root {
        cb(root);
    }
    for child in scene.children(root) {
        iterate_over_hierarchy(scene, child, true, cb);
    }
}

pub fn in_hierarchy(scene: &dyn Scene, root: ItemId, item: ItemId) -> bool {
    let mut current = Some(item);
    while let Some(id) = current {
        if id == root {
            return true;
        }
        current = scene.parent(id);
    }
    false
}

/// Save the setup as a host assembly preset: temporarily attach the
/// declared create-drop script, select the assembly, run the host preset
/// save with the declared description, then detach the script.
pub fn save(ctx: &mut Ctx<'_>, setup: SetupId, filename: &str) -> anyhow::Result<()> {
    let Some(s) = ctx.rig.setups.get(setup) else {
        anyhow::bail!("setup {setup:?} does not exist");
    };
    let (assembly, drop_script, description) = (
        s.assembly,
        s.create_drop_script.clone(),
        s.description.clone().unwrap_or_default(),
    );
    if let Some(script) = &drop_script {
        ctx.scene
            .set_tag(assembly, crate::tags::TAG_DROP_SCRIPT, Some(script));
    }
    ctx.scene.select(&[assembly], false);
    let result = ctx
        .scene
        .run_command(&format!("preset.save \"{filename}\" \"{description}\""));
    if drop_script.is_some() {
        ctx.scene
            .set_tag(assembly, crate::tags::TAG_DROP_SCRIPT, None);
    }
    result.map_err(anyhow::Error::from)
}
