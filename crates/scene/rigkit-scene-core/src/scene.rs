//! MemoryScene: the reference `Scene` implementation.

use hashbrown::HashMap;
use indexmap::IndexMap;
use rigkit_api_core::transform::{mat4_mul, Transform};
use rigkit_api_core::{
    ChannelAction, ChannelType, HostType, IdAllocator, ItemId, ModifierKind, Scene, SceneError,
    Value,
};

use crate::channel::Channel;

const POS: [&str; 3] = ["pos.X", "pos.Y", "pos.Z"];
const ROT: [&str; 3] = ["rot.X", "rot.Y", "rot.Z"];
const SCL: [&str; 3] = ["scl.X", "scl.Y", "scl.Z"];

#[derive(Clone, Debug)]
struct ModifierRec {
    kind: ModifierKind,
    driven: ItemId,
    driver: ItemId,
}

#[derive(Clone, Debug)]
struct ItemRec {
    host_type: HostType,
    name: String,
    parent: Option<ItemId>,
    children: Vec<ItemId>,
    tags: IndexMap<String, String>,
    packages: Vec<String>,
    channels: IndexMap<String, Channel>,
    world: Transform,
    modifier: Option<ModifierRec>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct LinkRec {
    src: (ItemId, String),
    dst: (ItemId, String),
}

/// In-memory host scene. Items live in a map keyed by dense ids; creation
/// order is tracked separately so every enumeration the bridge promises to
/// be deterministic actually is.
#[derive(Default)]
pub struct MemoryScene {
    alloc: IdAllocator,
    items: HashMap<ItemId, ItemRec>,
    order: Vec<ItemId>,
    links: Vec<LinkRec>,
    graphs: IndexMap<String, Vec<(ItemId, ItemId)>>,
    selection: Vec<ItemId>,
    time: f32,
    /// Log of executed host command strings, for tests.
    pub command_log: Vec<String>,
    /// Log of posted notification channels, for tests.
    pub notify_log: Vec<String>,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    fn item(&self, id: ItemId) -> Option<&ItemRec> {
        self.items.get(&id)
    }

    fn item_mut(&mut self, id: ItemId) -> Option<&mut ItemRec> {
        self.items.get_mut(&id)
    }

    fn add_builtin_channels(rec: &mut ItemRec) {
        for (names, default) in [(POS, 0.0f32), (ROT, 0.0), (SCL, 1.0)] {
            for name in names {
                rec.channels.insert(
                    name.to_string(),
                    Channel::new(ChannelType::Float, Value::Float(default), false),
                );
            }
        }
        rec.channels.insert(
            "visible".to_string(),
            Channel::new(ChannelType::Bool, Value::Bool(true), false),
        );
        for name in ["wposMatrix", "wrotMatrix", "wsclMatrix"] {
            rec.channels.insert(
                name.to_string(),
                Channel::new(
                    ChannelType::Matrix,
                    Value::Matrix(Transform::identity().to_matrix()),
                    false,
                ),
            );
        }
    }

    fn read_triple(&self, id: ItemId, names: [&str; 3], action: ChannelAction) -> Option<[f32; 3]> {
        let rec = self.item(id)?;
        let mut out = [0.0f32; 3];
        for (slot, name) in out.iter_mut().zip(names) {
            *slot = rec.channels.get(name)?.layer(action).read(self.time).as_f32()?;
        }
        Some(out)
    }

    fn eval_triple(&self, rec: &ItemRec, names: [&str; 3]) -> [f32; 3] {
        let mut out = [0.0f32; 3];
        for (slot, name) in out.iter_mut().zip(names) {
            *slot = rec
                .channels
                .get(name)
                .map(|c| c.eval(self.time))
                .and_then(|v| v.as_f32())
                .unwrap_or(0.0);
        }
        out
    }

    fn write_triple(
        &mut self,
        id: ItemId,
        names: [&str; 3],
        values: [f32; 3],
        action: ChannelAction,
        key: bool,
    ) {
        let time = self.time;
        if let Some(rec) = self.item_mut(id) {
            for (name, v) in names.iter().zip(values) {
                if let Some(ch) = rec.channels.get_mut(*name) {
                    ch.layer_mut(action).write(Value::Float(v), time, key);
                }
            }
        }
    }

    fn local_eval(&self, rec: &ItemRec) -> Transform {
        Transform {
            pos: self.eval_triple(rec, POS),
            rot: self.eval_triple(rec, ROT),
            scale: self.eval_triple(rec, SCL),
        }
    }

    fn recompute_world(&mut self, id: ItemId, parent_world: Transform) {
        let local = match self.item(id) {
            Some(rec) => self.local_eval(rec),
            None => return,
        };
        let world = local.compose(&parent_world);
        let children = match self.item_mut(id) {
            Some(rec) => {
                rec.world = world;
                rec.children.clone()
            }
            None => return,
        };
        for child in children {
            self.recompute_world(child, world);
        }
    }

    fn recompute_subtree_below(&mut self, id: ItemId) {
        let (world, children) = match self.item(id) {
            Some(rec) => (rec.world, rec.children.clone()),
            None => return,
        };
        for child in children {
            self.recompute_world(child, world);
        }
    }

    fn update_matrix_channels(&mut self) {
        for id in self.order.clone() {
            let Some(rec) = self.items.get_mut(&id) else {
                continue;
            };
            let w = rec.world;
            let pos_m = Transform::from_pos(w.pos).to_matrix();
            let rot_m = Transform {
                pos: [0.0; 3],
                rot: w.rot,
                scale: [1.0; 3],
            }
            .to_matrix();
            let scl_m = Transform {
                pos: [0.0; 3],
                rot: [0.0; 3],
                scale: w.scale,
            }
            .to_matrix();
            for (name, m) in [
                ("wposMatrix", pos_m),
                ("wrotMatrix", rot_m),
                ("wsclMatrix", scl_m),
            ] {
                if let Some(ch) = rec.channels.get_mut(name) {
                    ch.eval_cache = Some(Value::Matrix(m));
                }
            }
        }
    }
}

impl Scene for MemoryScene {
    fn create_item(&mut self, host_type: HostType, name: &str) -> ItemId {
        let id = self.alloc.alloc();
        let mut rec = ItemRec {
            host_type,
            name: name.to_string(),
            parent: None,
            children: Vec::new(),
            tags: IndexMap::new(),
            packages: Vec::new(),
            channels: IndexMap::new(),
            world: Transform::identity(),
            modifier: None,
        };
        Self::add_builtin_channels(&mut rec);
        self.items.insert(id, rec);
        self.order.push(id);
        id
    }

    fn delete_item(&mut self, item: ItemId) {
        let Some(rec) = self.items.remove(&item) else {
            return;
        };
        if let Some(parent) = rec.parent {
            if let Some(p) = self.items.get_mut(&parent) {
                p.children.retain(|c| *c != item);
            }
        }
        // orphaned children move up to the deleted item's parent
        for child in rec.children {
            if let Some(c) = self.items.get_mut(&child) {
                c.parent = rec.parent;
            }
            if let Some(parent) = rec.parent {
                if let Some(p) = self.items.get_mut(&parent) {
                    p.children.push(child);
                }
            }
        }
        self.order.retain(|i| *i != item);
        self.links
            .retain(|l| l.src.0 != item && l.dst.0 != item);
        for edges in self.graphs.values_mut() {
            edges.retain(|(a, b)| *a != item && *b != item);
        }
        self.selection.retain(|i| *i != item);
    }

    fn exists(&self, item: ItemId) -> bool {
        self.items.contains_key(&item)
    }

    fn host_type(&self, item: ItemId) -> Option<HostType> {
        self.item(item).map(|r| r.host_type.clone())
    }

    fn replace_host_type(&mut self, item: ItemId, host_type: HostType) -> ItemId {
        let Some(mut rec) = self.items.remove(&item) else {
            return item;
        };
        rec.host_type = host_type;
        let new_id = self.alloc.alloc();

        if let Some(parent) = rec.parent {
            if let Some(p) = self.items.get_mut(&parent) {
                for c in &mut p.children {
                    if *c == item {
                        *c = new_id;
                    }
                }
            }
        }
        for child in &rec.children {
            if let Some(c) = self.items.get_mut(child) {
                c.parent = Some(new_id);
            }
        }
        for l in &mut self.links {
            if l.src.0 == item {
                l.src.0 = new_id;
            }
            if l.dst.0 == item {
                l.dst.0 = new_id;
            }
        }
        for edges in self.graphs.values_mut() {
            for (a, b) in edges.iter_mut() {
                if *a == item {
                    *a = new_id;
                }
                if *b == item {
                    *b = new_id;
                }
            }
        }
        for s in &mut self.selection {
            if *s == item {
                *s = new_id;
            }
        }
        for o in &mut self.order {
            if *o == item {
                *o = new_id;
            }
        }
        self.items.insert(new_id, rec);
        new_id
    }

    fn all_items(&self) -> Vec<ItemId> {
        self.order.clone()
    }

    fn name(&self, item: ItemId) -> Option<String> {
        self.item(item).map(|r| r.name.clone())
    }

    fn set_name(&mut self, item: ItemId, name: &str) {
        if let Some(rec) = self.item_mut(item) {
            rec.name = name.to_string();
        }
    }

    fn parent(&self, item: ItemId) -> Option<ItemId> {
        self.item(item).and_then(|r| r.parent)
    }

    fn children(&self, item: ItemId) -> Vec<ItemId> {
        self.item(item).map(|r| r.children.clone()).unwrap_or_default()
    }

    fn set_parent(&mut self, item: ItemId, parent: Option<ItemId>) {
        let old = self.parent(item);
        if old == parent || Some(item) == parent {
            return;
        }
        if let Some(old_parent) = old {
            if let Some(p) = self.items.get_mut(&old_parent) {
                p.children.retain(|c| *c != item);
            }
        }
        if let Some(new_parent) = parent {
            if let Some(p) = self.items.get_mut(&new_parent) {
                p.children.push(item);
            }
        }
        if let Some(rec) = self.item_mut(item) {
            rec.parent = parent;
        }
    }

    fn tag(&self, item: ItemId, key: &str) -> Option<String> {
        self.item(item).and_then(|r| r.tags.get(key).cloned())
    }

    fn set_tag(&mut self, item: ItemId, key: &str, value: Option<&str>) {
        if let Some(rec) = self.item_mut(item) {
            match value {
                Some(v) => {
                    rec.tags.insert(key.to_string(), v.to_string());
                }
                None => {
                    rec.tags.shift_remove(key);
                }
            }
        }
    }

    fn tag_keys(&self, item: ItemId) -> Vec<String> {
        self.item(item)
            .map(|r| r.tags.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn add_package(&mut self, item: ItemId, package: &str) {
        if let Some(rec) = self.item_mut(item) {
            if !rec.packages.iter().any(|p| p == package) {
                rec.packages.push(package.to_string());
            }
        }
    }

    fn remove_package(&mut self, item: ItemId, package: &str) {
        if let Some(rec) = self.item_mut(item) {
            rec.packages.retain(|p| p != package);
        }
    }

    fn packages(&self, item: ItemId) -> Vec<String> {
        self.item(item).map(|r| r.packages.clone()).unwrap_or_default()
    }

    fn add_channel(
        &mut self,
        item: ItemId,
        name: &str,
        ty: ChannelType,
        default: Value,
    ) -> Result<(), SceneError> {
        let rec = self
            .item_mut(item)
            .ok_or(SceneError::MissingItem(item))?;
        rec.channels
            .entry(name.to_string())
            .or_insert_with(|| Channel::new(ty, default, true));
        Ok(())
    }

    fn remove_channel(&mut self, item: ItemId, name: &str) {
        if let Some(rec) = self.item_mut(item) {
            if rec.channels.get(name).map(|c| c.user).unwrap_or(false) {
                rec.channels.shift_remove(name);
            }
        }
        self.links
            .retain(|l| !(l.src == (item, name.to_string())) && !(l.dst == (item, name.to_string())));
    }

    fn has_channel(&self, item: ItemId, name: &str) -> bool {
        self.item(item)
            .map(|r| r.channels.contains_key(name))
            .unwrap_or(false)
    }

    fn channel_names(&self, item: ItemId) -> Vec<String> {
        self.item(item)
            .map(|r| r.channels.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn read(
        &self,
        item: ItemId,
        channel: &str,
        time: f32,
        action: ChannelAction,
    ) -> Option<Value> {
        let ch = self.item(item)?.channels.get(channel)?;
        let layer = ch.layer(action);
        if action == ChannelAction::Edit && !layer.set {
            // unwritten edit layer falls through to setup
            return Some(ch.setup.read(time));
        }
        Some(layer.read(time))
    }

    fn read_eval(&self, item: ItemId, channel: &str, time: f32) -> Option<Value> {
        let ch = self.item(item)?.channels.get(channel)?;
        Some(ch.eval(time))
    }

    fn write(
        &mut self,
        item: ItemId,
        channel: &str,
        value: Value,
        time: f32,
        action: ChannelAction,
        key: bool,
    ) -> Result<(), SceneError> {
        let rec = self
            .item_mut(item)
            .ok_or(SceneError::MissingItem(item))?;
        let ch = rec
            .channels
            .get_mut(channel)
            .ok_or_else(|| SceneError::MissingChannel {
                item,
                channel: channel.to_string(),
            })?;
        ch.layer_mut(action).write(value, time, key);
        Ok(())
    }

    fn keyframes(&self, item: ItemId, channel: &str, action: ChannelAction) -> Vec<f32> {
        self.item(item)
            .and_then(|r| r.channels.get(channel))
            .map(|c| c.layer(action).keys.iter().map(|(t, _)| *t).collect())
            .unwrap_or_default()
    }

    fn remove_key(&mut self, item: ItemId, channel: &str, time: f32, action: ChannelAction) {
        if let Some(rec) = self.item_mut(item) {
            if let Some(ch) = rec.channels.get_mut(channel) {
                ch.layer_mut(action).remove_key(time);
            }
        }
    }

    fn is_animated(&self, item: ItemId, channel: &str) -> bool {
        self.item(item)
            .and_then(|r| r.channels.get(channel))
            .map(|c| !c.edit.keys.is_empty())
            .unwrap_or(false)
    }

    fn link(&mut self, src: (ItemId, &str), dst: (ItemId, &str)) -> Result<(), SceneError> {
        for (item, channel) in [src, dst] {
            if !self.has_channel(item, channel) {
                return Err(SceneError::MissingChannel {
                    item,
                    channel: channel.to_string(),
                });
            }
        }
        let rec = LinkRec {
            src: (src.0, src.1.to_string()),
            dst: (dst.0, dst.1.to_string()),
        };
        if !self.links.contains(&rec) {
            self.links.push(rec);
        }
        Ok(())
    }

    fn unlink(&mut self, src: (ItemId, &str), dst: (ItemId, &str)) {
        self.links.retain(|l| {
            !(l.src.0 == src.0 && l.src.1 == src.1 && l.dst.0 == dst.0 && l.dst.1 == dst.1)
        });
    }

    fn links_into(&self, item: ItemId, channel: &str) -> Vec<(ItemId, String)> {
        self.links
            .iter()
            .filter(|l| l.dst.0 == item && l.dst.1 == channel)
            .map(|l| l.src.clone())
            .collect()
    }

    fn links_out_of(&self, item: ItemId, channel: &str) -> Vec<(ItemId, String)> {
        self.links
            .iter()
            .filter(|l| l.src.0 == item && l.src.1 == channel)
            .map(|l| l.dst.clone())
            .collect()
    }

    fn graph_connect(&mut self, graph: &str, from: ItemId, to: ItemId) {
        let edges = self.graphs.entry(graph.to_string()).or_default();
        if !edges.contains(&(from, to)) {
            edges.push((from, to));
        }
    }

    fn graph_disconnect(&mut self, graph: &str, from: ItemId, to: ItemId) {
        if let Some(edges) = self.graphs.get_mut(graph) {
            edges.retain(|e| *e != (from, to));
        }
    }

    fn graph_forward(&self, graph: &str, from: ItemId) -> Vec<ItemId> {
        self.graphs
            .get(graph)
            .map(|edges| {
                edges
                    .iter()
                    .filter(|(a, _)| *a == from)
                    .map(|(_, b)| *b)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn graph_reverse(&self, graph: &str, to: ItemId) -> Vec<ItemId> {
        self.graphs
            .get(graph)
            .map(|edges| {
                edges
                    .iter()
                    .filter(|(_, b)| *b == to)
                    .map(|(a, _)| *a)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn graph_names(&self, item: ItemId) -> Vec<String> {
        self.graphs
            .iter()
            .filter(|(_, edges)| edges.iter().any(|(a, b)| *a == item || *b == item))
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn graph_clear_item(&mut self, graph: &str, item: ItemId) {
        if let Some(edges) = self.graphs.get_mut(graph) {
            edges.retain(|(a, b)| *a != item && *b != item);
        }
    }

    fn local_transform(&self, item: ItemId, action: ChannelAction) -> Option<Transform> {
        Some(Transform {
            pos: self.read_triple(item, POS, action)?,
            rot: self.read_triple(item, ROT, action)?,
            scale: self.read_triple(item, SCL, action)?,
        })
    }

    fn set_local_transform(
        &mut self,
        item: ItemId,
        xfrm: &Transform,
        action: ChannelAction,
        key: bool,
    ) {
        self.write_triple(item, POS, xfrm.pos, action, key);
        self.write_triple(item, ROT, xfrm.rot, action, key);
        self.write_triple(item, SCL, xfrm.scale, action, key);
    }

    fn world_transform(&self, item: ItemId) -> Option<Transform> {
        self.item(item).map(|r| r.world)
    }

    fn match_world_transform(&mut self, item: ItemId, target: &Transform, pos: bool, rot: bool) {
        let Some(rec) = self.item(item) else {
            return;
        };
        let current = rec.world;
        let parent_world = rec
            .parent
            .and_then(|p| self.item(p))
            .map(|p| p.world)
            .unwrap_or_else(Transform::identity);
        let desired = Transform {
            pos: if pos { target.pos } else { current.pos },
            rot: if rot { target.rot } else { current.rot },
            scale: current.scale,
        };
        let local = desired.relative_to(&parent_world);
        if pos {
            self.write_triple(item, POS, local.pos, ChannelAction::Edit, true);
        }
        if rot {
            self.write_triple(item, ROT, local.rot, ChannelAction::Edit, true);
        }
        if let Some(rec) = self.item_mut(item) {
            rec.world = desired;
        }
        self.recompute_subtree_below(item);
    }

    fn adjust_euler(&mut self, item: ItemId) {
        if let Some(rot) = self.read_triple(item, ROT, ChannelAction::Edit) {
            let mut t = Transform::identity();
            t.rot = rot;
            t.adjust_euler();
            self.write_triple(item, ROT, t.rot, ChannelAction::Edit, true);
        }
    }

    fn add_modifier(&mut self, kind: ModifierKind, driven: ItemId, driver: ItemId) -> ItemId {
        let id = self.create_item(HostType::Modifier, "modifier");
        if let Some(rec) = self.items.get_mut(&id) {
            rec.modifier = Some(ModifierRec {
                kind,
                driven,
                driver,
            });
            rec.channels.insert(
                "enable".to_string(),
                Channel::new(ChannelType::Bool, Value::Bool(true), false),
            );
            for prefix in ["offset.pos", "offset.rot"] {
                for axis in ["X", "Y", "Z"] {
                    rec.channels.insert(
                        format!("{prefix}.{axis}"),
                        Channel::new(ChannelType::Float, Value::Float(0.0), false),
                    );
                }
            }
        }
        id
    }

    fn modifier_kind(&self, modifier: ItemId) -> Option<ModifierKind> {
        self.item(modifier).and_then(|r| r.modifier.as_ref()).map(|m| m.kind)
    }

    fn modifier_driven(&self, modifier: ItemId) -> Option<ItemId> {
        self.item(modifier)
            .and_then(|r| r.modifier.as_ref())
            .map(|m| m.driven)
    }

    fn modifier_driver(&self, modifier: ItemId) -> Option<ItemId> {
        self.item(modifier)
            .and_then(|r| r.modifier.as_ref())
            .map(|m| m.driver)
    }

    fn select(&mut self, items: &[ItemId], add: bool) {
        if !add {
            self.selection.clear();
        }
        for item in items {
            if self.items.contains_key(item) && !self.selection.contains(item) {
                self.selection.push(*item);
            }
        }
    }

    fn selection(&self) -> Vec<ItemId> {
        self.selection.clone()
    }

    fn run_command(&mut self, command: &str) -> Result<(), SceneError> {
        self.command_log.push(command.to_string());
        Ok(())
    }

    fn notify(&mut self, channel: &str) {
        self.notify_log.push(channel.to_string());
    }

    fn time(&self) -> f32 {
        self.time
    }

    fn set_time(&mut self, time: f32) {
        self.time = time;
    }

    fn evaluate(&mut self) {
        // clear propagation caches
        for rec in self.items.values_mut() {
            for ch in rec.channels.values_mut() {
                ch.eval_cache = None;
            }
        }

        // 1. channel links, insertion order, single deterministic pass
        let time = self.time;
        for link in self.links.clone() {
            let Some(value) = self.read_eval(link.src.0, &link.src.1, time) else {
                continue;
            };
            if let Some(rec) = self.items.get_mut(&link.dst.0) {
                if let Some(ch) = rec.channels.get_mut(&link.dst.1) {
                    ch.eval_cache = Some(value);
                }
            }
        }

        // 2. world transforms depth-first from roots, children in host order
        let roots: Vec<ItemId> = self
            .order
            .iter()
            .copied()
            .filter(|id| self.item(*id).map(|r| r.parent.is_none()).unwrap_or(false))
            .collect();
        for root in roots {
            self.recompute_world(root, Transform::identity());
        }

        // 3. modifiers in creation order; each one re-floods its driven subtree
        for id in self.order.clone() {
            let Some(m) = self.item(id).and_then(|r| r.modifier.clone()) else {
                continue;
            };
            let enabled = self
                .read_eval(id, "enable", time)
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if !enabled {
                continue;
            }
            let Some(driver_world) = self.world_transform(m.driver) else {
                continue;
            };
            let new_world = match m.kind {
                ModifierKind::WorldFeed => driver_world,
                ModifierKind::DynaParent | ModifierKind::DynaParentNoScale => {
                    let base = if m.kind == ModifierKind::DynaParentNoScale {
                        Transform {
                            scale: [1.0; 3],
                            ..driver_world
                        }
                    } else {
                        driver_world
                    };
                    let offset = match self.item(id) {
                        Some(rec) => Transform {
                            pos: self
                                .eval_triple(rec, ["offset.pos.X", "offset.pos.Y", "offset.pos.Z"]),
                            rot: self
                                .eval_triple(rec, ["offset.rot.X", "offset.rot.Y", "offset.rot.Z"]),
                            scale: [1.0; 3],
                        },
                        None => Transform::identity(),
                    };
                    Transform::from_matrix(&mat4_mul(
                        &base.to_matrix(),
                        &offset.to_matrix(),
                    ))
                }
            };
            if let Some(rec) = self.items.get_mut(&m.driven) {
                rec.world = new_world;
            }
            self.recompute_subtree_below(m.driven);
        }

        // 4. world matrix output channels
        self.update_matrix_channels();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn hierarchy_world_transforms() {
        let mut scene = MemoryScene::new();
        let root = scene.create_item(HostType::Locator, "root");
        let child = scene.create_item(HostType::Locator, "child");
        scene.set_parent(child, Some(root));
        scene
            .write(root, "pos.X", Value::Float(2.0), 0.0, ChannelAction::Setup, false)
            .unwrap();
        scene
            .write(child, "pos.Y", Value::Float(3.0), 0.0, ChannelAction::Setup, false)
            .unwrap();
        scene.evaluate();
        let w = scene.world_transform(child).unwrap();
        assert!(close(w.pos[0], 2.0) && close(w.pos[1], 3.0));
    }

    #[test]
    fn dyna_parent_modifier_follows_driver() {
        let mut scene = MemoryScene::new();
        let driver = scene.create_item(HostType::Locator, "driver");
        let driven = scene.create_item(HostType::Locator, "driven");
        let modifier = scene.add_modifier(ModifierKind::DynaParent, driven, driver);
        scene
            .write(driver, "pos.X", Value::Float(5.0), 0.0, ChannelAction::Setup, false)
            .unwrap();
        scene
            .write(
                modifier,
                "offset.pos.Y",
                Value::Float(1.0),
                0.0,
                ChannelAction::Setup,
                false,
            )
            .unwrap();
        scene.evaluate();
        let w = scene.world_transform(driven).unwrap();
        assert!(close(w.pos[0], 5.0) && close(w.pos[1], 1.0));
    }

    #[test]
    fn links_propagate_on_evaluate() {
        let mut scene = MemoryScene::new();
        let a = scene.create_item(HostType::Locator, "a");
        let b = scene.create_item(HostType::Locator, "b");
        scene
            .add_channel(a, "out", ChannelType::Float, Value::Float(0.0))
            .unwrap();
        scene
            .add_channel(b, "in", ChannelType::Float, Value::Float(0.0))
            .unwrap();
        scene.link((a, "out"), (b, "in")).unwrap();
        scene
            .write(a, "out", Value::Float(7.0), 0.0, ChannelAction::Setup, false)
            .unwrap();
        scene.evaluate();
        assert_eq!(scene.read_eval(b, "in", 0.0), Some(Value::Float(7.0)));
    }

    #[test]
    fn replace_host_type_remaps_references() {
        let mut scene = MemoryScene::new();
        let parent = scene.create_item(HostType::Assembly, "assm");
        let item = scene.create_item(HostType::Locator, "it");
        scene.set_parent(item, Some(parent));
        scene.graph_connect("g", parent, item);
        let new_id = scene.replace_host_type(item, HostType::Mesh);
        assert_ne!(new_id, item);
        assert!(!scene.exists(item));
        assert_eq!(scene.children(parent), vec![new_id]);
        assert_eq!(scene.graph_forward("g", parent), vec![new_id]);
        assert_eq!(scene.host_type(new_id), Some(HostType::Mesh));
    }

    #[test]
    fn match_world_transform_sets_keys() {
        let mut scene = MemoryScene::new();
        let root = scene.create_item(HostType::Locator, "root");
        let item = scene.create_item(HostType::Locator, "it");
        scene.set_parent(item, Some(root));
        scene
            .write(root, "pos.X", Value::Float(4.0), 0.0, ChannelAction::Setup, false)
            .unwrap();
        scene.evaluate();
        scene.set_time(10.0);
        scene.match_world_transform(item, &Transform::from_pos([6.0, 0.0, 0.0]), true, false);
        // local X must be 2 so world X is 6 under the parent at 4
        let v = scene
            .read(item, "pos.X", 10.0, ChannelAction::Edit)
            .unwrap()
            .as_f32()
            .unwrap();
        assert!(close(v, 2.0));
        assert_eq!(scene.keyframes(item, "pos.X", ChannelAction::Edit), vec![10.0]);
    }
}
