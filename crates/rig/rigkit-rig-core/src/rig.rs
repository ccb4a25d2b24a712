//! The rig aggregate: the top-level component instance and the arena every
//! other subsystem indexes into.
//!
//! Host items own nothing here; records, setups, modules and links all live
//! on the `Rig`, keyed by host item ids. Reverse lookups go through these
//! tables instead of walking the scene.

use crate::apply::ApplyBag;
use crate::color;
use crate::elements::{self, ElementSetDesc};
use crate::error::Result;
use crate::events::Event;
use crate::features;
use crate::item::{self, ItemTypeDesc, RigItemRecord, SideMode};
use crate::link::TransformLink;
use crate::module::Module;
use crate::naming::StandardNamingScheme;
use crate::rigclay::ClayRegion;
use crate::service::{Ctx, Service};
use crate::setup::{self, SetupId, Setups};
use crate::tags::{self, SYSTEM_VERSION, TAG_VERSION};
use hashbrown::HashMap;
use indexmap::IndexMap;
use rigkit_api_core::{ChannelType, HostType, ItemId, Scene, Side, Value};

pub struct Rig {
    pub root: ItemId,
    pub root_setup: SetupId,
    pub name: String,
    /// Registry identifiers of the active schemes.
    pub naming_scheme: String,
    pub color_scheme: String,
    pub version: u32,
    pub items: HashMap<ItemId, RigItemRecord>,
    pub setups: Setups,
    /// Modules keyed by their root item, in creation order.
    pub modules: IndexMap<ItemId, Module>,
    pub links: Vec<TransformLink>,
    /// Materialised meta-group items keyed by element-set identifier.
    pub meta_groups: IndexMap<String, ItemId>,
    /// Cross-handler scratch state of the guide-apply run in progress.
    pub apply_bag: ApplyBag,
    pub clay_regions: Vec<ClayRegion>,
}

impl Rig {
    /// Empty shell used while the root items are being materialised.
    fn shell() -> Rig {
        Rig {
            root: ItemId(u32::MAX),
            root_setup: SetupId(0),
            name: String::new(),
            naming_scheme: "standard".to_string(),
            color_scheme: "standard".to_string(),
            version: SYSTEM_VERSION,
            items: HashMap::new(),
            setups: Setups::default(),
            modules: IndexMap::new(),
            links: Vec::new(),
            meta_groups: IndexMap::new(),
            apply_bag: ApplyBag::default(),
            clay_regions: Vec::new(),
        }
    }

    /// Create a rig in the scene: root item, root assembly, root setup.
    pub fn create(scene: &mut dyn Scene, service: &mut Service, name: &str) -> Result<Rig> {
        let mut rig = Rig::shell();
        rig.name = name.to_string();

        let root = scene.create_item(HostType::Locator, name);
        let assembly = scene.create_item(HostType::Assembly, &format!("{name}_assembly"));
        rig.root = root;

        let mut ctx = Ctx::new(&mut rig, scene, service);
        let root_setup = setup::new_setup(&mut ctx, name, root, assembly, None);
        ctx.scene
            .set_tag(root, TAG_VERSION, Some(&SYSTEM_VERSION.to_string()));
        item::convert_item(
            &mut ctx,
            root,
            tags::TYPE_RIG_ROOT,
            name,
            SideMode::Own(Side::Center),
            Some(root_setup),
        )?;
        rig.root_setup = root_setup;
        Ok(rig)
    }

    /// Root item of the module this item belongs to, walking the setup
    /// parent chain up to the first module setup.
    pub fn module_of_item(&self, item: ItemId) -> Option<ItemId> {
        let mut setup = self.items.get(&item)?.setup?;
        loop {
            if let Some(root) = self.module_of_setup(setup) {
                return Some(root);
            }
            setup = self.setups.get(setup)?.parent?;
        }
    }

    pub fn module_of_setup(&self, setup: SetupId) -> Option<ItemId> {
        self.modules
            .iter()
            .find(|(_, m)| m.setup == setup)
            .map(|(root, _)| *root)
    }

    /// All items of one rig-item type, in arbitrary order.
    pub fn items_of_type(&self, item_type: &str) -> Vec<ItemId> {
        self.items
            .iter()
            .filter(|(_, r)| r.item_type == item_type)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn item_type(&self, item: ItemId) -> Option<&str> {
        self.items.get(&item).map(|r| r.item_type.as_str())
    }

    /// Settings on the rig root record.
    pub fn root_settings(&self) -> Option<&crate::settings::SettingsStore> {
        self.items.get(&self.root).map(|r| &r.settings)
    }

    pub fn root_settings_mut(&mut self) -> Option<&mut crate::settings::SettingsStore> {
        let root = self.root;
        self.items.get_mut(&root).map(|r| &mut r.settings)
    }
}

/// Rename the rig: re-render every item name and post `RigNameChanged`.
pub fn rename(ctx: &mut Ctx<'_>, name: &str) {
    ctx.rig.name = name.to_string();
    ctx.scene.set_name(ctx.rig.root, name);
    let items: Vec<ItemId> = ctx.rig.items.keys().copied().collect();
    for item in items {
        item::render_name(ctx, item);
    }
    let root = ctx.rig.root;
    ctx.post(Event::RigNameChanged { root });
}

/// Register every built-in system component and event handler. Call once
/// per service before creating rigs.
pub fn install_system(service: &mut Service) {
    register_item_types(service);
    features::register_builtin_features(service);
    register_element_sets(service);
    service.registry.register(Box::new(color::default_scheme()));
    service.registry.register(Box::new(StandardNamingScheme));
    crate::apply::register_handlers(service);
    service.bus.register(Box::new(elements::MetaGroupHandler));
    service.bus.register(Box::new(crate::rigclay::ClayHandler));
    service.register_scene_event(tags::DROP_PRESET, crate::preset::drop_content);
}

fn register_item_types(service: &mut Service) {
    let float = |name: &str| (name.to_string(), ChannelType::Float, Value::Float(0.0));
    let matrix = |name: &str| {
        (
            name.to_string(),
            ChannelType::Matrix,
            Value::Matrix(rigkit_api_core::transform::mat4_identity()),
        )
    };

    let mut module_root = ItemTypeDesc::plain(tags::TYPE_MODULE_ROOT, HostType::Locator);
    module_root.user_channels = vec![float("mirror.angle"), float("side.factor")];
    module_root.drop_script = Some(tags::DROP_MODULE.to_string());

    let mut ctrl = ItemTypeDesc::plain(tags::TYPE_CONTROLLER, HostType::Locator);
    ctrl.default_features = vec![
        features::FEAT_COLOR.to_string(),
        features::FEAT_CONTROLLER.to_string(),
    ];

    let mut ctrl_guide = ItemTypeDesc::plain(tags::TYPE_CONTROLLER_GUIDE, HostType::Locator);
    ctrl_guide.default_features = vec![
        features::FEAT_COLOR.to_string(),
        features::FEAT_CONTROLLER_GUIDE.to_string(),
    ];

    let mut guide = ItemTypeDesc::plain(tags::TYPE_GUIDE, HostType::Locator);
    guide.default_features = vec![features::FEAT_GUIDE.to_string()];

    let mut plug = ItemTypeDesc::plain(tags::TYPE_PLUG, HostType::Locator);
    plug.user_channels = vec![
        matrix("socket.wpos"),
        matrix("socket.wrot"),
        matrix("socket.wscl"),
        float("parentOffset.pos.X"),
        float("parentOffset.pos.Y"),
        float("parentOffset.pos.Z"),
        float("parentOffset.rot.X"),
        float("parentOffset.rot.Y"),
        float("parentOffset.rot.Z"),
        (
            "drawShape".to_string(),
            ChannelType::Text,
            Value::Text("circle".to_string()),
        ),
    ];
    plug.default_features = vec![features::FEAT_ITEM_LINK.to_string()];

    let mut decorator = ItemTypeDesc::plain(tags::TYPE_DECORATOR, HostType::Locator);
    decorator.default_features = vec![features::FEAT_DECORATOR.to_string()];

    let mut piece_root = ItemTypeDesc::plain(tags::TYPE_PIECE_ROOT, HostType::Locator);
    piece_root.drop_script = Some(tags::DROP_PIECE.to_string());

    let descs = vec![
        ItemTypeDesc::plain(tags::TYPE_RIG_ROOT, HostType::Locator),
        module_root,
        ItemTypeDesc::plain(tags::TYPE_FOLDER, HostType::Group),
        ctrl,
        ctrl_guide,
        guide,
        plug,
        ItemTypeDesc::plain(tags::TYPE_SOCKET, HostType::Locator),
        ItemTypeDesc::plain(tags::TYPE_BIND_LOCATOR, HostType::Locator),
        ItemTypeDesc::plain(tags::TYPE_BIND_MESH, HostType::Mesh),
        ItemTypeDesc::plain(tags::TYPE_RIGID_MESH, HostType::Mesh),
        ItemTypeDesc::plain(tags::TYPE_BIND_PROXY, HostType::Mesh),
        decorator,
        piece_root,
        ItemTypeDesc::plain(tags::TYPE_CHAIN_GROUP, HostType::Group),
        ItemTypeDesc::plain(tags::TYPE_MIRROR_GROUP, HostType::Group),
        ItemTypeDesc::plain(tags::TYPE_PRESET_CONTENT, HostType::Locator),
    ];
    for desc in descs {
        service.registry.register(Box::new(desc));
    }
}

fn register_element_sets(service: &mut Service) {
    let sets = vec![
        ElementSetDesc::new("controllers", &[tags::TYPE_CONTROLLER], true),
        ElementSetDesc::new(
            "guides",
            &[tags::TYPE_GUIDE, tags::TYPE_CONTROLLER_GUIDE],
            false,
        ),
        ElementSetDesc::new("plugs", &[tags::TYPE_PLUG], false),
        ElementSetDesc::new("sockets", &[tags::TYPE_SOCKET], false),
        ElementSetDesc::new("bindLocators", &[tags::TYPE_BIND_LOCATOR], false),
        ElementSetDesc::new("bindMeshes", &[tags::TYPE_BIND_MESH], true).resolution_aware(),
        ElementSetDesc::new("rigidMeshes", &[tags::TYPE_RIGID_MESH], true).resolution_aware(),
        ElementSetDesc::new("bindProxies", &[tags::TYPE_BIND_PROXY], false).resolution_aware(),
        ElementSetDesc::new("decorators", &[tags::TYPE_DECORATOR], true),
    ];
    for set in sets {
        service.registry.register(Box::new(set));
    }
}
