//! Rig items: the typed side-table over host items.
//!
//! Host items stay the serialised form (tags carry type, identifier,
//! feature list and settings for interop); the live model is a
//! `RigItemRecord` per item id, owned by the rig.

use crate::events::Event;
use crate::naming::{NameTokens, NamingScheme};
use crate::registry::{ComponentKind, SystemComponent};
use crate::service::Ctx;
use crate::settings::SettingsStore;
use crate::setup::{self, SetupId};
use crate::tags::{TAG_DROP_SCRIPT, TAG_FEATURES, TAG_IDENT, TAG_ITEM_COMMAND, TAG_ITEM_TYPE};
use crate::{error::RigError, error::Result};
use rigkit_api_core::{ChannelType, HostType, ItemId, Side, Value};
use std::any::Any;

/// Items either carry an own side or inherit their module's.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SideMode {
    Own(Side),
    InheritModule,
}

#[derive(Clone, Debug)]
pub struct RigItemRecord {
    pub item_type: String,
    pub identifier: Option<String>,
    /// Feature idents in add order; mirrored into the `RSIF` tag.
    pub features: Vec<String>,
    pub side: SideMode,
    pub base_name: String,
    pub setup: Option<SetupId>,
    pub settings: SettingsStore,
    pub hidden: bool,
}

impl RigItemRecord {
    pub fn new(item_type: &str, base_name: &str) -> Self {
        RigItemRecord {
            item_type: item_type.to_string(),
            identifier: None,
            features: Vec::new(),
            side: SideMode::InheritModule,
            base_name: base_name.to_string(),
            setup: None,
            settings: SettingsStore::new(),
            hidden: false,
        }
    }
}

/// Schema for one rig item type: what gets installed on creation.
#[derive(Clone, Debug)]
pub struct ItemTypeDesc {
    pub ident: String,
    pub host_type: HostType,
    pub packages: Vec<String>,
    pub user_channels: Vec<(String, ChannelType, Value)>,
    pub drop_script: Option<String>,
    pub item_command: Option<String>,
    /// Features installed right after creation.
    pub default_features: Vec<String>,
}

impl ItemTypeDesc {
    pub fn plain(ident: &str, host_type: HostType) -> Self {
        ItemTypeDesc {
            ident: ident.to_string(),
            host_type,
            packages: Vec::new(),
            user_channels: Vec::new(),
            drop_script: None,
            item_command: None,
            default_features: Vec::new(),
        }
    }
}

impl SystemComponent for ItemTypeDesc {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Item
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

/// Create a new rig item of a registered type and add it to a setup.
pub fn create_item(
    ctx: &mut Ctx<'_>,
    type_ident: &str,
    base_name: &str,
    side: SideMode,
    setup: Option<SetupId>,
) -> Result<ItemId> {
    let desc = ctx
        .service
        .registry
        .get_as::<ItemTypeDesc>(ComponentKind::Item, type_ident)
        .cloned()
        .ok_or_else(|| RigError::Lookup(format!("item type '{type_ident}'")))?;

    let item = ctx.scene.create_item(desc.host_type.clone(), base_name);
    convert_item_with(ctx, item, &desc, base_name, side, setup)?;
    Ok(item)
}

/// Convert an existing host item into a rig item: same install path as
/// creation, minus the creation itself.
pub fn convert_item(
    ctx: &mut Ctx<'_>,
    item: ItemId,
    type_ident: &str,
    base_name: &str,
    side: SideMode,
    setup: Option<SetupId>,
) -> Result<()> {
    let desc = ctx
        .service
        .registry
        .get_as::<ItemTypeDesc>(ComponentKind::Item, type_ident)
        .cloned()
        .ok_or_else(|| RigError::Lookup(format!("item type '{type_ident}'")))?;
    convert_item_with(ctx, item, &desc, base_name, side, setup)
}

fn convert_item_with(
    ctx: &mut Ctx<'_>,
    item: ItemId,
    desc: &ItemTypeDesc,
    base_name: &str,
    side: SideMode,
    setup: Option<SetupId>,
) -> Result<()> {
    for package in &desc.packages {
        ctx.scene.add_package(item, package);
    }
    for (name, ty, default) in &desc.user_channels {
        ctx.scene.add_channel(item, name, *ty, default.clone())?;
    }
    if let Some(script) = &desc.drop_script {
        ctx.scene.set_tag(item, TAG_DROP_SCRIPT, Some(script));
    }
    if let Some(command) = &desc.item_command {
        ctx.scene.set_tag(item, TAG_ITEM_COMMAND, Some(command));
    }
    ctx.scene.set_tag(item, TAG_ITEM_TYPE, Some(&desc.ident));

    let mut record = RigItemRecord::new(&desc.ident, base_name);
    record.side = side;
    ctx.rig.items.insert(item, record);

    if let Some(setup_id) = setup {
        setup::add_item(ctx, setup_id, item, false);
    }
    for feature in desc.default_features.clone() {
        crate::features::add_feature(ctx, item, &feature)?;
    }
    render_name(ctx, item);
    Ok(())
}

/// Remove an item from the model. Non-destructive of the host item unless
/// `destroy` is set.
pub fn release_item(ctx: &mut Ctx<'_>, item: ItemId, destroy: bool) {
    if let Some(setup_id) = ctx.rig.items.get(&item).and_then(|r| r.setup) {
        setup::clear_item(ctx, setup_id, item);
    }
    ctx.rig.items.remove(&item);
    if destroy {
        ctx.scene.delete_item(item);
    }
}

/// Side as seen by color schemes, naming and mirroring.
pub fn evaluated_side(ctx: &Ctx<'_>, item: ItemId) -> Side {
    match ctx.rig.items.get(&item).map(|r| r.side) {
        Some(SideMode::Own(side)) => side,
        Some(SideMode::InheritModule) => ctx
            .rig
            .module_of_item(item)
            .and_then(|root| ctx.rig.modules.get(&root))
            .map(|m| m.side)
            .unwrap_or_default(),
        None => Side::Center,
    }
}

/// Set the identifier tag; identifiers are unique within a module, which
/// callers enforce by construction.
pub fn set_identifier(ctx: &mut Ctx<'_>, item: ItemId, identifier: Option<&str>) {
    ctx.scene.set_tag(item, TAG_IDENT, identifier);
    if let Some(record) = ctx.rig.items.get_mut(&item) {
        record.identifier = identifier.map(str::to_string);
    }
    if let Some(module_root) = ctx.rig.module_of_item(item) {
        if let Some(module) = ctx.rig.modules.get_mut(&module_root) {
            module.key_items.retain(|_, v| *v != item);
            if let Some(ident) = identifier {
                module.key_items.insert(ident.to_string(), item);
            }
        }
    }
}

pub fn set_base_name(ctx: &mut Ctx<'_>, item: ItemId, base_name: &str) {
    if let Some(record) = ctx.rig.items.get_mut(&item) {
        record.base_name = base_name.to_string();
    }
    render_name(ctx, item);
    ctx.post(Event::ItemChanged { item });
}

pub fn set_side(ctx: &mut Ctx<'_>, item: ItemId, side: SideMode) {
    if let Some(record) = ctx.rig.items.get_mut(&item) {
        record.side = side;
    }
    render_name(ctx, item);
    ctx.post(Event::ItemChanged { item });
}

/// Mirror the feature list into the `RSIF` tag (`;`-separated).
pub fn sync_feature_tag(ctx: &mut Ctx<'_>, item: ItemId) {
    let features = ctx
        .rig
        .items
        .get(&item)
        .map(|r| r.features.clone())
        .unwrap_or_default();
    if features.is_empty() {
        ctx.scene.set_tag(item, TAG_FEATURES, None);
    } else {
        ctx.scene
            .set_tag(item, TAG_FEATURES, Some(&features.join(";")));
    }
}

/// Flush the record's settings cache onto the host tags.
pub fn flush_settings(ctx: &mut Ctx<'_>, item: ItemId) {
    if let Some(record) = ctx.rig.items.get(&item) {
        let settings = record.settings.clone();
        settings.flush(ctx.scene, item);
    }
}

/// Render the item's display name through the rig's naming scheme. Never
/// set names verbatim except during standardisation.
pub fn render_name(ctx: &mut Ctx<'_>, item: ItemId) {
    let Some(record) = ctx.rig.items.get(&item) else {
        return;
    };
    let module_name = ctx
        .rig
        .module_of_item(item)
        .and_then(|root| ctx.rig.modules.get(&root))
        .map(|m| m.name.clone())
        .unwrap_or_default();
    let mut base_name = record.base_name.clone();
    if base_name.contains(crate::piece::SERIAL_TOKEN) {
        let serial = crate::piece::serial_of_item(ctx, item)
            .map(|s| s.to_string())
            .unwrap_or_default();
        base_name = base_name.replace(crate::piece::SERIAL_TOKEN, &serial);
    }
    let tokens = NameTokens {
        rig_name: ctx.rig.name.clone(),
        module_name,
        base_name,
        side: Some(evaluated_side(ctx, item)),
        item_type: record.item_type.clone(),
        host_type: ctx
            .scene
            .host_type(item)
            .map(|t| format!("{t:?}"))
            .unwrap_or_default(),
        feature_idents: record.features.clone(),
    };
    let scheme_ident = ctx.rig.naming_scheme.clone();
    let name = ctx
        .service
        .registry
        .get(ComponentKind::NamingScheme, &scheme_ident)
        .and_then(|c| {
            c.as_any()
                .downcast_ref::<crate::naming::StandardNamingScheme>()
                .map(|s| s.render(&tokens))
        })
        .unwrap_or_else(|| crate::naming::StandardNamingScheme.render(&tokens));
    ctx.scene.set_name(item, &name);
}

/// Reference name of an item: `<sideLetter>:<module>.<base>`.
pub fn reference_name(ctx: &Ctx<'_>, item: ItemId) -> String {
    let module_name = ctx
        .rig
        .module_of_item(item)
        .and_then(|root| ctx.rig.modules.get(&root))
        .map(|m| m.name.clone())
        .unwrap_or_default();
    let base = ctx
        .rig
        .items
        .get(&item)
        .map(|r| r.base_name.clone())
        .unwrap_or_default();
    crate::naming::reference_name(evaluated_side(ctx, item), &module_name, &base)
}

pub fn mirrored_reference_name(ctx: &Ctx<'_>, item: ItemId) -> String {
    crate::naming::mirrored_reference_name(&reference_name(ctx, item))
}
