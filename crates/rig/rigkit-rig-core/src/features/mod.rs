//! Item features: composable capabilities attached to items.
//!
//! A feature class declares its host packages, an applicability test and
//! lifecycle hooks. Instances carry no state of their own; per-item feature
//! state lives in the item's settings and in rig graphs, so the classes are
//! registry singletons.

pub mod controller;
pub mod item_link;
pub mod match_transforms;

use crate::color;
use crate::error::{Result, RigError};
use crate::item;
use crate::registry::{ComponentKind, SystemComponent};
use crate::service::Ctx;
use crate::tags;
use rigkit_api_core::ItemId;
use std::any::Any;

pub type FeatureHook = fn(&mut Ctx<'_>, ItemId) -> Result<()>;

#[derive(Clone)]
pub struct FeatureClass {
    pub ident: String,
    /// Host packages installed on add and stripped on remove.
    pub packages: Vec<String>,
    /// When set, the feature only applies to these rig item types.
    pub rig_item_types: Option<Vec<String>>,
    /// When set, the feature only applies to locator super-type items.
    pub locator_only: bool,
    pub on_add: Option<FeatureHook>,
    pub on_remove: Option<FeatureHook>,
    pub on_standardize: Option<FeatureHook>,
}

impl FeatureClass {
    pub fn new(ident: &str) -> Self {
        FeatureClass {
            ident: ident.to_string(),
            packages: Vec::new(),
            rig_item_types: None,
            locator_only: false,
            on_add: None,
            on_remove: None,
            on_standardize: None,
        }
    }

    pub fn with_packages(mut self, packages: &[&str]) -> Self {
        self.packages = packages.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn for_types(mut self, types: &[&str]) -> Self {
        self.rig_item_types = Some(types.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn locators_only(mut self) -> Self {
        self.locator_only = true;
        self
    }

    fn applicable(&self, ctx: &Ctx<'_>, item: ItemId) -> bool {
        if let Some(types) = &self.rig_item_types {
            let Some(record) = ctx.rig.items.get(&item) else {
                return false;
            };
            if !types.iter().any(|t| *t == record.item_type) {
                return false;
            }
        }
        if self.locator_only {
            let locator = ctx
                .scene
                .host_type(item)
                .map(|t| t.is_locator())
                .unwrap_or(false);
            if !locator {
                return false;
            }
        }
        true
    }
}

impl SystemComponent for FeatureClass {
    fn kind(&self) -> ComponentKind {
        ComponentKind::ItemFeature
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

/// Add a feature to an item. Adding twice is a no-op; an inapplicable
/// feature is rejected.
pub fn add_feature(ctx: &mut Ctx<'_>, item: ItemId, ident: &str) -> Result<()> {
    let already = ctx
        .rig
        .items
        .get(&item)
        .map(|r| r.features.iter().any(|f| f == ident))
        .unwrap_or(false);
    if already {
        return Ok(());
    }
    let class = ctx
        .service
        .registry
        .get_as::<FeatureClass>(ComponentKind::ItemFeature, ident)
        .cloned()
        .ok_or_else(|| RigError::Lookup(format!("item feature '{ident}'")))?;
    if !class.applicable(ctx, item) {
        return Err(RigError::InvalidArgument(format!(
            "feature '{ident}' does not apply to item {item:?}"
        )));
    }
    for package in &class.packages {
        ctx.scene.add_package(item, package);
    }
    if let Some(record) = ctx.rig.items.get_mut(&item) {
        record.features.push(ident.to_string());
    }
    item::sync_feature_tag(ctx, item);
    if let Some(hook) = class.on_add {
        hook(ctx, item)?;
    }
    Ok(())
}

/// Remove a feature. `on_remove` runs before the packages come off.
pub fn remove_feature(ctx: &mut Ctx<'_>, item: ItemId, ident: &str) -> Result<()> {
    let present = ctx
        .rig
        .items
        .get(&item)
        .map(|r| r.features.iter().any(|f| f == ident))
        .unwrap_or(false);
    if !present {
        return Ok(());
    }
    let class = ctx
        .service
        .registry
        .get_as::<FeatureClass>(ComponentKind::ItemFeature, ident)
        .cloned()
        .ok_or_else(|| RigError::Lookup(format!("item feature '{ident}'")))?;
    if let Some(hook) = class.on_remove {
        hook(ctx, item)?;
    }
    for package in &class.packages {
        ctx.scene.remove_package(item, package);
    }
    if let Some(record) = ctx.rig.items.get_mut(&item) {
        record.features.retain(|f| f != ident);
    }
    item::sync_feature_tag(ctx, item);
    Ok(())
}

pub fn has_feature(ctx: &Ctx<'_>, item: ItemId, ident: &str) -> bool {
    ctx.rig
        .items
        .get(&item)
        .map(|r| r.features.iter().any(|f| f == ident))
        .unwrap_or(false)
}

// Feature identifiers.
pub const FEAT_COLOR: &str = "color";
pub const FEAT_IDENTIFIER: &str = "ident";
pub const FEAT_CONTROLLER: &str = "ctrl";
pub const FEAT_CONTROLLER_GUIDE: &str = "ctrlGuide";
pub const FEAT_GUIDE: &str = "guide";
pub const FEAT_ITEM_SHAPE: &str = "shape";
pub const FEAT_ITEM_AXIS: &str = "axis";
pub const FEAT_ITEM_LINK: &str = "itemLink";
pub const FEAT_CONTROLLER_FIT: &str = "ctrlFit";
pub const FEAT_DECORATOR: &str = "decorator";
pub const FEAT_DRAW_XFRM_LINK: &str = "drawXfrmLink";
pub const FEAT_IKFK_SWITCHER: &str = "ikfkSwitch";
pub const FEAT_MATCH_TRANSFORMS: &str = "matchXfrm";
pub const FEAT_IK_MATCH_EXTRAS: &str = "ikMatchExtras";

fn identifier_on_add(ctx: &mut Ctx<'_>, item: ItemId) -> Result<()> {
    // fast key-item lookup edge to the module root
    if let Some(module_root) = ctx.rig.module_of_item(item) {
        ctx.scene.graph_connect(tags::GRAPH_KEY_ITEMS, module_root, item);
    }
    Ok(())
}

fn identifier_on_remove(ctx: &mut Ctx<'_>, item: ItemId) -> Result<()> {
    ctx.scene.graph_clear_item(tags::GRAPH_KEY_ITEMS, item);
    Ok(())
}

fn color_on_add(ctx: &mut Ctx<'_>, item: ItemId) -> Result<()> {
    color::reapply_color(ctx, item)
}

/// Register every built-in feature class, in a stable order.
pub fn register_builtin_features(service: &mut crate::service::Service) {
    let classes = vec![
        {
            let mut c = FeatureClass::new(FEAT_COLOR).with_packages(&["rs.pkg.color"]);
            c.on_add = Some(color_on_add);
            c
        },
        {
            let mut c = FeatureClass::new(FEAT_IDENTIFIER);
            c.on_add = Some(identifier_on_add);
            c.on_remove = Some(identifier_on_remove);
            c
        },
        {
            let mut c = FeatureClass::new(FEAT_CONTROLLER)
                .with_packages(&["rs.pkg.ctrl"])
                .locators_only();
            c.on_add = Some(controller::on_add);
            c.on_standardize = Some(controller::on_standardize);
            c
        },
        FeatureClass::new(FEAT_CONTROLLER_GUIDE)
            .with_packages(&["rs.pkg.ctrlGuide"])
            .locators_only(),
        FeatureClass::new(FEAT_GUIDE)
            .with_packages(&["rs.pkg.guide"])
            .locators_only(),
        FeatureClass::new(FEAT_ITEM_SHAPE).with_packages(&["rs.pkg.shape"]),
        FeatureClass::new(FEAT_ITEM_AXIS).with_packages(&["rs.pkg.axis"]),
        {
            let mut c = FeatureClass::new(FEAT_ITEM_LINK).with_packages(&["rs.pkg.itemLink"]);
            c.on_remove = Some(item_link::on_remove);
            c.on_standardize = Some(item_link::on_standardize);
            c
        },
        FeatureClass::new(FEAT_CONTROLLER_FIT).for_types(&[tags::TYPE_CONTROLLER]),
        FeatureClass::new(FEAT_DECORATOR).for_types(&[tags::TYPE_DECORATOR]),
        FeatureClass::new(FEAT_DRAW_XFRM_LINK).with_packages(&["rs.pkg.drawXfrmLink"]),
        {
            let mut c = FeatureClass::new(FEAT_IKFK_SWITCHER)
                .for_types(&[tags::TYPE_CONTROLLER])
                .with_packages(&["rs.pkg.ikfk"]);
            c.on_add = Some(crate::ikfk::switcher_on_add);
            c.on_remove = Some(crate::ikfk::switcher_on_remove);
            c
        },
        {
            let mut c = FeatureClass::new(FEAT_MATCH_TRANSFORMS).locators_only();
            c.on_remove = Some(match_transforms::on_remove);
            c
        },
        FeatureClass::new(FEAT_IK_MATCH_EXTRAS).locators_only(),
    ];
    for class in classes {
        service.registry.register(Box::new(class));
    }
}
