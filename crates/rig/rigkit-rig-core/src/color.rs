//! Color schemes: resolve a color identifier and an evaluated side into
//! wire and fill colors, written onto per-item color channels.

use crate::item;
use crate::registry::{ComponentKind, SystemComponent};
use crate::service::Ctx;
use crate::error::Result;
use indexmap::IndexMap;
use rigkit_api_core::{ChannelAction, ChannelType, ItemId, Side, Value};
use std::any::Any;

pub type Rgb = [f32; 3];

/// Settings key holding an item's color identifier. Absent means "by side".
pub const SETTING_COLOR_ID: &str = "color.id";

#[derive(Clone, Debug)]
pub struct ColorScheme {
    pub ident: String,
    pub left: Rgb,
    pub center: Rgb,
    pub right: Rgb,
    /// Fill is the wire color scaled down by this factor.
    pub fill_scale: f32,
    /// Named colors resolvable independently of side.
    pub palette: IndexMap<String, Rgb>,
}

impl ColorScheme {
    pub fn side_color(&self, side: Side) -> Rgb {
        match side {
            Side::Left => self.left,
            Side::Center => self.center,
            Side::Right => self.right,
        }
    }

    pub fn resolve(&self, color_id: Option<&str>, side: Side) -> Rgb {
        match color_id {
            Some(id) => self
                .palette
                .get(id)
                .copied()
                .unwrap_or_else(|| self.side_color(side)),
            None => self.side_color(side),
        }
    }
}

impl SystemComponent for ColorScheme {
    fn kind(&self) -> ComponentKind {
        ComponentKind::ColorScheme
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

pub fn default_scheme() -> ColorScheme {
    let mut palette = IndexMap::new();
    palette.insert("bone".to_string(), [0.85, 0.82, 0.7]);
    palette.insert("guide".to_string(), [1.0, 0.65, 0.0]);
    ColorScheme {
        ident: "standard".to_string(),
        left: [0.2, 0.45, 1.0],
        center: [1.0, 0.85, 0.1],
        right: [1.0, 0.25, 0.25],
        fill_scale: 0.35,
        palette,
    }
}

const WIRE_CHANNELS: [&str; 3] = ["wireColor.R", "wireColor.G", "wireColor.B"];
const FILL_CHANNELS: [&str; 3] = ["fillColor.R", "fillColor.G", "fillColor.B"];

/// Re-resolve an item's color against the rig's scheme and write the wire
/// and fill channels (setup action). Channels are created on first use.
pub fn reapply_color(ctx: &mut Ctx<'_>, item: ItemId) -> Result<()> {
    let side = item::evaluated_side(ctx, item);
    let color_id = ctx
        .rig
        .items
        .get(&item)
        .and_then(|r| r.settings.get_str(SETTING_COLOR_ID))
        .map(str::to_string);
    let scheme_ident = ctx.rig.color_scheme.clone();
    let Some(scheme) = ctx
        .service
        .registry
        .get_as::<ColorScheme>(ComponentKind::ColorScheme, &scheme_ident)
        .cloned()
    else {
        return Ok(());
    };
    let wire = scheme.resolve(color_id.as_deref(), side);
    let fill = [
        wire[0] * scheme.fill_scale,
        wire[1] * scheme.fill_scale,
        wire[2] * scheme.fill_scale,
    ];
    for (names, rgb) in [(WIRE_CHANNELS, wire), (FILL_CHANNELS, fill)] {
        for (name, component) in names.iter().zip(rgb) {
            if !ctx.scene.has_channel(item, name) {
                ctx.scene
                    .add_channel(item, name, ChannelType::Float, Value::Float(0.0))?;
            }
            ctx.scene
                .write(item, name, Value::Float(component), 0.0, ChannelAction::Setup, false)?;
        }
    }
    Ok(())
}

/// Store a color identifier on the item and reapply immediately.
pub fn set_color_id(ctx: &mut Ctx<'_>, item: ItemId, color_id: Option<&str>) -> Result<()> {
    if let Some(record) = ctx.rig.items.get_mut(&item) {
        match color_id {
            Some(id) => record.settings.set(SETTING_COLOR_ID, id.into()),
            None => {
                record.settings.remove(SETTING_COLOR_ID);
            }
        }
    }
    item::flush_settings(ctx, item);
    reapply_color(ctx, item)
}
