//! Rig-clay regions: polygon regions on meshes acting as in-viewport
//! selectors for controllers. Region names and tooltips embed reference
//! names, so renames and side flips must propagate into them.

use crate::events::{Event, EventHandler, EventKind};
use crate::item;
use crate::rig::Rig;
use crate::service::{Ctx, Service};
use crate::tags::TAG_ITEM_COMMAND;
use rigkit_api_core::{ItemId, Scene};

/// Command prefix the host fires on a region gesture; the suffix is the
/// controller item id. Standardisation bakes this indirection away.
pub const REGION_COMMAND_PREFIX: &str = "rs.clay.fire ";

#[derive(Clone, Debug)]
pub struct ClayRegion {
    pub mesh: ItemId,
    pub controller: ItemId,
    /// Selection-set name carrying the controller's reference name.
    pub name: String,
    pub command: String,
    pub tooltip: String,
    pub polys: Vec<u32>,
}

pub fn generic_command(controller: ItemId) -> String {
    format!("{REGION_COMMAND_PREFIX}{}", controller.0)
}

/// Create a region over a poly selection, wired to the generic command.
pub fn add_region(ctx: &mut Ctx<'_>, mesh: ItemId, controller: ItemId, polys: Vec<u32>) -> usize {
    let reference = item::reference_name(ctx, controller);
    let region = ClayRegion {
        mesh,
        controller,
        name: format!("{}:{reference}", ctx.rig.name),
        command: generic_command(controller),
        tooltip: reference,
        polys,
    };
    ctx.rig.clay_regions.push(region);
    ctx.rig.clay_regions.len() - 1
}

pub fn remove_regions_of(ctx: &mut Ctx<'_>, controller: ItemId) {
    ctx.rig
        .clay_regions
        .retain(|r| r.controller != controller);
}

/// Re-derive names and tooltips from the current reference names.
pub fn refresh_regions(ctx: &mut Ctx<'_>) {
    let updates: Vec<(usize, String)> = ctx
        .rig
        .clay_regions
        .iter()
        .enumerate()
        .map(|(ix, r)| (ix, item::reference_name(ctx, r.controller)))
        .collect();
    for (ix, reference) in updates {
        let name = format!("{}:{reference}", ctx.rig.name);
        if let Some(region) = ctx.rig.clay_regions.get_mut(ix) {
            region.name = name;
            region.tooltip = reference;
        }
    }
}

/// Fire the region's command through the host.
pub fn fire_region(ctx: &mut Ctx<'_>, index: usize) -> crate::error::Result<()> {
    let Some(command) = ctx.rig.clay_regions.get(index).map(|r| r.command.clone()) else {
        return Ok(());
    };
    ctx.scene.run_command(&command)?;
    Ok(())
}

/// Keeps regions current under renames and bakes command indirections at
/// standardisation time.
pub struct ClayHandler;

impl EventHandler for ClayHandler {
    fn name(&self) -> &str {
        "rigClay"
    }

    fn subscribed(&self, kind: EventKind) -> bool {
        matches!(
            kind,
            EventKind::RigNameChanged
                | EventKind::ModuleNameChanged
                | EventKind::ModuleSideChanged
                | EventKind::RigStandardizePre
        )
    }

    fn handle(
        &mut self,
        event: &Event,
        rig: &mut Rig,
        scene: &mut dyn Scene,
        service: &mut Service,
    ) -> anyhow::Result<()> {
        let mut ctx = Ctx::new(rig, scene, service);
        match event {
            Event::RigNameChanged { .. }
            | Event::ModuleNameChanged { .. }
            | Event::ModuleSideChanged { .. } => refresh_regions(&mut ctx),
            Event::RigStandardizePre { .. } => bake_commands(&mut ctx),
            _ => {}
        }
        Ok(())
    }
}

/// Replace every generic region command with the controller's resolved
/// item command, when one is tagged.
fn bake_commands(ctx: &mut Ctx<'_>) {
    let updates: Vec<(usize, String)> = ctx
        .rig
        .clay_regions
        .iter()
        .enumerate()
        .filter(|(_, r)| r.command == generic_command(r.controller))
        .filter_map(|(ix, r)| {
            ctx.scene
                .tag(r.controller, TAG_ITEM_COMMAND)
                .map(|command| (ix, command))
        })
        .collect();
    for (ix, command) in updates {
        if let Some(region) = ctx.rig.clay_regions.get_mut(ix) {
            region.command = command;
        }
    }
}
