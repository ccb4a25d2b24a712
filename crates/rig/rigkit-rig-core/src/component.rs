//! Rig components: typed wrappers identifying the functional part a setup
//! plays inside a rig. Modules come from `module::new_module`; the other
//! roles are single well-known setups created on demand.

use crate::error::{Result, RigError};
use crate::service::Ctx;
use crate::setup::{self, SetupId};
use rigkit_api_core::HostType;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ComponentRole {
    Module,
    BindMeshes,
    Attachments,
    Temporary,
    ModuleSet,
}

impl ComponentRole {
    pub fn ident(self) -> &'static str {
        match self {
            ComponentRole::Module => "module",
            ComponentRole::BindMeshes => "bindMeshes",
            ComponentRole::Attachments => "attachments",
            ComponentRole::Temporary => "temporary",
            ComponentRole::ModuleSet => "moduleSet",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "module" => Some(ComponentRole::Module),
            "bindMeshes" => Some(ComponentRole::BindMeshes),
            "attachments" => Some(ComponentRole::Attachments),
            "temporary" => Some(ComponentRole::Temporary),
            "moduleSet" => Some(ComponentRole::ModuleSet),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Component {
    pub role: ComponentRole,
    pub setup: SetupId,
}

/// Classify an existing setup. Module setups are recognised through the
/// rig's module table, the rest by setup identifier.
pub fn of_setup(ctx: &Ctx<'_>, setup: SetupId) -> Option<Component> {
    if ctx.rig.modules.values().any(|m| m.setup == setup) {
        return Some(Component {
            role: ComponentRole::Module,
            setup,
        });
    }
    let identifier = ctx.rig.setups.get(setup).map(|s| s.identifier.clone())?;
    ComponentRole::parse(&identifier).map(|role| Component { role, setup })
}

pub fn find(ctx: &Ctx<'_>, role: ComponentRole) -> Option<Component> {
    ctx.rig
        .setups
        .iter()
        .find(|s| s.identifier == role.ident())
        .map(|s| Component {
            role,
            setup: s.id,
        })
}

/// Get or create the single setup for a non-module role, nested under the
/// rig root setup.
pub fn ensure(ctx: &mut Ctx<'_>, role: ComponentRole) -> Result<Component> {
    if role == ComponentRole::Module {
        return Err(RigError::InvalidArgument(
            "module components are created through new_module".to_string(),
        ));
    }
    if let Some(existing) = find(ctx, role) {
        return Ok(existing);
    }
    let ident = role.ident();
    let root = ctx.scene.create_item(HostType::Locator, ident);
    let assembly = ctx
        .scene
        .create_item(HostType::Assembly, &format!("{ident}_assembly"));
    let parent = ctx.rig.root_setup;
    let setup = setup::new_setup(ctx, ident, root, assembly, Some(parent));
    ctx.scene.set_parent(root, Some(ctx.rig.root));
    Ok(Component { role, setup })
}
