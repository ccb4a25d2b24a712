//! Work contexts: named ensembles of visibility rules. Switching a context
//! resets element-set visibility to per-set defaults; guide apply never
//! touches visibility, so the two stay independent.

use crate::elements;
use crate::service::Ctx;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    #[default]
    Assembly,
    Guide,
    Meshes,
    Weight,
    Animate,
}

impl ContextKind {
    pub fn ident(self) -> &'static str {
        match self {
            ContextKind::Assembly => "assembly",
            ContextKind::Guide => "guide",
            ContextKind::Meshes => "meshes",
            ContextKind::Weight => "weight",
            ContextKind::Animate => "animate",
        }
    }
}

/// Switch the active context and reset every element set to its declared
/// default visibility.
pub fn switch(ctx: &mut Ctx<'_>, kind: ContextKind) {
    ctx.service.current_context = kind;
    for ident in elements::set_idents(ctx) {
        elements::reset_visible(ctx, &ident);
    }
    ctx.scene.notify("rs.context");
}
