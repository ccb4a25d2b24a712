//! Event bus and scene events.
//!
//! Registered handlers fire in insertion order; all handlers for an event
//! run before the next queued event is dispatched. There is no cancellation
//! and no cross-handler return value: a handler error is logged and the
//! remaining handlers still run.

use crate::rig::Rig;
use crate::service::Service;
use crate::setup::SetupId;
use rigkit_api_core::{ItemId, Scene, Side};
use std::collections::VecDeque;

#[derive(Clone, Debug)]
pub enum Event {
    ItemChanged { item: ItemId },
    /// Emitted before the assembly membership change completes, so handlers
    /// see the old state.
    ItemRemoved { item: ItemId, setup: SetupId },
    ItemAdded { item: ItemId, setup: SetupId },
    ModuleSideChanged { module: ItemId, side: Side },
    ModuleNameChanged { module: ItemId },
    RigNameChanged { root: ItemId },
    ModuleSavePre { module: ItemId },
    ModuleSavePost { module: ItemId },
    PlugConnected { plug: ItemId, socket: ItemId },
    PlugDisconnected { plug: ItemId, socket: ItemId },
    GuideApplyInit,
    GuideApplyItemScan { item: ItemId },
    GuideApplyPre,
    GuideApplyPost,
    GuideApplyPost2,
    RigStandardizePre { root: ItemId },
    ResolutionChanged { root: ItemId },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EventKind {
    ItemChanged,
    ItemRemoved,
    ItemAdded,
    ModuleSideChanged,
    ModuleNameChanged,
    RigNameChanged,
    ModuleSavePre,
    ModuleSavePost,
    PlugConnected,
    PlugDisconnected,
    GuideApplyInit,
    GuideApplyItemScan,
    GuideApplyPre,
    GuideApplyPost,
    GuideApplyPost2,
    RigStandardizePre,
    ResolutionChanged,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ItemChanged { .. } => EventKind::ItemChanged,
            Event::ItemRemoved { .. } => EventKind::ItemRemoved,
            Event::ItemAdded { .. } => EventKind::ItemAdded,
            Event::ModuleSideChanged { .. } => EventKind::ModuleSideChanged,
            Event::ModuleNameChanged { .. } => EventKind::ModuleNameChanged,
            Event::RigNameChanged { .. } => EventKind::RigNameChanged,
            Event::ModuleSavePre { .. } => EventKind::ModuleSavePre,
            Event::ModuleSavePost { .. } => EventKind::ModuleSavePost,
            Event::PlugConnected { .. } => EventKind::PlugConnected,
            Event::PlugDisconnected { .. } => EventKind::PlugDisconnected,
            Event::GuideApplyInit => EventKind::GuideApplyInit,
            Event::GuideApplyItemScan { .. } => EventKind::GuideApplyItemScan,
            Event::GuideApplyPre => EventKind::GuideApplyPre,
            Event::GuideApplyPost => EventKind::GuideApplyPost,
            Event::GuideApplyPost2 => EventKind::GuideApplyPost2,
            Event::RigStandardizePre { .. } => EventKind::RigStandardizePre,
            Event::ResolutionChanged { .. } => EventKind::ResolutionChanged,
        }
    }
}

pub trait EventHandler {
    fn name(&self) -> &str;
    fn subscribed(&self, kind: EventKind) -> bool;
    fn handle(
        &mut self,
        event: &Event,
        rig: &mut Rig,
        scene: &mut dyn Scene,
        service: &mut Service,
    ) -> anyhow::Result<()>;
}

/// Named-argument bag for scene events (drop scripts, item commands).
#[derive(Clone, Debug, Default)]
pub struct SceneEventArgs {
    pub item: Option<ItemId>,
    pub payload: String,
}

pub type SceneEventFn =
    fn(&mut Rig, &mut dyn Scene, &mut Service, &SceneEventArgs) -> anyhow::Result<()>;

#[derive(Default)]
pub struct EventBus {
    pub(crate) handlers: Vec<Box<dyn EventHandler>>,
    pub(crate) queue: VecDeque<Event>,
    pub(crate) dispatching: bool,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registration order is dispatch order.
    pub fn register(&mut self, handler: Box<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn handler_names(&self) -> Vec<String> {
        self.handlers.iter().map(|h| h.name().to_string()).collect()
    }
}
