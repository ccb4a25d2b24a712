//! The process-wide service: registry, event bus, scene-event table, user
//! values and the listen flag long operations pause.

use crate::context::ContextKind;
use crate::events::{Event, EventBus, SceneEventArgs, SceneEventFn};
use crate::registry::Registry;
use crate::rig::Rig;
use indexmap::IndexMap;
use rigkit_api_core::Scene;
use serde_json::Value as Json;

pub struct Service {
    pub registry: Registry,
    pub bus: EventBus,
    /// Drop-script / item-command names mapped to core-side callbacks; the
    /// "tag value -> handler name" indirection is the host-facing contract.
    pub scene_events: IndexMap<String, SceneEventFn>,
    /// Persistent user-value store consulted by commands for defaults.
    pub user_values: IndexMap<String, Json>,
    /// When false, host-originated scene events are ignored.
    pub listen_to_scene: bool,
    pub current_context: ContextKind,
}

impl Default for Service {
    fn default() -> Self {
        Service {
            registry: Registry::new(),
            bus: EventBus::new(),
            scene_events: IndexMap::new(),
            user_values: IndexMap::new(),
            listen_to_scene: true,
            current_context: ContextKind::Assembly,
        }
    }
}

impl Service {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post an event and dispatch synchronously. Events queued by handlers
    /// are drained after the current event completes, so all handlers for
    /// one event run before the next is dispatched. Handler errors are
    /// logged and swallowed.
    pub fn post(&mut self, event: Event, rig: &mut Rig, scene: &mut dyn Scene) {
        self.bus.queue.push_back(event);
        if self.bus.dispatching {
            return;
        }
        self.bus.dispatching = true;
        while let Some(event) = self.bus.queue.pop_front() {
            let mut handlers = std::mem::take(&mut self.bus.handlers);
            for handler in handlers.iter_mut() {
                if !handler.subscribed(event.kind()) {
                    continue;
                }
                if let Err(err) = handler.handle(&event, rig, scene, self) {
                    log::warn!(
                        "event handler '{}' failed on {:?}: {err:#}",
                        handler.name(),
                        event.kind()
                    );
                }
            }
            // handlers registered during dispatch land behind the existing ones
            let added = std::mem::take(&mut self.bus.handlers);
            handlers.extend(added);
            self.bus.handlers = handlers;
        }
        self.bus.dispatching = false;
    }

    pub fn register_scene_event(&mut self, name: &str, callback: SceneEventFn) {
        self.scene_events.insert(name.to_string(), callback);
    }

    /// Invoke a named scene event (a drop script or item command firing on
    /// the host main thread). No-op while listening is paused.
    pub fn fire_scene_event(
        &mut self,
        name: &str,
        args: &SceneEventArgs,
        rig: &mut Rig,
        scene: &mut dyn Scene,
    ) {
        if !self.listen_to_scene {
            return;
        }
        if let Some(callback) = self.scene_events.get(name).copied() {
            if let Err(err) = callback(rig, scene, self, args) {
                log::warn!("scene event '{name}' failed: {err:#}");
            }
        }
    }

    /// Command bracket: pause scene listening and switch to the requested
    /// context for the duration of a command body. Returns the state to
    /// hand back to `execute_end`.
    pub fn execute_start(&mut self, context: ContextKind) -> ExecuteState {
        let state = ExecuteState {
            listen: self.listen_to_scene,
            context: self.current_context,
        };
        self.listen_to_scene = false;
        self.current_context = context;
        state
    }

    pub fn execute_end(&mut self, state: ExecuteState) {
        self.listen_to_scene = state.listen;
        self.current_context = state.context;
    }
}

#[derive(Copy, Clone, Debug)]
pub struct ExecuteState {
    listen: bool,
    context: ContextKind,
}

/// Borrow bundle most operations run against: the rig under mutation, the
/// host scene and the service. Keeps signatures flat and reborrowing cheap.
pub struct Ctx<'a> {
    pub rig: &'a mut Rig,
    pub scene: &'a mut dyn Scene,
    pub service: &'a mut Service,
}

impl<'a> Ctx<'a> {
    pub fn new(rig: &'a mut Rig, scene: &'a mut dyn Scene, service: &'a mut Service) -> Self {
        Ctx {
            rig,
            scene,
            service,
        }
    }

    pub fn post(&mut self, event: Event) {
        self.service.post(event, self.rig, self.scene);
    }
}
