//! Process-wide registry of system components keyed by `(kind, identifier)`.
//!
//! Dynamic dispatch via identifiers: most interesting branch points resolve
//! a component here (feature classes, naming/color schemes, link setups,
//! piece factories). Iteration order is registration order.

use indexmap::IndexMap;
use std::any::Any;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ComponentKind {
    Item,
    ItemFeature,
    ElementSet,
    MetaGroup,
    ComponentSetup,
    Component,
    ColorScheme,
    NamingScheme,
    Context,
    TransformLinkSetup,
    Preset,
    PresetThumbnail,
    Event,
    EventHandler,
    SceneEvent,
    FeaturedModule,
    FeaturedRig,
    Notifier,
    SystemSetup,
}

/// Anything the registry can hold. Implementors provide `as_any` so typed
/// access goes through `Registry::get_as`.
pub trait SystemComponent: Any {
    fn kind(&self) -> ComponentKind;
    fn ident(&self) -> String;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[derive(Default)]
pub struct Registry {
    components: IndexMap<(ComponentKind, String), Box<dyn SystemComponent>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later registrations with the same key replace earlier ones.
    pub fn register(&mut self, component: Box<dyn SystemComponent>) {
        let key = (component.kind(), component.ident());
        self.components.insert(key, component);
    }

    pub fn get(&self, kind: ComponentKind, ident: &str) -> Option<&dyn SystemComponent> {
        self.components
            .get(&(kind, ident.to_string()))
            .map(|b| b.as_ref())
    }

    pub fn get_as<T: 'static>(&self, kind: ComponentKind, ident: &str) -> Option<&T> {
        self.get(kind, ident).and_then(|c| c.as_any().downcast_ref())
    }

    pub fn get_mut_as<T: 'static>(&mut self, kind: ComponentKind, ident: &str) -> Option<&mut T> {
        self.components
            .get_mut(&(kind, ident.to_string()))
            .and_then(|c| c.as_any_mut().downcast_mut())
    }

    pub fn contains(&self, kind: ComponentKind, ident: &str) -> bool {
        self.components.contains_key(&(kind, ident.to_string()))
    }

    /// Identifiers of one kind, in registration order.
    pub fn idents_of(&self, kind: ComponentKind) -> Vec<String> {
        self.components
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, ident)| ident.clone())
            .collect()
    }

    pub fn components_of(&self, kind: ComponentKind) -> Vec<&dyn SystemComponent> {
        self.components
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, c)| c.as_ref())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy(&'static str);

    impl SystemComponent for Dummy {
        fn kind(&self) -> ComponentKind {
            ComponentKind::NamingScheme
        }
        fn ident(&self) -> String {
            self.0.to_string()
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn register_and_typed_get() {
        let mut reg = Registry::new();
        reg.register(Box::new(Dummy("a")));
        reg.register(Box::new(Dummy("b")));
        assert!(reg.contains(ComponentKind::NamingScheme, "a"));
        assert!(reg.get_as::<Dummy>(ComponentKind::NamingScheme, "b").is_some());
        assert_eq!(
            reg.idents_of(ComponentKind::NamingScheme),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(reg.get(ComponentKind::ColorScheme, "a").is_none());
    }
}
