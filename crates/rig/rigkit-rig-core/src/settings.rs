//! Per-item settings: JSON-like values in two scopes (flat and grouped),
//! serialised into the `RSIS`/`RSIG` tags. A write-through cache keyed by
//! item id avoids re-serialising the whole blob on every key write.

use crate::tags::{TAG_SETTINGS, TAG_SETTINGS_GROUPS};
use rigkit_api_core::{ItemId, Scene};
use serde_json::{Map, Value as Json};

#[derive(Clone, Debug, Default)]
pub struct SettingsStore {
    flat: Map<String, Json>,
    groups: Map<String, Json>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from an item's settings tags; absent or malformed tags read as
    /// empty (a plain host item simply has no settings).
    pub fn load(scene: &dyn Scene, item: ItemId) -> Self {
        let read = |key: &str| -> Map<String, Json> {
            scene
                .tag(item, key)
                .and_then(|raw| serde_json::from_str::<Json>(&raw).ok())
                .and_then(|v| match v {
                    Json::Object(m) => Some(m),
                    _ => None,
                })
                .unwrap_or_default()
        };
        SettingsStore {
            flat: read(TAG_SETTINGS),
            groups: read(TAG_SETTINGS_GROUPS),
        }
    }

    /// Serialise the cache back onto the item's tags. Empty scopes clear
    /// their tag so a settings-free item carries none.
    pub fn flush(&self, scene: &mut dyn Scene, item: ItemId) {
        for (key, map) in [(TAG_SETTINGS, &self.flat), (TAG_SETTINGS_GROUPS, &self.groups)] {
            if map.is_empty() {
                scene.set_tag(item, key, None);
            } else if let Ok(raw) = serde_json::to_string(&Json::Object(map.clone())) {
                scene.set_tag(item, key, Some(&raw));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Json> {
        self.flat.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.flat.get(key).and_then(Json::as_str)
    }

    pub fn get_f32(&self, key: &str) -> Option<f32> {
        self.flat.get(key).and_then(Json::as_f64).map(|v| v as f32)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.flat.get(key).and_then(Json::as_bool)
    }

    pub fn set(&mut self, key: &str, value: Json) {
        self.flat.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Json> {
        self.flat.remove(key)
    }

    pub fn group(&self, group: &str) -> Option<&Map<String, Json>> {
        self.groups.get(group).and_then(Json::as_object)
    }

    pub fn group_get(&self, group: &str, key: &str) -> Option<&Json> {
        self.group(group).and_then(|g| g.get(key))
    }

    pub fn group_set(&mut self, group: &str, key: &str, value: Json) {
        let entry = self
            .groups
            .entry(group.to_string())
            .or_insert_with(|| Json::Object(Map::new()));
        if let Json::Object(map) = entry {
            map.insert(key.to_string(), value);
        }
    }

    pub fn remove_group(&mut self, group: &str) -> Option<Json> {
        self.groups.remove(group)
    }

    pub fn is_empty(&self) -> bool {
        self.flat.is_empty() && self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigkit_api_core::HostType;
    use rigkit_scene_core::MemoryScene;
    use serde_json::json;

    #[test]
    fn round_trip_through_tags() {
        let mut scene = MemoryScene::new();
        let item = scene.create_item(HostType::Locator, "it");

        let mut s = SettingsStore::new();
        s.set("refsize", json!(1.5));
        s.group_set("pst.pose", "filename", json!("arm_pose"));
        s.flush(&mut scene, item);

        let loaded = SettingsStore::load(&scene, item);
        assert_eq!(loaded.get_f32("refsize"), Some(1.5));
        assert_eq!(
            loaded.group_get("pst.pose", "filename").and_then(|v| v.as_str()),
            Some("arm_pose")
        );
    }

    #[test]
    fn empty_store_clears_tags() {
        let mut scene = MemoryScene::new();
        let item = scene.create_item(HostType::Locator, "it");

        let mut s = SettingsStore::new();
        s.set("k", json!(1));
        s.flush(&mut scene, item);
        assert!(scene.tag(item, TAG_SETTINGS).is_some());

        s.remove("k");
        s.flush(&mut scene, item);
        assert!(scene.tag(item, TAG_SETTINGS).is_none());
    }
}
