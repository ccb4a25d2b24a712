//! Channel cells: typed values with two action layers and per-layer keys.

use rigkit_api_core::{ChannelAction, ChannelType, Value};

/// One action layer: a base value plus an ordered key list. Reads between
/// keys hold the previous key's value (step); reads before the first key
/// return the first key.
#[derive(Clone, Debug, Default)]
pub struct Layer {
    pub value: Value,
    /// Sorted by time, strictly increasing.
    pub keys: Vec<(f32, Value)>,
    /// Whether anything was ever written to this layer.
    pub set: bool,
}

impl Layer {
    pub fn read(&self, time: f32) -> Value {
        if self.keys.is_empty() {
            return self.value.clone();
        }
        match self.keys.iter().rev().find(|(t, _)| *t <= time) {
            Some((_, v)) => v.clone(),
            None => self.keys[0].1.clone(),
        }
    }

    pub fn write(&mut self, value: Value, time: f32, key: bool) {
        self.set = true;
        if key {
            match self
                .keys
                .binary_search_by(|(t, _)| t.partial_cmp(&time).unwrap_or(std::cmp::Ordering::Less))
            {
                Ok(ix) => self.keys[ix].1 = value.clone(),
                Err(ix) => self.keys.insert(ix, (time, value.clone())),
            }
        }
        self.value = value;
    }

    pub fn remove_key(&mut self, time: f32) {
        self.keys.retain(|(t, _)| (*t - time).abs() > 1e-6);
    }
}

#[derive(Clone, Debug)]
pub struct Channel {
    pub ty: ChannelType,
    pub setup: Layer,
    pub edit: Layer,
    /// Value forced by link/modifier propagation during `evaluate()`.
    pub eval_cache: Option<Value>,
    /// User channels can be removed again; built-ins cannot.
    pub user: bool,
}

impl Channel {
    pub fn new(ty: ChannelType, default: Value, user: bool) -> Self {
        Channel {
            ty,
            setup: Layer {
                value: default,
                keys: Vec::new(),
                set: false,
            },
            edit: Layer::default(),
            eval_cache: None,
            user,
        }
    }

    pub fn layer(&self, action: ChannelAction) -> &Layer {
        match action {
            ChannelAction::Setup => &self.setup,
            ChannelAction::Edit => &self.edit,
        }
    }

    pub fn layer_mut(&mut self, action: ChannelAction) -> &mut Layer {
        match action {
            ChannelAction::Setup => &mut self.setup,
            ChannelAction::Edit => &mut self.edit,
        }
    }

    /// Evaluated value: propagation cache wins, then edit over setup.
    pub fn eval(&self, time: f32) -> Value {
        if let Some(v) = &self.eval_cache {
            return v.clone();
        }
        if self.edit.set {
            self.edit.read(time)
        } else {
            self.setup.read(time)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_reads_between_keys() {
        let mut layer = Layer::default();
        layer.write(Value::Float(1.0), 0.0, true);
        layer.write(Value::Float(2.0), 10.0, true);
        assert_eq!(layer.read(-5.0), Value::Float(1.0));
        assert_eq!(layer.read(5.0), Value::Float(1.0));
        assert_eq!(layer.read(10.0), Value::Float(2.0));
        assert_eq!(layer.read(20.0), Value::Float(2.0));
    }

    #[test]
    fn edit_shadows_setup() {
        let mut ch = Channel::new(ChannelType::Float, Value::Float(0.5), false);
        assert_eq!(ch.eval(0.0), Value::Float(0.5));
        ch.edit.write(Value::Float(2.0), 0.0, false);
        assert_eq!(ch.eval(0.0), Value::Float(2.0));
        ch.eval_cache = Some(Value::Float(9.0));
        assert_eq!(ch.eval(0.0), Value::Float(9.0));
    }
}
