//! rigkit-scene-core: in-memory reference host.
//!
//! Implements the `Scene` bridge with the semantics the rig core relies on:
//! two-action channels with key lists, channel links, named item
//! multigraphs, transform modifiers and a deterministic `evaluate()` pass.
//! Tests and examples run the whole rig system against this host; an
//! application adapter would replace it without touching the core.

pub mod channel;
pub mod scene;

pub use channel::{Channel, Layer};
pub use scene::MemoryScene;
