//! Mesh resolutions: an ordered per-rig list of named mesh-set variants
//! with a current selector, stored in the rig root settings.

use crate::error::{Result, RigError};
use crate::events::Event;
use crate::item;
use crate::service::Ctx;
use crate::tags::{SET_RES_CURRENT, SET_RES_LIST, SET_RES_MEMBER};
use rigkit_api_core::ItemId;
use serde_json::json;

pub fn list(ctx: &Ctx<'_>) -> Vec<String> {
    ctx.rig
        .root_settings()
        .and_then(|s| s.get(SET_RES_LIST))
        .and_then(|v| v.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn current(ctx: &Ctx<'_>) -> Option<String> {
    ctx.rig
        .root_settings()
        .and_then(|s| s.get_str(SET_RES_CURRENT))
        .map(str::to_string)
}

fn store(ctx: &mut Ctx<'_>, names: &[String], current: Option<&str>) {
    if let Some(settings) = ctx.rig.root_settings_mut() {
        if names.is_empty() {
            settings.remove(SET_RES_LIST);
        } else {
            settings.set(SET_RES_LIST, json!(names));
        }
        match current {
            Some(name) => settings.set(SET_RES_CURRENT, json!(name)),
            None => {
                settings.remove(SET_RES_CURRENT);
            }
        }
    }
    let root = ctx.rig.root;
    item::flush_settings(ctx, root);
    ctx.post(Event::ResolutionChanged { root });
    ctx.scene.notify("rs.resolution");
}

pub fn add(ctx: &mut Ctx<'_>, name: &str, set_as_current: bool) -> Result<()> {
    let mut names = list(ctx);
    if names.iter().any(|n| n == name) {
        return Err(RigError::InvalidArgument(format!(
            "resolution '{name}' already exists"
        )));
    }
    names.push(name.to_string());
    let current = if set_as_current || names.len() == 1 {
        Some(name.to_string())
    } else {
        current(ctx)
    };
    store(ctx, &names, current.as_deref());
    Ok(())
}

/// Remove a resolution; when it was current, the previous entry (or the
/// new first) becomes current.
pub fn remove(ctx: &mut Ctx<'_>, name: &str) -> Result<()> {
    let mut names = list(ctx);
    let Some(index) = names.iter().position(|n| n == name) else {
        return Err(RigError::Lookup(format!("resolution '{name}'")));
    };
    names.remove(index);
    let current = if current(ctx).as_deref() == Some(name) {
        if names.is_empty() {
            None
        } else {
            Some(names[index.saturating_sub(1).min(names.len() - 1)].clone())
        }
    } else {
        current(ctx)
    };
    store(ctx, &names, current.as_deref());
    Ok(())
}

pub fn rename(ctx: &mut Ctx<'_>, old: &str, new: &str) -> Result<()> {
    let mut names = list(ctx);
    let Some(index) = names.iter().position(|n| n == old) else {
        return Err(RigError::Lookup(format!("resolution '{old}'")));
    };
    if names.iter().any(|n| n == new) {
        return Err(RigError::InvalidArgument(format!(
            "resolution '{new}' already exists"
        )));
    }
    names[index] = new.to_string();
    let current = match current(ctx) {
        Some(c) if c == old => Some(new.to_string()),
        other => other,
    };
    store(ctx, &names, current.as_deref());

    // keep item memberships pointing at the renamed entry
    let items: Vec<ItemId> = ctx.rig.items.keys().copied().collect();
    for it in items {
        let mut membership = membership(ctx, it);
        if let Some(pos) = membership.iter().position(|n| n == old) {
            membership[pos] = new.to_string();
            set_membership(ctx, it, &membership);
        }
    }
    Ok(())
}

fn shift(ctx: &mut Ctx<'_>, name: &str, offset: isize) -> Result<()> {
    let mut names = list(ctx);
    let Some(index) = names.iter().position(|n| n == name) else {
        return Err(RigError::Lookup(format!("resolution '{name}'")));
    };
    let target = index as isize + offset;
    if target < 0 || target as usize >= names.len() {
        return Ok(());
    }
    names.swap(index, target as usize);
    let current = current(ctx);
    store(ctx, &names, current.as_deref());
    Ok(())
}

pub fn move_up(ctx: &mut Ctx<'_>, name: &str) -> Result<()> {
    shift(ctx, name, -1)
}

pub fn move_down(ctx: &mut Ctx<'_>, name: &str) -> Result<()> {
    shift(ctx, name, 1)
}

pub fn set_current(ctx: &mut Ctx<'_>, name: &str) -> Result<()> {
    let names = list(ctx);
    if !names.iter().any(|n| n == name) {
        return Err(RigError::Lookup(format!("resolution '{name}'")));
    }
    store(ctx, &names, Some(name));
    Ok(())
}

fn step_current(ctx: &mut Ctx<'_>, offset: isize) -> Result<()> {
    let names = list(ctx);
    if names.is_empty() {
        return Ok(());
    }
    let index = current(ctx)
        .and_then(|c| names.iter().position(|n| *n == c))
        .unwrap_or(0) as isize;
    let next = (index + offset).rem_euclid(names.len() as isize) as usize;
    let name = names[next].clone();
    store(ctx, &names, Some(&name));
    Ok(())
}

pub fn set_next(ctx: &mut Ctx<'_>) -> Result<()> {
    step_current(ctx, 1)
}

pub fn set_previous(ctx: &mut Ctx<'_>) -> Result<()> {
    step_current(ctx, -1)
}

/// Resolution names an item belongs to. An item without the membership
/// setting belongs to every resolution.
pub fn membership(ctx: &Ctx<'_>, item: ItemId) -> Vec<String> {
    ctx.rig
        .items
        .get(&item)
        .and_then(|r| r.settings.get(SET_RES_MEMBER))
        .and_then(|v| v.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn set_membership(ctx: &mut Ctx<'_>, item: ItemId, names: &[String]) {
    if let Some(record) = ctx.rig.items.get_mut(&item) {
        if names.is_empty() {
            record.settings.remove(SET_RES_MEMBER);
        } else {
            record.settings.set(SET_RES_MEMBER, json!(names));
        }
    }
    item::flush_settings(ctx, item);
}

pub fn is_member(ctx: &Ctx<'_>, item: ItemId, current: Option<&str>) -> bool {
    let membership = membership(ctx, item);
    match current {
        None => true,
        Some(name) => membership.is_empty() || membership.iter().any(|n| n == name),
    }
}
