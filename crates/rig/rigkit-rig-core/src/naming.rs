//! Naming schemes: deterministic renderers from name tokens to display
//! names, plus the side-prefixed reference names used as stable
//! cross-references. Item names are never set verbatim except during
//! standardisation.

use crate::registry::{ComponentKind, SystemComponent};
use rigkit_api_core::Side;
use std::any::Any;

/// Everything a scheme may consult. Absent tokens render as nothing.
#[derive(Clone, Debug, Default)]
pub struct NameTokens {
    pub rig_name: String,
    pub module_name: String,
    pub base_name: String,
    pub side: Option<Side>,
    pub item_type: String,
    pub host_type: String,
    pub feature_idents: Vec<String>,
}

pub trait NamingScheme {
    fn ident(&self) -> &str;
    fn render(&self, tokens: &NameTokens) -> String;
}

/// Default scheme: `<sideLetter>_<module>_<base>_<itemType>`, empty fields
/// collapsed. Center items carry no side prefix.
#[derive(Debug, Default)]
pub struct StandardNamingScheme;

impl NamingScheme for StandardNamingScheme {
    fn ident(&self) -> &str {
        "standard"
    }

    fn render(&self, tokens: &NameTokens) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(4);
        if let Some(side) = tokens.side {
            if side.is_lateral() {
                parts.push(side.letter().to_string());
            }
        }
        for field in [&tokens.module_name, &tokens.base_name, &tokens.item_type] {
            if !field.is_empty() {
                parts.push(field.clone());
            }
        }
        parts.join("_")
    }
}

impl SystemComponent for StandardNamingScheme {
    fn kind(&self) -> ComponentKind {
        ComponentKind::NamingScheme
    }
    fn ident(&self) -> String {
        NamingScheme::ident(self).to_string()
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Side-prefixed, scheme-independent human-friendly name: `R:Arm.upper`.
pub fn reference_name(side: Side, module_name: &str, base_name: &str) -> String {
    if base_name.is_empty() {
        format!("{}:{}", side.letter(), module_name)
    } else {
        format!("{}:{}.{}", side.letter(), module_name, base_name)
    }
}

/// Flip the side letter of a reference name; center names are unchanged.
pub fn mirrored_reference_name(name: &str) -> String {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), Some(':')) => match Side::from_letter(letter) {
            Some(side) if side.is_lateral() => {
                format!("{}:{}", side.opposite().letter(), chars.as_str())
            }
            _ => name.to_string(),
        },
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_scheme_renders() {
        let scheme = StandardNamingScheme;
        let tokens = NameTokens {
            module_name: "Arm".into(),
            base_name: "upper".into(),
            side: Some(Side::Left),
            item_type: "ctrl".into(),
            ..Default::default()
        };
        assert_eq!(scheme.render(&tokens), "L_Arm_upper_ctrl");

        let center = NameTokens {
            side: Some(Side::Center),
            ..tokens
        };
        assert_eq!(scheme.render(&center), "Arm_upper_ctrl");
    }

    #[test]
    fn mirrored_reference_names_flip_lateral_only() {
        assert_eq!(mirrored_reference_name("L:Arm.upper"), "R:Arm.upper");
        assert_eq!(mirrored_reference_name("R:Arm"), "L:Arm");
        assert_eq!(mirrored_reference_name("C:Spine.mid"), "C:Spine.mid");
        assert_eq!(mirrored_reference_name("noside"), "noside");
    }
}
