//! Preset channel-address parsing and formatting.
//!
//! Grammar (host convention, fixed five fields, '..' separated):
//!   <side-letter>..<moduleName>..<itemType>..<itemName>..<channelName>
//! - side-letter is one of R | L | C
//! - internal dots and spaces in names are folded to underscores when an
//!   address is built, so the separator stays unambiguous
//!   Example:
//!   "L..Arm..ctrl..upper..rot.X" is formatted from module "Arm", item type
//!   "ctrl", item "upper", channel "rot.X" (the channel field keeps its dots;
//!   it is the final field and consumes the remainder).

use crate::side::Side;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const SEP: &str = "..";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelAddress {
    pub side: Side,
    pub module: String,
    pub item_type: String,
    pub item_name: String,
    pub channel: String,
}

/// Fold the characters that would collide with the separator.
pub fn fold_name(name: &str) -> String {
    name.replace(['.', ' '], "_")
}

impl ChannelAddress {
    pub fn new(
        side: Side,
        module: &str,
        item_type: &str,
        item_name: &str,
        channel: &str,
    ) -> Self {
        ChannelAddress {
            side,
            module: fold_name(module),
            item_type: fold_name(item_type),
            item_name: fold_name(item_name),
            // the channel field is last and keeps its internal dots
            channel: channel.to_string(),
        }
    }

    /// Parse an address string. The first four fields must not be empty; the
    /// channel field consumes everything after the fourth separator.
    pub fn parse(s: &str) -> Result<Self, String> {
        let mut rest = s;
        let mut fields: Vec<&str> = Vec::with_capacity(4);
        for _ in 0..4 {
            match rest.find(SEP) {
                Some(ix) => {
                    fields.push(&rest[..ix]);
                    rest = &rest[ix + SEP.len()..];
                }
                None => return Err(format!("malformed channel address: {s}")),
            }
        }
        if fields.iter().any(|f| f.is_empty()) || rest.is_empty() {
            return Err(format!("empty field in channel address: {s}"));
        }

        let side_field = fields[0];
        let mut chars = side_field.chars();
        let side = match (chars.next().and_then(Side::from_letter), chars.next()) {
            (Some(side), None) => side,
            _ => return Err(format!("invalid side letter in address: {side_field}")),
        };

        Ok(ChannelAddress {
            side,
            module: fields[1].to_string(),
            item_type: fields[2].to_string(),
            item_name: fields[3].to_string(),
            channel: rest.to_string(),
        })
    }

    /// Same address on the opposite side; the mirroring half of preset load.
    pub fn mirrored(&self) -> ChannelAddress {
        ChannelAddress {
            side: self.side.opposite(),
            ..self.clone()
        }
    }

    /// Internal channel names strip the separator dots entirely.
    pub fn internal_name(&self) -> String {
        self.to_string().replace('.', "")
    }
}

impl fmt::Display for ChannelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEP}{}{SEP}{}{SEP}{}{SEP}{}",
            self.side.letter(),
            self.module,
            self.item_type,
            self.item_name,
            self.channel
        )
    }
}

impl FromStr for ChannelAddress {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChannelAddress::parse(s)
    }
}

// Serde support: serialize as string, deserialize from string
impl Serialize for ChannelAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChannelAddress {
    fn deserialize<D>(deserializer: D) -> Result<ChannelAddress, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ChannelAddress::parse(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let a = ChannelAddress::new(Side::Left, "Arm", "ctrl", "upper", "rot.X");
        let s = a.to_string();
        assert_eq!(s, "L..Arm..ctrl..upper..rot.X");
        assert_eq!(ChannelAddress::parse(&s).unwrap(), a);
    }

    #[test]
    fn folds_dots_and_spaces_in_names() {
        let a = ChannelAddress::new(Side::Center, "My Arm", "ctrl", "up.low", "pos.Y");
        assert_eq!(a.module, "My_Arm");
        assert_eq!(a.item_name, "up_low");
        assert_eq!(a.to_string(), "C..My_Arm..ctrl..up_low..pos.Y");
    }

    #[test]
    fn mirrored_swaps_side_only() {
        let a = ChannelAddress::new(Side::Right, "Arm", "ctrl", "hand", "pos.X");
        let m = a.mirrored();
        assert_eq!(m.side, Side::Left);
        assert_eq!(m.mirrored(), a);
    }

    #[test]
    fn rejects_malformed() {
        assert!(ChannelAddress::parse("L..Arm..ctrl..upper").is_err());
        assert!(ChannelAddress::parse("X..Arm..ctrl..upper..rot.X").is_err());
        assert!(ChannelAddress::parse("L..Arm....upper..rot.X").is_err());
        assert!(ChannelAddress::parse("").is_err());
    }
}
