//! Tag vocabulary: control tags and reserved structural tokens
//!
//! Control tags are closed enumerations rendered as `<|category:value|>`.
//! Parsing from text is the only fallible path; once a value exists it always
//! has exactly one canonical token text.

use crate::{CoreError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Anything with a canonical token text
pub trait SpecialTag {
    fn to_tag(&self) -> &'static str;
}

/// Category of a control tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagCategory {
    Rating,
    AspectRatio,
    Length,
    Identity,
}

impl TagCategory {
    pub const ALL: &'static [TagCategory] = &[
        TagCategory::Rating,
        TagCategory::AspectRatio,
        TagCategory::Length,
        TagCategory::Identity,
    ];

    /// Name used inside the canonical tag text
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rating => "rating",
            Self::AspectRatio => "aspect_ratio",
            Self::Length => "length",
            Self::Identity => "identity",
        }
    }
}

impl fmt::Display for TagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

macro_rules! control_tag {
    (
        $(#[$meta:meta])*
        $name:ident, $category:expr, $prefix:literal {
            $($variant:ident => $value:literal $(| $alias:literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every value, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const CATEGORY: TagCategory = $category;

            /// Bare value name, e.g. `tall`
            pub fn value(&self) -> &'static str {
                match self {
                    $(Self::$variant => $value),+
                }
            }
        }

        impl SpecialTag for $name {
            fn to_tag(&self) -> &'static str {
                match self {
                    $(Self::$variant => concat!("<|", $prefix, ":", $value, "|>")),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.to_tag())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            /// Accepts the bare value (`tall`) or the canonical tag text
            fn from_str(s: &str) -> Result<Self> {
                let trimmed = s.trim();
                $(
                    if trimmed == $value
                        $(|| trimmed == $alias)*
                        || trimmed == concat!("<|", $prefix, ":", $value, "|>")
                    {
                        return Ok(Self::$variant);
                    }
                )+
                Err(CoreError::invalid_parameter(
                    "UNKNOWN_TAG_VALUE",
                    format!("Unknown {} tag: '{}'", $prefix, trimmed),
                    "Parsing control tag",
                    format!("Use one of: {}", [$($value),+].join(", ")),
                    $prefix,
                    trimmed,
                    [$($value),+].join("|"),
                ))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.value())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

control_tag! {
    /// Content rating of the target image
    RatingTag, TagCategory::Rating, "rating" {
        Sfw => "sfw",
        General => "general",
        Sensitive => "sensitive",
        Nsfw => "nsfw",
        Questionable => "questionable",
        Explicit => "explicit",
    }
}

control_tag! {
    /// Aspect ratio bucket of the target image
    AspectRatioTag, TagCategory::AspectRatio, "aspect_ratio" {
        UltraWide => "ultra_wide",
        Wide => "wide",
        Square => "square",
        Tall => "tall",
        UltraTall => "ultra_tall",
    }
}

control_tag! {
    /// Desired number of generated tags
    LengthTag, TagCategory::Length, "length" {
        VeryShort => "very_short",
        Short => "short",
        Medium => "medium",
        Long => "long",
        VeryLong => "very_long",
    }
}

control_tag! {
    /// How strictly generated tags must preserve the subject's identity
    IdentityTag, TagCategory::Identity, "identity" {
        Free => "none" | "free",
        Lax => "lax",
        Strict => "strict",
    }
}

/// A control tag of any category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlTag {
    Rating(RatingTag),
    AspectRatio(AspectRatioTag),
    Length(LengthTag),
    Identity(IdentityTag),
}

impl ControlTag {
    /// Resolve a category and a bare value into a control tag
    pub fn parse(category: TagCategory, value: &str) -> Result<Self> {
        Ok(match category {
            TagCategory::Rating => Self::Rating(value.parse()?),
            TagCategory::AspectRatio => Self::AspectRatio(value.parse()?),
            TagCategory::Length => Self::Length(value.parse()?),
            TagCategory::Identity => Self::Identity(value.parse()?),
        })
    }

    pub fn category(&self) -> TagCategory {
        match self {
            Self::Rating(_) => TagCategory::Rating,
            Self::AspectRatio(_) => TagCategory::AspectRatio,
            Self::Length(_) => TagCategory::Length,
            Self::Identity(_) => TagCategory::Identity,
        }
    }

    /// Every control tag of every category, in a fixed order
    pub fn all() -> impl Iterator<Item = ControlTag> {
        RatingTag::ALL
            .iter()
            .map(|&t| Self::Rating(t))
            .chain(AspectRatioTag::ALL.iter().map(|&t| Self::AspectRatio(t)))
            .chain(LengthTag::ALL.iter().map(|&t| Self::Length(t)))
            .chain(IdentityTag::ALL.iter().map(|&t| Self::Identity(t)))
    }
}

impl SpecialTag for ControlTag {
    fn to_tag(&self) -> &'static str {
        match self {
            Self::Rating(t) => t.to_tag(),
            Self::AspectRatio(t) => t.to_tag(),
            Self::Length(t) => t.to_tag(),
            Self::Identity(t) => t.to_tag(),
        }
    }
}

impl fmt::Display for ControlTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_tag())
    }
}

/// Structural tokens of the prompt format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservedTag {
    Bos,
    Eos,
    Unk,
    CopyrightStart,
    CopyrightEnd,
    CharacterStart,
    CharacterEnd,
    GeneralStart,
    GeneralEnd,
    InputEnd,
}

impl ReservedTag {
    pub const ALL: &'static [ReservedTag] = &[
        ReservedTag::Bos,
        ReservedTag::Eos,
        ReservedTag::Unk,
        ReservedTag::CopyrightStart,
        ReservedTag::CopyrightEnd,
        ReservedTag::CharacterStart,
        ReservedTag::CharacterEnd,
        ReservedTag::GeneralStart,
        ReservedTag::GeneralEnd,
        ReservedTag::InputEnd,
    ];

    /// Whether `text` is a reserved or control tag
    pub fn is_special(text: &str) -> bool {
        all_special_tags().any(|tag| tag == text)
    }
}

impl SpecialTag for ReservedTag {
    fn to_tag(&self) -> &'static str {
        match self {
            Self::Bos => "<|bos|>",
            Self::Eos => "<|eos|>",
            Self::Unk => "<|unk|>",
            Self::CopyrightStart => "<copyright>",
            Self::CopyrightEnd => "</copyright>",
            Self::CharacterStart => "<character>",
            Self::CharacterEnd => "</character>",
            Self::GeneralStart => "<general>",
            Self::GeneralEnd => "</general>",
            Self::InputEnd => "<|input_end|>",
        }
    }
}

impl fmt::Display for ReservedTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_tag())
    }
}

/// Reserved tags followed by every control tag
pub fn all_special_tags() -> impl Iterator<Item = &'static str> {
    ReservedTag::ALL
        .iter()
        .map(|t| t.to_tag())
        .chain(ControlTag::all().map(|t| t.to_tag()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_canonical_tag_text() {
        assert_eq!(RatingTag::Sfw.to_tag(), "<|rating:sfw|>");
        assert_eq!(AspectRatioTag::UltraWide.to_tag(), "<|aspect_ratio:ultra_wide|>");
        assert_eq!(LengthTag::VeryLong.to_tag(), "<|length:very_long|>");
        assert_eq!(IdentityTag::Free.to_tag(), "<|identity:none|>");
        assert_eq!(ReservedTag::InputEnd.to_string(), "<|input_end|>");
    }

    #[test]
    fn test_parse_value_and_tag_text() {
        assert_eq!("tall".parse::<AspectRatioTag>().unwrap(), AspectRatioTag::Tall);
        assert_eq!(
            "<|aspect_ratio:tall|>".parse::<AspectRatioTag>().unwrap(),
            AspectRatioTag::Tall
        );
        assert_eq!("free".parse::<IdentityTag>().unwrap(), IdentityTag::Free);
        assert_eq!("none".parse::<IdentityTag>().unwrap(), IdentityTag::Free);

        let err = "huge".parse::<LengthTag>().unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_TAG_VALUE");
        assert!(err.is_construction_error());
    }

    #[test]
    fn test_control_tag_encode() {
        let tag = ControlTag::parse(TagCategory::Rating, "explicit").unwrap();
        assert_eq!(tag.category(), TagCategory::Rating);
        assert_eq!(tag.to_tag(), "<|rating:explicit|>");
        assert!(ControlTag::parse(TagCategory::Identity, "loose").is_err());
    }

    #[test]
    fn test_special_tags_unique() {
        let tags: Vec<_> = all_special_tags().collect();
        let unique: HashSet<_> = tags.iter().collect();
        assert_eq!(tags.len(), unique.len());
        assert_eq!(tags.len(), ReservedTag::ALL.len() + 6 + 5 + 5 + 3);
        assert!(ReservedTag::is_special("<|length:short|>"));
        assert!(!ReservedTag::is_special("cat ears"));
    }

    #[test]
    fn test_serde_uses_bare_values() {
        let json = serde_json::to_string(&AspectRatioTag::UltraTall).unwrap();
        assert_eq!(json, "\"ultra_tall\"");
        let tag: IdentityTag = serde_json::from_str("\"strict\"").unwrap();
        assert_eq!(tag, IdentityTag::Strict);
    }
}
