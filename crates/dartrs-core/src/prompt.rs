//! Prompt compiler
//!
//! Turns a [`StructuredPrompt`] into the canonical prompt string:
//!
//! ```text
//! <|bos|><copyright>..</copyright><character>..</character>
//! <rating><aspect_ratio><length><general>..free text..[<identity><|input_end|>]
//! ```
//!
//! Free text is inserted verbatim. Callers must not embed control-tag syntax in
//! `copyright`, `character` or `general_tags`; nothing is escaped.

use crate::tags::{
    AspectRatioTag, IdentityTag, LengthTag, RatingTag,
    ReservedTag::{Bos, CharacterEnd, CharacterStart, CopyrightEnd, CopyrightStart, GeneralStart, InputEnd},
    SpecialTag,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured generation request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructuredPrompt {
    pub copyright: String,
    pub character: String,
    pub rating: RatingTag,
    pub aspect_ratio: AspectRatioTag,
    pub length: LengthTag,
    pub identity: IdentityTag,
    /// Comma-separated general tags, kept in order
    pub general_tags: String,
    /// Close the input with `identity · input_end` so the model completes the tag list
    pub do_completion: bool,
}

impl Default for StructuredPrompt {
    fn default() -> Self {
        Self {
            copyright: String::new(),
            character: String::new(),
            rating: RatingTag::Sfw,
            aspect_ratio: AspectRatioTag::Tall,
            length: LengthTag::Long,
            identity: IdentityTag::Lax,
            general_tags: String::new(),
            do_completion: true,
        }
    }
}

impl StructuredPrompt {
    pub fn new(general_tags: impl Into<String>) -> Self {
        Self {
            general_tags: general_tags.into(),
            ..Default::default()
        }
    }

    pub fn copyright(mut self, copyright: impl Into<String>) -> Self {
        self.copyright = copyright.into();
        self
    }

    pub fn character(mut self, character: impl Into<String>) -> Self {
        self.character = character.into();
        self
    }

    pub fn rating(mut self, rating: RatingTag) -> Self {
        self.rating = rating;
        self
    }

    pub fn aspect_ratio(mut self, aspect_ratio: AspectRatioTag) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn length(mut self, length: LengthTag) -> Self {
        self.length = length;
        self
    }

    pub fn identity(mut self, identity: IdentityTag) -> Self {
        self.identity = identity;
        self
    }

    pub fn do_completion(mut self, do_completion: bool) -> Self {
        self.do_completion = do_completion;
        self
    }

    /// Compile into the canonical prompt string
    pub fn compose(&self) -> CompiledPrompt {
        compose(self)
    }
}

/// Canonical prompt text ready for tokenization
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompiledPrompt(String);

impl CompiledPrompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CompiledPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CompiledPrompt {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<CompiledPrompt> for String {
    fn from(prompt: CompiledPrompt) -> Self {
        prompt.0
    }
}

/// Compile a structured prompt. Pure and deterministic.
pub fn compose(prompt: &StructuredPrompt) -> CompiledPrompt {
    let StructuredPrompt {
        copyright,
        character,
        rating,
        aspect_ratio,
        length,
        identity,
        general_tags,
        do_completion,
    } = prompt;

    let rating = rating.to_tag();
    let aspect_ratio = aspect_ratio.to_tag();
    let length = length.to_tag();

    let mut text = format!(
        "\
{Bos}\
{CopyrightStart}{copyright}{CopyrightEnd}\
{CharacterStart}{character}{CharacterEnd}\
{rating}{aspect_ratio}{length}\
{GeneralStart}{general_tags}"
    );

    if *do_completion {
        text.push_str(identity.to_tag());
        text.push_str(InputEnd.to_tag());
    }

    CompiledPrompt(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_prompt() {
        let prompt = StructuredPrompt::new("1girl, cat ears")
            .copyright("vocaloid")
            .character("hatsune miku")
            .rating(RatingTag::Sfw)
            .aspect_ratio(AspectRatioTag::Tall)
            .length(LengthTag::Long)
            .identity(IdentityTag::Lax);

        assert_eq!(
            compose(&prompt).as_str(),
            "<|bos|><copyright>vocaloid</copyright><character>hatsune miku</character>\
<|rating:sfw|><|aspect_ratio:tall|><|length:long|>\
<general>1girl, cat ears<|identity:lax|><|input_end|>"
        );
    }

    #[test]
    fn test_compose_without_completion() {
        let prompt = StructuredPrompt::new("2girls").do_completion(false);
        let compiled = compose(&prompt);

        assert!(compiled.as_str().ends_with("<general>2girls"));
        assert!(!compiled.as_str().contains("<|input_end|>"));
        assert!(!compiled.as_str().contains("<|identity:"));
    }

    #[test]
    fn test_empty_fields_keep_skeleton() {
        for &rating in RatingTag::ALL {
            for &aspect_ratio in AspectRatioTag::ALL {
                for &length in LengthTag::ALL {
                    for &identity in IdentityTag::ALL {
                        let prompt = StructuredPrompt {
                            rating,
                            aspect_ratio,
                            length,
                            identity,
                            ..Default::default()
                        };
                        let expected = format!(
                            "<|bos|><copyright></copyright><character></character>{}{}{}<general>{}<|input_end|>",
                            rating.to_tag(),
                            aspect_ratio.to_tag(),
                            length.to_tag(),
                            identity.to_tag(),
                        );
                        assert_eq!(compose(&prompt).as_str(), expected);
                    }
                }
            }
        }
    }

    #[test]
    fn test_free_text_is_not_escaped() {
        let prompt = StructuredPrompt::new("a, <b>, c");
        assert!(compose(&prompt).as_str().contains("<general>a, <b>, c<|identity:lax|>"));
    }
}
