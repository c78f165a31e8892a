//! Content streams an ad is composed of.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One of the three independently versioned content channels of an ad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Voices,
    Music,
    Sfx,
}

impl StreamType {
    /// Every stream, in the order the mixer aggregates them.
    pub const ALL: [StreamType; 3] = [StreamType::Voices, StreamType::Music, StreamType::Sfx];

    /// The wire/key representation of the stream.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Voices => "voices",
            Self::Music => "music",
            Self::Sfx => "sfx",
        }
    }

    /// Parse a stream from its wire representation.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "voices" => Ok(Self::Voices),
            "music" => Ok(Self::Music),
            "sfx" => Ok(Self::Sfx),
            other => Err(CoreError::MalformedInput(format!(
                "Unknown stream '{other}'. Must be one of: voices, music, sfx"
            ))),
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
