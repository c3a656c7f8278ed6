use std::fmt::Display;
use std::fmt::Formatter;
use std::str::FromStr;

use url::Url;

use crate::error::ModelError;
use crate::ids::ContentId;

/// Simple enum for playable content kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ContentKind {
    /// Live channel
    Channel,
    /// Movie
    Movie,
    /// Series episode
    Episode,
}

impl Display for ContentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentKind::Channel => write!(f, "channel"),
            ContentKind::Movie => write!(f, "movie"),
            ContentKind::Episode => write!(f, "episode"),
        }
    }
}

impl FromStr for ContentKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "channel" => Ok(ContentKind::Channel),
            "movie" => Ok(ContentKind::Movie),
            "episode" => Ok(ContentKind::Episode),
            other => Err(ModelError::InvalidKind(other.to_string())),
        }
    }
}

/// Reference to one playable item: identity plus the stream source to open.
///
/// The catalog owns everything else about the item; playback only needs the
/// id (for progress records), the kind, and where the stream lives.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContentRef {
    pub id: ContentId,
    pub kind: ContentKind,
    pub source: Url,
    pub title: Option<String>,
}

impl ContentRef {
    pub fn new(id: impl Into<ContentId>, kind: ContentKind, source: Url) -> Self {
        Self {
            id: id.into(),
            kind,
            source,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}
