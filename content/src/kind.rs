use std::fmt;
use std::str::FromStr;

/// The resource kinds the store knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Activities,
    Events,
    Photos,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [Self::Activities, Self::Events, Self::Photos];

    /// Plural, lowercase name used in URLs, table names and log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Activities => "activities",
            Self::Events => "events",
            Self::Photos => "photos",
        }
    }

    /// Name of the JSON collection file for the file-backed store.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Activities => "activities.json",
            Self::Events => "events.json",
            Self::Photos => "photos.json",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource kind: {0}")]
pub struct ParseKindError(pub String);

impl FromStr for ResourceKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "activities" => Ok(Self::Activities),
            "events" => Ok(Self::Events),
            "photos" => Ok(Self::Photos),
            other => Err(ParseKindError(other.to_string())),
        }
    }
}
