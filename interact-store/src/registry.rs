use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed registry of entity collections the rules engine is allowed to
/// query. Conditions reference collections by name; anything outside this
/// set fails the lookup instead of reaching an unintended collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Participation,
    Recognition,
    Challenge,
    Survey,
    Event,
    UserPoints,
}

impl EntityKind {
    /// Resolves a collection name from rule data. Returns `None` for names
    /// outside the registry.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Participation" => Some(EntityKind::Participation),
            "Recognition" => Some(EntityKind::Recognition),
            "Challenge" => Some(EntityKind::Challenge),
            "Survey" => Some(EntityKind::Survey),
            "Event" => Some(EntityKind::Event),
            "UserPoints" => Some(EntityKind::UserPoints),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Participation => "Participation",
            EntityKind::Recognition => "Recognition",
            EntityKind::Challenge => "Challenge",
            EntityKind::Survey => "Survey",
            EntityKind::Event => "Event",
            EntityKind::UserPoints => "UserPoints",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
