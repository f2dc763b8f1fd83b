//! Shared domain models.

use std::{
    fmt,
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

mod line;
mod section;

pub use line::Line;
pub use section::Section;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Identifier of a [`Station`].
    StationId
);
id_type!(
    /// Identifier of a [`Line`].
    LineId
);
id_type!(
    /// Identifier of a stored [`Section`].
    SectionId
);

/// A named stop. Two stations are the same station when their ids match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    /// Store-assigned identifier.
    pub id: StationId,
    /// Display name.
    pub name: String,
}

impl Station {
    /// Build a station value.
    pub fn new(id: impl Into<StationId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl PartialEq for Station {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Station {}

impl Hash for Station {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{})", self.name, self.id)
    }
}
