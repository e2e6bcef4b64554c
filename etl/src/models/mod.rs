pub mod schema;
pub mod value;

pub use schema::*;
pub use value::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Node labels written by the loader
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Hospital,
    Payer,
    Physician,
    Patient,
    Visit,
    Review,
}

impl NodeKind {
    pub const ALL: [NodeKind; 6] = [
        NodeKind::Hospital,
        NodeKind::Payer,
        NodeKind::Physician,
        NodeKind::Patient,
        NodeKind::Visit,
        NodeKind::Review,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Hospital => "Hospital",
            NodeKind::Payer => "Payer",
            NodeKind::Physician => "Physician",
            NodeKind::Patient => "Patient",
            NodeKind::Visit => "Visit",
            NodeKind::Review => "Review",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship types written by the loader
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipKind {
    Has,
    At,
    Treats,
    CoveredBy,
    Writes,
    Employs,
}

impl RelationshipKind {
    pub const ALL: [RelationshipKind; 6] = [
        RelationshipKind::Has,
        RelationshipKind::At,
        RelationshipKind::Treats,
        RelationshipKind::CoveredBy,
        RelationshipKind::Writes,
        RelationshipKind::Employs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::Has => "HAS",
            RelationshipKind::At => "AT",
            RelationshipKind::Treats => "TREATS",
            RelationshipKind::CoveredBy => "COVERED_BY",
            RelationshipKind::Writes => "WRITES",
            RelationshipKind::Employs => "EMPLOYS",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
