pub mod csv_reader;

pub use csv_reader::{CsvSource, RecordStream, SourceRecord, SourceRecords};

use hospital_config::SourceLocations;

use crate::models::NodeKind;

/// The six CSV sources of a load run, one per node kind.
#[derive(Debug, Clone)]
pub struct SourceSet {
    locations: SourceLocations,
}

impl SourceSet {
    pub fn new(locations: SourceLocations) -> Self {
        Self { locations }
    }

    pub fn location(&self, kind: NodeKind) -> &str {
        match kind {
            NodeKind::Hospital => &self.locations.hospitals,
            NodeKind::Payer => &self.locations.payers,
            NodeKind::Physician => &self.locations.physicians,
            NodeKind::Patient => &self.locations.patients,
            NodeKind::Visit => &self.locations.visits,
            NodeKind::Review => &self.locations.reviews,
        }
    }

    pub fn source(&self, kind: NodeKind) -> CsvSource {
        CsvSource::new(kind, self.location(kind))
    }
}
