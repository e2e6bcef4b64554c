#![allow(dead_code)]

use async_trait::async_trait;
use hospital_config::{EtlConfig, RetryConfig, SourceLocations, StoreConfig};
use hospital_etl::{EtlError, EtlResult, GraphStore, InMemoryGraph, StoreConnector};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const HOSPITALS: &str = "\
hospital_id,hospital_name,hospital_state
9,Wallace-Hamilton,CO
18,Burke Ltd,NC
27,Walton LLC,FL
";

pub const PAYERS: &str = "\
payer_id,payer_name
1,Medicaid
2,UnitedHealthcare
";

pub const PHYSICIANS: &str = "\
physician_name,physician_id,physician_dob,physician_grad_year,medical_school,salary
Joseph Johnson,3,1970-02-22,2000-02-22,Johns Hopkins University School of Medicine,309534.16
Jason Williams,12,1982-12-22,2014-12-22,Mayo Clinic Alix School of Medicine,281114.48
";

pub const PATIENTS: &str = "\
patient_id,patient_name,patient_sex,patient_dob,patient_blood_type
100,Tiffany Ramirez,Female,1994-10-06,O-
101,Ruben Burns,Male,1973-03-05,O+
";

pub const VISITS: &str = "\
patient_id,date_of_admission,billing_amount,room_number,admission_type,discharge_date,test_results,visit_id,physician_id,payer_id,hospital_id,chief_complaint,treatment_description,primary_diagnosis,visit_status
100,2022-11-17,1250.50,146,Elective,2022-12-01,Inconclusive,500,3,1,9,,,,DISCHARGED
101,2023-06-01,N/A,404,Emergency,2023-06-15,Normal,501,12,2,18,,,,DISCHARGED
999,2023-07-09,300.00,12,Urgent,,Abnormal,502,3,1,27,,,,OPEN
";

pub const REVIEWS: &str = "\
review_id,visit_id,review,physician_name,hospital_name,patient_name
700,500,The staff were attentive and kind.,Joseph Johnson,Wallace-Hamilton,Tiffany Ramirez
701,9999,Long wait in the emergency room.,Jason Williams,Burke Ltd,Ruben Burns
";

/// The six CSV sources written into a temporary directory.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let fixture = Self {
            dir: TempDir::new().expect("Failed to create fixture dir"),
        };
        fixture.write("hospitals.csv", HOSPITALS);
        fixture.write("payers.csv", PAYERS);
        fixture.write("physicians.csv", PHYSICIANS);
        fixture.write("patients.csv", PATIENTS);
        fixture.write("visits.csv", VISITS);
        fixture.write("reviews.csv", REVIEWS);
        fixture
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, content: &str) {
        fs::write(self.path(name), content).expect("Failed to write fixture");
    }

    pub fn locations(&self) -> SourceLocations {
        let location = |name: &str| self.path(name).to_string_lossy().into_owned();
        SourceLocations {
            hospitals: location("hospitals.csv"),
            payers: location("payers.csv"),
            physicians: location("physicians.csv"),
            patients: location("patients.csv"),
            visits: location("visits.csv"),
            reviews: location("reviews.csv"),
        }
    }

    /// Config with a short retry delay so retry tests stay fast.
    pub fn config(&self, max_attempts: u32) -> EtlConfig {
        let store = StoreConfig::new("bolt://localhost:7687", "neo4j", "test", "neo4j");
        let mut config = EtlConfig::new(self.locations(), store);
        config.retry = RetryConfig {
            max_attempts,
            delay: Duration::from_millis(5),
        };
        config.batch_size = 2;
        config
    }
}

/// Connector whose first `failures` connects fail with `StoreUnavailable`.
pub struct FlakyConnector {
    graph: InMemoryGraph,
    failures: usize,
    connects: AtomicUsize,
}

impl FlakyConnector {
    pub fn new(graph: InMemoryGraph, failures: usize) -> Self {
        Self {
            graph,
            failures,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for FlakyConnector {
    async fn connect(&self) -> EtlResult<Arc<dyn GraphStore>> {
        let previous = self.connects.fetch_add(1, Ordering::SeqCst);
        if previous < self.failures {
            return Err(EtlError::StoreUnavailable("connection refused".to_string()));
        }
        Ok(Arc::new(self.graph.clone()))
    }
}
