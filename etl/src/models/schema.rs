//! Table-driven description of the graph the loader builds.
//!
//! Every node kind and every sourced relationship kind is a row in one of the
//! tables below; the loaders are generic over these rows.

use super::{NodeKind, RelationshipKind, ValueType};

/// Store property holding the natural identifier of every node kind.
pub const ID_PROPERTY: &str = "id";

/// A CSV column copied onto a node or edge property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec {
    pub property: &'static str,
    pub column: &'static str,
    pub value_type: ValueType,
}

const fn text(property: &'static str, column: &'static str) -> AttributeSpec {
    AttributeSpec {
        property,
        column,
        value_type: ValueType::Text,
    }
}

const fn integer(property: &'static str, column: &'static str) -> AttributeSpec {
    AttributeSpec {
        property,
        column,
        value_type: ValueType::Integer,
    }
}

const fn decimal(property: &'static str, column: &'static str) -> AttributeSpec {
    AttributeSpec {
        property,
        column,
        value_type: ValueType::Decimal,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSpec {
    pub kind: NodeKind,
    /// Column parsed as the integer identifier
    pub id_column: &'static str,
    pub attributes: &'static [AttributeSpec],
}

/// Which node kind an edge end refers to, and which column names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointSpec {
    pub kind: NodeKind,
    pub column: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationshipSpec {
    pub kind: RelationshipKind,
    /// Table the relationship rows are read from
    pub source: NodeKind,
    pub from: EndpointSpec,
    pub to: EndpointSpec,
    pub attributes: &'static [AttributeSpec],
}

impl RelationshipSpec {
    pub fn endpoint_kinds(&self) -> [NodeKind; 2] {
        [self.from.kind, self.to.kind]
    }
}

pub static NODE_SPECS: [NodeSpec; 6] = [
    NodeSpec {
        kind: NodeKind::Hospital,
        id_column: "hospital_id",
        attributes: &[text("name", "hospital_name"), text("state_name", "hospital_state")],
    },
    NodeSpec {
        kind: NodeKind::Payer,
        id_column: "payer_id",
        attributes: &[text("name", "payer_name")],
    },
    NodeSpec {
        kind: NodeKind::Physician,
        id_column: "physician_id",
        attributes: &[
            text("name", "physician_name"),
            text("dob", "physician_dob"),
            text("grad_year", "physician_grad_year"),
            text("school", "medical_school"),
        ],
    },
    NodeSpec {
        kind: NodeKind::Patient,
        id_column: "patient_id",
        attributes: &[
            text("name", "patient_name"),
            text("sex", "patient_sex"),
            text("dob", "patient_dob"),
            text("blood_type", "patient_blood_type"),
        ],
    },
    NodeSpec {
        kind: NodeKind::Visit,
        id_column: "visit_id",
        attributes: &[
            integer("room_number", "room_number"),
            text("admission_type", "admission_type"),
            text("admission_date", "date_of_admission"),
            text("test_results", "test_results"),
            text("chief_complaint", "chief_complaint"),
            text("treatment_description", "treatment_description"),
            text("primary_diagnosis", "primary_diagnosis"),
            text("discharge_date", "discharge_date"),
            text("status", "visit_status"),
        ],
    },
    NodeSpec {
        kind: NodeKind::Review,
        id_column: "review_id",
        attributes: &[
            text("physician_name", "physician_name"),
            text("hospital_name", "hospital_name"),
            text("patient_name", "patient_name"),
            text("text", "review"),
        ],
    },
];

pub static RELATIONSHIP_SPECS: [RelationshipSpec; 5] = [
    RelationshipSpec {
        kind: RelationshipKind::Has,
        source: NodeKind::Visit,
        from: EndpointSpec { kind: NodeKind::Patient, column: "patient_id" },
        to: EndpointSpec { kind: NodeKind::Visit, column: "visit_id" },
        attributes: &[],
    },
    RelationshipSpec {
        kind: RelationshipKind::At,
        source: NodeKind::Visit,
        from: EndpointSpec { kind: NodeKind::Visit, column: "visit_id" },
        to: EndpointSpec { kind: NodeKind::Hospital, column: "hospital_id" },
        attributes: &[],
    },
    RelationshipSpec {
        kind: RelationshipKind::Treats,
        source: NodeKind::Visit,
        from: EndpointSpec { kind: NodeKind::Physician, column: "physician_id" },
        to: EndpointSpec { kind: NodeKind::Visit, column: "visit_id" },
        attributes: &[],
    },
    RelationshipSpec {
        kind: RelationshipKind::CoveredBy,
        source: NodeKind::Visit,
        from: EndpointSpec { kind: NodeKind::Visit, column: "visit_id" },
        to: EndpointSpec { kind: NodeKind::Payer, column: "payer_id" },
        attributes: &[
            text("service_date", "discharge_date"),
            decimal("billing_amount", "billing_amount"),
        ],
    },
    RelationshipSpec {
        kind: RelationshipKind::Writes,
        source: NodeKind::Review,
        from: EndpointSpec { kind: NodeKind::Visit, column: "visit_id" },
        to: EndpointSpec { kind: NodeKind::Review, column: "review_id" },
        attributes: &[],
    },
];

/// Relationship synthesized from node identifiers rather than read from a source.
///
/// An edge exists exactly when `(from.id + to.id) % modulus == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceRule {
    pub kind: RelationshipKind,
    pub from: NodeKind,
    pub to: NodeKind,
    pub modulus: i64,
}

impl InferenceRule {
    pub fn applies(&self, from_id: i64, to_id: i64) -> bool {
        match from_id.checked_add(to_id) {
            Some(sum) => self.modulus != 0 && sum % self.modulus == 0,
            None => false,
        }
    }

    /// Every `(from, to)` pair the rule connects, in input order.
    pub fn pairs(&self, from_ids: &[i64], to_ids: &[i64]) -> Vec<(i64, i64)> {
        from_ids
            .iter()
            .flat_map(|&from| to_ids.iter().map(move |&to| (from, to)))
            .filter(|&(from, to)| self.applies(from, to))
            .collect()
    }
}

pub const EMPLOYS_RULE: InferenceRule = InferenceRule {
    kind: RelationshipKind::Employs,
    from: NodeKind::Physician,
    to: NodeKind::Hospital,
    modulus: 30,
};

pub fn node_spec(kind: NodeKind) -> &'static NodeSpec {
    NODE_SPECS
        .iter()
        .find(|spec| spec.kind == kind)
        .unwrap_or_else(|| unreachable!("every node kind has a spec"))
}

pub fn relationship_spec(kind: RelationshipKind) -> Option<&'static RelationshipSpec> {
    RELATIONSHIP_SPECS.iter().find(|spec| spec.kind == kind)
}
