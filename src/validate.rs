//! Input validation run before the engine ever sees the data.
//!
//! The specialization core assumes every observed value is covered by its
//! attribute's declared domain; this module is where that assumption is
//! earned. It checks domain syntax (non-degenerate ranges, well-formed
//! taxonomies) and coverage (every non-missing value reachable), and
//! returns a working copy of the spec with attributes the dataset does not
//! carry dropped.

use std::collections::BTreeSet;

use log::warn;
use thiserror::Error;

use crate::data::{Record, Value};
use crate::taxonomy::{AttributeDomain, DomainSpec, TaxonomyIndex};

/// Token marking a missing value in imported datasets.
pub const MISSING_VALUE: &str = "?";

/// Rejections raised by [`check_input`].
#[derive(Debug, Clone, Error)]
pub enum ValidateError {
    #[error("taxonomy is missing attribute {0}")]
    MissingAttribute(String),

    #[error("attribute {attribute}: numeric domain must satisfy min < max, got [{min},{max})")]
    InvalidRange {
        attribute: String,
        min: f64,
        max: f64,
    },

    #[error("attribute {attribute}: taxonomy root has no children")]
    DegenerateTaxonomy { attribute: String },

    #[error("attribute {attribute}: value {value:?} is not covered by the declared domain")]
    Coverage { attribute: String, value: String },

    #[error("attribute {attribute}: expected {expected} values, found {found:?}")]
    MixedTypes {
        attribute: String,
        expected: &'static str,
        found: String,
    },

    #[error("record {row} is missing attribute {attribute}")]
    RecordMissingAttribute { row: usize, attribute: String },
}

/// Validate `records` against `spec`.
///
/// Returns the spec restricted to attributes the dataset actually carries;
/// declared-but-absent attributes are dropped with a warning. Values equal
/// to [`MISSING_VALUE`] are tolerated here; downstream import should have
/// filtered them, and the engine itself will reject them if they slip
/// through.
pub fn check_input(spec: &DomainSpec, records: &[Record]) -> Result<DomainSpec, ValidateError> {
    let dataset_attributes: BTreeSet<&str> = match records.first() {
        Some(record) => record.values.keys().map(String::as_str).collect(),
        None => return Ok(DomainSpec::new()),
    };

    for attribute in &dataset_attributes {
        if !spec.contains_key(*attribute) {
            return Err(ValidateError::MissingAttribute(attribute.to_string()));
        }
    }

    let mut checked = DomainSpec::new();
    for (attribute, domain) in spec {
        if !dataset_attributes.contains(attribute.as_str()) {
            warn!("dropping declared attribute {} absent from the dataset", attribute);
            continue;
        }
        match domain {
            AttributeDomain::Numeric { min, max } => {
                if !(min < max) {
                    return Err(ValidateError::InvalidRange {
                        attribute: attribute.clone(),
                        min: *min,
                        max: *max,
                    });
                }
                check_numeric_coverage(attribute, *min, *max, records)?;
            }
            AttributeDomain::Categorical { root } => {
                let index = TaxonomyIndex::build(root);
                if index.children(TaxonomyIndex::ROOT).is_empty() {
                    return Err(ValidateError::DegenerateTaxonomy {
                        attribute: attribute.clone(),
                    });
                }
                check_categorical_coverage(attribute, &index, records)?;
            }
        }
        checked.insert(attribute.clone(), domain.clone());
    }
    Ok(checked)
}

fn check_numeric_coverage(
    attribute: &str,
    min: f64,
    max: f64,
    records: &[Record],
) -> Result<(), ValidateError> {
    for (row, record) in records.iter().enumerate() {
        let value = record
            .get(attribute)
            .ok_or_else(|| ValidateError::RecordMissingAttribute {
                row,
                attribute: attribute.to_string(),
            })?;
        match value {
            Value::Number(number) => {
                if !(*number >= min && *number < max) {
                    return Err(ValidateError::Coverage {
                        attribute: attribute.to_string(),
                        value: number.to_string(),
                    });
                }
            }
            Value::Category(token) if token == MISSING_VALUE => {}
            Value::Category(token) => {
                return Err(ValidateError::MixedTypes {
                    attribute: attribute.to_string(),
                    expected: "numeric",
                    found: token.clone(),
                });
            }
        }
    }
    Ok(())
}

fn check_categorical_coverage(
    attribute: &str,
    index: &TaxonomyIndex,
    records: &[Record],
) -> Result<(), ValidateError> {
    let leaves: BTreeSet<&str> = index
        .leaves_under(TaxonomyIndex::ROOT)
        .iter()
        .map(|&id| index.name(id))
        .collect();
    for (row, record) in records.iter().enumerate() {
        let value = record
            .get(attribute)
            .ok_or_else(|| ValidateError::RecordMissingAttribute {
                row,
                attribute: attribute.to_string(),
            })?;
        match value {
            Value::Category(token) if token == MISSING_VALUE => {}
            Value::Category(token) => {
                if !leaves.contains(token.as_str()) {
                    return Err(ValidateError::Coverage {
                        attribute: attribute.to_string(),
                        value: token.clone(),
                    });
                }
            }
            Value::Number(number) => {
                return Err(ValidateError::MixedTypes {
                    attribute: attribute.to_string(),
                    expected: "categorical",
                    found: number.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Record;
    use crate::taxonomy::TaxonomyNode;

    fn spec() -> DomainSpec {
        DomainSpec::from([
            (
                "region".to_string(),
                AttributeDomain::Categorical {
                    root: TaxonomyNode::branch(
                        "Any",
                        vec![TaxonomyNode::leaf("US"), TaxonomyNode::leaf("EU")],
                    ),
                },
            ),
            (
                "age".to_string(),
                AttributeDomain::Numeric {
                    min: 0.0,
                    max: 100.0,
                },
            ),
        ])
    }

    #[test]
    fn accepts_covered_records() {
        let records = vec![Record::new(
            [("region", Value::from("US")), ("age", Value::Number(30.0))],
            "A",
        )];
        let checked = check_input(&spec(), &records).unwrap();
        assert_eq!(checked.len(), 2);
    }

    #[test]
    fn rejects_values_outside_the_numeric_range() {
        let records = vec![Record::new(
            [("region", Value::from("US")), ("age", Value::Number(100.0))],
            "A",
        )];
        let err = check_input(&spec(), &records).unwrap_err();
        assert!(matches!(err, ValidateError::Coverage { .. }));
    }

    #[test]
    fn rejects_unreachable_categories() {
        let records = vec![Record::new(
            [("region", Value::from("MARS")), ("age", Value::Number(1.0))],
            "A",
        )];
        let err = check_input(&spec(), &records).unwrap_err();
        assert!(matches!(err, ValidateError::Coverage { .. }));
    }

    #[test]
    fn rejects_degenerate_ranges() {
        let spec = DomainSpec::from([(
            "age".to_string(),
            AttributeDomain::Numeric {
                min: 10.0,
                max: 10.0,
            },
        )]);
        let records = vec![Record::new([("age", Value::Number(10.0))], "A")];
        let err = check_input(&spec, &records).unwrap_err();
        assert!(matches!(err, ValidateError::InvalidRange { .. }));
    }

    #[test]
    fn rejects_undeclared_dataset_attributes() {
        let records = vec![Record::new([("height", Value::Number(1.0))], "A")];
        let err = check_input(&spec(), &records).unwrap_err();
        assert!(matches!(err, ValidateError::MissingAttribute(_)));
    }

    #[test]
    fn drops_declared_attributes_the_dataset_lacks() {
        let records = vec![Record::new([("age", Value::Number(30.0))], "A")];
        let checked = check_input(&spec(), &records).unwrap();
        assert!(checked.contains_key("age"));
        assert!(!checked.contains_key("region"));
    }

    #[test]
    fn tolerates_the_missing_token() {
        let records = vec![Record::new(
            [("region", Value::from("?")), ("age", Value::Number(1.0))],
            "A",
        )];
        assert!(check_input(&spec(), &records).is_ok());
    }
}
