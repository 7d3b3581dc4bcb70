//! Integration tests for replaying a frozen generalization on held-out data.

use std::collections::BTreeSet;

use diffcover::{
    apply_generalization_seeded, specialize_seeded, AttributeDomain, CoverError, DomainSpec, Mode,
    Record, SpecializeParams, TaxonomyNode, Value,
};

fn spec() -> DomainSpec {
    DomainSpec::from([
        (
            "region".to_string(),
            AttributeDomain::Categorical {
                root: TaxonomyNode::branch(
                    "Region",
                    vec![
                        TaxonomyNode::branch(
                            "US",
                            vec![TaxonomyNode::leaf("CA"), TaxonomyNode::leaf("NY")],
                        ),
                        TaxonomyNode::leaf("EU"),
                    ],
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

fn train_records() -> Vec<Record> {
    let rows: &[(&str, f64, &str)] = &[
        ("CA", 21.0, "low"),
        ("CA", 28.0, "low"),
        ("NY", 45.0, "high"),
        ("NY", 50.0, "high"),
        ("EU", 63.0, "low"),
        ("EU", 70.0, "high"),
        ("CA", 75.0, "high"),
        ("NY", 33.0, "low"),
    ];
    rows.iter()
        .map(|&(region, age, label)| {
            Record::new(
                [
                    ("region", Value::from(region)),
                    ("age", Value::Number(age)),
                ],
                label,
            )
        })
        .collect()
}

fn test_records() -> Vec<Record> {
    // Disjoint from training, but entirely inside the declared domains.
    let rows: &[(&str, f64, &str)] = &[
        ("CA", 19.0, "low"),
        ("NY", 91.0, "high"),
        ("EU", 2.0, "low"),
        ("CA", 55.0, "high"),
        ("NY", 55.0, "low"),
        ("EU", 99.9, "high"),
    ];
    rows.iter()
        .map(|&(region, age, label)| {
            Record::new(
                [
                    ("region", Value::from(region)),
                    ("age", Value::Number(age)),
                ],
                label,
            )
        })
        .collect()
}

#[test]
fn replay_never_fails_inside_the_declared_domains() {
    let params = SpecializeParams {
        epsilon: 2.0,
        mode: Mode::Fixed { steps: 4 },
        digits: 0,
    };
    let release = specialize_seeded(&train_records(), &spec(), &params, 17).unwrap();

    let replayed = apply_generalization_seeded(
        &test_records(),
        &release.mappers,
        &release.class_labels,
        1000.0,
        5,
    )
    .unwrap();
    assert!(!replayed.is_empty());
}

#[test]
fn replay_emits_one_row_per_generalized_combination() {
    let params = SpecializeParams {
        epsilon: 2.0,
        mode: Mode::Fixed { steps: 4 },
        digits: 0,
    };
    let release = specialize_seeded(&train_records(), &spec(), &params, 17).unwrap();

    // The distinct combinations a replay must produce, computed through the
    // exported mappers themselves.
    let test = test_records();
    let mut expected: BTreeSet<String> = BTreeSet::new();
    for record in &test {
        let mut key = String::new();
        for attribute in ["age", "region"] {
            let general = release
                .mappers
                .generalize(attribute, record.get(attribute).unwrap())
                .unwrap();
            key.push_str(&format!("{}={};", attribute, general));
        }
        expected.insert(key);
    }

    // A strong release budget means no row is suppressed as all-zero.
    let replayed = apply_generalization_seeded(
        &test,
        &release.mappers,
        &release.class_labels,
        10_000.0,
        5,
    )
    .unwrap();
    assert_eq!(replayed.len(), expected.len());

    // Counts cover the whole test set exactly.
    let total: u64 = replayed
        .iter()
        .flat_map(|row| row.class_counts.values())
        .sum();
    assert_eq!(total, test.len() as u64);
}

#[test]
fn replay_rejects_values_outside_the_declared_domain() {
    let params = SpecializeParams {
        epsilon: 2.0,
        mode: Mode::Fixed { steps: 2 },
        digits: 0,
    };
    let release = specialize_seeded(&train_records(), &spec(), &params, 17).unwrap();

    let out_of_range = vec![Record::new(
        [
            ("region", Value::from("CA")),
            ("age", Value::Number(100.0)),
        ],
        "low",
    )];
    let err = apply_generalization_seeded(
        &out_of_range,
        &release.mappers,
        &release.class_labels,
        1.0,
        5,
    )
    .unwrap_err();
    assert!(matches!(err, CoverError::ValueOutOfRange { .. }));

    let unknown = vec![Record::new(
        [
            ("region", Value::from("MARS")),
            ("age", Value::Number(10.0)),
        ],
        "low",
    )];
    let err = apply_generalization_seeded(
        &unknown,
        &release.mappers,
        &release.class_labels,
        1.0,
        5,
    )
    .unwrap_err();
    assert!(matches!(err, CoverError::UnknownCategory { .. }));
}

#[test]
fn frozen_mappers_survive_serialization() {
    let params = SpecializeParams {
        epsilon: 2.0,
        mode: Mode::Fixed { steps: 3 },
        digits: 0,
    };
    let release = specialize_seeded(&train_records(), &spec(), &params, 41).unwrap();

    let json = serde_json::to_string(&release.mappers).unwrap();
    let restored: diffcover::FrozenMapperSet = serde_json::from_str(&json).unwrap();

    let direct = apply_generalization_seeded(
        &test_records(),
        &release.mappers,
        &release.class_labels,
        100.0,
        9,
    )
    .unwrap();
    let through_json = apply_generalization_seeded(
        &test_records(),
        &restored,
        &release.class_labels,
        100.0,
        9,
    )
    .unwrap();
    assert_eq!(direct, through_json);
}
