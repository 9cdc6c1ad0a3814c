// crates/gestao-store/tests/proptest_record_shape.rs
// ============================================================================
// Module: Record Shape Property-Based Tests
// Description: Property tests for normalization and write intersection.
// Purpose: Hold totality and skip accounting across arbitrary rows and schemas.
// ============================================================================

//! Property-based tests for builder and normalizer invariants.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeSet;

use gestao_store::BindValue;
use gestao_store::EntityCatalog;
use gestao_store::LiveSchema;
use gestao_store::Record;
use gestao_store::UpdatePlan;
use gestao_store::build_insert;
use gestao_store::build_update;
use gestao_store::normalize;
use proptest::prelude::*;
use serde_json::Value;
use serde_json::json;

/// Column names drawn from real entity fields plus junk.
const NAMES: [&str; 12] = [
    "id",
    "nome",
    "ativo",
    "endereco",
    "competencias",
    "pdi",
    "status",
    "salario",
    "icone",
    "area_id",
    "legacy_flag",
    "zzz",
];

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|v| json!(v)),
        "[ -~]{0,12}".prop_map(Value::String),
        Just(json!({"rua": "A"})),
        Just(json!(["rust"])),
    ]
}

fn record_strategy() -> impl Strategy<Value = Record> {
    prop::collection::btree_map(prop::sample::select(NAMES.to_vec()), value_strategy(), 0 .. 8).prop_map(
        |map| map.into_iter().map(|(key, value)| (key.to_string(), value)).collect(),
    )
}

fn schema_strategy() -> impl Strategy<Value = LiveSchema> {
    prop::collection::btree_set(prop::sample::select(NAMES.to_vec()), 0 .. 8)
        .prop_map(|columns| LiveSchema::new("employees", columns))
}

proptest! {
    #[test]
    fn normalize_is_total(row in record_strategy()) {
        let catalog = EntityCatalog::gestao360().unwrap();
        let descriptor = catalog.get("employees").unwrap();
        let normalized = normalize(&descriptor, row);
        for field in descriptor.known_fields() {
            let value = normalized.record.get(field.name());
            prop_assert!(value.is_some_and(|value| !value.is_null()), "{} missing", field.name());
        }
    }

    #[test]
    fn insert_binds_only_the_intersection(record in record_strategy(), live in schema_strategy()) {
        let catalog = EntityCatalog::gestao360().unwrap();
        let descriptor = catalog.get("employees").unwrap();
        let expected_skips: BTreeSet<String> =
            record.keys().filter(|key| !live.contains(key)).cloned().collect();
        match build_insert(&descriptor, &live, &record) {
            Ok((statement, report)) => {
                for field in &statement.bound_fields {
                    prop_assert!(live.contains(field) && record.contains_key(field));
                }
                prop_assert_eq!(statement.bound_fields.len(), statement.params.len());
                prop_assert_eq!(report.skipped_field_names, expected_skips);
            }
            Err(error) => {
                prop_assert_eq!(error.kind(), "no_persistable_fields");
                prop_assert_eq!(expected_skips.len(), record.len());
            }
        }
    }

    #[test]
    fn update_accounts_for_every_skipped_field(record in record_strategy(), live in schema_strategy()) {
        let catalog = EntityCatalog::gestao360().unwrap();
        let descriptor = catalog.get("employees").unwrap();
        let expected_skips: BTreeSet<String> = record
            .iter()
            .filter(|(key, value)| key.as_str() == "id" || value.is_null() || !live.contains(key))
            .map(|(key, _)| key.clone())
            .collect();
        let all_skipped = expected_skips.len() == record.len();
        match build_update(&descriptor, &live, &json!(1), &record) {
            Ok(UpdatePlan::Execute { statement, skip_report }) => {
                prop_assert!(!all_skipped);
                prop_assert!(statement.bound_fields.iter().all(|field| live.contains(field)));
                prop_assert!(!statement.bound_fields.iter().any(|field| field == "id"));
                prop_assert!(!statement.params[.. statement.bound_fields.len()].contains(&BindValue::Null));
                prop_assert_eq!(statement.params.len(), statement.bound_fields.len() + 1);
                prop_assert_eq!(skip_report.skipped_field_names, expected_skips);
            }
            Ok(UpdatePlan::Noop { skip_report }) => {
                prop_assert!(all_skipped);
                prop_assert_eq!(skip_report.skipped_field_names, expected_skips);
            }
            Err(error) => {
                prop_assert_eq!(error.kind(), "missing_column");
                prop_assert!(!live.contains("id"));
            }
        }
    }
}
