//! Tests for SyncEngine against the in-memory catalog

use std::io::Write;

use ckanny_api::{FieldType, InsertMethod};
use ckanny_core::{
    Error, LedgerConfig, MissingItem, SyncEngine, SyncOptions, SyncOutcome, SyncStep,
    compute_content_checksum,
};
use ckanny_test_utils::{Call, MockCatalog};
use pretty_assertions::assert_eq;
use serde_json::json;

const DATA: &[u8] = b"id,name,value\n1,alpha,10\n2,beta,20\n3,gamma,30\n";

fn catalog_with_file(content: &[u8]) -> MockCatalog {
    let catalog = MockCatalog::new();
    catalog.add_organization("org-hdx", "HDX");
    catalog.put_file("r1", "data.csv", "text/csv", content);
    catalog
}

fn sync(catalog: &MockCatalog, options: &SyncOptions) -> ckanny_core::Result<SyncOutcome> {
    SyncEngine::new(catalog, LedgerConfig::default()).sync("r1", catalog, options)
}

fn ledger_hash(catalog: &MockCatalog) -> Option<String> {
    SyncEngine::new(catalog, LedgerConfig::default())
        .ledger()
        .get_hash("r1")
        .unwrap()
}

mod scenario_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cold_start_bootstraps_and_loads() {
        let catalog = catalog_with_file(DATA);

        let outcome = sync(&catalog, &SyncOptions::default()).unwrap();

        assert_eq!(outcome, SyncOutcome::Updated { rows: 3 });
        assert_eq!(catalog.packages_named("hash-table").len(), 1);

        let table = catalog.table("r1").expect("table r1 should exist");
        let field_ids: Vec<&str> = table.fields.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(field_ids, vec!["id", "name", "value"]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0]["name"], json!("alpha"));

        assert_eq!(ledger_hash(&catalog), Some(compute_content_checksum(DATA)));
    }

    #[test]
    fn test_unchanged_content_writes_nothing() {
        let catalog = catalog_with_file(DATA);
        sync(&catalog, &SyncOptions::default()).unwrap();
        catalog.clear_calls();

        let outcome = sync(&catalog, &SyncOptions::default()).unwrap();

        assert_eq!(outcome, SyncOutcome::Unchanged);
        let writes: Vec<Call> = catalog
            .calls()
            .into_iter()
            .filter(Call::is_datastore_write)
            .collect();
        assert!(writes.is_empty(), "unexpected writes: {:?}", writes);
    }

    #[test]
    fn test_forced_sync_rewrites_unchanged_content() {
        let catalog = catalog_with_file(DATA);
        sync(&catalog, &SyncOptions::default()).unwrap();
        let ledger_table = SyncEngine::new(&catalog, LedgerConfig::default())
            .ledger()
            .table_id()
            .unwrap();
        catalog.clear_calls();

        let options = SyncOptions {
            force: true,
            ..Default::default()
        };
        let outcome = sync(&catalog, &options).unwrap();

        assert_eq!(outcome, SyncOutcome::Updated { rows: 3 });
        assert!(catalog.writes_to("r1").contains(&Call::DatastoreDelete("r1".into())));
        assert_eq!(ledger_hash(&catalog), Some(compute_content_checksum(DATA)));
        assert!(
            catalog
                .writes_to(&ledger_table)
                .iter()
                .any(|call| matches!(call, Call::DatastoreUpsert { method: InsertMethod::Upsert, .. })),
            "ledger hash was not rewritten"
        );
    }

    #[test]
    fn test_keyed_update_upserts_without_delete() {
        let catalog = catalog_with_file(DATA);
        sync(&catalog, &SyncOptions::default()).unwrap();

        catalog.put_file(
            "r1",
            "data.csv",
            "text/csv",
            b"id,name,value\n2,beta,25\n4,delta,40\n",
        );
        catalog.clear_calls();

        let options = SyncOptions {
            primary_key: vec!["id".into()],
            ..Default::default()
        };
        let outcome = sync(&catalog, &options).unwrap();

        assert_eq!(outcome, SyncOutcome::Updated { rows: 2 });
        let writes = catalog.writes_to("r1");
        assert!(
            !writes.iter().any(|call| matches!(call, Call::DatastoreDelete(_))),
            "keyed sync must not delete: {:?}",
            writes
        );
        assert!(writes.iter().all(|call| !matches!(
            call,
            Call::DatastoreUpsert {
                method: InsertMethod::Insert,
                ..
            }
        )));
        assert!(writes.iter().any(|call| matches!(
            call,
            Call::DatastoreUpsert {
                method: InsertMethod::Upsert,
                ..
            }
        )));

        let table = catalog.table("r1").unwrap();
        assert_eq!(table.primary_key, vec!["id"]);
        assert_eq!(table.rows.len(), 4);
        let beta = table.rows.iter().find(|row| row["id"] == "2").unwrap();
        assert_eq!(beta["value"], json!("25"));
    }

    #[test]
    fn test_changed_content_replaces_table() {
        let catalog = catalog_with_file(DATA);
        sync(&catalog, &SyncOptions::default()).unwrap();

        let replacement = b"id,name\n9,omega\n";
        catalog.put_file("r1", "data.csv", "text/csv", replacement);
        let outcome = sync(&catalog, &SyncOptions::default()).unwrap();

        assert_eq!(outcome, SyncOutcome::Updated { rows: 1 });
        let table = catalog.table("r1").unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.fields.len(), 2);
        assert_eq!(ledger_hash(&catalog), Some(compute_content_checksum(replacement)));
    }

    #[test]
    fn test_empty_file_creates_empty_table() {
        let catalog = catalog_with_file(b"id,name\n");

        let outcome = sync(&catalog, &SyncOptions::default()).unwrap();

        assert_eq!(outcome, SyncOutcome::Updated { rows: 0 });
        let table = catalog.table("r1").unwrap();
        assert_eq!(table.fields.len(), 2);
        assert!(table.rows.is_empty());
    }
}

mod failure_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_failed_insert_leaves_ledger_untouched() {
        let catalog = catalog_with_file(DATA);
        sync(&catalog, &SyncOptions::default()).unwrap();
        let before = ledger_hash(&catalog);

        catalog.put_file("r1", "data.csv", "text/csv", b"id\n1\n2\n3\n4\n");
        catalog.fail_upserts("r1", 1);
        let options = SyncOptions {
            chunk_rows: 2,
            ..Default::default()
        };
        let err = sync(&catalog, &options).unwrap_err();

        assert_eq!(err.step(), Some(SyncStep::Insert));
        assert!(err.to_string().contains("`r1`"), "got: {}", err);
        assert_eq!(ledger_hash(&catalog), before);
        // The first batch stays committed
        assert_eq!(catalog.table("r1").unwrap().rows.len(), 2);
    }

    #[test]
    fn test_unsupported_format_is_fatal() {
        let catalog = MockCatalog::new();
        catalog.add_organization("org-hdx", "HDX");
        catalog.put_file("r1", "data.json", "application/json", b"{\"a\": 1}");

        let err = sync(&catalog, &SyncOptions::default()).unwrap_err();

        assert_eq!(err.step(), Some(SyncStep::Parse));
        assert!(matches!(err.root(), Error::UnsupportedFormat { extension } if extension == "json"));
        assert!(!catalog.has_table("r1"));
        assert_eq!(ledger_hash(&catalog), None);
    }

    #[test]
    fn test_denied_fetch_is_reported() {
        let catalog = catalog_with_file(DATA);
        catalog.deny("r1");

        let err = sync(&catalog, &SyncOptions::default()).unwrap_err();

        assert_eq!(err.step(), Some(SyncStep::Fetch));
        assert!(matches!(
            err.root(),
            Error::Api(ckanny_api::Error::NotAuthorized { .. })
        ));
        assert!(catalog.packages_named("hash-table").is_empty());
    }

    #[test]
    fn test_bootstrap_failure_aborts_sync() {
        let catalog = MockCatalog::new();
        catalog.put_file("r1", "data.csv", "text/csv", DATA);

        let err = sync(&catalog, &SyncOptions::default()).unwrap_err();

        assert_eq!(err.step(), Some(SyncStep::Ledger));
        assert!(matches!(err.root(), Error::OrganizationNotFound { .. }));
        assert!(!catalog.has_table("r1"));
    }

    #[test]
    fn test_ledger_lookup_is_retried_only_once() {
        let catalog = catalog_with_file(DATA);
        // The only search of a cold start is the lookup after bootstrap.
        catalog.fail_searches(1);

        let err = sync(&catalog, &SyncOptions::default()).unwrap_err();

        assert_eq!(err.step(), Some(SyncStep::Ledger));
        assert!(matches!(
            err.root(),
            Error::NotFound {
                item: MissingItem::Datastore,
                ..
            }
        ));

        let calls = catalog.calls();
        let created_packages = calls
            .iter()
            .filter(|call| matches!(call, Call::PackageCreate(_)))
            .count();
        let created_tables = calls
            .iter()
            .filter(|call| matches!(call, Call::DatastoreCreate { .. }))
            .count();
        let searches = calls
            .iter()
            .filter(|call| matches!(call, Call::DatastoreSearch(_)))
            .count();
        assert_eq!(created_packages, 1);
        assert_eq!(created_tables, 1);
        assert_eq!(searches, 1);
        assert!(catalog.writes_to("r1").is_empty());
    }

    #[test]
    fn test_invalid_options_make_no_requests() {
        let catalog = catalog_with_file(DATA);
        let options = SyncOptions {
            chunk_rows: 0,
            ..Default::default()
        };

        let err = sync(&catalog, &options).unwrap_err();

        assert!(matches!(err, Error::InvalidOption { .. }));
        assert!(catalog.calls().is_empty());
    }

    #[test]
    fn test_unknown_primary_key_is_rejected_remotely() {
        let catalog = catalog_with_file(DATA);
        let options = SyncOptions {
            primary_key: vec!["missing".into()],
            ..Default::default()
        };

        let err = sync(&catalog, &options).unwrap_err();

        assert_eq!(err.step(), Some(SyncStep::Create));
        assert!(matches!(
            err.root(),
            Error::Api(ckanny_api::Error::Validation { .. })
        ));
        assert_eq!(ledger_hash(&catalog), None);
    }
}

mod parsing_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_type_cast_and_sanitize() {
        let catalog = catalog_with_file(b"Row ID,Full Name,Score\n1,Ann,1.5\n2,Bob,\n");
        let options = SyncOptions {
            sanitize: true,
            type_cast: true,
            ..Default::default()
        };

        sync(&catalog, &options).unwrap();

        let table = catalog.table("r1").unwrap();
        let fields: Vec<(&str, FieldType)> = table
            .fields
            .iter()
            .map(|f| (f.id.as_str(), f.field_type))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("row_id", FieldType::Int),
                ("full_name", FieldType::Text),
                ("score", FieldType::Numeric),
            ]
        );
        assert_eq!(table.rows[0]["row_id"], json!(1));
        assert_eq!(table.rows[0]["score"], json!(1.5));
        assert_eq!(table.rows[1]["score"], json!(null));
    }

    #[test]
    fn test_encoding_option_decodes_content() {
        let catalog = catalog_with_file(b"name\ncaf\xe9\n");
        let options = SyncOptions {
            encoding: Some("windows-1252".into()),
            ..Default::default()
        };

        sync(&catalog, &options).unwrap();

        assert_eq!(catalog.table("r1").unwrap().rows[0]["name"], json!("café"));
    }

    #[test]
    fn test_first_row_and_col_skip_preamble() {
        let catalog = catalog_with_file(b"Report title\nx,id,name\nx,1,a\n");
        let options = SyncOptions {
            first_row: 1,
            first_col: 1,
            ..Default::default()
        };

        sync(&catalog, &options).unwrap();

        let table = catalog.table("r1").unwrap();
        let field_ids: Vec<&str> = table.fields.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(field_ids, vec!["id", "name"]);
        assert_eq!(table.rows[0]["id"], json!("1"));
    }
}

mod upload_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_upload_loads_local_file_without_ledger() {
        let catalog = MockCatalog::new();
        let package = catalog.add_package("p");
        let resource = catalog.add_resource(&package, "local.csv");

        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(DATA).unwrap();

        let engine = SyncEngine::new(&catalog, LedgerConfig::default());
        let rows = engine
            .upload(&resource, file.path(), &SyncOptions::default())
            .unwrap();

        assert_eq!(rows, 3);
        assert_eq!(catalog.table(&resource).unwrap().rows.len(), 3);
        assert!(
            !catalog
                .calls()
                .iter()
                .any(|call| matches!(call, Call::PackageShow(_))),
            "upload must not touch the ledger"
        );
    }

    #[test]
    fn test_upload_rejects_unknown_extension() {
        let catalog = MockCatalog::new();
        let file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();

        let err = SyncEngine::new(&catalog, LedgerConfig::default())
            .upload("r1", file.path(), &SyncOptions::default())
            .unwrap_err();

        assert!(matches!(err.root(), Error::UnsupportedFormat { .. }));
    }
}
