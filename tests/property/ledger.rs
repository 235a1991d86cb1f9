//! Property-based tests for the unsynced ledger

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use journal_sync::client::offline::ledger::{
    DefinitionDirty, OwnFieldsDirty, UnsyncedLedger, UnsyncedModifiedExperience,
};

#[derive(Debug, Clone)]
enum LedgerOp {
    MarkDirty(String, UnsyncedModifiedExperience),
    Write(String, UnsyncedModifiedExperience),
    Clear(String),
}

fn experience_id() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["1", "2", "offline:a"]).prop_map(str::to_string)
}

fn record() -> impl Strategy<Value = UnsyncedModifiedExperience> {
    (
        prop::option::of((any::<bool>(), any::<bool>())),
        prop::option::of(prop::collection::btree_map(
            "d[0-2]",
            (any::<bool>(), any::<bool>()),
            0..3,
        )),
        any::<bool>(),
        prop::option::of(prop::collection::btree_map(
            "e[0-2]",
            prop::collection::btree_set("o[0-2]", 0..3),
            0..3,
        )),
        prop::option::of(prop::collection::vec("e[0-2]", 0..3)),
        any::<bool>(),
    )
        .prop_map(
            |(own_fields, definitions, new_entries, modified_entries, deleted_entries, is_offline)| {
                UnsyncedModifiedExperience {
                    own_fields: own_fields
                        .map(|(title, description)| OwnFieldsDirty { title, description }),
                    definitions: definitions.map(|defs| {
                        defs.into_iter()
                            .map(|(id, (name, data_type))| (id, DefinitionDirty { name, data_type }))
                            .collect::<BTreeMap<_, _>>()
                    }),
                    new_entries,
                    modified_entries: modified_entries
                        .map(|entries| entries.into_iter().collect::<BTreeMap<String, BTreeSet<String>>>()),
                    deleted_entries,
                    is_offline,
                }
            },
        )
}

fn op() -> impl Strategy<Value = LedgerOp> {
    prop_oneof![
        (experience_id(), record()).prop_map(|(id, r)| LedgerOp::MarkDirty(id, r)),
        (experience_id(), record()).prop_map(|(id, r)| LedgerOp::Write(id, r)),
        experience_id().prop_map(LedgerOp::Clear),
    ]
}

fn run(ops: Vec<LedgerOp>) -> BTreeMap<String, UnsyncedModifiedExperience> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    runtime.block_on(async {
        let ledger = UnsyncedLedger::new();
        for op in ops {
            match op {
                LedgerOp::MarkDirty(id, patch) => ledger.mark_dirty(&id, patch).await,
                LedgerOp::Write(id, record) => ledger.write(&id, record).await,
                LedgerOp::Clear(id) => ledger.clear_aggregate(&id).await,
            }
        }
        ledger.read_all().await
    })
}

proptest! {
    #[test]
    fn test_stored_records_are_never_empty(ops in prop::collection::vec(op(), 0..20)) {
        for (id, record) in run(ops) {
            prop_assert!(!record.is_empty(), "empty record stored for {}", id);
            prop_assert!(record.definitions.as_ref().map_or(true, |d| !d.is_empty()));
            prop_assert!(record.deleted_entries.as_ref().map_or(true, |d| !d.is_empty()));
        }
    }

    #[test]
    fn test_write_then_read_matches_normalized(id in experience_id(), record in record()) {
        let stored = run(vec![LedgerOp::Write(id.clone(), record.clone())]);

        let mut expected = record;
        expected.normalize();
        if expected.is_empty() {
            prop_assert!(stored.get(&id).is_none());
        } else {
            prop_assert_eq!(stored.get(&id), Some(&expected));
        }
    }

    #[test]
    fn test_clear_removes_record(id in experience_id(), record in record()) {
        let stored = run(vec![
            LedgerOp::MarkDirty(id.clone(), record),
            LedgerOp::Clear(id.clone()),
        ]);
        prop_assert!(stored.get(&id).is_none());
    }
}
