//! Behaviour every labels store backend must share.

use std::{collections::BTreeSet, path::Path, sync::mpsc, thread};

use rdfsec::{
    Label,
    LabelsStore,
    LabelsStoreSqlite,
    Node,
    Result,
    Triple,
    Txn,
    TxnType,
    labels::LabelsStoreMem,
    persist::SqliteOptions,
    storefmt::{HashAlgorithm, StoreFormat},
};

fn labels(texts: &[&str]) -> Vec<Label> {
    texts.iter().map(|t| Label::from_text(t)).collect()
}

fn texts(labels: &[Label]) -> BTreeSet<String> {
    labels.iter().map(|l| l.to_string()).collect()
}

fn t(s: &str, p: &str, o: &str) -> Triple {
    let node = |x: &str| if x == "*" { Node::Any } else { Node::uri(x) };
    Triple::new(node(s), node(p), node(o))
}

fn persistent(dir: &Path, format: StoreFormat) -> LabelsStoreSqlite {
    let options = SqliteOptions {
        format,
        ..SqliteOptions::default()
    };
    LabelsStoreSqlite::open(dir, options).unwrap()
}

/// Run `check` against the in-memory store and a persistent store in each
/// key format.
fn for_each_backend(check: impl Fn(&dyn LabelsStore)) {
    check(&LabelsStoreMem::new());
    for format in [
        StoreFormat::ByString,
        StoreFormat::ByNodeId,
        StoreFormat::ByHash {
            algorithm: HashAlgorithm::Sha256,
        },
        StoreFormat::ByHash {
            algorithm: HashAlgorithm::Xx128,
        },
    ] {
        let dir = tempfile::tempdir().unwrap();
        check(&persistent(dir.path(), format));
    }
}

#[test]
fn most_specific_pattern_wins() {
    for_each_backend(|store| {
        store.add(&t("s", "p", "o"), &labels(&["spo"])).unwrap();
        store.add(&t("s", "p", "*"), &labels(&["sp_"])).unwrap();
        store.add(&t("s", "*", "*"), &labels(&["s__", "x__"])).unwrap();
        store.add(&t("*", "p", "*"), &labels(&["_p_"])).unwrap();
        store.add(&t("*", "*", "*"), &labels(&["___", "any=true"])).unwrap();

        let cases: [(Triple, &[&str]); 5] = [
            (t("s", "p", "o"), &["spo"]),
            (t("s", "p", "o1"), &["sp_"]),
            (t("s", "p1", "o1"), &["s__", "x__"]),
            (t("s1", "p", "o1"), &["_p_"]),
            (t("s1", "p1", "o1"), &["___", "any=true"]),
        ];
        for (lookup, want) in cases {
            let got = store.labels_for_triple(&lookup).unwrap();
            assert_eq!(texts(&got), texts(&labels(want)), "{lookup}");
        }
    });
}

#[test]
fn exact_entries_only() {
    for_each_backend(|store| {
        store.add(&t("s", "p", "o"), &labels(&["a"])).unwrap();
        assert_eq!(store.labels_for_triple(&t("s", "p", "o")).unwrap(), labels(&["a"]));
        assert!(store.labels_for_triple(&t("s", "p", "o2")).unwrap().is_empty());
        assert!(!store.is_empty().unwrap());
    });
}

#[test]
fn duplicate_labels_rejected() {
    for_each_backend(|store| {
        let err = store.add(&t("s", "p", "o"), &labels(&["a", "a"])).unwrap_err();
        assert!(err.is_validation());
        assert!(store.is_empty().unwrap());
    });
}

#[test]
fn illegal_patterns_rejected() {
    for_each_backend(|store| {
        for pattern in [t("*", "p", "o"), t("s", "*", "o"), t("*", "*", "o")] {
            let err = store.add(&pattern, &labels(&["a"])).unwrap_err();
            assert!(err.is_validation(), "{pattern}");
        }
    });
}

#[test]
fn wildcard_lookup_is_an_error() {
    for_each_backend(|store| {
        assert!(store.labels_for_triple(&t("s", "p", "*")).is_err());
    });
}

#[test]
fn unparsable_labels_rejected_at_add() {
    for_each_backend(|store| {
        let err = store.add(&t("s", "p", "o"), &labels(&["role = "])).unwrap_err();
        assert!(err.is_syntax());
    });
}

#[test]
fn graph_dump_lists_entries() -> Result<()> {
    let mem = LabelsStoreMem::new();
    let dir = tempfile::tempdir()?;
    let disk = persistent(dir.path(), StoreFormat::ByString);
    for store in [&mem as &dyn LabelsStore, &disk] {
        store.add(&t("s", "p", "o"), &labels(&["a"]))?;
        store.add(&t("*", "p", "*"), &labels(&["b"]))?;
        let mut graph = store.as_graph()?;
        graph.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            graph,
            vec![
                (t("s", "p", "o"), labels(&["a"])),
                (t("*", "p", "*"), labels(&["b"])),
            ]
        );
    }
    Ok(())
}

#[test]
fn reader_does_not_see_uncommitted_batch() {
    let mem = LabelsStoreMem::new();
    let dir = tempfile::tempdir().unwrap();
    let disk = persistent(dir.path(), StoreFormat::ByNodeId);

    for store in [&mem as &dyn LabelsStore, &disk] {
        let triple = t("s", "p", "o");
        let (added, added_rx) = mpsc::channel();
        let (checked, checked_rx) = mpsc::channel();

        let key = &triple;

        thread::scope(|scope| {
            let writer = scope.spawn(move || {
                let mut txn = Txn::begin(store, TxnType::Write).unwrap();
                txn.add(key, &labels(&["secret"])).unwrap();
                added.send(()).unwrap();
                checked_rx.recv().unwrap();
                txn.commit().unwrap();
            });

            added_rx.recv().unwrap();
            let reader = Txn::begin(store, TxnType::Read).unwrap();
            assert!(reader.labels_for_triple(&triple).unwrap().is_empty());
            checked.send(()).unwrap();
            writer.join().unwrap();
            reader.commit().unwrap();
        });

        let after = Txn::begin(store, TxnType::Read).unwrap();
        assert_eq!(after.labels_for_triple(&triple).unwrap(), labels(&["secret"]));
    }
}

#[test]
fn batch_is_all_or_nothing_for_readers() {
    let store = LabelsStoreMem::new();
    let mut txn = Txn::begin(&store, TxnType::Write).unwrap();
    for i in 0..10 {
        txn.add(&t("s", "p", &format!("o{i}")), &labels(&["a"])).unwrap();
    }
    assert!(store.is_empty().unwrap());
    txn.commit().unwrap();
    for i in 0..10 {
        let lookup = t("s", "p", &format!("o{i}"));
        assert_eq!(store.labels_for_triple(&lookup).unwrap(), labels(&["a"]));
    }
}
