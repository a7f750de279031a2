//! Readers racing writers must only ever see whole mutations.

use std::sync::Arc;

use trigger_store::{JsonFile, RoleId, TriggerStore, TriggerTables};

const WRITERS: usize = 4;
const PER_WRITER: usize = 20;

fn key(writer: usize, n: usize) -> String {
    format!("w{writer}-{n}")
}

/// Each writer inserts its keys in order, so any consistent snapshot holds a
/// gap-free prefix per writer, with matching values in both tables.
fn assert_consistent(tables: &TriggerTables) {
    for writer in 0..WRITERS {
        let present = (0..PER_WRITER)
            .take_while(|n| tables.responders().contains_key(key(writer, *n).as_str()))
            .count();
        for n in present..PER_WRITER {
            assert!(
                !tables.responders().contains_key(key(writer, n).as_str()),
                "gap in writer {writer} at {n}"
            );
        }
        for n in 0..present {
            let k = key(writer, n);
            assert_eq!(tables.responders()[k.as_str()], format!("reply {n}"));
        }
    }
    for (word, role) in tables.role_words() {
        assert_eq!(role.as_str(), format!("role-{word}"));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_and_readers_never_tear() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        TriggerStore::open(JsonFile::new(dir.path().join("data.json")))
            .await
            .unwrap(),
    );

    let mut writers = Vec::new();
    for writer in 0..WRITERS {
        let store = Arc::clone(&store);
        writers.push(tokio::spawn(async move {
            for n in 0..PER_WRITER {
                let k = key(writer, n);
                store.set_responder(&k, &format!("reply {n}")).await.unwrap();
                store
                    .set_role_word(&k, RoleId::new(format!("role-{k}")))
                    .await
                    .unwrap();
            }
        }));
    }

    let mut readers = Vec::new();
    for _ in 0..4 {
        let store = Arc::clone(&store);
        readers.push(tokio::spawn(async move {
            let mut last_len = 0;
            for _ in 0..200 {
                let snapshot = store.snapshot().await;
                assert_consistent(&snapshot);
                // Nothing is removed in this phase, so sizes only grow.
                assert!(snapshot.responders().len() >= last_len);
                last_len = snapshot.responders().len();
                tokio::task::yield_now().await;
            }
        }));
    }

    for handle in writers.into_iter().chain(readers) {
        handle.await.unwrap();
    }

    let finished = store.snapshot().await;
    assert_eq!(finished.responders().len(), WRITERS * PER_WRITER);
    assert_eq!(finished.role_words().len(), WRITERS * PER_WRITER);
    assert_eq!(store.file().load().await.unwrap(), *finished);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_removals_agree_with_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        TriggerStore::open(JsonFile::new(dir.path().join("data.json")))
            .await
            .unwrap(),
    );
    for n in 0..40 {
        store.set_responder(&format!("k{n}"), "v").await.unwrap();
    }

    // Two tasks race to remove the same words; each word is removed once.
    let mut handles = Vec::new();
    for _ in 0..2 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let mut removed = 0;
            for n in 0..40 {
                if !store.remove_responder(&format!("K{n}")).await.unwrap().is_not_found() {
                    removed += 1;
                }
            }
            removed
        }));
    }

    let mut total = 0;
    for handle in handles {
        total += handle.await.unwrap();
    }
    assert_eq!(total, 40);
    assert!(store.snapshot().await.is_empty());
    assert!(store.file().load().await.unwrap().is_empty());
}
