#![cfg(feature = "otel")]

use blob_store::{set_observer, BlobStore};
use proptest::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use telemetry::blob_observer::{global as blob_global, snapshot_counters};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_dir() -> PathBuf {
    let base = std::env::temp_dir();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let p = base.join(format!("vault_blob_obs_prop_{}_{}", std::process::id(), id));
    let _ = fs::remove_dir_all(&p);
    fs::create_dir_all(&p).unwrap();
    p
}

proptest! {
    #[test]
    fn metrics_increment_across_sizes(sz in prop_oneof![
        Just(0usize),
        Just(1usize),
        Just(1024usize),
        0usize..=4096usize,
        Just(65536usize)
    ]) {
        set_observer(blob_global());
        let before = snapshot_counters();

        let dir = unique_dir();
        let store = BlobStore::new(dir.clone()).unwrap();
        let key = vault_crypto::generate_user_key();

        let data = vec![7u8; sz];
        store.stage("u1", "b1", ".bin", &data, &key).unwrap();
        let got = store.open_for_read("u1", "b1", ".bin", &key).unwrap();
        prop_assert_eq!(got, data.clone());

        let after = snapshot_counters();
        prop_assert!(after.0.saturating_sub(before.0) >= sz as u64);
        prop_assert!(after.1.saturating_sub(before.1) >= sz as u64);

        let _ = fs::remove_dir_all(&dir);
    }
}
