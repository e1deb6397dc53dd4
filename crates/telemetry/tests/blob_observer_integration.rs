#![cfg(feature = "otel")]

use blob_store::{set_observer, BlobStore};
use telemetry::blob_observer::{global as blob_global, snapshot_counters};

#[test]
fn registers_observer_and_counts_metrics() -> Result<(), Box<dyn std::error::Error>> {
    set_observer(blob_global());

    let dir = tempfile::tempdir()?;
    let store = BlobStore::new(dir.path().to_path_buf())?;
    let key = vault_crypto::generate_user_key();

    let data = b"abc".to_vec();
    store.stage("u1", "b1", ".txt", &data, &key)?;
    let got = store.open_for_read("u1", "b1", ".txt", &key)?;
    assert_eq!(got, data);
    store.remove("u1", "b1", ".txt")?;

    let (put_bytes, get_bytes, removed) = snapshot_counters();
    assert!(put_bytes >= data.len() as u64);
    assert!(get_bytes >= data.len() as u64);
    assert!(removed >= 1);

    Ok(())
}
