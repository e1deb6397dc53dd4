//! Orphan-blob sweep CLI.
//!
//! There is no periodic garbage collector built into the engine itself: a
//! blob whose metadata record was lost (a crash between `stage` and
//! `create_file`, or a metadata backend restored from an older snapshot than
//! the blob store) never gets cleaned up on its own. This binary lists the
//! blob root, joins it against an export of live metadata records, and
//! removes anything left over that is older than a safety window.

#![deny(unsafe_code)]

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::SystemTime;

use clap::{Parser, Subcommand};
use metadata_store::FileRecord;

#[derive(Parser, Debug)]
#[command(name = "vault-gc", about = "Sweep orphan blobs out of a vault blob store")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report per-user blob counts and total bytes, no changes made.
    Inspect {
        #[arg(long)]
        blob_root: PathBuf,
    },
    /// Remove blobs with no matching metadata record, older than the safety window.
    Sweep {
        #[arg(long)]
        blob_root: PathBuf,
        /// A JSONL export of live `FileRecord`s, one per line.
        #[arg(long)]
        metadata_export: PathBuf,
        /// Minimum blob age, in seconds, before it is eligible for removal.
        #[arg(long, default_value_t = 86_400)]
        min_age_secs: u64,
        /// List what would be removed without deleting anything.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt().json().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Inspect { blob_root } => cmd_inspect(&blob_root),
        Command::Sweep { blob_root, metadata_export, min_age_secs, dry_run } => {
            cmd_sweep(&blob_root, &metadata_export, min_age_secs, dry_run)
        }
    }
}

fn cmd_inspect(blob_root: &PathBuf) -> Result<(), anyhow::Error> {
    let store = blob_store::BlobStore::new(blob_root.clone())?;
    for user_id in store.list_user_ids()? {
        let ids = store.list_user_blob_ids(&user_id)?;
        println!("{user_id}: {} blobs", ids.len());
    }
    Ok(())
}

fn load_kept_filenames(metadata_export: &PathBuf) -> Result<HashSet<(String, String)>, anyhow::Error> {
    let file = File::open(metadata_export)?;
    let mut kept = HashSet::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: FileRecord = serde_json::from_str(&line)?;
        let filename = format!("{}{}", record.blob_id(), record.ext);
        kept.insert((record.owner_id.to_string(), filename));
    }
    Ok(kept)
}

fn cmd_sweep(
    blob_root: &PathBuf,
    metadata_export: &PathBuf,
    min_age_secs: u64,
    dry_run: bool,
) -> Result<(), anyhow::Error> {
    let store = blob_store::BlobStore::new(blob_root.clone())?;
    let kept = load_kept_filenames(metadata_export)?;
    let now = SystemTime::now();

    let mut removed = 0u64;
    let mut skipped_too_young = 0u64;

    for user_id in store.list_user_ids()? {
        let user_dir = store.root().join(&user_id);
        for entry in std::fs::read_dir(&user_dir)? {
            let entry = entry?;
            let Some(filename) = entry.file_name().to_str().map(str::to_string) else { continue };
            let Some(stripped) = filename.strip_suffix(".encrypted") else { continue };
            if kept.contains(&(user_id.clone(), stripped.to_string())) {
                continue;
            }

            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age.as_secs() < min_age_secs {
                skipped_too_young += 1;
                continue;
            }

            tracing::warn!(user_id = %user_id, blob = %stripped, age_secs = age.as_secs(), dry_run, "removing orphan blob");
            if !dry_run {
                std::fs::remove_file(entry.path())?;
            }
            removed += 1;
        }
    }

    tracing::info!(removed, skipped_too_young, dry_run, "sweep complete");
    println!("removed={removed} skipped_too_young={skipped_too_young} dry_run={dry_run}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn sample_record(owner_id: Uuid) -> FileRecord {
        FileRecord {
            id: Uuid::new_v4(),
            owner_id,
            original_name: "kept.txt".to_string(),
            ext: ".txt".to_string(),
            mime: "text/plain".to_string(),
            plaintext_size: 4,
            ciphertext_size: 4,
            plaintext_checksum: "x".to_string(),
            ciphertext_checksum: "y".to_string(),
            folder: "/".to_string(),
            tags: vec![],
            description: String::new(),
            is_deleted: false,
            deleted_at_ms: None,
            share: None,
            access_log: access_log::AccessLog::new(),
            downloads_total: 0,
            created_at_ms: 0,
            updated_at_ms: 0,
        }
    }

    #[test]
    fn sweep_removes_only_old_unreferenced_blobs() {
        let dir = tempdir().unwrap();
        let blob_root = dir.path().join("blobs");
        let store = blob_store::BlobStore::new(blob_root.clone()).unwrap();
        let owner = Uuid::new_v4();
        let owner_dir = owner.to_string();

        let kept = sample_record(owner);
        store.stage(&owner_dir, &kept.blob_id(), &kept.ext, b"data", &vault_crypto::generate_user_key()).unwrap();
        let orphan = sample_record(owner);
        store.stage(&owner_dir, &orphan.blob_id(), &orphan.ext, b"data", &vault_crypto::generate_user_key()).unwrap();

        // Back-date the orphan so it clears the safety window; leave the
        // kept blob's mtime alone, it would survive the window anyway.
        let orphan_path = store.blob_path(&owner_dir, &orphan.blob_id(), &orphan.ext);
        let old = std::time::SystemTime::now() - Duration::from_secs(1_000_000);
        let old_ft = filetime::FileTime::from_system_time(old);
        filetime::set_file_mtime(&orphan_path, old_ft).unwrap();

        let export_path = dir.path().join("export.jsonl");
        fs::write(&export_path, format!("{}\n", serde_json::to_string(&kept).unwrap())).unwrap();

        cmd_sweep(&blob_root, &export_path, 3_600, false).unwrap();

        assert!(store.exists(&owner_dir, &kept.blob_id(), &kept.ext));
        assert!(!store.exists(&owner_dir, &orphan.blob_id(), &orphan.ext));
    }
}
