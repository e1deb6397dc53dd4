//! End-to-end lifecycle scenarios over an in-memory metadata store and a
//! temp-directory blob store: one test per scenario, not a grid of round trips.

use std::sync::Arc;

use metadata_store::InMemoryMetadataStore;
use tempfile::tempdir;
use vault_core::error::VaultError;

use crate::account::RegisterInput;
use crate::share::ShareCreateInput;
use crate::upload::UploadInput;
use crate::VaultEngine;

fn engine() -> VaultEngine<InMemoryMetadataStore> {
    let dir = tempdir().expect("tempdir");
    // Leak the tempdir so it outlives the engine for the duration of a test;
    // the OS reclaims it on process exit.
    let root = Box::leak(Box::new(dir)).path().to_path_buf();
    let blobs = blob_store::BlobStore::new(root).expect("blob store");
    VaultEngine::new(Arc::new(InMemoryMetadataStore::new()), blobs)
}

fn register(engine: &VaultEngine<InMemoryMetadataStore>, username: &str, email: &str) -> uuid::Uuid {
    let user = engine
        .register(
            RegisterInput {
                username: username.to_string(),
                email: email.to_string(),
                password: "Correct-Horse1!".to_string(),
            },
            1_000,
        )
        .expect("register");
    user.id
}

fn payload() -> Vec<u8> {
    vec![0x41u8; 1024]
}

// S1: upload then download round-trips the exact bytes, and used storage
// reflects the one committed file.
#[test]
fn s1_upload_download_round_trip() {
    let engine = engine();
    let owner = register(&engine, "alice", "alice@example.com");

    let outcome = engine
        .upload(
            owner,
            vec![UploadInput { name: "notes.txt".into(), mime: "text/plain".into(), bytes: payload() }],
            "/",
            &[],
            "",
            2_000,
        )
        .expect("upload");
    assert_eq!(outcome.files.len(), 1);
    assert!(outcome.errors.is_empty());
    let file_id = outcome.files[0].id;
    assert_eq!(outcome.files[0].plaintext_size, 1024);

    let downloaded = engine.download(owner, file_id, 3_000).expect("download");
    assert_eq!(downloaded.bytes, payload());
    assert_eq!(downloaded.original_name, "notes.txt");

    let user = engine.metadata.get_user(owner).unwrap().unwrap();
    assert_eq!(user.quota.used_bytes, 1024);
}

// S2: a tampered ciphertext container fails integrity verification on
// download, and used storage is unaffected by the failed read.
#[test]
fn s2_tampered_ciphertext_fails_integrity_check() {
    let engine = engine();
    let owner = register(&engine, "bob", "bob@example.com");
    let outcome = engine
        .upload(
            owner,
            vec![UploadInput { name: "photo.png".into(), mime: "image/png".into(), bytes: payload() }],
            "/",
            &[],
            "",
            2_000,
        )
        .expect("upload");
    let file_id = outcome.files[0].id;

    let record = engine.metadata.get_file(owner, file_id, false).unwrap().unwrap();
    let path = engine.blobs.blob_path(&owner.to_string(), &record.blob_id(), &record.ext);
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();

    let result = engine.download(owner, file_id, 3_000);
    assert!(matches!(result, Err(VaultError::IntegrityFailure)));

    let user = engine.metadata.get_user(owner).unwrap().unwrap();
    assert_eq!(user.quota.used_bytes, 1024);
}

// S3: a user with a 1 MiB limit and 900 KiB already used uploads a 200 KiB
// file; the batch is refused outright and no partial charge is recorded.
#[test]
fn s3_quota_cliff_refuses_whole_batch() {
    const MIB: u64 = 1024 * 1024;
    const KIB: u64 = 1024;

    let engine = engine();
    let owner = register(&engine, "carol", "carol@example.com");

    let mut user = engine.metadata.get_user(owner).unwrap().unwrap();
    user.quota = quota::StorageQuota::new(MIB).charge(900 * KIB).unwrap();
    engine.metadata.update_user(user).unwrap();

    let result = engine.upload(
        owner,
        vec![UploadInput {
            name: "big.bin".into(),
            mime: "application/octet-stream".into(),
            bytes: vec![0x42u8; (200 * KIB) as usize],
        }],
        "/",
        &[],
        "",
        2_000,
    );
    assert!(matches!(result, Err(VaultError::QuotaExceeded)));

    let user = engine.metadata.get_user(owner).unwrap().unwrap();
    assert_eq!(user.quota.used_bytes, 900 * KIB);
}

// S4: full share lifecycle — create with an expiry, a download cap, and a
// password; wrong password is rejected; the cap is enforced; revoking ends it.
#[test]
fn s4_share_lifecycle() {
    let engine = engine();
    let owner = register(&engine, "dora", "dora@example.com");
    let outcome = engine
        .upload(
            owner,
            vec![UploadInput { name: "report.pdf".into(), mime: "application/pdf".into(), bytes: payload() }],
            "/",
            &[],
            "",
            2_000,
        )
        .expect("upload");
    let file_id = outcome.files[0].id;

    let share = engine
        .create_share(
            owner,
            file_id,
            ShareCreateInput {
                expires_in_days: Some(1),
                max_downloads: Some(2),
                password: Some("letmein".to_string()),
            },
            2_000,
            "https://vault.example.com",
        )
        .expect("create share");
    assert!(share.has_password);
    assert_eq!(share.max_downloads, Some(2));

    let anonymous = engine.consume_share(&share.share_token, None, 3_000).expect("consume share");
    assert!(matches!(anonymous, crate::share::ShareConsumeOutcome::RequiresPassword));

    let wrong = engine.consume_share(&share.share_token, Some("nope"), 3_000);
    assert!(matches!(wrong, Err(VaultError::AuthFailure)));

    for _ in 0..2 {
        let result = engine
            .consume_share(&share.share_token, Some("letmein"), 3_000)
            .expect("consume share");
        assert!(matches!(result, crate::share::ShareConsumeOutcome::Downloaded(_)));
    }

    let exhausted = engine.consume_share(&share.share_token, Some("letmein"), 3_000);
    assert!(matches!(exhausted, Err(VaultError::ShareExpired)));

    engine.revoke_share(owner, file_id).expect("revoke");
    let after_revoke = engine.consume_share(&share.share_token, Some("letmein"), 3_000);
    assert!(matches!(after_revoke, Err(VaultError::NotFound)));
}

// S5: soft-delete hides a file from the default view and shows it in trash
// without touching used storage; restore reverses it.
#[test]
fn s5_soft_delete_and_restore_preserve_quota() {
    let engine = engine();
    let owner = register(&engine, "erin", "erin@example.com");
    let outcome = engine
        .upload(
            owner,
            vec![UploadInput { name: "draft.docx".into(), mime: "application/msword".into(), bytes: payload() }],
            "/",
            &[],
            "",
            2_000,
        )
        .expect("upload");
    let file_id = outcome.files[0].id;

    engine.soft_delete(owner, file_id, 3_000).expect("soft delete");
    assert!(engine.get_file(owner, file_id).is_err());

    let trash = engine.list_files(&metadata_store::FileQuery::trash(owner)).expect("trash query");
    assert_eq!(trash.records.len(), 1);

    let user = engine.metadata.get_user(owner).unwrap().unwrap();
    assert_eq!(user.quota.used_bytes, 1024);

    engine.restore(owner, file_id).expect("restore");
    assert!(engine.get_file(owner, file_id).is_ok());
    let user = engine.metadata.get_user(owner).unwrap().unwrap();
    assert_eq!(user.quota.used_bytes, 1024);
}

// S6: rotating a password invalidates a bearer token issued before the
// rotation, even though the token has not expired.
#[test]
fn s6_password_rotation_invalidates_prior_token() {
    let engine = engine();
    let owner = register(&engine, "frank", "frank@example.com");
    let user = engine.metadata.get_user(owner).unwrap().unwrap();

    let secret = b"test-signing-secret";
    let issued_at_secs = 1;
    let token = vault_auth::issue_token(secret, &owner.to_string(), "frank", user.role, issued_at_secs, 3_600)
        .expect("issue token");

    // Token is valid immediately after issuance.
    vault_auth::verify_current(secret, &token, user.password_changed_at_ms / 1000).expect("token valid before rotation");

    engine.change_password(owner, "Correct-Horse1!", "New-Horse2!", 10_000).expect("change password");
    let rotated = engine.metadata.get_user(owner).unwrap().unwrap();

    let result = vault_auth::verify_current(secret, &token, rotated.password_changed_at_ms / 1000);
    assert!(matches!(result, Err(VaultError::AuthFailure)));
}
