use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use uuid::Uuid;

use vault_core::error::VaultError;

use crate::{FilePage, FileQuery, FileRecord, MetadataStore, SortKey, User};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    username_index: HashMap<String, Uuid>,
    email_index: HashMap<String, Uuid>,
    files: HashMap<Uuid, FileRecord>,
    share_token_index: HashMap<String, Uuid>,
}

/// A `Mutex`-guarded, in-process [`MetadataStore`]. Suitable for tests and
/// single-process deployments; a multi-process deployment needs a real
/// database behind the same trait.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    tables: Mutex<Tables>,
}

impl InMemoryMetadataStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn create_user(&self, user: User) -> Result<User, VaultError> {
        let mut t = self.tables.lock().expect("metadata store mutex poisoned");
        if t.username_index.contains_key(&user.username) {
            return Err(VaultError::already_exists("username"));
        }
        if t.email_index.contains_key(&user.email) {
            return Err(VaultError::already_exists("email"));
        }
        t.username_index.insert(user.username.clone(), user.id);
        t.email_index.insert(user.email.clone(), user.id);
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn get_user(&self, id: Uuid) -> Result<Option<User>, VaultError> {
        let t = self.tables.lock().expect("metadata store mutex poisoned");
        Ok(t.users.get(&id).cloned())
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>, VaultError> {
        let t = self.tables.lock().expect("metadata store mutex poisoned");
        Ok(t.username_index.get(username).and_then(|id| t.users.get(id)).cloned())
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>, VaultError> {
        let t = self.tables.lock().expect("metadata store mutex poisoned");
        Ok(t.email_index.get(email).and_then(|id| t.users.get(id)).cloned())
    }

    fn update_user(&self, user: User) -> Result<User, VaultError> {
        let mut t = self.tables.lock().expect("metadata store mutex poisoned");
        if !t.users.contains_key(&user.id) {
            return Err(VaultError::NotFound);
        }
        let previous = t.users.get(&user.id).expect("checked above").clone();
        if previous.username != user.username {
            if t.username_index.contains_key(&user.username) {
                return Err(VaultError::already_exists("username"));
            }
            t.username_index.remove(&previous.username);
            t.username_index.insert(user.username.clone(), user.id);
        }
        if previous.email != user.email {
            if t.email_index.contains_key(&user.email) {
                return Err(VaultError::already_exists("email"));
            }
            t.email_index.remove(&previous.email);
            t.email_index.insert(user.email.clone(), user.id);
        }
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn create_file(&self, file: FileRecord) -> Result<FileRecord, VaultError> {
        let mut t = self.tables.lock().expect("metadata store mutex poisoned");
        if t.files.contains_key(&file.id) {
            return Err(VaultError::already_exists("blob-id"));
        }
        if let Some(share) = &file.share {
            if t.share_token_index.contains_key(&share.token) {
                return Err(VaultError::already_exists("share-token"));
            }
            t.share_token_index.insert(share.token.clone(), file.id);
        }
        t.files.insert(file.id, file.clone());
        Ok(file)
    }

    fn get_file(
        &self,
        owner_id: Uuid,
        id: Uuid,
        include_deleted: bool,
    ) -> Result<Option<FileRecord>, VaultError> {
        let t = self.tables.lock().expect("metadata store mutex poisoned");
        Ok(t.files
            .get(&id)
            .filter(|f| f.owner_id == owner_id)
            .filter(|f| include_deleted || !f.is_deleted)
            .cloned())
    }

    fn update_file(&self, file: FileRecord) -> Result<FileRecord, VaultError> {
        let mut t = self.tables.lock().expect("metadata store mutex poisoned");
        let previous = t.files.get(&file.id).cloned().ok_or(VaultError::NotFound)?;

        if let Some(prev_share) = &previous.share {
            let superseded = file.share.as_ref().is_none_or(|s| s.token != prev_share.token);
            if superseded {
                t.share_token_index.remove(&prev_share.token);
            }
        }
        if let Some(share) = &file.share {
            let is_new = previous.share.as_ref().is_none_or(|s| s.token != share.token);
            if is_new {
                if t.share_token_index.contains_key(&share.token) {
                    return Err(VaultError::already_exists("share-token"));
                }
                t.share_token_index.insert(share.token.clone(), file.id);
            }
        }
        t.files.insert(file.id, file.clone());
        Ok(file)
    }

    fn delete_file_record(&self, owner_id: Uuid, id: Uuid) -> Result<(), VaultError> {
        let mut t = self.tables.lock().expect("metadata store mutex poisoned");
        let file = t.files.get(&id).filter(|f| f.owner_id == owner_id).ok_or(VaultError::NotFound)?;
        if let Some(share) = &file.share {
            t.share_token_index.remove(&share.token);
        }
        t.files.remove(&id);
        Ok(())
    }

    fn list_files(&self, query: &FileQuery) -> Result<FilePage, VaultError> {
        let matching = self.list_files_full(query)?;
        let total = matching.len() as u64;
        let limit = query.limit.max(1);
        let pages = u32::try_from(total.div_ceil(u64::from(limit))).unwrap_or(u32::MAX).max(1);
        let start = (query.page.saturating_sub(1) as usize) * limit as usize;
        let records = matching
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .map(|f| f.sanitized())
            .collect();
        Ok(FilePage { records, page: query.page.max(1), limit, total, pages })
    }

    fn list_files_full(&self, query: &FileQuery) -> Result<Vec<FileRecord>, VaultError> {
        let t = self.tables.lock().expect("metadata store mutex poisoned");
        let search = query.search.as_ref().map(|s| s.to_ascii_lowercase());
        let mut matching: Vec<FileRecord> = t
            .files
            .values()
            .filter(|f| f.owner_id == query.owner_id)
            .filter(|f| if query.only_deleted() { f.is_deleted } else { query.includes_deleted() || !f.is_deleted })
            .filter(|f| query.folder.as_deref().is_none_or(|folder| f.folder == folder))
            .filter(|f| query.category.is_none_or(|c| f.category() == c))
            .filter(|f| {
                search.as_ref().is_none_or(|needle| {
                    f.original_name.to_ascii_lowercase().contains(needle)
                        || f.description.to_ascii_lowercase().contains(needle)
                        || f.tags.iter().any(|t| t.to_ascii_lowercase().contains(needle))
                })
            })
            .cloned()
            .collect();

        match query.sort {
            SortKey::CreatedAtDesc => matching.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms)),
            SortKey::CreatedAtAsc => matching.sort_by_key(|f| f.created_at_ms),
            SortKey::SizeDesc => matching.sort_by(|a, b| b.plaintext_size.cmp(&a.plaintext_size)),
            SortKey::SizeAsc => matching.sort_by_key(|f| f.plaintext_size),
            SortKey::NameAsc => matching.sort_by(|a, b| a.original_name.cmp(&b.original_name)),
            SortKey::NameDesc => matching.sort_by(|a, b| b.original_name.cmp(&a.original_name)),
        }
        Ok(matching)
    }

    fn find_by_share_token(&self, token: &str) -> Result<Option<FileRecord>, VaultError> {
        let t = self.tables.lock().expect("metadata store mutex poisoned");
        Ok(t.share_token_index.get(token).and_then(|id| t.files.get(id)).cloned())
    }

    fn folders(&self, owner_id: Uuid) -> Result<BTreeMap<String, u64>, VaultError> {
        let t = self.tables.lock().expect("metadata store mutex poisoned");
        let mut counts = BTreeMap::new();
        for f in t.files.values().filter(|f| f.owner_id == owner_id && !f.is_deleted) {
            *counts.entry(f.folder.clone()).or_insert(0u64) += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ShareToken;
    use access_log::AccessLog;
    use quota::{AccountLock, StorageQuota};
    use vault_core::domain::Role;

    fn user(username: &str, email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            user_key: [0u8; 32],
            role: Role::User,
            active: true,
            quota: StorageQuota::new(1_000_000),
            lock: AccountLock::new(),
            last_login_ms: None,
            password_changed_at_ms: 0,
            created_at_ms: 0,
        }
    }

    fn file(owner_id: Uuid, name: &str, created_at_ms: u64) -> FileRecord {
        FileRecord {
            id: Uuid::new_v4(),
            owner_id,
            original_name: name.to_string(),
            ext: ".bin".to_string(),
            mime: "application/octet-stream".to_string(),
            plaintext_size: 10,
            ciphertext_size: 96 + 10,
            plaintext_checksum: "abc".to_string(),
            ciphertext_checksum: "def".to_string(),
            folder: "/".to_string(),
            tags: vec![],
            description: String::new(),
            is_deleted: false,
            deleted_at_ms: None,
            share: None,
            access_log: AccessLog::new(),
            downloads_total: 0,
            created_at_ms,
            updated_at_ms: created_at_ms,
        }
    }

    #[test]
    fn duplicate_username_rejected() {
        let store = InMemoryMetadataStore::new();
        store.create_user(user("alice", "alice@example.com")).unwrap();
        let err = store.create_user(user("alice", "other@example.com")).unwrap_err();
        assert!(matches!(err, VaultError::AlreadyExists(_)));
    }

    #[test]
    fn duplicate_email_rejected() {
        let store = InMemoryMetadataStore::new();
        store.create_user(user("alice", "same@example.com")).unwrap();
        let err = store.create_user(user("bob", "same@example.com")).unwrap_err();
        assert!(matches!(err, VaultError::AlreadyExists(_)));
    }

    #[test]
    fn get_user_round_trips_by_all_keys() {
        let store = InMemoryMetadataStore::new();
        let u = store.create_user(user("alice", "alice@example.com")).unwrap();
        assert_eq!(store.get_user(u.id).unwrap().unwrap().id, u.id);
        assert_eq!(store.get_user_by_username("alice").unwrap().unwrap().id, u.id);
        assert_eq!(store.get_user_by_email("alice@example.com").unwrap().unwrap().id, u.id);
    }

    #[test]
    fn default_query_hides_soft_deleted_and_trash_shows_only_them() {
        let store = InMemoryMetadataStore::new();
        let owner = Uuid::new_v4();
        let mut live = file(owner, "live.txt", 1);
        let mut deleted = file(owner, "gone.txt", 2);
        deleted.is_deleted = true;
        deleted.deleted_at_ms = Some(2);
        store.create_file(live.clone()).unwrap();
        store.create_file(deleted.clone()).unwrap();

        let page = store.list_files(&FileQuery::new(owner)).unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].id, live.id);

        let trash = store.list_files(&FileQuery::trash(owner)).unwrap();
        assert_eq!(trash.records.len(), 1);
        assert_eq!(trash.records[0].id, deleted.id);

        live.tags.push("noop".to_string());
        store.update_file(live).unwrap();
    }

    #[test]
    fn duplicate_share_token_rejected() {
        let store = InMemoryMetadataStore::new();
        let owner = Uuid::new_v4();
        let mut a = file(owner, "a.txt", 1);
        a.share = Some(ShareToken {
            token: "tok".to_string(),
            expires_at_ms: 1_000,
            max_downloads: None,
            password_hash: None,
            download_count: 0,
            created_at_ms: 0,
        });
        let b_id = Uuid::new_v4();
        let mut b = file(owner, "b.txt", 2);
        b.id = b_id;
        b.share = Some(ShareToken {
            token: "tok".to_string(),
            expires_at_ms: 1_000,
            max_downloads: None,
            password_hash: None,
            download_count: 0,
            created_at_ms: 0,
        });
        store.create_file(a).unwrap();
        let err = store.create_file(b).unwrap_err();
        assert!(matches!(err, VaultError::AlreadyExists(_)));
    }

    #[test]
    fn find_by_share_token_resolves_across_owners() {
        let store = InMemoryMetadataStore::new();
        let owner = Uuid::new_v4();
        let mut f = file(owner, "shared.txt", 1);
        f.share = Some(ShareToken {
            token: "findme".to_string(),
            expires_at_ms: 1_000,
            max_downloads: Some(3),
            password_hash: None,
            download_count: 0,
            created_at_ms: 0,
        });
        let id = f.id;
        store.create_file(f).unwrap();
        let found = store.find_by_share_token("findme").unwrap().unwrap();
        assert_eq!(found.id, id);
        assert!(store.find_by_share_token("nope").unwrap().is_none());
    }

    #[test]
    fn folders_counts_non_deleted_only() {
        let store = InMemoryMetadataStore::new();
        let owner = Uuid::new_v4();
        let mut a = file(owner, "a.txt", 1);
        a.folder = "/docs".to_string();
        let mut b = file(owner, "b.txt", 2);
        b.folder = "/docs".to_string();
        b.is_deleted = true;
        let mut c = file(owner, "c.txt", 3);
        c.folder = "/pics".to_string();
        store.create_file(a).unwrap();
        store.create_file(b).unwrap();
        store.create_file(c).unwrap();

        let folders = store.folders(owner).unwrap();
        assert_eq!(folders.get("/docs"), Some(&1));
        assert_eq!(folders.get("/pics"), Some(&1));
    }

    #[test]
    fn sort_by_created_at_desc_is_default() {
        let store = InMemoryMetadataStore::new();
        let owner = Uuid::new_v4();
        store.create_file(file(owner, "old.txt", 1)).unwrap();
        store.create_file(file(owner, "new.txt", 2)).unwrap();
        let page = store.list_files(&FileQuery::new(owner)).unwrap();
        assert_eq!(page.records[0].original_name, "new.txt");
        assert_eq!(page.records[1].original_name, "old.txt");
    }

    #[test]
    fn search_matches_name_tags_and_description() {
        let store = InMemoryMetadataStore::new();
        let owner = Uuid::new_v4();
        let mut tagged = file(owner, "report.pdf", 1);
        tagged.tags = vec!["quarterly".to_string()];
        let mut described = file(owner, "notes.txt", 2);
        described.description = "contains the word needle".to_string();
        let other = file(owner, "unrelated.txt", 3);
        store.create_file(tagged).unwrap();
        store.create_file(described).unwrap();
        store.create_file(other).unwrap();

        let mut q = FileQuery::new(owner);
        q.search = Some("quarterly".to_string());
        assert_eq!(store.list_files(&q).unwrap().records.len(), 1);

        let mut q2 = FileQuery::new(owner);
        q2.search = Some("needle".to_string());
        assert_eq!(store.list_files(&q2).unwrap().records.len(), 1);
    }

    #[test]
    fn pagination_splits_into_pages() {
        let store = InMemoryMetadataStore::new();
        let owner = Uuid::new_v4();
        for i in 0..5 {
            store.create_file(file(owner, &format!("f{i}.txt"), u64::from(i))).unwrap();
        }
        let mut q = FileQuery::new(owner);
        q.limit = 2;
        q.page = 2;
        let page = store.list_files(&q).unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.total, 5);
        assert_eq!(page.pages, 3);
    }

    #[test]
    fn delete_file_record_removes_share_token_index() {
        let store = InMemoryMetadataStore::new();
        let owner = Uuid::new_v4();
        let mut f = file(owner, "a.txt", 1);
        f.share = Some(ShareToken {
            token: "gone-soon".to_string(),
            expires_at_ms: 1_000,
            max_downloads: None,
            password_hash: None,
            download_count: 0,
            created_at_ms: 0,
        });
        let id = f.id;
        store.create_file(f).unwrap();
        store.delete_file_record(owner, id).unwrap();
        assert!(store.find_by_share_token("gone-soon").unwrap().is_none());
        assert!(store.get_file(owner, id, true).unwrap().is_none());
    }
}
