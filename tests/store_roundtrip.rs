use passrite::store::{CredentialRecord, CredentialStore, StoreError, VerificationMethod};

fn make_record(rp_id: &str, user: &str, credential_id: &[u8], method: VerificationMethod) -> CredentialRecord {
    use sha2::{Digest, Sha256};
    CredentialRecord {
        version: 1,
        sequence: 0,
        credential_id: credential_id.to_vec(),
        rp_id: rp_id.to_string(),
        rp_id_hash: Sha256::digest(rp_id.as_bytes()).to_vec(),
        user_id: user.as_bytes().to_vec(),
        user_name: user.to_string(),
        user_display_name: user.to_uppercase(),
        verification_method: method,
        created_at: 1_700_000_000,
        last_used_at: None,
    }
}

#[test]
fn test_store_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let key = [0xabu8; 32];
    let cred_id = [0x01u8; 32];

    {
        let mut store = CredentialStore::load(key, dir.path().to_path_buf()).unwrap();
        store
            .add(make_record("example.com", "alice", &cred_id, VerificationMethod::Passcode))
            .unwrap();
    }

    let store = CredentialStore::load(key, dir.path().to_path_buf()).unwrap();
    assert_eq!(store.credential_count(), 1);
    let loaded = store.get_by_id(&cred_id).expect("credential not found");
    assert_eq!(loaded.rp_id, "example.com");
    assert_eq!(loaded.user_name, "alice");
    assert_eq!(loaded.user_display_name, "ALICE");
    assert_eq!(loaded.verification_method, VerificationMethod::Passcode);
    assert_eq!(loaded.created_at, 1_700_000_000);
    assert_eq!(loaded.last_used_at, None);
}

#[test]
fn test_insertion_order_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let key = [0xcdu8; 32];
    let ids: [&[u8]; 3] = [&[9; 16], &[3; 16], &[5; 16]];

    {
        let mut store = CredentialStore::load(key, dir.path().to_path_buf()).unwrap();
        for id in ids {
            store
                .add(make_record("rp.example", "u", id, VerificationMethod::Platform))
                .unwrap();
        }
    }

    let mut store = CredentialStore::load(key, dir.path().to_path_buf()).unwrap();
    let listed: Vec<Vec<u8>> = store.list(None).into_iter().map(|r| r.credential_id).collect();
    assert_eq!(listed, ids.iter().map(|id| id.to_vec()).collect::<Vec<_>>());

    // New records keep sorting after the reloaded ones.
    store
        .add(make_record("rp.example", "u", &[1; 16], VerificationMethod::Platform))
        .unwrap();
    let store = CredentialStore::load(key, dir.path().to_path_buf()).unwrap();
    let last = store.list(None).pop().unwrap();
    assert_eq!(last.credential_id, vec![1; 16]);
}

#[test]
fn test_duplicate_leaves_store_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let key = [0x42u8; 32];
    let mut store = CredentialStore::load(key, dir.path().to_path_buf()).unwrap();
    store
        .add(make_record("rp.example", "alice", &[7; 32], VerificationMethod::Platform))
        .unwrap();

    let err = store
        .add(make_record("rp.example", "mallory", &[7; 32], VerificationMethod::None))
        .unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(_)));
    assert_eq!(store.credential_count(), 1);

    let store = CredentialStore::load(key, dir.path().to_path_buf()).unwrap();
    assert_eq!(store.credential_count(), 1);
    assert_eq!(store.get_by_id(&[7; 32]).unwrap().user_name, "alice");
}

#[test]
fn test_delete_then_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let key = [0x11u8; 32];
    let mut store = CredentialStore::load(key, dir.path().to_path_buf()).unwrap();
    store
        .add(make_record("rp.example", "alice", &[1; 32], VerificationMethod::Platform))
        .unwrap();
    store
        .add(make_record("rp.example", "bob", &[2; 32], VerificationMethod::Platform))
        .unwrap();

    store.delete(&[1; 32]).unwrap();
    assert!(!store.contains(&[1; 32]));
    assert!(matches!(store.delete(&[1; 32]), Err(StoreError::NotFound)));
    assert!(matches!(store.delete(&[3; 32]), Err(StoreError::NotFound)));

    let store = CredentialStore::load(key, dir.path().to_path_buf()).unwrap();
    assert_eq!(store.credential_count(), 1);
    assert!(store.contains(&[2; 32]));
}

#[test]
fn test_touch_persists_last_used() {
    let dir = tempfile::tempdir().unwrap();
    let key = [0x22u8; 32];
    let mut store = CredentialStore::load(key, dir.path().to_path_buf()).unwrap();
    store
        .add(make_record("rp.example", "alice", &[1; 32], VerificationMethod::Platform))
        .unwrap();
    store.touch(&[1; 32], 1_700_000_500).unwrap();
    assert!(matches!(store.touch(&[9; 32], 1), Err(StoreError::NotFound)));

    let store = CredentialStore::load(key, dir.path().to_path_buf()).unwrap();
    let record = store.get_by_id(&[1; 32]).unwrap();
    assert_eq!(record.last_used_at, Some(1_700_000_500));
    assert!(record.summary().ends_with("LastUsedDate: 2023-11-14 22:21:40"));
}

#[test]
fn test_wrong_key_and_corrupt_files_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut store = CredentialStore::load([0x33u8; 32], dir.path().to_path_buf()).unwrap();
        store
            .add(make_record("rp.example", "alice", &[1; 32], VerificationMethod::Platform))
            .unwrap();
    }
    std::fs::write(dir.path().join("deadbeef.bin"), b"short").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

    let other = CredentialStore::load([0x44u8; 32], dir.path().to_path_buf()).unwrap();
    assert!(other.is_empty());

    let store = CredentialStore::load([0x33u8; 32], dir.path().to_path_buf()).unwrap();
    assert_eq!(store.credential_count(), 1);
}

#[test]
fn test_wipe_removes_files() {
    let dir = tempfile::tempdir().unwrap();
    let key = [0x55u8; 32];
    let mut store = CredentialStore::load(key, dir.path().to_path_buf()).unwrap();
    for i in 1..=3u8 {
        store
            .add(make_record("rp.example", "u", &[i; 32], VerificationMethod::Platform))
            .unwrap();
    }
    assert_eq!(store.wipe().unwrap(), 3);
    assert!(store.is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_wipe_removes_unreadable_files() {
    let dir = tempfile::tempdir().unwrap();
    let key = [0x66u8; 32];
    {
        let mut store = CredentialStore::load([0x77u8; 32], dir.path().to_path_buf()).unwrap();
        store
            .add(make_record("rp.example", "foreign", &[9; 32], VerificationMethod::Platform))
            .unwrap();
    }
    std::fs::write(dir.path().join("deadbeef.bin"), b"garbage").unwrap();

    let mut store = CredentialStore::load(key, dir.path().to_path_buf()).unwrap();
    store
        .add(make_record("rp.example", "alice", &[1; 32], VerificationMethod::Platform))
        .unwrap();
    assert_eq!(store.credential_count(), 1);

    assert_eq!(store.wipe().unwrap(), 1);
    assert!(store.is_empty());
    let left: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(left.is_empty(), "files left after wipe: {left:?}");
}

#[test]
fn test_method_filter_and_rp_scope() {
    let mut store = CredentialStore::in_memory();
    store
        .add(make_record("a.example", "alice", &[1; 8], VerificationMethod::Passcode))
        .unwrap();
    store
        .add(make_record("b.example", "bob", &[2; 8], VerificationMethod::Platform))
        .unwrap();
    store
        .add(make_record("a.example", "carol", &[3; 8], VerificationMethod::Platform))
        .unwrap();

    let platform: Vec<String> = store
        .list(Some(VerificationMethod::Platform))
        .into_iter()
        .map(|r| r.user_name)
        .collect();
    assert_eq!(platform, ["bob", "carol"]);

    let scoped: Vec<String> = store.list_for_rp("a.example").into_iter().map(|r| r.user_name).collect();
    assert_eq!(scoped, ["alice", "carol"]);
    assert!(store.list(Some(VerificationMethod::Biometric)).is_empty());
}

#[test]
fn test_key_file_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.key");
    let first = passrite::store::load_or_create_key(&path).unwrap();
    let second = passrite::store::load_or_create_key(&path).unwrap();
    assert_eq!(first, second);

    std::fs::write(&path, b"too short").unwrap();
    assert!(matches!(
        passrite::store::load_or_create_key(&path),
        Err(StoreError::Corrupt(_))
    ));
}
