//! Integration tests against the host's real keyring.
//!
//! Every test skips itself when the keyring cannot be opened, and also when
//! the keyring accepts a write but cannot read it back (headless Linux
//! without a running Secret Service daemon does this). Each test uses a fresh
//! service name so runs never see each other's credentials.

#![cfg(feature = "keyring-store")]

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use keyward_core::{CredentialStore, KeyringBackend};

/// Upper bound on how long a native store may take to reflect a delete.
const PROPAGATION_WAIT: Duration = Duration::from_secs(5);

fn unique_service(label: &str) -> String {
    format!("keyward-test-{}-{}", label, uuid::Uuid::new_v4())
}

/// Open a keyring-backed store, or `None` to skip the test.
async fn keyring_store(service: &str) -> Option<CredentialStore> {
    let backend = match KeyringBackend::try_new("keyward-test") {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Skipping test: keyring unavailable ({})", e);
            return None;
        }
    };
    let store = CredentialStore::new(backend);

    // Check the keyring actually persists before trusting it
    if let Err(e) = store.set_password(service, "__check__", Some("check")).await {
        eprintln!("Skipping test: keyring set failed ({})", e);
        return None;
    }
    let persisted = matches!(store.get_password(service, "__check__").await, Ok(Some(_)));
    let _ = store.delete_password(service, "__check__").await;
    if !persisted {
        eprintln!("Skipping test: keyring did not persist - daemon may not be running");
        return None;
    }
    Some(store)
}

/// Poll until `get` reports the credential gone, up to [`PROPAGATION_WAIT`].
async fn wait_until_deleted(store: &CredentialStore, service: &str, account: &str) -> bool {
    let deadline = tokio::time::Instant::now() + PROPAGATION_WAIT;
    loop {
        if matches!(store.get_password(service, account).await, Ok(None)) {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[tokio::test]
async fn test_keyring_roundtrip_and_delete() {
    let service = unique_service("roundtrip");
    let Some(store) = keyring_store(&service).await else {
        return;
    };

    let cases = [
        ("TestASCII", "ASCII string"),
        ("TestCharSet", "I 💔 ASCII"),
        ("TestUTF16", "🌞🌙🌟🌴"),
        ("TestCJK", "「こんにちは世界」"),
    ];
    for (account, password) in cases {
        store.set_password(&service, account, Some(password)).await.unwrap();
        let retrieved = store.get_password(&service, account).await.unwrap();
        assert_eq!(retrieved.unwrap().expose(), password);
    }

    let key = format!("{}/TestCharSet", service);
    let found = store.find_password(&key).await.unwrap();
    assert_eq!(found.unwrap().expose(), "I 💔 ASCII");

    for (account, _) in cases {
        assert!(store.delete_password(&service, account).await.unwrap());
        assert!(wait_until_deleted(&store, &service, account).await);
    }
    assert!(!store.delete_password(&service, "TestASCII").await.unwrap());
}

#[tokio::test]
async fn test_keyring_keeps_trailing_nul() {
    let service = unique_service("nul");
    let Some(store) = keyring_store(&service).await else {
        return;
    };
    assert!(!store.profile().absorbs_trailing_nul);

    store.set_password(&service, "PwNullTerm", Some("PW\0")).await.unwrap();
    let retrieved = store.get_password(&service, "PwNullTerm").await.unwrap().unwrap();
    assert_eq!(retrieved.expose(), "PW\0");

    store.delete_password(&service, "PwNullTerm").await.unwrap();
}

#[tokio::test]
async fn test_keyring_empty_identity_fields() {
    let service = unique_service("empty");
    let Some(store) = keyring_store(&service).await else {
        return;
    };

    store.set_password(&service, "", Some("emptyAccountPW")).await.unwrap();
    let pw = store.get_password(&service, "").await.unwrap();
    assert_eq!(pw.unwrap().expose(), "emptyAccountPW");

    // The empty service is shared by every run, so use a unique account
    let account = format!("{}-account", service);
    store.set_password("", &account, Some("emptyServicePW")).await.unwrap();
    let pw = store.get_password("", &account).await.unwrap();
    assert_eq!(pw.unwrap().expose(), "emptyServicePW");

    assert!(store.delete_password(&service, "").await.unwrap());
    assert!(store.delete_password("", &account).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_keyring_concurrent_writers_keep_every_account() {
    let service = unique_service("concurrent");
    let Some(store) = keyring_store(&service).await else {
        return;
    };

    let accounts: Vec<String> = (0..8).map(|i| format!("acct-{}", i)).collect();
    let mut handles = Vec::new();
    for account in accounts.clone() {
        let store = store.clone();
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            store.set_password(&service, &account, Some("pw")).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let found: HashSet<String> = store
        .find_credentials(&service)
        .await
        .unwrap()
        .into_iter()
        .map(|record| record.account)
        .collect();
    assert_eq!(found.len(), accounts.len());
    assert!(accounts.iter().all(|account| found.contains(account)));

    for account in &accounts {
        store.delete_password(&service, account).await.unwrap();
    }
}

#[tokio::test]
async fn test_keyring_overwrite_and_enumerate() {
    let service = unique_service("enumerate");
    let Some(store) = keyring_store(&service).await else {
        return;
    };

    store.set_password(&service, "alpha", Some("first")).await.unwrap();
    store.set_password(&service, "alpha", Some("second")).await.unwrap();
    store.set_password(&service, "beta", Some("b")).await.unwrap();

    let found: HashMap<String, String> = store
        .find_credentials(&service)
        .await
        .unwrap()
        .into_iter()
        .map(|record| (record.account, record.password.expose().to_string()))
        .collect();
    assert_eq!(found.len(), 2);
    assert_eq!(found["alpha"], "second");
    assert_eq!(found["beta"], "b");

    for account in ["alpha", "beta"] {
        assert!(store.delete_password(&service, account).await.unwrap());
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(store.find_credentials(&service).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_keyring_missing_credential() {
    let service = unique_service("missing");
    let Some(store) = keyring_store(&service).await else {
        return;
    };

    assert!(store.get_password(&service, "FakeAccount").await.unwrap().is_none());
    assert!(!store.delete_password(&service, "FakeAccount").await.unwrap());
    assert!(store.find_credentials(&service).await.unwrap().is_empty());
}
