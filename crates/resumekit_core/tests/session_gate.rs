use resumekit_core::{
    GateConfig, KeyValueStore, KvError, KvResult, MemoryKeyValueStore, SessionError, SessionGate,
    SqliteKeyValueStore,
};
use std::cell::Cell;

const SNAPSHOT_KEY: &str = "resumekit.current_identity";
const DIRECTORY_KEY: &str = "resumekit.credentials";

fn ready_gate() -> SessionGate<MemoryKeyValueStore> {
    SessionGate::initialized(MemoryKeyValueStore::new()).unwrap()
}

#[test]
fn gate_denies_state_until_initialized() {
    let mut gate = SessionGate::new(MemoryKeyValueStore::new());
    assert!(gate.is_loading());
    assert!(!gate.is_authenticated());
    assert!(matches!(gate.current_identity(), Err(SessionError::NotReady)));
    assert!(matches!(
        gate.login("x@e.com", "p"),
        Err(SessionError::NotReady)
    ));
    assert!(matches!(
        gate.signup("x@e.com", "p", "N", "O"),
        Err(SessionError::NotReady)
    ));

    gate.init().unwrap();
    assert!(!gate.is_loading());
    assert_eq!(gate.current_identity().unwrap(), None);
}

#[test]
fn duplicate_signup_fails_and_keeps_first_identity() {
    let mut gate = ready_gate();
    let first = gate.signup("x@e.com", "p", "N", "O").unwrap();
    assert!(gate.is_authenticated());

    let err = gate.signup("x@e.com", "p2", "N2", "O2").unwrap_err();
    assert!(matches!(err, SessionError::DuplicateIdentity(email) if email == "x@e.com"));
    assert_eq!(gate.current_identity().unwrap(), Some(&first));
}

#[test]
fn wrong_secret_fails_and_leaves_identity_unchanged() {
    let mut gate = ready_gate();
    let first = gate.signup("x@e.com", "p", "N", "O").unwrap();

    let err = gate.login("x@e.com", "wrong").unwrap_err();
    assert!(matches!(err, SessionError::InvalidCredentials));
    assert_eq!(gate.current_identity().unwrap(), Some(&first));

    gate.logout();
    assert!(matches!(
        gate.login("x@e.com", "wrong"),
        Err(SessionError::InvalidCredentials)
    ));
    assert_eq!(gate.current_identity().unwrap(), None);
}

#[test]
fn login_is_case_sensitive_on_email_and_secret() {
    let mut gate = ready_gate();
    gate.signup("x@e.com", "Secret", "N", "O").unwrap();
    gate.logout();

    assert!(gate.login("X@e.com", "Secret").is_err());
    assert!(gate.login("x@e.com", "secret").is_err());
    let identity = gate.login("x@e.com", "Secret").unwrap();
    assert_eq!(identity.display_name, "N");
    assert_eq!(identity.organization_tag, "O");
}

#[test]
fn signup_persists_directory_and_snapshot_without_leaking_secret() {
    let mut gate = ready_gate();
    let identity = gate.signup("x@e.com", "hunter2", "N", "O").unwrap();

    let snapshot = gate.store().get(SNAPSHOT_KEY).unwrap().unwrap();
    assert!(!snapshot.contains("hunter2"));
    let restored: serde_json::Value = serde_json::from_str(&snapshot).unwrap();
    assert_eq!(restored["email"], "x@e.com");
    assert_eq!(restored["id"], identity.id.to_string());

    let directory = gate.store().get(DIRECTORY_KEY).unwrap().unwrap();
    assert!(directory.contains("hunter2"));
}

#[test]
fn logout_clears_identity_and_snapshot() {
    let mut gate = ready_gate();
    gate.signup("x@e.com", "p", "N", "O").unwrap();

    gate.logout();
    assert!(!gate.is_authenticated());
    assert_eq!(gate.store().get(SNAPSHOT_KEY).unwrap(), None);
    assert!(gate.store().get(DIRECTORY_KEY).unwrap().is_some());
}

#[test]
fn corrupt_snapshot_is_removed_and_gate_comes_up_anonymous() {
    for corrupt in ["{not json", r#"{"unexpected":"shape"}"#, "[]"] {
        let store = MemoryKeyValueStore::new();
        store.set(SNAPSHOT_KEY, corrupt).unwrap();

        let gate = SessionGate::initialized(store).unwrap();
        assert!(!gate.is_authenticated(), "{corrupt:?} must not authenticate");
        assert_eq!(gate.store().get(SNAPSHOT_KEY).unwrap(), None);
    }
}

#[test]
fn snapshot_with_nil_id_is_treated_as_corrupt() {
    let store = MemoryKeyValueStore::new();
    store
        .set(
            SNAPSHOT_KEY,
            r#"{"id":"00000000-0000-0000-0000-000000000000","email":"x@e.com","displayName":"N","organizationTag":"O"}"#,
        )
        .unwrap();

    let gate = SessionGate::initialized(store).unwrap();
    assert!(!gate.is_authenticated());
    assert_eq!(gate.store().get(SNAPSHOT_KEY).unwrap(), None);
}

#[test]
fn identity_survives_restart_on_sqlite_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.db");

    let identity = {
        let mut gate = SessionGate::initialized(SqliteKeyValueStore::open(&path).unwrap()).unwrap();
        gate.signup("x@e.com", "p", "N", "O").unwrap()
    };

    let mut gate = SessionGate::initialized(SqliteKeyValueStore::open(&path).unwrap()).unwrap();
    assert_eq!(gate.current_identity().unwrap(), Some(&identity));

    gate.logout();
    let gate = SessionGate::initialized(gate.dispose()).unwrap();
    assert!(!gate.is_authenticated());
}

#[test]
fn custom_keys_are_honored() {
    let config = GateConfig {
        directory_key: "dir".to_string(),
        snapshot_key: "me".to_string(),
    };
    let mut gate = SessionGate::with_config(MemoryKeyValueStore::new(), config);
    gate.init().unwrap();
    gate.signup("x@e.com", "p", "N", "O").unwrap();

    assert!(gate.store().get("dir").unwrap().is_some());
    assert!(gate.store().get("me").unwrap().is_some());
    assert_eq!(gate.store().get(SNAPSHOT_KEY).unwrap(), None);
}

#[test]
fn unreadable_directory_is_reported_not_overwritten() {
    let store = MemoryKeyValueStore::new();
    store.set(DIRECTORY_KEY, "garbage").unwrap();
    let mut gate = SessionGate::initialized(store).unwrap();

    assert!(matches!(
        gate.signup("x@e.com", "p", "N", "O"),
        Err(SessionError::CorruptDirectory(_))
    ));
    assert_eq!(
        gate.store().get(DIRECTORY_KEY).unwrap().as_deref(),
        Some("garbage")
    );
}

/// Fails the first write to one key, then behaves normally.
struct FailOnceStore {
    inner: MemoryKeyValueStore,
    fail_key: &'static str,
    failed: Cell<bool>,
}

impl KeyValueStore for FailOnceStore {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> KvResult<()> {
        if key == self.fail_key && !self.failed.replace(true) {
            return Err(KvError::Unavailable("simulated interruption".to_string()));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> KvResult<()> {
        self.inner.remove(key)
    }
}

#[test]
fn interrupted_signup_still_allows_login() {
    let store = FailOnceStore {
        inner: MemoryKeyValueStore::new(),
        fail_key: SNAPSHOT_KEY,
        failed: Cell::new(false),
    };
    let mut gate = SessionGate::initialized(store).unwrap();

    let err = gate.signup("x@e.com", "p", "N", "O").unwrap_err();
    assert!(matches!(err, SessionError::Storage(_)));
    assert!(!gate.is_authenticated());

    let identity = gate.login("x@e.com", "p").unwrap();
    assert_eq!(identity.email, "x@e.com");
    assert!(gate.is_authenticated());
}

#[test]
fn padded_email_is_rejected_not_trimmed() {
    let mut gate = ready_gate();
    for email in [" x@e.com", "x@e.com ", "x @e.com"] {
        assert!(matches!(
            gate.signup(email, "p", "N", "O"),
            Err(SessionError::InvalidInput(_))
        ));
    }
    assert!(!gate.is_authenticated());

    gate.signup("x@e.com", "p", "N", "O").unwrap();
    gate.logout();
    assert!(matches!(
        gate.login(" x@e.com", "p"),
        Err(SessionError::InvalidCredentials)
    ));
}
