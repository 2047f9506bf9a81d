mod common;

use chrono::Duration;
use common::{Fixture, fp};
use licensehub_db::Store;
use licensehub_license::{Admission, DeviceBinder, LicenseError};
use licensehub_types::{Clock, ManualClock};
use pretty_assertions::assert_eq;
use std::sync::Arc;

// ── Cap ──────────────────────────────────────────────────────────

#[test]
fn fourth_device_denied() {
    let fx = Fixture::new();
    let key = fx.license("a@b.com", 10);

    for name in ["F1", "F2", "F3"] {
        assert_eq!(fx.binder.admit(&key, &fp(name)).unwrap(), Admission::Admitted);
    }
    assert_eq!(fx.binder.admit(&key, &fp("F4")).unwrap(), Admission::Denied);
    assert_eq!(fx.binder.count(&key).unwrap(), 3);
}

#[test]
fn known_device_readmitted_without_new_slot() {
    let fx = Fixture::new();
    let key = fx.license("a@b.com", 10);
    for name in ["F1", "F2", "F3"] {
        fx.binder.admit(&key, &fp(name)).unwrap();
    }

    fx.clock.advance(Duration::minutes(5));
    assert_eq!(fx.binder.admit(&key, &fp("F1")).unwrap(), Admission::Admitted);
    assert_eq!(fx.binder.count(&key).unwrap(), 3);

    let first = fx
        .binder
        .list(&key)
        .unwrap()
        .into_iter()
        .find(|b| b.fingerprint == fp("F1"))
        .unwrap();
    assert_eq!(first.registered_at, common::start());
    assert_eq!(first.last_seen, Some(common::start() + Duration::minutes(5)));
}

#[test]
fn explicit_limit_overrides_configured_cap() {
    let fx = Fixture::new();
    let key = fx.license("a@b.com", 10);

    assert!(fx.binder.admit_with_limit(&key, &fp("F1"), 1).unwrap().is_admitted());
    assert_eq!(
        fx.binder.admit_with_limit(&key, &fp("F2"), 1).unwrap(),
        Admission::Denied
    );
}

#[test]
fn zero_cap_denies_every_new_device() {
    let fx = Fixture::new();
    let key = fx.license("a@b.com", 10);
    assert_eq!(
        fx.binder.admit_with_limit(&key, &fp("F1"), 0).unwrap(),
        Admission::Denied
    );
}

#[test]
fn caps_are_per_license() {
    let fx = Fixture::new();
    let a = fx.license("a@b.com", 10);
    let b = fx.license("b@b.com", 10);
    for name in ["F1", "F2", "F3"] {
        fx.binder.admit(&a, &fp(name)).unwrap();
    }
    // The same fingerprints are fresh for another license.
    for name in ["F1", "F2", "F3"] {
        assert!(fx.binder.admit(&b, &fp(name)).unwrap().is_admitted());
    }
}

#[test]
fn unknown_license_is_not_found() {
    let fx = Fixture::new();
    let key = fx.registry.derive_key("ghost@b.com");
    assert!(matches!(
        fx.binder.admit(&key, &fp("F1")),
        Err(LicenseError::NotFound)
    ));
}

// ── Reset ────────────────────────────────────────────────────────

#[test]
fn reset_frees_every_slot() {
    let fx = Fixture::new();
    let key = fx.license("a@b.com", 10);
    for name in ["F1", "F2", "F3"] {
        fx.binder.admit(&key, &fp(name)).unwrap();
    }

    assert_eq!(fx.binder.reset(&key).unwrap(), 3);
    assert_eq!(fx.binder.count(&key).unwrap(), 0);
    assert!(fx.binder.admit(&key, &fp("F4")).unwrap().is_admitted());
}

#[test]
fn reset_without_bindings_removes_nothing() {
    let fx = Fixture::new();
    let key = fx.license("a@b.com", 10);
    assert_eq!(fx.binder.reset(&key).unwrap(), 0);
}

#[test]
fn list_is_in_registration_order() {
    let fx = Fixture::new();
    let key = fx.license("a@b.com", 10);
    for name in ["F2", "F1", "F3"] {
        fx.binder.admit(&key, &fp(name)).unwrap();
        fx.clock.advance(Duration::seconds(1));
    }
    let order: Vec<_> = fx
        .binder
        .list(&key)
        .unwrap()
        .into_iter()
        .map(|b| b.fingerprint.to_string())
        .collect();
    assert_eq!(order, vec!["F2", "F1", "F3"]);
}

// ── Concurrency ──────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_new_devices_never_exceed_cap() {
    let fx = Fixture::new();
    let key = fx.license("a@b.com", 10);

    let mut handles = Vec::new();
    for i in 0..12 {
        let binder = fx.binder.clone();
        let key = key.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            binder.admit(&key, &fp(&format!("device-{i}"))).unwrap()
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap().is_admitted() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 3);
    assert_eq!(fx.binder.count(&key).unwrap(), 3);
}

#[test]
fn separate_connections_share_the_cap() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("licenses.db");
    let fx = Fixture::with_store(Store::open(&path).unwrap());
    let key = fx.license("a@b.com", 10);

    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(common::start()));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Store::open(&path).unwrap();
            let binder = DeviceBinder::new(store, Arc::clone(&clock));
            let key = key.clone();
            std::thread::spawn(move || binder.admit(&key, &fp(&format!("device-{i}"))).unwrap())
        })
        .collect();

    let admitted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|a| a.is_admitted())
        .count();
    assert_eq!(admitted, 3);
    assert_eq!(fx.binder.count(&key).unwrap(), 3);
}
