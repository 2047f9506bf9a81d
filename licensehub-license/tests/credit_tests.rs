mod common;

use common::Fixture;
use licensehub_license::LicenseError;
use pretty_assertions::assert_eq;

// ── Balance ──────────────────────────────────────────────────────

#[test]
fn fresh_license_has_full_balance() {
    let fx = Fixture::new();
    let key = fx.license("a@b.com", 5);
    assert!(fx.meter.has_credits(&key).unwrap());
    assert_eq!(fx.meter.remaining(&key).unwrap(), 5);
}

#[test]
fn gated_consumption_stops_at_allotment() {
    let fx = Fixture::new();
    let key = fx.license("a@b.com", 5);

    let mut performed = 0;
    for _ in 0..8 {
        if fx.meter.has_credits(&key).unwrap() {
            fx.meter.consume(&key).unwrap();
            performed += 1;
        }
    }
    assert_eq!(performed, 5);
    assert_eq!(fx.meter.remaining(&key).unwrap(), 0);
    assert!(!fx.meter.has_credits(&key).unwrap());
}

#[test]
fn consume_stamps_last_used() {
    let fx = Fixture::new();
    let key = fx.license("a@b.com", 5);
    fx.meter.consume(&key).unwrap();
    assert_eq!(fx.registry.get(&key).unwrap().last_used, Some(common::start()));
}

#[test]
fn ungated_consume_can_go_negative() {
    let fx = Fixture::new();
    let key = fx.license("a@b.com", 1);
    fx.meter.consume(&key).unwrap();
    fx.meter.consume(&key).unwrap();
    assert_eq!(fx.meter.remaining(&key).unwrap(), -1);
    assert!(!fx.meter.has_credits(&key).unwrap());
}

#[test]
fn zero_credit_license_has_no_credits() {
    let fx = Fixture::new();
    let key = fx.license("a@b.com", 0);
    assert!(!fx.meter.has_credits(&key).unwrap());
}

// ── Unknown and inactive ─────────────────────────────────────────

#[test]
fn unknown_key_reports_no_credits() {
    let fx = Fixture::new();
    let key = fx.registry.derive_key("ghost@b.com");
    assert!(!fx.meter.has_credits(&key).unwrap());
    assert!(matches!(fx.meter.remaining(&key), Err(LicenseError::NotFound)));
    assert!(matches!(fx.meter.consume(&key), Err(LicenseError::NotFound)));
}

#[test]
fn inactive_license_reports_no_credits() {
    let fx = Fixture::new();
    let key = fx.license("a@b.com", 5);
    fx.registry.deactivate(&key).unwrap();
    assert!(!fx.meter.has_credits(&key).unwrap());
    assert!(!fx.meter.try_consume(&key).unwrap());
}

// ── Conditional consumption ──────────────────────────────────────

#[test]
fn try_consume_never_overshoots() {
    let fx = Fixture::new();
    let key = fx.license("a@b.com", 3);

    let consumed = (0..10)
        .filter(|_| fx.meter.try_consume(&key).unwrap())
        .count();
    assert_eq!(consumed, 3);
    assert_eq!(fx.registry.get(&key).unwrap().credits_used, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_try_consume_respects_allotment() {
    let fx = Fixture::new();
    let key = fx.license("a@b.com", 5);

    let mut handles = Vec::new();
    for _ in 0..20 {
        let meter = fx.meter.clone();
        let key = key.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            meter.try_consume(&key).unwrap()
        }));
    }

    let mut consumed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            consumed += 1;
        }
    }
    assert_eq!(consumed, 5);
    assert_eq!(fx.meter.remaining(&key).unwrap(), 0);
}
