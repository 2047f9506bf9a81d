use licensehub_db::StoreError;
use licensehub_license::LicenseError;
use pretty_assertions::assert_eq;
use std::time::Duration;

// ── Reasons ──────────────────────────────────────────────────────

#[test]
fn reasons_are_stable() {
    let cases = [
        (LicenseError::DuplicateLicense, "duplicate_license"),
        (LicenseError::NotFound, "invalid_or_inactive"),
        (LicenseError::DeviceLimitExceeded(3), "device_limit"),
        (LicenseError::NoCreditsRemaining, "no_credits"),
        (LicenseError::RateLimitExceeded(15), "rate_limited"),
        (LicenseError::StoreUnavailable("x".into()), "store_unavailable"),
        (LicenseError::ActionFailed("x".into()), "action_failed"),
        (LicenseError::ActionTimedOut(Duration::from_secs(10)), "action_timeout"),
        (LicenseError::InvalidInput("x".into()), "invalid_input"),
    ];
    for (err, reason) in cases {
        assert_eq!(err.reason(), reason);
    }
}

#[test]
fn hints_carry_limits() {
    let hint = LicenseError::DeviceLimitExceeded(3).hint().unwrap();
    assert!(hint.contains("Maximum 3 devices"));

    let hint = LicenseError::RateLimitExceeded(15).hint().unwrap();
    assert!(hint.contains("Maximum 15 requests per hour"));

    assert!(LicenseError::NotFound.hint().is_none());
    assert!(LicenseError::DuplicateLicense.hint().is_none());
}

#[test]
fn only_store_failures_are_transient() {
    assert!(LicenseError::StoreUnavailable("locked".into()).is_transient());
    assert!(!LicenseError::NotFound.is_transient());
    assert!(!LicenseError::NoCreditsRemaining.is_transient());
    assert!(!LicenseError::ActionTimedOut(Duration::from_secs(1)).is_transient());
}

// ── Conversions ──────────────────────────────────────────────────

#[test]
fn store_errors_become_unavailable() {
    let err: LicenseError = StoreError::Unavailable("connection lock poisoned".into()).into();
    assert!(matches!(err, LicenseError::StoreUnavailable(ref msg) if msg.contains("poisoned")));
}

#[test]
fn display_messages() {
    assert_eq!(
        LicenseError::NotFound.to_string(),
        "invalid or inactive license"
    );
    assert_eq!(
        LicenseError::DeviceLimitExceeded(3).to_string(),
        "device limit exceeded (max 3 devices)"
    );
    assert_eq!(
        LicenseError::NoCreditsRemaining.to_string(),
        "no credits remaining"
    );
}
