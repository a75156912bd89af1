//! Port for verifying the signed token attached to orchestrator callbacks.
//!
//! Signature checking is delegated to an implementation (the JWT verifier in
//! infra); the freshness rules that every implementation must apply live
//! here so they are shared and tested once.

use std::time::Duration;

use mailstep_types::callback::CallbackClaims;
use mailstep_types::error::AuthenticationError;

/// Verifies and decodes callback tokens.
///
/// Implementations must be pure: no IO, no state mutation. Every lifecycle
/// call goes through `verify` before touching any store.
pub trait CallbackVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<CallbackClaims, AuthenticationError>;
}

/// Reject claims with a blank activity id or an `iat`/`exp` outside the
/// accepted clock-skew window.
///
/// `now_secs` is the current Unix time in seconds.
pub fn check_freshness(
    claims: &CallbackClaims,
    now_secs: i64,
    max_skew: Duration,
) -> Result<(), AuthenticationError> {
    if claims.activity_instance_id.as_str().trim().is_empty() {
        return Err(AuthenticationError::MissingClaim("activityInstanceId"));
    }

    let max_skew = i64::try_from(max_skew.as_secs()).unwrap_or(i64::MAX);
    let skew = now_secs.saturating_sub(claims.iat);
    if skew.saturating_abs() > max_skew {
        return Err(AuthenticationError::Stale { skew_secs: skew });
    }

    if let Some(exp) = claims.exp {
        if now_secs > exp.saturating_add(max_skew) {
            return Err(AuthenticationError::Expired);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailstep_types::activity::ActivityInstanceId;

    const NOW: i64 = 1_760_000_000;

    fn claims(iat: i64, exp: Option<i64>) -> CallbackClaims {
        CallbackClaims {
            activity_instance_id: ActivityInstanceId::new("act-1"),
            iat,
            exp,
            journey_id: None,
            jti: None,
        }
    }

    #[test]
    fn test_fresh_token_accepted() {
        let skew = Duration::from_secs(300);
        assert!(check_freshness(&claims(NOW, None), NOW, skew).is_ok());
        assert!(check_freshness(&claims(NOW - 299, None), NOW, skew).is_ok());
        // Small forward drift on the orchestrator side is tolerated too
        assert!(check_freshness(&claims(NOW + 120, None), NOW, skew).is_ok());
    }

    #[test]
    fn test_stale_token_rejected() {
        let err = check_freshness(&claims(NOW - 301, None), NOW, Duration::from_secs(300)).unwrap_err();
        assert_eq!(err, AuthenticationError::Stale { skew_secs: 301 });
    }

    #[test]
    fn test_future_token_rejected() {
        let err = check_freshness(&claims(NOW + 3_600, None), NOW, Duration::from_secs(300)).unwrap_err();
        assert!(matches!(err, AuthenticationError::Stale { .. }));
    }

    #[test]
    fn test_expired_token_rejected() {
        let err = check_freshness(&claims(NOW - 10, Some(NOW - 400)), NOW, Duration::from_secs(300))
            .unwrap_err();
        assert_eq!(err, AuthenticationError::Expired);
    }

    #[test]
    fn test_blank_activity_id_rejected() {
        let mut c = claims(NOW, None);
        c.activity_instance_id = ActivityInstanceId::new("  ");
        let err = check_freshness(&c, NOW, Duration::from_secs(300)).unwrap_err();
        assert_eq!(err, AuthenticationError::MissingClaim("activityInstanceId"));
    }
}
