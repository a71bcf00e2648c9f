/// Brute-force lockout policy
///
/// Transitions are driven only by failed password checks:
/// - every failure increments `login_attempts` (starting from 1)
/// - reaching exactly 5 or 10 attempts opens a one-hour window during which
///   logins are rejected without checking the password
/// - more than 14 attempts blocks the account until an operator clears it
///
/// A successful password check clears attempts, window and block flag.
use crate::{
    db::account::SecurityState,
    error::{WardenError, WardenResult},
};
use chrono::{DateTime, Duration, Utc};

/// Attempt counts that open a lockout window
pub const COOLDOWN_CHECKPOINTS: [i64; 2] = [5, 10];

/// The account is blocked once attempts exceed this
pub const BLOCK_AFTER_ATTEMPTS: i64 = 14;

/// Length of a lockout window
pub fn cooldown_window() -> Duration {
    Duration::hours(1)
}

/// Reject blocked accounts
pub fn ensure_not_blocked(security: &SecurityState) -> WardenResult<()> {
    if security.is_block {
        return Err(WardenError::AccountBlocked);
    }
    Ok(())
}

/// Checks run before a password is evaluated: block first, then the window
pub fn check(security: &SecurityState, now: DateTime<Utc>) -> WardenResult<()> {
    ensure_not_blocked(security)?;

    if let Some(minutes) = remaining_cooldown_minutes(security, now) {
        return Err(WardenError::CooldownActive { minutes });
    }

    Ok(())
}

/// Whole minutes left in the current window, if one is open
pub fn remaining_cooldown_minutes(security: &SecurityState, now: DateTime<Utc>) -> Option<i64> {
    let started = security.login_time?;
    if now - started >= cooldown_window() {
        return None;
    }

    let remaining_ms = (started + cooldown_window() - now).num_milliseconds();
    Some((remaining_ms as f64 / 60_000.0).round() as i64)
}

/// State after one more failed password check
pub fn record_failure(
    security: &SecurityState,
    device_model: &str,
    now: DateTime<Utc>,
) -> SecurityState {
    let attempts = security.login_attempts.unwrap_or(0) + 1;
    let mut next = security.clone();

    next.login_attempts = Some(attempts);
    next.device_try = Some(device_model.to_string());

    if COOLDOWN_CHECKPOINTS.contains(&attempts) {
        next.login_time = Some(now);
    }

    if attempts > BLOCK_AFTER_ATTEMPTS {
        next.is_block = true;
    }

    next
}

/// State after a successful password check
pub fn cleared(security: &SecurityState) -> SecurityState {
    SecurityState {
        login_attempts: None,
        login_time: None,
        is_block: false,
        device_try: security.device_try.clone(),
    }
}
