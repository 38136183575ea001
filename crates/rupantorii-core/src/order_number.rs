//! # Order Numbers
//!
//! Human-readable order numbers of the form `RUP-M2K9ZQ1A-482`:
//!
//! ```text
//! RUP      - configurable prefix
//! M2K9ZQ1A - creation time as unix milliseconds, base36, uppercase
//! 482      - random suffix in 100..=999
//! ```
//!
//! Numbers are unique in the database; the storage layer regenerates on the
//! rare collision.

use chrono::{DateTime, Utc};
use uuid::Uuid;

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generates an order number for `now` with a fresh random suffix.
pub fn generate_order_number(prefix: &str, now: DateTime<Utc>) -> String {
    let suffix = random_suffix();
    format_order_number(prefix, now, suffix)
}

/// Formats an order number from its parts.
///
/// ## Example
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use rupantorii_core::order_number::format_order_number;
///
/// let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
/// assert_eq!(format_order_number("RUP", at, 482), "RUP-LOYW3V28-482");
/// ```
pub fn format_order_number(prefix: &str, now: DateTime<Utc>, suffix: u16) -> String {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
    format!("{}-{}-{}", prefix, to_base36(millis), suffix)
}

fn random_suffix() -> u16 {
    // v4 UUIDs carry 122 random bits; 900 buckets is plenty uniform.
    (Uuid::new_v4().as_u128() % 900) as u16 + 100
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}
