//! Human-readable byte formatting utilities.
//!
//! Sizes are printed with binary units (KiB, MiB). Sizes reported by the
//! local image store may arrive in decimal units (kB, MB) and are parsed back
//! with [`unpretty_bytes`].

use humansize::{BINARY, format_size_i};


/// Decimal units understood by [`unpretty_bytes`], smallest first.
const DECIMAL_UNITS: [&str; 9] = ["B", "kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Formats a signed byte count using binary units.
///
/// # Examples
///
/// ```
/// use libresync::format::pretty_bytes;
///
/// assert_eq!(pretty_bytes(1024 * 1024 * 5), "5 MiB");
/// assert_eq!(pretty_bytes(-2048), "-2 KiB");
/// assert_eq!(pretty_bytes(0), "0 B");
/// ```
pub fn pretty_bytes(bytes: i64) -> String {
    format_size_i(bytes, BINARY)
}

/// Parses a human-readable decimal size back into bytes.
///
/// A bare number is taken as bytes. A value with an unknown unit, or one that
/// is not a number at all, yields 0.
///
/// # Examples
///
/// ```
/// use libresync::format::unpretty_bytes;
///
/// assert_eq!(unpretty_bytes("12.5MB"), 12_500_000);
/// assert_eq!(unpretty_bytes("1.2 kB"), 1_200);
/// assert_eq!(unpretty_bytes("4096"), 4096);
/// assert_eq!(unpretty_bytes("3 furlongs"), 0);
/// ```
pub fn unpretty_bytes(human: &str) -> u64 {
    let human = human.trim();

    let mut level = None;
    for (index, unit) in DECIMAL_UNITS.iter().enumerate() {
        if human.ends_with(unit) {
            level = Some((index, unit.len()));
        }
    }

    let (number, level) = match level {
        Some((index, suffix_len)) => (&human[..human.len() - suffix_len], index),
        None => (human, 0),
    };

    let Ok(mut value) = number.trim().parse::<f64>() else {
        return 0;
    };
    if !value.is_finite() || value < 0.0 {
        return 0;
    }
    for _ in 0..level {
        value *= 1000.0;
    }
    value.round() as u64
}
