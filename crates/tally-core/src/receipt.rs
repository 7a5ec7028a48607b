//! Receipt number formatting.
//!
//! ```text
//! prefix  year  sequence
//!   INV - 2026 - 000042
//! ```
//!
//! The sequence is a counter per (prefix, year) held by the store; this
//! module only names the counter and renders its value.

/// Store key of the sequence counter for `prefix` in `year`.
pub fn sequence_key(prefix: &str, year: i32) -> String {
    format!("receipt:{}:{}", prefix, year)
}

/// Renders a receipt number, zero-padding the sequence to six digits.
///
/// ```rust
/// use tally_core::receipt::format_receipt_number;
///
/// assert_eq!(format_receipt_number("INV", 2026, 42), "INV-2026-000042");
/// ```
pub fn format_receipt_number(prefix: &str, year: i32, sequence: i64) -> String {
    format!("{}-{}-{:06}", prefix, year, sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_wider_than_padding() {
        assert_eq!(format_receipt_number("INV", 2026, 1_234_567), "INV-2026-1234567");
    }

    #[test]
    fn test_keys_are_per_year() {
        assert_ne!(sequence_key("INV", 2026), sequence_key("INV", 2027));
        assert_eq!(sequence_key("POS", 2026), "receipt:POS:2026");
    }
}
