//! # Ticket Numbering
//!
//! Each register numbers its own sales `00000001`, `00000002`, ...
//!
//! The next number is the largest numeric ticket already issued on the
//! register plus one. Tickets that do not parse as integers (imported or
//! hand-edited data) are ignored rather than rejected.

use crate::TICKET_WIDTH;

/// Left-pads `n` with zeros to `width` digits.
///
/// Wider numbers are returned unpadded, never truncated.
pub fn zero_pad(n: u64, width: usize) -> String {
    format!("{n:0width$}")
}

/// Computes the next ticket number from the tickets already issued.
///
/// ## Example
/// ```rust
/// use caja_core::ticket::next_ticket_number;
///
/// assert_eq!(next_ticket_number(Vec::<&str>::new()), "00000001");
/// assert_eq!(next_ticket_number(["00000009", "ABC", "00000002"]), "00000010");
/// ```
pub fn next_ticket_number<I, S>(existing: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let max = existing
        .into_iter()
        .filter_map(|t| t.as_ref().trim().parse::<u64>().ok())
        .max()
        .unwrap_or(0);

    zero_pad(max.saturating_add(1), TICKET_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_ticket() {
        assert_eq!(next_ticket_number(Vec::<String>::new()), "00000001");
    }

    #[test]
    fn test_uses_max_not_count() {
        // Gaps left by deleted rows do not cause reuse
        assert_eq!(next_ticket_number(["00000001", "00000005"]), "00000006");
    }

    #[test]
    fn test_ignores_non_numeric() {
        assert_eq!(next_ticket_number(["T-1", "", "00000003"]), "00000004");
        assert_eq!(next_ticket_number(["T-1"]), "00000001");
    }

    #[test]
    fn test_overflowing_width() {
        assert_eq!(next_ticket_number(["99999999"]), "100000000");
        assert_eq!(zero_pad(42, 8), "00000042");
    }

    #[test]
    fn test_largest_ticket_does_not_wrap() {
        let max = u64::MAX.to_string();
        assert_eq!(next_ticket_number([max.as_str()]), max);
    }
}
