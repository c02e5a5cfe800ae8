//! Numeric rating to display-symbol mapping.

/// Map a 1-10 rating onto its moon-phase symbol.
///
/// Total over all inputs: anything outside the table falls back to the
/// entry for 10. Pure and deterministic, so the same library state always
/// produces the same remote records.
pub fn rating_symbol(rating: u8) -> &'static str {
    match rating {
        1 => "\u{1F317}",
        2 => "\u{1F315}",
        3 => "\u{1F315}\u{1F317}",
        4 => "\u{1F315}\u{1F315}",
        5 => "\u{1F315}\u{1F315}\u{1F317}",
        6 => "\u{1F315}\u{1F315}\u{1F315}",
        7 => "\u{1F315}\u{1F315}\u{1F315}\u{1F317}",
        8 => "\u{1F315}\u{1F315}\u{1F315}\u{1F315}",
        9 => "\u{1F315}\u{1F315}\u{1F315}\u{1F315}\u{1F317}",
        _ => "\u{1F315}\u{1F315}\u{1F315}\u{1F315}\u{1F315}",
    }
}
