//! Exchange venue mapping for six-digit fund codes.

/// Listing venue of an instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Venue {
    Shanghai,
    Shenzhen,
}

impl Venue {
    /// Shanghai funds are the `5xxxxx` codes; everything else trades in Shenzhen.
    pub fn of(code: &str) -> Self {
        if code.starts_with('5') {
            Venue::Shanghai
        } else {
            Venue::Shenzhen
        }
    }
}

/// `1.518880` / `0.159915`
pub fn eastmoney_secid(code: &str) -> String {
    match Venue::of(code) {
        Venue::Shanghai => format!("1.{}", code),
        Venue::Shenzhen => format!("0.{}", code),
    }
}

/// `sh518880` / `sz159915`
pub fn sina_symbol(code: &str) -> String {
    match Venue::of(code) {
        Venue::Shanghai => format!("sh{}", code),
        Venue::Shenzhen => format!("sz{}", code),
    }
}

/// Strip a two-letter venue prefix if present.
pub fn bare_code(symbol: &str) -> &str {
    match symbol.get(..2) {
        Some("sh") | Some("sz") | Some("bj") => &symbol[2..],
        _ => symbol,
    }
}
