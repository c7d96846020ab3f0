//! Half-month period labels.
//!
//! Records are keyed by a canonical label (`2024-01-First Half`) while every
//! outward-facing list speaks the short display form (`2024-01-上`). Legacy
//! spreadsheets also carry the dotted form (`2024.01上`). All three parse into
//! [`Period`], whose ordering is chronological and matches the lexicographic
//! ordering of the canonical string (zero-padded year and month, and
//! "First Half" < "Second Half").
//!
//! Labels that do not parse are passed through: `to_canonical` and
//! `to_display` only swap a recognised half marker and are the identity on
//! everything else.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

const FIRST_HALF: &str = "First Half";
const SECOND_HALF: &str = "Second Half";
const FIRST_GLYPH: &str = "上";
const SECOND_GLYPH: &str = "下";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Half {
    First,
    Second,
}

impl Half {
    fn canonical(self) -> &'static str {
        match self {
            Half::First => FIRST_HALF,
            Half::Second => SECOND_HALF,
        }
    }

    fn glyph(self) -> &'static str {
        match self {
            Half::First => FIRST_GLYPH,
            Half::Second => SECOND_GLYPH,
        }
    }

    fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            FIRST_HALF | FIRST_GLYPH => Some(Half::First),
            SECOND_HALF | SECOND_GLYPH => Some(Half::Second),
            _ => None,
        }
    }
}

/// A parsed half-month period. Field order gives chronological `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    pub year: u16,
    pub month: u8,
    pub half: Half,
}

fn period_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{4})[.\-](\d{1,2})-?(上|下|First Half|Second Half)$")
            .expect("period pattern is valid")
    })
}

impl Period {
    /// Parse any recognised form: canonical, display or dotted legacy.
    pub fn parse(label: &str) -> Option<Self> {
        let caps = period_re().captures(label.trim())?;
        let year: u16 = caps[1].parse().ok()?;
        let month: u8 = caps[2].parse().ok()?;
        if !(1..=12).contains(&month) {
            return None;
        }
        let half = Half::from_marker(&caps[3])?;
        Some(Self { year, month, half })
    }

    /// `YYYY-MM-First Half` / `YYYY-MM-Second Half`
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// `YYYY-MM-上` / `YYYY-MM-下`
    pub fn display_label(&self) -> String {
        format!("{:04}-{:02}-{}", self.year, self.month, self.half.glyph())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{}",
            self.year,
            self.month,
            self.half.canonical()
        )
    }
}

/// Convert a display (or legacy dotted) label to the stored canonical form.
pub fn to_canonical(label: &str) -> String {
    if let Some(period) = Period::parse(label) {
        return period.canonical();
    }
    if label.contains(FIRST_GLYPH) {
        label.replace(FIRST_GLYPH, FIRST_HALF)
    } else if label.contains(SECOND_GLYPH) {
        label.replace(SECOND_GLYPH, SECOND_HALF)
    } else {
        label.to_string()
    }
}

/// Convert a stored canonical label to the short display form.
pub fn to_display(label: &str) -> String {
    if let Some(period) = Period::parse(label) {
        return period.display_label();
    }
    if label.contains(FIRST_HALF) {
        label.replace(FIRST_HALF, FIRST_GLYPH)
    } else if label.contains(SECOND_HALF) {
        label.replace(SECOND_HALF, SECOND_GLYPH)
    } else {
        label.to_string()
    }
}
