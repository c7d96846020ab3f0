//! Period-over-period growth for one person's history.
//!
//! The comparison base is the person's own previous record, not the
//! calendar-previous period: gaps in a history are skipped. The first record
//! of every history has zero growth.

/// Growth percentages stored alongside a record.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Growth {
    pub left_pct: f64,
    pub right_pct: f64,
    pub total_pct: f64,
}

/// Percentage change from `previous` to `current`.
///
/// A zero base yields 100% for any positive value and 0% otherwise.
pub fn growth_rate(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        if current > 0.0 {
            100.0
        } else {
            0.0
        }
    } else {
        (current - previous) / previous * 100.0
    }
}

/// Growth of `current` (left, right) against `previous` (left, right).
pub fn growth_between(current: (f64, f64), previous: (f64, f64)) -> Growth {
    Growth {
        left_pct: growth_rate(current.0, previous.0),
        right_pct: growth_rate(current.1, previous.1),
        total_pct: growth_rate(current.0 + current.1, previous.0 + previous.1),
    }
}

/// Growth for every entry of a history ordered by period ascending.
///
/// The result has the same length as `history`.
pub fn compute_series(history: &[(f64, f64)]) -> Vec<Growth> {
    let mut out = Vec::with_capacity(history.len());
    for (i, &current) in history.iter().enumerate() {
        if i == 0 {
            out.push(Growth::default());
        } else {
            out.push(growth_between(current, history[i - 1]));
        }
    }
    out
}
