use std::fmt;

use chrono::Duration;

/// One of the six timeframes the scanner ingests per symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Interval {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
}

impl Interval {
    pub const ALL: [Interval; 6] = [
        Interval::M1,
        Interval::M5,
        Interval::M15,
        Interval::M30,
        Interval::H1,
        Interval::H4,
    ];

    /// Vendor-facing interval code, e.g. "1m", "240m".
    pub fn code(self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::M30 => "30m",
            Interval::H1 => "60m",
            Interval::H4 => "240m",
        }
    }

    pub fn minutes(self) -> i64 {
        match self {
            Interval::M1 => 1,
            Interval::M5 => 5,
            Interval::M15 => 15,
            Interval::M30 => 30,
            Interval::H1 => 60,
            Interval::H4 => 240,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::minutes(self.minutes())
    }

    /// Maximum lookback the vendor will serve for this interval (§4.A).
    pub fn max_lookback(self) -> Duration {
        match self {
            Interval::M1 => Duration::days(7),
            Interval::M5 | Interval::M15 | Interval::M30 => Duration::days(60),
            Interval::H1 | Interval::H4 => Duration::days(730),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_lookback_buckets_match_spec() {
        assert_eq!(Interval::M1.max_lookback(), Duration::days(7));
        assert_eq!(Interval::M5.max_lookback(), Duration::days(60));
        assert_eq!(Interval::M30.max_lookback(), Duration::days(60));
        assert_eq!(Interval::H1.max_lookback(), Duration::days(730));
        assert_eq!(Interval::H4.max_lookback(), Duration::days(730));
    }
}
