// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Multiport Strings
//!
//! A rule's `multiport` field encodes its ports as comma-separated single ports
//! and inclusive `lo-hi` ranges, e.g. `"22,80,8000-8080"`. An absent field, an
//! empty string or the sentinel `"-1"` means every port is open.
//!
//! Parsing never fails: malformed items (non-numeric, reversed ranges, values
//! outside 0-65535) contribute no coverage and are only reported at `debug`.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use tracing::debug;

use crate::domain::rule::ANY;

/// Ports opened by a single rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortCoverage {
    /// Every port (`multiport` absent or `"-1"`).
    All,
    Listed {
        singles: BTreeSet<u16>,
        ranges: Vec<RangeInclusive<u16>>,
    },
}

impl PortCoverage {
    pub fn parse(multiport: Option<&str>) -> Self {
        let raw = match multiport.map(str::trim) {
            None | Some("") | Some(ANY) => return PortCoverage::All,
            Some(raw) => raw,
        };

        let mut singles = BTreeSet::new();
        let mut ranges = Vec::new();

        for item in raw.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            match item.split_once('-') {
                Some((lo, hi)) => match (lo.trim().parse::<u16>(), hi.trim().parse::<u16>()) {
                    (Ok(lo), Ok(hi)) if lo <= hi => ranges.push(lo..=hi),
                    _ => debug!(item, multiport = raw, "Ignoring malformed port range"),
                },
                None => match item.parse::<u16>() {
                    Ok(port) => {
                        singles.insert(port);
                    }
                    Err(_) => debug!(item, multiport = raw, "Ignoring malformed port"),
                },
            }
        }

        PortCoverage::Listed { singles, ranges }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, PortCoverage::All)
    }

    /// True when `port` is opened by a single port or any range.
    pub fn covers(&self, port: u16) -> bool {
        match self {
            PortCoverage::All => true,
            PortCoverage::Listed { singles, ranges } => {
                singles.contains(&port) || ranges.iter().any(|r| r.contains(&port))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_mean_all_ports() {
        assert!(PortCoverage::parse(None).is_all());
        assert!(PortCoverage::parse(Some("-1")).is_all());
        assert!(PortCoverage::parse(Some(" ")).is_all());
    }

    #[test]
    fn test_mixed_singles_and_ranges() {
        let coverage = PortCoverage::parse(Some("22, 80,8000-8080"));
        assert!(coverage.covers(22));
        assert!(coverage.covers(80));
        assert!(coverage.covers(8000));
        assert!(coverage.covers(8080));
        assert!(!coverage.covers(8081));
        assert!(!coverage.covers(443));
    }

    #[test]
    fn test_malformed_items_fail_closed() {
        let coverage = PortCoverage::parse(Some("ssh,30-20,70000,1-x,443"));
        match &coverage {
            PortCoverage::Listed { singles, ranges } => {
                assert_eq!(singles.iter().copied().collect::<Vec<_>>(), vec![443]);
                assert!(ranges.is_empty());
            }
            PortCoverage::All => panic!("expected listed coverage"),
        }
        assert!(!coverage.covers(25));
        assert!(!coverage.covers(22));
    }
}
