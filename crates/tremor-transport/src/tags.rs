//! Deterministic message tags.
//!
//! Unit `i` of a scheme with width `w` owns tags `w*i .. w*i + w`, so the
//! tag sets of different units never overlap and a receiver can compute
//! exactly what to wait for. Collective operations use tags at or above
//! `COLLECTIVE_BASE`, out of reach of any unit index.

use std::ops::Range;

pub const COLLECTIVE_BASE: u64 = 1 << 62;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagScheme {
    /// Length, then an `nt x 4` trace tensor.
    Trace,
    /// Length, `t0`, then an `nt x 9` raw tensor.
    Green,
}

impl TagScheme {
    pub fn width(&self) -> u64 {
        match self {
            TagScheme::Trace => 2,
            TagScheme::Green => 3,
        }
    }

    pub fn tag(&self, index: usize, part: u64) -> u64 {
        debug_assert!(part < self.width());
        self.width() * index as u64 + part
    }

    pub fn tags(&self, index: usize) -> Range<u64> {
        let start = self.width() * index as u64;
        start..start + self.width()
    }
}

pub const TRACE_LEN: u64 = 0;
pub const TRACE_DATA: u64 = 1;

pub const GREEN_LEN: u64 = 0;
pub const GREEN_T0: u64 = 1;
pub const GREEN_DATA: u64 = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_tags_follow_two_per_unit() {
        assert_eq!(TagScheme::Trace.tag(5, TRACE_LEN), 10);
        assert_eq!(TagScheme::Trace.tag(5, TRACE_DATA), 11);
        assert_eq!(TagScheme::Green.tags(2), 6..9);
    }

    #[test]
    fn unit_tag_sets_are_disjoint() {
        for scheme in [TagScheme::Trace, TagScheme::Green] {
            let mut seen = std::collections::HashSet::new();
            for i in 0..500 {
                for tag in scheme.tags(i) {
                    assert!(seen.insert(tag), "{scheme:?}: tag {tag} reused at unit {i}");
                    assert!(tag < COLLECTIVE_BASE);
                }
            }
        }
    }
}
