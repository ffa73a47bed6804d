//! Sequence sets and UID sets.
//!
//! Both are normalized range sets over positive `u32` values plus an optional
//! `*` component. The element type keeps message sequence numbers and UIDs
//! from being mixed up: a [`SequenceSet`] can never be passed where a
//! [`UidSet`] is expected.
//!
//! `*` means "the highest value in the mailbox" and is never resolved at parse
//! time. Call [`IdSet::resolve`] with the caller's view of the mailbox to get a
//! concrete set.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::str::FromStr;

use super::{SeqNum, Uid};
use crate::{Error, Result};

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::SeqNum {}
    impl Sealed for super::Uid {}
}

/// Values that can be members of an [`IdSet`].
pub trait SetItem: sealed::Sealed + Copy + Eq + Hash + fmt::Debug {
    /// Name used in debug output.
    const KIND: &'static str;

    /// Wraps a raw value, `None` for zero.
    fn from_value(value: u32) -> Option<Self>;

    /// Returns the raw value.
    fn value(self) -> u32;
}

impl SetItem for SeqNum {
    const KIND: &'static str = "SequenceSet";

    fn from_value(value: u32) -> Option<Self> {
        Self::new(value)
    }

    fn value(self) -> u32 {
        self.get()
    }
}

impl SetItem for Uid {
    const KIND: &'static str = "UidSet";

    fn from_value(value: u32) -> Option<Self> {
        Self::new(value)
    }

    fn value(self) -> u32 {
        self.get()
    }
}

/// The `*` part of a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Tail {
    /// A bare `*`: only the highest value.
    Star,
    /// `n:*`: everything from `n` up to the highest value.
    From(u32),
}

/// Normalized set of message identifiers.
///
/// Finite ranges are kept ascending, non-overlapping and with adjacent ranges
/// merged, so two sets covering the same values compare equal and serialize
/// identically.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct IdSet<T> {
    ranges: Vec<(u32, u32)>,
    tail: Option<Tail>,
    _kind: PhantomData<fn() -> T>,
}

/// Set of message sequence numbers.
pub type SequenceSet = IdSet<SeqNum>;

/// Set of message UIDs.
pub type UidSet = IdSet<Uid>;

impl<T: SetItem> IdSet<T> {
    fn normalized(mut ranges: Vec<(u32, u32)>, tail: Option<Tail>) -> Self {
        ranges.sort_unstable();

        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(ranges.len());
        for (start, end) in ranges {
            if let Some(last) = merged.last_mut()
                && start <= last.1.saturating_add(1)
            {
                last.1 = last.1.max(end);
                continue;
            }
            merged.push((start, end));
        }

        let tail = match tail {
            Some(Tail::From(mut from)) => {
                while let Some(&(start, end)) = merged.last() {
                    if end.saturating_add(1) < from {
                        break;
                    }
                    from = from.min(start);
                    merged.pop();
                }
                Some(Tail::From(from))
            }
            other => other,
        };

        Self {
            ranges: merged,
            tail,
            _kind: PhantomData,
        }
    }

    /// Creates an empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            ranges: Vec::new(),
            tail: None,
            _kind: PhantomData,
        }
    }

    /// Creates a set holding one value.
    #[must_use]
    pub fn single(n: u32) -> Option<Self> {
        (n != 0).then(|| Self::normalized(vec![(n, n)], None))
    }

    /// Creates an inclusive range. The bounds may be given in either order.
    #[must_use]
    pub fn range(a: u32, b: u32) -> Option<Self> {
        (a != 0 && b != 0).then(|| Self::normalized(vec![(a.min(b), a.max(b))], None))
    }

    /// Creates `n:*`.
    #[must_use]
    pub fn from_start(n: u32) -> Option<Self> {
        (n != 0).then(|| Self::normalized(Vec::new(), Some(Tail::From(n))))
    }

    /// Creates `1:*`, every message in the mailbox.
    #[must_use]
    pub fn all() -> Self {
        Self::normalized(Vec::new(), Some(Tail::From(1)))
    }

    /// Creates `*`, the highest message only.
    #[must_use]
    pub fn last() -> Self {
        Self::normalized(Vec::new(), Some(Tail::Star))
    }

    /// Parses IMAP set syntax such as `1:5,7,9:*`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for empty input or elements, zero, values
    /// that are not numbers or overflow `u32`, and descending ranges such as
    /// `5:2`.
    pub fn parse(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(Error::parse(0, "empty sequence set"));
        }

        let mut ranges = Vec::new();
        let mut tail = None;
        let mut offset = 0;

        for part in text.split(',') {
            if part.is_empty() {
                return Err(Error::parse(offset, "empty element in sequence set"));
            }

            let item = match part.split_once(':') {
                None => match parse_bound(part, offset)? {
                    Bound::Star => Item::Tail(Tail::Star),
                    Bound::Value(n) => Item::Range(n, n),
                },
                Some((first, second)) => {
                    let second_offset = offset + first.len() + 1;
                    match (
                        parse_bound(first, offset)?,
                        parse_bound(second, second_offset)?,
                    ) {
                        (Bound::Value(a), Bound::Value(b)) if a > b => {
                            return Err(Error::parse(
                                offset,
                                format!("descending range {a}:{b}"),
                            ));
                        }
                        (Bound::Value(a), Bound::Value(b)) => Item::Range(a, b),
                        (Bound::Value(n), Bound::Star) | (Bound::Star, Bound::Value(n)) => {
                            Item::Tail(Tail::From(n))
                        }
                        (Bound::Star, Bound::Star) => Item::Tail(Tail::Star),
                    }
                }
            };

            match item {
                Item::Range(a, b) => ranges.push((a, b)),
                Item::Tail(t) => tail = Some(merge_tails(tail, t)),
            }

            offset += part.len() + 1;
        }

        Ok(Self::normalized(ranges, tail))
    }

    /// Serializes to the canonical minimal form.
    #[must_use]
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    /// Returns true if the set holds no values at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty() && self.tail.is_none()
    }

    /// Returns true if the set has a `*` component.
    #[must_use]
    pub const fn has_star(&self) -> bool {
        self.tail.is_some()
    }

    /// Number of concrete values, not counting any `*` component.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.ranges
            .iter()
            .map(|&(start, end)| u64::from(end - start) + 1)
            .sum()
    }

    /// Returns true if `n` is in the set.
    ///
    /// `n:*` is treated as open-ended. A bare `*` matches nothing until the
    /// set is resolved.
    #[must_use]
    pub fn contains(&self, n: u32) -> bool {
        if let Some(Tail::From(from)) = self.tail
            && n >= from
        {
            return true;
        }
        self.ranges
            .binary_search_by(|&(start, end)| {
                if end < n {
                    std::cmp::Ordering::Less
                } else if start > n {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Returns true if the identifier is in the set.
    #[must_use]
    pub fn contains_id(&self, id: T) -> bool {
        self.contains(id.value())
    }

    /// Returns the union of two sets.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut ranges = self.ranges.clone();
        ranges.extend_from_slice(&other.ranges);
        let tail = match (self.tail, other.tail) {
            (Some(a), Some(b)) => Some(merge_tails(Some(a), b)),
            (a, b) => a.or(b),
        };
        Self::normalized(ranges, tail)
    }

    /// Returns the intersection of two sets.
    ///
    /// A bare `*` only survives when both sides carry a `*` component; to
    /// intersect it with concrete values, [`resolve`](Self::resolve) first.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        let mut out = Vec::new();

        let (mut i, mut j) = (0, 0);
        while let (Some(&(a_start, a_end)), Some(&(b_start, b_end))) =
            (self.ranges.get(i), other.ranges.get(j))
        {
            let start = a_start.max(b_start);
            let end = a_end.min(b_end);
            if start <= end {
                out.push((start, end));
            }
            if a_end < b_end {
                i += 1;
            } else {
                j += 1;
            }
        }

        if let Some(Tail::From(from)) = self.tail {
            out.extend(clip_from(&other.ranges, from));
        }
        if let Some(Tail::From(from)) = other.tail {
            out.extend(clip_from(&self.ranges, from));
        }

        let tail = match (self.tail, other.tail) {
            (Some(Tail::From(a)), Some(Tail::From(b))) => Some(Tail::From(a.max(b))),
            (Some(_), Some(_)) => Some(Tail::Star),
            _ => None,
        };

        Self::normalized(out, tail)
    }

    /// Replaces `*` with `highest`, producing a concrete set.
    ///
    /// `n:*` with `n > highest` resolves to `highest:n`. With `highest == 0`
    /// (an empty mailbox) the `*` component is dropped.
    #[must_use]
    pub fn resolve(&self, highest: u32) -> Self {
        let mut ranges = self.ranges.clone();
        if highest != 0 {
            match self.tail {
                Some(Tail::Star) => ranges.push((highest, highest)),
                Some(Tail::From(from)) => ranges.push((from.min(highest), from.max(highest))),
                None => {}
            }
        }
        Self::normalized(ranges, None)
    }

    /// Iterates over the concrete values in ascending order.
    ///
    /// Any `*` component is skipped; resolve the set first to include it.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.ranges
            .iter()
            .flat_map(|&(start, end)| start..=end)
            .filter_map(T::from_value)
    }

    /// Returns the normalized finite ranges.
    #[must_use]
    pub fn ranges(&self) -> &[(u32, u32)] {
        &self.ranges
    }
}

impl<T: SetItem> Default for IdSet<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: SetItem> FromIterator<T> for IdSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let ranges = iter
            .into_iter()
            .map(|id| (id.value(), id.value()))
            .collect();
        Self::normalized(ranges, None)
    }
}

impl<T: SetItem> FromStr for IdSet<T> {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl<T: SetItem> fmt::Display for IdSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut sep = |f: &mut fmt::Formatter<'_>| {
            if first {
                first = false;
                Ok(())
            } else {
                f.write_str(",")
            }
        };

        for &(start, end) in &self.ranges {
            sep(f)?;
            if start == end {
                write!(f, "{start}")?;
            } else {
                write!(f, "{start}:{end}")?;
            }
        }

        match self.tail {
            Some(Tail::Star) => {
                sep(f)?;
                f.write_str("*")
            }
            Some(Tail::From(from)) => {
                sep(f)?;
                write!(f, "{from}:*")
            }
            None => Ok(()),
        }
    }
}

impl<T: SetItem> fmt::Debug for IdSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({self})", T::KIND)
    }
}

enum Bound {
    Value(u32),
    Star,
}

enum Item {
    Range(u32, u32),
    Tail(Tail),
}

fn parse_bound(text: &str, offset: usize) -> Result<Bound> {
    if text == "*" {
        return Ok(Bound::Star);
    }
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::parse(offset, format!("not a number: {text:?}")));
    }
    if text.starts_with('0') {
        return Err(Error::parse(offset, format!("zero or leading zero: {text}")));
    }
    text.parse::<u32>()
        .map(Bound::Value)
        .map_err(|_| Error::parse(offset, format!("value out of range: {text}")))
}

const fn merge_tails(current: Option<Tail>, next: Tail) -> Tail {
    match (current, next) {
        (Some(Tail::From(a)), Tail::From(b)) => Tail::From(if a < b { a } else { b }),
        (Some(Tail::From(n)), Tail::Star) | (_, Tail::From(n)) => Tail::From(n),
        (_, Tail::Star) => Tail::Star,
    }
}

fn clip_from(ranges: &[(u32, u32)], from: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
    ranges
        .iter()
        .filter(move |&&(_, end)| end >= from)
        .map(move |&(start, end)| (start.max(from), end))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn seq(s: &str) -> SequenceSet {
        SequenceSet::parse(s).unwrap()
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn mixed_elements() {
            let set = seq("1:5,7,9:*");
            assert_eq!(set.ranges(), &[(1, 5), (7, 7)]);
            assert!(set.has_star());
            assert_eq!(set.to_string(), "1:5,7,9:*");
        }

        #[test]
        fn normalizes_overlap_and_adjacency() {
            assert_eq!(seq("7,1:3,2:5,6").to_string(), "1:7");
            assert_eq!(seq("10,1,3,2").to_string(), "1:3,10");
        }

        #[test]
        fn tail_absorbs_trailing_ranges() {
            assert_eq!(seq("1:3,5:8,7:*").to_string(), "1:3,5:*");
            assert_eq!(seq("4:*,*").to_string(), "4:*");
            assert_eq!(seq("*:4").to_string(), "4:*");
            assert_eq!(seq("*").to_string(), "*");
            assert_eq!(seq("2,*").to_string(), "2,*");
        }

        #[test]
        fn max_uid() {
            let set = UidSet::parse("4294967290:4294967295").unwrap();
            assert_eq!(set.len(), 6);
            assert!(set.contains(u32::MAX));
        }

        #[test]
        fn rejects_bad_input() {
            for bad in ["", ",", "1,", ",1", "0", "1:0", "a", "1:b", "5:2", "01", "4294967296", "1::2", " 1"] {
                assert!(
                    matches!(SequenceSet::parse(bad), Err(Error::Parse { .. })),
                    "accepted {bad:?}"
                );
            }
        }

        #[test]
        fn error_position_points_at_element() {
            let Err(Error::Parse { position, .. }) = SequenceSet::parse("1:5,x") else {
                panic!("expected parse error");
            };
            assert_eq!(position, 4);
        }
    }

    mod contains_tests {
        use super::*;

        #[test]
        fn ranges_and_open_tail() {
            let set = seq("1:5,7,9:*");
            assert!(set.contains(3));
            assert!(!set.contains(6));
            assert!(set.contains(7));
            assert!(!set.contains(8));
            assert!(set.contains(9));
            assert!(set.contains(1_000_000));
        }

        #[test]
        fn bare_star_needs_resolution() {
            let set = seq("*");
            assert!(!set.contains(10));
            assert!(set.resolve(10).contains(10));
        }

        #[test]
        fn typed_lookup() {
            let uids = UidSet::parse("100:200").unwrap();
            assert!(uids.contains_id(Uid::new(150).unwrap()));
            assert!(!uids.contains_id(Uid::new(201).unwrap()));
        }
    }

    mod combine_tests {
        use super::*;

        #[test]
        fn union_merges() {
            assert_eq!(seq("1:3,10").union(&seq("4:6,12:*")).to_string(), "1:6,10,12:*");
        }

        #[test]
        fn intersect_finite() {
            assert_eq!(seq("1:10,20:30").intersect(&seq("5:25")).to_string(), "5:10,20:25");
            assert!(seq("1:3").intersect(&seq("4:6")).is_empty());
        }

        #[test]
        fn intersect_with_tail() {
            assert_eq!(seq("1:10,15").intersect(&seq("8:*")).to_string(), "8:10,15");
            assert_eq!(seq("3:*").intersect(&seq("5:*")).to_string(), "5:*");
            assert_eq!(seq("*").intersect(&seq("2:*")).to_string(), "*");
            assert!(seq("*").intersect(&seq("1:5")).is_empty());
        }

        #[test]
        fn resolve_against_exists() {
            assert_eq!(seq("1:5,7,9:*").resolve(12).to_string(), "1:5,7,9:12");
            assert_eq!(seq("9:*").resolve(4).to_string(), "4:9");
            assert_eq!(seq("2,*").resolve(2).to_string(), "2");
            assert!(seq("*").resolve(0).is_empty());
        }

        #[test]
        fn from_search_results() {
            let set: SequenceSet = [3, 1, 2, 8, 9, 5]
                .into_iter()
                .filter_map(SeqNum::new)
                .collect();
            assert_eq!(set.to_string(), "1:3,5,8:9");
            let values: Vec<u32> = set.iter().map(SeqNum::get).collect();
            assert_eq!(values, vec![1, 2, 3, 5, 8, 9]);
        }

        #[test]
        fn constructors() {
            assert_eq!(SequenceSet::range(10, 2).unwrap().to_string(), "2:10");
            assert!(SequenceSet::single(0).is_none());
            assert_eq!(SequenceSet::all().to_string(), "1:*");
            assert_eq!(UidSet::last().to_string(), "*");
            assert_eq!(format!("{:?}", UidSet::from_start(4).unwrap()), "UidSet(4:*)");
        }
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        fn element() -> impl Strategy<Value = String> {
            prop_oneof![
                (1u32..500).prop_map(|n| n.to_string()),
                (1u32..500, 0u32..50).prop_map(|(a, len)| format!("{a}:{}", a + len)),
                (1u32..500).prop_map(|n| format!("{n}:*")),
                Just("*".to_string()),
                (u32::MAX - 20..=u32::MAX).prop_map(|n| n.to_string()),
            ]
        }

        fn set_text() -> impl Strategy<Value = String> {
            prop::collection::vec(element(), 1..12).prop_map(|parts| parts.join(","))
        }

        proptest! {
            #[test]
            fn serialize_is_stable(text in set_text()) {
                let parsed = SequenceSet::parse(&text).unwrap();
                let reparsed = SequenceSet::parse(&parsed.serialize()).unwrap();
                prop_assert_eq!(&reparsed, &parsed);
                prop_assert_eq!(reparsed.serialize(), parsed.serialize());
            }

            #[test]
            fn normalized_ranges_are_disjoint(text in set_text()) {
                let parsed = SequenceSet::parse(&text).unwrap();
                for pair in parsed.ranges().windows(2) {
                    prop_assert!(pair[0].1.saturating_add(1) < pair[1].0);
                }
            }

            #[test]
            fn contains_matches_elements(values in prop::collection::vec(1u32..300, 1..40), probe in 1u32..300) {
                let set: SequenceSet = values.iter().copied().filter_map(SeqNum::new).collect();
                prop_assert_eq!(set.contains(probe), values.contains(&probe));
            }

            #[test]
            fn union_and_intersect_agree_with_membership(a in set_text(), b in set_text(), probe in 1u32..600) {
                let a = SequenceSet::parse(&a).unwrap().resolve(600);
                let b = SequenceSet::parse(&b).unwrap().resolve(600);
                prop_assert_eq!(a.union(&b).contains(probe), a.contains(probe) || b.contains(probe));
                prop_assert_eq!(a.intersect(&b).contains(probe), a.contains(probe) && b.contains(probe));
            }
        }
    }
}
