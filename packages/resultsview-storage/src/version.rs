//! Version-aware ordering of job names and run ids
//!
//! Embedded runs of ASCII digits compare numerically, everything else
//! compares byte-wise, so `job-2` sorts before `job-10` and `"2"` equals
//! `"02"`.
//!
//! ```rust
//! use std::cmp::Ordering;
//! use resultsview_storage::version_compare;
//!
//! assert_eq!(version_compare("job-2", "job-10"), Ordering::Less);
//! assert_eq!(version_compare("ab-0012-cd-0034", "ab-12-cd-34"), Ordering::Equal);
//! ```

use std::cmp::Ordering;

/// Compare two names, treating digit runs as numbers.
///
/// Both strings are scanned in lock-step. When the distance from the cursor
/// to the next digit run differs between the two strings, the names no longer
/// line up structurally and the unconsumed remainders are compared as plain
/// bytes instead.
pub fn version_compare(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let (s1, s2) = (a.as_bytes(), b.as_bytes());
    let (mut cur1, mut cur2) = (0, 0);

    loop {
        let token1 = next_digit_run(s1, cur1);
        let token2 = next_digit_run(s2, cur2);

        let digit1 = token1.map_or(s1.len(), |(start, _)| start);
        let digit2 = token2.map_or(s2.len(), |(start, _)| start);
        if digit1 - cur1 != digit2 - cur2 {
            return s1[cur1..].cmp(&s2[cur2..]);
        }

        match s1[cur1..digit1].cmp(&s2[cur2..digit2]) {
            Ordering::Equal => {}
            unequal => return unequal,
        }

        let ((start1, end1), (start2, end2)) = match (token1, token2) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(t1), Some(t2)) => (t1, t2),
        };

        match compare_digit_runs(&s1[start1..end1], &s2[start2..end2]) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
        cur1 = end1;
        cur2 = end2;
    }
}

/// Locate the next `[0-9]+` run at or after `from`, as a half-open range.
fn next_digit_run(s: &[u8], from: usize) -> Option<(usize, usize)> {
    let start = from + s[from..].iter().position(u8::is_ascii_digit)?;
    let end = start
        + s[start..]
            .iter()
            .position(|b| !b.is_ascii_digit())
            .unwrap_or(s.len() - start);
    Some((start, end))
}

/// Numeric comparison of two digit runs: the shorter one is left-padded with
/// zeros, then the first differing digit decides.
fn compare_digit_runs(d1: &[u8], d2: &[u8]) -> Ordering {
    let width = d1.len().max(d2.len());
    let padded1 = std::iter::repeat(&b'0').take(width - d1.len()).chain(d1);
    let padded2 = std::iter::repeat(&b'0').take(width - d2.len()).chain(d2);
    padded1
        .zip(padded2)
        .find(|(x, y)| x != y)
        .map_or(Ordering::Equal, |(x, y)| x.cmp(y))
}

/// Borrowed name ordered by [`version_compare`].
///
/// Lets version order plug into `sort`, `BTreeMap` keys and `max_by_key`.
#[derive(Debug, Clone, Copy)]
pub struct VersionOrdered<'a>(pub &'a str);

impl PartialEq for VersionOrdered<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionOrdered<'_> {}

impl PartialOrd for VersionOrdered<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionOrdered<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        version_compare(self.0, other.0)
    }
}
