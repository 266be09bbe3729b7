//! Optional version retention for the pool.
//!
//! By default every archive is published, so the repository keeps the full
//! version history. With a limit, only the newest `keep` versions of each
//! `(package, architecture)` pair survive, ordered the way dpkg orders
//! versions.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::pool::DebArchive;

/// Split archives into `(kept, dropped)`, keeping the newest `keep` versions
/// per package and architecture. Archives whose file name cannot be parsed
/// are always kept.
pub fn apply_retention(
    archives: Vec<DebArchive>,
    keep: usize,
) -> (Vec<DebArchive>, Vec<DebArchive>) {
    let mut groups: BTreeMap<(String, String), Vec<DebArchive>> = BTreeMap::new();
    let mut kept = Vec::new();

    for archive in archives {
        match &archive.ident {
            Some(ident) => groups
                .entry((ident.package.clone(), ident.arch.clone()))
                .or_default()
                .push(archive),
            None => kept.push(archive),
        }
    }

    let mut dropped = Vec::new();
    for (_, mut group) in groups {
        group.sort_by(|a, b| match (&a.ident, &b.ident) {
            (Some(a), Some(b)) => compare_versions(&b.version, &a.version),
            _ => Ordering::Equal,
        });
        let tail = group.split_off(keep.min(group.len()));
        kept.extend(group);
        dropped.extend(tail);
    }

    kept.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    dropped.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    (kept, dropped)
}

/// Compare two Debian version strings (`[epoch:]upstream[-revision]`).
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (a_epoch, a_upstream, a_revision) = split_version(a);
    let (b_epoch, b_upstream, b_revision) = split_version(b);

    a_epoch
        .cmp(&b_epoch)
        .then_with(|| compare_fragment(a_upstream, b_upstream))
        .then_with(|| compare_fragment(a_revision, b_revision))
}

fn split_version(v: &str) -> (u64, &str, &str) {
    let (epoch, rest) = match v.split_once(':') {
        Some((e, rest)) if !e.is_empty() && e.bytes().all(|c| c.is_ascii_digit()) => {
            (e.parse().unwrap_or(0), rest)
        }
        _ => (0, v),
    };
    match rest.rsplit_once('-') {
        Some((upstream, revision)) => (epoch, upstream, revision),
        None => (epoch, rest, ""),
    }
}

/// Sort weight of a non-digit byte: `~` sorts before everything, even the
/// end of the string; letters sort before other symbols.
fn order(c: Option<u8>) -> i32 {
    match c {
        None => 0,
        Some(b'~') => -1,
        Some(c) if c.is_ascii_digit() => 0,
        Some(c) if c.is_ascii_alphabetic() => i32::from(c),
        Some(c) => i32::from(c) + 256,
    }
}

fn compare_fragment(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0usize, 0usize);
    let digit_at = |s: &[u8], k: usize| s.get(k).is_some_and(|c| c.is_ascii_digit());

    while i < a.len() || j < b.len() {
        while (i < a.len() && !digit_at(a, i)) || (j < b.len() && !digit_at(b, j)) {
            let ac = order(a.get(i).copied());
            let bc = order(b.get(j).copied());
            if ac != bc {
                return ac.cmp(&bc);
            }
            i += 1;
            j += 1;
        }

        while i < a.len() && a[i] == b'0' {
            i += 1;
        }
        while j < b.len() && b[j] == b'0' {
            j += 1;
        }

        let mut first_diff = Ordering::Equal;
        while digit_at(a, i) && digit_at(b, j) {
            if first_diff == Ordering::Equal {
                first_diff = a[i].cmp(&b[j]);
            }
            i += 1;
            j += 1;
        }
        if digit_at(a, i) {
            return Ordering::Greater;
        }
        if digit_at(b, j) {
            return Ordering::Less;
        }
        if first_diff != Ordering::Equal {
            return first_diff;
        }
    }

    Ordering::Equal
}
