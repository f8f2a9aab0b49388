//! Candidate selection: one winner per version group, newest groups first.
//!
//! Candidates are bucketed by the first `group_arity` components of their
//! version key (major.minor for PCSX2/RetroArch, major.minor.patch for
//! RPCS3, major alone for the wine family). Each bucket keeps its single
//! best candidate; the newest `count` buckets survive.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::catalog::ReleaseCandidate;

/// Select the best candidate from each of the newest `count` version groups.
///
/// Output is ordered by strictly descending group key and is bit-for-bit
/// identical for any permutation of the input: grouping uses an ordered map
/// and ties inside a group fall through version, build serial, and finally
/// the filename itself.
pub fn select(
    candidates: Vec<ReleaseCandidate>,
    group_arity: usize,
    count: usize,
) -> Vec<ReleaseCandidate> {
    let mut groups: BTreeMap<Vec<u64>, ReleaseCandidate> = BTreeMap::new();

    for candidate in candidates {
        let key = candidate.version.group_key(group_arity);
        match groups.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(candidate);
            }
            Entry::Occupied(mut slot) => {
                if beats(&candidate, slot.get(), group_arity) {
                    slot.insert(candidate);
                }
            }
        }
    }

    groups
        .into_values()
        .rev()
        .take(count)
        .collect()
}

/// Total order inside one group: version rest, then build serial, then
/// filename. The filename leg only matters when an upstream publishes two
/// identically-versioned assets; it exists to keep selection deterministic.
fn beats(challenger: &ReleaseCandidate, incumbent: &ReleaseCandidate, arity: usize) -> bool {
    let lhs = (
        challenger.version.rest(arity),
        challenger.version.build(),
        challenger.filename.as_str(),
    );
    let rhs = (
        incumbent.version.rest(arity),
        incumbent.version.build(),
        incumbent.filename.as_str(),
    );
    lhs > rhs
}
