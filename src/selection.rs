//! Choosing one instance out of the validated candidates.

use std::path::Path;

use crate::instance::{same_location, InstanceRecord};

/// Constraints applied when choosing an instance.
#[derive(Debug, Clone, Copy)]
pub struct SelectionCriteria<'a> {
    /// Major version a candidate must have, unless a location is pinned.
    pub required_major: u16,
    /// Pinned installation root. Wins over any version comparison.
    pub install_location: Option<&'a Path>,
    /// `Common7/Tools` directory named by the `VS<major>0COMNTOOLS` hint.
    pub common_tools_hint: Option<&'a Path>,
}

impl<'a> SelectionCriteria<'a> {
    pub fn for_major(required_major: u16) -> Self {
        SelectionCriteria {
            required_major,
            install_location: None,
            common_tools_hint: None,
        }
    }
}

/// Pick the instance to use.
///
/// 1. With a pinned location, the first candidate at that location.
/// 2. Otherwise only candidates of the required major are considered; one
///    whose `Common7/Tools` matches the hint is taken directly.
/// 3. Otherwise the highest packed version wins; on a tie the candidate seen
///    first is kept.
pub fn choose<'r>(
    candidates: &'r [InstanceRecord],
    criteria: &SelectionCriteria<'_>,
) -> Option<&'r InstanceRecord> {
    if let Some(location) = criteria.install_location {
        return candidates.iter().find(|c| c.is_located_at(location));
    }

    let matching = candidates
        .iter()
        .filter(|c| c.numeric_version().major() == criteria.required_major);

    if let Some(hint) = criteria.common_tools_hint {
        let hinted: Vec<&InstanceRecord> = matching.collect();
        if let Some(found) = hinted.iter().find(|c| matches_common_tools(c, hint)) {
            return Some(*found);
        }
        return newest(hinted.into_iter());
    }

    newest(matching)
}

fn matches_common_tools(record: &InstanceRecord, hint: &Path) -> bool {
    let tools = record.install_location().join("Common7").join("Tools");
    same_location(&tools, hint)
}

fn newest<'r>(records: impl Iterator<Item = &'r InstanceRecord>) -> Option<&'r InstanceRecord> {
    records.reduce(|best, candidate| {
        if candidate.numeric_version() > best.numeric_version() {
            candidate
        } else {
            best
        }
    })
}
