use crate::geofile::feature::AttributeMap;

use super::candidates::JoinCandidate;

/// Pick exactly one attribute record per subject feature: the candidate with
/// the minimum numeric value of `rank_field` (lower rank = higher priority).
/// Candidates whose rank is not numeric are discarded. Rank ties resolve to
/// the lowest reference index. Subjects with no usable candidate get a clone
/// of `default`.
///
/// The returned vector always has exactly `num_subjects` entries, and each
/// entry is one candidate's record taken whole, never a mix of candidates.
pub fn resolve_by_rank(
    num_subjects: usize,
    candidates: &[JoinCandidate],
    rank_field: &str,
    default: &AttributeMap,
) -> Vec<AttributeMap> {
    let mut best: Vec<Option<&JoinCandidate>> = vec![None; num_subjects];
    for candidate in candidates {
        let Some(rank) = candidate
            .attributes
            .get(rank_field)
            .and_then(|value| value.as_f64())
        else {
            continue;
        };
        let slot = &mut best[candidate.subject_idx];
        let replace = match slot {
            None => true,
            Some(current) => {
                // Safe: a candidate only lands in `best` with a numeric rank.
                let current_rank = current
                    .attributes
                    .get(rank_field)
                    .and_then(|value| value.as_f64())
                    .unwrap();
                rank < current_rank
                    || (rank == current_rank && candidate.reference_idx < current.reference_idx)
            }
        };
        if replace {
            *slot = Some(candidate);
        }
    }
    best.into_iter()
        .map(|slot| match slot {
            Some(candidate) => candidate.attributes.clone(),
            None => default.clone(),
        })
        .collect()
}

/// Rank-free resolution for plain intersect joins: the candidate with the
/// lowest reference index wins; no candidate yields the default record.
pub fn resolve_first(
    num_subjects: usize,
    candidates: &[JoinCandidate],
    default: &AttributeMap,
) -> Vec<AttributeMap> {
    let mut best: Vec<Option<&JoinCandidate>> = vec![None; num_subjects];
    for candidate in candidates {
        let slot = &mut best[candidate.subject_idx];
        let replace = match slot {
            None => true,
            Some(current) => candidate.reference_idx < current.reference_idx,
        };
        if replace {
            *slot = Some(candidate);
        }
    }
    best.into_iter()
        .map(|slot| match slot {
            Some(candidate) => candidate.attributes.clone(),
            None => default.clone(),
        })
        .collect()
}
