//! Combines raw per-method findings into one canonical, non-overlapping
//! finding set for a text block.
//!
//! The merge is order-independent: running the detection methods in any
//! order, or concurrently, pools into the identical final set. Decisions are
//! structural (span length, then method priority); confidence is never
//! consulted, keeping the merge deterministic and auditable.

use std::cmp::Ordering;

use super::types::{Finding, FindingSet};

/// Merge raw findings pooled across all methods for a single block.
///
/// 1. Sort by start ascending, end descending (longer span first at the
///    same start), then by method priority, then remaining fields, for a total
///    order, so the pooled input order is irrelevant.
/// 2. Sweep left to right; on overlap keep the longer span, ties broken by
///    method priority (enterprise > statistical > pattern).
pub fn merge_findings(mut raw: Vec<Finding>) -> FindingSet {
    raw.sort_by(compare_raw);

    let mut kept: Vec<Finding> = Vec::with_capacity(raw.len());
    for finding in raw {
        match kept.last() {
            Some(last) if finding.overlaps(last) => {
                if prefer_challenger(&finding, last) {
                    // Replacing is safe: finding.start >= last.start, and the
                    // kept list is non-overlapping, so the challenger cannot
                    // reach back into the entry before `last`.
                    if let Some(slot) = kept.last_mut() {
                        *slot = finding;
                    }
                }
            }
            _ => kept.push(finding),
        }
    }

    FindingSet(kept)
}

fn compare_raw(a: &Finding, b: &Finding) -> Ordering {
    a.start
        .cmp(&b.start)
        .then(b.end.cmp(&a.end))
        .then(b.method.priority().cmp(&a.method.priority()))
        .then(a.entity_type.cmp(&b.entity_type))
}

/// True when the challenger should replace the currently kept finding.
fn prefer_challenger(challenger: &Finding, kept: &Finding) -> bool {
    match challenger.len().cmp(&kept.len()) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => challenger.method.priority() > kept.method.priority(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::types::{DetectionMethod, EntityType};

    fn raw(
        entity: EntityType,
        start: usize,
        end: usize,
        method: DetectionMethod,
    ) -> Finding {
        Finding {
            entity_type: entity,
            start,
            end,
            text: "x".repeat(end - start),
            confidence: 0.5,
            method,
        }
    }

    fn spans(set: &FindingSet) -> Vec<(usize, usize, DetectionMethod)> {
        set.iter().map(|f| (f.start, f.end, f.method)).collect()
    }

    #[test]
    fn non_overlapping_findings_all_survive() {
        let merged = merge_findings(vec![
            raw(EntityType::EmailAddress, 0, 5, DetectionMethod::Pattern),
            raw(EntityType::PhoneNumber, 10, 20, DetectionMethod::Pattern),
            raw(EntityType::Ssn, 25, 34, DetectionMethod::Statistical),
        ]);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn longer_span_wins_regardless_of_method() {
        // An enterprise finding covering the phone number plus a trailing
        // name beats the shorter pattern finding of the number alone.
        let merged = merge_findings(vec![
            raw(EntityType::PhoneNumber, 8, 20, DetectionMethod::Pattern),
            raw(EntityType::Person, 8, 28, DetectionMethod::Enterprise),
        ]);
        assert_eq!(spans(&merged), vec![(8, 28, DetectionMethod::Enterprise)]);
    }

    #[test]
    fn longer_pattern_span_beats_shorter_enterprise_span() {
        let merged = merge_findings(vec![
            raw(EntityType::CreditCard, 0, 19, DetectionMethod::Pattern),
            raw(EntityType::Ssn, 0, 11, DetectionMethod::Enterprise),
        ]);
        assert_eq!(spans(&merged), vec![(0, 19, DetectionMethod::Pattern)]);
    }

    #[test]
    fn equal_spans_resolved_by_method_priority() {
        let merged = merge_findings(vec![
            raw(EntityType::PhoneNumber, 0, 12, DetectionMethod::Pattern),
            raw(EntityType::PhoneNumber, 0, 12, DetectionMethod::Statistical),
            raw(EntityType::PhoneNumber, 0, 12, DetectionMethod::Enterprise),
        ]);
        assert_eq!(spans(&merged), vec![(0, 12, DetectionMethod::Enterprise)]);
    }

    #[test]
    fn merge_is_order_independent() {
        let pool = vec![
            raw(EntityType::EmailAddress, 0, 16, DetectionMethod::Pattern),
            raw(EntityType::Person, 10, 30, DetectionMethod::Statistical),
            raw(EntityType::PhoneNumber, 28, 40, DetectionMethod::Pattern),
            raw(EntityType::Person, 28, 40, DetectionMethod::Enterprise),
            raw(EntityType::Ssn, 50, 59, DetectionMethod::Pattern),
        ];

        let baseline = spans(&merge_findings(pool.clone()));

        // Try every rotation and the reverse; the pooled order must not
        // change the outcome.
        for rotation in 0..pool.len() {
            let mut permuted = pool.clone();
            permuted.rotate_left(rotation);
            assert_eq!(spans(&merge_findings(permuted)), baseline);
        }
        let mut reversed = pool.clone();
        reversed.reverse();
        assert_eq!(spans(&merge_findings(reversed)), baseline);
    }

    #[test]
    fn chained_overlaps_resolve_left_to_right() {
        // [0,10) overlaps [5,25) overlaps [20,30): the long middle span
        // absorbs the first, then beats the third.
        let merged = merge_findings(vec![
            raw(EntityType::Person, 0, 10, DetectionMethod::Pattern),
            raw(EntityType::Person, 5, 25, DetectionMethod::Pattern),
            raw(EntityType::Person, 20, 30, DetectionMethod::Pattern),
        ]);
        assert_eq!(spans(&merged), vec![(5, 25, DetectionMethod::Pattern)]);
    }

    #[test]
    fn result_is_sorted_and_non_overlapping() {
        let merged = merge_findings(vec![
            raw(EntityType::Url, 40, 60, DetectionMethod::Pattern),
            raw(EntityType::EmailAddress, 0, 10, DetectionMethod::Pattern),
            raw(EntityType::Person, 5, 20, DetectionMethod::Enterprise),
            raw(EntityType::PhoneNumber, 55, 70, DetectionMethod::Statistical),
        ]);
        let all = merged.as_slice();
        for pair in all.windows(2) {
            assert!(pair[0].start <= pair[1].start);
            assert!(pair[0].end <= pair[1].start, "overlap survived the merge");
        }
    }

    #[test]
    fn empty_pool_yields_empty_set() {
        assert!(merge_findings(Vec::new()).is_empty());
    }
}
