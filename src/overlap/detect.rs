// K-mer seed-and-chain overlap detection. For one query read: collect solid
// k-mer hits against every other read, bucket them per target, chain each
// bucket with a sparse dynamic program over colinear seed pairs, then keep
// the chains that survive the acceptance test and the per-target reduction.

use rustc_hash::FxHashMap;

use crate::asm_opt::{AsmOpt, MAX_LOOK_BACK, MAX_SECONDARY_OVLPS, MIN_KMER_SURV_RATE};
use crate::errors::AsmError;
use crate::index::vertex_index::VertexIndex;
use crate::overlap::range::OverlapRange;
use crate::seq::kmer::KmerIterator;
use crate::seq::read_store::{ReadId, ReadStore};
use crate::utils::median_i32;

/// One shared k-mer between the query and a target read.
#[derive(Debug, Clone, Copy)]
struct KmerMatch {
    cur_pos: i32,
    ext_pos: i32,
    ext_id: ReadId,
}

/// Result of one detector invocation.
pub struct SeqOverlaps {
    pub overlaps: Vec<OverlapRange>,
    /// True when a chain between the query and its own reverse complement
    /// passed the range and divergence tests: the classic signature of a
    /// chimeric (self-folded) read.
    pub suggest_chimeric: bool,
}

pub struct OverlapDetector<'a> {
    store: &'a ReadStore,
    index: &'a VertexIndex,
    kmer_size: usize,
    min_overlap: i32,
    max_jump: i32,
    max_overhang: i32,
    check_overhang: bool,
    max_cur_overlaps: i32,
    keep_alignment: bool,
    ovlp_divergence: f32,
}

impl<'a> OverlapDetector<'a> {
    pub fn new(
        store: &'a ReadStore,
        index: &'a VertexIndex,
        opt: &AsmOpt,
    ) -> Result<Self, AsmError> {
        opt.validate()?;
        Ok(OverlapDetector {
            store,
            index,
            kmer_size: opt.kmer_size,
            min_overlap: opt.min_overlap,
            max_jump: opt.max_jump,
            max_overhang: opt.max_overhang,
            check_overhang: opt.check_overhang,
            max_cur_overlaps: opt.max_cur_overlaps,
            keep_alignment: opt.keep_alignment,
            ovlp_divergence: opt.ovlp_divergence,
        })
    }

    /// Find every overlap of `query_id` against the indexed read set.
    ///
    /// With `unique_extensions` only the best-scoring chain per target is
    /// reported; otherwise chains are split into primaries and capped
    /// secondaries. Pure over the index snapshot: no retries, and the only
    /// failure modes are an empty query or a corrupted k-mer index.
    pub fn get_seq_overlaps(
        &self,
        query_id: ReadId,
        unique_extensions: bool,
    ) -> Result<SeqOverlaps, AsmError> {
        let query_seq = self.store.get_seq(query_id);
        if query_seq.is_empty() {
            return Err(AsmError::EmptyQuery(self.store.name(query_id).to_string()));
        }
        let cur_len = query_seq.len() as i32;
        let kmer_size = self.kmer_size as i32;
        let mut suggest_chimeric = false;

        // Phase 1: seed collection. One hit-count slot per stranded read,
        // saturating at u8::MAX; a query k-mer contributes at most one count
        // per target read, both strands taken together.
        let mut seq_hit_count = vec![0u8; self.store.max_seq_id()];
        let mut matches: Vec<KmerMatch> = Vec::new();

        for kp in KmerIterator::new(query_seq, self.kmer_size) {
            if !self.index.is_solid(kp.kmer) {
                continue;
            }
            let mut prev_seq_id = ReadId::NONE;
            for hit in self.index.iter_kmer_pos(kp.kmer) {
                // no trivial self-matches
                if hit.read_id == query_id && hit.position == kp.position {
                    continue;
                }
                let ext_seq_len = self.store.seq_len(hit.read_id);
                if hit.position < 0 || hit.position + kmer_size > ext_seq_len {
                    return Err(AsmError::IndexInconsistency {
                        read: self.store.name(hit.read_id).to_string(),
                        position: hit.position,
                        seq_len: ext_seq_len,
                    });
                }
                if prev_seq_id != hit.read_id && prev_seq_id != hit.read_id.rc() {
                    let count = &mut seq_hit_count[hit.read_id.raw_id()];
                    *count = count.saturating_add(1);
                }
                prev_seq_id = hit.read_id;

                matches.push(KmerMatch {
                    cur_pos: kp.position,
                    ext_pos: hit.position,
                    ext_id: hit.read_id,
                });
            }
        }

        // Phase 2: bucket matches per target, dropping targets with too few
        // shared k-mers to ever reach the minimum overlap.
        let min_hits = MIN_KMER_SURV_RATE * self.min_overlap as f32;
        let mut seq_matches: FxHashMap<ReadId, Vec<KmerMatch>> = FxHashMap::default();
        for m in matches {
            let count = seq_hit_count[m.ext_id.raw_id()];
            if (count as f32) < min_hits {
                continue;
            }
            seq_matches
                .entry(m.ext_id)
                .or_insert_with(|| Vec::with_capacity(count as usize))
                .push(m);
        }

        // Targets are processed in ascending raw-id order so the per-query
        // cap cuts off deterministically; each bucket is dropped as soon as
        // its chains are emitted.
        let mut target_ids: Vec<ReadId> = seq_matches.keys().copied().collect();
        target_ids.sort_unstable();

        let mut detected: Vec<OverlapRange> = Vec::new();
        for ext_id in target_ids {
            let match_list = match seq_matches.remove(&ext_id) {
                Some(list) => list,
                None => continue,
            };
            let ext_overlaps = self.chain_target_matches(
                query_id,
                cur_len,
                ext_id,
                &match_list,
                &mut suggest_chimeric,
            );
            detected.extend(Self::reduce_target_overlaps(
                ext_overlaps,
                kmer_size,
                unique_extensions,
            ));

            if self.max_cur_overlaps > 0 && detected.len() > self.max_cur_overlaps as usize {
                break;
            }
        }

        Ok(SeqOverlaps {
            overlaps: detected,
            suggest_chimeric,
        })
    }

    /// Phases 3-6 for one target: pre-filter the bucket, chain it with the
    /// sparse DP, backtrack every chain and keep those passing the
    /// acceptance test.
    fn chain_target_matches(
        &self,
        query_id: ReadId,
        cur_len: i32,
        ext_id: ReadId,
        matches: &[KmerMatch],
        suggest_chimeric: &mut bool,
    ) -> Vec<OverlapRange> {
        let kmer_size = self.kmer_size as i32;
        let ext_len = self.store.seq_len(ext_id);

        // Pre-filter: matches arrive in ascending query order, so the query
        // extent is just first-to-last.
        let min_cur = matches[0].cur_pos;
        let max_cur = matches[matches.len() - 1].cur_pos;
        let mut min_ext = i32::MAX;
        let mut max_ext = i32::MIN;
        for m in matches {
            min_ext = min_ext.min(m.ext_pos);
            max_ext = max_ext.max(m.ext_pos);
        }
        if max_cur - min_cur < self.min_overlap || max_ext - min_ext < self.min_overlap {
            return Vec::new();
        }
        if self.check_overhang {
            if min_cur.min(min_ext) > self.max_overhang {
                return Vec::new();
            }
            if (cur_len - max_cur).min(ext_len - max_ext) > self.max_overhang {
                return Vec::new();
            }
        }

        // Colinear chaining DP. For each match, scan predecessors backwards
        // within the jump window; duplicates on the same query position are
        // skipped wholesale since their query delta would be zero.
        let n = matches.len();
        let mut score_table = vec![0i32; n];
        let mut backtrack = vec![-1i32; n];
        let mut skip_cur_pos = 0i32;
        let mut skip_cur_id = 0usize;

        for i in 1..n {
            let cur_next = matches[i].cur_pos;
            let ext_next = matches[i].ext_pos;
            let mut max_score = 0i32;
            let mut max_id = 0usize;
            let mut no_improvement = 0i32;

            if cur_next != skip_cur_pos {
                skip_cur_pos = cur_next;
                skip_cur_id = i - 1;
            }

            for j in (0..=skip_cur_id).rev() {
                let cur_prev = matches[j].cur_pos;
                let ext_prev = matches[j].ext_pos;
                let cur_jump = cur_next - cur_prev;
                let ext_jump = ext_next - ext_prev;
                if 0 < cur_jump
                    && cur_jump < self.max_jump
                    && 0 < ext_jump
                    && ext_jump < self.max_jump
                {
                    let match_score = cur_jump.min(ext_jump).min(kmer_size);
                    let jump_div = (cur_jump - ext_jump).abs();
                    let gap_cost = if jump_div != 0 {
                        (0.01f32 * kmer_size as f32 * jump_div as f32
                            + (jump_div as f32).log2()) as i32
                    } else {
                        0
                    };
                    let next_score = score_table[j] + match_score - gap_cost;
                    if next_score > max_score {
                        max_score = next_score;
                        max_id = j;
                        no_improvement = 0;
                    } else {
                        no_improvement += 1;
                        if no_improvement > MAX_LOOK_BACK {
                            break;
                        }
                    }
                }
                if cur_next - cur_prev > self.max_jump {
                    break;
                }
            }

            score_table[i] = max_score.max(kmer_size);
            if max_score > 0 {
                backtrack[i] = max_id as i32;
            }
        }

        // Backtracking: walk chain starts from the highest index down,
        // consuming every index a chain passes through.
        let mut consumed = vec![false; n];
        let mut ext_overlaps: Vec<OverlapRange> = Vec::new();

        for chain_start in (1..n).rev() {
            if consumed[chain_start] {
                continue;
            }

            let last_match = matches[chain_start];
            let mut first_match = last_match;
            let mut shifts: Vec<i32> = Vec::new();
            let mut kmer_matches: Vec<(i32, i32)> = Vec::new();
            let mut total_match = kmer_size;

            let mut pos = chain_start as i32;
            while pos != -1 {
                let p = pos as usize;
                let m = matches[p];
                first_match = m;
                shifts.push(m.cur_pos - m.ext_pos);

                let prev_pos = backtrack[p];
                if prev_pos != -1 {
                    let pm = matches[prev_pos as usize];
                    total_match += (m.cur_pos - pm.cur_pos)
                        .min(m.ext_pos - pm.ext_pos)
                        .min(kmer_size);
                }
                if self.keep_alignment {
                    let keep = match kmer_matches.last() {
                        None => true,
                        Some(&(last_cur, _)) => last_cur - m.cur_pos > kmer_size,
                    };
                    if keep {
                        kmer_matches.push((m.cur_pos, m.ext_pos));
                    }
                }

                consumed[p] = true;
                backtrack[p] = -1;
                pos = prev_pos;
            }
            kmer_matches.reverse();

            let mut ovlp = OverlapRange::new(
                query_id,
                ext_id,
                first_match.cur_pos,
                first_match.ext_pos,
                cur_len,
                ext_len,
            );
            ovlp.cur_end = last_match.cur_pos + kmer_size - 1;
            ovlp.ext_end = last_match.ext_pos + kmer_size - 1;
            ovlp.left_shift = median_i32(&mut shifts);
            ovlp.right_shift = ext_len - cur_len + ovlp.left_shift;
            ovlp.score = score_table[chain_start];
            ovlp.kmer_matches = kmer_matches;

            if total_match as f32 > MIN_KMER_SURV_RATE * ovlp.cur_range() as f32
                && self.overlap_test(&ovlp, suggest_chimeric)
            {
                ext_overlaps.push(ovlp);
            }
        }

        ext_overlaps
    }

    /// Acceptance test for an emitted chain: minimum span on both reads,
    /// bounded length divergence, and (optionally) bounded end overhangs.
    /// A chain against the query's own reverse complement that reaches the
    /// overhang check flags the read as a chimera candidate even when the
    /// overhang test then rejects it.
    pub(crate) fn overlap_test(&self, ovlp: &OverlapRange, suggest_chimeric: &mut bool) -> bool {
        if ovlp.cur_range() < self.min_overlap || ovlp.ext_range() < self.min_overlap {
            return false;
        }

        let length_diff = (ovlp.cur_range() - ovlp.ext_range()).abs() as f32;
        let mean_length = (ovlp.cur_range() + ovlp.ext_range()) as f32 / 2.0;
        if length_diff > mean_length * self.ovlp_divergence {
            return false;
        }

        if ovlp.cur_id == ovlp.ext_id.rc() {
            *suggest_chimeric = true;
        }

        if self.check_overhang {
            if ovlp.cur_begin.min(ovlp.ext_begin) > self.max_overhang {
                return false;
            }
            if (ovlp.cur_len - ovlp.cur_end).min(ovlp.ext_len - ovlp.ext_end) > self.max_overhang {
                return false;
            }
        }

        true
    }

    /// Phase 7: per-target reduction. Either keep only the best chain, or
    /// split chains into primaries and secondaries: a chain whose target
    /// interval is covered by a primary up to less than one k-mer is
    /// contained (dropped); a chain sharing more than half its target
    /// interval with a primary becomes that primary's secondary, capped at
    /// `MAX_SECONDARY_OVLPS`; everything else starts a new primary.
    pub(crate) fn reduce_target_overlaps(
        mut ext_overlaps: Vec<OverlapRange>,
        kmer_size: i32,
        unique_extensions: bool,
    ) -> Vec<OverlapRange> {
        if unique_extensions {
            let mut best: Option<OverlapRange> = None;
            for ovlp in ext_overlaps {
                let replace = match &best {
                    Some(b) => ovlp.score > b.score,
                    None => true,
                };
                if replace {
                    best = Some(ovlp);
                }
            }
            return best.into_iter().collect();
        }

        // Deterministic order: score descending, coordinates as tie-break.
        ext_overlaps.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(a.cur_begin.cmp(&b.cur_begin))
                .then(a.ext_begin.cmp(&b.ext_begin))
        });

        let mut primaries: Vec<(OverlapRange, usize)> = Vec::new();
        let mut secondaries: Vec<OverlapRange> = Vec::new();
        for ovlp in ext_overlaps {
            let mut contained = false;
            let mut assigned_primary: Option<usize> = None;
            for (idx, (primary, _)) in primaries.iter().enumerate() {
                let intersect = ovlp.ext_intersect(primary);
                if ovlp.ext_range() - intersect < kmer_size {
                    contained = true;
                    break;
                }
                if intersect > ovlp.ext_range() / 2 {
                    assigned_primary = Some(idx);
                }
            }
            if contained {
                continue;
            }
            match assigned_primary {
                None => primaries.push((ovlp, 0)),
                Some(idx) => {
                    if primaries[idx].1 < MAX_SECONDARY_OVLPS {
                        secondaries.push(ovlp);
                        primaries[idx].1 += 1;
                    }
                }
            }
        }

        let mut result: Vec<OverlapRange> =
            primaries.into_iter().map(|(ovlp, _)| ovlp).collect();
        result.extend(secondaries);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_genome(seed: u64, len: usize) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
    }

    fn test_opt(min_overlap: i32) -> AsmOpt {
        AsmOpt {
            kmer_size: 15,
            min_kmer_coverage: 1,
            max_kmer_coverage: 10_000,
            min_overlap,
            max_jump: 1500,
            max_overhang: 1500,
            check_overhang: true,
            max_cur_overlaps: 0,
            keep_alignment: false,
            ovlp_divergence: 0.25,
            n_threads: 1,
        }
    }

    fn make_range(
        score: i32,
        ext_begin: i32,
        ext_end: i32,
    ) -> OverlapRange {
        let mut ovlp = OverlapRange::new(
            ReadId::forward(0),
            ReadId::forward(1),
            ext_begin,
            ext_begin,
            2000,
            2000,
        );
        ovlp.cur_end = ext_end;
        ovlp.ext_end = ext_end;
        ovlp.score = score;
        ovlp
    }

    #[test]
    fn test_detects_perfect_overlap_coordinates() {
        let genome = random_genome(7, 1600);
        let mut store = ReadStore::new();
        let a = store.add_read("A", &genome[0..1000]);
        let b = store.add_read("B", &genome[400..1400]);

        let opt = test_opt(200);
        let index = VertexIndex::build(&store, 15, 1, 10_000);
        let detector = OverlapDetector::new(&store, &index, &opt).unwrap();

        let result = detector.get_seq_overlaps(a, false).unwrap();
        assert!(!result.suggest_chimeric);
        assert_eq!(result.overlaps.len(), 1);

        let ovlp = &result.overlaps[0];
        assert_eq!(ovlp.cur_id, a);
        assert_eq!(ovlp.ext_id, b);
        assert_eq!(ovlp.cur_begin, 400);
        assert_eq!(ovlp.cur_end, 999);
        assert_eq!(ovlp.ext_begin, 0);
        assert_eq!(ovlp.ext_end, 599);
        assert_eq!(ovlp.left_shift, 400);
        assert_eq!(ovlp.right_shift, 400);
        assert!(ovlp.score >= 200);
    }

    #[test]
    fn test_short_shared_region_rejected() {
        let genome = random_genome(11, 1600);
        let mut store = ReadStore::new();
        let a = store.add_read("A", &genome[0..1000]);
        store.add_read("B", &genome[900..1600]); // only 100 bp shared

        let opt = test_opt(200);
        let index = VertexIndex::build(&store, 15, 1, 10_000);
        let detector = OverlapDetector::new(&store, &index, &opt).unwrap();

        let result = detector.get_seq_overlaps(a, false).unwrap();
        assert!(result.overlaps.is_empty());
    }

    #[test]
    fn test_keep_alignment_retains_thinned_anchors() {
        let genome = random_genome(13, 1600);
        let mut store = ReadStore::new();
        let a = store.add_read("A", &genome[0..1000]);
        store.add_read("B", &genome[400..1400]);

        let mut opt = test_opt(200);
        opt.keep_alignment = true;
        let index = VertexIndex::build(&store, 15, 1, 10_000);
        let detector = OverlapDetector::new(&store, &index, &opt).unwrap();

        let result = detector.get_seq_overlaps(a, false).unwrap();
        assert_eq!(result.overlaps.len(), 1);
        let anchors = &result.overlaps[0].kmer_matches;
        assert!(!anchors.is_empty());
        // ascending and thinned: successive anchors more than one k apart
        for pair in anchors.windows(2) {
            assert!(pair[1].0 - pair[0].0 > 15);
            assert_eq!(pair[1].0 - pair[1].1, 400); // constant diagonal
        }
    }

    #[test]
    fn test_self_rc_overlap_suggests_chimeric() {
        // A read whose tail is the reverse complement of its head overlaps
        // its own rc strand.
        let genome = random_genome(17, 600);
        let mut palindrome = genome.clone();
        let rc: Vec<u8> = crate::seq::read_store::reverse_complement(&genome);
        palindrome.extend_from_slice(&rc);

        let mut store = ReadStore::new();
        let x = store.add_read("X", &palindrome);

        let opt = test_opt(200);
        let index = VertexIndex::build(&store, 15, 1, 10_000);
        let detector = OverlapDetector::new(&store, &index, &opt).unwrap();

        let result = detector.get_seq_overlaps(x, false).unwrap();
        assert!(result.suggest_chimeric);
    }

    #[test]
    fn test_reduce_drops_contained_chain() {
        let primary = make_range(100, 0, 500);
        let contained = make_range(50, 100, 480);
        let kept = OverlapDetector::reduce_target_overlaps(
            vec![primary.clone(), contained],
            15,
            false,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0], primary);
    }

    #[test]
    fn test_reduce_caps_secondaries() {
        // 1 primary plus 7 partially overlapping chains: 5 secondaries kept
        let mut chains = vec![make_range(100, 0, 1000)];
        for i in 0..7 {
            chains.push(make_range(90 - i, 300, 1200));
        }
        let kept = OverlapDetector::reduce_target_overlaps(chains, 15, false);
        assert_eq!(kept.len(), 6);
        // primary first, best secondary right after
        assert_eq!(kept[0].score, 100);
        assert_eq!(kept[1].score, 90);
    }

    #[test]
    fn test_reduce_disjoint_chains_are_both_primary() {
        let first = make_range(100, 0, 500);
        let second = make_range(60, 900, 1500);
        let kept =
            OverlapDetector::reduce_target_overlaps(vec![first, second], 15, false);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_reduce_unique_extensions_keeps_best() {
        let chains = vec![
            make_range(50, 0, 500),
            make_range(100, 900, 1500),
            make_range(80, 200, 800),
        ];
        let kept = OverlapDetector::reduce_target_overlaps(chains, 15, true);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].score, 100);
    }

    #[test]
    fn test_overlap_test_divergence_bound() {
        let mut store = ReadStore::new();
        store.add_read("A", b"ACGT");
        store.add_read("B", b"ACGT");
        let opt = test_opt(200);
        let index = VertexIndex::build(&store, 15, 1, 10);
        let detector = OverlapDetector::new(&store, &index, &opt).unwrap();

        let mut chimeric = false;
        // 400 vs 900 spans: divergence way over 25% of the mean
        let mut ovlp = OverlapRange::new(
            ReadId::forward(0),
            ReadId::forward(1),
            0,
            0,
            1000,
            1000,
        );
        ovlp.cur_end = 400;
        ovlp.ext_end = 900;
        assert!(!detector.overlap_test(&ovlp, &mut chimeric));

        // balanced spans pass
        ovlp.cur_end = 880;
        assert!(detector.overlap_test(&ovlp, &mut chimeric));
    }

    #[test]
    fn test_overlap_test_overhang_bound() {
        let mut store = ReadStore::new();
        store.add_read("A", b"ACGT");
        store.add_read("B", b"ACGT");
        let mut opt = test_opt(200);
        opt.max_overhang = 100;
        let index = VertexIndex::build(&store, 15, 1, 10);
        let detector = OverlapDetector::new(&store, &index, &opt).unwrap();

        let mut chimeric = false;
        // both reads hang over by 300 on the left: not a dovetail
        let mut ovlp = OverlapRange::new(
            ReadId::forward(0),
            ReadId::forward(1),
            300,
            300,
            1000,
            1000,
        );
        ovlp.cur_end = 1000;
        ovlp.ext_end = 1000;
        assert!(!detector.overlap_test(&ovlp, &mut chimeric));

        // one read reaching its end makes it a proper dovetail
        ovlp.cur_begin = 0;
        ovlp.cur_end = 700;
        assert!(detector.overlap_test(&ovlp, &mut chimeric));
    }
}
