// Concurrent cache over the overlap detector. During the all-vs-all phase a
// single mutex guards the shared index; each read id is computed at most
// once, with concurrent requesters parked on a condvar until the result is
// stored. Storing an overlap posts all four symmetric views (fwd, rev,
// complemented) so the detector never has to run from the target's side.
// After filtering, the index is frozen into a read-only structure with one
// interval tree per read for positional lookups.

use std::sync::{Condvar, Mutex, MutexGuard};

use bio::data_structures::interval_tree::IntervalTree;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::asm_opt::MAX_ENDS_DIFF;
use crate::errors::AsmError;
use crate::overlap::detect::OverlapDetector;
use crate::overlap::range::OverlapRange;
use crate::seq::read_store::{ReadId, ReadStore};

/// Array-backed disjoint-set union over overlap list indices.
pub(crate) struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    pub(crate) fn new(size: usize) -> Self {
        DisjointSet {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    pub(crate) fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            // path halving
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    pub(crate) fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        if self.rank[ra] < self.rank[rb] {
            self.parent[ra] = rb;
        } else if self.rank[ra] > self.rank[rb] {
            self.parent[rb] = ra;
        } else {
            self.parent[rb] = ra;
            self.rank[ra] += 1;
        }
    }
}

/// Cluster a read's overlaps: entries to the same target whose intervals
/// nearly coincide on both reads collapse to their best-scoring member.
/// The surviving list is sorted by query coordinates; applying the pass
/// twice is a no-op.
pub(crate) fn cluster_overlaps(overlaps: Vec<OverlapRange>) -> Vec<OverlapRange> {
    let n = overlaps.len();
    let mut dsu = DisjointSet::new(n);

    let close = |a: &OverlapRange, b: &OverlapRange| {
        a.cur_range() - a.cur_intersect(b) < MAX_ENDS_DIFF
            && a.ext_range() - a.ext_intersect(b) < MAX_ENDS_DIFF
    };
    for i in 0..n {
        for j in i + 1..n {
            if overlaps[i].ext_id != overlaps[j].ext_id {
                continue;
            }
            if close(&overlaps[i], &overlaps[j]) || close(&overlaps[j], &overlaps[i]) {
                dsu.union(i, j);
            }
        }
    }

    // best-scoring representative per cluster; score ties break on
    // coordinates so the result does not depend on merge order
    let sort_key =
        |o: &OverlapRange| (o.cur_begin, o.cur_end, o.ext_id.raw_id(), o.ext_begin, o.ext_end);
    let mut best_of: FxHashMap<usize, usize> = FxHashMap::default();
    for i in 0..n {
        let root = dsu.find(i);
        match best_of.get_mut(&root) {
            Some(best) => {
                let better = overlaps[i].score > overlaps[*best].score
                    || (overlaps[i].score == overlaps[*best].score
                        && sort_key(&overlaps[i]) < sort_key(&overlaps[*best]));
                if better {
                    *best = i;
                }
            }
            None => {
                best_of.insert(root, i);
            }
        }
    }

    let mut keep = vec![false; n];
    for &i in best_of.values() {
        keep[i] = true;
    }
    let mut result: Vec<OverlapRange> = overlaps
        .into_iter()
        .enumerate()
        .filter_map(|(i, o)| if keep[i] { Some(o) } else { None })
        .collect();
    result.sort_by_key(sort_key);
    result
}

/// The read-only overlap index produced once the all-vs-all phase is done:
/// per-read overlap lists plus an interval tree over query coordinates.
pub struct OverlapIndex {
    index: FxHashMap<ReadId, Vec<OverlapRange>>,
    trees: FxHashMap<ReadId, IntervalTree<i32, usize>>,
}

static NO_OVERLAPS: &[OverlapRange] = &[];

impl OverlapIndex {
    pub(crate) fn new(index: FxHashMap<ReadId, Vec<OverlapRange>>) -> Self {
        let mut trees = FxHashMap::default();
        for (&id, overlaps) in &index {
            let mut tree = IntervalTree::new();
            for (i, o) in overlaps.iter().enumerate() {
                tree.insert(o.cur_begin..o.cur_end, i);
            }
            trees.insert(id, tree);
        }
        OverlapIndex { index, trees }
    }

    /// All overlaps of a read, sorted by query begin position.
    pub fn overlaps(&self, id: ReadId) -> &[OverlapRange] {
        self.index.get(&id).map_or(NO_OVERLAPS, |v| v.as_slice())
    }

    /// Overlaps of `id` whose query interval intersects `[begin, end)`.
    pub fn find_intersecting(&self, id: ReadId, begin: i32, end: i32) -> Vec<&OverlapRange> {
        let (tree, overlaps) = match (self.trees.get(&id), self.index.get(&id)) {
            (Some(t), Some(o)) => (t, o),
            _ => return Vec::new(),
        };
        tree.find(begin..end)
            .map(|entry| &overlaps[*entry.data()])
            .collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = ReadId> + '_ {
        self.index.keys().copied()
    }

    pub fn total_overlaps(&self) -> usize {
        self.index.values().map(Vec::len).sum()
    }
}

#[derive(Default)]
struct SharedState {
    overlap_index: FxHashMap<ReadId, Vec<OverlapRange>>,
    cached: FxHashSet<ReadId>,
    suggested_chimeras: FxHashSet<ReadId>,
    in_progress: FxHashSet<ReadId>,
}

impl SharedState {
    /// Post an overlap batch under all four symmetric views. With `only_max`
    /// a target already present in the forward list is skipped, keeping only
    /// the first (best) overlap per target.
    fn store_overlaps(&mut self, overlaps: Vec<OverlapRange>, seq_id: ReadId, only_max: bool) {
        self.cached.insert(seq_id);
        self.cached.insert(seq_id.rc());

        let mut existing: FxHashSet<ReadId> = FxHashSet::default();
        if only_max {
            if let Some(fwd) = self.overlap_index.get(&seq_id) {
                for o in fwd {
                    existing.insert(o.ext_id);
                }
            }
        }

        for ovlp in overlaps {
            if only_max && existing.contains(&ovlp.ext_id) {
                continue;
            }
            let rev = ovlp.reverse();
            self.overlap_index
                .entry(seq_id.rc())
                .or_default()
                .push(ovlp.complement());
            self.overlap_index
                .entry(rev.cur_id.rc())
                .or_default()
                .push(rev.complement());
            self.overlap_index
                .entry(rev.cur_id)
                .or_default()
                .push(rev);
            self.overlap_index
                .entry(seq_id)
                .or_default()
                .push(ovlp);
        }
    }

    fn total_overlaps(&self) -> usize {
        self.overlap_index.values().map(Vec::len).sum()
    }
}

pub struct OverlapContainer<'a> {
    detector: &'a OverlapDetector<'a>,
    store: &'a ReadStore,
    only_max: bool,
    shared: Mutex<SharedState>,
    compute_done: Condvar,
    frozen: Option<OverlapIndex>,
}

impl<'a> OverlapContainer<'a> {
    pub fn new(detector: &'a OverlapDetector<'a>, store: &'a ReadStore, only_max: bool) -> Self {
        OverlapContainer {
            detector,
            store,
            only_max,
            shared: Mutex::new(SharedState::default()),
            compute_done: Condvar::new(),
            frozen: None,
        }
    }

    fn state(&self) -> MutexGuard<'_, SharedState> {
        self.shared.lock().expect("overlap index lock poisoned")
    }

    /// Uncached, direct detector invocation.
    pub fn seq_overlaps(&self, id: ReadId) -> Result<Vec<OverlapRange>, AsmError> {
        let result = self.detector.get_seq_overlaps(id, self.only_max)?;
        Ok(result.overlaps)
    }

    /// Compute `id` unless it is already cached. Exactly one thread runs the
    /// detector for a given id; concurrent callers block until the result is
    /// stored.
    fn compute_if_uncached(&self, id: ReadId, unique_extensions: bool) -> Result<(), AsmError> {
        {
            let mut state = self.state();
            loop {
                if state.cached.contains(&id) {
                    return Ok(());
                }
                if state.in_progress.contains(&id) {
                    state = self
                        .compute_done
                        .wait(state)
                        .expect("overlap index lock poisoned");
                } else {
                    state.in_progress.insert(id);
                    break;
                }
            }
        }

        // detector runs outside the lock
        let result = self.detector.get_seq_overlaps(id, unique_extensions);

        let mut state = self.state();
        state.in_progress.remove(&id);
        let outcome = match result {
            Ok(detected) => {
                if detected.suggest_chimeric {
                    state.suggested_chimeras.insert(id);
                    state.suggested_chimeras.insert(id.rc());
                }
                state.store_overlaps(detected.overlaps, id, self.only_max);
                Ok(())
            }
            Err(e) => Err(e),
        };
        self.compute_done.notify_all();
        outcome
    }

    /// Cached overlap lookup; computes via the detector on first use.
    pub fn lazy_seq_overlaps(&self, id: ReadId) -> Result<Vec<OverlapRange>, AsmError> {
        if let Some(frozen) = &self.frozen {
            return Ok(frozen.overlaps(id).to_vec());
        }
        self.compute_if_uncached(id, self.only_max)?;
        let state = self.state();
        Ok(state.overlap_index.get(&id).cloned().unwrap_or_default())
    }

    /// Did the detector flag this read as overlapping its own reverse
    /// complement? Ensures the read is cached first.
    pub fn has_self_overlaps(&self, id: ReadId) -> Result<bool, AsmError> {
        if self.frozen.is_none() {
            self.compute_if_uncached(id, self.only_max)?;
        }
        let state = self.state();
        Ok(state.suggested_chimeras.contains(&id))
    }

    /// All reads the detector flagged as chimera candidates (both strands).
    pub fn suggested_chimeras(&self) -> FxHashSet<ReadId> {
        self.state().suggested_chimeras.clone()
    }

    /// All-vs-all phase: compute overlaps for every stranded read in
    /// parallel, then collapse redundant entries. The first worker error is
    /// reported after the pool drains.
    pub fn find_all_overlaps(&self) -> Result<(), AsmError> {
        let all_queries: Vec<ReadId> = self.store.iter_ids().collect();
        let results: Vec<Result<(), AsmError>> = all_queries
            .par_iter()
            .map(|&id| self.compute_if_uncached(id, false))
            .collect();
        for result in results {
            result?;
        }

        log::info!("Found {} overlaps", self.state().total_overlaps());
        self.filter_overlaps();
        log::info!(
            "Left {} overlaps after filtering",
            self.state().total_overlaps()
        );
        Ok(())
    }

    /// Collapse near-identical overlaps per read and sort each list by query
    /// coordinates. Idempotent.
    pub fn filter_overlaps(&self) {
        let index = std::mem::take(&mut self.state().overlap_index);
        let entries: Vec<(ReadId, Vec<OverlapRange>)> = index.into_iter().collect();
        let filtered: Vec<(ReadId, Vec<OverlapRange>)> = entries
            .into_par_iter()
            .map(|(id, overlaps)| (id, cluster_overlaps(overlaps)))
            .collect();
        self.state().overlap_index = filtered.into_iter().collect();
    }

    /// Freeze the index and build one interval tree per read. After this
    /// call the overlap data is read-only and served without locking.
    pub fn build_interval_tree(&mut self) {
        log::debug!("Building interval trees");
        let state = self
            .shared
            .get_mut()
            .expect("overlap index lock poisoned");
        let index = std::mem::take(&mut state.overlap_index);
        self.frozen = Some(OverlapIndex::new(index));
    }

    /// The frozen overlap index. Panics if `build_interval_tree` has not run
    /// yet: querying a half-built index is a programming error.
    pub fn overlap_index(&self) -> &OverlapIndex {
        self.frozen
            .as_ref()
            .expect("overlap index queried before build_interval_tree()")
    }

    /// Overlaps of `id` intersecting the query interval `[begin, end)`.
    pub fn get_overlaps(&self, id: ReadId, begin: i32, end: i32) -> Vec<&OverlapRange> {
        self.overlap_index().find_intersecting(id, begin, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_overlap(
        cur_id: ReadId,
        ext_id: ReadId,
        cur_begin: i32,
        cur_end: i32,
        ext_begin: i32,
        ext_end: i32,
        score: i32,
    ) -> OverlapRange {
        let mut o = OverlapRange::new(cur_id, ext_id, cur_begin, ext_begin, 1000, 1000);
        o.cur_end = cur_end;
        o.ext_end = ext_end;
        o.left_shift = cur_begin - ext_begin;
        o.right_shift = o.left_shift;
        o.score = score;
        o
    }

    #[test]
    fn test_dsu_union_find() {
        let mut dsu = DisjointSet::new(5);
        dsu.union(0, 1);
        dsu.union(3, 4);
        assert_eq!(dsu.find(0), dsu.find(1));
        assert_eq!(dsu.find(3), dsu.find(4));
        assert_ne!(dsu.find(1), dsu.find(3));
        dsu.union(1, 3);
        assert_eq!(dsu.find(0), dsu.find(4));
        assert_ne!(dsu.find(2), dsu.find(0));
    }

    #[test]
    fn test_store_overlaps_posts_four_views() {
        let a = ReadId::forward(0);
        let b = ReadId::forward(1);
        let ovlp = make_overlap(a, b, 500, 999, 0, 499, 480);

        let mut state = SharedState::default();
        state.store_overlaps(vec![ovlp.clone()], a, false);

        assert!(state.cached.contains(&a));
        assert!(state.cached.contains(&a.rc()));
        assert_eq!(state.overlap_index[&a], vec![ovlp.clone()]);
        assert_eq!(state.overlap_index[&a.rc()], vec![ovlp.complement()]);
        assert_eq!(state.overlap_index[&b], vec![ovlp.reverse()]);
        assert_eq!(
            state.overlap_index[&b.rc()],
            vec![ovlp.reverse().complement()]
        );
    }

    #[test]
    fn test_store_overlaps_only_max_skips_known_target() {
        let a = ReadId::forward(0);
        let b = ReadId::forward(1);
        let first = make_overlap(a, b, 500, 999, 0, 499, 480);
        let second = make_overlap(a, b, 100, 400, 600, 900, 100);

        let mut state = SharedState::default();
        state.store_overlaps(vec![first.clone()], a, true);
        state.store_overlaps(vec![second], a, true);

        assert_eq!(state.overlap_index[&a], vec![first]);
    }

    #[test]
    fn test_cluster_keeps_best_of_near_duplicates() {
        let a = ReadId::forward(0);
        let b = ReadId::forward(1);
        let strong = make_overlap(a, b, 500, 999, 0, 499, 480);
        let shifted = make_overlap(a, b, 520, 999, 20, 499, 300);
        let elsewhere = make_overlap(a, b, 0, 300, 700, 1000, 200);

        let clustered = cluster_overlaps(vec![shifted, strong.clone(), elsewhere.clone()]);
        assert_eq!(clustered, vec![elsewhere, strong]);
    }

    #[test]
    fn test_cluster_is_idempotent() {
        let a = ReadId::forward(0);
        let b = ReadId::forward(1);
        let c = ReadId::forward(2);
        let overlaps = vec![
            make_overlap(a, b, 500, 999, 0, 499, 480),
            make_overlap(a, b, 530, 990, 30, 490, 300),
            make_overlap(a, c, 0, 400, 600, 1000, 350),
        ];
        let once = cluster_overlaps(overlaps);
        let twice = cluster_overlaps(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_cluster_sorts_by_query_begin() {
        let a = ReadId::forward(0);
        let b = ReadId::forward(1);
        let c = ReadId::forward(2);
        let late = make_overlap(a, b, 600, 999, 0, 399, 100);
        let early = make_overlap(a, c, 0, 400, 600, 1000, 100);
        let clustered = cluster_overlaps(vec![late.clone(), early.clone()]);
        assert_eq!(clustered, vec![early, late]);
    }

    #[test]
    fn test_interval_tree_lookup() {
        let a = ReadId::forward(0);
        let b = ReadId::forward(1);
        let c = ReadId::forward(2);
        let to_b = make_overlap(a, b, 100, 400, 0, 300, 100);
        let to_c = make_overlap(a, c, 350, 800, 0, 450, 150);

        let mut map = FxHashMap::default();
        map.insert(a, vec![to_b.clone(), to_c.clone()]);
        let index = OverlapIndex::new(map);

        let hits = index.find_intersecting(a, 0, 200);
        assert_eq!(hits, vec![&to_b]);

        let mut hits = index.find_intersecting(a, 380, 390);
        hits.sort_by_key(|o| o.cur_begin);
        assert_eq!(hits, vec![&to_b, &to_c]);

        assert!(index.find_intersecting(a, 900, 950).is_empty());
        assert!(index.find_intersecting(b, 0, 1000).is_empty());
    }
}
