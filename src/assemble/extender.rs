// Greedy contig extension over the frozen overlap index. Starting from the
// read with the most right extensions, repeatedly pick the next read by
// mutual support among the current extension candidates, marking both
// strands of every used read so each genomic region is covered once.

use rustc_hash::FxHashSet;

use crate::assemble::chimera::ChimeraDetector;
use crate::overlap::container::OverlapIndex;
use crate::overlap::range::OverlapRange;
use crate::seq::read_store::{ReadId, ReadStore};

/// An ordered chain of stranded reads tiling one genomic region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContigPath {
    pub reads: Vec<ReadId>,
    pub circular: bool,
}

pub struct Extender<'a> {
    overlap_index: &'a OverlapIndex,
    chimera: &'a ChimeraDetector,
    store: &'a ReadStore,
    visited_reads: FxHashSet<ReadId>,
    contig_paths: Vec<ContigPath>,
}

impl<'a> Extender<'a> {
    pub fn new(
        overlap_index: &'a OverlapIndex,
        chimera: &'a ChimeraDetector,
        store: &'a ReadStore,
    ) -> Self {
        Extender {
            overlap_index,
            chimera,
            store,
            visited_reads: FxHashSet::default(),
            contig_paths: Vec::new(),
        }
    }

    /// Does this overlap extend the current read to the right? True when the
    /// target has more sequence hanging past the overlap's right end than the
    /// current read does.
    fn is_proper_right_extension(ovlp: &OverlapRange) -> bool {
        ovlp.ext_len - ovlp.ext_end > ovlp.cur_len - ovlp.cur_end
    }

    fn is_proper_left_extension(ovlp: &OverlapRange) -> bool {
        ovlp.ext_begin > ovlp.cur_begin
    }

    /// Number of distinct reads that properly extend `read_id` to the right.
    /// Seed-selection heuristic only.
    pub fn count_right_extensions(&self, read_id: ReadId) -> usize {
        let mut extensions: FxHashSet<ReadId> = FxHashSet::default();
        for ovlp in self.overlap_index.overlaps(read_id) {
            if Self::is_proper_right_extension(ovlp) {
                extensions.insert(ovlp.ext_id);
            }
        }
        extensions.len()
    }

    /// One extension step to the right of `read_id`. Candidates are ranked
    /// by mutual support: how many of the other candidates confirm them from
    /// both sides. Reaching `start_read_id` again closes a cycle and
    /// short-circuits; ties are broken toward the smaller raw id.
    pub fn step_right(&self, read_id: ReadId, start_read_id: ReadId) -> ReadId {
        let mut extensions: FxHashSet<ReadId> = FxHashSet::default();
        for ovlp in self.overlap_index.overlaps(read_id) {
            if Self::is_proper_right_extension(ovlp) {
                extensions.insert(ovlp.ext_id);
            }
        }

        if extensions.contains(&start_read_id) {
            return start_read_id;
        }

        let mut candidates: Vec<ReadId> = extensions.iter().copied().collect();
        candidates.sort_unstable();

        let mut best_extension = ReadId::NONE;
        let mut max_support = -1i32;
        for candidate in candidates {
            if self.visited_reads.contains(&candidate) {
                continue;
            }
            let mut left_support = 0i32;
            let mut right_support = 0i32;
            for ovlp in self.overlap_index.overlaps(candidate) {
                if !extensions.contains(&ovlp.ext_id) {
                    continue;
                }
                if Self::is_proper_right_extension(ovlp) {
                    right_support += 1;
                }
                if Self::is_proper_left_extension(ovlp) {
                    left_support += 1;
                }
            }
            let support = left_support.min(right_support);
            log::trace!(
                "Candidate {}: left {} right {} support {}",
                self.store.name(candidate),
                left_support,
                right_support,
                support
            );
            if support > max_support {
                max_support = support;
                best_extension = candidate;
            }
        }

        if !best_extension.is_none() {
            if self.chimera.is_chimeric(best_extension) {
                log::debug!(
                    "Chimeric extension: {}",
                    self.store.name(best_extension)
                );
            }
            if self.branch_index(best_extension) < 0.5 {
                log::debug!(
                    "Branching extension: {}",
                    self.store.name(best_extension)
                );
            }
        }

        best_extension
    }

    /// Branching diagnostic: among the non-chimeric right extensions of
    /// `read_id`, the average fraction of candidates each candidate also
    /// overlaps. Close to 1 on a clean unique path, low at repeat-induced
    /// branch points. Observability only; never gates selection.
    pub fn branch_index(&self, read_id: ReadId) -> f32 {
        let overlaps = self.overlap_index.overlaps(read_id);
        let mut extensions: FxHashSet<ReadId> = FxHashSet::default();
        for ovlp in overlaps {
            if Self::is_proper_right_extension(ovlp) && !self.chimera.is_chimeric(ovlp.ext_id) {
                extensions.insert(ovlp.ext_id);
            }
        }
        if extensions.is_empty() {
            return 0.0;
        }

        let mut mutual_counts: Vec<usize> = Vec::new();
        for ovlp in overlaps {
            if !extensions.contains(&ovlp.ext_id) {
                continue;
            }
            let mut mutual = 0usize;
            for ext_ovlp in self.overlap_index.overlaps(ovlp.ext_id) {
                if extensions.contains(&ext_ovlp.ext_id) {
                    mutual += 1;
                }
            }
            mutual_counts.push(mutual);
        }

        let total: f32 = mutual_counts
            .iter()
            .map(|&mutual| (mutual + 1) as f32 / extensions.len() as f32)
            .sum();
        total / mutual_counts.len() as f32
    }

    /// Grow one contig path rightwards from `start_read` until it closes on
    /// itself (circular), runs into an already-used read (looped), or dies
    /// out (linear).
    pub fn extend_read(&mut self, start_read: ReadId) -> ContigPath {
        let mut path = ContigPath {
            reads: vec![start_read],
            circular: false,
        };
        self.visited_reads.insert(start_read);
        self.visited_reads.insert(start_read.rc());
        let mut cur_read = start_read;

        log::debug!("Start read: {}", self.store.name(start_read));

        loop {
            let ext_read = self.step_right(cur_read, start_read);

            if ext_read == start_read {
                log::debug!("Circular contig");
                path.circular = true;
                break;
            }
            if self.visited_reads.contains(&ext_read) {
                log::info!("Looped contig");
                break;
            }
            if ext_read.is_none() {
                log::debug!("Linear contig");
                break;
            }

            log::debug!("Extension: {}", self.store.name(ext_read));
            self.visited_reads.insert(ext_read);
            self.visited_reads.insert(ext_read.rc());
            cur_read = ext_read;
            path.reads.push(cur_read);
        }

        log::info!("Made {} extensions", path.reads.len() - 1);
        path
    }

    /// Assemble every contig: repeatedly seed from the unvisited,
    /// non-chimeric read with the most right extensions, extend it, then
    /// absorb every read directly overlapping the new path so covered
    /// regions spawn no further contigs.
    pub fn assemble_contigs(&mut self) {
        log::info!("Extending reads");
        self.visited_reads.clear();

        loop {
            let mut max_extensions = 0usize;
            let mut start_read = ReadId::NONE;
            for id in self.store.iter_ids() {
                if self.visited_reads.contains(&id) || self.chimera.is_chimeric(id) {
                    continue;
                }
                let count = self.count_right_extensions(id);
                if count > max_extensions {
                    max_extensions = count;
                    start_read = id;
                }
            }
            if start_read.is_none() {
                break;
            }

            let path = self.extend_read(start_read);
            for &read in &path.reads {
                for ovlp in self.overlap_index.overlaps(read) {
                    self.visited_reads.insert(ovlp.ext_id);
                    self.visited_reads.insert(ovlp.ext_id.rc());
                }
            }
            self.contig_paths.push(path);
        }

        log::info!("Assembled {} contig paths", self.contig_paths.len());
    }

    pub fn contig_paths(&self) -> &[ContigPath] {
        &self.contig_paths
    }

    pub fn into_contig_paths(self) -> Vec<ContigPath> {
        self.contig_paths
    }
}
