// Solid k-mer index over the full stranded read set. A k-mer is "solid" when
// its total occurrence count falls inside the configured coverage band:
// below the band it is sequencing noise, above it a repeat that would flood
// the seed phase. Only solid k-mers carry position lists.

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::seq::kmer::{Kmer, KmerIterator};
use crate::seq::read_store::{ReadId, ReadStore};

/// One occurrence of a k-mer: which stranded read, and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KmerPosition {
    pub read_id: ReadId,
    pub position: i32,
}

pub struct VertexIndex {
    positions: FxHashMap<Kmer, Vec<KmerPosition>>,
    kmer_size: usize,
}

static NO_POSITIONS: &[KmerPosition] = &[];

impl VertexIndex {
    /// Build the index. Per-read k-mer lists are produced in parallel; the
    /// merge runs in ascending raw-id order so position lists are
    /// deterministic regardless of thread scheduling.
    pub fn build(
        store: &ReadStore,
        kmer_size: usize,
        min_coverage: u32,
        max_coverage: u32,
    ) -> Self {
        let ids: Vec<ReadId> = store.iter_ids().collect();
        let per_read: Vec<Vec<(Kmer, i32)>> = ids
            .par_iter()
            .map(|&id| {
                KmerIterator::new(store.get_seq(id), kmer_size)
                    .map(|kp| (kp.kmer, kp.position))
                    .collect()
            })
            .collect();

        let mut counts: FxHashMap<Kmer, u32> = FxHashMap::default();
        let mut total_positions = 0usize;
        for kmers in &per_read {
            total_positions += kmers.len();
            for &(kmer, _) in kmers {
                *counts.entry(kmer).or_insert(0) += 1;
            }
        }

        let mut positions: FxHashMap<Kmer, Vec<KmerPosition>> = FxHashMap::default();
        for (&id, kmers) in ids.iter().zip(per_read.iter()) {
            for &(kmer, position) in kmers {
                let count = counts[&kmer];
                if count < min_coverage || count > max_coverage {
                    continue;
                }
                positions
                    .entry(kmer)
                    .or_insert_with(|| Vec::with_capacity(count as usize))
                    .push(KmerPosition {
                        read_id: id,
                        position,
                    });
            }
        }

        log::info!(
            "K-mer index: {} solid k-mers out of {} distinct ({} positions scanned)",
            positions.len(),
            counts.len(),
            total_positions
        );

        VertexIndex {
            positions,
            kmer_size,
        }
    }

    pub fn kmer_size(&self) -> usize {
        self.kmer_size
    }

    /// Is this k-mer inside the solid coverage band?
    pub fn is_solid(&self, kmer: Kmer) -> bool {
        self.positions.contains_key(&kmer)
    }

    /// All occurrences of a solid k-mer, ordered by (raw read id, position).
    /// Empty for non-solid k-mers.
    pub fn iter_kmer_pos(&self, kmer: Kmer) -> &[KmerPosition] {
        self.positions
            .get(&kmer)
            .map_or(NO_POSITIONS, |v| v.as_slice())
    }

    pub fn num_solid(&self) -> usize {
        self.positions.len()
    }
}
