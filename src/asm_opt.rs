// Assembly options: every tunable of the overlap detector, the k-mer index
// and the extender, fixed once at startup.

use crate::errors::AsmError;

/// Default rate below which a candidate target is discarded: a target must
/// collect at least `MIN_KMER_SURV_RATE * min_overlap` shared solid k-mers,
/// and an emitted chain must cover at least `MIN_KMER_SURV_RATE * curRange()`
/// bases with exact matches.
pub const MIN_KMER_SURV_RATE: f32 = 0.01;

/// Cap on secondary (non-contained, partially overlapping) chains retained
/// per primary chain to a single target.
pub const MAX_SECONDARY_OVLPS: usize = 5;

/// Chaining look-back budget: stop scanning predecessors after this many
/// consecutive candidates that failed to improve the best score.
pub const MAX_LOOK_BACK: i32 = 50;

/// Two overlaps to the same target whose cur- and ext-intervals each differ
/// by less than this many bases are clustered as redundant.
pub const MAX_ENDS_DIFF: i32 = 100;

#[derive(Debug, Clone)]
pub struct AsmOpt {
    // K-mer index parameters
    pub kmer_size: usize,       // Seed k-mer length (2-bit packed, max 31)
    pub min_kmer_coverage: u32, // A k-mer below this count is noise, not solid
    pub max_kmer_coverage: u32, // A k-mer above this count is repeat, not solid

    // Overlap detection parameters
    pub min_overlap: i32,      // Minimum span of an overlap on either read
    pub max_jump: i32,         // Maximum seed-to-seed gap inside one chain
    pub max_overhang: i32,     // Maximum unaligned end length (dovetail test)
    pub check_overhang: bool,  // Enforce the overhang bound
    pub max_cur_overlaps: i32, // Stop after this many overlaps per query (0 = unbounded)
    pub keep_alignment: bool,  // Retain thinned k-mer anchors on each overlap
    pub ovlp_divergence: f32,  // Allowed |curRange - extRange| / meanRange

    // Processing parameters
    pub n_threads: usize, // Worker pool width for the all-vs-all phase
}

impl Default for AsmOpt {
    fn default() -> Self {
        AsmOpt {
            kmer_size: 15,
            min_kmer_coverage: 2,
            max_kmer_coverage: 500,
            min_overlap: 5000,
            max_jump: 1500,
            max_overhang: 1500,
            check_overhang: true,
            max_cur_overlaps: 0,
            keep_alignment: false,
            ovlp_divergence: 0.25,
            n_threads: 1,
        }
    }
}

impl AsmOpt {
    /// Check construction-time invariants. Every violation here is fatal;
    /// the pipeline refuses to start on a bad configuration.
    pub fn validate(&self) -> Result<(), AsmError> {
        if self.kmer_size < 4 || self.kmer_size > 31 {
            return Err(AsmError::Config(format!(
                "k-mer size {} out of range [4, 31]",
                self.kmer_size
            )));
        }
        if self.min_overlap <= 0 {
            return Err(AsmError::Config(format!(
                "minimum overlap must be positive, got {}",
                self.min_overlap
            )));
        }
        if self.min_overlap <= self.kmer_size as i32 {
            return Err(AsmError::Config(format!(
                "minimum overlap {} must exceed the k-mer size {}",
                self.min_overlap, self.kmer_size
            )));
        }
        if self.max_jump <= 0 {
            return Err(AsmError::Config(format!(
                "maximum chaining jump must be positive, got {}",
                self.max_jump
            )));
        }
        if self.check_overhang && self.max_overhang < 0 {
            return Err(AsmError::Config(format!(
                "maximum overhang must be non-negative, got {}",
                self.max_overhang
            )));
        }
        if self.max_cur_overlaps < 0 {
            return Err(AsmError::Config(format!(
                "per-query overlap cap must be non-negative, got {}",
                self.max_cur_overlaps
            )));
        }
        if !(0.0..=1.0).contains(&self.ovlp_divergence) {
            return Err(AsmError::Config(format!(
                "overlap divergence rate {} out of range [0, 1]",
                self.ovlp_divergence
            )));
        }
        if self.min_kmer_coverage == 0 {
            return Err(AsmError::Config(
                "minimum k-mer coverage must be at least 1".to_string(),
            ));
        }
        if self.max_kmer_coverage < self.min_kmer_coverage {
            return Err(AsmError::Config(format!(
                "k-mer coverage band [{}, {}] is empty",
                self.min_kmer_coverage, self.max_kmer_coverage
            )));
        }
        Ok(())
    }
}
