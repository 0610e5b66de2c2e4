// Chimeric read flagging. A read whose two halves come from non-adjacent
// genomic regions overlaps its own reverse complement; the detector records
// such reads while computing overlaps, and this detector answers membership
// queries for the extender. Both strands of a flagged read are flagged.

use rustc_hash::FxHashSet;

use crate::overlap::container::OverlapContainer;
use crate::seq::read_store::ReadId;

pub struct ChimeraDetector {
    flagged: FxHashSet<ReadId>,
}

impl ChimeraDetector {
    /// Collect every read the overlap phase flagged as a chimera candidate.
    pub fn from_container(container: &OverlapContainer) -> Self {
        let flagged = container.suggested_chimeras();
        log::info!("Flagged {} reads as chimeric", flagged.len() / 2);
        ChimeraDetector { flagged }
    }

    /// Flag an explicit set of reads (strand-paired automatically).
    pub fn from_flagged<I: IntoIterator<Item = ReadId>>(ids: I) -> Self {
        let mut flagged = FxHashSet::default();
        for id in ids {
            flagged.insert(id);
            flagged.insert(id.rc());
        }
        ChimeraDetector { flagged }
    }

    pub fn is_chimeric(&self, id: ReadId) -> bool {
        self.flagged.contains(&id)
    }

    pub fn num_flagged(&self) -> usize {
        self.flagged.len() / 2
    }
}
