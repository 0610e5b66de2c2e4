// Batch orchestration: load reads, build the solid k-mer index, run the
// all-vs-all overlap phase, then either dump the overlaps or walk them into
// contig paths.

use std::path::Path;
use std::time::Instant;

use crate::asm_opt::AsmOpt;
use crate::assemble::chimera::ChimeraDetector;
use crate::assemble::extender::Extender;
use crate::errors::AsmError;
use crate::index::vertex_index::VertexIndex;
use crate::io::output;
use crate::overlap::container::OverlapContainer;
use crate::overlap::detect::OverlapDetector;
use crate::seq::read_store::ReadStore;

/// Run the overlap phase end to end and leave the container frozen.
fn detect_overlaps<'a>(
    store: &'a ReadStore,
    detector: &'a OverlapDetector<'a>,
) -> Result<OverlapContainer<'a>, AsmError> {
    let mut container = OverlapContainer::new(detector, store, false);
    container.find_all_overlaps()?;
    container.build_interval_tree();
    Ok(container)
}

/// `overlap` command: compute all pairwise overlaps and dump them as PAF.
pub fn run_overlap(opt: &AsmOpt, reads_path: &Path, out_path: &Path) -> Result<(), AsmError> {
    opt.validate()?;
    let start_time = Instant::now();

    let store = ReadStore::from_fasta(reads_path)?;
    let index = VertexIndex::build(
        &store,
        opt.kmer_size,
        opt.min_kmer_coverage,
        opt.max_kmer_coverage,
    );
    let detector = OverlapDetector::new(&store, &index, opt)?;
    let container = detect_overlaps(&store, &detector)?;

    output::write_overlaps_paf(container.overlap_index(), &store, out_path)?;
    log::info!(
        "Overlap detection finished in {:.2} sec",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

/// `assemble` command: overlaps, chimera scan, greedy extension, reports.
pub fn run_assemble(opt: &AsmOpt, reads_path: &Path, out_path: &Path) -> Result<(), AsmError> {
    opt.validate()?;
    let start_time = Instant::now();

    let store = ReadStore::from_fasta(reads_path)?;
    let index = VertexIndex::build(
        &store,
        opt.kmer_size,
        opt.min_kmer_coverage,
        opt.max_kmer_coverage,
    );
    let detector = OverlapDetector::new(&store, &index, opt)?;
    let container = detect_overlaps(&store, &detector)?;

    let chimera = ChimeraDetector::from_container(&container);
    let mut extender = Extender::new(container.overlap_index(), &chimera, &store);
    extender.assemble_contigs();

    output::log_contig_stats(extender.contig_paths());
    output::write_contig_paths(extender.contig_paths(), &store, out_path)?;
    log::info!(
        "Assembly finished in {:.2} sec",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}
