// Output writers for the downstream stages: pairwise overlaps as PAF-like
// records, contig paths as a plain text report. The core itself persists
// nothing else.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::assemble::extender::ContigPath;
use crate::overlap::container::OverlapIndex;
use crate::seq::read_store::ReadStore;

/// Write one PAF record per stored overlap of every forward-strand read.
/// Target coordinates are projected onto the forward strand, with the
/// strand column carrying the relative orientation.
pub fn write_overlaps_paf(
    index: &OverlapIndex,
    store: &ReadStore,
    path: &Path,
) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let mut written = 0usize;

    for cur_id in store.forward_ids() {
        for ovlp in index.overlaps(cur_id) {
            let strand = if ovlp.ext_id.is_forward() { '+' } else { '-' };
            let (ext_begin, ext_end) = if ovlp.ext_id.is_forward() {
                (ovlp.ext_begin, ovlp.ext_end)
            } else {
                (ovlp.ext_len - ovlp.ext_end, ovlp.ext_len - ovlp.ext_begin)
            };
            let block_len = ovlp.cur_range().max(ovlp.ext_range());
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t255",
                store.name(ovlp.cur_id),
                ovlp.cur_len,
                ovlp.cur_begin,
                ovlp.cur_end,
                strand,
                store.name(ovlp.ext_id),
                ovlp.ext_len,
                ext_begin,
                ext_end,
                ovlp.score,
                block_len,
            )?;
            written += 1;
        }
    }

    log::info!("Wrote {} overlap records to {}", written, path.display());
    Ok(())
}

/// Write contig paths: a header per contig, then one read per line with its
/// strand sign.
pub fn write_contig_paths(
    paths: &[ContigPath],
    store: &ReadStore,
    out_path: &Path,
) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(out_path)?);

    for (i, path) in paths.iter().enumerate() {
        let shape = if path.circular { "circular" } else { "linear" };
        writeln!(
            writer,
            ">contig_{} reads={} {}",
            i + 1,
            path.reads.len(),
            shape
        )?;
        for &read in &path.reads {
            writeln!(writer, "{}\t{}", store.name(read), read.strand_char())?;
        }
    }

    log::info!(
        "Wrote {} contig paths to {}",
        paths.len(),
        out_path.display()
    );
    Ok(())
}

/// Per-contig summary reported on success.
pub fn log_contig_stats(paths: &[ContigPath]) {
    for (i, path) in paths.iter().enumerate() {
        log::info!(
            "contig_{}: {} reads, {} extensions, {}",
            i + 1,
            path.reads.len(),
            path.reads.len() - 1,
            if path.circular { "circular" } else { "linear" }
        );
    }
}
