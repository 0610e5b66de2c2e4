// FASTA input with gzip auto-detection. Compression is recognised by the
// magic bytes rather than the file extension, so renamed files still open.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::MultiGzDecoder;

const BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Check the two-byte gzip magic without consuming the stream.
fn is_gzip(file: &mut File) -> io::Result<bool> {
    let mut magic = [0u8; 2];
    let n = file.read(&mut magic)?;
    file.seek(SeekFrom::Start(0))?;
    Ok(n == 2 && magic[0] == 0x1f && magic[1] == 0x8b)
}

/// Open a FASTA file, transparently decompressing gzip input.
pub fn open_fasta(path: &Path) -> io::Result<Box<dyn Read>> {
    let mut file = File::open(path)?;
    let reader: Box<dyn Read> = if is_gzip(&mut file)? {
        log::debug!("Detected gzip input: {}", path.display());
        Box::new(BufReader::with_capacity(
            BUFFER_SIZE,
            MultiGzDecoder::new(file),
        ))
    } else {
        Box::new(BufReader::with_capacity(BUFFER_SIZE, file))
    };
    Ok(reader)
}
