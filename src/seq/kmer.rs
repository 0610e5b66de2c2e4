// 2-bit packed k-mers and a rolling iterator over a read. K-mers containing
// an ambiguous base produce no entry; the window restarts past the offending
// base.

/// Packed k-mer value; 2 bits per base, most recent base in the low bits.
pub type Kmer = u64;

/// Encode one nucleotide; `None` for anything outside ACGT.
#[inline]
pub fn encode_base(base: u8) -> Option<u64> {
    match base {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

/// A k-mer together with its start position in the read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KmerPos {
    pub kmer: Kmer,
    pub position: i32,
}

/// Rolling iterator yielding every valid k-mer of a sequence in ascending
/// position order.
pub struct KmerIterator<'a> {
    seq: &'a [u8],
    k: usize,
    mask: u64,
    pos: usize,
    hash: u64,
    valid: usize, // length of the ACGT run ending at `pos`
}

impl<'a> KmerIterator<'a> {
    pub fn new(seq: &'a [u8], k: usize) -> Self {
        debug_assert!(k >= 1 && k <= 31);
        KmerIterator {
            seq,
            k,
            mask: (1u64 << (2 * k)) - 1,
            pos: 0,
            hash: 0,
            valid: 0,
        }
    }
}

impl<'a> Iterator for KmerIterator<'a> {
    type Item = KmerPos;

    fn next(&mut self) -> Option<KmerPos> {
        while self.pos < self.seq.len() {
            let base = self.seq[self.pos];
            self.pos += 1;
            match encode_base(base) {
                Some(code) => {
                    self.hash = ((self.hash << 2) | code) & self.mask;
                    self.valid += 1;
                    if self.valid >= self.k {
                        return Some(KmerPos {
                            kmer: self.hash,
                            position: (self.pos - self.k) as i32,
                        });
                    }
                }
                None => {
                    self.hash = 0;
                    self.valid = 0;
                }
            }
        }
        None
    }
}
