// Read storage: every input read is kept twice, once per strand, and both
// strands are independently addressable. All downstream structures (k-mer
// index, overlap index, contig paths) speak in stranded ids.

use std::io::Read;
use std::path::Path;

use bio::io::fasta;

use crate::errors::AsmError;
use crate::io::fasta::open_fasta;

/// Stranded read handle. The forward strand of read `i` has raw id `2*i`,
/// its reverse complement `2*i + 1`; `rc()` is an involution that never maps
/// an id to itself. Raw ids are dense and used directly as array indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReadId(u32);

impl ReadId {
    /// Sentinel for "no read".
    pub const NONE: ReadId = ReadId(u32::MAX);

    pub fn from_raw(raw: u32) -> Self {
        ReadId(raw)
    }

    /// Forward-strand id of the `index`-th input read.
    pub fn forward(index: u32) -> Self {
        ReadId(index << 1)
    }

    /// The reverse complement of this read.
    pub fn rc(self) -> Self {
        debug_assert!(self != Self::NONE);
        ReadId(self.0 ^ 1)
    }

    /// Dense non-negative id, unique per strand.
    pub fn raw_id(self) -> usize {
        self.0 as usize
    }

    /// Index of the underlying (unstranded) input read.
    pub fn read_index(self) -> usize {
        (self.0 >> 1) as usize
    }

    pub fn is_forward(self) -> bool {
        self.0 & 1 == 0
    }

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// Strand sign for reports: '+' for forward, '-' for reverse complement.
    pub fn strand_char(self) -> char {
        if self.is_forward() {
            '+'
        } else {
            '-'
        }
    }
}

fn complement_base(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        _ => b'N',
    }
}

/// Reverse complement of an uppercase nucleotide sequence.
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement_base(b)).collect()
}

/// In-memory store of all input reads, both strands materialised.
pub struct ReadStore {
    seqs: Vec<Vec<u8>>, // indexed by raw id; [2i] forward, [2i+1] reverse
    names: Vec<String>, // one per input read
}

impl ReadStore {
    pub fn new() -> Self {
        ReadStore {
            seqs: Vec::new(),
            names: Vec::new(),
        }
    }

    /// Add one read; the sequence is uppercased and its reverse complement
    /// stored alongside. Returns the forward-strand id.
    pub fn add_read(&mut self, name: &str, seq: &[u8]) -> ReadId {
        let fwd: Vec<u8> = seq.to_ascii_uppercase();
        let rev = reverse_complement(&fwd);
        let id = ReadId::forward(self.names.len() as u32);
        self.names.push(name.to_string());
        self.seqs.push(fwd);
        self.seqs.push(rev);
        id
    }

    /// Load a FASTA file (plain or gzip), skipping empty records with a
    /// warning.
    pub fn from_fasta(path: &Path) -> Result<Self, AsmError> {
        let reader: Box<dyn Read> = open_fasta(path)?;
        let fasta_reader = fasta::Reader::new(reader);

        let mut store = ReadStore::new();
        for record in fasta_reader.records() {
            let record = record.map_err(|e| AsmError::Fasta(e.to_string()))?;
            if record.seq().is_empty() {
                log::warn!("Skipping empty read '{}'", record.id());
                continue;
            }
            store.add_read(record.id(), record.seq());
        }

        if store.num_reads() == 0 {
            return Err(AsmError::Fasta(format!(
                "no reads found in {}",
                path.display()
            )));
        }
        log::info!(
            "Loaded {} reads ({} bp total)",
            store.num_reads(),
            store.total_length()
        );
        Ok(store)
    }

    /// Number of input reads (strands not counted separately).
    pub fn num_reads(&self) -> usize {
        self.names.len()
    }

    /// One past the largest raw id; sizes arrays indexed by `raw_id()`.
    pub fn max_seq_id(&self) -> usize {
        self.seqs.len()
    }

    /// Total forward-strand bases.
    pub fn total_length(&self) -> usize {
        self.seqs.iter().step_by(2).map(|s| s.len()).sum()
    }

    pub fn seq_len(&self, id: ReadId) -> i32 {
        self.seqs[id.raw_id()].len() as i32
    }

    pub fn get_seq(&self, id: ReadId) -> &[u8] {
        &self.seqs[id.raw_id()]
    }

    pub fn name(&self, id: ReadId) -> &str {
        &self.names[id.read_index()]
    }

    /// All stranded ids in ascending raw-id order.
    pub fn iter_ids(&self) -> impl Iterator<Item = ReadId> + '_ {
        (0..self.seqs.len() as u32).map(ReadId::from_raw)
    }

    /// Forward-strand ids only, in input order.
    pub fn forward_ids(&self) -> impl Iterator<Item = ReadId> + '_ {
        (0..self.names.len() as u32).map(ReadId::forward)
    }
}

impl Default for ReadStore {
    fn default() -> Self {
        Self::new()
    }
}
