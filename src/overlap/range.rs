use crate::seq::read_store::ReadId;

/// One directed overlap: query read `cur` aligns to target read `ext` over
/// approximately colinear intervals. Intervals are half-open and always
/// satisfy `0 <= begin < end <= len` for stored overlaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapRange {
    pub cur_id: ReadId,
    pub cur_begin: i32,
    pub cur_end: i32,
    pub cur_len: i32,

    pub ext_id: ReadId,
    pub ext_begin: i32,
    pub ext_end: i32,
    pub ext_len: i32,

    /// Estimated diagonal offset (curPos - extPos) at the left end, taken as
    /// the median over the chained seeds.
    pub left_shift: i32,
    /// Diagonal offset at the right end: `extLen - curLen + leftShift`.
    pub right_shift: i32,

    /// Chaining score.
    pub score: i32,

    /// Thinned (curPos, extPos) seed anchors, retained only when the
    /// detector is configured to keep alignment detail.
    pub kmer_matches: Vec<(i32, i32)>,
}

impl OverlapRange {
    pub fn new(
        cur_id: ReadId,
        ext_id: ReadId,
        cur_begin: i32,
        ext_begin: i32,
        cur_len: i32,
        ext_len: i32,
    ) -> Self {
        OverlapRange {
            cur_id,
            cur_begin,
            cur_end: cur_begin,
            cur_len,
            ext_id,
            ext_begin,
            ext_end: ext_begin,
            ext_len,
            left_shift: 0,
            right_shift: 0,
            score: 0,
            kmer_matches: Vec::new(),
        }
    }

    /// Span of the overlap on the query.
    pub fn cur_range(&self) -> i32 {
        self.cur_end - self.cur_begin
    }

    /// Span of the overlap on the target.
    pub fn ext_range(&self) -> i32 {
        self.ext_end - self.ext_begin
    }

    /// Length of the intersection of the two query intervals (0 if disjoint).
    pub fn cur_intersect(&self, other: &OverlapRange) -> i32 {
        (self.cur_end.min(other.cur_end) - self.cur_begin.max(other.cur_begin)).max(0)
    }

    /// Length of the intersection of the two target intervals (0 if disjoint).
    pub fn ext_intersect(&self, other: &OverlapRange) -> i32 {
        (self.ext_end.min(other.ext_end) - self.ext_begin.max(other.ext_begin)).max(0)
    }

    /// The same overlap seen from the target's side: cur and ext swap roles
    /// and the diagonal shifts change sign.
    pub fn reverse(&self) -> OverlapRange {
        OverlapRange {
            cur_id: self.ext_id,
            cur_begin: self.ext_begin,
            cur_end: self.ext_end,
            cur_len: self.ext_len,
            ext_id: self.cur_id,
            ext_begin: self.cur_begin,
            ext_end: self.cur_end,
            ext_len: self.cur_len,
            left_shift: -self.left_shift,
            right_shift: -self.right_shift,
            score: self.score,
            kmer_matches: self.kmer_matches.iter().map(|&(c, e)| (e, c)).collect(),
        }
    }

    /// The same physical overlap viewed from the opposite strand: both ids
    /// are complemented and every coordinate mirrored about its read length.
    pub fn complement(&self) -> OverlapRange {
        let mut matches: Vec<(i32, i32)> = self
            .kmer_matches
            .iter()
            .map(|&(c, e)| (self.cur_len - c, self.ext_len - e))
            .collect();
        matches.reverse();

        OverlapRange {
            cur_id: self.cur_id.rc(),
            cur_begin: self.cur_len - self.cur_end,
            cur_end: self.cur_len - self.cur_begin,
            cur_len: self.cur_len,
            ext_id: self.ext_id.rc(),
            ext_begin: self.ext_len - self.ext_end,
            ext_end: self.ext_len - self.ext_begin,
            ext_len: self.ext_len,
            left_shift: -self.right_shift,
            right_shift: -self.left_shift,
            score: self.score,
            kmer_matches: matches,
        }
    }
}
