// Structural properties of the overlap index: strand symmetry, stored-range
// bounds, cache idempotence, filter fixed point, and positional lookups.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use readtile::asm_opt::AsmOpt;
use readtile::index::vertex_index::VertexIndex;
use readtile::overlap::container::OverlapContainer;
use readtile::overlap::detect::OverlapDetector;
use readtile::overlap::range::OverlapRange;
use readtile::seq::read_store::ReadStore;

const MAX_ENDS_DIFF: i32 = 100;

fn random_genome(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
}

fn scenario_opt() -> AsmOpt {
    AsmOpt {
        kmer_size: 15,
        min_kmer_coverage: 2,
        max_kmer_coverage: 10_000,
        min_overlap: 200,
        max_jump: 1500,
        max_overhang: 1500,
        check_overhang: true,
        max_cur_overlaps: 0,
        keep_alignment: false,
        ovlp_divergence: 0.25,
        n_threads: 1,
    }
}

/// Two reads with a 600 bp shared region.
fn two_read_store(seed: u64) -> ReadStore {
    let genome = random_genome(seed, 1600);
    let mut store = ReadStore::new();
    store.add_read("A", &genome[0..1000]);
    store.add_read("B", &genome[400..1400]);
    store
}

/// Three tandem reads with 500 bp shifts.
fn three_read_store(seed: u64) -> ReadStore {
    let genome = random_genome(seed, 2000);
    let mut store = ReadStore::new();
    store.add_read("A", &genome[0..1000]);
    store.add_read("B", &genome[500..1500]);
    store.add_read("C", &genome[1000..2000]);
    store
}

#[test]
fn test_lazy_index_is_exactly_strand_symmetric() {
    let store = two_read_store(21);
    let opt = scenario_opt();
    let index = VertexIndex::build(&store, opt.kmer_size, 2, 10_000);
    let detector = OverlapDetector::new(&store, &index, &opt).unwrap();
    let container = OverlapContainer::new(&detector, &store, false);

    for id in store.iter_ids() {
        container.lazy_seq_overlaps(id).unwrap();
    }

    for id in store.iter_ids() {
        for ovlp in container.lazy_seq_overlaps(id).unwrap() {
            assert_eq!(ovlp.cur_id, id);
            let rc_list = container.lazy_seq_overlaps(id.rc()).unwrap();
            assert!(
                rc_list.contains(&ovlp.complement()),
                "complement of {:?} missing from rc list",
                ovlp
            );
            let ext_list = container.lazy_seq_overlaps(ovlp.ext_id).unwrap();
            assert!(
                ext_list.contains(&ovlp.reverse()),
                "reverse of {:?} missing from target list",
                ovlp
            );
        }
    }
}

fn nearly_equal(a: &OverlapRange, b: &OverlapRange) -> bool {
    a.cur_id == b.cur_id
        && a.ext_id == b.ext_id
        && (a.cur_begin - b.cur_begin).abs() < MAX_ENDS_DIFF
        && (a.cur_end - b.cur_end).abs() < MAX_ENDS_DIFF
        && (a.ext_begin - b.ext_begin).abs() < MAX_ENDS_DIFF
        && (a.ext_end - b.ext_end).abs() < MAX_ENDS_DIFF
}

#[test]
fn test_filtered_index_keeps_symmetric_counterparts() {
    let store = three_read_store(42);
    let opt = scenario_opt();
    let index = VertexIndex::build(&store, opt.kmer_size, 2, 10_000);
    let detector = OverlapDetector::new(&store, &index, &opt).unwrap();
    let mut container = OverlapContainer::new(&detector, &store, false);
    container.find_all_overlaps().unwrap();
    container.build_interval_tree();

    let frozen = container.overlap_index();
    for id in store.iter_ids() {
        for ovlp in frozen.overlaps(id) {
            let complement = ovlp.complement();
            assert!(
                frozen
                    .overlaps(id.rc())
                    .iter()
                    .any(|o| nearly_equal(o, &complement)),
                "no complement counterpart for {:?}",
                ovlp
            );
            let reverse = ovlp.reverse();
            assert!(
                frozen
                    .overlaps(ovlp.ext_id)
                    .iter()
                    .any(|o| nearly_equal(o, &reverse)),
                "no reverse counterpart for {:?}",
                ovlp
            );
        }
    }
}

#[test]
fn test_stored_overlaps_respect_bounds() {
    let store = three_read_store(13);
    let opt = scenario_opt();
    let index = VertexIndex::build(&store, opt.kmer_size, 2, 10_000);
    let detector = OverlapDetector::new(&store, &index, &opt).unwrap();
    let mut container = OverlapContainer::new(&detector, &store, false);
    container.find_all_overlaps().unwrap();
    container.build_interval_tree();

    let frozen = container.overlap_index();
    let mut seen = 0usize;
    for id in store.iter_ids() {
        for ovlp in frozen.overlaps(id) {
            seen += 1;
            assert!(0 <= ovlp.cur_begin && ovlp.cur_begin < ovlp.cur_end);
            assert!(ovlp.cur_end <= ovlp.cur_len);
            assert!(0 <= ovlp.ext_begin && ovlp.ext_begin < ovlp.ext_end);
            assert!(ovlp.ext_end <= ovlp.ext_len);

            assert!(ovlp.cur_range() >= opt.min_overlap);
            assert!(ovlp.ext_range() >= opt.min_overlap);

            let diff = (ovlp.cur_range() - ovlp.ext_range()).abs() as f32;
            let mean = (ovlp.cur_range() + ovlp.ext_range()) as f32 / 2.0;
            assert!(diff <= mean * opt.ovlp_divergence);

            assert!(ovlp.cur_begin.min(ovlp.ext_begin) <= opt.max_overhang);
            assert!(
                (ovlp.cur_len - ovlp.cur_end).min(ovlp.ext_len - ovlp.ext_end)
                    <= opt.max_overhang
            );
        }
    }
    assert!(seen > 0, "scenario produced no overlaps at all");
}

#[test]
fn test_lazy_overlaps_cache_is_idempotent() {
    let store = two_read_store(34);
    let opt = scenario_opt();
    let index = VertexIndex::build(&store, opt.kmer_size, 2, 10_000);
    let detector = OverlapDetector::new(&store, &index, &opt).unwrap();
    let container = OverlapContainer::new(&detector, &store, false);

    let a = store.forward_ids().next().unwrap();
    let first = container.lazy_seq_overlaps(a).unwrap();
    let second = container.lazy_seq_overlaps(a).unwrap();
    let third = container.lazy_seq_overlaps(a).unwrap();

    // a second detector run would have appended duplicate entries
    assert_eq!(first.len(), 1);
    assert_eq!(first, second);
    assert_eq!(second, third);
}

#[test]
fn test_filter_overlaps_is_a_fixed_point() {
    let store = three_read_store(55);
    let opt = scenario_opt();
    let index = VertexIndex::build(&store, opt.kmer_size, 2, 10_000);
    let detector = OverlapDetector::new(&store, &index, &opt).unwrap();
    let container = OverlapContainer::new(&detector, &store, false);
    container.find_all_overlaps().unwrap();

    let snapshots: Vec<_> = store
        .iter_ids()
        .map(|id| container.lazy_seq_overlaps(id).unwrap())
        .collect();

    container.filter_overlaps();

    for (id, before) in store.iter_ids().zip(snapshots) {
        let after = container.lazy_seq_overlaps(id).unwrap();
        assert_eq!(before, after);
    }
}

#[test]
fn test_direct_and_lazy_detection_agree() {
    let store = two_read_store(21);
    let opt = scenario_opt();
    let index = VertexIndex::build(&store, opt.kmer_size, 2, 10_000);
    let detector = OverlapDetector::new(&store, &index, &opt).unwrap();
    let container = OverlapContainer::new(&detector, &store, false);

    let a = store.forward_ids().next().unwrap();
    let direct = container.seq_overlaps(a).unwrap();
    let lazy = container.lazy_seq_overlaps(a).unwrap();
    assert_eq!(direct, lazy);
}

#[test]
fn test_self_overlap_flag_reaches_container() {
    // a read whose tail is the rc of its head overlaps its own rc strand
    let genome = random_genome(61, 600);
    let mut palindrome = genome.clone();
    palindrome.extend_from_slice(&readtile::seq::read_store::reverse_complement(&genome));

    let mut store = ReadStore::new();
    let clean = store.add_read("clean", &random_genome(62, 1000));
    let folded = store.add_read("folded", &palindrome);

    let mut opt = scenario_opt();
    opt.min_kmer_coverage = 1;
    let index = VertexIndex::build(&store, opt.kmer_size, 1, 10_000);
    let detector = OverlapDetector::new(&store, &index, &opt).unwrap();
    let container = OverlapContainer::new(&detector, &store, false);

    assert!(!container.has_self_overlaps(clean).unwrap());
    assert!(container.has_self_overlaps(folded).unwrap());
    assert!(container.has_self_overlaps(folded.rc()).unwrap());
}

#[test]
fn test_positional_lookup_through_interval_tree() {
    let store = three_read_store(42);
    let opt = scenario_opt();
    let index = VertexIndex::build(&store, opt.kmer_size, 2, 10_000);
    let detector = OverlapDetector::new(&store, &index, &opt).unwrap();
    let mut container = OverlapContainer::new(&detector, &store, false);
    container.find_all_overlaps().unwrap();
    container.build_interval_tree();

    let a = store.forward_ids().next().unwrap();

    // A's only overlap covers its right half
    assert!(container.get_overlaps(a, 0, 400).is_empty());
    assert_eq!(container.get_overlaps(a, 600, 700).len(), 1);
    assert_eq!(container.get_overlaps(a, 0, 501).len(), 1);
    let hits = container.get_overlaps(a, 0, 1000);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].cur_begin, 500);
}
