use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use readtile::{asm_opt::AsmOpt, pipeline};

#[derive(Parser)]
#[command(name = "readtile")]
#[command(about = "Long-read all-vs-all overlap detection and greedy contig extension", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonOpts {
    /// Input FASTA file with long reads (.fa or .fa.gz)
    #[arg(value_name = "READS.FA")]
    reads: PathBuf,

    /// Output file
    #[arg(short = 'o', long, value_name = "FILE")]
    output: PathBuf,

    /// Seed k-mer size
    #[arg(short = 'k', long, value_name = "INT", default_value = "15")]
    kmer_size: usize,

    /// Minimum k-mer coverage to consider a k-mer solid
    #[arg(long, value_name = "INT", default_value = "2")]
    min_kmer_coverage: u32,

    /// Maximum k-mer coverage to consider a k-mer solid
    #[arg(long, value_name = "INT", default_value = "500")]
    max_kmer_coverage: u32,

    /// Minimum overlap length between two reads
    #[arg(short = 'm', long, value_name = "INT", default_value = "5000")]
    min_overlap: i32,

    /// Maximum seed jump inside one chain
    #[arg(long, value_name = "INT", default_value = "1500")]
    max_jump: i32,

    /// Maximum unaligned overhang at overlap ends
    #[arg(long, value_name = "INT", default_value = "1500")]
    max_overhang: i32,

    /// Disable the overhang check (keep non-dovetail overlaps)
    #[arg(long)]
    no_overhang_check: bool,

    /// Stop after this many overlaps per read (0 = unbounded)
    #[arg(long, value_name = "INT", default_value = "0")]
    max_read_overlaps: i32,

    /// Allowed relative length divergence between overlap sides
    #[arg(long, value_name = "FLOAT", default_value = "0.25")]
    divergence: f32,

    /// Number of threads (default: all available cores)
    #[arg(short = 't', long, value_name = "INT")]
    threads: Option<usize>,

    /// Verbose level: 1=error, 2=warning, 3=message, 4+=debugging
    #[arg(short = 'v', long, value_name = "INT", default_value = "3")]
    verbosity: i32,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect all pairwise read overlaps and write them as PAF
    Overlap {
        #[command(flatten)]
        opts: CommonOpts,

        /// Keep thinned k-mer anchor positions on each overlap
        #[arg(long)]
        keep_alignment: bool,
    },

    /// Assemble reads into contig paths
    Assemble {
        #[command(flatten)]
        opts: CommonOpts,
    },
}

fn init_logging(verbosity: i32) {
    let log_level = match verbosity {
        v if v <= 1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 => log::LevelFilter::Info,
        4 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

/// Build the thread pool and the option set shared by both commands.
fn setup(common: &CommonOpts, keep_alignment: bool) -> AsmOpt {
    init_logging(common.verbosity);

    let mut num_threads = common.threads.unwrap_or_else(num_cpus::get);
    if num_threads < 1 {
        log::warn!("Invalid thread count {}, using 1 thread", num_threads);
        num_threads = 1;
    }
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
    {
        log::warn!(
            "Failed to configure thread pool: {} (may already be initialized)",
            e
        );
    }
    log::info!(
        "Using {} {}",
        num_threads,
        if num_threads == 1 { "thread" } else { "threads" }
    );

    let opt = AsmOpt {
        kmer_size: common.kmer_size,
        min_kmer_coverage: common.min_kmer_coverage,
        max_kmer_coverage: common.max_kmer_coverage,
        min_overlap: common.min_overlap,
        max_jump: common.max_jump,
        max_overhang: common.max_overhang,
        check_overhang: !common.no_overhang_check,
        max_cur_overlaps: common.max_read_overlaps,
        keep_alignment,
        ovlp_divergence: common.divergence,
        n_threads: num_threads,
    };

    if common.verbosity >= 3 {
        log::info!("Overlap parameters:");
        log::info!("  K-mer size: {}", opt.kmer_size);
        log::info!(
            "  Solid k-mer coverage: [{}, {}]",
            opt.min_kmer_coverage,
            opt.max_kmer_coverage
        );
        log::info!("  Min overlap: {}", opt.min_overlap);
        log::info!("  Max jump: {}", opt.max_jump);
        log::info!(
            "  Max overhang: {} (check {})",
            opt.max_overhang,
            if opt.check_overhang { "on" } else { "off" }
        );
        log::info!("  Divergence rate: {}", opt.ovlp_divergence);
    }

    opt
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Overlap {
            opts,
            keep_alignment,
        } => {
            let opt = setup(&opts, keep_alignment);
            log::info!("Detecting overlaps in {}", opts.reads.display());
            if let Err(e) = pipeline::run_overlap(&opt, &opts.reads, &opts.output) {
                log::error!("Overlap detection failed: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Assemble { opts } => {
            let opt = setup(&opts, false);
            log::info!("Assembling reads from {}", opts.reads.display());
            if let Err(e) = pipeline::run_assemble(&opt, &opts.reads, &opts.output) {
                log::error!("Assembly failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}
