use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bio::io::fasta;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use bandlink::align::{AlignerFactory, AlignerKind, AlignmentEngine, DriverParams};
use bandlink::diagnostics::DiagnosticList;
use bandlink::matrix::SubstMatrix;
use bandlink::results::{write_tabular, AlignmentSet};
use bandlink::score::ScoringConfig;
use bandlink::sequence::{MemorySequenceSource, SeqRegion, Strand};
use bandlink::stats::{calibrate_ungapped, standard_profile, KarlinParams, SearchSpace};

#[derive(Parser)]
#[command(name = "bandlink")]
#[command(version)]
#[command(about = "Banded pairwise alignment search with HSP linking", long_about = None)]
struct Cli {
    /// Query sequences (FASTA)
    #[arg(short, long)]
    query: PathBuf,

    /// Subject sequences (FASTA)
    #[arg(short, long)]
    subject: PathBuf,

    /// Aligner stage: banded, instanced, or both (banded first, instanced
    /// over the rejected pairs)
    #[arg(long, default_value = "both")]
    aligner: String,

    /// Minimum score an alignment must exceed to be kept
    #[arg(long, default_value_t = 0)]
    threshold: i32,

    /// Total band width for the banded aligner
    #[arg(long, default_value_t = 64)]
    band_width: usize,

    /// Wall-clock budget in seconds for the instanced aligner
    #[arg(long, default_value_t = 300)]
    timeout: u64,

    /// Named substitution matrix (blosum62); omit for reward/penalty scoring
    #[arg(long)]
    matrix: Option<String>,

    /// Match reward (reward/penalty scoring)
    #[arg(long, default_value_t = 1)]
    reward: i32,

    /// Mismatch penalty, negative (reward/penalty scoring)
    #[arg(long, default_value_t = -2, allow_hyphen_values = true)]
    penalty: i32,

    /// Gap open cost
    #[arg(long, default_value_t = 5)]
    gap_open: i32,

    /// Gap extension cost
    #[arg(long, default_value_t = 2)]
    gap_extend: i32,

    /// Output path (default: stdout)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

fn read_fasta(path: &PathBuf) -> Result<Vec<(String, Vec<u8>)>> {
    let reader = fasta::Reader::from_file(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        records.push((record.id().to_string(), record.seq().to_vec()));
    }
    Ok(records)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let matrix = match &cli.matrix {
        Some(name) => SubstMatrix::by_name(name)
            .with_context(|| format!("unknown substitution matrix: {name}"))?,
        None => SubstMatrix::Simple {
            reward: cli.reward,
            penalty: cli.penalty,
        },
    };

    let query_records = read_fasta(&cli.query)?;
    let subject_records = read_fasta(&cli.subject)?;

    let mut scope = MemorySequenceSource::new();
    let mut queries = Vec::new();
    let mut subjects = Vec::new();
    let mut max_query_len = 0usize;
    let mut total_subject_len = 0usize;
    for (id, seq) in &query_records {
        max_query_len = max_query_len.max(seq.len());
        queries.push(SeqRegion::new(id.clone(), Strand::Forward));
        scope.insert(id.clone(), seq.clone());
    }
    for (id, seq) in &subject_records {
        total_subject_len += seq.len();
        subjects.push(SeqRegion::new(id.clone(), Strand::Forward));
        scope.insert(id.clone(), seq.clone());
    }

    let mut diags = DiagnosticList::new();

    // calibrate the scoring system; fall back to the matrix's published
    // parameters if the search does not converge
    let karlin = match calibrate_ungapped(&standard_profile(&matrix)) {
        Ok(params) => params,
        Err(e) => {
            eprintln!("calibration failed ({e}); using published parameters");
            match &matrix {
                SubstMatrix::Blosum62 => KarlinParams::blosum62_ungapped(),
                _ => KarlinParams::nucleotide_ungapped(),
            }
        }
    };

    let space = SearchSpace::with_length_adjustment(
        max_query_len.max(1),
        total_subject_len.max(1),
        &karlin,
    );

    let make_config = || {
        let mut config = ScoringConfig::new(matrix.clone(), karlin);
        config.set_gap_open(cli.gap_open);
        config.set_gap_extend(cli.gap_extend);
        config.set_effective_search_space(space);
        config
    };

    let params = DriverParams {
        threshold: cli.threshold,
        band_width: cli.band_width,
        timeout: Duration::from_secs(cli.timeout),
    };

    let stages: Vec<AlignerKind> = match cli.aligner.as_str() {
        "both" => vec![AlignerKind::Banded, AlignerKind::Instanced],
        other => vec![other.parse().map_err(anyhow::Error::msg)?],
    };

    let mut results = AlignmentSet::new();
    for kind in stages {
        let engine = AlignerFactory::create(kind, make_config(), &params);

        // one subject per call keeps the accumulator merging visible and
        // gives the bar something honest to count
        let bar = ProgressBar::new(subjects.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
                .unwrap()
                .progress_chars("=> "),
        );
        bar.set_message(format!("{kind:?}"));
        for subject in &subjects {
            results = engine.generate_alignments(
                &scope,
                &queries,
                std::slice::from_ref(subject),
                results,
                &mut diags,
            );
            bar.inc(1);
            if diags.has_fatal() {
                break;
            }
        }
        bar.finish_and_clear();
        if diags.has_fatal() {
            break;
        }
    }

    let stdout = io::stdout();
    let mut writer: Box<dyn Write> = match &cli.out {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(stdout.lock())),
    };
    write_tabular(&results, &mut writer)?;
    writer.flush()?;

    for d in diags.iter() {
        eprintln!("{d}");
    }
    if diags.has_fatal() {
        bail!("batch aborted on fatal diagnostic");
    }
    Ok(())
}
