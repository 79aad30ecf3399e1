use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, ensure};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use synfeat::{
    CodeType, Config, RecordReader, SentenceReader, TagVocabulary, extract_corpus, merge_files,
    write_outcomes,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(
    name = "synfeat",
    version,
    about = "Per-token syntactic features from constituency parses"
)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract raw features from a file of bracketed parses.
    Extract {
        /// Parse file (`<id> <bracketed parse>` per line).
        #[arg(long)]
        parses: PathBuf,
        /// Tokens file (`<id> <space-separated tokens>` per line); defaults to the parse leaves.
        #[arg(long)]
        tokens: Option<PathBuf>,
        /// Output feature file.
        #[arg(long)]
        out: PathBuf,
        /// Extract on a single thread.
        #[arg(long)]
        sequential: bool,
    },
    /// Replace tags in raw feature files with dense or one-hot codes.
    Encode {
        /// Raw feature files; tags are collected across all of them.
        #[arg(long, num_args = 1.., required = true)]
        raw: Vec<PathBuf>,
        /// Encoded output files, one per raw file.
        #[arg(long, num_args = 1.., required = true)]
        code: Vec<PathBuf>,
        /// Coding of the tag fields (dense or one_hot).
        #[arg(long)]
        code_type: Option<CodeType>,
        /// Use a saved vocabulary instead of collecting one.
        #[arg(long)]
        vocab_in: Option<PathBuf>,
        /// Save the vocabulary, one tag per line.
        #[arg(long)]
        vocab_out: Option<PathBuf>,
    },
    /// Prefix word durations onto encoded features, adding silences.
    AddSil {
        /// Duration file (`<id> <word>|<count> ...` per line).
        #[arg(long)]
        durations: PathBuf,
        /// Encoded feature file.
        #[arg(long)]
        feats: PathBuf,
        /// Output file.
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref())?;

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Extract {
            parses,
            tokens,
            out,
            sequential,
        } => run_extract(&config, &parses, tokens.as_deref(), &out, sequential),
        Commands::Encode {
            raw,
            code,
            code_type,
            vocab_in,
            vocab_out,
        } => run_encode(
            &config,
            &raw,
            &code,
            code_type.unwrap_or(config.encode.code_type),
            vocab_in.as_deref(),
            vocab_out.as_deref(),
        ),
        Commands::AddSil {
            durations,
            feats,
            out,
        } => run_add_sil(&durations, &feats, &out),
    }
}

fn init_logging(log: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn create_output(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path)
        .with_context(|| format!("failed to create output file {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn run_extract(
    config: &Config,
    parses: &Path,
    tokens: Option<&Path>,
    out: &Path,
    sequential: bool,
) -> Result<()> {
    let parses = RecordReader::from_path(parses)?;
    let tokens = tokens.map(RecordReader::from_path).transpose()?;
    let sentences = SentenceReader::new(parses, tokens);

    let parallel = config.pipeline.parallel && !sequential;
    let outcomes = extract_corpus(sentences, config.format, parallel);

    let mut writer = create_output(out)?;
    let summary = write_outcomes(outcomes, &mut writer)
        .with_context(|| format!("feature extraction into {} failed", out.display()))?;
    writer.flush()?;

    info!(
        written = summary.written,
        skipped = summary.skipped,
        out = %out.display(),
        "wrote features"
    );
    Ok(())
}

fn run_encode(
    config: &Config,
    raw: &[PathBuf],
    code: &[PathBuf],
    code_type: CodeType,
    vocab_in: Option<&Path>,
    vocab_out: Option<&Path>,
) -> Result<()> {
    ensure!(
        raw.len() == code.len(),
        "{} raw feature files but {} code files",
        raw.len(),
        code.len()
    );

    let vocab = match vocab_in {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open vocabulary {}", path.display()))?;
            TagVocabulary::load(BufReader::new(file))?
        }
        None => {
            let mut vocab = TagVocabulary::new();
            for path in raw {
                vocab
                    .collect_from(RecordReader::from_path(path)?, &config.format)
                    .with_context(|| format!("failed to collect tags from {}", path.display()))?;
            }
            vocab
        }
    };
    info!(tags = vocab.len(), "tag vocabulary ready");

    if let Some(path) = vocab_out {
        let mut writer = create_output(path)?;
        vocab.save(&mut writer)?;
        writer.flush()?;
    }

    for (raw_path, code_path) in raw.iter().zip(code) {
        let mut writer = create_output(code_path)?;
        vocab
            .encode_file(
                RecordReader::from_path(raw_path)?,
                &mut writer,
                code_type,
                &config.format,
            )
            .with_context(|| format!("failed to encode {}", raw_path.display()))?;
        writer.flush()?;
    }
    Ok(())
}

fn run_add_sil(durations: &Path, feats: &Path, out: &Path) -> Result<()> {
    let mut writer = create_output(out)?;
    merge_files(
        RecordReader::from_path(durations)?,
        RecordReader::from_path(feats)?,
        &mut writer,
    )
    .with_context(|| {
        format!(
            "failed to merge {} with {}",
            durations.display(),
            feats.display()
        )
    })?;
    writer.flush()?;
    Ok(())
}
