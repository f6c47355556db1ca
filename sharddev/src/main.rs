use clap::{Parser, Subcommand};
use shard_core::error::Result;
use shard_core::sidecar::{Sidecar, find_sidecar};
use shard_core::{DEFAULT_BUFFER_SIZE, HashAlgorithm, JoinOptions, SplitOptions, join, split};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "sharddev CLI: split files into parts and join them back", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a file into fixed-size parts plus a metadata sidecar
    Split {
        /// File to split
        file: PathBuf,
        /// Part size in bytes
        chunk_size: u64,

        /// Record a whole-file digest in the sidecar for verification at join time
        #[arg(long)]
        verify_hash: bool,

        /// Digest algorithm when --verify-hash is set (sha256 or blake3)
        #[arg(long, default_value = "blake3")]
        hash_algo: String,

        /// Read buffer size in bytes
        #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
        buffer_size: usize,

        /// Parts directory (defaults to <file>_parts in the working directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Join a parts directory back into the original file
    Join {
        /// Directory containing the parts and their sidecar
        parts_dir: PathBuf,

        /// Output path (defaults to the original name from the sidecar)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Worker threads (0 or 1 for the sequential path)
        #[arg(short = 't', long, default_value_t = 0)]
        threads: usize,

        /// Read/write buffer size in bytes
        #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
        buffer_size: usize,

        /// Skip digest verification even if the sidecar records one
        #[arg(long)]
        no_verify: bool,
    },

    /// Print the sidecar of a parts directory
    Inspect {
        /// Directory containing the parts and their sidecar
        parts_dir: PathBuf,
    },
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Split {
            file,
            chunk_size,
            verify_hash,
            hash_algo,
            buffer_size,
            out_dir,
        } => {
            let hash = if verify_hash {
                Some(hash_algo.parse::<HashAlgorithm>()?)
            } else {
                None
            };
            let opts = SplitOptions {
                chunk_size,
                buffer_size,
                hash,
                out_dir,
            };
            let sc = split(&file, &opts)?;
            println!(
                "split {} into {} part(s) of up to {} bytes",
                sc.original_name, sc.part_count, sc.chunk_size
            );
            if let Some(d) = &sc.digest {
                println!("{}: {}", d.algorithm, hex::encode(&d.value));
            }
        }

        Commands::Join {
            parts_dir,
            output,
            threads,
            buffer_size,
            no_verify,
        } => {
            let opts = JoinOptions {
                output,
                threads,
                buffer_size,
                verify: !no_verify,
            };
            let out = join(&parts_dir, &opts)?;
            println!("joined to {}", out.display());
        }

        Commands::Inspect { parts_dir } => {
            let sc = Sidecar::load(&find_sidecar(&parts_dir)?)?;
            println!("original_name: {}", sc.original_name);
            println!("original_size: {}", sc.original_size);
            println!("chunk_size:    {}", sc.chunk_size);
            println!("part_count:    {}", sc.part_count);
            match &sc.digest {
                Some(d) => println!("digest:        {} {}", d.algorithm, hex::encode(&d.value)),
                None => println!("digest:        none"),
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
