use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::debug;
use minivsfs::{Image, Report};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty image
    Format {
        /// Path to the disk image
        #[arg(short, long)]
        image: PathBuf,

        /// Image size in KiB (multiple of 4)
        #[arg(short, long)]
        size_kib: u32,

        /// Number of inodes
        #[arg(short = 'n', long, default_value_t = 128)]
        inodes: u32,
    },
    /// Add a file to the root directory
    Add {
        /// Image to read
        #[arg(short, long)]
        input: PathBuf,

        /// Image to write (defaults to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// File to add
        #[arg(short, long)]
        file: PathBuf,
    },
    /// List the image geometry and root directory
    Ls {
        image: PathBuf,
    },
    /// Write a file's content to stdout
    Cat {
        image: PathBuf,
        name: String,
    },
    /// Verify checksums, bitmaps and directory entries
    Check {
        image: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Format {
            image,
            size_kib,
            inodes,
        } => {
            minivsfs::format(&image, size_kib, inodes)
                .with_context(|| format!("formatting {}", image.display()))?;
            let report = minivsfs::inspect(&image)?;
            println!(
                "Created MiniVSFS image '{}' ({} blocks, {} inodes)",
                image.display(),
                report.total_blocks,
                report.inode_count
            );
        }
        Commands::Add {
            input,
            output,
            file,
        } => {
            let output = output.unwrap_or_else(|| input.clone());
            let inode = minivsfs::add_file_to(&input, &output, &file).with_context(|| {
                format!("adding {} to {}", file.display(), input.display())
            })?;
            println!(
                "Added '{}' (inode {}) into '{}' -> '{}'",
                file.display(),
                inode,
                input.display(),
                output.display()
            );
        }
        Commands::Ls { image } => {
            let report: Report = minivsfs::inspect(&image)
                .with_context(|| format!("reading {}", image.display()))?;
            print!("{report}");
        }
        Commands::Cat { image, name } => {
            let loaded =
                Image::open(&image).with_context(|| format!("reading {}", image.display()))?;
            let data = loaded.read_file(name.as_bytes())?;
            debug!("{}: {} bytes", name, data.len());
            std::io::stdout().write_all(&data)?;
        }
        Commands::Check { image } => {
            let loaded =
                Image::open(&image).with_context(|| format!("reading {}", image.display()))?;
            let problems = minivsfs::check(&loaded)?;
            if !problems.is_empty() {
                for problem in &problems {
                    eprintln!("{problem}");
                }
                bail!("{} problem(s) found in {}", problems.len(), image.display());
            }
            println!("{}: clean", image.display());
        }
    }

    Ok(())
}
