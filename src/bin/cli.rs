//! pagetree CLI
//!
//! Command-line driver for creating, loading and inspecting a tree file.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pagetree::{key, BPlusTree, Config, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// pagetree CLI
#[derive(Parser, Debug)]
#[command(name = "pagetree-cli")]
#[command(about = "Inspect and load a single-file B+Tree")]
#[command(version)]
struct Args {
    /// Tree file
    #[arg(short, long, default_value = "./pagetree.db")]
    file: PathBuf,

    /// Physical page size in bytes
    #[arg(long, default_value = "4096")]
    page_size: usize,

    /// Used-bytes limit above which a page splits (defaults to the page size)
    #[arg(long)]
    split_threshold: Option<usize>,

    /// Page cache frames
    #[arg(long, default_value = "64")]
    pool: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty tree file
    Create {
        /// Key width in bytes (a multiple of 4)
        #[arg(short, long, default_value = "4")]
        key_width: u32,
    },

    /// Insert one entry
    Insert {
        /// Key columns
        #[arg(required = true)]
        columns: Vec<u32>,

        /// Value bytes (UTF-8)
        #[arg(short, long, default_value = "")]
        value: String,
    },

    /// Look up one key
    Get {
        /// Key columns
        #[arg(required = true)]
        columns: Vec<u32>,
    },

    /// List entries with min <= key <= max
    Scan {
        /// Lower bound columns
        #[arg(long, num_args = 1.., required = true)]
        min: Vec<u32>,

        /// Upper bound columns
        #[arg(long, num_args = 1.., required = true)]
        max: Vec<u32>,
    },

    /// Insert keys 0..count (every column set to the counter)
    Fill {
        /// Number of keys to insert
        count: u32,
    },

    /// Print tree shape and per-leaf key ranges
    Stats,
}

fn main() {
    // Logs go to stderr so command output stays clean
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,pagetree=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("Command failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut builder = Config::builder()
        .page_size(args.page_size)
        .pool_capacity(args.pool);
    if let Some(threshold) = args.split_threshold {
        builder = builder.split_threshold(threshold);
    }

    match args.command {
        Commands::Create { key_width } => {
            let config = builder.key_width(key_width).build();
            let tree = BPlusTree::create_file(&args.file, &config)?;
            tree.close()?;
            println!("created {} (key width {})", args.file.display(), key_width);
        }

        Commands::Insert { columns, value } => {
            let mut tree = BPlusTree::open_file(&args.file, &builder.build())?;
            tree.insert(&key::encode(&columns), value.as_bytes())?;
            tree.close()?;
            println!("OK");
        }

        Commands::Get { columns } => {
            let mut tree = BPlusTree::open_file(&args.file, &builder.build())?;
            match tree.get(&key::encode(&columns))? {
                Some(value) => println!("{}", String::from_utf8_lossy(&value)),
                None => println!("(nil)"),
            }
        }

        Commands::Scan { min, max } => {
            let mut tree = BPlusTree::open_file(&args.file, &builder.build())?;
            for (key_bytes, value) in tree.scan(&key::encode(&min), &key::encode(&max))? {
                println!(
                    "{:?} => {}",
                    key::decode(&key_bytes),
                    String::from_utf8_lossy(&value)
                );
            }
        }

        Commands::Fill { count } => {
            let mut tree = BPlusTree::open_file(&args.file, &builder.build())?;
            let width = tree.key_width() as usize;
            for n in 0..count {
                let key_bytes = key::bound(width, n);
                tree.insert(&key_bytes, &key_bytes)?;
            }
            let written = tree.flush()?;
            tracing::info!(inserted = count, pages_written = written, "fill complete");
            tree.close()?;
        }

        Commands::Stats => {
            let mut tree = BPlusTree::open_file(&args.file, &builder.build())?;
            let stats = tree.stats()?;
            println!("key width:    {}", tree.key_width());
            println!("depth:        {}", stats.depth);
            println!("branch pages: {}", stats.branch_pages);
            println!("leaf pages:   {}", stats.leaf_pages);
            println!("entries:      {}", stats.entries);

            for page in tree.all()?.into_iter().filter(|page| page.is_leaf()) {
                let first = page.min_key().map(|k| key::decode(k));
                let last = page.max_key().map(|k| key::decode(k));
                println!(
                    "leaf {:>6}: {} entries, first {:?}, last {:?}",
                    page.id,
                    page.entries.len(),
                    first,
                    last
                );
            }
        }
    }

    Ok(())
}
