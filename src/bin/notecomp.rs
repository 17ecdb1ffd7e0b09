//! notecomp CLI binary.
//!
//! # Commands
//!
//! - `compress` - Compress text (optionally content-type aware)
//! - `decompress` - Reverse `compress` output
//! - `analyze` - Detect content type and estimate savings
//! - `store` / `get` - Compressed key/value storage
//! - `stats` - Storage statistics
//! - `optimize` - Recompress stale uncompressed items

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine;
use clap::{Parser, Subcommand};
use notecomp::{
    content::{
        detect_content_type, parse_algorithm_tag, ContentCompressionOptions,
        ContentCompressionService,
    },
    storage::{LocalStorageCompressionOptions, LocalStorageCompressionService},
    Algorithm, CompressionOptions, CompressionService, Config, VERSION,
};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "notecomp")]
#[command(version = VERSION)]
#[command(about = "Compression core for note content", long_about = None)]
struct Cli {
    /// Config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Storage database path (overrides config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress text to `<algorithm>:<base64>`
    Compress {
        /// Text input (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Compression algorithm (gzip, brotli, none, auto)
        #[arg(short, long)]
        algorithm: Option<String>,

        /// Compression level (1-9)
        #[arg(short, long)]
        level: Option<u32>,

        /// Minimum size in bytes to compress
        #[arg(short, long)]
        threshold: Option<usize>,

        /// Pick threshold and codec from the detected content type
        #[arg(long)]
        content: bool,

        /// Show compression statistics
        #[arg(short, long)]
        stats: bool,
    },

    /// Decompress `<algorithm>:<base64>` back to text
    Decompress {
        /// Compressed input (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Detect content type and estimate savings
    Analyze {
        /// Content to analyze (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Store a value (JSON if it parses, otherwise a string)
    Store {
        /// Record key
        key: String,

        /// Value (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Minimum serialized size in bytes to compress
        #[arg(short, long, default_value = "1024")]
        threshold: usize,
    },

    /// Print a stored value
    Get {
        /// Record key
        key: String,
    },

    /// Show storage statistics
    Stats,

    /// Recompress stale uncompressed items
    Optimize,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let mut config = Config::from_env();
    if let Some(path) = &cli.config {
        config = config.merge(Config::from_file(path)?);
    }
    if let Some(db) = cli.db {
        config.storage.path = Some(db);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(cli.command, config))
}

async fn run(command: Commands, config: Config) -> anyhow::Result<()> {
    let service = Arc::new(CompressionService::new(config.compression.clone()));

    match command {
        Commands::Compress {
            input,
            file,
            output,
            algorithm,
            level,
            threshold,
            content,
            stats,
        } => {
            let request = CompressRequest {
                algorithm: algorithm
                    .as_deref()
                    .map(str::parse::<Algorithm>)
                    .transpose()?,
                level,
                threshold,
                content,
                stats,
            };
            cmd_compress(&service, read_input(input, file)?, output, request).await
        },

        Commands::Decompress {
            input,
            file,
            output,
        } => cmd_decompress(&service, read_input(input, file)?, output).await,

        Commands::Analyze { input, file } => cmd_analyze(&service, read_input(input, file)?),

        Commands::Store {
            key,
            input,
            file,
            threshold,
        } => {
            let storage = LocalStorageCompressionService::from_config(service, &config.storage)?;
            cmd_store(&storage, &key, read_input(input, file)?, threshold).await
        },

        Commands::Get { key } => {
            let storage = LocalStorageCompressionService::from_config(service, &config.storage)?;
            match storage.retrieve_raw(&key).await? {
                Some(raw) => {
                    println!("{raw}");
                    Ok(())
                },
                None => {
                    eprintln!("Key not found: {key}");
                    std::process::exit(1);
                },
            }
        },

        Commands::Stats => {
            let storage = LocalStorageCompressionService::from_config(service, &config.storage)?;
            println!("{}", serde_json::to_string_pretty(&storage.get_stats()?)?);
            Ok(())
        },

        Commands::Optimize => {
            let storage = LocalStorageCompressionService::from_config(service, &config.storage)?;
            let report = storage.optimize_storage().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        },
    }
}

struct CompressRequest {
    algorithm: Option<Algorithm>,
    level: Option<u32>,
    threshold: Option<usize>,
    content: bool,
    stats: bool,
}

async fn cmd_compress(
    service: &Arc<CompressionService>,
    text: String,
    output: Option<PathBuf>,
    request: CompressRequest,
) -> anyhow::Result<()> {
    let (result, tag) = if request.content {
        let options = ContentCompressionOptions {
            algorithm: request.algorithm,
            level: request.level,
            threshold: request.threshold,
            ..Default::default()
        };
        let compressed = ContentCompressionService::new(Arc::clone(service))
            .compress_content(&text, &options)
            .await;
        (compressed.result, compressed.algorithm_tag)
    } else {
        let mut options = CompressionOptions::new();
        options.algorithm = request.algorithm;
        options.level = request.level;
        options.threshold = request.threshold;
        let result = service.compress(&text, &options).await;
        let tag = result.algorithm.name().to_string();
        (result, tag)
    };

    if let Some(error) = &result.error {
        eprintln!("Warning: compression failed, emitting raw text: {error}");
    }
    let payload = result.payload_or(text.as_bytes());
    let encoded = base64::engine::general_purpose::STANDARD.encode(payload);
    write_output(output, &format!("{tag}:{encoded}"))?;

    if request.stats {
        eprintln!();
        eprintln!("Compression Statistics:");
        eprintln!("  Algorithm:    {tag}");
        eprintln!("  Original:     {} bytes", result.original_size);
        eprintln!("  Compressed:   {} bytes", result.compressed_size);
        eprintln!("  Ratio:        {:.3}", result.ratio);
        eprintln!("  Saved:        {:.1}%", result.savings_percent());
        eprintln!("  Time:         {:.2} ms", result.compression_time_ms());
    }

    Ok(())
}

async fn cmd_decompress(
    service: &CompressionService,
    input: String,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let (tag, encoded) = input
        .trim()
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("Expected <algorithm>:<base64>"))?;

    let algorithm = if tag.contains('-') {
        parse_algorithm_tag(tag)?.0
    } else {
        tag.parse::<Algorithm>()?
    };
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;

    let result = service.decompress(&bytes, algorithm).await;
    match result.data {
        Some(text) if result.success => write_output(output, &text),
        _ => {
            eprintln!(
                "Decompression failed: {}",
                result.error.unwrap_or_else(|| "unknown error".to_string())
            );
            std::process::exit(1);
        },
    }
}

fn cmd_analyze(service: &Arc<CompressionService>, content: String) -> anyhow::Result<()> {
    let recommendation =
        ContentCompressionService::new(Arc::clone(service)).get_compression_recommendations(&content);

    println!("Content Analysis:");
    println!("  Length:           {} bytes", content.len());
    println!("  Content type:     {}", detect_content_type(&content));
    println!("  Recommended:      {}", recommendation.recommended_algorithm);
    println!("  Est. savings:     {} bytes", recommendation.estimated_savings);
    println!(
        "  Should compress:  {}",
        if recommendation.should_compress {
            "yes"
        } else {
            "no"
        }
    );

    Ok(())
}

async fn cmd_store(
    storage: &LocalStorageCompressionService,
    key: &str,
    raw: String,
    threshold: usize,
) -> anyhow::Result<()> {
    let value = serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw));
    let options = LocalStorageCompressionOptions {
        compression_threshold: threshold,
        ..Default::default()
    };

    let item = storage.store(key, &value, &options).await?;
    println!(
        "Stored {key}: {} -> {} bytes ({}, ratio {:.3})",
        item.original_size, item.compressed_size, item.algorithm, item.compression_ratio
    );
    Ok(())
}

fn read_input(input: Option<String>, file: Option<PathBuf>) -> anyhow::Result<String> {
    if let Some(path) = file {
        Ok(std::fs::read_to_string(path)?)
    } else if let Some(s) = input {
        if s == "-" {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        } else {
            Ok(s)
        }
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    }
}

fn write_output(output: Option<PathBuf>, content: &str) -> anyhow::Result<()> {
    if let Some(path) = output {
        std::fs::write(path, content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}
