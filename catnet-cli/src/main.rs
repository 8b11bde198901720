use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use rayon::ThreadPool;
use tracing_subscriber::EnvFilter;

use catnet::io::{read_images, read_probabilities, save_network_params};
use catnet::{classify_with, CnnResult, EngineConfig, Volume, CAT_THRESHOLD};

#[derive(Parser)]
#[command(name = "catnet", version, about = "Forward-only CNN cat classifier")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify raw images with trained parameters.
    Classify(ClassifyArgs),
    /// Time classification of random images with random weights.
    Bench(BenchArgs),
    /// Write seeded random parameter files for the configured topology.
    InitParams(InitArgs),
}

#[derive(Args)]
struct EngineArgs {
    /// JSON engine configuration; defaults to the CIFAR-10 network.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Worker threads (defaults to one per core).
    #[arg(long)]
    threads: Option<usize>,
    /// Images pushed through one batch together.
    #[arg(long)]
    group_size: Option<usize>,
}

#[derive(Args)]
struct ClassifyArgs {
    #[command(flatten)]
    engine: EngineArgs,
    /// Directory holding conv0.txt, conv3.txt, ... (overrides the config).
    #[arg(long)]
    params: Option<PathBuf>,
    /// Whitespace-separated pixel values, one image after another.
    #[arg(long)]
    images: PathBuf,
    #[arg(long, default_value_t = CAT_THRESHOLD)]
    threshold: f64,
    /// Reference probabilities to check the results against.
    #[arg(long)]
    expected: Option<PathBuf>,
    #[arg(long, default_value_t = 1e-6)]
    tolerance: f64,
}

#[derive(Args)]
struct BenchArgs {
    #[command(flatten)]
    engine: EngineArgs,
    #[arg(long, default_value_t = 1200)]
    images: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Args)]
struct InitArgs {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    dir: PathBuf,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn load_config(path: Option<&PathBuf>) -> CnnResult<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path),
        None => Ok(EngineConfig::default()),
    }
}

fn engine_config(args: &EngineArgs) -> CnnResult<EngineConfig> {
    let mut cfg = load_config(args.config.as_ref())?;
    if args.threads.is_some() {
        cfg.threads = args.threads;
    }
    if let Some(group_size) = args.group_size {
        cfg.group_size = group_size;
    }
    Ok(cfg)
}

fn thread_pool(threads: Option<usize>) -> Result<ThreadPool, Box<dyn Error>> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    Ok(builder.build()?)
}

fn classify(args: ClassifyArgs) -> Result<(), Box<dyn Error>> {
    let mut cfg = engine_config(&args.engine)?;
    if args.params.is_some() {
        cfg.params_dir = args.params;
    }
    if cfg.params_dir.is_none() {
        return Err("no parameter directory: pass --params or set params_dir".into());
    }

    let net = cfg.load_network()?;
    let images = read_images(&args.images, cfg.input)?;
    let pool = thread_pool(cfg.threads)?;
    let mut probs = vec![0.0; images.len()];

    let start = Instant::now();
    pool.install(|| classify_with(&net, &images, &mut probs, &cfg.classify_options()))?;
    let elapsed = start.elapsed();

    let mut cats = 0;
    for (i, p) in probs.iter().enumerate() {
        let is_cat = *p > args.threshold;
        if is_cat {
            cats += 1;
        }
        println!("{} {:.6} {}", i, p, if is_cat { "cat" } else { "no-cat" });
    }
    info!(
        "classified {} images ({} cats) in {:.3}s on {} threads",
        images.len(),
        cats,
        elapsed.as_secs_f64(),
        pool.current_num_threads()
    );

    if let Some(path) = &args.expected {
        let expected = read_probabilities(path)?;
        if expected.len() != probs.len() {
            return Err(format!(
                "{} holds {} probabilities for {} images",
                path.display(),
                expected.len(),
                probs.len()
            )
            .into());
        }
        let mismatches = probs
            .iter()
            .zip(&expected)
            .enumerate()
            .filter(|(_, (got, want))| !within(**got, **want, args.tolerance))
            .inspect(|(i, (got, want))| warn!("image {}: got {}, expected {}", i, got, want))
            .count();
        if mismatches > 0 {
            return Err(format!("{} of {} outputs differ from reference", mismatches, probs.len()).into());
        }
        info!("all {} outputs match {}", probs.len(), path.display());
    }
    Ok(())
}

/// NaN on either side never matches.
fn within(got: f64, want: f64, tolerance: f64) -> bool {
    (got - want).abs() <= tolerance
}

fn bench(args: BenchArgs) -> Result<(), Box<dyn Error>> {
    let cfg = engine_config(&args.engine)?;
    let mut net = cfg.build_network()?;
    net.init_random(args.seed);
    let images: Vec<Volume> = (0..args.images as u64)
        .map(|s| Volume::rand(cfg.input, args.seed.wrapping_add(s)))
        .collect();
    let pool = thread_pool(cfg.threads)?;
    let mut probs = vec![0.0; images.len()];

    let start = Instant::now();
    pool.install(|| classify_with(&net, &images, &mut probs, &cfg.classify_options()))?;
    let secs = start.elapsed().as_secs_f64();

    println!(
        "{} images in {:.3}s: {:.1} images/s ({} threads, group size {})",
        images.len(),
        secs,
        images.len() as f64 / secs.max(f64::EPSILON),
        pool.current_num_threads(),
        cfg.group_size
    );
    Ok(())
}

fn init_params(args: InitArgs) -> Result<(), Box<dyn Error>> {
    let cfg = load_config(args.config.as_ref())?;
    let mut net = cfg.build_network()?;
    net.init_random(args.seed);
    save_network_params(&net, &args.dir)?;
    println!("wrote parameters for {} layers to {}", net.len(), args.dir.display());
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Classify(args) => classify(args),
        Command::Bench(args) => bench(args),
        Command::InitParams(args) => init_params(args),
    }
}
