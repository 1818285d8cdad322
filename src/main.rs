use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use channel_virality::baseline::ChannelBaseline;
use channel_virality::synthetic::{generate_channel_history, inject_viral_post};
use channel_virality::{
    format_float, format_number, format_percent, EngineConfig, JsonFileStore, Post,
    SelectionResult, ViralityEngine, ViralityResult,
};

#[derive(Parser)]
#[command(name = "channel-virality", about = "Channel-relative virality detection")]
struct Cli {
    /// TOML config file (defaults to $VIRALITY_CONFIG_PATH or config/virality.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Baseline(BaselineArgs),
    Score(ScoreArgs),
    Select(SelectArgs),
    Demo(DemoArgs),
    InitConfig(InitConfigArgs),
}

#[derive(Args, Debug, Clone)]
struct BaselineArgs {
    #[arg(long)]
    posts: PathBuf,
    #[arg(long)]
    channel: String,
}

#[derive(Args, Debug, Clone)]
struct ScoreArgs {
    #[arg(long)]
    posts: PathBuf,
    #[arg(long)]
    baseline: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct SelectArgs {
    #[arg(long)]
    posts: PathBuf,
    #[arg(long, default_value = "data/store.json")]
    store: PathBuf,
    #[arg(long)]
    max_per_channel: Option<usize>,
    #[arg(long)]
    max_total: Option<usize>,
}

#[derive(Args, Debug, Clone)]
struct DemoArgs {
    #[arg(long, default_value_t = 5)]
    channels: usize,
    #[arg(long, default_value_t = 40)]
    posts: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Args, Debug, Clone)]
struct InitConfigArgs {
    #[arg(long, default_value = "config/virality.toml")]
    path: PathBuf,
}

#[tokio::main]
async fn main() {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "channel_virality=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cli = Cli::parse();

    if let Command::InitConfig(args) = &cli.command {
        return run_init_config(args);
    }

    let (config, config_path) = EngineConfig::load(cli.config.clone()).map_err(|err| err.to_string())?;
    if let Some(path) = config_path.filter(|path| path.exists()) {
        tracing::debug!(path = %path.display(), "loaded config file");
    }

    match cli.command {
        Command::Baseline(args) => run_baseline(args, &config, cli.json),
        Command::Score(args) => run_score(args, &config, cli.json),
        Command::Select(args) => run_select(args, config, cli.json).await,
        Command::Demo(args) => run_demo(args, config, cli.json).await,
        Command::InitConfig(_) => Ok(()),
    }
}

fn run_baseline(args: BaselineArgs, config: &EngineConfig, json: bool) -> Result<(), String> {
    let posts = read_posts(&args.posts)?;
    let baseline = config
        .baseline_calculator()
        .compute(&args.channel, &posts);

    if json {
        return print_json(&baseline);
    }
    match baseline {
        Some(baseline) => print_baseline(&baseline),
        None => println!(
            "Channel {}: learning (needs at least {} posts with views in the last {} days)",
            args.channel,
            config.baseline.min_posts(),
            config.baseline.history_window_days
        ),
    }
    Ok(())
}

fn run_score(args: ScoreArgs, config: &EngineConfig, json: bool) -> Result<(), String> {
    let posts = read_posts(&args.posts)?;
    let baseline: ChannelBaseline = read_json(&args.baseline)?;
    let scorer = config.virality_scorer();
    let results: Vec<ViralityResult> = posts
        .iter()
        .map(|post| scorer.score(post, &baseline))
        .collect();

    if json {
        return print_json(&results);
    }
    for result in &results {
        print_result(result);
    }
    Ok(())
}

async fn run_select(args: SelectArgs, config: EngineConfig, json: bool) -> Result<(), String> {
    let posts = read_posts(&args.posts)?;
    let store = JsonFileStore::load(args.store.clone())
        .await
        .map_err(|err| format!("failed to open store {}: {}", args.store.display(), err))?;
    store
        .insert_posts(&posts)
        .await
        .map_err(|err| format!("failed to record posts: {}", err))?;

    let engine = ViralityEngine::new(Arc::new(store), config)
        .await
        .map_err(|err| err.to_string())?;
    let limits = engine.config().selection;
    let result = engine
        .select_top_posts(
            &posts,
            args.max_per_channel.unwrap_or(limits.max_posts_per_channel),
            args.max_total.unwrap_or(limits.max_total_posts),
        )
        .await;

    if json {
        return print_json(&result);
    }
    print_selection(&result);
    Ok(())
}

async fn run_demo(args: DemoArgs, config: EngineConfig, json: bool) -> Result<(), String> {
    let now = Utc::now();
    let mut batch: Vec<Post> = Vec::new();

    for idx in 0..args.channels {
        let channel_id = format!("channel_{}", idx + 1);
        let base_rate = 0.005 + 0.004 * idx as f64;
        let seed = args.seed.wrapping_add(idx as u64);
        batch.extend(generate_channel_history(&channel_id, args.posts, base_rate, seed, now));
        for (n, multiple) in [6.0, 4.0, 3.0, 2.5].iter().enumerate() {
            batch.push(inject_viral_post(
                &channel_id,
                &format!("{}_viral_{}", channel_id, n + 1),
                base_rate,
                *multiple,
                4_000 + 1_500 * n as u64,
                now,
            ));
        }
    }
    // A channel too new to have a baseline.
    batch.extend(generate_channel_history("channel_new", 4, 0.02, args.seed, now));

    let engine = ViralityEngine::new(Arc::new(JsonFileStore::in_memory()), config)
        .await
        .map_err(|err| err.to_string())?;
    let limits = engine.config().selection;
    let result = engine
        .select_top_posts(&batch, limits.max_posts_per_channel, limits.max_total_posts)
        .await;

    if json {
        return print_json(&result);
    }
    println!("Demo batch: {} posts across {} channels\n", batch.len(), args.channels + 1);
    print_selection(&result);
    Ok(())
}

fn run_init_config(args: &InitConfigArgs) -> Result<(), String> {
    EngineConfig::default()
        .write(&args.path)
        .map_err(|err| err.to_string())?;
    println!("Wrote default config to {}", args.path.display());
    Ok(())
}

fn print_baseline(baseline: &ChannelBaseline) {
    println!(
        "Channel {}: {} ({} posts analyzed)",
        baseline.channel_id,
        baseline.status.label(),
        baseline.posts_analyzed
    );
    println!(
        "  engagement: avg {} | median {} | std {}",
        format_percent(baseline.avg_engagement_rate),
        format_percent(baseline.median_engagement_rate),
        format_percent(baseline.std_engagement_rate)
    );
    println!(
        "  p75 {} | p95 {} | max {}",
        format_percent(baseline.p75_engagement_rate),
        format_percent(baseline.p95_engagement_rate),
        format_percent(baseline.max_engagement_rate)
    );
}

fn print_result(result: &ViralityResult) {
    let rate = result
        .engagement_rate
        .map(format_percent)
        .unwrap_or_else(|| "n/a".to_string());
    println!(
        "{} {} score {} | rate {} | z {} | x{}",
        if result.is_viral { "VIRAL" } else { "-----" },
        result.post_id,
        format_float(result.viral_score, 2),
        rate,
        format_float(result.zscore, 2),
        format_float(result.median_multiplier, 2)
    );
    for reason in &result.reasons {
        println!("    {}", reason);
    }
}

fn print_selection(result: &SelectionResult) {
    println!("Selected {} posts:", result.selected.len());
    for ranked in &result.selected {
        println!(
            "  #{} {} ({}) score {} | views {} | x{}",
            ranked.rank,
            ranked.post.post_id,
            ranked.post.channel_id,
            format_float(ranked.result.viral_score, 2),
            format_number(ranked.post.views as f64),
            format_float(ranked.result.median_multiplier, 2)
        );
    }

    if !result.rejection_counts.is_empty() {
        println!("\nRejections:");
        for (reason, count) in &result.rejection_counts {
            println!("  {}: {}", reason, count);
        }
    }

    println!("\nChannels:");
    for (channel_id, stats) in &result.per_channel {
        println!(
            "  {}: {} | seen {} | viral {} | selected {}",
            channel_id,
            stats.baseline_status.label(),
            stats.posts_seen,
            stats.viral_count,
            stats.selected_count
        );
    }
}

fn read_posts(path: &Path) -> Result<Vec<Post>, String> {
    read_json(path)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|err| format!("failed reading {}: {}", path.display(), err))?;
    serde_json::from_str(&contents)
        .map_err(|err| format!("failed parsing {}: {}", path.display(), err))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let payload = serde_json::to_string_pretty(value)
        .map_err(|err| format!("failed to serialize output: {}", err))?;
    println!("{}", payload);
    Ok(())
}

fn load_dotenv() {
    let _ = dotenvy::dotenv();
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let manifest_path = Path::new(manifest_dir).join(".env");
    let _ = dotenvy::from_path(manifest_path);
}
