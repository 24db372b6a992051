use clap::{ArgAction, Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, Context, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use indicatif::{ProgressBar, ProgressStyle};
use sandwich_analysis::detect::{
    detect_sandwiches, CandidateAttack, DetectorConfig, VictimPolicy, HEURISTIC_DISCLAIMER,
};
use sandwich_analysis::extract::{
    extract_swaps, venue_name, ExtractorConfig, MultiLegPolicy, TargetPrograms,
};
use sandwich_analysis::summary::{summarize, AttackSummary, MevReport};
use sandwich_analysis::validate::{validate_attacks, AnalyzedAttack};
use sandwich_data::blocks::{SlotFetcher, DEFAULT_RPC_URL};
use sandwich_data::report::write_json;
use sandwich_data::store::Store;
use sandwich_data::SwapEvent;
use std::path::PathBuf;
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

const SWAPS_REPORT: &str = "swaps_by_slot.json";
const CANDIDATES_REPORT: &str = "sandwich_candidates.json";
const ATTACKS_REPORT: &str = "sandwich_attacks.json";

#[derive(Debug, Clone)]
struct AppContext {
    db_path: String,
    rpc_url: String,
}

#[derive(Parser, Debug)]
#[command(name = "sandwich-scan")]
#[command(about = "Solana sandwich attack scanner over historical slot ranges")]
#[command(version)]
struct Cli {
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[arg(long, global = true, default_value = "data/sandwich.sqlite")]
    db_path: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch a slot range, extract swaps and store them.
    Fetch(FetchArgs),
    /// Detect and score sandwiches over stored swaps.
    Detect(DetectArgs),
    /// Fetch recent slots and detect in one run.
    Scan(ScanArgs),
    /// Show what the store holds.
    Status,
}

/// Extraction options shared by `fetch` and `scan`.
#[derive(Args, Debug, Clone)]
struct ExtractOpts {
    /// Monitored program id (repeatable). Defaults to the built-in AMM venues.
    #[arg(long = "program")]
    programs: Vec<String>,

    /// Drop transactions that move several signer balances the same way.
    #[arg(long)]
    reject_multi_leg: bool,
}

/// Detection options shared by `detect` and `scan`.
#[derive(Args, Debug, Clone)]
struct DetectOpts {
    /// Victim selection: earliest, all, or largest.
    #[arg(long, default_value = "earliest")]
    victim_policy: String,

    /// Maximum slot distance between front-run and back-run.
    #[arg(long)]
    max_slot_window: Option<u64>,

    /// Output format: table (default) or json.
    #[arg(long, default_value = "table")]
    output: String,

    /// Directory the JSON reports are written to.
    #[arg(long, default_value = "result")]
    result_dir: PathBuf,
}

#[derive(Args, Debug)]
struct FetchArgs {
    #[arg(long)]
    start_slot: u64,

    /// Ending slot (inclusive).
    #[arg(long)]
    end_slot: u64,

    #[command(flatten)]
    extract: ExtractOpts,
}

#[derive(Args, Debug)]
struct DetectArgs {
    #[arg(long)]
    start_slot: u64,

    /// Ending slot (inclusive).
    #[arg(long)]
    end_slot: u64,

    #[command(flatten)]
    detect: DetectOpts,
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// How many slots behind the latest finalized slot to start.
    #[arg(long, default_value_t = 10_000)]
    lookback: u64,

    /// Number of consecutive slots to scan.
    #[arg(long, default_value_t = 1_000)]
    count: u64,

    #[command(flatten)]
    extract: ExtractOpts,

    #[command(flatten)]
    detect: DetectOpts,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    let ctx = AppContext {
        db_path: cli.db_path,
        rpc_url: std::env::var("SOLANA_RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string()),
    };

    match cli.command {
        Commands::Fetch(args) => handle_fetch(&ctx, args).await,
        Commands::Detect(args) => handle_detect(&ctx, args),
        Commands::Scan(args) => handle_scan(&ctx, args).await,
        Commands::Status => handle_status(&ctx),
    }
}

fn init_tracing(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .wrap_err("failed to initialize tracing filter")?;

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn open_store(ctx: &AppContext) -> Result<Store> {
    if let Some(parent) = std::path::Path::new(&ctx.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).wrap_err_with(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
    }
    Store::new(&ctx.db_path).wrap_err("failed to open SQLite store")
}

fn check_range(start: u64, end: u64) -> Result<()> {
    if start > end {
        return Err(eyre!(
            "invalid range: start-slot {} is greater than end-slot {}",
            start,
            end
        ));
    }
    Ok(())
}

fn extractor_config(opts: &ExtractOpts) -> ExtractorConfig {
    let targets = if opts.programs.is_empty() {
        TargetPrograms::default_venues()
    } else {
        TargetPrograms::new(opts.programs.iter().cloned())
    };
    let multi_leg = if opts.reject_multi_leg {
        MultiLegPolicy::Reject
    } else {
        MultiLegPolicy::LastWins
    };
    ExtractorConfig { targets, multi_leg }
}

fn detector_config(opts: &DetectOpts) -> Result<DetectorConfig> {
    let victim_policy: VictimPolicy = opts.victim_policy.parse()?;
    Ok(DetectorConfig {
        victim_policy,
        max_slot_window: opts.max_slot_window,
    })
}

fn check_output(output: &str) -> Result<()> {
    match output.to_lowercase().as_str() {
        "table" | "json" => Ok(()),
        _ => Err(eyre!(
            "unknown output format '{}'; use 'table' or 'json'",
            output
        )),
    }
}

async fn handle_fetch(ctx: &AppContext, args: FetchArgs) -> Result<()> {
    check_range(args.start_slot, args.end_slot)?;
    let store = open_store(ctx)?;
    fetch_and_store(ctx, &store, args.start_slot, args.end_slot, &args.extract).await
}

async fn fetch_and_store(
    ctx: &AppContext,
    store: &Store,
    start: u64,
    end: u64,
    opts: &ExtractOpts,
) -> Result<()> {
    let config = extractor_config(opts);
    let fingerprint = config.fingerprint();
    for program in config.targets.sorted_ids() {
        debug!(program, venue = venue_name(program).unwrap_or("custom"), "monitoring program");
    }
    info!(
        monitored_programs = config.targets.len(),
        multi_leg = config.multi_leg.as_str(),
        "extractor configured"
    );

    let fetcher = SlotFetcher::new(&ctx.rpc_url)?;
    let stats = fetcher
        .fetch_range(start, end, store, &fingerprint, move |slot, block| {
            extract_swaps(slot, block, &config)
        })
        .await
        .wrap_err("failed to fetch slot range")?;

    info!(
        start_slot = start,
        end_slot = end,
        fetched = stats.fetched,
        already_stored = stats.already_stored,
        failed = stats.failed,
        swaps = stats.swaps,
        db_path = %ctx.db_path,
        "fetch finished"
    );
    Ok(())
}

fn handle_detect(ctx: &AppContext, args: DetectArgs) -> Result<()> {
    check_range(args.start_slot, args.end_slot)?;
    let store = open_store(ctx)?;
    detect_and_report(&store, args.start_slot, args.end_slot, &args.detect)
}

async fn handle_scan(ctx: &AppContext, args: ScanArgs) -> Result<()> {
    if args.count == 0 {
        return Err(eyre!("--count must be at least 1"));
    }
    detector_config(&args.detect)?;
    check_output(&args.detect.output)?;

    let fetcher = SlotFetcher::new(&ctx.rpc_url)?;
    let latest = fetcher
        .latest_slot()
        .await
        .wrap_err("failed to resolve latest slot")?;
    let start = latest.saturating_sub(args.lookback);
    let end = start.saturating_add(args.count - 1);

    info!(
        latest_slot = latest,
        start_slot = start,
        end_slot = end,
        "scanning {} slots, this may take a while",
        args.count
    );

    let store = open_store(ctx)?;
    fetch_and_store(ctx, &store, start, end, &args.extract).await?;
    detect_and_report(&store, start, end, &args.detect)
}

fn detect_and_report(store: &Store, start: u64, end: u64, opts: &DetectOpts) -> Result<()> {
    let config = detector_config(opts)?;
    check_output(&opts.output)?;

    let slot_swaps = store
        .get_slot_swaps_in_range(start, end)
        .wrap_err("failed to load stored swaps")?;
    if slot_swaps.is_empty() {
        return Err(eyre!(
            "no scanned slots in range {}-{}; run fetch first",
            start,
            end
        ));
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .wrap_err("failed to create progress style")?,
    );
    pb.set_message("detecting sandwiches");

    let swaps: Vec<SwapEvent> = slot_swaps
        .iter()
        .flat_map(|group| group.swaps.iter().cloned())
        .collect();
    let candidates = MevReport::new(detect_sandwiches(&swaps, &config));
    let attacks = validate_attacks(&candidates.mev_attacks);
    let summary = summarize(&attacks.mev_attacks);

    pb.finish_and_clear();

    let swaps_path = write_json(&opts.result_dir, SWAPS_REPORT, &slot_swaps)?;
    let candidates_path = write_json(&opts.result_dir, CANDIDATES_REPORT, &candidates)?;
    let attacks_path = write_json(&opts.result_dir, ATTACKS_REPORT, &attacks)?;

    match opts.output.to_lowercase().as_str() {
        "json" => print_attacks_json(&candidates, &attacks, &summary)?,
        _ => print_attacks_table(slot_swaps.len(), swaps.len(), &candidates, &attacks, &summary),
    }

    info!(
        start_slot = start,
        end_slot = end,
        slots = slot_swaps.len(),
        swaps = swaps.len(),
        candidates = candidates.total_mev_attacks,
        tight_attacks = attacks.total_mev_attacks,
        swaps_report = %swaps_path.display(),
        candidates_report = %candidates_path.display(),
        attacks_report = %attacks_path.display(),
        "detect finished"
    );

    Ok(())
}

fn format_opt(value: Option<f64>, precision: usize) -> String {
    value
        .map(|v| format!("{v:.precision$}"))
        .unwrap_or_else(|| "n/a".to_string())
}

fn print_attacks_table(
    slot_count: usize,
    swap_count: usize,
    candidates: &MevReport<CandidateAttack>,
    attacks: &MevReport<AnalyzedAttack>,
    summary: &AttackSummary,
) {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec![
        "Slots",
        "Attacker",
        "Victim",
        "Round Trip",
        "Bot Profit",
        "ROI",
        "Price Impact",
    ]);

    for analyzed in &attacks.mev_attacks {
        let attack = &analyzed.attack;
        let [s1, s2, s3] = attack.attack_slots;
        table.add_row(vec![
            format!("{s1}/{s2}/{s3}"),
            truncate_key(&attack.front_run.signer),
            truncate_key(&attack.victim.signer),
            format!(
                "{} -> {}",
                truncate_key(&attack.front_run.from_mint),
                truncate_key(&attack.front_run.to_mint)
            ),
            format!("{:.6}", analyzed.analysis.bot_profit),
            format_opt(analyzed.analysis.roi, 4),
            analyzed
                .analysis
                .price_impact_percent
                .map(|impact| format!("{impact:.2}%"))
                .unwrap_or_else(|| "n/a".to_string()),
        ]);
    }

    println!("\n{table}\n");

    let mut totals = Table::new();
    totals.load_preset(UTF8_BORDERS_ONLY);
    totals.set_header(vec!["Metric", "Value"]);
    totals.add_row(vec!["Slots scanned".to_string(), slot_count.to_string()]);
    totals.add_row(vec!["Swaps extracted".to_string(), swap_count.to_string()]);
    totals.add_row(vec![
        "Round-trip candidates".to_string(),
        candidates.total_mev_attacks.to_string(),
    ]);
    totals.add_row(vec![
        "Tight sandwiches".to_string(),
        summary.attack_count.to_string(),
    ]);
    totals.add_row(vec![
        "Unique attackers".to_string(),
        summary.unique_attackers.to_string(),
    ]);
    totals.add_row(vec![
        "Unique victims".to_string(),
        summary.unique_victims.to_string(),
    ]);
    totals.add_row(vec![
        "Profitable".to_string(),
        summary.profitable_count.to_string(),
    ]);
    totals.add_row(vec![
        "Mean ROI".to_string(),
        format_opt(summary.mean_roi, 4),
    ]);

    println!("{totals}\n");
    println!("{HEURISTIC_DISCLAIMER}");
}

fn print_attacks_json(
    candidates: &MevReport<CandidateAttack>,
    attacks: &MevReport<AnalyzedAttack>,
    summary: &AttackSummary,
) -> Result<()> {
    use serde::Serialize;

    #[derive(Serialize)]
    struct JsonOutput<'a> {
        total_candidates: usize,
        summary: &'a AttackSummary,
        attacks: &'a MevReport<AnalyzedAttack>,
    }

    let output = JsonOutput {
        total_candidates: candidates.total_mev_attacks,
        summary,
        attacks,
    };
    let json = serde_json::to_string_pretty(&output).wrap_err("failed to serialize JSON")?;
    println!("{json}");
    Ok(())
}

fn handle_status(ctx: &AppContext) -> Result<()> {
    let store = open_store(ctx)?;

    let (min_slot, max_slot, slot_count) = store
        .get_slot_range()
        .wrap_err("failed to query slot range")?;
    let swap_count = store.count_swaps().wrap_err("failed to count swaps")?;

    let fmt_slot = |slot: Option<u64>| slot.map(|s| s.to_string()).unwrap_or_else(|| "-".into());

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec!["Database".to_string(), ctx.db_path.clone()]);
    table.add_row(vec!["RPC endpoint".to_string(), ctx.rpc_url.clone()]);
    table.add_row(vec!["First scanned slot".to_string(), fmt_slot(min_slot)]);
    table.add_row(vec!["Last scanned slot".to_string(), fmt_slot(max_slot)]);
    table.add_row(vec!["Scanned slots".to_string(), slot_count.to_string()]);
    table.add_row(vec!["Stored swaps".to_string(), swap_count.to_string()]);

    println!("\n{table}\n");
    Ok(())
}

/// Truncate a base58 key for compact table display.
fn truncate_key(key: &str) -> String {
    if key.chars().count() > 12 {
        let head: String = key.chars().take(6).collect();
        let tail: String = key.chars().skip(key.chars().count() - 4).collect();
        format!("{head}…{tail}")
    } else {
        key.to_string()
    }
}
