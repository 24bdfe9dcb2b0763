//! risk-runner: batch scorer for the merchant risk early-warning core.
//!
//! Usage:
//!   risk-runner --profile p.json --usage u.json --customer c.json \
//!               [--predictions preds.json] [--labels labels.json] \
//!               [--config data/risk_config.json] [--policy fixed|quantile] \
//!               [--out risk_output.json] [--db risk.db]
//!   risk-runner --synthetic 200 --months 18 --seed 42 [--out ...] [--db ...]

mod store;

use anyhow::{bail, Context, Result};
use merchant_risk_core::{
    alerting::AlertLabel,
    benchmark::{benchmark, Metric},
    config::{AlertPolicyKind, RiskConfig},
    explain::explain,
    panel::{CalibrationLabel, CustomerRecord, ExternalPrediction, MerchantProfile, UsageRecord},
    pipeline::{run, OutputTable},
    synth,
};
use serde::de::DeserializeOwned;
use std::env;
use store::OutputStore;

/// Every table one run consumes.
struct Inputs {
    profiles:    Vec<MerchantProfile>,
    usage:       Vec<UsageRecord>,
    customer:    Vec<CustomerRecord>,
    predictions: Option<Vec<ExternalPrediction>>,
    labels:      Option<Vec<CalibrationLabel>>,
    source:      String,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut config = match arg_value(&args, "--config") {
        Some(path) => RiskConfig::load(path)?,
        None => RiskConfig::default(),
    };
    if let Some(policy) = arg_value(&args, "--policy") {
        config = config.with_policy(parse_policy(policy)?);
    }
    config.validate()?;

    let inputs = load_inputs(&args)?;
    let out_path = arg_value(&args, "--out");
    let db = arg_value(&args, "--db");
    let run_id = format!("run-{}", uuid::Uuid::new_v4());

    println!("risk-runner: merchant risk early warning");
    println!("  run_id:   {run_id}");
    println!("  source:   {}", inputs.source);
    println!("  policy:   {}", policy_name(config.alert.policy));
    println!("  out:      {}", out_path.unwrap_or("-"));
    println!("  db:       {}", db.unwrap_or("-"));
    println!();

    let table = run(
        &config,
        &inputs.profiles,
        &inputs.usage,
        &inputs.customer,
        inputs.predictions.as_deref(),
        inputs.labels.as_deref(),
    )?;

    if let Some(path) = out_path {
        let json = serde_json::to_string_pretty(&table)?;
        std::fs::write(path, json).with_context(|| format!("Cannot write {path}"))?;
    }

    if let Some(path) = db {
        let store = OutputStore::open(path)?;
        store.migrate()?;
        store.insert_run(
            &run_id,
            env!("CARGO_PKG_VERSION"),
            policy_name(config.alert.policy),
            &serde_json::to_string(&config)?,
        )?;
        store.insert_rows(&run_id, &table)?;
        log::info!("runner: stored {} rows in {path}", store.row_count(&run_id)?);
    }

    print_summary(&table)?;
    Ok(())
}

fn load_inputs(args: &[String]) -> Result<Inputs> {
    if args.iter().any(|a| a == "--synthetic") {
        let merchants = parse_arg(args, "--synthetic", 200usize);
        let months = parse_arg(args, "--months", 18usize);
        let seed = parse_arg(args, "--seed", 42u64);
        let panels = synth::generate(seed, merchants, months);
        return Ok(Inputs {
            profiles:    panels.profiles,
            usage:       panels.usage,
            customer:    panels.customer,
            predictions: Some(panels.predictions),
            labels:      Some(panels.labels),
            source:      format!("synthetic ({merchants} merchants x {months} months, seed {seed})"),
        });
    }

    let Some(usage_path) = arg_value(args, "--usage") else {
        bail!("--usage is required unless --synthetic is given");
    };
    Ok(Inputs {
        profiles:    optional_table(args, "--profile")?.unwrap_or_default(),
        usage:       load_table(usage_path)?,
        customer:    optional_table(args, "--customer")?.unwrap_or_default(),
        predictions: optional_table(args, "--predictions")?,
        labels:      optional_table(args, "--labels")?,
        source:      usage_path.to_string(),
    })
}

/// Read a JSON array of records.
fn load_table<T: DeserializeOwned>(path: &str) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Cannot read {path}"))?;
    let rows: Vec<T> = serde_json::from_str(&content).with_context(|| format!("Cannot parse {path}"))?;
    log::debug!("runner: loaded {} rows from {path}", rows.len());
    Ok(rows)
}

fn optional_table<T: DeserializeOwned>(args: &[String], flag: &str) -> Result<Option<Vec<T>>> {
    arg_value(args, flag).map(load_table).transpose()
}

fn print_summary(table: &OutputTable) -> Result<()> {
    let counts = table.alert_counts();
    let months = table.months();
    let merchants = {
        let mut ids: Vec<&str> = table.rows.iter().map(|r| r.merchant_id.as_str()).collect();
        ids.dedup();
        ids.len()
    };

    println!("=== RUN SUMMARY ===");
    println!("  rows:       {}", table.len());
    println!("  merchants:  {merchants}");
    if let (Some(first), Some(last)) = (months.first(), months.last()) {
        println!("  months:     {first} .. {last}");
    }
    for label in AlertLabel::ALL.iter().rev() {
        println!("  {:<10}  {}", format!("{label}:"), counts[label]);
    }

    let Some(&latest) = months.last() else {
        return Ok(());
    };

    println!();
    println!("=== BENCHMARK ({latest}) ===");
    for metric in [Metric::SalesRisk, Metric::CustomerRisk, Metric::MarketRisk, Metric::PFinal] {
        let s = benchmark(table, metric, Some(latest))?;
        println!(
            "  {:<14} mean {:.3} | median {:.3} | p25 {:.3} | p75 {:.3} | n {}",
            metric.column(), s.mean, s.median, s.p25, s.p75, s.sample_size
        );
    }

    let mut flagged: Vec<_> = table
        .rows
        .iter()
        .filter(|r| r.year_month == latest && r.alert == AlertLabel::Red)
        .collect();
    flagged.sort_by(|a, b| b.p_final.total_cmp(&a.p_final));

    println!();
    println!("=== RED ALERTS ({latest}) ===");
    if flagged.is_empty() {
        println!("  (none)");
    }
    for row in flagged.iter().take(10) {
        println!("  {} | p_final {:.3} | {}", row.merchant_id, row.p_final, explain(row).join("; "));
    }
    Ok(())
}

fn parse_policy(raw: &str) -> Result<AlertPolicyKind> {
    match raw {
        "fixed" => Ok(AlertPolicyKind::Fixed),
        "quantile" => Ok(AlertPolicyKind::Quantile),
        other => bail!("Unknown policy '{other}' (expected fixed or quantile)"),
    }
}

fn policy_name(policy: AlertPolicyKind) -> &'static str {
    match policy {
        AlertPolicyKind::Fixed => "fixed",
        AlertPolicyKind::Quantile => "quantile",
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
