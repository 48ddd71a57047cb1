use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

use match_features::config::EngineConfig;
use match_features::{FeatureEngine, feature_export, match_store};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_tracing();

    let db_path = parse_path_arg("--db")
        .or_else(|| std::env::var("MATCH_DB_PATH").ok().map(PathBuf::from))
        .or_else(match_store::default_db_path)
        .context("unable to resolve sqlite path")?;

    let mut cfg = match parse_path_arg("--config") {
        Some(path) => EngineConfig::load_file(&path)?,
        None => EngineConfig::default(),
    };
    cfg.apply_env().context("apply FEATURES_* overrides")?;
    let engine = FeatureEngine::new(cfg).context("invalid engine config")?;
    let strict = has_flag("--strict");

    let conn = match_store::open_db(&db_path)?;
    let league_ids = match parse_league_ids_arg() {
        Some(ids) => ids,
        None => match_store::list_league_ids(&conn)?,
    };
    if league_ids.is_empty() {
        return Err(anyhow!("no league ids resolved for feature build"));
    }

    let mut rows = Vec::new();
    for league_id in &league_ids {
        let league_rows = match_store::load_league_rows(&conn, *league_id)
            .with_context(|| format!("load matches for league {league_id}"))?;
        if league_rows.is_empty() {
            warn!(league_id = *league_id, "no matches stored for league");
        }
        rows.extend(league_rows);
    }
    info!(leagues = league_ids.len(), matches = rows.len(), "loaded match log");

    let mut features = Vec::new();
    let mut failed = Vec::new();
    for run in engine.build_leagues(rows) {
        match run.result {
            Ok(league_rows) => {
                info!(league_id = run.league_id, rows = league_rows.len(), "league done");
                features.extend(league_rows);
            }
            Err(err) => {
                if strict {
                    return Err(anyhow!("league {} failed: {err}", run.league_id));
                }
                failed.push((run.league_id, err));
            }
        }
    }

    println!("Feature build complete");
    println!("DB: {}", db_path.display());
    println!("Leagues: {:?}", league_ids);
    println!("Rows: {}", features.len());
    if !failed.is_empty() {
        println!("Skipped leagues: {}", failed.len());
        for (league_id, err) in &failed {
            println!("   - league {league_id}: {err}");
        }
    }

    if let Some(path) = parse_path_arg("--out") {
        let n = feature_export::write_jsonl(&path, &features)?;
        println!("Wrote {} rows to {}", n, path.display());
    }
    if let Some(path) = parse_path_arg("--xlsx") {
        let report = feature_export::write_xlsx(&path, &features)?;
        println!(
            "Wrote workbook {} (rows={} leagues={} pending={})",
            path.display(),
            report.rows,
            report.leagues,
            report.pending
        );
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn parse_path_arg(name: &str) -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix(&format!("{name}=")) {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == name {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == name)
}

fn parse_league_ids_arg() -> Option<Vec<u32>> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix("--league-ids=") {
            let ids = parse_ids(raw);
            if !ids.is_empty() {
                return Some(ids);
            }
        }
        if arg == "--league-ids"
            && let Some(next) = args.get(idx + 1)
        {
            let ids = parse_ids(next);
            if !ids.is_empty() {
                return Some(ids);
            }
        }
    }
    None
}

fn parse_ids(raw: &str) -> Vec<u32> {
    let mut seen = HashSet::new();
    raw.split([',', ';', ' '])
        .filter_map(|part| part.trim().parse::<u32>().ok())
        .filter(|id| *id != 0 && seen.insert(*id))
        .collect()
}
