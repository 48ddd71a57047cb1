use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use match_features::RawMatchRow;
use match_features::match_store;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let input = parse_path_arg("--input").ok_or_else(|| anyhow!("--input FILE.json is required"))?;
    let db_path = parse_path_arg("--db")
        .or_else(|| std::env::var("MATCH_DB_PATH").ok().map(PathBuf::from))
        .or_else(match_store::default_db_path)
        .context("unable to resolve sqlite path")?;

    let raw = fs::read_to_string(&input)
        .with_context(|| format!("read match file {}", input.display()))?;
    let rows: Vec<RawMatchRow> =
        serde_json::from_str(raw.trim()).context("invalid match rows json")?;
    if rows.is_empty() {
        return Err(anyhow!("no match rows in {}", input.display()));
    }

    let mut conn = match_store::open_db(&db_path)?;
    let written = match_store::upsert_matches(&mut conn, &rows)?;
    tracing::info!(rows = written, db = %db_path.display(), "import finished");

    let mut per_league: BTreeMap<u32, usize> = BTreeMap::new();
    for row in &rows {
        *per_league.entry(row.league_id).or_default() += 1;
    }

    println!("Match import complete");
    println!("DB: {}", db_path.display());
    println!("Matches upserted: {written}");
    for (league_id, count) in per_league {
        println!("league {league_id}: {count}");
    }
    Ok(())
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
