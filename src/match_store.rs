use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};

use crate::timeline::{LeagueId, RawMatchRow};

pub fn default_db_path() -> Option<PathBuf> {
    let base = std::env::var("XDG_DATA_HOME")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|home| PathBuf::from(home).join(".local").join("share"))
        })?;
    Some(base.join("match_features").join("matches.sqlite"))
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create db directory {}", parent.display()))?;
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))
        .context("enable wal journal")?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Team ids and dates are nullable on purpose: a broken row must reach the
/// engine and be rejected there, not vanish in the query.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS matches (
            match_id INTEGER PRIMARY KEY,
            league_id INTEGER NOT NULL,
            season TEXT NOT NULL,
            match_date TEXT NULL,
            kickoff TEXT NULL,
            home_team_id INTEGER NULL,
            away_team_id INTEGER NULL,
            home_score INTEGER NULL,
            away_score INTEGER NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_league ON matches(league_id);
        CREATE INDEX IF NOT EXISTS idx_matches_date ON matches(match_date);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

pub fn upsert_match(conn: &Connection, m: &RawMatchRow) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO matches (
            match_id, league_id, season, match_date, kickoff,
            home_team_id, away_team_id, home_score, away_score, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(match_id) DO UPDATE SET
            league_id = excluded.league_id,
            season = excluded.season,
            match_date = excluded.match_date,
            kickoff = excluded.kickoff,
            home_team_id = excluded.home_team_id,
            away_team_id = excluded.away_team_id,
            home_score = excluded.home_score,
            away_score = excluded.away_score,
            updated_at = excluded.updated_at
        "#,
        params![
            m.match_id as i64,
            m.league_id as i64,
            m.season,
            m.date,
            m.kickoff,
            m.home_team_id.map(i64::from),
            m.away_team_id.map(i64::from),
            m.home_score,
            m.away_score,
            Utc::now().to_rfc3339(),
        ],
    )
    .with_context(|| format!("upsert match {}", m.match_id))?;
    Ok(())
}

/// Upsert a batch in one transaction. Returns the number of rows written.
pub fn upsert_matches(conn: &mut Connection, rows: &[RawMatchRow]) -> Result<usize> {
    let tx = conn.transaction().context("begin upsert transaction")?;
    for row in rows {
        upsert_match(&tx, row)?;
    }
    tx.commit().context("commit upsert transaction")?;
    Ok(rows.len())
}

/// Every match of a league, played or not. Ordering is only a convenience;
/// the engine sorts again.
pub fn load_league_rows(conn: &Connection, league_id: LeagueId) -> Result<Vec<RawMatchRow>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                match_id, league_id, season, match_date, kickoff,
                home_team_id, away_team_id, home_score, away_score
            FROM matches
            WHERE league_id = ?1
            ORDER BY match_date ASC, kickoff ASC, match_id ASC
            "#,
        )
        .context("prepare load matches query")?;

    let rows = stmt
        .query_map(params![league_id as i64], |row| {
            Ok(RawMatchRow {
                match_id: row.get::<_, i64>(0)? as u64,
                league_id: row.get::<_, u32>(1)?,
                season: row.get(2)?,
                date: row.get(3)?,
                kickoff: row.get(4)?,
                home_team_id: row.get::<_, Option<u32>>(5)?,
                away_team_id: row.get::<_, Option<u32>>(6)?,
                home_score: row.get(7)?,
                away_score: row.get(8)?,
            })
        })
        .context("query load matches")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode match row")?);
    }
    Ok(out)
}

pub fn list_league_ids(conn: &Connection) -> Result<Vec<LeagueId>> {
    let mut stmt = conn
        .prepare("SELECT DISTINCT league_id FROM matches ORDER BY league_id ASC")
        .context("prepare league ids query")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, u32>(0))
        .context("query league ids")?;
    let mut out = Vec::new();
    for id in ids {
        out.push(id.context("decode league id")?);
    }
    Ok(out)
}
