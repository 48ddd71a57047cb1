use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::features::FeatureRow;
use crate::timeline::LeagueId;

const ID_HEADERS: &[&str] = &[
    "match_id",
    "league_id",
    "season",
    "date",
    "home_team_id",
    "away_team_id",
    "completed",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub rows: usize,
    pub leagues: usize,
    pub pending: usize,
}

/// One JSON object per line, in the order given.
pub fn write_jsonl(path: &Path, rows: &[FeatureRow]) -> Result<usize> {
    let file =
        File::create(path).with_context(|| format!("create jsonl file {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for row in rows {
        serde_json::to_writer(&mut out, row)
            .with_context(|| format!("serialize feature row {}", row.match_id))?;
        out.write_all(b"\n").context("write jsonl newline")?;
    }
    out.flush().context("flush jsonl file")?;
    Ok(rows.len())
}

/// Workbook with a `Features` sheet (one row per match) and a `Leagues`
/// summary sheet.
pub fn write_xlsx(path: &Path, rows: &[FeatureRow]) -> Result<ExportReport> {
    let mut per_league: BTreeMap<LeagueId, (usize, usize)> = BTreeMap::new();
    for row in rows {
        let entry = per_league.entry(row.league_id).or_default();
        entry.0 += 1;
        if !row.completed {
            entry.1 += 1;
        }
    }

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Features")?;
        write_feature_rows(sheet, rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Leagues")?;
        for (col, header) in ["league_id", "rows", "pending"].iter().enumerate() {
            sheet
                .write_string(0, col as u16, *header)
                .with_context(|| format!("write league header {col}"))?;
        }
        for (idx, (league_id, (count, pending))) in per_league.iter().enumerate() {
            let r = (idx + 1) as u32;
            sheet.write_number(r, 0, *league_id as f64)?;
            sheet.write_number(r, 1, *count as f64)?;
            sheet.write_number(r, 2, *pending as f64)?;
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        rows: rows.len(),
        leagues: per_league.len(),
        pending: per_league.values().map(|(_, p)| *p).sum(),
    })
}

fn write_feature_rows(worksheet: &mut Worksheet, rows: &[FeatureRow]) -> Result<()> {
    let Some(first) = rows.first() else {
        for (col, header) in ID_HEADERS.iter().enumerate() {
            worksheet.write_string(0, col as u16, *header)?;
        }
        return Ok(());
    };

    let feature_names = first
        .feature_columns()
        .into_iter()
        .map(|(name, _)| name)
        .collect::<Vec<_>>();
    for (col, header) in ID_HEADERS.iter().chain(feature_names.iter()).enumerate() {
        worksheet
            .write_string(0, col as u16, *header)
            .with_context(|| format!("write header cell {col}"))?;
    }

    for (idx, row) in rows.iter().enumerate() {
        let r = (idx + 1) as u32;
        worksheet.write_number(r, 0, row.match_id as f64)?;
        worksheet.write_number(r, 1, row.league_id as f64)?;
        worksheet.write_string(r, 2, row.season.as_str())?;
        worksheet.write_string(r, 3, row.date.format("%Y-%m-%d").to_string())?;
        worksheet.write_number(r, 4, row.home_team_id as f64)?;
        worksheet.write_number(r, 5, row.away_team_id as f64)?;
        worksheet.write_boolean(r, 6, row.completed)?;
        for (offset, (_, value)) in row.feature_columns().into_iter().enumerate() {
            let col = (ID_HEADERS.len() + offset) as u16;
            worksheet
                .write_number(r, col, value)
                .with_context(|| format!("write cell ({r},{col})"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::features::FeatureEngine;
    use crate::timeline::RawMatchRow;

    fn rows() -> Vec<FeatureRow> {
        let engine = FeatureEngine::new(EngineConfig::default()).unwrap();
        let raw = vec![
            RawMatchRow {
                match_id: 1,
                league_id: 5,
                season: "2024".to_string(),
                date: Some("2024-09-01".to_string()),
                kickoff: None,
                home_team_id: Some(1),
                away_team_id: Some(2),
                home_score: Some(1),
                away_score: Some(0),
            },
            RawMatchRow {
                match_id: 2,
                league_id: 5,
                season: "2024".to_string(),
                date: Some("2024-09-08".to_string()),
                kickoff: None,
                home_team_id: Some(2),
                away_team_id: Some(1),
                home_score: None,
                away_score: None,
            },
        ];
        engine.build_league(5, &raw).unwrap()
    }

    #[test]
    fn jsonl_has_one_parseable_line_per_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.jsonl");
        let rows = rows();
        assert_eq!(write_jsonl(&path, &rows).unwrap(), 2);

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed = raw
            .lines()
            .map(|l| serde_json::from_str::<FeatureRow>(l).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(parsed.len(), rows.len());
        assert_eq!(parsed[0].match_id, 1);
        assert!(!parsed[1].completed);
        assert!((parsed[1].home_elo - rows[1].home_elo).abs() < 1e-9);
    }

    #[test]
    fn xlsx_report_counts_pending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.xlsx");
        let report = write_xlsx(&path, &rows()).unwrap();
        assert_eq!(
            report,
            ExportReport {
                rows: 2,
                leagues: 1,
                pending: 1
            }
        );
        assert!(path.exists());
    }
}
