use std::collections::HashMap;
use std::sync::atomic::AtomicBool;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use match_features::config::EngineConfig;
use match_features::timeline::load_timeline;
use match_features::{FeatureAssembler, FeatureEngine, FeatureError, FeatureRow, RawMatchRow};

fn row(
    id: u64,
    league_id: u32,
    date: &str,
    home: u32,
    away: u32,
    score: Option<(i32, i32)>,
) -> RawMatchRow {
    RawMatchRow {
        match_id: id,
        league_id,
        season: "2023/2024".to_string(),
        date: Some(date.to_string()),
        kickoff: None,
        home_team_id: Some(home),
        away_team_id: Some(away),
        home_score: score.map(|s| s.0),
        away_score: score.map(|s| s.1),
    }
}

/// A few seasons' worth of fixtures over three leagues that reuse team ids,
/// with same-day ties and a sprinkling of unplayed matches.
fn synthetic_log() -> Vec<RawMatchRow> {
    let start = chrono::NaiveDate::from_ymd_opt(2022, 8, 6).unwrap();
    let mut rows = Vec::new();
    for i in 0..360u64 {
        let league_id = 1 + (i % 3) as u32;
        let home = ((i * 7) % 8 + 1) as u32;
        let mut away = ((i * 3 + 1) % 8 + 1) as u32;
        if away == home {
            away = home % 8 + 1;
        }
        let date = start + chrono::Duration::days((i / 6) as i64 * 3);
        let score = if i % 17 == 0 {
            None
        } else {
            Some((((i * 5) % 4) as i32, ((i * 11) % 3) as i32))
        };
        let mut r = row(
            1000 + i,
            league_id,
            &date.format("%Y-%m-%d").to_string(),
            home,
            away,
            score,
        );
        if i % 4 == 0 {
            r.kickoff = Some(format!("{}T{:02}:00:00Z", date.format("%Y-%m-%d"), 12 + i % 8));
        }
        rows.push(r);
    }
    rows
}

fn engine() -> FeatureEngine {
    FeatureEngine::new(EngineConfig::default()).expect("default config is valid")
}

fn collect_rows(engine: &FeatureEngine, rows: Vec<RawMatchRow>) -> Vec<FeatureRow> {
    engine
        .build_leagues(rows)
        .into_iter()
        .flat_map(|run| run.result.expect("league pass succeeds"))
        .collect()
}

#[test]
fn output_is_identical_for_any_input_order() {
    let engine = engine();
    let baseline = serde_json::to_string(&collect_rows(&engine, synthetic_log())).unwrap();

    for seed in [1u64, 7, 42] {
        let mut shuffled = synthetic_log();
        shuffled.shuffle(&mut StdRng::seed_from_u64(seed));
        let again = serde_json::to_string(&collect_rows(&engine, shuffled)).unwrap();
        assert_eq!(baseline, again, "seed {seed} changed the output");
    }
}

#[test]
fn parallel_run_matches_sequential_passes() {
    let engine = engine();
    let parallel = collect_rows(&engine, synthetic_log());

    let mut by_league: HashMap<u32, Vec<RawMatchRow>> = HashMap::new();
    for r in synthetic_log() {
        by_league.entry(r.league_id).or_default().push(r);
    }
    let mut sequential = Vec::new();
    for league_id in [1, 2, 3] {
        sequential.extend(engine.build_league(league_id, &by_league[&league_id]).unwrap());
    }
    assert_eq!(parallel, sequential);
    assert_eq!(parallel.len(), 360);
}

#[test]
fn later_matches_never_change_earlier_rows() {
    let engine = engine();
    let league_rows = synthetic_log()
        .into_iter()
        .filter(|r| r.league_id == 2)
        .collect::<Vec<_>>();
    let ordered = load_timeline(&league_rows).unwrap();
    let cut = ordered.len() / 2;
    let cut_id = ordered[cut].id;
    let later_ids = ordered[cut + 1..].iter().map(|m| m.id).collect::<Vec<_>>();

    let before = engine.build_league(2, &league_rows).unwrap();

    // Flip one later result, drop another, and add a blowout at the very end.
    let mut edited = league_rows.clone();
    if let Some(r) = edited.iter_mut().find(|r| r.match_id == later_ids[0]) {
        r.home_score = Some(9);
        r.away_score = Some(0);
    }
    edited.retain(|r| r.match_id != later_ids[1]);
    edited.push(row(99_999, 2, "2030-01-01", 1, 2, Some((12, 0))));
    let after = engine.build_league(2, &edited).unwrap();

    let prefix_before = before
        .iter()
        .take_while(|r| r.match_id != later_ids[0])
        .collect::<Vec<_>>();
    let prefix_after = after
        .iter()
        .take_while(|r| r.match_id != later_ids[0])
        .collect::<Vec<_>>();
    assert_eq!(prefix_before.len(), cut + 1);
    assert_eq!(prefix_before.last().map(|r| r.match_id), Some(cut_id));
    assert_eq!(prefix_before, prefix_after);
}

#[test]
fn first_sighting_reads_cold_start_defaults() {
    let engine = engine();
    let rows = collect_rows(&engine, synthetic_log());
    let mut seen = std::collections::HashSet::new();
    for r in rows {
        let home_new = seen.insert((r.league_id, r.home_team_id));
        let away_new = seen.insert((r.league_id, r.away_team_id));
        if home_new && away_new {
            assert_eq!(r.home_elo, 1500.0);
            assert_eq!(r.away_elo, 1500.0);
            assert_eq!(r.home_form_short, 0.0);
            assert_eq!(r.away_form_long, 0.0);
            assert_eq!(r.home_goal_diff_long, 0.0);
            assert_eq!(r.home_rest_days, 10.0);
            assert_eq!(r.away_rest_days, 10.0);
            assert_eq!(r.h2h_venue, Some(0.5));
            assert_eq!(r.h2h_neutral, Some(0.5));
        }
    }
}

#[test]
fn two_match_scenario() {
    let engine = engine();
    let rows = vec![
        row(1, 1, "2024-01-01", 1, 2, Some((20, 10))),
        row(2, 1, "2024-01-30", 2, 1, Some((15, 15))),
        row(3, 1, "2024-02-06", 1, 2, None),
    ];
    let out = engine.build_league(1, &rows).unwrap();

    // Day 30, read before the draw is applied: home side is Team 2.
    let day30 = &out[1];
    assert!(day30.away_elo > 1500.0);
    assert!(day30.home_elo < 1500.0);
    assert_eq!(day30.home_form_short, 0.0);
    assert_eq!(day30.away_form_short, 1.0);
    assert_eq!(day30.home_rest_days, 29.0);
    assert_eq!(day30.h2h_neutral, Some(0.0));
    // Team 2 has never hosted Team 1.
    assert_eq!(day30.h2h_venue, Some(0.5));

    // After the draw the two ratings close in on each other.
    let after = &out[2];
    assert!(after.home_elo < day30.away_elo);
    assert!(after.away_elo > day30.home_elo);
    assert!(after.elo_diff.abs() < (day30.home_elo - day30.away_elo).abs());
    assert_eq!(after.home_form_long, 0.5);
    assert_eq!(after.away_form_long, 0.0);
    let h2h = after.h2h_neutral.unwrap();
    assert!((h2h - 1.0 / 1.5).abs() < 1e-12);
    assert_eq!(after.h2h_venue, Some(1.0));

    let mut assembler = FeatureAssembler::new(engine.config()).unwrap();
    for m in load_timeline(&rows).unwrap() {
        assembler.process(&m);
    }
    assert_eq!(assembler.form().win_history(1, 1), &[1, 0]);
    assert_eq!(assembler.form().win_history(1, 2), &[0, 0]);
    let a = assembler.h2h().pre_match_h2h_neutral(1, 1, 2);
    let b = assembler.h2h().pre_match_h2h_neutral(1, 2, 1);
    assert!((a + b - 1.0).abs() < 1e-12);
}

#[test]
fn form_window_sees_only_recent_results() {
    let mut cfg = EngineConfig::default();
    cfg.form.short_window = 3;
    let engine = FeatureEngine::new(cfg).unwrap();
    // Team 1: two wins then three losses, then a fixture to read.
    let rows = vec![
        row(1, 1, "2024-09-01", 1, 2, Some((2, 0))),
        row(2, 1, "2024-09-08", 1, 3, Some((1, 0))),
        row(3, 1, "2024-09-15", 1, 4, Some((0, 1))),
        row(4, 1, "2024-09-22", 1, 5, Some((0, 2))),
        row(5, 1, "2024-09-29", 1, 6, Some((1, 3))),
        row(6, 1, "2024-10-06", 1, 7, None),
    ];
    let out = engine.build_league(1, &rows).unwrap();
    let last = out.last().unwrap();
    assert_eq!(last.home_form_short, 0.0);
    assert!((last.home_form_long - 0.4).abs() < 1e-12);
    assert!((last.home_goal_diff_short - (-5.0 / 3.0)).abs() < 1e-12);
}

#[test]
fn malformed_row_aborts_only_its_league() {
    let engine = engine();
    let mut rows = synthetic_log();
    let bad = rows
        .iter_mut()
        .find(|r| r.league_id == 3)
        .expect("league 3 present");
    bad.home_team_id = None;
    let bad_id = bad.match_id;

    let runs = engine.build_leagues(rows);
    assert_eq!(runs.iter().map(|r| r.league_id).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(runs[0].result.is_ok());
    assert!(runs[1].result.is_ok());
    let err = runs[2].result.clone().unwrap_err();
    assert_eq!(err.match_id(), Some(bad_id));
    assert!(matches!(err, FeatureError::MissingTeam { .. }));
}

#[test]
fn raised_stop_flag_skips_unstarted_leagues() {
    let engine = engine();
    let stop = AtomicBool::new(true);
    let runs = engine.build_leagues_until(synthetic_log(), &stop);
    assert_eq!(runs.len(), 3);
    for run in runs {
        assert_eq!(
            run.result,
            Err(FeatureError::Cancelled {
                league_id: run.league_id
            })
        );
    }
}

#[test]
fn same_team_ids_in_different_leagues_do_not_mix() {
    let engine = engine();
    let rows = vec![
        row(1, 1, "2024-09-01", 1, 2, Some((5, 0))),
        row(2, 2, "2024-09-02", 1, 2, None),
    ];
    let out = collect_rows(&engine, rows);
    let other = out.iter().find(|r| r.league_id == 2).unwrap();
    assert_eq!(other.home_elo, 1500.0);
    assert_eq!(other.home_form_short, 0.0);
    assert_eq!(other.home_rest_days, 10.0);
    assert_eq!(other.h2h_neutral, Some(0.5));
}
