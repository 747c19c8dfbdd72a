//! CSV ingestion of raw batting and biographical data
//!
//! Reads Lahman-style files: a batting CSV with one row per player-stint
//! and a people CSV with names and birth years. Stints are aggregated to
//! per-player-season counting totals, from which PA, OBP, and SLG are
//! derived once. The rest of the system only ever sees the aggregated
//! season lines.

use crate::data::Database;
use crate::{Player, PlayerId, Result, SeasonRecord};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Seasons before this year are ignored
const MIN_YEAR: i32 = 2000;
/// Ages are clipped to this range; missing birth years get the median age
const AGE_MIN: f64 = 15.0;
const AGE_MAX: f64 = 50.0;

/// One batting CSV row (a single stint)
#[derive(Debug, Clone, Deserialize)]
pub struct BattingRow {
    #[serde(rename = "playerID")]
    pub player_id: String,
    #[serde(rename = "yearID")]
    pub year: i32,
    #[serde(rename = "AB", default)]
    pub ab: Option<u32>,
    #[serde(rename = "H", default)]
    pub h: Option<u32>,
    #[serde(rename = "2B", default)]
    pub doubles: Option<u32>,
    #[serde(rename = "3B", default)]
    pub triples: Option<u32>,
    #[serde(rename = "HR", default)]
    pub hr: Option<u32>,
    #[serde(rename = "BB", default)]
    pub bb: Option<u32>,
    #[serde(rename = "HBP", default)]
    pub hbp: Option<u32>,
    #[serde(rename = "SF", default)]
    pub sf: Option<u32>,
}

/// One people CSV row
#[derive(Debug, Clone, Deserialize)]
pub struct PeopleRow {
    #[serde(rename = "playerID")]
    pub player_id: String,
    #[serde(rename = "birthYear", default)]
    pub birth_year: Option<i32>,
    #[serde(rename = "nameFirst", default)]
    pub name_first: Option<String>,
    #[serde(rename = "nameLast", default)]
    pub name_last: Option<String>,
}

/// Counting totals for one player-season
#[derive(Debug, Clone, Copy, Default)]
pub struct SeasonTotals {
    pub ab: u32,
    pub h: u32,
    pub doubles: u32,
    pub triples: u32,
    pub hr: u32,
    pub bb: u32,
    pub hbp: u32,
    pub sf: u32,
}

impl SeasonTotals {
    fn add(&mut self, row: &BattingRow) {
        self.ab += row.ab.unwrap_or(0);
        self.h += row.h.unwrap_or(0);
        self.doubles += row.doubles.unwrap_or(0);
        self.triples += row.triples.unwrap_or(0);
        self.hr += row.hr.unwrap_or(0);
        self.bb += row.bb.unwrap_or(0);
        self.hbp += row.hbp.unwrap_or(0);
        self.sf += row.sf.unwrap_or(0);
    }

    /// Plate appearances: AB + BB + HBP + SF
    pub fn pa(&self) -> u32 {
        self.ab + self.bb + self.hbp + self.sf
    }

    /// On-base percentage, 0 when the denominator is empty, clipped to [0, 1]
    pub fn obp(&self) -> f64 {
        let den = self.pa();
        if den == 0 {
            return 0.0;
        }
        let num = (self.h + self.bb + self.hbp) as f64;
        (num / den as f64).clamp(0.0, 1.0)
    }

    /// Slugging percentage, 0 when AB is empty, clipped to [0, 2]
    pub fn slg(&self) -> f64 {
        if self.ab == 0 {
            return 0.0;
        }
        let singles = self.h as f64 - (self.doubles + self.triples + self.hr) as f64;
        let total_bases =
            singles + 2.0 * self.doubles as f64 + 3.0 * self.triples as f64 + 4.0 * self.hr as f64;
        (total_bases / self.ab as f64).clamp(0.0, 2.0)
    }
}

/// Aggregate stint rows to per-(player, year) totals, dropping seasons
/// before [`MIN_YEAR`].
pub fn aggregate_seasons(rows: &[BattingRow]) -> HashMap<(String, i32), SeasonTotals> {
    let mut totals: HashMap<(String, i32), SeasonTotals> = HashMap::new();
    for row in rows {
        if row.year < MIN_YEAR {
            continue;
        }
        totals
            .entry((row.player_id.clone(), row.year))
            .or_default()
            .add(row);
    }
    totals
}

/// Build season records from aggregated totals and birth years.
///
/// Age is year minus birth year; players with no recorded birth year get
/// the median of the known ages, and all ages are clipped to [15, 50].
pub fn build_season_records(
    totals: &HashMap<(String, i32), SeasonTotals>,
    birth_years: &HashMap<String, i32>,
) -> Vec<SeasonRecord> {
    let mut known_ages: Vec<f64> = totals
        .keys()
        .filter_map(|(id, year)| birth_years.get(id).map(|b| (year - b) as f64))
        .collect();
    known_ages.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median_age = median(&known_ages).unwrap_or(28.0);

    let mut records: Vec<SeasonRecord> = totals
        .iter()
        .map(|((id, year), t)| {
            let age = birth_years
                .get(id)
                .map(|b| (year - b) as f64)
                .unwrap_or(median_age)
                .clamp(AGE_MIN, AGE_MAX);
            SeasonRecord {
                player_id: PlayerId(id.clone()),
                year: *year,
                pa: t.pa(),
                obp: t.obp(),
                slg: t.slg(),
                age,
            }
        })
        .collect();
    records.sort_by(|a, b| (&a.player_id.0, a.year).cmp(&(&b.player_id.0, b.year)));
    records
}

fn median(sorted: &[f64]) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let n = sorted.len();
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    }
}

/// Parse a batting CSV from any reader
pub fn read_batting<R: Read>(reader: R) -> Result<Vec<BattingRow>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Parse a people CSV from any reader
pub fn read_people<R: Read>(reader: R) -> Result<Vec<PeopleRow>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Summary of an ingestion run
#[derive(Debug, Clone, Copy)]
pub struct IngestSummary {
    pub players: usize,
    pub seasons: usize,
}

/// Ingest batting and people CSV files into the database
pub fn ingest_files<P: AsRef<Path>>(
    db: &mut Database,
    batting_path: P,
    people_path: P,
) -> Result<IngestSummary> {
    log::info!(
        "Reading batting data from {}",
        batting_path.as_ref().display()
    );
    let batting = read_batting(std::fs::File::open(batting_path)?)?;
    log::info!("Read {} stint rows", batting.len());

    log::info!("Reading people from {}", people_path.as_ref().display());
    let people = read_people(std::fs::File::open(people_path)?)?;

    let players: Vec<Player> = people
        .iter()
        .map(|p| {
            let name = match (&p.name_first, &p.name_last) {
                (Some(first), Some(last)) => format!("{} {}", first.trim(), last.trim()),
                _ => p.player_id.clone(),
            };
            Player {
                id: PlayerId(p.player_id.clone()),
                name,
                birth_year: p.birth_year,
            }
        })
        .collect();

    let birth_years: HashMap<String, i32> = people
        .iter()
        .filter_map(|p| p.birth_year.map(|b| (p.player_id.clone(), b)))
        .collect();

    let totals = aggregate_seasons(&batting);
    let records = build_season_records(&totals, &birth_years);

    let players = db.upsert_players(&players)?;
    let seasons = db.upsert_seasons(&records)?;
    log::info!("Stored {} players, {} season lines", players, seasons);

    Ok(IngestSummary { players, seasons })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BATTING_CSV: &str = "\
playerID,yearID,stint,AB,H,2B,3B,HR,BB,HBP,SF
troutmi01,2024,1,400,120,25,2,30,80,5,4
troutmi01,2024,2,100,30,5,1,8,20,1,1
oldguy01,1999,1,500,150,30,3,20,60,2,5
pitcher01,2024,1,0,0,0,0,0,1,0,0
sparse01,2024,1,10,2,,,1,,,
";

    const PEOPLE_CSV: &str = "\
playerID,birthYear,nameFirst,nameLast
troutmi01,1991,Mike,Trout
oldguy01,1965,Old,Guy
pitcher01,,Arm,Only
sparse01,1998,Sparse,Line
";

    #[test]
    fn test_stints_aggregate_within_season() {
        let rows = read_batting(BATTING_CSV.as_bytes()).unwrap();
        let totals = aggregate_seasons(&rows);
        let t = totals.get(&("troutmi01".to_string(), 2024)).unwrap();
        assert_eq!(t.ab, 500);
        assert_eq!(t.h, 150);
        assert_eq!(t.hr, 38);
        assert_eq!(t.pa(), 500 + 100 + 6 + 5);
    }

    #[test]
    fn test_seasons_before_cutoff_dropped() {
        let rows = read_batting(BATTING_CSV.as_bytes()).unwrap();
        let totals = aggregate_seasons(&rows);
        assert!(!totals.contains_key(&("oldguy01".to_string(), 1999)));
    }

    #[test]
    fn test_missing_fields_count_as_zero() {
        let rows = read_batting(BATTING_CSV.as_bytes()).unwrap();
        let totals = aggregate_seasons(&rows);
        let t = totals.get(&("sparse01".to_string(), 2024)).unwrap();
        assert_eq!(t.ab, 10);
        assert_eq!(t.bb, 0);
        assert_eq!(t.hr, 1);
    }

    #[test]
    fn test_obp_slg_derivation() {
        let t = SeasonTotals {
            ab: 500,
            h: 150,
            doubles: 30,
            triples: 3,
            hr: 20,
            bb: 60,
            hbp: 2,
            sf: 5,
            ..Default::default()
        };
        // OBP = (150 + 60 + 2) / 567
        assert!((t.obp() - 212.0 / 567.0).abs() < 1e-12);
        // TB = 97 + 60 + 9 + 80 = 246
        assert!((t.slg() - 246.0 / 500.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_denominators_are_guarded() {
        let empty = SeasonTotals::default();
        assert_eq!(empty.obp(), 0.0);
        assert_eq!(empty.slg(), 0.0);

        // A walk-only line has PA but no AB
        let walks = SeasonTotals {
            bb: 1,
            ..Default::default()
        };
        assert!((walks.obp() - 1.0).abs() < 1e-12);
        assert_eq!(walks.slg(), 0.0);
    }

    #[test]
    fn test_ages_derived_and_median_filled() {
        let rows = read_batting(BATTING_CSV.as_bytes()).unwrap();
        let people = read_people(PEOPLE_CSV.as_bytes()).unwrap();
        let birth_years: HashMap<String, i32> = people
            .iter()
            .filter_map(|p| p.birth_year.map(|b| (p.player_id.clone(), b)))
            .collect();

        let totals = aggregate_seasons(&rows);
        let records = build_season_records(&totals, &birth_years);

        let trout = records
            .iter()
            .find(|r| r.player_id.0 == "troutmi01")
            .unwrap();
        assert!((trout.age - 33.0).abs() < 1e-12);

        // pitcher01 has no birth year: median of known ages (26, 33) = 29.5
        let pitcher = records
            .iter()
            .find(|r| r.player_id.0 == "pitcher01")
            .unwrap();
        assert!((pitcher.age - 29.5).abs() < 1e-12);
    }

    #[test]
    fn test_ingest_into_database() {
        let mut db = Database::in_memory().unwrap();

        let batting_path = std::env::temp_dir().join("batcast_test_batting.csv");
        let people_path = std::env::temp_dir().join("batcast_test_people.csv");
        std::fs::write(&batting_path, BATTING_CSV).unwrap();
        std::fs::write(&people_path, PEOPLE_CSV).unwrap();

        let summary = ingest_files(&mut db, &batting_path, &people_path).unwrap();
        assert_eq!(summary.players, 4);
        assert_eq!(summary.seasons, 3);

        let found = db.find_player_by_name("Mike Trout").unwrap().unwrap();
        assert_eq!(found.id.0, "troutmi01");

        let _ = std::fs::remove_file(&batting_path);
        let _ = std::fs::remove_file(&people_path);
    }
}
