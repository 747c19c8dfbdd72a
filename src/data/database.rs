//! SQLite storage for players and season batting lines

use crate::{Player, PlayerId, Result, SeasonRecord};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Maximum results returned by a player search
pub const SEARCH_LIMIT: usize = 12;

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS players (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                birth_year INTEGER
            );

            CREATE TABLE IF NOT EXISTS seasons (
                player_id TEXT NOT NULL REFERENCES players(id),
                year INTEGER NOT NULL,
                pa INTEGER NOT NULL,
                obp REAL NOT NULL,
                slg REAL NOT NULL,
                age REAL NOT NULL,
                PRIMARY KEY (player_id, year)
            );

            CREATE INDEX IF NOT EXISTS idx_seasons_player ON seasons(player_id, year);
            CREATE INDEX IF NOT EXISTS idx_players_name ON players(name);
            "#,
        )?;
        Ok(())
    }

    /// Insert or replace a batch of players
    pub fn upsert_players(&mut self, players: &[Player]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO players (id, name, birth_year) VALUES (?1, ?2, ?3)",
            )?;
            for p in players {
                stmt.execute(params![p.id.0, p.name, p.birth_year])?;
            }
        }
        tx.commit()?;
        Ok(players.len())
    }

    /// Insert or replace a batch of season records
    pub fn upsert_seasons(&mut self, seasons: &[SeasonRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO seasons (player_id, year, pa, obp, slg, age)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for s in seasons {
                stmt.execute(params![s.player_id.0, s.year, s.pa, s.obp, s.slg, s.age])?;
            }
        }
        tx.commit()?;
        Ok(seasons.len())
    }

    /// Resolve a player by exact full name, case-insensitive
    pub fn find_player_by_name(&self, name: &str) -> Result<Option<Player>> {
        let player = self
            .conn
            .query_row(
                "SELECT id, name, birth_year FROM players
                 WHERE LOWER(name) = LOWER(?1) LIMIT 1",
                params![name.trim()],
                Self::row_to_player,
            )
            .optional()?;
        Ok(player)
    }

    /// Case-insensitive substring search over players whose most recent
    /// season reaches `min_pa`, capped at [`SEARCH_LIMIT`] matches.
    pub fn search_players(&self, query: &str, min_pa: u32) -> Result<Vec<Player>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.name, p.birth_year
             FROM players p
             JOIN seasons s ON s.player_id = p.id
             WHERE LOWER(p.name) LIKE '%' || ?1 || '%'
               AND s.year = (SELECT MAX(year) FROM seasons WHERE player_id = p.id)
               AND s.pa >= ?2
             ORDER BY p.name
             LIMIT ?3",
        )?;
        let players = stmt
            .query_map(params![query, min_pa, SEARCH_LIMIT as i64], Self::row_to_player)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(players)
    }

    /// Season records for a player strictly before `year`, ascending
    pub fn get_history_before(&self, player_id: &PlayerId, year: i32) -> Result<Vec<SeasonRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT player_id, year, pa, obp, slg, age FROM seasons
             WHERE player_id = ?1 AND year < ?2
             ORDER BY year ASC",
        )?;
        let seasons = stmt
            .query_map(params![player_id.0, year], Self::row_to_season)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(seasons)
    }

    /// All season records, ordered by player then year
    pub fn load_all_seasons(&self) -> Result<Vec<SeasonRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT player_id, year, pa, obp, slg, age FROM seasons
             ORDER BY player_id, year",
        )?;
        let seasons = stmt
            .query_map([], Self::row_to_season)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(seasons)
    }

    pub fn player_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM players", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn season_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM seasons", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn row_to_player(row: &rusqlite::Row<'_>) -> rusqlite::Result<Player> {
        Ok(Player {
            id: PlayerId(row.get(0)?),
            name: row.get(1)?,
            birth_year: row.get(2)?,
        })
    }

    fn row_to_season(row: &rusqlite::Row<'_>) -> rusqlite::Result<SeasonRecord> {
        Ok(SeasonRecord {
            player_id: PlayerId(row.get(0)?),
            year: row.get(1)?,
            pa: row.get(2)?,
            obp: row.get(3)?,
            slg: row.get(4)?,
            age: row.get(5)?,
        })
    }
}
