//! Session summary + persistence collaborator
//!
//! Сводка: плоская запись (score, kills, elapsed, outcome, seed). Store
//! получает её на Victory/Defeat/abort; ошибки store логируются и на
//! симуляцию не влияют.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::state::{GameSession, MatchOutcome};
use crate::error::{SimulationError, SimulationResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub score: u32,
    pub kills: u32,
    pub elapsed_ticks: u64,
    pub elapsed_secs: f64,
    pub outcome: MatchOutcome,
    pub seed: u64,
}

impl SessionSummary {
    pub fn from_session(session: &GameSession) -> Self {
        Self {
            score: session.score,
            kills: session.kills,
            elapsed_ticks: session.elapsed_ticks,
            elapsed_secs: session.elapsed_secs(),
            outcome: session.outcome.unwrap_or(MatchOutcome::Aborted),
            seed: session.seed,
        }
    }
}

pub trait SessionStore: Send {
    fn save(&mut self, summary: &SessionSummary) -> SimulationResult<()>;

    fn load_all(&self) -> SimulationResult<Vec<SessionSummary>>;
}

/// In-memory store (тесты, headless runner)
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Vec<SessionSummary>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[SessionSummary] {
        &self.records
    }
}

impl SessionStore for MemoryStore {
    fn save(&mut self, summary: &SessionSummary) -> SimulationResult<()> {
        self.records.push(summary.clone());
        Ok(())
    }

    fn load_all(&self) -> SimulationResult<Vec<SessionSummary>> {
        Ok(self.records.clone())
    }
}

/// JSON lines файл: одна сводка на строку, append
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for JsonFileStore {
    fn save(&mut self, summary: &SessionSummary) -> SimulationResult<()> {
        let line = serde_json::to_string(summary).map_err(|err| SimulationError::Persistence(err.to_string()))?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    fn load_all(&self) -> SimulationResult<Vec<SessionSummary>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(|err| SimulationError::Persistence(err.to_string())))
            .collect()
    }
}
