// Interactive lineup sessions.
//
// A session owns one ordered set of lineups per platform. The store maps
// (session id, platform) to that set; each set sits behind its own mutex so
// concurrent edits to one set are serialized while other sets stay free.
// Lineup indices are 0-based here; the CLI shows them 1-based.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use courtside_core::export::{self, ExportError};
use courtside_core::{
    clear_all_lineups, Lineup, LineupBuilder, LineupError, Platform, PlayerId, PlayerPool,
    RosterTemplate, Slot,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::Database;

/// Upper bound on lineups in one set; growing past it is refused.
pub const MAX_LINEUPS: usize = 150;

const KEY_PREFIX: &str = "lineups:";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no player pool registered for {0}")]
    UnknownPlatform(Platform),

    #[error("lineup {index} does not exist ({count} lineups in this session)")]
    NoSuchLineup { index: usize, count: usize },

    #[error("lineup {index} exceeds the limit of {max} lineups")]
    TooManyLineups { index: usize, max: usize },

    #[error(transparent)]
    Export(#[from] ExportError),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub session_id: String,
    pub platform: Platform,
}

impl SessionKey {
    pub fn new(session_id: impl Into<String>, platform: Platform) -> Self {
        SessionKey {
            session_id: session_id.into(),
            platform,
        }
    }

    fn state_key(&self) -> String {
        format!("{KEY_PREFIX}{}:{}", self.session_id, self.platform.name())
    }
}

/// The ordered lineups of one session on one platform. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupSet {
    session_id: String,
    platform: Platform,
    template: RosterTemplate,
    lineups: Vec<Lineup>,
}

impl LineupSet {
    fn new(key: &SessionKey, template: RosterTemplate) -> Self {
        let lineups = vec![Lineup::new(&template)];
        LineupSet {
            session_id: key.session_id.clone(),
            platform: key.platform,
            template,
            lineups,
        }
    }

    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.session_id.clone(), self.platform)
    }

    pub fn template(&self) -> &RosterTemplate {
        &self.template
    }

    pub fn lineups(&self) -> &[Lineup] {
        &self.lineups
    }

    pub fn len(&self) -> usize {
        self.lineups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lineups.is_empty()
    }

    fn get(&self, index: usize) -> Result<&Lineup, SessionError> {
        self.lineups.get(index).ok_or(SessionError::NoSuchLineup {
            index,
            count: self.lineups.len(),
        })
    }

    fn get_mut(&mut self, index: usize) -> Result<&mut Lineup, SessionError> {
        let count = self.lineups.len();
        self.lineups
            .get_mut(index)
            .ok_or(SessionError::NoSuchLineup { index, count })
    }

    /// The lineup at `index`, appending empty lineups first if the set is
    /// shorter.
    fn get_or_grow(&mut self, index: usize) -> Result<&mut Lineup, SessionError> {
        if index >= MAX_LINEUPS {
            return Err(SessionError::TooManyLineups {
                index,
                max: MAX_LINEUPS,
            });
        }
        while self.lineups.len() <= index {
            self.lineups.push(Lineup::new(&self.template));
        }
        self.get_mut(index)
    }
}

/// What the interactive builder renders after an action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineupView {
    pub index: usize,
    pub slots: Vec<Slot>,
    pub spent: u32,
    pub projected: f64,
    pub full: bool,
    pub player_ids: Vec<PlayerId>,
    /// Salary left per open slot; 0 once the lineup is full.
    pub avg_remaining: f64,
    /// Reason the action was rejected; empty when it succeeded.
    pub msg: String,
    #[serde(skip)]
    pub error: Option<LineupError>,
}

impl LineupView {
    fn of(index: usize, lineup: &Lineup, error: Option<LineupError>) -> Self {
        LineupView {
            index,
            slots: lineup.slots().to_vec(),
            spent: lineup.spent(),
            projected: lineup.projected(),
            full: lineup.is_full(),
            player_ids: lineup.player_ids(),
            avg_remaining: lineup.avg_remaining_per_slot(),
            msg: error.as_ref().map(|e| e.to_string()).unwrap_or_default(),
            error,
        }
    }
}

struct Catalog {
    template: RosterTemplate,
    pool: Arc<PlayerPool>,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Keyed session lineups for every registered platform.
#[derive(Default)]
pub struct SessionStore {
    catalogs: HashMap<Platform, Catalog>,
    sets: Mutex<HashMap<SessionKey, Arc<Mutex<LineupSet>>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `platform` available with the given template and candidate pool.
    /// Sessions created afterwards use this template.
    pub fn register(&mut self, platform: Platform, template: RosterTemplate, pool: Arc<PlayerPool>) {
        self.catalogs.insert(platform, Catalog { template, pool });
    }

    fn catalog(&self, platform: Platform) -> Result<&Catalog, SessionError> {
        self.catalogs
            .get(&platform)
            .ok_or(SessionError::UnknownPlatform(platform))
    }

    /// The set for `key`, created with one empty lineup on first use.
    fn set_for(&self, key: &SessionKey) -> Result<Arc<Mutex<LineupSet>>, SessionError> {
        let catalog = self.catalog(key.platform)?;
        let mut sets = lock(&self.sets);
        let set = sets
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(LineupSet::new(key, catalog.template.clone()))));
        Ok(Arc::clone(set))
    }

    /// Run `f` on the set for `key` without creating it; a session that was
    /// never touched reads as one empty lineup.
    fn read<R>(
        &self,
        key: &SessionKey,
        f: impl FnOnce(&LineupSet) -> Result<R, SessionError>,
    ) -> Result<R, SessionError> {
        let catalog = self.catalog(key.platform)?;
        let handle = lock(&self.sets).get(key).cloned();
        match handle {
            Some(handle) => {
                let set = lock(&handle);
                f(&set)
            }
            None => f(&LineupSet::new(key, catalog.template.clone())),
        }
    }

    // ------------------------------------------------------------------
    // Builder actions
    // ------------------------------------------------------------------

    /// Add `id` to lineup `index`, growing the set if the index is new.
    ///
    /// A rejected addition is not an `Err`: the view carries the reason and
    /// the unchanged lineup.
    pub fn add_player(
        &self,
        key: &SessionKey,
        index: usize,
        id: PlayerId,
    ) -> Result<LineupView, SessionError> {
        let catalog = self.catalog(key.platform)?;
        let set = self.set_for(key)?;
        let mut set = lock(&set);
        let lineup = set.get_or_grow(index)?;

        let error = match LineupBuilder::new(&catalog.pool).add_player(lineup, id) {
            Ok(_) => None,
            Err(e) => {
                debug!("{}: lineup {} rejected player {}: {}", key.session_id, index + 1, id, e);
                Some(e)
            }
        };
        Ok(LineupView::of(index, lineup, error))
    }

    /// Remove `id` from lineup `index`. Removing an absent player is a no-op.
    pub fn remove_player(
        &self,
        key: &SessionKey,
        index: usize,
        id: PlayerId,
    ) -> Result<LineupView, SessionError> {
        let set = self.set_for(key)?;
        let mut set = lock(&set);
        let lineup = set.get_mut(index)?;
        courtside_core::builder::remove_player(lineup, id);
        Ok(LineupView::of(index, lineup, None))
    }

    /// Empty lineup `index`, keeping its slots.
    pub fn clear_lineup(&self, key: &SessionKey, index: usize) -> Result<LineupView, SessionError> {
        let set = self.set_for(key)?;
        let mut set = lock(&set);
        let lineup = set.get_mut(index)?;
        lineup.clear();
        Ok(LineupView::of(index, lineup, None))
    }

    /// Drop every lineup but the first and empty that one.
    pub fn clear_all_lineups(&self, key: &SessionKey) -> Result<LineupView, SessionError> {
        let set = self.set_for(key)?;
        let mut set = lock(&set);
        clear_all_lineups(&mut set.lineups);
        info!("{}: cleared all {} lineups", key.session_id, key.platform);
        let first = set.get(0)?;
        Ok(LineupView::of(0, first, None))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn view(&self, key: &SessionKey, index: usize) -> Result<LineupView, SessionError> {
        self.read(key, |set| Ok(LineupView::of(index, set.get(index)?, None)))
    }

    /// Whether each lineup in the set is full, in order. Only full lineups
    /// are worth offering for export.
    pub fn lineup_status(&self, key: &SessionKey) -> Result<Vec<bool>, SessionError> {
        self.read(key, |set| Ok(set.lineups.iter().map(Lineup::is_full).collect()))
    }

    pub fn lineup_count(&self, key: &SessionKey) -> Result<usize, SessionError> {
        self.read(key, |set| Ok(set.len()))
    }

    /// A copy of the whole set.
    pub fn snapshot(&self, key: &SessionKey) -> Result<LineupSet, SessionError> {
        self.read(key, |set| Ok(set.clone()))
    }

    /// CSV of the lineups at `indices`, in the order given.
    pub fn export(&self, key: &SessionKey, indices: &[usize]) -> Result<String, SessionError> {
        self.read(key, |set| {
            let lineups = indices
                .iter()
                .map(|&i| set.get(i).cloned())
                .collect::<Result<Vec<_>, _>>()?;
            Ok(export::to_csv_string(&set.template, &lineups, false)?)
        })
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Write every set to `db`, replacing whatever was stored before.
    /// Returns the number of sets saved.
    pub fn save_to(&self, db: &Database) -> Result<usize> {
        let handles: Vec<Arc<Mutex<LineupSet>>> = lock(&self.sets).values().cloned().collect();

        let mut entries = Vec::with_capacity(handles.len());
        for handle in handles {
            let set = lock(&handle);
            let value = serde_json::to_value(&*set).context("failed to serialize lineup set")?;
            entries.push((set.key().state_key(), value));
        }

        db.replace_states(KEY_PREFIX, &entries)
            .context("failed to save session lineups")?;
        info!("saved {} lineup sets", entries.len());
        Ok(entries.len())
    }

    /// Load the sets saved by [`save_to`](Self::save_to), replacing any in
    /// memory with the same key. Sets for unregistered platforms and
    /// unreadable entries are skipped with a warning. Each restored lineup is
    /// rebuilt on the platform's current template; one that breaks a lineup
    /// rule there comes back empty. Returns the number of sets restored.
    pub fn restore_from(&self, db: &Database) -> Result<usize> {
        let keys = db
            .state_keys(KEY_PREFIX)
            .context("failed to list saved lineup sets")?;

        let mut restored = 0;
        for state_key in keys {
            let Some(value) = db.load_state(&state_key)? else {
                continue;
            };
            let set: LineupSet = match serde_json::from_value(value) {
                Ok(set) => set,
                Err(e) => {
                    warn!("skipping unreadable lineup set '{}': {}", state_key, e);
                    continue;
                }
            };
            if set.lineups.is_empty() {
                warn!("skipping empty lineup set '{}'", state_key);
                continue;
            }
            let Some(catalog) = self.catalogs.get(&set.platform) else {
                warn!("skipping lineup set '{}': {} is not loaded", state_key, set.platform);
                continue;
            };
            let set = revalidate_set(set, &catalog.template, &state_key);
            lock(&self.sets).insert(set.key(), Arc::new(Mutex::new(set)));
            restored += 1;
        }

        info!("restored {} lineup sets", restored);
        Ok(restored)
    }
}

/// `set` moved onto `template`, capped at [`MAX_LINEUPS`], with every lineup
/// that fails revalidation replaced by an empty one so indices stay put.
fn revalidate_set(mut set: LineupSet, template: &RosterTemplate, state_key: &str) -> LineupSet {
    if set.lineups.len() > MAX_LINEUPS {
        warn!(
            "'{}' holds {} lineups, keeping the first {}",
            state_key,
            set.lineups.len(),
            MAX_LINEUPS
        );
        set.lineups.truncate(MAX_LINEUPS);
    }
    let lineups = set
        .lineups
        .iter()
        .enumerate()
        .map(|(i, lineup)| {
            lineup.revalidate(template).unwrap_or_else(|e| {
                warn!("'{}': emptying lineup {}: {}", state_key, i + 1, e);
                Lineup::new(template)
            })
        })
        .collect();
    LineupSet {
        lineups,
        template: template.clone(),
        ..set
    }
}
