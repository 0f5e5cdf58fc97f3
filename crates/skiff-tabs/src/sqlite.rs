//! SQLite-backed tab store

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use std::sync::Arc;

use skiff_storage::Database;

use crate::error::TabError;
use crate::history::{HistoryStep, TabHistory};
use crate::store::{StoreEvent, TabStore};
use crate::tab::{TabId, TabRecord};
use crate::Result;

const MAX_LIVE_TAB_COUNT_KEY: &str = "max_live_tab_count";

pub struct SqliteTabStore {
    /// Database for persistence
    db: Database,
    /// Notifications not yet picked up by the container
    events: Arc<Mutex<Vec<StoreEvent>>>,
}

impl SqliteTabStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Persisted live-page cap, if the user ever changed it.
    pub fn max_live_tab_count(&self) -> Result<Option<usize>> {
        Ok(self.db.get_json_setting(MAX_LIVE_TAB_COUNT_KEY)?)
    }

    pub fn set_max_live_tab_count(&self, count: usize) -> Result<()> {
        Ok(self.db.set_json_setting(MAX_LIVE_TAB_COUNT_KEY, &count)?)
    }

    /// Full history of a tab, mainly for diagnostics.
    pub fn history(&self, tab_id: TabId) -> Result<TabHistory> {
        Ok(self.db.with_connection(|conn| read_history(conn, tab_id))?)
    }

    /// Load a tab's history, let `f` move it, write it back.
    fn with_history<F>(&self, tab_id: TabId, f: F) -> Result<Option<HistoryStep>>
    where
        F: FnOnce(&mut TabHistory) -> Option<HistoryStep>,
    {
        let exists = self.db.with_connection(|conn| {
            Ok(conn
                .query_row("SELECT 1 FROM tabs WHERE tab_id = ?1", [tab_id], |_| Ok(()))
                .optional()?
                .is_some())
        })?;
        if !exists {
            return Err(TabError::NotFound(tab_id));
        }

        Ok(self.db.transaction(|conn| {
            let mut history = read_history(conn, tab_id)?;
            let step = f(&mut history);
            if let Some(step) = &step {
                write_history(conn, tab_id, &history)?;
                conn.execute(
                    "UPDATE tabs SET url = ?1, title = ?2, previous_link = ?3, next_link = ?4
                     WHERE tab_id = ?5",
                    rusqlite::params![
                        step.url,
                        step.title,
                        step.previous_link,
                        step.next_link,
                        tab_id
                    ],
                )?;
            }
            Ok(step)
        })?)
    }
}

impl Clone for SqliteTabStore {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            events: Arc::clone(&self.events),
        }
    }
}

impl TabStore for SqliteTabStore {
    fn load_tabs(&self) -> Result<Vec<TabRecord>> {
        let tabs = self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT tab_id, url, title, thumbnail_path, parent_tab_id,
                        previous_link, next_link, created_at, last_active_at
                 FROM tabs ORDER BY last_active_at DESC, tab_id DESC",
            )?;

            let tabs: Vec<TabRecord> = stmt
                .query_map([], |row| {
                    let created_str: String = row.get(7)?;
                    let active_str: String = row.get(8)?;

                    Ok(TabRecord {
                        tab_id: row.get(0)?,
                        url: row.get(1)?,
                        title: row.get(2)?,
                        thumbnail_path: row.get(3)?,
                        parent_tab_id: row.get(4)?,
                        previous_link: row.get(5)?,
                        next_link: row.get(6)?,
                        created_at: parse_timestamp(&created_str),
                        last_active_at: parse_timestamp(&active_str),
                    })
                })?
                .filter_map(|r| r.ok())
                .collect();

            Ok(tabs)
        })?;

        tracing::debug!(count = tabs.len(), "Loaded persisted tabs");

        Ok(tabs)
    }

    fn save_tab(&self, tab: &TabRecord) -> Result<()> {
        Ok(self.db.transaction(|conn| {
            conn.execute(
                "INSERT INTO tabs
                 (tab_id, url, title, thumbnail_path, parent_tab_id, previous_link,
                  next_link, created_at, last_active_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(tab_id) DO UPDATE SET
                    url = excluded.url,
                    title = excluded.title,
                    thumbnail_path = excluded.thumbnail_path,
                    parent_tab_id = excluded.parent_tab_id,
                    previous_link = excluded.previous_link,
                    next_link = excluded.next_link,
                    last_active_at = excluded.last_active_at",
                rusqlite::params![
                    tab.tab_id,
                    tab.url,
                    tab.title,
                    tab.thumbnail_path,
                    tab.parent_tab_id,
                    tab.previous_link,
                    tab.next_link,
                    timestamp(&tab.created_at),
                    timestamp(&tab.last_active_at),
                ],
            )?;

            let history = read_history(conn, tab.tab_id)?;
            if history.is_empty() && !tab.url.is_empty() {
                let mut history = TabHistory::new();
                history.push(&tab.url, &tab.title);
                write_history(conn, tab.tab_id, &history)?;
            }
            Ok(())
        })?)
    }

    fn remove_tab(&self, tab_id: TabId) -> Result<()> {
        self.db.with_connection(|conn| {
            conn.execute("DELETE FROM tabs WHERE tab_id = ?1", [tab_id])?;
            Ok(())
        })?;

        tracing::info!(tab_id = tab_id, "Removed persisted tab");

        Ok(())
    }

    fn navigate(&self, tab_id: TabId, url: &str, title: &str) -> Result<HistoryStep> {
        let step = self.with_history(tab_id, |history| Some(history.push(url, title)))?;
        step.ok_or(TabError::NotFound(tab_id))
    }

    fn update_title(&self, tab_id: TabId, title: &str) -> Result<()> {
        Ok(self.db.transaction(|conn| {
            conn.execute(
                "UPDATE tabs SET title = ?1 WHERE tab_id = ?2",
                rusqlite::params![title, tab_id],
            )?;
            conn.execute(
                "UPDATE tab_history SET title = ?1
                 WHERE tab_id = ?2
                   AND position = (SELECT history_position FROM tabs WHERE tab_id = ?2)",
                rusqlite::params![title, tab_id],
            )?;
            Ok(())
        })?)
    }

    fn go_back(&self, tab_id: TabId) -> Result<Option<HistoryStep>> {
        self.with_history(tab_id, TabHistory::back)
    }

    fn go_forward(&self, tab_id: TabId) -> Result<Option<HistoryStep>> {
        self.with_history(tab_id, TabHistory::forward)
    }

    fn update_thumb_path(&self, url: &str, path: &str, tab_id: TabId) -> Result<()> {
        let updated = self.db.with_connection(|conn| {
            Ok(conn.execute(
                "UPDATE tabs SET thumbnail_path = ?1 WHERE tab_id = ?2",
                rusqlite::params![path, tab_id],
            )?)
        })?;
        if updated == 0 {
            return Err(TabError::NotFound(tab_id));
        }

        self.events.lock().push(StoreEvent::ThumbPathChanged {
            url: url.to_string(),
            path: path.to_string(),
            tab_id,
        });

        Ok(())
    }

    fn drain_events(&self) -> Vec<StoreEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

fn read_history(conn: &Connection, tab_id: TabId) -> skiff_storage::Result<TabHistory> {
    let position: i64 = conn
        .query_row(
            "SELECT history_position FROM tabs WHERE tab_id = ?1",
            [tab_id],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);

    let mut stmt = conn.prepare(
        "SELECT url, title FROM tab_history WHERE tab_id = ?1 ORDER BY position ASC",
    )?;
    let entries: Vec<(String, String)> = stmt
        .query_map([tab_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .filter_map(|r| r.ok())
        .collect();

    Ok(TabHistory::from_entries(entries, position.max(0) as usize))
}

fn write_history(conn: &Connection, tab_id: TabId, history: &TabHistory) -> skiff_storage::Result<()> {
    conn.execute("DELETE FROM tab_history WHERE tab_id = ?1", [tab_id])?;
    for (position, (url, title)) in history.entries().iter().enumerate() {
        conn.execute(
            "INSERT INTO tab_history (tab_id, position, url, title) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![tab_id, position as i64, url, title],
        )?;
    }
    conn.execute(
        "UPDATE tabs SET history_position = ?1 WHERE tab_id = ?2",
        rusqlite::params![history.position() as i64, tab_id],
    )?;
    Ok(())
}

/// Fixed-width so `ORDER BY last_active_at` sorts chronologically.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
