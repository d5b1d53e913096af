use std::collections::{BTreeMap, BTreeSet};

use anyhow::{bail, Result};
use tracing::warn;

use crate::database::{keys, Database};

/// The most columns that may be visible at once.
pub(crate) const MAX_VISIBLE_COLUMNS: usize = 15;

/// Reads `key`, treating a missing or unreadable value as empty.
fn load_or_default<T>(db: &Database, key: &str) -> T
where
    T: Default + serde::de::DeserializeOwned,
{
    match db.get(key) {
        Ok(value) => value.unwrap_or_default(),
        Err(e) => {
            warn!("Ignoring unreadable {key}: {e:#}");
            T::default()
        }
    }
}

/// Writes `key`, logging instead of failing so the in-memory state stays
/// usable for the session.
fn persist<T: serde::Serialize + ?Sized>(db: &Database, key: &str, value: &T) {
    if let Err(e) = db.set(key, value) {
        warn!("Failed to persist {key}: {e:#}");
    }
}

/// Favorite trial ids, mirrored to the store on every change.
pub(crate) struct Favorites {
    db: Database,
    ids: BTreeSet<String>,
}

impl Favorites {
    pub(crate) fn load(db: Database) -> Self {
        let ids = load_or_default(&db, keys::FAVORITE_TRIALS);
        Self { db, ids }
    }

    pub(crate) fn contains(&self, trial_id: &str) -> bool {
        self.ids.contains(trial_id)
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Flips the favorite flag of `trial_id` and returns the new flag.
    pub(crate) fn toggle(&mut self, trial_id: &str) -> bool {
        let favorite = if self.ids.remove(trial_id) {
            false
        } else {
            self.ids.insert(trial_id.to_string());
            true
        };
        persist(&self.db, keys::FAVORITE_TRIALS, &self.ids);
        favorite
    }
}

/// Column id to visibility, with between 1 and [`MAX_VISIBLE_COLUMNS`]
/// columns visible.
pub(crate) struct ColumnSettings {
    db: Database,
    columns: BTreeMap<String, bool>,
}

impl ColumnSettings {
    /// Loads the stored settings, or `defaults` when nothing usable is
    /// stored.
    pub(crate) fn load(db: Database, defaults: &[&str]) -> Self {
        let stored: Option<BTreeMap<String, bool>> = match db.get(keys::COLUMN_SETTINGS) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Ignoring unreadable column settings: {e:#}");
                None
            }
        };
        let stored = stored.filter(|columns| {
            let visible = columns.values().filter(|v| **v).count();
            let valid = (1..=MAX_VISIBLE_COLUMNS).contains(&visible);
            if !valid {
                warn!("Ignoring column settings with {visible} visible columns");
            }
            valid
        });
        let columns = stored.unwrap_or_else(|| default_columns(defaults));
        Self { db, columns }
    }

    pub(crate) fn columns(&self) -> &BTreeMap<String, bool> {
        &self.columns
    }

    pub(crate) fn visible_count(&self) -> usize {
        self.columns.values().filter(|v| **v).count()
    }

    pub(crate) fn is_visible(&self, column: &str) -> bool {
        self.columns.get(column).copied().unwrap_or(false)
    }

    /// Forgets the stored settings and goes back to `defaults`.
    pub(crate) fn reset(&mut self, defaults: &[&str]) {
        if let Err(e) = self.db.remove(keys::COLUMN_SETTINGS) {
            warn!("Failed to remove column settings: {e:#}");
        }
        self.columns = default_columns(defaults);
    }

    /// Shows or hides `column`.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the settings unchanged, if the change would
    /// hide the last visible column or show more than
    /// [`MAX_VISIBLE_COLUMNS`].
    pub(crate) fn set_visible(&mut self, column: &str, visible: bool) -> Result<()> {
        if self.is_visible(column) == visible {
            return Ok(());
        }
        let count = self.visible_count();
        if visible && count >= MAX_VISIBLE_COLUMNS {
            bail!("at most {MAX_VISIBLE_COLUMNS} columns can be visible");
        }
        if !visible && count <= 1 {
            bail!("at least one column must stay visible");
        }
        self.columns.insert(column.to_string(), visible);
        persist(&self.db, keys::COLUMN_SETTINGS, &self.columns);
        Ok(())
    }
}

fn default_columns(defaults: &[&str]) -> BTreeMap<String, bool> {
    defaults
        .iter()
        .take(MAX_VISIBLE_COLUMNS)
        .map(|c| ((*c).to_string(), true))
        .collect()
}

/// Trials picked for opening side by side. Lives for the session only.
#[derive(Debug, Default)]
pub(crate) struct Selection {
    ids: BTreeSet<String>,
}

impl Selection {
    pub(crate) fn toggle(&mut self, trial_id: &str) -> bool {
        if self.ids.remove(trial_id) {
            false
        } else {
            self.ids.insert(trial_id.to_string());
            true
        }
    }

    pub(crate) fn clear(&mut self) {
        self.ids.clear();
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// The selection as a `trialIds` parameter, e.g. `T-1,T-2`.
    pub(crate) fn to_param(&self) -> String {
        self.ids().collect::<Vec<_>>().join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnSettings, Favorites, Selection, MAX_VISIBLE_COLUMNS};
    use crate::database::{keys, Database};

    fn open() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        (dir, db)
    }

    #[test]
    fn favorites_survive_reload() {
        let (_dir, db) = open();
        let mut favorites = Favorites::load(db.clone());
        assert!(favorites.toggle("T-1"));
        assert!(favorites.toggle("T-2"));
        assert!(favorites.toggle("T-3"));

        let reloaded = Favorites::load(db.clone());
        assert_eq!(reloaded.ids().collect::<Vec<_>>(), vec!["T-1", "T-2", "T-3"]);

        assert!(!favorites.toggle("T-2"));
        let reloaded = Favorites::load(db);
        assert_eq!(reloaded.ids().collect::<Vec<_>>(), vec!["T-1", "T-3"]);
        assert!(!reloaded.contains("T-2"));
    }

    #[test]
    fn unreadable_favorites_start_empty() {
        let (_dir, db) = open();
        db.set(keys::FAVORITE_TRIALS, "corrupt").unwrap();
        let favorites = Favorites::load(db);
        assert_eq!(favorites.ids().count(), 0);
    }

    #[test]
    fn column_defaults_and_persistence() {
        let (_dir, db) = open();
        let mut columns = ColumnSettings::load(db.clone(), &["trial_id", "title", "status"]);
        assert_eq!(columns.visible_count(), 3);

        columns.set_visible("status", false).unwrap();
        columns.set_visible("sponsor", true).unwrap();

        let reloaded = ColumnSettings::load(db, &["ignored"]);
        assert!(!reloaded.is_visible("status"));
        assert!(reloaded.is_visible("sponsor"));
        assert!(!reloaded.is_visible("ignored"));
        assert_eq!(reloaded.columns(), columns.columns());
    }

    #[test]
    fn column_reset() {
        let (_dir, db) = open();
        let mut columns = ColumnSettings::load(db.clone(), &["title", "status"]);
        columns.set_visible("status", false).unwrap();
        columns.reset(&["title", "status"]);
        assert!(columns.is_visible("status"));
        assert!(db
            .get::<std::collections::BTreeMap<String, bool>>(keys::COLUMN_SETTINGS)
            .unwrap()
            .is_none());
    }

    #[test]
    fn invalid_stored_columns_use_defaults() {
        let (_dir, db) = open();
        let none_visible: std::collections::BTreeMap<String, bool> =
            [("title".to_string(), false)].into();
        db.set(keys::COLUMN_SETTINGS, &none_visible).unwrap();
        let columns = ColumnSettings::load(db.clone(), &["trial_id", "status"]);
        assert_eq!(columns.visible_count(), 2);
        assert!(columns.is_visible("status"));

        let too_many: std::collections::BTreeMap<String, bool> = (0..=MAX_VISIBLE_COLUMNS)
            .map(|i| (format!("c{i}"), true))
            .collect();
        db.set(keys::COLUMN_SETTINGS, &too_many).unwrap();
        let columns = ColumnSettings::load(db, &["trial_id"]);
        assert_eq!(columns.visible_count(), 1);
        assert!(!columns.is_visible("c0"));
    }

    #[test]
    fn column_cap_rejects_without_evicting() {
        let (_dir, db) = open();
        let names: Vec<String> = (0..MAX_VISIBLE_COLUMNS).map(|i| format!("c{i}")).collect();
        let defaults: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut columns = ColumnSettings::load(db, &defaults);
        assert_eq!(columns.visible_count(), MAX_VISIBLE_COLUMNS);

        assert!(columns.set_visible("extra", true).is_err());
        assert!(!columns.is_visible("extra"));
        assert_eq!(columns.visible_count(), MAX_VISIBLE_COLUMNS);
        assert!(columns.set_visible("c0", true).is_ok());
    }

    #[test]
    fn last_column_cannot_be_hidden() {
        let (_dir, db) = open();
        let mut columns = ColumnSettings::load(db, &["title"]);
        assert!(columns.set_visible("title", false).is_err());
        assert!(columns.is_visible("title"));
    }

    #[test]
    fn selection_param() {
        let mut selection = Selection::default();
        selection.toggle("T-2");
        selection.toggle("T-1");
        selection.toggle("T-3");
        selection.toggle("T-3");
        assert_eq!(selection.to_param(), "T-1,T-2");
        selection.clear();
        assert_eq!(selection.ids().count(), 0);
    }
}
