pub(crate) mod keys;
pub(crate) mod trial;

use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use sled::{Db, Event, Subscriber, Tree};

pub(crate) use self::trial::Trial;

const STORAGE_TREE: &str = "storage";

/// Key-value store holding the dashboard's persisted client state.
///
/// Every value is stored as a JSON document under a fixed key (see
/// [`keys`]). This is the single owner of persisted state; components get a
/// clone of the handle instead of reaching for storage on their own.
#[derive(Clone)]
pub struct Database {
    #[allow(unused)]
    db: Db,
    storage: Tree,
}

impl Database {
    pub fn connect(path: &Path) -> Result<Database> {
        let db = sled::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        let storage = db.open_tree(STORAGE_TREE)?;
        Ok(Database { db, storage })
    }

    /// Returns the value stored under `key`, or `None` if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be read or the stored JSON
    /// does not match `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.storage.get(key)? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&raw)
            .with_context(|| format!("invalid value in database for key {key}"))?;
        Ok(Some(value))
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.storage.insert(key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.storage.remove(key)?;
        Ok(())
    }

    /// Watches `key` for changes made through any handle of this database.
    pub fn subscribe(&self, key: &str) -> Subscription {
        Subscription {
            key: key.to_string(),
            inner: self.storage.watch_prefix(key),
        }
    }
}

/// A stream of changes to a single key.
pub struct Subscription {
    key: String,
    inner: Subscriber,
}

impl Subscription {
    /// Blocks until the key changes or `timeout` elapses.
    ///
    /// Yields `Some(Some(value))` for a write, `Some(None)` for a removal and
    /// `None` when nothing changed in time. Changes to other keys sharing the
    /// same prefix are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the written value does not match `T`.
    pub fn next_change<T: DeserializeOwned>(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<Option<T>>> {
        while let Ok(event) = self.inner.next_timeout(timeout) {
            match event {
                Event::Insert { key, value } if key == self.key.as_bytes() => {
                    return Ok(Some(Some(serde_json::from_slice(&value)?)));
                }
                Event::Remove { key } if key == self.key.as_bytes() => {
                    return Ok(Some(None));
                }
                _ => {}
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{keys, Database};

    fn open() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        (dir, db)
    }

    #[test]
    fn get_missing_key() {
        let (_dir, db) = open();
        let value: Option<Vec<String>> = db.get(keys::FAVORITE_TRIALS).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn set_get_remove() {
        let (_dir, db) = open();
        db.set(keys::FAVORITE_TRIALS, &vec!["T-1".to_string()])
            .unwrap();
        let value: Option<Vec<String>> = db.get(keys::FAVORITE_TRIALS).unwrap();
        assert_eq!(value, Some(vec!["T-1".to_string()]));

        db.remove(keys::FAVORITE_TRIALS).unwrap();
        let value: Option<Vec<String>> = db.get(keys::FAVORITE_TRIALS).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn get_wrong_shape_is_error() {
        let (_dir, db) = open();
        db.set(keys::DRUG_NAMES, "not a list").unwrap();
        assert!(db.get::<Vec<String>>(keys::DRUG_NAMES).is_err());
    }

    #[test]
    fn subscribe_sees_only_its_key() {
        let (_dir, db) = open();
        let mut sub = db.subscribe(keys::TRIALS_CACHE);

        db.set(keys::TRIALS_CACHE_TIMESTAMP, "2025-01-01T00:00:00Z")
            .unwrap();
        db.set(keys::TRIALS_CACHE, &Vec::<String>::new()).unwrap();
        db.remove(keys::TRIALS_CACHE).unwrap();

        let change: Option<Option<Vec<String>>> =
            sub.next_change(Duration::from_secs(1)).unwrap();
        assert_eq!(change, Some(Some(Vec::new())));
        let change: Option<Option<Vec<String>>> =
            sub.next_change(Duration::from_secs(1)).unwrap();
        assert_eq!(change, Some(None));
        let change: Option<Option<Vec<String>>> =
            sub.next_change(Duration::from_millis(50)).unwrap();
        assert_eq!(change, None);
    }
}
