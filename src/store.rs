//! Transaction persistence.
//!
//! [`TransactionStore`] is the only thing the rest of the crate knows about
//! storage. Implementors provide two primitives, [`list_all`] and
//! [`update`]; every other operation is written once on top of them, so all
//! stores share the same semantics:
//!
//! * `remove` of an unknown id does nothing;
//! * `replace` of an unknown id is [`StoreError::NotFound`], and the stored
//!   id survives the replacement;
//! * `initialize_with_samples` only seeds an empty store.
//!
//! [`list_all`]: TransactionStore::list_all
//! [`update`]: TransactionStore::update

use crate::error::StoreError;
use crate::model::{Items, Transaction};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Storage for income and spend transactions.
pub trait TransactionStore: Send + Sync {
    /// Every stored transaction, in storage order.
    fn list_all(&self) -> Result<Vec<Transaction>, StoreError>;

    /// Apply `f` to the stored list and persist the result, atomically with
    /// respect to other calls on the same store.
    fn update(
        &self,
        f: &mut dyn FnMut(&mut Vec<Transaction>) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;

    fn append(&self, transaction: Transaction) -> Result<(), StoreError> {
        let mut slot = Some(transaction);
        self.update(&mut |all| {
            if let Some(t) = slot.take() {
                all.push(t);
            }
            Ok(())
        })
    }

    /// Delete the transaction with `id`, if any.
    fn remove(&self, id: &str) -> Result<(), StoreError> {
        self.update(&mut |all| {
            all.retain(|t| t.id != id);
            Ok(())
        })
    }

    /// Replace every field of the transaction `id` except the id itself.
    /// Returns the stored value.
    fn replace(&self, id: &str, transaction: Transaction) -> Result<Transaction, StoreError> {
        let replacement = transaction.with_id(id);
        let mut stored = None;
        self.update(&mut |all| {
            let slot = all
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
            *slot = replacement.clone();
            stored = Some(replacement.clone());
            Ok(())
        })?;
        stored.ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    /// Drop everything and load the sample transactions.
    fn reset_to_samples(&self) -> Result<(), StoreError> {
        let samples = sample_transactions(crate::model::now());
        self.update(&mut |all| {
            *all = samples.clone();
            Ok(())
        })
    }

    /// Load the sample transactions only if the store is empty. Returns
    /// whether anything was added.
    fn initialize_with_samples(&self) -> Result<bool, StoreError> {
        let samples = sample_transactions(crate::model::now());
        let mut seeded = false;
        self.update(&mut |all| {
            if all.is_empty() {
                *all = samples.clone();
                seeded = true;
            }
            Ok(())
        })?;
        Ok(seeded)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.update(&mut |all| {
            all.clear();
            Ok(())
        })
    }
}

// ── In-memory store ──────────────────────────────────────────────────────────

/// A store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    transactions: Mutex<Vec<Transaction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transactions(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions: Mutex::new(transactions),
        }
    }
}

impl TransactionStore for MemoryStore {
    fn list_all(&self) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.transactions.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn update(
        &self,
        f: &mut dyn FnMut(&mut Vec<Transaction>) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut guard = self.transactions.lock().unwrap_or_else(|e| e.into_inner());
        // Work on a copy so a failing update leaves the store untouched.
        let mut working = guard.clone();
        f(&mut working)?;
        *guard = working;
        Ok(())
    }
}

// ── JSON file store ──────────────────────────────────────────────────────────

/// A store backed by one JSON file holding an array of transactions.
///
/// Every update rewrites the whole file through a temp file in the same
/// directory followed by a rename, so readers see either the old or the new
/// list, never a partial one.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `<data dir>/receipt-scanner/transactions.json`, falling back to the
    /// current directory when the platform has no data dir.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("receipt-scanner")
            .join("transactions.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty store; a corrupt one is too, with a warning.
    /// Any other read failure is an error.
    fn load(&self) -> Result<Vec<Transaction>, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(list) => Ok(list),
            Err(e) => {
                warn!("Corrupt transaction file {}: {}; treating as empty", self.path.display(), e);
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, transactions: &[Transaction]) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(transactions)?;
        write_atomic(&self.path, &json)?;
        debug!("Wrote {} transactions to {}", transactions.len(), self.path.display());
        Ok(())
    }
}

impl TransactionStore for JsonFileStore {
    fn list_all(&self) -> Result<Vec<Transaction>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.load()
    }

    fn update(
        &self,
        f: &mut dyn FnMut(&mut Vec<Transaction>) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut all = self.load()?;
        f(&mut all)?;
        self.save(&all)
    }
}

/// Write `bytes` to `path` via a sibling temp file and a rename.
///
/// The temp file is created with owner-only permissions on Unix, which the
/// rename preserves.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(io_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

// ── Sample data ──────────────────────────────────────────────────────────────

/// The seven demo transactions, dated today and yesterday relative to `now`.
pub fn sample_transactions(now: NaiveDateTime) -> Vec<Transaction> {
    let today = now.date();
    let yesterday = today - Duration::days(1);

    let samples = vec![
        Transaction::spend(
            "Grocery Shopping",
            850.50,
            "123 Market Street",
            "+1234567890",
            at(today, 13, 30),
            items(&[("Milk", 45.0), ("Bread", 35.5), ("Vegetables", 770.0)]),
        ),
        Transaction::income("Monthly Salary", 25000.0, at(today, 10, 0)),
        Transaction::spend(
            "Electronics Store",
            1299.99,
            "789 Tech Boulevard",
            "+1122334455",
            at(today, 16, 45),
            items(&[
                ("Wireless Earbuds", 799.99),
                ("Phone Case", 299.0),
                ("Screen Protector", 201.0),
            ]),
        ),
        Transaction::spend(
            "Restaurant Dinner",
            457.75,
            "456 Food Court",
            "+9876543210",
            at(yesterday, 19, 45),
            items(&[("Main Course", 350.0), ("Dessert", 107.75)]),
        ),
        Transaction::income("Freelance Project", 5000.0, at(yesterday, 14, 15)),
        Transaction::spend(
            "Bookstore",
            625.50,
            "321 Reading Lane",
            "+5544332211",
            at(yesterday, 11, 30),
            items(&[("Programming Book", 399.5), ("Novel", 126.0), ("Magazine", 100.0)]),
        ),
        Transaction::income("Investment Dividend", 1250.0, at(yesterday, 9, 0)),
    ];
    info!("Generated {} sample transactions", samples.len());
    samples
}

fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN))
}

fn items(pairs: &[(&str, f64)]) -> Items {
    pairs.iter().map(|(name, price)| (name.to_string(), *price)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransactionKind;
    use tempfile::TempDir;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn cafe() -> Transaction {
        Transaction::spend("Cafe", 12.5, "1 Main St", "+1", noon(), Items::new())
    }

    fn exercise(store: &dyn TransactionStore) {
        assert!(store.list_all().unwrap().is_empty());

        let t = cafe();
        let id = t.id.clone();
        store.append(t).unwrap();
        store.append(Transaction::income("Salary", 100.0, noon())).unwrap();
        assert_eq!(store.list_all().unwrap().len(), 2);

        let edited = store
            .replace(&id, Transaction::income("Refund", 5.0, noon()))
            .unwrap();
        assert_eq!(edited.id, id);
        let all = store.list_all().unwrap();
        let stored = all.iter().find(|t| t.id == id).unwrap();
        assert_eq!(stored.description, "Refund");
        assert_eq!(stored.kind, TransactionKind::Income);

        let err = store.replace("missing", cafe()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));

        store.remove("missing").unwrap();
        assert_eq!(store.list_all().unwrap().len(), 2);
        store.remove(&id).unwrap();
        assert_eq!(store.list_all().unwrap().len(), 1);

        assert!(!store.initialize_with_samples().unwrap());
        store.clear().unwrap();
        assert!(store.initialize_with_samples().unwrap());
        assert_eq!(store.list_all().unwrap().len(), 7);

        store.append(cafe()).unwrap();
        store.reset_to_samples().unwrap();
        assert_eq!(store.list_all().unwrap().len(), 7);
    }

    #[test]
    fn memory_store_semantics() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn json_file_store_semantics() {
        let dir = TempDir::new().unwrap();
        exercise(&JsonFileStore::new(dir.path().join("nested").join("tx.json")));
    }

    #[test]
    fn json_file_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tx.json");
        let t = cafe();
        JsonFileStore::new(&path).append(t.clone()).unwrap();

        let reopened = JsonFileStore::new(&path).list_all().unwrap();
        assert_eq!(reopened, vec![t]);

        let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw[0]["type"], "SPEND");
        assert_eq!(raw[0]["totalAmount"], 12.5);
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tx.json");
        std::fs::write(&path, b"{ not json").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(store.list_all().unwrap().is_empty());
        store.append(cafe()).unwrap();
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn unreadable_file_is_an_error_and_left_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tx.json");
        std::fs::create_dir(&path).unwrap();
        let store = JsonFileStore::new(&path);

        let err = store.list_all().unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }), "{err:?}");
        assert!(matches!(store.append(cafe()), Err(StoreError::Io { .. })));
        assert!(path.is_dir());
    }

    #[test]
    fn failed_update_leaves_memory_store_untouched() {
        let store = MemoryStore::with_transactions(vec![cafe()]);
        let err = store.update(&mut |all| {
            all.clear();
            Err(StoreError::NotFound { id: "x".into() })
        });
        assert!(err.is_err());
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn samples_are_dated_today_and_yesterday() {
        let samples = sample_transactions(noon());
        assert_eq!(samples.len(), 7);
        let today = noon().date();
        assert_eq!(samples.iter().filter(|t| t.timestamp.date() == today).count(), 3);
        assert_eq!(samples.iter().filter(|t| !t.is_spend()).count(), 3);

        let grocery = &samples[0];
        assert_eq!(grocery.description, "Grocery Shopping");
        assert_eq!(grocery.total_amount, 850.50);
        assert_eq!(grocery.items().unwrap()["Vegetables"], 770.0);
        assert_eq!(grocery.timestamp.time(), NaiveTime::from_hms_opt(13, 30, 0).unwrap());

        let dividend = &samples[6];
        assert_eq!(dividend.timestamp.date(), today - Duration::days(1));
    }
}
