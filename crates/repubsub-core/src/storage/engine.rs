//! Storage engine implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use sled::{Db, Tree};

use repubsub_proto::{
    ChangeEvent, DocumentId, MessageDocument, TopicPredicate, TopicValue, DOCUMENT_ID_SIZE,
};

use super::{StorageConfig, TopicKey};
use crate::changefeed::{ChangeFeed, FeedRegistry, SharedFeedRegistry};
use crate::error::StoreError;
use crate::store::{MessageStore, UpsertOutcome, UpsertRequest};

/// Tree name for metadata (table registry).
const META_TREE: &str = "meta";

/// Prefix for table entries in the meta tree.
const TABLE_PREFIX: &[u8] = b"table:";

/// Prefix for table tree names.
const TABLE_TREE_PREFIX: &str = "table:";

/// Longest accepted table name.
const MAX_TABLE_NAME_LEN: usize = 128;

/// Per-table state.
struct TableState {
    tree: Tree,
    /// Highest sequence number assigned to a write on this table. Held
    /// across dispatch so feeds see sequence numbers in increasing order.
    seq: Mutex<u64>,
}

/// The message store wrapping sled.
pub struct StorageEngine {
    /// The underlying sled database.
    db: Db,

    /// Tree for metadata.
    meta_tree: Tree,

    /// Open tables keyed by name.
    tables: RwLock<HashMap<String, Arc<TableState>>>,

    /// Striped locks serializing write + dispatch per topic key.
    write_locks: Vec<Mutex<()>>,

    /// Change-feed watchers.
    feeds: SharedFeedRegistry,

    max_document_size: usize,

    closed: AtomicBool,
}

impl StorageEngine {
    /// Open or create a storage engine with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Self, StoreError> {
        let db = config.to_sled_config().open()?;
        let meta_tree = db.open_tree(META_TREE)?;

        let mut tables = HashMap::new();
        for entry in meta_tree.scan_prefix(TABLE_PREFIX) {
            let (key, _) = entry?;
            let name = String::from_utf8_lossy(&key[TABLE_PREFIX.len()..]).into_owned();
            let tree = db.open_tree(Self::tree_name(&name))?;
            tables.insert(name, Arc::new(TableState::new(tree)));
        }

        tracing::info!(
            path = %config.path.display(),
            temporary = config.temporary,
            tables = tables.len(),
            "message store opened"
        );

        let stripes = config.write_lock_stripes.max(1);
        Ok(Self {
            db,
            meta_tree,
            tables: RwLock::new(tables),
            write_locks: (0..stripes).map(|_| Mutex::new(())).collect(),
            feeds: Arc::new(FeedRegistry::new()),
            max_document_size: config.max_document_size,
            closed: AtomicBool::new(false),
        })
    }

    /// Create a table if it does not already exist.
    pub fn create_table(&self, name: &str) -> Result<(), StoreError> {
        self.check_open()?;
        Self::validate_table_name(name)?;

        if self.tables.read().contains_key(name) {
            return Ok(());
        }

        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Ok(());
        }

        let tree = self.db.open_tree(Self::tree_name(name))?;
        self.meta_tree.insert(Self::meta_key(name), &[])?;
        tables.insert(name.to_string(), Arc::new(TableState::new(tree)));

        tracing::info!(table = name, "table created");
        Ok(())
    }

    /// List table names.
    pub fn tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Create or overwrite the document for `request.topic` and emit its change event.
    pub fn upsert_topic(
        &self,
        table: &str,
        request: UpsertRequest,
    ) -> Result<UpsertOutcome, StoreError> {
        self.check_open()?;
        let state = self.table(table)?;
        let key = TopicKey::derive(&request.topic)?;

        let fresh = MessageDocument {
            id: DocumentId(rand::random::<[u8; DOCUMENT_ID_SIZE]>()),
            topic: request.topic,
            payload: request.payload,
            force_change_token: request.force_change_token,
        };

        // Overwrites keep the existing id, which has the same encoded width,
        // so the fresh encoding bounds the stored size.
        let encoded_len = fresh.to_bytes()?.len();
        if encoded_len > self.max_document_size {
            return Err(StoreError::Rejected(format!(
                "document is {encoded_len} bytes, limit is {}",
                self.max_document_size
            )));
        }

        let _guard = self.write_locks[key.stripe(self.write_locks.len())].lock();

        // On a decode or encode failure the closure leaves the stored value
        // untouched and records the error.
        let mut written = None;
        state.tree.fetch_and_update(key.as_bytes(), |old| {
            let prior = match old.map(MessageDocument::from_bytes).transpose() {
                Ok(prior) => prior,
                Err(e) => {
                    written = Some(Err(e));
                    return old.map(<[u8]>::to_vec);
                }
            };
            let doc = match &prior {
                Some(prev) => MessageDocument {
                    id: prev.id,
                    ..fresh.clone()
                },
                None => fresh.clone(),
            };
            match doc.to_bytes() {
                Ok(bytes) => {
                    written = Some(Ok((prior, doc)));
                    Some(bytes)
                }
                Err(e) => {
                    written = Some(Err(e));
                    old.map(<[u8]>::to_vec)
                }
            }
        })?;

        let (old_value, document) = match written {
            Some(Ok(pair)) => pair,
            Some(Err(e)) => {
                tracing::warn!(table, error = %e, "upsert aborted");
                return Err(e.into());
            }
            None => {
                return Err(StoreError::Rejected(
                    "upsert produced no document".to_string(),
                ))
            }
        };
        let created = old_value.is_none();

        let (seq, delivered) = {
            let mut last = state.seq.lock();
            *last += 1;
            let event = ChangeEvent {
                seq: *last,
                table: table.to_string(),
                old_value,
                new_value: document.clone(),
            };
            (*last, self.feeds.dispatch(&event))
        };

        tracing::trace!(
            table,
            seq,
            id = %document.id,
            created,
            delivered,
            "upserted document"
        );

        Ok(UpsertOutcome {
            document,
            created,
            seq,
        })
    }

    /// Get the current document for a topic.
    pub fn get_topic(
        &self,
        table: &str,
        topic: &TopicValue,
    ) -> Result<Option<MessageDocument>, StoreError> {
        self.check_open()?;
        let state = self.table(table)?;
        let key = TopicKey::derive(topic)?;

        match state.tree.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(MessageDocument::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Scan every document in a table.
    pub fn scan_table(
        &self,
        table: &str,
    ) -> Result<impl Iterator<Item = Result<MessageDocument, StoreError>>, StoreError> {
        self.check_open()?;
        let state = self.table(table)?;

        Ok(state.tree.iter().map(|result| {
            let (_, value_bytes) = result?;
            Ok(MessageDocument::from_bytes(&value_bytes)?)
        }))
    }

    /// Number of documents in a table.
    pub fn table_len(&self, table: &str) -> Result<usize, StoreError> {
        self.check_open()?;
        Ok(self.table(table)?.tree.len())
    }

    /// Register a filtered change feed on a table.
    pub fn watch(
        &self,
        table: &str,
        predicate: Option<TopicPredicate>,
    ) -> Result<ChangeFeed, StoreError> {
        self.check_open()?;
        self.table(table)?;
        self.feeds.register(table, predicate)
    }

    /// Get the change-feed registry.
    pub fn feeds(&self) -> &SharedFeedRegistry {
        &self.feeds
    }

    /// Mark the store unavailable, end all feeds and flush.
    pub fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.feeds.close_all();
        self.db.flush()?;
        tracing::info!("message store shut down");
        Ok(())
    }

    /// Whether the store has been shut down.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::Unavailable("store is shut down".to_string()));
        }
        Ok(())
    }

    fn table(&self, name: &str) -> Result<Arc<TableState>, StoreError> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
    }

    fn validate_table_name(name: &str) -> Result<(), StoreError> {
        let valid = !name.is_empty()
            && name.len() <= MAX_TABLE_NAME_LEN
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(())
        } else {
            Err(StoreError::InvalidTable(name.to_string()))
        }
    }

    fn tree_name(table: &str) -> String {
        format!("{TABLE_TREE_PREFIX}{table}")
    }

    fn meta_key(table: &str) -> Vec<u8> {
        let mut key = TABLE_PREFIX.to_vec();
        key.extend_from_slice(table.as_bytes());
        key
    }
}

impl TableState {
    fn new(tree: Tree) -> Self {
        Self {
            tree,
            seq: Mutex::new(0),
        }
    }
}

#[async_trait]
impl MessageStore for StorageEngine {
    async fn ensure_table(&self, table: &str) -> Result<(), StoreError> {
        self.create_table(table)
    }

    async fn upsert(
        &self,
        table: &str,
        request: UpsertRequest,
    ) -> Result<UpsertOutcome, StoreError> {
        self.upsert_topic(table, request)
    }

    async fn watch_changes(
        &self,
        table: &str,
        predicate: Option<TopicPredicate>,
    ) -> Result<ChangeFeed, StoreError> {
        self.watch(table, predicate)
    }

    async fn fetch(
        &self,
        table: &str,
        topic: &TopicValue,
    ) -> Result<Option<MessageDocument>, StoreError> {
        self.get_topic(table, topic)
    }

    async fn count(&self, table: &str) -> Result<usize, StoreError> {
        self.table_len(table)
    }

    async fn shutdown(&self) -> Result<(), StoreError> {
        self.close()
    }
}
