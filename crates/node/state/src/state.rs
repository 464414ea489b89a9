//! The application state handle.

use std::{
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicI32, AtomicU32, Ordering},
        Arc, Mutex, RwLock,
    },
};

use alloy_primitives::{Address, B256};
use lru::LruCache;
use prost::Message;
use tracing::{info, warn};
use urna_kv::Store;
use urna_proto::{Header, Validator, Vote};
use urna_statedb::{StateDb, StateDbError, SubTreeTx, SubTreeView, TreeRef, TreeTx, TreeView};
use urna_tree::{TreeError, HASH_LEN};

use crate::{
    listener::ListenerError,
    trees::{oracles_cfg, processes_cfg, validators_cfg, HEADER_KEY},
    EventListener, StateError,
};

/// A present (non-tombstone) oracle marker value.
const EXIST: &[u8] = &[1];

/// Uniform read access over a committed or in-flight sub-tree.
pub(crate) trait SubTreeReader {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StateDbError>;
    fn iterate(&self, visitor: &mut dyn FnMut(&[u8], &[u8]) -> bool)
        -> Result<(), StateDbError>;
}

impl SubTreeReader for SubTreeView<'_> {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StateDbError> {
        SubTreeView::get(self, key)
    }

    fn iterate(
        &self,
        visitor: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<(), StateDbError> {
        SubTreeView::iterate(self, visitor)
    }
}

impl SubTreeReader for SubTreeTx<'_> {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StateDbError> {
        SubTreeTx::get(self, key)
    }

    fn iterate(
        &self,
        visitor: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<(), StateDbError> {
        SubTreeTx::iterate(self, visitor)
    }
}

/// The replicated application state.
///
/// Owns the forest's exclusive write context for the block in progress
/// and an atomically swapped committed view for concurrent queries. All
/// write methods are driven serially by the block driver; `committed =
/// true` readers never touch the write context.
pub struct State {
    store: StateDb,
    tx: Mutex<Option<TreeTx>>,
    main_view: RwLock<Arc<TreeView>>,
    pub(crate) vote_cache: Mutex<LruCache<[u8; 32], Vote>>,
    listeners: Vec<Box<dyn EventListener>>,
    tx_counter: AtomicI32,
    height: AtomicU32,
}

impl State {
    /// Open (or initialize) the application state over `store`.
    ///
    /// A fresh store is seeded with the three singleton sub-tree anchors
    /// and an empty header as version 1.
    pub fn new(store: Arc<dyn Store>, vote_cache_size: usize) -> Result<Self, StateError> {
        let sdb = StateDb::new(store);
        if sdb.version()? == 0 {
            info!("initializing state database");
            let mut tx = sdb.begin_tx()?;
            tx.add(oracles_cfg().kind_id().as_bytes(), &[0u8; HASH_LEN])?;
            tx.add(validators_cfg().kind_id().as_bytes(), &[0u8; HASH_LEN])?;
            tx.add(processes_cfg().kind_id().as_bytes(), &[0u8; HASH_LEN])?;
            tx.add(HEADER_KEY, &Header::default().encode_to_vec())?;
            tx.commit()?;
        }

        let version = sdb.version()?;
        let root = sdb.hash()?;
        info!(version, root = %root, "state database is ready");

        let tx = sdb.begin_tx()?;
        let main_view = Arc::new(sdb.tree_view(None)?);
        let cache_size = NonZeroUsize::new(vote_cache_size.max(1)).unwrap();
        let state = Self {
            store: sdb,
            tx: Mutex::new(Some(tx)),
            main_view: RwLock::new(main_view),
            vote_cache: Mutex::new(LruCache::new(cache_size)),
            listeners: Vec::new(),
            tx_counter: AtomicI32::new(0),
            height: AtomicU32::new(0),
        };
        let header = state.header(true)?;
        state.height.store(header.height, Ordering::Release);
        Ok(state)
    }

    /// Register a listener; must happen before the driver starts.
    pub fn add_event_listener(&mut self, listener: Box<dyn EventListener>) {
        self.listeners.push(listener);
    }

    pub(crate) fn listeners(&self) -> &[Box<dyn EventListener>] {
        &self.listeners
    }

    /// The last committed view, safe for concurrent readers.
    pub fn committed_view(&self) -> Arc<TreeView> {
        self.main_view.read().unwrap().clone()
    }

    /// Run `f` against the open write context.
    pub(crate) fn with_tx<R>(
        &self,
        f: impl FnOnce(&mut TreeTx) -> Result<R, StateError>,
    ) -> Result<R, StateError> {
        let mut guard = self.tx.lock().unwrap();
        let tx = guard.as_mut().ok_or(StateError::NoOpenTransaction)?;
        f(tx)
    }

    /// Run `f` against the sub-tree at `path`, through the committed
    /// view (`committed = true`) or the write context.
    pub(crate) fn with_subtree<R>(
        &self,
        committed: bool,
        path: Vec<TreeRef>,
        f: impl FnOnce(&dyn SubTreeReader) -> Result<R, StateError>,
    ) -> Result<R, StateError> {
        if committed {
            let view = self.committed_view();
            let sub = view.deep_sub_tree(path)?;
            f(&sub)
        } else {
            self.with_tx(|tx| {
                let sub = tx.deep_sub_tree(path)?;
                f(&sub)
            })
        }
    }

    // --- Oracles ---

    /// Register a trusted oracle; adding an existing oracle is a no-op
    /// write of the same marker.
    pub fn add_oracle(&self, address: Address) -> Result<(), StateError> {
        self.with_tx(|tx| {
            Ok(tx.deep_set(&[oracles_cfg().singleton_ref()], address.as_slice(), EXIST)?)
        })
    }

    /// Tombstone an oracle. The key stays in the tree with an empty
    /// value, so removal is auditable and the key-set stable.
    pub fn remove_oracle(&self, address: Address) -> Result<(), StateError> {
        self.with_tx(|tx| {
            let oracles = tx.sub_tree(oracles_cfg().singleton_ref())?;
            match oracles.get(address.as_slice()) {
                Ok(value) if !value.is_empty() => {}
                Ok(_) | Err(StateDbError::Tree(TreeError::KeyNotFound)) => {
                    return Err(StateError::OracleNotFound);
                }
                Err(e) => return Err(e.into()),
            }
            Ok(tx.deep_set(&[oracles_cfg().singleton_ref()], address.as_slice(), &[])?)
        })
    }

    /// The current oracle list, skipping tombstones.
    pub fn oracles(&self, committed: bool) -> Result<Vec<Address>, StateError> {
        self.with_subtree(committed, vec![oracles_cfg().singleton_ref()], |oracles| {
            let mut out = Vec::new();
            oracles.iterate(&mut |key, value| {
                // Removed oracles are still present with an empty value.
                if !value.is_empty() && key.len() == Address::len_bytes() {
                    out.push(Address::from_slice(key));
                }
                false
            })?;
            Ok(out)
        })
    }

    /// Whether `address` is a registered, non-tombstoned oracle.
    pub fn is_oracle(&self, address: Address, committed: bool) -> Result<bool, StateError> {
        self.with_subtree(committed, vec![oracles_cfg().singleton_ref()], |oracles| {
            match oracles.get(address.as_slice()) {
                Ok(value) => Ok(!value.is_empty()),
                Err(StateDbError::Tree(TreeError::KeyNotFound)) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    // --- Validators ---

    /// Register a consensus validator (or update its record).
    pub fn add_validator(&self, validator: &Validator) -> Result<(), StateError> {
        if validator.address.len() != Address::len_bytes() {
            return Err(StateError::Malformed(format!(
                "validator address is {} bytes",
                validator.address.len()
            )));
        }
        let bytes = validator.encode_to_vec();
        self.with_tx(|tx| {
            Ok(tx.deep_set(&[validators_cfg().singleton_ref()], &validator.address, &bytes)?)
        })
    }

    /// Tombstone a validator.
    pub fn remove_validator(&self, address: &[u8]) -> Result<(), StateError> {
        self.with_tx(|tx| {
            let validators = tx.sub_tree(validators_cfg().singleton_ref())?;
            match validators.get(address) {
                Ok(value) if !value.is_empty() => {}
                Ok(_) | Err(StateDbError::Tree(TreeError::KeyNotFound)) => {
                    return Err(StateError::ValidatorNotFound);
                }
                Err(e) => return Err(e.into()),
            }
            Ok(tx.deep_set(&[validators_cfg().singleton_ref()], address, &[])?)
        })
    }

    /// The current validator set, skipping tombstones.
    pub fn validators(&self, committed: bool) -> Result<Vec<Validator>, StateError> {
        self.with_subtree(committed, vec![validators_cfg().singleton_ref()], |validators| {
            let mut out = Vec::new();
            let mut decode_err = None;
            validators.iterate(&mut |_, value| {
                if value.is_empty() {
                    return false;
                }
                match Validator::decode(value) {
                    Ok(validator) => {
                        out.push(validator);
                        false
                    }
                    Err(e) => {
                        decode_err = Some(e);
                        true
                    }
                }
            })?;
            if let Some(e) = decode_err {
                return Err(e.into());
            }
            Ok(out)
        })
    }

    // --- Header & counters ---

    /// Write the block header under its reserved key and move the
    /// working height to the header's height.
    pub fn set_header(&self, header: &Header) -> Result<(), StateError> {
        let bytes = header.encode_to_vec();
        self.with_tx(|tx| Ok(tx.set(HEADER_KEY, &bytes)?))?;
        self.height.store(header.height, Ordering::Release);
        Ok(())
    }

    /// The stored chain header.
    pub fn header(&self, committed: bool) -> Result<Header, StateError> {
        let bytes = if committed {
            self.committed_view().get(HEADER_KEY)?
        } else {
            self.with_tx(|tx| Ok(tx.get(HEADER_KEY)?))?
        };
        Ok(Header::decode(bytes.as_slice())?)
    }

    /// The height of the block currently being built (after
    /// [`set_header`](Self::set_header)) or last committed.
    pub fn height(&self) -> u32 {
        self.height.load(Ordering::Acquire)
    }

    /// The last committed main root.
    pub fn app_hash(&self) -> Result<B256, StateError> {
        Ok(self.store.hash()?)
    }

    /// The working (uncommitted) main root of the open write context.
    pub fn working_hash(&self) -> Result<B256, StateError> {
        self.with_tx(|tx| Ok(tx.root()))
    }

    /// Fire the kind-independent per-transaction callback.
    pub fn notify_new_tx(&self) {
        for listener in self.listeners() {
            listener.on_new_tx(self.height(), self.tx_counter());
        }
    }

    /// Increment the per-block transaction counter.
    pub fn tx_counter_add(&self) {
        self.tx_counter.fetch_add(1, Ordering::AcqRel);
    }

    /// The per-block transaction counter.
    pub fn tx_counter(&self) -> i32 {
        self.tx_counter.load(Ordering::Acquire)
    }

    // --- Block lifecycle ---

    /// Commit the open write context, publish the new view and notify
    /// listeners. Returns the new main root.
    ///
    /// A listener returning [`ListenerError::Halt`] surfaces as
    /// [`StateError::Halt`] *after* the version is persisted; any other
    /// listener error is logged and swallowed.
    pub fn save(&self) -> Result<B256, StateError> {
        let root = {
            let mut guard = self.tx.lock().unwrap();
            let tx = guard.take().ok_or(StateError::NoOpenTransaction)?;
            let (_, root) = tx.commit()?;
            *guard = Some(self.store.begin_tx()?);
            root
        };
        let view = Arc::new(self.store.tree_view(None)?);
        *self.main_view.write().unwrap() = view;

        let height = self.header(true)?.height;
        self.height.store(height, Ordering::Release);
        for listener in &self.listeners {
            if let Err(e) = listener.commit(height) {
                match e {
                    ListenerError::Halt(reason) => return Err(StateError::Halt(reason)),
                    ListenerError::Other(reason) => {
                        warn!(height, reason, "event listener failed on commit");
                    }
                }
            }
        }
        Ok(root)
    }

    /// Throw away the in-flight block: notify listeners, discard the
    /// write context, open a fresh one, reset the transaction counter
    /// and drop the checked-vote cache.
    pub fn rollback(&self) -> Result<(), StateError> {
        for listener in &self.listeners {
            listener.rollback();
        }
        {
            let mut guard = self.tx.lock().unwrap();
            if let Some(tx) = guard.take() {
                tx.discard();
            }
            *guard = Some(self.store.begin_tx()?);
        }
        self.tx_counter.store(0, Ordering::Release);
        // Conservative: checked votes may rely on state the discarded
        // block introduced.
        self.vote_cache.lock().unwrap().clear();
        Ok(())
    }
}
