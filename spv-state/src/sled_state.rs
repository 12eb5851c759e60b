//! The primary implementation of the chain store, built upon sled.

use tracing::{debug, info, trace, warn};

use spv_chain::{
    block::{self, Header, Height},
    parameters::{checkpoint_hash, genesis_hash, genesis_header, Network},
};

use crate::{Config, StoreError};

use sled_format::{
    header_key, height_key, orphan_key, FromSled, IntoSled, ORPHAN_PREFIX, TIP_KEY,
};

mod sled_format;

/// A stored header together with the height assigned when it attached to
/// the chain. Orphans carry height zero until their parent arrives.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChainHeader {
    pub header: Header,
    pub height: Height,
}

/// What [`ChainStore::put_header`] did with a header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PutOutcome {
    /// The header extended a known parent and was assigned this height.
    Attached(Height),
    /// The parent is unknown; the header waits in the orphan view.
    Orphaned,
    /// The header was already present and nothing changed.
    AlreadyStored,
}

/// The header chain, persisted in a sled database.
///
/// Three logical views multiplex the same physical tree via a one-byte key
/// prefix: `h` + hash for headers, `y` + big-endian height for the height
/// index, and `o` + parent hash for orphans awaiting their parent. The
/// reserved key `"tip"` holds the canonical hash of the current tip, and
/// is rewritten by [`ChainStore::save_tip`] after every ingested batch and
/// on shutdown.
pub struct ChainStore {
    db: sled::Db,
    network: Network,
    tip: ChainHeader,
}

impl ChainStore {
    /// Open (or create) the store for `network` under `config.data_dir`.
    ///
    /// A fresh database is seeded with the genesis header. A database that
    /// has data but no `"tip"` key was interrupted mid-initialisation and
    /// is re-seeded the same way.
    pub fn new(config: &Config, network: Network) -> Result<Self, StoreError> {
        let db = config.sled_config(network).open()?;
        let mut store = Self {
            db,
            network,
            tip: ChainHeader {
                header: genesis_header(network),
                height: Height(0),
            },
        };

        match store.db.get(TIP_KEY)? {
            Some(bytes) => {
                let tip_hash = block::Hash::from_ivec(&bytes)?;
                store.tip = store.find(&tip_hash).map_err(|_| {
                    StoreError::Corrupt("tip key points at a header that is not stored")
                })?;
                info!(
                    height = %store.tip.height,
                    hash = %store.tip.header.hash(),
                    "loaded chain tip",
                );
            }
            None => {
                store.insert_genesis()?;
                info!(network = %store.network, "seeded fresh chain store with genesis header");
            }
        }

        Ok(store)
    }

    /// The best known header reachable from genesis.
    pub fn tip(&self) -> &ChainHeader {
        &self.tip
    }

    /// The height of the tip.
    pub fn height(&self) -> Height {
        self.tip.height
    }

    /// Whether the tip's timestamp is within `seconds_cutoff` of now.
    pub fn tip_is_recent(&self, seconds_cutoff: u32) -> bool {
        self.tip.header.age() < seconds_cutoff
    }

    /// Whether `hash` names a header we have seen, attached or orphaned.
    pub fn has_block(&self, hash: &block::Hash) -> Result<bool, StoreError> {
        if self.db.contains_key(&header_key(hash))? {
            return Ok(true);
        }
        Ok(self.find_orphan(hash)?.is_some())
    }

    /// Look up a header by hash, in the chain or in the orphan pool.
    pub fn find(&self, hash: &block::Hash) -> Result<ChainHeader, StoreError> {
        if let Some(bytes) = self.db.get(&header_key(hash))? {
            return ChainHeader::from_ivec(&bytes);
        }
        match self.find_orphan(hash)? {
            Some(orphan) => Ok(orphan),
            None => Err(StoreError::MissingHeader(*hash)),
        }
    }

    /// Ingest one header.
    ///
    /// If the parent is known the header attaches at `parent.height + 1`,
    /// any orphans waiting on it are attached recursively, and the tip
    /// moves if the resulting branch is the new highest. Otherwise the
    /// header goes into the orphan view keyed by its parent hash.
    pub fn put_header(&mut self, header: Header) -> Result<PutOutcome, StoreError> {
        let hash = header.hash();
        if hash.is_zero() {
            return Err(StoreError::InvalidHeader("all-zero block hash"));
        }
        if self.db.contains_key(&header_key(&hash))? {
            trace!(%hash, "ignoring duplicate header");
            return Ok(PutOutcome::AlreadyStored);
        }

        let parent = match self.db.get(&header_key(&header.previous_block_hash))? {
            Some(bytes) => ChainHeader::from_ivec(&bytes)?,
            None => {
                debug!(%hash, parent = %header.previous_block_hash, "storing orphan header");
                self.db.insert(
                    &orphan_key(&header.previous_block_hash)[..],
                    ChainHeader {
                        header,
                        height: Height(0),
                    }
                    .as_sled_bytes(),
                )?;
                metrics::gauge!("state.orphan.count").increment(1.0);
                return Ok(PutOutcome::Orphaned);
            }
        };

        let height = parent.height.succ();
        let mut newest = self.attach(header, height, None)?;

        // Adopt the orphans this header unblocks. Each round consumes one
        // entry from the orphan view, so the loop terminates.
        loop {
            let waiting = orphan_key(&newest.header.hash());
            match self.db.get(&waiting)? {
                None => break,
                Some(bytes) => {
                    let orphan = ChainHeader::from_ivec(&bytes)?;
                    let adopted_height = newest.height.succ();
                    debug!(
                        hash = %orphan.header.hash(),
                        height = %adopted_height,
                        "attaching orphan header",
                    );
                    newest = self.attach(orphan.header, adopted_height, Some(waiting))?;
                    metrics::gauge!("state.orphan.count").decrement(1.0);
                }
            }
        }

        self.update_tip(newest);
        Ok(PutOutcome::Attached(height))
    }

    /// Write the current tip hash under the reserved `"tip"` key and flush.
    pub fn save_tip(&self) -> Result<(), StoreError> {
        self.db
            .insert(TIP_KEY, self.tip.header.hash().as_sled_bytes())?;
        self.db.flush()?;
        trace!(height = %self.tip.height, "saved chain tip");
        Ok(())
    }

    fn insert_genesis(&mut self) -> Result<(), StoreError> {
        let header = genesis_header(self.network);
        let hash = header.hash();
        debug_assert_eq!(hash, genesis_hash(self.network));

        let entry = ChainHeader {
            header,
            height: Height(0),
        };
        let mut batch = sled::Batch::default();
        batch.insert(&header_key(&hash)[..], entry.as_sled_bytes());
        batch.insert(&height_key(Height(0))[..], hash.as_sled_bytes());
        batch.insert(TIP_KEY, hash.as_sled_bytes());
        self.db.apply_batch(batch)?;
        self.tip = entry;
        Ok(())
    }

    /// Commit a header at `height`, atomically removing the orphan entry it
    /// was adopted from, if any.
    fn attach(
        &mut self,
        header: Header,
        height: Height,
        consumed_orphan: Option<[u8; 33]>,
    ) -> Result<ChainHeader, StoreError> {
        let hash = header.hash();
        self.check_checkpoint(height, hash)?;

        let entry = ChainHeader { header, height };
        let mut batch = sled::Batch::default();
        batch.insert(&header_key(&hash)[..], entry.as_sled_bytes());
        batch.insert(&height_key(height)[..], hash.as_sled_bytes());
        if let Some(key) = consumed_orphan {
            batch.remove(&key[..]);
        }
        self.db.apply_batch(batch)?;

        trace!(
            %hash,
            %height,
            work = ?header.difficulty_threshold.to_work(),
            "committed header",
        );
        metrics::counter!("state.committed.header.count").increment(1);
        Ok(entry)
    }

    fn check_checkpoint(&self, height: Height, hash: block::Hash) -> Result<(), StoreError> {
        if let Some(expected) = checkpoint_hash(self.network, height) {
            if expected != hash {
                return Err(StoreError::CheckpointMismatch {
                    height,
                    expected,
                    found: hash,
                });
            }
            info!(%height, "header chain matches checkpoint");
        }
        Ok(())
    }

    fn update_tip(&mut self, candidate: ChainHeader) {
        // strictly greater: on equal heights the first-inserted header wins
        if candidate.height > self.tip.height {
            info!(
                height = %candidate.height,
                hash = %candidate.header.hash(),
                "extending best chain",
            );
            self.tip = candidate;
            metrics::gauge!("state.tip.height").set(candidate.height.0 as f64);
        }
    }

    /// Scan the orphan view for an orphan with this block hash.
    ///
    /// Orphans are keyed by *parent* hash, so this is a linear scan; the
    /// orphan view only ever holds the few headers that arrived out of
    /// order, and shrinks as parents arrive.
    fn find_orphan(&self, hash: &block::Hash) -> Result<Option<ChainHeader>, StoreError> {
        for entry in self.db.scan_prefix(&[ORPHAN_PREFIX]) {
            let (_, bytes) = entry?;
            let orphan = ChainHeader::from_ivec(&bytes)?;
            if orphan.header.hash() == *hash {
                return Ok(Some(orphan));
            }
        }
        Ok(None)
    }
}

impl Drop for ChainStore {
    fn drop(&mut self) {
        if let Err(error) = self.save_tip() {
            warn!(%error, "failed to save chain tip during shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    use spv_chain::block::merkle;
    use spv_chain::parameters::genesis_header;

    use super::*;

    fn open_store(dir: &TempDir) -> ChainStore {
        let config = Config {
            data_dir: dir.path().to_path_buf(),
        };
        ChainStore::new(&config, Network::Testnet).expect("store opens")
    }

    /// A syntactically valid child of `parent`, salted for distinct hashes.
    fn child_of(parent: &Header, salt: u8) -> Header {
        Header::new(
            parent.version,
            parent.hash(),
            merkle::Root([salt; 32]),
            parent.time + Duration::minutes(10),
            parent.difficulty_threshold,
            u32::from(salt),
        )
    }

    #[test]
    fn fresh_store_starts_at_genesis() {
        spv_test::init();
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        assert_eq!(store.height(), Height(0));
        assert_eq!(store.tip().header.hash(), genesis_hash(Network::Testnet));
        assert!(store
            .has_block(&genesis_hash(Network::Testnet))
            .unwrap());
    }

    #[test]
    fn headers_extend_the_tip() {
        spv_test::init();
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        let a = child_of(&genesis_header(Network::Testnet), 1);
        let b = child_of(&a, 2);

        assert_eq!(store.put_header(a).unwrap(), PutOutcome::Attached(Height(1)));
        assert_eq!(store.put_header(b).unwrap(), PutOutcome::Attached(Height(2)));

        assert_eq!(store.height(), Height(2));
        assert_eq!(store.tip().header.hash(), b.hash());
        assert_eq!(store.find(&a.hash()).unwrap().height, Height(1));

        // parent linkage invariant
        let stored_b = store.find(&b.hash()).unwrap();
        let stored_parent = store.find(&stored_b.header.previous_block_hash).unwrap();
        assert_eq!(stored_parent.height, Height(1));
    }

    #[test]
    fn orphan_attaches_when_parent_arrives() {
        spv_test::init();
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        let a = child_of(&genesis_header(Network::Testnet), 1);
        let b = child_of(&a, 2);

        // child first: it parks in the orphan pool and the tip stays put
        assert_eq!(store.put_header(b).unwrap(), PutOutcome::Orphaned);
        assert!(store.has_block(&b.hash()).unwrap());
        assert_eq!(store.find(&b.hash()).unwrap().height, Height(0));
        assert_eq!(store.height(), Height(0));

        // parent arrives: both attach and the tip jumps to the child
        assert_eq!(store.put_header(a).unwrap(), PutOutcome::Attached(Height(1)));
        assert_eq!(store.find(&b.hash()).unwrap().height, Height(2));
        assert_eq!(store.tip().header.hash(), b.hash());
        assert_eq!(store.height(), Height(2));
    }

    #[test]
    fn duplicate_headers_are_ignored() {
        spv_test::init();
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        let a = child_of(&genesis_header(Network::Testnet), 1);
        assert_eq!(store.put_header(a).unwrap(), PutOutcome::Attached(Height(1)));
        assert_eq!(store.put_header(a).unwrap(), PutOutcome::AlreadyStored);
        assert_eq!(store.height(), Height(1));
    }

    #[test]
    fn first_inserted_header_wins_ties_and_longer_forks_take_over() {
        spv_test::init();
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        let a1 = child_of(&genesis_header(Network::Testnet), 1);
        let b1 = child_of(&genesis_header(Network::Testnet), 2);
        let b2 = child_of(&b1, 3);

        store.put_header(a1).unwrap();
        store.put_header(b1).unwrap();
        // equal height: the earlier arrival keeps the tip
        assert_eq!(store.tip().header.hash(), a1.hash());

        // the competing branch overtakes on height
        store.put_header(b2).unwrap();
        assert_eq!(store.tip().header.hash(), b2.hash());
        assert_eq!(store.height(), Height(2));
    }

    #[test]
    fn tip_survives_reopen() {
        spv_test::init();
        let dir = TempDir::new().unwrap();
        let a = child_of(&genesis_header(Network::Testnet), 1);

        {
            let mut store = open_store(&dir);
            store.put_header(a).unwrap();
            store.save_tip().unwrap();
        }

        let store = open_store(&dir);
        assert_eq!(store.height(), Height(1));
        assert_eq!(store.tip().header.hash(), a.hash());
    }

    #[test]
    fn checkpoint_heights_must_match() {
        spv_test::init();
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let expected = checkpoint_hash(Network::Testnet, Height(500_000)).unwrap();
        assert!(store.check_checkpoint(Height(500_000), expected).is_ok());

        let wrong = block::Hash([0x11; 32]);
        match store.check_checkpoint(Height(500_000), wrong) {
            Err(StoreError::CheckpointMismatch { height, .. }) => {
                assert_eq!(height, Height(500_000))
            }
            other => panic!("expected a checkpoint mismatch, got {:?}", other.map(|_| ())),
        }

        // non-checkpointed heights accept anything
        assert!(store.check_checkpoint(Height(499_999), wrong).is_ok());
    }

    #[test]
    fn tip_recency_tracks_header_time() {
        spv_test::init();
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        // the genesis timestamp is from 2011
        assert!(!store.tip_is_recent(3600));

        let genesis = genesis_header(Network::Testnet);
        let fresh = Header::new(
            genesis.version,
            genesis.hash(),
            merkle::Root([9; 32]),
            Utc::now(),
            genesis.difficulty_threshold,
            9,
        );
        store.put_header(fresh).unwrap();
        assert!(store.tip_is_recent(3600));
    }
}
