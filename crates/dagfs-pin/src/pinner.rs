//! The pin set.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

use dagfs_store::{AbortOptions, BlockService};
use dagfs_types::{to_v1, Cid};
use tracing::{debug, info};

use crate::error::{PinError, PinResult};
use crate::store::{InMemoryPinStore, PinStore};
use crate::types::{Pin, PinEntry, PinFilter, PinMode, PinStatus};
use crate::walk::{find_parent, reachable};

#[derive(Clone, Debug, Default)]
pub struct PinAddOptions {
    /// Protect the whole DAG below the CID, not just its block.
    pub recursive: bool,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub abort: AbortOptions,
}

impl PinAddOptions {
    pub fn recursive() -> Self {
        Self {
            recursive: true,
            ..Self::default()
        }
    }

    pub fn direct() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Direct and recursive pins, keyed by CIDv1 so both CID versions of a
/// block name the same pin.
///
/// The pinner does not take the GC lock. Callers that write blocks and
/// then pin them hold the writer side across both steps.
pub struct Pinner {
    blocks: BlockService,
    pins: RwLock<BTreeMap<Cid, Pin>>,
    store: Arc<dyn PinStore>,
}

impl Pinner {
    pub fn open(blocks: BlockService, store: Arc<dyn PinStore>) -> PinResult<Self> {
        let pins = store
            .load()?
            .into_iter()
            .map(|pin| (to_v1(&pin.cid), pin))
            .collect::<BTreeMap<_, _>>();
        info!(count = pins.len(), "loaded pins");
        Ok(Self {
            blocks,
            pins: RwLock::new(pins),
            store,
        })
    }

    pub fn in_memory(blocks: BlockService) -> Self {
        Self {
            blocks,
            pins: RwLock::new(BTreeMap::new()),
            store: Arc::new(InMemoryPinStore::new()),
        }
    }

    /// Pin `cid`. A recursive pin first fetches the whole DAG, and
    /// replaces a direct pin on the same CID. Pinning again the same way
    /// is a no-op.
    pub async fn add(&self, cid: &Cid, opts: &PinAddOptions) -> PinResult<Pin> {
        let key = to_v1(cid);
        let mode = if opts.recursive {
            PinMode::Recursive
        } else {
            PinMode::Direct
        };
        if let Some(existing) = settled(self.get(&key).as_ref(), mode, cid)? {
            return Ok(existing);
        }

        if opts.recursive {
            let blocks = reachable(&self.blocks, [*cid], false, &opts.abort).await?;
            debug!(%cid, blocks = blocks.len(), "fetched dag for recursive pin");
        } else {
            self.blocks.get(cid, &opts.abort).await?;
        }

        let pin = Pin {
            cid: *cid,
            mode,
            metadata: opts.metadata.clone(),
        };
        // Another add may have landed while the DAG was fetched.
        let mut pins = self.pins.write().expect("lock poisoned");
        if let Some(existing) = settled(pins.get(&key), mode, cid)? {
            return Ok(existing);
        }
        pins.insert(key, pin.clone());
        self.persist(&pins)?;
        info!(%cid, mode = mode.as_str(), "pinned");
        Ok(pin)
    }

    /// Remove the pin on `cid`.
    ///
    /// Fails with `PinnedIndirectly` when the CID has no pin of its own but
    /// sits below a recursive pin, and with `PinnedRecursively` when a
    /// recursive pin is removed with `recursive` unset.
    pub async fn rm(&self, cid: &Cid, recursive: bool, abort: &AbortOptions) -> PinResult<Pin> {
        let pin = self.check_removable(cid, recursive, abort).await?;
        let mut pins = self.pins.write().expect("lock poisoned");
        if let Some(current) = pins.get(&to_v1(cid)) {
            if current.mode == PinMode::Recursive && !recursive {
                return Err(PinError::PinnedRecursively(*cid));
            }
        }
        pins.remove(&to_v1(cid));
        self.persist(&pins)?;
        info!(%cid, mode = pin.mode.as_str(), "unpinned");
        Ok(pin)
    }

    /// Remove several pins. Each CID gets its own result; the pins that
    /// can be removed are, whatever happens to the others.
    pub async fn rm_all(
        &self,
        cids: &[Cid],
        recursive: bool,
        abort: &AbortOptions,
    ) -> PinResult<Vec<(Cid, PinResult<Pin>)>> {
        let mut results = Vec::with_capacity(cids.len());
        for cid in cids {
            abort.check()?;
            results.push((*cid, self.check_removable(cid, recursive, abort).await));
        }

        let mut pins = self.pins.write().expect("lock poisoned");
        for (cid, result) in &results {
            if result.is_ok() {
                pins.remove(&to_v1(cid));
            }
        }
        self.persist(&pins)?;
        let removed = results.iter().filter(|(_, r)| r.is_ok()).count();
        info!(removed, failed = results.len() - removed, "unpinned batch");
        Ok(results)
    }

    async fn check_removable(&self, cid: &Cid, recursive: bool, abort: &AbortOptions) -> PinResult<Pin> {
        match self.get(&to_v1(cid)) {
            Some(pin) if pin.mode == PinMode::Recursive && !recursive => {
                Err(PinError::PinnedRecursively(*cid))
            }
            Some(pin) => Ok(pin),
            None => match find_parent(&self.blocks, &self.recursive_roots(), cid, abort).await? {
                Some(via) => Err(PinError::PinnedIndirectly { cid: *cid, via }),
                None => Err(PinError::NotPinned(*cid)),
            },
        }
    }

    /// Every pin matching `filter`. Indirect entries are derived by
    /// walking the recursive pins and leave out CIDs pinned in their own
    /// right.
    pub async fn ls(&self, filter: PinFilter, abort: &AbortOptions) -> PinResult<Vec<PinEntry>> {
        let stored = self.snapshot();
        let mut out: Vec<PinEntry> = stored
            .iter()
            .map(|pin| PinEntry {
                cid: pin.cid,
                status: pin.mode.into(),
                metadata: pin.metadata.clone(),
            })
            .filter(|entry| filter.accepts(&entry.status))
            .collect();

        if matches!(filter, PinFilter::All | PinFilter::Indirect) {
            let own: HashSet<Cid> = stored.iter().map(|p| to_v1(&p.cid)).collect();
            let mut listed = HashSet::new();
            for root in stored.iter().filter(|p| p.mode == PinMode::Recursive) {
                for cid in reachable(&self.blocks, [root.cid], true, abort).await? {
                    if !own.contains(&cid) && listed.insert(cid) {
                        out.push(PinEntry {
                            cid,
                            status: PinStatus::Indirect { via: root.cid },
                            metadata: BTreeMap::new(),
                        });
                    }
                }
            }
        }
        Ok(out)
    }

    /// Status of each CID in `cids`, in order. Fails with `NotPinned` on
    /// the first CID not protected in a way `filter` accepts.
    pub async fn ls_cids(
        &self,
        cids: &[Cid],
        filter: PinFilter,
        abort: &AbortOptions,
    ) -> PinResult<Vec<PinEntry>> {
        let mut out = Vec::with_capacity(cids.len());
        for cid in cids {
            let status = self
                .is_pinned(cid, abort)
                .await?
                .filter(|s| filter.accepts(s))
                .ok_or(PinError::NotPinned(*cid))?;
            let metadata = self.get(&to_v1(cid)).map(|p| p.metadata).unwrap_or_default();
            out.push(PinEntry {
                cid: *cid,
                status,
                metadata,
            });
        }
        Ok(out)
    }

    /// How `cid` is protected, if at all.
    pub async fn is_pinned(&self, cid: &Cid, abort: &AbortOptions) -> PinResult<Option<PinStatus>> {
        if let Some(pin) = self.get(&to_v1(cid)) {
            return Ok(Some(pin.mode.into()));
        }
        let parent = find_parent(&self.blocks, &self.recursive_roots(), cid, abort).await?;
        Ok(parent.map(|via| PinStatus::Indirect { via }))
    }

    /// A copy of every stored pin.
    pub fn snapshot(&self) -> Vec<Pin> {
        self.pins.read().expect("lock poisoned").values().cloned().collect()
    }

    pub fn recursive_roots(&self) -> Vec<Cid> {
        self.roots(PinMode::Recursive)
    }

    pub fn direct_roots(&self) -> Vec<Cid> {
        self.roots(PinMode::Direct)
    }

    fn roots(&self, mode: PinMode) -> Vec<Cid> {
        self.pins
            .read()
            .expect("lock poisoned")
            .values()
            .filter(|p| p.mode == mode)
            .map(|p| p.cid)
            .collect()
    }

    fn get(&self, key: &Cid) -> Option<Pin> {
        self.pins.read().expect("lock poisoned").get(key).cloned()
    }

    fn persist(&self, pins: &BTreeMap<Cid, Pin>) -> PinResult<()> {
        let all: Vec<Pin> = pins.values().cloned().collect();
        self.store.save(&all)
    }
}

/// The outcome of adding a `mode` pin when `existing` is already stored:
/// an error, the pin to report unchanged, or `None` to go ahead.
fn settled(existing: Option<&Pin>, mode: PinMode, cid: &Cid) -> PinResult<Option<Pin>> {
    match existing {
        Some(pin) if pin.mode == PinMode::Recursive && mode == PinMode::Direct => {
            Err(PinError::AlreadyPinnedRecursively(*cid))
        }
        Some(pin) if pin.mode == mode => Ok(Some(pin.clone())),
        _ => Ok(None),
    }
}

impl std::fmt::Debug for Pinner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pinner")
            .field("pins", &self.pins.read().expect("lock poisoned").len())
            .finish()
    }
}
