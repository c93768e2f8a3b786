//! URI-keyed blob cache with upload-aware deferred release.
//!
//! # Lifetime
//!
//! A [`ResourceCache`] outlives its owner for as long as GPU uploads that read
//! from it are in flight. The owner-alive flag and the pending-upload count
//! share one atomic word, so the "last one out releases" decision is a single
//! read-modify-write: exactly one of {owner destruction, final completion}
//! observes the word reaching zero, whichever happens last.
//!
//! Blob inserts only happen on the loading thread. Completion callbacks never
//! read the map; they touch only the state word (and the map on release).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

/// A loaded buffer. Shared with every upload that reads from it.
pub type Blob = Arc<[u8]>;

const OWNER_ALIVE: u64 = 1 << 63;
const PENDING_MASK: u64 = OWNER_ALIVE - 1;

/// URI-keyed store of loaded blobs shared by a binder and its in-flight uploads.
///
/// Created by the [`ResourceBinder`](super::ResourceBinder), which reports its
/// own destruction through [`Self::on_owner_destroyed`]. Each dispatched upload
/// holds an [`UploadTicket`]. The blobs are dropped once, when the owner is gone
/// and the last ticket has completed, in whichever order those happen.
pub struct ResourceCache {
    /// Bit 63: owner alive. Low bits: pending uploads.
    state: AtomicU64,
    blobs: RwLock<FxHashMap<String, Blob>>,
    released: AtomicBool,
    release_count: AtomicU32,
    released_tx: Mutex<Option<flume::Sender<()>>>,
    released_rx: flume::Receiver<()>,
}

impl ResourceCache {
    #[must_use]
    pub fn new() -> Arc<Self> {
        let (tx, rx) = flume::bounded(1);
        Arc::new(Self {
            state: AtomicU64::new(OWNER_ALIVE),
            blobs: RwLock::default(),
            released: AtomicBool::new(false),
            release_count: AtomicU32::new(0),
            released_tx: Mutex::new(Some(tx)),
            released_rx: rx,
        })
    }

    /// Looks up a previously loaded blob.
    #[must_use]
    pub fn get_resource(&self, uri: &str) -> Option<Blob> {
        self.blobs.read().get(uri).cloned()
    }

    /// Inserts or replaces the blob for `uri`.
    ///
    /// Callers only add after [`Self::get_resource`] missed.
    pub fn add_resource(&self, uri: &str, blob: Blob) {
        self.blobs.write().insert(uri.to_string(), blob);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// Registers an upload that is about to be dispatched.
    ///
    /// Must be called before the upload is handed to the engine. The returned
    /// ticket reports completion exactly once, either through
    /// [`UploadTicket::complete`] or when it is dropped.
    ///
    /// A released cache (owner gone, nothing pending) accepts no new uploads:
    /// the call is logged and the returned ticket is detached, so completing it
    /// cannot release the cache a second time.
    pub fn add_pending_upload(self: &Arc<Self>) -> UploadTicket {
        let update = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                (state != 0 && state & PENDING_MASK < PENDING_MASK).then(|| state + 1)
            });

        match update {
            Ok(_) => UploadTicket {
                cache: Some(Arc::clone(self)),
            },
            Err(state) => {
                if state == 0 {
                    log::error!("Upload registered on a released resource cache");
                } else {
                    log::error!("Pending upload count overflow");
                }
                UploadTicket { cache: None }
            }
        }
    }

    /// Upload-completion callback. May run on any thread.
    ///
    /// Releases the cache when this was the last pending upload and the owner
    /// is already gone. A completion without a pending upload is logged and
    /// ignored; the count never goes negative.
    pub fn on_loaded_resource(&self) {
        let update = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                (state & PENDING_MASK != 0).then(|| state - 1)
            });

        match update {
            Ok(prev) => {
                log::trace!("Upload completed, {} still pending", (prev & PENDING_MASK) - 1);
                if prev == 1 {
                    self.release();
                }
            }
            Err(_) => log::error!("Upload completion reported with no pending uploads"),
        }
    }

    /// Called once by the owner when it is destroyed.
    ///
    /// Releases immediately when nothing is in flight, otherwise leaves the
    /// release to the last completion.
    pub fn on_owner_destroyed(&self) {
        let update = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                (state & OWNER_ALIVE != 0).then_some(state & !OWNER_ALIVE)
            });

        match update {
            Ok(prev) => {
                let pending = prev & PENDING_MASK;
                if pending == 0 {
                    self.release();
                } else {
                    log::debug!("Owner destroyed with {pending} uploads in flight, deferring release");
                }
            }
            Err(_) => log::error!("Resource cache owner destroyed twice"),
        }
    }

    #[inline]
    #[must_use]
    pub fn pending_uploads(&self) -> u64 {
        self.state.load(Ordering::Acquire) & PENDING_MASK
    }

    #[inline]
    #[must_use]
    pub fn is_owner_alive(&self) -> bool {
        self.state.load(Ordering::Acquire) & OWNER_ALIVE != 0
    }

    #[inline]
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Number of times the cache has been released. Anything but 0 or 1 is a bug.
    #[inline]
    #[must_use]
    pub fn release_count(&self) -> u32 {
        self.release_count.load(Ordering::Acquire)
    }

    /// A receiver that yields once, when the cache is released.
    #[must_use]
    pub fn released_signal(&self) -> flume::Receiver<()> {
        self.released_rx.clone()
    }

    fn release(&self) {
        self.release_count.fetch_add(1, Ordering::AcqRel);
        self.released.store(true, Ordering::Release);

        let blobs = std::mem::take(&mut *self.blobs.write());
        log::debug!("Releasing resource cache ({} blobs)", blobs.len());
        drop(blobs);

        if let Some(tx) = self.released_tx.lock().take() {
            let _ = tx.try_send(());
        }
    }
}

/// Completion context for one pending upload.
///
/// Travels with the upload to whatever thread finishes it. Completing (or
/// dropping) the ticket decrements the cache's pending count exactly once.
#[must_use = "dropping a ticket reports the upload as complete"]
pub struct UploadTicket {
    /// `None` when the cache refused the upload.
    cache: Option<Arc<ResourceCache>>,
}

impl UploadTicket {
    /// Reports the upload as complete.
    pub fn complete(self) {
        drop(self);
    }

    /// `false` for tickets handed out by an already released cache.
    #[inline]
    #[must_use]
    pub fn is_tracked(&self) -> bool {
        self.cache.is_some()
    }
}

impl Drop for UploadTicket {
    fn drop(&mut self) {
        if let Some(cache) = self.cache.take() {
            cache.on_loaded_resource();
        }
    }
}

impl std::fmt::Debug for UploadTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadTicket")
            .field("pending", &self.cache.as_ref().map(|cache| cache.pending_uploads()))
            .finish()
    }
}
