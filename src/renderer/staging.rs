//! CPU staging backend.
//!
//! Executes uploads on a dedicated worker thread and keeps the uploaded bytes
//! in host memory. Completion callbacks therefore always fire off the loading
//! thread, the same as with a real GPU queue. Useful headless and in tests.

use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::RwLock;
use slotmap::SlotMap;

use super::upload::{BufferDescriptor, BufferUploader, IndexBufferHandle, VertexBufferHandle};

struct StagedVertexBuffer {
    label: String,
    slots: Vec<Option<Vec<u8>>>,
}

struct StagedIndexBuffer {
    label: String,
    data: Option<Vec<u8>>,
}

#[derive(Default)]
struct StagingStore {
    vertex_buffers: RwLock<SlotMap<VertexBufferHandle, StagedVertexBuffer>>,
    index_buffers: RwLock<SlotMap<IndexBufferHandle, StagedIndexBuffer>>,
}

enum UploadJob {
    Vertex {
        buffer: VertexBufferHandle,
        slot: usize,
        descriptor: BufferDescriptor,
    },
    Index {
        buffer: IndexBufferHandle,
        descriptor: BufferDescriptor,
    },
    Fence(flume::Sender<()>),
}

/// [`BufferUploader`] that stores uploads in host memory on a worker thread.
///
/// Buffers are created up front with [`Self::create_vertex_buffer`] and
/// [`Self::create_index_buffer`]. Each upload is copied in and its descriptor
/// dropped on the worker, which completes the upload ticket there. Use
/// [`Self::flush`] to wait for everything submitted so far.
pub struct StagingUploader {
    store: Arc<StagingStore>,
    jobs: Option<flume::Sender<UploadJob>>,
    worker: Option<JoinHandle<()>>,
}

impl StagingUploader {
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(StagingStore::default());
        let (tx, rx) = flume::unbounded::<UploadJob>();

        let worker_store = Arc::clone(&store);
        let worker = std::thread::Builder::new()
            .name("myth-staging-upload".to_string())
            .spawn(move || {
                for job in rx {
                    worker_store.execute(job);
                }
                log::trace!("Staging upload worker stopped");
            })
            .ok();

        if worker.is_none() {
            log::error!("Failed to spawn staging upload worker");
        }

        Self {
            store,
            jobs: Some(tx),
            worker,
        }
    }

    /// Creates a vertex buffer with `slot_count` attribute slots.
    pub fn create_vertex_buffer(&self, label: &str, slot_count: usize) -> VertexBufferHandle {
        self.store.vertex_buffers.write().insert(StagedVertexBuffer {
            label: label.to_string(),
            slots: vec![None; slot_count],
        })
    }

    pub fn create_index_buffer(&self, label: &str) -> IndexBufferHandle {
        self.store.index_buffers.write().insert(StagedIndexBuffer {
            label: label.to_string(),
            data: None,
        })
    }

    /// Uploaded contents of a vertex buffer slot.
    #[must_use]
    pub fn vertex_data(&self, buffer: VertexBufferHandle, slot: usize) -> Option<Vec<u8>> {
        let buffers = self.store.vertex_buffers.read();
        buffers.get(buffer)?.slots.get(slot)?.clone()
    }

    #[must_use]
    pub fn index_data(&self, buffer: IndexBufferHandle) -> Option<Vec<u8>> {
        self.store.index_buffers.read().get(buffer)?.data.clone()
    }

    /// Blocks until every upload submitted before this call has completed.
    pub fn flush(&self) {
        let Some(jobs) = &self.jobs else { return };
        let (tx, rx) = flume::bounded(1);
        if jobs.send(UploadJob::Fence(tx)).is_ok() {
            let _ = rx.recv();
        }
    }

    fn submit(&self, job: UploadJob) {
        match &self.jobs {
            Some(jobs) => {
                // A dead worker hands the job back; dropping it completes the ticket.
                if let Err(flume::SendError(job)) = jobs.send(job) {
                    log::error!("Staging upload worker is gone, dropping upload");
                    drop(job);
                }
            }
            None => drop(job),
        }
    }
}

impl Default for StagingUploader {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StagingUploader {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit.
        self.jobs.take();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            log::error!("Staging upload worker panicked");
        }
    }
}

impl BufferUploader for StagingUploader {
    fn set_vertex_buffer_at(&self, buffer: VertexBufferHandle, slot: usize, descriptor: BufferDescriptor) {
        self.submit(UploadJob::Vertex {
            buffer,
            slot,
            descriptor,
        });
    }

    fn set_index_buffer(&self, buffer: IndexBufferHandle, descriptor: BufferDescriptor) {
        self.submit(UploadJob::Index { buffer, descriptor });
    }
}

impl StagingStore {
    fn execute(&self, job: UploadJob) {
        match job {
            UploadJob::Vertex {
                buffer,
                slot,
                descriptor,
            } => {
                let mut buffers = self.vertex_buffers.write();
                match buffers.get_mut(buffer).and_then(|vb| {
                    let label = vb.label.clone();
                    vb.slots.get_mut(slot).map(|s| (label, s))
                }) {
                    Some((label, target)) => {
                        log::trace!("Staged {} bytes into {label}[{slot}]", descriptor.len());
                        *target = Some(descriptor.to_vec());
                    }
                    None => log::error!("Vertex upload to unknown buffer/slot {buffer:?}[{slot}]"),
                }
                drop(buffers);
                descriptor.complete();
            }
            UploadJob::Index { buffer, descriptor } => {
                let mut buffers = self.index_buffers.write();
                match buffers.get_mut(buffer) {
                    Some(ib) => {
                        log::trace!("Staged {} bytes into {}", descriptor.len(), ib.label);
                        ib.data = Some(descriptor.to_vec());
                    }
                    None => log::error!("Index upload to unknown buffer {buffer:?}"),
                }
                drop(buffers);
                descriptor.complete();
            }
            UploadJob::Fence(done) => {
                let _ = done.send(());
            }
        }
    }
}
