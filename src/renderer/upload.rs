//! Buffer upload seam between the binder and a GPU backend.
//!
//! Uploads are fire-and-forget from the binder's point of view: the bytes and
//! an optional [`UploadTicket`] travel together in a [`BufferDescriptor`], and
//! the backend drops (or completes) the descriptor once the GPU no longer
//! needs the source bytes. Completion may happen on any thread.

use std::ops::{Deref, Range};
use std::sync::Arc;

use slotmap::new_key_type;

use crate::assets::{Blob, UploadTicket};

new_key_type! {
    pub struct VertexBufferHandle;
    pub struct IndexBufferHandle;
}

/// Source bytes for one upload plus its completion context.
#[derive(Debug)]
pub struct BufferDescriptor {
    blob: Blob,
    range: Range<usize>,
    ticket: Option<UploadTicket>,
}

impl BufferDescriptor {
    /// Borrows `range` of a shared blob.
    ///
    /// # Panics
    /// If `range` lies outside the blob.
    #[must_use]
    pub fn new(blob: Blob, range: Range<usize>) -> Self {
        assert!(
            range.start <= range.end && range.end <= blob.len(),
            "descriptor range {range:?} outside blob of {} bytes",
            blob.len()
        );
        Self {
            blob,
            range,
            ticket: None,
        }
    }

    #[must_use]
    pub fn from_vec(data: Vec<u8>) -> Self {
        let len = data.len();
        Self::new(Arc::from(data), 0..len)
    }

    #[must_use]
    pub fn with_ticket(mut self, ticket: UploadTicket) -> Self {
        self.ticket = Some(ticket);
        self
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.blob[self.range.clone()]
    }

    #[inline]
    #[must_use]
    pub fn has_ticket(&self) -> bool {
        self.ticket.is_some()
    }

    /// Signals the completion callback and releases the source bytes.
    pub fn complete(self) {
        drop(self);
    }
}

impl Deref for BufferDescriptor {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Asynchronous vertex/index buffer upload entry points.
///
/// Implementations must eventually drop every descriptor they receive,
/// including ones aimed at unknown handles, so pending uploads always drain.
pub trait BufferUploader: Send + Sync {
    fn set_vertex_buffer_at(&self, buffer: VertexBufferHandle, slot: usize, descriptor: BufferDescriptor);

    fn set_index_buffer(&self, buffer: IndexBufferHandle, descriptor: BufferDescriptor);
}

impl<U: BufferUploader + ?Sized> BufferUploader for Arc<U> {
    fn set_vertex_buffer_at(&self, buffer: VertexBufferHandle, slot: usize, descriptor: BufferDescriptor) {
        (**self).set_vertex_buffer_at(buffer, slot, descriptor);
    }

    fn set_index_buffer(&self, buffer: IndexBufferHandle, descriptor: BufferDescriptor) {
        (**self).set_index_buffer(buffer, descriptor);
    }
}
