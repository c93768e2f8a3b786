//! Resource Binder
//!
//! Drives one load pass for a parsed asset:
//!
//! 1. Every [`BufferBinding`] is resolved to a blob, in declaration order:
//!    cache hit, inline base64 payload, or a file under the base directory.
//! 2. The bound byte range is dispatched to its destination. Vertex and index
//!    data go to the [`BufferUploader`] together with an [`UploadTicket`]
//!    (see [`ResourceCache`]); animation and orientation data are copied
//!    synchronously into host memory.
//! 3. When orientation data was bound, a tangent pass walks the node graph and
//!    replaces each primitive's normal slot with packed tangent frames.
//!
//! The first failure aborts the pass. Uploads already dispatched stay in
//! flight; nothing is rolled back.
//!
//! [`UploadTicket`]: super::UploadTicket

use std::path::PathBuf;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::asset::{Accessor, Asset, AttributeSemantic, BindingDestination, BufferBinding, HostBuffer, Primitive, VertexAttribute};
use super::cache::{Blob, ResourceCache};
use super::io::{BlobReader, FileBlobReader};
use super::settings::BinderSettings;
use super::tangent::{pack_tangent_frames, read_vec3s, read_vec4s, tangent_frames_to_bytes};
use super::uri::{self, UriKind};
use crate::errors::{Error, Result};
use crate::renderer::{BufferDescriptor, BufferUploader};

/// What a successful load pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub bindings: usize,
    pub cache_hits: usize,
    pub base64_decoded: usize,
    pub files_read: usize,
    /// Vertex and index uploads issued for bindings.
    pub uploads_dispatched: usize,
    /// Animation and orientation copies.
    pub copies: usize,
    /// Primitives that received packed tangent frames.
    pub tangent_frames: usize,
}

/// Loads the buffers of an [`Asset`] and hands them to a [`BufferUploader`].
///
/// One binder serves one asset. It owns a [`ResourceCache`] so repeated URIs are
/// read or decoded once. Dropping the binder does not free blobs that uploads
/// still read from; the cache outlives it until every upload has completed.
pub struct ResourceBinder<U: BufferUploader> {
    uploader: U,
    settings: BinderSettings,
    reader: Box<dyn BlobReader>,
    cache: Arc<ResourceCache>,
}

impl<U: BufferUploader> ResourceBinder<U> {
    pub fn new(uploader: U, base_path: impl Into<PathBuf>) -> Self {
        Self::with_settings(uploader, BinderSettings::new(base_path))
    }

    pub fn with_settings(uploader: U, settings: BinderSettings) -> Self {
        let reader = Box::new(FileBlobReader::new(&settings.base_path));
        Self {
            uploader,
            settings,
            reader,
            cache: ResourceCache::new(),
        }
    }

    /// Replaces the file reader.
    #[must_use]
    pub fn with_reader(mut self, reader: impl BlobReader + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    #[inline]
    #[must_use]
    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.cache
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &BinderSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    /// Loads and dispatches every buffer of `asset`.
    ///
    /// Failures are written to the error log; the return value only says
    /// whether the pass completed.
    pub fn load_resources(&self, asset: &Asset) -> bool {
        self.try_load_resources(asset).is_ok()
    }

    /// Same as [`Self::load_resources`] with the failure kind preserved.
    pub fn try_load_resources(&self, asset: &Asset) -> Result<LoadSummary> {
        let mut summary = LoadSummary::default();
        let mut needs_tangents = false;

        for binding in &asset.bindings {
            if let Err(err) = self.bind(binding, &mut summary, &mut needs_tangents) {
                log::error!("{err}");
                return Err(err);
            }
            summary.bindings += 1;
        }

        if needs_tangents && self.settings.compute_tangent_frames {
            self.compute_tangents(asset, &mut summary);
        }

        log::debug!("Bound {} buffers: {summary:?}", summary.bindings);
        Ok(summary)
    }

    fn bind(&self, binding: &BufferBinding, summary: &mut LoadSummary, needs_tangents: &mut bool) -> Result<()> {
        let blob = self.resolve(binding, summary)?;

        let Some(destination) = &binding.destination else {
            return Err(Error::MalformedBinding(binding.uri.clone()));
        };

        let end = binding
            .offset
            .checked_add(binding.size)
            .filter(|&end| end <= blob.len())
            .ok_or_else(|| Error::BindingOutOfRange {
                uri: binding.uri.clone(),
                offset: binding.offset,
                end: binding.offset.saturating_add(binding.size),
                len: blob.len(),
            })?;
        let range = binding.offset..end;

        match destination {
            BindingDestination::Vertex { buffer, slot } => {
                let ticket = self.cache.add_pending_upload();
                log::trace!("Vertex upload {}[{:?}] <- {}", slot, range, short_uri(&binding.uri));
                self.uploader
                    .set_vertex_buffer_at(*buffer, *slot, BufferDescriptor::new(blob, range).with_ticket(ticket));
                summary.uploads_dispatched += 1;
            }
            BindingDestination::Index(buffer) => {
                let ticket = self.cache.add_pending_upload();
                log::trace!("Index upload [{:?}] <- {}", range, short_uri(&binding.uri));
                self.uploader
                    .set_index_buffer(*buffer, BufferDescriptor::new(blob, range).with_ticket(ticket));
                summary.uploads_dispatched += 1;
            }
            BindingDestination::Animation(target) => {
                copy_into(target, &blob[range]);
                summary.copies += 1;
            }
            BindingDestination::Orientation(target) => {
                copy_into(target, &blob[range]);
                summary.copies += 1;
                *needs_tangents = true;
            }
        }
        Ok(())
    }

    fn resolve(&self, binding: &BufferBinding, summary: &mut LoadSummary) -> Result<Blob> {
        let uri = binding.uri.as_str();
        if let Some(blob) = self.cache.get_resource(uri) {
            summary.cache_hits += 1;
            return Ok(blob);
        }

        let data = match uri::classify(uri) {
            UriKind::Base64 => {
                let data = uri::decode_base64(uri, binding.total_size)?;
                summary.base64_decoded += 1;
                data
            }
            UriKind::File => {
                let data = self.read_file(uri, binding.total_size)?;
                summary.files_read += 1;
                data
            }
            UriKind::Unsupported => return Err(Error::UnresolvableResource(uri.to_string())),
        };

        log::debug!("Loaded {} bytes from {}", data.len(), short_uri(uri));
        let blob: Blob = Arc::from(data);
        self.cache.add_resource(uri, Arc::clone(&blob));
        Ok(blob)
    }

    fn read_file(&self, uri: &str, total_size: usize) -> Result<Vec<u8>> {
        let data = self.reader.read_bytes(uri).map_err(|source| Error::FileRead {
            uri: uri.to_string(),
            source,
        })?;

        uri::fit_to_size_hint(data, total_size).map_err(|len| Error::FileRead {
            uri: uri.to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("file holds {len} bytes, {total_size} declared"),
            ),
        })
    }

    // ========================================================================
    // Tangent pass
    // ========================================================================

    fn compute_tangents(&self, asset: &Asset, summary: &mut LoadSummary) {
        let orientation: FxHashMap<&str, &HostBuffer> = asset
            .bindings
            .iter()
            .filter_map(|binding| match &binding.destination {
                Some(BindingDestination::Orientation(target)) => Some((binding.uri.as_str(), target)),
                _ => None,
            })
            .collect();

        for mesh in asset.node_meshes() {
            for primitive in &mesh.primitives {
                if self.compute_primitive_frames(primitive, &orientation) {
                    summary.tangent_frames += 1;
                }
            }
        }
    }

    /// Returns `true` when frames were packed and uploaded.
    fn compute_primitive_frames(&self, primitive: &Primitive, orientation: &FxHashMap<&str, &HostBuffer>) -> bool {
        let mut normals: Option<(usize, &VertexAttribute)> = None;
        let mut tangents: Option<&VertexAttribute> = None;
        for (slot, attribute) in primitive.attributes.iter().enumerate() {
            match attribute.semantic {
                AttributeSemantic::Normal => normals = Some((slot, attribute)),
                AttributeSemantic::Tangent => tangents = Some(attribute),
                _ => {}
            }
        }

        let Some((slot, normal_attribute)) = normals else {
            return false;
        };
        if normal_attribute.accessor.count == 0 {
            return false;
        }

        let Some(vertex_buffer) = primitive.vertex_buffer else {
            log::warn!("Primitive has normals but no vertex buffer, skipping tangent frames");
            return false;
        };

        let Some(normals) = read_orientation(orientation, normal_attribute, read_vec3s) else {
            log::warn!(
                "Normals of {} are not readable, skipping tangent frames",
                short_uri(&normal_attribute.accessor.view.uri)
            );
            return false;
        };

        let tangents = tangents.and_then(|attribute| {
            let tangents = read_orientation(orientation, attribute, read_vec4s);
            if tangents.is_none() {
                log::warn!(
                    "Tangents of {} are not readable, synthesizing them",
                    short_uri(&attribute.accessor.view.uri)
                );
            }
            tangents
        });

        let frames = pack_tangent_frames(&normals, tangents.as_deref());
        log::trace!("Packed {} tangent frames into slot {slot}", frames.len());

        let ticket = self.cache.add_pending_upload();
        let descriptor = BufferDescriptor::from_vec(tangent_frames_to_bytes(&frames)).with_ticket(ticket);
        self.uploader.set_vertex_buffer_at(vertex_buffer, slot, descriptor);
        true
    }
}

impl<U: BufferUploader> Drop for ResourceBinder<U> {
    fn drop(&mut self) {
        self.cache.on_owner_destroyed();
    }
}

fn read_orientation<T>(
    orientation: &FxHashMap<&str, &HostBuffer>,
    attribute: &VertexAttribute,
    read: impl Fn(&[u8], &Accessor) -> Option<Vec<T>>,
) -> Option<Vec<T>> {
    let source = orientation.get(attribute.accessor.view.uri.as_str())?;
    let bytes = source.read();
    read(bytes.as_slice(), &attribute.accessor)
}

fn copy_into(target: &HostBuffer, bytes: &[u8]) {
    let mut dst = target.write();
    if dst.len() < bytes.len() {
        dst.resize(bytes.len(), 0);
    }
    dst[..bytes.len()].copy_from_slice(bytes);
}

/// Data URIs can be megabytes long; keep log lines readable.
fn short_uri(uri: &str) -> &str {
    const MAX: usize = 48;
    match uri.char_indices().nth(MAX) {
        Some((idx, _)) => &uri[..idx],
        None => uri,
    }
}
