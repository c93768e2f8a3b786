//! glTF buffer loading and upload lifetime management.
//!
//! - [`ResourceBinder`]: one load pass per asset (resolve, dispatch, tangent pass)
//! - [`ResourceCache`]: deduplicated blobs plus deferred release across uploads
//! - [`uri`]: buffer URI classification and base64 decoding
//! - [`tangent`]: packed tangent frame encoding

pub mod asset;
pub mod binder;
pub mod cache;
pub mod io;
pub mod settings;
pub mod tangent;
pub mod uri;

pub use asset::{
    Accessor, Asset, AttributeSemantic, BindingDestination, BufferBinding, BufferView, HostBuffer, Mesh, Node,
    Primitive, VertexAttribute,
};
pub use binder::{LoadSummary, ResourceBinder};
pub use cache::{Blob, ResourceCache, UploadTicket};
pub use io::{BlobReader, FileBlobReader};
pub use settings::BinderSettings;
pub use uri::{UriKind, classify, is_base64, is_file};
