#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod assets;
pub mod errors;
pub mod renderer;

pub use assets::{Asset, BinderSettings, BufferBinding, LoadSummary, ResourceBinder, ResourceCache};
pub use errors::{Error, Result};
pub use renderer::{BufferDescriptor, BufferUploader, StagingUploader, WgpuUploader};
