//! Binder Settings
//!
//! Configuration for a [`ResourceBinder`](super::ResourceBinder).
//!
//! ```rust,ignore
//! use myth_gltfio::assets::BinderSettings;
//!
//! let settings = BinderSettings {
//!     base_path: "assets/helmet".into(),
//!     ..Default::default()
//! };
//!
//! // Or from a JSON document; missing fields keep their defaults.
//! let settings = BinderSettings::from_json(r#"{ "base_path": "assets/helmet" }"#)?;
//! ```

use std::path::PathBuf;

use serde::Deserialize;

use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BinderSettings {
    /// Directory (or asset file) that relative buffer URIs resolve against.
    pub base_path: PathBuf,
    /// Run the tangent frame pass when orientation buffers are bound.
    pub compute_tangent_frames: bool,
}

impl Default for BinderSettings {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            compute_tangent_frames: true,
        }
    }
}

impl BinderSettings {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
