//! # Resources Module
//!
//! Static text templates and flow images, looked up by name under the
//! resources directory:
//!
//! - `messages/<name>.txt` for canned messages (e.g. the welcome text)
//! - `prompts/<name>.txt` for system prompts
//! - `prompts/translator/<code>.txt` for translation prompts
//! - `images/<name>.{jpg,jpeg,png,webp}` for flow pictures

use std::path::{Path, PathBuf};
use tracing::warn;

use crate::errors::ResourceError;

/// Image extensions tried in order by [`ResourceLoader::find_image`]
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Name-indexed access to the resources directory
#[derive(Debug, Clone)]
pub struct ResourceLoader {
    root: PathBuf,
}

impl ResourceLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load_message(&self, name: &str) -> Result<String, ResourceError> {
        read_text(&self.root.join("messages").join(format!("{name}.txt")))
    }

    pub fn load_prompt(&self, name: &str) -> Result<String, ResourceError> {
        read_text(&self.root.join("prompts").join(format!("{name}.txt")))
    }

    pub fn load_translator_prompt(&self, language_code: &str) -> Result<String, ResourceError> {
        read_text(
            &self
                .root
                .join("prompts")
                .join("translator")
                .join(format!("{language_code}.txt")),
        )
    }

    /// Find the image for a flow; `None` when no supported file exists
    pub fn find_image(&self, name: &str) -> Option<PathBuf> {
        let images_dir = self.root.join("images");
        let found = IMAGE_EXTENSIONS
            .iter()
            .map(|ext| images_dir.join(format!("{name}.{ext}")))
            .find(|path| path.is_file());

        if found.is_none() {
            warn!(
                image = %name,
                images_dir = %images_dir.display(),
                "Image not found for any supported extension"
            );
        }
        found
    }
}

fn read_text(path: &Path) -> Result<String, ResourceError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ResourceError::NotFound(path.to_path_buf()))
        }
        Err(source) => Err(ResourceError::Unreadable {
            path: path.to_path_buf(),
            source,
        }),
    }
}
