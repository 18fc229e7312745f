//! Preview resources: `data:` URLs for images and revocable object URLs
//! for videos.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::SelectedFile;

/// Object URLs are served by the dashboard under this path.
pub const OBJECT_URL_PREFIX: &str = "/preview/";

/// Encode bytes as a `data:<type>;base64,...` URL.
pub fn data_url(media_type: &str, bytes: &[u8]) -> String {
    format!("data:{media_type};base64,{}", STANDARD.encode(bytes))
}

/// Split a base64 `data:` URL into its media type and decoded bytes.
pub fn decode_data_url(url: &str) -> Option<(String, Vec<u8>)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let media_type = meta.strip_suffix(";base64")?;
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    Some((media_type.to_string(), bytes))
}

#[derive(Debug, Clone)]
pub struct PreviewBlob {
    pub media_type: String,
    pub bytes: Arc<[u8]>,
}

/// Registry of live object URLs.
///
/// Every URL handed out by [`create`](Self::create) stays resolvable until
/// [`revoke`](Self::revoke) is called with it.
#[derive(Debug, Default)]
pub struct PreviewStore {
    blobs: HashMap<String, PreviewBlob>,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, file: &SelectedFile) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.blobs.insert(
            id.clone(),
            PreviewBlob {
                media_type: file.media_type.clone(),
                bytes: Arc::clone(&file.bytes),
            },
        );
        tracing::debug!(%id, name = %file.name, "created object url");
        format!("{OBJECT_URL_PREFIX}{id}")
    }

    /// Release an object URL. Returns `false` if it was not live.
    pub fn revoke(&mut self, url: &str) -> bool {
        let removed = url
            .strip_prefix(OBJECT_URL_PREFIX)
            .and_then(|id| self.blobs.remove(id))
            .is_some();
        if removed {
            tracing::debug!(%url, "revoked object url");
        }
        removed
    }

    /// Look up a live blob by its id (the path segment after the prefix).
    pub fn get(&self, id: &str) -> Option<&PreviewBlob> {
        self.blobs.get(id)
    }

    pub fn live_count(&self) -> usize {
        self.blobs.len()
    }
}
