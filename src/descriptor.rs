//! Playback descriptor
//!
//! A typed view of the playback metadata the host hands in for one media
//! source. The registry reads the upstream address from it and rewrites the
//! path fields so clients are pointed at the local restream instead.

use url::Url;

use crate::paths::LocalPaths;
use crate::registry::RegistryError;

/// How a descriptor's path is to be opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaProtocol {
    /// Local file path
    #[default]
    File,
    /// HTTP(S) URL
    Http,
}

/// Mutable playback metadata for one media source
///
/// Owned by the caller. The registry only ever touches the fields it rewrites:
/// `path`, `encoder_path`, `protocol` and the capability flags.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamDescriptor {
    /// Caller-supplied identity, used as the stream key when present
    pub id: Option<String>,
    /// Upstream URL on input; local proxy path after rewriting
    pub path: Option<String>,
    /// Server-internal path used by the host's encoder
    pub encoder_path: Option<String>,
    /// Protocol of `path`
    pub protocol: MediaProtocol,
    /// Whether `path` points at a live stream served by this server
    pub is_local_live_stream: bool,
    /// Whether the host must open the source before playback
    pub requires_opening: bool,
    /// Client may play the stream as-is
    pub supports_direct_play: bool,
    /// Client may remux without re-encoding
    pub supports_direct_stream: bool,
    /// Host may transcode the stream
    pub supports_transcoding: bool,
    /// Host may probe the stream for codec information
    pub supports_probing: bool,
}

impl StreamDescriptor {
    /// Descriptor for a remote source at `url`, as the host would present it
    /// before any restreaming.
    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            path: Some(url.into()),
            protocol: MediaProtocol::Http,
            supports_direct_play: false,
            supports_direct_stream: true,
            supports_transcoding: true,
            supports_probing: true,
            ..Default::default()
        }
    }

    /// Set the caller-supplied id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Parse `path` as an upstream http/https URL.
    pub fn upstream_url(&self) -> Result<Url, RegistryError> {
        let raw = self
            .path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| RegistryError::InvalidDescriptor("Missing upstream path".into()))?;

        let url = Url::parse(raw).map_err(|e| {
            RegistryError::InvalidDescriptor(format!("Invalid upstream URL {raw}: {e}"))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(RegistryError::InvalidDescriptor(format!(
                "Unsupported upstream scheme {}: {raw}",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(RegistryError::InvalidDescriptor(format!(
                "Upstream URL has no host: {raw}"
            )));
        }

        Ok(url)
    }

    /// Point this descriptor at a local restream.
    ///
    /// Direct play is preferred over transcoding since the restream already
    /// delivers a plain byte stream.
    pub(crate) fn point_at_restream(&mut self, paths: &LocalPaths) {
        self.path = Some(paths.path.clone());
        self.encoder_path = Some(paths.encoder_path.clone());
        self.protocol = MediaProtocol::Http;
        self.is_local_live_stream = true;
        self.requires_opening = false;
        self.supports_direct_play = true;
        self.supports_direct_stream = true;
        self.supports_transcoding = false;
        self.supports_probing = false;
    }
}
