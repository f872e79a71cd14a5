//! Local proxy paths
//!
//! Builds the server-local paths a rewritten descriptor points at:
//! `{base}{route_prefix}/{key}/{segment}`, once against the externally
//! reachable base and once against the server-internal one.

use crate::registry::StreamKey;

/// Default route under which restreams are served
pub const DEFAULT_ROUTE_PREFIX: &str = "/LiveTv/LiveStreamFiles";

/// Default segment file name
pub const DEFAULT_SEGMENT: &str = "stream.ts";

/// Resolves the base addresses local paths are built on
pub trait BaseUrlResolver: Send + Sync + 'static {
    /// Base for paths handed to clients. May be empty for server-relative paths.
    fn public_base(&self) -> String;

    /// Base the server uses to reach itself
    fn internal_base(&self) -> String;
}

/// Fixed base addresses
#[derive(Debug, Clone)]
pub struct StaticBaseUrls {
    public: String,
    internal: String,
}

impl StaticBaseUrls {
    /// Create a resolver with the given public and internal bases
    pub fn new(public: impl Into<String>, internal: impl Into<String>) -> Self {
        Self {
            public: public.into(),
            internal: internal.into(),
        }
    }
}

impl Default for StaticBaseUrls {
    fn default() -> Self {
        Self::new("", "http://127.0.0.1:8096")
    }
}

impl BaseUrlResolver for StaticBaseUrls {
    fn public_base(&self) -> String {
        self.public.clone()
    }

    fn internal_base(&self) -> String {
        self.internal.clone()
    }
}

/// The two rewritten paths for one stream key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPaths {
    /// Path handed to clients
    pub path: String,
    /// Path used by the server's own encoder
    pub encoder_path: String,
}

/// Proxy path template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyPaths {
    /// Route prefix, e.g. `/LiveTv/LiveStreamFiles`
    pub route_prefix: String,
    /// Segment file name following the key
    pub segment: String,
}

impl Default for ProxyPaths {
    fn default() -> Self {
        Self {
            route_prefix: DEFAULT_ROUTE_PREFIX.to_string(),
            segment: DEFAULT_SEGMENT.to_string(),
        }
    }
}

impl ProxyPaths {
    /// Set the route prefix
    pub fn route_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.route_prefix = prefix.into();
        self
    }

    /// Set the segment file name
    pub fn segment(mut self, segment: impl Into<String>) -> Self {
        self.segment = segment.into();
        self
    }

    /// Server-relative path for `key`
    pub fn relative(&self, key: &StreamKey) -> String {
        let prefix = self.route_prefix.trim_matches('/');
        let segment = self.segment.trim_matches('/');
        if prefix.is_empty() {
            format!("/{}/{}", key, segment)
        } else {
            format!("/{}/{}/{}", prefix, key, segment)
        }
    }

    /// Path for `key` resolved against `base`
    pub fn resolve(&self, base: &str, key: &StreamKey) -> String {
        format!("{}{}", base.trim_end_matches('/'), self.relative(key))
    }

    /// Both path variants for `key`
    pub fn local_paths(&self, resolver: &dyn BaseUrlResolver, key: &StreamKey) -> LocalPaths {
        LocalPaths {
            path: self.resolve(&resolver.public_base(), key),
            encoder_path: self.resolve(&resolver.internal_base(), key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> StreamKey {
        StreamKey::new(s).unwrap()
    }

    #[test]
    fn test_default_template() {
        let paths = ProxyPaths::default();
        assert_eq!(
            paths.relative(&key("abc123")),
            "/LiveTv/LiveStreamFiles/abc123/stream.ts"
        );
    }

    #[test]
    fn test_resolve_against_bases() {
        let paths = ProxyPaths::default();
        let resolver = StaticBaseUrls::new("https://media.example/jf/", "http://127.0.0.1:8096");
        let local = paths.local_paths(&resolver, &key("k1"));

        assert_eq!(
            local.path,
            "https://media.example/jf/LiveTv/LiveStreamFiles/k1/stream.ts"
        );
        assert_eq!(
            local.encoder_path,
            "http://127.0.0.1:8096/LiveTv/LiveStreamFiles/k1/stream.ts"
        );
    }

    #[test]
    fn test_empty_public_base_is_relative() {
        let local = ProxyPaths::default().local_paths(&StaticBaseUrls::default(), &key("k2"));
        assert_eq!(local.path, "/LiveTv/LiveStreamFiles/k2/stream.ts");
    }

    #[test]
    fn test_custom_template() {
        let paths = ProxyPaths::default().route_prefix("restream/").segment("/live.ts");
        assert_eq!(paths.relative(&key("x")), "/restream/x/live.ts");

        let paths = ProxyPaths::default().route_prefix("");
        assert_eq!(paths.relative(&key("x")), "/x/stream.ts");
    }
}
