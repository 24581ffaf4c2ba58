//! Application-wide constants.

/// Base-name marker that opts an upload out of derivative generation.
pub const NOCOMPRESSION_MARKER: &str = "_nocompression";

/// Content type stamped on every derivative. Existing consumers match on this
/// exact value, so it is intentionally not a full MIME type.
pub const DERIVATIVE_CONTENT_TYPE: &str = "image";

/// Default cache hint written as object metadata on every derivative.
pub const DEFAULT_CACHE_CONTROL: &str = "public, max-age=31536000";

/// User-metadata key under which the cache hint is stored.
pub const CACHE_CONTROL_METADATA_KEY: &str = "CacheControl";

/// File extension of the WebP sibling of each derivative.
pub const WEBP_EXTENSION: &str = "webp";

/// Default limit on decoded source size (100 megapixels).
pub const DEFAULT_MAX_SOURCE_PIXELS: u64 = 100_000_000;

/// Default number of concurrent derivative uploads per invocation.
pub const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 10;
