//! Physical Key Derivation
//!
//! Every logical id is rewritten to `<namespace>@<id>@<version>` before it
//! reaches a backend. The version counter itself lives under
//! `<namespace>@version` and is never versioned.
//!
//! Ids or namespaces that themselves contain `@` can collide
//! (`"a@b" / "c"` vs `"a" / "b@c"`); this is a known limitation.

/// Separator between key components
pub const KEY_DELIMITER: char = '@';

/// Suffix of the key that stores a namespace's version counter
pub const VERSION_SUFFIX: &str = "version";

/// Derive the physical storage key for a logical id
#[inline]
pub fn physical_key(namespace: &str, id: &str, version: u64) -> String {
    format!("{namespace}{KEY_DELIMITER}{id}{KEY_DELIMITER}{version}")
}

/// Derive the storage key holding a namespace's version counter
#[inline]
pub fn version_key(namespace: &str) -> String {
    format!("{namespace}{KEY_DELIMITER}{VERSION_SUFFIX}")
}
