use sha2::{Digest, Sha256};

/// Stable opaque key identifying a documentation domain.
///
/// Derived once from the root URL and used as a partition filter on every
/// read and write. The hash is never reversed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey(String);

impl SourceKey {
    pub fn from_root_url(root_url: &str) -> Self {
        let digest = Sha256::digest(root_url.as_bytes());
        let hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
        SourceKey(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
