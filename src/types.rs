use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Name of a world directory, and of the map directory rendered from it,
/// checked to be safe to join onto a root before anything touches the disk.
///
/// Directory names produced by the game are short base64-like strings, but
/// hand-made worlds use plain names, so spaces and dots are tolerated as long
/// as the name can never step outside its root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapId(String);

impl MapId {
    pub const MAX_LEN: usize = 64;

    pub fn parse(raw: &str) -> Option<Self> {
        let shaped = !raw.is_empty()
            && raw.len() <= Self::MAX_LEN
            && !raw.starts_with(|c| c == '.' || c == ' ')
            && !raw.ends_with(' ')
            && raw.bytes().all(|b| {
                b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'_' | b'=' | b'.' | b' ')
            });
        shaped.then(|| Self(raw.to_owned()))
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
impl AsRef<std::path::Path> for MapId {
    fn as_ref(&self) -> &std::path::Path {
        self.0.as_ref()
    }
}

/// Milliseconds since the epoch, the ordering key of every listed entity.
/// Times before the epoch clamp to zero.
pub fn millis(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_millis() as u64)
}
