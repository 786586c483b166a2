use rand::Rng;
use rand::distributions::Alphanumeric;

pub const NAME_PREFIX: &str = "folder-";
const SUFFIX_LEN: usize = 6;

/// Builds `folder-<millis>-<suffix>` where the suffix is lowercase base36.
pub fn generate_name(stamp_ms: u64) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{NAME_PREFIX}{stamp_ms}-{suffix}")
}

/// Extracts the millisecond stamp from a generated name.
pub fn parse_stamp(name: &str) -> Option<u64> {
    let rest = name.strip_prefix(NAME_PREFIX)?;
    let (stamp, suffix) = rest.split_once('-')?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    stamp.parse().ok()
}
