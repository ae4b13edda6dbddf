const MAX_IDENTITY_LEN: usize = 64;

/// Accepts a client-presented identity only if it is a short token of
/// ASCII letters, digits, `-` or `_`.
pub fn normalize_identity(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_IDENTITY_LEN {
        return None;
    }
    let valid = trimmed
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    valid.then(|| trimmed.to_string())
}

pub fn make_identity() -> String {
    format!("view_{:016x}", rand::random::<u64>())
}

/// Session seed from the environment; falls back to a fresh random seed.
pub fn parse_seed(raw: Option<&str>) -> u32 {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .unwrap_or_else(rand::random::<u32>)
}

pub fn parse_port(raw: Option<&str>, default: u16) -> u16 {
    raw.and_then(|value| value.trim().parse::<u16>().ok())
        .filter(|port| *port != 0)
        .unwrap_or(default)
}

pub fn parse_scoreboard_limit(raw: Option<&str>) -> usize {
    raw.and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(10)
        .clamp(1, 100)
}
