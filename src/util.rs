use std::time::{SystemTime, UNIX_EPOCH};

const COMPLETION_ID_RANDOM_LEN: usize = 28;

#[inline]
pub(crate) fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

/// Generate a completion id in the `chatcmpl-` + 28 alphanumerics shape
/// clients expect from the chat-completion API.
pub(crate) fn completion_id() -> String {
    let mut out = String::with_capacity(9 + COMPLETION_ID_RANDOM_LEN);
    out.push_str("chatcmpl-");
    for _ in 0..COMPLETION_ID_RANDOM_LEN {
        out.push(fastrand::alphanumeric());
    }
    out
}

/// Generate a random v4 UUID string; the backend treats these as opaque
/// identifiers.
pub(crate) fn random_uuid() -> String {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&fastrand::u64(..).to_le_bytes());
    bytes[8..].copy_from_slice(&fastrand::u64(..).to_le_bytes());
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_id_shape() {
        let id = completion_id();
        assert!(id.starts_with("chatcmpl-"));
        assert_eq!(id.len(), 9 + COMPLETION_ID_RANDOM_LEN);
        assert!(id["chatcmpl-".len()..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_random_uuid_is_v4() {
        let id = random_uuid();
        let parsed = uuid::Uuid::parse_str(&id).expect("valid uuid");
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn test_random_uuid_unique() {
        assert_ne!(random_uuid(), random_uuid());
    }
}
