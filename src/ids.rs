//! Identifier generation for connections and sessions

use uuid::Uuid;

/// Generate a unique identifier of the form `{prefix}-{uuid}`
///
/// Used for connection ids (the `socketId` of relayed notifications) and for
/// the session id reported in `READY`.
///
/// # Examples
///
/// ```
/// # use presencerelay::ids::generate_id;
/// let id = generate_id("ipc");
/// assert!(id.starts_with("ipc-"));
/// ```
pub fn generate_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

/// Generate a bare UUID string
pub fn session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_format() {
        let id = generate_id("ipc");
        assert!(id.starts_with("ipc-"));
        assert_eq!(id.len(), "ipc-".len() + 36);
    }

    #[test]
    fn test_generate_id_uniqueness() {
        assert_ne!(generate_id("ipc"), generate_id("ipc"));
    }

    #[test]
    fn test_session_id_is_hex() {
        let id = session_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
