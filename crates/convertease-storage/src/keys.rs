//! Shared key generation for storage backends.
//!
//! Staged uploads live under `uploads/{client}/{upload_id}` and converted
//! artifacts under `results/{client}/{job_id}`.

use uuid::Uuid;

/// Reduce a client id to characters that are safe in a key segment.
fn client_segment(client_id: &str) -> String {
    let segment: String = client_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if segment.is_empty() {
        "_".to_string()
    } else {
        segment
    }
}

pub fn upload_key(client_id: &str, upload_id: Uuid) -> String {
    format!("uploads/{}/{}", client_segment(client_id), upload_id)
}

pub fn result_key(client_id: &str, job_id: Uuid) -> String {
    format!("results/{}/{}", client_segment(client_id), job_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_scoped_and_safe() {
        let id = Uuid::nil();
        assert_eq!(
            upload_key("acme", id),
            "uploads/acme/00000000-0000-0000-0000-000000000000"
        );
        let key = result_key("../evil/..", id);
        assert!(!key.contains(".."));
        assert!(key.starts_with("results/"));
    }
}
