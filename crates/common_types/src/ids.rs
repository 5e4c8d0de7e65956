/// Opaque ULID-like identifier shared by every entity in the domain model.
///
/// Generated the same way across the workspace so ids are URL-safe and
/// collision-resistant without pulling in a dedicated ULID crate.
pub type Id = String;

const URL_SAFE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

#[must_use]
pub fn new_id() -> Id {
    (0..26)
        .map(|_| {
            let idx = rand::random::<usize>() % URL_SAFE.len();
            URL_SAFE[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_is_fixed_length_and_url_safe() {
        let id = new_id();
        assert_eq!(id.len(), 26);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn new_id_is_not_constant() {
        assert_ne!(new_id(), new_id());
    }
}
