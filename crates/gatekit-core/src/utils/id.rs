// ID generation for database records.

/// Generate a unique record ID (nanoid, 21 characters).
pub fn generate_id() -> String {
    nanoid::nanoid!()
}

/// Generate an ID with a custom length.
pub fn generate_id_with_length(len: usize) -> String {
    nanoid::nanoid!(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_length() {
        assert_eq!(generate_id().len(), 21);
        assert_eq!(generate_id_with_length(32).len(), 32);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(generate_id(), generate_id());
    }
}
