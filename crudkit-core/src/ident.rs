//! Identifier generation utilities.

use nanoid::nanoid;

/// Alphabet for generated placeholder names. Letters only, so a generated
/// name is always a valid binding identifier regardless of backend.
const VAR_ALPHABET: [char; 26] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// Generates a random document identifier, optionally prefixed with a schema
/// alias (`office_V1StGXR8_Z5jdHi6B`).
pub fn generate_id(alias: Option<&str>, length: Option<usize>) -> String {
    let id = match length {
        Some(length) => nanoid!(length),
        None => nanoid!(),
    };
    match alias {
        Some(alias) => format!("{alias}_{id}"),
        None => id,
    }
}

/// Generates a random placeholder name of the given length.
///
/// Uniqueness within one compilation is enforced by the criteria compiler,
/// which re-draws on collision.
pub fn generate_var_name(length: usize) -> String {
    nanoid!(length, &VAR_ALPHABET)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_is_prefixed_with_underscore() {
        let id = generate_id(Some("office"), Some(8));
        assert!(id.starts_with("office_"));
        assert_eq!(id.len(), "office_".len() + 8);
    }

    #[test]
    fn var_names_are_plain_letters() {
        let name = generate_var_name(5);
        assert_eq!(name.len(), 5);
        assert!(name.chars().all(|c| c.is_ascii_lowercase()));
    }
}
