//! Deterministic course identifiers built from a name and a location.

use sha2::{Digest, Sha256};

const UNKNOWN_SLUG: &str = "unknown";
const HASH_LEN: usize = 8;

/// Derive `"{slug}-{hash8}"` for a course.
///
/// The slug comes from `name`; the hash covers the coordinates and the original
/// name, so two courses with the same name in different places get different ids.
pub fn derive_id(name: Option<&str>, latitude: f64, longitude: f64) -> String {
    let raw_name = name.unwrap_or_default();
    let key = format!(
        "{}-{}-{}",
        format_coordinate(latitude),
        format_coordinate(longitude),
        raw_name
    );
    let digest = Sha256::digest(key.as_bytes());
    let hash = format!("{digest:x}");

    format!("{}-{}", slugify(raw_name), &hash[..HASH_LEN])
}

/// Lower-case, trimmed, non-alphanumeric runs collapsed into single dashes.
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let slug = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        UNKNOWN_SLUG.to_owned()
    } else {
        slug
    }
}

/// Shortest round-trip decimal form, always with a fractional part.
fn format_coordinate(value: f64) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        format!("{text}.0")
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn central_park_id_is_stable() {
        let first = derive_id(Some("Central Park!"), 40.785091, -73.968285);
        let second = derive_id(Some("Central Park!"), 40.785091, -73.968285);

        assert_eq!(first, second);
        let (slug, hash) = first.rsplit_once('-').unwrap();
        assert_eq!(slug, "central-park");
        assert_eq!(hash.len(), 8);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn hash_is_the_lowercase_digest_prefix() {
        let digest = Sha256::digest(b"1.5-2.0-Hole in One");
        let expected: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();

        assert_eq!(
            derive_id(Some("Hole in One"), 1.5, 2.0),
            format!("hole-in-one-{expected}")
        );
    }

    #[test]
    fn hash_covers_the_location() {
        let here = derive_id(Some("Putt Palace"), 51.5, -0.12);
        let there = derive_id(Some("Putt Palace"), 48.85, 2.35);
        assert_ne!(here, there);
        assert!(here.starts_with("putt-palace-"));
    }

    #[test]
    fn missing_or_symbol_only_names_fall_back_to_unknown() {
        assert!(derive_id(None, 1.0, 2.0).starts_with("unknown-"));
        assert!(derive_id(Some("   "), 1.0, 2.0).starts_with("unknown-"));
        assert!(derive_id(Some("!!!"), 1.0, 2.0).starts_with("unknown-"));
    }

    #[test]
    fn slug_collapses_separator_runs() {
        assert_eq!(slugify("  Mini -- Golf__Club  "), "mini-golf-club");
        assert_eq!(slugify("Café Über"), "café-über");
    }

    #[test]
    fn coordinates_keep_a_fractional_part() {
        assert_eq!(format_coordinate(40.0), "40.0");
        assert_eq!(format_coordinate(-73.968285), "-73.968285");
        assert_eq!(format_coordinate(0.1), "0.1");
    }
}
