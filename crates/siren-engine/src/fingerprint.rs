use sha2::{Digest, Sha256};
use siren_common::types::AlertCategory;

/// Derives the deduplication fingerprint from an alert's semantic identity:
/// title, category, source, and the optional resource reference and rule id.
///
/// The fields are hashed in a fixed order with explicit NUL separators so
/// that adjacent fields cannot collide across boundaries (`("ab", "c")`
/// hashes differently from `("a", "bc")`). Absent optionals contribute the
/// empty string. Deterministic and side-effect-free.
pub fn fingerprint(
    title: &str,
    category: AlertCategory,
    source: &str,
    resource_ref: Option<&str>,
    rule_id: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update([0u8]);
    hasher.update(category.to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(source.as_bytes());
    hasher.update([0u8]);
    hasher.update(resource_ref.unwrap_or_default().as_bytes());
    hasher.update([0u8]);
    hasher.update(rule_id.unwrap_or_default().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = fingerprint("CPU high", AlertCategory::System, "agent", Some("srv-1"), None);
        let b = fingerprint("CPU high", AlertCategory::System, "agent", Some("srv-1"), None);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn identity_fields_matter() {
        let base = fingerprint("CPU high", AlertCategory::System, "agent", Some("srv-1"), None);
        assert_ne!(
            base,
            fingerprint("CPU high", AlertCategory::Network, "agent", Some("srv-1"), None)
        );
        assert_ne!(
            base,
            fingerprint("CPU high", AlertCategory::System, "agent", Some("srv-2"), None)
        );
        assert_ne!(
            base,
            fingerprint("CPU high", AlertCategory::System, "agent", Some("srv-1"), Some("r1"))
        );
    }

    #[test]
    fn no_field_boundary_collisions() {
        let a = fingerprint("ab", AlertCategory::System, "c", None, None);
        let b = fingerprint("a", AlertCategory::System, "bc", None, None);
        assert_ne!(a, b);
    }

    #[test]
    fn absent_optionals_equal_empty() {
        let a = fingerprint("t", AlertCategory::System, "s", None, None);
        let b = fingerprint("t", AlertCategory::System, "s", Some(""), Some(""));
        assert_eq!(a, b);
    }
}
