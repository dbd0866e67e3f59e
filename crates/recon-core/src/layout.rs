//! Path classification and the canonical object layout
//!
//! Everything here is pure: classification looks only at the stored string
//! and layout decisions depend only on record attributes, never on I/O.

use chrono::{Datelike, NaiveDate};
use recon_fs::checksum::short_digest;
use recon_fs::sanitize_file_name;
use serde::{Deserialize, Serialize};

use crate::records::EntityRef;

/// Hex characters of the collision suffix.
pub const COLLISION_SUFFIX_LEN: usize = 8;

/// Where a stored reference says the bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathClassification {
    ObjectStorageCanonical,
    LegacyLocal,
    Malformed,
    Empty,
}

/// Prefixes that identify each backend in stored references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutPolicy {
    /// Prefix of every object-storage reference
    pub object_prefix: String,
    /// Prefixes of legacy local references, checked in order
    pub legacy_prefixes: Vec<String>,
}

impl Default for LayoutPolicy {
    fn default() -> Self {
        Self {
            object_prefix: "/objects/".to_string(),
            legacy_prefixes: vec![
                "/legacy/uploads/".to_string(),
                "/uploads/".to_string(),
                "uploads/".to_string(),
            ],
        }
    }
}

impl LayoutPolicy {
    /// Also accept absolute references under `root`, the legacy tree on disk.
    ///
    /// The root prefix is checked before the configured ones. A root that
    /// overlaps the object prefix is ignored.
    pub fn with_legacy_root(mut self, root: &str) -> Self {
        let trimmed = root.trim_end_matches('/');
        if trimmed.is_empty() {
            return self;
        }
        let prefix = format!("{}/", trimmed);
        let overlaps =
            prefix.starts_with(&self.object_prefix) || self.object_prefix.starts_with(&prefix);
        if !overlaps && !self.legacy_prefixes.contains(&prefix) {
            self.legacy_prefixes.insert(0, prefix);
        }
        self
    }

    /// Classify a stored reference. Total and deterministic.
    pub fn classify(&self, raw_path: Option<&str>) -> PathClassification {
        let Some(raw) = raw_path.filter(|p| !p.trim().is_empty()) else {
            return PathClassification::Empty;
        };

        if self.object_key(raw).is_some() {
            PathClassification::ObjectStorageCanonical
        } else if self.legacy_relative(raw).is_some() {
            PathClassification::LegacyLocal
        } else {
            PathClassification::Malformed
        }
    }

    /// Key of an object reference relative to the object namespace.
    pub fn object_key(&self, raw_path: &str) -> Option<String> {
        strip_prefix_checked(raw_path, &self.object_prefix)
    }

    /// Location of a legacy reference relative to the legacy root.
    pub fn legacy_relative(&self, raw_path: &str) -> Option<String> {
        self.legacy_prefixes
            .iter()
            .find_map(|prefix| strip_prefix_checked(raw_path, prefix))
    }

    /// Canonical object reference for a record's file.
    ///
    /// `/<prefix>/<entity-kind>/<yyyy>/<mm>/<sanitized-name>`, dated by the
    /// record's own date and by `today` only when the record has none. A
    /// name that sanitizes to nothing becomes `<kind>-<id>`.
    pub fn canonical_target(
        &self,
        entity: EntityRef,
        reference_date: Option<NaiveDate>,
        file_name: &str,
        today: NaiveDate,
    ) -> String {
        let date = reference_date.unwrap_or(today);
        let name = sanitize_file_name(file_name)
            .unwrap_or_else(|| format!("{}-{}", entity.kind, entity.id));
        format!(
            "{}/{}/{:04}/{:02}/{}",
            self.object_prefix.trim_end_matches('/'),
            entity.kind.segment(),
            date.year(),
            date.month(),
            name
        )
    }

    /// Object references a migration of this record may have produced,
    /// the entity-specific suffixed target first.
    pub fn migrated_locations(
        &self,
        entity: EntityRef,
        reference_date: Option<NaiveDate>,
        file_name: &str,
        today: NaiveDate,
    ) -> [String; 2] {
        let target = self.canonical_target(entity, reference_date, file_name, today);
        [collision_target(&target, entity), target]
    }
}

/// Deterministic alternative for a target already holding other content.
///
/// Inserts `-<digest of "kind:id">` before the extension.
pub fn collision_target(target: &str, entity: EntityRef) -> String {
    let suffix = short_digest(&entity.to_string(), COLLISION_SUFFIX_LEN);
    let (dir, name) = match target.rfind('/') {
        Some(idx) => target.split_at(idx + 1),
        None => ("", target),
    };
    match name.rfind('.') {
        Some(idx) if idx > 0 => format!("{}{}-{}{}", dir, &name[..idx], suffix, &name[idx..]),
        _ => format!("{}{}-{}", dir, name, suffix),
    }
}

/// Remainder after `prefix`, if it names a file safely inside the root.
fn strip_prefix_checked(raw_path: &str, prefix: &str) -> Option<String> {
    let rest = raw_path.strip_prefix(prefix)?;
    if rest.contains('\\') || rest.contains('\0') {
        return None;
    }
    let rest = rest.trim_matches('/');
    if rest.is_empty() || rest.split('/').any(|seg| seg == ".." || seg == "." || seg.is_empty()) {
        return None;
    }
    Some(rest.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn policy() -> LayoutPolicy {
        LayoutPolicy::default()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(None, PathClassification::Empty)]
    #[case(Some(""), PathClassification::Empty)]
    #[case(Some("   "), PathClassification::Empty)]
    #[case(Some("/objects/documents/2025/05/a.pdf"), PathClassification::ObjectStorageCanonical)]
    #[case(Some("/legacy/uploads/abc.pdf"), PathClassification::LegacyLocal)]
    #[case(Some("/uploads/documents/abc.pdf"), PathClassification::LegacyLocal)]
    #[case(Some("uploads/abc.pdf"), PathClassification::LegacyLocal)]
    #[case(Some("/objects/"), PathClassification::Malformed)]
    #[case(Some("/uploads/../etc/passwd"), PathClassification::Malformed)]
    #[case(Some("/uploads/a\\b.pdf"), PathClassification::Malformed)]
    #[case(Some("/uploads/a\0.pdf"), PathClassification::Malformed)]
    #[case(Some("https://example.org/a.pdf"), PathClassification::Malformed)]
    #[case(Some("C:\\files\\a.pdf"), PathClassification::Malformed)]
    fn classifies(#[case] raw: Option<&str>, #[case] expected: PathClassification) {
        assert_eq!(policy().classify(raw), expected);
    }

    #[test]
    fn canonical_target_uses_record_date() {
        let target = policy().canonical_target(
            EntityRef::document(1),
            Some(date(2025, 5, 11)),
            "abc.pdf",
            date(2030, 1, 1),
        );
        assert_eq!(target, "/objects/documents/2025/05/abc.pdf");
    }

    #[test]
    fn canonical_target_falls_back_to_today() {
        let target = policy().canonical_target(
            EntityRef::activity(3),
            None,
            "Pauta Sessão.docx",
            date(2026, 10, 17),
        );
        assert_eq!(target, "/objects/activities/2026/10/Pauta-Sess-o.docx");
    }

    #[test]
    fn canonical_target_names_unusable_files_after_entity() {
        let target = policy().canonical_target(
            EntityRef::activity(9),
            Some(date(2024, 2, 1)),
            "###",
            date(2026, 1, 1),
        );
        assert_eq!(target, "/objects/activities/2024/02/activity-9");
    }

    #[test]
    fn collision_target_inserts_suffix_before_extension() {
        let entity = EntityRef::document(42);
        let suffixed = collision_target("/objects/documents/2025/05/report.pdf", entity);
        let digest = short_digest("document:42", COLLISION_SUFFIX_LEN);

        assert_eq!(suffixed, format!("/objects/documents/2025/05/report-{}.pdf", digest));
        assert_eq!(suffixed, collision_target("/objects/documents/2025/05/report.pdf", entity));
    }

    #[test]
    fn collision_target_without_extension() {
        let suffixed =
            collision_target("/objects/documents/2025/05/README", EntityRef::document(1));
        assert!(suffixed.starts_with("/objects/documents/2025/05/README-"));
    }

    #[test]
    fn migrated_locations_prefer_suffixed_target() {
        let entity = EntityRef::document(42);
        let [suffixed, plain] =
            policy().migrated_locations(entity, Some(date(2025, 5, 1)), "a.pdf", date(2026, 1, 1));
        assert_eq!(plain, "/objects/documents/2025/05/a.pdf");
        assert_eq!(suffixed, collision_target(&plain, entity));
    }

    #[test]
    fn legacy_relative_strips_first_matching_prefix() {
        assert_eq!(
            policy().legacy_relative("/legacy/uploads/documents/a.pdf").as_deref(),
            Some("documents/a.pdf")
        );
        assert_eq!(policy().legacy_relative("/objects/a.pdf"), None);
    }

    #[test]
    fn legacy_root_prefix_is_checked_first() {
        let policy = policy().with_legacy_root("/srv/uploads/");
        assert_eq!(policy.legacy_prefixes[0], "/srv/uploads/");
        assert_eq!(
            policy.classify(Some("/srv/uploads/documents/x.pdf")),
            PathClassification::LegacyLocal
        );
        assert_eq!(
            policy.legacy_relative("/srv/uploads/documents/x.pdf").as_deref(),
            Some("documents/x.pdf")
        );
        // a root nested under a fixed prefix still maps relative to itself
        let nested = LayoutPolicy::default().with_legacy_root("/uploads/store");
        assert_eq!(
            nested.legacy_relative("/uploads/store/a.pdf").as_deref(),
            Some("a.pdf")
        );
    }

    #[rstest]
    #[case("")]
    #[case("/")]
    #[case("/objects")]
    #[case("/legacy/uploads")]
    fn legacy_root_adds_nothing_when_unusable_or_known(#[case] root: &str) {
        assert_eq!(policy().with_legacy_root(root), policy());
    }

    proptest! {
        #[test]
        fn classify_is_total_and_deterministic(s in "\\PC*") {
            let first = policy().classify(Some(&s));
            prop_assert_eq!(first, policy().classify(Some(&s)));
        }

        #[test]
        fn canonical_targets_are_stable_and_canonical(
            id in 0u64..1_000_000,
            y in 1990i32..2100,
            m in 1u32..=12,
            name in "\\PC{0,40}",
        ) {
            let reference = date(y, m, 1);
            let entity = EntityRef::document(id);
            let a = policy().canonical_target(entity, Some(reference), &name, date(2026, 1, 1));
            let b = policy().canonical_target(entity, Some(reference), &name, date(2000, 6, 6));
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(
                policy().classify(Some(&a)),
                PathClassification::ObjectStorageCanonical
            );
            let year_segment = format!("/{:04}/{:02}/", y, m);
            prop_assert!(a.contains(&year_segment));
        }
    }
}
