//! Record store seam and the file-reference projection
//!
//! Documents and legislative activities live in an external relational
//! store. The engine only sees the file-bearing columns of those rows, via
//! the [`RecordStore`] trait, and projects each row into a strongly typed
//! [`FileReference`] before any classification happens.

mod ledger;

pub use ledger::{LedgerStore, RecordsFile};

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::backend::AccessPolicy;
use crate::{Error, Result};

/// The two record types that carry file references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Document,
    Activity,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::Document, EntityKind::Activity];

    /// Path segment used in the canonical object layout.
    pub fn segment(self) -> &'static str {
        match self {
            Self::Document => "documents",
            Self::Activity => "activities",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Activity => "activity",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "document" | "documents" | "doc" => Ok(Self::Document),
            "activity" | "activities" => Ok(Self::Activity),
            other => Err(Error::NotFound(format!("entity kind '{}'", other))),
        }
    }
}

/// Identity of one file-bearing record; also the idempotency key of
/// migration and cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    #[serde(rename = "entityType")]
    pub kind: EntityKind,
    #[serde(rename = "entityId")]
    pub id: u64,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: u64) -> Self {
        Self { kind, id }
    }

    pub fn document(id: u64) -> Self {
        Self::new(EntityKind::Document, id)
    }

    pub fn activity(id: u64) -> Self {
        Self::new(EntityKind::Activity, id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Parses `document:42` / `activity:7`. A bare number is a document.
impl FromStr for EntityRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, id) = match s.split_once(':') {
            Some((kind, id)) => (kind.parse()?, id),
            None => (EntityKind::Document, s),
        };
        let id = id
            .trim()
            .parse::<u64>()
            .map_err(|_| Error::NotFound(format!("entity id in '{}'", s)))?;
        Ok(Self { kind, id })
    }
}

/// A row of the record store, restricted to its file-bearing columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    /// Document date or activity date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_date: Option<NaiveDate>,
    #[serde(default)]
    pub access: AccessPolicy,
}

impl FileRecord {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            file_path: None,
            file_name: None,
            file_type: None,
            reference_date: None,
            access: AccessPolicy::default(),
        }
    }

    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn with_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_type = Some(file_type.into());
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn with_access(mut self, access: AccessPolicy) -> Self {
        self.access = access;
        self
    }

    /// Whether the row currently carries a non-blank file reference.
    pub fn has_file(&self) -> bool {
        self.file_path
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty())
    }
}

/// A validated view of one record's file reference.
///
/// Never persisted; `raw_path` is the only stored field of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReference {
    pub entity: EntityRef,
    pub raw_path: String,
    pub file_name: String,
    pub file_type: Option<String>,
    pub reference_date: Option<NaiveDate>,
    pub access: AccessPolicy,
}

impl FileReference {
    /// Project a store row into a reference.
    ///
    /// Returns `Ok(None)` for rows without a file. The file name falls back
    /// to the last segment of the stored path; a row whose name is still
    /// empty cannot be laid out and is a classification error.
    pub fn project(kind: EntityKind, record: &FileRecord) -> Result<Option<Self>> {
        let Some(raw_path) = record.file_path.as_deref().filter(|p| !p.trim().is_empty()) else {
            return Ok(None);
        };

        let file_name = record
            .file_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .or_else(|| raw_path.rsplit(['/', '\\']).next().map(str::trim))
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::Classification {
                path: raw_path.to_string(),
                reason: "no usable file name".into(),
            })?;

        Ok(Some(Self {
            entity: EntityRef::new(kind, record.id),
            raw_path: raw_path.to_string(),
            file_name: file_name.to_string(),
            file_type: record
                .file_type
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            reference_date: record.reference_date,
            access: record.access,
        }))
    }
}

/// The relational store that owns file references.
///
/// Implementations must tolerate concurrent updates to distinct records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every record of `kind`, with or without a file.
    async fn list_file_bearing_records(&self, kind: EntityKind) -> Result<Vec<FileRecord>>;

    /// Point a record at `new_path`, or clear its reference when `None`.
    ///
    /// Clearing empties path, file name and file type together.
    async fn update_file_reference(
        &self,
        kind: EntityKind,
        id: u64,
        new_path: Option<&str>,
    ) -> Result<()>;

    /// The current state of one record.
    async fn fetch_record(&self, entity: EntityRef) -> Result<Option<FileRecord>> {
        let records = self.list_file_bearing_records(entity.kind).await?;
        Ok(records.into_iter().find(|r| r.id == entity.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("document:42", EntityRef::document(42))]
    #[case("activity:7", EntityRef::activity(7))]
    #[case("documents:3", EntityRef::document(3))]
    #[case("15", EntityRef::document(15))]
    fn entity_ref_parses(#[case] input: &str, #[case] expected: EntityRef) {
        assert_eq!(input.parse::<EntityRef>().unwrap(), expected);
    }

    #[rstest]
    #[case("meeting:1")]
    #[case("document:")]
    #[case("document:-3")]
    fn entity_ref_rejects_garbage(#[case] input: &str) {
        assert!(input.parse::<EntityRef>().is_err());
    }

    #[test]
    fn entity_ref_display_round_trips() {
        let entity = EntityRef::activity(99);
        assert_eq!(entity.to_string(), "activity:99");
        assert_eq!(entity.to_string().parse::<EntityRef>().unwrap(), entity);
    }

    #[test]
    fn project_skips_blank_paths() {
        let record = FileRecord::new(1).with_file("   ");
        assert!(FileReference::project(EntityKind::Document, &record).unwrap().is_none());
        let bare = FileRecord::new(2);
        assert!(FileReference::project(EntityKind::Document, &bare).unwrap().is_none());
    }

    #[test]
    fn project_falls_back_to_path_segment_for_name() {
        let record = FileRecord::new(5).with_file("/uploads/documents/ata-12.pdf");
        let reference = FileReference::project(EntityKind::Document, &record)
            .unwrap()
            .unwrap();
        assert_eq!(reference.file_name, "ata-12.pdf");
        assert_eq!(reference.entity, EntityRef::document(5));
    }

    #[test]
    fn project_prefers_record_name() {
        let record = FileRecord::new(5)
            .with_file("/uploads/1715000000-abc.pdf")
            .with_name("Ata da Sessão.pdf")
            .with_type("application/pdf");
        let reference = FileReference::project(EntityKind::Activity, &record)
            .unwrap()
            .unwrap();
        assert_eq!(reference.file_name, "Ata da Sessão.pdf");
        assert_eq!(reference.file_type.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn project_rejects_path_without_name() {
        let record = FileRecord::new(8).with_file("/uploads/");
        let err = FileReference::project(EntityKind::Document, &record).unwrap_err();
        assert!(matches!(err, Error::Classification { .. }));
    }
}
