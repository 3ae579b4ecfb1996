//! Resume document model.
//!
//! # Responsibility
//! - Hold one document as opaque named sections plus store metadata.
//! - Name the section set the editor recognizes for its cursor.
//!
//! # Invariants
//! - `id` is fixed at construction; there is no setter.
//! - Section values are opaque JSON; the core never inspects them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier of a document in the remote store.
pub type DocumentId = Uuid;

/// Section name -> latest value, as sent in one partial update.
pub type SectionUpdates = BTreeMap<String, Value>;

/// One resume document as held in memory by an edit session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    id: DocumentId,
    /// Named sections, ordered by name.
    #[serde(default)]
    pub sections: BTreeMap<String, Value>,
    /// Server-computed epoch milliseconds of the last accepted write.
    #[serde(default)]
    pub updated_at: Option<i64>,
    /// Server-side write counter.
    #[serde(default)]
    pub revision: u64,
    /// Fields the core carries through without interpreting.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Document {
    pub fn new(id: DocumentId) -> Self {
        Self {
            id,
            sections: BTreeMap::new(),
            updated_at: None,
            revision: 0,
            extra: Map::new(),
        }
    }

    /// Builder-style helper used by seeds and tests.
    pub fn with_section(mut self, name: impl Into<String>, value: Value) -> Self {
        self.sections.insert(name.into(), value);
        self
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn section(&self, name: &str) -> Option<&Value> {
        self.sections.get(name)
    }

    /// Writes every entry of `updates` over the current sections.
    pub fn apply(&mut self, updates: &SectionUpdates) {
        for (name, value) in updates {
            self.sections.insert(name.clone(), value.clone());
        }
    }
}

/// Section names the editor knows how to display.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResumeSection {
    #[default]
    Personal,
    Summary,
    Experience,
    Education,
    Skills,
    Projects,
    Certifications,
    Languages,
}

impl ResumeSection {
    pub const ALL: [ResumeSection; 8] = [
        Self::Personal,
        Self::Summary,
        Self::Experience,
        Self::Education,
        Self::Skills,
        Self::Projects,
        Self::Certifications,
        Self::Languages,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Summary => "summary",
            Self::Experience => "experience",
            Self::Education => "education",
            Self::Skills => "skills",
            Self::Projects => "projects",
            Self::Certifications => "certifications",
            Self::Languages => "languages",
        }
    }
}

impl Display for ResumeSection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a section name is not one of [`ResumeSection::ALL`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSection(pub String);

impl Display for UnknownSection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown resume section: `{}`", self.0)
    }
}

impl Error for UnknownSection {}

impl FromStr for ResumeSection {
    type Err = UnknownSection;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|section| section.as_str() == value)
            .ok_or_else(|| UnknownSection(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{Document, ResumeSection, SectionUpdates};
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn apply_overwrites_only_touched_sections() {
        let mut doc = Document::new(Uuid::new_v4())
            .with_section("personal", json!({"name": "Ada"}))
            .with_section("skills", json!(["rust"]));

        let mut updates = SectionUpdates::new();
        updates.insert("skills".to_string(), json!(["rust", "sql"]));
        doc.apply(&updates);

        assert_eq!(doc.section("personal"), Some(&json!({"name": "Ada"})));
        assert_eq!(doc.section("skills"), Some(&json!(["rust", "sql"])));
    }

    #[test]
    fn unknown_fields_survive_a_serde_round_trip() {
        let id = Uuid::new_v4();
        let raw = json!({
            "id": id,
            "sections": {"summary": "hi"},
            "template": "classic",
        });
        let doc: Document = serde_json::from_value(raw).expect("document should parse");
        assert_eq!(doc.id(), id);
        assert_eq!(doc.extra.get("template"), Some(&json!("classic")));

        let back = serde_json::to_value(&doc).expect("document should serialize");
        assert_eq!(back["template"], json!("classic"));
    }

    #[test]
    fn section_names_parse_case_sensitively() {
        assert_eq!("experience".parse(), Ok(ResumeSection::Experience));
        assert!("Experience".parse::<ResumeSection>().is_err());
        for section in ResumeSection::ALL {
            assert_eq!(section.as_str().parse(), Ok(section));
        }
    }
}
