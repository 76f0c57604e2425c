//! BibTeX record data structures

use std::collections::HashMap;

/// BibTeX entry type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryType {
    Article,
    Book,
    Booklet,
    InBook,
    InCollection,
    InProceedings,
    Manual,
    MastersThesis,
    Misc,
    PhdThesis,
    Proceedings,
    TechReport,
    Unpublished,
    Online,
    Software,
    Dataset,
    /// Any type outside the standard set, kept under its original spelling
    Other(String),
}

impl EntryType {
    /// Parse an entry type from a string (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "article" => Self::Article,
            "book" => Self::Book,
            "booklet" => Self::Booklet,
            "inbook" => Self::InBook,
            "incollection" => Self::InCollection,
            "inproceedings" | "conference" => Self::InProceedings,
            "manual" => Self::Manual,
            "mastersthesis" => Self::MastersThesis,
            "misc" => Self::Misc,
            "phdthesis" => Self::PhdThesis,
            "proceedings" => Self::Proceedings,
            "techreport" => Self::TechReport,
            "unpublished" => Self::Unpublished,
            "online" | "electronic" | "www" => Self::Online,
            "software" => Self::Software,
            "dataset" => Self::Dataset,
            other => Self::Other(other.to_string()),
        }
    }

    /// Convert entry type to its canonical string
    pub fn as_str(&self) -> &str {
        match self {
            Self::Article => "article",
            Self::Book => "book",
            Self::Booklet => "booklet",
            Self::InBook => "inbook",
            Self::InCollection => "incollection",
            Self::InProceedings => "inproceedings",
            Self::Manual => "manual",
            Self::MastersThesis => "mastersthesis",
            Self::Misc => "misc",
            Self::PhdThesis => "phdthesis",
            Self::Proceedings => "proceedings",
            Self::TechReport => "techreport",
            Self::Unpublished => "unpublished",
            Self::Online => "online",
            Self::Software => "software",
            Self::Dataset => "dataset",
            Self::Other(s) => s.as_str(),
        }
    }
}

/// A single record field (name-value pair)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: String,
}

/// One bibliographic record: cite key, entry type, ordered fields.
///
/// Field order is preserved from the source text. Fields imshelf does not
/// model round-trip through parse and format untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: String,
    pub entry_type: EntryType,
    pub fields: Vec<Field>,
}

impl Record {
    /// Create a new record with no fields
    pub fn new(key: impl Into<String>, entry_type: EntryType) -> Self {
        Self {
            key: key.into(),
            entry_type,
            fields: Vec::new(),
        }
    }

    /// Append a field to the record
    pub fn push_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push(Field {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Get a field value by name (case-insensitive)
    pub fn get_field(&self, name: &str) -> Option<&str> {
        let name_lower = name.to_lowercase();
        self.fields
            .iter()
            .find(|f| f.name.to_lowercase() == name_lower)
            .map(|f| f.value.as_str())
    }

    /// Set a field value, replacing in place when the name already exists
    /// (case-insensitive) and appending otherwise. Replacement keeps the
    /// record's field order stable across repeated merges.
    pub fn set_field(&mut self, name: &str, value: impl Into<String>) {
        let name_lower = name.to_lowercase();
        if let Some(field) = self
            .fields
            .iter_mut()
            .find(|f| f.name.to_lowercase() == name_lower)
        {
            field.value = value.into();
        } else {
            self.fields.push(Field {
                name: name.to_string(),
                value: value.into(),
            });
        }
    }

    /// Remove a field by name (case-insensitive), returning its value
    pub fn remove_field(&mut self, name: &str) -> Option<String> {
        let name_lower = name.to_lowercase();
        let pos = self
            .fields
            .iter()
            .position(|f| f.name.to_lowercase() == name_lower)?;
        Some(self.fields.remove(pos).value)
    }

    /// All fields as a lowercase-keyed map for convenient comparison
    pub fn fields_map(&self) -> HashMap<String, String> {
        self.fields
            .iter()
            .map(|f| (f.name.to_lowercase(), f.value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_type_parsing() {
        assert_eq!(EntryType::from_str("article"), EntryType::Article);
        assert_eq!(EntryType::from_str("ARTICLE"), EntryType::Article);
        assert_eq!(EntryType::from_str("conference"), EntryType::InProceedings);
        assert_eq!(
            EntryType::from_str("patent"),
            EntryType::Other("patent".to_string())
        );
    }

    #[test]
    fn test_other_type_keeps_spelling() {
        let t = EntryType::from_str("Patent");
        assert_eq!(t.as_str(), "patent");
    }

    #[test]
    fn test_field_access() {
        let mut record = Record::new("Smith2024", EntryType::Article);
        record.push_field("title", "A Great Paper");
        record.push_field("Author", "John Smith");

        assert_eq!(record.get_field("TITLE"), Some("A Great Paper"));
        assert_eq!(record.get_field("author"), Some("John Smith"));
        assert_eq!(record.get_field("year"), None);
    }

    #[test]
    fn test_set_field_replaces_in_place() {
        let mut record = Record::new("Smith2024", EntryType::Article);
        record.push_field("title", "Old Title");
        record.push_field("year", "2020");

        record.set_field("Title", "New Title");
        assert_eq!(record.fields[0].value, "New Title");
        assert_eq!(record.fields.len(), 2);

        record.set_field("journal", "Nature");
        assert_eq!(record.fields.len(), 3);
        assert_eq!(record.fields[2].name, "journal");
    }

    #[test]
    fn test_remove_field() {
        let mut record = Record::new("Smith2024", EntryType::Article);
        record.push_field("file", "/tmp/a.pdf;/tmp/b.pdf");
        record.push_field("title", "Kept");

        assert_eq!(
            record.remove_field("FILE"),
            Some("/tmp/a.pdf;/tmp/b.pdf".to_string())
        );
        assert_eq!(record.remove_field("file"), None);
        assert_eq!(record.fields.len(), 1);
    }
}
