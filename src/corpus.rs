//! Experience corpus loading.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CorpusError;

/// Opaque experience identifier. The corpus may spell it as a string or an integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExperienceId(String);

impl ExperienceId {
    /// Wraps an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as stored in index metadata.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExperienceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ExperienceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ExperienceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Self(text),
            Raw::Signed(value) => Self(value.to_string()),
            Raw::Unsigned(value) => Self(value.to_string()),
        })
    }
}

/// One role held, with the achievements that become chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    /// Identifier from the source file.
    pub id: ExperienceId,
    /// Job title.
    pub role: String,
    /// Employer.
    pub company: String,
    /// Free-form tenure.
    pub duration: String,
    /// Area of work.
    pub category: String,
    /// Skills used in the role.
    pub skills: Vec<String>,
    /// One entry per chunk.
    pub achievements: Vec<String>,
}

/// The full corpus file: `{ "experiences": [ ... ] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Corpus {
    /// Experiences in file order.
    pub experiences: Vec<Experience>,
}

impl Corpus {
    /// Reads and parses a corpus file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| CorpusError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Parses a corpus document.
    pub fn from_json(raw: &str) -> Result<Self, CorpusError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Total number of achievements, i.e. the chunk count of an indexing run.
    pub fn achievement_count(&self) -> usize {
        self.experiences
            .iter()
            .map(|experience| experience.achievements.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "experiences": [
            {
                "id": 7,
                "role": "PM",
                "company": "Acme",
                "duration": "2020-2022",
                "category": "Growth",
                "skills": ["SQL", "A/B testing"],
                "achievements": ["Increased retention by 20%", "Launched pricing page"]
            },
            {
                "id": "exp-2",
                "role": "Analyst",
                "company": "Globex",
                "duration": "2018-2020",
                "category": "Data",
                "skills": [],
                "achievements": []
            }
        ]
    }"#;

    #[test]
    fn parses_string_and_numeric_ids() {
        let corpus = Corpus::from_json(SAMPLE).expect("parse");
        assert_eq!(corpus.experiences.len(), 2);
        assert_eq!(corpus.experiences[0].id.as_str(), "7");
        assert_eq!(corpus.experiences[1].id.as_str(), "exp-2");
        assert_eq!(corpus.achievement_count(), 2);
    }

    #[test]
    fn rejects_missing_fields() {
        let raw = r#"{ "experiences": [ { "id": 1, "role": "PM" } ] }"#;
        assert!(matches!(
            Corpus::from_json(raw),
            Err(CorpusError::Parse(_))
        ));
    }

    #[test]
    fn rejects_bare_arrays() {
        assert!(Corpus::from_json("[]").is_err());
    }

    #[test]
    fn reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(SAMPLE.as_bytes()).expect("write");
        let corpus = Corpus::from_path(file.path()).expect("load");
        assert_eq!(corpus.experiences[0].company, "Acme");
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Corpus::from_path("/definitely/not/here.json").unwrap_err();
        match err {
            CorpusError::Io { path, .. } => assert!(path.ends_with("here.json")),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
