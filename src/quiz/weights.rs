// src/quiz/weights.rs

//! Chapter weight table: static configuration mapping
//! (class, subject, chapter) to a positive weight.

use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

use thiserror::Error;

use crate::models::question::ClassTag;

pub type ChapterWeightMap = BTreeMap<String, u32>;

/// Read-only lookup of chapter weights for a class and subject.
pub trait ChapterWeights: Send + Sync {
    /// `None` means no weighting is configured for the pair.
    fn weights_for(&self, class_tag: ClassTag, subject: &str) -> Option<&ChapterWeightMap>;
}

#[derive(Debug, Error)]
pub enum WeightTableError {
    #[error("failed to read weight table: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid weight table JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("weight table: {0}")]
    UnknownClass(String),

    #[error("weight table: chapter '{chapter}' of {class_tag}/{subject} has zero weight")]
    ZeroWeight {
        class_tag: ClassTag,
        subject: String,
        chapter: String,
    },
}

/// Weight table held in memory, usually loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticChapterWeights {
    table: HashMap<ClassTag, HashMap<String, ChapterWeightMap>>,
}

impl StaticChapterWeights {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses `{ "<class>": { "<subject>": { "<chapter>": weight } } }`.
    pub fn from_json_str(json: &str) -> Result<Self, WeightTableError> {
        let raw: BTreeMap<String, BTreeMap<String, BTreeMap<String, u32>>> =
            serde_json::from_str(json)?;

        let mut weights = Self::empty();
        for (class, subjects) in raw {
            let class_tag: ClassTag = class.parse().map_err(WeightTableError::UnknownClass)?;
            for (subject, chapters) in subjects {
                for (chapter, weight) in chapters {
                    weights.insert(class_tag, &subject, &chapter, weight)?;
                }
            }
        }
        Ok(weights)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, WeightTableError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn insert(
        &mut self,
        class_tag: ClassTag,
        subject: &str,
        chapter: &str,
        weight: u32,
    ) -> Result<(), WeightTableError> {
        if weight == 0 {
            return Err(WeightTableError::ZeroWeight {
                class_tag,
                subject: subject.to_string(),
                chapter: chapter.to_string(),
            });
        }
        self.table
            .entry(class_tag)
            .or_default()
            .entry(subject.trim().to_string())
            .or_default()
            .insert(chapter.trim().to_string(), weight);
        Ok(())
    }

    /// Builder-style insert. Fails on the same entries `insert` rejects.
    pub fn with(
        mut self,
        class_tag: ClassTag,
        subject: &str,
        chapter: &str,
        weight: u32,
    ) -> Result<Self, WeightTableError> {
        self.insert(class_tag, subject, chapter, weight)?;
        Ok(self)
    }

    pub fn subject_count(&self) -> usize {
        self.table.values().map(HashMap::len).sum()
    }
}

impl ChapterWeights for StaticChapterWeights {
    fn weights_for(&self, class_tag: ClassTag, subject: &str) -> Option<&ChapterWeightMap> {
        self.table.get(&class_tag)?.get(subject.trim())
    }
}
