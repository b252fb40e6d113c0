// src/models/question.rs

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// The class (grade or entrance-exam track) a question belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ClassTag {
    Grade(u8),
    Jee,
    Neet,
    Cuet,
}

impl ClassTag {
    pub fn as_string(&self) -> String {
        match self {
            ClassTag::Grade(n) => n.to_string(),
            ClassTag::Jee => "JEE".to_string(),
            ClassTag::Neet => "NEET".to_string(),
            ClassTag::Cuet => "CUET".to_string(),
        }
    }
}

impl fmt::Display for ClassTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl FromStr for ClassTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "JEE" => Ok(ClassTag::Jee),
            "NEET" => Ok(ClassTag::Neet),
            "CUET" => Ok(ClassTag::Cuet),
            other => match other.parse::<u8>() {
                Ok(n) if (6..=12).contains(&n) => Ok(ClassTag::Grade(n)),
                _ => Err(format!("Unknown class '{}'", trimmed)),
            },
        }
    }
}

impl TryFrom<String> for ClassTag {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClassTag> for String {
    fn from(tag: ClassTag) -> Self {
        tag.as_string()
    }
}

/// Question archetype. Determines how many correct options a question may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    #[serde(alias = "single")]
    SingleAnswer,
    #[serde(alias = "assertion")]
    AssertionReason,
    #[serde(alias = "multiple")]
    MultiSelect,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::SingleAnswer => "single-answer",
            QuestionType::AssertionReason => "assertion-reason",
            QuestionType::MultiSelect => "multi-select",
        }
    }

    /// Whether the answer key must hold exactly one option.
    pub fn is_single_key(&self) -> bool {
        !matches!(self, QuestionType::MultiSelect)
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single-answer" | "single" => Ok(QuestionType::SingleAnswer),
            "assertion-reason" | "assertion" => Ok(QuestionType::AssertionReason),
            "multi-select" | "multiple" => Ok(QuestionType::MultiSelect),
            other => Err(format!("Unknown question type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("Unknown difficulty '{}'", other)),
        }
    }
}

/// One of the four option letters of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionLetter {
    A,
    B,
    C,
    D,
}

impl FromStr for OptionLetter {
    type Err = String;

    /// Accepts a single letter in either case, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(OptionLetter::A),
            "b" => Ok(OptionLetter::B),
            "c" => Ok(OptionLetter::C),
            "d" => Ok(OptionLetter::D),
            other => Err(format!("Invalid option '{}'", other)),
        }
    }
}

/// Parses a list of letters into a set, rejecting anything outside a..d.
pub fn parse_letters<S: AsRef<str>>(letters: &[S]) -> Result<BTreeSet<OptionLetter>, String> {
    letters
        .iter()
        .map(|l| l.as_ref())
        .filter(|l| !l.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// A question as served by the question bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,

    #[serde(rename = "class")]
    pub class_tag: ClassTag,

    pub subject: String,

    pub chapter: String,

    pub topics: BTreeSet<String>,

    #[serde(rename = "type")]
    pub question_type: QuestionType,

    pub prompt_text: String,

    /// Exactly four options, addressed as a..d.
    pub options: Vec<String>,

    pub explanation_text: String,

    /// Answer key. Non-empty; a single letter unless the type is multi-select.
    pub correct_options: BTreeSet<OptionLetter>,

    pub difficulty: Difficulty,

    pub marks: u32,
}

impl Question {
    /// Checks the structural invariants of a question record.
    pub fn check(&self) -> Result<(), String> {
        if self.options.len() != 4 {
            return Err(format!(
                "question {} has {} options, expected 4",
                self.id,
                self.options.len()
            ));
        }
        if self.correct_options.is_empty() {
            return Err(format!("question {} has an empty answer key", self.id));
        }
        if self.question_type.is_single_key() && self.correct_options.len() != 1 {
            return Err(format!(
                "question {} is {} but has {} correct options",
                self.id,
                self.question_type.as_str(),
                self.correct_options.len()
            ));
        }
        if self.marks == 0 {
            return Err(format!("question {} carries zero marks", self.id));
        }
        Ok(())
    }
}

/// Filter passed to the question bank. Empty lists mean "no restriction".
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionFilter {
    pub class_tag: ClassTag,
    pub subjects: Vec<String>,
    pub chapters: Vec<String>,
    pub topics: Vec<String>,
    pub types: Vec<QuestionType>,
}

impl QuestionFilter {
    pub fn for_class(class_tag: ClassTag) -> Self {
        Self {
            class_tag,
            subjects: Vec::new(),
            chapters: Vec::new(),
            topics: Vec::new(),
            types: Vec::new(),
        }
    }

    pub fn matches(&self, question: &Question) -> bool {
        question.class_tag == self.class_tag
            && (self.subjects.is_empty() || self.subjects.contains(&question.subject))
            && (self.chapters.is_empty() || self.chapters.contains(&question.chapter))
            && (self.topics.is_empty() || self.topics.iter().any(|t| question.topics.contains(t)))
            && (self.types.is_empty() || self.types.contains(&question.question_type))
    }
}
