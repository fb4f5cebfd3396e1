use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body shared by `/api/search` and, flattened, by `/api/ask`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Query {
    #[serde(rename = "query")]
    pub text: String,
    pub collection: String,
    pub embed_model: String,
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AskRequest {
    #[serde(flatten)]
    pub query: Query,
    pub chat_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub rank: u32,
    /// Distance-like score: lower is a better match.
    pub score: f64,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnswerResult {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

impl AnswerResult {
    /// The generated text, or `None` when the backend produced nothing usable.
    pub fn answer_text(&self) -> Option<&str> {
        self.answer.as_deref().filter(|answer| !answer.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TrainRequest {
    pub collection: String,
    pub corpus_dir: String,
    pub chunk_size: u32,
    pub overlap: u32,
    pub embed_model: String,
    pub reset: bool,
}

/// Backend-defined indexing report, displayed verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct TrainSummary(pub Value);

impl TrainSummary {
    pub fn pretty(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| self.0.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CorpusFile {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CorpusListing {
    #[serde(default)]
    pub files: Vec<CorpusFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelInventory {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusInfo {
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub chunks: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ThemePreference {
    Dark,
    Light,
}

impl ThemePreference {
    pub fn from_dark(dark: bool) -> Self {
        if dark {
            Self::Dark
        } else {
            Self::Light
        }
    }

    pub fn is_dark(self) -> bool {
        matches!(self, Self::Dark)
    }

    pub fn toggled(self) -> Self {
        Self::from_dark(!self.is_dark())
    }

    /// Persisted token: `"1"` for dark, `"0"` for light.
    pub fn token(self) -> &'static str {
        match self {
            Self::Dark => "1",
            Self::Light => "0",
        }
    }

    /// Any stored value other than `"1"` reads as light.
    pub fn from_token(token: &str) -> Self {
        Self::from_dark(token == "1")
    }
}
