use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5050";
pub const DEFAULT_COLLECTION: &str = "nousgpt_rag";
pub const DEFAULT_CORPUS_DIR: &str = "corpus";
pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_CHAT_MODEL: &str = "qwen2.5-coder:7b";
pub const DEFAULT_TOP_K: usize = 4;
pub const DEFAULT_CHUNK_SIZE: u32 = 700;
pub const DEFAULT_CHUNK_OVERLAP: u32 = 120;

/// What happens when an older response for a region lands after a newer request was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RacePolicy {
    /// Every response is rendered when it arrives.
    #[default]
    LastResponseWins,
    /// Responses belonging to a superseded request are dropped.
    LatestRequestWins,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabConfig {
    pub base_url: String,
    pub collection: String,
    pub corpus_dir: String,
    pub chunk_size: u32,
    pub overlap: u32,
    pub embed_model: String,
    pub chat_model: String,
    pub top_k: usize,
    pub reset: bool,
    pub state_dir: PathBuf,
    pub race_policy: RacePolicy,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            corpus_dir: DEFAULT_CORPUS_DIR.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            top_k: DEFAULT_TOP_K,
            reset: true,
            state_dir: default_state_dir(),
            race_policy: RacePolicy::default(),
        }
    }
}

pub fn default_state_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".config/rag-lab"),
        None => PathBuf::from("."),
    }
}

/// Top-k from a form value; blank, unparsable or zero falls back to [`DEFAULT_TOP_K`].
pub fn coerce_top_k(raw: &str) -> usize {
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => value,
        _ => DEFAULT_TOP_K,
    }
}

pub fn coerce_chunk_size(raw: &str) -> u32 {
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => value,
        _ => DEFAULT_CHUNK_SIZE,
    }
}

pub fn coerce_overlap(raw: &str) -> u32 {
    raw.trim().parse::<u32>().unwrap_or(DEFAULT_CHUNK_OVERLAP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_k_falls_back_when_unset_or_invalid() {
        assert_eq!(coerce_top_k(""), DEFAULT_TOP_K);
        assert_eq!(coerce_top_k("  "), DEFAULT_TOP_K);
        assert_eq!(coerce_top_k("abc"), DEFAULT_TOP_K);
        assert_eq!(coerce_top_k("0"), DEFAULT_TOP_K);
        assert_eq!(coerce_top_k("-2"), DEFAULT_TOP_K);
        assert_eq!(coerce_top_k(" 8 "), 8);
    }

    #[test]
    fn chunking_inputs_use_defaults() {
        assert_eq!(coerce_chunk_size(""), DEFAULT_CHUNK_SIZE);
        assert_eq!(coerce_chunk_size("0"), DEFAULT_CHUNK_SIZE);
        assert_eq!(coerce_chunk_size("512"), 512);
        assert_eq!(coerce_overlap("x"), DEFAULT_CHUNK_OVERLAP);
        assert_eq!(coerce_overlap("0"), 0);
    }
}
