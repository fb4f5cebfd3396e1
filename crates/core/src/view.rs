use crate::busy::{Control, ControlId};
use crate::config::{coerce_chunk_size, coerce_overlap, coerce_top_k, LabConfig, RacePolicy};
use crate::markdown::escape_html;
use crate::models::{AskRequest, Query, ThemePreference, TrainRequest};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    StatusBadge,
    ModelsBadge,
    CorpusInfo,
    TrainResult,
    SearchResults,
    Answer,
}

/// Operator-editable inputs, kept as the raw text a form would hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormInputs {
    pub collection: String,
    pub corpus_dir: String,
    pub chunk_size: String,
    pub overlap: String,
    pub embed_model: String,
    pub chat_model: String,
    pub top_k: String,
    pub reset: bool,
    pub search_query: String,
    pub ask_query: String,
}

impl FormInputs {
    pub fn from_config(config: &LabConfig) -> Self {
        Self {
            collection: config.collection.clone(),
            corpus_dir: config.corpus_dir.clone(),
            chunk_size: config.chunk_size.to_string(),
            overlap: config.overlap.to_string(),
            embed_model: config.embed_model.clone(),
            chat_model: config.chat_model.clone(),
            top_k: config.top_k.to_string(),
            reset: config.reset,
            search_query: String::new(),
            ask_query: String::new(),
        }
    }

    pub fn active_collection(&self) -> String {
        self.collection.trim().to_string()
    }

    pub fn query(&self, text: impl Into<String>) -> Query {
        Query {
            text: text.into(),
            collection: self.active_collection(),
            embed_model: self.embed_model.trim().to_string(),
            top_k: coerce_top_k(&self.top_k),
        }
    }

    pub fn ask_request(&self, text: impl Into<String>) -> AskRequest {
        AskRequest {
            query: self.query(text),
            chat_model: self.chat_model.trim().to_string(),
        }
    }

    pub fn train_request(&self) -> TrainRequest {
        TrainRequest {
            collection: self.active_collection(),
            corpus_dir: self.corpus_dir.trim().to_string(),
            chunk_size: coerce_chunk_size(&self.chunk_size),
            overlap: coerce_overlap(&self.overlap),
            embed_model: self.embed_model.trim().to_string(),
            reset: self.reset,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelsBadge {
    pub text: String,
    pub online: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerBox {
    pub visible: bool,
    pub content: String,
    pub sources: String,
}

/// Issued when a request for a region starts; checked before its response is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    region: Region,
    generation: u64,
}

/// Every view region and control the lab console renders into.
///
/// Region contents are markup fragments; anything that originated outside
/// the renderer has already been escaped when it lands here.
#[derive(Debug, Clone)]
pub struct ViewTree {
    pub form: FormInputs,
    pub(crate) status_badge: String,
    pub(crate) models_badge: ModelsBadge,
    pub(crate) corpus_info: String,
    pub(crate) train_result: String,
    pub(crate) search_results: String,
    pub(crate) answer: AnswerBox,
    pub(crate) theme: ThemePreference,
    train: Control,
    search: Control,
    ask: Control,
    generations: HashMap<Region, u64>,
    race_policy: RacePolicy,
}

impl ViewTree {
    pub fn new(config: &LabConfig) -> Self {
        Self {
            form: FormInputs::from_config(config),
            status_badge: String::new(),
            models_badge: ModelsBadge::default(),
            corpus_info: String::new(),
            train_result: String::new(),
            search_results: String::new(),
            answer: AnswerBox::default(),
            theme: ThemePreference::Light,
            train: Control::new("Train"),
            search: Control::new("Search"),
            ask: Control::new("Ask"),
            generations: HashMap::new(),
            race_policy: config.race_policy,
        }
    }

    pub fn control(&self, id: ControlId) -> &Control {
        match id {
            ControlId::Train => &self.train,
            ControlId::Search => &self.search,
            ControlId::Ask => &self.ask,
        }
    }

    pub(crate) fn control_mut(&mut self, id: ControlId) -> &mut Control {
        match id {
            ControlId::Train => &mut self.train,
            ControlId::Search => &mut self.search,
            ControlId::Ask => &mut self.ask,
        }
    }

    pub fn status_badge(&self) -> &str {
        &self.status_badge
    }

    pub fn models_badge(&self) -> &ModelsBadge {
        &self.models_badge
    }

    pub fn corpus_info(&self) -> &str {
        &self.corpus_info
    }

    pub fn train_result(&self) -> &str {
        &self.train_result
    }

    pub fn search_results(&self) -> &str {
        &self.search_results
    }

    pub fn answer(&self) -> &AnswerBox {
        &self.answer
    }

    pub fn theme(&self) -> ThemePreference {
        self.theme
    }

    pub(crate) fn issue(&mut self, region: Region) -> Ticket {
        let counter = self.generations.entry(region).or_insert(0);
        *counter += 1;
        Ticket {
            region,
            generation: *counter,
        }
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.generations.get(&ticket.region).copied() == Some(ticket.generation)
    }

    /// Whether a response carrying `ticket` may still be rendered.
    pub fn accepts(&self, ticket: Ticket) -> bool {
        match self.race_policy {
            RacePolicy::LastResponseWins => true,
            RacePolicy::LatestRequestWins => self.is_current(ticket),
        }
    }

    /// Whole page as a standalone HTML document.
    pub fn to_html_document(&self) -> String {
        let body_class = if self.theme.is_dark() { "dark" } else { "" };
        let models_class = if self.models_badge.online {
            " ollama-status"
        } else {
            ""
        };
        let answer_class = if self.answer.visible { "" } else { " hidden" };

        let mut page = String::new();
        page.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>RAG Lab</title></head>\n");
        page.push_str(&format!("<body class=\"{body_class}\">\n"));
        page.push_str(&format!(
            "<header><span id=\"statusBadge\">{}</span> <span id=\"ollamaBadge\" class=\"badge{models_class}\">{}</span></header>\n",
            self.status_badge, self.models_badge.text
        ));
        page.push_str(&format!(
            "<section id=\"corpus\"><p id=\"corpusInfo\">{}</p><p>Collection: <code>{}</code></p></section>\n",
            self.corpus_info,
            escape_html(&self.form.collection)
        ));
        page.push_str(&format!(
            "<section id=\"train\">{}<pre id=\"trainResult\">{}</pre></section>\n",
            render_button(&self.train),
            self.train_result
        ));
        page.push_str(&format!(
            "<section id=\"search\">{}<div id=\"searchResults\">{}</div></section>\n",
            render_button(&self.search),
            self.search_results
        ));
        page.push_str(&format!(
            "<section id=\"ask\">{}<div id=\"answerBox\" class=\"answer{answer_class}\"><div id=\"answerContent\">{}</div><p id=\"answerSources\">{}</p></div></section>\n",
            render_button(&self.ask),
            self.answer.content,
            self.answer.sources
        ));
        page.push_str("</body>\n</html>\n");
        page
    }
}

fn render_button(control: &Control) -> String {
    let disabled = if control.is_busy() { " disabled" } else { "" };
    format!("<button{disabled}>{}</button>", escape_html(control.label()))
}
