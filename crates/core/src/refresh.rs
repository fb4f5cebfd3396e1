use crate::api::RagApi;
use crate::markdown::escape_html;
use crate::models::{CorpusListing, ModelInventory, StatusInfo};
use crate::session::ActionOutcome;
use crate::view::{Region, ViewTree};
use std::cell::RefCell;
use tracing::debug;

pub const MODELS_OFFLINE: &str = "Ollama offline";
pub const CORPUS_EMPTY: &str = "No files in corpus.";
pub const CORPUS_UNREADABLE: &str = "Could not read corpus.";

/// Keeps the status, model-inventory and corpus regions current.
///
/// Each refresh is independent: a failure degrades only its own region.
pub struct RefreshCoordinator<'a, A: RagApi> {
    api: &'a A,
    view: &'a RefCell<ViewTree>,
}

impl<'a, A: RagApi> RefreshCoordinator<'a, A> {
    pub fn new(api: &'a A, view: &'a RefCell<ViewTree>) -> Self {
        Self { api, view }
    }

    /// Load-time refresh of all three regions, run concurrently.
    pub async fn boot(&self) -> [ActionOutcome; 3] {
        let (status, models, corpus) = tokio::join!(
            self.refresh_status(),
            self.refresh_models(),
            self.refresh_corpus()
        );
        [status, models, corpus]
    }

    /// Records a new active collection; refreshes status only when it actually changed.
    pub async fn collection_changed(&self, collection: &str) -> Option<ActionOutcome> {
        {
            let mut view = self.view.borrow_mut();
            if view.form.active_collection() == collection.trim() {
                return None;
            }
            view.form.collection = collection.to_string();
        }
        Some(self.refresh_status().await)
    }

    pub async fn refresh_status(&self) -> ActionOutcome {
        let (collection, ticket) = {
            let mut view = self.view.borrow_mut();
            (view.form.active_collection(), view.issue(Region::StatusBadge))
        };

        let result = self.api.status(&collection).await;

        let mut view = self.view.borrow_mut();
        if !view.accepts(ticket) {
            debug!(collection = %collection, "dropping superseded status response");
            return ActionOutcome::Superseded;
        }
        let (badge, outcome) = match result {
            Ok(status) => (status_text(&status), ActionOutcome::Rendered),
            Err(error) => {
                debug!(%error, reachable = error.service_reachable(), "status refresh failed");
                (
                    format!("Status: {}", error.user_message()),
                    ActionOutcome::Failed,
                )
            }
        };
        view.status_badge = escape_html(&badge);
        outcome
    }

    pub async fn refresh_models(&self) -> ActionOutcome {
        let ticket = self.view.borrow_mut().issue(Region::ModelsBadge);

        let result = self.api.models().await;

        let mut view = self.view.borrow_mut();
        if !view.accepts(ticket) {
            return ActionOutcome::Superseded;
        }
        match result {
            Ok(inventory) => {
                view.models_badge.text = escape_html(&models_text(&inventory));
                view.models_badge.online = true;
                ActionOutcome::Rendered
            }
            Err(error) => {
                debug!(
                    %error,
                    reachable = error.service_reachable(),
                    "model inventory unavailable"
                );
                view.models_badge.text = MODELS_OFFLINE.to_string();
                view.models_badge.online = false;
                ActionOutcome::Failed
            }
        }
    }

    pub async fn refresh_corpus(&self) -> ActionOutcome {
        let ticket = self.view.borrow_mut().issue(Region::CorpusInfo);

        let result = self.api.corpus().await;

        let mut view = self.view.borrow_mut();
        if !view.accepts(ticket) {
            return ActionOutcome::Superseded;
        }
        match result {
            Ok(listing) => {
                view.corpus_info = corpus_markup(&listing);
                ActionOutcome::Rendered
            }
            Err(error) => {
                debug!(%error, "corpus listing unavailable");
                view.corpus_info = CORPUS_UNREADABLE.to_string();
                ActionOutcome::Failed
            }
        }
    }
}

fn status_text(status: &StatusInfo) -> String {
    format!("Collection {} · {} chunks", status.collection, status.chunks)
}

fn models_text(inventory: &ModelInventory) -> String {
    format!("Ollama OK · {} models", inventory.models.len())
}

fn corpus_markup(listing: &CorpusListing) -> String {
    if listing.files.is_empty() {
        return CORPUS_EMPTY.to_string();
    }

    let names = listing
        .files
        .iter()
        .map(|file| file.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "<strong>{} files</strong> in corpus: {}",
        listing.files.len(),
        escape_html(&names)
    )
}
