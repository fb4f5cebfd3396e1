use crate::api::RagApi;
use crate::busy::{BusyGuard, ControlId};
use crate::config::LabConfig;
use crate::markdown::{escape_html, render_markdown};
use crate::models::ThemePreference;
use crate::refresh::RefreshCoordinator;
use crate::results::{render_error_span, render_hits, render_message, render_sources};
use crate::view::{FormInputs, Region, ViewTree};
use std::cell::{Ref, RefCell};
use tracing::debug;

pub const TRAINING_LABEL: &str = "Training...";
pub const SEARCHING_LABEL: &str = "Searching...";
pub const ANSWERING_LABEL: &str = "Generating answer...";
pub const NO_ANSWER: &str = "(no answer)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionOutcome {
    /// The response was rendered into its region.
    Rendered,
    /// The failure message was rendered into the region instead.
    Failed,
    /// Nothing to send (empty query); no request was made.
    Skipped,
    /// The control was already busy; the activation was rejected.
    Busy,
    /// A newer request owns the region; this response was dropped.
    Superseded,
}

/// One operator session against a lab backend.
///
/// All actions run on a single cooperative thread and only suspend while a
/// request is in flight, so the view is never borrowed across an `await`.
/// Actions on different controls may interleave freely; the same control
/// cannot run twice at once because it is disabled while busy.
pub struct LabSession<A: RagApi> {
    api: A,
    view: RefCell<ViewTree>,
}

impl<A: RagApi> LabSession<A> {
    pub fn new(api: A, config: &LabConfig) -> Self {
        Self {
            api,
            view: RefCell::new(ViewTree::new(config)),
        }
    }

    pub fn view(&self) -> Ref<'_, ViewTree> {
        self.view.borrow()
    }

    pub fn edit_form(&self, edit: impl FnOnce(&mut FormInputs)) {
        edit(&mut self.view.borrow_mut().form);
    }

    pub fn apply_theme(&self, theme: ThemePreference) {
        self.view.borrow_mut().theme = theme;
    }

    pub fn refresher(&self) -> RefreshCoordinator<'_, A> {
        RefreshCoordinator::new(&self.api, &self.view)
    }

    pub async fn boot(&self) -> [ActionOutcome; 3] {
        self.refresher().boot().await
    }

    pub async fn set_collection(&self, collection: &str) -> Option<ActionOutcome> {
        self.refresher().collection_changed(collection).await
    }

    /// Indexes the corpus, then refreshes the status badge while still busy.
    pub async fn train(&self) -> ActionOutcome {
        let Some(_guard) = BusyGuard::acquire(&self.view, ControlId::Train, TRAINING_LABEL) else {
            return ActionOutcome::Busy;
        };
        let (request, ticket) = {
            let mut view = self.view.borrow_mut();
            (view.form.train_request(), view.issue(Region::TrainResult))
        };
        debug!(collection = %request.collection, corpus_dir = %request.corpus_dir, "train");

        let result = self.api.train(&request).await;

        {
            let mut view = self.view.borrow_mut();
            if !view.accepts(ticket) {
                return ActionOutcome::Superseded;
            }
            match result {
                Ok(summary) => view.train_result = escape_html(&summary.pretty()),
                Err(error) => {
                    view.train_result = escape_html(&error.user_message());
                    return ActionOutcome::Failed;
                }
            }
        }

        self.refresher().refresh_status().await;
        ActionOutcome::Rendered
    }

    pub async fn search(&self) -> ActionOutcome {
        let text = self.view.borrow().form.search_query.trim().to_string();
        if text.is_empty() {
            self.view.borrow_mut().search_results = render_hits(&[]);
            return ActionOutcome::Skipped;
        }

        let Some(_guard) = BusyGuard::acquire(&self.view, ControlId::Search, SEARCHING_LABEL)
        else {
            return ActionOutcome::Busy;
        };
        let (query, ticket) = {
            let mut view = self.view.borrow_mut();
            (view.form.query(text), view.issue(Region::SearchResults))
        };

        let result = self.api.search(&query).await;

        let mut view = self.view.borrow_mut();
        if !view.accepts(ticket) {
            debug!("dropping superseded search response");
            return ActionOutcome::Superseded;
        }
        match result {
            Ok(response) => {
                view.search_results = render_hits(&response.results);
                ActionOutcome::Rendered
            }
            Err(error) => {
                view.search_results = render_message(&error.user_message());
                ActionOutcome::Failed
            }
        }
    }

    /// Generates an answer; the retrieved hits also replace the search results.
    pub async fn ask(&self) -> ActionOutcome {
        let text = self.view.borrow().form.ask_query.trim().to_string();
        if text.is_empty() {
            return ActionOutcome::Skipped;
        }

        let Some(_guard) = BusyGuard::acquire(&self.view, ControlId::Ask, ANSWERING_LABEL) else {
            return ActionOutcome::Busy;
        };
        let (request, answer_ticket, results_ticket) = {
            let mut view = self.view.borrow_mut();
            (
                view.form.ask_request(text),
                view.issue(Region::Answer),
                view.issue(Region::SearchResults),
            )
        };

        let result = self.api.ask(&request).await;

        let mut view = self.view.borrow_mut();
        if !view.accepts(answer_ticket) {
            debug!("dropping superseded answer");
            return ActionOutcome::Superseded;
        }
        view.answer.visible = true;
        match result {
            Ok(answer) => {
                view.answer.content = render_markdown(answer.answer_text().unwrap_or(NO_ANSWER));
                view.answer.sources = render_sources(&answer.results);
                if view.accepts(results_ticket) {
                    view.search_results = render_hits(&answer.results);
                }
                ActionOutcome::Rendered
            }
            Err(error) => {
                view.answer.content = render_error_span(&error.user_message());
                view.answer.sources.clear();
                ActionOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        Method, ASK_PATH, CORPUS_PATH, MODELS_PATH, SEARCH_PATH, STATUS_PATH, TRAIN_PATH,
    };
    use crate::config::RacePolicy;
    use crate::error::ApiError;
    use crate::results::NO_RESULTS;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Clone)]
    enum Reply {
        Json(Value),
        /// Status body echoing the `collection` query parameter.
        EchoStatus(u64),
        Logical(&'static str),
        Http(u16),
        Network,
    }

    #[derive(Clone)]
    struct Step {
        delay: Duration,
        reply: Reply,
    }

    /// Scripted backend: each path answers from its queue, repeating the last step.
    #[derive(Default)]
    struct FakeApi {
        script: Mutex<HashMap<&'static str, VecDeque<Step>>>,
        calls: Mutex<Vec<(String, Option<Value>)>>,
    }

    impl FakeApi {
        fn reply(self, path: &'static str, reply: Reply) -> Self {
            self.reply_after(path, Duration::ZERO, reply)
        }

        fn reply_after(self, path: &'static str, delay: Duration, reply: Reply) -> Self {
            self.script
                .lock()
                .unwrap()
                .entry(path)
                .or_default()
                .push_back(Step { delay, reply });
            self
        }

        fn calls_to(&self, path: &str) -> Vec<(String, Option<Value>)> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(called, _)| called.split('?').next() == Some(path))
                .cloned()
                .collect()
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn next_step(&self, route: &str) -> Option<Step> {
            let mut script = self.script.lock().unwrap();
            let queue = script.get_mut(route)?;
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        }
    }

    #[async_trait]
    impl RagApi for FakeApi {
        async fn call(
            &self,
            path: &str,
            _method: Method,
            body: Option<Value>,
        ) -> Result<Value, ApiError> {
            self.calls.lock().unwrap().push((path.to_string(), body));
            let (route, query) = path.split_once('?').unwrap_or((path, ""));
            let step = self
                .next_step(route)
                .ok_or_else(|| ApiError::Network(format!("no script for {route}")))?;

            if step.delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(step.delay).await;
            }

            match step.reply {
                Reply::Json(value) => Ok(value),
                Reply::EchoStatus(chunks) => {
                    let collection = url::form_urlencoded::parse(query.as_bytes())
                        .find(|(key, _)| key == "collection")
                        .map(|(_, value)| value.into_owned())
                        .unwrap_or_default();
                    Ok(json!({ "ok": true, "collection": collection, "chunks": chunks }))
                }
                Reply::Logical(message) => Err(ApiError::Logical {
                    message: Some(message.to_string()),
                }),
                Reply::Http(status) => Err(ApiError::Http {
                    status,
                    message: None,
                }),
                Reply::Network => Err(ApiError::Network("connection refused".to_string())),
            }
        }
    }

    fn hits_json() -> Value {
        json!([
            { "rank": 1, "score": 0.1, "source": "a.txt", "text": "first **hit**" },
            { "rank": 2, "score": 0.3, "source": "b.txt", "text": "second" },
            { "rank": 3, "score": 0.5, "source": "a.txt", "text": "third" }
        ])
    }

    fn session(api: FakeApi) -> LabSession<FakeApi> {
        LabSession::new(api, &LabConfig::default())
    }

    #[tokio::test]
    async fn empty_search_short_circuits_without_request() {
        let lab = session(FakeApi::default());
        lab.edit_form(|form| form.search_query = "   ".to_string());

        assert_eq!(lab.search().await, ActionOutcome::Skipped);
        assert_eq!(lab.api.call_count(), 0);
        assert!(lab.view().search_results().contains(NO_RESULTS));
        assert!(!lab.view().control(ControlId::Search).is_busy());
    }

    #[tokio::test]
    async fn search_renders_hits_and_restores_control() {
        let api = FakeApi::default().reply(
            SEARCH_PATH,
            Reply::Json(json!({ "ok": true, "results": hits_json() })),
        );
        let lab = session(api);
        lab.edit_form(|form| {
            form.search_query = " jdbc ".to_string();
            form.top_k = String::new();
        });

        assert_eq!(lab.search().await, ActionOutcome::Rendered);

        let calls = lab.api.calls_to(SEARCH_PATH);
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].1,
            Some(json!({
                "query": "jdbc",
                "collection": "nousgpt_rag",
                "embed_model": "nomic-embed-text",
                "top_k": 4
            }))
        );

        let view = lab.view();
        let results = view.search_results();
        let first = results.find("#1 ·").expect("rank 1 rendered");
        let second = results.find("#2 ·").expect("rank 2 rendered");
        assert!(first < second);
        assert!(results.contains("first **hit**"));
        assert_eq!(view.control(ControlId::Search).label(), "Search");
        assert!(!view.control(ControlId::Search).is_busy());
    }

    #[tokio::test]
    async fn logical_error_renders_message_and_leaves_control_idle() {
        let api = FakeApi::default()
            .reply(SEARCH_PATH, Reply::Logical("collection not found"))
            .reply(ASK_PATH, Reply::Logical("collection not found"));
        let lab = session(api);
        lab.edit_form(|form| {
            form.search_query = "jdbc".to_string();
            form.ask_query = "jdbc".to_string();
        });

        assert_eq!(lab.search().await, ActionOutcome::Failed);
        assert_eq!(lab.ask().await, ActionOutcome::Failed);

        let view = lab.view();
        assert!(view.search_results().contains("<p>collection not found</p>"));
        assert!(view.answer().visible);
        assert!(view.answer().content.contains("collection not found"));
        assert!(view.answer().sources.is_empty());
        assert!(!view.control(ControlId::Search).is_busy());
        assert!(!view.control(ControlId::Ask).is_busy());
    }

    #[tokio::test]
    async fn every_failure_kind_restores_the_control() {
        for reply in [Reply::Http(500), Reply::Network, Reply::Logical("boom")] {
            let lab = session(FakeApi::default().reply(SEARCH_PATH, reply));
            lab.edit_form(|form| form.search_query = "q".to_string());

            assert_eq!(lab.search().await, ActionOutcome::Failed);
            let view = lab.view();
            assert_eq!(view.control(ControlId::Search).label(), "Search");
            assert!(!view.control(ControlId::Search).is_busy());
        }
    }

    #[tokio::test]
    async fn second_activation_while_busy_is_rejected() {
        let api = FakeApi::default().reply_after(
            SEARCH_PATH,
            Duration::from_millis(20),
            Reply::Json(json!({ "results": [] })),
        );
        let lab = session(api);
        lab.edit_form(|form| form.search_query = "jdbc".to_string());

        let (first, second) = tokio::join!(lab.search(), lab.search());
        let mut outcomes = [first, second];
        outcomes.sort_by_key(|outcome| *outcome == ActionOutcome::Busy);

        assert_eq!(outcomes, [ActionOutcome::Rendered, ActionOutcome::Busy]);
        assert_eq!(lab.api.calls_to(SEARCH_PATH).len(), 1);
        assert!(!lab.view().control(ControlId::Search).is_busy());
    }

    #[tokio::test]
    async fn ask_renders_markdown_answer_sources_and_hits() {
        let api = FakeApi::default().reply(
            ASK_PATH,
            Reply::Json(json!({
                "ok": true,
                "answer": "Use **JDBC** <safely>\nthen `close()`",
                "results": hits_json()
            })),
        );
        let lab = session(api);
        lab.edit_form(|form| form.ask_query = "jdbc?".to_string());

        assert_eq!(lab.ask().await, ActionOutcome::Rendered);

        let calls = lab.api.calls_to(ASK_PATH);
        assert_eq!(
            calls[0].1.as_ref().map(|body| body["chat_model"].clone()),
            Some(json!("qwen2.5-coder:7b"))
        );

        let view = lab.view();
        assert_eq!(
            view.answer().content,
            "Use <strong>JDBC</strong> &lt;safely&gt;<br>then <code>close()</code>"
        );
        assert_eq!(
            view.answer().sources,
            "Sources: <strong>a.txt</strong>, <strong>b.txt</strong>"
        );
        assert!(view.search_results().contains("#3 ·"));
        assert_eq!(view.control(ControlId::Ask).label(), "Ask");
    }

    #[tokio::test]
    async fn missing_answer_renders_placeholder_and_empty_query_is_ignored() {
        let api = FakeApi::default().reply(ASK_PATH, Reply::Json(json!({ "ok": true })));
        let lab = session(api);

        assert_eq!(lab.ask().await, ActionOutcome::Skipped);
        assert_eq!(lab.api.call_count(), 0);
        assert!(!lab.view().answer().visible);

        lab.edit_form(|form| form.ask_query = "anything".to_string());
        assert_eq!(lab.ask().await, ActionOutcome::Rendered);
        let view = lab.view();
        assert_eq!(view.answer().content, NO_ANSWER);
        assert_eq!(view.answer().sources, "");
        assert!(view.search_results().contains(NO_RESULTS));
    }

    #[tokio::test]
    async fn train_renders_summary_then_refreshes_status() {
        let api = FakeApi::default()
            .reply(
                TRAIN_PATH,
                Reply::Json(json!({ "ok": true, "collection": "dam2", "chunks": 9 })),
            )
            .reply(STATUS_PATH, Reply::EchoStatus(9));
        let lab = session(api);
        lab.edit_form(|form| {
            form.collection = "dam2".to_string();
            form.chunk_size = "abc".to_string();
        });

        assert_eq!(lab.train().await, ActionOutcome::Rendered);

        let train_calls = lab.api.calls_to(TRAIN_PATH);
        assert_eq!(
            train_calls[0].1,
            Some(json!({
                "collection": "dam2",
                "corpus_dir": "corpus",
                "chunk_size": 700,
                "overlap": 120,
                "embed_model": "nomic-embed-text",
                "reset": true
            }))
        );
        assert_eq!(lab.api.calls_to(STATUS_PATH).len(), 1);

        let view = lab.view();
        assert!(view.train_result().contains("&quot;chunks&quot;: 9"));
        assert_eq!(view.status_badge(), "Collection dam2 · 9 chunks");
        assert_eq!(view.control(ControlId::Train).label(), "Train");
    }

    #[tokio::test]
    async fn train_failure_is_rendered_in_train_region() {
        let api = FakeApi::default().reply(TRAIN_PATH, Reply::Logical("No documents found"));
        let lab = session(api);

        assert_eq!(lab.train().await, ActionOutcome::Failed);
        assert_eq!(lab.view().train_result(), "No documents found");
        assert!(lab.api.calls_to(STATUS_PATH).is_empty());
        assert!(!lab.view().control(ControlId::Train).is_busy());
    }

    #[tokio::test]
    async fn status_failure_does_not_touch_other_regions() {
        let api = FakeApi::default()
            .reply(STATUS_PATH, Reply::Http(503))
            .reply(
                MODELS_PATH,
                Reply::Json(json!({ "models": [{ "name": "nomic-embed-text" }, { "name": "qwen2.5-coder:7b" }] })),
            )
            .reply(
                CORPUS_PATH,
                Reply::Json(json!({ "files": [{ "name": "tema1.md" }] })),
            );
        let lab = session(api);

        let outcomes = lab.boot().await;
        assert_eq!(
            outcomes,
            [ActionOutcome::Failed, ActionOutcome::Rendered, ActionOutcome::Rendered]
        );

        let view = lab.view();
        assert_eq!(view.status_badge(), "Status: Unexpected error (HTTP 503)");
        assert_eq!(view.models_badge().text, "Ollama OK · 2 models");
        assert!(view.models_badge().online);
        assert_eq!(
            view.corpus_info(),
            "<strong>1 files</strong> in corpus: tema1.md"
        );
    }

    #[tokio::test]
    async fn offline_backend_degrades_each_region_locally() {
        let lab = session(FakeApi::default());
        lab.boot().await;

        let view = lab.view();
        assert!(view.status_badge().starts_with("Status: "));
        assert_eq!(view.models_badge().text, crate::refresh::MODELS_OFFLINE);
        assert!(!view.models_badge().online);
        assert_eq!(view.corpus_info(), crate::refresh::CORPUS_UNREADABLE);
    }

    #[tokio::test]
    async fn collection_change_refreshes_status_only_when_changed() {
        let api = FakeApi::default().reply(STATUS_PATH, Reply::EchoStatus(3));
        let lab = session(api);

        assert_eq!(lab.set_collection("nousgpt_rag").await, None);
        assert!(lab.api.calls_to(STATUS_PATH).is_empty());

        assert_eq!(
            lab.set_collection("tema 2").await,
            Some(ActionOutcome::Rendered)
        );
        let calls = lab.api.calls_to(STATUS_PATH);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "/api/status?collection=tema+2");
        assert_eq!(lab.view().status_badge(), "Collection tema 2 · 3 chunks");
    }

    async fn race_status_refreshes(policy: RacePolicy) -> String {
        let api = FakeApi::default()
            .reply_after(STATUS_PATH, Duration::from_millis(40), Reply::EchoStatus(1))
            .reply(STATUS_PATH, Reply::EchoStatus(2));
        let config = LabConfig {
            collection: "old".to_string(),
            race_policy: policy,
            ..LabConfig::default()
        };
        let lab = LabSession::new(api, &config);

        let refresher = lab.refresher();
        let slow = refresher.refresh_status();
        tokio::pin!(slow);
        tokio::select! {
            biased;
            _ = &mut slow => panic!("slow refresh finished before the newer one started"),
            _ = tokio::task::yield_now() => {}
        }

        assert_eq!(lab.set_collection("new").await, Some(ActionOutcome::Rendered));
        assert_eq!(lab.view().status_badge(), "Collection new · 2 chunks");

        slow.await;
        let badge = lab.view().status_badge().to_string();
        badge
    }

    #[tokio::test]
    async fn late_response_wins_by_default() {
        let badge = race_status_refreshes(RacePolicy::LastResponseWins).await;
        assert_eq!(badge, "Collection old · 1 chunks");
    }

    #[tokio::test]
    async fn latest_request_policy_drops_stale_responses() {
        let badge = race_status_refreshes(RacePolicy::LatestRequestWins).await;
        assert_eq!(badge, "Collection new · 2 chunks");
    }
}
