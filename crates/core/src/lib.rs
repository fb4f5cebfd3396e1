pub mod api;
pub mod busy;
pub mod config;
pub mod error;
pub mod markdown;
pub mod models;
pub mod refresh;
pub mod results;
pub mod session;
pub mod theme;
pub mod view;

pub use api::{ApiClient, Method, RagApi};
pub use busy::{BusyGuard, Control, ControlId};
pub use config::{coerce_top_k, LabConfig, RacePolicy, DEFAULT_TOP_K};
pub use error::{ApiError, PreferenceError, FALLBACK_MESSAGE};
pub use markdown::{escape_html, render_markdown, Escaping, MarkdownRenderer};
pub use models::{
    AnswerResult, AskRequest, CorpusFile, CorpusListing, ModelInfo, ModelInventory, Query,
    SearchHit, SearchResponse, StatusInfo, ThemePreference, TrainRequest, TrainSummary,
};
pub use refresh::RefreshCoordinator;
pub use results::{render_hits, render_sources, score_percent, unique_sources};
pub use session::{ActionOutcome, LabSession};
pub use theme::{
    platform_prefers_dark, FilePreferenceStore, MemoryPreferenceStore, PreferenceStore,
    ThemePersistence,
};
pub use view::{AnswerBox, FormInputs, ModelsBadge, Region, ViewTree};
