use crate::markdown::escape_html;
use crate::models::SearchHit;
use std::collections::HashSet;

pub const NO_RESULTS: &str = "No results.";

/// Visual weight of a hit: `clamp(round((1 - score) * 100), 0, 100)`.
pub fn score_percent(score: f64) -> u8 {
    let percent = ((1.0 - score) * 100.0).round();
    if percent.is_nan() {
        return 0;
    }
    percent.clamp(0.0, 100.0) as u8
}

/// One block per hit, in the order received.
pub fn render_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return render_message(NO_RESULTS);
    }

    hits.iter().map(render_hit).collect()
}

fn render_hit(hit: &SearchHit) -> String {
    format!(
        concat!(
            r#"<article class="item">"#,
            "<small>#{rank} · score {score} · source: {source}</small>",
            r#"<div class="score-bar"><div class="score-bar-fill" style="width:{percent}%"></div></div>"#,
            "<p>{text}</p>",
            "</article>"
        ),
        rank = hit.rank,
        score = hit.score,
        source = escape_html(&hit.source),
        percent = score_percent(hit.score),
        text = escape_html(&hit.text),
    )
}

/// A single result block carrying a plain message, used for placeholders and failures.
pub fn render_message(message: &str) -> String {
    format!(
        r#"<article class="item"><p>{}</p></article>"#,
        escape_html(message)
    )
}

pub fn render_error_span(message: &str) -> String {
    format!(
        r#"<span style="color:var(--danger)">{}</span>"#,
        escape_html(message)
    )
}

/// Source labels in first-occurrence order.
pub fn unique_sources(hits: &[SearchHit]) -> Vec<&str> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut ordered = Vec::new();

    for hit in hits {
        if seen.insert(hit.source.as_str()) {
            ordered.push(hit.source.as_str());
        }
    }

    ordered
}

pub fn render_sources(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return String::new();
    }

    let labels = unique_sources(hits)
        .into_iter()
        .map(|source| format!("<strong>{}</strong>", escape_html(source)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Sources: {labels}")
}
