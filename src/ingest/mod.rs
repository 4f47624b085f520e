// src/ingest/mod.rs
pub mod ledger;
pub mod scheduler;
pub mod sources;
pub mod types;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on the embedding
/// deployment's exporter).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_cycles_total", "Completed ingestion cycles.");
        describe_counter!(
            "ingest_cycles_skipped_total",
            "Scheduled ticks skipped because a cycle was still running."
        );
        describe_counter!("ingest_events_total", "Total posts fetched from adapters.");
        describe_counter!(
            "ingest_dedup_total",
            "Posts dropped because their source ID was already processed."
        );
        describe_counter!("ingest_scored_total", "Posts scored and aggregated.");
        describe_counter!(
            "ingest_provider_errors_total",
            "Adapter fetch/parse errors and timeouts."
        );
        describe_counter!(
            "ingest_snapshot_errors_total",
            "Snapshot writes that failed (cycle output lost)."
        );
        describe_histogram!("ingest_parse_ms", "Provider parse time in milliseconds.");
        describe_histogram!("ingest_cycle_ms", "Full cycle duration in milliseconds.");
        describe_gauge!(
            "ingest_last_run_ts",
            "Unix ts when the ingestion pipeline last ran."
        );
    });
}

/// Normalize text: decode HTML entities, strip tags, collapse whitespace,
/// trim stray punctuation, cap length.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize typographic quotes to ASCII
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // 5) Strip trailing sentence punctuation (keep quotes)
    while let Some(last) = out.chars().last() {
        if matches!(last, '!' | '?' | '.' | ',') {
            out.pop();
        } else {
            break;
        }
    }

    // 6) Length cap: 1500 chars
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}
