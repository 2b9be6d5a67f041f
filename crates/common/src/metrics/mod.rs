//! Metrics and observability utilities
//!
//! Prometheus metrics for the chat and ingestion paths, recorded through the
//! `metrics` facade and rendered by the gateway's exporter.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Metrics prefix for all PersonaIQ metrics
pub const METRICS_PREFIX: &str = "personaiq";

/// Buckets for provider-bound latencies (embedding, completion, whole chat turn)
pub const PROVIDER_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 60s
];

/// Buckets for the number of chunks retrieved per chat turn
pub const RETRIEVAL_BUCKETS: &[f64] = &[0.0, 1.0, 2.0, 3.0, 5.0, 10.0, 20.0];

/// Fully prefixed metric name
pub fn name(suffix: &str) -> String {
    format!("{}_{}", METRICS_PREFIX, suffix)
}

/// Register all metric descriptions
pub fn register_metrics() {
    // Chat metrics
    describe_counter!(
        name("chat_requests_total"),
        Unit::Count,
        "Total chat requests by outcome"
    );

    describe_histogram!(
        name("chat_duration_seconds"),
        Unit::Seconds,
        "End-to-end chat latency in seconds"
    );

    describe_histogram!(
        name("retrieved_chunks"),
        Unit::Count,
        "Context chunks retrieved per chat turn"
    );

    // Ingestion metrics
    describe_counter!(
        name("ingest_requests_total"),
        Unit::Count,
        "Total ingestion requests by outcome"
    );

    describe_counter!(
        name("ingest_chunks_total"),
        Unit::Count,
        "Total chunks embedded and stored"
    );

    describe_histogram!(
        name("ingest_duration_seconds"),
        Unit::Seconds,
        "Ingestion latency in seconds"
    );

    // Provider metrics
    describe_counter!(
        name("provider_errors_total"),
        Unit::Count,
        "Embedding and completion provider failures"
    );

    describe_histogram!(
        name("embedding_duration_seconds"),
        Unit::Seconds,
        "Embedding call latency in seconds"
    );

    describe_histogram!(
        name("completion_duration_seconds"),
        Unit::Seconds,
        "Completion call latency in seconds"
    );

    tracing::info!("Metrics registered");
}

fn outcome(success: bool) -> &'static str {
    if success { "success" } else { "error" }
}

/// Label for requests whose persona never resolved
pub const UNRESOLVED_PERSONA: &str = "unresolved";

/// `persona` label value. Only registered (or the default) persona ids become
/// labels, so request input cannot grow the series set.
pub fn persona_label(resolved: Option<&str>) -> String {
    resolved.unwrap_or(UNRESOLVED_PERSONA).to_string()
}

/// Record one finished chat turn; `persona` is the resolved id, if any
pub fn record_chat(duration_secs: f64, persona: Option<&str>, retrieved: usize, success: bool) {
    counter!(
        name("chat_requests_total"),
        "persona" => persona_label(persona),
        "status" => outcome(success)
    )
    .increment(1);

    if success {
        histogram!(name("chat_duration_seconds")).record(duration_secs);
        histogram!(name("retrieved_chunks")).record(retrieved as f64);
    }
}

/// Record one finished ingestion; `persona` is the resolved id, if any
pub fn record_ingestion(duration_secs: f64, persona: Option<&str>, chunks_created: usize, success: bool) {
    counter!(
        name("ingest_requests_total"),
        "persona" => persona_label(persona),
        "status" => outcome(success)
    )
    .increment(1);

    if success {
        counter!(
            name("ingest_chunks_total"),
            "persona" => persona_label(persona)
        )
        .increment(chunks_created as u64);

        histogram!(name("ingest_duration_seconds")).record(duration_secs);
    }
}

/// Record one embedding call
pub fn record_embedding(duration_secs: f64, model: &str, success: bool) {
    if success {
        histogram!(
            name("embedding_duration_seconds"),
            "model" => model.to_string()
        )
        .record(duration_secs);
    } else {
        record_provider_error("embedding");
    }
}

/// Record one completion call
pub fn record_completion(duration_secs: f64, model: &str, success: bool) {
    if success {
        histogram!(
            name("completion_duration_seconds"),
            "model" => model.to_string()
        )
        .record(duration_secs);
    } else {
        record_provider_error("completion");
    }
}

fn record_provider_error(provider: &'static str) {
    counter!(name("provider_errors_total"), "provider" => provider).increment(1);
}
