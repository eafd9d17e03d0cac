use std::sync::LazyLock;

use prometheus::*;

static METRIC_UPLOADED_FILES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "meshdex_uploaded_files",
        "count of uploaded files",
        &["category", "status"]
    )
    .unwrap()
});

static METRIC_DESCRIPTOR_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "meshdex_descriptor_duration",
        "duration of the descriptor service requests in seconds"
    )
    .unwrap()
});

static METRIC_SEARCH_COUNT: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("meshdex_search_count", "count of similarity searches").unwrap()
});

static METRIC_SEARCH_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "meshdex_search_duration",
        "duration of the similarity ranking in seconds",
        exponential_buckets(0.0005, 2.0, 14).unwrap()
    )
    .unwrap()
});

/// Counts an uploaded file, `ok` tells whether descriptors were computed
pub fn inc_uploaded_files(category: Option<&str>, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    METRIC_UPLOADED_FILES.with_label_values(&[category.unwrap_or(""), status]).inc();
}

pub fn observe_descriptor_duration(duration: f64) {
    METRIC_DESCRIPTOR_DURATION.observe(duration);
}

pub fn observe_search(duration: f64) {
    METRIC_SEARCH_COUNT.inc();
    METRIC_SEARCH_DURATION.observe(duration);
}

/// Renders all registered metrics in the text exposition format
pub fn render() -> anyhow::Result<String> {
    let mut buffer = String::new();
    TextEncoder::new().encode_utf8(&prometheus::gather(), &mut buffer)?;
    Ok(buffer)
}
