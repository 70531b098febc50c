use std::{
    collections::HashMap,
    fmt::Write as _,
    sync::{Mutex, OnceLock},
};

pub(crate) const DENIAL_REASON_ANONYMOUS: &str = "anonymous";
pub(crate) const DENIAL_REASON_NO_GRANT: &str = "no_grant";
pub(crate) const DENIAL_REASON_UNRESOLVED_ROOT: &str = "unresolved_root";
pub(crate) const DENIAL_REASON_EMPTY_REQUEST: &str = "empty_request";
pub(crate) const DENIAL_REASON_NOT_ADMINISTRATOR: &str = "not_administrator";

static METRICS_STATE: OnceLock<MetricsState> = OnceLock::new();

#[derive(Default)]
pub(crate) struct MetricsState {
    pub(crate) authorization_denials: Mutex<HashMap<&'static str, u64>>,
    pub(crate) mutation_rejections: Mutex<HashMap<&'static str, u64>>,
    pub(crate) hierarchy_faults: Mutex<HashMap<&'static str, u64>>,
}

pub(crate) fn metrics_state() -> &'static MetricsState {
    METRICS_STATE.get_or_init(MetricsState::default)
}

/// Renders every counter in Prometheus text exposition format.
#[must_use]
pub fn render_metrics() -> String {
    let mut output = String::new();
    render_counter(
        &mut output,
        "gallery_authorization_denials_total",
        "Count of authorization denials by reason",
        "reason",
        &metrics_state().authorization_denials,
    );
    render_counter(
        &mut output,
        "gallery_role_mutation_rejections_total",
        "Count of rejected role mutations by rule",
        "rule",
        &metrics_state().mutation_rejections,
    );
    render_counter(
        &mut output,
        "gallery_album_hierarchy_faults_total",
        "Count of malformed album hierarchy observations by fault",
        "fault",
        &metrics_state().hierarchy_faults,
    );
    output
}

fn render_counter(
    output: &mut String,
    name: &str,
    help: &str,
    label: &str,
    counters: &Mutex<HashMap<&'static str, u64>>,
) {
    let snapshot = counters
        .lock()
        .map_or_else(|_| HashMap::new(), |guard| guard.clone());
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} counter");
    let mut entries: Vec<_> = snapshot.into_iter().collect();
    entries.sort_by_key(|(key, _)| *key);
    for (key, value) in entries {
        let _ = writeln!(output, "{name}{{{label}=\"{key}\"}} {value}");
    }
}

pub(crate) fn record_authorization_denial(reason: &'static str) {
    bump(&metrics_state().authorization_denials, reason);
}

pub(crate) fn record_mutation_rejection(rule: &'static str) {
    bump(&metrics_state().mutation_rejections, rule);
}

pub(crate) fn record_hierarchy_fault(fault: &'static str) {
    bump(&metrics_state().hierarchy_faults, fault);
}

fn bump(counters: &Mutex<HashMap<&'static str, u64>>, key: &'static str) {
    if let Ok(mut counters) = counters.lock() {
        let entry = counters.entry(key).or_insert(0);
        *entry += 1;
    }
}
