use super::TraceId;
use tracing::{Level, Span, field};

/// Root span for one cycle or one out-of-process queue operation.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::span!(
        Level::INFO,
        "root",
        name = name,
        trace_id = %trace_id.as_str(),
        mint = field::Empty,
        intent_id = field::Empty,
    )
}

/// Child span inheriting the current trace id via tracing's span context.
pub fn child_span(name: &'static str) -> Span {
    tracing::span!(Level::INFO, "child", name = name)
}
