use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "gateway.request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds.",
};

pub const REQUEST_FAILURES: MetricDef = MetricDef {
    name: "gateway.request.failures",
    metric_type: MetricType::Counter,
    description: "Requests that ended in a failure envelope. Tagged with stage.",
};

pub const ALL_METRICS: &[MetricDef] = &[REQUEST_DURATION, REQUEST_FAILURES];
