use std::time::Duration;

/// Which instrumentation the driver collects. Explain and timing are
/// mutually exclusive by construction; `Off` disables reporting entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileMode {
    #[default]
    Off,
    /// Detailed per-query diagnostics.
    Explain,
    /// Aggregate timing, accumulated on the connection.
    Timing,
}

/// One profiling callback surrounding query execution.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileEvent<'a> {
    Start { query: &'a str },
    Stop { query: &'a str, elapsed: Duration },
    /// Explain-mode note that a result was served from cache.
    FromCache { query: &'a str },
    /// Timing-mode record of a cache hit.
    RecordFromCache { query: &'a str },
}

/// Sink for profiling events. Implementations decide what to do with them;
/// the driver only guarantees the event ordering per query.
pub trait Profiler: Send + Sync {
    fn report(&self, event: ProfileEvent<'_>);
}
