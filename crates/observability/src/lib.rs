//! Process-wide logging setup shared by the binaries.

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Subscriber configuration (filters, output format).
pub mod tracing;
