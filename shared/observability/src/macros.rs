//! Convenience macros for recurring logging patterns in the loader.

/// Log a timed operation (measures and logs duration)
#[macro_export]
macro_rules! log_timed {
    ($name:expr, $block:expr) => {{
        let start = std::time::Instant::now();
        let result = $block;
        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(target: "timing", operation = $name, duration_ms = duration_ms, "operation completed");
        result
    }};
}

/// Log a statement sent to the graph store
#[macro_export]
macro_rules! log_store {
    ($operation:expr, $label:expr) => {
        tracing::debug!(target: "store", operation = $operation, label = $label, "store statement");
    };
    ($operation:expr, $label:expr, $rows:expr) => {
        tracing::debug!(target: "store", operation = $operation, label = $label, rows = $rows, "store statement");
    };
}

/// Log a retry attempt
#[macro_export]
macro_rules! log_retry {
    ($operation:expr, $attempt:expr, $max_attempts:expr) => {
        tracing::warn!(target: "retry", operation = $operation, attempt = $attempt, max_attempts = $max_attempts, "retrying operation");
    };
    ($operation:expr, $attempt:expr, $max_attempts:expr, $error:expr) => {
        tracing::warn!(target: "retry", operation = $operation, attempt = $attempt, max_attempts = $max_attempts, error = %$error, "retrying after error");
    };
}

/// Log a record skipped by a loader (the load itself continues)
#[macro_export]
macro_rules! log_skip {
    ($label:expr, $position:expr, $reason:expr) => {
        tracing::warn!(target: "skip", label = $label, position = $position, reason = %$reason, "record skipped");
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_macros_compile() {
        let value = log_timed!("sum", 1 + 1);
        assert_eq!(value, 2);

        log_store!("merge_nodes", "Hospital");
        log_store!("merge_nodes", "Hospital", 500);

        log_retry!("full_load", 2, 3);
        log_retry!("full_load", 2, 3, "connection refused");

        log_skip!("COVERED_BY", 12, "invalid amount");
    }
}
