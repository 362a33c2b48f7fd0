//! Convenience macros for guest ABI tracing
//!
//! Every host function exposed to the guest logs its entry with the raw
//! arguments it received. Funnelling that through one macro keeps the event
//! shape uniform so filters like `faasmp::abi=debug` catch all of them.

/// Trace entry into a guest-facing host function.
///
/// # Syntax
///
/// ```text
/// abi_trace!("omp_get_thread_num")
/// abi_trace!("__kmpc_barrier", loc = loc, gtid = gtid)
/// ```
///
/// # Example
///
/// ```rust
/// use faasmp_tracing::abi_trace;
///
/// let loc = 0;
/// abi_trace!("__kmpc_flush", loc = loc);
/// ```
#[macro_export]
macro_rules! abi_trace {
    ($symbol:expr) => {
        tracing::debug!(target: "faasmp::abi", symbol = $symbol);
    };
    ($symbol:expr, $($field:tt = $value:expr),+ $(,)?) => {
        tracing::debug!(
            target: "faasmp::abi",
            symbol = $symbol,
            $($field = $value),+
        );
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn abi_trace_bare_symbol() {
        abi_trace!("omp_get_thread_num");
        // Should not panic
    }

    #[test]
    fn abi_trace_with_fields() {
        abi_trace!("__kmpc_fork_call", loc = 0, argc = 2, microtask = 7);
        // Should not panic
    }
}
