//! Worker configuration
//!
//! Every knob has an environment override so deployments can tune a worker
//! without rebuilding it.

use std::env;
use std::thread;

/// Default time to wait for each chained call's result.
const DEFAULT_CHAINED_TIMEOUT_MS: u64 = 30_000;

/// Default device selector for fresh modules: one local device.
const DEFAULT_DEVICE: i32 = 1;

/// System-wide configuration shared by all modules on a worker.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// Team size used when the guest never requested one. Defaults to the
    /// host's available parallelism.
    pub default_team_size: i32,

    /// Per-child timeout for distributed fork joins, in milliseconds.
    pub chained_call_timeout_ms: u64,

    /// Device selector installed on root levels (>= 0 local, < 0 distributed).
    pub default_device: i32,

    /// Name this worker reports in fork log lines.
    pub endpoint_host: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            default_team_size: host_parallelism(),
            chained_call_timeout_ms: DEFAULT_CHAINED_TIMEOUT_MS,
            default_device: DEFAULT_DEVICE,
            endpoint_host: "localhost".to_string(),
        }
    }
}

impl SystemConfig {
    /// Build a configuration using environment hints.
    ///
    /// # Environment Variables
    ///
    /// - `FAASMP_NUM_THREADS` - default team size (positive integer)
    /// - `FAASMP_CHAINED_TIMEOUT_MS` - distributed join timeout per child
    /// - `FAASMP_DEFAULT_DEVICE` - device selector for root levels
    /// - `FAASMP_ENDPOINT_HOST` - name this worker logs for itself
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(threads) = env::var("FAASMP_NUM_THREADS") {
            match threads.parse::<i32>() {
                Ok(n) if n > 0 => config.default_team_size = n,
                _ => tracing::warn!(value = %threads, "ignoring invalid FAASMP_NUM_THREADS"),
            }
        }

        if let Ok(timeout) = env::var("FAASMP_CHAINED_TIMEOUT_MS") {
            match timeout.parse::<u64>() {
                Ok(ms) if ms > 0 => config.chained_call_timeout_ms = ms,
                _ => tracing::warn!(value = %timeout, "ignoring invalid FAASMP_CHAINED_TIMEOUT_MS"),
            }
        }

        if let Ok(device) = env::var("FAASMP_DEFAULT_DEVICE") {
            match device.parse::<i32>() {
                Ok(d) if d.abs() <= 1 => config.default_device = d,
                _ => tracing::warn!(value = %device, "ignoring invalid FAASMP_DEFAULT_DEVICE"),
            }
        }

        if let Ok(host) = env::var("FAASMP_ENDPOINT_HOST") {
            if !host.trim().is_empty() {
                config.endpoint_host = host;
            }
        }

        config
    }
}

/// Number of hardware threads the host exposes, floored at one.
pub fn host_parallelism() -> i32 {
    thread::available_parallelism().map(|n| n.get() as i32).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serialize environment mutation across tests.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn reset_env() {
        for key in [
            "FAASMP_NUM_THREADS",
            "FAASMP_CHAINED_TIMEOUT_MS",
            "FAASMP_DEFAULT_DEVICE",
            "FAASMP_ENDPOINT_HOST",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn defaults_are_sane() {
        let _guard = ENV_LOCK.lock().unwrap();
        reset_env();
        let config = SystemConfig::from_env();
        assert!(config.default_team_size >= 1);
        assert_eq!(config.chained_call_timeout_ms, DEFAULT_CHAINED_TIMEOUT_MS);
        assert_eq!(config.default_device, DEFAULT_DEVICE);
    }

    #[test]
    fn env_overrides_apply() {
        let _guard = ENV_LOCK.lock().unwrap();
        reset_env();
        env::set_var("FAASMP_NUM_THREADS", "6");
        env::set_var("FAASMP_CHAINED_TIMEOUT_MS", "1500");
        env::set_var("FAASMP_DEFAULT_DEVICE", "-1");
        env::set_var("FAASMP_ENDPOINT_HOST", "worker-a");

        let config = SystemConfig::from_env();
        assert_eq!(config.default_team_size, 6);
        assert_eq!(config.chained_call_timeout_ms, 1500);
        assert_eq!(config.default_device, -1);
        assert_eq!(config.endpoint_host, "worker-a");

        reset_env();
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let _guard = ENV_LOCK.lock().unwrap();
        reset_env();
        env::set_var("FAASMP_NUM_THREADS", "-3");
        env::set_var("FAASMP_DEFAULT_DEVICE", "7");

        let config = SystemConfig::from_env();
        assert!(config.default_team_size >= 1);
        assert_eq!(config.default_device, DEFAULT_DEVICE);

        reset_env();
    }
}
