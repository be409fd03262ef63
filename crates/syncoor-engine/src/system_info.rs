use sysinfo::System;
use syncoor_domain::SystemInfo;

/// Best-effort host metadata collector. Failures are swallowed by callers —
/// a missing `SystemInfo` in the report is acceptable, a crashed run is not.
pub trait SystemInfoCollector: Send + Sync {
    fn collect(&self) -> Option<SystemInfo>;
}

/// Collects from the machine the engine is actually running on via `sysinfo`.
#[derive(Default)]
pub struct HostSystemInfoCollector;

impl SystemInfoCollector for HostSystemInfoCollector {
    fn collect(&self) -> Option<SystemInfo> {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        Some(SystemInfo {
            hostname: System::host_name().unwrap_or_default(),
            os: System::long_os_version().or_else(System::name).unwrap_or_default(),
            arch: std::env::consts::ARCH.to_string(),
            cpu_cores: sys.cpus().len(),
            total_memory_bytes: sys.total_memory(),
        })
    }
}
