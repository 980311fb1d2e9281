//! Built-in resource-utilization queries.
//!
//! Each template sums over the candidate's pods, skips the `istio-proxy`
//! sidecar, and requires a non-empty `image` label so pod-level cgroup
//! series without a container are not counted.

use std::fmt;

/// One of the six resource metrics collected for every candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceMetric {
    Cpu,
    Memory,
    DiskReadBytes,
    DiskWriteBytes,
    NetworkReadBytes,
    NetworkWriteBytes,
}

impl ResourceMetric {
    /// Enrichment order.
    pub const ALL: [ResourceMetric; 6] = [
        ResourceMetric::Cpu,
        ResourceMetric::Memory,
        ResourceMetric::DiskReadBytes,
        ResourceMetric::DiskWriteBytes,
        ResourceMetric::NetworkReadBytes,
        ResourceMetric::NetworkWriteBytes,
    ];

    /// Metric name in candidate data and in the exported `metric` label.
    pub fn key(self) -> &'static str {
        match self {
            ResourceMetric::Cpu => "cpu",
            ResourceMetric::Memory => "mem",
            ResourceMetric::DiskReadBytes => "diskreadbytes",
            ResourceMetric::DiskWriteBytes => "diskwritebytes",
            ResourceMetric::NetworkReadBytes => "networkreadbytes",
            ResourceMetric::NetworkWriteBytes => "networkwritebytes",
        }
    }

    pub fn template(self) -> &'static str {
        match self {
            ResourceMetric::Cpu => {
                r#"sum(rate(container_cpu_usage_seconds_total{pod=~"$podname.*", container!~"istio-proxy", namespace="$namespace", image=~".+"}[$interval]$offset_str))"#
            }
            ResourceMetric::Memory => {
                r#"sum(avg_over_time(container_memory_working_set_bytes{pod=~"$podname.*", container!~"istio-proxy", namespace="$namespace", image=~".+"}[$interval]$offset_str))"#
            }
            ResourceMetric::DiskReadBytes => {
                r#"sum(rate(container_fs_reads_bytes_total{pod=~"$podname.*", container!~"istio-proxy", namespace="$namespace", image=~".+"}[$interval]$offset_str))"#
            }
            ResourceMetric::DiskWriteBytes => {
                r#"sum(rate(container_fs_writes_bytes_total{pod=~"$podname.*", container!~"istio-proxy", namespace="$namespace", image=~".+"}[$interval]$offset_str))"#
            }
            ResourceMetric::NetworkReadBytes => {
                r#"sum(rate(container_network_receive_bytes_total{pod=~"$podname.*", container!~"istio-proxy", namespace="$namespace", image=~".+"}[$interval]$offset_str))"#
            }
            ResourceMetric::NetworkWriteBytes => {
                r#"sum(rate(container_network_transmit_bytes_total{pod=~"$podname.*", container!~"istio-proxy", namespace="$namespace", image=~".+"}[$interval]$offset_str))"#
            }
        }
    }
}

impl fmt::Display for ResourceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
