//! Power Probe: runs the configured power-status command template against
//! every host via the Bounded Runner, classifying output into power state.

use crate::bounded_runner::run_all;
use crate::command_template::render;
use crate::process_runner;
use clusterprobe_core::{Host, HostStatus, ProbeStatusMap};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Classify a single power-status command's combined output.
///
/// Matching is case-insensitive and newline-flattened, checked in order:
/// "fail"/"error" beats the markers, so a command that both errored and
/// happened to echo a marker string still reports `Unknown`.
fn classify(output: &str, power_on_marker: &str, power_off_marker: &str) -> HostStatus {
    let flat = output.to_lowercase().replace(['\n', '\r'], " ");

    if flat.contains("fail") || flat.contains("error") {
        HostStatus::Unknown
    } else if flat.contains(&power_on_marker.to_lowercase()) {
        HostStatus::On
    } else if flat.contains(&power_off_marker.to_lowercase()) {
        HostStatus::Off
    } else {
        HostStatus::Unknown
    }
}

/// Parameters for a single power probe cycle, grouped so `run` takes one
/// options value instead of a long parameter list.
pub struct PowerProbeOptions<'a> {
    pub template: &'a str,
    pub power_on_marker: &'a str,
    pub power_off_marker: &'a str,
    pub timeout: Duration,
    pub concurrency: usize,
    pub retries: u32,
}

/// Run the power-status template against every host, classify the output,
/// and write the results into `map`: every classification into the scratch
/// map, and only `Off` into the authoritative map.
pub async fn run(map: &ProbeStatusMap, hosts: &[Host], options: &PowerProbeOptions<'_>) {
    if hosts.is_empty() {
        return;
    }

    let template = options.template.to_string();
    let timeout = options.timeout;
    let results = run_all(
        hosts.to_vec(),
        options.concurrency,
        options.retries,
        move |host: Host| {
            let template = template.clone();
            async move {
                let argv = render(&template, &host.hostname)?;
                process_runner::run(&argv, timeout).await
            }
        },
    )
    .await;

    let mut classifications = HashMap::with_capacity(results.len());
    for (host, result) in results {
        let status = match result {
            Ok(output) => classify(&output, options.power_on_marker, options.power_off_marker),
            Err(e) => {
                debug!(host = %host.hostname, error = %e, "power probe failed for host");
                HostStatus::Unknown
            }
        };
        classifications.insert(host.hostname, status);
    }

    let on: Vec<_> = classifications
        .iter()
        .filter(|(_, s)| **s == HostStatus::On)
        .map(|(h, _)| h.as_str())
        .collect();
    let off: Vec<_> = classifications
        .iter()
        .filter(|(_, s)| **s == HostStatus::Off)
        .map(|(h, _)| h.as_str())
        .collect();
    debug!(on = ?on, off = ?off, "power probe: classified hosts");

    map.apply(&classifications, |status| status == HostStatus::Off);
}
