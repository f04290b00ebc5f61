//! Helpers shared by the integration suites.

/// The sensor entry used by the single-entry scenarios.
pub fn sensor_fields() -> Vec<(&'static str, &'static str)> {
    vec![("sensor-id", "1234"), ("temperature", "19.8")]
}

/// Four entries added in sequence by the read-since-ID scenarios.
pub fn sensor_batches() -> Vec<Vec<(&'static str, &'static str)>> {
    vec![
        vec![("sensor-id", "1234"), ("temperature", "19.8")],
        vec![("sensor-id", "4321"), ("temperature", "18.9")],
        vec![("sensor-id", "1423"), ("temperature", "28.9")],
        vec![("sensor-id", "2314"), ("temperature", "19.89")],
    ]
}
