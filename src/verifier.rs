//! The differential command verifier.
//!
//! Drives a reference endpoint and a candidate endpoint through identical
//! stream-command sequences and records structural comparisons of the
//! results. Entry IDs are never compared for equality across endpoints
//! (wall clocks differ); they are checked for well-formedness and the
//! content around them is compared position by position.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::endpoint::{Cursor, EndpointError, ReadOptions, StreamEndpoint};
use crate::store::{EntryId, ReadResult};

/// What kind of mismatch a difference describes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiffCategory {
    StreamCount,
    StreamName,
    EntryCount,
    IdFormat,
    FieldCount,
    FieldName,
    FieldValue,
}

impl std::fmt::Display for DiffCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffCategory::StreamCount => write!(f, "STREAM-COUNT"),
            DiffCategory::StreamName => write!(f, "STREAM-NAME"),
            DiffCategory::EntryCount => write!(f, "ENTRY-COUNT"),
            DiffCategory::IdFormat => write!(f, "ID-FORMAT"),
            DiffCategory::FieldCount => write!(f, "FIELD-COUNT"),
            DiffCategory::FieldName => write!(f, "FIELD-NAME"),
            DiffCategory::FieldValue => write!(f, "FIELD-VALUE"),
        }
    }
}

/// A single mismatch between the two sides of a comparison.
///
/// For differential checks `expected` holds the reference endpoint's value
/// and `actual` the candidate's; for content checks `expected` holds the
/// scenario's literal expectation.
#[derive(Debug, Clone, PartialEq)]
pub struct Difference {
    pub category: DiffCategory,
    pub path: String,
    pub expected: String,
    pub actual: String,
}

/// Result of one comparison step.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonResult {
    pub operation: String,
    pub passed: bool,
    pub differences: Vec<Difference>,
}

impl ComparisonResult {
    pub fn print_summary(&self) {
        if self.passed {
            println!("PASS  {}", self.operation);
        } else {
            println!(
                "FAIL  {} ({} differences)",
                self.operation,
                self.differences.len()
            );

            for difference in &self.differences {
                println!(
                    "      [{}] {}: expected={} actual={}",
                    difference.category, difference.path, difference.expected, difference.actual
                );
            }
        }
    }
}

/// Checks that an ID returned by an add is a string with exactly one
/// delimiter producing two numeric parts.
pub fn check_id_shape(id: &str) -> Result<(), String> {
    EntryId::parse(id).map(|_| ())
}

/// Structurally compares two read results.
///
/// Equivalence means: same stream names in the same order, same entry count
/// per stream, and identical field/value content per entry position. Entry
/// IDs were already validated for shape when each result was decoded.
pub fn compare_read_results(
    operation: &str,
    reference: &ReadResult,
    candidate: &ReadResult,
) -> ComparisonResult {
    let mut differences = Vec::new();

    if reference.len() != candidate.len() {
        differences.push(Difference {
            category: DiffCategory::StreamCount,
            path: "streams.length".to_string(),
            expected: reference.len().to_string(),
            actual: candidate.len().to_string(),
        });
    }

    for (stream_index, ((reference_key, reference_entries), (candidate_key, candidate_entries))) in
        reference.iter().zip(candidate.iter()).enumerate()
    {
        let stream_path = format!("streams[{}]", stream_index);

        if reference_key != candidate_key {
            differences.push(Difference {
                category: DiffCategory::StreamName,
                path: format!("{}.name", stream_path),
                expected: reference_key.clone(),
                actual: candidate_key.clone(),
            });
        }

        if reference_entries.len() != candidate_entries.len() {
            differences.push(Difference {
                category: DiffCategory::EntryCount,
                path: format!("{}.entries.length", stream_path),
                expected: reference_entries.len().to_string(),
                actual: candidate_entries.len().to_string(),
            });
        }

        for (entry_index, (reference_entry, candidate_entry)) in reference_entries
            .iter()
            .zip(candidate_entries.iter())
            .enumerate()
        {
            let entry_path = format!("{}.entries[{}]", stream_path, entry_index);

            if reference_entry.fields.len() != candidate_entry.fields.len() {
                differences.push(Difference {
                    category: DiffCategory::FieldCount,
                    path: format!("{}.fields.length", entry_path),
                    expected: reference_entry.fields.len().to_string(),
                    actual: candidate_entry.fields.len().to_string(),
                });
            }

            for (field_index, ((reference_field, reference_value), (candidate_field, candidate_value))) in
                reference_entry
                    .fields
                    .iter()
                    .zip(candidate_entry.fields.iter())
                    .enumerate()
            {
                let field_path = format!("{}.fields[{}]", entry_path, field_index);

                if reference_field != candidate_field {
                    differences.push(Difference {
                        category: DiffCategory::FieldName,
                        path: field_path.clone(),
                        expected: reference_field.clone(),
                        actual: candidate_field.clone(),
                    });
                } else if reference_value != candidate_value {
                    differences.push(Difference {
                        category: DiffCategory::FieldValue,
                        path: format!("{}.{}", field_path, reference_field),
                        expected: reference_value.clone(),
                        actual: candidate_value.clone(),
                    });
                }
            }
        }
    }

    ComparisonResult {
        operation: operation.to_string(),
        passed: differences.is_empty(),
        differences,
    }
}

/// Checks a read result against literal expected content: exactly one
/// stream named `key` whose entries match `expected` position by position.
pub fn expect_entries(
    operation: &str,
    result: &ReadResult,
    key: &str,
    expected: &[&[(&str, &str)]],
) -> ComparisonResult {
    let mut differences = Vec::new();

    match result.len() {
        1 => {}
        n => differences.push(Difference {
            category: DiffCategory::StreamCount,
            path: "streams.length".to_string(),
            expected: "1".to_string(),
            actual: n.to_string(),
        }),
    }

    if let Some((actual_key, entries)) = result.first() {
        if actual_key != key {
            differences.push(Difference {
                category: DiffCategory::StreamName,
                path: "streams[0].name".to_string(),
                expected: key.to_string(),
                actual: actual_key.clone(),
            });
        }

        if entries.len() != expected.len() {
            differences.push(Difference {
                category: DiffCategory::EntryCount,
                path: "streams[0].entries.length".to_string(),
                expected: expected.len().to_string(),
                actual: entries.len().to_string(),
            });
        }

        for (entry_index, (entry, expected_fields)) in
            entries.iter().zip(expected.iter()).enumerate()
        {
            let entry_path = format!("streams[0].entries[{}]", entry_index);

            if entry.fields.len() != expected_fields.len() {
                differences.push(Difference {
                    category: DiffCategory::FieldCount,
                    path: format!("{}.fields.length", entry_path),
                    expected: expected_fields.len().to_string(),
                    actual: entry.fields.len().to_string(),
                });
            }

            for (field_index, ((actual_field, actual_value), (expected_field, expected_value))) in
                entry.fields.iter().zip(expected_fields.iter()).enumerate()
            {
                let field_path = format!("{}.fields[{}]", entry_path, field_index);

                if actual_field.as_str() != *expected_field {
                    differences.push(Difference {
                        category: DiffCategory::FieldName,
                        path: field_path,
                        expected: expected_field.to_string(),
                        actual: actual_field.clone(),
                    });
                } else if actual_value.as_str() != *expected_value {
                    differences.push(Difference {
                        category: DiffCategory::FieldValue,
                        path: format!("{}.{}", field_path, expected_field),
                        expected: expected_value.to_string(),
                        actual: actual_value.clone(),
                    });
                }
            }
        }
    }

    ComparisonResult {
        operation: operation.to_string(),
        passed: differences.is_empty(),
        differences,
    }
}

/// Drives both endpoints and accumulates comparison results.
pub struct Verifier {
    reference: Arc<dyn StreamEndpoint>,
    candidate: Arc<dyn StreamEndpoint>,
    pub results: Vec<ComparisonResult>,
}

impl Verifier {
    pub fn new(reference: Arc<dyn StreamEndpoint>, candidate: Arc<dyn StreamEndpoint>) -> Self {
        Verifier {
            reference,
            candidate,
            results: Vec::new(),
        }
    }

    fn record(&mut self, result: ComparisonResult) {
        if result.passed {
            tracing::info!(operation = %result.operation, "comparison passed");
        } else {
            tracing::warn!(
                operation = %result.operation,
                differences = result.differences.len(),
                "comparison failed"
            );
        }

        self.results.push(result);
    }

    /// Issues the same add to both endpoints concurrently and checks that
    /// each returned ID is well-formed. The IDs themselves may differ.
    pub async fn add_both(
        &mut self,
        key: &str,
        id_spec: &str,
        fields: &[(&str, &str)],
    ) -> Result<(String, String), EndpointError> {
        let (reference_id, candidate_id) = tokio::join!(
            self.reference.add(key, id_spec, fields),
            self.candidate.add(key, id_spec, fields),
        );
        let (reference_id, candidate_id) = (reference_id?, candidate_id?);

        let mut differences = Vec::new();

        if let Err(e) = check_id_shape(&reference_id) {
            differences.push(Difference {
                category: DiffCategory::IdFormat,
                path: format!("{}.id", self.reference.name()),
                expected: e,
                actual: reference_id.clone(),
            });
        }

        if let Err(e) = check_id_shape(&candidate_id) {
            differences.push(Difference {
                category: DiffCategory::IdFormat,
                path: format!("{}.id", self.candidate.name()),
                expected: e,
                actual: candidate_id.clone(),
            });
        }

        self.record(ComparisonResult {
            operation: format!("XADD {}", key),
            passed: differences.is_empty(),
            differences,
        });

        Ok((reference_id, candidate_id))
    }

    /// Issues a read to both endpoints concurrently and compares the
    /// results. The options may differ per endpoint, because literal
    /// cursors come from each endpoint's own add replies.
    pub async fn read_both(
        &mut self,
        operation: &str,
        reference_options: &ReadOptions,
        candidate_options: &ReadOptions,
    ) -> Result<(ReadResult, ReadResult), EndpointError> {
        let (reference_result, candidate_result) = tokio::join!(
            self.reference.read(reference_options),
            self.candidate.read(candidate_options),
        );
        let (reference_result, candidate_result) = (reference_result?, candidate_result?);

        let comparison = compare_read_results(operation, &reference_result, &candidate_result);
        self.record(comparison);

        Ok((reference_result, candidate_result))
    }

    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|result| result.passed)
    }

    pub fn print_summary(&self) {
        println!("=== comparison summary ===");
        println!("reference: {}", self.reference.name());
        println!("candidate: {}", self.candidate.name());

        for result in &self.results {
            result.print_summary();
        }

        let passed = self.results.iter().filter(|result| result.passed).count();
        println!("{}/{} comparisons passed", passed, self.results.len());
    }

    /// Runs the built-in scenarios. `block_ms` bounds the blocking-read
    /// scenario; `0` waits indefinitely.
    pub async fn run_suite(&mut self, block_ms: u64) -> Result<(), EndpointError> {
        self.verify_add_and_read().await?;
        self.verify_read_since_id().await?;
        self.verify_blocking_read(block_ms).await?;

        Ok(())
    }

    /// Add one entry, then read it back capped at one entry.
    async fn verify_add_and_read(&mut self) -> Result<(), EndpointError> {
        let key = unique_key("mystream");
        tracing::info!(key = %key, "scenario: add and read");

        let fields = [("sensor-id", "1234"), ("temperature", "19.8")];
        self.add_both(&key, "*", &fields).await?;

        let options = ReadOptions::new().count(1).stream(&key, Cursor::Start);
        let (reference_result, candidate_result) = self
            .read_both(
                &format!("XREAD COUNT 1 STREAMS {} 0", key),
                &options,
                &options,
            )
            .await?;

        for (endpoint_name, result) in [
            (self.reference.name().to_string(), &reference_result),
            (self.candidate.name().to_string(), &candidate_result),
        ] {
            let check = expect_entries(
                &format!("{} content after XADD {}", endpoint_name, key),
                result,
                &key,
                &[&fields],
            );
            self.record(check);
        }

        Ok(())
    }

    /// Add four entries, then read everything after the second one, with
    /// and without a COUNT cap.
    async fn verify_read_since_id(&mut self) -> Result<(), EndpointError> {
        let key = unique_key("mystream-since");
        tracing::info!(key = %key, "scenario: read since ID");

        let batches: [&[(&str, &str)]; 4] = [
            &[("sensor-id", "1234"), ("temperature", "19.8")],
            &[("sensor-id", "4321"), ("temperature", "18.9")],
            &[("sensor-id", "1423"), ("temperature", "28.9")],
            &[("sensor-id", "2314"), ("temperature", "19.89")],
        ];

        let mut reference_ids = Vec::with_capacity(batches.len());
        let mut candidate_ids = Vec::with_capacity(batches.len());

        for fields in batches {
            let (reference_id, candidate_id) = self.add_both(&key, "*", fields).await?;
            reference_ids.push(reference_id);
            candidate_ids.push(candidate_id);
        }

        let reference_cursor = parse_cursor(&reference_ids[1])?;
        let candidate_cursor = parse_cursor(&candidate_ids[1])?;

        let (_, candidate_result) = self
            .read_both(
                &format!("XREAD STREAMS {} <second ID>", key),
                &ReadOptions::new().stream(&key, reference_cursor),
                &ReadOptions::new().stream(&key, candidate_cursor),
            )
            .await?;

        // Entries three and four remain past the second ID.
        let check = expect_entries(
            &format!("{} content past second ID", self.candidate.name()),
            &candidate_result,
            &key,
            &[batches[2], batches[3]],
        );
        self.record(check);

        self.read_both(
            &format!("XREAD COUNT 2 STREAMS {} <second ID>", key),
            &ReadOptions::new().count(2).stream(&key, reference_cursor),
            &ReadOptions::new().count(2).stream(&key, candidate_cursor),
        )
        .await?;

        Ok(())
    }

    /// Start a blocking read on each endpoint, then add an entry, then join
    /// on both reads. The adds must unblock both reads before the barrier
    /// resolves, each read returning exactly the new entry.
    async fn verify_blocking_read(&mut self, block_ms: u64) -> Result<(), EndpointError> {
        let key = unique_key("mystream-block");
        tracing::info!(key = %key, block_ms, "scenario: blocking read");

        let options = ReadOptions::new()
            .block(block_ms)
            .stream(&key, Cursor::Latest);

        let reference = Arc::clone(&self.reference);
        let reference_options = options.clone();
        let reference_task =
            tokio::spawn(async move { reference.read(&reference_options).await });

        let candidate = Arc::clone(&self.candidate);
        let candidate_options = options.clone();
        let candidate_task =
            tokio::spawn(async move { candidate.read(&candidate_options).await });

        // Give both reads time to reach their suspension points.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let fields = [("sensor-id", "1234"), ("temperature", "19.8")];
        self.add_both(&key, "*", &fields).await?;

        let (reference_result, candidate_result) = tokio::join!(reference_task, candidate_task);
        let reference_result = reference_result
            .map_err(|e| EndpointError::Io(format!("reference reader task failed: {}", e)))??;
        let candidate_result = candidate_result
            .map_err(|e| EndpointError::Io(format!("candidate reader task failed: {}", e)))??;

        let operation = format!("XREAD BLOCK {} STREAMS {} $", block_ms, key);
        let comparison = compare_read_results(&operation, &reference_result, &candidate_result);
        self.record(comparison);

        for (endpoint_name, result) in [
            (self.reference.name().to_string(), &reference_result),
            (self.candidate.name().to_string(), &candidate_result),
        ] {
            let check = expect_entries(
                &format!("{} blocked read content", endpoint_name),
                result,
                &key,
                &[&fields],
            );
            self.record(check);
        }

        Ok(())
    }
}

fn parse_cursor(id: &str) -> Result<Cursor, EndpointError> {
    let parsed = EntryId::parse(id)
        .map_err(|e| EndpointError::Protocol(format!("entry ID '{}': {}", id, e)))?;

    Ok(Cursor::At(parsed))
}

/// A stream name unlikely to collide with leftover state on a long-lived
/// reference server.
fn unique_key(base: &str) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let ms = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0);

    format!("{}-{}-{}", base, ms, COUNTER.fetch_add(1, Ordering::Relaxed))
}
