//! Differential compatibility suite run hermetically: a second in-memory
//! engine stands in as the reference endpoint, so the dual-client scenarios
//! run without an external server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use stream_compat::endpoint::{Cursor, ReadOptions, StreamEndpoint};
use stream_compat::memory::MemoryEndpoint;
use stream_compat::store::EntryId;
use stream_compat::verifier::{compare_read_results, Verifier};

use common::{sensor_batches, sensor_fields};

fn memory_verifier() -> Verifier {
    Verifier::new(
        Arc::new(MemoryEndpoint::new("reference")),
        Arc::new(MemoryEndpoint::new("candidate")),
    )
}

#[tokio::test]
async fn test_add_and_read_values() {
    let mut verifier = memory_verifier();

    let (reference_id, candidate_id) = verifier
        .add_both("mystream", "*", &sensor_fields())
        .await
        .unwrap();

    assert_eq!(reference_id.split('-').count(), 2);
    assert_eq!(candidate_id.split('-').count(), 2);

    let options = ReadOptions::new().count(1).stream("mystream", Cursor::Start);
    let (reference_result, candidate_result) = verifier
        .read_both("XREAD COUNT 1 STREAMS mystream 0", &options, &options)
        .await
        .unwrap();

    assert_eq!(reference_result.len(), 1);
    assert_eq!(candidate_result.len(), 1);

    let (stream, entries) = &candidate_result[0];
    assert_eq!(stream, "mystream");
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].fields.get("sensor-id"),
        Some(&"1234".to_string())
    );
    assert_eq!(
        entries[0].fields.get("temperature"),
        Some(&"19.8".to_string())
    );

    assert!(verifier.all_passed());
}

#[tokio::test]
async fn test_add_and_read_values_since_id() {
    let mut verifier = memory_verifier();

    let mut reference_ids = Vec::new();
    let mut candidate_ids = Vec::new();

    for batch in sensor_batches() {
        let (reference_id, candidate_id) =
            verifier.add_both("mystream", "*", &batch).await.unwrap();
        reference_ids.push(reference_id);
        candidate_ids.push(candidate_id);
    }

    // IDs on each endpoint strictly increase in (timestamp, sequence) order.
    for ids in [&reference_ids, &candidate_ids] {
        let parsed = ids
            .iter()
            .map(|id| EntryId::parse(id).unwrap())
            .collect::<Vec<EntryId>>();

        for pair in parsed.windows(2) {
            assert!(pair[1] > pair[0], "{} should be greater than {}", pair[1], pair[0]);
        }
    }

    let reference_cursor = Cursor::At(EntryId::parse(&reference_ids[1]).unwrap());
    let candidate_cursor = Cursor::At(EntryId::parse(&candidate_ids[1]).unwrap());

    let (_, candidate_result) = verifier
        .read_both(
            "XREAD STREAMS mystream <second ID>",
            &ReadOptions::new().stream("mystream", reference_cursor),
            &ReadOptions::new().stream("mystream", candidate_cursor),
        )
        .await
        .unwrap();

    // The third and fourth entries remain past the second ID.
    let (_, entries) = &candidate_result[0];
    assert_eq!(entries.len(), 2);
    assert_eq!(
        entries[0].fields.get("sensor-id"),
        Some(&"1423".to_string())
    );
    assert_eq!(
        entries[1].fields.get("sensor-id"),
        Some(&"2314".to_string())
    );

    let (_, capped_result) = verifier
        .read_both(
            "XREAD COUNT 2 STREAMS mystream <second ID>",
            &ReadOptions::new().count(2).stream("mystream", reference_cursor),
            &ReadOptions::new().count(2).stream("mystream", candidate_cursor),
        )
        .await
        .unwrap();

    assert_eq!(capped_result[0].1.len(), 2);

    assert!(verifier.all_passed());
}

#[tokio::test]
async fn test_blocking_reads_resolve_when_data_becomes_available() {
    let reference: Arc<MemoryEndpoint> = Arc::new(MemoryEndpoint::new("reference"));
    let candidate: Arc<MemoryEndpoint> = Arc::new(MemoryEndpoint::new("candidate"));

    let options = ReadOptions::new()
        .block(0)
        .stream("mystream", Cursor::Latest);

    let reference_reader = Arc::clone(&reference);
    let reference_options = options.clone();
    let reference_task =
        tokio::spawn(async move { reference_reader.read(&reference_options).await });

    let candidate_reader = Arc::clone(&candidate);
    let candidate_options = options.clone();
    let candidate_task =
        tokio::spawn(async move { candidate_reader.read(&candidate_options).await });

    // Give both readers time to reach their suspension points.
    tokio::time::sleep(Duration::from_millis(100)).await;

    for endpoint in [&reference, &candidate] {
        let id = endpoint
            .add("mystream", "*", &sensor_fields())
            .await
            .unwrap();
        assert_eq!(id.split('-').count(), 2);
    }

    let reference_result = tokio::time::timeout(Duration::from_secs(3), reference_task)
        .await
        .expect("reference read should resolve after the add")
        .unwrap()
        .unwrap();
    let candidate_result = tokio::time::timeout(Duration::from_secs(3), candidate_task)
        .await
        .expect("candidate read should resolve after the add")
        .unwrap()
        .unwrap();

    // Each blocked read returns exactly the newly added entry.
    for result in [&reference_result, &candidate_result] {
        assert_eq!(result.len(), 1);
        let (stream, entries) = &result[0];
        assert_eq!(stream, "mystream");
        assert_eq!(entries.len(), 1);
    }

    let comparison = compare_read_results(
        "XREAD BLOCK 0 STREAMS mystream $",
        &reference_result,
        &candidate_result,
    );
    assert!(comparison.passed, "differences: {:?}", comparison.differences);
}

#[tokio::test]
async fn test_blocking_read_times_out_empty_on_both_endpoints() {
    let mut verifier = memory_verifier();

    let options = ReadOptions::new()
        .block(100)
        .stream("mystream", Cursor::Latest);

    let (reference_result, candidate_result) = verifier
        .read_both("XREAD BLOCK 100 STREAMS mystream $", &options, &options)
        .await
        .unwrap();

    assert!(reference_result.is_empty());
    assert!(candidate_result.is_empty());
    assert!(verifier.all_passed());
}

#[tokio::test]
async fn test_count_caps_entries_per_stream() {
    let endpoint = MemoryEndpoint::new("candidate");

    for batch in sensor_batches() {
        endpoint.add("mystream", "*", &batch).await.unwrap();
    }

    {
        let store = endpoint.store();
        let store_guard = store.lock().await;
        assert_eq!(store_guard.len("mystream"), 4);
    }

    let capped = endpoint
        .read(&ReadOptions::new().count(2).stream("mystream", Cursor::Start))
        .await
        .unwrap();

    assert_eq!(capped[0].1.len(), 2);
    assert_eq!(
        capped[0].1[0].fields.get("sensor-id"),
        Some(&"1234".to_string())
    );
    assert_eq!(
        capped[0].1[1].fields.get("sensor-id"),
        Some(&"4321".to_string())
    );
}

#[tokio::test]
async fn test_full_suite_passes_against_equivalent_engine() {
    let mut verifier = memory_verifier();

    verifier.run_suite(2000).await.unwrap();

    assert!(!verifier.results.is_empty());
    assert!(verifier.all_passed());
}
