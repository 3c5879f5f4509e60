//! Multi-run collection scenarios against a shared cache.

use std::collections::BTreeSet;
use std::sync::Arc;

use grove_cache::{Cache, CacheOp, MemoryCache, SqliteCache};
use grove_connector::{
    Connector, FileOutput, LocalFileCollector, ManualClock, MemoryOutput, MockCollector,
    Processor, ProcessorError, SplitProcessor,
};
use grove_core::FieldPath;
use grove_types::{ConnectorIdentity, Entry, KeyPrefix, LogOrder};
use serde_json::json;

fn identity() -> ConnectorIdentity {
    ConnectorIdentity::new("mock", "tenant", "audit").unwrap()
}

fn ts() -> FieldPath {
    FieldPath::parse("ts").unwrap()
}

fn connector(cache: &MemoryCache, output: &MemoryOutput, collector: MockCollector) -> Connector {
    Connector::new("test", identity(), Arc::new(cache.clone()), Box::new(collector))
        .with_output(Arc::new(output.clone()))
        .with_clock(Arc::new(ManualClock::at(1_000)))
}

async fn stored(cache: &dyn Cache, prefix: KeyPrefix) -> Option<String> {
    let key = identity().key(prefix);
    cache.get(&key.pk, &key.sk).await.unwrap()
}

fn ids(entries: &[Entry]) -> Vec<i64> {
    entries.iter().map(|e| e["id"].as_i64().unwrap()).collect()
}

fn entry(id: i64, ts: i64) -> Entry {
    json!({"id": id, "ts": ts})
}

#[tokio::test]
async fn chronological_runs_deliver_each_entry_once() {
    let cache = MemoryCache::new();
    let output = MemoryOutput::new();

    let first = MockCollector::new(ts(), LogOrder::Chronological)
        .with_page(vec![entry(1, 10), entry(2, 11)])
        .with_page(vec![entry(3, 12)]);
    let summary = connector(&cache, &output, first).run().await.unwrap();
    assert_eq!(summary.pointer, "12");
    assert_eq!(
        stored(&cache, KeyPrefix::PointerPrevious).await.as_deref(),
        Some("11")
    );

    // Upstream filter is inclusive: the page repeats the entry at the pointer
    let second = MockCollector::new(ts(), LogOrder::Chronological)
        .with_pointer_trim()
        .with_page(vec![entry(3, 12), entry(4, 13)]);
    let mut second = connector(&cache, &output, second);
    let summary = second.run().await.unwrap();

    assert_eq!(summary.pointer, "13");
    assert_eq!(ids(&output.entries()), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn pointer_tracks_last_written_page() {
    let cache = MemoryCache::new();
    let output = MemoryOutput::new();

    // Fails on the third page, after two were written
    let collector = MockCollector::new(ts(), LogOrder::Chronological)
        .with_page(vec![entry(1, 10)])
        .with_page(vec![entry(2, 20)])
        .with_page(vec![entry(3, 30)])
        .fail_after(2);
    assert!(connector(&cache, &output, collector).run().await.is_err());

    assert_eq!(stored(&cache, KeyPrefix::Pointer).await.as_deref(), Some("20"));
    assert_eq!(ids(&output.entries()), vec![1, 2]);
}

#[tokio::test]
async fn same_timestamp_entries_are_deduplicated_across_runs() {
    let cache = MemoryCache::new();
    let output = MemoryOutput::new();

    let first = MockCollector::new(ts(), LogOrder::Chronological)
        .with_page(vec![entry(1, 1), entry(2, 2), entry(3, 2)]);
    connector(&cache, &output, first).run().await.unwrap();

    // Inclusive, second-granularity upstream: ids 2 and 3 come back alongside
    // a genuinely new entry at the same timestamp
    let page = vec![entry(2, 2), entry(3, 2), entry(4, 2), entry(5, 3)];
    let second = MockCollector::new(ts(), LogOrder::Chronological).with_page(page);
    connector(&cache, &output, second).run().await.unwrap();
    assert_eq!(ids(&output.entries()), vec![1, 2, 3, 4, 5]);

    // The next query starts at ts=3: id 5 repeats, id 6 is new
    let third = MockCollector::new(ts(), LogOrder::Chronological)
        .with_page(vec![entry(5, 3), entry(6, 3)]);
    let summary = connector(&cache, &output, third).run().await.unwrap();
    assert_eq!(summary.entries_written, 1);
    assert_eq!(ids(&output.entries()), vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn replaying_head_pointer_page_is_idempotent() {
    let cache = MemoryCache::new();
    let output = MemoryOutput::new();
    let page = vec![entry(1, 5), entry(2, 5)];

    for _ in 0..3 {
        let collector = MockCollector::new(ts(), LogOrder::Chronological).with_page(page.clone());
        connector(&cache, &output, collector).run().await.unwrap();
    }

    assert_eq!(ids(&output.entries()), vec![1, 2]);
}

#[tokio::test]
async fn interrupted_reverse_collection_resumes_without_gaps() {
    let cache = MemoryCache::new();
    let output = MemoryOutput::new();

    let history: Vec<Entry> = (1..=8).rev().map(|i| entry(i, i * 10)).collect();
    let pages = |entries: &[Entry]| -> Vec<Vec<Entry>> {
        entries.chunks(2).map(|c| c.to_vec()).collect()
    };

    // First run writes [80, 70] and [60, 50], then the upstream fails
    let mut first = MockCollector::new(ts(), LogOrder::ReverseChronological).fail_after(2);
    for page in pages(&history) {
        first = first.with_page(page);
    }
    assert!(connector(&cache, &output, first).run().await.is_err());

    assert_eq!(stored(&cache, KeyPrefix::Pointer).await, None);
    assert_eq!(stored(&cache, KeyPrefix::PointerNext).await.as_deref(), Some("80"));
    assert_eq!(stored(&cache, KeyPrefix::WindowStart).await.as_deref(), Some("80"));
    assert_eq!(stored(&cache, KeyPrefix::WindowEnd).await.as_deref(), Some("50"));

    // Meanwhile two newer entries arrived upstream
    let mut upstream: Vec<Entry> = vec![entry(10, 100), entry(9, 90)];
    upstream.extend(history.clone());

    let mut second = MockCollector::new(ts(), LogOrder::ReverseChronological);
    for page in pages(&upstream) {
        second = second.with_page(page);
    }
    let summary = connector(&cache, &output, second).run().await.unwrap();

    // The window's provisional pointer is committed, the window is gone
    assert_eq!(summary.pointer, "80");
    for prefix in [KeyPrefix::PointerNext, KeyPrefix::WindowStart, KeyPrefix::WindowEnd] {
        assert_eq!(stored(&cache, prefix).await, None);
    }

    // The next run picks up what arrived during the interruption
    let third = MockCollector::new(ts(), LogOrder::ReverseChronological)
        .with_pointer_trim()
        .with_page(vec![entry(10, 100), entry(9, 90), entry(8, 80)]);
    let summary = connector(&cache, &output, third).run().await.unwrap();
    assert_eq!(summary.pointer, "100");

    let delivered: BTreeSet<i64> = ids(&output.entries()).into_iter().collect();
    let expected: BTreeSet<i64> = (1..=10).collect();
    assert_eq!(delivered, expected);
}

#[tokio::test]
async fn inherited_window_that_never_bridges_is_reset() {
    let cache = MemoryCache::new();
    let output = MemoryOutput::new();

    let first = MockCollector::new(ts(), LogOrder::ReverseChronological)
        .with_page(vec![entry(4, 40), entry(3, 30)])
        .with_page(vec![entry(2, 20)])
        .fail_after(1);
    assert!(connector(&cache, &output, first).run().await.is_err());
    assert_eq!(stored(&cache, KeyPrefix::WindowEnd).await.as_deref(), Some("30"));

    // The resumed run never sees the window end
    let second = MockCollector::new(ts(), LogOrder::ReverseChronological)
        .with_page(vec![entry(6, 60), entry(5, 50)]);
    let summary = connector(&cache, &output, second).run().await.unwrap();

    assert_eq!(summary.entries_written, 0);
    assert_eq!(stored(&cache, KeyPrefix::Pointer).await, None);
    assert_eq!(stored(&cache, KeyPrefix::WindowStart).await, None);
}

#[tokio::test]
async fn failed_pointer_swap_keeps_window_for_next_run() {
    let cache = MemoryCache::new();
    let output = MemoryOutput::new();
    let page = vec![entry(2, 20), entry(1, 10)];

    // Collection succeeds, committing the provisional pointer does not
    cache.fail_next(CacheOp::Set, "pointer.");
    let first = MockCollector::new(ts(), LogOrder::ReverseChronological).with_page(page.clone());
    assert!(connector(&cache, &output, first).run().await.is_err());

    assert_eq!(stored(&cache, KeyPrefix::Pointer).await, None);
    assert_eq!(stored(&cache, KeyPrefix::WindowStart).await.as_deref(), Some("20"));
    assert_eq!(stored(&cache, KeyPrefix::WindowEnd).await.as_deref(), Some("10"));
    assert_eq!(stored(&cache, KeyPrefix::PointerNext).await.as_deref(), Some("20"));
    assert_eq!(stored(&cache, KeyPrefix::ExecutionLock).await, None);

    let second = MockCollector::new(ts(), LogOrder::ReverseChronological).with_page(page);
    let summary = connector(&cache, &output, second).run().await.unwrap();

    assert_eq!(summary.pointer, "20");
    assert_eq!(stored(&cache, KeyPrefix::Pointer).await.as_deref(), Some("20"));
    for prefix in [KeyPrefix::PointerNext, KeyPrefix::WindowStart, KeyPrefix::WindowEnd] {
        assert_eq!(stored(&cache, prefix).await, None);
    }
}

#[tokio::test]
async fn reverse_output_failure_on_first_page_stores_no_window() {
    let cache = MemoryCache::new();
    let output = MemoryOutput::new();
    output.fail_next_submit();

    let collector = MockCollector::new(ts(), LogOrder::ReverseChronological)
        .with_page(vec![entry(4, 40), entry(3, 30)])
        .with_page(vec![entry(2, 20), entry(1, 10)]);
    assert!(connector(&cache, &output, collector).run().await.is_err());

    assert!(output.entries().is_empty());
    for prefix in [
        KeyPrefix::Pointer,
        KeyPrefix::PointerNext,
        KeyPrefix::WindowStart,
        KeyPrefix::WindowEnd,
    ] {
        assert_eq!(stored(&cache, prefix).await, None);
    }
}

#[tokio::test]
async fn reverse_output_failure_keeps_window_end_at_last_written_page() {
    let cache = MemoryCache::new();
    let output = MemoryOutput::new();
    output.fail_submit_after(1);

    let collector = MockCollector::new(ts(), LogOrder::ReverseChronological)
        .with_page(vec![entry(4, 40), entry(3, 30)])
        .with_page(vec![entry(2, 20), entry(1, 10)]);
    assert!(connector(&cache, &output, collector).run().await.is_err());

    assert_eq!(ids(&output.entries()), vec![4, 3]);
    assert_eq!(stored(&cache, KeyPrefix::Pointer).await, None);
    assert_eq!(stored(&cache, KeyPrefix::PointerNext).await.as_deref(), Some("40"));
    assert_eq!(stored(&cache, KeyPrefix::WindowStart).await.as_deref(), Some("40"));
    assert_eq!(stored(&cache, KeyPrefix::WindowEnd).await.as_deref(), Some("30"));
}

#[tokio::test]
async fn window_ending_at_head_pointer_bridges_on_repeats() {
    let cache = MemoryCache::new();
    let output = MemoryOutput::new();

    // Every written entry shares the head pointer value
    let first = MockCollector::new(ts(), LogOrder::ReverseChronological)
        .with_page(vec![entry(2, 50), entry(1, 50)])
        .with_page(vec![entry(0, 40)])
        .fail_after(1);
    assert!(connector(&cache, &output, first).run().await.is_err());
    assert_eq!(stored(&cache, KeyPrefix::WindowEnd).await.as_deref(), Some("50"));

    // The bridging page holds nothing but known repeats
    let second = MockCollector::new(ts(), LogOrder::ReverseChronological)
        .with_page(vec![entry(3, 60), entry(2, 50), entry(1, 50)]);
    let summary = connector(&cache, &output, second).run().await.unwrap();

    assert_eq!(summary.entries_written, 0);
    assert_eq!(summary.pointer, "50");
    assert_eq!(stored(&cache, KeyPrefix::WindowStart).await, None);

    // Only the entry newer than the window is left to collect
    let third = MockCollector::new(ts(), LogOrder::ReverseChronological)
        .with_pointer_trim()
        .with_page(vec![entry(3, 60), entry(2, 50), entry(1, 50)]);
    let summary = connector(&cache, &output, third).run().await.unwrap();
    assert_eq!(summary.entries_written, 1);
    assert_eq!(summary.pointer, "60");
    assert_eq!(ids(&output.entries()), vec![2, 1, 3]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_runs_both_finish_and_release() {
    let cache = MemoryCache::new();
    let output = MemoryOutput::new();
    let pages = vec![
        vec![entry(1, 1), entry(2, 2)],
        vec![entry(3, 3)],
        vec![entry(4, 4)],
    ];

    let mut handles = Vec::new();
    for _ in 0..2 {
        let mut collector = MockCollector::new(ts(), LogOrder::Chronological);
        for page in &pages {
            collector = collector.with_page(page.clone());
        }
        let mut connector = connector(&cache, &output, collector);
        handles.push(tokio::spawn(async move { connector.run().await }));
    }

    // One of them may have run best-effort; neither fails
    let mut finals = Vec::new();
    for handle in handles {
        finals.push(handle.await.unwrap().unwrap().pointer);
    }

    // The pointer is whatever the last committed batch advanced it to
    let pointer = stored(&cache, KeyPrefix::Pointer).await.unwrap();
    assert!(finals.contains(&pointer), "{} not in {:?}", pointer, finals);
    assert_eq!(stored(&cache, KeyPrefix::ExecutionLock).await, None);
    let delivered: BTreeSet<i64> = ids(&output.entries()).into_iter().collect();
    assert_eq!(delivered, (1..=4).collect());
}

/// Keeps the entries at even positions of its input.
struct DropOdd {
    index: usize,
}

impl Processor for DropOdd {
    fn name(&self) -> &str {
        "drop_odd"
    }

    fn process(&mut self, entry: Entry) -> Result<Vec<Entry>, ProcessorError> {
        let keep = self.index % 2 == 0;
        self.index += 1;
        Ok(if keep { vec![entry] } else { Vec::new() })
    }

    fn finalize(&mut self) -> Result<(), ProcessorError> {
        self.index = 0;
        Ok(())
    }
}

#[tokio::test]
async fn split_then_drop_odd_yields_one_entry_per_record() {
    let cache = MemoryCache::new();
    let output = MemoryOutput::new();
    let collector = MockCollector::new(ts(), LogOrder::Chronological).with_page(vec![
        json!({"ts": 1, "events": ["a1", "a2"]}),
        json!({"ts": 2, "events": ["b1", "b2"]}),
        json!({"ts": 3, "events": ["c1", "c2"]}),
    ]);

    let mut connector = connector(&cache, &output, collector)
        .with_processor(Box::new(SplitProcessor::new(FieldPath::parse("events").unwrap())))
        .with_processor(Box::new(DropOdd { index: 0 }));
    let summary = connector.run().await.unwrap();

    assert_eq!(summary.entries_written, 3);
    let events: Vec<String> = output
        .entries()
        .iter()
        .map(|e| e["events"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(events, vec!["a1", "b1", "c1"]);
    // Bookkeeping follows the raw page, not the processed one
    assert_eq!(summary.pointer, "3");
}

#[tokio::test]
async fn local_file_to_file_output_over_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("audit.jsonl");
    let out = dir.path().join("out");
    let cache: Arc<dyn Cache> = Arc::new(SqliteCache::new(&dir.path().join("grove.db")).await.unwrap());

    let lines = |entries: &[Entry]| -> String {
        entries.iter().map(|e| format!("{}\n", e)).collect()
    };
    let ts_entry = |id: i64, ts: &str| json!({"id": id, "ts": ts});

    std::fs::write(
        &log,
        lines(&[
            ts_entry(2, "2024-01-01T00:00:02Z"),
            ts_entry(1, "2024-01-01T00:00:01Z"),
            ts_entry(3, "2024-01-01T00:00:03Z"),
        ]),
    )
    .unwrap();

    let make = |cache: Arc<dyn Cache>| {
        let collector = LocalFileCollector::new(&log, ts(), LogOrder::Chronological).with_page_size(2);
        Connector::new("audit", identity(), cache, Box::new(collector))
            .with_output(Arc::new(FileOutput::new(&out)))
    };

    let summary = make(cache.clone()).run().await.unwrap();
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.pointer, "2024-01-01T00:00:03Z");

    let part0 = out
        .join("mock")
        .join("audit")
        .join(format!("{}.0.jsonl", summary.descriptor));
    let first: Vec<Entry> = std::fs::read_to_string(&part0)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(ids(&first), vec![1, 2]);
    assert_eq!(first[0]["_grove"]["pointer"], "2024-01-01T00:00:02Z");

    // Append one entry; only it is delivered next time
    let mut content = std::fs::read_to_string(&log).unwrap();
    content.push_str(&lines(&[ts_entry(4, "2024-01-01T00:00:04Z")]));
    std::fs::write(&log, content).unwrap();

    let summary = make(cache.clone()).run().await.unwrap();
    assert_eq!(summary.entries_written, 1);
    assert_eq!(summary.pointer, "2024-01-01T00:00:04Z");
}
