use anyhow::Result;
use chrono::{TimeZone, Utc};
use jmeter_sla_report::{
    AggregationEngine, IngestRunner, Record, RecordBuilder, ReportConfig, UNIT_EXCEPTION, UNIT_MS,
};
use std::convert::Infallible;
use std::fs;
use tempfile::TempDir;

fn records() -> Vec<Record> {
    (0..200u64)
        .map(|i| {
            let label = ["Home", "Search", "Login", "Checkout"][(i % 4) as usize];
            let timestamp = Utc.timestamp_millis_opt(1_000_000 + (i as i64 * 37) % 5_000).unwrap();
            let builder = RecordBuilder::new(label, timestamp, (i * 53) % 25_000)
                .bytes_received(Some(i * 100));
            if i % 9 == 0 {
                builder
                    .success(false)
                    .result_code(format!("{}", 500 + i % 3))
                    .response_message(format!("failure #{}", i))
                    .build()
            } else {
                builder.build()
            }
        })
        .collect()
}

fn aggregate(records: &[Record]) -> AggregationEngine {
    AggregationEngine::aggregate_source(records.iter().cloned().map(Ok::<_, Infallible>))
        .unwrap()
}

/// Merging engines built from consecutive chunks equals one pass over everything.
#[test]
fn merged_chunks_equal_single_pass() {
    let all = records();
    let expected = aggregate(&all);

    let mut merged = AggregationEngine::new();
    for chunk in all.chunks(33) {
        merged.merge(aggregate(chunk));
    }

    assert_eq!(merged, expected);
}

/// Registry statistics do not depend on arrival order.
#[test]
fn reversed_input_yields_same_registry() {
    let all = records();
    let mut reversed = all.clone();
    reversed.reverse();

    let forward = aggregate(&all);
    let backward = aggregate(&reversed);
    assert_eq!(forward.registry(), backward.registry());

    let home = forward.registry().get("Home", UNIT_MS).unwrap();
    assert!(home.first_seen <= home.last_seen);
    assert_eq!(home.histogram.total(), home.hits());
}

fn to_jtl(records: &[Record]) -> String {
    let mut xml = String::from("<testResults version=\"1.2\">\n");
    for record in records {
        xml.push_str(&format!(
            "<httpSample t=\"{}\" ts=\"{}\" s=\"{}\" lb=\"{}\" rc=\"{}\" rm=\"{}\" by=\"{}\"/>\n",
            record.duration_ms,
            record.timestamp.timestamp_millis(),
            record.success,
            record.label,
            record.result_code,
            record.response_message,
            record.bytes(),
        ));
    }
    xml.push_str("</testResults>\n");
    xml
}

/// Splitting a run across files and aggregating them in parallel changes nothing.
#[test]
fn parallel_files_equal_single_file() -> Result<()> {
    let all = records();
    let dir = TempDir::new()?;

    let single = dir.path().join("single.jtl");
    fs::write(&single, to_jtl(&all))?;

    let mut parts = Vec::new();
    for (index, chunk) in all.chunks(50).enumerate() {
        let path = dir.path().join(format!("part-{}.jtl", index));
        fs::write(&path, to_jtl(chunk))?;
        parts.push(path);
    }

    let sequential = ReportConfig::default();
    let parallel = ReportConfig {
        jobs: 4,
        ..ReportConfig::default()
    };

    let (from_single, _) = IngestRunner::new(vec![single], &sequential).run()?;
    let (from_parts, summary) = IngestRunner::new(parts, &parallel).run()?;

    assert_eq!(summary.sources.len(), 4);
    assert_eq!(from_parts, from_single);
    assert_eq!(
        from_parts.registry().get("Home", UNIT_EXCEPTION).map(|m| m.hits()),
        from_single.registry().get("Home", UNIT_EXCEPTION).map(|m| m.hits())
    );
    Ok(())
}
