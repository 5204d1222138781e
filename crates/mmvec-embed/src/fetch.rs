//! Reading the JSONL result files an async job leaves in object storage.

use mmvec_core::records::{LinePolicy, SegmentEmbedding};
use mmvec_core::traits::ObjectStore;
use mmvec_core::{Error, ObjectLocation, Result};

/// Parse one result file. Lines may end in `\n`, `\r\n` or `\r`; blank lines
/// are ignored. Records keep file order, one slot per non-blank line: a line
/// dropped under `LinePolicy::Skip` leaves `None` so later records keep
/// their position.
pub fn parse_segments(bytes: &[u8], policy: LinePolicy) -> Result<Vec<Option<SegmentEmbedding>>> {
    let text = std::str::from_utf8(bytes).map_err(|e| Error::parse("segment result file", e))?;
    let mut records = Vec::new();
    for (i, line) in split_lines(text).enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<SegmentEmbedding>(line) {
            Ok(rec) => records.push(Some(rec)),
            Err(e) => match policy {
                LinePolicy::Abort => return Err(Error::MalformedRecord { line: i + 1, reason: e.to_string() }),
                LinePolicy::Skip => {
                    tracing::warn!(line = i + 1, error = %e, "skipping malformed result line");
                    records.push(None);
                }
            },
        }
    }
    Ok(records)
}

fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').flat_map(|l| l.strip_suffix('\r').unwrap_or(l).split('\r'))
}

/// Fetch `output/file_name` and parse it.
pub async fn fetch_segments(
    store: &dyn ObjectStore,
    output: &ObjectLocation,
    file_name: &str,
    policy: LinePolicy,
) -> Result<Vec<Option<SegmentEmbedding>>> {
    let location = output.join(file_name);
    let bytes = store.get(&location).await?;
    let records = parse_segments(&bytes, policy)?;
    tracing::info!(uri = %location, records = records.len(), "fetched segment embeddings");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(idx: u32, status: &str) -> String {
        format!(
            r#"{{"embedding":[0.5,0.5],"status":"{status}","segmentMetadata":{{"segmentIndex":{idx},"segmentStartSeconds":{},"segmentEndSeconds":{}}}}}"#,
            idx * 15,
            (idx + 1) * 15
        )
    }

    #[test]
    fn handles_mixed_line_endings() {
        let body = format!("{}\r\n{}\r{}\n\n", line(0, "SUCCESS"), line(1, "SUCCESS"), line(2, "FAILED"));
        let recs: Vec<_> = parse_segments(body.as_bytes(), LinePolicy::Abort).unwrap().into_iter().flatten().collect();
        let idx: Vec<u32> = recs.iter().map(|r| r.segment_metadata.segment_index).collect();
        assert_eq!(idx, vec![0, 1, 2]);
        assert!(!recs[2].is_success());
    }

    #[test]
    fn abort_reports_one_based_line() {
        let body = format!("{}\nnot json\n{}", line(0, "SUCCESS"), line(1, "SUCCESS"));
        match parse_segments(body.as_bytes(), LinePolicy::Abort) {
            Err(Error::MalformedRecord { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn skip_keeps_a_slot_for_bad_lines() {
        let body = format!("{}\n{{\"embedding\":[1]}}\n\n{}", line(0, "SUCCESS"), line(2, "SUCCESS"));
        let recs = parse_segments(body.as_bytes(), LinePolicy::Skip).unwrap();
        assert_eq!(recs.len(), 3);
        assert!(recs[1].is_none());
        assert_eq!(recs[2].as_ref().map(|r| r.segment_metadata.segment_index), Some(2));
    }

    #[test]
    fn empty_file_yields_nothing() {
        assert!(parse_segments(b"", LinePolicy::Abort).unwrap().is_empty());
    }
}
