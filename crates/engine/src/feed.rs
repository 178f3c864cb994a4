use std::path::Path;

use tracing::info;

use common::{Bar, Error, Result};

/// Load bars from a JSON-lines file, one bar object per line.
pub fn load_bars(path: impl AsRef<Path>) -> Result<Vec<Bar>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let bars = parse_bars(&content)?;
    info!(path = %path.display(), bars = bars.len(), "Bar feed loaded");
    Ok(bars)
}

/// Parse JSON-lines content. Blank lines are skipped; errors carry the 1-based line number.
pub fn parse_bars(content: &str) -> Result<Vec<Bar>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str::<Bar>(line).map_err(|source| Error::Feed {
                line: idx + 1,
                source,
            })
        })
        .collect()
}

/// Interleave bars of all instruments in non-decreasing timestamp order.
/// Bars sharing a timestamp keep their input order.
pub fn merge_chronological(mut bars: Vec<Bar>) -> Vec<Bar> {
    bars.sort_by_key(|b| b.timestamp);
    bars
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"{"instrument":"BTCUSDT","timestamp":"2022-01-01T01:00:00Z","open":1.0,"high":1.0,"low":1.0,"close":1.0,"volume":3.0}

{"instrument":"ETHUSDT","timestamp":"2022-01-01T00:00:00Z","open":2.0,"high":2.0,"low":2.0,"close":2.0}
{"instrument":"BTCUSDT","timestamp":"2022-01-01T00:00:00Z","open":3.0,"high":3.0,"low":3.0,"close":3.0}
"#;

    #[test]
    fn parses_lines_and_skips_blanks() {
        let bars = parse_bars(FEED).unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].volume, 3.0);
        assert_eq!(bars[1].instrument, "ETHUSDT");
    }

    #[test]
    fn parse_error_reports_line_number() {
        let content = format!("{}\n{{not json}}\n", FEED.lines().next().unwrap());
        let err = parse_bars(&content).unwrap_err();
        assert!(matches!(err, Error::Feed { line: 2, .. }), "got {err}");
    }

    #[test]
    fn merge_orders_by_time_and_keeps_ties_stable() {
        let merged = merge_chronological(parse_bars(FEED).unwrap());
        let order: Vec<(&str, f64)> = merged
            .iter()
            .map(|b| (b.instrument.as_str(), b.close))
            .collect();
        assert_eq!(
            order,
            vec![("ETHUSDT", 2.0), ("BTCUSDT", 3.0), ("BTCUSDT", 1.0)]
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_bars("/nonexistent/bars.jsonl").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
