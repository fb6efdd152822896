//! Summarize benchmark results.

use anyhow::{Context, Result};
use ring_bench::{ResultStore, ScenarioKind};
use std::path::Path;

/// Run the report command.
pub fn run(file: &Path) -> Result<()> {
    let store = ResultStore::load(file)
        .with_context(|| format!("Failed to load results from {}", file.display()))?;
    println!("{}", render(&store));
    Ok(())
}

/// Per-kind summary followed by one table row per scenario instance.
pub fn render(store: &ResultStore) -> String {
    let mut out = String::new();
    out.push_str(&"=".repeat(80));
    out.push_str("\nBENCHMARK SUMMARY\n");
    out.push_str(&"=".repeat(80));
    out.push('\n');

    if store.is_empty() {
        out.push_str("\nNo results recorded.\n");
        return out;
    }

    for kind in ScenarioKind::ALL {
        let Some(summary) = store.summary(kind) else {
            continue;
        };
        out.push_str(&format!("\n{} Experiment:\n", kind.as_str().to_uppercase()));
        out.push_str(&format!("  Total runs: {}\n", summary.runs));
        out.push_str(&format!(
            "  Successful: {} ({:.1}%)\n",
            summary.successes,
            summary.success_percentage()
        ));
        if let Some(stats) = summary.durations {
            out.push_str(&format!("  Mean duration: {:.2}s\n", stats.mean));
            out.push_str(&format!("  Std deviation: {:.2}s\n", stats.stddev));
            out.push_str(&format!("  Min duration: {:.2}s\n", stats.min));
            out.push_str(&format!("  Max duration: {:.2}s\n", stats.max));
        }
    }

    out.push_str(&format!(
        "\n{:<8} {:>6} {:>6} {:>6} {:>9} {:>10} {:>10}\n",
        "kind", "start", "end", "runs", "success", "mean (s)", "stddev (s)"
    ));
    for group in store.groups() {
        let (mean, stddev) = match group.durations {
            Some(stats) => (format!("{:.2}", stats.mean), format!("{:.2}", stats.stddev)),
            None => ("-".to_string(), "-".to_string()),
        };
        out.push_str(&format!(
            "{:<8} {:>6} {:>6} {:>6} {:>8.0}% {:>10} {:>10}\n",
            group.kind.as_str(),
            group.start_size,
            group.target_size,
            group.runs,
            group.success_rate() * 100.0,
            mean,
            stddev
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring_bench::RunResult;
    use std::time::Duration;

    #[test]
    fn renders_summary_and_groups() {
        let mut store = ResultStore::new();
        store.push(RunResult::succeeded(ScenarioKind::Growth, 4, 4, Duration::from_secs(2)));
        store.push(RunResult::setup_failed(ScenarioKind::Growth, 4, 4, "Not all nodes alive"));

        let text = render(&store);
        assert!(text.contains("GROWTH Experiment:"));
        assert!(text.contains("Successful: 1 (50.0%)"));
        assert!(text.contains("Mean duration: 2.00s"));
        assert!(!text.contains("SHRINK"));
    }

    #[test]
    fn group_without_success_shows_dash() {
        let mut store = ResultStore::new();
        store.push(RunResult::setup_failed(ScenarioKind::Crash, 32, 31, "Initial network didn't stabilize"));

        let text = render(&store);
        assert!(text.contains("Successful: 0 (0.0%)"));
        assert!(!text.contains("Mean duration"));
        assert!(text.lines().last().unwrap().trim_end().ends_with('-'));
    }

    #[test]
    fn empty_store() {
        assert!(render(&ResultStore::new()).contains("No results recorded."));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(run(Path::new("/nonexistent/results.json")).is_err());
    }
}
