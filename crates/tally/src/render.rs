//! Plain-text summary rendering.

use std::fmt::Write;

use poll_events::Summary;

/// Renders a summary as an aligned text table, one block per question.
///
/// ```text
/// Q1 (n=10)
///   Yes  60.0%  ████████████ 6/10
///   No   40.0%  ████████ 4/10
/// ```
pub fn render_summary(summary: &Summary) -> String {
    let mut out = String::new();

    for (question, tally) in summary.iter() {
        let _ = writeln!(out, "{} (n={})", question, tally.total);

        let label_width = tally
            .counts
            .iter()
            .map(|(option, _)| option.chars().count())
            .max()
            .unwrap_or(0);

        for ((option, _), ((_, pct), (_, bar))) in tally
            .counts
            .iter()
            .zip(tally.percentages.iter().zip(tally.visual.iter()))
        {
            let _ = writeln!(out, "  {:<width$}  {:>6}  {}", option, pct, bar, width = label_width);
        }

        if let Some(stats) = &tally.stats {
            let _ = writeln!(
                out,
                "  mean {:.2}, min {}, max {}",
                stats.mean, stats.min, stats.max
            );
        }
        out.push('\n');
    }

    out
}
