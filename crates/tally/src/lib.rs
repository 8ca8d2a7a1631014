//! Tally: response aggregation and report output.
//!
//! Tally sits between the query protocol and whoever reads the results. It
//! takes the per-agent answers of a run, counts them against the declared
//! options, and renders counts, shares and bars.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   Vec<QueryResult>   ┌───────┐    report.json / summary.txt
//! │  poll-core  │ ──────────────────▶  │ tally │ ─────────────────────────────▶
//! └─────────────┘                      └───────┘
//! ```
//!
//! # Modules
//!
//! - [`aggregator`]: Per-question counting with option validation
//! - [`format`]: Percentage and bar formatting
//! - [`render`]: Plain-text summary rendering
//! - [`output`]: Report writer and reader

pub mod aggregator;
pub mod format;
pub mod output;
pub mod render;

pub use aggregator::{AggregationError, ResponseAggregator, Tally};
pub use format::{format_percentage, render_bar, BAR_GLYPH, BAR_WIDTH};
pub use output::{OutputError, ReportReader, ReportWriter};
pub use render::render_summary;
