//! Percentage and bar formatting.

/// Maximum bar length in glyphs.
pub const BAR_WIDTH: usize = 20;

/// Glyph used to fill bars.
pub const BAR_GLYPH: char = '█';

/// Formats `count / total` as a one-decimal percentage, e.g. `"60.0%"`.
///
/// A zero total reports `"0.0%"` instead of dividing by zero.
pub fn format_percentage(count: u32, total: u32) -> String {
    if total == 0 {
        return "0.0%".to_string();
    }
    format!("{:.1}%", count as f64 / total as f64 * 100.0)
}

/// Renders `floor(count / total * width)` glyphs followed by `"count/total"`.
///
/// ```
/// use tally::render_bar;
///
/// assert_eq!(render_bar(1, 2, 20), "██████████ 1/2");
/// assert_eq!(render_bar(0, 0, 20), " 0/0");
/// ```
pub fn render_bar(count: u32, total: u32, width: usize) -> String {
    // Integer floor keeps the width exact for every count/total pair.
    let filled = if total == 0 {
        0
    } else {
        count as usize * width / total as usize
    };
    let bar: String = std::iter::repeat(BAR_GLYPH).take(filled).collect();
    format!("{} {}/{}", bar, count, total)
}
