//! Plain-text rendering of pairs, groups and progress for the terminal.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use dedupe_core::{format_value, Fields, TrainingPair};
use dedupe_review::{ReviewSession, TrainingProgress};

/// Widest a single cell may get before it is truncated.
const MAX_CELL_WIDTH: usize = 28;

/// Display width of a string, accounting for CJK double-width, emoji, etc.
pub(crate) fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Truncate a string to fit within `width` display columns, adding ".." if truncated.
pub(crate) fn truncate_display(s: &str, width: usize) -> String {
    if display_width(s) <= width {
        return s.to_string();
    }
    if width < 3 {
        return s
            .chars()
            .next()
            .filter(|ch| ch.width().unwrap_or(0) <= width)
            .map(String::from)
            .unwrap_or_default();
    }

    // leave room for ".."
    let budget = width - 2;
    let mut used = 0;
    let mut end_byte = 0;
    for (i, ch) in s.char_indices() {
        let cw = ch.width().unwrap_or(0);
        if used + cw > budget {
            break;
        }
        used += cw;
        end_byte = i + ch.len_utf8();
    }
    format!("{}..", &s[..end_byte])
}

/// Pad or truncate a string to exactly `width` display columns.
pub(crate) fn pad_right(s: &str, width: usize) -> String {
    let sw = display_width(s);
    if sw > width {
        truncate_display(s, width)
    } else {
        format!("{}{}", s, " ".repeat(width - sw))
    }
}

fn cell(fields: &Fields, column: &str) -> String {
    let text = fields.get(column).map(format_value).unwrap_or_default();
    // one line per cell
    text.replace(['\r', '\n'], " ")
}

/// Side-by-side view of a candidate pair, one row per column.
/// Rows whose values differ are marked with `*` in the gutter.
pub(crate) fn pair(pair: &TrainingPair, columns: &[String]) -> String {
    let label_w = columns.iter().map(|c| display_width(c)).max().unwrap_or(0).min(MAX_CELL_WIDTH);
    let left: Vec<String> = columns.iter().map(|c| cell(&pair.left, c)).collect();
    let left_w = left
        .iter()
        .map(|v| display_width(v))
        .max()
        .unwrap_or(0)
        .clamp(4, MAX_CELL_WIDTH);

    let mut out = String::new();
    for (column, left) in columns.iter().zip(&left) {
        let right = cell(&pair.right, column);
        let gutter = if *left != right { '*' } else { ' ' };
        out.push_str(&format!(
            "{} {}  {}  {}\n",
            gutter,
            pad_right(column, label_w),
            pad_right(left, left_w),
            truncate_display(&right, MAX_CELL_WIDTH),
        ));
    }
    out
}

pub(crate) fn progress(p: &TrainingProgress) -> String {
    format!(
        "pair {}/{}  yes {}/{}  no {}/{}  total {}/{}  unsure {}",
        (p.labeled + 1).min(p.batch_len),
        p.batch_len,
        p.yes,
        p.min_yes,
        p.no,
        p.min_no,
        p.total,
        p.min_total,
        p.unsure,
    )
}

/// The current group as a table: marker, member number, then the columns.
pub(crate) fn group(review: &ReviewSession, columns: &[String]) -> String {
    let group = review.current_group();
    let mut out = format!(
        "Group {}/{}  cluster {}  confidence {:.3}  sort {}{}\n",
        review.current_index() + 1,
        review.len(),
        group.cluster_id.display_number(),
        group.confidence,
        review.sort(),
        if review.is_skipped(group.cluster_id) { "  [skipped]" } else { "" },
    );

    let widths: Vec<usize> = columns
        .iter()
        .map(|c| {
            group
                .members
                .iter()
                .map(|m| display_width(&cell(&m.fields, c)))
                .chain(std::iter::once(display_width(c)))
                .max()
                .unwrap_or(0)
                .min(MAX_CELL_WIDTH)
        })
        .collect();

    let mut header = String::from("         ");
    for (c, w) in columns.iter().zip(&widths) {
        header.push_str(&pad_right(c, *w));
        header.push_str("  ");
    }
    out.push_str(header.trim_end());
    out.push('\n');

    for (i, member) in group.members.iter().enumerate() {
        let mark = if review.selection().is_selected(group.cluster_id, &member.id) {
            "x"
        } else {
            " "
        };
        let mut line = format!("  [{}] {:>2}  ", mark, i + 1);
        for (c, w) in columns.iter().zip(&widths) {
            line.push_str(&pad_right(&cell(&member.fields, c), *w));
            line.push_str("  ");
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// The first rows of an upload as a table under its header.
pub(crate) fn preview(headers: &[String], rows: &[Fields]) -> String {
    let widths: Vec<usize> = headers
        .iter()
        .map(|h| {
            rows.iter()
                .map(|row| display_width(&cell(row, h)))
                .chain(std::iter::once(display_width(h)))
                .max()
                .unwrap_or(0)
                .min(MAX_CELL_WIDTH)
        })
        .collect();

    let mut out = String::new();
    let lines = std::iter::once(headers.to_vec()).chain(
        rows.iter()
            .map(|row| headers.iter().map(|h| cell(row, h)).collect::<Vec<_>>()),
    );
    for values in lines {
        let mut line = String::new();
        for (value, w) in values.iter().zip(&widths) {
            line.push_str(&pad_right(value, *w));
            line.push_str("  ");
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}
