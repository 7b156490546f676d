//! Human-readable status lines on stdout.

use ndarray::{ArrayView1, ArrayView2};

const RULE_WIDTH: usize = 60;

pub fn banner(title: &str) {
    let rule = "=".repeat(RULE_WIDTH);
    println!("{rule}\n{title}\n{rule}");
}

pub fn rule() {
    println!("\n{}", "=".repeat(RULE_WIDTH));
}

/// A new step, preceded by a blank line.
pub fn step(message: &str) {
    println!("\n{message}");
}

pub fn info(message: &str) {
    println!("{message}");
}

pub fn ok(message: &str) {
    println!("✓ {message}");
}

pub fn fail(message: &str) {
    println!("✗ {message}");
}

/// `[1, 1]`
pub fn format_labels(labels: ArrayView1<'_, u32>) -> String {
    format!("{:?}", labels.to_vec())
}

/// `[[6.8, 2.8, 4.8, 1.4], [6.0, 3.4, 4.5, 1.6]]`
pub fn format_rows(rows: ArrayView2<'_, f32>) -> String {
    let rows: Vec<Vec<f32>> = rows.rows().into_iter().map(|r| r.to_vec()).collect();
    format!("{rows:?}")
}
