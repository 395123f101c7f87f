// Console progress bars
// indicatif bars drawn as `[ ====      ] 50.00%` on stdout

use std::fmt::Write as _;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};

/// Width of the default bar in characters.
pub const DEFAULT_BAR_LENGTH: usize = 50;

/// Bracketed `=` bar followed by the percentage with two decimals.
pub fn progress_style(bar_len: usize) -> ProgressStyle {
    let template = format!("[ {{bar:{}}} ] {{percent2}}%", bar_len);
    ProgressStyle::with_template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key("percent2", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
            // writes into indicatif's own String buffer
            let _ = write!(w, "{:.2}", state.fraction() * 100.0);
        })
        .progress_chars("= ")
}

/// A bar over `len` steps on stdout. Hidden when stdout is not a terminal.
pub fn stdout_bar(len: u64, bar_len: usize) -> ProgressBar {
    let pb = ProgressBar::with_draw_target(Some(len), ProgressDrawTarget::stdout());
    pb.set_style(progress_style(bar_len));
    pb
}

/// A 0..=100 bar for the per-chunk progress of one file.
pub fn stdout_progress(bar_len: usize) -> ProgressBar {
    stdout_bar(100, bar_len)
}

/// Adapt `pb` to the hasher's per-chunk progress callback.
pub fn bar_callback(pb: &ProgressBar) -> impl Fn(u8) + Send + Sync + 'static {
    let pb = pb.clone();
    move |percent| pb.set_position(u64::from(percent))
}
