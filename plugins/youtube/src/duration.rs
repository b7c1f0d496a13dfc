//! ISO 8601 durations as returned in `contentDetails.duration`.

use regex::Regex;
use std::sync::LazyLock;

static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$")
        .expect("duration pattern is valid")
});

/// Total seconds in a `P[nD]T[nH][nM][nS]` token.
///
/// Missing components count as zero, and so does anything that does not look like a duration
/// at all; callers only use the result to tell short clips from full videos.
pub fn parse_duration_secs(token: &str) -> u64 {
    let Some(captures) = DURATION.captures(token.trim()) else {
        return 0;
    };
    let component = |i: usize| -> u64 {
        captures
            .get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    // absurd inputs saturate rather than wrap
    component(1)
        .saturating_mul(86_400)
        .saturating_add(component(2).saturating_mul(3_600))
        .saturating_add(component(3).saturating_mul(60))
        .saturating_add(component(4))
}
