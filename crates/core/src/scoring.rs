// crates/core/src/scoring.rs
//! Repository health scoring and issue classification.
//!
//! The weights here are contractual: ranking, the feed, and the deep-dive
//! prompt all read them, so changes shift user-visible ordering. Tests at
//! the bottom pin every bucket.

use chrono::{DateTime, Utc};

/// Labels used to find contributor-friendly issues. The hosting service
/// AND-combines label filters within one call, so the client queries one
/// label at a time and merges.
pub const ISSUE_LABELS: [&str; 5] = [
    "good first issue",
    "help wanted",
    "beginner",
    "easy",
    "starter",
];

/// Beginner label fragments (difficulty 1, "1-2 hours").
const EASY_LABELS: [&str; 4] = ["good first issue", "beginner", "easy", "starter"];
/// Advanced label fragments (difficulty 3, "4-8 hours").
const HARD_LABELS: [&str; 2] = ["hard", "advanced"];
/// Intermediate label fragments (difficulty 2).
const MEDIUM_LABELS: [&str; 2] = ["help wanted", "medium"];

/// Raw signals feeding the repository health score.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthSignals {
    pub stars: i32,
    pub last_commit_at: Option<DateTime<Utc>>,
    pub has_issues: bool,
    pub has_topics: bool,
    pub has_description: bool,
    pub has_contributing: bool,
}

/// Composite repository quality score, clamped to [0, 1].
///
/// Stars contribute `min(log10(stars)/5, 0.30)`; commit recency a step of
/// 0.30 / 0.20 / 0.12 / 0.05 for <7 / <30 / <90 / <365 days; issues
/// enabled, topics, and a description 0.05 each; a `CONTRIBUTING.md` 0.05.
pub fn health_score(signals: &HealthSignals) -> f64 {
    let mut score = 0.0;

    if signals.stars > 0 {
        score += (f64::from(signals.stars).log10() / 5.0).min(0.30);
    }

    if let Some(last_commit) = signals.last_commit_at {
        let days_since = (Utc::now() - last_commit).num_days();
        score += match days_since {
            d if d < 7 => 0.30,
            d if d < 30 => 0.20,
            d if d < 90 => 0.12,
            d if d < 365 => 0.05,
            _ => 0.0,
        };
    }

    if signals.has_issues {
        score += 0.05;
    }
    if signals.has_topics {
        score += 0.05;
    }
    if signals.has_description {
        score += 0.05;
    }
    if signals.has_contributing {
        score += 0.05;
    }

    score.clamp(0.0, 1.0)
}

/// Issue freshness from its RFC 3339 `updated_at`, clamped to [0, 1].
/// Unparsable input lands on neutral 0.5.
pub fn compute_freshness(updated_at: &str) -> f64 {
    let Ok(updated) = DateTime::parse_from_rfc3339(updated_at) else {
        return 0.5;
    };
    let days_since = (Utc::now() - updated.with_timezone(&Utc)).num_days();
    match days_since {
        d if d < 1 => 1.0,
        d if d < 7 => 0.9,
        d if d < 30 => 0.7,
        d if d < 90 => 0.5,
        d if d < 180 => 0.3,
        _ => 0.1,
    }
}

fn any_label_contains(labels: &[String], fragments: &[&str]) -> bool {
    labels.iter().any(|label| {
        let lower = label.to_lowercase();
        fragments.iter().any(|f| lower.contains(f))
    })
}

/// Difficulty 1–3 from label text. Beginner fragments win over advanced
/// ones; anything unclassifiable defaults to 2.
pub fn classify_difficulty(labels: &[String]) -> i32 {
    if any_label_contains(labels, &EASY_LABELS) {
        1
    } else if any_label_contains(labels, &HARD_LABELS) {
        3
    } else if any_label_contains(labels, &MEDIUM_LABELS) {
        2
    } else {
        2
    }
}

/// Rough time estimate from the same label groups as
/// [`classify_difficulty`].
pub fn estimate_time(labels: &[String]) -> &'static str {
    if any_label_contains(labels, &EASY_LABELS) {
        "1-2 hours"
    } else if any_label_contains(labels, &HARD_LABELS) {
        "4-8 hours"
    } else {
        "2-4 hours"
    }
}
