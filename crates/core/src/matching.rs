// crates/core/src/matching.rs
//! The matching engine: scores an issue against a viewer's profile.
//!
//! Pure and synchronous; the feed calls it per page, so per-issue work is
//! microseconds. Weighted factors with human-readable reason tags.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{Issue, User};

const WEIGHT_SKILL_MATCH: f64 = 0.35;
const WEIGHT_GROWTH_MATCH: f64 = 0.20;
const WEIGHT_REPO_HEALTH: f64 = 0.20;
const WEIGHT_FRESHNESS: f64 = 0.15;
const WEIGHT_LOW_COMPETITION: f64 = 0.10;

pub const REASON_SKILLS: &str = "Matches your skills";
pub const REASON_GROWTH: &str = "Good for growth";
pub const REASON_HEALTHY_REPO: &str = "Active, healthy repo";
pub const REASON_FRESH: &str = "Recently updated";
pub const REASON_LOW_COMPETITION: &str = "Low competition";

/// Compute the match score in [0, 1] and reason tags for one (user, issue)
/// pair.
pub fn score_issue(user: &User, issue: &Issue) -> (f64, Vec<String>) {
    let mut reasons = Vec::new();

    let skill = skill_match(user, issue);
    if skill > 0.5 {
        reasons.push(REASON_SKILLS.to_string());
    }

    let growth = growth_match(user, issue);
    if growth > 0.5 {
        reasons.push(REASON_GROWTH.to_string());
    }

    let repo_health = issue.repo.as_ref().map_or(0.0, |r| r.health_score);
    if repo_health > 0.7 {
        reasons.push(REASON_HEALTHY_REPO.to_string());
    }

    let freshness = issue.freshness_score;
    if freshness > 0.7 {
        reasons.push(REASON_FRESH.to_string());
    }

    let competition = competition_score(issue.comment_count);
    if competition > 0.5 {
        reasons.push(REASON_LOW_COMPETITION.to_string());
    }

    let total = skill * WEIGHT_SKILL_MATCH
        + growth * WEIGHT_GROWTH_MATCH
        + repo_health * WEIGHT_REPO_HEALTH
        + freshness * WEIGHT_FRESHNESS
        + competition * WEIGHT_LOW_COMPETITION;

    (total, reasons)
}

/// Annotate every issue with its match score and reasons, then rank the
/// slice by descending score. The sort is stable: equal scores keep their
/// input order.
pub fn score_issues(user: &User, issues: &mut [Issue]) {
    for issue in issues.iter_mut() {
        let (score, reasons) = score_issue(user, issue);
        issue.match_score = Some(score);
        issue.match_reasons = reasons;
    }
    issues.sort_by(|a, b| {
        b.match_score
            .partial_cmp(&a.match_score)
            .unwrap_or(Ordering::Equal)
    });
}

/// Best overlap between the user's proficiencies and the issue's skill
/// languages (case-insensitive). Neutral 0.5 when either side has no data.
fn skill_match(user: &User, issue: &Issue) -> f64 {
    if user.skills.is_empty() || issue.skills.is_empty() {
        return 0.5;
    }

    let by_language: HashMap<String, f64> = user
        .skills
        .iter()
        .map(|s| (s.language.to_lowercase(), s.proficiency))
        .collect();

    issue
        .skills
        .iter()
        .filter_map(|s| by_language.get(&s.language.to_lowercase()))
        .fold(0.0, |best, &p| best.max(p))
}

/// Reward issues sitting at or one step above the user's comfort level.
fn growth_match(user: &User, issue: &Issue) -> f64 {
    let user_level = match user.comfort_level.to_lowercase().as_str() {
        "beginner" => 1,
        "intermediate" => 2,
        "advanced" => 3,
        _ => 1,
    };

    match issue.difficulty - user_level {
        1 => 1.0,
        0 => 0.8,
        -1 => 0.5,
        d if d >= 2 => 0.2,
        _ => 0.3,
    }
}

/// Fewer comments, fewer competing contributors.
fn competition_score(comment_count: i32) -> f64 {
    match comment_count {
        0 => 1.0,
        c if c <= 2 => 0.8,
        c if c <= 5 => 0.5,
        c if c <= 10 => 0.3,
        _ => 0.1,
    }
}
