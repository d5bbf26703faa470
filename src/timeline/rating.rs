//! Popularity ranking for "top" listings.
//!
//! Each post gets five engagement signals plus a rank-based recency signal.
//! Engagement counts are squashed into `[0, 1000)` so one viral post cannot
//! flatten everyone else during normalization, then every signal is divided
//! by its maximum over the candidate set. Recency is the post's position in
//! the newest-first input, not its age: two posts a second apart and two
//! posts a year apart contribute the same recency gap.

use crate::db::models::EngagementCounts;

const LIKE_WEIGHT: f64 = 0.1;
const VIEW_WEIGHT: f64 = 0.1;
const BOOKMARK_WEIGHT: f64 = 0.1;
const COMMENT_WEIGHT: f64 = 0.1;
const REPOST_WEIGHT: f64 = 0.1;
const RECENCY_WEIGHT: f64 = 0.5;

/// Bounded squashing: 0 maps to 0, large counts approach 1000.
pub fn squash(x: f64) -> f64 {
    2000.0 / (1.0 + (-0.005 * x).exp()) - 1000.0
}

/// Normalized signals of one post, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Signals {
    pub like: f64,
    pub view: f64,
    pub bookmark: f64,
    pub comment: f64,
    pub repost: f64,
    pub recency: f64,
}

impl Signals {
    pub fn score(&self) -> f64 {
        LIKE_WEIGHT * self.like
            + VIEW_WEIGHT * self.view
            + BOOKMARK_WEIGHT * self.bookmark
            + COMMENT_WEIGHT * self.comment
            + REPOST_WEIGHT * self.repost
            + RECENCY_WEIGHT * self.recency
    }

    pub fn as_array(&self) -> [f64; 6] {
        [
            self.like,
            self.view,
            self.bookmark,
            self.comment,
            self.repost,
            self.recency,
        ]
    }

    fn from_array(a: [f64; 6]) -> Self {
        Self {
            like: a[0],
            view: a[1],
            bookmark: a[2],
            comment: a[3],
            repost: a[4],
            recency: a[5],
        }
    }
}

/// Normalized signals for a newest-first candidate set, in input order.
pub fn normalize(counts: &[EngagementCounts]) -> Vec<Signals> {
    let n = counts.len();
    let raw: Vec<[f64; 6]> = counts
        .iter()
        .enumerate()
        .map(|(index, c)| {
            [
                squash(c.likes as f64),
                squash(c.views as f64),
                squash(c.bookmarks as f64),
                squash(c.replies as f64),
                squash(c.reposts as f64),
                (n - index) as f64,
            ]
        })
        .collect();

    let mut max = [0.0f64; 6];
    for row in &raw {
        for (m, v) in max.iter_mut().zip(row) {
            *m = m.max(*v);
        }
    }

    raw.into_iter()
        .map(|row| {
            let mut normalized = [0.0; 6];
            for i in 0..6 {
                normalized[i] = if max[i] > 0.0 { row[i] / max[i] } else { 0.0 };
            }
            Signals::from_array(normalized)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<T> {
    pub item: T,
    pub signals: Signals,
    pub score: f64,
}

/// Rank a newest-first candidate set by final score, highest first. Equal
/// scores keep their input order.
pub fn rank<T>(candidates: Vec<(T, EngagementCounts)>) -> Vec<Ranked<T>> {
    let counts: Vec<EngagementCounts> = candidates.iter().map(|(_, c)| *c).collect();
    let signals = normalize(&counts);

    let mut ranked: Vec<Ranked<T>> = candidates
        .into_iter()
        .zip(signals)
        .map(|((item, _), signals)| Ranked {
            item,
            score: signals.score(),
            signals,
        })
        .collect();

    order_by_score(&mut ranked);
    ranked
}

/// Highest score first; `sort_by` is stable so ties keep their order.
fn order_by_score<T>(ranked: &mut [Ranked<T>]) {
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
}
