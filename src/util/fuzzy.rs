use strsim::normalized_levenshtein;
use tracing::warn;

use crate::error::{Error, Result};

/// Best candidate for a fuzzy lookup and its similarity ratio in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    pub candidate: String,
    pub ratio: f64,
}

/// Find the candidate closest to `target` by case-insensitive Levenshtein
/// ratio. Matches below `tolerance` are still returned but logged.
pub fn fuzzy_string_match<S: AsRef<str>>(
    target: &str,
    candidates: &[S],
    tolerance: f64,
) -> Result<FuzzyMatch> {
    if let Some(exact) = candidates.iter().find(|c| c.as_ref() == target) {
        return Ok(FuzzyMatch {
            candidate: exact.as_ref().to_string(),
            ratio: 1.0,
        });
    }

    let target_lower = target.to_lowercase();
    let mut best: Option<FuzzyMatch> = None;
    for candidate in candidates {
        let candidate = candidate.as_ref();
        let ratio = normalized_levenshtein(&target_lower, &candidate.to_lowercase());
        // Ties keep the earliest candidate.
        if best.as_ref().map_or(true, |b| ratio > b.ratio) {
            best = Some(FuzzyMatch {
                candidate: candidate.to_string(),
                ratio,
            });
        }
    }

    let best = best.ok_or_else(|| {
        Error::Validation(format!("no candidates to match '{target}' against"))
    })?;

    if best.ratio < tolerance {
        warn!(
            query = target,
            matched = %best.candidate,
            ratio = %format_args!("{:.2}", best.ratio),
            tolerance = %format_args!("{:.2}", tolerance),
            "Fuzzy match below tolerance"
        );
    }

    Ok(best)
}
