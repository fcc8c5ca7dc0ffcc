//! Diversity filter: greedy single-pass caps on category and source
//! repetition, with a score-ordered backfill when the caps leave the
//! page short.

use std::collections::HashMap;

use crate::models::RankedArticle;

fn category_cap(target: usize) -> usize {
    (target / 4).max(2)
}

fn source_cap(target: usize) -> usize {
    (target / 8).max(1)
}

/// Re-select `target` articles from a score-descending ranking so no
/// category or source dominates the page. Input order is the ranking;
/// output preserves it among the picks.
pub fn apply(ranked: Vec<RankedArticle>, target: usize) -> Vec<RankedArticle> {
    if ranked.len() <= target {
        return ranked;
    }

    let max_per_category = category_cap(target);
    let max_per_source = source_cap(target);

    let mut category_counts: HashMap<String, usize> = HashMap::new();
    let mut source_counts: HashMap<String, usize> = HashMap::new();
    let mut picked: Vec<RankedArticle> = Vec::with_capacity(target);
    let mut passed_over: Vec<RankedArticle> = Vec::new();

    for item in ranked {
        if picked.len() >= target {
            break;
        }

        let category = item
            .article
            .category
            .clone()
            .unwrap_or_else(|| "uncategorized".to_string());
        let source = item.article.source_name.clone();

        let category_count = category_counts.get(&category).copied().unwrap_or(0);
        let source_count = source_counts.get(&source).copied().unwrap_or(0);

        if category_count < max_per_category && source_count < max_per_source {
            *category_counts.entry(category).or_insert(0) += 1;
            *source_counts.entry(source).or_insert(0) += 1;
            picked.push(item);
        } else {
            passed_over.push(item);
        }
    }

    // Shortfall: caps were too aggressive for this pool. Backfill with
    // the best of what was passed over; a full page beats a diverse one.
    if picked.len() < target {
        let missing = target - picked.len();
        picked.extend(passed_over.into_iter().take(missing));
    }

    picked
}
