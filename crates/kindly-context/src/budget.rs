// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrieved items grouped by source, and character-budget eviction.
//!
//! Eviction pops the last (lowest ranked) item of the lowest-priority
//! non-empty source until the total fits. Surviving items keep their order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::classifier::QueryType;

/// Where a piece of context came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    Facts,
    Summaries,
    Snippets,
    Moments,
    Knowledge,
}

/// One retrieved piece of context with its ranking score.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextItem {
    pub id: i64,
    pub content: String,
    pub score: f32,
    pub created_at: Option<DateTime<Utc>>,
}

impl ContextItem {
    pub fn chars(&self) -> usize {
        self.content.chars().count()
    }
}

/// Raw per-source search results before rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieved {
    pub facts: Vec<ContextItem>,
    pub summaries: Vec<ContextItem>,
    pub snippets: Vec<ContextItem>,
    pub moments: Vec<ContextItem>,
    pub knowledge: Vec<ContextItem>,
}

impl Retrieved {
    pub fn items(&self, source: ContextSource) -> &[ContextItem] {
        match source {
            ContextSource::Facts => &self.facts,
            ContextSource::Summaries => &self.summaries,
            ContextSource::Snippets => &self.snippets,
            ContextSource::Moments => &self.moments,
            ContextSource::Knowledge => &self.knowledge,
        }
    }

    fn items_mut(&mut self, source: ContextSource) -> &mut Vec<ContextItem> {
        match source {
            ContextSource::Facts => &mut self.facts,
            ContextSource::Summaries => &mut self.summaries,
            ContextSource::Snippets => &mut self.snippets,
            ContextSource::Moments => &mut self.moments,
            ContextSource::Knowledge => &mut self.knowledge,
        }
    }

    pub fn source_chars(&self, source: ContextSource) -> usize {
        self.items(source).iter().map(ContextItem::chars).sum()
    }

    pub fn total_chars(&self) -> usize {
        ContextSource::iter().map(|s| self.source_chars(s)).sum()
    }

    pub fn item_count(&self) -> usize {
        ContextSource::iter().map(|s| self.items(s).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }
}

/// Sources from first-evicted to last-evicted, or `None` when eviction
/// targets whichever source is currently largest.
pub fn eviction_order(query_type: QueryType) -> Option<&'static [ContextSource]> {
    use ContextSource::*;
    match query_type {
        QueryType::Remember | QueryType::Personal => {
            Some(&[Knowledge, Snippets, Moments, Summaries, Facts])
        }
        QueryType::Advice => Some(&[Snippets, Moments, Summaries, Facts, Knowledge]),
        QueryType::General => None,
    }
}

/// Tie order when balancing by size: memory kinds go before knowledge.
const BALANCE_TIE_ORDER: [ContextSource; 5] = [
    ContextSource::Snippets,
    ContextSource::Moments,
    ContextSource::Summaries,
    ContextSource::Facts,
    ContextSource::Knowledge,
];

fn next_victim(retrieved: &Retrieved, query_type: QueryType) -> Option<ContextSource> {
    match eviction_order(query_type) {
        Some(order) => order
            .iter()
            .copied()
            .find(|s| !retrieved.items(*s).is_empty()),
        None => BALANCE_TIE_ORDER
            .iter()
            .copied()
            .filter(|s| !retrieved.items(*s).is_empty())
            .fold(None, |best: Option<(ContextSource, usize)>, s| {
                let size = retrieved.source_chars(s);
                match best {
                    Some((_, best_size)) if best_size >= size => best,
                    _ => Some((s, size)),
                }
            })
            .map(|(s, _)| s),
    }
}

/// Evict until the total content length is within `budget` characters.
///
/// Returns how many items were evicted.
pub fn enforce_budget(retrieved: &mut Retrieved, query_type: QueryType, budget: usize) -> usize {
    let mut evicted = 0;
    while retrieved.total_chars() > budget {
        let Some(source) = next_victim(retrieved, query_type) else {
            break;
        };
        retrieved.items_mut(source).pop();
        evicted += 1;
    }
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(id: i64, len: usize) -> ContextItem {
        ContextItem {
            id,
            content: "x".repeat(len),
            score: 1.0 - id as f32 / 100.0,
            created_at: None,
        }
    }

    fn items(start: i64, lens: &[usize]) -> Vec<ContextItem> {
        lens.iter()
            .enumerate()
            .map(|(i, len)| item(start + i as i64, *len))
            .collect()
    }

    #[test]
    fn personal_evicts_knowledge_then_snippets() {
        let mut r = Retrieved {
            facts: items(1, &[100]),
            snippets: items(10, &[100, 100]),
            knowledge: items(20, &[100, 100]),
            ..Default::default()
        };
        let evicted = enforce_budget(&mut r, QueryType::Personal, 250);
        assert_eq!(evicted, 3);
        assert!(r.knowledge.is_empty());
        assert_eq!(r.snippets.len(), 1);
        assert_eq!(r.snippets[0].id, 10);
        assert_eq!(r.facts.len(), 1);
    }

    #[test]
    fn advice_keeps_knowledge_longest() {
        let mut r = Retrieved {
            facts: items(1, &[100]),
            moments: items(5, &[100]),
            knowledge: items(20, &[100, 100]),
            ..Default::default()
        };
        enforce_budget(&mut r, QueryType::Advice, 200);
        assert_eq!(r.knowledge.len(), 2);
        assert!(r.moments.is_empty());
        assert!(r.facts.is_empty());
    }

    #[test]
    fn general_evicts_largest_source() {
        let mut r = Retrieved {
            facts: items(1, &[50, 50]),
            knowledge: items(20, &[200, 200]),
            ..Default::default()
        };
        enforce_budget(&mut r, QueryType::General, 350);
        assert_eq!(r.knowledge.len(), 1);
        assert_eq!(r.knowledge[0].id, 20);
        assert_eq!(r.facts.len(), 2);
    }

    #[test]
    fn general_ties_spare_knowledge() {
        let mut r = Retrieved {
            facts: items(1, &[100]),
            knowledge: items(20, &[100]),
            ..Default::default()
        };
        enforce_budget(&mut r, QueryType::General, 150);
        assert!(r.facts.is_empty());
        assert_eq!(r.knowledge.len(), 1);
    }

    #[test]
    fn under_budget_is_untouched() {
        let mut r = Retrieved {
            facts: items(1, &[10, 20]),
            ..Default::default()
        };
        let before = r.clone();
        assert_eq!(enforce_budget(&mut r, QueryType::Remember, 4500), 0);
        assert_eq!(r, before);
    }

    fn arb_query_type() -> impl Strategy<Value = QueryType> {
        prop_oneof![
            Just(QueryType::Remember),
            Just(QueryType::Personal),
            Just(QueryType::Advice),
            Just(QueryType::General),
        ]
    }

    proptest! {
        #[test]
        fn budget_bound_holds(
            lens in prop::collection::vec(prop::collection::vec(0usize..2000, 0..6), 5),
            budget in 0usize..6000,
            qt in arb_query_type(),
        ) {
            let mut r = Retrieved {
                facts: items(0, &lens[0]),
                summaries: items(100, &lens[1]),
                snippets: items(200, &lens[2]),
                moments: items(300, &lens[3]),
                knowledge: items(400, &lens[4]),
            };
            let before = r.clone();
            enforce_budget(&mut r, qt, budget);
            prop_assert!(r.total_chars() <= budget);

            // Survivors are a prefix of each source's original list.
            for s in ContextSource::iter() {
                let kept = r.items(s);
                prop_assert_eq!(kept, &before.items(s)[..kept.len()]);
            }
        }
    }
}
