// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The rendered, source-grouped context handed to reply generation.

use strum::IntoEnumIterator;

use crate::budget::{ContextItem, ContextSource, Retrieved};
use crate::classifier::QueryType;

/// Appended to every remember-query context.
pub const REMEMBER_DIRECTIVE: &str = "The user is asking about something they told you before. \
Answer only from the memories above. If no memory evidence is present, say plainly that \
you don't have that in your history. Do not invent it.";

fn heading(source: ContextSource) -> &'static str {
    match source {
        ContextSource::Facts => "What the user has told you",
        ContextSource::Summaries => "Earlier conversations",
        ContextSource::Snippets => "Things the user said recently",
        ContextSource::Moments => "Good moments the user shared",
        ContextSource::Knowledge => "Reference material",
    }
}

/// Truncate to at most `cap` characters, marking the cut with an ellipsis.
pub fn truncate_chars(text: &str, cap: usize) -> String {
    if text.chars().count() <= cap {
        return text.to_string();
    }
    if cap == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(cap - 1).collect();
    out.push('…');
    out
}

/// Items from one source, in ranking order.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextSection {
    pub source: ContextSource,
    pub items: Vec<ContextItem>,
}

/// Context for one query: retrieved items grouped by source, each already
/// cut to the per-item cap, plus the remember directive when applicable.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextBlock {
    pub query_type: QueryType,
    /// Non-empty sections in fixed source order.
    pub sections: Vec<ContextSection>,
    /// Instruction appended after the sections, set for remember-queries.
    pub directive: Option<&'static str>,
}

impl ContextBlock {
    /// A block with no retrieved items.
    pub fn empty(query_type: QueryType) -> Self {
        Self {
            query_type,
            sections: Vec::new(),
            directive: directive_for(query_type),
        }
    }

    /// Group budgeted results by source and cut each item to
    /// `item_char_cap` characters.
    pub fn from_retrieved(query_type: QueryType, retrieved: Retrieved, item_char_cap: usize) -> Self {
        let sections = ContextSource::iter()
            .filter_map(|source| {
                let items: Vec<ContextItem> = retrieved
                    .items(source)
                    .iter()
                    .map(|item| ContextItem {
                        content: truncate_chars(&item.content, item_char_cap),
                        ..item.clone()
                    })
                    .collect();
                (!items.is_empty()).then_some(ContextSection { source, items })
            })
            .collect();
        Self {
            query_type,
            sections,
            directive: directive_for(query_type),
        }
    }

    pub fn items(&self, source: ContextSource) -> &[ContextItem] {
        self.sections
            .iter()
            .find(|s| s.source == source)
            .map(|s| s.items.as_slice())
            .unwrap_or(&[])
    }

    /// Sources that contributed at least one item.
    pub fn sources_used(&self) -> Vec<ContextSource> {
        self.sections.iter().map(|s| s.source).collect()
    }

    pub fn item_count(&self) -> usize {
        self.sections.iter().map(|s| s.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }

    /// Text for the system prompt. Empty when there is nothing to say.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            out.push_str("## ");
            out.push_str(heading(section.source));
            out.push('\n');
            for item in &section.items {
                out.push_str("- ");
                out.push_str(&item.content);
                out.push('\n');
            }
            out.push('\n');
        }
        if let Some(directive) = self.directive {
            out.push_str(directive);
            out.push('\n');
        }
        out.trim_end().to_string()
    }
}

fn directive_for(query_type: QueryType) -> Option<&'static str> {
    (query_type == QueryType::Remember).then_some(REMEMBER_DIRECTIVE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, content: &str) -> ContextItem {
        ContextItem {
            id,
            content: content.into(),
            score: 0.5,
            created_at: None,
        }
    }

    #[test]
    fn truncation_respects_cap_and_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdef", 4), "abc…");
        assert_eq!(truncate_chars("привет мир", 4).chars().count(), 4);
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn render_groups_by_source_in_fixed_order() {
        let retrieved = Retrieved {
            knowledge: vec![item(9, "Box breathing: inhale 4, hold 4, exhale 4")],
            facts: vec![item(1, "User's sister Maria was promoted to manager")],
            ..Default::default()
        };
        let block = ContextBlock::from_retrieved(QueryType::Personal, retrieved, 600);
        assert_eq!(block.sources_used(), vec![ContextSource::Facts, ContextSource::Knowledge]);

        let text = block.render();
        let facts_at = text.find("What the user has told you").unwrap();
        let knowledge_at = text.find("Reference material").unwrap();
        assert!(facts_at < knowledge_at);
        assert!(text.contains("- User's sister Maria was promoted to manager"));
        assert!(!text.contains(REMEMBER_DIRECTIVE));
    }

    #[test]
    fn remember_block_carries_directive_even_when_empty() {
        let block = ContextBlock::empty(QueryType::Remember);
        assert!(block.is_empty());
        assert_eq!(block.render(), REMEMBER_DIRECTIVE);
        assert_eq!(ContextBlock::empty(QueryType::General).render(), "");
    }

    #[test]
    fn items_are_capped() {
        let retrieved = Retrieved {
            snippets: vec![item(3, &"long ".repeat(200))],
            ..Default::default()
        };
        let block = ContextBlock::from_retrieved(QueryType::General, retrieved, 50);
        assert_eq!(block.items(ContextSource::Snippets)[0].content.chars().count(), 50);
    }
}
