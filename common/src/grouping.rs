// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use serde::{Deserialize, Serialize};

use crate::{Category, PINNED_SECTION_TITLE, Tracker, UNCATEGORIZED_SECTION_TITLE};

/// One display group of trackers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Section<T> {
    pub title: String,
    // None for the pinned and uncategorized sections.
    pub category_id: Option<i64>,
    pub items: Vec<T>,
}

/// Groups items for display: pinned first, then one section per category
/// ordered by title, then trackers without a known category.
///
/// Empty sections are dropped. Items keep their relative order.
pub fn group_into_sections<T>(items: Vec<T>, categories: &[Category]) -> Vec<Section<T>>
where
    T: AsRef<Tracker>,
{
    let mut ordered: Vec<&Category> = categories.iter().collect();
    ordered.sort_by(|a, b| {
        a.title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then(a.id.cmp(&b.id))
    });

    let mut pinned = Vec::new();
    let mut by_category: Vec<Vec<T>> = ordered.iter().map(|_| Vec::new()).collect();
    let mut uncategorized = Vec::new();

    for item in items {
        let tracker = item.as_ref();
        if tracker.pinned {
            pinned.push(item);
            continue;
        }
        let slot = tracker
            .category_id
            .and_then(|id| ordered.iter().position(|category| category.id == id));
        match slot {
            Some(slot) => by_category[slot].push(item),
            None => uncategorized.push(item),
        }
    }

    let mut sections = Vec::with_capacity(ordered.len() + 2);
    sections.push(Section {
        title: PINNED_SECTION_TITLE.to_string(),
        category_id: None,
        items: pinned,
    });
    for (category, items) in ordered.into_iter().zip(by_category) {
        sections.push(Section {
            title: category.title.clone(),
            category_id: Some(category.id),
            items,
        });
    }
    sections.push(Section {
        title: UNCATEGORIZED_SECTION_TITLE.to_string(),
        category_id: None,
        items: uncategorized,
    });

    sections.retain(|section| !section.items.is_empty());
    sections
}
