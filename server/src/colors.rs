// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use lazy_static::lazy_static;

lazy_static! {
    // The 18 selection colors offered for trackers, in display order.
    static ref PALETTE: Vec<String> = [
        "#FD4C49", // Red
        "#FF881E", // Orange
        "#007BFA", // Blue
        "#6E44FE", // Violet
        "#33CF69", // Green
        "#E66DD4", // Orchid
        "#F9D4D4", // Pale pink
        "#34A7FE", // Sky blue
        "#46E69D", // Mint
        "#35347C", // Navy
        "#FF674D", // Coral
        "#FF99CC", // Pink
        "#F6C48B", // Sand
        "#7994F5", // Periwinkle
        "#832CF1", // Purple
        "#AD56DA", // Lilac
        "#8D72E6", // Lavender
        "#2FD058", // Emerald
    ]
    .iter()
    .map(|color| color.to_string())
    .collect();
}

pub fn palette() -> &'static [String] {
    PALETTE.as_slice()
}

/// Whether a color is a `#RRGGBB` hex string.
pub fn is_valid_hex_color(color: &str) -> bool {
    match color.strip_prefix('#') {
        Some(hex) => hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// Picks a color for a new tracker: the first palette color no tracker uses
/// yet, or the least used one once the palette is exhausted (earliest wins
/// on ties).
pub fn pick_color(used: &[String]) -> String {
    let usage = |color: &String| {
        used.iter()
            .filter(|u| u.eq_ignore_ascii_case(color))
            .count()
    };

    // min_by_key keeps the first of equal minimums
    PALETTE
        .iter()
        .min_by_key(|&color| usage(color))
        .cloned()
        .unwrap_or_else(|| PALETTE[0].clone())
}
