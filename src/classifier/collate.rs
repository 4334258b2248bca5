//! Name ordering for participant lists, following Norwegian alphabet order
//! (`... x y z æ ø å`) with case and common accents folded.

use std::cmp::Ordering;

fn rank(c: char) -> u32 {
    match c {
        'æ' | 'ä' => 'z' as u32 + 1,
        'ø' | 'ö' => 'z' as u32 + 2,
        'å' => 'z' as u32 + 3,
        'á' | 'à' | 'â' => 'a' as u32,
        'é' | 'è' | 'ê' => 'e' as u32,
        'ó' | 'ò' | 'ô' => 'o' as u32,
        'ü' => 'y' as u32,
        other => other as u32,
    }
}

/// Folded sort key for a display name.
pub fn collation_key(name: &str) -> Vec<u32> {
    name.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(rank)
        .collect()
}

pub fn compare_names(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}
