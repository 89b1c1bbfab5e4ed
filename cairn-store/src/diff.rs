//! Unified diffs of index documents for `--dry-run` output.

use similar::TextDiff;

use cairn_core::ReleaseIndex;

use crate::error::StoreError;

/// Diff the pretty-printed JSON of two indexes. An index with no releases
/// and no metadata renders as an empty document, so a first publication
/// shows as pure additions.
pub fn index_diff(
    before: &ReleaseIndex,
    after: &ReleaseIndex,
    location: &str,
) -> Result<String, StoreError> {
    let old = render(before)?;
    let new = render(after)?;
    if old == new {
        return Ok(String::new());
    }
    let old_header = format!("a/{location}");
    let new_header = format!("b/{location}");
    Ok(TextDiff::from_lines(&old, &new)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string())
}

fn render(index: &ReleaseIndex) -> Result<String, StoreError> {
    if *index == ReleaseIndex::default() {
        return Ok(String::new());
    }
    let mut text = index.to_json_pretty()?;
    text.push('\n');
    Ok(text)
}
