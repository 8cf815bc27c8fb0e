//! Listing differ: picks the new files out of a full directory listing.

use crate::settings::TriggerMode;
use crate::watermark::Watermark;
use ftpwatch_client::RemoteEntry;

/// Files from `entries` that should trigger, oldest first.
///
/// Only regular files are kept. Under [`TriggerMode::ModifyDate`] a file must
/// carry a timestamp strictly after `watermark`; under [`TriggerMode::Always`]
/// every file is kept. Files with equal timestamps keep their listing order,
/// and files without a timestamp sort first.
pub fn diff(entries: Vec<RemoteEntry>, watermark: &Watermark, mode: TriggerMode) -> Vec<RemoteEntry> {
    let mut matched: Vec<RemoteEntry> = entries
        .into_iter()
        .filter(RemoteEntry::is_file)
        .filter(|e| match mode {
            TriggerMode::Always => true,
            TriggerMode::ModifyDate => e.modified.map_or(false, |m| watermark.is_passed_by(m)),
        })
        .collect();
    matched.sort_by_key(|e| e.modified);
    matched
}
