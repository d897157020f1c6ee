/*!
 * Resumable translation progress.
 *
 * - `models`: the snapshot, its per-text entries and the batch records merged into it
 * - `store`: loading and crash-atomic persistence of the snapshot
 */

pub mod models;
pub mod store;

pub use self::models::{
    MergeStats, ProgressSnapshot, RecordOutcome, TextProgress, TranslationRecord, TranslationStatus,
};
pub use self::store::{ProgressStore, read_snapshot};
