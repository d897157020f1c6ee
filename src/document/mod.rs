/*!
 * Document model for translatable JSON trees.
 *
 * - `locator`: finds every translatable string and the path to it
 * - `dedup`: collapses identical strings into `UniqueText`s
 * - `reintegrate`: writes translations back into per-language copies
 */

pub mod dedup;
pub mod locator;
pub mod reintegrate;

pub use self::dedup::{TextId, UniqueText, deduplicate};
pub use self::locator::{FieldLocator, Locator, PathSegment, TextOccurrence};
pub use self::reintegrate::{ReintegrationWarning, TranslatedDocument, WarningReason, reintegrate};
