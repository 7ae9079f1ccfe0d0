/// Persistent state: per-dam history files and the `live.json` snapshot.
///
/// - `merge`    - completeness-wins merge of new records into a history.
/// - `store`    - JSON file reading and writing.
/// - `snapshot` - rebuilding the consolidated live view.

pub mod merge;
pub mod snapshot;
pub mod store;
