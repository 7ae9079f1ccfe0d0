/// Reconciliation of raw readings into per-hour dam records.
///
/// Submodules, in pipeline order:
/// - `timestamps` - provider timestamp parsing and the `CanonicalHour` join key.
/// - `gap_fill`   - per-metric series, forward-fill and incremental deltas.
/// - `storage`    - storage curve and flow derivations.
/// - `assemble`   - joins filled series into newest-first `DamRecord`s.

pub mod assemble;
pub mod gap_fill;
pub mod storage;
pub mod timestamps;
