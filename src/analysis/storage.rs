/// Storage and flow derivations.
///
/// ## Storage curve
///
/// Storage is estimated from pool elevation with an exponential curve:
///
/// ```text
/// d   = clamp((level - dead) / (flood - dead), 0, 1)
/// pct = 100 * d^k                      for dead <= level <= flood
/// pct = 100 + s * (level - flood) / (mwl - flood), capped at 100 + s
///                                      for level above flood pool
/// ```
///
/// `k` (2.2 unless calibrated per dam) stands in for the way a natural basin
/// widens with depth, and `s` (15 points by default) is the surcharge
/// allowance between flood pool and maximum water level. Both are
/// hand-calibrated approximations, not USACE storage tables; regression
/// tests must use this same formula.
///
/// ## Flows
///
/// Turbine flow is whatever part of the total release did not go over the
/// spillway, clamped at zero, and total outflow is rebuilt as turbine +
/// spillway so it can never be below the spillway release.

use crate::config::DamSpec;

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Fraction of the dead-storage → flood-pool depth currently filled,
/// clamped to [0, 1].
pub fn depth_ratio(level_ft: f64, dam: &DamSpec) -> f64 {
    let span = dam.flood_pool_level - dam.dead_storage_level;
    ((level_ft - dam.dead_storage_level) / span).clamp(0.0, 1.0)
}

/// Percentage of flood-pool storage in use. 0 at or below dead storage,
/// 100 at flood pool, up to `100 + surcharge_percent` at maximum water level.
pub fn storage_percentage(level_ft: f64, dam: &DamSpec) -> f64 {
    if level_ft <= dam.dead_storage_level {
        return 0.0;
    }
    if level_ft <= dam.flood_pool_level {
        return 100.0 * depth_ratio(level_ft, dam).powf(dam.storage_exponent);
    }

    let surcharge_span = dam.max_water_level - dam.flood_pool_level;
    if dam.surcharge_percent <= 0.0 || surcharge_span <= 0.0 {
        return 100.0;
    }
    let progress = ((level_ft - dam.flood_pool_level) / surcharge_span).min(1.0);
    100.0 + dam.surcharge_percent * progress
}

/// Live storage volume (acre-feet) on the same curve, scaled to the dam's
/// calibrated flood-pool volume.
pub fn live_storage_af(level_ft: f64, dam: &DamSpec) -> f64 {
    dam.flood_pool_storage_af * storage_percentage(level_ft, dam) / 100.0
}

// ---------------------------------------------------------------------------
// Flows
// ---------------------------------------------------------------------------

/// Raw flow-related readings for one hour. Any of them may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlowInputs {
    pub inflow_cfs: Option<f64>,
    pub total_outflow_cfs: Option<f64>,
    pub powerhouse_cfs: Option<f64>,
    pub spillway_cfs: Option<f64>,
    pub generation_mwh: Option<f64>,
}

/// Flow quantities derived from [`FlowInputs`]. Fields whose inputs were
/// missing stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DerivedFlows {
    pub turbine_cfs: Option<f64>,
    pub total_outflow_cfs: Option<f64>,
    pub net_flow_cfs: Option<f64>,
    pub turbine_efficiency: Option<f64>,
}

/// Turbine flow from a total release and the spillway share of it.
pub fn turbine_flow(total_outflow_cfs: f64, spillway_cfs: f64) -> f64 {
    (total_outflow_cfs - spillway_cfs).max(0.0)
}

/// Generation per unit of turbine flow; 0 when the turbines are idle.
pub fn turbine_efficiency(generation_mwh: f64, turbine_cfs: f64) -> f64 {
    if turbine_cfs > 0.0 {
        generation_mwh / turbine_cfs
    } else {
        0.0
    }
}

pub fn derive_flows(inputs: &FlowInputs) -> DerivedFlows {
    let spill = inputs.spillway_cfs.unwrap_or(0.0);

    // A reported total release wins over a separately reported powerhouse
    // figure; the latter is only used when no total is available.
    let turbine = match (inputs.total_outflow_cfs, inputs.powerhouse_cfs) {
        (Some(total), _) => Some(turbine_flow(total, spill)),
        (None, Some(powerhouse)) => Some(powerhouse.max(0.0)),
        (None, None) => None,
    };

    let total = match turbine {
        Some(t) => Some(t + spill),
        None => inputs.spillway_cfs,
    };

    let net = match (inputs.inflow_cfs, total) {
        (Some(inflow), Some(out)) => Some(inflow - out),
        _ => None,
    };

    let efficiency = match (inputs.generation_mwh, turbine) {
        (Some(generation), Some(t)) => Some(turbine_efficiency(generation, t)),
        _ => None,
    };

    DerivedFlows {
        turbine_cfs: turbine,
        total_outflow_cfs: total,
        net_flow_cfs: net,
        turbine_efficiency: efficiency,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
