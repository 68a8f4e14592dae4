//! Capability traits supplied by the embedding process.

/// Identifier of one unit in the compute pool.
pub type UnitId = u32;

/// Brings units online/offline and reports pool membership.
///
/// Implementations are free to take their time in `bring_online` /
/// `take_offline`; the governor applies at most one action per tick and
/// never retries a failed action within the same tick.
pub trait UnitManager: Send + 'static {
    fn bring_online(&mut self, unit: UnitId) -> anyhow::Result<()>;
    fn take_offline(&mut self, unit: UnitId) -> anyhow::Result<()>;
    fn is_online(&self, unit: UnitId) -> bool;
    /// All physically present units, ascending by id.
    fn present_units(&self) -> Vec<UnitId>;
}

/// Reads per-unit operating rates.
///
/// `None` means the rate is momentarily unknown (e.g. the unit went offline
/// mid-sample); the sampler excludes such units from the snapshot rather
/// than failing the tick.
pub trait RateProbe: Send + 'static {
    fn current_rate(&self, unit: UnitId) -> Option<u64>;
    fn max_rate(&self, unit: UnitId) -> Option<u64>;
}
