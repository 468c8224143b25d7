//! Pipeline running statistics.

/// Counters accumulated by the coordinator, reported at shutdown.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Tick loop iterations completed.
    pub ticks: u64,
    /// Ticks on which the threat snapshot was non-empty.
    pub threat_ticks: u64,
    /// Detection cycles dispatched to the capability.
    pub cycles_dispatched: u64,
    /// Dispatches dropped because a cycle was still in flight.
    pub cycles_dropped: u64,
    /// Alerts claimed against the cooldown (including failed deliveries).
    pub alerts_fired: u64,
    /// Evidence segments finalized.
    pub segments_written: u64,
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pipeline: {} ticks ({} with threats), {} detection cycles ({} dropped), {} alerts, {} segments",
            self.ticks,
            self.threat_ticks,
            self.cycles_dispatched,
            self.cycles_dropped,
            self.alerts_fired,
            self.segments_written
        )
    }
}
