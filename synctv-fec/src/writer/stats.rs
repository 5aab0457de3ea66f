use {
    crate::packet::{Blknum, StreamTimestamp},
    serde::Serialize,
};

/// Snapshot of writer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriterStats {
    pub alive: bool,
    /// Geometry of the block in progress (or the last one).
    pub sblen: usize,
    pub rblen: usize,
    /// Number of the block in progress.
    pub block_number: Blknum,
    pub blocks_completed: u64,
    pub source_packets: u64,
    pub repair_packets: u64,
    /// Source packets refused by validation.
    pub rejected_packets: u64,
    pub max_block_duration: StreamTimestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_serialize() {
        let stats = WriterStats {
            alive: true,
            sblen: 18,
            rblen: 10,
            block_number: 3,
            max_block_duration: 2880,
            ..WriterStats::default()
        };

        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["alive"], true);
        assert_eq!(json["sblen"], 18);
        assert_eq!(json["block_number"], 3);
        assert_eq!(json["max_block_duration"], 2880);
        assert_eq!(json["rejected_packets"], 0);
    }
}
