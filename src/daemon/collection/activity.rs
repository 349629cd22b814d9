pub struct IdleEvaluator {
    threshold_ms: u32,
}

impl IdleEvaluator {
    pub fn from_seconds(threshold_s: u32) -> Self {
        // The threshold comes straight from a CLI flag and can be anything.
        Self {
            threshold_ms: threshold_s.saturating_mul(1000),
        }
    }

    pub fn is_idle(&self, idle_time: u32) -> bool {
        self.threshold_ms < idle_time
    }
}

#[cfg(test)]
mod tests {
    use super::IdleEvaluator;

    #[test]
    fn idle_only_past_threshold() {
        let evaluator = IdleEvaluator::from_seconds(120);
        assert!(!evaluator.is_idle(0));
        assert!(!evaluator.is_idle(120_000));
        assert!(evaluator.is_idle(120_001));
    }

    #[test]
    fn oversized_threshold_clamps_instead_of_overflowing() {
        let evaluator = IdleEvaluator::from_seconds(u32::MAX);
        assert!(!evaluator.is_idle(u32::MAX));
    }
}
