use std::time::Duration;

/// Batching parameters for one result set. Bigger sets reveal in bigger
/// chunks after shorter pauses so the table fills without freezing the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealPlan {
    pub initial: usize,
    pub chunk: usize,
    pub delay: Duration,
}

impl RevealPlan {
    pub fn for_total(total: usize) -> Self {
        let chunk = if total > 2000 {
            500
        } else if total > 200 {
            120
        } else {
            40
        };
        let delay = Duration::from_millis(if total > 2000 { 35 } else { 75 });
        Self {
            initial: total.min(20),
            chunk,
            delay,
        }
    }
}

/// Progressive-reveal cursor over a sorted result set. Every reset bumps the
/// version; an advance scheduled against an older version is discarded, so a
/// late timer tick can never append rows from a superseded result set.
#[derive(Debug, Clone)]
pub struct Reveal {
    version: u64,
    total: usize,
    shown: usize,
    plan: RevealPlan,
}

impl Default for Reveal {
    fn default() -> Self {
        Self::new()
    }
}

impl Reveal {
    pub fn new() -> Self {
        Self {
            version: 0,
            total: 0,
            shown: 0,
            plan: RevealPlan::for_total(0),
        }
    }

    pub fn reset(&mut self, total: usize) {
        self.version += 1;
        self.plan = RevealPlan::for_total(total);
        self.total = total;
        self.shown = self.plan.initial;
    }

    /// Grow by one chunk. Returns false (and changes nothing) when `version`
    /// is stale or the set is already fully revealed.
    pub fn advance(&mut self, version: u64) -> bool {
        if version != self.version || self.is_complete() {
            return false;
        }
        self.shown = (self.shown + self.plan.chunk).min(self.total);
        true
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn shown(&self) -> usize {
        self.shown
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_complete(&self) -> bool {
        self.shown >= self.total
    }

    pub fn delay(&self) -> Duration {
        self.plan.delay
    }
}
