use std::fmt::Display;

/// Per-series counters for one update run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpdateStats {
    pub discovered: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

impl Display for UpdateStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} event(s) discovered: {} new, {} updated, {} failed",
            self.discovered, self.created, self.updated, self.failed
        )
    }
}

/// Totals across all source files of one invocation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub updated: usize,
    pub skipped: usize,
    pub invalid: usize,
    pub failed: usize,
    pub events: UpdateStats,
}

impl RunStats {
    pub fn add_updated(&mut self, stats: UpdateStats) {
        self.updated += 1;
        self.events.discovered += stats.discovered;
        self.events.created += stats.created;
        self.events.updated += stats.updated;
        self.events.failed += stats.failed;
    }

    pub fn files(&self) -> usize {
        self.updated + self.skipped + self.invalid + self.failed
    }
}

impl Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nStatistics:")?;
        writeln!(f, "  Files updated:  {}", self.updated)?;
        writeln!(f, "  Files skipped:  {}", self.skipped)?;
        writeln!(f, "  Files invalid:  {}", self.invalid)?;
        writeln!(f, "  Files failed:   {}", self.failed)?;
        writeln!(f, "  Total files:    {}", self.files())?;
        writeln!(f, "  Events:         {}", self.events)
    }
}
