use std::collections::HashSet;

#[derive(Debug, Clone)]
struct PendingRelease {
    index: usize,
    due_ms: f64,
    generation: u64,
}

/// Per-index cooldown with delayed release.
///
/// Releases are queued like timers and cannot be cancelled. Each one
/// carries the generation it was scheduled in; `new_generation` makes every
/// queued release from earlier sessions a no-op.
#[derive(Debug, Default, Clone)]
pub struct Cooldowns {
    active: HashSet<usize>,
    pending: Vec<PendingRelease>,
    generation: u64,
}

impl Cooldowns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn start(&mut self, index: usize, now_ms: f64, duration_ms: f64) {
        self.active.insert(index);
        self.pending.push(PendingRelease {
            index,
            due_ms: now_ms + duration_ms,
            generation: self.generation,
        });
    }

    pub fn is_cooling(&self, index: usize) -> bool {
        self.active.contains(&index)
    }

    /// Apply every release that has come due by `now_ms`.
    pub fn release_due(&mut self, now_ms: f64) {
        let generation = self.generation;
        let active = &mut self.active;
        self.pending.retain(|release| {
            if release.due_ms > now_ms {
                return true;
            }
            if release.generation == generation {
                active.remove(&release.index);
            }
            false
        });
    }

    /// Start a new session: clear active cooldowns and orphan queued releases.
    pub fn new_generation(&mut self) {
        self.generation += 1;
        self.active.clear();
    }
}
