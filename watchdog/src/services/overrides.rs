//! Ordered timer override providers

use crate::traits::TimerOverride;
use shared::{TimeoutSettings, UnitInfo, unit_debug};
use std::sync::Arc;

/// Override providers in registration order; the first to accept wins
#[derive(Clone, Default)]
pub struct TimerOverrides {
    providers: Vec<Arc<dyn TimerOverride>>,
}

impl TimerOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn TimerOverride>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Offer the arm step to each provider; true when one took it
    pub fn try_set_timer(&self, unit: &UnitInfo, settings: &TimeoutSettings) -> bool {
        let taken = self
            .providers
            .iter()
            .position(|provider| provider.try_set_timer(unit, settings));
        if let Some(index) = taken {
            unit_debug!(unit, "🔌 Timer armed by override provider #{}", index);
        }
        taken.is_some()
    }

    /// Offer the disarm step to each provider; true when one took it
    pub fn try_cancel_timer(&self, unit: &UnitInfo) -> bool {
        let taken = self
            .providers
            .iter()
            .position(|provider| provider.try_cancel_timer(unit));
        if let Some(index) = taken {
            unit_debug!(unit, "🔌 Timer cancelled by override provider #{}", index);
        }
        taken.is_some()
    }
}
