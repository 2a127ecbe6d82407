//! Tests for ordered override providers

use crate::services::overrides::TimerOverrides;
use crate::traits::MockTimerOverride;
use mockall::Sequence;
use shared::{TimeoutSettings, UnitInfo};
use std::sync::Arc;

#[test]
fn test_empty_overrides_decline() {
    let overrides = TimerOverrides::new();
    let unit = UnitInfo::new("suite::test_none");
    assert!(overrides.is_empty());
    assert!(!overrides.try_set_timer(&unit, &TimeoutSettings::disabled()));
    assert!(!overrides.try_cancel_timer(&unit));
}

#[test]
fn test_first_accepting_provider_wins() {
    let mut sequence = Sequence::new();

    let mut first = MockTimerOverride::new();
    first
        .expect_try_set_timer()
        .times(1)
        .in_sequence(&mut sequence)
        .return_const(false);

    let mut second = MockTimerOverride::new();
    second
        .expect_try_set_timer()
        .withf(|unit, _| unit.node_id == "suite::test_owned")
        .times(1)
        .in_sequence(&mut sequence)
        .return_const(true);

    let mut third = MockTimerOverride::new();
    third.expect_try_set_timer().never();

    let mut overrides = TimerOverrides::new();
    overrides.register(Arc::new(first));
    overrides.register(Arc::new(second));
    overrides.register(Arc::new(third));
    assert_eq!(overrides.len(), 3);

    let unit = UnitInfo::new("suite::test_owned");
    assert!(overrides.try_set_timer(&unit, &TimeoutSettings::disabled()));
}

#[test]
fn test_cancel_consults_providers_in_order() {
    let mut first = MockTimerOverride::new();
    first.expect_try_cancel_timer().times(1).return_const(true);

    let mut second = MockTimerOverride::new();
    second.expect_try_cancel_timer().never();

    let mut overrides = TimerOverrides::new();
    overrides.register(Arc::new(first));
    overrides.register(Arc::new(second));

    assert!(overrides.try_cancel_timer(&UnitInfo::new("suite::test_cancel")));
}
