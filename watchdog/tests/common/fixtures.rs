//! Test fixtures for watchdog integration tests

use shared::{Marker, MarkerChain, SettingValue, UnitInfo};
use watchdog::{LayerValues, LayeredSources};

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    pub const UNIT: &'static str = "suite::group::test_unit";

    /// Every non-marker layer set at once, each to a distinct value
    pub fn all_layers() -> LayeredSources {
        LayeredSources::default()
            .with_command_line(LayerValues {
                timeout: Some(SettingValue::from(3)),
                method: Some(SettingValue::from("signal")),
                ..LayerValues::default()
            })
            .with_environment(Some("4".to_string()))
            .with_config_file(LayerValues {
                timeout: Some(SettingValue::from(5)),
                method: Some(SettingValue::from("thread")),
                func_only: Some(SettingValue::from(true)),
                session_timeout: Some(SettingValue::from(60)),
                disable_debugger_detection: Some(SettingValue::from(false)),
            })
    }

    pub fn only_config_file() -> LayeredSources {
        LayeredSources::default()
            .with_environment(Some("4".to_string()))
            .with_config_file(LayerValues {
                timeout: Some(SettingValue::from(5)),
                method: Some(SettingValue::from("thread")),
                ..LayerValues::default()
            })
    }

    pub fn plain_unit() -> UnitInfo {
        UnitInfo::new(Self::UNIT)
    }

    /// Unit marked `timeout(1)` inside a group marked `timeout(2, "thread")`
    pub fn nested_unit() -> UnitInfo {
        UnitInfo::new(Self::UNIT).with_markers(
            MarkerChain::default()
                .with_own(Marker::deadline(1))
                .with_enclosing(Marker::deadline(2).arg("thread")),
        )
    }

    pub fn marked_unit(marker: Marker) -> UnitInfo {
        UnitInfo::new(Self::UNIT).with_markers(MarkerChain::default().with_own(marker))
    }
}
