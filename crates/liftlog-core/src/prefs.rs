//! User preferences and unit handling.
//!
//! A single `PreferencesHandle` owns the current `Preferences` value and is
//! the only place mutation happens; every other component reads a snapshot
//! or subscribes for changes. Weight is stored in kilograms everywhere -
//! conversion to and from the display unit lives here and nowhere else.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::models::RemoteProfile;

const KG_TO_LB: f64 = 2.20462;

/// Default rest between sets, in seconds.
const DEFAULT_REST_SECONDS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    /// Parse the free-form unit string stored on the remote profile.
    pub fn from_profile_value(value: &str) -> Self {
        if value.to_lowercase().contains("lb") {
            Units::Imperial
        } else {
            Units::Metric
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            Units::Metric => "kg",
            Units::Imperial => "lbs",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub units: Units,
    pub rest_seconds: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            units: Units::Metric,
            rest_seconds: DEFAULT_REST_SECONDS,
        }
    }
}

impl Preferences {
    /// Convert a canonical kilogram value to the display unit, rounded to
    /// one decimal place.
    pub fn to_display_weight(&self, kg: f64) -> f64 {
        let value = match self.units {
            Units::Metric => kg,
            Units::Imperial => kg * KG_TO_LB,
        };
        (value * 10.0).round() / 10.0
    }

    /// Convert a display-unit value back to kilograms, rounded to three
    /// decimal places.
    pub fn to_kg(&self, display: f64) -> f64 {
        if display.is_nan() {
            return 0.0;
        }
        let value = match self.units {
            Units::Metric => display,
            Units::Imperial => display / KG_TO_LB,
        };
        (value * 1000.0).round() / 1000.0
    }

    pub fn format_weight(&self, kg: Option<f64>) -> String {
        match kg {
            Some(kg) => format!("{} {}", self.to_display_weight(kg), self.units.suffix()),
            None => "--".to_string(),
        }
    }
}

/// Owner of the process-wide preferences value. Clone handles freely; all
/// clones publish into the same channel.
#[derive(Clone)]
pub struct PreferencesHandle {
    tx: std::sync::Arc<watch::Sender<Preferences>>,
}

impl PreferencesHandle {
    pub fn new(initial: Preferences) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            tx: std::sync::Arc::new(tx),
        }
    }

    pub fn current(&self) -> Preferences {
        *self.tx.borrow()
    }

    pub fn update(&self, units: Units, rest_seconds: u32) {
        self.tx.send_replace(Preferences {
            units,
            rest_seconds,
        });
    }

    /// Fold the preferences stored on the user's profile back in, e.g.
    /// after a cache refresh.
    pub fn refresh_from_profile(&self, profile: &RemoteProfile) {
        let units = profile
            .units
            .as_deref()
            .map(Units::from_profile_value)
            .unwrap_or_default();
        let rest_seconds = profile.default_rest_seconds.unwrap_or(DEFAULT_REST_SECONDS);
        self.update(units, rest_seconds);
    }

    pub fn subscribe(&self) -> watch::Receiver<Preferences> {
        self.tx.subscribe()
    }
}

impl Default for PreferencesHandle {
    fn default() -> Self {
        Self::new(Preferences::default())
    }
}

// ============================================================================
// Tests
// ============================================================================
