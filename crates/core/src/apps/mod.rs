//! Role sets of the dashboard applications and role-based view dispatch
//!
//! Each application has a closed enumeration of roles. The mapping from role
//! to dashboard is an exhaustive `match` inside each role set, so adding a
//! role without a dashboard does not compile. Role strings that parse into
//! none of the variants render a fallback instead of failing.

pub mod emergency;
pub mod energy_monitor;
pub mod energy_predict;

use crate::identity::Identity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use tracing::warn;

pub use emergency::{EmergencyRole, EmergencyView};
pub use energy_monitor::{EnergyMonitorRole, EnergyMonitorView};
pub use energy_predict::{EnergyPredictRole, EnergyPredictView};

/// Which dashboard application is running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppKind {
    /// Emergency response / hospital coordination
    #[default]
    Emergency,
    /// Live energy monitoring
    EnergyMonitor,
    /// Energy consumption prediction
    EnergyPredict,
}

impl AppKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::EnergyMonitor => "energy-monitor",
            Self::EnergyPredict => "energy-predict",
        }
    }

    /// Role names accepted by this application
    pub fn role_names(self) -> Vec<&'static str> {
        match self {
            Self::Emergency => role_names::<EmergencyRole>(),
            Self::EnergyMonitor => role_names::<EnergyMonitorRole>(),
            Self::EnergyPredict => role_names::<EnergyPredictRole>(),
        }
    }
}

impl fmt::Display for AppKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppKind {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "emergency" => Ok(Self::Emergency),
            "energy-monitor" => Ok(Self::EnergyMonitor),
            "energy-predict" => Ok(Self::EnergyPredict),
            other => Err(crate::CoreError::invalid_config(format!(
                "unknown application '{other}'"
            ))),
        }
    }
}

/// A dashboard view
pub trait DashboardView: Clone + PartialEq + fmt::Debug + Send + Sync {
    fn title(&self) -> &'static str;

    /// Panels shown on the dashboard, in display order
    fn sections(&self) -> &'static [&'static str];
}

/// Closed set of roles for one application
pub trait RoleSet: Sized + Copy + Eq + fmt::Debug + Send + Sync + 'static {
    type View: DashboardView;

    const APP: AppKind;

    fn all() -> &'static [Self];

    fn as_str(self) -> &'static str;

    /// The one dashboard this role sees
    fn dashboard(self) -> Self::View;

    /// Case-insensitive parse of a role string
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::all()
            .iter()
            .copied()
            .find(|role| role.as_str().eq_ignore_ascii_case(raw))
    }
}

fn role_names<R: RoleSet>() -> Vec<&'static str> {
    R::all().iter().map(|role| role.as_str()).collect()
}

/// Outcome of role dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered<V> {
    View(V),
    /// The identity's role is not part of this application
    Fallback { role: String, message: String },
}

impl<V> Rendered<V> {
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Maps an identity's role to exactly one dashboard
pub struct RoleDispatcher<R> {
    _roles: PhantomData<R>,
}

impl<R> fmt::Debug for RoleDispatcher<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleDispatcher").finish()
    }
}

impl<R> Clone for RoleDispatcher<R> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<R> Default for RoleDispatcher<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> RoleDispatcher<R> {
    pub const fn new() -> Self {
        Self {
            _roles: PhantomData,
        }
    }
}

impl<R: RoleSet> RoleDispatcher<R> {
    pub fn dispatch(&self, identity: &Identity) -> Rendered<R::View> {
        self.dispatch_role(&identity.role)
    }

    pub fn dispatch_role(&self, role: &str) -> Rendered<R::View> {
        R::parse(role).map_or_else(
            || {
                warn!(app = %R::APP, role, "No dashboard for role");
                Rendered::Fallback {
                    role: role.to_string(),
                    message: format!("Unknown role: {role}. Please contact support."),
                }
            },
            |role| Rendered::View(role.dashboard()),
        )
    }
}
