//! Live energy monitoring dashboard

use super::{AppKind, DashboardView, RoleSet};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyMonitorRole {
    Consumer,
    Operator,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnergyMonitorView {
    ConsumptionDashboard,
    GridDashboard,
    AdminConsole,
}

impl RoleSet for EnergyMonitorRole {
    type View = EnergyMonitorView;

    const APP: AppKind = AppKind::EnergyMonitor;

    fn all() -> &'static [Self] {
        &[Self::Consumer, Self::Operator, Self::Admin]
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Consumer => "consumer",
            Self::Operator => "operator",
            Self::Admin => "admin",
        }
    }

    fn dashboard(self) -> EnergyMonitorView {
        match self {
            Self::Consumer => EnergyMonitorView::ConsumptionDashboard,
            Self::Operator => EnergyMonitorView::GridDashboard,
            Self::Admin => EnergyMonitorView::AdminConsole,
        }
    }
}

impl DashboardView for EnergyMonitorView {
    fn title(&self) -> &'static str {
        match self {
            Self::ConsumptionDashboard => "My Consumption",
            Self::GridDashboard => "Grid Operations",
            Self::AdminConsole => "Administration",
        }
    }

    fn sections(&self) -> &'static [&'static str] {
        match self {
            Self::ConsumptionDashboard => &["Live consumption", "Usage history", "Alerts"],
            Self::GridDashboard => &["Grid overview", "Meter health", "Alerts"],
            Self::AdminConsole => &["Users", "Meters", "System settings"],
        }
    }
}
