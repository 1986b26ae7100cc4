//! Energy consumption prediction webapp

use super::{AppKind, DashboardView, RoleSet};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyPredictRole {
    Analyst,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnergyPredictView {
    ForecastWorkspace,
    ModelAdministration,
}

impl RoleSet for EnergyPredictRole {
    type View = EnergyPredictView;

    const APP: AppKind = AppKind::EnergyPredict;

    fn all() -> &'static [Self] {
        &[Self::Analyst, Self::Admin]
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Analyst => "analyst",
            Self::Admin => "admin",
        }
    }

    fn dashboard(self) -> EnergyPredictView {
        match self {
            Self::Analyst => EnergyPredictView::ForecastWorkspace,
            Self::Admin => EnergyPredictView::ModelAdministration,
        }
    }
}

impl DashboardView for EnergyPredictView {
    fn title(&self) -> &'static str {
        match self {
            Self::ForecastWorkspace => "Forecast Workspace",
            Self::ModelAdministration => "Model Administration",
        }
    }

    fn sections(&self) -> &'static [&'static str] {
        match self {
            Self::ForecastWorkspace => &["Forecast", "Upload dataset", "Model accuracy"],
            Self::ModelAdministration => &["Users", "Model management", "Training runs"],
        }
    }
}
