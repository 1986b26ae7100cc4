//! Emergency response and hospital coordination dashboard

use super::{AppKind, DashboardView, RoleSet};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmergencyRole {
    Patient,
    Hospital,
    Ambulance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmergencyView {
    PatientDashboard,
    HospitalDashboard,
    AmbulanceDashboard,
}

impl RoleSet for EmergencyRole {
    type View = EmergencyView;

    const APP: AppKind = AppKind::Emergency;

    fn all() -> &'static [Self] {
        &[Self::Patient, Self::Hospital, Self::Ambulance]
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Hospital => "hospital",
            Self::Ambulance => "ambulance",
        }
    }

    fn dashboard(self) -> EmergencyView {
        match self {
            Self::Patient => EmergencyView::PatientDashboard,
            Self::Hospital => EmergencyView::HospitalDashboard,
            Self::Ambulance => EmergencyView::AmbulanceDashboard,
        }
    }
}

impl DashboardView for EmergencyView {
    fn title(&self) -> &'static str {
        match self {
            Self::PatientDashboard => "Patient Dashboard",
            Self::HospitalDashboard => "Hospital Dashboard",
            Self::AmbulanceDashboard => "Ambulance Dashboard",
        }
    }

    fn sections(&self) -> &'static [&'static str] {
        match self {
            Self::PatientDashboard => &["Request ambulance", "Nearby hospitals", "Medical history"],
            Self::HospitalDashboard => &["Incoming emergencies", "Bed availability", "Ambulance fleet"],
            Self::AmbulanceDashboard => &["Active dispatch", "Route to patient", "Hospital handoff"],
        }
    }
}
