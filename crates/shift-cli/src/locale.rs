//! User-facing labels in the supported languages.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use shift_core::{ClockEventType, ClockState};

/// Output language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    #[default]
    Es,
}

impl Locale {
    pub const fn event_label(self, event_type: ClockEventType) -> &'static str {
        match (self, event_type) {
            (Self::En, ClockEventType::In) => "Clock In",
            (Self::En, ClockEventType::Out) => "Clock Out",
            (Self::En, ClockEventType::PauseStart) => "Break Start",
            (Self::En, ClockEventType::PauseEnd) => "Break End",
            (Self::Es, ClockEventType::In) => "Entrada",
            (Self::Es, ClockEventType::Out) => "Salida",
            (Self::Es, ClockEventType::PauseStart) => "Inicio Pausa",
            (Self::Es, ClockEventType::PauseEnd) => "Fin Pausa",
        }
    }

    pub const fn status_label(self, state: ClockState) -> &'static str {
        match (self, state) {
            (Self::En, ClockState::Out) => "Clocked Out",
            (Self::En, ClockState::In) => "Clocked In",
            (Self::En, ClockState::OnBreak) => "On Break",
            (Self::Es, ClockState::Out) => "Inactivo",
            (Self::Es, ClockState::In) => "Trabajando",
            (Self::Es, ClockState::OnBreak) => "En Pausa",
        }
    }

    /// CSV export column headers.
    pub const fn export_headers(self) -> [&'static str; 7] {
        match self {
            Self::En => [
                "Worker",
                "Email",
                "Event Type",
                "Date and Time",
                "Source",
                "IP",
                "Browser",
            ],
            Self::Es => [
                "Trabajador",
                "Email",
                "Tipo de Evento",
                "Fecha y Hora",
                "Origen",
                "IP",
                "Navegador",
            ],
        }
    }

    /// Written instead of an empty CSV.
    pub const fn no_data(self) -> &'static str {
        match self {
            Self::En => "No data available",
            Self::Es => "No hay datos disponibles",
        }
    }
}
