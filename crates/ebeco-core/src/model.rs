// ── Thermostat domain types ──
//
// Canonical state types consumed by the host collaborator. The wire
// `Device` is converted into `ThermostatState` at the reconciler
// boundary; snapshots are replaced wholesale on every refresh and
// compared field-by-field to produce `StateDelta` diffs.

use std::fmt;

use ebeco_api::Device;

/// Program currently selected on the thermostat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Program {
    Manual,
    Week,
    Timer,
    /// Wire value this client does not know about yet.
    Other(String),
}

impl Program {
    fn from_wire(value: &str) -> Self {
        match value {
            "Manual" => Self::Manual,
            "Week" => Self::Week,
            "Timer" => Self::Timer,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Manual => "Manual",
            Self::Week => "Week",
            Self::Timer => "Timer",
            Self::Other(value) => value,
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the currently selected program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramState {
    Standby,
    Active,
    Timer,
    /// Wire value this client does not know about yet.
    Other(String),
}

impl ProgramState {
    fn from_wire(value: &str) -> Self {
        match value {
            "Standby" => Self::Standby,
            "Active" => Self::Active,
            "Timer" => Self::Timer,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Standby => "Standby",
            Self::Active => "Active",
            Self::Timer => "Timer",
            Self::Other(value) => value,
        }
    }
}

impl fmt::Display for ProgramState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which physical sensor supplies the "current temperature" reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemperatureSensor {
    Floor,
    #[default]
    Room,
}

/// Point-in-time snapshot of one thermostat.
///
/// Identity is `id`; everything else is a copy of remote state, replaced
/// wholesale on every successful refresh (never field-merged).
#[derive(Debug, Clone, PartialEq)]
pub struct ThermostatState {
    pub id: i64,
    pub display_name: String,
    pub power_on: bool,
    pub selected_program: Program,
    pub program_state: ProgramState,
    /// Target temperature (°C, one decimal).
    pub target_temperature: f64,
    /// Floor sensor reading (°C).
    pub floor_temperature: f64,
    /// Room sensor reading (°C).
    pub room_temperature: f64,
    pub has_error: bool,
    pub error_message: Option<String>,
}

impl ThermostatState {
    /// The current temperature as reported by the configured sensor.
    pub fn current_temperature(&self, sensor: TemperatureSensor) -> f64 {
        match sensor {
            TemperatureSensor::Floor => self.floor_temperature,
            TemperatureSensor::Room => self.room_temperature,
        }
    }

    /// Fields of `self` that differ from `previous`.
    pub fn delta_from(&self, previous: &Self) -> StateDelta {
        StateDelta {
            display_name: (self.display_name != previous.display_name)
                .then(|| self.display_name.clone()),
            power_on: (self.power_on != previous.power_on).then_some(self.power_on),
            selected_program: (self.selected_program != previous.selected_program)
                .then(|| self.selected_program.clone()),
            program_state: (self.program_state != previous.program_state)
                .then(|| self.program_state.clone()),
            target_temperature: (self.target_temperature != previous.target_temperature)
                .then_some(self.target_temperature),
            floor_temperature: (self.floor_temperature != previous.floor_temperature)
                .then_some(self.floor_temperature),
            room_temperature: (self.room_temperature != previous.room_temperature)
                .then_some(self.room_temperature),
            has_error: (self.has_error != previous.has_error).then_some(self.has_error),
            error_message: (self.error_message != previous.error_message)
                .then(|| self.error_message.clone()),
        }
    }
}

impl From<Device> for ThermostatState {
    fn from(device: Device) -> Self {
        Self {
            id: device.id,
            display_name: device.display_name,
            power_on: device.power_on,
            selected_program: Program::from_wire(&device.selected_program),
            program_state: ProgramState::from_wire(&device.program_state),
            target_temperature: device.temperature_set,
            floor_temperature: device.temperature_floor,
            room_temperature: device.temperature_room,
            has_error: device.has_error,
            error_message: device.error_message,
        }
    }
}

/// Changed fields between two snapshots of the same device.
///
/// `None` means unchanged. `error_message` is doubly optional: the outer
/// layer marks change, the inner value is the new (possibly cleared)
/// message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    pub display_name: Option<String>,
    pub power_on: Option<bool>,
    pub selected_program: Option<Program>,
    pub program_state: Option<ProgramState>,
    pub target_temperature: Option<f64>,
    pub floor_temperature: Option<f64>,
    pub room_temperature: Option<f64>,
    pub has_error: Option<bool>,
    pub error_message: Option<Option<String>>,
}

impl StateDelta {
    /// `true` when no field changed.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
