//! Weather tool — returns mock weather data.
//!
//! The data is derived from a hash of the location name, so the same
//! question always gets the same answer and runs need no network access.

use async_trait::async_trait;
use thinkloop_core::error::ToolError;
use thinkloop_core::tool::{ParameterType, ToolArguments, ToolDescriptor, ToolHandler};

pub const NAME: &str = "get_weather";

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor::function(
        NAME,
        "Get the current weather for a location. Returns temperature, conditions, humidity and wind.",
    )
    .param(
        "location",
        ParameterType::String,
        "The city name or location to look up weather for",
        true,
    )
    .param(
        "units",
        ParameterType::String,
        "Temperature units: \"metric\" (default) or \"imperial\"",
        false,
    )
}

pub struct GetWeather;

#[async_trait]
impl ToolHandler for GetWeather {
    async fn call(&self, arguments: ToolArguments) -> Result<String, ToolError> {
        // Presence and type are checked against the descriptor before dispatch.
        let location = arguments.str("location").unwrap_or_default().trim();
        if location.is_empty() {
            return Err(ToolError::ExecutionFailed {
                tool_name: NAME.into(),
                reason: "location must not be empty".into(),
            });
        }

        let units = match arguments.str("units").unwrap_or("metric") {
            "metric" => Units::Metric,
            "imperial" => Units::Imperial,
            other => {
                return Err(ToolError::ExecutionFailed {
                    tool_name: NAME.into(),
                    reason: format!("unknown units '{other}', expected metric or imperial"),
                });
            }
        };

        let report = mock_weather(location, units);
        serde_json::to_string(&report).map_err(|e| ToolError::ExecutionFailed {
            tool_name: NAME.into(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Units {
    Metric,
    Imperial,
}

#[derive(Debug, serde::Serialize)]
struct WeatherReport {
    location: String,
    temperature: f64,
    units: &'static str,
    conditions: &'static str,
    humidity: u32,
    wind_speed: f64,
    wind_direction: &'static str,
}

const CONDITIONS: [&str; 8] = [
    "Clear skies",
    "Partly cloudy",
    "Overcast",
    "Light rain",
    "Heavy rain",
    "Thunderstorms",
    "Snow",
    "Foggy",
];

const WIND_DIRECTIONS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

fn mock_weather(location: &str, units: Units) -> WeatherReport {
    let hash = location
        .to_lowercase()
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));

    let celsius = f64::from(hash % 40) - 5.0;
    let (temperature, label, wind_speed) = match units {
        Units::Metric => (celsius, "°C", f64::from(hash % 30) + 5.0),
        Units::Imperial => (celsius * 9.0 / 5.0 + 32.0, "°F", (f64::from(hash % 30) + 5.0) * 0.621),
    };

    WeatherReport {
        location: location.to_string(),
        temperature: (temperature * 10.0).round() / 10.0,
        units: label,
        conditions: CONDITIONS[(hash as usize / 7) % CONDITIONS.len()],
        humidity: 30 + hash % 60,
        wind_speed: (wind_speed * 10.0).round() / 10.0,
        wind_direction: WIND_DIRECTIONS[(hash as usize / 3) % WIND_DIRECTIONS.len()],
    }
}
