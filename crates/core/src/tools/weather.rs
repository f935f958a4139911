//! A synthetic weather lookup.
//!
//! Stands in for a real weather provider behind the same tool contract:
//! values are randomized per call, but the payload schema is fixed so the
//! data source can be swapped for a live client without touching callers.

use crate::tool::{ToolArguments, ToolContext, ToolFunction, ToolOutcome};
use async_trait::async_trait;
use rand::Rng;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Instant;
use tracing::{info, warn};

const CONDITIONS: &[&str] = &[
    "clear",
    "partly cloudy",
    "cloudy",
    "light rain",
    "rain",
    "thunderstorms",
    "fog",
];

#[derive(Deserialize, JsonSchema, Debug)]
pub struct WeatherArgs {
    /// Name of the city to look up.
    pub city: String,
}

/// Mock weather tool with a stable payload schema and randomized values.
#[derive(Default)]
pub struct WeatherTool;

impl WeatherTool {
    pub fn new() -> Self {
        Self
    }
}

fn title_case(city: &str) -> String {
    city.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn simulated_report(city: &str) -> Value {
    let mut rng = rand::rng();
    let temperature = (rng.random_range(-5.0..35.0_f64) * 10.0).round() / 10.0;
    let condition = CONDITIONS[rng.random_range(0..CONDITIONS.len())];
    json!({
        "location": {
            "city": title_case(city),
            "country": "simulated",
        },
        "current": {
            "temperature": { "value": temperature, "unit": "°C" },
            "condition": condition,
            "humidity_percent": rng.random_range(20..=100),
            "pressure_hpa": rng.random_range(980..=1040),
            "wind_kph": (rng.random_range(0.0..40.0_f64) * 10.0).round() / 10.0,
        },
    })
}

#[async_trait]
impl ToolFunction for WeatherTool {
    fn name(&self) -> &str {
        "lookup_weather"
    }

    fn description(&self) -> &str {
        "Look up current weather information for a city."
    }

    fn parameters(&self) -> Value {
        schemars::schema_for!(WeatherArgs).to_value()
    }

    async fn invoke(&self, args: &ToolArguments, ctx: &ToolContext) -> ToolOutcome {
        let started = Instant::now();
        let Some(city) = args.get("city").and_then(Value::as_str) else {
            warn!(session_id = %ctx.session_id, "weather lookup called without a city");
            return ToolOutcome::error("Missing required argument 'city'");
        };

        info!(city, session_id = %ctx.session_id, "weather lookup initiated");
        let report = simulated_report(city);
        info!(
            city,
            session_id = %ctx.session_id,
            duration_seconds = started.elapsed().as_secs_f64(),
            success = true,
            "weather lookup completed"
        );
        ToolOutcome::success(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn args_for(city: &str) -> ToolArguments {
        let mut args = ToolArguments::new();
        args.insert("city".to_string(), json!(city));
        args
    }

    fn ctx() -> ToolContext {
        ToolContext::new(Uuid::new_v4())
    }

    #[tokio::test]
    async fn payload_matches_fixed_schema() {
        let tool = WeatherTool::new();
        // Values are randomized per call; the schema must hold every time.
        for _ in 0..20 {
            let outcome = tool.invoke(&args_for("paris"), &ctx()).await;
            let ToolOutcome::Success { result } = outcome else {
                panic!("weather lookup must not fail");
            };
            assert!(result["current"]["temperature"]["value"].is_number());
            let humidity = result["current"]["humidity_percent"].as_i64().unwrap();
            assert!((20..=100).contains(&humidity));
            let pressure = result["current"]["pressure_hpa"].as_i64().unwrap();
            assert!((980..=1040).contains(&pressure));
            assert!(result["current"]["wind_kph"].is_number());
            assert!(result["current"]["condition"].is_string());
        }
    }

    #[tokio::test]
    async fn city_is_title_cased() {
        let tool = WeatherTool::new();
        let outcome = tool.invoke(&args_for("Paris"), &ctx()).await;
        let ToolOutcome::Success { result } = outcome else {
            panic!("weather lookup must not fail");
        };
        assert_eq!(result["location"]["city"], "Paris");
        assert_eq!(result["current"]["temperature"]["unit"], "°C");

        let outcome = tool.invoke(&args_for("new york"), &ctx()).await;
        let ToolOutcome::Success { result } = outcome else {
            panic!("weather lookup must not fail");
        };
        assert_eq!(result["location"]["city"], "New York");
    }

    #[tokio::test]
    async fn missing_city_is_an_error_outcome() {
        let tool = WeatherTool::new();
        let outcome = tool.invoke(&ToolArguments::new(), &ctx()).await;
        assert!(outcome.is_error());
    }

    #[test]
    fn declares_city_parameter() {
        let schema = WeatherTool::new().parameters();
        assert!(schema["properties"]["city"].is_object());
    }
}
