//! Plain-text rendering of bundles and reports.

use bundler_core::{Bundle, Observation, ProviderReport, Source, WeatherRequest, WindDirection};
use chrono::NaiveDateTime;

const MISSING: &str = "n/a";

fn value(v: Option<f64>, unit: &str) -> String {
    match v {
        Some(v) => format!("{v:.1} {unit}"),
        None => MISSING.to_string(),
    }
}

fn direction(d: WindDirection) -> &'static str {
    match d {
        WindDirection::None => MISSING,
        other => other.as_str(),
    }
}

/// Multi-line block for one observation, indented by `indent` spaces.
pub fn render_observation(obs: &Observation, indent: usize) -> String {
    let pad = " ".repeat(indent);
    format!(
        "{pad}Temperature:    {}\n\
         {pad}Humidity:       {}\n\
         {pad}Pressure:       {}\n\
         {pad}Wind speed:     {}\n\
         {pad}Wind direction: {}\n",
        value(obs.temperature, "°C"),
        value(obs.humidity, "%"),
        value(obs.pressure, "mmHg"),
        value(obs.wind_speed, "m/s"),
        direction(obs.wind_direction),
    )
}

pub fn render_bundle(request: &WeatherRequest, bundle: &Bundle, all: bool) -> String {
    let mut out = String::new();

    let place = bundle
        .location
        .as_ref()
        .map(|l| l.display_name())
        .unwrap_or_else(|| request.to_string());
    let source = match bundle.source {
        Source::Cache => "cached",
        Source::Live => "live",
    };
    out.push_str(&format!("Weather for {place} ({source})\n"));

    if bundle.merged.is_empty() {
        out.push_str("  No data available.\n");
    } else {
        out.push_str(&render_observation(&bundle.merged, 2));
    }

    if all {
        for (i, obs) in bundle.observations.iter().enumerate() {
            out.push_str(&format!("  #{}\n", i + 1));
            out.push_str(&render_observation(obs, 4));
        }
    }

    for failure in &bundle.failures {
        out.push_str(&format!("  ! {failure}\n"));
    }

    out
}

pub fn render_past(request: &WeatherRequest, when: NaiveDateTime, report: &ProviderReport) -> String {
    let mut out = String::new();

    let place = report
        .location
        .as_ref()
        .and_then(|l| l.name.clone())
        .unwrap_or_else(|| request.to_string());
    out.push_str(&format!("Weather for {place} at {when}\n"));

    if report.observation.is_empty() {
        out.push_str("  No data available.\n");
    } else {
        out.push_str(&render_observation(&report.observation, 2));
    }

    out
}
