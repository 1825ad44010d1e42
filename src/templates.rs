use std::collections::HashMap;
use std::path::Path;

use tera::Tera;

use crate::config::UiConfig;
use crate::error::AppError;

/// Name of the dashboard page template
pub const DASHBOARD_TEMPLATE: &str = "dashboard.html";

/// Built-in dashboard, used when the templates directory does not provide one
const BUILTIN_DASHBOARD: &str = include_str!("../templates/dashboard.html");

/// Initialize the Tera template engine from the configured templates directory.
pub fn init_templates(ui: &UiConfig) -> Result<Tera, AppError> {
    let mut tera = if Path::new(&ui.templates_dir).is_dir() {
        Tera::new(&ui.template_glob())?
    } else {
        tracing::warn!(dir = %ui.templates_dir, "Templates directory not found, using built-in dashboard");
        Tera::default()
    };

    if !tera.get_template_names().any(|name| name == DASHBOARD_TEMPLATE) {
        tera.add_raw_template(DASHBOARD_TEMPLATE, BUILTIN_DASHBOARD)?;
    }

    register_filters(&mut tera);
    Ok(tera)
}

pub fn register_filters(tera: &mut Tera) {
    tera.register_filter("status_class", status_class_filter);
    tera.register_filter("latency", latency_filter);
}

/// Map a check status ("OK", "FAIL", "TIMEOUT") to a CSS class
fn status_class_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let status = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("status_class filter expects a string"))?;

    let class = match status.to_ascii_uppercase().as_str() {
        "OK" => "status-ok",
        "TIMEOUT" => "status-timeout",
        "FAIL" => "status-fail",
        _ => "status-unknown",
    };
    Ok(tera::Value::String(class.to_string()))
}

/// Format a millisecond count for display ("850 ms", "2.4 s")
fn latency_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let ms = value
        .as_u64()
        .ok_or_else(|| tera::Error::msg("latency filter expects a non-negative integer"))?;

    let formatted = if ms < 1000 {
        format!("{} ms", ms)
    } else {
        format!("{:.1} s", ms as f64 / 1000.0)
    };
    Ok(tera::Value::String(formatted))
}
