use serde_json::json;

use super::{CommandResult, Engine};

/// Report every published configuration version and the engine settings
/// in effect. Loading already validated them.
pub fn run_config_check(engine: &Engine) -> CommandResult {
    let active = engine.configs.active().ok().map(|c| c.version.clone());
    let versions: Vec<serde_json::Value> = engine
        .configs
        .versions()
        .into_iter()
        .filter_map(|v| engine.configs.get(&v).ok())
        .map(|c| {
            json!({
                "version": c.version,
                "active_categories": c.active_categories().count(),
                "mandatory": c.active_categories().filter(|(_, cat)| cat.mandatory).map(|(k, _)| k.to_string()).collect::<Vec<_>>(),
                "thresholds": c.thresholds.len(),
                "active": active.as_deref() == Some(c.version.as_str()),
            })
        })
        .collect();

    Ok(json!({
        "valid": true,
        "active_version": active,
        "settings": engine.settings(),
        "result": versions,
    }))
}
