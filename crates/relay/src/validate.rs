//! Request validation and upstream body construction.

use serde_json::{json, Map, Value};

use rc_domain::config::RelayConfig;
use rc_domain::tier::is_valid_model_id;
use rc_domain::wire::{RelayRequest, RequestMetadata};

const ROLES: [&str; 2] = ["user", "model"];

/// Check `contents` against the relay's limits.  The error is a message
/// safe to return to the caller.
pub fn validate_contents(req: &RelayRequest, cfg: &RelayConfig) -> Result<(), String> {
    if req.contents.is_empty() {
        return Err("contents must not be empty".into());
    }
    if req.contents.len() > cfg.max_contents {
        return Err(format!(
            "contents has {} entries; at most {} are allowed",
            req.contents.len(),
            cfg.max_contents
        ));
    }

    for (i, content) in req.contents.iter().enumerate() {
        if !ROLES.contains(&content.role.as_str()) {
            return Err(format!("contents[{i}].role must be \"user\" or \"model\""));
        }
        if content.parts.is_empty() {
            return Err(format!("contents[{i}].parts must not be empty"));
        }
        for (j, part) in content.parts.iter().enumerate() {
            if part.text.chars().count() > cfg.max_part_chars {
                return Err(format!(
                    "contents[{i}].parts[{j}].text exceeds {} characters",
                    cfg.max_part_chars
                ));
            }
        }
    }
    Ok(())
}

/// The model to forward to: `metadata.model` if valid and allowed, else the
/// configured default.
pub fn resolve_model(meta: &RequestMetadata, cfg: &RelayConfig) -> Result<String, String> {
    let Some(model) = meta.model.as_deref() else {
        return Ok(cfg.default_model.clone());
    };
    if !is_valid_model_id(model) {
        return Err("metadata.model is not a valid model identifier".into());
    }
    if !cfg.allowed_models.is_empty() && !cfg.allowed_models.iter().any(|m| m == model) {
        return Err(format!("model '{model}' is not allowed"));
    }
    Ok(model.to_owned())
}

/// The `generationConfig` for a named preset, if it sets anything.
pub fn generation_config(preset: Option<&str>, cfg: &RelayConfig) -> Option<Value> {
    let preset = cfg.presets.get(preset?)?;
    let mut out = Map::new();
    if let Some(t) = preset.temperature {
        out.insert("temperature".into(), json!(t));
    }
    if let Some(n) = preset.max_output_tokens {
        out.insert("maxOutputTokens".into(), json!(n));
    }
    (!out.is_empty()).then_some(Value::Object(out))
}

/// The body sent upstream.  `metadata` never leaves the relay.
pub fn upstream_body(req: &RelayRequest, cfg: &RelayConfig) -> Value {
    let mut body = json!({ "contents": req.contents });
    if let Some(gen) = generation_config(req.metadata.preset.as_deref(), cfg) {
        body["generationConfig"] = gen;
    }
    body
}
