// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
pub mod catalog;
pub mod registry;
pub mod sanitize;
pub(crate) mod openai_compat;
mod types;
mod provider;
mod openai;
mod anthropic;
mod mock;

pub use catalog::{ModelCatalogEntry, InputModality};
pub use types::*;
pub use provider::ModelProvider;
pub use openai::OpenAiProvider;
pub use anthropic::AnthropicProvider;
pub use mock::{MockProvider, ScriptedMockProvider};
pub use registry::{DriverMeta, get_driver, list_drivers};

use anyhow::{bail, Context};
use openai_compat::{AuthStyle, OpenAICompatProvider};
use stepwise_config::ModelConfig;

/// Build an [`OpenAICompatProvider`] for a registered driver, falling back to
/// the driver's `default_base_url` when `cfg.base_url` is unset.
fn openai_compat_from_registry(
    driver_name: &'static str,
    cfg: &ModelConfig,
    api_key: Option<String>,
    max_tokens: Option<u32>,
    auth_style: AuthStyle,
) -> anyhow::Result<OpenAICompatProvider> {
    let base_url = cfg.base_url.clone().or_else(|| {
        registry::get_driver(driver_name)
            .and_then(|d| d.default_base_url)
            .map(str::to_string)
    });
    let Some(base_url) = base_url else {
        bail!(
            "model provider {driver_name:?} requires `model.base_url` to be set in config \
             (no default base URL for this driver)"
        )
    };
    Ok(OpenAICompatProvider::new(
        driver_name,
        cfg.name.clone(),
        api_key,
        &base_url,
        max_tokens,
        cfg.temperature,
        vec![],
        auth_style,
        cfg.driver_options.clone(),
    ))
}

/// Construct a boxed [`ModelProvider`] from configuration.
///
/// Selects the driver implementation based on `cfg.provider`. Run
/// `stepwise list-providers` to see all recognised provider ids.
///
/// When `max_tokens` is not set in config, the model's `max_output_tokens` is
/// resolved from the static catalog. If the model is not found there a safe
/// default of 4096 is used.
pub fn from_config(cfg: &ModelConfig) -> anyhow::Result<Box<dyn ModelProvider>> {
    let key = || resolve_api_key(cfg);
    let resolved_max_tokens = cfg.max_tokens.or_else(|| {
        catalog::lookup(&cfg.provider, &cfg.name).map(|e| e.max_output_tokens)
    });

    match cfg.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiProvider::new(
            cfg.name.clone(),
            key(),
            cfg.base_url.clone(),
            resolved_max_tokens,
            cfg.temperature,
            cfg.driver_options.clone(),
        ))),
        "anthropic" => Ok(Box::new(AnthropicProvider::with_cache(
            cfg.name.clone(),
            key(),
            cfg.base_url.clone(),
            resolved_max_tokens,
            cfg.temperature,
            cfg.cache_system_prompt,
            cfg.extended_cache_time,
            cfg.cache_tools,
            cfg.cache_conversation,
            cfg.cache_images,
            cfg.cache_tool_results,
        ))),

        // ── OpenAI-compatible drivers (share one wire format, §OpenAICompatProvider) ──
        "ollama" => Ok(Box::new(openai_compat_from_registry(
            "ollama",
            cfg,
            key(),
            resolved_max_tokens,
            AuthStyle::None,
        )?)),
        "groq" => Ok(Box::new(openai_compat_from_registry(
            "groq",
            cfg,
            key(),
            resolved_max_tokens,
            AuthStyle::Bearer,
        )?)),
        "openrouter" => Ok(Box::new(openai_compat_from_registry(
            "openrouter",
            cfg,
            key(),
            resolved_max_tokens,
            AuthStyle::Bearer,
        )?)),
        "mistral" => Ok(Box::new(openai_compat_from_registry(
            "mistral",
            cfg,
            key(),
            resolved_max_tokens,
            AuthStyle::Bearer,
        )?)),
        "deepseek" => Ok(Box::new(openai_compat_from_registry(
            "deepseek",
            cfg,
            key(),
            resolved_max_tokens,
            AuthStyle::Bearer,
        )?)),
        "gemini" => Ok(Box::new(openai_compat_from_registry(
            "gemini",
            cfg,
            key(),
            resolved_max_tokens,
            AuthStyle::Bearer,
        )?)),

        // Azure OpenAI encodes the deployment name and API version as URL
        // path/query segments rather than a plain base URL, so it cannot go
        // through `openai_compat_from_registry`'s base_url-plus-suffix scheme.
        "azure" => {
            let resource = cfg.azure_resource.as_deref().context(
                "azure provider requires `model.azure_resource` to be set in config",
            )?;
            let deployment = cfg.azure_deployment.as_deref().unwrap_or(cfg.name.as_str());
            let api_version = cfg.azure_api_version.as_deref().unwrap_or("2024-06-01");
            let chat_url = format!(
                "https://{resource}.openai.azure.com/openai/deployments/{deployment}/chat/completions?api-version={api_version}"
            );
            Ok(Box::new(OpenAICompatProvider::with_full_chat_url(
                "azure",
                cfg.name.clone(),
                key(),
                chat_url,
                resolved_max_tokens,
                cfg.temperature,
                vec![],
                AuthStyle::ApiKeyHeader,
                cfg.driver_options.clone(),
            )))
        }

        // ── Testing / Mock ────────────────────────────────────────────────────
        "mock" => Ok(Box::new(MockProvider)),

        other => {
            let known: Vec<&str> = registry::known_driver_ids().collect();
            bail!(
                "unknown model provider: {other:?}\n\
                 Run `stepwise list-providers` for a full list, or check your config.\n\
                 Known providers: {known}",
                known = known.join(", ")
            )
        }
    }
}

fn resolve_api_key(cfg: &ModelConfig) -> Option<String> {
    if let Some(k) = &cfg.api_key {
        return Some(k.clone());
    }
    if let Some(env) = &cfg.api_key_env {
        return std::env::var(env).ok();
    }
    if let Some(meta) = registry::get_driver(&cfg.provider) {
        if let Some(env_var) = meta.default_api_key_env {
            return std::env::var(env_var).ok();
        }
    }
    None
}

// ── Model-config resolution ───────────────────────────────────────────────────

/// Build a [`ModelConfig`] by applying `override_str` on top of `base`.
///
/// The override string may be:
/// - `"provider/model"` → sets both provider and name (e.g. `"anthropic/claude-opus-4-5"`)
/// - bare registered provider id (e.g. `"ollama"`) → changes provider, keeps model name
/// - bare model name (no `/`, not a known provider id) → changes model name, keeps provider
///
/// When the provider changes, inherited `api_key` / `api_key_env` fields are
/// cleared so the correct credential env-var for the new provider is looked up.
pub fn resolve_model_cfg(base: &ModelConfig, override_str: &str) -> ModelConfig {
    let mut cfg = base.clone();
    let provider_changed;
    if let Some((provider, model)) = override_str.split_once('/') {
        provider_changed = provider != base.provider;
        cfg.provider = provider.to_string();
        cfg.name = model.to_string();
    } else if get_driver(override_str).is_some() {
        provider_changed = override_str != base.provider;
        cfg.provider = override_str.to_string();
    } else {
        cfg.name = override_str.to_string();
        provider_changed = false;
    }
    if provider_changed {
        cfg.api_key = None;
        cfg.api_key_env = None;
    }
    cfg
}

/// Resolve a [`ModelConfig`] using `override_str`, checking
/// `config.providers` for named custom providers first, then falling back to
/// [`resolve_model_cfg`] with `config.model` as the base.
pub fn resolve_model_from_config(
    config: &stepwise_config::Config,
    override_str: &str,
) -> ModelConfig {
    let (provider_key, model_suffix) = if let Some((p, m)) = override_str.split_once('/') {
        (p, Some(m))
    } else {
        (override_str, None)
    };

    if let Some(named) = config.providers.get(provider_key) {
        let mut cfg = named.clone();
        if let Some(model) = model_suffix {
            cfg.name = model.to_string();
        }
        return cfg;
    }

    let catalog_entry = if let Some(model_name) = model_suffix {
        if get_driver(provider_key).is_some() {
            catalog::lookup(provider_key, model_name)
        } else {
            None
        }
    } else if get_driver(override_str).is_none() {
        catalog::lookup_by_model_name(override_str)
    } else {
        None
    };

    if let Some(entry) = catalog_entry {
        let mut cfg = ModelConfig {
            provider: entry.provider.clone(),
            name: entry.id.clone(),
            ..ModelConfig::default()
        };
        if cfg.provider == config.model.provider {
            cfg.api_key = config.model.api_key.clone();
            cfg.api_key_env = config.model.api_key_env.clone();
        }
        return cfg;
    }

    resolve_model_cfg(&config.model, override_str)
}
