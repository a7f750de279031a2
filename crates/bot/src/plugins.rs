use std::{collections::HashMap, sync::Arc};

use plugin_core::{Plugin, PluginRegistry, PluginSpec};
use tracing::warn;

/// Builds the registry from the built-in plugins, overlaid with the `plugins`
/// section of the config.
pub async fn build_registry(configured: &[PluginSpec]) -> Arc<PluginRegistry> {
    // Plugins are stateless; one instance is fine.
    let plugins: HashMap<&'static str, Arc<dyn Plugin>> = HashMap::from([(
        "triggers",
        Arc::new(plugin_triggers::Triggers) as Arc<dyn Plugin>,
    )]);

    let mut specs = configured.to_vec();
    for p in plugins.values() {
        merge_default_spec(&mut specs, p.spec());
    }

    let registry = Arc::new(PluginRegistry::new());
    for spec in specs {
        let Some(plugin) = plugins.get(spec.id.as_str()) else {
            warn!("Unknown plugin ID: {}", spec.id);
            continue;
        };
        registry.register(spec, Arc::clone(plugin)).await;
    }
    registry
}

fn merge_default_spec(specs: &mut Vec<PluginSpec>, default: PluginSpec) {
    if let Some(existing) = specs.iter_mut().find(|s| s.id == default.id) {
        // Add any default commands the config did not list; keep its `enabled`.
        for cmd in default.triggers.commands {
            if !existing
                .triggers
                .commands
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&cmd))
            {
                existing.triggers.commands.push(cmd);
            }
        }
    } else {
        specs.push(default);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn defaults_register_trigger_commands() {
        let registry = build_registry(&[]).await;
        let entry = registry.entry_by_command("!addresponder").await.unwrap();
        assert_eq!(entry.spec.id, "triggers");
        assert!(registry.is_enabled("triggers").await);
    }

    #[tokio::test]
    async fn config_can_disable_plugins() {
        let configured: Vec<PluginSpec> = serde_yaml::from_str(
            r"
- id: triggers
  enabled: false
- id: nonexistent
",
        )
        .unwrap();
        let registry = build_registry(&configured).await;

        assert!(!registry.is_enabled("triggers").await);
        assert!(registry.entry_by_command("!list").await.is_some());
        assert!(registry.entry("nonexistent").await.is_none());
    }
}
