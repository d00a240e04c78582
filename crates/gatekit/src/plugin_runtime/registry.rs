// The plugin registry: one single-pass fold over the declaration-ordered
// plugin list, producing immutable lookup structures. All schema merging and
// endpoint collection happens here, once, at init.

use std::collections::HashMap;
use std::sync::Arc;

use gatekit_core::db::schema::AuthSchema;
use gatekit_core::plugin::{AuthPlugin, HttpMethod, PluginEndpoint, PluginHook, PluginRateLimit};

/// Immutable registry of plugin contributions.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn AuthPlugin>>,
    endpoints: Vec<PluginEndpoint>,
    hooks: Vec<PluginHook>,
    rate_limits: Vec<PluginRateLimit>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.plugins.iter().map(|p| p.id()).collect::<Vec<_>>())
            .field("endpoints", &self.endpoints.len())
            .finish()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect contributions from the plugin list. Declaration order is
    /// preserved; later plugins win endpoint-path conflicts.
    pub fn from_plugins(plugins: Vec<Arc<dyn AuthPlugin>>) -> Self {
        let mut endpoints: Vec<PluginEndpoint> = Vec::new();
        let mut hooks = Vec::new();
        let mut rate_limits = Vec::new();

        for plugin in &plugins {
            for endpoint in plugin.endpoints() {
                // Last registration for a (path, method) wins.
                endpoints
                    .retain(|e| !(e.path == endpoint.path && e.method == endpoint.method));
                endpoints.push(endpoint);
            }
            hooks.extend(plugin.hooks());
            rate_limits.extend(plugin.rate_limit());
        }

        Self {
            plugins,
            endpoints,
            hooks,
            rate_limits,
        }
    }

    pub fn has_plugin(&self, plugin_id: &str) -> bool {
        self.plugins.iter().any(|p| p.id() == plugin_id)
    }

    pub fn plugins(&self) -> &[Arc<dyn AuthPlugin>] {
        &self.plugins
    }

    pub fn endpoints(&self) -> &[PluginEndpoint] {
        &self.endpoints
    }

    /// Model-level hook declarations, for adapters that surface CRUD events.
    pub fn model_hooks(&self) -> &[PluginHook] {
        &self.hooks
    }

    pub fn rate_limits(&self) -> &[PluginRateLimit] {
        &self.rate_limits
    }

    /// Find a handler by path and method.
    pub fn find_endpoint(&self, path: &str, method: HttpMethod) -> Option<&PluginEndpoint> {
        self.endpoints
            .iter()
            .find(|e| e.path == path && e.method == method)
    }

    /// Merge plugin schema contributions into the core schema. Tables merge
    /// by name; extra fields land on existing tables.
    pub fn merge_schema(&self, mut schema: AuthSchema) -> AuthSchema {
        for plugin in &self.plugins {
            for table in plugin.schema() {
                schema.tables.insert(table.name.clone(), table);
            }
            for (table_name, fields) in plugin.additional_fields() {
                if let Some(table) = schema.tables.get_mut(&table_name) {
                    for (field_name, field) in fields {
                        table.fields.insert(field_name, field);
                    }
                }
            }
        }
        schema
    }

    /// Collect plugin-contributed userinfo claims.
    pub fn additional_userinfo_claims(
        &self,
        user: &serde_json::Value,
        scopes: &[String],
    ) -> HashMap<String, serde_json::Value> {
        let mut claims = HashMap::new();
        for plugin in &self.plugins {
            claims.extend(plugin.additional_userinfo_claims(user, scopes));
        }
        claims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekit_core::db::schema::{core_schema, AuthTable, SchemaField};

    #[derive(Debug)]
    struct TableOnlyPlugin;

    impl AuthPlugin for TableOnlyPlugin {
        fn id(&self) -> &str {
            "table-only"
        }

        fn schema(&self) -> Vec<AuthTable> {
            vec![AuthTable::new("widget").field("id", SchemaField::required_string())]
        }

        fn additional_fields(
            &self,
        ) -> HashMap<String, HashMap<String, SchemaField>> {
            let mut fields = HashMap::new();
            let mut session_fields = HashMap::new();
            session_fields.insert("widgetId".to_string(), SchemaField::optional_string());
            fields.insert("session".to_string(), session_fields);
            fields
        }
    }

    #[test]
    fn registry_tracks_plugins() {
        let registry = PluginRegistry::from_plugins(vec![Arc::new(TableOnlyPlugin)]);
        assert!(registry.has_plugin("table-only"));
        assert!(!registry.has_plugin("other"));
    }

    #[test]
    fn schema_merge_adds_tables_and_fields() {
        let registry = PluginRegistry::from_plugins(vec![Arc::new(TableOnlyPlugin)]);
        let schema = registry.merge_schema(core_schema());
        assert!(schema.get("widget").is_some());
        assert!(schema
            .get("session")
            .unwrap()
            .fields
            .contains_key("widgetId"));
    }
}
