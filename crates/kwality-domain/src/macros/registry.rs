//! Registry infrastructure macro.

/// Implement registry infrastructure for a provider type
#[macro_export]
macro_rules! impl_registry {
    (
        provider_trait: $trait:path,
        config_type: $config:ty,
        entry_type: $entry:ident,
        slice_name: $slice:ident,
        resolve_fn: $resolve:ident,
        list_fn: $list:ident
    ) => {
        /// Registry entry for providers
        pub struct $entry {
            /// Unique provider name
            pub name: &'static str,
            /// Human-readable description
            pub description: &'static str,
            /// Factory function to create provider instance
            pub build: fn(&$config) -> Result<std::sync::Arc<dyn $trait>, String>,
        }

        #[linkme::distributed_slice]
        pub static $slice: [$entry] = [..];

        /// Resolve provider by name from registry
        pub fn $resolve(name: &str, config: &$config) -> Result<std::sync::Arc<dyn $trait>, String> {
            for entry in $slice {
                if entry.name == name {
                    return (entry.build)(config);
                }
            }

            let available: Vec<&str> = $slice.iter().map(|e| e.name).collect();

            Err(format!(
                "Unknown provider '{}'. Available providers: {:?}",
                name, available
            ))
        }

        /// List all registered providers
        pub fn $list() -> Vec<(&'static str, &'static str)> {
            $slice.iter().map(|e| (e.name, e.description)).collect()
        }
    };
}
