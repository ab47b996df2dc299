use std::collections::BTreeMap;

use crate::{
    CompressionConfig, Config, EnvConfig, InputSpec, InstallConfig, PostAction, ProductConfig,
    ResourcesConfig, UiConfig,
};

/// A fluent builder for [`Config`], for embedders that construct a
/// configuration programmatically instead of loading one from disk.
#[derive(Debug, Clone)]
pub struct ConfigBuilder(Config);

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self(Config {
            schema_version: 1,
            product: ProductConfig {
                name: String::new(),
                version: String::new(),
                company: None,
                description: None,
            },
            ui: UiConfig::default(),
            install: InstallConfig {
                default_path: String::new(),
                allow_user_path: true,
                force_hidden_path: false,
                silent_allowed: false,
                require_admin: false,
                license_file: None,
                privacy_file: None,
            },
            compression: CompressionConfig::default(),
            inputs: Vec::new(),
            exclude: Vec::new(),
            post_actions: Vec::new(),
            env: EnvConfig::default(),
            resources: ResourcesConfig::default(),
        })
    }
}

impl ConfigBuilder {
    /// Creates a new builder with library defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a reference to the config assembled so far.
    pub fn config(&self) -> &Config {
        &self.0
    }

    /// Consumes the builder, returning the assembled [`Config`].
    pub fn build(self) -> Config {
        self.0
    }

    /// Sets [`ProductConfig::name`] and [`ProductConfig::version`].
    pub fn product<S: Into<String>>(mut self, name: S, version: S) -> Self {
        self.0.product.name = name.into();
        self.0.product.version = version.into();
        self
    }

    /// Sets [`ProductConfig::company`].
    pub fn company<S: Into<String>>(mut self, company: S) -> Self {
        self.0.product.company.replace(company.into());
        self
    }

    /// Sets [`InstallConfig::default_path`].
    pub fn default_path<S: Into<String>>(mut self, path: S) -> Self {
        self.0.install.default_path = path.into();
        self
    }

    /// Sets [`InstallConfig::silent_allowed`].
    pub fn silent_allowed(mut self, allowed: bool) -> Self {
        self.0.install.silent_allowed = allowed;
        self
    }

    /// Sets [`InstallConfig::require_admin`].
    pub fn require_admin(mut self, required: bool) -> Self {
        self.0.install.require_admin = required;
        self
    }

    /// Sets [`Config::compression`].
    pub fn compression(mut self, compression: CompressionConfig) -> Self {
        self.0.compression = compression;
        self
    }

    /// Appends one input root.
    pub fn input(mut self, input: InputSpec) -> Self {
        self.0.inputs.push(input);
        self
    }

    /// Sets [`Config::inputs`], replacing any previously added entries.
    pub fn inputs<I: IntoIterator<Item = InputSpec>>(mut self, inputs: I) -> Self {
        self.0.inputs = inputs.into_iter().collect();
        self
    }

    /// Appends one exclusion glob pattern.
    pub fn exclude<S: Into<String>>(mut self, pattern: S) -> Self {
        self.0.exclude.push(pattern.into());
        self
    }

    /// Appends one post-install action.
    pub fn post_action(mut self, action: PostAction) -> Self {
        self.0.post_actions.push(action);
        self
    }

    /// Appends a `PATH` entry to add after extraction.
    pub fn add_path<S: Into<String>>(mut self, dir: S) -> Self {
        self.0.env.add_path.push(dir.into());
        self
    }

    /// Sets an environment variable to write after extraction.
    pub fn set_env<S: Into<String>>(mut self, name: S, value: S) -> Self {
        self.0.env.set.insert(name.into(), value.into());
        self
    }

    /// Replaces [`EnvConfig::set`] wholesale.
    pub fn env_vars(mut self, vars: BTreeMap<String, String>) -> Self {
        self.0.env.set = vars;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InputSpec;

    #[test]
    fn builds_a_minimal_config() {
        let cfg = ConfigBuilder::new()
            .product("Demo", "1.0.0")
            .default_path("C:/Demo")
            .silent_allowed(true)
            .input(InputSpec {
                path: "dist".into(),
                recursive: true,
                preserve_structure: false,
            })
            .exclude("*.pdb")
            .add_path("bin")
            .set_env("DEMO_HOME", "%INSTALL_DIR%")
            .build();

        assert_eq!(cfg.product.name, "Demo");
        assert_eq!(cfg.inputs.len(), 1);
        assert_eq!(cfg.exclude, vec!["*.pdb".to_string()]);
        assert!(cfg.install.silent_allowed);
        assert_eq!(cfg.env.set.get("DEMO_HOME").map(String::as_str), Some("%INSTALL_DIR%"));
    }
}
