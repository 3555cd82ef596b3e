// Action runner
// Pluggable handlers for `uses:` steps, looked up by name in a registry.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Result of running an action.
#[derive(Debug, Clone, Default)]
pub struct ActionOutcome {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn success(output: impl Into<String>) -> Self {
        ActionOutcome {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        ActionOutcome {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }
}

/// A handler for one kind of `uses:` step.
#[async_trait]
pub trait ActionRunner: Send + Sync {
    /// Name the action is registered under.
    fn name(&self) -> &str;

    async fn run(
        &self,
        inputs: &IndexMap<String, String>,
        env: &HashMap<String, String>,
        working_dir: &Path,
    ) -> ActionOutcome;
}

/// Registry of action handlers, keyed by name. Lookup strips an `@version`
/// suffix and falls back to the last path segment, so `actions/checkout@v4`
/// resolves a handler registered as `checkout`.
#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn ActionRunner>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in actions installed.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CheckoutAction));
        registry.register(Arc::new(SetupToolchainAction));
        registry
    }

    pub fn register(&mut self, action: Arc<dyn ActionRunner>) {
        self.actions.insert(action.name().to_string(), action);
    }

    pub fn get(&self, reference: &str) -> Option<Arc<dyn ActionRunner>> {
        let name = reference.split('@').next().unwrap_or(reference);
        if let Some(action) = self.actions.get(name) {
            return Some(action.clone());
        }
        let short = name.rsplit('/').next().unwrap_or(name);
        self.actions.get(short).cloned()
    }
}

/// Built-in `checkout` action. Local runs already execute inside the
/// repository, so this only verifies the working directory exists.
struct CheckoutAction;

#[async_trait]
impl ActionRunner for CheckoutAction {
    fn name(&self) -> &str {
        "checkout"
    }

    async fn run(
        &self,
        _inputs: &IndexMap<String, String>,
        _env: &HashMap<String, String>,
        working_dir: &Path,
    ) -> ActionOutcome {
        if working_dir.is_dir() {
            ActionOutcome::success(format!("using checkout at {}", working_dir.display()))
        } else {
            ActionOutcome::failure(format!(
                "working directory {} does not exist",
                working_dir.display()
            ))
        }
    }
}

/// Built-in `setup-toolchain` action. Toolchains are assumed to be installed
/// on the host; this records which one the job asked for.
struct SetupToolchainAction;

#[async_trait]
impl ActionRunner for SetupToolchainAction {
    fn name(&self) -> &str {
        "setup-toolchain"
    }

    async fn run(
        &self,
        inputs: &IndexMap<String, String>,
        _env: &HashMap<String, String>,
        _working_dir: &Path,
    ) -> ActionOutcome {
        let toolchain = inputs
            .get("toolchain")
            .cloned()
            .unwrap_or_else(|| "stable".to_string());
        ActionOutcome::success(format!("using host toolchain '{}'", toolchain))
    }
}
