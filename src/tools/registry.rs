//! Tool Registry (C2): discovery, metadata validation, dependency
//! whitelisting of plugins, backed by a directory of TOML manifests
//! rather than an in-memory static tool list.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::Watcher;
use regex::Regex;
use tokio::sync::RwLock;

use super::builtin;
use super::traits::{ApprovalMode, Tool, ToolDescriptor};
use crate::credentials::CredentialResolver;
use crate::error::ToolError;
use crate::sandbox::SandboxManager;

/// Dependency tags a manifest is permitted to declare. Anything outside
/// this set fails validation per §4.2 rule 3.
const ALLOWED_DEPENDENCIES: &[&str] = &["fs", "process", "net", "none"];

/// Substrings that may never appear in an entry point declaration; a crude
/// but effective static check against a manifest smuggling a forbidden
/// operation in as its "entry point". Real execution is still bounded by
/// the sandbox layer (C3); this is a load-time filter, not the security
/// boundary.
const FORBIDDEN_ENTRY_POINT_OPS: &[&str] = &["rm -rf /", "mkfs", ":(){ :|:& };:"];

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct ToolManifest {
    name: String,
    version: String,
    capabilities: Vec<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    executor_kind: super::traits::ExecutorKind,
    #[serde(default = "default_approval_mode")]
    approval_mode: ApprovalMode,
    #[serde(default)]
    parameters_schema: serde_json::Value,
    entry_point: String,
    #[serde(default)]
    credential: Option<String>,
}

fn default_approval_mode() -> ApprovalMode {
    ApprovalMode::Suggest
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ToolFilter {
    pub capability: Option<String>,
    pub name_prefix: Option<String>,
    pub enabled_only: bool,
}

struct Entry {
    descriptor: ToolDescriptor,
    tool: Option<Arc<dyn Tool>>,
}

pub struct ToolRegistry {
    manifest_dir: PathBuf,
    entries: RwLock<HashMap<String, Entry>>,
    name_re: Regex,
    sandbox: Arc<SandboxManager>,
    call_timeout: Duration,
    credentials: Arc<dyn CredentialResolver>,
}

impl ToolRegistry {
    pub fn new(manifest_dir: impl Into<PathBuf>, sandbox: Arc<SandboxManager>, call_timeout: Duration) -> Self {
        Self::with_credentials(manifest_dir, sandbox, call_timeout, crate::credentials::default_resolver())
    }

    pub fn with_credentials(
        manifest_dir: impl Into<PathBuf>,
        sandbox: Arc<SandboxManager>,
        call_timeout: Duration,
        credentials: Arc<dyn CredentialResolver>,
    ) -> Self {
        ToolRegistry {
            manifest_dir: manifest_dir.into(),
            entries: RwLock::new(HashMap::new()),
            name_re: Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex"),
            sandbox,
            call_timeout,
            credentials,
        }
    }

    /// Rescans the manifest directory; validates each descriptor per
    /// §4.2. A manifest that fails validation is logged and skipped, it
    /// does not abort the scan of the rest of the directory.
    pub async fn refresh(&self) -> Result<usize, ToolError> {
        std::fs::create_dir_all(&self.manifest_dir)
            .map_err(|e| ToolError::InvalidManifest {
                path: self.manifest_dir.display().to_string(),
                reason: e.to_string(),
            })?;

        let mut loaded = HashMap::new();
        let read_dir = std::fs::read_dir(&self.manifest_dir).map_err(|e| ToolError::InvalidManifest {
            path: self.manifest_dir.display().to_string(),
            reason: e.to_string(),
        })?;

        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            match self.load_one(&path) {
                Ok((name, descriptor)) => {
                    let tool = builtin::resolve(
                        &descriptor.entry_point,
                        &descriptor,
                        self.sandbox.clone(),
                        self.call_timeout,
                    )
                    .ok();
                    loaded.insert(name, Entry { descriptor, tool });
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping invalid tool manifest");
                }
            }
        }

        let count = loaded.len();
        let mut entries = self.entries.write().await;
        *entries = loaded;
        tracing::info!(count, "tool registry refreshed");
        Ok(count)
    }

    fn load_one(&self, path: &Path) -> Result<(String, ToolDescriptor), ToolError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ToolError::InvalidManifest {
                path: path.display().to_string(),
                reason: "manifest filename is not valid UTF-8".into(),
            })?
            .to_string();

        let text = std::fs::read_to_string(path).map_err(|e| ToolError::InvalidManifest {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let manifest: ToolManifest = toml::from_str(&text).map_err(|e| ToolError::InvalidManifest {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        if manifest.name != stem || !self.name_re.is_match(&manifest.name) {
            return Err(ToolError::InvalidManifest {
                path: path.display().to_string(),
                reason: format!("name '{}' must match filename and [A-Za-z0-9_-]+", manifest.name),
            });
        }

        if manifest.version.split('.').count() != 3
            || !manifest.version.split('.').all(|p| p.chars().all(|c| c.is_ascii_digit()) && !p.is_empty())
        {
            return Err(ToolError::InvalidManifest {
                path: path.display().to_string(),
                reason: format!("version '{}' is not a dotted triple", manifest.version),
            });
        }

        for dep in &manifest.dependencies {
            if !ALLOWED_DEPENDENCIES.contains(&dep.as_str()) {
                return Err(ToolError::UnlistedDependency {
                    tool: manifest.name.clone(),
                    dep: dep.clone(),
                });
            }
        }

        if FORBIDDEN_ENTRY_POINT_OPS.iter().any(|op| manifest.entry_point.contains(op)) {
            return Err(ToolError::InvalidManifest {
                path: path.display().to_string(),
                reason: "entry_point references a forbidden operation".into(),
            });
        }

        let descriptor = ToolDescriptor {
            name: manifest.name.clone(),
            version: manifest.version,
            capabilities: manifest.capabilities,
            dependencies: manifest.dependencies,
            executor_kind: manifest.executor_kind,
            approval_mode: manifest.approval_mode,
            parameters_schema: manifest.parameters_schema,
            entry_point: manifest.entry_point,
            enabled: true,
            credential: manifest.credential,
        };
        Ok((manifest.name, descriptor))
    }

    pub async fn list(&self, filter: ToolFilter) -> Vec<ToolDescriptor> {
        let entries = self.entries.read().await;
        entries
            .values()
            .map(|e| e.descriptor.clone())
            .filter(|d| filter.capability.as_ref().is_none_or(|c| d.capabilities.contains(c)))
            .filter(|d| filter.name_prefix.as_ref().is_none_or(|p| d.name.starts_with(p.as_str())))
            .filter(|d| !filter.enabled_only || d.enabled)
            .collect()
    }

    pub async fn enable(&self, name: &str) -> Result<(), ToolError> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        entry.descriptor.enabled = true;
        Ok(())
    }

    pub async fn disable(&self, name: &str) -> Result<(), ToolError> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        entry.descriptor.enabled = false;
        Ok(())
    }

    pub async fn install(&self, manifest_path: &Path) -> Result<String, ToolError> {
        let file_name = manifest_path
            .file_name()
            .ok_or_else(|| ToolError::InvalidManifest {
                path: manifest_path.display().to_string(),
                reason: "missing file name".into(),
            })?;
        let dest = self.manifest_dir.join(file_name);
        std::fs::copy(manifest_path, &dest).map_err(|e| ToolError::InvalidManifest {
            path: manifest_path.display().to_string(),
            reason: e.to_string(),
        })?;
        self.refresh().await?;
        let (name, _) = self.load_one(&dest)?;
        Ok(name)
    }

    pub async fn uninstall(&self, name: &str) -> Result<(), ToolError> {
        let path = self.manifest_dir.join(format!("{name}.toml"));
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| ToolError::InvalidManifest {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        let mut entries = self.entries.write().await;
        entries.remove(name);
        Ok(())
    }

    /// Resolves a tool for invocation by the Agent Runtime. Returns
    /// [`ToolError::Blocked`] for `approval_mode=block` entries: loaded but
    /// never vended, per §4.2 rule 5.
    pub async fn resolve(&self, name: &str) -> Result<(ToolDescriptor, Arc<dyn Tool>), ToolError> {
        let entries = self.entries.read().await;
        let entry = entries.get(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        if matches!(entry.descriptor.approval_mode, ApprovalMode::Block) {
            return Err(ToolError::Blocked(name.to_string()));
        }
        if !entry.descriptor.enabled {
            return Err(ToolError::Disabled(name.to_string()));
        }
        if let Some(cred_name) = &entry.descriptor.credential {
            if self.credentials.resolve(cred_name).is_none() {
                return Err(ToolError::MissingCredential(cred_name.clone()));
            }
        }
        let tool = entry
            .tool
            .clone()
            .ok_or_else(|| ToolError::ExecutionFailed(format!("tool {name} has no resolvable entry point")))?;
        Ok((entry.descriptor.clone(), tool))
    }

    pub fn manifest_dir(&self) -> &Path {
        &self.manifest_dir
    }

    /// Starts a filesystem watcher on the manifest directory and calls
    /// `refresh()` whenever a manifest is created, modified, or removed.
    /// The returned watcher must be kept alive for as long as hot-reload is
    /// wanted; dropping it stops the watch.
    pub fn spawn_watcher(self: &Arc<Self>) -> Result<notify::RecommendedWatcher, notify::Error> {
        std::fs::create_dir_all(&self.manifest_dir).ok();
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                if matches!(event.kind, notify::EventKind::Modify(_) | notify::EventKind::Create(_) | notify::EventKind::Remove(_)) {
                    let _ = tx.blocking_send(());
                }
            }
        })?;
        watcher.watch(&self.manifest_dir, notify::RecursiveMode::NonRecursive)?;

        let registry = self.clone();
        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                if let Err(e) = registry.refresh().await {
                    tracing::warn!(error = %e, "tool registry hot-reload refresh failed");
                }
            }
        });
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_manifest(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(format!("{name}.toml")), body).expect("write manifest");
    }

    fn test_sandbox() -> Arc<SandboxManager> {
        use crate::sandbox::in_process::InProcessExecutor;
        use crate::sandbox::Backend;
        let in_process: Arc<dyn crate::sandbox::SandboxExecutor> = Arc::new(InProcessExecutor::new(false));
        Arc::new(SandboxManager::new(
            vec![(Backend::InProcess, in_process)],
            vec![Backend::InProcess],
            Duration::from_secs(1800),
        ))
    }

    #[tokio::test]
    async fn refresh_loads_valid_manifest() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_manifest(
            dir.path(),
            "list_files",
            r#"
            name = "list_files"
            version = "1.0.0"
            capabilities = ["fs.read"]
            dependencies = ["fs"]
            executor_kind = "in_process"
            approval_mode = "suggest"
            entry_point = "builtin:list_files"
            "#,
        );
        let registry = ToolRegistry::new(dir.path(), test_sandbox(), Duration::from_secs(5));
        let n = registry.refresh().await.expect("refresh");
        assert_eq!(n, 1);
        let descriptors = registry.list(ToolFilter::default()).await;
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name, "list_files");
    }

    #[tokio::test]
    async fn unlisted_dependency_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_manifest(
            dir.path(),
            "bad_tool",
            r#"
            name = "bad_tool"
            version = "1.0.0"
            capabilities = []
            dependencies = ["kernel"]
            executor_kind = "in_process"
            entry_point = "builtin:list_files"
            "#,
        );
        let registry = ToolRegistry::new(dir.path(), test_sandbox(), Duration::from_secs(5));
        registry.refresh().await.expect("refresh");
        let descriptors = registry.list(ToolFilter::default()).await;
        assert!(descriptors.is_empty());
    }

    #[tokio::test]
    async fn mismatched_name_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_manifest(
            dir.path(),
            "shell",
            r#"
            name = "not_shell"
            version = "1.0.0"
            capabilities = []
            executor_kind = "container"
            entry_point = "builtin:shell"
            "#,
        );
        let registry = ToolRegistry::new(dir.path(), test_sandbox(), Duration::from_secs(5));
        registry.refresh().await.expect("refresh");
        assert!(registry.list(ToolFilter::default()).await.is_empty());
    }

    #[tokio::test]
    async fn blocked_tool_loads_but_never_resolves() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_manifest(
            dir.path(),
            "list_files",
            r#"
            name = "list_files"
            version = "1.0.0"
            capabilities = ["fs.read"]
            executor_kind = "in_process"
            approval_mode = "block"
            entry_point = "builtin:list_files"
            "#,
        );
        let registry = ToolRegistry::new(dir.path(), test_sandbox(), Duration::from_secs(5));
        registry.refresh().await.expect("refresh");
        assert_eq!(registry.list(ToolFilter::default()).await.len(), 1);
        let resolved = registry.resolve("list_files").await;
        assert!(matches!(resolved, Err(ToolError::Blocked(_))));
    }

    #[tokio::test]
    async fn tool_requiring_unresolved_credential_fails_to_resolve() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_manifest(
            dir.path(),
            "list_files",
            r#"
            name = "list_files"
            version = "1.0.0"
            capabilities = ["fs.read"]
            executor_kind = "in_process"
            entry_point = "builtin:list_files"
            credential = "definitely_not_set_xyz"
            "#,
        );
        let registry = ToolRegistry::new(dir.path(), test_sandbox(), Duration::from_secs(5));
        registry.refresh().await.expect("refresh");
        let resolved = registry.resolve("list_files").await;
        assert!(matches!(resolved, Err(ToolError::MissingCredential(_))));
    }

    #[tokio::test]
    async fn tool_with_resolved_credential_resolves() {
        std::env::set_var("SWARMKEEP_CRED_REGISTRY_TEST_KEY", "present");
        let dir = tempfile::tempdir().expect("tempdir");
        write_manifest(
            dir.path(),
            "list_files",
            r#"
            name = "list_files"
            version = "1.0.0"
            capabilities = ["fs.read"]
            executor_kind = "in_process"
            entry_point = "builtin:list_files"
            credential = "registry_test_key"
            "#,
        );
        let registry = ToolRegistry::new(dir.path(), test_sandbox(), Duration::from_secs(5));
        registry.refresh().await.expect("refresh");
        assert!(registry.resolve("list_files").await.is_ok());
        std::env::remove_var("SWARMKEEP_CRED_REGISTRY_TEST_KEY");
    }

    #[tokio::test]
    async fn uninstall_removes_manifest_and_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_manifest(
            dir.path(),
            "list_files",
            r#"
            name = "list_files"
            version = "1.0.0"
            capabilities = []
            executor_kind = "in_process"
            entry_point = "builtin:list_files"
            "#,
        );
        let registry = ToolRegistry::new(dir.path(), test_sandbox(), Duration::from_secs(5));
        registry.refresh().await.expect("refresh");
        registry.uninstall("list_files").await.expect("uninstall");
        assert!(registry.list(ToolFilter::default()).await.is_empty());
        assert!(!dir.path().join("list_files.toml").exists());
    }
}
