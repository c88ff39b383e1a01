//! `list_files`: read-only directory listing, resolved in-process.

use async_trait::async_trait;

use crate::error::ToolError;
use crate::tools::traits::{Tool, ToolDescriptor, ToolOutcome};

pub struct ListFilesTool {
    descriptor: ToolDescriptor,
}

impl ListFilesTool {
    pub fn new(descriptor: ToolDescriptor) -> Self {
        ListFilesTool { descriptor }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<ToolOutcome, ToolError> {
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or(".")
            .to_string();

        let entries = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<String>> {
            let mut names = Vec::new();
            for entry in std::fs::read_dir(&path)? {
                let entry = entry?;
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
            names.sort();
            Ok(names)
        })
        .await
        .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?
        .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        Ok(ToolOutcome::ok(entries.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::traits::{ApprovalMode, ExecutorKind};

    fn descriptor() -> ToolDescriptor {
        ToolDescriptor {
            name: "list_files".into(),
            version: "1.0.0".into(),
            capabilities: vec!["fs.read".into()],
            dependencies: vec!["fs".into()],
            executor_kind: ExecutorKind::InProcess,
            approval_mode: ApprovalMode::Suggest,
            parameters_schema: serde_json::json!({}),
            entry_point: "builtin:list_files".into(),
            enabled: true,
            credential: None,
        }
    }

    #[tokio::test]
    async fn lists_directory_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), b"").expect("write");
        std::fs::write(dir.path().join("b.txt"), b"").expect("write");
        let tool = ListFilesTool::new(descriptor());
        let outcome = tool
            .invoke(serde_json::json!({"path": dir.path().to_string_lossy()}))
            .await
            .expect("invoke");
        assert!(outcome.stdout.contains("a.txt"));
        assert!(outcome.stdout.contains("b.txt"));
    }
}
