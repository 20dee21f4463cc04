//! Enumerates function directories, reads each function's config, derives
//! trigger-type input bindings, and posts the aggregate to the operations
//! endpoint. Also exposes per-function CRUD and virtual-filesystem hrefs.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::errors::{Error, Result};
use crate::fs::Filesystem;
use crate::operations::OperationsClient;

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub functions_root: PathBuf,
    pub data_root: PathBuf,
    pub log_root: PathBuf,
    pub app_base_url: Url,
    pub site_root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionHrefs {
    pub script_root: String,
    pub primary_script: String,
    pub config_file: String,
    pub test_data: String,
    pub secrets: String,
    pub self_link: String,
}

/// `config` is the parsed `function.json` document, re-serialized verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionEnvelope {
    pub name: String,
    pub config: Value,
    pub href: FunctionHrefs,
}

/// When `files` is present the directory is replaced wholesale; otherwise
/// only `function.json` is (re)written from `config`.
#[derive(Debug, Clone, Default)]
pub struct FunctionInput {
    pub config: Option<Value>,
    pub files: Option<std::collections::BTreeMap<String, String>>,
}

const FUNCTION_CONFIG_FILE: &str = "function.json";
const HOST_CONFIG_FILE: &str = "host.json";

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(_) => true,
    }
}

/// Zero files falls back to the directory; one file is used as-is; otherwise
/// a `run.*` file wins, then `index.js`, then `config.source` (rejecting any
/// `..` path segment), then the directory again.
fn select_primary_script(dir: &Path, files: &[PathBuf], config: &Value) -> PathBuf {
    match files.len() {
        0 => dir.to_path_buf(),
        1 => files[0].clone(),
        _ => {
            if let Some(run) = files
                .iter()
                .find(|f| f.file_stem().and_then(|s| s.to_str()) == Some("run"))
            {
                return run.clone();
            }
            if let Some(index) = files
                .iter()
                .find(|f| f.file_name().and_then(|n| n.to_str()) == Some("index.js"))
            {
                return index.clone();
            }
            if let Some(source) = config.get("source").and_then(|v| v.as_str()) {
                let traverses_up = source.split(['/', '\\']).any(|seg| seg == "..");
                if !traverses_up {
                    return dir.join(source);
                }
            }
            dir.to_path_buf()
        }
    }
}

fn extract_trigger_bindings(config: &Value) -> Result<Vec<Value>> {
    if config.get("disabled").map(is_truthy).unwrap_or(false) {
        return Ok(Vec::new());
    }
    let Some(bindings) = config.get("bindings") else {
        return Ok(Vec::new());
    };
    let Some(input) = bindings.get("input") else {
        return Ok(Vec::new());
    };
    let input = input
        .as_array()
        .ok_or_else(|| Error::parse("bindings.input", "expected an array"))?;
    Ok(input
        .iter()
        .filter(|binding| {
            binding
                .get("type")
                .and_then(|t| t.as_str())
                .map(|t| t.to_ascii_lowercase().ends_with("trigger"))
                .unwrap_or(false)
        })
        .cloned()
        .collect())
}

pub struct FunctionMetadataManager<F: Filesystem, O: OperationsClient> {
    config: ManagerConfig,
    fs: F,
    operations: O,
}

impl<F: Filesystem, O: OperationsClient> FunctionMetadataManager<F, O> {
    pub fn new(config: ManagerConfig, fs: F, operations: O) -> Self {
        FunctionMetadataManager {
            config,
            fs,
            operations,
        }
    }

    /// Normalizes `path` into a `/api/vfs/...` URI, stripping the site-root
    /// prefix when `path` is inside it.
    fn vfs_uri(&self, path: &Path, is_dir: bool) -> String {
        let relative = path.strip_prefix(&self.config.site_root).unwrap_or(path);
        let relative = relative.to_string_lossy().replace('\\', "/");
        let relative = relative.trim_start_matches('/');
        let mut uri = format!(
            "{}/api/vfs/{}",
            self.config.app_base_url.as_str().trim_end_matches('/'),
            relative
        );
        if is_dir && !uri.ends_with('/') {
            uri.push('/');
        }
        uri
    }

    fn self_href(&self, name: &str) -> String {
        format!(
            "{}/api/functions/{}",
            self.config.app_base_url.as_str().trim_end_matches('/'),
            name
        )
    }

    async fn read_envelope(&self, name: &str, dir: &Path) -> Result<FunctionEnvelope> {
        let config_path = dir.join(FUNCTION_CONFIG_FILE);
        let text = self.fs.read_all_text(&config_path).await?;
        let config: Value = serde_json::from_str(&text).map_err(|_| Error::Invalid {
            path: config_path.clone(),
        })?;
        if !config.is_object() {
            return Err(Error::Invalid { path: config_path });
        }

        let files = self.fs.get_files(dir, "*", true).await?;
        let files: Vec<PathBuf> = files
            .into_iter()
            .filter(|f| f.file_name().and_then(|n| n.to_str()) != Some(FUNCTION_CONFIG_FILE))
            .collect();
        let primary_script = select_primary_script(dir, &files, &config);

        let href = FunctionHrefs {
            script_root: self.vfs_uri(dir, true),
            primary_script: self.vfs_uri(&primary_script, false),
            config_file: self.vfs_uri(&config_path, false),
            test_data: self.vfs_uri(
                &self
                    .config
                    .data_root
                    .join("functions/sampledata")
                    .join(format!("{name}.dat")),
                false,
            ),
            secrets: self.vfs_uri(
                &self
                    .config
                    .data_root
                    .join("functions/secrets")
                    .join(format!("{name}.json")),
                false,
            ),
            self_link: self.self_href(name),
        };

        Ok(FunctionEnvelope {
            name: name.to_string(),
            config,
            href,
        })
    }

    /// Entries missing `function.json` or with an invalid config are
    /// silently omitted.
    pub async fn list(&self) -> Result<Vec<FunctionEnvelope>> {
        let dirs = self
            .fs
            .get_directories(&self.config.functions_root)
            .await?;
        let mut envelopes = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Ok(envelope) = self.read_envelope(name, &dir).await {
                envelopes.push(envelope);
            }
        }
        Ok(envelopes)
    }

    /// A missing directory or an invalid config both surface as
    /// [`Error::NotFound`].
    pub async fn get(&self, name: &str) -> Result<FunctionEnvelope> {
        let dir = self.config.functions_root.join(name);
        self.read_envelope(name, &dir)
            .await
            .map_err(|_| Error::NotFound(name.to_string()))
    }

    pub async fn create_or_update(&self, name: &str, input: FunctionInput) -> Result<FunctionEnvelope> {
        let dir = self.config.functions_root.join(name);
        self.fs.ensure_directory(&dir).await?;

        if let Some(files) = input.files {
            self.fs.delete_directory_contents_safe(&dir).await?;
            for (filename, contents) in files {
                self.fs.write_all_text(&dir.join(&filename), &contents).await?;
            }
        } else {
            let config = input.config.unwrap_or_else(|| serde_json::json!({}));
            let text = serde_json::to_string_pretty(&config)
                .map_err(|e| Error::parse("function config", e.to_string()))?;
            self.fs.write_all_text(&dir.join(FUNCTION_CONFIG_FILE), &text).await?;
        }

        self.read_envelope(name, &dir).await
    }

    /// Propagates failure removing the function directory; swallows it for
    /// the auxiliary artifact paths.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let dir = self.config.functions_root.join(name);
        self.fs.delete_directory_safe(&dir, false).await?;

        let sampledata = self
            .config
            .data_root
            .join("functions/sampledata")
            .join(format!("{name}.dat"));
        let secrets = self
            .config
            .data_root
            .join("functions/secrets")
            .join(format!("{name}.json"));
        let log_dir = self.config.log_root.join("functions/function").join(name);

        self.fs.delete_file_safe(&sampledata).await;
        self.fs.delete_file_safe(&secrets).await;
        let _ = self.fs.delete_directory_safe(&log_dir, true).await;

        Ok(())
    }

    /// An absent file reads as the empty object rather than
    /// [`Error::NotFound`].
    pub async fn get_host_config(&self) -> Result<Value> {
        let path = self.config.functions_root.join(HOST_CONFIG_FILE);
        if !self.fs.exists(&path).await {
            return Ok(serde_json::json!({}));
        }
        let text = self.fs.read_all_text(&path).await?;
        serde_json::from_str(&text).map_err(|_| Error::Invalid { path })
    }

    pub async fn put_host_config(&self, value: &Value) -> Result<()> {
        let path = self.config.functions_root.join(HOST_CONFIG_FILE);
        let text = serde_json::to_string_pretty(value)
            .map_err(|e| Error::parse("host config", e.to_string()))?;
        self.fs.write_all_text(&path, &text).await
    }

    /// Returns immediately if `host.json` is absent. A single function's
    /// failure is logged and skipped; `cancel` is checked between functions
    /// and before the final POST so cancellation never posts a partial
    /// aggregate.
    pub async fn sync_triggers(&self, cancel: &CancellationToken) -> Result<()> {
        let host_path = self.config.functions_root.join(HOST_CONFIG_FILE);
        if !self.fs.exists(&host_path).await {
            return Ok(());
        }

        let envelopes = self.list().await?;
        let mut aggregate = Vec::new();
        for envelope in envelopes {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match extract_trigger_bindings(&envelope.config) {
                Ok(mut bindings) => aggregate.append(&mut bindings),
                Err(e) => {
                    tracing::warn!(function = %envelope.name, error = %e, "skipping function during trigger sync");
                }
            }
        }

        if aggregate.is_empty() {
            return Ok(());
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.operations
            .post("/operations/settriggers", Value::Array(aggregate))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::TokioFilesystem;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct RecordingOperationsClient {
        posts: Mutex<Vec<(String, Value)>>,
    }

    impl RecordingOperationsClient {
        fn new() -> Self {
            RecordingOperationsClient {
                posts: Mutex::new(Vec::new()),
            }
        }

        fn posts(&self) -> Vec<(String, Value)> {
            self.posts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OperationsClient for RecordingOperationsClient {
        async fn post(&self, relative_path: &str, json_body: Value) -> Result<()> {
            self.posts
                .lock()
                .unwrap()
                .push((relative_path.to_string(), json_body));
            Ok(())
        }
    }

    fn manager_config(root: &Path) -> ManagerConfig {
        ManagerConfig {
            functions_root: root.join("functions"),
            data_root: root.join("data"),
            log_root: root.join("logs"),
            app_base_url: Url::parse("https://example-site.example.com").unwrap(),
            site_root: root.join("functions"),
        }
    }

    async fn write_function(root: &Path, name: &str, config_json: &str) {
        let dir = root.join("functions").join(name);
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("function.json"), config_json)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn scenario_a_one_trigger_one_non_trigger() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        tokio::fs::create_dir_all(root.join("functions")).await.unwrap();
        tokio::fs::write(root.join("functions").join("host.json"), "{}")
            .await
            .unwrap();
        write_function(
            root,
            "foo",
            r#"{"bindings":{"input":[{"type":"queueTrigger","name":"q"},{"type":"table","name":"t"}]}}"#,
        )
        .await;

        let ops = RecordingOperationsClient::new();
        let manager = FunctionMetadataManager::new(manager_config(root), TokioFilesystem::new(), ops);
        manager.sync_triggers(&CancellationToken::new()).await.unwrap();

        let posts = manager.operations.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, "/operations/settriggers");
        assert_eq!(
            posts[0].1,
            serde_json::json!([{"type": "queueTrigger", "name": "q"}])
        );
    }

    #[tokio::test]
    async fn scenario_b_disabled_function_yields_no_post() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        tokio::fs::create_dir_all(root.join("functions")).await.unwrap();
        tokio::fs::write(root.join("functions").join("host.json"), "{}")
            .await
            .unwrap();
        write_function(
            root,
            "foo",
            r#"{"disabled":true,"bindings":{"input":[{"type":"httpTrigger"}]}}"#,
        )
        .await;

        let ops = RecordingOperationsClient::new();
        let manager = FunctionMetadataManager::new(manager_config(root), TokioFilesystem::new(), ops);
        manager.sync_triggers(&CancellationToken::new()).await.unwrap();

        assert!(manager.operations.posts().is_empty());
    }

    #[tokio::test]
    async fn scenario_f_missing_host_json_skips_enumeration() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        tokio::fs::create_dir_all(root.join("functions")).await.unwrap();
        write_function(root, "foo", r#"{"bindings":{"input":[{"type":"queueTrigger"}]}}"#).await;

        let ops = RecordingOperationsClient::new();
        let manager = FunctionMetadataManager::new(manager_config(root), TokioFilesystem::new(), ops);
        manager.sync_triggers(&CancellationToken::new()).await.unwrap();

        assert!(manager.operations.posts().is_empty());
    }

    #[tokio::test]
    async fn scenario_c_primary_script_selection() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        tokio::fs::create_dir_all(root.join("functions")).await.unwrap();
        let dir = root.join("functions").join("foo");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("function.json"), "{}").await.unwrap();
        tokio::fs::write(dir.join("run.csx"), "// run").await.unwrap();
        tokio::fs::write(dir.join("helper.csx"), "// helper").await.unwrap();

        let ops = RecordingOperationsClient::new();
        let manager = FunctionMetadataManager::new(manager_config(root), TokioFilesystem::new(), ops);
        let envelope = manager.get("foo").await.unwrap();
        assert!(envelope.href.primary_script.ends_with("run.csx"));
    }

    #[tokio::test]
    async fn list_omits_directories_without_a_valid_config() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        tokio::fs::create_dir_all(root.join("functions").join("good")).await.unwrap();
        tokio::fs::write(root.join("functions").join("good").join("function.json"), "{}")
            .await
            .unwrap();
        tokio::fs::create_dir_all(root.join("functions").join("missing-config"))
            .await
            .unwrap();
        tokio::fs::create_dir_all(root.join("functions").join("bad-json")).await.unwrap();
        tokio::fs::write(
            root.join("functions").join("bad-json").join("function.json"),
            "not json",
        )
        .await
        .unwrap();

        let ops = RecordingOperationsClient::new();
        let manager = FunctionMetadataManager::new(manager_config(root), TokioFilesystem::new(), ops);
        let envelopes = manager.list().await.unwrap();
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].name, "good");
    }

    #[tokio::test]
    async fn get_on_missing_function_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        tokio::fs::create_dir_all(root.join("functions")).await.unwrap();
        let ops = RecordingOperationsClient::new();
        let manager = FunctionMetadataManager::new(manager_config(root), TokioFilesystem::new(), ops);
        let err = manager.get("nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(name) if name == "nope"));
    }

    #[tokio::test]
    async fn create_or_update_with_files_round_trips_through_list() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        tokio::fs::create_dir_all(root.join("functions")).await.unwrap();
        let ops = RecordingOperationsClient::new();
        let manager = FunctionMetadataManager::new(manager_config(root), TokioFilesystem::new(), ops);

        let mut files = std::collections::BTreeMap::new();
        files.insert("function.json".to_string(), r#"{"bindings":{"input":[]}}"#.to_string());
        files.insert("run.js".to_string(), "module.exports = () => {};".to_string());

        manager
            .create_or_update("foo", FunctionInput { config: None, files: Some(files) })
            .await
            .unwrap();

        let envelope = manager.get("foo").await.unwrap();
        assert_eq!(envelope.config, serde_json::json!({"bindings": {"input": []}}));
    }

    #[tokio::test]
    async fn host_config_round_trips() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        tokio::fs::create_dir_all(root.join("functions")).await.unwrap();
        let ops = RecordingOperationsClient::new();
        let manager = FunctionMetadataManager::new(manager_config(root), TokioFilesystem::new(), ops);

        assert_eq!(manager.get_host_config().await.unwrap(), serde_json::json!({}));

        let doc = serde_json::json!({"version": "2.0", "extensions": {"queues": {}}});
        manager.put_host_config(&doc).await.unwrap();
        assert_eq!(manager.get_host_config().await.unwrap(), doc);
    }

    #[tokio::test]
    async fn delete_removes_directory_and_swallows_auxiliary_errors() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        tokio::fs::create_dir_all(root.join("functions")).await.unwrap();
        write_function(root, "foo", "{}").await;

        let ops = RecordingOperationsClient::new();
        let manager = FunctionMetadataManager::new(manager_config(root), TokioFilesystem::new(), ops);
        manager.delete("foo").await.unwrap();

        assert!(!root.join("functions").join("foo").exists());
    }

    #[test]
    fn primary_script_selection_is_deterministic() {
        let dir = PathBuf::from("/site/wwwroot/foo");
        let files = vec![dir.join("run.csx"), dir.join("helper.csx")];
        let config = serde_json::json!({});
        let a = select_primary_script(&dir, &files, &config);
        let b = select_primary_script(&dir, &files, &config);
        assert_eq!(a, b);
        assert_eq!(a, dir.join("run.csx"));
    }

    #[test]
    fn primary_script_rejects_parent_traversal_in_source() {
        let dir = PathBuf::from("/site/wwwroot/foo");
        let files = vec![dir.join("a.js"), dir.join("b.js")];
        let config = serde_json::json!({"source": "../secrets.js"});
        assert_eq!(select_primary_script(&dir, &files, &config), dir);
    }

    #[test]
    fn primary_script_falls_back_to_config_source() {
        let dir = PathBuf::from("/site/wwwroot/foo");
        let files = vec![dir.join("a.js"), dir.join("b.js")];
        let config = serde_json::json!({"source": "b.js"});
        assert_eq!(select_primary_script(&dir, &files, &config), dir.join("b.js"));
    }
}
