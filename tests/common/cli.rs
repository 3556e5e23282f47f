//! Helpers for running the `cms-migrate` binary against temporary projects.

use assert_cmd::Command;
use serde_json::{Value, json};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tempfile::TempDir;

/// A temporary backend project directory.
pub struct MigrateWorkspace {
    _temp: TempDir,
    pub root: PathBuf,
}

impl MigrateWorkspace {
    /// Empty project with the standard test registry.
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("create temp dir");
        let root = temp.path().to_path_buf();
        fs::create_dir_all(root.join("data")).expect("create data dir");
        fs::create_dir_all(root.join("public/uploads")).expect("create uploads dir");
        fs::write(
            root.join("content-types.json"),
            serde_json::to_string_pretty(&registry()).unwrap(),
        )
        .expect("write registry");
        Self { _temp: temp, root }
    }

    pub fn uploads(&self) -> PathBuf {
        self.root.join("public/uploads")
    }

    /// Write a media record and its file.
    pub fn add_media(&self, id: i64, hash: &str, bytes: &[u8]) {
        let name = format!("{hash}.png");
        fs::write(self.uploads().join(&name), bytes).unwrap();
        let record = json!({
            "id": id, "name": name, "hash": hash, "ext": ".png",
            "mime": "image/png", "url": format!("/uploads/{name}")
        });
        append_line(&self.root.join("data/media.jsonl"), &record);
    }

    /// Write a stored entry (media attributes as ids).
    pub fn add_entry(&self, uid: &str, entry: &Value) {
        let file = format!("{}.jsonl", uid.replace("::", "__"));
        append_line(&self.root.join("data").join(file), entry);
    }

    /// Stored records of a JSONL data file.
    pub fn records(&self, file: &str) -> Vec<Value> {
        fs::read_to_string(self.root.join("data").join(file))
            .unwrap_or_default()
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }
}

fn append_line(path: &Path, value: &Value) {
    let mut content = fs::read_to_string(path).unwrap_or_default();
    content.push_str(&serde_json::to_string(value).unwrap());
    content.push('\n');
    fs::write(path, content).unwrap();
}

pub fn registry() -> Value {
    json!({
        "contentTypes": [
            {
                "uid": "api::article.article",
                "kind": "collectionType",
                "collectionName": "articles",
                "attributes": {
                    "title": {"type": "string", "required": true},
                    "cover": {"type": "media"}
                }
            },
            {
                "uid": "api::home.home",
                "kind": "singleType",
                "collectionName": "homes",
                "attributes": {"hero": {"type": "media"}}
            }
        ],
        "components": []
    })
}

pub struct RunOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

#[allow(deprecated)]
pub fn cms_migrate() -> Command {
    Command::cargo_bin("cms-migrate").expect("cms-migrate binary not found")
}

/// Run the binary in the workspace with `--project` set.
pub fn run_cli<I, S>(workspace: &MigrateWorkspace, args: I, label: &str) -> RunOutput
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = cms_migrate()
        .current_dir(&workspace.root)
        .arg("--project")
        .arg(&workspace.root)
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("CMS_MIGRATE_PROJECT")
        .env_remove("CMS_MIGRATE_UPLOADS_DIR")
        .env_remove("CMS_MIGRATE_EXPORT_DIR")
        .env_remove("CMS_MIGRATE_API_PREFIX")
        .env_remove("CMS_MIGRATE_LOG_FILE")
        .output()
        .unwrap_or_else(|e| panic!("{label}: failed to run cms-migrate: {e}"));

    RunOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}
