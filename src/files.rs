//! Virtual file access inside running containers.
//!
//! There is no native "list files in a pod" API, so these operations shell
//! out through the exec primitive and parse textual output. Parsing is
//! strict and defensive: malformed lines are skipped, kinds are read from
//! the permission string, and failures are classified from exit code and
//! stderr, never guessed from content. Every path, pattern and file name is
//! validated and passed as a discrete argv element; nothing is ever
//! interpolated into a shell string.

use bytes::Bytes;
use log::debug;

use crate::error::{FileErrorKind, OrchestratorError, OrchestratorResult};
use crate::models::{ExecOutput, FileEntry, FileKind};
use crate::naming::{parent_path, sanitize_resource_name};
use crate::Orchestrator;

fn ensure_safe_path(path: &str) -> OrchestratorResult<()> {
    if path.is_empty() {
        return Err(OrchestratorError::invalid_input("path must not be empty"));
    }
    if !path.starts_with('/') {
        return Err(OrchestratorError::invalid_input(format!(
            "path must be absolute: {:?}",
            path
        )));
    }
    if path.chars().any(|c| c.is_control()) {
        return Err(OrchestratorError::invalid_input(
            "path must not contain control characters",
        ));
    }
    Ok(())
}

fn ensure_safe_fragment(value: &str, what: &str) -> OrchestratorResult<()> {
    if value.is_empty() {
        return Err(OrchestratorError::invalid_input(format!(
            "{} must not be empty",
            what
        )));
    }
    if value.contains('/') || value.chars().any(|c| c.is_control()) {
        return Err(OrchestratorError::invalid_input(format!(
            "{} must not contain path separators or control characters",
            what
        )));
    }
    Ok(())
}

/// Classify a failed exec-based file operation from its stderr.
fn classify_failure(path: &str, output: &ExecOutput) -> OrchestratorError {
    let stderr = output.stderr.to_ascii_lowercase();
    let kind = if stderr.contains("no such file or directory") || stderr.contains("not found") {
        FileErrorKind::NotFound
    } else if stderr.contains("permission denied") {
        FileErrorKind::PermissionDenied
    } else {
        FileErrorKind::Unknown
    };
    let message = if output.stderr.trim().is_empty() {
        format!("exit code {}", output.exit_code)
    } else {
        output.stderr.trim().to_string()
    };
    OrchestratorError::File {
        kind,
        path: path.to_string(),
        message,
    }
}

/// Byte offset of the start of the n-th (1-based) whitespace-separated
/// field, so everything from there on can be taken verbatim (file names may
/// contain spaces).
fn field_offset(line: &str, n: usize) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut idx = 0;
    let mut field = 0;
    while idx < bytes.len() {
        while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
            idx += 1;
        }
        if idx >= bytes.len() {
            return None;
        }
        field += 1;
        if field == n {
            return Some(idx);
        }
        while idx < bytes.len() && !bytes[idx].is_ascii_whitespace() {
            idx += 1;
        }
    }
    None
}

fn join_path(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Parse `ls -la` output into entries. Skips the `total N` header, blank
/// lines, lines with fewer than nine fields, and the `.`/`..` entries; when
/// `path` is not the root a synthetic `..` entry pointing at the parent is
/// prepended so callers can navigate upward.
fn parse_ls_output(raw: &str, path: &str) -> Vec<FileEntry> {
    let mut entries = Vec::new();
    if path != "/" {
        entries.push(FileEntry {
            name: "..".to_string(),
            path: parent_path(path),
            kind: FileKind::Directory,
            size: 0,
            permissions: "-".to_string(),
            modified: None,
        });
    }

    for line in raw.lines() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with("total ") {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 9 {
            continue;
        }
        let permissions = fields[0];
        let Some(name_start) = field_offset(line, 9) else {
            continue;
        };
        let mut name = line[name_start..].to_string();
        // Symlink listings carry the target after an arrow.
        if permissions.starts_with('l') {
            if let Some(arrow) = name.find(" -> ") {
                name.truncate(arrow);
            }
        }
        if name == "." || name == ".." {
            continue;
        }
        let kind = if permissions.starts_with('d') {
            FileKind::Directory
        } else {
            FileKind::File
        };
        entries.push(FileEntry {
            path: join_path(path, &name),
            kind,
            size: fields[4].parse().unwrap_or(0),
            permissions: permissions.to_string(),
            modified: Some(fields[5..8].join(" ")),
            name,
        });
    }
    entries
}

impl Orchestrator {
    /// List a directory inside the service's container.
    pub async fn list_container_files(
        &self,
        service: &str,
        namespace: &str,
        path: &str,
    ) -> OrchestratorResult<Vec<FileEntry>> {
        ensure_safe_path(path)?;
        let service = sanitize_resource_name(service);
        let namespace = sanitize_resource_name(namespace);
        let (pod, container) = self.resolve_service_pod(&service, &namespace).await?;

        let command = ["ls", "-la", path].map(String::from);
        let output = self
            .client()
            .exec(&namespace, &pod, &container, &command, None)
            .await?;
        if !output.success() {
            return Err(classify_failure(path, &output));
        }
        debug!("listed {} in {}/{}", path, namespace, pod);
        Ok(parse_ls_output(&output.stdout, path))
    }

    /// Read a file from the service's container.
    pub async fn read_container_file(
        &self,
        service: &str,
        namespace: &str,
        path: &str,
    ) -> OrchestratorResult<Vec<u8>> {
        ensure_safe_path(path)?;
        let service = sanitize_resource_name(service);
        let namespace = sanitize_resource_name(namespace);
        let (pod, container) = self.resolve_service_pod(&service, &namespace).await?;

        let command = ["cat", path].map(String::from);
        let output = self
            .client()
            .exec(&namespace, &pod, &container, &command, None)
            .await?;
        if !output.success() {
            return Err(classify_failure(path, &output));
        }
        Ok(output.stdout.into_bytes())
    }

    /// Write a file inside the service's container. The payload streams to
    /// `tee`'s stdin, so exit code 0 already confirms the write without a
    /// second round trip.
    pub async fn write_container_file(
        &self,
        service: &str,
        namespace: &str,
        path: &str,
        contents: Vec<u8>,
    ) -> OrchestratorResult<()> {
        ensure_safe_path(path)?;
        let service = sanitize_resource_name(service);
        let namespace = sanitize_resource_name(namespace);
        let (pod, container) = self.resolve_service_pod(&service, &namespace).await?;

        let command = ["tee", path].map(String::from);
        let output = self
            .client()
            .exec(
                &namespace,
                &pod,
                &container,
                &command,
                Some(Bytes::from(contents)),
            )
            .await?;
        if !output.success() {
            return Err(classify_failure(path, &output));
        }
        debug!("wrote {} in {}/{}", path, namespace, pod);
        Ok(())
    }

    /// Upload a file into a directory of the service's container.
    pub async fn upload_container_file(
        &self,
        service: &str,
        namespace: &str,
        directory: &str,
        file_name: &str,
        contents: Vec<u8>,
    ) -> OrchestratorResult<()> {
        ensure_safe_path(directory)?;
        ensure_safe_fragment(file_name, "file name")?;
        let path = join_path(directory, file_name);
        self.write_container_file(service, namespace, &path, contents)
            .await
    }

    /// Find files whose name contains `pattern` under `path`. Results come
    /// from `find -type f`, so every entry is a file; directory status is
    /// never inferred from the name.
    pub async fn search_container_files(
        &self,
        service: &str,
        namespace: &str,
        path: &str,
        pattern: &str,
    ) -> OrchestratorResult<Vec<FileEntry>> {
        ensure_safe_path(path)?;
        ensure_safe_fragment(pattern, "search pattern")?;
        let service = sanitize_resource_name(service);
        let namespace = sanitize_resource_name(namespace);
        let (pod, container) = self.resolve_service_pod(&service, &namespace).await?;

        let command = [
            "find".to_string(),
            path.to_string(),
            "-name".to_string(),
            format!("*{}*", pattern),
            "-type".to_string(),
            "f".to_string(),
        ];
        let output = self
            .client()
            .exec(&namespace, &pod, &container, &command, None)
            .await?;
        // find reports unreadable subtrees on stderr while still printing
        // matches; only a fully empty failure is an error.
        if !output.success() && output.stdout.trim().is_empty() {
            return Err(classify_failure(path, &output));
        }

        let entries = output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|full_path| FileEntry {
                name: full_path.rsplit('/').next().unwrap_or(full_path).to_string(),
                path: full_path.to_string(),
                kind: FileKind::File,
                size: 0,
                permissions: "-".to_string(),
                modified: None,
            })
            .collect();
        Ok(entries)
    }

    /// One-shot command execution in the service's container: captured
    /// stdout, stderr and exit code, no PTY, no interactivity.
    pub async fn exec_command(
        &self,
        service: &str,
        namespace: &str,
        command: &[String],
    ) -> OrchestratorResult<ExecOutput> {
        if command.is_empty() {
            return Err(OrchestratorError::invalid_input("command must not be empty"));
        }
        if command
            .iter()
            .any(|arg| arg.chars().any(|c| c.is_control()))
        {
            return Err(OrchestratorError::invalid_input(
                "command arguments must not contain control characters",
            ));
        }
        let service = sanitize_resource_name(service);
        let namespace = sanitize_resource_name(namespace);
        let (pod, container) = self.resolve_service_pod(&service, &namespace).await?;
        self.client()
            .exec(&namespace, &pod, &container, command, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::test_support::FakeCluster;
    use std::sync::Arc;

    fn orchestrator(fake: Arc<FakeCluster>) -> Orchestrator {
        Orchestrator::with_client(fake, OrchestratorConfig::default())
    }

    fn fake_with_pod() -> Arc<FakeCluster> {
        let fake = Arc::new(FakeCluster::new());
        fake.add_ready_pod("api-5f7c9-abcde", "api");
        fake
    }

    const LS_FIXTURE: &str = "total 12\n\
        drwxr-xr-x    2 root     root          4096 Jan 10 12:01 conf.d\n\
        drwxr-xr-x    3 app      app           4096 Jan 10 12:02 static assets dir\n\
        -rw-r--r--    1 app      app            812 Jan 10 12:03 main config.yaml\n\
        drwxr-xr-x    2 root     root          4096 Jan 10 12:00 .\n\
        drwxr-xr-x    1 root     root          4096 Jan  9 09:00 ..\n";

    #[test]
    fn ls_parser_keeps_real_entries_and_prepends_parent() {
        let entries = parse_ls_output(LS_FIXTURE, "/app");
        assert_eq!(entries.len(), 4);

        assert_eq!(entries[0].name, "..");
        assert_eq!(entries[0].path, "/");
        assert_eq!(entries[0].kind, FileKind::Directory);

        assert_eq!(entries[1].name, "conf.d");
        assert_eq!(entries[1].kind, FileKind::Directory);
        assert_eq!(entries[1].path, "/app/conf.d");

        assert_eq!(entries[2].name, "static assets dir");
        assert_eq!(entries[2].kind, FileKind::Directory);

        assert_eq!(entries[3].name, "main config.yaml");
        assert_eq!(entries[3].kind, FileKind::File);
        assert_eq!(entries[3].size, 812);
        assert_eq!(entries[3].modified.as_deref(), Some("Jan 10 12:03"));
    }

    #[test]
    fn ls_parser_skips_malformed_lines_and_the_total_header() {
        let raw = "total 4\nbroken line\n-rw-r--r-- 1 app app 10 Jan 1 00:00 ok.txt\n\n";
        let entries = parse_ls_output(raw, "/");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "ok.txt");
    }

    #[test]
    fn empty_directory_yields_only_the_synthetic_parent() {
        let entries = parse_ls_output("total 0\n", "/app");
        assert_eq!(
            entries,
            vec![FileEntry {
                name: "..".to_string(),
                path: "/".to_string(),
                kind: FileKind::Directory,
                size: 0,
                permissions: "-".to_string(),
                modified: None,
            }]
        );
    }

    #[test]
    fn root_listing_has_no_parent_entry() {
        let entries = parse_ls_output("total 0\n", "/");
        assert!(entries.is_empty());
    }

    #[test]
    fn symlink_names_drop_the_arrow_target() {
        let raw = "lrwxrwxrwx 1 root root 7 Jan 1 00:00 current -> /srv/v2\n";
        let entries = parse_ls_output(raw, "/srv");
        assert_eq!(entries[1].name, "current");
        assert_eq!(entries[1].kind, FileKind::File);
    }

    #[test]
    fn missing_file_classifies_as_not_found() {
        let output = ExecOutput {
            stdout: String::new(),
            stderr: "cat: /x: No such file or directory\n".to_string(),
            exit_code: 1,
        };
        match classify_failure("/x", &output) {
            OrchestratorError::File { kind, path, .. } => {
                assert_eq!(kind, FileErrorKind::NotFound);
                assert_eq!(path, "/x");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn permission_and_opaque_failures_classify_separately() {
        let denied = ExecOutput {
            stdout: String::new(),
            stderr: "cat: /etc/shadow: Permission denied".to_string(),
            exit_code: 1,
        };
        assert!(matches!(
            classify_failure("/etc/shadow", &denied),
            OrchestratorError::File {
                kind: FileErrorKind::PermissionDenied,
                ..
            }
        ));

        let opaque = ExecOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 137,
        };
        match classify_failure("/x", &opaque) {
            OrchestratorError::File { kind, message, .. } => {
                assert_eq!(kind, FileErrorKind::Unknown);
                assert_eq!(message, "exit code 137");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn unsafe_paths_are_rejected() {
        assert!(ensure_safe_path("/ok/path with spaces").is_ok());
        assert!(ensure_safe_path("").is_err());
        assert!(ensure_safe_path("relative/path").is_err());
        assert!(ensure_safe_path("/bad\npath").is_err());
        assert!(ensure_safe_fragment("app.conf", "file name").is_ok());
        assert!(ensure_safe_fragment("../escape", "file name").is_err());
        assert!(ensure_safe_fragment("a\tb", "search pattern").is_err());
    }

    #[tokio::test]
    async fn listing_runs_ls_with_discrete_arguments() {
        let fake = fake_with_pod();
        fake.push_exec(ExecOutput {
            stdout: LS_FIXTURE.to_string(),
            stderr: String::new(),
            exit_code: 0,
        });
        let orch = orchestrator(fake.clone());

        let entries = orch
            .list_container_files("api", "demo", "/app")
            .await
            .unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].name, "..");

        let calls = fake.exec_calls.lock().unwrap();
        assert_eq!(calls[0].0, vec!["ls", "-la", "/app"]);
        assert!(calls[0].1.is_none());
    }

    #[tokio::test]
    async fn listing_without_pods_is_no_pod_found() {
        let orch = orchestrator(Arc::new(FakeCluster::new()));
        let err = orch
            .list_container_files("api", "demo", "/app")
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::NoPodFound { .. }));
    }

    #[tokio::test]
    async fn missing_file_read_surfaces_as_not_found() {
        let fake = fake_with_pod();
        fake.push_exec(ExecOutput {
            stdout: String::new(),
            stderr: "cat: /x: No such file or directory".to_string(),
            exit_code: 1,
        });
        let orch = orchestrator(fake);

        let err = orch
            .read_container_file("api", "demo", "/x")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::File {
                kind: FileErrorKind::NotFound,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn write_streams_the_payload_to_tee() {
        let fake = fake_with_pod();
        fake.push_exec(ExecOutput {
            stdout: "contents".to_string(),
            stderr: String::new(),
            exit_code: 0,
        });
        let orch = orchestrator(fake.clone());

        orch.write_container_file("api", "demo", "/app/app.conf", b"contents".to_vec())
            .await
            .unwrap();

        let calls = fake.exec_calls.lock().unwrap();
        assert_eq!(calls[0].0, vec!["tee", "/app/app.conf"]);
        assert_eq!(calls[0].1.as_deref(), Some(b"contents".as_slice()));
    }

    #[tokio::test]
    async fn upload_joins_directory_and_name() {
        let fake = fake_with_pod();
        fake.push_exec(ExecOutput::default());
        let orch = orchestrator(fake.clone());

        orch.upload_container_file("api", "demo", "/data", "dump.sql", b"select 1;".to_vec())
            .await
            .unwrap();
        assert_eq!(
            fake.exec_calls.lock().unwrap()[0].0,
            vec!["tee", "/data/dump.sql"]
        );

        let err = orch
            .upload_container_file("api", "demo", "/data", "../etc/passwd", Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn search_results_are_always_files() {
        let fake = fake_with_pod();
        fake.push_exec(ExecOutput {
            stdout: "/app/config.yaml\n/app/sub/settings\n".to_string(),
            stderr: String::new(),
            exit_code: 0,
        });
        let orch = orchestrator(fake.clone());

        let entries = orch
            .search_container_files("api", "demo", "/app", "config")
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        // "settings" has no extension; it is still reported as a file
        // because find already filtered on type.
        assert!(entries.iter().all(|e| e.kind == FileKind::File));
        assert_eq!(entries[1].name, "settings");
        assert_eq!(
            fake.exec_calls.lock().unwrap()[0].0,
            vec!["find", "/app", "-name", "*config*", "-type", "f"]
        );
    }

    #[tokio::test]
    async fn exec_command_returns_captured_output() {
        let fake = fake_with_pod();
        fake.push_exec(ExecOutput {
            stdout: "PONG\n".to_string(),
            stderr: String::new(),
            exit_code: 0,
        });
        let orch = orchestrator(fake);

        let output = orch
            .exec_command("api", "demo", &["redis-cli".to_string(), "ping".to_string()])
            .await
            .unwrap();
        assert_eq!(output.stdout, "PONG\n");
        assert!(output.success());

        let err = orch.exec_command("api", "demo", &[]).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidInput { .. }));
    }
}
