use std::sync::Arc;

use rvlab_build::{BuildConfig, BuildResult, SourceWriteReport};
use rvlab_relay::{ElfPayload, RelayConfig, RelayHandle};
use rvlab_store::{
    CopyReport, SortOrder, StoreError, TemplateProvisioner, Workspace, WorkspacePool,
    WorkspaceStore,
};

use crate::config::HostConfig;
use crate::error::{HostError, TicketError};

/// Everything that happened while creating one folder. Only admission
/// failures abort creation; copy, source and build problems are reported
/// here and the folder is kept.
#[derive(Debug, Clone)]
pub struct FolderOutcome {
    pub workspace: Workspace,
    pub evicted: Option<Workspace>,
    pub live: usize,
    pub copy: CopyReport,
    pub source: SourceWriteReport,
    pub build: BuildResult,
}

/// A built artifact ready to be relayed to the execution backend.
#[derive(Debug, Clone)]
pub struct RelayTicket {
    pub workspace: String,
    pub url: String,
    pub artifact: rvlab_build::Artifact,
}

impl RelayTicket {
    pub fn payload(&self) -> ElfPayload {
        ElfPayload {
            folder_name: self.workspace.clone(),
            file_name: self.artifact.file_name.clone(),
            elf_data: self.artifact.bytes.clone(),
        }
    }
}

pub struct FolderService {
    pool: Arc<WorkspacePool>,
    templates: Arc<TemplateProvisioner>,
    build: Arc<BuildConfig>,
    backend_url: String,
}

impl FolderService {
    pub fn new(config: &HostConfig) -> Result<Self, HostError> {
        let store = WorkspaceStore::open(&config.workspace_root)?;
        tracing::debug!(
            root = %store.root().display(),
            max = config.max_workspaces,
            "opened workspace store"
        );
        Ok(Self {
            pool: Arc::new(WorkspacePool::new(store, config.max_workspaces)),
            templates: Arc::new(TemplateProvisioner::new(&config.template_root)),
            build: Arc::new(config.build.clone()),
            backend_url: config.backend_url.clone(),
        })
    }

    /// Admits a workspace, seeds it from the template, writes the program and
    /// runs the toolchain once.
    pub async fn create_folder(&self, program: Option<String>) -> Result<FolderOutcome, HostError> {
        let pool = Arc::clone(&self.pool);
        let templates = Arc::clone(&self.templates);
        let build = Arc::clone(&self.build);
        let (admission, copy, source) = tokio::task::spawn_blocking(move || {
            let admission = pool.admit()?;
            let copy = templates.provision(&admission.workspace);
            let source =
                rvlab_build::write_source(&build, &admission.workspace, program.as_deref());
            Ok::<_, StoreError>((admission, copy, source))
        })
        .await??;

        tracing::info!(
            folder = admission.workspace.name(),
            live = admission.live,
            copied = copy.copied.len(),
            "created folder"
        );

        let build = rvlab_build::build(&self.build, &admission.workspace).await;
        if !build.success {
            tracing::warn!(
                folder = admission.workspace.name(),
                "build failed: {}",
                build.message
            );
        }

        Ok(FolderOutcome {
            workspace: admission.workspace,
            evicted: admission.evicted,
            live: admission.live,
            copy,
            source,
            build,
        })
    }

    /// Live folders, newest first.
    pub async fn list_folders(&self) -> Result<Vec<Workspace>, HostError> {
        let pool = Arc::clone(&self.pool);
        let folders =
            tokio::task::spawn_blocking(move || pool.list(SortOrder::NewestFirst)).await??;
        Ok(folders)
    }

    /// Finds and reads the artifact of an existing folder.
    pub async fn relay_ticket(&self, name: Option<&str>) -> Result<RelayTicket, TicketError> {
        let name = match name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(TicketError::MissingName),
        };
        let pool = Arc::clone(&self.pool);
        let extension = self.build.artifact_extension.clone();
        let artifact = tokio::task::spawn_blocking(move || -> Result<_, TicketError> {
            let workspace = match pool.store().get(&name) {
                Ok(workspace) => workspace,
                Err(StoreError::NotFound(name)) => return Err(TicketError::NotFound(name)),
                Err(err @ StoreError::InvalidName { .. }) => {
                    return Err(TicketError::InvalidName(err));
                }
                Err(err) => return Err(TicketError::Host(err.into())),
            };
            let location = rvlab_build::locate(&workspace, &extension)
                .map_err(TicketError::Read)?
                .ok_or_else(|| TicketError::NoArtifact(name.clone()))?;
            let artifact = location.read().map_err(TicketError::Read)?;
            Ok((name, artifact))
        })
        .await
        .map_err(HostError::from)?;
        let (workspace, artifact) = artifact?;

        tracing::debug!(
            folder = %workspace,
            file = %artifact.file_name,
            len = artifact.bytes.len(),
            "artifact ready for relay"
        );
        Ok(RelayTicket {
            workspace,
            url: self.backend_url.clone(),
            artifact,
        })
    }

    /// Opens a relay session for a folder's artifact. Nothing is dialed
    /// unless the artifact exists.
    pub async fn start_relay(&self, name: &str) -> Result<RelayHandle, TicketError> {
        let ticket = self.relay_ticket(Some(name)).await?;
        let config = RelayConfig::new(ticket.url.clone());
        let handle = rvlab_relay::start(&config, &ticket.workspace, Some(ticket.payload())).await?;
        Ok(handle)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use rvlab_build::Toolchain;
    use std::path::Path;
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    fn config(dir: &Path, script: &str) -> HostConfig {
        let mut config = HostConfig::default();
        config.workspace_root = dir.join("folders");
        config.template_root = dir.join("template");
        config.max_workspaces = 2;
        config.build.toolchain = Toolchain::shell(script);
        config
    }

    #[tokio::test]
    async fn create_folder_builds_and_reports() {
        let dir = TempDir::new().expect("tmp");
        std::fs::create_dir_all(dir.path().join("template")).expect("template");
        std::fs::write(dir.path().join("template/Makefile"), "all:\n").expect("makefile");
        let service = FolderService::new(&config(
            dir.path(),
            "cp main.c program.elf && echo built",
        ))
        .expect("service");

        let outcome = service
            .create_folder(Some("int main() { return 0; }".into()))
            .await
            .expect("create");
        assert_eq!(outcome.live, 1);
        assert!(outcome.evicted.is_none());
        assert_eq!(outcome.copy.copied, vec!["Makefile".to_string()]);
        assert!(outcome.source.success);
        assert!(outcome.build.success, "{}", outcome.build.message);
        assert_eq!(outcome.build.output().trim(), "built");

        let ticket = service
            .relay_ticket(Some(outcome.workspace.name()))
            .await
            .expect("ticket");
        assert_eq!(ticket.artifact.file_name, "program.elf");
        assert_eq!(ticket.artifact.bytes, b"int main() { return 0; }");
        assert_eq!(ticket.payload().folder_name, outcome.workspace.name());
    }

    #[tokio::test]
    async fn oldest_folder_is_evicted_at_capacity() {
        let dir = TempDir::new().expect("tmp");
        let service = FolderService::new(&config(dir.path(), "true")).expect("service");
        let first = service.create_folder(None).await.expect("first");
        let second = service.create_folder(None).await.expect("second");
        let third = service.create_folder(None).await.expect("third");

        assert_eq!(
            third.evicted.as_ref().map(Workspace::name),
            Some(first.workspace.name())
        );
        assert_eq!(third.live, 2);
        let names: Vec<_> = service
            .list_folders()
            .await
            .expect("list")
            .iter()
            .map(|w| w.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                third.workspace.name().to_string(),
                second.workspace.name().to_string()
            ]
        );
    }

    #[tokio::test]
    async fn ticket_errors_are_distinguished() {
        let dir = TempDir::new().expect("tmp");
        let service = FolderService::new(&config(dir.path(), "true")).expect("service");
        let built = service.create_folder(None).await.expect("create");

        assert!(matches!(
            service.relay_ticket(None).await,
            Err(TicketError::MissingName)
        ));
        assert!(matches!(
            service.relay_ticket(Some("")).await,
            Err(TicketError::MissingName)
        ));
        assert!(matches!(
            service.relay_ticket(Some("../etc")).await,
            Err(TicketError::InvalidName(_))
        ));
        assert!(matches!(
            service.relay_ticket(Some("folder-1-zzzzzz")).await,
            Err(TicketError::NotFound(_))
        ));
        assert!(matches!(
            service.relay_ticket(Some(built.workspace.name())).await,
            Err(TicketError::NoArtifact(_))
        ));
    }

    #[tokio::test]
    async fn ticket_names_are_used_verbatim() {
        let dir = TempDir::new().expect("tmp");
        let service = FolderService::new(&config(dir.path(), "cp main.c program.elf"))
            .expect("service");
        let built = service.create_folder(None).await.expect("create");
        let name = built.workspace.name();

        let padded = format!(" {name} ");
        match service.relay_ticket(Some(&padded)).await {
            Err(TicketError::NotFound(missing)) => assert_eq!(missing, padded),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            service.relay_ticket(Some("  ")).await,
            Err(TicketError::NotFound(_))
        ));
        assert!(service.relay_ticket(Some(name)).await.is_ok());
    }

    #[tokio::test]
    async fn start_relay_without_artifact_never_dials() {
        let dir = TempDir::new().expect("tmp");
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let mut config = config(dir.path(), "true");
        config.backend_url = format!("ws://{}", listener.local_addr().expect("addr"));
        let service = FolderService::new(&config).expect("service");
        let built = service.create_folder(None).await.expect("create");

        assert!(matches!(
            service.start_relay(built.workspace.name()).await,
            Err(TicketError::NoArtifact(_))
        ));
        let accepted =
            tokio::time::timeout(std::time::Duration::from_millis(200), listener.accept()).await;
        assert!(accepted.is_err());
    }
}
