mod loader;
mod paths;
mod types;

pub use paths::{status_path_for, CONFIG_ENV_VAR};
pub use types::{ClientConfig, FolderSourceKind, ProjectConfig, Settings};

use crate::server_client::SyncFolderSpec;

impl ClientConfig {
    /// Active local projects as folder specs, in the order they were added.
    pub fn active_folder_specs(&self) -> Vec<SyncFolderSpec> {
        self.projects
            .iter()
            .filter(|project| project.active)
            .map(|project| SyncFolderSpec {
                project_id: project.id.clone(),
                folder_path: project.folder_path.clone(),
                project_name: project.name.clone(),
            })
            .collect()
    }

    /// Insert a project, replacing any existing entry with the same id.
    /// Returns true when an entry was replaced.
    pub fn upsert_project(&mut self, project: ProjectConfig) -> bool {
        match self.projects.iter_mut().find(|p| p.id == project.id) {
            Some(existing) => {
                *existing = project;
                true
            }
            None => {
                self.projects.push(project);
                false
            }
        }
    }

    pub fn remove_project(&mut self, project_id: &str) -> Option<ProjectConfig> {
        let idx = self.projects.iter().position(|p| p.id == project_id)?;
        Some(self.projects.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn project(id: &str, folder: &str, active: bool) -> ProjectConfig {
        ProjectConfig {
            id: id.to_string(),
            name: format!("Project {id}"),
            folder_path: PathBuf::from(folder),
            active,
        }
    }

    #[test]
    fn upsert_replaces_by_id() {
        let mut config = ClientConfig::default();
        assert!(!config.upsert_project(project("p1", "/a", true)));
        assert!(config.upsert_project(project("p1", "/b", true)));
        assert_eq!(config.projects.len(), 1);
        assert_eq!(config.projects[0].folder_path, PathBuf::from("/b"));
    }

    #[test]
    fn only_active_projects_become_specs() {
        let mut config = ClientConfig::default();
        config.upsert_project(project("p1", "/a", true));
        config.upsert_project(project("p2", "/b", false));
        let specs = config.active_folder_specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].project_id, "p1");
        assert_eq!(specs[0].folder_path, PathBuf::from("/a"));
    }

    #[test]
    fn remove_unknown_project_is_none() {
        let mut config = ClientConfig::default();
        config.upsert_project(project("p1", "/a", true));
        assert!(config.remove_project("nope").is_none());
        assert_eq!(config.remove_project("p1").map(|p| p.id), Some("p1".to_string()));
        assert!(config.projects.is_empty());
    }
}
