// ── File-backed static topology ──
//
// Two TOML files in one directory, one per half of the overlay. A missing
// file reads as empty. Writes go to a sibling temp file first and are
// renamed over the target.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use switchyard_core::{
    CoreError, StaticEdgePort, StaticSwitchLink, StaticTopology, StaticTopologyPersister,
};

pub const SWITCH_LINKS_FILE: &str = "switch-links.toml";
pub const EDGE_PORTS_FILE: &str = "edge-ports.toml";

#[derive(Debug, Default, Deserialize, Serialize)]
struct SwitchLinksFile {
    #[serde(default, rename = "switch_link")]
    links: Vec<StaticSwitchLink>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct EdgePortsFile {
    #[serde(default, rename = "edge_port")]
    ports: Vec<StaticEdgePort>,
}

/// [`StaticTopologyPersister`] writing `switch-links.toml` and
/// `edge-ports.toml` under `dir`.
#[derive(Debug, Clone)]
pub struct TomlStaticTopologyStore {
    dir: PathBuf,
}

impl TomlStaticTopologyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T>(&self, file: &str) -> Result<T, CoreError>
    where
        T: Default + for<'de> Deserialize<'de>,
    {
        let path = self.dir.join(file);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(persistence(&path, &e)),
        };
        toml::from_str(&text).map_err(|e| persistence(&path, &e))
    }

    fn write<T: Serialize>(&self, file: &str, value: &T) -> Result<(), CoreError> {
        let path = self.dir.join(file);
        let text = toml::to_string_pretty(value).map_err(|e| persistence(&path, &e))?;
        fs::create_dir_all(&self.dir).map_err(|e| persistence(&self.dir, &e))?;

        let tmp = self.dir.join(format!(".{file}.tmp"));
        fs::write(&tmp, text).map_err(|e| persistence(&tmp, &e))?;
        fs::rename(&tmp, &path).map_err(|e| persistence(&path, &e))?;
        debug!(path = %path.display(), "static topology file written");
        Ok(())
    }
}

fn persistence(path: &Path, err: &dyn std::fmt::Display) -> CoreError {
    CoreError::Persistence {
        message: format!("{}: {err}", path.display()),
    }
}

impl StaticTopologyPersister for TomlStaticTopologyStore {
    fn load(&self) -> Result<StaticTopology, CoreError> {
        let links: SwitchLinksFile = self.read(SWITCH_LINKS_FILE)?;
        let ports: EdgePortsFile = self.read(EDGE_PORTS_FILE)?;
        Ok(StaticTopology {
            switch_links: links.links,
            edge_ports: ports.ports,
        })
    }

    fn save_switch_links(&self, links: &[StaticSwitchLink]) -> Result<(), CoreError> {
        self.write(
            SWITCH_LINKS_FILE,
            &SwitchLinksFile {
                links: links.to_vec(),
            },
        )
    }

    fn save_edge_ports(&self, ports: &[StaticEdgePort]) -> Result<(), CoreError> {
        self.write(
            EDGE_PORTS_FILE,
            &EdgePortsFile {
                ports: ports.to_vec(),
            },
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn link(src: &str, dst: &str) -> StaticSwitchLink {
        StaticSwitchLink {
            source: src.parse().unwrap(),
            destination: dst.parse().unwrap(),
        }
    }

    #[test]
    fn missing_directory_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlStaticTopologyStore::new(dir.path().join("absent"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn halves_are_written_independently() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlStaticTopologyStore::new(dir.path());

        store
            .save_switch_links(&[link("openflow:1:1", "openflow:2:1")])
            .unwrap();
        assert!(dir.path().join(SWITCH_LINKS_FILE).exists());
        assert!(!dir.path().join(EDGE_PORTS_FILE).exists());

        store
            .save_edge_ports(&[StaticEdgePort {
                port: "openflow:3:7".parse().unwrap(),
            }])
            .unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.switch_links, vec![link("openflow:1:1", "openflow:2:1")]);
        assert_eq!(loaded.edge_ports.len(), 1);
        assert_eq!(loaded.edge_ports[0].port.to_string(), "openflow:3:7");
    }

    #[test]
    fn corrupt_file_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(EDGE_PORTS_FILE), "edge_port = 12").unwrap();
        let store = TomlStaticTopologyStore::new(dir.path());
        assert!(matches!(store.load(), Err(CoreError::Persistence { .. })));
    }
}
