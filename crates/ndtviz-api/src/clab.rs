//! Containerlab topology files.
//!
//! Builds a [`TopologyGraph`] straight from a `*.clab.yml` definition so the
//! front ends can lay out a lab without a running backend. Node kinds pick
//! up the image declared under `topology.kinds`; link endpoints are
//! `node:interface` pairs.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::Error;
use crate::wire::{TopologyGraph, TopologyLink, TopologyNode};

#[derive(Debug, Deserialize)]
struct LabFile {
    #[serde(default)]
    name: Option<String>,
    topology: LabTopology,
}

#[derive(Debug, Deserialize)]
struct LabTopology {
    #[serde(default)]
    kinds: IndexMap<String, KindDefaults>,
    #[serde(default)]
    nodes: IndexMap<String, Option<serde_yaml::Mapping>>,
    #[serde(default)]
    links: Vec<LabLink>,
}

#[derive(Debug, Default, Deserialize)]
struct KindDefaults {
    #[serde(default)]
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LabLink {
    endpoints: Vec<String>,
}

/// A parsed lab: its name plus the derived graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Lab {
    pub name: Option<String>,
    pub graph: TopologyGraph,
}

/// Read and convert a containerlab file.
pub fn load(path: &Path) -> Result<Lab, Error> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::TopologyFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    parse(&text).map_err(|e| match e {
        Error::TopologyFile { message, .. } => Error::TopologyFile {
            path: path.display().to_string(),
            message,
        },
        other => other,
    })
}

/// Convert containerlab YAML text into a graph.
pub fn parse(text: &str) -> Result<Lab, Error> {
    let file: LabFile = serde_yaml::from_str(text).map_err(|e| invalid(e.to_string()))?;
    let topo = file.topology;

    let mut nodes = Vec::with_capacity(topo.nodes.len());
    for (id, props) in topo.nodes {
        let props = props.unwrap_or_default();
        let mut extra: IndexMap<String, serde_json::Value> = IndexMap::new();
        for (key, value) in props {
            let Some(key) = key.as_str().map(str::to_owned) else {
                continue;
            };
            let value = serde_json::to_value(&value).map_err(|e| invalid(e.to_string()))?;
            extra.insert(key, value);
        }

        let kind = take_string(&mut extra, "kind");
        let group = take_string(&mut extra, "group");
        // A node-level image wins over the kind default.
        let image = take_string(&mut extra, "image").or_else(|| {
            kind.as_ref()
                .and_then(|k| topo.kinds.get(k))
                .and_then(|d| d.image.clone())
        });

        nodes.push(TopologyNode {
            id,
            group,
            image,
            kind,
            extra,
        });
    }

    let mut links = Vec::with_capacity(topo.links.len());
    for link in topo.links {
        let [a, b] = link.endpoints.as_slice() else {
            return Err(invalid(format!(
                "link must have exactly two endpoints, got {:?}",
                link.endpoints
            )));
        };
        let (source, source_interface) = split_endpoint(a)?;
        let (target, target_interface) = split_endpoint(b)?;
        links.push(TopologyLink {
            source,
            target,
            source_interface,
            target_interface,
        });
    }

    Ok(Lab {
        name: file.name,
        graph: TopologyGraph { nodes, links },
    })
}

fn split_endpoint(endpoint: &str) -> Result<(String, String), Error> {
    endpoint
        .split_once(':')
        .map(|(node, iface)| (node.to_owned(), iface.to_owned()))
        .ok_or_else(|| invalid(format!("endpoint `{endpoint}` is not node:interface")))
}

fn take_string(map: &mut IndexMap<String, serde_json::Value>, key: &str) -> Option<String> {
    match map.shift_remove(key)? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn invalid(message: String) -> Error {
    Error::TopologyFile {
        path: "<inline>".into(),
        message,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LAB: &str = r#"
name: twin
topology:
  kinds:
    nokia_srlinux:
      image: ghcr.io/nokia/srlinux:24.3
  nodes:
    leaf1:
      kind: nokia_srlinux
      group: leaves
      mgmt-ipv4: 172.20.20.11
    leaf2:
      kind: nokia_srlinux
      image: ghcr.io/nokia/srlinux:23.10
    host1:
  links:
    - endpoints: ["leaf1:e1-1", "leaf2:e1-1"]
    - endpoints: ["leaf2:e1-2", "leaf1:e1-2"]
    - endpoints: ["host1:eth1", "leaf1:e1-3"]
"#;

    #[test]
    fn converts_nodes_with_kind_images() {
        let lab = parse(LAB).unwrap();
        assert_eq!(lab.name.as_deref(), Some("twin"));

        let ids: Vec<_> = lab.graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["leaf1", "leaf2", "host1"]);

        let leaf1 = lab.graph.node("leaf1").unwrap();
        assert_eq!(leaf1.image.as_deref(), Some("ghcr.io/nokia/srlinux:24.3"));
        assert_eq!(leaf1.group.as_deref(), Some("leaves"));
        assert_eq!(leaf1.extra["mgmt-ipv4"], "172.20.20.11");

        let leaf2 = lab.graph.node("leaf2").unwrap();
        assert_eq!(leaf2.image.as_deref(), Some("ghcr.io/nokia/srlinux:23.10"));

        let host1 = lab.graph.node("host1").unwrap();
        assert_eq!(host1.kind, None);
        assert_eq!(host1.image, None);
    }

    #[test]
    fn converts_links_in_file_order() {
        let lab = parse(LAB).unwrap();
        assert_eq!(
            lab.graph.links[1],
            TopologyLink {
                source: "leaf2".into(),
                target: "leaf1".into(),
                source_interface: "e1-2".into(),
                target_interface: "e1-2".into(),
            }
        );
        assert_eq!(lab.graph.interfaces_of("leaf1"), ["e1-1", "e1-2", "e1-3"]);
    }

    #[test]
    fn rejects_bad_endpoint() {
        let err = parse(
            "topology:\n  nodes: {a: {}, b: {}}\n  links:\n    - endpoints: [\"a\", \"b:e1\"]\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::TopologyFile { .. }), "got {err:?}");
    }

    #[test]
    fn load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.clab.yml");
        let err = load(&path).unwrap_err();
        let Error::TopologyFile { path: p, .. } = err else {
            panic!("expected topology file error");
        };
        assert!(p.ends_with("missing.clab.yml"));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("twin.clab.yml");
        std::fs::write(&path, LAB).unwrap();
        let lab = load(&path).unwrap();
        assert_eq!(lab.graph.links.len(), 3);
    }
}
