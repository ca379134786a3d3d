//! Topology and lab command handlers.

use serde::Serialize;
use tabled::Tabled;

use ndtviz_core::{EdgeOffset, LayoutConfig, TopologyLayout, TopologyLink, TopologyNode};

use crate::cli::{GlobalOpts, TopologyArgs};
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct LinkRow {
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Parallel")]
    group: String,
    #[tabled(rename = "Offset")]
    offset: String,
}

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Node")]
    id: String,
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Image")]
    image: String,
    #[tabled(rename = "Interfaces")]
    interfaces: usize,
}

/// A link joined with its resolved offset, for structured output.
#[derive(Serialize)]
struct LinkEntry<'a> {
    #[serde(flatten)]
    link: &'a TopologyLink,
    #[serde(flatten)]
    offset: &'a EdgeOffset,
}

fn endpoint(node: &str, iface: &str) -> String {
    if iface.is_empty() {
        node.to_owned()
    } else {
        format!("{node}:{iface}")
    }
}

impl From<&LinkEntry<'_>> for LinkRow {
    fn from(e: &LinkEntry<'_>) -> Self {
        Self {
            source: endpoint(&e.link.source, &e.link.source_interface),
            target: endpoint(&e.link.target, &e.link.target_interface),
            group: format!("{}/{}", e.offset.offset_index + 1, e.offset.group_size),
            offset: format!("{:+.1}", e.offset.offset),
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

/// Print a resolved topology as links (default) or nodes.
pub fn render(layout: &TopologyLayout, args: &TopologyArgs, global: &GlobalOpts) {
    let out = if args.nodes {
        let nodes: &[TopologyNode] = &layout.graph.nodes;
        output::render_list(
            &global.output,
            nodes,
            |n| NodeRow {
                id: n.id.clone(),
                group: n.group.clone().unwrap_or_default(),
                kind: n.kind.clone().unwrap_or_default(),
                image: n.image.clone().unwrap_or_default(),
                interfaces: layout.graph.interfaces_of(&n.id).len(),
            },
            |n| n.id.clone(),
        )
    } else {
        let entries: Vec<LinkEntry<'_>> = layout
            .links()
            .map(|(link, offset)| LinkEntry { link, offset })
            .collect();
        output::render_list(
            &global.output,
            &entries,
            |e| LinkRow::from(e),
            |e| format!("{} {}", e.link.source, e.link.target),
        )
    };
    output::print_output(&out, global.quiet);

    if !global.quiet && matches!(global.output, crate::cli::OutputFormat::Table) {
        eprintln!(
            "{} nodes, {} links, {} parallel groups",
            layout.graph.nodes.len(),
            layout.graph.links.len(),
            layout.parallel_groups()
        );
    }
}

/// `topology --file` without a configured backend.
pub fn from_file(
    args: &TopologyArgs,
    layout_config: &LayoutConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let Some(ref path) = args.file else {
        return Err(CliError::Validation {
            field: "file".into(),
            reason: "no topology file given".into(),
        });
    };
    let layout = TopologyLayout::from_lab_file(path, layout_config)?;
    render(&layout, args, global);
    Ok(())
}

pub async fn handle(
    controller: &ndtviz_core::Controller,
    args: &TopologyArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let layout = match args.file {
        Some(ref path) => TopologyLayout::from_lab_file(path, &controller.config().layout)?,
        None => controller.fetch_topology().await?,
    };
    render(&layout, args, global);
    Ok(())
}

pub async fn handle_lab(
    controller: &ndtviz_core::Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let info = controller.lab_info().await?;
    let out = output::render_single(
        &global.output,
        &info,
        |v| serde_yaml::to_string(v).unwrap_or_else(|_| v.to_string()),
        |v| {
            v.get("name")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_owned()
        },
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
