use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::core::node::{Edge, NodeId};
use crate::core::project::Project;
use crate::error::{Result, SysgraphError};
use crate::graph::builder::{remove_edge, remove_node};
use crate::graph::cycles::{add_typed_edge, detect_cycles};
use crate::graph::ops::{
    analyze_impact, dependency_path, direct_downstream, direct_upstream, extract_subgraph,
    transitive_downstream, transitive_upstream,
};
use crate::graph::order::{compute_phases, topological_sort, topological_sort_subset};
use crate::graph::risk::{identify_risk_nodes, NodeDegree};
use crate::graph::scope::validate_scope;
use crate::graph::viz::{self, Direction};
use crate::graph::NodeSet;
use crate::util::output;

#[derive(Parser, Debug)]
#[command(name = "sysgraph")]
#[command(about = "Dependency graph engine for systems", long_about = None)]
pub struct Cli {
    #[arg(short, long)]
    pub snapshot: Option<PathBuf>,
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
    #[arg(short, long)]
    pub quiet: bool,
    #[arg(long)]
    pub no_color: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render the graph
    Show(ShowArgs),
    /// What a node depends on
    Deps(NodeQueryArgs),
    /// What depends on a node
    Dependents(NodeQueryArgs),
    /// Dependency-first implementation order
    Order(OrderArgs),
    /// Waves of nodes that can be worked on together
    Phases(OrderArgs),
    Cycles(JsonArgs),
    /// Everything affected by a change to a node
    Impact(ImpactArgs),
    /// Check that a set of nodes is self-contained
    Scope(ScopeArgs),
    /// Fan-in and fan-out counts
    Risk(RiskArgs),
    /// Cycles, dangling edges and isolated nodes
    Check(JsonArgs),
    /// Add a dependency edge, refusing any that would create a cycle
    Link(LinkArgs),
    Unlink(UnlinkArgs),
    Remove(RemoveArgs),
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[arg(long)]
    pub format: Option<String>,
    #[arg(long)]
    pub direction: Option<String>,
}

#[derive(Args, Debug)]
pub struct NodeQueryArgs {
    pub node: String,
    #[arg(short = 't', long)]
    pub transitive: bool,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct OrderArgs {
    #[arg(long, value_delimiter = ',')]
    pub scope: Vec<String>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct JsonArgs {
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ImpactArgs {
    pub node: String,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ScopeArgs {
    #[arg(required = true, value_delimiter = ',')]
    pub nodes: Vec<String>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RiskArgs {
    #[arg(long)]
    pub top: Option<usize>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    pub source: String,
    pub target: String,
    #[arg(long = "type", default_value = crate::core::node::DEFAULT_EDGE_KIND)]
    pub kind: String,
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct UnlinkArgs {
    pub source: String,
    pub target: String,
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    pub node: String,
    #[arg(short = 'y', long)]
    pub yes: bool,
}

pub fn run() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    if cli.no_color {
        output::set_color(false);
    }
    if let Err(err) = dispatch(cli) {
        output::error(&err.to_string());
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default_filter = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "sysgraph=warn",
        (false, 1) => "sysgraph=debug",
        (false, _) => "sysgraph=trace",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn dispatch(cli: Cli) -> Result<()> {
    let start = std::env::current_dir()?;
    let mut project = Project::discover(start, cli.snapshot, cli.config)?;
    if !project.settings.output.color {
        output::set_color(false);
    }

    match cli.command {
        Commands::Show(args) => handle_show(args, &project),
        Commands::Deps(args) => handle_deps(args, &project),
        Commands::Dependents(args) => handle_dependents(args, &project),
        Commands::Order(args) => handle_order(args, &project),
        Commands::Phases(args) => handle_phases(args, &project),
        Commands::Cycles(args) => handle_cycles(args, &project),
        Commands::Impact(args) => handle_impact(args, &project),
        Commands::Scope(args) => handle_scope(args, &project),
        Commands::Risk(args) => handle_risk(args, &project),
        Commands::Check(args) => handle_check(args, &project),
        Commands::Link(args) => handle_link(args, &mut project),
        Commands::Unlink(args) => handle_unlink(args, &mut project),
        Commands::Remove(args) => handle_remove(args, &mut project),
    }
}

fn handle_show(args: ShowArgs, project: &Project) -> Result<()> {
    let output_settings = &project.settings.output;
    let format = args
        .format
        .unwrap_or_else(|| output_settings.format.clone())
        .to_ascii_lowercase();
    let direction_raw = args
        .direction
        .unwrap_or_else(|| output_settings.direction.clone());
    let direction = Direction::parse(&direction_raw)
        .ok_or_else(|| anyhow!("unknown graph direction '{}'", direction_raw))?;

    let graph = &project.graph;
    match format.as_str() {
        "tree" | "flat" => {
            let edges = viz::directional_edges(graph, direction);
            let roots = viz::graph_roots(&edges);
            let labels = viz::labels(graph);
            if format == "tree" {
                print!("{}", viz::render_tree(&roots, &edges, &labels));
            } else {
                print!("{}", viz::render_flat(&roots, &edges, &labels));
            }
            Ok(())
        }
        "dot" => {
            print!("{}", viz::render_dot(graph));
            Ok(())
        }
        "json" => print_json(&viz::graph_to_json(graph)),
        other => Err(anyhow!("unknown graph format '{}'", other).into()),
    }
}

fn handle_deps(args: NodeQueryArgs, project: &Project) -> Result<()> {
    let id = known_node(project, &args.node)?;
    let deps = if args.transitive {
        transitive_upstream(&project.graph, &id)
    } else {
        direct_upstream(&project.graph, &id)
    };
    print_id_list(&sorted_ids(&deps), args.json)
}

fn handle_dependents(args: NodeQueryArgs, project: &Project) -> Result<()> {
    let id = known_node(project, &args.node)?;
    let dependents = if args.transitive {
        transitive_downstream(&project.graph, &id)
    } else {
        direct_downstream(&project.graph, &id)
    };
    print_id_list(&sorted_ids(&dependents), args.json)
}

fn handle_order(args: OrderArgs, project: &Project) -> Result<()> {
    let scope = scope_from(project, &args.scope)?;
    let order = match &scope {
        Some(ids) => topological_sort_subset(&project.graph, ids),
        None => topological_sort(&project.graph),
    };

    let Some(order) = order else {
        let cycle = match &scope {
            Some(ids) => detect_cycles(&extract_subgraph(&project.graph, ids)),
            None => detect_cycles(&project.graph),
        }
        .into_iter()
        .next()
        .unwrap_or_default();
        return Err(SysgraphError::NoValidOrder { cycle });
    };

    let names: Vec<String> = order.iter().map(|id| id.as_str().to_string()).collect();
    print_id_list(&names, args.json)
}

#[derive(Serialize)]
struct PhaseJson {
    phase: usize,
    nodes: Vec<String>,
}

#[derive(Serialize)]
struct PhasesJson {
    phases: Vec<PhaseJson>,
    unassigned: Vec<String>,
}

fn handle_phases(args: OrderArgs, project: &Project) -> Result<()> {
    let scope = scope_from(project, &args.scope)?;
    let phases = compute_phases(&project.graph, scope.as_ref());

    let placed: NodeSet = phases.values().flatten().cloned().collect();
    let unassigned: Vec<String> = project
        .graph
        .node_ids()
        .filter(|id| scope.as_ref().map_or(true, |set| set.contains(*id)))
        .filter(|id| !placed.contains(*id))
        .map(|id| id.as_str().to_string())
        .collect();

    if args.json {
        return print_json(&PhasesJson {
            phases: phases_to_json(&phases),
            unassigned,
        });
    }

    for (phase, nodes) in &phases {
        let line = nodes.iter().map(NodeId::as_str).collect::<Vec<_>>().join(", ");
        println!("phase {}: {}", phase, line);
    }
    if !unassigned.is_empty() {
        output::warn(&format!(
            "not placed in any phase (cycle): {}",
            unassigned.join(", ")
        ));
    }
    Ok(())
}

fn phases_to_json(phases: &BTreeMap<usize, Vec<NodeId>>) -> Vec<PhaseJson> {
    phases
        .iter()
        .map(|(phase, nodes)| PhaseJson {
            phase: *phase,
            nodes: nodes.iter().map(|id| id.as_str().to_string()).collect(),
        })
        .collect()
}

fn handle_cycles(args: JsonArgs, project: &Project) -> Result<()> {
    let cycles = detect_cycles(&project.graph);
    if args.json {
        return print_json(&cycles);
    }
    if cycles.is_empty() {
        output::info("no cycles found");
        return Ok(());
    }
    for cycle in &cycles {
        println!("{}", format_cycle(cycle));
    }
    Ok(())
}

fn handle_impact(args: ImpactArgs, project: &Project) -> Result<()> {
    let id = known_node(project, &args.node)?;
    let report = analyze_impact(&project.graph, &id);
    if args.json {
        return print_json(&report);
    }

    let sections = [
        ("depends on", sorted_ids(&report.direct_upstream)),
        ("depends on (transitive)", sorted_ids(&report.transitive_upstream)),
        ("dependents", sorted_ids(&report.direct_downstream)),
        ("dependents (transitive)", sorted_ids(&report.transitive_downstream)),
    ];
    for (title, ids) in sections {
        output::heading(&format!("{title}:"));
        for id in ids {
            println!("  {}", id);
        }
    }
    output::heading("implementation order:");
    if report.implementation_order.is_empty() {
        output::warn("  none: the affected nodes contain a cycle");
    }
    for (idx, id) in report.implementation_order.iter().enumerate() {
        println!("  {}. {}", idx + 1, id);
    }
    Ok(())
}

fn handle_scope(args: ScopeArgs, project: &Project) -> Result<()> {
    let ids = known_nodes(project, &args.nodes)?;
    let report = validate_scope(&project.graph, &ids);

    if args.json {
        print_json(&report)?;
    } else if report.valid {
        output::success(&format!("scope of {} node(s) is self-contained", ids.len()));
    } else {
        for item in &report.missing_dependencies {
            println!("{} -> {}", item.node_id, item.missing_dependency);
        }
    }

    if report.valid {
        Ok(())
    } else {
        Err(SysgraphError::InvalidScope {
            violations: report.missing_dependencies,
        })
    }
}

#[derive(Serialize)]
struct RiskJson<'a> {
    high_fan_in: &'a [NodeDegree],
    high_fan_out: &'a [NodeDegree],
    isolated_nodes: &'a [NodeId],
}

fn handle_risk(args: RiskArgs, project: &Project) -> Result<()> {
    let top = args.top.unwrap_or(project.settings.risk.top);
    let report = identify_risk_nodes(&project.graph);
    let fan_in = &report.high_fan_in[..top.min(report.high_fan_in.len())];
    let fan_out = &report.high_fan_out[..top.min(report.high_fan_out.len())];

    if args.json {
        return print_json(&RiskJson {
            high_fan_in: fan_in,
            high_fan_out: fan_out,
            isolated_nodes: &report.isolated_nodes,
        });
    }

    output::heading("fan-in (dependents):");
    for degree in fan_in {
        println!("  {:>4}  {}", degree.count, degree.node_id);
    }
    output::heading("fan-out (dependencies):");
    for degree in fan_out {
        println!("  {:>4}  {}", degree.count, degree.node_id);
    }
    output::heading("isolated:");
    for id in &report.isolated_nodes {
        println!("  {}", id);
    }
    Ok(())
}

#[derive(Serialize)]
struct CheckJson {
    cycles: Vec<Vec<String>>,
    dangling: Vec<Edge>,
    isolated: Vec<String>,
}

fn handle_check(args: JsonArgs, project: &Project) -> Result<()> {
    let cycles = detect_cycles(&project.graph);
    let dangling: Vec<Edge> = project
        .snapshot
        .dangling_edges()
        .into_iter()
        .cloned()
        .collect();
    let isolated = identify_risk_nodes(&project.graph).isolated_nodes;

    if args.json {
        return print_json(&CheckJson {
            cycles: cycles
                .iter()
                .map(|cycle| cycle.iter().map(|id| id.as_str().to_string()).collect())
                .collect(),
            dangling,
            isolated: isolated.iter().map(|id| id.as_str().to_string()).collect(),
        });
    }

    if cycles.is_empty() && dangling.is_empty() && isolated.is_empty() {
        output::info("no graph issues found");
        return Ok(());
    }
    if !cycles.is_empty() {
        println!("cycles:");
        for cycle in &cycles {
            println!("  {}", format_cycle(cycle));
        }
    }
    if !dangling.is_empty() {
        println!("dangling edges (dropped):");
        for edge in &dangling {
            println!("  {} -> {} ({})", edge.source, edge.target, edge.kind);
        }
    }
    if !isolated.is_empty() {
        println!("isolated nodes:");
        for id in &isolated {
            println!("  {}", id);
        }
    }
    Ok(())
}

fn handle_link(args: LinkArgs, project: &mut Project) -> Result<()> {
    let source = known_node(project, &args.source)?;
    let target = known_node(project, &args.target)?;
    if project.graph.has_edge(&source, &target) {
        output::info(&format!("{} -> {} already present", source, target));
        return Ok(());
    }

    let edge = Edge::with_kind(source.clone(), target.clone(), args.kind);
    if !add_typed_edge(&mut project.graph, &edge) {
        let path = if source == target {
            vec![source.clone()]
        } else {
            dependency_path(&project.graph, &target, &source).unwrap_or_default()
        };
        return Err(SysgraphError::EdgeRejected {
            from: source,
            to: target,
            path,
        });
    }

    save_project(
        project,
        &format!("add {} -> {} ({})", source, target, edge.kind),
        args.yes,
    )
}

fn handle_unlink(args: UnlinkArgs, project: &mut Project) -> Result<()> {
    let source = NodeId::new(args.source);
    let target = NodeId::new(args.target);
    if !project.graph.has_edge(&source, &target) {
        output::warn(&format!("no edge {} -> {}; nothing to remove", source, target));
        return Ok(());
    }
    remove_edge(&mut project.graph, &source, &target);
    save_project(
        project,
        &format!("remove {} -> {}", source, target),
        args.yes,
    )
}

fn handle_remove(args: RemoveArgs, project: &mut Project) -> Result<()> {
    let id = NodeId::new(args.node);
    if !project.graph.contains(&id) {
        output::warn(&format!("unknown node {}; nothing to remove", id));
        return Ok(());
    }
    let touching = direct_upstream(&project.graph, &id).len()
        + direct_downstream(&project.graph, &id).len();
    remove_node(&mut project.graph, &id);
    save_project(
        project,
        &format!("remove {} and {} edge(s)", id, touching),
        args.yes,
    )
}

fn save_project(project: &mut Project, change: &str, assume_yes: bool) -> Result<()> {
    let prompt = format!("{} in {}?", change, project.snapshot_path.display());
    let confirmed = output::confirm(&prompt, assume_yes)
        .map_err(anyhow::Error::from)?;
    if !confirmed {
        output::warn("aborted; snapshot unchanged");
        return Ok(());
    }
    project.persist()?;
    output::success(&format!("{}: saved", change));
    Ok(())
}

fn known_node(project: &Project, raw: &str) -> Result<NodeId> {
    let id = NodeId::new(raw);
    if project.graph.contains(&id) {
        Ok(id)
    } else {
        Err(SysgraphError::UnknownNode(id))
    }
}

fn known_nodes(project: &Project, raw: &[String]) -> Result<NodeSet> {
    raw.iter().map(|value| known_node(project, value)).collect()
}

fn scope_from(project: &Project, raw: &[String]) -> Result<Option<NodeSet>> {
    if raw.is_empty() {
        return Ok(None);
    }
    known_nodes(project, raw).map(Some)
}

fn sorted_ids(ids: &NodeSet) -> Vec<String> {
    let mut out: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();
    out.sort();
    out
}

fn format_cycle(cycle: &[NodeId]) -> String {
    let mut parts: Vec<&str> = cycle.iter().map(NodeId::as_str).collect();
    if let Some(first) = cycle.first() {
        parts.push(first.as_str());
    }
    parts.join(" -> ")
}

fn print_id_list(ids: &[String], json: bool) -> Result<()> {
    if json {
        return print_json(&ids);
    }
    for id in ids {
        println!("{}", id);
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value)
            .map_err(anyhow::Error::from)?
    );
    Ok(())
}
