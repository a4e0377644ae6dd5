use std::collections::HashSet;
use std::fmt::Write;
use std::io::IsTerminal;

use clap::ValueEnum;
use serde_json::json;

use crate::cache::dependency::DependencyCache;
use crate::graph::ReferenceGraph;
use crate::graph::node::{MatchKind, NodeId};
use crate::search::{SearchResult, SearchStats};

use super::paths::ShortPath;

/// Output format for query results.
#[derive(Clone, Copy, Debug, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Compact one-line-per-result format (default).
    #[default]
    Compact,
    /// Human-readable columnar table with optional ANSI color when stdout is a terminal.
    Table,
    /// Structured JSON suitable for programmatic consumption.
    Json,
}

/// Which view of a search result to print.
#[derive(Clone, Copy, Debug, ValueEnum, Default, PartialEq, Eq)]
pub enum ResultView {
    /// Anchor-to-match paths, one per line (default).
    #[default]
    Paths,
    /// Paths reduced to their last edge where that edge is unique.
    Terse,
    /// Forward graph per root scope.
    Tree,
    /// Each needle followed by what references it.
    Reverse,
}

fn bold(text: &str, use_color: bool) -> String {
    if use_color {
        format!("\x1b[1m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}

fn match_marker(kind: MatchKind) -> &'static str {
    match kind {
        MatchKind::None => "",
        MatchKind::Main => " *",
        MatchKind::Secondary => " +",
    }
}

/// Label of a path's matched node with its match marker.
fn target_label(graph: &ReferenceGraph, id: NodeId) -> String {
    format!("{}{}", graph[id].label, match_marker(graph[id].match_kind))
}

fn match_name(kind: MatchKind) -> Option<&'static str> {
    match kind {
        MatchKind::None => None,
        MatchKind::Main => Some("main"),
        MatchKind::Secondary => Some("secondary"),
    }
}

/// Print a search result to stdout.
pub fn print_result(result: &SearchResult, view: ResultView, format: OutputFormat) {
    let use_color = std::io::stdout().is_terminal();
    print!("{}", format_result(result, view, format, use_color));
}

/// Render a search result. The compact format ends with a `N references found` line.
pub fn format_result(
    result: &SearchResult,
    view: ResultView,
    format: OutputFormat,
    use_color: bool,
) -> String {
    let mut out = match (view, format) {
        (ResultView::Paths, OutputFormat::Json) => paths_json(result, result.short_paths()),
        (ResultView::Terse, OutputFormat::Json) => paths_json(result, result.terse_paths()),
        (ResultView::Tree, OutputFormat::Json) => tree_json(result),
        (ResultView::Reverse, OutputFormat::Json) => reverse_json(result),
        (ResultView::Paths, _) => paths_text(result, result.short_paths(), format, use_color),
        (ResultView::Terse, _) => paths_text(result, result.terse_paths(), format, use_color),
        (ResultView::Tree, _) => tree_text(result, use_color),
        (ResultView::Reverse, _) => reverse_text(result, use_color),
    };
    if format == OutputFormat::Compact {
        let _ = writeln!(out, "{} references found", result.short_paths().len());
    }
    out
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

fn paths_text(
    result: &SearchResult,
    paths: &[ShortPath],
    format: OutputFormat,
    use_color: bool,
) -> String {
    let graph = result.graph();
    let rows: Vec<(String, String, String)> = paths
        .iter()
        .map(|p| {
            (
                graph[p.anchor].label.clone(),
                p.descriptions(graph).join(" > "),
                target_label(graph, p.target()),
            )
        })
        .collect();

    let mut out = String::new();
    if format == OutputFormat::Compact {
        for (anchor, via, target) in &rows {
            if via.is_empty() {
                let _ = writeln!(out, "ref {target}");
            } else {
                let _ = writeln!(out, "ref {anchor} {via} -> {target}");
            }
        }
        return out;
    }

    let anchor_w = rows.iter().map(|r| r.0.len()).max().unwrap_or(6).max(6);
    let via_w = rows.iter().map(|r| r.1.len()).max().unwrap_or(3).max(3);
    let header = format!(
        "{:<anchor_w$}  {:<via_w$}  {}",
        "ANCHOR",
        "VIA",
        "TARGET",
        anchor_w = anchor_w,
        via_w = via_w,
    );
    let _ = writeln!(out, "{}", bold(&header, use_color));
    let _ = writeln!(out, "{}", "-".repeat(anchor_w + via_w + 10));
    for (anchor, via, target) in &rows {
        let _ = writeln!(
            out,
            "{:<anchor_w$}  {:<via_w$}  {}",
            anchor,
            via,
            target,
            anchor_w = anchor_w,
            via_w = via_w,
        );
    }
    out
}

fn paths_json(result: &SearchResult, paths: &[ShortPath]) -> String {
    let graph = result.graph();
    let items: Vec<serde_json::Value> = paths
        .iter()
        .map(|p| {
            let target = &graph[p.target()];
            json!({
                "anchor": graph[p.anchor].label,
                "anchor_identity": graph[p.anchor].identity.as_ref().map(|i| i.to_string()),
                "via": p.descriptions(graph),
                "target": target.label,
                "target_identity": target.identity.as_ref().map(|i| i.to_string()),
                "match": match_name(target.match_kind),
            })
        })
        .collect();
    let referencing: Vec<String> = result
        .referencing_identities()
        .iter()
        .map(|id| id.to_string())
        .collect();
    let doc = json!({
        "success": result.success,
        "error": result.error,
        "references": items,
        "referencing": referencing,
    });
    format!("{}\n", serde_json::to_string_pretty(&doc).unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Forward tree
// ---------------------------------------------------------------------------

fn tree_text(result: &SearchResult, use_color: bool) -> String {
    let graph = result.graph();
    let mut out = String::new();
    let mut printed = HashSet::new();
    for group in &result.groups {
        let _ = writeln!(out, "{}", bold(&format!("scope {}", group.scope.label), use_color));
        for &root in &group.roots {
            tree_lines(graph, root, None, 1, &mut printed, &mut out);
        }
    }
    out
}

fn tree_lines(
    graph: &ReferenceGraph,
    id: NodeId,
    via: Option<(String, bool)>,
    depth: usize,
    printed: &mut HashSet<NodeId>,
    out: &mut String,
) {
    let node = &graph[id];
    let indent = "  ".repeat(depth);
    let prefix = match &via {
        Some((desc, weak)) => format!("{desc}{} -> ", if *weak { "~" } else { "" }),
        None => String::new(),
    };
    let repeated = !node.links().is_empty() && !printed.insert(id);
    let _ = writeln!(
        out,
        "{indent}{prefix}{}{}{}",
        node.label,
        match_marker(node.match_kind),
        if repeated { " (see above)" } else { "" }
    );
    if repeated {
        return;
    }
    for link in node.links() {
        tree_lines(
            graph,
            link.target,
            Some((link.summary(), link.weak)),
            depth + 1,
            printed,
            out,
        );
    }
}

fn tree_json(result: &SearchResult) -> String {
    let graph = result.graph();
    let mut printed = HashSet::new();
    let groups: Vec<serde_json::Value> = result
        .groups
        .iter()
        .map(|g| {
            json!({
                "scope": g.scope.name,
                "label": g.scope.label,
                "roots": g
                    .roots
                    .iter()
                    .map(|&r| node_json(graph, r, &mut printed))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();
    let doc = json!({
        "success": result.success,
        "error": result.error,
        "groups": groups,
    });
    format!("{}\n", serde_json::to_string_pretty(&doc).unwrap_or_default())
}

fn node_json(
    graph: &ReferenceGraph,
    id: NodeId,
    printed: &mut HashSet<NodeId>,
) -> serde_json::Value {
    let node = &graph[id];
    let identity = node.identity.as_ref().map(|i| i.to_string());
    if !node.links().is_empty() && !printed.insert(id) {
        return json!({ "label": node.label, "identity": identity, "repeated": true });
    }
    let links: Vec<serde_json::Value> = node
        .links()
        .iter()
        .map(|l| {
            json!({
                "descriptions": l.descriptions,
                "weak": l.weak,
                "target": node_json(graph, l.target, printed),
            })
        })
        .collect();
    json!({
        "label": node.label,
        "identity": identity,
        "match": match_name(node.match_kind),
        "links": links,
    })
}

// ---------------------------------------------------------------------------
// Reverse view
// ---------------------------------------------------------------------------

fn reverse_text(result: &SearchResult, use_color: bool) -> String {
    let graph = result.graph();
    let reverse = result.reverse_graph();
    let mut out = String::new();
    for &root in reverse.roots() {
        let node = &graph[root];
        let _ = writeln!(
            out,
            "{}",
            bold(&format!("{}{}", node.label, match_marker(node.match_kind)), use_color)
        );
        let mut seen = HashSet::from([root]);
        referencer_lines(result, root, 1, &mut seen, &mut out);
    }
    out
}

fn referencer_lines(
    result: &SearchResult,
    id: NodeId,
    depth: usize,
    seen: &mut HashSet<NodeId>,
    out: &mut String,
) {
    let graph = result.graph();
    for (source, link) in result.reverse_graph().referencers(id) {
        let desc = graph[source]
            .links()
            .get(link)
            .map(|l| l.summary())
            .unwrap_or_default();
        let _ = writeln!(out, "{}<- {} ({desc})", "  ".repeat(depth), graph[source].label);
        if seen.insert(source) {
            referencer_lines(result, source, depth + 1, seen, out);
        }
    }
}

fn reverse_json(result: &SearchResult) -> String {
    let graph = result.graph();
    let reverse = result.reverse_graph();
    let roots: Vec<serde_json::Value> = reverse
        .roots()
        .iter()
        .map(|&root| {
            let referencers: Vec<serde_json::Value> = reverse
                .referencers(root)
                .into_iter()
                .map(|(source, link)| {
                    json!({
                        "label": graph[source].label,
                        "identity": graph[source].identity.as_ref().map(|i| i.to_string()),
                        "via": graph[source].links().get(link).map(|l| l.summary()),
                    })
                })
                .collect();
            json!({
                "label": graph[root].label,
                "identity": graph[root].identity.as_ref().map(|i| i.to_string()),
                "match": match_name(graph[root].match_kind),
                "referenced_by": referencers,
            })
        })
        .collect();
    let doc = json!({
        "success": result.success,
        "error": result.error,
        "roots": roots,
    });
    format!("{}\n", serde_json::to_string_pretty(&doc).unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Format and print pass statistics to stdout.
pub fn format_stats(stats: &SearchStats, format: OutputFormat) {
    match format {
        OutputFormat::Compact => {
            println!(
                "nodes {} expansions {} memo_hits {} cycles {} depth_limited {} pruned {} read_failures {} weak_removed {} elapsed_ms {}",
                stats.nodes_created,
                stats.expansions,
                stats.memo_hits,
                stats.cycles_broken,
                stats.depth_limited,
                stats.pruned_by_dependencies,
                stats.read_failures,
                stats.weak_links_removed,
                stats.elapsed_ms,
            );
        }
        OutputFormat::Table => {
            let use_color = std::io::stdout().is_terminal();
            println!("{}", bold("=== Search Statistics ===", use_color));
            println!("Nodes created:       {}", stats.nodes_created);
            println!("Expansions:          {}", stats.expansions);
            println!("Memo hits:           {}", stats.memo_hits);
            println!("Cycles broken:       {}", stats.cycles_broken);
            println!("Depth limited:       {}", stats.depth_limited);
            println!("Pruned by cache:     {}", stats.pruned_by_dependencies);
            println!("Read failures:       {}", stats.read_failures);
            println!("Weak links removed:  {}", stats.weak_links_removed);
            println!("Elapsed:             {} ms", stats.elapsed_ms);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(stats).unwrap_or_default());
        }
    }
}

/// Format and print dependency cache statistics to stdout.
pub fn format_cache_stats(cache: &DependencyCache, format: OutputFormat) {
    let edges: usize = cache.entries().map(|(_, e)| e.dependencies.len()).sum();
    match format {
        OutputFormat::Compact => {
            println!("resources {} dependencies {}", cache.len(), edges);
        }
        OutputFormat::Table => {
            let use_color = std::io::stdout().is_terminal();
            println!("{}", bold("=== Dependency Cache ===", use_color));
            println!("Resources:     {}", cache.len());
            println!("Dependencies:  {}", edges);
        }
        OutputFormat::Json => {
            let doc = json!({ "resources": cache.len(), "dependencies": edges });
            println!("{}", serde_json::to_string_pretty(&doc).unwrap_or_default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RootScope;
    use crate::model::Identity;
    use crate::search::{ResultGroup, ViewOptions};

    fn sample() -> SearchResult {
        let mut graph = ReferenceGraph::new();
        let x = graph.alloc(Some(Identity::parse("scenes/main.json#x")), "x (Entity)");
        let plain = graph.alloc(None, "Renderer");
        let r = graph.alloc(Some(Identity::parse("assets/r.json")), "r (Material)");
        graph.set_match(r, MatchKind::Main);
        graph.add_link(x, plain, "renderer", false);
        graph.add_link(plain, r, "material", false);
        SearchResult::new(
            graph,
            vec![ResultGroup {
                scope: RootScope::new("scenes", "Scenes"),
                roots: vec![x],
            }],
            vec![Identity::parse("assets/r.json")],
            ViewOptions::default(),
            SearchStats::default(),
        )
    }

    #[test]
    fn test_compact_paths() {
        let out = format_result(&sample(), ResultView::Paths, OutputFormat::Compact, false);
        assert_eq!(
            out,
            "ref x (Entity) renderer > material -> r (Material) *\n1 references found\n"
        );
    }

    #[test]
    fn test_compact_terse_drops_anchor() {
        let out = format_result(&sample(), ResultView::Terse, OutputFormat::Compact, false);
        assert!(out.starts_with("ref Renderer material -> r (Material) *\n"));
    }

    #[test]
    fn test_tree_indents_links() {
        let out = format_result(&sample(), ResultView::Tree, OutputFormat::Table, false);
        assert_eq!(
            out,
            "scope Scenes\n  x (Entity)\n    renderer -> Renderer\n      material -> r (Material) *\n"
        );
    }

    #[test]
    fn test_reverse_lists_referencers() {
        let out = format_result(&sample(), ResultView::Reverse, OutputFormat::Table, false);
        assert_eq!(
            out,
            "r (Material) *\n  <- Renderer (material)\n    <- x (Entity) (renderer)\n"
        );
    }

    #[test]
    fn test_json_paths_parse_back() {
        let out = format_result(&sample(), ResultView::Paths, OutputFormat::Json, false);
        let doc: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(doc["success"], true);
        assert_eq!(doc["references"][0]["anchor_identity"], "scenes/main.json#x");
        assert_eq!(doc["references"][0]["via"][1], "material");
        assert_eq!(doc["references"][0]["match"], "main");
        assert_eq!(doc["referencing"][0], "scenes/main.json#x");
    }

    #[test]
    fn test_empty_result_reports_zero() {
        let empty = SearchResult::new(
            ReferenceGraph::new(),
            Vec::new(),
            Vec::new(),
            ViewOptions::default(),
            SearchStats::default(),
        );
        let out = format_result(&empty, ResultView::Paths, OutputFormat::Compact, false);
        assert_eq!(out, "0 references found\n");
    }
}
