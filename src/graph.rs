use crate::ir::{Forest, NodeRef};

const NO_PARENT: i64 = -1;

/// Renders the forest as a Graphviz digraph for debugging.
///
/// Nodes are numbered in visit order. A statement's `next` hangs off the
/// same parent as the statement itself, so every stack is drawn flat.
pub fn render(forest: &Forest) -> String {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut next_id: i64 = 0;

    // Roots are pushed in reverse so the first root is visited first.
    let mut stack: Vec<(NodeRef<'_>, i64)> = forest
        .roots
        .iter()
        .rev()
        .map(|root| (NodeRef::Stmt(root), NO_PARENT))
        .collect();

    while let Some((node, parent)) = stack.pop() {
        let id = next_id;
        next_id += 1;
        nodes.push(format!("{} [label=\"{}\"]", id, escape_label(&node.label())));
        if parent != NO_PARENT {
            edges.push(format!("{} -> {}", parent, id));
        }

        if let Some(tail) = node.tail() {
            stack.push((NodeRef::Stmt(tail), parent));
        }
        for child in node.children().into_iter().rev() {
            stack.push((child, id));
        }
    }

    format!(
        "digraph {{rankdir=\"TB\"\n{}\n{}}}",
        nodes.join("\n"),
        edges.join("\n")
    )
}

fn escape_label(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}
