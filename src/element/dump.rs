//! Graphviz text for elements
//!
//! Line formats are kept stable for existing rendering tooling:
//! `p<id>[label="<name>"];`, `p<src> -> p<dst>[<attrs>];` and the loop
//! annotation `p<id> -> p<id>[label="<loop>"];`.

use super::node::ElementNode;
use std::fmt::{self, Write};

/// Label declaration, plus the loop annotation for plain looping elements
pub(crate) fn write_label<W: Write>(out: &mut W, node: &ElementNode) -> fmt::Result {
    let id = node.id();
    write!(out, "{}[label=\"", id)?;
    if node.name().is_empty() {
        write!(out, "{}", id)?;
    } else {
        write!(out, "{}", escape(node.name()))?;
    }
    out.write_str("\"];\n")?;

    if node.loop_count() > 1 && !node.is_group() {
        writeln!(out, "{} -> {}[label=\"{}\"];", id, id, node.loop_count())?;
    }
    Ok(())
}

/// One edge, clipped at cluster borders when either end is a group
pub(crate) fn write_edge<W: Write>(out: &mut W, src: &ElementNode, dst: &ElementNode) -> fmt::Result {
    let (s, d) = (src.id(), dst.id());
    match (src.is_group(), dst.is_group()) {
        (true, true) => writeln!(out, "{} -> {}[ltail=cluster_{} lhead=cluster_{}];", s, d, s, d),
        (true, false) => writeln!(out, "{} -> {}[ltail=cluster_{}];", s, d, s),
        (false, true) => writeln!(out, "{} -> {}[lhead=cluster_{}];", s, d, d),
        (false, false) => writeln!(out, "{} -> {};", s, d),
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}
