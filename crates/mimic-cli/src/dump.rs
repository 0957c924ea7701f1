use std::io::Write;

use kdl::{KdlDocument, KdlEntry, KdlNode};
use miette::IntoDiagnostic;
use mimic_session::{
    BreakPoint, LocalVariable, Session, StackFrameEntry, ThreadInfo, Transport, WatchedVariable,
};

/// Writes a KDL snapshot of the session state.
pub fn dump_session<T: Transport>(session: &Session<T>, mut output: impl Write) -> miette::Result<()> {
    let mut kdl = session_to_kdl(session);

    kdl.autoformat();

    output
        .write_all(kdl.to_string().as_bytes())
        .into_diagnostic()?;

    Ok(())
}

/// Builds a KDL snapshot of the session state.
pub fn session_to_kdl<T: Transport>(session: &Session<T>) -> KdlDocument {
    let mut kdl = KdlDocument::new();
    let nodes = kdl.nodes_mut();

    nodes.push({
        let mut node = KdlNode::new("state");
        node.entries_mut()
            .push(KdlEntry::new(session.state().to_string()));
        node
    });

    if let Some(reason) = session.exit_reason() {
        let mut node = KdlNode::new("exit");
        node.entries_mut().push(KdlEntry::new(reason.to_string()));
        nodes.push(node);
    }

    if let Some(pid) = session.target_pid() {
        let mut node = KdlNode::new("pid");
        node.entries_mut().push(KdlEntry::new(i128::from(pid)));
        nodes.push(node);
    }

    let current_thread = session.current_thread();
    nodes.extend(
        session
            .threads()
            .iter()
            .map(|thread| thread_node(thread, current_thread == Some(thread.id))),
    );

    let current_frame = session.current_frame();
    nodes.extend(
        session
            .stack_frames()
            .iter()
            .enumerate()
            .map(|(i, frame)| frame_node(frame, i == current_frame)),
    );

    nodes.extend(session.breakpoints().iter().map(breakpoint_node));
    nodes.extend(session.watches().iter().map(watch_node));
    nodes.extend(session.locals().iter().map(local_node));

    kdl
}

fn thread_node(thread: &ThreadInfo, selected: bool) -> KdlNode {
    let mut node = KdlNode::new("thread");

    node.entries_mut().push(KdlEntry::new(i128::from(thread.id)));
    node.entries_mut()
        .push(KdlEntry::new_prop("name", thread.name.as_str()));

    if let Some(function) = &thread.function {
        node.entries_mut()
            .push(KdlEntry::new_prop("function", function.as_str()));
    }

    if selected {
        node.entries_mut().push(KdlEntry::new_prop("selected", true));
    }

    node
}

fn frame_node(frame: &StackFrameEntry, selected: bool) -> KdlNode {
    let mut node = KdlNode::new("frame");

    node.entries_mut().push(KdlEntry::new(frame.level as i128));
    node.entries_mut()
        .push(KdlEntry::new_prop("function", frame.function.as_str()));

    if let Some(location) = frame.location() {
        node.entries_mut()
            .push(KdlEntry::new_prop("path", location.path.display().to_string()));
        node.entries_mut()
            .push(KdlEntry::new_prop("line", i128::from(location.line)));
    }

    if let Some(addr) = frame.address {
        node.entries_mut()
            .push(KdlEntry::new_prop("addr", format!("{addr:#x}")));
    }

    if selected {
        node.entries_mut().push(KdlEntry::new_prop("selected", true));
    }

    node
}

fn breakpoint_node(breakpoint: &BreakPoint) -> KdlNode {
    let mut node = KdlNode::new("breakpoint");

    node.entries_mut()
        .push(KdlEntry::new(i128::from(breakpoint.id)));

    if let Some(function) = &breakpoint.function {
        node.entries_mut()
            .push(KdlEntry::new_prop("function", function.as_str()));
    }

    if let (Some(path), Some(line)) = (&breakpoint.path, breakpoint.line) {
        node.entries_mut()
            .push(KdlEntry::new_prop("path", path.display().to_string()));
        node.entries_mut()
            .push(KdlEntry::new_prop("line", i128::from(line)));
    }

    node.entries_mut()
        .push(KdlEntry::new_prop("enabled", breakpoint.enabled));
    node.entries_mut()
        .push(KdlEntry::new_prop("hits", i128::from(breakpoint.hits)));

    node
}

fn watch_node(watch: &WatchedVariable) -> KdlNode {
    let mut node = KdlNode::new("watch");

    node.entries_mut().push(KdlEntry::new(i128::from(watch.id)));
    node.entries_mut()
        .push(KdlEntry::new_prop("expression", watch.expression.as_str()));
    node.entries_mut()
        .push(KdlEntry::new_prop("value", watch.display_value()));
    node.entries_mut()
        .push(KdlEntry::new_prop("type", watch.var_type.as_str()));
    node.entries_mut()
        .push(KdlEntry::new_prop("format", watch.format.to_string()));

    node
}

fn local_node(local: &LocalVariable) -> KdlNode {
    let mut node = KdlNode::new("local");

    node.entries_mut().push(KdlEntry::new(local.name.as_str()));
    node.entries_mut()
        .push(KdlEntry::new_prop("value", local.display_value()));
    node.entries_mut()
        .push(KdlEntry::new_prop("format", local.format.to_string()));

    node
}
