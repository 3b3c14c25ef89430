//! Rendering a parsed mangling back to a readable Swift-ish signature.
//!
//! Pure tree-walking formatter over the [`Arena`] produced by
//! [`crate::demangle::parser`]; it never re-parses or touches a `File`.
//! Unhandled/future node kinds fall back to `<kind Name>` rather than
//! panicking, matching the rest of this crate's skip-and-continue posture.

use crate::demangle::node::{Arena, Kind, NodeData, NodeId};

/// Render `root` (and everything it references) to a display string.
pub fn format(arena: &Arena, root: NodeId) -> String {
    let node = arena.get(root);
    match node.kind {
        Some(Kind::Function)
        | Some(Kind::Getter)
        | Some(Kind::Setter)
        | Some(Kind::Allocator)
        | Some(Kind::Initializer) => render_entity(arena, root),
        Some(Kind::Module)
        | Some(Kind::Identifier)
        | Some(Kind::Class)
        | Some(Kind::Structure)
        | Some(Kind::Enum)
        | Some(Kind::Protocol)
        | Some(Kind::Extension)
        | Some(Kind::ObjcImportedType) => render_context(arena, root),
        _ => render_type(arena, root),
    }
}

fn render_context(arena: &Arena, id: NodeId) -> String {
    let node = arena.get(id);
    let name = node.text.clone().unwrap_or_default();
    match node.context {
        Some(parent) => format!("{}.{}", render_context(arena, parent), name),
        None => name,
    }
}

fn render_type(arena: &Arena, id: NodeId) -> String {
    let node = arena.get(id);
    match node.kind {
        Some(Kind::Module)
        | Some(Kind::Identifier)
        | Some(Kind::Class)
        | Some(Kind::Structure)
        | Some(Kind::Enum)
        | Some(Kind::Protocol)
        | Some(Kind::Extension)
        | Some(Kind::ObjcImportedType) => render_context(arena, id),
        Some(Kind::BoundGeneric) => render_bound_generic(arena, node),
        Some(Kind::Tuple) => format!(
            "({})",
            node.children
                .iter()
                .map(|&c| render_type(arena, c))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Some(Kind::OptionalWrap) => {
            format!("{}?", render_type(arena, node.children[0]))
        }
        Some(Kind::Existential) => format!(
            "any {}",
            node.children
                .first()
                .map(|&c| render_type(arena, c))
                .unwrap_or_default()
        ),
        Some(Kind::ImplFunctionType) => render_impl_function_type(arena, node),
        Some(Kind::GenericTypeParameter) => {
            let (depth, index) = node.index.unwrap_or((0, 0));
            format!("\u{03c4}_{}_{}", depth, index)
        }
        Some(Kind::DependentMemberType) => match node.context {
            Some(base) => format!("{}.DependentMember", render_type(arena, base)),
            None => "DependentMember".to_string(),
        },
        Some(Kind::SymbolicReference) => node.text.clone().unwrap_or_default(),
        Some(other) => format!(
            "<kind {}>",
            node.text.clone().unwrap_or_else(|| format!("{:?}", other))
        ),
        None => "<kind Unknown>".to_string(),
    }
}

fn render_bound_generic(arena: &Arena, node: &NodeData) -> String {
    let args: Vec<String> = node.children.iter().map(|&c| render_type(arena, c)).collect();
    match (node.text.as_deref(), args.len()) {
        (Some("Array"), 1) => format!("[{}]", args[0]),
        (Some("Dictionary"), 2) => format!("[{} : {}]", args[0], args[1]),
        (Some("Optional"), 1) => format!("{}?", args[0]),
        _ => {
            let base = match node.context {
                Some(ctx) => format!("{}.{}", render_context(arena, ctx), node.text.clone().unwrap_or_default()),
                None => node.text.clone().unwrap_or_default(),
            };
            format!("{}<{}>", base, args.join(", "))
        }
    }
}

fn render_impl_function_type(arena: &Arena, node: &NodeData) -> String {
    let mut attrs = Vec::new();
    if node.conventions.contains(&'g') {
        attrs.push("@callee_guaranteed");
    }
    if node.conventions.contains(&'e') {
        attrs.push("@escaping");
    }
    let payload = node
        .children
        .first()
        .map(|&c| render_type(arena, c))
        .unwrap_or_else(|| "()".to_string());
    if attrs.is_empty() {
        payload
    } else {
        format!("{} {}", attrs.join(" "), payload)
    }
}

fn render_entity(arena: &Arena, id: NodeId) -> String {
    let node = arena.get(id);
    let base = node.context.map(|c| render_context(arena, c)).unwrap_or_default();
    let name = node.text.clone().unwrap_or_default();
    let params: Vec<String> = node
        .children
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let label = node.labels.get(i).cloned().flatten().unwrap_or_else(|| "_".to_string());
            format!("{}: {}", label, render_type(arena, c))
        })
        .collect();
    let suffix = match node.kind {
        Some(Kind::Getter) => ".getter",
        Some(Kind::Setter) => ".setter",
        Some(Kind::Allocator) => ".__allocating_init",
        Some(Kind::Initializer) => ".init",
        _ => "",
    };
    let mut out = if base.is_empty() {
        format!("{}{}({})", name, suffix, params.join(", "))
    } else {
        format!("{}.{}{}({})", base, name, suffix, params.join(", "))
    };
    if node.is_async {
        out.push_str(" async");
    }
    if node.is_throws {
        out.push_str(" throws");
    }
    if let Some(result) = node.result {
        out.push_str(" -> ");
        out.push_str(&render_type(arena, result));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demangle::parser::{demangle_symbol, demangle_type};

    #[test]
    fn formats_primitive_shorthand() {
        let (arena, root) = demangle_type("Sb").unwrap();
        assert_eq!(format(&arena, root), "Swift.Bool");
    }

    #[test]
    fn formats_optional_string() {
        let (arena, root) = demangle_type("SSSg").unwrap();
        assert_eq!(format(&arena, root), "Swift.String?");
    }

    #[test]
    fn formats_tuple_in_source_order() {
        let (arena, root) = demangle_type("Si_SSt").unwrap();
        assert_eq!(format(&arena, root), "(Swift.Int, Swift.String)");
    }

    #[test]
    fn formats_array_sugar() {
        let (arena, root) = demangle_type("SaySiG").unwrap();
        assert_eq!(format(&arena, root), "[Swift.Int]");
    }

    #[test]
    fn formats_dictionary_sugar() {
        let (arena, root) = demangle_type("SDySSSiG").unwrap();
        assert_eq!(format(&arena, root), "[Swift.String : Swift.Int]");
    }

    #[test]
    fn formats_full_function_signature() {
        let mangled = "$s13lockdownmoded18LockdownModeServerC8listener_\
25shouldAcceptNewConnectionSbSo13NSXPCListenerC_So15NSXPCConnectionCtF";
        let (arena, root) = demangle_symbol(mangled).unwrap();
        assert_eq!(
            format(&arena, root),
            "lockdownmoded.LockdownModeServer.listener(_: __C.NSXPCListener, \
shouldAcceptNewConnection: __C.NSXPCConnection) -> Swift.Bool"
        );
    }

    #[test]
    fn impl_function_type_mentions_callee_guaranteed() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"Sb");
        bytes.push(0x02);
        bytes.extend_from_slice(&0i32.to_le_bytes());
        bytes.extend_from_slice(b"_pSgIegyg_");
        let text = String::from_utf8(bytes).unwrap();
        let (arena, root) = demangle_type(&text).unwrap();
        assert!(format(&arena, root).contains("@callee_guaranteed"));
    }
}
