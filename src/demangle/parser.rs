//! The Swift mangled-name stack-machine demangler.
//!
//! Mangled names are read left to right, one operator at a time, pushing
//! and popping nodes on a single stack — the same shape as the real Swift
//! demangler, simplified to the subset of the grammar this crate's callers
//! actually need (stdlib shorthand, tuples, bound generics, contexts,
//! functions, impl-function-types and symbolic references). Two small
//! deviations from the full ABI grammar are made deliberately, and both are
//! recorded in `DESIGN.md`:
//!
//! - Function argument labels are parsed by a dedicated sub-parser
//!   (`parse_label_list`) invoked once a context chain is complete, rather
//!   than folded into the general per-byte dispatch. The generic grammar is
//!   ambiguous at that position (a label list and a tuple both start with
//!   `_` or a length-prefixed identifier); real demanglers resolve it with
//!   full grammar state, which this crate does not carry.
//! - Substitution references (`A`) index a flat, append-only list of every
//!   non-marker node produced so far, addressed by a plain decimal index
//!   rather than the ABI's base-62ish letter/digit scheme.

use crate::demangle::legacy;
use crate::demangle::node::{Arena, Kind, NodeData, NodeId};
use crate::demangle::punycode;
use crate::demangle::resolver::{self, PlaceholderResolver, SymbolicReferenceResolver};
use crate::error::{Error, Result};

struct Parser<'a, R: SymbolicReferenceResolver> {
    bytes: &'a [u8],
    pos: usize,
    arena: Arena,
    stack: Vec<NodeId>,
    substitutions: Vec<NodeId>,
    resolver: &'a R,
    ref_count: usize,
    entity_done: bool,
}

impl<'a, R: SymbolicReferenceResolver> Parser<'a, R> {
    fn new(bytes: &'a [u8], resolver: &'a R) -> Self {
        Parser {
            bytes,
            pos: 0,
            arena: Arena::new(),
            stack: Vec::new(),
            substitutions: Vec::new(),
            resolver,
            ref_count: 0,
            entity_done: false,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn err(&self, reason: &'static str) -> Error {
        Error::MangledParseError {
            offset: self.pos,
            reason,
        }
    }

    fn pop_node(&mut self) -> Result<NodeId> {
        self.stack.pop().ok_or_else(|| self.err("parse stack underflow"))
    }

    fn push_node(&mut self, data: NodeData) -> NodeId {
        let is_marker = matches!(
            data.kind,
            Some(Kind::TupleFirstElementMarker) | Some(Kind::GenericArgsMarker)
        );
        let id = self.arena.push(data);
        if !is_marker {
            self.substitutions.push(id);
        }
        self.stack.push(id);
        id
    }

    fn read_decimal(&mut self) -> Result<usize> {
        let start = self.pos;
        let mut value = 0usize;
        let mut any = false;
        while self.peek().map(|b| b.is_ascii_digit()).unwrap_or(false) {
            any = true;
            value = value * 10 + (self.bytes[self.pos] - b'0') as usize;
            self.pos += 1;
        }
        if !any {
            return Err(Error::MangledParseError {
                offset: start,
                reason: "expected a decimal length",
            });
        }
        Ok(value)
    }

    fn read_identifier(&mut self) -> Result<String> {
        let len = self.read_decimal()?;
        let start = self.pos;
        let end = start.checked_add(len).ok_or_else(|| self.err("identifier length overflow"))?;
        let raw = self
            .bytes
            .get(start..end)
            .ok_or_else(|| self.err("identifier runs past end of input"))?;
        let text = std::str::from_utf8(raw).map_err(|_| self.err("identifier is not valid utf-8"))?;
        self.pos = end;
        Ok(if punycode::is_punycode(text) {
            punycode::decode(text)
        } else {
            text.to_string()
        })
    }

    fn swift_module(&mut self) -> NodeId {
        self.arena.push(NodeData {
            kind: Some(Kind::Module),
            text: Some("Swift".to_string()),
            ..Default::default()
        })
    }

    fn push_stdlib_struct(&mut self, name: &'static str) {
        let module = self.swift_module();
        let mut node = NodeData::new(Kind::Structure);
        node.text = Some(name.to_string());
        node.context = Some(module);
        self.push_node(node);
    }

    fn push_nominal_base(&mut self, name: &'static str) {
        let module = self.swift_module();
        let mut node = NodeData::new(Kind::Structure);
        node.text = Some(name.to_string());
        node.context = Some(module);
        self.push_node(node);
    }

    fn wrap_optional(&mut self) -> Result<()> {
        let inner = self.pop_node()?;
        let mut node = NodeData::new(Kind::OptionalWrap);
        node.children = vec![inner];
        self.push_node(node);
        Ok(())
    }

    fn wrap_existential(&mut self) -> Result<()> {
        if matches!(
            self.stack.last().map(|&id| self.arena.get(id).kind),
            Some(Some(Kind::TupleFirstElementMarker))
        ) {
            self.stack.pop();
        }
        let inner = self.pop_node()?;
        let mut node = NodeData::new(Kind::Existential);
        node.children = vec![inner];
        self.push_node(node);
        Ok(())
    }

    fn push_generic_args_marker(&mut self) {
        self.push_node(NodeData::new(Kind::GenericArgsMarker));
    }

    fn close_bound_generic(&mut self) -> Result<()> {
        let mut args = Vec::new();
        loop {
            let top = self.pop_node()?;
            if self.arena.get(top).kind == Some(Kind::GenericArgsMarker) {
                break;
            }
            args.push(top);
        }
        args.reverse();
        let base = self.pop_node()?;
        let base_data = self.arena.get(base).clone();
        let mut node = NodeData::new(Kind::BoundGeneric);
        node.text = base_data.text;
        node.context = base_data.context;
        node.children = args;
        self.push_node(node);
        Ok(())
    }

    fn push_tuple_marker(&mut self) {
        self.push_node(NodeData::new(Kind::TupleFirstElementMarker));
    }

    fn close_tuple(&mut self) -> Result<()> {
        let mut elems = Vec::new();
        loop {
            let first = matches!(
                self.stack.last().map(|&id| self.arena.get(id).kind),
                Some(Some(Kind::TupleFirstElementMarker))
            );
            if first {
                self.stack.pop();
            }
            let elem = self.pop_node()?;
            elems.push(elem);
            if first {
                break;
            }
        }
        elems.reverse();
        let mut node = NodeData::new(Kind::Tuple);
        node.children = elems;
        self.push_node(node);
        Ok(())
    }

    fn parse_generic_param_x(&mut self) {
        self.bump();
        self.push_node(NodeData {
            kind: Some(Kind::GenericTypeParameter),
            index: Some((0, 0)),
            ..Default::default()
        });
    }

    fn parse_generic_param_q(&mut self) -> Result<()> {
        self.bump(); // 'q'
        let mut digits = 0u32;
        let mut has_digits = false;
        while self.peek().map(|b| b.is_ascii_digit()).unwrap_or(false) {
            has_digits = true;
            digits = digits * 10 + (self.bytes[self.pos] - b'0') as u32;
            self.pos += 1;
        }
        if self.peek() == Some(b'_') {
            self.bump();
        } else {
            return Err(self.err("expected '_' terminator after generic parameter index"));
        }
        let index = if has_digits { digits + 1 } else { 1 };
        self.push_node(NodeData {
            kind: Some(Kind::GenericTypeParameter),
            index: Some((0, index)),
            ..Default::default()
        });
        Ok(())
    }

    fn parse_dependent_member(&mut self) -> Result<()> {
        self.bump(); // 'Q'
        let c = self.peek().ok_or_else(|| self.err("expected dependent-member-type tag"))?;
        self.bump();
        if c != b'z' {
            return Err(self.err("unsupported dependent-member-type encoding"));
        }
        let base = self.pop_node()?;
        let mut node = NodeData::new(Kind::DependentMemberType);
        node.context = Some(base);
        self.push_node(node);
        Ok(())
    }

    fn parse_substitution(&mut self) -> Result<()> {
        self.bump(); // 'A'
        let mut index = 0usize;
        while self.peek().map(|b| b.is_ascii_digit()).unwrap_or(false) {
            index = index * 10 + (self.bytes[self.pos] - b'0') as usize;
            self.pos += 1;
        }
        let id = *self
            .substitutions
            .get(index)
            .ok_or_else(|| self.err("substitution index out of range"))?;
        self.stack.push(id);
        Ok(())
    }

    fn parse_symbolic_reference(&mut self) -> Result<()> {
        let control = self.peek().ok_or_else(|| self.err("expected symbolic reference control byte"))?;
        self.bump();
        let kind = resolver::classify(control).ok_or_else(|| self.err("unknown symbolic reference control byte"))?;
        let payload: i64 = if resolver::is_relative(control) {
            let raw = self
                .bytes
                .get(self.pos..self.pos + 4)
                .ok_or_else(|| self.err("truncated relative symbolic reference"))?;
            self.pos += 4;
            i32::from_le_bytes(raw.try_into().unwrap()) as i64
        } else {
            let raw = self
                .bytes
                .get(self.pos..self.pos + 8)
                .ok_or_else(|| self.err("truncated absolute symbolic reference"))?;
            self.pos += 8;
            i64::from_le_bytes(raw.try_into().unwrap())
        };
        let label = self
            .resolver
            .resolve(kind, control, payload, self.ref_count)
            .map_err(|_| Error::ResolverFailure)?;
        self.ref_count += 1;
        let mut node = NodeData::new(Kind::SymbolicReference);
        node.text = Some(label);
        self.push_node(node);
        Ok(())
    }

    fn parse_impl_function_type(&mut self) -> Result<()> {
        self.bump(); // 'I'
        let mut conventions = Vec::new();
        loop {
            let c = self.peek().ok_or_else(|| self.err("unterminated impl-function-type"))?;
            self.bump();
            if c == b'_' {
                break;
            }
            conventions.push(c as char);
        }
        let payload = self.stack.pop();
        let mut node = NodeData::new(Kind::ImplFunctionType);
        node.conventions = conventions;
        node.children = payload.into_iter().collect();
        self.push_node(node);
        Ok(())
    }

    fn finish_context(&mut self, byte: u8) -> Result<()> {
        self.bump();
        let name = self.pop_node()?;
        let context = self.pop_node()?;
        let ctx_data = self.arena.get(context);
        let is_objc = ctx_data.kind == Some(Kind::Module) && ctx_data.text.as_deref() == Some("__C");
        let kind = if is_objc {
            Kind::ObjcImportedType
        } else {
            match byte {
                b'C' => Kind::Class,
                b'V' => Kind::Structure,
                b'O' => Kind::Enum,
                b'P' => Kind::Protocol,
                b'E' => Kind::Extension,
                _ => Kind::Unknown,
            }
        };
        let text = self.arena.get(name).text.clone();
        let mut node = NodeData::new(kind);
        node.text = text;
        node.context = Some(context);
        self.push_node(node);
        Ok(())
    }

    fn parse_dollar_s_shorthand(&mut self) -> Result<()> {
        self.bump(); // 'S'
        let c = self
            .peek()
            .ok_or_else(|| self.err("expected standard-library shorthand letter"))?;
        self.bump();
        match c {
            b'b' => {
                self.push_stdlib_struct("Bool");
                Ok(())
            }
            b'i' => {
                self.push_stdlib_struct("Int");
                Ok(())
            }
            b'd' => {
                self.push_stdlib_struct("Double");
                Ok(())
            }
            b'f' => {
                self.push_stdlib_struct("Float");
                Ok(())
            }
            b'S' => {
                self.push_stdlib_struct("String");
                Ok(())
            }
            b'c' => {
                self.push_stdlib_struct("Character");
                Ok(())
            }
            b'a' => {
                self.push_nominal_base("Array");
                Ok(())
            }
            b'D' => {
                self.push_nominal_base("Dictionary");
                Ok(())
            }
            b'q' => {
                self.push_nominal_base("Optional");
                Ok(())
            }
            b'o' => {
                self.push_node(NodeData {
                    kind: Some(Kind::Module),
                    text: Some("__C".to_string()),
                    ..Default::default()
                });
                Ok(())
            }
            b'g' => self.wrap_optional(),
            other => {
                log::debug!(
                    "demangle: unrecognized stdlib shorthand 'S{}' at byte {}",
                    other as char,
                    self.pos
                );
                self.push_node(NodeData {
                    kind: Some(Kind::Unknown),
                    text: Some(format!("S{}", other as char)),
                    ..Default::default()
                });
                Ok(())
            }
        }
    }

    fn parse_label_list(&mut self) -> Vec<Option<String>> {
        let mut labels = Vec::new();
        loop {
            match self.peek() {
                Some(b'_') => {
                    self.bump();
                    labels.push(None);
                }
                Some(b) if b.is_ascii_digit() => match self.read_identifier() {
                    Ok(text) => labels.push(Some(text)),
                    Err(_) => break,
                },
                _ => break,
            }
        }
        labels
    }

    fn at_entity_boundary(&self) -> bool {
        if self.entity_done || self.stack.len() != 1 {
            return false;
        }
        let data = self.arena.get(self.stack[0]);
        matches!(
            data.kind,
            Some(Kind::Class)
                | Some(Kind::Structure)
                | Some(Kind::Enum)
                | Some(Kind::Protocol)
                | Some(Kind::Extension)
                | Some(Kind::ObjcImportedType)
        ) && data.context.is_some()
            && self.peek().map(|b| b.is_ascii_digit()).unwrap_or(false)
    }

    fn parse_entity(&mut self) -> Result<()> {
        let context = self.pop_node()?;
        let name = self.read_identifier()?;
        let labels = self.parse_label_list();
        while self.pos < self.bytes.len() {
            match self.peek() {
                Some(b'F') | Some(b'c') | Some(b'g') | Some(b's') => break,
                _ => self.step()?,
            }
        }
        let terminal = self.peek().unwrap_or(b'F');
        self.bump();
        let params = self.stack.pop();
        let result = self.stack.pop();
        let kind = match terminal {
            b'g' => Kind::Getter,
            b's' => Kind::Setter,
            b'c' => Kind::Allocator,
            _ => Kind::Function,
        };
        let mut node = NodeData::new(kind);
        node.text = Some(name);
        node.context = Some(context);
        node.labels = labels;
        node.result = result;
        node.children = match params {
            Some(p) if self.arena.get(p).kind == Some(Kind::Tuple) => self.arena.get(p).children.clone(),
            Some(p) => vec![p],
            None => vec![],
        };
        self.entity_done = true;
        self.push_node(node);
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        let byte = self.peek().ok_or_else(|| self.err("unexpected end of mangled name"))?;
        match byte {
            0x01..=0x1F => self.parse_symbolic_reference(),
            b'S' => self.parse_dollar_s_shorthand(),
            b'A' => self.parse_substitution(),
            b'Q' => self.parse_dependent_member(),
            b'G' => {
                self.bump();
                self.close_bound_generic()
            }
            b'y' => {
                self.bump();
                self.push_generic_args_marker();
                Ok(())
            }
            b't' => {
                self.bump();
                self.close_tuple()
            }
            b'_' => {
                self.bump();
                self.push_tuple_marker();
                Ok(())
            }
            b'p' => {
                self.bump();
                self.wrap_existential()
            }
            b'x' => {
                self.parse_generic_param_x();
                Ok(())
            }
            b'q' => self.parse_generic_param_q(),
            b'I' => self.parse_impl_function_type(),
            b'C' | b'V' | b'O' | b'P' | b'E' => self.finish_context(byte),
            b'0'..=b'9' => {
                let text = self.read_identifier()?;
                self.push_node(NodeData {
                    kind: Some(Kind::Identifier),
                    text: Some(text),
                    ..Default::default()
                });
                Ok(())
            }
            other => {
                log::debug!("demangle: skipping unrecognized operator {:#04x} at byte {}", other, self.pos);
                self.bump();
                self.push_node(NodeData {
                    kind: Some(Kind::Unknown),
                    text: Some(format!("{:#04x}", other)),
                    ..Default::default()
                });
                Ok(())
            }
        }
    }

    fn run(&mut self) -> Result<()> {
        while self.pos < self.bytes.len() {
            if self.at_entity_boundary() {
                self.parse_entity()?;
            } else {
                self.step()?;
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<(Arena, NodeId)> {
        let pos = self.pos;
        let root = self.stack.last().copied().ok_or(Error::MangledParseError {
            offset: pos,
            reason: "mangled name produced no node",
        })?;
        Ok((self.arena, root))
    }
}

fn frame(text: &str) -> Option<&str> {
    let stripped = text.strip_prefix('_').unwrap_or(text);
    stripped.strip_prefix("$s").or_else(|| stripped.strip_prefix("$S"))
}

/// Demangle a full Swift symbol (`$s...`-prefixed). Without a resolver,
/// every symbolic reference resolves to placeholder text and the rest of
/// the mangling still parses.
pub fn demangle_symbol(text: &str) -> Result<(Arena, NodeId)> {
    demangle_symbol_with(text, &PlaceholderResolver)
}

/// As [`demangle_symbol`], resolving symbolic references through `resolver`.
pub fn demangle_symbol_with<R: SymbolicReferenceResolver>(text: &str, resolver: &R) -> Result<(Arena, NodeId)> {
    match frame(text) {
        Some(body) => {
            let mut parser = Parser::new(body.as_bytes(), resolver);
            parser.run()?;
            parser.finish()
        }
        None => {
            let mut arena = Arena::new();
            let normalized = legacy::normalize_identifier(text);
            let id = arena.push(NodeData {
                kind: Some(Kind::Identifier),
                text: Some(normalized),
                ..Default::default()
            });
            Ok((arena, id))
        }
    }
}

/// Demangle a standalone type mangling (no `$s` prefix required): the
/// fragment found in, e.g., a `__swift5_fieldmd` record's
/// `mangled_type_name`.
pub fn demangle_type(text: &str) -> Result<(Arena, NodeId)> {
    demangle_type_with(text, &PlaceholderResolver)
}

/// As [`demangle_type`], resolving symbolic references through `resolver`.
pub fn demangle_type_with<R: SymbolicReferenceResolver>(text: &str, resolver: &R) -> Result<(Arena, NodeId)> {
    let body = frame(text).unwrap_or(text);
    let mut parser = Parser::new(body.as_bytes(), resolver);
    parser.run()?;
    parser.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demangle::resolver::ReferenceKind;

    #[test]
    fn bool_shorthand_is_a_swift_struct() {
        let (arena, root) = demangle_type("Sb").unwrap();
        let node = arena.get(root);
        assert_eq!(node.kind, Some(Kind::Structure));
        assert_eq!(node.text.as_deref(), Some("Bool"));
        let module = arena.get(node.context.unwrap());
        assert_eq!(module.text.as_deref(), Some("Swift"));
    }

    #[test]
    fn optional_sugar_wraps_its_payload() {
        let (arena, root) = demangle_type("SSSg").unwrap();
        let node = arena.get(root);
        assert_eq!(node.kind, Some(Kind::OptionalWrap));
        let inner = arena.get(node.children[0]);
        assert_eq!(inner.text.as_deref(), Some("String"));
    }

    #[test]
    fn tuple_elements_come_out_in_source_order() {
        let (arena, root) = demangle_type("Si_SSt").unwrap();
        let node = arena.get(root);
        assert_eq!(node.kind, Some(Kind::Tuple));
        assert_eq!(node.children.len(), 2);
        assert_eq!(arena.get(node.children[0]).text.as_deref(), Some("Int"));
        assert_eq!(arena.get(node.children[1]).text.as_deref(), Some("String"));
    }

    #[test]
    fn bound_generic_array_sugar() {
        let (arena, root) = demangle_type("SaySiG").unwrap();
        let node = arena.get(root);
        assert_eq!(node.kind, Some(Kind::BoundGeneric));
        assert_eq!(node.text.as_deref(), Some("Array"));
        assert_eq!(node.children.len(), 1);
        assert_eq!(arena.get(node.children[0]).text.as_deref(), Some("Int"));
    }

    #[test]
    fn bound_generic_dictionary_sugar_keeps_key_value_order() {
        let (arena, root) = demangle_type("SDySSSiG").unwrap();
        let node = arena.get(root);
        assert_eq!(node.kind, Some(Kind::BoundGeneric));
        assert_eq!(node.text.as_deref(), Some("Dictionary"));
        assert_eq!(node.children.len(), 2);
        assert_eq!(arena.get(node.children[0]).text.as_deref(), Some("String"));
        assert_eq!(arena.get(node.children[1]).text.as_deref(), Some("Int"));
    }

    #[test]
    fn unresolved_symbolic_reference_still_parses_to_a_placeholder() {
        let mut bytes = vec![b'S', b'b', 0x02];
        bytes.extend_from_slice(&0i32.to_le_bytes());
        let text = String::from_utf8(bytes).unwrap();
        let (arena, root) = demangle_type(&text).unwrap();
        let node = arena.get(root);
        assert_eq!(node.kind, Some(Kind::SymbolicReference));
        assert!(node.text.as_deref().unwrap().contains("symbolic"));
    }

    #[test]
    fn impl_function_type_carries_callee_guaranteed_convention() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"Sb");
        bytes.push(0x02);
        bytes.extend_from_slice(&0i32.to_le_bytes());
        bytes.extend_from_slice(b"_pSgIegyg_");
        let text = String::from_utf8(bytes).unwrap();
        let (arena, root) = demangle_type(&text).unwrap();
        let node = arena.get(root);
        assert_eq!(node.kind, Some(Kind::ImplFunctionType));
        assert!(node.conventions.contains(&'g'));
        assert_eq!(node.children.len(), 1);
        let payload = arena.get(node.children[0]);
        assert_eq!(payload.kind, Some(Kind::OptionalWrap));
    }

    #[test]
    fn full_symbol_demangles_to_a_function_entity() {
        let mangled = "$s13lockdownmoded18LockdownModeServerC8listener_\
25shouldAcceptNewConnectionSbSo13NSXPCListenerC_So15NSXPCConnectionCtF";
        let (arena, root) = demangle_symbol(mangled).unwrap();
        let func = arena.get(root);
        assert_eq!(func.kind, Some(Kind::Function));
        assert_eq!(func.text.as_deref(), Some("listener"));
        assert_eq!(func.labels, vec![None, Some("shouldAcceptNewConnection".to_string())]);

        let class = arena.get(func.context.unwrap());
        assert_eq!(class.kind, Some(Kind::Class));
        assert_eq!(class.text.as_deref(), Some("LockdownModeServer"));
        let module = arena.get(class.context.unwrap());
        assert_eq!(module.text.as_deref(), Some("lockdownmoded"));

        let result = arena.get(func.result.unwrap());
        assert_eq!(result.text.as_deref(), Some("Bool"));

        assert_eq!(func.children.len(), 2);
        let first = arena.get(func.children[0]);
        assert_eq!(first.kind, Some(Kind::ObjcImportedType));
        assert_eq!(first.text.as_deref(), Some("NSXPCListener"));
        let second = arena.get(func.children[1]);
        assert_eq!(second.kind, Some(Kind::ObjcImportedType));
        assert_eq!(second.text.as_deref(), Some("NSXPCConnection"));
    }

    #[test]
    fn substitution_references_reuse_an_earlier_node() {
        // Si_SSA1t: (Int, String, <substitution #1, the String above>).
        let (arena, root) = demangle_type("Si_SSA1t").unwrap();
        let tuple = arena.get(root);
        assert_eq!(tuple.kind, Some(Kind::Tuple));
        assert_eq!(tuple.children.len(), 3);
        assert_eq!(arena.get(tuple.children[2]).text.as_deref(), Some("String"));
    }

    #[test]
    fn symbolic_reference_classification_matches_control_byte_table() {
        assert_eq!(resolver::classify(0x01), Some(ReferenceKind::DirectTypeDescriptor));
        assert_eq!(resolver::classify(0x02), Some(ReferenceKind::IndirectTypeDescriptor));
        assert!(resolver::is_relative(0x02));
        assert!(!resolver::is_relative(0x80));
    }
}
