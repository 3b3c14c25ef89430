//! The arena-style node tree produced by demangling and consumed by the
//! printer.
//!
//! Every node produced while demangling lives in one [`Arena`]; children are
//! referenced by [`NodeId`] index rather than `Rc`/boxed recursion, so
//! substitution references and context-chain parents can point at earlier
//! nodes without the tree becoming a graph of owned pointers, keeping it
//! acyclic in allocation terms.

/// An index into an [`Arena`]. Never valid across two different arenas.
pub type NodeId = usize;

/// What kind of thing a node represents. Intentionally flat and
/// non-exhaustive in spirit (new kinds are additive); unknown/new kinds
/// that reach the printer render as `<kind Name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Module,
    Identifier,
    Class,
    Structure,
    Enum,
    Protocol,
    Extension,
    /// A nominal type applied to generic arguments: `base` names the
    /// nominal (e.g. `Array`, `Dictionary`, or a user type), `children`
    /// holds the argument list in left-to-right order.
    BoundGeneric,
    Tuple,
    /// Internal bookkeeping node: marks the position of a tuple's first
    /// element on the parse stack so `t` knows where to stop popping.
    TupleFirstElementMarker,
    /// Internal bookkeeping node: marks the start of a generic-argument
    /// list so `G` knows where to stop popping.
    GenericArgsMarker,
    GenericTypeParameter,
    DependentMemberType,
    /// An imported (`So`-prefixed) Objective-C entity; prints under the
    /// synthetic `__C` module.
    ObjcImportedType,
    /// Sugar: `T?`. Wraps exactly one child, the wrapped type.
    OptionalWrap,
    /// `p`-suffixed existential type: wraps a protocol-composition list.
    Existential,
    /// `I`-introduced impl-function-type. `conventions` carries the raw
    /// calling-convention letters in encounter order; at most one child,
    /// the payload type popped when the construct closed.
    ImplFunctionType,
    Function,
    Getter,
    Setter,
    Allocator,
    Initializer,
    WitnessTableEntry,
    NominalTypeDescriptor,
    ProtocolDescriptor,
    MethodDescriptor,
    ProtocolWitness,
    /// A symbolic reference that could not be (or was not) resolved to a
    /// concrete node; `text` carries the placeholder/resolved label.
    SymbolicReference,
    /// Catch-all for anything a future ABI revision might add; `text`
    /// holds a short kind name for the printer's `<kind Name>` fallback.
    Unknown,
}

/// One node in the tree. Cheap to clone (everything owned, no shared
/// mutable state), matching the rest of this crate's flat-struct idiom.
#[derive(Debug, Clone, Default)]
pub struct NodeData {
    pub kind: Option<Kind>,
    /// Identifier text, base (function) name, or a placeholder/unknown
    /// label, depending on `kind`.
    pub text: Option<String>,
    /// Enclosing context (module/class/struct/...) for named entities.
    pub context: Option<NodeId>,
    /// Tuple elements, generic arguments, or function parameters, always
    /// in left-to-right source order.
    pub children: Vec<NodeId>,
    /// `(depth, index)` for `GenericTypeParameter`.
    pub index: Option<(u32, u32)>,
    /// Calling-convention letters for `ImplFunctionType`, in encounter
    /// order (duplicates preserved; the printer dedups when rendering).
    pub conventions: Vec<char>,
    /// Function argument labels, parallel to the parameter tuple's
    /// children; `None` means "no label" (source `_`).
    pub labels: Vec<Option<String>>,
    /// The function's result type, when `kind == Function` (or one of the
    /// accessor/entity kinds that also carry a signature).
    pub result: Option<NodeId>,
    /// Whether this entity's signature is marked `async`/`throws`.
    pub is_async: bool,
    pub is_throws: bool,
}

impl NodeData {
    pub fn new(kind: Kind) -> Self {
        NodeData {
            kind: Some(kind),
            ..Default::default()
        }
    }
}

/// Owns every node produced by one demangling call.
#[derive(Debug, Clone, Default)]
pub struct Arena {
    nodes: Vec<NodeData>,
}

impl Arena {
    pub fn new() -> Self {
        Arena { nodes: Vec::new() }
    }

    pub fn push(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(data);
        self.nodes.len() - 1
    }

    pub fn get(&self, id: NodeId) -> &NodeData {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
