/// The capability a host tag tree must expose for this crate to match queries against
/// it. Implementors typically wrap a borrowed node handle from a parsed HTML/XML tree;
/// every method here is a read-only, allocation-free (or cheaply cloneable) view.
pub trait Tag: Clone {
    /// `None` for the document root and for text nodes; `Some(name)` for an element.
    fn tag_name(&self) -> Option<&str>;

    /// True if this node is the synthetic document root passed to [crate::CompiledExpr::match_].
    fn is_document(&self) -> bool;

    /// Direct children, in document order. Text nodes are filtered out — every
    /// implementor of this trait is responsible for returning tag-kind nodes only.
    fn children(&self) -> Vec<Self>;

    /// All descendants in depth-first pre-order, not including `self`, tag-kind only.
    fn descendants(&self) -> Vec<Self>;

    /// Siblings that follow `self`, nearest first, tag-kind only.
    fn next_siblings(&self) -> Vec<Self>;

    /// Siblings that precede `self`, nearest first, tag-kind only.
    fn previous_siblings(&self) -> Vec<Self>;

    fn parent(&self) -> Option<Self>;

    /// The value of an attribute, if present. Implementations should return `None` for a
    /// missing attribute; callers that need the empty-string convention used for `.attr`
    /// extractors apply it at the value layer, not here.
    fn attr(&self, name: &str) -> Option<&str>;

    /// This node's text content, recursively concatenated across all descendants —
    /// the same semantics as the host tag tree's own recursive text accessor.
    fn text(&self) -> &str;

    /// Stable identity used to dedupe matches that revisit the same node by different
    /// paths. Two clones of the same logical node must return equal ids.
    fn node_id(&self) -> usize;
}
