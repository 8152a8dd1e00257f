use std::cell::Cell;
use std::rc::Rc;

/// The traversal mode an expression node is validated under: every node in the AST is
/// pinned to exactly one of these once validation completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Depth,
    Breadth,
}

/// Which side of a binary/repetition/monadic node an inner expression occupies, used by
/// the matcher to decide whether it is progressing into a sibling or a child chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TravSide {
    Left,
    Right,
}

/// A traversal operator: `>` and `>>` step into the depth axis, `:` and `::` step along
/// the breadth axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravOp {
    Child,
    Descendant,
    Sibling,
    FollowingSibling,
}

impl TravOp {
    pub fn mode(self) -> Mode {
        match self {
            TravOp::Child | TravOp::Descendant => Mode::Depth,
            TravOp::Sibling | TravOp::FollowingSibling => Mode::Breadth,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepOp {
    Plus,
    Star,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractorKind {
    Node,
    Text,
    Attr(String),
    /// A bare identifier used as a filter extractor reference, e.g. `c` in `~(c != 'e')`.
    /// The grammar accepts any name here unconditionally; only `node`/`txt` resolve to a
    /// value, so this is otherwise rejected at evaluation time.
    Named(String),
}

/// A single capture site inside `[...]`. Carries a unique `id` so two syntactically
/// identical extractors (e.g. two `node` in the same query) are still distinguishable by
/// identity in a [crate::matcher::Match].
#[derive(Debug)]
pub struct Extractor {
    pub id: usize,
    pub kind: ExtractorKind,
}

impl PartialEq for Extractor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Extractor {}
impl std::hash::Hash for Extractor {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    And,
    Or,
    Eq,
    Ne,
    RegexMatch,
    RegexNotMatch,
}

/// A filter expression, evaluated inside `~( ... )` against the tag bound to the
/// enclosing primary expression.
#[derive(Debug)]
pub enum FilterExpr {
    Extractor(Rc<Extractor>),
    LiteralStr(String),
    LiteralInt(i64),
    Func(String),
    Op(FilterOp, Rc<FilterExpr>, Rc<FilterExpr>),
}

/// A tag-matching predicate: a bare name, the wildcard `@` (`Name(None)`), `.class`,
/// `#id`, a conjunction of a name with a class/id (`BothTag`), or a negation `!`.
#[derive(Debug)]
pub enum TagExpr {
    Name(Option<String>),
    Class(String),
    Id(String),
    Both(Rc<TagExpr>, Rc<TagExpr>),
    Not(Rc<TagExpr>),
}

#[derive(Debug)]
pub enum ExprKind {
    Tag(Rc<TagExpr>),
    Extractors(Rc<Expr>, Vec<Rc<Extractor>>),
    Filter(Rc<Expr>, Rc<FilterExpr>),
    Trav(TravOp, Rc<Expr>, Rc<Expr>),
    /// `expr trav_op rep_op`: repeats `expr`, stepping via `trav_op` between
    /// iterations. Unlike [ExprKind::Trav] the traversal operator here has no
    /// independent right-hand expression — the loop body is `expr` itself.
    Rep(Rc<Expr>, TravOp, RepOp),
    Mon(Rc<Expr>),
    Bin(Rc<Expr>, Rc<Expr>),
    /// `tag_expr { child_expr }` (or bare `{ child_expr }`, tag_expr defaulting to the
    /// wildcard `@`). Flips the ambient mode for `child_expr`.
    ModeSwitch(Rc<Expr>, Rc<Expr>),
    End,
    Document(Rc<Expr>),
}

/// A node of the parsed query tree. `mode` starts unset and is assigned exactly once, by
/// the validator, before matching can run.
#[derive(Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub mode: Cell<Option<Mode>>,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Rc<Self> {
        Rc::new(Self {
            kind,
            mode: Cell::new(None),
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
            .get()
            .expect("Expr::mode() called before validation")
    }
}

/// True if `expr` or any of its descendants carries an `[...]` extraction list or a
/// filter referencing an extractor — used by the validator to decide whether a bare
/// filter extractor is reachable.
pub fn has_extractors(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Extractors(_, _) => true,
        ExprKind::Tag(_) | ExprKind::End => false,
        ExprKind::Filter(inner, _) => has_extractors(inner),
        ExprKind::Trav(_, left, right) => has_extractors(left) || has_extractors(right),
        ExprKind::Rep(inner, _, _) => has_extractors(inner),
        ExprKind::Mon(inner) => has_extractors(inner),
        ExprKind::Bin(left, right) => has_extractors(left) || has_extractors(right),
        ExprKind::ModeSwitch(tag, child) => has_extractors(tag) || has_extractors(child),
        ExprKind::Document(inner) => has_extractors(inner),
    }
}
