use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use crate::ast::{has_extractors, Expr, ExprKind, Mode, RepOp, TagExpr, TravOp, TravSide};
use crate::error::{TqlError, TqlErrorKind};
use crate::tag::Tag;
use crate::value::{eval_filter, extract, ExtractedValue, FuncTable};

/// One resolved extraction: either the matched node itself, its text, an attribute
/// value, or a nested group of tuples produced by a repetition.
#[derive(Debug, Clone)]
pub enum ResultItem<T: Tag> {
    Node(T),
    Text(String),
    Attr(String),
    Group(Vec<ResultTuple<T>>),
}

/// One row of extracted values, in the order their extractors appear in the query.
#[derive(Debug, Clone)]
pub struct ResultTuple<T: Tag>(pub Vec<ResultItem<T>>);

/// An unresolved extraction site: a matched tag paired with the extractor that will
/// read it. Carried by identity (node id + extractor id) through matching so the
/// top-level dedup in [start_match] can collapse distinct match paths that bind
/// identical `(node, extractor)` pairs, without forcing eager evaluation of `.attr`/`txt`.
struct ExtractorMatch<T: Tag> {
    node: T,
    extractor: Rc<crate::ast::Extractor>,
}

/// A node of an extraction group: either a leaf capture site, or a nested group
/// produced by a repetition closing one iteration (see [Match::degroup]).
enum ExtNode<T: Tag> {
    Leaf(ExtractorMatch<T>),
    Nested(Vec<ExtNode<T>>),
}

impl<T: Tag> Clone for ExtNode<T> {
    fn clone(&self) -> Self {
        match self {
            ExtNode::Leaf(m) => ExtNode::Leaf(ExtractorMatch {
                node: m.node.clone(),
                extractor: m.extractor.clone(),
            }),
            ExtNode::Nested(items) => ExtNode::Nested(items.clone()),
        }
    }
}

/// The matcher's per-step state: the tag just matched (`current`) and the tag under
/// consideration next (`next`), plus the extraction tree accumulated so far. Immutable;
/// every mutator returns a new value sharing structure with the old one.
#[derive(Clone)]
pub(crate) struct Match<T: Tag> {
    current: Option<T>,
    next: Option<T>,
    exts: Rc<Vec<Rc<Vec<ExtNode<T>>>>>,
    trav_side: Option<TravSide>,
}

impl<T: Tag> Match<T> {
    fn new(current: Option<T>, next: Option<T>) -> Self {
        Self {
            current,
            next,
            exts: Rc::new(vec![Rc::new(Vec::new())]),
            trav_side: None,
        }
    }

    /// Move `current`/`next` forward, optionally appending one extraction leaf to the
    /// innermost frame.
    fn progress(&self, current: Option<T>, next: Option<T>, ext: Option<ExtractorMatch<T>>) -> Self {
        let exts = match ext {
            None => self.exts.clone(),
            Some(e) => {
                let mut frames = (*self.exts).clone();
                let mut top = (**frames.last().unwrap()).clone();
                top.push(ExtNode::Leaf(e));
                *frames.last_mut().unwrap() = Rc::new(top);
                Rc::new(frames)
            }
        };
        Self {
            current,
            next,
            exts,
            trav_side: self.trav_side,
        }
    }

    /// Update only `next`, keeping `current` and every accumulated extraction intact —
    /// used by a breadth-outer [ExprKind::ModeSwitch] both to re-point `next` at the
    /// switch-matched tag before running its child expression, and to restore `next` to
    /// the outer breadth position afterward.
    fn with_next(&self, next: Option<T>) -> Self {
        Self {
            current: self.current.clone(),
            next,
            exts: self.exts.clone(),
            trav_side: self.trav_side,
        }
    }

    fn side(&self, side: TravSide) -> Self {
        Self {
            current: self.current.clone(),
            next: self.next.clone(),
            exts: self.exts.clone(),
            trav_side: Some(side),
        }
    }

    /// Push a fresh, empty extraction frame. A no-op when `ignore` (the enclosing
    /// repetition carries no extractors) — see §4.4.
    fn subgroup(&self, ignore: bool) -> Self {
        if ignore {
            return self.clone();
        }
        let mut frames = (*self.exts).clone();
        frames.push(Rc::new(Vec::new()));
        Self {
            current: self.current.clone(),
            next: self.next.clone(),
            exts: Rc::new(frames),
            trav_side: self.trav_side,
        }
    }

    /// Pop the innermost frame and append it, as a single nested group, to the frame
    /// below. A no-op when `ignore`.
    fn degroup(&self, ignore: bool) -> Self {
        if ignore {
            return self.clone();
        }
        let mut frames = (*self.exts).clone();
        let popped = frames.pop().expect("degroup without matching subgroup");
        let mut under = (**frames.last().unwrap()).clone();
        under.push(ExtNode::Nested((*popped).clone()));
        *frames.last_mut().unwrap() = Rc::new(under);
        Self {
            current: self.current.clone(),
            next: self.next.clone(),
            exts: Rc::new(frames),
            trav_side: self.trav_side,
        }
    }

    /// The key used by [RepOp]'s `seen` set: `Match` equality is `(current, next,
    /// trav_side, exts)` as a whole, so two paths that reach the same node pair with a
    /// different accumulated extraction tree are distinct matches, not duplicates.
    fn key(&self) -> MatchKey {
        MatchKey {
            current: self.current.as_ref().map(|t| t.node_id()),
            next: self.next.as_ref().map(|t| t.node_id()),
            trav_side: self.trav_side,
            exts: self.exts.iter().map(|frame| frame.iter().map(ext_key).collect()).collect(),
        }
    }

    fn outer_group(self) -> Vec<ExtNode<T>> {
        (*self.exts[0]).clone()
    }
}

fn tag_matches<T: Tag>(tag_expr: &TagExpr, tag: &T) -> bool {
    match tag_expr {
        TagExpr::Name(None) => true,
        TagExpr::Name(Some(name)) => tag.tag_name() == Some(name.as_str()),
        TagExpr::Class(class) => tag
            .attr("class")
            .map(|classes| classes.split_whitespace().any(|c| c == class))
            .unwrap_or(false),
        TagExpr::Id(id) => tag.attr("id").map(|v| v == id).unwrap_or(false),
        TagExpr::Not(inner) => !tag_matches(inner, tag),
        TagExpr::Both(left, right) => tag_matches(left, tag) && tag_matches(right, tag),
    }
}

/// `descend_by_op(node, op)`: enumerate the candidate `next` positions a traversal
/// operator steps to. `>`/`:` each yield the node itself (a placeholder resolved by the
/// tag-matching step); `>>` yields the node then every descendant; `::` yields the node
/// then every following sibling.
fn descend_by_op<T: Tag>(node: &Option<T>, op: TravOp) -> Vec<Option<T>> {
    match op {
        TravOp::Child | TravOp::Sibling => vec![node.clone()],
        TravOp::Descendant => {
            let mut out = vec![node.clone()];
            if let Some(n) = node {
                out.extend(n.descendants().into_iter().map(Some));
            }
            out
        }
        TravOp::FollowingSibling => {
            let mut out = vec![node.clone()];
            if let Some(n) = node {
                out.extend(n.next_siblings().into_iter().map(Some));
            }
            out
        }
    }
}

fn value_to_result_item<T: Tag>(value: ExtractedValue<T>) -> ResultItem<T> {
    match value {
        ExtractedValue::Node(t) => ResultItem::Node(t),
        ExtractedValue::Text(s) => ResultItem::Text(s),
        ExtractedValue::Attr(s) => ResultItem::Attr(s),
    }
}

fn resolve_node<T: Tag>(node: &ExtNode<T>) -> Result<ResultItem<T>, TqlError> {
    match node {
        ExtNode::Leaf(m) => Ok(value_to_result_item(extract(&m.extractor.kind, &m.node)?)),
        ExtNode::Nested(items) => Ok(ResultItem::Group(
            items.iter().map(resolve_tuple).collect::<Result<Vec<_>, _>>()?,
        )),
    }
}

fn resolve_tuple<T: Tag>(node: &ExtNode<T>) -> Result<ResultTuple<T>, TqlError> {
    match node {
        ExtNode::Nested(items) => Ok(ResultTuple(
            items.iter().map(resolve_node).collect::<Result<Vec<_>, _>>()?,
        )),
        leaf @ ExtNode::Leaf(_) => Ok(ResultTuple(vec![resolve_node(leaf)?])),
    }
}

/// Enumerate every way `expr` can match starting from `m`, without mutating any shared
/// state: each candidate is an independent [Match] value.
fn full_match<T: Tag>(
    expr: &Expr,
    m: Match<T>,
    funcs: &FuncTable<T>,
) -> Result<Vec<Match<T>>, TqlError> {
    match &expr.kind {
        ExprKind::Tag(tag_expr) => {
            let next = match &m.next {
                Some(t) => t.clone(),
                None => return Ok(Vec::new()),
            };
            if !tag_matches(tag_expr, &next) {
                return Ok(Vec::new());
            }
            let mut out = Vec::new();
            match expr.mode() {
                Mode::Depth => {
                    let children = next.children();
                    if children.is_empty() {
                        out.push(m.progress(Some(next.clone()), None, None));
                    } else {
                        for c in children {
                            out.push(m.progress(Some(next.clone()), Some(c), None));
                        }
                    }
                }
                Mode::Breadth => {
                    match next.next_siblings().into_iter().next() {
                        Some(sibling) => out.push(m.progress(Some(next.clone()), Some(sibling), None)),
                        None => out.push(m.progress(Some(next.clone()), None, None)),
                    }
                }
            }
            Ok(out)
        }
        ExprKind::Extractors(inner, list) => {
            let mut out = Vec::new();
            for im in full_match(inner, m, funcs)? {
                let tag = match &im.current {
                    Some(t) => t.clone(),
                    None => continue,
                };
                let mut next = im.clone();
                for extractor in list {
                    next = next.progress(
                        next.current.clone(),
                        next.next.clone(),
                        Some(ExtractorMatch {
                            node: tag.clone(),
                            extractor: extractor.clone(),
                        }),
                    );
                }
                out.push(next);
            }
            Ok(out)
        }
        ExprKind::Filter(inner, filter) => {
            let mut out = Vec::new();
            for im in full_match(inner, m, funcs)? {
                let tag = match &im.current {
                    Some(t) => t.clone(),
                    None => continue,
                };
                if eval_filter(filter, &tag, funcs)? {
                    out.push(im);
                }
            }
            Ok(out)
        }
        ExprKind::Trav(op, left, right) => {
            let mut out = Vec::new();
            for lm in full_match(left, m.side(TravSide::Left), funcs)? {
                for n in descend_by_op(&lm.next, *op) {
                    let candidate = lm.progress(lm.current.clone(), n, None).side(TravSide::Right);
                    out.extend(full_match(right, candidate, funcs)?);
                }
            }
            Ok(out)
        }
        ExprKind::Rep(inner, trav_op, rep_op) => rep_match(inner, *trav_op, *rep_op, m, funcs),
        ExprKind::Mon(inner) => {
            // skip-before-expand: the unchanged match first, then every way `inner`
            // can also match.
            let mut out = vec![m.clone()];
            out.extend(full_match(inner, m, funcs)?);
            Ok(out)
        }
        ExprKind::Bin(left, right) => {
            let mut out = full_match(left, m.clone(), funcs)?;
            out.extend(full_match(right, m, funcs)?);
            Ok(out)
        }
        ExprKind::ModeSwitch(tag_expr, child_expr) => mode_switch_match(expr, tag_expr, child_expr, m, funcs),
        ExprKind::End => Ok(end_match(expr, &m)),
        ExprKind::Document(inner) => document_match(inner, m, funcs),
    }
}

fn end_match<T: Tag>(expr: &Expr, m: &Match<T>) -> Vec<Match<T>> {
    let yields = match m.trav_side {
        Some(TravSide::Left) => match &m.next {
            None => true,
            Some(n) => match expr.mode() {
                Mode::Breadth => n.previous_siblings().is_empty(),
                Mode::Depth => match n.parent() {
                    None => true,
                    Some(p) => p.is_document(),
                },
            },
        },
        _ => m.next.is_none(),
    };
    if yields {
        vec![m.clone()]
    } else {
        Vec::new()
    }
}

fn mode_switch_match<T: Tag>(
    expr: &Expr,
    tag_expr: &Expr,
    child_expr: &Expr,
    m: Match<T>,
    funcs: &FuncTable<T>,
) -> Result<Vec<Match<T>>, TqlError> {
    let outer_mode = expr.mode();
    let mut out = Vec::new();
    for sm in full_match(tag_expr, m, funcs)? {
        match outer_mode {
            Mode::Depth => {
                out.extend(full_match(child_expr, sm, funcs)?);
            }
            Mode::Breadth => {
                // `descend_by_op(current, ">")` yields only `current` itself: the child
                // expression re-matches the switch-matched tag, then descends on its
                // own. `next` is restored to the outer breadth position afterward.
                let outer_next = sm.next.clone();
                let inner_start = sm.with_next(sm.current.clone());
                for ssm in full_match(child_expr, inner_start, funcs)? {
                    out.push(ssm.with_next(outer_next.clone()));
                }
            }
        }
    }
    Ok(out)
}

fn document_match<T: Tag>(
    inner: &Expr,
    m: Match<T>,
    funcs: &FuncTable<T>,
) -> Result<Vec<Match<T>>, TqlError> {
    let root = match &m.next {
        Some(r) => r.clone(),
        None => {
            return Err(TqlError::new(
                TqlErrorKind::NotADocument,
                "Matching must start from a document root".to_string(),
            ))
        }
    };
    if !root.is_document() {
        return Err(TqlError::new(
            TqlErrorKind::NotADocument,
            "Matching must start from a document root".to_string(),
        ));
    }
    let mut out = Vec::new();
    let candidates = std::iter::once(root.clone()).chain(root.descendants());
    for n in candidates {
        let candidate = m.progress(Some(root.clone()), Some(n), None);
        out.extend(full_match(inner, candidate, funcs)?);
    }
    Ok(out)
}

fn rep_match<T: Tag>(
    inner: &Expr,
    trav_op: TravOp,
    rep_op: RepOp,
    m: Match<T>,
    funcs: &FuncTable<T>,
) -> Result<Vec<Match<T>>, TqlError> {
    let ignore = !has_extractors(inner);
    let m0 = m.subgroup(ignore);
    let mut out = Vec::new();

    if rep_op == RepOp::Star {
        out.push(m0.degroup(ignore));
    }

    let mut seen: HashSet<MatchKey> = HashSet::new();
    seen.insert(m0.key());
    let mut worklist: VecDeque<Match<T>> = VecDeque::new();
    worklist.push_back(m0);

    while let Some(cur) = worklist.pop_front() {
        for sm in full_match(inner, cur.subgroup(ignore), funcs)? {
            let closed = sm.degroup(ignore);
            let key = closed.key();
            if seen.contains(&key) {
                continue;
            }
            out.push(closed.degroup(ignore));
            for n in descend_by_op(&closed.next, trav_op) {
                let pushed = closed.progress(closed.current.clone(), n, None);
                if !seen.contains(&pushed.key()) {
                    worklist.push_back(pushed);
                }
            }
            seen.insert(key);
        }
    }

    Ok(out)
}

#[derive(Debug, Hash, PartialEq, Eq)]
enum ExtKey {
    Leaf(usize, usize),
    Nested(Vec<ExtKey>),
}

fn ext_key<T: Tag>(node: &ExtNode<T>) -> ExtKey {
    match node {
        ExtNode::Leaf(m) => ExtKey::Leaf(m.node.node_id(), m.extractor.id),
        ExtNode::Nested(items) => ExtKey::Nested(items.iter().map(ext_key).collect()),
    }
}

/// Full identity of a [Match], mirroring the reference's `(current, next, trav_side,
/// exts)` equality — used by [rep_match]'s `seen` set, which must tell apart two paths
/// reaching the same node pair with differently accumulated extractions.
#[derive(Debug, Hash, PartialEq, Eq)]
struct MatchKey {
    current: Option<usize>,
    next: Option<usize>,
    trav_side: Option<TravSide>,
    exts: Vec<Vec<ExtKey>>,
}

/// Run `document`'s body starting from `root`, returning the deduplicated set of
/// extraction tuples. Deduplication hashes each tuple's `(node-id, extractor-id)` shape,
/// per §4.4 — two distinct match paths that bind identical extractor leaves collapse.
pub(crate) fn start_match<T: Tag>(
    document: &Expr,
    root: &T,
    funcs: &FuncTable<T>,
) -> Result<Vec<ResultTuple<T>>, TqlError> {
    let initial = Match::new(None, Some(root.clone()));
    let results = full_match(document, initial, funcs)?;

    let mut seen = HashSet::new();
    let mut tuples = Vec::new();
    for m in results {
        let group = m.outer_group();
        let key: Vec<ExtKey> = group.iter().map(ext_key).collect();
        if seen.insert(key) {
            let items = group.iter().map(resolve_node).collect::<Result<Vec<_>, _>>()?;
            tuples.push(ResultTuple(items));
        }
    }
    Ok(tuples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Extractor, ExtractorKind};

    #[derive(Clone)]
    struct MockTag {
        id: usize,
    }

    impl Tag for MockTag {
        fn tag_name(&self) -> Option<&str> {
            Some("x")
        }
        fn is_document(&self) -> bool {
            false
        }
        fn children(&self) -> Vec<Self> {
            Vec::new()
        }
        fn descendants(&self) -> Vec<Self> {
            Vec::new()
        }
        fn next_siblings(&self) -> Vec<Self> {
            Vec::new()
        }
        fn previous_siblings(&self) -> Vec<Self> {
            Vec::new()
        }
        fn parent(&self) -> Option<Self> {
            None
        }
        fn attr(&self, _name: &str) -> Option<&str> {
            None
        }
        fn text(&self) -> &str {
            ""
        }
        fn node_id(&self) -> usize {
            self.id
        }
    }

    #[test]
    fn key_distinguishes_trav_side() {
        let m = Match::new(Some(MockTag { id: 1 }), Some(MockTag { id: 2 }));
        let left = m.side(TravSide::Left);
        let right = m.side(TravSide::Right);
        assert_ne!(left.key(), right.key());
    }

    #[test]
    fn key_distinguishes_accumulated_exts() {
        // Same `current`/`next` node pair, but one path bound an extractor and the other
        // didn't: the reference's `Match` equality treats these as distinct, so a `RepOp`
        // must not let one suppress the other.
        let bare = Match::new(Some(MockTag { id: 1 }), Some(MockTag { id: 2 }));
        let extractor = Rc::new(Extractor {
            id: 0,
            kind: ExtractorKind::Node,
        });
        let with_ext = bare.progress(
            bare.current.clone(),
            bare.next.clone(),
            Some(ExtractorMatch {
                node: MockTag { id: 1 },
                extractor,
            }),
        );
        assert_ne!(bare.key(), with_ext.key());
    }
}
