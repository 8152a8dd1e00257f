//! A small query language for traversing and extracting data from parsed HTML-like tag
//! trees.
//!
//! A query such as `div.card > a[txt, .href]` is [compile]d once into a [CompiledExpr],
//! then matched against any number of tag trees that implement [Tag] via
//! [CompiledExpr::match_]. Matching never mutates the tree; it enumerates every way the
//! query can apply and returns the deduplicated set of extracted [ResultTuple]s.

mod ast;
mod error;
mod field_tree;
mod lexer;
mod matcher;
mod parser;
mod pprint;
mod tag;
mod util;
mod validate;
mod value;

use std::rc::Rc;

pub use ast::Mode;
pub use error::{TqlError, TqlErrorKind, TqlResult};
pub use lexer::decode_string;
pub use matcher::{ResultItem, ResultTuple};
pub use tag::Tag;
pub use value::{ExtractedValue, FuncTable};

use ast::Expr;
use util::Code;

/// Compile a TQL expression, lexing, parsing and validating it. The returned
/// [CompiledExpr] can be matched against any number of tag trees.
pub fn compile(expr: &str) -> TqlResult<CompiledExpr> {
    let code = Code::from(expr);
    let document = parser::Parser::parse(&code)?;
    validate::validate(&document, Mode::Depth)?;
    Ok(CompiledExpr { document })
}

/// A validated query, ready to be matched against one or more tag trees.
pub struct CompiledExpr {
    document: Rc<Expr>,
}

impl CompiledExpr {
    /// Match this query against `root`, a document node, using `funcs` to resolve any
    /// `$name` filter atoms the query references.
    pub fn match_<T: Tag>(&self, root: &T, funcs: &FuncTable<T>) -> TqlResult<Vec<ResultTuple<T>>> {
        matcher::start_match(&self.document, root, funcs)
    }

    /// Render the parsed query tree as an indented, human-readable string.
    pub fn pprint(&self) -> String {
        let node = pprint::PNode::build(&self.document);
        let mut buf = Vec::new();
        ptree::write_tree(&node, &mut buf).expect("writing to an in-memory buffer cannot fail");
        String::from_utf8_lossy(&buf).into_owned()
    }
}


/// A second, fuller mock tree, with real parent/sibling links, used for end-to-end
/// matcher coverage the flat [tests::Node] can't reach (it always reports no parent and
/// no siblings, so it can only exercise pure-depth, no-anchor queries).
#[cfg(test)]
mod end_to_end {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Weak;

    #[derive(Debug)]
    struct RData {
        name: Option<&'static str>,
        is_document: bool,
        attrs: Vec<(&'static str, &'static str)>,
        text: String,
        children: Vec<RNode>,
        parent: RefCell<Weak<RData>>,
        id: usize,
    }

    #[derive(Clone, Debug)]
    struct RNode(Rc<RData>);

    fn leaf(id: usize, name: &'static str, attrs: Vec<(&'static str, &'static str)>, text: &'static str) -> RNode {
        RNode(Rc::new(RData {
            name: Some(name),
            is_document: false,
            attrs,
            text: text.to_string(),
            children: Vec::new(),
            parent: RefCell::new(Weak::new()),
            id,
        }))
    }

    /// An element with children; its own text is the concatenation of its children's
    /// (already-recursive) text, matching a host tree's usual recursive text accessor.
    fn branch(id: usize, name: &'static str, attrs: Vec<(&'static str, &'static str)>, children: Vec<RNode>) -> RNode {
        let text: String = children.iter().map(|c| c.0.text.clone()).collect();
        let node = RNode(Rc::new(RData {
            name: Some(name),
            is_document: false,
            attrs,
            text,
            children: children.clone(),
            parent: RefCell::new(Weak::new()),
            id,
        }));
        for c in &children {
            *c.0.parent.borrow_mut() = Rc::downgrade(&node.0);
        }
        node
    }

    fn root(id: usize, children: Vec<RNode>) -> RNode {
        let text: String = children.iter().map(|c| c.0.text.clone()).collect();
        let node = RNode(Rc::new(RData {
            name: None,
            is_document: true,
            attrs: Vec::new(),
            text,
            children: children.clone(),
            parent: RefCell::new(Weak::new()),
            id,
        }));
        for c in &children {
            *c.0.parent.borrow_mut() = Rc::downgrade(&node.0);
        }
        node
    }

    impl Tag for RNode {
        fn tag_name(&self) -> Option<&str> {
            self.0.name
        }
        fn is_document(&self) -> bool {
            self.0.is_document
        }
        fn children(&self) -> Vec<Self> {
            self.0.children.clone()
        }
        fn descendants(&self) -> Vec<Self> {
            let mut out = Vec::new();
            let mut stack: Vec<RNode> = self.0.children.iter().rev().cloned().collect();
            while let Some(n) = stack.pop() {
                let kids: Vec<RNode> = n.0.children.iter().rev().cloned().collect();
                out.push(n);
                stack.extend(kids);
            }
            out
        }
        fn next_siblings(&self) -> Vec<Self> {
            match self.parent() {
                None => Vec::new(),
                Some(p) => {
                    let siblings = &p.0.children;
                    let idx = siblings.iter().position(|s| s.0.id == self.0.id).unwrap();
                    siblings[idx + 1..].to_vec()
                }
            }
        }
        fn previous_siblings(&self) -> Vec<Self> {
            match self.parent() {
                None => Vec::new(),
                Some(p) => {
                    let siblings = &p.0.children;
                    let idx = siblings.iter().position(|s| s.0.id == self.0.id).unwrap();
                    siblings[..idx].iter().rev().cloned().collect()
                }
            }
        }
        fn parent(&self) -> Option<Self> {
            self.0.parent.borrow().upgrade().map(RNode)
        }
        fn attr(&self, name: &str) -> Option<&str> {
            self.0
                .attrs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| *v)
        }
        fn text(&self) -> &str {
            &self.0.text
        }
        fn node_id(&self) -> usize {
            self.0.id
        }
    }

    fn node_ids(results: &[ResultTuple<RNode>]) -> Vec<usize> {
        results
            .iter()
            .map(|t| match &t.0[0] {
                ResultItem::Node(n) => n.node_id(),
                _ => panic!("expected a Node result"),
            })
            .collect()
    }

    /// `html(head(title), body(p.a))`, the small page used by several of these tests.
    fn page() -> RNode {
        let title = leaf(3, "title", Vec::new(), "Page Title");
        let head = branch(2, "head", Vec::new(), vec![title]);
        let p = leaf(5, "p", vec![("class", "a")], "My first paragraph.");
        let body = branch(4, "body", Vec::new(), vec![p]);
        let html = branch(1, "html", Vec::new(), vec![head, body]);
        root(0, vec![html])
    }

    #[test]
    fn bare_name_finds_the_title_anywhere_under_the_document() {
        let doc = page();
        let compiled = compile("title[node]").unwrap();
        let funcs: FuncTable<RNode> = HashMap::new();
        let results = compiled.match_(&doc, &funcs).unwrap();
        assert_eq!(node_ids(&results), vec![3]);
    }

    #[test]
    fn child_operator_finds_the_paragraph_directly_under_body() {
        let doc = page();
        let compiled = compile("body > p[node]").unwrap();
        let funcs: FuncTable<RNode> = HashMap::new();
        let results = compiled.match_(&doc, &funcs).unwrap();
        assert_eq!(node_ids(&results), vec![5]);
    }

    #[test]
    fn wildcard_child_of_head_is_the_title() {
        let doc = page();
        let compiled = compile("head > @[node]").unwrap();
        let funcs: FuncTable<RNode> = HashMap::new();
        let results = compiled.match_(&doc, &funcs).unwrap();
        assert_eq!(node_ids(&results), vec![3]);
    }

    #[test]
    fn filter_conjunction_picks_the_one_tag_with_both_attributes() {
        let li1 = leaf(12, "li", vec![("data-x", "1")], "one");
        let li2 = leaf(13, "li", vec![("data-y", "2")], "two");
        let li3 = leaf(14, "li", vec![("data-x", "1"), ("data-y", "2")], "three");
        let li4 = leaf(15, "li", Vec::new(), "four");
        let ul = branch(11, "ul", Vec::new(), vec![li1, li2, li3, li4]);
        let doc = root(10, vec![ul]);

        let compiled = compile("@~(.data-x && .data-y)[node]").unwrap();
        let funcs: FuncTable<RNode> = HashMap::new();
        let results = compiled.match_(&doc, &funcs).unwrap();
        assert_eq!(node_ids(&results), vec![14]);
    }

    #[test]
    fn bare_name_filter_extractor_compiles() {
        // The grammar accepts any identifier as a filter extractor reference; only
        // `node`/`txt` actually resolve to a value. A bare name that isn't one of those
        // must still compile — it is rejected only if the matcher ever evaluates it.
        assert!(compile("div~(.a == '2' && .b == '5' || c != 'e')").is_ok());
    }

    #[test]
    fn bare_name_filter_extractor_errors_only_when_evaluated() {
        let li = leaf(16, "li", vec![("a", "x")], "");
        let doc = root(10, vec![li]);

        // Short-circuited by `||` on a matching left operand: `c` is never evaluated.
        let compiled = compile("li~(.a == 'x' || c != 'e')[node]").unwrap();
        let funcs: FuncTable<RNode> = HashMap::new();
        let results = compiled.match_(&doc, &funcs).unwrap();
        assert_eq!(node_ids(&results), vec![16]);

        // Forced to evaluate `c`: now it errors.
        let compiled = compile("li~(.a == 'y' || c != 'e')[node]").unwrap();
        let err = compiled.match_(&doc, &funcs).unwrap_err();
        assert_eq!(err.kind(), TqlErrorKind::InvalidExtractor);
    }

    #[test]
    fn regex_filter_combined_with_dollar_anchor_picks_only_leaf_tags() {
        // `$` on the right of `>` just requires an exhausted `next`, so this also
        // excludes the container itself even though its concatenated text also
        // contains a digit pair: the container always steps `next` into a child.
        let a = leaf(22, "span", Vec::new(), "id12");
        let b = leaf(23, "span", Vec::new(), "count45");
        let c = leaf(24, "span", Vec::new(), "val99");
        let d = leaf(25, "span", Vec::new(), "name");
        let e = leaf(26, "span", Vec::new(), "x1 y2");
        let f = leaf(27, "span", Vec::new(), "v3");
        let container = branch(21, "div", Vec::new(), vec![a, b, c, d, e, f]);
        let doc = root(20, vec![container]);

        let compiled = compile("@~(txt ~~ '\\d\\d')[node] > $").unwrap();
        let funcs: FuncTable<RNode> = HashMap::new();
        let results = compiled.match_(&doc, &funcs).unwrap();
        let mut ids = node_ids(&results);
        ids.sort_unstable();
        assert_eq!(ids, vec![22, 23, 24]);
    }

    #[test]
    fn following_sibling_breadth_step_reaches_a_later_item() {
        let one = leaf(31, "li", Vec::new(), "one");
        let two = leaf(32, "li", Vec::new(), "two");
        let three = leaf(33, "li", Vec::new(), "three");
        let ul = branch(30, "ul", Vec::new(), vec![one, two, three]);
        let doc = root(29, vec![ul]);

        // breadth mode: `{ ... }` flips the ambient mode, so inside it a bare `:`
        // steps to the immediate next sibling. Each starting `li` that has a following
        // `li` sibling captures that sibling, so `one` yields `two` and `two` yields
        // `three`; `three` has no following sibling and contributes nothing.
        let compiled = compile("ul{li : li[node]}").unwrap();
        let funcs: FuncTable<RNode> = HashMap::new();
        let results = compiled.match_(&doc, &funcs).unwrap();
        assert_eq!(node_ids(&results), vec![32, 33]);
    }

    #[test]
    fn nested_mode_switch_breadth_anchors_child_expr_on_switch_node() {
        // `root{ i : {@[node]} }`: the inner `{@[node]}` is itself breadth-outer (it sits
        // one flip inside the outer switch's body), so its wildcard `@` re-matches the
        // node `i :` stepped onto, and `@[node]`'s own `>` (implicit via depth mode) then
        // descends from there. The capture must be that node itself, not one of its
        // children — anchoring one level too deep would instead capture `child_a`/`child_b`.
        let child_a = leaf(51, "a", Vec::new(), "");
        let child_b = leaf(52, "b", Vec::new(), "");
        let target = branch(50, "target", Vec::new(), vec![child_a, child_b]);
        let i = leaf(2, "i", Vec::new(), "");
        let container = branch(1, "root", Vec::new(), vec![i, target]);
        let doc = root(0, vec![container]);

        let compiled = compile("root{i : {@[node]}}").unwrap();
        let funcs: FuncTable<RNode> = HashMap::new();
        let results = compiled.match_(&doc, &funcs).unwrap();
        assert_eq!(node_ids(&results), vec![50]);
    }
}
