use std::borrow::Cow;
use std::io;
use std::rc::Rc;

use ptree::{Style, TreeItem};

use crate::ast::{Expr, ExprKind, FilterExpr, TagExpr};

/// A thin, owned view over an [Expr] node used only for [ptree] rendering.
#[derive(Clone)]
pub(crate) struct PNode {
    label: String,
    children: Vec<PNode>,
}

fn tag_label(tag: &TagExpr) -> String {
    match tag {
        TagExpr::Name(Some(n)) => n.clone(),
        TagExpr::Name(None) => "@".to_string(),
        TagExpr::Class(c) => format!(".{}", c),
        TagExpr::Id(i) => format!("#{}", i),
        TagExpr::Not(inner) => format!("!{}", tag_label(inner)),
        TagExpr::Both(left, right) => format!("{}{}", tag_label(left), tag_label(right)),
    }
}

fn filter_label(filter: &FilterExpr) -> String {
    match filter {
        FilterExpr::Extractor(ext) => format!("{:?}", ext.kind),
        FilterExpr::LiteralStr(s) => format!("{:?}", s),
        FilterExpr::LiteralInt(n) => n.to_string(),
        FilterExpr::Func(name) => format!("${}", name),
        FilterExpr::Op(op, left, right) => {
            format!("({} {:?} {})", filter_label(left), op, filter_label(right))
        }
    }
}

impl PNode {
    pub fn build(expr: &Rc<Expr>) -> Self {
        match &expr.kind {
            ExprKind::Tag(tag) => PNode {
                label: tag_label(tag),
                children: Vec::new(),
            },
            ExprKind::Extractors(inner, list) => {
                let kinds: Vec<String> = list.iter().map(|e| format!("{:?}", e.kind)).collect();
                PNode {
                    label: format!("[{}]", kinds.join(", ")),
                    children: vec![PNode::build(inner)],
                }
            }
            ExprKind::Filter(inner, filter) => PNode {
                label: format!("~({})", filter_label(filter)),
                children: vec![PNode::build(inner)],
            },
            ExprKind::Trav(op, left, right) => PNode {
                label: format!("{:?}", op),
                children: vec![PNode::build(left), PNode::build(right)],
            },
            ExprKind::Rep(inner, trav_op, rep_op) => PNode {
                label: format!("{:?} {:?}", trav_op, rep_op),
                children: vec![PNode::build(inner)],
            },
            ExprKind::Mon(inner) => PNode {
                label: "?".to_string(),
                children: vec![PNode::build(inner)],
            },
            ExprKind::Bin(left, right) => PNode {
                label: "|".to_string(),
                children: vec![PNode::build(left), PNode::build(right)],
            },
            ExprKind::ModeSwitch(tag, inner) => PNode {
                label: "mode-switch".to_string(),
                children: vec![PNode::build(tag), PNode::build(inner)],
            },
            ExprKind::End => PNode {
                label: "end".to_string(),
                children: Vec::new(),
            },
            ExprKind::Document(inner) => PNode {
                label: "document".to_string(),
                children: vec![PNode::build(inner)],
            },
        }
    }
}

impl TreeItem for PNode {
    type Child = PNode;

    fn write_self<W: io::Write>(&self, f: &mut W, style: &Style) -> io::Result<()> {
        write!(f, "{}", style.paint(&self.label))
    }

    fn children(&self) -> Cow<[Self::Child]> {
        Cow::from(&self.children)
    }
}
