use crate::ast::{Expr, ExprKind, FilterExpr, Mode, TagExpr};
use crate::error::{TqlError, TqlErrorKind};

/// Walk the parsed tree once, assigning a [Mode] to every node and rejecting any
/// structural shape the language disallows: a traversal operator used under the wrong
/// mode, and a `BothTag` conjunction that pairs two names or two ids. Filter extractors
/// are deliberately not checked here — see [validate_filter].
pub(crate) fn validate(root: &Expr, mode: Mode) -> Result<(), TqlError> {
    match &root.kind {
        ExprKind::Document(inner) => validate(inner, mode)?,
        ExprKind::Tag(tag) => validate_tag_shape(tag)?,
        ExprKind::Extractors(inner, _list) => validate(inner, mode)?,
        ExprKind::Filter(inner, filter) => {
            validate(inner, mode)?;
            validate_filter(filter)?;
        }
        ExprKind::Trav(op, left, right) => {
            let required = op.mode();
            if required != mode {
                return Err(TqlError::new(
                    TqlErrorKind::ModeMismatch,
                    format!(
                        "Traversal operator {:?} requires {:?} mode but was used in {:?} mode",
                        op, required, mode
                    ),
                ));
            }
            validate(left, mode)?;
            validate(right, mode)?;
        }
        ExprKind::Rep(inner, trav_op, _rep_op) => {
            let required = trav_op.mode();
            if required != mode {
                return Err(TqlError::new(
                    TqlErrorKind::ModeMismatch,
                    format!(
                        "Repetition operator {:?} requires {:?} mode but was used in {:?} mode",
                        trav_op, required, mode
                    ),
                ));
            }
            validate(inner, mode)?;
        }
        ExprKind::Mon(inner) => validate(inner, mode)?,
        ExprKind::Bin(left, right) => {
            validate(left, mode)?;
            validate(right, mode)?;
        }
        ExprKind::ModeSwitch(tag_expr, child_expr) => {
            let flipped = match mode {
                Mode::Depth => Mode::Breadth,
                Mode::Breadth => Mode::Depth,
            };
            validate(tag_expr, mode)?;
            validate(child_expr, flipped)?;
        }
        ExprKind::End => {}
    }
    root.mode.set(Some(mode));
    Ok(())
}

/// True if any conjunct of `tag` is an `#id`, used to catch two ids joined across a
/// longer conjunction chain (`.a#c#d`), not just an immediate `Both(Id, Id)` pair.
/// A `!tag` never carries an id, even if `tag` itself does — negation erases the
/// shape property, it doesn't merely invert the predicate.
fn contains_id(tag: &TagExpr) -> bool {
    match tag {
        TagExpr::Id(_) => true,
        TagExpr::Both(left, right) => contains_id(left) || contains_id(right),
        TagExpr::Not(_) => false,
        TagExpr::Name(_) | TagExpr::Class(_) => false,
    }
}

/// True if any conjunct of `tag` is a bare name, used to reject a name appearing
/// anywhere on the right of a conjunction (`div(!.a span)`), not just a literal
/// `Both(_, Name)` pair. Same `!tag` erasure as [contains_id].
fn contains_name(tag: &TagExpr) -> bool {
    match tag {
        TagExpr::Name(Some(_)) => true,
        TagExpr::Both(left, right) => contains_name(left) || contains_name(right),
        TagExpr::Not(_) => false,
        TagExpr::Name(None) | TagExpr::Class(_) | TagExpr::Id(_) => false,
    }
}

fn validate_tag_shape(tag: &TagExpr) -> Result<(), TqlError> {
    match tag {
        TagExpr::Name(_) | TagExpr::Class(_) | TagExpr::Id(_) => Ok(()),
        TagExpr::Not(inner) => validate_tag_shape(inner),
        TagExpr::Both(left, right) => {
            validate_tag_shape(left)?;
            validate_tag_shape(right)?;
            if contains_name(right) {
                return Err(TqlError::new(
                    TqlErrorKind::TagShape,
                    "A tag name may only appear at the start of a conjunction".to_string(),
                ));
            }
            if contains_id(left) && contains_id(right) {
                return Err(TqlError::new(
                    TqlErrorKind::TagShape,
                    "A tag may not be conjoined with two ids".to_string(),
                ));
            }
            Ok(())
        }
    }
}

fn validate_filter(filter: &FilterExpr) -> Result<(), TqlError> {
    match filter {
        // A filter extractor is never validated against its kind here, matching the
        // reference (`Filter.validate` only recurses into `self.expr`, never the filter
        // subtree): a bare name other than `node`/`txt` compiles fine and is rejected
        // only if the matcher actually evaluates it (see `extract` in `src/value.rs`).
        FilterExpr::Extractor(_) => Ok(()),
        FilterExpr::LiteralStr(_) | FilterExpr::LiteralInt(_) | FilterExpr::Func(_) => Ok(()),
        FilterExpr::Op(_, left, right) => {
            validate_filter(left)?;
            validate_filter(right)
        }
    }
}
