use std::collections::HashMap;

use crate::ast::{ExtractorKind, FilterExpr, FilterOp};
use crate::error::{TqlError, TqlErrorKind};
use crate::tag::Tag;

/// The value produced by resolving an `[...]` extractor against a matched tag.
#[derive(Debug, Clone)]
pub enum ExtractedValue<T> {
    Node(T),
    Text(String),
    /// The value of an attribute. Per the language's own override, a missing attribute
    /// extracts as an empty string rather than a null/optional value.
    Attr(String),
}

pub(crate) fn extract<T: Tag>(kind: &ExtractorKind, tag: &T) -> Result<ExtractedValue<T>, TqlError> {
    match kind {
        ExtractorKind::Node => Ok(ExtractedValue::Node(tag.clone())),
        ExtractorKind::Text => Ok(ExtractedValue::Text(tag.text().to_string())),
        ExtractorKind::Attr(name) => Ok(ExtractedValue::Attr(tag.attr(name).unwrap_or("").to_string())),
        ExtractorKind::Named(name) => Err(TqlError::new(
            TqlErrorKind::InvalidExtractor,
            format!("Unknown extractor `{}`", name),
        )),
    }
}

/// A host-supplied predicate usable from a `$name` filter atom.
pub type FilterFunc<T> = dyn Fn(&T) -> bool;

/// The set of named predicates available to `$name` filter atoms during a match.
pub type FuncTable<'f, T> = HashMap<&'f str, Box<FilterFunc<T>>>;

#[derive(Debug, Clone, PartialEq)]
enum FilterValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl FilterValue {
    fn truthy(&self) -> bool {
        match self {
            FilterValue::Str(s) => !s.is_empty(),
            FilterValue::Int(n) => *n != 0,
            FilterValue::Bool(b) => *b,
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            FilterValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Evaluate a filter expression against `tag`, returning whether it holds.
pub(crate) fn eval_filter<T: Tag>(
    filter: &FilterExpr,
    tag: &T,
    funcs: &FuncTable<T>,
) -> Result<bool, TqlError> {
    Ok(eval(filter, tag, funcs)?.truthy())
}

fn eval<T: Tag>(filter: &FilterExpr, tag: &T, funcs: &FuncTable<T>) -> Result<FilterValue, TqlError> {
    match filter {
        FilterExpr::Extractor(ext) => Ok(match extract(&ext.kind, tag)? {
            ExtractedValue::Node(_) => FilterValue::Bool(true),
            ExtractedValue::Text(s) => FilterValue::Str(s),
            ExtractedValue::Attr(s) => FilterValue::Str(s),
        }),
        FilterExpr::LiteralStr(s) => Ok(FilterValue::Str(s.clone())),
        FilterExpr::LiteralInt(n) => Ok(FilterValue::Int(*n)),
        FilterExpr::Func(name) => match funcs.get(name.as_str()) {
            Some(f) => Ok(FilterValue::Bool(f(tag))),
            None => Err(TqlError::new(
                TqlErrorKind::UnknownFunc,
                format!("No filter function registered for `${}`", name),
            )),
        },
        FilterExpr::Op(FilterOp::And, left, right) => {
            let l = eval(left, tag, funcs)?;
            if !l.truthy() {
                return Ok(FilterValue::Bool(false));
            }
            Ok(FilterValue::Bool(eval(right, tag, funcs)?.truthy()))
        }
        FilterExpr::Op(FilterOp::Or, left, right) => {
            let l = eval(left, tag, funcs)?;
            if l.truthy() {
                return Ok(FilterValue::Bool(true));
            }
            Ok(FilterValue::Bool(eval(right, tag, funcs)?.truthy()))
        }
        FilterExpr::Op(FilterOp::Eq, left, right) => {
            let l = eval(left, tag, funcs)?;
            let r = eval(right, tag, funcs)?;
            Ok(FilterValue::Bool(l == r))
        }
        FilterExpr::Op(FilterOp::Ne, left, right) => {
            let l = eval(left, tag, funcs)?;
            let r = eval(right, tag, funcs)?;
            Ok(FilterValue::Bool(l != r))
        }
        FilterExpr::Op(op @ (FilterOp::RegexMatch | FilterOp::RegexNotMatch), left, right) => {
            let l = eval(left, tag, funcs)?;
            let r = eval(right, tag, funcs)?;
            let (subject, pattern) = match (l.as_str(), r.as_str()) {
                (Some(s), Some(p)) => (s, p),
                _ => {
                    return Err(TqlError::new(
                        TqlErrorKind::RegexType,
                        "Both operands of `~~`/`!~` must evaluate to a string".to_string(),
                    ))
                }
            };
            let re = regex::Regex::new(pattern).map_err(|e| {
                TqlError::new(TqlErrorKind::RegexType, format!("Invalid regular expression: {}", e))
            })?;
            let matched = re.is_match(subject);
            Ok(FilterValue::Bool(if *op == FilterOp::RegexMatch {
                matched
            } else {
                !matched
            }))
        }
    }
}
