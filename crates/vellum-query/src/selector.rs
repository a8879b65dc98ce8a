use std::fmt;

use bson::oid::ObjectId;
use bson::{Bson, Document, doc};
use regex::Regex;

use crate::id;
use crate::value;

/// Error raised while compiling a selector document.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorError {
    Invalid(String),
    Unsupported(String),
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorError::Invalid(msg) => write!(f, "invalid selector: {msg}"),
            SelectorError::Unsupported(msg) => write!(f, "unsupported selector: {msg}"),
        }
    }
}

impl std::error::Error for SelectorError {}

/// A query input, before compilation.
///
/// Identifiers, strings and numbers are shorthand for `{ "_id": <v> }`;
/// a document is a predicate over field paths; an existing [`Matcher`]
/// passes through unchanged.
#[derive(Debug, Clone, Default)]
pub enum Selector {
    #[default]
    All,
    Id(String),
    Predicate(Document),
    Compiled(Matcher),
}

impl Selector {
    /// Compile into a reusable matcher.
    pub fn compile(&self) -> Result<Matcher, SelectorError> {
        match self {
            Selector::All => Ok(Matcher { pred: Pred::All }),
            Selector::Id(id) => Ok(Matcher {
                pred: Pred::Field(
                    "_id".to_string(),
                    Cond::Literal(Bson::String(id.clone())),
                ),
            }),
            Selector::Predicate(doc) => compile_selector(doc),
            Selector::Compiled(matcher) => Ok(matcher.clone()),
        }
    }

    /// Document form of the selector, for event payloads.
    ///
    /// A pre-compiled matcher has no document form and renders empty.
    pub fn to_document(&self) -> Document {
        match self {
            Selector::All | Selector::Compiled(_) => Document::new(),
            Selector::Id(id) => doc! { "_id": id.clone() },
            Selector::Predicate(doc) => doc.clone(),
        }
    }
}

impl From<()> for Selector {
    fn from(_: ()) -> Self {
        Selector::All
    }
}

impl From<Document> for Selector {
    fn from(doc: Document) -> Self {
        Selector::Predicate(doc)
    }
}

impl From<&Document> for Selector {
    fn from(doc: &Document) -> Self {
        Selector::Predicate(doc.clone())
    }
}

impl From<ObjectId> for Selector {
    fn from(oid: ObjectId) -> Self {
        Selector::Id(oid.to_hex())
    }
}

impl From<&str> for Selector {
    fn from(id: &str) -> Self {
        Selector::Id(id.to_string())
    }
}

impl From<String> for Selector {
    fn from(id: String) -> Self {
        Selector::Id(id)
    }
}

impl From<i32> for Selector {
    fn from(id: i32) -> Self {
        Selector::Id(id::digit_string(&id.to_string()))
    }
}

impl From<i64> for Selector {
    fn from(id: i64) -> Self {
        Selector::Id(id::digit_string(&id.to_string()))
    }
}

impl From<f64> for Selector {
    fn from(id: f64) -> Self {
        Selector::Id(id::digit_string(&id.to_string()))
    }
}

impl From<Matcher> for Selector {
    fn from(matcher: Matcher) -> Self {
        Selector::Compiled(matcher)
    }
}

/// A compiled selector: a pure predicate over documents.
#[derive(Debug, Clone)]
pub struct Matcher {
    pred: Pred,
}

impl Matcher {
    pub fn matches(&self, doc: &Document) -> bool {
        eval_pred(&self.pred, doc)
    }
}

#[derive(Debug, Clone)]
enum Pred {
    All,
    And(Vec<Pred>),
    Or(Vec<Pred>),
    Nor(Vec<Pred>),
    Field(String, Cond),
}

#[derive(Debug, Clone)]
enum Cond {
    Literal(Bson),
    Regex(Regex),
    Ops(Vec<FieldOp>),
}

#[derive(Debug, Clone)]
enum FieldOp {
    Eq(Bson),
    Ne(Bson),
    Lt(Bson),
    Lte(Bson),
    Gt(Bson),
    Gte(Bson),
    In(Vec<Bson>),
    Nin(Vec<Bson>),
    All(Vec<Bson>),
    Exists(bool),
    Type(TypeSpec),
    Mod(i64, i64),
    Size(i64),
    Regex(Regex),
    ElemMatch(ElementMatcher),
    Not(Box<Cond>),
}

#[derive(Debug, Clone)]
enum TypeSpec {
    Name(String),
    Code(i32),
}

/// A predicate applied to a single array element.
///
/// Operator-only documents (`{ "$gt": 5 }`) test the element value directly;
/// anything else compiles as a selector over document elements.
#[derive(Debug, Clone)]
pub struct ElementMatcher(ElemCond);

#[derive(Debug, Clone)]
enum ElemCond {
    Ops(Vec<FieldOp>),
    Selector(Box<Pred>),
}

impl ElementMatcher {
    pub fn matches(&self, value: &Bson) -> bool {
        match &self.0 {
            ElemCond::Ops(ops) => ops.iter().all(|op| eval_op(op, Some(value))),
            ElemCond::Selector(pred) => {
                matches!(value, Bson::Document(d) if eval_pred(pred, d))
            }
        }
    }
}

/// Compile a predicate document into a [`Matcher`].
///
/// The document is a conjunction of clauses keyed by field path or by a
/// top-level logical operator. An empty document matches every document.
pub fn compile_selector(doc: &Document) -> Result<Matcher, SelectorError> {
    Ok(Matcher {
        pred: compile_pred(doc)?,
    })
}

/// Compile a predicate applied per array element, as used by `$elemMatch`
/// and condition-form `$pull`.
pub fn compile_element_selector(doc: &Document) -> Result<ElementMatcher, SelectorError> {
    if doc.keys().any(|k| k.starts_with('$')) {
        Ok(ElementMatcher(ElemCond::Ops(compile_ops(doc)?)))
    } else {
        Ok(ElementMatcher(ElemCond::Selector(Box::new(compile_pred(
            doc,
        )?))))
    }
}

fn compile_pred(doc: &Document) -> Result<Pred, SelectorError> {
    let mut children = Vec::new();
    for (key, val) in doc.iter() {
        match key.as_str() {
            "$and" => children.push(Pred::And(compile_group(val, "$and")?)),
            "$or" => children.push(Pred::Or(compile_group(val, "$or")?)),
            "$nor" => children.push(Pred::Nor(compile_group(val, "$nor")?)),
            "$where" => {
                return Err(SelectorError::Unsupported("$where is not supported".into()));
            }
            k if k.starts_with('$') => {
                return Err(SelectorError::Invalid(format!(
                    "unknown top-level operator: {k}"
                )));
            }
            _ => children.push(Pred::Field(key.clone(), compile_cond(val)?)),
        }
    }
    match children.len() {
        0 => Ok(Pred::All),
        1 => Ok(children.remove(0)),
        _ => Ok(Pred::And(children)),
    }
}

fn compile_group(val: &Bson, op: &str) -> Result<Vec<Pred>, SelectorError> {
    let items = match val {
        Bson::Array(items) => items,
        _ => {
            return Err(SelectorError::Invalid(format!("{op} requires an array")));
        }
    };
    if items.is_empty() {
        return Err(SelectorError::Invalid(format!(
            "{op} array must not be empty"
        )));
    }
    let mut preds = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Bson::Document(sub) => preds.push(compile_pred(sub)?),
            _ => {
                return Err(SelectorError::Invalid(format!(
                    "{op} array elements must be documents"
                )));
            }
        }
    }
    Ok(preds)
}

fn compile_cond(val: &Bson) -> Result<Cond, SelectorError> {
    match val {
        Bson::RegularExpression(re) => {
            Ok(Cond::Regex(build_regex(re.pattern.as_str(), re.options.as_str())?))
        }
        Bson::Document(sub) if sub.keys().any(|k| k.starts_with('$')) => {
            Ok(Cond::Ops(compile_ops(sub)?))
        }
        other => Ok(Cond::Literal(other.clone())),
    }
}

fn compile_ops(sub: &Document) -> Result<Vec<FieldOp>, SelectorError> {
    let mut ops = Vec::new();
    let mut pattern: Option<String> = None;
    let mut options: Option<String> = None;

    for (key, val) in sub.iter() {
        match key.as_str() {
            "$eq" => ops.push(FieldOp::Eq(val.clone())),
            "$ne" => ops.push(FieldOp::Ne(val.clone())),
            "$lt" => ops.push(FieldOp::Lt(val.clone())),
            "$lte" => ops.push(FieldOp::Lte(val.clone())),
            "$gt" => ops.push(FieldOp::Gt(val.clone())),
            "$gte" => ops.push(FieldOp::Gte(val.clone())),
            "$in" => ops.push(FieldOp::In(expect_array(val, "$in")?)),
            "$nin" => ops.push(FieldOp::Nin(expect_array(val, "$nin")?)),
            "$all" => ops.push(FieldOp::All(expect_array(val, "$all")?)),
            "$exists" => ops.push(FieldOp::Exists(value::to_bool(val))),
            "$type" => ops.push(FieldOp::Type(compile_type(val)?)),
            "$mod" => ops.push(compile_mod(val)?),
            "$size" => match value::as_i64(val) {
                Some(n) => ops.push(FieldOp::Size(n)),
                None => {
                    return Err(SelectorError::Invalid("$size requires a number".into()));
                }
            },
            "$regex" => match val {
                Bson::String(s) => pattern = Some(s.clone()),
                Bson::RegularExpression(re) => {
                    pattern = Some(re.pattern.as_str().to_string());
                    if options.is_none() && !re.options.is_empty() {
                        options = Some(re.options.as_str().to_string());
                    }
                }
                _ => {
                    return Err(SelectorError::Invalid(
                        "$regex requires a string or regular expression".into(),
                    ));
                }
            },
            "$options" => match val {
                Bson::String(s) => options = Some(s.clone()),
                _ => {
                    return Err(SelectorError::Invalid("$options requires a string".into()));
                }
            },
            "$elemMatch" => match val {
                Bson::Document(d) => {
                    ops.push(FieldOp::ElemMatch(compile_element_selector(d)?));
                }
                _ => {
                    return Err(SelectorError::Invalid("$elemMatch requires a document".into()));
                }
            },
            "$not" => ops.push(FieldOp::Not(Box::new(compile_not(val)?))),
            "$where" => {
                return Err(SelectorError::Unsupported("$where is not supported".into()));
            }
            k => {
                return Err(SelectorError::Invalid(format!("unknown field operator: {k}")));
            }
        }
    }

    match pattern {
        Some(p) => ops.push(FieldOp::Regex(build_regex(
            &p,
            options.as_deref().unwrap_or(""),
        )?)),
        None if options.is_some() => {
            return Err(SelectorError::Invalid("$options without $regex".into()));
        }
        None => {}
    }

    Ok(ops)
}

fn compile_not(val: &Bson) -> Result<Cond, SelectorError> {
    match val {
        Bson::Document(sub) if sub.keys().all(|k| k.starts_with('$')) && !sub.is_empty() => {
            Ok(Cond::Ops(compile_ops(sub)?))
        }
        Bson::RegularExpression(re) => {
            Ok(Cond::Regex(build_regex(re.pattern.as_str(), re.options.as_str())?))
        }
        _ => Err(SelectorError::Invalid(
            "$not requires an operator document or regular expression".into(),
        )),
    }
}

fn compile_type(val: &Bson) -> Result<TypeSpec, SelectorError> {
    match val {
        Bson::String(name) => Ok(TypeSpec::Name(name.clone())),
        Bson::Int32(code) => Ok(TypeSpec::Code(*code)),
        Bson::Int64(code) => Ok(TypeSpec::Code(*code as i32)),
        Bson::Double(code) => Ok(TypeSpec::Code(*code as i32)),
        _ => Err(SelectorError::Invalid(
            "$type requires a type name or code".into(),
        )),
    }
}

fn compile_mod(val: &Bson) -> Result<FieldOp, SelectorError> {
    let items = expect_array(val, "$mod")?;
    if items.len() != 2 {
        return Err(SelectorError::Invalid(
            "$mod requires a [divisor, remainder] pair".into(),
        ));
    }
    let divisor = value::as_i64(&items[0])
        .ok_or_else(|| SelectorError::Invalid("$mod divisor must be numeric".into()))?;
    let remainder = value::as_i64(&items[1])
        .ok_or_else(|| SelectorError::Invalid("$mod remainder must be numeric".into()))?;
    if divisor == 0 {
        return Err(SelectorError::Invalid("$mod divisor must not be zero".into()));
    }
    Ok(FieldOp::Mod(divisor, remainder))
}

fn expect_array(val: &Bson, op: &str) -> Result<Vec<Bson>, SelectorError> {
    match val {
        Bson::Array(items) => Ok(items.clone()),
        _ => Err(SelectorError::Invalid(format!("{op} requires an array"))),
    }
}

fn build_regex(pattern: &str, options: &str) -> Result<Regex, SelectorError> {
    let full = if options.is_empty() {
        pattern.to_string()
    } else {
        let mut prefix = String::with_capacity(4 + options.len() + pattern.len());
        prefix.push_str("(?");
        for ch in options.chars() {
            match ch {
                'i' | 's' | 'm' | 'x' => prefix.push(ch),
                c => {
                    return Err(SelectorError::Invalid(format!("unknown regex option: {c}")));
                }
            }
        }
        prefix.push(')');
        prefix.push_str(pattern);
        prefix
    };
    Regex::new(&full).map_err(|e| SelectorError::Invalid(format!("invalid regex pattern: {e}")))
}

// ── Evaluation ──────────────────────────────────────────────────

fn eval_pred(pred: &Pred, doc: &Document) -> bool {
    match pred {
        Pred::All => true,
        Pred::And(children) => children.iter().all(|p| eval_pred(p, doc)),
        Pred::Or(children) => children.iter().any(|p| eval_pred(p, doc)),
        Pred::Nor(children) => !children.iter().any(|p| eval_pred(p, doc)),
        Pred::Field(path, cond) => eval_cond(cond, value::get_path(doc, path)),
    }
}

fn eval_cond(cond: &Cond, resolved: Option<&Bson>) -> bool {
    match cond {
        Cond::Literal(lit) => eval_literal(lit, resolved),
        Cond::Regex(re) => eval_regex(re, resolved),
        Cond::Ops(ops) => ops.iter().all(|op| eval_op(op, resolved)),
    }
}

/// Deep-equal with array-contains semantics: an array field matches when the
/// whole array equals the literal or any element does.
fn eval_literal(lit: &Bson, resolved: Option<&Bson>) -> bool {
    match resolved {
        None => matches!(lit, Bson::Null),
        Some(v) => {
            if value::equals(v, lit) {
                return true;
            }
            match v {
                Bson::Array(items) => items.iter().any(|e| value::equals(e, lit)),
                _ => false,
            }
        }
    }
}

fn eval_regex(re: &Regex, resolved: Option<&Bson>) -> bool {
    match resolved {
        Some(Bson::String(s)) => re.is_match(s),
        Some(Bson::Array(items)) => items
            .iter()
            .any(|e| matches!(e, Bson::String(s) if re.is_match(s))),
        _ => false,
    }
}

fn eval_op(op: &FieldOp, resolved: Option<&Bson>) -> bool {
    match op {
        FieldOp::Eq(v) => eval_literal(v, resolved),
        FieldOp::Ne(v) => !eval_literal(v, resolved),
        FieldOp::Lt(v) => eval_ordering(resolved, v, |o| o == std::cmp::Ordering::Less),
        FieldOp::Lte(v) => eval_ordering(resolved, v, |o| o != std::cmp::Ordering::Greater),
        FieldOp::Gt(v) => eval_ordering(resolved, v, |o| o == std::cmp::Ordering::Greater),
        FieldOp::Gte(v) => eval_ordering(resolved, v, |o| o != std::cmp::Ordering::Less),
        FieldOp::In(vals) => eval_in(vals, resolved),
        FieldOp::Nin(vals) => !eval_in(vals, resolved),
        FieldOp::All(vals) => match resolved {
            Some(Bson::Array(items)) => vals
                .iter()
                .all(|want| items.iter().any(|e| value::equals(e, want))),
            _ => false,
        },
        FieldOp::Exists(want) => resolved.is_some() == *want,
        FieldOp::Type(spec) => resolved.map(|v| type_matches(spec, v)).unwrap_or(false),
        FieldOp::Mod(divisor, remainder) => resolved
            .and_then(value::as_i64)
            .map(|n| n % divisor == *remainder)
            .unwrap_or(false),
        FieldOp::Size(n) => {
            matches!(resolved, Some(Bson::Array(items)) if items.len() as i64 == *n)
        }
        FieldOp::Regex(re) => eval_regex(re, resolved),
        FieldOp::ElemMatch(matcher) => {
            matches!(resolved, Some(Bson::Array(items)) if items.iter().any(|e| matcher.matches(e)))
        }
        FieldOp::Not(inner) => !eval_cond(inner, resolved),
    }
}

fn eval_ordering(
    resolved: Option<&Bson>,
    against: &Bson,
    accept: fn(std::cmp::Ordering) -> bool,
) -> bool {
    match resolved {
        Some(field) => accept(value::compare(field, against)),
        None => false,
    }
}

/// Membership test; an array field matches when any element is listed.
fn eval_in(vals: &[Bson], resolved: Option<&Bson>) -> bool {
    match resolved {
        None => vals.iter().any(|v| matches!(v, Bson::Null)),
        Some(v) => {
            if vals.iter().any(|want| value::equals(v, want)) {
                return true;
            }
            match v {
                Bson::Array(items) => items
                    .iter()
                    .any(|e| vals.iter().any(|want| value::equals(e, want))),
                _ => false,
            }
        }
    }
}

fn type_matches(spec: &TypeSpec, v: &Bson) -> bool {
    match spec {
        TypeSpec::Name(name) => match name.as_str() {
            "bool" => value::type_name(v) == "boolean",
            "objectId" | "oid" => value::type_name(v) == "objectid",
            other => value::type_name(v) == other,
        },
        TypeSpec::Code(code) => value::type_code(v) == *code,
    }
}
