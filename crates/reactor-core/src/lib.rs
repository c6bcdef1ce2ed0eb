//! Structural equality primitives.
//!
//! [`Value`] is a small dynamic-value tree (the kind a reactive core needs when it wants
//! one universal notion of "equal enough to skip a notification" across heterogeneous
//! payloads) together with [`deep_equal`] and [`shallow_equal`], the two entry points a
//! signal's default change predicate can delegate to.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// A dynamic value tree. Ordered maps/records use `Vec<(K, V)>` rather than a hash map so
/// that insertion order is preserved for callers that care about it (e.g. debug output);
/// equality never depends on that order.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Set(Vec<Value>),
    Regex { pattern: String, flags: String, last_index: usize },
    /// A generic record: equal iff same set of own keys and each value is equal.
    Record(Vec<(String, Value)>),
}

/// How two primitive (non-recursive) values are compared once structural recursion has
/// bottomed out.
#[derive(Clone)]
pub enum PrimitiveComparator {
    /// Exact identity; `NaN` is treated as equal to `NaN`.
    Strict,
    /// Coercion-aware comparison between numbers/bools/strings; `NaN` is equal to `NaN`.
    Loose,
    /// Caller-supplied comparator for full control.
    Custom(Rc<dyn Fn(&Value, &Value) -> bool>),
}

impl std::fmt::Debug for PrimitiveComparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => write!(f, "Strict"),
            Self::Loose => write!(f, "Loose"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl PrimitiveComparator {
    fn eq(&self, a: &Value, b: &Value) -> bool {
        match self {
            Self::Strict => strict_eq(a, b),
            Self::Loose => loose_eq(a, b),
            Self::Custom(f) => f(a, b),
        }
    }
}

fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Bytes(x), Value::Bytes(y)) => x == y,
        // Compound values have no principled "primitive" comparison; once recursion has
        // bottomed out (depth limit reached) they're only equal if literally the same value.
        _ => std::ptr::eq(a, b),
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    if strict_eq(a, b) {
        return true;
    }
    let as_f64 = |v: &Value| -> Option<f64> {
        match v {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Str(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    };
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y || (x.is_nan() && y.is_nan()),
        _ => false,
    }
}

/// Options controlling a [`deep_equal`] call.
#[derive(Clone)]
pub struct DeepEqualOptions {
    /// Recursion depth at which comparison falls back to the primitive comparator.
    /// `None` means unbounded.
    pub max_depth: Option<usize>,
    pub primitive: PrimitiveComparator,
}

impl Default for DeepEqualOptions {
    fn default() -> Self {
        Self { max_depth: None, primitive: PrimitiveComparator::Strict }
    }
}

/// Shallow structural equality: compares one level and delegates leaves to the primitive
/// comparator (arrays/maps/sets/records still compare their *immediate* elements
/// primitively rather than recursing further).
pub fn shallow_equal(a: &Value, b: &Value, primitive: &PrimitiveComparator) -> bool {
    let opts = DeepEqualOptions { max_depth: Some(1), primitive: primitive.clone() };
    deep_equal(a, b, &opts)
}

/// Deep structural equality per the per-type rules documented on [`Value`], with a
/// cycle-safe comparison cache and a configurable depth limit.
pub fn deep_equal(a: &Value, b: &Value, opts: &DeepEqualOptions) -> bool {
    let cache: RefCell<Vec<(*const Value, HashSet<*const Value>)>> = RefCell::new(Vec::new());
    eq_inner(a, b, opts, 0, &cache)
}

fn eq_inner(
    a: &Value,
    b: &Value,
    opts: &DeepEqualOptions,
    depth: usize,
    cache: &RefCell<Vec<(*const Value, HashSet<*const Value>)>>,
) -> bool {
    // Same-identity fast path.
    if std::ptr::eq(a, b) {
        return true;
    }

    // Variant mismatches are handled per-pair below: compound shapes (array vs map, say)
    // fall through to the primitive comparator and compare unequal there, while leaf
    // variants are left to reach it too — the `Loose` comparator deliberately coerces across
    // e.g. `Str` and `Int`, so a blanket discriminant check here would pre-empt that.
    if let Some(max) = opts.max_depth {
        if depth >= max {
            return opts.primitive.eq(a, b);
        }
    }

    match (a, b) {
        (Value::Array(xs), Value::Array(ys)) => {
            if xs.len() != ys.len() {
                return false;
            }
            with_cycle_guard(a, b, cache, || {
                xs.iter().zip(ys.iter()).all(|(x, y)| eq_inner(x, y, opts, depth + 1, cache))
            })
        }
        (Value::Map(xs), Value::Map(ys)) => {
            if xs.len() != ys.len() {
                return false;
            }
            with_cycle_guard(a, b, cache, || {
                xs.iter().all(|(k, v)| {
                    ys.iter()
                        .find(|(k2, _)| eq_inner(k, k2, opts, depth + 1, cache))
                        .is_some_and(|(_, v2)| eq_inner(v, v2, opts, depth + 1, cache))
                })
            })
        }
        (Value::Set(xs), Value::Set(ys)) => {
            if xs.len() != ys.len() {
                return false;
            }
            // Membership test only — no recursive element comparison beyond primitive
            // equality, per spec: a deliberate choice, not an oversight.
            xs.iter().all(|x| ys.iter().any(|y| opts.primitive.eq(x, y)))
        }
        (
            Value::Regex { pattern: p1, flags: f1, last_index: i1 },
            Value::Regex { pattern: p2, flags: f2, last_index: i2 },
        ) => p1 == p2 && f1 == f2 && i1 == i2,
        (Value::Record(xs), Value::Record(ys)) => {
            if xs.len() != ys.len() {
                return false;
            }
            with_cycle_guard(a, b, cache, || {
                xs.iter().all(|(k, v)| {
                    ys.iter()
                        .find(|(k2, _)| k == k2)
                        .is_some_and(|(_, v2)| eq_inner(v, v2, opts, depth + 1, cache))
                })
            })
        }
        _ => opts.primitive.eq(a, b),
    }
}

/// Runs `f`, short-circuiting to `false` if `(a, b)` is already an in-progress comparison
/// pair reachable from the top of the recursion (conservative, deterministic cycle
/// handling per spec).
fn with_cycle_guard(
    a: &Value,
    b: &Value,
    cache: &RefCell<Vec<(*const Value, HashSet<*const Value>)>>,
    f: impl FnOnce() -> bool,
) -> bool {
    let a_ptr = a as *const Value;
    let b_ptr = b as *const Value;

    {
        let entries = cache.borrow();
        if let Some((_, rights)) = entries.iter().find(|(left, _)| *left == a_ptr) {
            if rights.contains(&b_ptr) {
                return false;
            }
        }
    }

    {
        let mut entries = cache.borrow_mut();
        match entries.iter_mut().find(|(left, _)| *left == a_ptr) {
            Some((_, rights)) => {
                rights.insert(b_ptr);
            }
            None => {
                let mut rights = HashSet::new();
                rights.insert(b_ptr);
                entries.push((a_ptr, rights));
            }
        }
    }

    f()
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        deep_equal(self, other, &DeepEqualOptions::default())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}
