//! Function maps: builtin and caller-supplied template functions

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use super::value::{display, escape_html, is_truthy, kind};

/// Error returned by a template function
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{0}")]
pub struct FuncError(pub String);

impl FuncError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A callable template function
pub type Function = Arc<dyn Fn(&[Value]) -> Result<Value, FuncError> + Send + Sync>;

/// Named functions made visible to templates at parse time
#[derive(Clone, Default)]
pub struct FuncMap {
    funcs: HashMap<String, Function>,
}

impl fmt::Debug for FuncMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("FuncMap").field("funcs", &names).finish()
    }
}

impl FuncMap {
    /// Create an empty function map
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function, replacing any previous one with the same name
    pub fn insert<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, FuncError> + Send + Sync + 'static,
    {
        self.funcs.insert(name.into(), Arc::new(f));
    }

    /// Builder form of [`FuncMap::insert`]
    pub fn with<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, FuncError> + Send + Sync + 'static,
    {
        self.insert(name, f);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.funcs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.funcs.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    /// Copy every function of `other` into this map; `other` wins on conflicts
    pub fn extend(&mut self, other: &FuncMap) {
        for (name, f) in &other.funcs {
            self.funcs.insert(name.clone(), Arc::clone(f));
        }
    }
}

/// The functions every template set starts with
pub fn builtins() -> FuncMap {
    FuncMap::new()
        .with("and", |args| {
            let last = args
                .last()
                .ok_or_else(|| FuncError::new("and: wrong number of args: want at least 1"))?;
            Ok(args.iter().find(|v| !is_truthy(v)).unwrap_or(last).clone())
        })
        .with("or", |args| {
            let last = args
                .last()
                .ok_or_else(|| FuncError::new("or: wrong number of args: want at least 1"))?;
            Ok(args.iter().find(|v| is_truthy(v)).unwrap_or(last).clone())
        })
        .with("not", |args| {
            let [v] = args else {
                return Err(arity("not", 1, args.len()));
            };
            Ok(Value::Bool(!is_truthy(v)))
        })
        .with("len", |args| {
            let [v] = args else {
                return Err(arity("len", 1, args.len()));
            };
            let n = match v {
                Value::String(s) => s.len(),
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                other => {
                    return Err(FuncError::new(format!(
                        "len of type {}",
                        kind(other)
                    )))
                }
            };
            Ok(Value::from(n))
        })
        .with("index", |args| {
            let (first, keys) = args
                .split_first()
                .ok_or_else(|| FuncError::new("index: wrong number of args: want at least 1"))?;
            keys.iter().try_fold(first.clone(), |item, key| index(&item, key))
        })
        .with("eq", |args| {
            let (first, rest) = match args {
                [first, rest @ ..] if !rest.is_empty() => (first, rest),
                _ => return Err(FuncError::new("eq: missing argument for comparison")),
            };
            Ok(Value::Bool(rest.iter().any(|v| values_equal(first, v))))
        })
        .with("ne", |args| {
            let [a, b] = args else {
                return Err(arity("ne", 2, args.len()));
            };
            Ok(Value::Bool(!values_equal(a, b)))
        })
        .with("lt", |args| compare("lt", args, |o| o == Ordering::Less))
        .with("le", |args| compare("le", args, |o| o != Ordering::Greater))
        .with("gt", |args| compare("gt", args, |o| o == Ordering::Greater))
        .with("ge", |args| compare("ge", args, |o| o != Ordering::Less))
        .with("print", |args| Ok(Value::String(sprint(args))))
        .with("printf", |args| {
            let (format, rest) = match args {
                [Value::String(format), rest @ ..] => (format, rest),
                _ => return Err(FuncError::new("printf: first argument must be a format string")),
            };
            Ok(Value::String(sprintf(format, rest)))
        })
        .with("html", |args| Ok(Value::String(escape_html(&sprint(args)))))
}

fn arity(name: &str, want: usize, got: usize) -> FuncError {
    FuncError::new(format!(
        "{}: wrong number of args: want {} got {}",
        name, want, got
    ))
}

fn index(item: &Value, key: &Value) -> Result<Value, FuncError> {
    match (item, key) {
        (Value::Array(items), Value::Number(n)) => {
            let i = n
                .as_u64()
                .ok_or_else(|| FuncError::new(format!("index: invalid index {}", n)))?;
            items.get(i as usize).cloned().ok_or_else(|| {
                FuncError::new(format!("index: index out of range: {}", i))
            })
        }
        (Value::Object(map), Value::String(k)) => Ok(map.get(k).cloned().unwrap_or(Value::Null)),
        (Value::Null, _) => Err(FuncError::new("index: index of untyped nil")),
        (other, key) => Err(FuncError::new(format!(
            "index: can't index item of type {} with {}",
            kind(other),
            kind(key)
        ))),
    }
}

/// Equality that treats `1` and `1.0` as the same number
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(
    name: &str,
    args: &[Value],
    accept: impl Fn(Ordering) -> bool,
) -> Result<Value, FuncError> {
    let [a, b] = args else {
        return Err(arity(name, 2, args.len()));
    };
    let ordering = match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64().partial_cmp(&y.as_f64()),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    };
    match ordering {
        Some(o) => Ok(Value::Bool(accept(o))),
        None => Err(FuncError::new(format!(
            "{}: incompatible types for comparison: {} and {}",
            name,
            kind(a),
            kind(b)
        ))),
    }
}

/// Operands are joined with a space only when neither side is a string
fn sprint(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 && !args[i - 1].is_string() && !arg.is_string() {
            out.push(' ');
        }
        out.push_str(&display(arg));
    }
    out
}

/// Supports `%s`, `%v`, `%d`, `%q` and `%%`
fn sprintf(format: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut args = args.iter();
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        let Some(arg) = args.next() else {
            out.push_str(&format!("%!{}(MISSING)", verb));
            continue;
        };
        match verb {
            's' | 'v' => out.push_str(&display(arg)),
            'd' => match arg.as_i64() {
                Some(n) => out.push_str(&n.to_string()),
                None => out.push_str(&format!("%!d({})", display(arg))),
            },
            'q' => out.push_str(&format!("{:?}", display(arg))),
            other => out.push_str(&format!("%!{}({})", other, display(arg))),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: &[Value]) -> Result<Value, FuncError> {
        let funcs = builtins();
        let f = funcs.get(name).expect("builtin exists");
        f(args)
    }

    #[test]
    fn test_and_or_return_operands() {
        assert_eq!(call("and", &[json!(1), json!(""), json!(2)]).unwrap(), json!(""));
        assert_eq!(call("and", &[json!(1), json!(2)]).unwrap(), json!(2));
        assert_eq!(call("or", &[json!(0), json!("x")]).unwrap(), json!("x"));
        assert_eq!(call("or", &[json!(0), json!(null)]).unwrap(), json!(null));
    }

    #[test]
    fn test_eq_numbers_and_strings() {
        assert_eq!(call("eq", &[json!(1), json!(1.0)]).unwrap(), json!(true));
        assert_eq!(call("eq", &[json!("a"), json!("b"), json!("a")]).unwrap(), json!(true));
        assert_eq!(call("ne", &[json!("a"), json!("b")]).unwrap(), json!(true));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(call("lt", &[json!(1), json!(2)]).unwrap(), json!(true));
        assert_eq!(call("ge", &[json!("b"), json!("a")]).unwrap(), json!(true));
        assert!(call("lt", &[json!(1), json!("a")]).is_err());
    }

    #[test]
    fn test_len_and_index() {
        assert_eq!(call("len", &[json!([1, 2, 3])]).unwrap(), json!(3));
        assert_eq!(
            call("index", &[json!({"a": [10, 20]}), json!("a"), json!(1)]).unwrap(),
            json!(20)
        );
        assert_eq!(call("index", &[json!({}), json!("missing")]).unwrap(), json!(null));
        assert!(call("index", &[json!([1]), json!(5)]).is_err());
        assert!(call("len", &[json!(3)]).is_err());
    }

    #[test]
    fn test_print_spacing() {
        assert_eq!(call("print", &[json!("a"), json!(1), json!(2)]).unwrap(), json!("a1 2"));
    }

    #[test]
    fn test_printf_verbs() {
        assert_eq!(
            call("printf", &[json!("%s has %d items (%q) 100%%"), json!("cart"), json!(3), json!("x")])
                .unwrap(),
            json!("cart has 3 items (\"x\") 100%")
        );
        assert_eq!(call("printf", &[json!("%s")]).unwrap(), json!("%!s(MISSING)"));
    }

    #[test]
    fn test_user_function_overrides_builtin() {
        let mut funcs = builtins();
        funcs.extend(&FuncMap::new().with("len", |_| Ok(json!(42))));
        let f = funcs.get("len").unwrap();
        assert_eq!(f(&[json!([])]).unwrap(), json!(42));
    }
}
