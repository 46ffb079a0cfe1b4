use dashmap::DashMap;
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;

use crate::util::{FastHashMap, fast_hash_map_new, read_lock, sorted_keys, write_lock};

use super::{Kind, Method, Value};

#[derive(Clone, Copy)]
pub struct MethodEntry {
    pub name: &'static str,
    pub func: Method,
}

const fn entry(name: &'static str, func: Method) -> Option<MethodEntry> {
    Some(MethodEntry { name, func })
}

// Host-registered methods: kind -> method name -> function
static METHOD_REGISTRY: Lazy<DashMap<Kind, FastHashMap<&'static str, Method>>> = Lazy::new(DashMap::new);

/// Registers a method for every value of `kind`. Built-in methods of the same
/// name keep priority.
pub fn register_method(kind: Kind, name: &'static str, func: Method) {
    METHOD_REGISTRY
        .entry(kind)
        .or_insert_with(fast_hash_map_new)
        .insert(name, func);
}

pub fn unregister_method(kind: Kind, name: &str) -> bool {
    METHOD_REGISTRY
        .get_mut(&kind)
        .is_some_and(|mut methods| methods.remove(name).is_some())
}

/// Resolves `name` for a receiver of `kind`: methods shared by every kind,
/// then the kind's own built-ins, then the registry.
pub fn lookup(kind: Kind, name: &str) -> Option<MethodEntry> {
    common_method(name)
        .or_else(|| builtin_method(kind, name))
        .or_else(|| registered_method(kind, name))
}

fn registered_method(kind: Kind, name: &str) -> Option<MethodEntry> {
    let methods = METHOD_REGISTRY.get(&kind)?;
    methods
        .get_key_value(name)
        .map(|(name, func)| MethodEntry { name: *name, func: *func })
}

fn common_method(name: &str) -> Option<MethodEntry> {
    match name {
        "string" | "text" | "toString" => entry("string", to_string),
        "int" | "integer" => entry("int", to_int),
        "float" | "toFloat" => entry("float", to_float),
        "json" | "toJson" => entry("json", to_json),
        "len" => entry("len", length),
        _ => None,
    }
}

fn builtin_method(kind: Kind, name: &str) -> Option<MethodEntry> {
    match kind {
        Kind::String => match name {
            "upper" | "toUpperCase" => entry("upper", upper),
            "lower" | "toLowerCase" => entry("lower", lower),
            "trim" => entry("trim", trim),
            "includes" => entry("includes", str_includes),
            "startsWith" => entry("startsWith", starts_with),
            "endsWith" => entry("endsWith", ends_with),
            "split" => entry("split", split),
            "replace" => entry("replace", replace),
            "capitalize" => entry("capitalize", capitalize),
            "safe" => entry("safe", safe),
            _ => None,
        },
        Kind::Array => match name {
            "push" => entry("push", push),
            "pop" => entry("pop", pop),
            "shift" => entry("shift", shift),
            "unshift" => entry("unshift", unshift),
            "join" => entry("join", join),
            "reverse" => entry("reverse", reverse),
            "at" | "index" => entry("at", item_at),
            "compact" => entry("compact", compact),
            "unique" => entry("unique", unique),
            "includes" => entry("includes", array_includes),
            "shuffle" => entry("shuffle", shuffle),
            "random" => entry("random", random),
            // Callback-driven; the VM intercepts these before dispatch.
            "map" => entry("map", needs_vm),
            "filter" => entry("filter", needs_vm),
            "find" => entry("find", needs_vm),
            "each" | "forEach" => entry("each", needs_vm),
            _ => None,
        },
        Kind::Map => match name {
            "keys" => entry("keys", keys),
            "values" => entry("values", values),
            "has" => entry("has", has),
            "delete" => entry("delete", delete),
            "merge" => entry("merge", merge),
            _ => None,
        },
        Kind::Time => match name {
            "unix" => entry("unix", unix),
            "format" => entry("format", format_time),
            _ => None,
        },
        Kind::Duration => match name {
            "seconds" => entry("seconds", seconds),
            "milliseconds" | "ms" => entry("milliseconds", milliseconds),
            _ => None,
        },
        _ => None,
    }
}

/// Names of every built-in method available on `kind`.
pub fn method_names(kind: Kind) -> Vec<&'static str> {
    const CANDIDATES: &[&str] = &[
        "string", "int", "float", "json", "len", "upper", "lower", "trim", "includes", "startsWith", "endsWith",
        "split", "replace", "capitalize", "safe", "push", "pop", "shift", "unshift", "join", "reverse", "at",
        "compact", "unique", "shuffle", "random", "map", "filter", "find", "each", "keys", "values", "has", "delete", "merge", "unix", "format",
        "seconds", "milliseconds",
    ];
    let mut names: Vec<&'static str> = CANDIDATES
        .iter()
        .filter(|n| common_method(n).or_else(|| builtin_method(kind, n)).is_some())
        .copied()
        .collect();
    if let Some(extra) = METHOD_REGISTRY.get(&kind) {
        names.extend(extra.keys().copied());
    }
    names
}

#[inline]
fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

#[inline]
fn arg_text(args: &[Value], i: usize) -> Option<String> {
    args.get(i).map(Value::text)
}

fn needs_vm(recv: &Value, _args: &[Value]) -> Value {
    Value::invalid_because(format!("{} callback methods must run inside a VM", recv.kind()))
}

// --- shared ---

fn to_string(recv: &Value, _args: &[Value]) -> Value {
    Value::string(recv.text())
}

fn to_int(recv: &Value, _args: &[Value]) -> Value {
    let n = recv.to_number();
    if n.is_invalid() {
        return n;
    }
    Value::number(n.num().trunc())
}

fn to_float(recv: &Value, _args: &[Value]) -> Value {
    recv.to_number()
}

/// Strings parse as JSON, everything else serializes to JSON text.
fn to_json(recv: &Value, _args: &[Value]) -> Value {
    match recv.as_str() {
        Some(s) => Value::from_json_str(s).unwrap_or_else(|e| Value::invalid_because(e.to_string())),
        None => match recv.encode_json(false) {
            Ok(text) => Value::string(text),
            Err(e) => Value::invalid_because(e.to_string()),
        },
    }
}

fn length(recv: &Value, _args: &[Value]) -> Value {
    Value::number(recv.len() as f64)
}

// --- string ---

fn upper(recv: &Value, _args: &[Value]) -> Value {
    Value::string(recv.text().to_uppercase())
}

fn lower(recv: &Value, _args: &[Value]) -> Value {
    Value::string(recv.text().to_lowercase())
}

fn trim(recv: &Value, _args: &[Value]) -> Value {
    Value::string(recv.text().trim())
}

fn str_includes(recv: &Value, args: &[Value]) -> Value {
    let Some(needle) = arg_text(args, 0) else {
        return Value::bool(false);
    };
    Value::bool(recv.as_str().is_some_and(|s| s.contains(needle.as_str())))
}

fn starts_with(recv: &Value, args: &[Value]) -> Value {
    let Some(prefix) = arg_text(args, 0) else {
        return Value::bool(false);
    };
    Value::bool(recv.as_str().is_some_and(|s| s.starts_with(prefix.as_str())))
}

fn ends_with(recv: &Value, args: &[Value]) -> Value {
    let Some(suffix) = arg_text(args, 0) else {
        return Value::bool(false);
    };
    Value::bool(recv.as_str().is_some_and(|s| s.ends_with(suffix.as_str())))
}

/// An empty separator splits into characters.
fn split(recv: &Value, args: &[Value]) -> Value {
    let s = recv.as_str().unwrap_or_default();
    let sep = arg_text(args, 0).unwrap_or_default();
    let parts: Vec<Value> = if sep.is_empty() {
        s.chars().map(|c| Value::string(c.to_string())).collect()
    } else {
        s.split(sep.as_str()).map(Value::string).collect()
    };
    Value::array(parts)
}

fn replace(recv: &Value, args: &[Value]) -> Value {
    if args.len() < 2 {
        return recv.clone();
    }
    let from = args[0].text();
    let to = args[1].text();
    Value::string(recv.as_str().unwrap_or_default().replace(from.as_str(), to.as_str()))
}

fn capitalize(recv: &Value, _args: &[Value]) -> Value {
    let s = recv.as_str().unwrap_or_default();
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => Value::string(first.to_uppercase().chain(chars).collect::<String>()),
        None => recv.clone(),
    }
}

/// HTML-escaped copy of the text.
fn safe(recv: &Value, _args: &[Value]) -> Value {
    let s = recv.as_str().unwrap_or_default();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    Value::string(out)
}

// --- array ---

fn push(recv: &Value, args: &[Value]) -> Value {
    if let Some(a) = recv.as_array() {
        write_lock(a).extend(args.iter().cloned());
    }
    recv.clone()
}

fn pop(recv: &Value, _args: &[Value]) -> Value {
    recv.as_array()
        .and_then(|a| write_lock(a).pop())
        .unwrap_or_default()
}

fn shift(recv: &Value, _args: &[Value]) -> Value {
    let Some(a) = recv.as_array() else {
        return Value::nil();
    };
    let mut items = write_lock(a);
    if items.is_empty() {
        return Value::nil();
    }
    items.remove(0)
}

fn unshift(recv: &Value, args: &[Value]) -> Value {
    if let Some(a) = recv.as_array() {
        let mut items = write_lock(a);
        items.splice(0..0, args.iter().cloned());
    }
    recv.clone()
}

fn join(recv: &Value, args: &[Value]) -> Value {
    let sep = arg_text(args, 0).unwrap_or_else(|| ",".to_string());
    let Some(a) = recv.as_array() else {
        return Value::string("");
    };
    let items = read_lock(a).clone();
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(&sep);
        }
        item.write_text(&mut out, &mut Vec::new());
    }
    Value::string(out)
}

fn reverse(recv: &Value, _args: &[Value]) -> Value {
    if let Some(a) = recv.as_array() {
        write_lock(a).reverse();
    }
    recv.clone()
}

/// Negative indices count from the end.
fn item_at(recv: &Value, args: &[Value]) -> Value {
    let Some(a) = recv.as_array() else {
        return Value::nil();
    };
    let items = read_lock(a);
    let mut idx = arg(args, 0).as_i64();
    if idx < 0 {
        idx += items.len() as i64;
    }
    if idx < 0 {
        return Value::nil();
    }
    items.get(idx as usize).cloned().unwrap_or_default()
}

fn compact(recv: &Value, _args: &[Value]) -> Value {
    if let Some(a) = recv.as_array() {
        write_lock(a).retain(|item| !item.is_nil() && item.truthy());
    }
    recv.clone()
}

fn unique(recv: &Value, _args: &[Value]) -> Value {
    if let Some(a) = recv.as_array() {
        let items = read_lock(a).clone();
        let mut kept: Vec<Value> = Vec::with_capacity(items.len());
        for item in items {
            if !kept.iter().any(|k| k.equals(&item)) {
                kept.push(item);
            }
        }
        *write_lock(a) = kept;
    }
    recv.clone()
}

fn array_includes(recv: &Value, args: &[Value]) -> Value {
    let needle = arg(args, 0);
    let found = recv
        .as_array()
        .is_some_and(|a| read_lock(a).iter().any(|item| item.equals(&needle)));
    Value::bool(found)
}

/// Shuffles in place and returns the receiver.
fn shuffle(recv: &Value, _args: &[Value]) -> Value {
    if let Some(a) = recv.as_array() {
        write_lock(a).shuffle(&mut rand::thread_rng());
    }
    recv.clone()
}

/// `random()` picks one element; `random(n)` with `n > 1` returns a new
/// array of up to `n` distinct positions. An empty array yields nil.
fn random(recv: &Value, args: &[Value]) -> Value {
    let Some(a) = recv.as_array() else {
        return Value::nil();
    };
    let items = read_lock(a);
    let mut rng = rand::thread_rng();
    let count = args.first().map_or(1, Value::as_i64);
    if count <= 1 {
        return items.choose(&mut rng).cloned().unwrap_or_default();
    }
    if items.is_empty() {
        return Value::nil();
    }
    Value::array(items.choose_multiple(&mut rng, count as usize).cloned().collect())
}

// --- map ---

fn keys(recv: &Value, _args: &[Value]) -> Value {
    let keys = recv
        .as_map()
        .map(|m| sorted_keys(&read_lock(m)))
        .unwrap_or_default();
    Value::array(keys.into_iter().map(Value::string).collect())
}

fn values(recv: &Value, _args: &[Value]) -> Value {
    let Some(m) = recv.as_map() else {
        return Value::array(Vec::new());
    };
    let entries = read_lock(m).clone();
    let values = sorted_keys(&entries)
        .iter()
        .filter_map(|k| entries.get(k).cloned())
        .collect();
    Value::array(values)
}

fn has(recv: &Value, args: &[Value]) -> Value {
    let Some(key) = arg_text(args, 0) else {
        return Value::bool(false);
    };
    Value::bool(recv.as_map().is_some_and(|m| read_lock(m).contains_key(key.as_str())))
}

fn delete(recv: &Value, args: &[Value]) -> Value {
    if let (Some(m), Some(key)) = (recv.as_map(), arg_text(args, 0)) {
        write_lock(m).remove(key.as_str());
    }
    recv.clone()
}

/// Copies the argument's entries into the receiver and returns the receiver.
fn merge(recv: &Value, args: &[Value]) -> Value {
    let (Some(target), Some(source)) = (recv.as_map(), args.first().and_then(Value::as_map)) else {
        return recv.clone();
    };
    let incoming = read_lock(source).clone();
    write_lock(target).extend(incoming);
    recv.clone()
}

// --- time ---

fn unix(recv: &Value, _args: &[Value]) -> Value {
    Value::number((recv.num() / 1e9).floor())
}

fn format_time(recv: &Value, args: &[Value]) -> Value {
    let dt = chrono::DateTime::<chrono::Utc>::from_timestamp_nanos(recv.num() as i64);
    match arg_text(args, 0) {
        Some(pattern) => {
            use std::fmt::Write as _;
            let mut out = String::new();
            // chrono reports bad patterns through fmt::Error
            if write!(out, "{}", dt.format(&pattern)).is_err() {
                return Value::invalid_because(format!("bad time format '{pattern}'"));
            }
            Value::string(out)
        }
        None => Value::string(recv.text()),
    }
}

// --- duration ---

fn seconds(recv: &Value, _args: &[Value]) -> Value {
    Value::number(recv.num() / 1e9)
}

fn milliseconds(recv: &Value, _args: &[Value]) -> Value {
    Value::number(recv.num() / 1e6)
}
