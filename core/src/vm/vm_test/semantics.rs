use std::sync::atomic::{AtomicUsize, Ordering};

use crate::val::{CompareOp, Kind, ProxyHandler};

use super::*;

#[test]
fn test_division_agrees_with_evaluator() {
    for (a, b) in [(1.0, 3.0), (10.0, 4.0), (-7.5, 2.5), (0.0, 9.0), (123456.0, -0.5)] {
        let src = format!("{a} / {b}");
        let vm = run(&src);
        let tree = eval(&src);
        assert!((vm.num() - a / b).abs() < 1e-9, "{src} => {vm}");
        assert!((vm.num() - tree.num()).abs() < 1e-9, "{src}: vm {vm} vs eval {tree}");
    }
    assert!(run("1 / 0").is_nil());
    assert!(run("5 % 0").is_nil());
    assert_eq!(run("7 % 4"), Value::number(3.0));
}

#[test]
fn test_concatenation() {
    assert_eq!(run(r#""x" + 1"#), Value::string("x1"));
    assert_eq!(run(r#"1 + "x""#), Value::string("1x"));
    assert_eq!(run("`a${1 + 1}b${null}`"), Value::string("a2bnull"));
}

#[test]
fn test_short_circuit_skips_side_effects() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let mut globals = Globals::new();
    globals.insert(
        "sideEffect",
        Value::native(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Value::bool(true)
        }),
    );
    let globals = globals.into_shared();
    let exec = |src: &str| Vm::new(build(src), globals.clone()).run();

    assert_eq!(exec("false && sideEffect()"), Value::bool(false));
    assert_eq!(exec("true || sideEffect()"), Value::bool(true));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(exec("true && sideEffect()"), Value::bool(true));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_logical_operators_yield_operands() {
    assert_eq!(run("0 || 'fallback'"), Value::string("fallback"));
    assert_eq!(run("1 && 'second'"), Value::string("second"));
}

#[test]
fn test_nullish_matches_evaluator() {
    for src in ["null ?? 1", "'null' ?? 2", "0 ?? 3", "'' ?? 4", "'x' ?? 5"] {
        assert_eq!(run(src), eval(src), "{src}");
    }
    assert_eq!(run("'null' ?? 2"), Value::number(2.0));
}

/// Answers every comparison with `true` and counts how often it was asked.
#[derive(Default)]
struct Eager {
    compares: AtomicUsize,
}

impl ProxyHandler for Eager {
    fn on_get(&self, _key: &str) -> Value {
        Value::nil()
    }

    fn on_compare(&self, _op: CompareOp, _other: &Value) -> Value {
        self.compares.fetch_add(1, Ordering::SeqCst);
        Value::bool(true)
    }

    fn on_invoke(&self, _method: &str, _args: &[Value]) -> Value {
        Value::nil()
    }
}

#[test]
fn test_nullish_leaves_proxies_alone() {
    let handler = Arc::new(Eager::default());
    let mut globals = Globals::new();
    globals.insert("col", Value::proxy(handler.clone()));

    let program = parse("col ?? 1").unwrap();
    let tree = Evaluator::new()
        .with_globals(&globals)
        .eval_program(&program, &Environment::new());
    assert_eq!(tree.kind(), Kind::Proxy);

    let vm = run_with("col ?? 1", globals);
    assert_eq!(vm.kind(), Kind::Proxy);
    assert_eq!(handler.compares.load(Ordering::SeqCst), 0);
}

#[test]
fn test_invalid_is_contagious() {
    for src in [
        r#"(1 - "a") > 0"#,
        r#"0 < (1 - "a")"#,
        r#"!(1 - "a")"#,
        r#"if ((1 - "a") == null) { 1 } else { 2 }"#,
        r#"(1 - "a") && 1"#,
        r#"0 || (1 - "a")"#,
        r#"(1 - "a") ?? 3"#,
    ] {
        assert!(run(src).is_invalid(), "vm: {src}");
        assert!(eval(src).is_invalid(), "eval: {src}");
    }
    let v = run(r#"let f = () => { if (1 * "x") { return 1 } return 2 }; f()"#);
    assert_eq!(v.invalid_reason(), Some("cannot multiply number and string"));
}

#[test]
fn test_cyclic_containers_stay_inside_the_script() {
    let v = run("let a = []; a.push(a); a.json()");
    assert!(v.invalid_reason().is_some_and(|r| r.contains("cyclic")), "{v:?}");
    assert_eq!(run("let a = []; a.push(a); let b = []; b.push(b); a == b"), Value::bool(false));
    assert_eq!(run("let a = []; a.push(a); a == a"), Value::bool(true));
    assert_eq!(run("let a = []; a.push(a); 'x' + a"), Value::string("x[...]"));
}

#[test]
fn test_scenario() {
    let v = run("let a=10; let b=20; if (a+b>25) { (a*b)/(b-a) } else { -1 }");
    assert_eq!(v, Value::number(20.0));
    let v = run("let a=1; let b=2; if (a+b>25) { (a*b)/(b-a) } else { -1 }");
    assert_eq!(v, Value::number(-1.0));
}

#[test]
fn test_map_returns_new_array() {
    let v = run("let xs = [1, 2, 3]; let ys = xs.map(x => x * 2); [xs, ys]");
    assert_eq!(v.index(0), numbers(&[1.0, 2.0, 3.0]));
    assert_eq!(v.index(1), numbers(&[2.0, 4.0, 6.0]));
    assert_eq!(run("[1, 2, 3].map((x, i) => i)"), numbers(&[0.0, 1.0, 2.0]));
}

#[test]
fn test_filter_find_each() {
    assert_eq!(run("[1, 2, 3, 4].filter(x => x % 2 == 0)"), numbers(&[2.0, 4.0]));
    assert_eq!(run("[1, 2, 3].find(x => x > 1)"), Value::number(2.0));
    assert!(run("[1, 2, 3].find(x => x > 9)").is_nil());
    assert_eq!(run("let s = 0; [1, 2, 3].each(x => { s = s + x }); s"), Value::number(6.0));
    assert_eq!(run("let s = 0; [4].forEach(x => { s = x }); s"), Value::number(4.0));
    assert!(run("[1].map(5)").is_invalid());
}

#[test]
fn test_arrays_and_maps_are_shared() {
    assert_eq!(run("let a = [1]; let b = a; b.push(2); a.length"), Value::number(2.0));
    assert_eq!(run("let o = {a: 1}; let p = o; p.b = 2; o.a + o.b"), Value::number(3.0));
    let v = run("let xs = [1]; xs[0] = 5; xs[3] = 6; xs");
    assert_eq!(v, numbers(&[5.0, 6.0]));
}

#[test]
fn test_member_assignment_evaluates_to_container() {
    let v = run("let o = {}; o.k = 'v'");
    assert_eq!(v.get("k"), Value::string("v"));
}

#[test]
fn test_destructuring() {
    assert_eq!(run("let {a, b} = {a: 1, b: 2}; a + b"), Value::number(3.0));
    assert_eq!(run("let [x, y] = [10, 20]; y - x"), Value::number(10.0));
    assert!(run("let {zz} = {}; zz").is_nil());
}

#[test]
fn test_for_in_iterates_items_keys_and_bytes() {
    assert_eq!(run("let s = 0; for x in [1, 2, 3] { s = s + x }; s"), Value::number(6.0));
    assert_eq!(run("let s = ''; for (k in {b: 1, a: 2}) { s = s + k }; s"), Value::string("ab"));
    assert_eq!(run("let s = ''; for c in 'abc' { s = c + s }; s"), Value::string("cba"));
    assert_eq!(run("let n = 0; for x in null { n = 1 }; n"), Value::number(0.0));
}

#[test]
fn test_methods_and_pseudo_properties() {
    assert_eq!(run("[3, 1, 2].length"), Value::number(3.0));
    assert_eq!(run("'abc'.upper()"), Value::string("ABC"));
    assert_eq!(run("'x'.type"), Value::string("string"));
    assert!(run("null.anything()").is_nil());
    assert!(run("null.anything").is_nil());
}

#[test]
fn test_unknown_names_load_nil() {
    assert!(run("missing").is_nil());
    let mut globals = Globals::new();
    globals.insert("answer", Value::number(42.0));
    assert_eq!(run_with("answer", globals), Value::number(42.0));
}

#[test]
fn test_locals_shadow_globals() {
    let mut globals = Globals::new();
    globals.insert("x", Value::number(1.0));
    assert_eq!(run_with("let x = 2; x", globals), Value::number(2.0));
}

struct Column(&'static str);

impl ProxyHandler for Column {
    fn on_get(&self, key: &str) -> Value {
        Value::string(format!("{}.{key}", self.0))
    }

    fn on_compare(&self, op: CompareOp, other: &Value) -> Value {
        Value::string(format!("{} {} {}", self.0, op.symbol(), other.text()))
    }

    fn on_invoke(&self, method: &str, args: &[Value]) -> Value {
        Value::string(format!("{}:{method}/{}", self.0, args.len()))
    }
}

#[test]
fn test_proxy_delegation() {
    let globals = || {
        let mut g = Globals::new();
        g.insert("age", Value::proxy(Arc::new(Column("age"))));
        g
    };
    assert_eq!(run_with("age > 18", globals()), Value::string("age > 18"));
    assert_eq!(run_with("18 < age", globals()), Value::string("age > 18"));
    assert_eq!(run_with("age.max", globals()), Value::string("age.max"));
    assert_eq!(run_with("age.length", globals()), Value::string("age.length"));
    assert_eq!(run_with("age.between(1, 2)", globals()), Value::string("age:between/2"));
}
