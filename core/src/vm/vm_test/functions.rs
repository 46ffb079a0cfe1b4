use super::*;

const COUNTER: &str = "let make = () => { let c = 0; return () => { c = c + 1; return c } };";

#[test]
fn test_counter_closure_shares_capture() {
    let v = run(&format!("{COUNTER} let counter = make(); [counter(), counter()]"));
    assert_eq!(v, numbers(&[1.0, 2.0]));
}

#[test]
fn test_counters_are_independent() {
    let v = run(&format!("{COUNTER} let a = make(); let b = make(); a(); a(); [a(), b()]"));
    assert_eq!(v, numbers(&[3.0, 1.0]));
}

#[test]
fn test_closure_mutation_is_visible_outside() {
    assert_eq!(run("let n = 0; let inc = () => { n = n + 1 }; inc(); inc(); n"), Value::number(2.0));
}

#[test]
fn test_factorial_recursion() {
    let src = "let fact = n => { if (n <= 1) { return 1 } return n * fact(n - 1) }; fact(5)";
    assert_eq!(run(src), Value::number(120.0));
}

#[test]
fn test_depth_overflow_fails_deterministically() {
    let mut vm = vm_with("let f = n => f(n + 1); f(0)", Globals::new());
    vm.set_max_frames(16);
    let first = vm.run();
    assert!(first.is_invalid());
    assert_eq!(first.invalid_reason(), Some("call depth exceeded (16 frames)"));
    let second = vm.run();
    assert_eq!(second.invalid_reason(), first.invalid_reason());
    assert!(vm.try_run().is_err());

    // The instance stays usable after the fault.
    vm.load(build("1 + 1"));
    assert_eq!(vm.run(), Value::number(2.0));
}

#[test]
fn test_depth_limit_allows_calls_up_to_capacity() {
    let src = "let down = n => { if (n == 0) { return 'done' } return down(n - 1) }; down(10)";
    let mut vm = vm_with(src, Globals::new());
    vm.set_max_frames(12);
    assert_eq!(vm.run(), Value::string("done"));
    vm.set_max_frames(11);
    assert!(vm.run().is_invalid());
}

#[test]
fn test_defers_run_in_reverse_order() {
    let (globals, lines) = logging_globals();
    let src = "let f = () => { defer log('D1'); defer log('D2'); defer log('D3'); return 1 }; f()";
    assert_eq!(run_with(src, globals), Value::number(1.0));
    assert_eq!(*lines.lock().unwrap(), vec!["D3", "D2", "D1"]);
}

#[test]
fn test_defers_run_on_early_return() {
    let (globals, lines) = logging_globals();
    let src = "let g = x => { defer log('A'); if (x) { return 'early' } defer log('B'); 'late' }; \
               [g(true), g(false)]";
    let v = run_with(src, globals);
    assert_eq!(v.index(0), Value::string("early"));
    assert_eq!(v.index(1), Value::string("late"));
    assert_eq!(*lines.lock().unwrap(), vec!["A", "B", "A"]);
}

#[test]
fn test_top_level_defers_run_at_halt() {
    let (globals, lines) = logging_globals();
    run_with("defer log('end'); log('start'); 1", globals);
    assert_eq!(*lines.lock().unwrap(), vec!["start", "end"]);
}

#[test]
fn test_deferred_closure_sees_frame_locals() {
    let (globals, lines) = logging_globals();
    run_with("let f = () => { let msg = 'first'; defer log(msg); msg = 'last'; 0 }; f()", globals);
    assert_eq!(*lines.lock().unwrap(), vec!["last"]);
}

#[test]
fn test_execute_lambda_from_host() {
    let mut vm = vm_with("let add = (a, b) => a + b; add", Globals::new());
    let add = vm.run();
    let lambda = add.as_lambda().unwrap().clone();
    assert_eq!(vm.execute_lambda(&lambda, &[Value::number(2.0), Value::number(3.0)]), Value::number(5.0));
    assert_eq!(vm.execute_lambda(&lambda, &[Value::string("a"), Value::string("b")]), Value::string("ab"));
}

#[test]
fn test_missing_arguments_bind_nil() {
    assert!(run("let f = (a, b) => b; f(1)").is_nil());
}

#[test]
fn test_unbound_lambda_is_invalid() {
    let mut vm = vm_with("1", Globals::new());
    let unbound = Lambda::descriptor(Lambda::UNBOUND, Vec::new());
    assert!(vm.execute_lambda(&unbound, &[]).is_invalid());
    let outside = Lambda::descriptor(10_000, Vec::new());
    let v = vm.execute_lambda(&outside, &[]);
    assert!(v.invalid_reason().is_some_and(|r| r.contains("outside the program")), "{v:?}");
}

#[test]
fn test_calling_a_non_function_is_invalid_not_a_fault() {
    let mut vm = vm_with("let n = 1; n(2)", Globals::new());
    let v = vm.try_run().unwrap();
    assert_eq!(v.invalid_reason(), Some("number is not callable"));
}

#[test]
fn test_function_stored_in_object() {
    assert_eq!(run("let o = {triple: x => x * 3}; o.triple(2)"), Value::number(6.0));
    assert_eq!(run("let fs = [x => x + 1]; fs[0](1)"), Value::number(2.0));
}

#[test]
fn test_higher_order_functions() {
    let src = "let twice = f => x => f(f(x)); let inc = n => n + 1; twice(inc)(5)";
    assert_eq!(run(src), Value::number(7.0));
}

#[test]
fn test_discovery_lambda_runs_on_vm() {
    let src = "let base = 10; let f = x => x + base; f";
    let bytecode = build(src);
    let program = parse(src).unwrap();
    let lambda = Evaluator::new()
        .with_entries(&bytecode.entries)
        .eval_program(&program, &Environment::new());
    let lambda = lambda.as_lambda().unwrap().clone();
    assert!(lambda.is_bound());

    let mut vm = Vm::new(bytecode, Globals::new().into_shared());
    assert_eq!(vm.execute_lambda(&lambda, &[Value::number(5.0)]), Value::number(15.0));
}

#[test]
fn test_callbacks_reenter_the_vm() {
    let src = "let scale = 10; [[1, 2], [3]].map(row => row.map(x => x * scale))";
    let v = run(src);
    assert_eq!(v.index(0), numbers(&[10.0, 20.0]));
    assert_eq!(v.index(1), numbers(&[30.0]));
}
