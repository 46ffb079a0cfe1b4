use super::*;

#[test]
fn test_if_without_else_yields_nil() {
    assert!(run("if (false) { 1 }").is_nil());
    assert_eq!(run("if (true) { 1 }"), Value::number(1.0));
    assert_eq!(run("let x = if (0) { 'a' } else { 'b' }; x"), Value::string("b"));
}

#[test]
fn test_else_if_chain() {
    let src = |n: i32| format!("let n = {n}; if (n < 0) {{ 'neg' }} else if (n == 0) {{ 'zero' }} else {{ 'pos' }}");
    assert_eq!(run(&src(-3)), Value::string("neg"));
    assert_eq!(run(&src(0)), Value::string("zero"));
    assert_eq!(run(&src(7)), Value::string("pos"));
}

#[test]
fn test_top_level_return_stops_program() {
    assert_eq!(run("let a = 1; return a + 1; 99"), Value::number(2.0));
    assert!(run("return; 5").is_nil());
}

#[test]
fn test_return_from_inside_loop() {
    let src = "let f = () => { for x in [1, 2, 3] { if (x == 2) { return x * 10 } } return 0 }; f()";
    assert_eq!(run(src), Value::number(20.0));
}

#[test]
fn test_early_return_does_not_leak_stack_values() {
    let src = "let f = flag => { let y = [1, 2, if (flag) { return 'early' } else { 3 }]; return y }; \
               [f(true), f(false).length, f(true)]";
    let v = run(src);
    assert_eq!(v.index(0), Value::string("early"));
    assert_eq!(v.index(1), Value::number(3.0));
    assert_eq!(v.index(2), Value::string("early"));
    assert_eq!(v.len(), 3);
}

#[test]
fn test_nested_loops() {
    let src = "let out = []; for a in [1, 2] { for b in ['x', 'y'] { out.push(a + b) } }; out.join(' ')";
    assert_eq!(run(src), Value::string("1x 1y 2x 2y"));
}

#[test]
fn test_loop_variable_is_visible_after_loop() {
    assert_eq!(run("for x in [1, 2, 3] { x }; x"), Value::number(3.0));
}

#[test]
fn test_energy_counts_instructions() {
    // PUSH 1 + PUSH 1 + ADD 2 + HALT 0
    let mut vm = vm_with("1 + 2", Globals::new());
    assert_eq!(vm.run(), Value::number(3.0));
    assert_eq!(vm.energy(), 4);
    assert!(vm.halted());
}

#[test]
fn test_energy_is_zero_only_for_lone_halt() {
    let mut vm = vm_with("", Globals::new());
    assert!(vm.run().is_nil());
    assert_eq!(vm.energy(), 0);

    let mut vm = Vm::new(Arc::new(Bytecode::new(vec![Opcode::Halt as u8], vec![])), Globals::new().into_shared());
    vm.run();
    assert_eq!(vm.energy(), 0);

    for src in ["1", "null", "let a = 1", "if (true) { 1 }"] {
        let mut vm = vm_with(src, Globals::new());
        vm.run();
        assert!(vm.energy() > 0, "{src}");
    }
}

#[test]
fn test_energy_never_decreases() {
    let programs = ["1", "1 + 2", "1 + 2 * 3", "1 + 2 * 3 / 4", "let f = x => x; f(1 + 2 * 3 / 4)"];
    let mut last = 0;
    for src in programs {
        let mut vm = vm_with(src, Globals::new());
        vm.run();
        assert!(vm.energy() > last, "{src}: {} <= {last}", vm.energy());
        last = vm.energy();
    }

    let mut vm = vm_with("let f = x => x * 2; f", Globals::new());
    let f = vm.run();
    let before = vm.energy();
    assert_eq!(vm.execute_lambda(f.as_lambda().unwrap(), &[Value::number(4.0)]), Value::number(8.0));
    assert!(vm.energy() > before);
}

#[test]
fn test_energy_is_deterministic() {
    let src = "let s = 0; for x in [1, 2, 3, 4] { s = s + x * x }; s";
    let mut vm = vm_with(src, Globals::new());
    vm.run();
    let first = vm.energy();
    vm.run();
    assert_eq!(vm.energy(), first);
    let mut other = vm_with(src, Globals::new());
    other.run();
    assert_eq!(other.energy(), first);
}
