use super::*;

fn exec(code: Vec<u8>, constants: Vec<Value>) -> Value {
    Vm::new(Arc::new(Bytecode::new(code, constants)), Globals::new().into_shared()).run()
}

fn reason(v: &Value) -> &str {
    v.invalid_reason().unwrap_or_else(|| panic!("expected invalid, got {v:?}"))
}

const PUSH: u8 = Opcode::Push as u8;
const HALT: u8 = Opcode::Halt as u8;

#[test]
fn test_truncated_operand_is_invalid() {
    let v = exec(vec![PUSH, 0], vec![Value::number(1.0)]);
    assert!(reason(&v).starts_with("truncated operand"), "{v:?}");
    let v = exec(vec![Opcode::Compare as u8], vec![]);
    assert!(reason(&v).starts_with("truncated operand"), "{v:?}");
}

#[test]
fn test_bad_constant_index_is_invalid() {
    let v = exec(vec![PUSH, 0, 5, HALT], vec![]);
    assert_eq!(reason(&v), "constant index 5 out of range (0 constants)");
}

#[test]
fn test_unknown_opcode_is_invalid() {
    let v = exec(vec![0xee], vec![]);
    assert_eq!(reason(&v), "unknown opcode 0xee at 0");
}

#[test]
fn test_running_off_the_end_is_invalid() {
    let v = exec(vec![PUSH, 0, 0], vec![Value::number(1.0)]);
    assert!(reason(&v).contains("past end of code"), "{v:?}");
}

#[test]
fn test_stack_underflow_is_invalid() {
    let v = exec(vec![Opcode::Pop as u8, HALT], vec![]);
    assert_eq!(reason(&v), "stack underflow");
    let v = exec(vec![Opcode::Add as u8, HALT], vec![]);
    assert_eq!(reason(&v), "stack underflow");
}

#[test]
fn test_bad_compare_mode_is_invalid() {
    let one = Value::number(1.0);
    let v = exec(vec![PUSH, 0, 0, PUSH, 0, 0, Opcode::Compare as u8, 9, HALT], vec![one]);
    assert_eq!(reason(&v), "unknown compare mode 9 at 6");
}

#[test]
fn test_eager_logical_opcodes() {
    let consts = vec![Value::number(0.0), Value::string("x")];
    let v = exec(vec![PUSH, 0, 0, PUSH, 0, 1, Opcode::And as u8, HALT], consts.clone());
    assert_eq!(v, Value::number(0.0));
    let v = exec(vec![PUSH, 0, 0, PUSH, 0, 1, Opcode::Or as u8, HALT], consts.clone());
    assert_eq!(v, Value::string("x"));
    let v = exec(vec![PUSH, 0, 0, Opcode::Not as u8, HALT], consts);
    assert_eq!(v, Value::bool(true));
}

#[test]
fn test_halt_yields_top_of_stack() {
    let v = exec(vec![PUSH, 0, 0, PUSH, 0, 1, HALT, PUSH, 0, 0], vec![Value::number(1.0), Value::number(2.0)]);
    assert_eq!(v, Value::number(2.0));
}

#[test]
fn test_faults_surface_through_try_run() {
    let bc = Arc::new(Bytecode::new(vec![PUSH, 0], vec![]));
    let mut vm = Vm::new(bc, Globals::new().into_shared());
    let err = vm.try_run().unwrap_err();
    assert!(err.to_string().starts_with("truncated operand"));
}

#[test]
fn test_load_keeps_module_variables() {
    let mut vm = vm_with("x * 2", Globals::new());
    vm.set_var("x", Value::number(5.0));
    assert_eq!(vm.run(), Value::number(10.0));
    vm.load(build("let y = x + 1; y"));
    assert_eq!(vm.run(), Value::number(6.0));
    assert_eq!(vm.var("y"), Some(Value::number(6.0)));
}

#[test]
fn test_repeated_runs_reuse_the_instance() {
    let mut vm = vm_with("let f = n => n * n; [f(2), f(3)]", Globals::new());
    let first = vm.run();
    for _ in 0..3 {
        vm.fast_reset();
        assert_eq!(vm.run(), first);
    }
}

#[test]
fn test_shared_bytecode_is_never_mutated() {
    let bc = build("let xs = [1]; xs.push(2); xs");
    let before = (bc.code.clone(), bc.constants.len());
    let globals = Globals::new().into_shared();
    for _ in 0..2 {
        let v = Vm::new(bc.clone(), globals.clone()).run();
        assert_eq!(v, numbers(&[1.0, 2.0]));
    }
    assert_eq!((bc.code.clone(), bc.constants.len()), before);
}
