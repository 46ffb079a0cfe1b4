use std::thread;

use super::*;

fn collecting_spawner() -> (Arc<dyn crate::vm::Spawner>, Arc<Mutex<Vec<SpawnedTask>>>) {
    let tasks = Arc::new(Mutex::new(Vec::new()));
    let sink = tasks.clone();
    let spawner = move |task: SpawnedTask| sink.lock().unwrap().push(task);
    (Arc::new(spawner), tasks)
}

#[test]
fn test_go_hands_closure_to_spawner_without_waiting() {
    let (globals, lines) = logging_globals();
    let (spawner, tasks) = collecting_spawner();
    let mut vm = vm_with("go log('child'); log('parent'); 'done'", globals).with_spawner(spawner);
    assert_eq!(vm.run(), Value::string("done"));
    assert_eq!(*lines.lock().unwrap(), vec!["parent"]);

    let task = tasks.lock().unwrap().pop().unwrap();
    assert!(task.run().is_nil());
    assert_eq!(*lines.lock().unwrap(), vec!["parent", "child"]);
}

#[test]
fn test_go_without_spawner_is_dropped() {
    let (globals, lines) = logging_globals();
    assert_eq!(run_with("go log('lost'); 1", globals), Value::number(1.0));
    assert!(lines.lock().unwrap().is_empty());
}

#[test]
fn test_go_with_non_function_is_ignored() {
    let (spawner, tasks) = collecting_spawner();
    let mut vm = vm_with("let n = 3; go n; n", Globals::new()).with_spawner(spawner);
    assert_eq!(vm.run(), Value::number(3.0));
    assert!(tasks.lock().unwrap().is_empty());
}

// Spawned closures share captured scope with the spawning frame. Nothing
// orders their writes; this test serializes them by running the task after
// the parent finished.
#[test]
fn test_spawned_task_shares_captured_state() {
    let (spawner, tasks) = collecting_spawner();
    let mut vm = vm_with("let hits = 0; go (() => { hits = hits + 1 }); hits", Globals::new()).with_spawner(spawner);
    assert_eq!(vm.run(), Value::number(0.0));

    let task = tasks.lock().unwrap().pop().unwrap();
    assert_eq!(task.vars.get("hits"), Some(&Value::number(0.0)));
    task.run();
    assert_eq!(vm.var("hits"), Some(Value::number(1.0)));
}

#[test]
fn test_parallel_vms_share_bytecode() {
    let bc = build("let fact = n => { if (n <= 1) { return 1 } return n * fact(n - 1) }; fact(k)");
    let globals = Globals::new().into_shared();
    let results: Vec<Value> = thread::scope(|s| {
        let handles: Vec<_> = (1..=6)
            .map(|k| {
                let bc = bc.clone();
                let globals = globals.clone();
                s.spawn(move || {
                    let mut vm = Vm::new(bc, globals);
                    vm.set_var("k", Value::number(k as f64));
                    vm.run()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(results, numbers(&[1.0, 2.0, 6.0, 24.0, 120.0, 720.0]).iter_items());
}

#[test]
fn test_vm_and_task_are_send() {
    fn assert_send<T: Send>() {}
    assert_send::<Vm>();
    assert_send::<SpawnedTask>();
    assert_send::<Arc<Bytecode>>();
}
