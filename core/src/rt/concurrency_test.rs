#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use crate::ast::parse;
    use crate::rt::{TaskRuntime, shared_runtime};
    use crate::val::Value;
    use crate::vm::{Globals, Vm, compile};

    fn vm_for(src: &str, globals: Globals) -> Vm {
        let program = parse(src).unwrap();
        Vm::new(Arc::new(compile(&program).unwrap()), globals.into_shared())
    }

    fn channel_globals() -> (Globals, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let mut globals = Globals::new();
        globals.insert(
            "send",
            Value::native(move |args| {
                let text = args.first().map(Value::text).unwrap_or_default();
                let _ = tx.lock().unwrap().send(text);
                Value::nil()
            }),
        );
        (globals, rx)
    }

    #[test]
    fn test_go_runs_on_blocking_pool() {
        let runtime = Arc::new(TaskRuntime::new_multi_thread().unwrap());
        let (globals, rx) = channel_globals();
        let mut vm = vm_for("let who = 'child'; go send(who); 'parent'", globals).with_spawner(runtime.clone());
        assert_eq!(vm.run(), Value::string("parent"));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "child");
        assert_eq!(runtime.spawned(), 1);
    }

    #[test]
    fn test_many_spawned_tasks_all_complete() {
        let runtime = Arc::new(TaskRuntime::new_current_thread().unwrap());
        let (globals, rx) = channel_globals();
        // Each call gets its own frame scope, so every task sees its own `n`.
        let src = "let fire = n => { go send(n) }; for i in [1, 2, 3, 4, 5] { fire(i) }";
        let mut vm = vm_for(src, globals).with_spawner(runtime.clone());
        vm.run();

        let mut got: Vec<String> = (0..5).map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap()).collect();
        got.sort();
        assert_eq!(got, vec!["1", "2", "3", "4", "5"]);
        assert!(!runtime.is_multi_threaded());
    }

    #[test]
    fn test_run_with_timeout_returns_result() {
        let runtime = TaskRuntime::new_current_thread().unwrap();
        let mut vm = vm_for("let f = n => n * 2; f(21)", Globals::new());
        let value = runtime.run_with_timeout(move || vm.run(), Duration::from_secs(5)).unwrap();
        assert_eq!(value, Value::number(42.0));
    }

    #[test]
    fn test_run_with_timeout_gives_up_on_slow_work() {
        let runtime = TaskRuntime::new_multi_thread().unwrap();
        let err = runtime
            .run_with_timeout(|| thread::sleep(Duration::from_millis(500)), Duration::from_millis(20))
            .unwrap_err();
        assert_eq!(err.to_string(), "execution timed out after 20 ms");
    }

    #[test]
    fn test_run_with_timeout_reports_panics() {
        let runtime = TaskRuntime::new_current_thread().unwrap();
        let err = runtime
            .run_with_timeout(|| -> Value { panic!("boom") }, Duration::from_secs(5))
            .unwrap_err();
        assert!(err.to_string().starts_with("execution failed"), "{err}");
    }

    #[test]
    fn test_shared_runtime_is_reused() {
        let a = shared_runtime().unwrap();
        let b = shared_runtime().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.block_on(async { 1 + 1 }), 2);
    }
}
