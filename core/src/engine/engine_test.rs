#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use crate::config::EngineConfig;
    use crate::engine::{BuildError, Engine, build};
    use crate::rt::TaskRuntime;
    use crate::val::Value;
    use crate::vm::Globals;

    #[test]
    fn test_build_collects_every_parse_error() {
        let err = build("let = 1; let ok = 2; let = 3").unwrap_err();
        let BuildError::Parse(errors) = &err else {
            panic!("expected parse errors, got {err:?}");
        };
        assert!(!errors.is_empty());
        assert_eq!(err.to_string().lines().count(), err.messages().len());
    }

    #[test]
    fn test_build_reports_compile_errors() {
        let args = vec!["1"; 300].join(", ");
        let err = build(&format!("let f = () => 0; f({args})")).unwrap_err();
        assert!(matches!(err, BuildError::Compile(_)), "{err:?}");
        assert!(err.to_string().contains("too many arguments (300, limit 255)"), "{err}");
    }

    #[test]
    fn test_execute_reports_value_and_energy() {
        let program = build("let a = 10; let b = 20; if (a + b > 25) { (a * b) / (b - a) } else { -1 }").unwrap();
        let engine = Engine::default();
        let outcome = engine.execute(&program);
        assert!(outcome.is_ok());
        assert_eq!(outcome.value, Value::number(20.0));
        assert!(outcome.energy > 0);
        assert_eq!(engine.execute(&program), outcome);
    }

    #[test]
    fn test_discovery_registers_host_callbacks() {
        let routes: Arc<Mutex<Vec<(String, Value)>>> = Arc::default();
        let sink = routes.clone();
        let mut globals = Globals::new();
        globals.insert(
            "route",
            Value::native(move |args| {
                let path = args.first().map(Value::text).unwrap_or_default();
                let handler = args.get(1).cloned().unwrap_or_default();
                sink.lock().unwrap().push((path, handler));
                Value::nil()
            }),
        );
        let engine = Engine::default().with_globals(globals);

        let src = "let greeting = 'hello'; route('/a', () => greeting); route('/b', n => n * 2); 'ready'";
        let (program, discovered) = engine.build(src).unwrap();
        assert_eq!(discovered, Value::string("ready"));

        let routes = routes.lock().unwrap();
        assert_eq!(routes.len(), 2);
        let a = routes[0].1.as_lambda().unwrap();
        let b = routes[1].1.as_lambda().unwrap();
        assert_eq!(engine.execute_lambda(&program, a, &[]).value, Value::string("hello"));
        assert_eq!(engine.execute_lambda(&program, b, &[Value::number(4.0)]).value, Value::number(8.0));
    }

    #[test]
    fn test_faults_become_failed_outcomes() {
        let program = build("let f = n => f(n + 1); f(0)").unwrap();
        let engine = Engine::new(EngineConfig {
            max_frames: 8,
            ..EngineConfig::default()
        });
        let outcome = engine.execute(&program);
        assert_eq!(outcome.error.as_deref(), Some("call depth exceeded (8 frames)"));
        assert!(outcome.value.is_invalid());
        assert!(outcome.energy > 0);
    }

    #[test]
    fn test_invalid_results_are_errors() {
        let outcome = Engine::default().execute(&build("let n = 1; n()").unwrap());
        assert_eq!(outcome.error.as_deref(), Some("number is not callable"));
    }

    #[test]
    fn test_host_panic_is_contained() {
        let mut globals = Globals::new();
        globals.insert("explode", Value::native(|_| panic!("kaboom")));
        let engine = Engine::default().with_globals(globals);
        let outcome = engine.execute(&build("1 + explode()").unwrap());
        assert_eq!(outcome.error.as_deref(), Some("panic: kaboom"));
        assert!(outcome.value.is_invalid());

        // The engine keeps working afterwards.
        assert_eq!(engine.execute(&build("2").unwrap()).value, Value::number(2.0));
    }

    #[test]
    fn test_timeout_abandons_slow_scripts() {
        let mut globals = Globals::new();
        globals.insert(
            "slow",
            Value::native(|_| {
                thread::sleep(Duration::from_millis(400));
                Value::nil()
            }),
        );
        let engine = Engine::new(EngineConfig {
            timeout_ms: Some(20),
            ..EngineConfig::default()
        })
        .with_globals(globals);
        let runtime = TaskRuntime::new_multi_thread().unwrap();

        let outcome = engine.execute_with_timeout(&build("slow(); 1").unwrap(), &runtime);
        assert_eq!(outcome.error.as_deref(), Some("execution timed out after 20 ms"));

        let outcome = engine.execute_with_timeout(&build("3 * 3").unwrap(), &runtime);
        assert_eq!(outcome.value, Value::number(9.0));
    }

    #[test]
    fn test_without_timeout_runs_inline() {
        let runtime = TaskRuntime::new_current_thread().unwrap();
        let outcome = Engine::default().execute_with_timeout(&build("'x' + 1").unwrap(), &runtime);
        assert_eq!(outcome.value, Value::string("x1"));
    }

    #[test]
    fn test_engine_runs_programs_concurrently() {
        let engine = Engine::default();
        let program = build("let sq = n => n * n; [1, 2, 3].map(sq)").unwrap();
        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    let outcome = engine.execute(&program);
                    assert_eq!(outcome.value.index(2), Value::number(9.0));
                });
            }
        });
    }
}
