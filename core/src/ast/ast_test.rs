#[cfg(test)]
mod test {
    use crate::ast::{Binding, Expr, MAX_NESTING_DEPTH, Parser, Stmt, TemplatePart, parse};
    use crate::token::TokenKind;
    use crate::val::Value;

    fn render(src: &str) -> String {
        let program = parse(src).unwrap_or_else(|errs| panic!("parse failed: {errs:?}"));
        program.to_string()
    }

    fn single_expr(src: &str) -> Expr {
        let mut program = parse(src).unwrap();
        assert_eq!(program.statements.len(), 1, "{src}");
        match program.statements.remove(0) {
            Stmt::Expr(e) => e,
            other => panic!("expected expression statement, got {other}"),
        }
    }

    fn errors(src: &str) -> Vec<String> {
        match parse(src) {
            Ok(p) => panic!("expected errors, parsed {p}"),
            Err(errs) => errs.into_iter().map(|e| e.message).collect(),
        }
    }

    #[test]
    fn precedence() {
        let cases = [
            ("a + b * c", "(a + (b * c))"),
            ("a * b + c", "((a * b) + c)"),
            ("-a * b", "((-a) * b)"),
            ("!a == b", "((!a) == b)"),
            ("a + b % c", "(a + (b % c))"),
            ("a < b == c > d", "((a < b) == (c > d))"),
            ("a && b || c", "((a && b) || c)"),
            ("a || b && c", "(a || (b && c))"),
            ("a ?? b || c", "((a ?? b) || c)"),
            ("(a + b) * c", "((a + b) * c)"),
            ("a - b - c", "((a - b) - c)"),
            ("-a.b", "(-a.b)"),
            ("a.b.c(1)[0]", "(a.b.c(1)[0])"),
            ("f(a + b, c)", "f((a + b), c)"),
        ];
        for (src, want) in cases {
            assert_eq!(render(src), want, "{src}");
        }
    }

    #[test]
    fn assignment_is_right_associative() {
        match single_expr("a = b = 1") {
            Expr::Assign { target, value } => {
                assert!(matches!(*target, Expr::Identifier(ref n) if &**n == "a"));
                assert!(matches!(*value, Expr::Assign { .. }));
            }
            other => panic!("unexpected {other}"),
        }
        assert_eq!(render("o.x = 1 + 2"), "o.x = (1 + 2)");
        assert_eq!(render("o[k] = v"), "(o[k]) = v");
    }

    #[test]
    fn invalid_assignment_target() {
        let errs = errors("1 = 2");
        assert!(errs[0].starts_with("invalid assignment target"), "{errs:?}");
    }

    #[test]
    fn literals() {
        assert!(matches!(single_expr("42"), Expr::Literal(v) if v == Value::number(42.0)));
        assert!(matches!(single_expr("'hi'"), Expr::Literal(v) if v == Value::string("hi")));
        assert!(matches!(single_expr("null"), Expr::Literal(v) if v.is_nil()));
        assert!(matches!(single_expr("true"), Expr::Literal(v) if v == Value::bool(true)));
    }

    #[test]
    fn arrays_and_objects() {
        assert_eq!(render("[1, 2, 3,]"), "[1, 2, 3]");
        assert_eq!(render("[]"), "[]");
        assert_eq!(render("let o = {a: 1, 'b': 2, [k]: 3, c}"), r#"let o = {"a": 1, "b": 2, k: 3, "c": c};"#);
        assert_eq!(render("let o = {in: 1}"), r#"let o = {"in": 1};"#);
    }

    #[test]
    fn arrow_functions() {
        match single_expr("(a, b) => a + b") {
            Expr::Function(f) => {
                assert_eq!(f.params.len(), 2);
                assert!(matches!(f.body.statements[0], Stmt::Return(Some(_))));
            }
            other => panic!("unexpected {other}"),
        }
        match single_expr("x => { return x }") {
            Expr::Function(f) => assert_eq!(&*f.params[0], "x"),
            other => panic!("unexpected {other}"),
        }
        match single_expr("() => 1") {
            Expr::Function(f) => assert!(f.params.is_empty()),
            other => panic!("unexpected {other}"),
        }
        assert_eq!(render("[1].map(x => x * 2)"), "[1].map((x) => { return (x * 2); })");
    }

    #[test]
    fn grouping_is_not_params_without_arrow() {
        assert_eq!(render("(a)"), "a");
        assert_eq!(render("f((a), b)"), "f(a, b)");
    }

    #[test]
    fn function_ids_are_unique() {
        let program = parse("let f = x => y => x + y; let g = () => 1").unwrap();
        assert_eq!(program.fn_count, 3);
    }

    #[test]
    fn if_expression() {
        match single_expr("if (a > 1) { 1 } else { 2 }") {
            Expr::If {
                consequence,
                alternative,
                ..
            } => {
                assert_eq!(consequence.statements.len(), 1);
                assert!(alternative.is_some());
            }
            other => panic!("unexpected {other}"),
        }
        match single_expr("if x return 1; else if y { 2 }") {
            Expr::If { alternative, .. } => {
                let alt = alternative.unwrap();
                assert!(matches!(alt.statements[0], Stmt::Expr(Expr::If { .. })));
            }
            other => panic!("unexpected {other}"),
        }
        assert!(matches!(single_expr("if (a) { 1 }"), Expr::If { alternative: None, .. }));
    }

    #[test]
    fn declarations_and_destructuring() {
        let program = parse("let a = 1; const {x, y} = p; let [first, second] = xs; let z;").unwrap();
        let bindings: Vec<_> = program
            .statements
            .iter()
            .map(|s| match s {
                Stmt::VarDecl { binding, .. } => binding.clone(),
                other => panic!("unexpected {other}"),
            })
            .collect();
        assert_eq!(bindings[0], Binding::Name("a".into()));
        assert_eq!(bindings[1], Binding::Object(vec!["x".into(), "y".into()]));
        assert_eq!(bindings[2], Binding::Array(vec!["first".into(), "second".into()]));
        assert!(matches!(&program.statements[1], Stmt::VarDecl { is_const: true, .. }));
        assert!(matches!(&program.statements[3], Stmt::VarDecl { value: Expr::Literal(v), .. } if v.is_nil()));
    }

    #[test]
    fn const_requires_initializer() {
        let errs = errors("const a;");
        assert_eq!(errs[0], "expected =, got ;");
    }

    #[test]
    fn return_forms() {
        let program = parse("() => { return; }; () => { return 1 }").unwrap();
        assert_eq!(program.statements.len(), 2);
        assert_eq!(render("() => { return }"), "() => { return; }");
    }

    #[test]
    fn for_in_both_forms() {
        assert_eq!(render("for (x in xs) { x }"), "for (x in xs) { x }");
        assert_eq!(render("for x in [1, 2] { log(x) }"), "for (x in [1, 2]) { log(x) }");
    }

    #[test]
    fn defer_and_go_wrap_calls() {
        let program = parse("defer log('bye'); go (() => 1); go work(1)").unwrap();
        match &program.statements[0] {
            Stmt::Defer(Expr::Function(f)) => {
                assert!(f.params.is_empty());
                assert!(matches!(f.body.statements[0], Stmt::Expr(Expr::Call { .. })));
            }
            other => panic!("unexpected {other}"),
        }
        assert!(matches!(&program.statements[1], Stmt::Spawn(Expr::Function(_))));
        assert!(matches!(&program.statements[2], Stmt::Spawn(Expr::Function(_))));
        assert_eq!(program.fn_count, 3);
    }

    #[test]
    fn method_call_versus_member() {
        assert!(matches!(single_expr("a.b"), Expr::Member { .. }));
        assert!(matches!(single_expr("a.b()"), Expr::MethodCall { .. }));
        assert!(matches!(single_expr("a.b.c()"), Expr::MethodCall { object, .. } if matches!(*object, Expr::Member { .. })));
    }

    #[test]
    fn templates() {
        match single_expr("`hi ${name}, ${1 + 2}!`") {
            Expr::Template(parts) => {
                assert_eq!(parts.len(), 5);
                assert!(matches!(&parts[0], TemplatePart::Text(t) if &**t == "hi "));
                assert!(matches!(&parts[1], TemplatePart::Expr(Expr::Identifier(_))));
                assert!(matches!(&parts[3], TemplatePart::Expr(Expr::Infix { op: TokenKind::Plus, .. })));
                assert!(matches!(&parts[4], TemplatePart::Text(t) if &**t == "!"));
            }
            other => panic!("unexpected {other}"),
        }
        assert!(matches!(single_expr("`${ {a: 1}.a }`"), Expr::Template(p) if p.len() == 1));
        assert!(errors("`${}`")[0].starts_with("in template: no prefix parse function"));
        assert_eq!(errors("`${a`")[0], "unterminated template expression");
    }

    #[test]
    fn stray_semicolons_are_ignored() {
        let program = parse(";;let a = 1;;; a;").unwrap();
        assert_eq!(program.statements.len(), 2);
    }

    #[test]
    fn errors_accumulate_without_abort() {
        let mut parser = Parser::new("let = 1; let b = ; let c = 3");
        let program = parser.parse_program();
        assert!(parser.errors().len() >= 2, "{:?}", parser.errors());
        assert!(program.statements.iter().any(|s| matches!(s, Stmt::VarDecl { binding: Binding::Name(n), .. } if &**n == "c")));
    }

    #[test]
    fn expected_token_messages() {
        assert_eq!(errors("f(1, 2")[0], "expected ), got EOF");
        assert_eq!(errors("[1 2]")[0], "expected ], got NUMBER");
        assert!(errors(")")[0].starts_with("no prefix parse function for )"));
    }

    #[test]
    fn lexer_problems_surface_as_errors() {
        assert_eq!(errors("1.2.3")[0], "invalid number literal '1.2.3'");
        assert_eq!(errors("a # b")[0], "illegal token '#'");
        assert_eq!(errors("'open")[0], "unterminated string");
    }

    #[test]
    fn nesting_is_bounded() {
        let too_deep = format!("expression nested too deeply (limit {MAX_NESTING_DEPTH})");
        let parens = format!("{}1{}", "(".repeat(50_000), ")".repeat(50_000));
        assert_eq!(errors(&parens), vec![too_deep.clone()]);
        let blocks = format!("{}{}", "{".repeat(50_000), "}".repeat(50_000));
        assert_eq!(errors(&blocks), vec![too_deep.clone()]);
        let arrays = format!("{}{}", "[".repeat(50_000), "]".repeat(50_000));
        assert_eq!(errors(&arrays), vec![too_deep.clone()]);
        let negations = format!("{}1", "-".repeat(50_000));
        assert_eq!(errors(&negations), vec![too_deep.clone()]);
        let chain = vec!["1"; 10_000].join(" + ");
        assert_eq!(errors(&chain), vec![too_deep]);

        let fine = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(render(&fine), "1");
        assert!(parse(&vec!["1"; 100].join(" + ")).is_ok());
    }

    #[test]
    fn error_positions() {
        let err = parse("let a = 1\nlet b = )").unwrap_err();
        let pos = err[0].position.unwrap();
        assert_eq!((pos.line, pos.column), (2, 9));
    }

    #[test]
    fn scenario_parses() {
        let src = "let a=10; let b=20; if (a+b>25) { (a*b)/(b-a) } else { -1 }";
        let program = parse(src).unwrap();
        assert_eq!(program.statements.len(), 3);
        assert_eq!(
            program.statements[2].to_string(),
            "if ((a + b) > 25) { ((a * b) / (b - a)) } else { (-1) }"
        );
    }
}
