use dj_core::{NodeIdGen, Options, PrimitiveType};
use dj_syntax::ast::*;
use dj_syntax::{parse_compilation_unit, parse_entries, parse_expression, ParseErrorKind, MAX_NESTING};
use pretty_assertions::assert_eq;

fn entries(text: &str) -> Vec<Entry> {
    parse_entries(text, &Options::default(), &mut NodeIdGen::new()).unwrap()
}

fn single_stmt(text: &str) -> Stmt {
    match entries(text).pop() {
        Some(Entry::Stmt(stmt)) => stmt,
        other => panic!("expected a statement, got {other:?}"),
    }
}

fn unit(text: &str) -> CompilationUnit {
    parse_compilation_unit(text, &Options::default(), &mut NodeIdGen::new()).unwrap()
}

fn named(name: &str) -> TypeRefKind {
    TypeRefKind::Named {
        name: name.to_string(),
        args: Vec::new(),
    }
}

#[test]
fn foreach_records_final_and_collection() {
    let stmt = single_stmt("for(final String i:new List());");
    let StmtKind::ForEach {
        is_final,
        var,
        iterable,
        body,
    } = stmt.kind
    else {
        panic!("expected foreach");
    };
    assert!(is_final);
    assert_eq!(var.name, "i");
    assert_eq!(var.ty.kind, named("String"));
    match iterable.kind {
        ExprKind::New { ty, args } => {
            assert_eq!(ty.kind, named("List"));
            assert!(args.is_empty());
        }
        other => panic!("expected allocation, got {other:?}"),
    }
    assert_eq!(body.kind, StmtKind::Empty);
}

#[test]
fn foreach_rejects_static() {
    let err = parse_entries(
        "for(static Integer i:c);",
        &Options::default(),
        &mut NodeIdGen::new(),
    )
    .unwrap_err();
    assert!(!err.incomplete);
}

#[test]
fn int_and_long_literal_boundaries() {
    let mut ids = NodeIdGen::new();
    let lit = |text: &str, ids: &mut NodeIdGen| parse_expression(text, ids).map(|e| e.kind);

    assert_eq!(
        lit("2147483647", &mut ids).unwrap(),
        ExprKind::Literal(Literal::Int(i32::MAX))
    );
    assert_eq!(
        lit("-2147483648", &mut ids).unwrap(),
        ExprKind::Literal(Literal::Int(i32::MIN))
    );
    assert_eq!(
        lit("9223372036854775807L", &mut ids).unwrap(),
        ExprKind::Literal(Literal::Long(i64::MAX))
    );
    assert_eq!(
        lit("-9223372036854775808L", &mut ids).unwrap(),
        ExprKind::Literal(Literal::Long(i64::MIN))
    );

    for text in [
        "2147483648",
        "-2147483649",
        "9223372036854775808L",
        "-9223372036854775809L",
    ] {
        let err = parse_expression(text, &mut ids).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::NumberFormat, "{text}");
        assert_eq!(err.key(), "number.format");
    }
}

#[test]
fn varargs_parameter_is_an_array() {
    let unit = unit("class A { void m(int x, String... s) {} }");
    let MemberDecl::Method(method) = &unit.types[0].members[0] else {
        panic!("expected method");
    };
    assert!(method.is_var_args());
    let last = method.params.last().unwrap();
    assert!(last.var_args);
    match &last.ty.kind {
        TypeRefKind::Array(elem) => assert_eq!(elem.kind, named("String")),
        other => panic!("expected array type, got {other:?}"),
    }
    assert!(!method.params[0].var_args);
}

#[test]
fn varargs_misuse_is_rejected() {
    let options = Options::default();
    for text in [
        "class A { void m(String... a, int... b) {} }",
        "class A { void m(String... a, int b) {} }",
    ] {
        assert!(
            parse_compilation_unit(text, &options, &mut NodeIdGen::new()).is_err(),
            "{text}"
        );
    }
}

#[test]
fn missing_semicolon_after_package_and_import_is_recovered() {
    let unit = unit("package p\nimport java.util.List\nimport java.util.*;\nclass A {}");
    assert_eq!(unit.package.as_ref().unwrap().name, "p");
    assert_eq!(unit.imports.len(), 2);
    assert!(unit.imports[1].is_star);
    assert_eq!(unit.types[0].name, "A");

    let err = parse_compilation_unit(
        "package p\nint x;",
        &Options::default(),
        &mut NodeIdGen::new(),
    )
    .unwrap_err();
    assert!(err.message.contains("`;`"));
}

#[test]
fn trailing_expression_without_semicolon_is_displayed() {
    let parsed = entries("int x = 1; x + 2");
    assert_eq!(parsed.len(), 2);
    assert!(matches!(parsed[0], Entry::Stmt(_)));
    assert!(matches!(
        &parsed[1],
        Entry::Expr(Expr {
            kind: ExprKind::Binary {
                op: BinaryOp::Add,
                ..
            },
            ..
        })
    ));

    let parsed = entries("x + 2;");
    assert!(matches!(parsed[0], Entry::Stmt(_)));
}

#[test]
fn required_semicolon_rejects_unterminated_entry() {
    let options = Options {
        require_semicolon: true,
        ..Options::default()
    };
    let err = parse_entries("int x = 1", &options, &mut NodeIdGen::new()).unwrap_err();
    assert!(err.incomplete);
}

#[test]
fn unterminated_block_is_incomplete() {
    let err = parse_entries(
        "while (true) {",
        &Options::default(),
        &mut NodeIdGen::new(),
    )
    .unwrap_err();
    assert!(err.incomplete);

    let err = parse_entries("int x = ;", &Options::default(), &mut NodeIdGen::new()).unwrap_err();
    assert!(!err.incomplete);
}

#[test]
fn repl_mixes_classes_methods_and_statements() {
    let parsed = entries(
        "import java.util.*;\n\
         class Point { int x; Point(int x) { this.x = x; } }\n\
         static int twice(int v) { return v * 2; }\n\
         twice(new Point(3).x)",
    );
    assert!(matches!(parsed[0], Entry::Import(_)));
    assert!(matches!(&parsed[1], Entry::Type(t) if t.name == "Point"));
    assert!(matches!(&parsed[2], Entry::Method(m) if m.name == "twice" && m.modifiers.is_static()));
    assert!(matches!(&parsed[3], Entry::Expr(e) if matches!(e.kind, ExprKind::MethodCall { .. })));
}

#[test]
fn generics_and_wildcards() {
    let unit = unit(
        "class Box<T extends Comparable<T> & java.io.Serializable> {\n\
           java.util.List<? extends Number> a;\n\
           java.util.Map<String, java.util.List<? super T>> b;\n\
           int c = x >> 2 >>> 1;\n\
         }",
    );
    let decl = &unit.types[0];
    assert_eq!(decl.type_params[0].name, "T");
    assert_eq!(decl.type_params[0].bounds.len(), 2);
    let fields: Vec<&FieldDecl> = decl.fields().collect();
    match &fields[0].ty.kind {
        TypeRefKind::Named { name, args } => {
            assert_eq!(name, "java.util.List");
            assert!(matches!(
                args[0],
                TypeArg::Wildcard {
                    bound: Some((WildcardKind::Extends, _)),
                    ..
                }
            ));
        }
        other => panic!("unexpected {other:?}"),
    }
    match &fields[2].init.as_ref().unwrap().kind {
        ExprKind::Binary { op, lhs, .. } => {
            assert_eq!(*op, BinaryOp::UShr);
            assert!(matches!(lhs.kind, ExprKind::Binary { op: BinaryOp::Shr, .. }));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn compound_shift_assignment_and_casts() {
    let stmt = single_stmt("x >>>= 3;");
    let StmtKind::Expr(expr) = stmt.kind else {
        panic!("expected expression statement");
    };
    assert!(matches!(
        expr.kind,
        ExprKind::Assign {
            op: Some(BinaryOp::UShr),
            ..
        }
    ));

    let mut ids = NodeIdGen::new();
    let cast = parse_expression("(int) -1.5", &mut ids).unwrap();
    assert!(matches!(
        cast.kind,
        ExprKind::Cast {
            ty: TypeRef {
                kind: TypeRefKind::Primitive(PrimitiveType::Int),
                ..
            },
            ..
        }
    ));
    let paren = parse_expression("(a) + b", &mut ids).unwrap();
    assert!(matches!(paren.kind, ExprKind::Binary { op: BinaryOp::Add, .. }));
    let generic = parse_expression("a < b && c > d", &mut ids).unwrap();
    assert!(matches!(generic.kind, ExprKind::Binary { op: BinaryOp::And, .. }));
}

#[test]
fn node_ids_are_unique_across_entries() {
    let mut ids = NodeIdGen::new();
    let options = Options::default();
    let a = parse_entries("1 + 2", &options, &mut ids).unwrap();
    let b = parse_entries("1 + 2", &options, &mut ids).unwrap();
    let (Entry::Expr(a), Entry::Expr(b)) = (&a[0], &b[0]) else {
        panic!("expected expressions");
    };
    assert_ne!(a.id, b.id);
}

#[test]
fn statements_cover_control_flow() {
    let parsed = entries(
        "outer: for (int i = 0, j = 1; i < 10; i++, j--) {\n\
           switch (i) { case 1: case 2: continue outer; default: break; }\n\
           do { i += 2; } while (i < 3);\n\
           try { throw new RuntimeException(\"x\"); }\n\
           catch (IllegalStateException | IllegalArgumentException e) {}\n\
           finally { int[] a = {1, 2}; int b[] = new int[3]; }\n\
         }",
    );
    let Entry::Stmt(Stmt {
        kind: StmtKind::Labeled { label, body },
        ..
    }) = &parsed[0]
    else {
        panic!("expected labeled statement");
    };
    assert_eq!(label, "outer");
    let StmtKind::For { init, update, .. } = &body.kind else {
        panic!("expected for");
    };
    assert!(matches!(&init[0].kind, StmtKind::LocalVar { declarators, .. } if declarators.len() == 2));
    assert_eq!(update.len(), 2);
}

#[test]
fn interface_members_get_implicit_modifiers() {
    let unit = unit("interface Shape { int SIDES = 0; double area(); static Shape unit() { return null; } }");
    let decl = &unit.types[0];
    assert!(decl.is_interface());
    let field = decl.fields().next().unwrap();
    assert!(field.modifiers.is_static() && field.modifiers.is_final());
    let methods: Vec<&MethodDecl> = decl.methods().collect();
    assert!(methods[0].modifiers.is_abstract());
    assert!(!methods[1].modifiers.is_abstract());
}

/// Runs `f` on a thread with room for a few hundred levels of recursion.
fn with_deep_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    std::thread::Builder::new()
        .stack_size(256 << 20)
        .spawn(f)
        .unwrap()
        .join()
        .unwrap()
}

#[test]
fn deep_nesting_is_a_parse_error() {
    with_deep_stack(|| {
        let parse = |text: String| parse_entries(&text, &Options::default(), &mut NodeIdGen::new());
        let parens = |n: usize| format!("int x = {}1{};", "(".repeat(n), ")".repeat(n));

        assert!(parse(parens(100)).is_ok());
        let err = parse(parens(20_000)).unwrap_err();
        assert!(!err.incomplete);
        assert_eq!(err.kind, ParseErrorKind::Syntax);
        assert!(err.message.contains("Nesting deeper than"), "{}", err.message);

        assert!(parse(format!("int y = 1{};", " + 1".repeat(100))).is_ok());
        assert!(parse(format!("int y = 1{};", " + 1".repeat(MAX_NESTING + 10))).is_err());
        assert!(parse(format!("int z = {}1;", "-".repeat(20_000))).is_err());
        assert!(parse(format!("{}{}", "{".repeat(20_000), "}".repeat(20_000))).is_err());
    });
}
