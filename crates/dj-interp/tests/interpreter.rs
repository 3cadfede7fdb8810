use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use dj_core::Options;
use dj_interp::{InterpretError, Interpreter, ThrownException, Value};
use pretty_assertions::assert_eq;

#[derive(Clone, Default)]
struct Captured(Rc<RefCell<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn session() -> Interpreter {
    Interpreter::with_jdk(Options::default())
}

fn eval(repl: &mut Interpreter, source: &str) -> Value {
    match repl.interpret(source) {
        Ok(Some(value)) => value,
        Ok(None) => panic!("`{source}` produced no value"),
        Err(err) => panic!("`{source}` failed: {err}"),
    }
}

fn run(repl: &mut Interpreter, source: &str) {
    if let Err(err) = repl.interpret(source) {
        panic!("`{source}` failed: {err}");
    }
}

fn error_keys(repl: &mut Interpreter, source: &str) -> Vec<&'static str> {
    match repl.interpret(source) {
        Ok(_) => panic!("`{source}` was accepted"),
        Err(err) => err.keys(),
    }
}

fn thrown(repl: &mut Interpreter, source: &str) -> ThrownException {
    match repl.interpret(source) {
        Err(InterpretError::Thrown(thrown)) => thrown,
        other => panic!("`{source}` should throw, got {other:?}"),
    }
}

#[test]
fn one_plus_two_is_three() {
    let mut repl = session();
    assert_eq!(eval(&mut repl, "1 + 2"), Value::Int(3));
}

#[test]
fn bindings_persist_across_entries() {
    let mut repl = session();
    assert!(repl.interpret("int x = 40;").expect("declare").is_none());
    assert_eq!(eval(&mut repl, "x + 2"), Value::Int(42));
    run(&mut repl, "x++;");
    assert_eq!(eval(&mut repl, "x"), Value::Int(41));
}

#[test]
fn untyped_assignment_declares_a_variable() {
    let mut repl = session();
    run(&mut repl, "y = 7;");
    assert_eq!(eval(&mut repl, "y * 2"), Value::Int(14));
    let names: Vec<String> = repl.variables().into_iter().map(|(name, _, _)| name).collect();
    assert_eq!(names, vec!["y".to_string()]);
}

#[test]
fn untyped_assignment_is_rejected_when_types_are_required() {
    let options = Options {
        require_variable_type: true,
        ..Options::default()
    };
    let mut repl = Interpreter::with_jdk(options);
    assert!(error_keys(&mut repl, "z = 7;").contains(&"undefined.name"));
}

#[test]
fn rejected_entries_leave_the_session_untouched() {
    let mut repl = session();
    assert!(error_keys(&mut repl, "int a = missing;").contains(&"undefined.name"));
    assert!(error_keys(&mut repl, "a").contains(&"undefined.name"));
    run(&mut repl, "int a = 3;");
    assert_eq!(eval(&mut repl, "a"), Value::Int(3));
}

#[test]
fn final_variables_take_one_assignment() {
    let mut repl = session();
    run(&mut repl, "final int k = 1;");
    assert!(error_keys(&mut repl, "k = 2;").contains(&"cannot.modify"));
    assert_eq!(eval(&mut repl, "k"), Value::Int(1));
}

#[test]
fn blank_final_locals_take_exactly_one_assignment() {
    let mut repl = session();
    run(&mut repl, "final int once; once = 4;");
    assert_eq!(eval(&mut repl, "once"), Value::Int(4));

    let keys = error_keys(&mut repl, "final int f; for (int i = 0; i < 2; i++) { f = i; }");
    assert_eq!(keys, vec!["cannot.modify"]);
}

#[test]
fn nested_array_writes_keep_their_targets() {
    let mut repl = session();
    run(&mut repl, "int[] a = new int[2]; int[] b = new int[2];");
    run(&mut repl, "a[0] = (b[1] = 5) + 1;");
    assert_eq!(eval(&mut repl, "a[0]"), Value::Int(6));
    assert_eq!(eval(&mut repl, "b[1]"), Value::Int(5));

    run(&mut repl, "int idx(int[] arr, int v) { arr[0] = v; return 1; }");
    run(&mut repl, "a[idx(b, 9)] = b[0] + 100;");
    assert_eq!(eval(&mut repl, "a[1]"), Value::Int(109));
    assert_eq!(eval(&mut repl, "b[0]"), Value::Int(9));
}

#[test]
fn covariant_array_stores_are_checked() {
    let mut repl = session();
    let thrown = thrown(&mut repl, "Object[] oa = new String[1]; oa[0] = 1;");
    assert_eq!(thrown.class, "java.lang.ArrayStoreException");
}

#[test]
fn failed_static_initialization_is_reported_once() {
    let mut repl = session();
    run(&mut repl, "class S { static int v = 1 / 0; static void touch() {} }");
    assert_eq!(error_keys(&mut repl, "S.v = 3;"), vec!["caught.exception"]);

    let again = thrown(&mut repl, "S.v");
    assert_eq!(again.class, "java.lang.NoClassDefFoundError");
    assert_eq!(again.message.as_deref(), Some("Could not initialize class S"));
    assert_eq!(thrown(&mut repl, "S.touch();").class, "java.lang.NoClassDefFoundError");
}

#[test]
fn static_initializer_failures_are_reported_the_same_on_every_access() {
    let mut repl = session();
    run(&mut repl, "class V { static int v = 1 / 0; static void m() {} }");
    assert_eq!(error_keys(&mut repl, "V.m();"), vec!["caught.exception"]);
    assert_eq!(thrown(&mut repl, "V.m();").class, "java.lang.NoClassDefFoundError");

    run(&mut repl, "class W { static int w = Integer.parseInt(\"x\"); }");
    assert_eq!(error_keys(&mut repl, "int r = W.w;"), vec!["caught.exception"]);
    assert_eq!(thrown(&mut repl, "W.w = 1;").class, "java.lang.NoClassDefFoundError");
}

#[test]
fn top_level_methods_appear_by_name_in_traces() {
    let mut repl = session();
    run(&mut repl, "void boom() { throw new IllegalStateException(\"no\"); }");
    let thrown = thrown(&mut repl, "boom();");
    assert_eq!(thrown.stack_trace.first().map(String::as_str), Some("at boom"));
}

#[test]
fn unfinished_input_is_reported_as_incomplete() {
    let mut repl = session();
    let err = repl.interpret("if (true) {").expect_err("incomplete");
    assert!(err.is_incomplete());
}

#[test]
fn strings_concatenate_with_java_formatting() {
    let mut repl = session();
    let value = eval(&mut repl, r#""a" + 1 + 'b' + 1.5 + true + null"#);
    assert_eq!(value.as_string().as_deref(), Some("a1b1.5truenull"));
    assert_eq!(repl.display(&value), "\"a1b1.5truenull\"");
    let c = eval(&mut repl, "'q'");
    assert_eq!(repl.display(&c), "'q'");
}

#[test]
fn println_goes_to_the_captured_output() {
    let mut repl = session();
    let out = Captured::default();
    repl.set_output(Box::new(out.clone()));
    run(&mut repl, r#"System.out.println("hello " + 3);"#);
    run(&mut repl, r#"System.out.print(4 * 2);"#);
    assert_eq!(out.text().trim_end(), "hello 3\n8".trim_end());
}

#[test]
fn top_level_methods_can_recurse_and_be_replaced() {
    let mut repl = session();
    run(&mut repl, "int fact(int n) { return n <= 1 ? 1 : n * fact(n - 1); }");
    assert_eq!(eval(&mut repl, "fact(5)"), Value::Int(120));
    run(&mut repl, "int fact(int n) { return 0; }");
    assert_eq!(eval(&mut repl, "fact(5)"), Value::Int(0));
}

#[test]
fn classes_declared_in_the_session_can_be_instantiated() {
    let mut repl = session();
    run(
        &mut repl,
        r#"
        class Point {
            int x;
            static int created;
            Point(int x) { this.x = x; created++; }
            int twice() { return x * 2; }
            public String toString() { return "Point(" + x + ")"; }
        }
        "#,
    );
    assert_eq!(eval(&mut repl, "new Point(21).twice()"), Value::Int(42));
    run(&mut repl, "Point p = new Point(5);");
    assert_eq!(eval(&mut repl, "Point.created"), Value::Int(2));
    let p = eval(&mut repl, "p");
    assert_eq!(repl.display(&p), "Point(5)");
}

#[test]
fn overriding_methods_dispatch_on_the_runtime_class() {
    let mut repl = session();
    run(
        &mut repl,
        r#"
        class Animal { String sound() { return "..."; } String speak() { return "says " + sound(); } }
        class Dog extends Animal { String sound() { return "woof"; } }
        "#,
    );
    let value = eval(&mut repl, "Animal a = new Dog(); a.speak()");
    assert_eq!(value.as_string().as_deref(), Some("says woof"));
}

#[test]
fn loops_and_arrays() {
    let mut repl = session();
    run(
        &mut repl,
        r#"
        int[] squares = new int[5];
        for (int i = 0; i < squares.length; i++) { squares[i] = i * i; }
        int total = 0;
        for (int s : squares) total += s;
        "#,
    );
    assert_eq!(eval(&mut repl, "total"), Value::Int(30));
    assert_eq!(eval(&mut repl, "squares[4]"), Value::Int(16));
}

#[test]
fn labeled_break_leaves_the_outer_loop() {
    let mut repl = session();
    run(
        &mut repl,
        r#"
        int hits = 0;
        outer:
        for (int i = 0; i < 10; i++) {
            for (int j = 0; j < 10; j++) {
                if (i * j == 6) break outer;
                hits++;
            }
        }
        "#,
    );
    assert_eq!(eval(&mut repl, "hits"), Value::Int(16));
}

#[test]
fn caught_exceptions_run_the_handler_and_finally() {
    let mut repl = session();
    run(
        &mut repl,
        r#"
        int zero = 0;
        String trace = "";
        try {
            int r = 10 / zero;
            trace += "unreachable";
        } catch (ArithmeticException e) {
            trace += e.getMessage();
        } finally {
            trace += "!";
        }
        "#,
    );
    let value = eval(&mut repl, "trace");
    assert_eq!(value.as_string().as_deref(), Some("/ by zero!"));
}

#[test]
fn uncaught_exceptions_are_reported_with_their_class() {
    let mut repl = session();
    let err = repl.interpret(r#"Integer.parseInt("abc")"#).expect_err("throws");
    let thrown = match err {
        InterpretError::Thrown(thrown) => thrown,
        other => panic!("expected a guest exception, got {other:?}"),
    };
    assert_eq!(thrown.class, "java.lang.NumberFormatException");
    assert_eq!(thrown.message.as_deref(), Some("For input string: \"abc\""));
    assert!(thrown.report().starts_with("Uncaught exception java.lang.NumberFormatException"));
}

#[test]
fn the_session_survives_a_guest_exception() {
    let mut repl = session();
    run(&mut repl, "int before = 1;");
    assert!(repl.interpret("int[] a = new int[2]; a[5] = 1;").is_err());
    assert_eq!(eval(&mut repl, "before"), Value::Int(1));
}

#[test]
fn runaway_recursion_overflows_the_guest_stack() {
    let mut repl = session();
    repl.set_max_depth(16);
    run(&mut repl, "int down(int n) { return down(n + 1); }");
    let err = repl.interpret("down(0)").expect_err("overflows");
    let thrown = match err {
        InterpretError::Thrown(thrown) => thrown,
        other => panic!("expected a guest exception, got {other:?}"),
    };
    assert_eq!(thrown.class, "java.lang.StackOverflowError");
}

#[test]
fn array_lists_iterate_in_insertion_order() {
    let mut repl = session();
    run(
        &mut repl,
        r#"
        import java.util.ArrayList;
        ArrayList<String> list = new ArrayList<String>();
        list.add("a");
        list.add("b");
        list.add(0, "c");
        String joined = "";
        for (String item : list) joined += item;
        "#,
    );
    assert_eq!(eval(&mut repl, "joined").as_string().as_deref(), Some("cab"));
    assert_eq!(eval(&mut repl, "list.size()"), Value::Int(3));
    assert_eq!(eval(&mut repl, "list.toString()").as_string().as_deref(), Some("[c, a, b]"));
}

#[test]
fn switch_on_strings_falls_through() {
    let mut repl = session();
    run(
        &mut repl,
        r#"
        String word = "two";
        int n = 0;
        switch (word) {
            case "one": n += 1;
            case "two": n += 2;
            case "three": n += 3; break;
            default: n = -1;
        }
        "#,
    );
    assert_eq!(eval(&mut repl, "n"), Value::Int(5));
}

#[test]
fn integer_arithmetic_wraps() {
    let mut repl = session();
    assert_eq!(eval(&mut repl, "Integer.MAX_VALUE + 1"), Value::Int(i32::MIN));
    assert_eq!(eval(&mut repl, "-7 / 2"), Value::Int(-3));
    assert_eq!(eval(&mut repl, "-7 % 2"), Value::Int(-1));
    assert_eq!(eval(&mut repl, "1L << 40"), Value::Long(1 << 40));
    assert_eq!(eval(&mut repl, "(byte) 200"), Value::Byte(-56));
}
