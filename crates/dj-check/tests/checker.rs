use std::rc::Rc;

use dj_check::{CompilationUnitChecker, Resolution};
use dj_core::{NodeIdGen, Options};
use dj_syntax::ast::{CompilationUnit, MemberDecl, StmtKind};
use dj_syntax::parse_compilation_unit;
use dj_types::{ClassLibrary, LibraryContext, Type};
use pretty_assertions::assert_eq;

fn parse(sources: &[&str], ids: &mut NodeIdGen) -> Vec<CompilationUnit> {
    sources
        .iter()
        .map(|src| parse_compilation_unit(src, &Options::default(), ids).expect("parse"))
        .collect()
}

fn jdk() -> LibraryContext {
    LibraryContext::new(vec![Rc::new(ClassLibrary::jdk())])
}

fn check_with(options: Options, sources: &[&str]) -> Vec<&'static str> {
    let mut ids = NodeIdGen::new();
    let units = parse(sources, &mut ids);
    let mut checker = CompilationUnitChecker::new(jdk(), options);
    match checker.check(&units) {
        Ok(()) => Vec::new(),
        Err(errors) => errors.keys(),
    }
}

fn check(sources: &[&str]) -> Vec<&'static str> {
    check_with(Options::default(), sources)
}

#[test]
fn accepts_a_small_program() {
    let errors = check(&[r#"
        import java.util.*;

        public class Counter {
            private int count;
            private final List<String> log = new ArrayList<String>();

            public Counter(int start) { count = start; }

            public int next() {
                count++;
                log.add("next " + count);
                return count;
            }

            public static void main(String[] args) {
                Counter c = new Counter(3);
                for (int i = 0; i < 2; i++) {
                    System.out.println(c.next());
                }
                for (String entry : c.log) {
                    System.out.println(entry.length());
                }
            }
        }
    "#]);
    assert_eq!(errors, Vec::<&str>::new());
}

#[test]
fn division_and_remainder_follow_the_promotion_ladder() {
    let errors = check(&[r#"
        class Numbers {
            double a(int x, double y) { return x / y; }
            float b(long x, float y) { return x % y; }
            long c(int x, long y) { return x / y; }
            int d(char x, short y) { return x % y; }
            int e(Integer x) { return x / 2; }
        }
    "#]);
    assert_eq!(errors, Vec::<&str>::new());

    let errors = check(&[r#"
        class Numbers {
            int narrowing(long x) { return x / 2; }
            int bool(boolean b) { return b % 2; }
            int text(String s) { return s / 2; }
        }
    "#]);
    assert_eq!(errors, vec!["assignment.types", "numeric.expected", "numeric.expected"]);
}

#[test]
fn boxed_operands_are_rejected_when_boxing_is_prohibited() {
    let options = Options {
        prohibit_boxing: true,
        ..Options::default()
    };
    let errors = check_with(options, &["class B { int f(Integer x) { return x / 2; } }"]);
    assert_eq!(errors, vec!["numeric.expected"]);
}

#[test]
fn return_statements_must_match_the_method() {
    let errors = check(&[r#"
        class R {
            int noReturn() { }
            void valueInVoid() { return 5; }
            int bareReturn() { return; }
            void fine() { return; }
            int loops() { while (true) { } }
            int branches(int x) { if (x > 0) return 1; else return 2; }
            int throwing() { throw new IllegalStateException("no"); }
            int switched(int x) {
                switch (x) {
                    case 1: return 10;
                    default: return 0;
                }
            }
        }
    "#]);
    assert_eq!(
        errors,
        vec!["assignment.types", "assignment.types", "assignment.types"]
    );
}

#[test]
fn classes_may_reference_each_other_in_any_order() {
    let a = "class A { B partner; int size() { return partner.count + 1; } }";
    let b = "class B { A owner; int count; A back() { return owner; } }";
    assert_eq!(check(&[a, b]), Vec::<&str>::new());
    assert_eq!(check(&[b, a]), Vec::<&str>::new());
}

#[test]
fn final_variables_and_fields_cannot_be_reassigned() {
    let errors = check(&[r#"
        class F {
            final int id;
            static final int LIMIT = 3;

            F(int id) { this.id = id; }

            void change() {
                final int x = 1;
                x = 2;
                id = 4;
                LIMIT = 5;
            }

            void late() {
                final int y;
                y = 3;
            }
        }
    "#]);
    assert_eq!(errors, vec!["cannot.modify", "cannot.modify", "cannot.modify"]);
}

#[test]
fn instance_members_are_not_visible_from_static_code() {
    let errors = check(&[r#"
        class S {
            int value;
            int get() { return value; }
            static int broken() { return value + get(); }
            static int thisless() { return this.value; }
        }
    "#]);
    assert_eq!(
        errors,
        vec!["static.context", "static.context", "static.context"]
    );
}

#[test]
fn declaration_errors_are_collected() {
    let errors = check(&[r#"
        class Loop1 extends Loop2 { }
        class Loop2 extends Loop1 { }
        class Text extends String { }
        abstract class Shape { abstract double area(); }
        class Square extends Shape { }
        class Dup { int a; int a; }
    "#]);
    assert_eq!(
        errors,
        vec![
            "final.superclass",
            "duplicate.declaration",
            "cyclic.inheritance",
            "cyclic.inheritance",
            "missing.implementation",
        ]
    );
}

#[test]
fn body_errors_are_reported_with_stable_keys() {
    let errors = check(&[r#"
        abstract class Base { }
        class Body {
            void run(Object o) {
                int n = missing;
                String s = 5;
                new Base();
                Math.nosuch(1);
                if (n) { }
                break;
                for (String t : n) { }
                try { } catch (String e) { }
                Object c = (Integer) "text";
            }
        }
    "#]);
    assert_eq!(
        errors,
        vec![
            "undefined.name",
            "assignment.types",
            "abstract.instantiation",
            "no.such.method",
            "condition.type",
            "misplaced.jump",
            "foreach.type",
            "throwable.expected",
            "cast.types",
        ]
    );
}

#[test]
fn private_access_is_enforced_only_when_requested() {
    let sources = [
        "class Vault { private int secret = 42; }",
        "class Thief { int steal(Vault v) { return v.secret; } }",
    ];
    assert_eq!(check(&sources), Vec::<&str>::new());
    let options = Options {
        enforce_private_access: true,
        ..Options::default()
    };
    assert_eq!(check_with(options, &sources), vec!["illegal.access"]);
}

#[test]
fn unchecked_casts_are_rejected_when_prohibited() {
    let source = "import java.util.List; class U { List<String> f(Object o) { return (List<String>) o; } }";
    assert_eq!(check(&[source]), Vec::<&str>::new());
    let options = Options {
        prohibit_unchecked_casts: true,
        ..Options::default()
    };
    assert_eq!(check_with(options, &[source]), vec!["unchecked.cast"]);
}

#[test]
fn checked_calls_are_recorded_in_the_table() {
    let mut ids = NodeIdGen::new();
    let units = parse(&["class T { long f() { return Math.max(1, 2L); } }"], &mut ids);
    let mut checker = CompilationUnitChecker::new(jdk(), Options::default());
    checker.check(&units).unwrap();

    let MemberDecl::Method(method) = &units[0].types[0].members[0] else {
        panic!("expected a method");
    };
    let body = method.body.as_ref().unwrap();
    let StmtKind::Return(Some(call)) = &body.stmts[0].kind else {
        panic!("expected a return");
    };
    let table = checker.checker().table();
    assert_eq!(table.type_of(call.id), Some(&Type::LONG));
    let Some(Resolution::Method(method)) = table.resolution(call.id) else {
        panic!("call was not resolved");
    };
    assert_eq!(method.owner, "java.lang.Math");
    assert_eq!(method.signature(), "max(long,long)");
}
