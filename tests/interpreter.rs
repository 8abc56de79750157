use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use pretty_assertions::assert_eq;

use rox::driver::run_source;
use rox::error::LoxError;
use rox::interpreter::Interpreter;
use rox::token::Token;
use rox::value::Value;

/// In-memory sink so tests can read back what `print` wrote.
#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("output should be UTF-8")
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn interpreter() -> (Interpreter, SharedBuf) {
    let buf = SharedBuf::default();
    (Interpreter::with_output(Box::new(buf.clone())), buf)
}

/// Runs a program that is expected to succeed and returns its output.
fn run(source: &str) -> String {
    let (mut interpreter, buf) = interpreter();
    if let Err(errors) = run_source(&mut interpreter, source) {
        panic!("program failed: {:?}", errors);
    }
    buf.contents()
}

/// Runs a program that is expected to fail; returns its output and errors.
fn run_err(source: &str) -> (String, Vec<LoxError>) {
    let (mut interpreter, buf) = interpreter();
    let errors = run_source(&mut interpreter, source).expect_err("program should fail");
    (buf.contents(), errors)
}

fn runtime_message(errors: &[LoxError]) -> &str {
    match errors {
        [LoxError::Runtime { message, .. }] => message.as_str(),
        other => panic!("expected one runtime error, got {:?}", other),
    }
}

#[test]
fn test_arithmetic_and_strings() {
    assert_eq!(
        run("print 1 + 2 * 3; print 10 / 4; print \"a\" + \"b\"; print -(3 - 5);"),
        "7\n2.5\nab\n2\n"
    );
}

#[test]
fn test_block_shadowing_restores_outer() {
    assert_eq!(run("var a = 1; { var a = 2; print a; } print a;"), "2\n1\n");
}

#[test]
fn test_closure_counter() {
    let source = "
        fun makeCounter() {
            var i = 0;
            fun count() { i = i + 1; print i; }
            return count;
        }
        var counter = makeCounter();
        counter();
        counter();";

    assert_eq!(run(source), "1\n2\n");
}

#[test]
fn test_independent_closures() {
    let source = "
        fun make() { var n = 0; fun inc() { n = n + 1; return n; } return inc; }
        var a = make();
        var b = make();
        a(); a();
        print a();
        print b();";

    assert_eq!(run(source), "3\n1\n");
}

#[test]
fn test_closure_binds_by_resolution_not_by_time() {
    let source = "
        var a = \"global\";
        {
            fun showA() { print a; }
            showA();
            var a = \"block\";
            showA();
        }";

    assert_eq!(run(source), "global\nglobal\n");
}

#[test]
fn test_assigning_undeclared_variable_fails() {
    let (_, errors) = run_err("x = 1;");
    assert_eq!(runtime_message(&errors), "Undefined variable 'x'.");
}

#[test]
fn test_reading_undeclared_variable_fails() {
    let (_, errors) = run_err("print nope;");
    assert_eq!(runtime_message(&errors), "Undefined variable 'nope'.");
    assert_eq!(errors[0].to_string(), "Undefined variable 'nope'.\n[line 1]");
}

#[test]
fn test_global_forward_reference() {
    let source = "
        fun early() { return later(); }
        fun later() { return \"ok\"; }
        print early();";

    assert_eq!(run(source), "ok\n");
}

#[test]
fn test_inheritance_and_super() {
    let source = "
        class A {
            method() { print \"A method\"; }
        }
        class B < A {
            method() { print \"B method\"; }
            test() { super.method(); }
        }
        class C < B {}
        C().test();";

    assert_eq!(run(source), "A method\n");
}

#[test]
fn test_inherited_and_overridden_methods() {
    let source = "
        class Animal {
            speak() { return \"...\"; }
            name() { return \"animal\"; }
        }
        class Dog < Animal {
            speak() { return \"woof\"; }
        }
        var d = Dog();
        print d.speak();
        print d.name();";

    assert_eq!(run(source), "woof\nanimal\n");
}

#[test]
fn test_initializer_sets_fields() {
    let source = "
        class Point {
            init(x, y) { this.x = x; this.y = y; }
            sum() { return this.x + this.y; }
        }
        print Point(1, 2).sum();";

    assert_eq!(run(source), "3\n");
}

#[test]
fn test_bare_return_in_initializer_yields_instance() {
    let source = "
        class P {
            init(flag) {
                this.v = 1;
                if (flag) return;
                this.v = 2;
            }
        }
        print P(true).v;
        print P(false).v;
        print P(true);";

    assert_eq!(run(source), "1\n2\nP instance\n");
}

#[test]
fn test_calling_init_directly_returns_this() {
    let source = "
        class P { init() { this.n = 0; } }
        var p = P();
        p.n = 5;
        var again = p.init();
        print again == p;
        print p.n;";

    assert_eq!(run(source), "true\n0\n");
}

#[test]
fn test_return_value_in_initializer_is_static_error() {
    let (output, errors) = run_err("print \"before\"; class A { init() { return 1; } }");

    assert_eq!(output, "");
    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0], LoxError::Resolve { .. }));
    assert_eq!(errors[0].message(), "Can't return a value from an initializer.");
}

#[test]
fn test_arity_mismatch() {
    let (_, errors) = run_err("fun f(a, b) {} f(1);");
    assert_eq!(runtime_message(&errors), "Expected 2 arguments but got 1.");

    let (_, errors) = run_err("class K { init(a) {} } K();");
    assert_eq!(runtime_message(&errors), "Expected 1 arguments but got 0.");

    let (_, errors) = run_err("clock(1);");
    assert_eq!(runtime_message(&errors), "Expected 0 arguments but got 1.");
}

#[test]
fn test_calling_non_callable() {
    let (_, errors) = run_err("\"not a function\"();");
    assert_eq!(runtime_message(&errors), "Can only call functions and classes.");
}

#[test]
fn test_mixed_plus_operands() {
    let (_, errors) = run_err("print 1 + \"a\";");

    assert_eq!(
        runtime_message(&errors),
        "Operands must be two numbers or two strings."
    );
    assert!(matches!(&errors[0], LoxError::Runtime { lexeme, .. } if lexeme == "+"));
}

#[test]
fn test_number_operand_errors() {
    let (_, errors) = run_err("print -\"x\";");
    assert_eq!(runtime_message(&errors), "Operand must be a number.");

    let (_, errors) = run_err("print 1 < nil;");
    assert_eq!(runtime_message(&errors), "Operands must be numbers.");
}

#[test]
fn test_division_by_zero_is_ieee() {
    assert_eq!(run("print 1 / 0; print -1 / 0; print 0 / 0 == 0 / 0;"), "inf\n-inf\nfalse\n");
}

#[test]
fn test_logical_operators_return_operands() {
    assert_eq!(
        run("print nil or \"x\"; print 0 and 2; print false and explode(); print 1 or explode();"),
        "x\n2\nfalse\n1\n"
    );
}

#[test]
fn test_truthiness() {
    let source = "
        if (0) print \"zero\";
        if (\"\") print \"empty\";
        if (nil) print \"nil\"; else print \"no nil\";
        if (false) print \"false\"; else print \"no false\";
        print !nil;";

    assert_eq!(run(source), "zero\nempty\nno nil\nno false\ntrue\n");
}

#[test]
fn test_equality() {
    let source = "
        print nil == nil;
        print nil == false;
        print 1 == \"1\";
        print \"a\" == \"a\";
        print 2 != 2;
        class K {}
        var k = K();
        print k == k;
        print K() == K();";

    assert_eq!(run(source), "true\nfalse\nfalse\ntrue\nfalse\ntrue\nfalse\n");
}

#[test]
fn test_stringification() {
    let source = "
        fun f() {}
        class K {}
        class P {}
        print clock;
        print f;
        print K;
        print P();
        print nil;
        print true;
        print 3.0;
        print 3.25;";

    assert_eq!(
        run(source),
        "<native fn clock>\n<fn f>\n<class K>\nP instance\nnil\ntrue\n3\n3.25\n"
    );
}

#[test]
fn test_clock_returns_a_number() {
    assert_eq!(run("var t = clock(); print t > 0;"), "true\n");
}

#[test]
fn test_field_shadows_method() {
    let source = "
        class K { m() { return \"method\"; } }
        var k = K();
        print k.m();
        k.m = \"field\";
        print k.m;";

    assert_eq!(run(source), "method\nfield\n");
}

#[test]
fn test_bound_method_keeps_this() {
    let source = "
        class Person {
            init(name) { this.name = name; }
            greet() { print \"hi \" + this.name; }
        }
        var greet = Person(\"ann\").greet;
        var other = Person(\"bob\");
        other.greet = greet;
        other.greet();";

    assert_eq!(run(source), "hi ann\n");
}

#[test]
fn test_property_errors() {
    let (_, errors) = run_err("var x = 1; print x.y;");
    assert_eq!(runtime_message(&errors), "Only instances have properties.");

    let (_, errors) = run_err("var x = \"s\"; x.y = 2;");
    assert_eq!(runtime_message(&errors), "Only instances have fields.");

    let (_, errors) = run_err("class K {} print K().missing;");
    assert_eq!(runtime_message(&errors), "Undefined property 'missing'.");
}

#[test]
fn test_superclass_must_be_a_class() {
    let (_, errors) = run_err("var NotClass = 1; class K < NotClass {}");
    assert_eq!(runtime_message(&errors), "Superclass must be a class.");
}

#[test]
fn test_runtime_error_aborts_remaining_statements() {
    let (output, errors) = run_err("print 1;\nprint nil + 1;\nprint 2;");

    assert_eq!(output, "1\n");
    assert_eq!(
        errors[0].to_string(),
        "Operands must be two numbers or two strings.\n[line 2]"
    );
}

#[test]
fn test_while_and_for_loops() {
    let source = "
        var i = 0;
        while (i < 3) { print i; i = i + 1; }
        for (var j = 10; j < 13; j = j + 1) print j;";

    assert_eq!(run(source), "0\n1\n2\n10\n11\n12\n");
}

#[test]
fn test_return_unwinds_out_of_loop() {
    let source = "
        fun firstOver(limit) {
            for (var i = 0; ; i = i + 1) {
                if (i > limit) return i;
            }
        }
        print firstOver(4);";

    assert_eq!(run(source), "5\n");
}

#[test]
fn test_function_without_return_yields_nil() {
    assert_eq!(run("fun f() { 1; } print f();"), "nil\n");
}

#[test]
fn test_recursion() {
    let source = "
        fun fib(n) {
            if (n < 2) return n;
            return fib(n - 1) + fib(n - 2);
        }
        print fib(15);";

    assert_eq!(run(source), "610\n");
}

#[test]
fn test_globals_persist_across_runs() {
    let (mut interpreter, buf) = interpreter();

    run_source(&mut interpreter, "var count = 1;").unwrap();
    run_source(&mut interpreter, "fun bump() { count = count + 1; }").unwrap();

    // A failed line leaves earlier definitions intact.
    assert!(run_source(&mut interpreter, "print missing;").is_err());

    run_source(&mut interpreter, "bump(); print count;").unwrap();
    assert_eq!(buf.contents(), "2\n");
}

#[test]
fn test_closures_survive_across_runs() {
    let (mut interpreter, buf) = interpreter();

    run_source(
        &mut interpreter,
        "var f; { var local = \"kept\"; fun g() { return local; } f = g; }",
    )
    .unwrap();
    run_source(&mut interpreter, "print f();").unwrap();

    assert_eq!(buf.contents(), "kept\n");
}

#[test]
fn test_class_values_keep_their_superclass() {
    let (mut interpreter, _) = interpreter();
    run_source(&mut interpreter, "class A { m() {} } class B < A {}").unwrap();

    let value = interpreter
        .globals()
        .borrow()
        .get(&Token::synthetic("B"))
        .unwrap();
    let Value::Class(class) = &value else {
        panic!("expected a class, got {:?}", value);
    };

    assert_eq!(class.superclass().map(|c| c.name()), Some("A"));
    assert!(class.find_method("m").is_some());
    assert!(class.find_method("init").is_none());
}
