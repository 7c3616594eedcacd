//! Whole-session tests: a script goes in through the incremental reader,
//! and the lines the session would print come out.

use miniscm::reader::{ReadOutcome, SyntaxReader};
use miniscm::repl::{Outcome, Session};

/// Drive a complete script through reader and session, collecting the
/// printed lines. Reader-level errors print like evaluation errors.
fn run_session(input: &str) -> Vec<String> {
    let mut reader = SyntaxReader::new();
    for line in input.lines() {
        reader.push_line(line);
    }
    reader.finish();
    let mut session = Session::new();
    let mut output = Vec::new();
    loop {
        match reader.read() {
            Ok(ReadOutcome::Item(stx)) => match session.handle(&stx) {
                Outcome::Print(line) => output.push(line),
                Outcome::Quiet => {}
                Outcome::Stop => break,
            },
            Ok(ReadOutcome::Done) => break,
            Ok(ReadOutcome::NeedMore) => unreachable!("stream already finished"),
            Err(_) => output.push("RuntimeError".to_owned()),
        }
    }
    output
}

/// Each case is one scripted session and its expected printed lines.
fn run_scenarios(scenarios: Vec<(&str, Vec<&str>)>) {
    for (i, (script, expected)) in scenarios.iter().enumerate() {
        assert_eq!(
            run_session(script),
            expected.clone(),
            "scenario #{} failed for script:\n{script}",
            i + 1
        );
    }
}

#[test]
fn scenario_arithmetic() {
    run_scenarios(vec![
        ("(+ 1 2 3)", vec!["6"]),
        ("(/ 1 2)", vec!["1/2"]),
        ("(- 5)", vec!["-5"]),
        ("(expt 2 10)", vec!["1024"]),
        ("(* 2 3 1/2)", vec!["6/2"]),
        ("(modulo 7 3)", vec!["1"]),
    ]);
}

#[test]
fn scenario_list_basics() {
    run_scenarios(vec![
        ("(car '(1 2 3))", vec!["1"]),
        ("(cdr '(1 2 3))", vec!["(2 3)"]),
        ("(cons 1 '(2))", vec!["(1 2)"]),
        ("(cons 1 2)", vec!["(1 . 2)"]),
        ("(list 1 (list 2 3) 4)", vec!["(1 (2 3) 4)"]),
    ]);
}

#[test]
fn scenario_mutation() {
    // define prints nothing; set-car! prints a blank line (implicit void)
    run_scenarios(vec![(
        "(define p (cons 1 2))\n(set-car! p 9)\np",
        vec!["", "(9 . 2)"],
    )]);
}

#[test]
fn scenario_recursion() {
    run_scenarios(vec![(
        "(define (fact n) (if (= n 0) 1 (* n (fact (- n 1)))))\n(fact 5)",
        vec!["120"],
    )]);
}

#[test]
fn scenario_mutual_recursion() {
    run_scenarios(vec![(
        "(define (ev? n) (if (= n 0) #t (od? (- n 1))))\n\
         (define (od? n) (if (= n 0) #f (ev? (- n 1))))\n\
         (ev? 10)",
        vec!["#t"],
    )]);
}

#[test]
fn scenario_shadowing() {
    run_scenarios(vec![
        ("(define + -)\n(+ 10 3)", vec!["7"]),
        // The shadow also defeats reserved-word status
        ("(define if 1)\n(if 2 3)", vec!["RuntimeError"]),
        // Parameters shadow primitives
        ("((lambda (car) (car 9)) (lambda (x) x))", vec!["9"]),
    ]);
}

#[test]
fn scenario_closures_and_state() {
    run_scenarios(vec![(
        "(define (mk) (let ((c 0)) (lambda () (set! c (+ c 1)) c)))\n\
         (define g (mk))\n\
         (g)\n(g)",
        vec!["1", "2"],
    )]);
}

#[test]
fn scenario_quote_with_dotted_pair() {
    run_scenarios(vec![
        ("'(1 . (2 . 3))", vec!["(1 2 . 3)"]),
        ("'(1 . 2)", vec!["(1 . 2)"]),
        ("'(1 .)", vec!["RuntimeError"]),
        ("'(. 1 2 3)", vec!["RuntimeError"]),
    ]);
}

#[test]
fn scenario_errors_do_not_kill_the_repl() {
    run_scenarios(vec![
        ("(car 5)\n(+ 1 1)", vec!["RuntimeError", "2"]),
        // Bindings from earlier successful forms survive an error
        (
            "(define x 42)\nx\n(car 5)\nx",
            vec!["42", "RuntimeError", "42"],
        ),
        // A stray closing bracket is consumed and reported
        (") 7", vec!["RuntimeError", "7"]),
    ]);
}

#[test]
fn closure_sees_later_toplevel_define() {
    // (define (f) y) (define y 42) (f) => 42: the batch binds both names
    // before evaluating either right-hand side
    run_scenarios(vec![(
        "(define (f) y)\n(define y 42)\n(f)",
        vec!["42"],
    )]);
}

#[test]
fn truthiness() {
    run_scenarios(vec![
        ("(if 0 'a 'b)", vec!["a"]),
        ("(if '() 'a 'b)", vec!["a"]),
        ("(if \"\" 'a 'b)", vec!["a"]),
        ("(if (void) 'a 'b)", vec!["a"]),
        ("(if #f 'a 'b)", vec!["b"]),
    ]);
}

#[test]
fn rational_and_integer_interchange() {
    run_scenarios(vec![
        ("(= 2 2/1)", vec!["#t"]),
        ("(eq? 2 2/1)", vec!["#t"]),
        ("(number? 2/3)", vec!["#t"]),
        // Unreduced representations still compare equal
        ("(= 1/2 2/4)", vec!["#t"]),
        ("(+ 1/2 1/2)", vec!["4/4"]),
    ]);
}

#[test]
fn quote_list_equivalence() {
    run_scenarios(vec![
        ("(eq? (car '(1 2)) (car (list 1 2)))", vec!["#t"]),
        (
            "(define (same? a b)\n\
             \x20 (cond ((null? a) (null? b))\n\
             \x20       ((pair? a) (and (pair? b) (eq? (car a) (car b)) (same? (cdr a) (cdr b))))\n\
             \x20       (else (eq? a b))))\n\
             (same? '(1 2 3) (list 1 2 3))",
            vec!["#t"],
        ),
    ]);
}

#[test]
fn pair_aliasing() {
    run_scenarios(vec![(
        "(define p (cons 1 2))\n\
         (define q p)\n\
         (set-car! q 5)\n\
         (car p)",
        vec!["", "5"],
    )]);
}

#[test]
fn exit_stops_mid_session() {
    run_scenarios(vec![
        ("1\n(exit)\n2", vec!["1"]),
        // exit propagates out of begin
        ("(begin 1 (exit) (car 5))\n2", vec![]),
    ]);
}

#[test]
fn multiline_and_bracketed_forms() {
    run_scenarios(vec![
        ("(+ 1\n   2\n   3)", vec!["6"]),
        ("[+ 1 2]", vec!["3"]),
        ("(+ 1 2] ; brackets are interchangeable", vec!["3"]),
        ("(car\n'(7))", vec!["7"]),
    ]);
}

#[test]
fn failed_define_batch_is_retried() {
    // The flush fails evaluating the rhs of y, so the whole batch stays
    // queued: every following form retries it (and reports the failure),
    // but the session itself keeps going.
    run_scenarios(vec![(
        "(define x 1)\n(define y (car 5))\ny\nx",
        vec!["RuntimeError", "RuntimeError"],
    )]);
}

#[test]
fn first_class_primitives_through_the_repl() {
    run_scenarios(vec![
        ("((lambda (f) (f 1 2 3)) +)", vec!["6"]),
        ("(define apply2 (lambda (f a b) (f a b)))\n(apply2 cons 1 2)", vec!["(1 . 2)"]),
        ("procedure?", vec!["#<procedure>"]),
        ("(procedure? car)", vec!["#t"]),
    ]);
}
