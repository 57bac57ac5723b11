// Integration tests for the statement compiler. They cover the block structure each control
// statement produces (names, terminators, dispatch) and the behaviour of the compiled code
// on the reference interpreter: loops, fall-through between cases, forward and backward
// goto, and code after a return.

//! Test control-flow statement compilation.

mod common;

use blang::ir::Terminator;
use common::*;

#[test]
fn test_if_else() {
    let source = "
        sign(x) {
            if (x > 0) return (1);
            else if (x < 0) return (-1);
            return (0);
        }
        main() { return (sign(5) * 100 + sign(-3) * 10 + sign(0)); }
    ";
    assert_eq!(run_main(source), 90);

    let module = compile(source);
    let sign = module.function("sign").unwrap();
    for name in ["if.0.then", "if.0.else", "if.0.end", "if.1.then", "if.1.end"] {
        assert!(sign.block_by_name(name).is_some(), "missing block {name}");
    }
    assert_all_blocks_terminated(&module);
}

#[test]
fn test_if_without_else_joins_through_else_block() {
    let module = compile("main() { auto x; if (x) x = 1; return (x); }");
    let main = module.function("main").unwrap();
    let else_block = main.block_by_name("if.0.else").unwrap();
    assert!(else_block.instrs.is_empty());
    match &else_block.terminator {
        Some(Terminator::Br(target)) => assert_eq!(main.block(*target).name, "if.0.end"),
        other => panic!("unexpected terminator {other:?}"),
    }
}

#[test]
fn test_else_keyword_needs_word_boundary() {
    let source = "
        main() {
            auto x, elsewhere;
            if (x) x = 5;
            elsewhere = 7;
            return (elsewhere + x);
        }
    ";
    assert_eq!(run_main(source), 7);
}

#[test]
fn test_while_loop() {
    let source = "
        main() {
            auto i, s;
            i = 1;
            while (i <= 10) {
                s =+ i;
                i++;
            }
            return (s);
        }
    ";
    assert_eq!(run_main(source), 55);

    let ir = compile(source).to_string();
    check_output_contains(
        &ir,
        &[
            "br label %while.0.cond",
            "while.0.cond:",
            "label %while.0.body, label %while.0.end",
            "while.0.body:",
            "while.0.end:",
        ],
    );
}

#[test]
fn test_nested_loops() {
    let source = "
        main() {
            auto i, j, n;
            i = 0;
            while (i < 4) {
                j = 0;
                while (j < i) { n++; j++; }
                i++;
            }
            return (n);
        }
    ";
    assert_eq!(run_main(source), 6);
}

#[test]
fn test_switch_with_fall_through() {
    let source = "
        f(x) {
            auto r;
            switch (x) {
                case 1: r =+ 1;
                case 2: r =+ 10; goto out;
                case 'a': r = 100; goto out;
            }
            r = -1;
        out:
            return (r);
        }
        main() { return (f(1) * 1000000 + f(2) * 10000 + f(97) * 10 + f(5)); }
    ";
    assert_eq!(run_main(source), 11_100_999);

    let module = compile(source);
    let f = module.function("f").unwrap();
    let cmp = f.block_by_name("switch.0.cmp").unwrap();
    match &cmp.terminator {
        Some(Terminator::Switch { default, cases, .. }) => {
            assert_eq!(f.block(*default).name, "switch.0.end");
            let values: Vec<i64> = cases.iter().map(|(v, _)| *v).collect();
            assert_eq!(values, vec![1, 2, 97]);
            assert_eq!(f.block(cases[2].1).name, "case.0.97");
        }
        other => panic!("unexpected terminator {other:?}"),
    }
    match &cmp.terminator {
        Some(term) => assert_eq!(term.successors().len(), 4),
        None => panic!("dispatch block left open"),
    }
    let ir = module.to_string();
    check_output_contains(&ir, &["switch i64 %v", "i64 97, label %case.0.97"]);
}

#[test]
fn test_switch_enters_dispatch_block() {
    let module = compile("main() { auto x; switch (x) { case 0: x = 1; } return (x); }");
    let main = module.function("main").unwrap();
    match &main.block(blang::ir::BlockId(0)).terminator {
        Some(Terminator::Br(target)) => assert_eq!(main.block(*target).name, "switch.0.cmp"),
        other => panic!("unexpected terminator {other:?}"),
    }
}

#[test]
fn test_switch_without_cases() {
    let module = compile("main() { auto x; switch (x) { x = 3; } return (x); }");
    let main = module.function("main").unwrap();
    let cmp = main.block_by_name("switch.0.cmp").unwrap();
    match &cmp.terminator {
        Some(Terminator::Br(target)) => assert_eq!(main.block(*target).name, "switch.0.end"),
        other => panic!("unexpected terminator {other:?}"),
    }
    assert_eq!(run_main("main() { auto x; switch (x) { x = 3; } return (x); }"), 0);
}

#[test]
fn test_case_inside_nested_statement() {
    let source = "
        main() {
            auto x, r;
            x = 2;
            switch (x) {
                case 1: if (x) { case 2: r = 5; }
            }
            return (r);
        }
    ";
    assert_eq!(run_main(source), 5);
}

#[test]
fn test_nested_switch_keeps_cases_apart() {
    let source = "
        g(a, b) {
            switch (a) {
                case 1:
                    switch (b) {
                        case 1: return (11);
                        case 2: return (12);
                    }
                    return (10);
                case 2: return (20);
            }
            return (0);
        }
        main() { return (g(1, 1) + g(1, 2) + g(1, 3) + g(2, 1) + g(3, 3)); }
    ";
    assert_eq!(run_main(source), 11 + 12 + 10 + 20);
}

#[test]
fn test_backward_goto() {
    let source = "
        main() {
            auto i;
            i = 0;
        loop:
            i++;
            if (i < 5) goto loop;
            return (i);
        }
    ";
    assert_eq!(run_main(source), 5);

    let module = compile(source);
    let main = module.function("main").unwrap();
    assert!(main.block_by_name("label.loop").is_some());
    assert!(main.blocks.iter().any(|b| b.name.starts_with("unreachable.")));
}

#[test]
fn test_forward_goto_skips_code() {
    let source = "
        main() {
            auto x;
            x = 1;
            goto done;
            x = 2;
        done:
            return (x);
        }
    ";
    assert_eq!(run_main(source), 1);
}

#[test]
fn test_label_at_end_of_block() {
    let source = "main() { auto x; x = 4; goto end; x = 5; end: } ";
    let module = compile(source);
    assert_all_blocks_terminated(&module);
}

#[test]
fn test_code_after_return_lands_in_dead_block() {
    let source = "main() { return (1); printf(\"never*n\"); }";
    let (result, output) = run_main_with_output(source);
    assert_eq!(result, 1);
    assert_eq!(output, "");

    let module = compile(source);
    let main = module.function("main").unwrap();
    assert!(main.blocks.iter().any(|b| b.name.starts_with("dead.")));
    for block in &main.blocks {
        assert!(block.is_terminated());
    }
}

#[test]
fn test_implicit_return_zero() {
    let module = compile("main() { }");
    let ir = module.to_string();
    check_output_contains(&ir, &["define i64 @main() {\nentry:\n  ret i64 0\n}"]);
    assert_eq!(run_main("main() ;"), 0);
}

#[test]
fn test_every_block_has_one_terminator() {
    let source = "
        collatz(n) {
            auto steps;
            while (n != 1) {
                switch (n & 1) {
                    case 0: n = n / 2; goto next;
                    case 1: n = 3 * n + 1;
                }
            next:
                steps++;
            }
            return (steps);
        }
        main() { return (collatz(27)); }
    ";
    let module = compile(source);
    assert_all_blocks_terminated(&module);
    assert_eq!(run_main(source), 111);
}
