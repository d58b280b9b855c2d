use pcc::analyzer::{Constant, PType, Primitive};
use pcc::lexer::{LexError, Lexer, Location, TokenKind};
use pcc::parser::*;
use pcc::{compile, CompileError, CompileOptions};
use rstest::rstest;

fn kinds(input: &str) -> Vec<TokenKind> {
    Lexer::tokenize(input)
        .unwrap()
        .tokens
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

fn parse(input: &str) -> Program {
    let lexed = Lexer::tokenize(input).unwrap();
    Parser::new(lexed.tokens).parse().unwrap()
}

fn parse_expr(input: &str) -> Expr {
    let lexed = Lexer::tokenize(input).unwrap();
    Parser::new(lexed.tokens).parse_expr().unwrap()
}

#[test]
fn tokenize_statement() {
    assert_eq!(
        kinds("x := a[1] <> 2;"),
        vec![
            TokenKind::Ident("x".to_string()),
            TokenKind::Assign,
            TokenKind::Ident("a".to_string()),
            TokenKind::OpenSquareBrace,
            TokenKind::IntLiteral(1),
            TokenKind::CloseSquareBrace,
            TokenKind::NotEqual,
            TokenKind::IntLiteral(2),
            TokenKind::SemiColon,
        ]
    );
}

#[rstest]
#[case("42", TokenKind::IntLiteral(42))]
#[case("010", TokenKind::IntLiteral(8))]
#[case("0", TokenKind::IntLiteral(0))]
#[case("2147483647", TokenKind::IntLiteral(2147483647))]
#[case("017777777777", TokenKind::IntLiteral(2147483647))]
#[case("3.25", TokenKind::RealLiteral(3.25))]
#[case("1.5e2", TokenKind::RealLiteral(150.0))]
#[case("2E-1", TokenKind::RealLiteral(0.2))]
#[case("\"say \"\"hi\"\"\"", TokenKind::StringLiteral("say \"hi\"".to_string()))]
#[case("begin", TokenKind::Begin)]
#[case("beginning", TokenKind::Ident("beginning".to_string()))]
fn tokenize_literals_and_keywords(#[case] input: &str, #[case] expected: TokenKind) {
    assert_eq!(kinds(input), vec![expected]);
}

#[test]
fn comments_are_skipped_and_locations_tracked() {
    let lexed = Lexer::tokenize("// line\n/* block\n comment */ x\n  y").unwrap();
    let locs: Vec<_> = lexed.tokens.iter().map(|t| t.loc).collect();
    assert_eq!(locs, vec![Location::new(3, 13), Location::new(4, 3)]);
    assert_eq!(lexed.dump_table, None);
}

#[rstest]
#[case("//&D+\n", Some(true))]
#[case("//&D-\n", Some(false))]
#[case("//&D+\n//&D-\n", Some(false))]
#[case("//&S+\n", None)]
fn pseudo_comments_set_dump_option(#[case] input: &str, #[case] expected: Option<bool>) {
    assert_eq!(Lexer::tokenize(input).unwrap().dump_table, expected);
}

#[rstest]
#[case("x @ y", LexError::UnexpectedChar { c: '@', loc: Location::new(1, 3) })]
#[case("\"open", LexError::UnterminatedString { loc: Location::new(1, 1) })]
#[case("a /* b", LexError::UnterminatedComment { loc: Location::new(1, 3) })]
#[case("09", LexError::InvalidNumber { text: "09".to_string(), loc: Location::new(1, 1) })]
#[case(
    "2147483648",
    LexError::InvalidNumber { text: "2147483648".to_string(), loc: Location::new(1, 1) }
)]
#[case(
    "x := 020000000000",
    LexError::InvalidNumber { text: "020000000000".to_string(), loc: Location::new(1, 6) }
)]
fn lexical_errors(#[case] input: &str, #[case] expected: LexError) {
    assert_eq!(Lexer::tokenize(input).unwrap_err(), expected);
}

#[test]
fn parse_program_structure() {
    let program = parse(
        "
program demo;
var a, b: integer;
var limit: 10;
f(x: real; ys: array 2 of array 3 of boolean): real;
begin
  var c: string;
  a := 1;
end
end
",
    );
    assert_eq!(program.name, "demo");
    assert_eq!(program.decls.len(), 2);
    assert_eq!(program.decls[0].vars.len(), 2);
    assert_eq!(
        program.decls[1].vars[0].constant,
        Some(Constant::Integer(10))
    );

    let f = &program.functions[0];
    assert_eq!(f.return_type, PType::real());
    assert!(f.body.is_none());
    assert_eq!(f.param_count(), 2);
    assert_eq!(f.signature(), "real, boolean [2][3]");

    assert_eq!(program.body.decls.len(), 1);
    assert_eq!(program.body.stmts.len(), 1);
}

#[test]
fn scoping_nodes_get_distinct_ids() {
    let program = parse(
        "p;\nf() begin end end\nbegin\n  for i := 1 to 2 do begin end end do\n  begin end\nend\n",
    );
    let Stmt::For(for_stmt) = &program.body.stmts[0] else {
        panic!("expected a for statement");
    };
    let Stmt::Compound(inner) = &program.body.stmts[1] else {
        panic!("expected a compound statement");
    };

    let mut ids = vec![
        program.id,
        program.functions[0].id,
        program.body.id,
        for_stmt.id,
        for_stmt.body.id,
        inner.id,
    ];
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 6);
}

#[test]
fn for_loop_desugars_into_declaration_and_assignment() {
    let program = parse("p;\nbegin\n  for k := 3 to 9 do begin end end do\nend\n");
    let Stmt::For(for_stmt) = &program.body.stmts[0] else {
        panic!("expected a for statement");
    };
    assert_eq!(for_stmt.loop_var_name(), Some("k"));
    assert_eq!(for_stmt.loop_var.vars[0].ty, PType::integer());
    assert_eq!(
        for_stmt.init.lhs.as_variable_ref().map(|r| r.name.as_str()),
        Some("k")
    );
    assert_eq!(for_stmt.init.rhs.as_integer_literal(), Some(3));
    assert_eq!(for_stmt.end.as_integer_literal(), Some(9));
}

#[test]
fn precedence_follows_the_grammar() {
    // not a < b and c or d  ==>  ((not (a < b)) and c) or d
    let expr = parse_expr("not a < b and c or d");
    let ExprKind::Binary(BinOpKind::Or, lhs, _) = &expr.kind else {
        panic!("expected 'or' at the root");
    };
    let ExprKind::Binary(BinOpKind::And, lhs, _) = &lhs.kind else {
        panic!("expected 'and' under 'or'");
    };
    let ExprKind::Unary(UnaryOpKind::Not, operand) = &lhs.kind else {
        panic!("expected 'not' under 'and'");
    };
    assert!(matches!(
        operand.kind,
        ExprKind::Binary(BinOpKind::LessThan, _, _)
    ));
}

#[test]
fn arithmetic_is_left_associative() {
    // 1 - 2 - 3 * 4  ==>  (1 - 2) - (3 * 4)
    let expr = parse_expr("1 - 2 - 3 * 4");
    let ExprKind::Binary(BinOpKind::Sub, lhs, rhs) = &expr.kind else {
        panic!("expected '-' at the root");
    };
    assert!(matches!(lhs.kind, ExprKind::Binary(BinOpKind::Sub, _, _)));
    assert!(matches!(rhs.kind, ExprKind::Binary(BinOpKind::Mul, _, _)));
}

#[test]
fn negative_declaration_literal_is_folded() {
    let program = parse("p;\nvar n: -5;\nvar r: -2.5;\nbegin\nend\n");
    assert_eq!(
        program.decls[0].vars[0].constant,
        Some(Constant::Integer(-5))
    );
    assert_eq!(program.decls[1].vars[0].constant, Some(Constant::Real(-2.5)));
}

#[test]
fn array_type_collects_dimensions() {
    let program = parse("p;\nvar a: array 4 of array 2 of string;\nbegin\nend\n");
    assert_eq!(
        program.decls[0].vars[0].ty,
        PType::array(Primitive::String, vec![4, 2])
    );
}

#[test]
fn unparsed_expressions_have_no_type() {
    let expr = parse_expr("a + 1");
    assert_eq!(expr.ty(), None);
}

#[rstest]
#[case("p;\nbegin\n  x := 1\nend\n")]
#[case("p;\nbegin\n  if true then begin end end\nend\n")]
#[case("p;\nbegin\nend\nextra")]
#[case("p;\nvar a: array -1 of integer;\nbegin\nend\n")]
#[case("p;\nbegin\n")]
fn syntax_errors_are_reported(#[case] input: &str) {
    let result = compile(input, &CompileOptions::default());
    assert!(matches!(result, Err(CompileError::Parse(_))), "{:?}", result);
}

#[test]
fn lexical_errors_surface_through_compile() {
    let result = compile("p;\nbegin\n  print #;\nend\n", &CompileOptions::default());
    assert!(matches!(result, Err(CompileError::Lex(_))));
}

#[test]
fn literals_wider_than_a_word_are_rejected() {
    let result = compile(
        "p;\nvar x: integer;\nbegin\n  x := 4294967297;\nend\n",
        &CompileOptions::default(),
    );
    let Err(CompileError::Lex(LexError::InvalidNumber { text, loc })) = result else {
        panic!("expected an invalid number, got {:?}", result);
    };
    assert_eq!(text, "4294967297");
    assert_eq!(loc, Location::new(4, 8));
}

#[test]
fn semantic_failure_keeps_table_dump() {
    let options = CompileOptions {
        dump_table: true,
        source_name: "bad.p".to_string(),
    };
    let Err(CompileError::Semantic {
        diagnostics,
        table_dump,
    }) = compile("p;\nvar c: 1;\nbegin\n  c := 2;\nend\n", &options)
    else {
        panic!("expected semantic errors");
    };
    assert_eq!(diagnostics.len(), 1);
    assert!(table_dump.contains("constant"));
}

#[test]
fn successful_compile_reports_source_name() {
    let options = CompileOptions {
        dump_table: false,
        source_name: "hello.p".to_string(),
    };
    let compilation = compile("hello;\nbegin\n  print 42;\nend\n", &options).unwrap();
    assert!(compilation.assembly.starts_with("    .file \"hello.p\"\n"));
    assert!(compilation.assembly.contains("    li t0, 42\n"));
    assert!(compilation.table_dump.is_empty());
}
