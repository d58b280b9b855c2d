use pcc::analyze;
use pcc::analyzer::{Analysis, Attribute, PType, Primitive, SemanticError, SymbolKind};
use pcc::lexer::Location;
use pcc::parser::{Program, Stmt};
use pcc::CompileOptions;
use rstest::rstest;

fn options() -> CompileOptions {
    CompileOptions {
        dump_table: false,
        source_name: "test.p".to_string(),
    }
}

fn run(source: &str) -> (Program, Analysis) {
    analyze(source, &options()).unwrap()
}

fn errors(source: &str) -> Vec<SemanticError> {
    run(source)
        .1
        .diagnostics
        .into_iter()
        .map(|d| d.error)
        .collect()
}

/// Wraps statements in a program with the given global declarations.
fn program(decls: &str, stmts: &str) -> String {
    format!("p;\n{}\nbegin\n{}\nend\n", decls, stmts)
}

/// Type resolved for the single printed expression of a program.
fn printed_type(decls: &str, expr: &str) -> Option<PType> {
    let (program, _) = run(&program(decls, &format!("print {};", expr)));
    let Stmt::Print(p) = &program.body.stmts[0] else {
        panic!("expected a print statement");
    };
    p.target.ty().cloned()
}

#[rstest]
#[case("i := 3.0;", false)]
#[case("i := r;", false)]
#[case("r := 3;", true)]
#[case("r := i;", true)]
#[case("r := 2.5;", true)]
#[case("i := 4;", true)]
fn assignment_widens_integer_into_real_only(#[case] stmt: &str, #[case] accepted: bool) {
    let errs = errors(&program("var i: integer;\nvar r: real;", stmt));
    if accepted {
        assert!(errs.is_empty());
    } else {
        assert_eq!(
            errs,
            vec![SemanticError::IncompatibleAssignment {
                target: PType::integer(),
                found: PType::real(),
            }]
        );
    }
}

#[rstest]
#[case("a", Some(PType::array(Primitive::Integer, vec![2, 3])))]
#[case("a[0]", Some(PType::array(Primitive::Integer, vec![3])))]
#[case("a[0][1]", Some(PType::integer()))]
#[case("a[0][1][2]", None)]
fn subscripts_strip_leading_dimensions(#[case] expr: &str, #[case] expected: Option<PType>) {
    let decls = "var a: array 2 of array 3 of integer;";
    assert_eq!(printed_type(decls, expr), expected);
}

#[test]
fn over_indexing_is_reported() {
    let errs = errors(&program(
        "var a: array 2 of integer;\nvar x: integer;",
        "x := a[0][1];",
    ));
    assert_eq!(errs, vec![SemanticError::OverArraySubscript("a".to_string())]);
}

#[rstest]
#[case(1, 10, false)]
#[case(5, 5, false)]
#[case(5, 3, true)]
fn for_bounds_must_not_decrease(#[case] lower: i64, #[case] upper: i64, #[case] rejected: bool) {
    let source = format!(
        "p;\nbegin\n  for i := {} to {} do begin end end do\nend\n",
        lower, upper
    );
    let diagnostics = run(&source).1.diagnostics;
    if rejected {
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].error, SemanticError::NonIncrementalLoop);
        assert_eq!(diagnostics[0].loc, Location::new(3, 3));
    } else {
        assert!(diagnostics.is_empty());
    }
}

#[rstest]
#[case("var x: integer;\nvar x: real;")]
#[case("var x: integer;\nvar x: 10;")]
#[case("var x, x: boolean;")]
#[case("var x: \"s\";\nvar x: integer;")]
fn redeclaration_in_same_scope_is_rejected(#[case] decls: &str) {
    let errs = errors(&program(decls, ""));
    assert_eq!(errs, vec![SemanticError::Redeclared("x".to_string())]);
}

#[test]
fn redeclaration_points_at_second_declaration() {
    let diagnostics = run("p;\nvar x: integer;\nvar x: real;\nbegin\nend\n").1.diagnostics;
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].loc, Location::new(3, 5));
}

#[test]
fn shadowing_in_nested_scope_is_allowed() {
    let source = "
p;
var x: integer;
f(x: real): real
begin
  var y: integer;
  return x;
end
end
begin
  begin
    var x: real;
    x := 1.5;
  end
end
";
    assert!(errors(source).is_empty());
}

#[test]
fn loop_variable_cannot_be_shadowed() {
    let source = "
p;
begin
  for i := 1 to 3 do
  begin
    var i: integer;
    for i := 1 to 2 do begin end end do
  end
  end do
end
";
    assert_eq!(
        errors(source),
        vec![
            SemanticError::Redeclared("i".to_string()),
            SemanticError::Redeclared("i".to_string()),
        ]
    );
}

#[test]
fn function_redeclaration_is_rejected() {
    let source = "
p;
var f: integer;
f(): integer
begin
  return 1;
end
end
begin
end
";
    assert_eq!(errors(source), vec![SemanticError::Redeclared("f".to_string())]);
}

#[test]
fn constants_cannot_be_assigned() {
    let errs = errors(&program("var c: 10;", "c := 2;"));
    assert_eq!(errs, vec![SemanticError::AssignToConstant("c".to_string())]);
}

#[test]
fn loop_variable_is_written_only_by_its_initializer() {
    let source = "
p;
begin
  for i := 1 to 3 do
  begin
    i := 2;
  end
  end do
end
";
    assert_eq!(errors(source), vec![SemanticError::AssignToLoopVar]);
}

#[rstest]
#[case("var c: 10;", "read c;", SemanticError::ReadConstantOrLoopVar)]
#[case("var a: array 2 of integer;", "read a;", SemanticError::ReadNonScalar)]
#[case("var a: array 2 of integer;", "print a;", SemanticError::PrintNonScalar)]
#[case("var a, b: array 2 of integer;", "a := b;", SemanticError::ArrayAssignment)]
#[case("var a: array 3 of integer;", "print a[1.5];", SemanticError::NonIntegerIndex)]
#[case("", "if 1 then begin end end if", SemanticError::NonBooleanCondition)]
#[case("", "return 1;", SemanticError::ReturnFromVoid)]
#[case("", "print y;", SemanticError::Undeclared("y".to_string()))]
fn statement_rules(#[case] decls: &str, #[case] stmt: &str, #[case] expected: SemanticError) {
    assert_eq!(errors(&program(decls, stmt)), vec![expected]);
}

#[test]
fn loop_variable_cannot_be_read_into() {
    let source = "p;\nbegin\n  for i := 1 to 3 do begin read i; end end do\nend\n";
    assert_eq!(errors(source), vec![SemanticError::ReadConstantOrLoopVar]);
}

#[test]
fn while_condition_type_is_not_checked() {
    let source = program("", "while 1 do begin end end do");
    assert!(errors(&source).is_empty());
}

#[test]
fn integer_variable_index_is_accepted() {
    let decls = "var a: array 3 of integer;\nvar i: integer;";
    assert_eq!(printed_type(decls, "a[i + 1]"), Some(PType::integer()));
}

#[test]
fn invalid_array_is_reported_once() {
    let errs = errors(&program("var a: array 0 of integer;", "print a[1];\nread a[0];"));
    assert_eq!(errs, vec![SemanticError::NonPositiveDimension("a".to_string())]);
}

#[rstest]
#[case("1 + 2", Some(PType::integer()))]
#[case("1 + 2.5", Some(PType::real()))]
#[case("\"a\" + \"b\"", Some(PType::string()))]
#[case("7 mod 2", Some(PType::integer()))]
#[case("1 < 2.5", Some(PType::boolean()))]
#[case("true and false", Some(PType::boolean()))]
#[case("not (1 = 2)", Some(PType::boolean()))]
#[case("-2.5", Some(PType::real()))]
#[case("1 + \"s\"", None)]
#[case("1 mod 2.0", None)]
#[case("true or 1", None)]
#[case("\"a\" < \"b\"", None)]
#[case("not 1", None)]
#[case("-true", None)]
fn operator_result_types(#[case] expr: &str, #[case] expected: Option<PType>) {
    assert_eq!(printed_type("", expr), expected);
}

#[test]
fn operand_errors_name_operator_and_types() {
    let errs = errors(&program("", "print 1 + \"s\";\nprint not 1;"));
    let messages: Vec<_> = errs.iter().map(|e| e.to_string()).collect();
    assert_eq!(
        messages,
        vec![
            "invalid operands to binary operator '+' ('integer' and 'string')",
            "invalid operand to unary operator 'not' ('integer')",
        ]
    );
}

#[test]
fn missing_operand_type_does_not_cascade() {
    let errs = errors(&program("var x: integer;", "x := (y + 1) * 2;"));
    assert_eq!(errs, vec![SemanticError::Undeclared("y".to_string())]);
}

const FUNCTIONS: &str = "
var v: integer;
f(a: integer): integer
begin
  return a;
end
end
g(r: real): real
begin
  return r;
end
end
pr()
begin
end
end
";

#[rstest]
#[case("print f(1);", vec![])]
#[case("print g(1);", vec![])]
#[case("print h(1);", vec![SemanticError::Undeclared("h".to_string())])]
#[case("print v(1);", vec![SemanticError::NonFunction("v".to_string())])]
#[case("print f;", vec![SemanticError::NonVariable("f".to_string())])]
#[case("print f(1, 2);", vec![SemanticError::ArgumentCountMismatch("f".to_string())])]
#[case("print f();", vec![SemanticError::ArgumentCountMismatch("f".to_string())])]
#[case(
    "print f(1.5);",
    vec![SemanticError::IncompatibleArgument { expected: PType::integer(), found: PType::real() }]
)]
#[case("print pr();", vec![SemanticError::PrintNonScalar])]
#[case("pr();", vec![])]
fn invocation_rules(#[case] stmt: &str, #[case] expected: Vec<SemanticError>) {
    assert_eq!(errors(&program(FUNCTIONS, stmt)), expected);
}

#[test]
fn incompatible_return_is_reported_once_at_the_value() {
    let source = "
p;
f(): integer
begin
  return 1.5;
end
end
begin
end
";
    let diagnostics = run(source).1.diagnostics;
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].error,
        SemanticError::IncompatibleReturn {
            expected: PType::integer(),
            found: PType::real(),
        }
    );
    assert_eq!(diagnostics[0].loc, Location::new(5, 10));
}

#[test]
fn integer_return_widens_into_real_function() {
    let source = "p;\nf(): real\nbegin\n  return 1;\nend\nend\nbegin\nend\n";
    assert!(errors(source).is_empty());
}

#[test]
fn procedure_cannot_return_a_value() {
    let source = "p;\npr()\nbegin\n  return 1;\nend\nend\nbegin\nend\n";
    assert_eq!(errors(source), vec![SemanticError::ReturnFromVoid]);
}

#[test]
fn round_trip_program_annotates_the_sum() {
    let (program, analysis) =
        run("program p; var x: integer; begin x := 2 + 3; print x; end");
    assert!(!analysis.has_error());

    let Stmt::Assignment(a) = &program.body.stmts[0] else {
        panic!("expected an assignment");
    };
    assert_eq!(a.rhs.ty(), Some(&PType::integer()));
}

#[test]
fn scopes_are_captured_per_scoping_node() {
    let source = "
p;
var g: integer;
f(a: integer; b: array 2 of real): boolean
begin
  var c: 3;
  return true;
end
end
begin
  for i := 1 to 2 do begin end end do
end
";
    let (program, analysis) = run(source);
    assert!(!analysis.has_error());

    let global = analysis.scopes.get(program.id).unwrap();
    assert_eq!(global.level(), 0);
    let names: Vec<_> = global.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["p", "g", "f"]);

    let f = global.lookup("f").unwrap();
    assert_eq!(f.kind, SymbolKind::Function);
    assert_eq!(f.ty, PType::boolean());
    assert_eq!(
        f.attribute,
        Some(Attribute::Signature("integer, real [2]".to_string()))
    );

    let function_scope = analysis.scopes.get(program.functions[0].id).unwrap();
    assert_eq!(function_scope.level(), 1);
    let kinds: Vec<_> = function_scope.entries().iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![SymbolKind::Parameter, SymbolKind::Parameter, SymbolKind::Constant]
    );

    let Stmt::For(for_stmt) = &program.body.stmts[0] else {
        panic!("expected a for statement");
    };
    let loop_scope = analysis.scopes.get(for_stmt.id).unwrap();
    assert_eq!(loop_scope.level(), 2);
    assert_eq!(loop_scope.entries()[0].kind, SymbolKind::LoopVar);

    // Program, function, main body, loop and loop body.
    assert_eq!(analysis.scopes.len(), 5);
}

#[test]
fn table_dump_lists_entries_in_declaration_order() {
    let source = "//&D+\np;\nvar x: integer;\nvar c: 3;\nbegin\nend\n";
    let dump = run(source).1.table_dump;
    let lines: Vec<_> = dump.lines().collect();

    let rule = "=".repeat(110);
    assert_eq!(lines.iter().filter(|l| **l == rule).count(), 2);
    assert!(lines.contains(&format!("{:<33}{:<11}{:<11}{:<17}{:<11}", "Name", "Kind", "Level", "Type", "Attribute").as_str()));

    let rows = [
        format!("{:<33}{:<11}{:<11}{:<17}{:<11}", "p", "program", "0(global)", "void", ""),
        format!("{:<33}{:<11}{:<11}{:<17}{:<11}", "x", "variable", "0(global)", "integer", ""),
        format!("{:<33}{:<11}{:<11}{:<17}{:<11}", "c", "constant", "0(global)", "integer", "3"),
    ];
    let start = lines.iter().position(|l| *l == rows[0]).unwrap();
    assert_eq!(lines[start + 1], rows[1]);
    assert_eq!(lines[start + 2], rows[2]);
}

#[rstest]
#[case("p;\nbegin\nend\n", true, true)]
#[case("p;\nbegin\nend\n", false, false)]
#[case("//&D-\np;\nbegin\nend\n", true, false)]
#[case("//&D+\np;\nbegin\nend\n", false, true)]
fn pseudo_comment_overrides_dump_option(
    #[case] source: &str,
    #[case] dump_table: bool,
    #[case] dumped: bool,
) {
    let options = CompileOptions {
        dump_table,
        ..options()
    };
    let (_, analysis) = analyze(source, &options).unwrap();
    assert_eq!(!analysis.table_dump.is_empty(), dumped);
}

#[test]
fn diagnostics_render_with_source_and_caret() {
    let source = "p;\nbegin\n  print y;\nend\n";
    let diagnostics = run(source).1.diagnostics;
    assert_eq!(
        diagnostics[0].render(source),
        "<Error> Found in line 3, column 9: use of undeclared symbol 'y'\n      print y;\n            ^\n"
    );
}

#[test]
fn analysis_continues_after_errors() {
    let errs = errors(&program(
        "var c: 1;",
        "c := 2;\nprint z;\nif 3 then begin end end if",
    ));
    assert_eq!(
        errs,
        vec![
            SemanticError::AssignToConstant("c".to_string()),
            SemanticError::Undeclared("z".to_string()),
            SemanticError::NonBooleanCondition,
        ]
    );
}
