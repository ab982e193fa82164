use pretty_assertions::assert_eq;

use crate::ast::*;
use crate::lex::{self, Punct, Token};
use crate::parser;
use crate::ty::{self, StorageClass, TypeInfo, TypeKind};

fn ident(name: &str) -> Expr {
    Expr::Identifier(Box::new(IdentifierExpr::new(name)))
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary(Box::new(BinaryExpr {
        op,
        lhs,
        rhs,
        ty: None,
    }))
}

fn tokens(source: &str) -> Vec<Token> {
    lex::tokenize(source)
        .expect("lexing should succeed")
        .into_iter()
        .map(|l| l.token)
        .collect()
}

fn parse(source: &str) -> Program {
    parser::parse(source).expect("parsing should succeed")
}

/// The body of the sole function in `source`.
fn body_of(source: &str) -> Vec<Stmt> {
    let program = parse(source);
    for decl in program.decls {
        if let ExternalDecl::Function(def) = decl {
            if let Some(Stmt::Compound(stmts)) = def.body {
                return stmts;
            }
        }
    }
    panic!("no function definition in source");
}

fn expr_of(source: &str) -> Expr {
    let body = body_of(&format!("int f() {{ {} ; }}", source));
    match body.into_iter().next() {
        Some(Stmt::Expr(e)) => e,
        other => panic!("expected expression statement, got {:?}", other),
    }
}

// ----- lexer ----------------------------------------------------------------

#[test]
fn lex_keywords_and_identifiers() {
    assert_eq!(
        tokens("int foo"),
        vec![
            Token::Keyword("int".to_string()),
            Token::Identifier("foo".to_string()),
        ]
    );
}

#[test]
fn lex_multichar_punctuators() {
    assert_eq!(
        tokens("a <<= b -> c ++ ... == !="),
        vec![
            Token::Identifier("a".to_string()),
            Token::Punct(Punct::ShiftLeftAssign),
            Token::Identifier("b".to_string()),
            Token::Punct(Punct::Arrow),
            Token::Identifier("c".to_string()),
            Token::Punct(Punct::PlusPlus),
            Token::Punct(Punct::Ellipsis),
            Token::Punct(Punct::EqualEqual),
            Token::Punct(Punct::BangEqual),
        ]
    );
}

#[test]
fn lex_integer_bases_and_suffixes() {
    assert_eq!(
        tokens("42 0x2A 052 42L 42u"),
        vec![
            Token::Integer(42),
            Token::Integer(42),
            Token::Integer(42),
            Token::Integer(42),
            Token::Integer(42),
        ]
    );
}

#[test]
fn lex_char_and_string_escapes() {
    assert_eq!(
        tokens(r#"'\n' '\x41' "a\tb""#),
        vec![
            Token::CharLiteral(b'\n'),
            Token::CharLiteral(b'A'),
            Token::StringLiteral("a\tb".to_string()),
        ]
    );
}

#[test]
fn lex_skips_comments() {
    assert_eq!(
        tokens("a // line\n/* block\nstill */ b"),
        vec![
            Token::Identifier("a".to_string()),
            Token::Identifier("b".to_string()),
        ]
    );
}

#[test]
fn lex_tracks_lines() {
    let lexemes = lex::tokenize("a\nb\n  c").expect("lexing should succeed");
    let lines: Vec<u32> = lexemes.iter().map(|l| l.line).collect();
    assert_eq!(lines, vec![1, 2, 3]);
}

// ----- expression parsing ---------------------------------------------------

#[test]
fn multiplication_binds_tighter_than_addition() {
    assert_eq!(
        expr_of("1 + 2 * 3"),
        binary(
            BinaryOp::Add,
            Expr::Number(1),
            binary(BinaryOp::Mul, Expr::Number(2), Expr::Number(3)),
        )
    );
}

#[test]
fn comparison_of_shifts() {
    assert_eq!(
        expr_of("a << 1 < b"),
        binary(
            BinaryOp::Lt,
            binary(BinaryOp::Shl, ident("a"), Expr::Number(1)),
            ident("b"),
        )
    );
}

#[test]
fn assignment_is_right_associative() {
    let expr = expr_of("a = b = 1");
    match expr {
        Expr::Assign(outer) => {
            assert_eq!(outer.target, AssignTarget::Name("a".to_string()));
            assert!(matches!(outer.value, Expr::Assign(_)));
        }
        other => panic!("expected assignment, got {:?}", other),
    }
}

#[test]
fn compound_assignment_carries_operator() {
    match expr_of("a += 2") {
        Expr::Assign(assign) => {
            assert_eq!(assign.op, Some(BinaryOp::Add));
            assert_eq!(assign.value, Expr::Number(2));
        }
        other => panic!("expected assignment, got {:?}", other),
    }
}

#[test]
fn member_operators() {
    match expr_of("p->next") {
        Expr::Member(m) => {
            assert_eq!(m.operator, MemberOperator::Indirect);
            assert_eq!(m.member, "next");
        }
        other => panic!("expected member access, got {:?}", other),
    }
    match expr_of("s.value") {
        Expr::Member(m) => assert_eq!(m.operator, MemberOperator::Direct),
        other => panic!("expected member access, got {:?}", other),
    }
}

#[test]
fn sizeof_type_and_expression() {
    match expr_of("sizeof(int)") {
        Expr::Sizeof(s) => match s.arg {
            SizeofArg::Type(ty) => assert_eq!(ty.base, "int"),
            other => panic!("expected type argument, got {:?}", other),
        },
        other => panic!("expected sizeof, got {:?}", other),
    }
    match expr_of("sizeof(x)") {
        Expr::Sizeof(s) => assert!(matches!(s.arg, SizeofArg::Expr(_))),
        other => panic!("expected sizeof, got {:?}", other),
    }
}

#[test]
fn cast_versus_parenthesized_expression() {
    assert!(matches!(expr_of("(long) x"), Expr::Cast(_)));
    assert!(matches!(expr_of("(x)"), Expr::Identifier(_)));
}

#[test]
fn postfix_and_prefix_increment() {
    match expr_of("x++") {
        Expr::Unary(u) => assert_eq!(u.op, UnaryOp::PostIncrement),
        other => panic!("expected unary, got {:?}", other),
    }
    match expr_of("--x") {
        Expr::Unary(u) => assert_eq!(u.op, UnaryOp::PreDecrement),
        other => panic!("expected unary, got {:?}", other),
    }
}

#[test]
fn adjacent_string_literals_concatenate() {
    assert_eq!(
        expr_of(r#"f("ab" "cd")"#),
        Expr::Call(Box::new(CallExpr {
            name: "f".to_string(),
            args: vec![Expr::StringLiteral("abcd".to_string())],
            ty: None,
        }))
    );
}

// ----- declarations ---------------------------------------------------------

#[test]
fn function_definition_shape() {
    let program = parse("int add(int a, int b) { return a + b; }");
    assert_eq!(program.decls.len(), 1);
    match &program.decls[0] {
        ExternalDecl::Function(def) => {
            assert_eq!(def.name, "add");
            assert_eq!(def.return_type.base, "int");
            assert_eq!(def.params.len(), 2);
            assert!(def.is_defined());
            assert!(!def.variadic);
        }
        other => panic!("expected function, got {:?}", other),
    }
}

#[test]
fn variadic_prototype() {
    let program = parse("int printf(char *fmt, ...);");
    match &program.decls[0] {
        ExternalDecl::Function(def) => {
            assert!(def.variadic);
            assert!(!def.is_defined());
            assert_eq!(def.params[0].ty.pointer_level, 1);
        }
        other => panic!("expected function, got {:?}", other),
    }
}

#[test]
fn pointer_declarator_levels() {
    let body = body_of("int f() { int **pp; }");
    match &body[0] {
        Stmt::Declaration(decl) => {
            assert_eq!(decl.ty.pointer_level, 2);
            assert_eq!(decl.ty.base, "int");
        }
        other => panic!("expected declaration, got {:?}", other),
    }
}

#[test]
fn array_declaration_and_vla() {
    let body = body_of("int f(int n) { int fixed[4]; int dynamic[n]; }");
    match (&body[0], &body[1]) {
        (Stmt::Array(fixed), Stmt::Array(dynamic)) => {
            assert!(!fixed.is_vla);
            assert_eq!(fixed.size, Some(Expr::Number(4)));
            assert!(dynamic.is_vla);
        }
        other => panic!("expected two array declarations, got {:?}", other),
    }
}

#[test]
fn multiple_declarators_desugar() {
    let body = body_of("int f() { int a, b = 2; }");
    assert_eq!(body.len(), 2);
    match (&body[0], &body[1]) {
        (Stmt::Declaration(a), Stmt::Declaration(b)) => {
            assert_eq!(a.name, "a");
            assert_eq!(a.init, None);
            assert_eq!(b.name, "b");
            assert_eq!(b.init, Some(Expr::Number(2)));
        }
        other => panic!("expected two declarations, got {:?}", other),
    }
}

#[test]
fn struct_definition_hoists_before_declarator() {
    let program = parse("struct point { int x; int y; } origin;");
    assert_eq!(program.decls.len(), 2);
    match (&program.decls[0], &program.decls[1]) {
        (ExternalDecl::Struct(record), ExternalDecl::Declaration(decl)) => {
            assert_eq!(record.name, "point");
            assert_eq!(record.members.len(), 2);
            assert!(record.is_definition);
            assert_eq!(decl.name, "origin");
            assert_eq!(decl.ty.kind, TypeKind::Struct);
            assert_eq!(decl.ty.base, "point");
        }
        other => panic!("expected struct + declaration, got {:?}", other),
    }
}

#[test]
fn enum_values_with_explicit_constants() {
    let program = parse("enum color { RED, GREEN = 5, BLUE };");
    match &program.decls[0] {
        ExternalDecl::Enum(decl) => {
            assert_eq!(decl.values.len(), 3);
            assert_eq!(decl.values[0].value, None);
            assert_eq!(decl.values[1].value, Some(Expr::Number(5)));
        }
        other => panic!("expected enum, got {:?}", other),
    }
}

#[test]
fn typedef_names_parse_as_types() {
    let program = parse("typedef unsigned long size_type; size_type total;");
    match &program.decls[1] {
        ExternalDecl::Declaration(decl) => {
            assert_eq!(decl.ty.base, "unsigned long");
            assert_eq!(decl.ty.storage, StorageClass::None);
        }
        other => panic!("expected declaration, got {:?}", other),
    }
}

#[test]
fn storage_classes_recorded() {
    let program = parse("static int counter;");
    match &program.decls[0] {
        ExternalDecl::Declaration(decl) => {
            assert_eq!(decl.ty.storage, StorageClass::Static);
        }
        other => panic!("expected declaration, got {:?}", other),
    }
}

#[test]
fn for_loop_with_declaration_init() {
    let body = body_of("int f() { for (int i = 0; i < 3; i++) {} }");
    match &body[0] {
        Stmt::For(for_stmt) => {
            assert!(matches!(for_stmt.init, Some(Stmt::Declaration(_))));
            assert!(for_stmt.condition.is_some());
            assert!(for_stmt.update.is_some());
        }
        other => panic!("expected for loop, got {:?}", other),
    }
}

#[test]
fn labels_and_gotos() {
    let body = body_of("int f() { goto done; done: return 0; }");
    assert!(matches!(&body[0], Stmt::Goto(label) if label == "done"));
    match &body[1] {
        Stmt::Label(label_stmt) => {
            assert_eq!(label_stmt.label, "done");
            assert!(matches!(label_stmt.statement, Stmt::Return(_)));
        }
        other => panic!("expected label, got {:?}", other),
    }
}

// ----- constant folding -----------------------------------------------------

#[test]
fn const_value_folds_arithmetic() {
    assert_eq!(expr_of("2 + 3 * 4").const_value(), Some(14));
    assert_eq!(expr_of("-(1 << 4)").const_value(), Some(-16));
    assert_eq!(expr_of("10 / 0").const_value(), None);
    assert_eq!(expr_of("3 < 6").const_value(), Some(1));
}

// ----- type model -----------------------------------------------------------

#[test]
fn integer_promotions() {
    assert_eq!(TypeInfo::char_().promoted(), TypeInfo::int());
    assert_eq!(TypeInfo::named("short").promoted(), TypeInfo::int());
    assert_eq!(TypeInfo::bool_().promoted(), TypeInfo::int());
    assert_eq!(TypeInfo::named("long").promoted(), TypeInfo::named("long"));
}

#[test]
fn usual_arithmetic_conversions() {
    let int = TypeInfo::int();
    let long = TypeInfo::named("long");
    let double = TypeInfo::named("double");
    assert_eq!(ty::usual_arithmetic(&int, &long), long);
    assert_eq!(ty::usual_arithmetic(&int, &int), int);
    assert_eq!(ty::usual_arithmetic(&double, &long), double);
}

#[test]
fn array_decay_and_reference() {
    let mut arr = TypeInfo::int();
    arr.is_array = true;
    arr.array_size = Some(Box::new(Expr::Number(4)));
    let decayed = arr.decayed();
    assert!(!decayed.is_array);
    assert_eq!(decayed.pointer_level, 1);
    assert_eq!(arr.referenced().pointer_level, 1);
}

#[test]
fn convertibility_rules() {
    let int = TypeInfo::int();
    let chr = TypeInfo::char_();
    let int_ptr = int.referenced();
    let mut void_ptr = TypeInfo::void();
    void_ptr.pointer_level = 1;

    assert!(ty::can_convert_to(&chr, &int));
    assert!(ty::can_convert_to(&int_ptr, &void_ptr));
    assert!(ty::can_convert_to(&void_ptr, &int_ptr));
    assert!(!ty::can_convert_to(&int, &int_ptr));

    let mut arr = TypeInfo::int();
    arr.is_array = true;
    assert!(ty::can_convert_to(&arr, &int_ptr));
}
