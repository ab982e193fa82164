use pretty_assertions::assert_eq;

use minicc_syntax::ast::Expr;
use minicc_syntax::ty::{TypeInfo, TypeKind};

use super::{SymbolKind, SymbolTable};

fn int_array(len: i64) -> TypeInfo {
    let mut ty = TypeInfo::int();
    ty.is_array = true;
    ty.array_size = Some(Box::new(Expr::Number(len)));
    ty
}

#[test]
fn lookup_walks_outwards_and_first_hit_wins() {
    let mut table = SymbolTable::new();
    table.add_symbol("x", SymbolKind::Variable, &TypeInfo::int());
    table.enter_scope();
    table.add_symbol("x", SymbolKind::Variable, &TypeInfo::char_());

    let found = table.find_symbol("x").expect("x is in scope");
    assert_eq!(found.ty.base, "char");
    assert_eq!(found.scope_level, 1);

    table.exit_scope();
    let found = table.find_symbol("x").expect("outer x survives");
    assert_eq!(found.ty.base, "int");
}

#[test]
fn exit_scope_drops_locals() {
    let mut table = SymbolTable::new();
    table.enter_scope();
    table.add_symbol("local", SymbolKind::Variable, &TypeInfo::int());
    assert!(table.find_symbol("local").is_some());
    table.exit_scope();
    assert!(table.find_symbol("local").is_none());
}

#[test]
fn redeclaration_in_same_scope_fails() {
    let mut table = SymbolTable::new();
    assert!(table
        .add_symbol("x", SymbolKind::Variable, &TypeInfo::int())
        .is_some());
    assert!(table
        .add_symbol("x", SymbolKind::Variable, &TypeInfo::int())
        .is_none());
}

#[test]
fn unique_names_follow_the_scheme() {
    let mut table = SymbolTable::new();
    let global = table
        .add_symbol("g", SymbolKind::Variable, &TypeInfo::int())
        .expect("fresh name")
        .llvm_name
        .clone();
    assert_eq!(global, "global.g.1");

    table.set_current_function("main");
    table.enter_scope();
    table.enter_scope();
    let local = table
        .add_symbol("x", SymbolKind::Variable, &TypeInfo::int())
        .expect("fresh name")
        .llvm_name
        .clone();
    assert_eq!(local, "main.x.2.2");
}

#[test]
fn struct_layout_inserts_padding() {
    let mut table = SymbolTable::new();
    let tag = TypeInfo::record("S", TypeKind::Struct);
    table.add_symbol("S", SymbolKind::Struct, &tag);
    table.add_struct_member("S", "a", TypeInfo::char_());
    table.add_struct_member("S", "b", TypeInfo::int());
    table.add_struct_member("S", "c", TypeInfo::char_());

    let record = table.find_symbol("S").expect("S is registered");
    let offsets: Vec<u64> = record.members.iter().map(|m| m.offset).collect();
    assert_eq!(offsets, vec![0, 4, 8]);
    assert_eq!(record.total_size, 12);
    assert_eq!(record.max_alignment, 4);

    // layout invariants
    for member in &record.members {
        assert_eq!(member.offset % member.alignment, 0);
    }
    assert_eq!(record.total_size % record.max_alignment, 0);
}

#[test]
fn union_members_share_offset_zero() {
    let mut table = SymbolTable::new();
    let tag = TypeInfo::record("U", TypeKind::Union);
    table.add_symbol("U", SymbolKind::Union, &tag);
    table.add_struct_member("U", "c", TypeInfo::char_());
    table.add_struct_member("U", "l", TypeInfo::named("long"));

    let record = table.find_symbol("U").expect("U is registered");
    assert!(record.members.iter().all(|m| m.offset == 0));
    assert_eq!(record.total_size, 8);
    assert_eq!(record.max_alignment, 8);
}

#[test]
fn empty_struct_has_size_zero() {
    let mut table = SymbolTable::new();
    let tag = TypeInfo::record("E", TypeKind::Struct);
    table.add_symbol("E", SymbolKind::Struct, &tag);
    let record = table.find_symbol("E").expect("E is registered");
    assert_eq!(record.total_size, 0);
    assert_eq!(record.max_alignment, 1);
}

#[test]
fn type_sizes() {
    let table = SymbolTable::new();
    assert_eq!(table.type_size(&TypeInfo::char_()), 1);
    assert_eq!(table.type_size(&TypeInfo::named("short")), 2);
    assert_eq!(table.type_size(&TypeInfo::int()), 4);
    assert_eq!(table.type_size(&TypeInfo::named("long")), 8);
    assert_eq!(table.type_size(&TypeInfo::int().referenced()), 8);
    assert_eq!(table.type_size(&int_array(4)), 16);
}

#[test]
fn vla_storage_is_pointer_sized() {
    let mut ty = TypeInfo::int();
    ty.is_array = true;
    ty.is_vla = true;
    let table = SymbolTable::new();
    assert_eq!(table.type_size(&ty), 8);
}

#[test]
fn enum_constants_are_global() {
    let mut table = SymbolTable::new();
    table.enter_scope();
    table.add_enum_constant("RED", 2);
    table.exit_scope();

    let sym = table.find_symbol("RED").expect("enum constant survives scope exit");
    assert_eq!(sym.kind, SymbolKind::EnumConstant);
    assert_eq!(sym.enum_value, 2);
    assert!(sym.is_global);
}

#[test]
fn labels_have_function_scope() {
    let mut table = SymbolTable::new();
    table.enter_scope();
    table.enter_scope();
    table.add_label("done");
    table.exit_scope();
    // the label's own scope was popped with its block
    assert!(table.find_label("done").is_none());

    table.add_label("again");
    table.enter_scope();
    assert!(table.find_label("again").is_some());
    table.exit_scope();
}

#[test]
fn forward_referenced_label_is_marked_undefined() {
    let mut table = SymbolTable::new();
    table.enter_scope();
    let sym = table.add_label("target").expect("fresh label");
    sym.label_defined = false;

    let found = table.find_label("target").expect("label is bound");
    assert!(!found.label_defined);
    table.find_label_mut("target").expect("label is bound").label_defined = true;
    assert!(table.find_label("target").expect("label is bound").label_defined);
}

#[test]
fn expression_types() {
    let mut table = SymbolTable::new();
    table.add_symbol("p", SymbolKind::Variable, &TypeInfo::int().referenced());
    table.add_symbol("c", SymbolKind::Variable, &TypeInfo::char_());

    assert_eq!(table.expression_type(&Expr::Number(1)), TypeInfo::int());
    assert_eq!(
        table.expression_type(&Expr::StringLiteral("s".to_string())),
        TypeInfo::char_ptr()
    );

    let p = Expr::Identifier(Box::new(minicc_syntax::ast::IdentifierExpr::new("p")));
    let deref = Expr::Dereference(Box::new(minicc_syntax::ast::DerefExpr {
        operand: p.clone(),
        ty: None,
    }));
    assert_eq!(table.expression_type(&deref), TypeInfo::int());

    let addr = Expr::AddressOf(Box::new(minicc_syntax::ast::AddressOfExpr {
        operand: p,
        ty: None,
    }));
    assert_eq!(table.expression_type(&addr).pointer_level, 2);

    // comparisons are _Bool, arithmetic promotes char to int
    let c = Expr::Identifier(Box::new(minicc_syntax::ast::IdentifierExpr::new("c")));
    let cmp = Expr::Binary(Box::new(minicc_syntax::ast::BinaryExpr {
        op: minicc_syntax::ast::BinaryOp::Lt,
        lhs: c.clone(),
        rhs: Expr::Number(3),
        ty: None,
    }));
    assert_eq!(table.expression_type(&cmp), TypeInfo::bool_());
    let sum = Expr::Binary(Box::new(minicc_syntax::ast::BinaryExpr {
        op: minicc_syntax::ast::BinaryOp::Add,
        lhs: c,
        rhs: Expr::Number(3),
        ty: None,
    }));
    assert_eq!(table.expression_type(&sum), TypeInfo::int());
}
