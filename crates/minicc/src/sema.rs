//! Semantic analysis.
//!
//! Walks the AST with its own symbol table, resolves every identifier,
//! fills in the resolved-type fields the parser left empty, and collects
//! the translation unit's error list. The driver stops before emission
//! when this list is non-empty, unless `-f` forces best-effort IR.

use std::collections::HashSet;

use minicc_syntax::ast::*;
use minicc_syntax::ty::{self, TypeInfo, TypeKind};
use thiserror::Error;

use crate::symtab::{SymbolKind, SymbolTable};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SemaError {
    #[error("redeclaration of `{0}`")]
    Redeclaration(String),
    #[error("use of undeclared identifier `{0}`")]
    Undeclared(String),
    #[error("type mismatch: cannot convert `{from}` to `{to}`")]
    TypeMismatch { from: String, to: String },
    #[error("call to `{name}` with {got} argument(s), expected {expected}")]
    ArityMismatch {
        name: String,
        got: usize,
        expected: usize,
    },
    #[error("expression is not assignable")]
    BadLvalue,
    #[error("invalid member access: {0}")]
    BadMemberAccess(String),
    #[error("`break` outside of a loop or switch")]
    MissingBreakTarget,
    #[error("`continue` outside of a loop")]
    MissingContinueTarget,
    #[error("label `{0}` used but never defined")]
    UnresolvedGoto(String),
    #[error("{0}")]
    Invalid(String),
}

pub struct Analyzer {
    pub table: SymbolTable,
    pub errors: Vec<SemaError>,
    current_return: TypeInfo,
    loop_depth: usize,
    switch_depth: usize,
    gotos: Vec<String>,
    labels: HashSet<String>,
}

/// Run the semantic pass over a whole program, filling resolved types in
/// place. Returns the collected errors; an empty list means the program
/// is ready for emission.
pub fn check(program: &mut Program) -> Vec<SemaError> {
    let mut analyzer = Analyzer::new();
    analyzer.check_program(program);
    log::debug!("semantic pass finished with {} error(s)", analyzer.errors.len());
    analyzer.errors
}

fn is_lvalue_shape(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Identifier(_) | Expr::Index(_) | Expr::Dereference(_) | Expr::Member(_)
    )
}

impl Analyzer {
    pub fn new() -> Analyzer {
        Analyzer {
            table: SymbolTable::new(),
            errors: Vec::new(),
            current_return: TypeInfo::void(),
            loop_depth: 0,
            switch_depth: 0,
            gotos: Vec::new(),
            labels: HashSet::new(),
        }
    }

    fn error(&mut self, error: SemaError) {
        self.errors.push(error);
    }

    fn check_program(&mut self, program: &mut Program) {
        // Types and prototypes first, mirroring emission order.
        for decl in &mut program.decls {
            match decl {
                ExternalDecl::Struct(d) => self.register_record(d, SymbolKind::Struct),
                ExternalDecl::Union(d) => self.register_record(d, SymbolKind::Union),
                ExternalDecl::Enum(d) => self.register_enum(d),
                ExternalDecl::Typedef(d) => {
                    self.table.add_symbol(&d.name, SymbolKind::Typedef, &d.ty);
                }
                _ => {}
            }
        }
        for decl in &mut program.decls {
            if let ExternalDecl::Function(def) = decl {
                if !def.is_defined() {
                    self.register_function(def, false);
                }
            }
        }
        for decl in &mut program.decls {
            match decl {
                ExternalDecl::Function(def) if def.is_defined() => self.check_function(def),
                ExternalDecl::Declaration(d) => self.check_global_declaration(d),
                ExternalDecl::Array(d) => {
                    if d.is_vla {
                        self.error(SemaError::Invalid(format!(
                            "variable-length array `{}` at file scope",
                            d.name
                        )));
                    }
                    if self.table.add_symbol(&d.name, SymbolKind::Variable, &d.ty).is_none() {
                        self.error(SemaError::Redeclaration(d.name.clone()));
                    }
                }
                _ => {}
            }
        }
    }

    fn register_record(&mut self, decl: &RecordDecl, kind: SymbolKind) {
        let type_kind = if kind == SymbolKind::Union {
            TypeKind::Union
        } else {
            TypeKind::Struct
        };
        let tag_ty = TypeInfo::record(&decl.name, type_kind);
        if self.table.add_symbol(&decl.name, kind, &tag_ty).is_none() && decl.is_definition {
            let already_defined = self
                .table
                .find_symbol(&decl.name)
                .map(|s| !s.members.is_empty())
                .unwrap_or(false);
            if already_defined {
                self.error(SemaError::Redeclaration(decl.name.clone()));
                return;
            }
        }
        for member in &decl.members {
            self.table
                .add_struct_member(&decl.name, &member.name, member.ty.clone());
        }
    }

    fn register_enum(&mut self, decl: &EnumDecl) {
        let tag_ty = TypeInfo::record(&decl.name, TypeKind::Enum);
        self.table.add_symbol(&decl.name, SymbolKind::Enum, &tag_ty);
        let mut next_value = 0i64;
        for value in &decl.values {
            let v = match &value.value {
                Some(expr) => match expr.const_value() {
                    Some(v) => v,
                    None => {
                        self.error(SemaError::Invalid(format!(
                            "enum value `{}` is not a constant expression",
                            value.name
                        )));
                        next_value
                    }
                },
                None => next_value,
            };
            if self.table.add_enum_constant(&value.name, v).is_none() {
                self.error(SemaError::Redeclaration(value.name.clone()));
            }
            next_value = v + 1;
        }
    }

    fn register_function(&mut self, def: &FunctionDef, defined: bool) {
        // A definition after a prototype is a redefinition only if a body
        // was already seen.
        let existing = self
            .table
            .find_symbol(&def.name)
            .map(|s| (s.kind, s.is_function_defined));
        match existing {
            Some((SymbolKind::Function, already_defined)) => {
                if defined && already_defined {
                    self.error(SemaError::Redeclaration(def.name.clone()));
                } else if defined {
                    if let Some(sym) = self.table.find_symbol_mut(&def.name) {
                        sym.is_function_defined = true;
                        sym.params = def.params.clone();
                        sym.variadic = def.variadic;
                    }
                }
            }
            Some(_) => self.error(SemaError::Redeclaration(def.name.clone())),
            None => {
                if let Some(sym) =
                    self.table
                        .add_symbol(&def.name, SymbolKind::Function, &def.return_type)
                {
                    sym.is_function_defined = defined;
                    sym.params = def.params.clone();
                    sym.variadic = def.variadic;
                    sym.is_extern = !defined;
                }
            }
        }
    }

    fn check_global_declaration(&mut self, decl: &mut Declaration) {
        if self
            .table
            .add_symbol(&decl.name, SymbolKind::Variable, &decl.ty)
            .is_none()
        {
            self.error(SemaError::Redeclaration(decl.name.clone()));
        }
        if let Some(init) = &mut decl.init {
            let init_ty = self.resolve_expr(init);
            self.require_convertible(&init_ty, &decl.ty);
            if init.const_value().is_none() && !matches!(init, Expr::StringLiteral(_)) {
                self.error(SemaError::Invalid(format!(
                    "global initializer for `{}` is not a constant",
                    decl.name
                )));
            }
        }
    }

    fn check_function(&mut self, def: &mut FunctionDef) {
        self.register_function(def, true);

        if def.return_type.is_record() && def.return_type.pointer_level == 0 {
            self.error(SemaError::Invalid(format!(
                "function `{}` returns an aggregate; only scalar and pointer returns are supported",
                def.name
            )));
        }

        self.table.set_current_function(&def.name);
        self.current_return = def.return_type.clone();
        self.loop_depth = 0;
        self.switch_depth = 0;
        self.gotos.clear();
        self.labels.clear();

        self.table.enter_scope();
        for param in &def.params {
            match self
                .table
                .add_symbol(&param.name, SymbolKind::Variable, &param.ty)
            {
                Some(sym) => sym.is_parameter = true,
                None => self.error(SemaError::Redeclaration(param.name.clone())),
            }
        }
        if let Some(body) = &mut def.body {
            self.resolve_stmt(body);
        }
        self.table.exit_scope();

        let labels = std::mem::take(&mut self.labels);
        for goto in std::mem::take(&mut self.gotos) {
            if !labels.contains(&goto) {
                self.error(SemaError::UnresolvedGoto(goto));
            }
        }
        self.table.clear_current_function();
    }

    // ----- statements -----------------------------------------------------

    fn resolve_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Compound(stmts) => {
                self.table.enter_scope();
                for s in stmts {
                    self.resolve_stmt(s);
                }
                self.table.exit_scope();
            }

            Stmt::Declaration(decl) => {
                if self
                    .table
                    .add_symbol(&decl.name, SymbolKind::Variable, &decl.ty)
                    .is_none()
                {
                    self.error(SemaError::Redeclaration(decl.name.clone()));
                }
                if let Some(init) = &mut decl.init {
                    let init_ty = self.resolve_expr(init);
                    self.require_convertible(&init_ty, &decl.ty);
                }
            }

            Stmt::Array(decl) => {
                if self
                    .table
                    .add_symbol(&decl.name, SymbolKind::Variable, &decl.ty)
                    .is_none()
                {
                    self.error(SemaError::Redeclaration(decl.name.clone()));
                }
                if let Some(size) = &mut decl.size {
                    let size_ty = self.resolve_expr(size);
                    if !size_ty.is_integer() {
                        self.error(SemaError::TypeMismatch {
                            from: size_ty.to_string(),
                            to: "int".to_string(),
                        });
                    }
                }
            }

            Stmt::Struct(decl) => self.register_record(decl, SymbolKind::Struct),
            Stmt::Union(decl) => self.register_record(decl, SymbolKind::Union),
            Stmt::Enum(decl) => self.register_enum(decl),
            Stmt::Typedef(decl) => {
                self.table
                    .add_symbol(&decl.name, SymbolKind::Typedef, &decl.ty);
            }

            Stmt::If(if_stmt) => {
                self.resolve_expr(&mut if_stmt.condition);
                self.table.enter_scope();
                self.resolve_stmt(&mut if_stmt.then_stmt);
                self.table.exit_scope();
                if let Some(else_stmt) = &mut if_stmt.else_stmt {
                    self.table.enter_scope();
                    self.resolve_stmt(else_stmt);
                    self.table.exit_scope();
                }
            }

            Stmt::While(while_stmt) => {
                self.resolve_expr(&mut while_stmt.condition);
                self.loop_depth += 1;
                self.table.enter_scope();
                self.resolve_stmt(&mut while_stmt.body);
                self.table.exit_scope();
                self.loop_depth -= 1;
            }

            Stmt::DoWhile(do_stmt) => {
                self.loop_depth += 1;
                self.table.enter_scope();
                self.resolve_stmt(&mut do_stmt.body);
                self.table.exit_scope();
                self.loop_depth -= 1;
                self.resolve_expr(&mut do_stmt.condition);
            }

            Stmt::For(for_stmt) => {
                self.table.enter_scope();
                if let Some(init) = &mut for_stmt.init {
                    self.resolve_stmt(init);
                }
                if let Some(condition) = &mut for_stmt.condition {
                    self.resolve_expr(condition);
                }
                if let Some(update) = &mut for_stmt.update {
                    self.resolve_expr(update);
                }
                self.loop_depth += 1;
                self.resolve_stmt(&mut for_stmt.body);
                self.loop_depth -= 1;
                self.table.exit_scope();
            }

            Stmt::Switch(switch_stmt) => {
                self.resolve_expr(&mut switch_stmt.expression);
                self.switch_depth += 1;
                self.table.enter_scope();
                self.resolve_stmt(&mut switch_stmt.body);
                self.table.exit_scope();
                self.switch_depth -= 1;
            }

            Stmt::Case(case_stmt) => {
                if case_stmt.value.const_value().is_none() {
                    self.error(SemaError::Invalid(
                        "case label is not a constant expression".to_string(),
                    ));
                }
                self.resolve_stmt(&mut case_stmt.statement);
            }

            Stmt::Default(default_stmt) => self.resolve_stmt(&mut default_stmt.statement),

            Stmt::Break => {
                if self.loop_depth == 0 && self.switch_depth == 0 {
                    self.error(SemaError::MissingBreakTarget);
                }
            }

            Stmt::Continue => {
                if self.loop_depth == 0 {
                    self.error(SemaError::MissingContinueTarget);
                }
            }

            Stmt::Goto(label) => self.gotos.push(label.clone()),

            Stmt::Label(label_stmt) => {
                if !self.labels.insert(label_stmt.label.clone()) {
                    self.error(SemaError::Redeclaration(label_stmt.label.clone()));
                }
                self.resolve_stmt(&mut label_stmt.statement);
            }

            Stmt::Return(value) => {
                if let Some(expr) = value {
                    let ty = self.resolve_expr(expr);
                    let expected = self.current_return.clone();
                    self.require_convertible(&ty, &expected);
                }
            }

            Stmt::Expr(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::Empty => {}
        }
    }

    // ----- expressions ----------------------------------------------------

    fn require_convertible(&mut self, from: &TypeInfo, to: &TypeInfo) {
        if !ty::can_convert_to(from, to) {
            self.error(SemaError::TypeMismatch {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
    }

    fn resolve_expr(&mut self, expr: &mut Expr) -> TypeInfo {
        match expr {
            Expr::Number(_) => TypeInfo::int(),
            Expr::Character(_) => TypeInfo::char_(),
            Expr::StringLiteral(_) => TypeInfo::char_ptr(),

            Expr::Identifier(id) => {
                let ty = match self.table.find_symbol(&id.name) {
                    Some(sym) => sym.ty.clone(),
                    None => {
                        self.error(SemaError::Undeclared(id.name.clone()));
                        TypeInfo::int()
                    }
                };
                id.ty = Some(ty.clone());
                ty
            }

            Expr::Call(call) => {
                let mut arg_types = Vec::with_capacity(call.args.len());
                for arg in &mut call.args {
                    arg_types.push(self.resolve_expr(arg));
                }
                let ty = match self.table.find_symbol(&call.name) {
                    Some(sym) if sym.kind == SymbolKind::Function => {
                        let params: Vec<TypeInfo> =
                            sym.params.iter().map(|p| p.ty.clone()).collect();
                        let variadic = sym.variadic;
                        let ret = sym.ty.clone();
                        let ok_arity = if variadic {
                            call.args.len() >= params.len()
                        } else {
                            call.args.len() == params.len()
                        };
                        if !ok_arity {
                            self.error(SemaError::ArityMismatch {
                                name: call.name.clone(),
                                got: call.args.len(),
                                expected: params.len(),
                            });
                        }
                        for (arg_ty, param) in arg_types.iter().zip(&params) {
                            self.require_convertible(arg_ty, param);
                        }
                        ret
                    }
                    Some(_) => {
                        self.error(SemaError::Invalid(format!(
                            "`{}` is not a function",
                            call.name
                        )));
                        TypeInfo::int()
                    }
                    None => {
                        self.error(SemaError::Undeclared(call.name.clone()));
                        TypeInfo::int()
                    }
                };
                call.ty = Some(ty.clone());
                ty
            }

            Expr::Binary(binary) => {
                let lhs = self.resolve_expr(&mut binary.lhs);
                let rhs = self.resolve_expr(&mut binary.rhs);
                let ty = if binary.op.is_comparison() {
                    TypeInfo::bool_()
                } else if binary.op.is_logical() {
                    TypeInfo::int()
                } else {
                    match binary.op {
                        BinaryOp::Add if lhs.is_pointerish() => lhs.decayed(),
                        BinaryOp::Add if rhs.is_pointerish() => rhs.decayed(),
                        BinaryOp::Sub if lhs.is_pointerish() && rhs.is_pointerish() => {
                            TypeInfo::int()
                        }
                        BinaryOp::Sub if lhs.is_pointerish() => lhs.decayed(),
                        _ => ty::usual_arithmetic(&lhs.promoted(), &rhs.promoted()),
                    }
                };
                binary.ty = Some(ty.clone());
                ty
            }

            Expr::Unary(unary) => {
                let operand_ty = self.resolve_expr(&mut unary.operand);
                if unary.op.is_increment() && !is_lvalue_shape(&unary.operand) {
                    self.error(SemaError::BadLvalue);
                }
                let ty = match unary.op {
                    UnaryOp::Negate => TypeInfo::bool_(),
                    _ => operand_ty,
                };
                unary.ty = Some(ty.clone());
                ty
            }

            Expr::Assign(assign) => {
                let value_ty = self.resolve_expr(&mut assign.value);
                let target_ty = match &mut assign.target {
                    AssignTarget::Name(name) => match self.table.find_symbol(name) {
                        Some(sym) => sym.ty.clone(),
                        None => {
                            self.error(SemaError::Undeclared(name.clone()));
                            TypeInfo::int()
                        }
                    },
                    AssignTarget::Lvalue(lvalue) => {
                        if !is_lvalue_shape(lvalue) {
                            self.error(SemaError::BadLvalue);
                        }
                        self.resolve_expr(lvalue)
                    }
                };
                if assign.op.is_none() {
                    self.require_convertible(&value_ty, &target_ty);
                }
                target_ty
            }

            Expr::Conditional(cond) => {
                self.resolve_expr(&mut cond.condition);
                let then_ty = self.resolve_expr(&mut cond.then_expr);
                let else_ty = self.resolve_expr(&mut cond.else_expr);
                let ty = if then_ty.is_floating() || else_ty.is_floating() {
                    TypeInfo::named("double")
                } else if then_ty.is_pointerish() && else_ty.is_pointerish() {
                    then_ty.decayed()
                } else if ty::compatible(&then_ty, &else_ty) {
                    then_ty
                } else {
                    TypeInfo::int()
                };
                cond.ty = Some(ty.clone());
                ty
            }

            Expr::Cast(cast) => {
                self.resolve_expr(&mut cast.expression);
                cast.target.clone()
            }

            Expr::Sizeof(sizeof) => {
                if let SizeofArg::Expr(inner) = &mut sizeof.arg {
                    self.resolve_expr(inner);
                }
                sizeof.size = Some(self.table.sizeof_value(&sizeof.arg));
                TypeInfo::named("size_t")
            }

            Expr::AddressOf(addr) => {
                let operand_ty = self.resolve_expr(&mut addr.operand);
                if !is_lvalue_shape(&addr.operand) {
                    self.error(SemaError::BadLvalue);
                }
                let ty = operand_ty.referenced();
                addr.ty = Some(ty.clone());
                ty
            }

            Expr::Dereference(deref) => {
                let operand_ty = self.resolve_expr(&mut deref.operand);
                if !operand_ty.is_pointerish() {
                    self.error(SemaError::TypeMismatch {
                        from: operand_ty.to_string(),
                        to: format!("{}*", operand_ty),
                    });
                }
                let ty = operand_ty.dereferenced();
                deref.ty = Some(ty.clone());
                ty
            }

            Expr::Index(index) => {
                let base_ty = self.resolve_expr(&mut index.base);
                let index_ty = self.resolve_expr(&mut index.index);
                if !base_ty.is_pointerish() {
                    self.error(SemaError::TypeMismatch {
                        from: base_ty.to_string(),
                        to: format!("{}*", base_ty),
                    });
                }
                if !index_ty.is_integer() {
                    self.error(SemaError::TypeMismatch {
                        from: index_ty.to_string(),
                        to: "int".to_string(),
                    });
                }
                let ty = base_ty.dereferenced();
                index.ty = Some(ty.clone());
                ty
            }

            Expr::Member(member) => {
                let object_ty = self.resolve_expr(&mut member.object);
                let record_ty = match member.operator {
                    MemberOperator::Direct => {
                        if object_ty.pointer_level > 0 {
                            self.error(SemaError::BadMemberAccess(format!(
                                "`.` applied to pointer `{}`; use `->`",
                                object_ty
                            )));
                        }
                        object_ty
                    }
                    MemberOperator::Indirect => {
                        if !object_ty.is_pointerish() {
                            self.error(SemaError::BadMemberAccess(format!(
                                "`->` applied to non-pointer `{}`",
                                object_ty
                            )));
                        }
                        object_ty.dereferenced()
                    }
                };
                let ty = if !record_ty.is_record() {
                    self.error(SemaError::BadMemberAccess(format!(
                        "member access on non-struct/union `{}`",
                        record_ty
                    )));
                    TypeInfo::int()
                } else {
                    let member_ty = self
                        .table
                        .record_of(&record_ty)
                        .and_then(|record| self.table.find_struct_member(record, &member.member))
                        .map(|m| m.ty.clone());
                    match member_ty {
                        Some(ty) => ty,
                        None => {
                            self.error(SemaError::BadMemberAccess(format!(
                                "`{}` has no member named `{}`",
                                record_ty, member.member
                            )));
                            TypeInfo::int()
                        }
                    }
                };
                member.ty = Some(ty.clone());
                ty
            }

            Expr::InitializerList(values) => {
                let mut first = TypeInfo::int();
                for (i, value) in values.iter_mut().enumerate() {
                    let ty = self.resolve_expr(value);
                    if i == 0 {
                        first = ty;
                    }
                }
                first
            }
        }
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}
