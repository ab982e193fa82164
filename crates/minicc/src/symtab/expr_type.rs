//! Expression type resolution.
//!
//! `expression_type` computes the C type of an expression against the
//! current scope stack. The returned descriptor is always an owned value;
//! it never aliases the symbol it came from, so freeing one side cannot
//! invalidate the other.

use minicc_syntax::ast::{
    AssignTarget, BinaryOp, Expr, MemberOperator, SizeofArg, UnaryOp,
};
use minicc_syntax::ty::{self, TypeInfo, TypeKind};

use super::{SymbolKind, SymbolTable};

impl SymbolTable {
    pub fn expression_type(&self, expr: &Expr) -> TypeInfo {
        match expr {
            Expr::Number(_) => TypeInfo::int(),
            Expr::Character(_) => TypeInfo::char_(),
            Expr::StringLiteral(_) => TypeInfo::char_ptr(),

            Expr::Identifier(id) => {
                if let Some(ty) = &id.ty {
                    return ty.clone();
                }
                match self.find_symbol(&id.name) {
                    Some(sym) => sym.ty.clone(),
                    None => TypeInfo::int(),
                }
            }

            Expr::Binary(binary) => {
                if let Some(ty) = &binary.ty {
                    return ty.clone();
                }
                if binary.op.is_comparison() {
                    return TypeInfo::bool_();
                }
                if binary.op.is_logical() {
                    return TypeInfo::int();
                }
                let lhs = self.expression_type(&binary.lhs);
                let rhs = self.expression_type(&binary.rhs);
                // Pointer arithmetic keeps the (decayed) pointer type;
                // pointer difference is an integer.
                match binary.op {
                    BinaryOp::Add if lhs.is_pointerish() => lhs.decayed(),
                    BinaryOp::Add if rhs.is_pointerish() => rhs.decayed(),
                    BinaryOp::Sub if lhs.is_pointerish() && rhs.is_pointerish() => {
                        TypeInfo::int()
                    }
                    BinaryOp::Sub if lhs.is_pointerish() => lhs.decayed(),
                    _ => ty::usual_arithmetic(&lhs.promoted(), &rhs.promoted()),
                }
            }

            Expr::Unary(unary) => {
                if let Some(ty) = &unary.ty {
                    return ty.clone();
                }
                match unary.op {
                    UnaryOp::Negate => TypeInfo::bool_(),
                    _ => self.expression_type(&unary.operand),
                }
            }

            Expr::AddressOf(addr) => match &addr.ty {
                Some(ty) => ty.clone(),
                None => self.expression_type(&addr.operand).referenced(),
            },

            Expr::Dereference(deref) => match &deref.ty {
                Some(ty) => ty.clone(),
                None => self.expression_type(&deref.operand).dereferenced(),
            },

            Expr::Call(call) => {
                if let Some(ty) = &call.ty {
                    return ty.clone();
                }
                match self.find_symbol(&call.name) {
                    Some(sym) => sym.ty.clone(),
                    None => TypeInfo::int(),
                }
            }

            Expr::Index(index) => match &index.ty {
                Some(ty) => ty.clone(),
                None => self.expression_type(&index.base).dereferenced(),
            },

            Expr::Member(member) => {
                if let Some(ty) = &member.ty {
                    return ty.clone();
                }
                let mut object_ty = self.expression_type(&member.object);
                if member.operator == MemberOperator::Indirect {
                    object_ty = object_ty.dereferenced();
                } else if object_ty.pointer_level > 0 {
                    log::debug!("`.` applied to a pointer; use `->`");
                    return TypeInfo::int();
                }
                self.find_symbol(&object_ty.base)
                    .and_then(|record| self.find_struct_member(record, &member.member))
                    .map(|m| m.ty.clone())
                    .unwrap_or_else(TypeInfo::int)
            }

            Expr::Cast(cast) => cast.target.clone(),

            Expr::Conditional(cond) => {
                if let Some(ty) = &cond.ty {
                    return ty.clone();
                }
                let then_ty = self.expression_type(&cond.then_expr);
                let else_ty = self.expression_type(&cond.else_expr);
                if then_ty.is_floating() || else_ty.is_floating() {
                    return TypeInfo::named("double");
                }
                if then_ty.is_pointerish() && else_ty.is_pointerish() {
                    // Mismatched pointer arms adopt the true branch.
                    return then_ty.decayed();
                }
                if ty::compatible(&then_ty, &else_ty) {
                    return then_ty;
                }
                TypeInfo::int()
            }

            Expr::Sizeof(_) => TypeInfo::named("size_t"),

            Expr::Assign(assign) => match &assign.target {
                AssignTarget::Name(name) => self
                    .find_symbol(name)
                    .map(|sym| sym.ty.clone())
                    .unwrap_or_else(TypeInfo::int),
                AssignTarget::Lvalue(lvalue) => self.expression_type(lvalue),
            },

            Expr::InitializerList(values) => values
                .first()
                .map(|v| self.expression_type(v))
                .unwrap_or_else(TypeInfo::int),
        }
    }

    /// Byte size of a `sizeof` argument.
    pub fn sizeof_value(&self, arg: &SizeofArg) -> u64 {
        match arg {
            SizeofArg::Type(ty) => self.type_size(ty),
            SizeofArg::Expr(expr) => {
                // sizeof does not decay its operand
                let ty = self.expression_type(expr);
                self.type_size(&ty)
            }
        }
    }

    /// Record lookup for member access diagnostics.
    pub fn record_of(&self, ty: &TypeInfo) -> Option<&super::Symbol> {
        if ty.kind != TypeKind::Struct && ty.kind != TypeKind::Union {
            return None;
        }
        self.find_symbol(&ty.base)
            .filter(|s| matches!(s.kind, SymbolKind::Struct | SymbolKind::Union))
    }
}
