//! Expression emission.
//!
//! Every helper returns an [`Operand`]: literals are printed inline at
//! their use sites, everything else lives in `%t<n>` temporaries. On a
//! semantic problem the helpers record a diagnostic and return a zero
//! sentinel without emitting, so emission keeps going when the driver
//! forces it (`-f`).

use std::io;

use minicc_syntax::ast::{
    AssignExpr, AssignTarget, BinaryExpr, BinaryOp, CallExpr, CastExpr, ConditionalExpr, Expr,
    MemberExpr, MemberOperator, UnaryExpr, UnaryOp,
};
use minicc_syntax::ty::TypeInfo;

use super::llty::{int_width, llvm_type};
use super::{Emitter, Operand};
use crate::symtab::SymbolKind;

/// Whether this expression's emitted value is an `i1` (comparisons and
/// logical not produce `icmp` results directly).
fn produces_i1(expr: &Expr) -> bool {
    match expr {
        Expr::Binary(b) => b.op.is_comparison(),
        Expr::Unary(u) => u.op == UnaryOp::Negate,
        _ => false,
    }
}

/// The element type a pointer or decayed array steps over.
fn element_of(ty: &TypeInfo) -> TypeInfo {
    let mut elem = ty.clone();
    if elem.is_array {
        elem.is_array = false;
        elem.is_vla = false;
        elem.array_size = None;
    } else if elem.pointer_level > 0 {
        elem.pointer_level -= 1;
    }
    elem
}

impl<'a> Emitter<'a> {
    pub(crate) fn emit_expr(&mut self, expr: &Expr) -> io::Result<Operand> {
        match expr {
            Expr::Number(value) => Ok(Operand::Imm(*value)),
            Expr::Character(value) => Ok(Operand::Imm(i64::from(*value))),

            Expr::StringLiteral(content) => {
                let id = self.intern_string(content);
                let len = content.len() + 1;
                let temp = self.next_temp();
                self.inst(&format!(
                    "%t{} = getelementptr [{} x i8], [{} x i8]* @.str{}, i32 0, i32 0",
                    temp, len, len, id
                ))?;
                Ok(Operand::Temp(temp))
            }

            Expr::Identifier(id) => self.emit_identifier(&id.name),
            Expr::Binary(binary) => self.emit_binary(binary),
            Expr::Assign(assign) => self.emit_assignment(assign),

            Expr::Unary(unary) => {
                if unary.op.is_increment() {
                    return self.emit_incdec(unary);
                }
                let operand = self.emit_expr(&unary.operand)?;
                let temp = self.next_temp();
                match unary.op {
                    UnaryOp::Minus => {
                        self.inst(&format!("%t{} = sub i32 0, {}", temp, operand))?;
                    }
                    UnaryOp::Negate => {
                        self.inst(&format!("%t{} = icmp eq i32 {}, 0", temp, operand))?;
                    }
                    UnaryOp::Complement => {
                        self.inst(&format!("%t{} = xor i32 {}, -1", temp, operand))?;
                    }
                    _ => unreachable!("increment handled above"),
                }
                Ok(Operand::Temp(temp))
            }

            Expr::Conditional(cond) => self.emit_conditional(cond),
            Expr::Cast(cast) => self.emit_cast(cast),

            Expr::Sizeof(sizeof) => {
                let size = sizeof
                    .size
                    .unwrap_or_else(|| self.table.sizeof_value(&sizeof.arg));
                Ok(Operand::Imm(size as i64))
            }

            Expr::AddressOf(addr) => self.emit_address_of(&addr.operand),

            Expr::Dereference(deref) => {
                let ptr = self.emit_expr(&deref.operand)?;
                let result_ty = match &deref.ty {
                    Some(ty) => ty.clone(),
                    None => self.table.expression_type(&deref.operand).dereferenced(),
                };
                let ty = llvm_type(&result_ty);
                let temp = self.next_temp();
                self.inst(&format!("%t{} = load {}, {}* {}", temp, ty, ty, ptr))?;
                Ok(Operand::Temp(temp))
            }

            Expr::Index(_) | Expr::Member(_) => {
                let (addr, ty) = match self.lvalue_address(expr)? {
                    Some(pair) => pair,
                    None => {
                        self.diag("invalid operand of load");
                        return Ok(Operand::Imm(0));
                    }
                };
                let ty_str = llvm_type(&ty);
                let temp = self.next_temp();
                self.inst(&format!("%t{} = load {}, {}* {}", temp, ty_str, ty_str, addr))?;
                Ok(Operand::Temp(temp))
            }

            Expr::Call(call) => self.emit_call(call),

            Expr::InitializerList(_) => {
                self.diag("initializer list outside of a declaration");
                Ok(Operand::Imm(0))
            }
        }
    }

    // ----- scalar loads ---------------------------------------------------

    fn emit_identifier(&mut self, name: &str) -> io::Result<Operand> {
        let sym = match self.table.find_symbol(name) {
            Some(sym) => sym.clone(),
            None => {
                self.diag(format!("undefined variable: {}", name));
                return Ok(Operand::Imm(0));
            }
        };

        if sym.kind == SymbolKind::EnumConstant {
            // compile-time constant, no load
            return Ok(Operand::Imm(sym.enum_value));
        }

        let ty = llvm_type(&sym.ty);
        let prefix = if sym.is_global { "@" } else { "%" };
        let temp = self.next_temp();

        if sym.ty.is_array {
            if sym.is_parameter {
                self.inst(&format!(
                    "%t{} = load {}, {}* %{}.addr",
                    temp, ty, ty, sym.llvm_name
                ))?;
            } else if sym.ty.is_vla {
                // VLAs store their base pointer in a companion slot.
                self.inst(&format!(
                    "%t{} = load {}*, {}** %{}",
                    temp, ty, ty, sym.llvm_name
                ))?;
            } else {
                // Fixed array decays to a pointer to its first element.
                let len = self.array_length(&sym.ty, sym.size);
                self.inst(&format!(
                    "%t{} = getelementptr [{} x {}], [{} x {}]* {}{}, i32 0, i32 0",
                    temp, len, ty, len, ty, prefix, sym.llvm_name
                ))?;
            }
        } else if sym.is_parameter {
            self.inst(&format!(
                "%t{} = load {}, {}* %{}.addr",
                temp, ty, ty, sym.llvm_name
            ))?;
        } else {
            self.inst(&format!(
                "%t{} = load {}, {}* {}{}",
                temp, ty, ty, prefix, sym.llvm_name
            ))?;
        }
        Ok(Operand::Temp(temp))
    }

    pub(crate) fn array_length(&self, ty: &TypeInfo, stored_size: u64) -> u64 {
        if let Some(n) = ty.array_size.as_ref().and_then(|e| e.const_value()) {
            return n.max(0) as u64;
        }
        let elem = self.table.element_size(ty).max(1);
        stored_size / elem
    }

    // ----- conversions ----------------------------------------------------

    /// Convert an already-emitted value to `i1` for branching. Values that
    /// are comparisons already are returned unchanged; pointers compare
    /// against `null`, integers against 0.
    pub(crate) fn to_bool(&mut self, expr: &Expr, value: Operand) -> io::Result<Operand> {
        if produces_i1(expr) {
            return Ok(value);
        }
        let ty = self.table.expression_type(expr);
        let temp = self.next_temp();
        if ty.is_pointerish() {
            let ptr = llvm_type(&ty.decayed());
            self.inst(&format!("%t{} = icmp ne {} {}, null", temp, ptr, value))?;
        } else {
            self.inst(&format!("%t{} = icmp ne i32 {}, 0", temp, value))?;
        }
        Ok(Operand::Temp(temp))
    }

    /// Bridge between two types: sext/zext/trunc between integer widths,
    /// ptrtoint/inttoptr across the pointer boundary, bitcast otherwise.
    /// Literals pass through; their type is just relabeled at the use
    /// site.
    pub(crate) fn cast_operand(
        &mut self,
        value: Operand,
        src: &TypeInfo,
        dest: &TypeInfo,
    ) -> io::Result<Operand> {
        if value.is_literal() || value == Operand::Null {
            return Ok(value);
        }
        let src_str = llvm_type(&src.decayed());
        let dest_str = llvm_type(dest);
        if src_str == dest_str {
            return Ok(value);
        }
        let temp = self.next_temp();
        match (int_width(&src_str), int_width(&dest_str)) {
            (Some(sw), Some(dw)) if sw > dw => {
                self.inst(&format!(
                    "%t{} = trunc {} {} to {}",
                    temp, src_str, value, dest_str
                ))?;
            }
            (Some(_), Some(_)) => {
                let op = if src.is_unsigned() { "zext" } else { "sext" };
                self.inst(&format!(
                    "%t{} = {} {} {} to {}",
                    temp, op, src_str, value, dest_str
                ))?;
            }
            (None, Some(_)) if src.is_pointerish() => {
                self.inst(&format!(
                    "%t{} = ptrtoint {} {} to {}",
                    temp, src_str, value, dest_str
                ))?;
            }
            (Some(_), None) if dest.pointer_level > 0 => {
                self.inst(&format!(
                    "%t{} = inttoptr {} {} to {}",
                    temp, src_str, value, dest_str
                ))?;
            }
            _ => {
                self.inst(&format!(
                    "%t{} = bitcast {} {} to {}",
                    temp, src_str, value, dest_str
                ))?;
            }
        }
        Ok(Operand::Temp(temp))
    }

    // ----- binary operators -----------------------------------------------

    fn emit_binary(&mut self, binary: &BinaryExpr) -> io::Result<Operand> {
        if binary.op.is_logical() {
            return self.emit_logical(binary);
        }

        let left = self.emit_expr(&binary.lhs)?;
        let right = self.emit_expr(&binary.rhs)?;
        let lhs_ty = self.table.expression_type(&binary.lhs);
        let rhs_ty = self.table.expression_type(&binary.rhs);

        // Pointer arithmetic lowers to getelementptr.
        if binary.op == BinaryOp::Add && (lhs_ty.is_pointerish() || rhs_ty.is_pointerish()) {
            let (ptr, idx, ptr_ty) = if lhs_ty.is_pointerish() {
                (left, right, &lhs_ty)
            } else {
                (right, left, &rhs_ty)
            };
            let elem = llvm_type(&element_of(ptr_ty));
            let temp = self.next_temp();
            self.inst(&format!(
                "%t{} = getelementptr {}, {}* {}, i32 {}",
                temp, elem, elem, ptr, idx
            ))?;
            return Ok(Operand::Temp(temp));
        }

        if binary.op == BinaryOp::Sub && lhs_ty.is_pointerish() && !rhs_ty.is_pointerish() {
            let neg = self.next_temp();
            self.inst(&format!("%t{} = sub i32 0, {}", neg, right))?;
            let elem = llvm_type(&element_of(&lhs_ty));
            let temp = self.next_temp();
            self.inst(&format!(
                "%t{} = getelementptr {}, {}* {}, i32 %t{}",
                temp, elem, elem, left, neg
            ))?;
            return Ok(Operand::Temp(temp));
        }

        if binary.op == BinaryOp::Sub && lhs_ty.is_pointerish() && rhs_ty.is_pointerish() {
            // (l - r) / sizeof(elem), computed at i64 and truncated.
            let ptr = llvm_type(&lhs_ty.decayed());
            let l_int = self.next_temp();
            self.inst(&format!("%t{} = ptrtoint {} {} to i64", l_int, ptr, left))?;
            let r_int = self.next_temp();
            self.inst(&format!("%t{} = ptrtoint {} {} to i64", r_int, ptr, right))?;
            let diff = self.next_temp();
            self.inst(&format!("%t{} = sub i64 %t{}, %t{}", diff, l_int, r_int))?;
            let elem_size = self.table.element_size(&element_of(&lhs_ty)).max(1);
            let quot = self.next_temp();
            self.inst(&format!("%t{} = sdiv i64 %t{}, {}", quot, diff, elem_size))?;
            let temp = self.next_temp();
            self.inst(&format!("%t{} = trunc i64 %t{} to i32", temp, quot))?;
            return Ok(Operand::Temp(temp));
        }

        // Arithmetic and comparisons happen at i32.
        let int = TypeInfo::int();
        let left = self.promote_operand(&binary.lhs, left, &lhs_ty, &int)?;
        let right = self.promote_operand(&binary.rhs, right, &rhs_ty, &int)?;

        let temp = self.next_temp();
        if binary.op.is_comparison() {
            let pred = match binary.op {
                BinaryOp::Eq => "eq",
                BinaryOp::Ne => "ne",
                BinaryOp::Lt => "slt",
                BinaryOp::Le => "sle",
                BinaryOp::Gt => "sgt",
                _ => "sge",
            };
            self.inst(&format!("%t{} = icmp {} i32 {}, {}", temp, pred, left, right))?;
            return Ok(Operand::Temp(temp));
        }

        let op = match binary.op {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "sdiv",
            BinaryOp::Mod => "srem",
            BinaryOp::BitAnd => "and",
            BinaryOp::BitOr => "or",
            BinaryOp::BitXor => "xor",
            BinaryOp::Shl => "shl",
            BinaryOp::Shr => "ashr",
            other => {
                self.diag(format!("unexpected binary operator {:?}", other));
                return Ok(Operand::Imm(0));
            }
        };
        self.inst(&format!("%t{} = {} i32 {}, {}", temp, op, left, right))?;
        Ok(Operand::Temp(temp))
    }

    /// Bring one operand of an integer operation to `i32`: comparisons are
    /// zero-extended from `i1`, narrow and wide integers are converted,
    /// literals are used as-is.
    fn promote_operand(
        &mut self,
        expr: &Expr,
        value: Operand,
        ty: &TypeInfo,
        int: &TypeInfo,
    ) -> io::Result<Operand> {
        if produces_i1(expr) {
            let temp = self.next_temp();
            self.inst(&format!("%t{} = zext i1 {} to i32", temp, value))?;
            return Ok(Operand::Temp(temp));
        }
        if expr.is_literal() {
            return Ok(value);
        }
        self.cast_operand(value, ty, int)
    }

    /// Short-circuit `&&` / `||` through a one-bit result slot.
    fn emit_logical(&mut self, binary: &BinaryExpr) -> io::Result<Operand> {
        let left_label = self.new_label("logical_left");
        let right_label = self.new_label("logical_right");
        let end_label = self.new_label("logical_end");
        let result = self.next_temp();
        self.inst(&format!("%t{}.addr = alloca i1", result))?;

        let left_val = self.emit_expr(&binary.lhs)?;
        let left_bool = self.to_bool(&binary.lhs, left_val)?;

        if binary.op == BinaryOp::LogicalAnd {
            // false path stores false and skips the right operand
            self.term(&format!(
                "br i1 {}, label %{}, label %{}",
                left_bool, right_label, left_label
            ))?;
            self.label(&left_label)?;
            self.inst(&format!("store i1 false, i1* %t{}.addr", result))?;
        } else {
            // true path stores true and skips the right operand
            self.term(&format!(
                "br i1 {}, label %{}, label %{}",
                left_bool, left_label, right_label
            ))?;
            self.label(&left_label)?;
            self.inst(&format!("store i1 true, i1* %t{}.addr", result))?;
        }
        self.term(&format!("br label %{}", end_label))?;

        self.label(&right_label)?;
        let right_val = self.emit_expr(&binary.rhs)?;
        let right_bool = self.to_bool(&binary.rhs, right_val)?;
        self.inst(&format!("store i1 {}, i1* %t{}.addr", right_bool, result))?;
        self.term(&format!("br label %{}", end_label))?;

        self.label(&end_label)?;
        let loaded = self.next_temp();
        self.inst(&format!("%t{} = load i1, i1* %t{}.addr", loaded, result))?;
        let widened = self.next_temp();
        self.inst(&format!("%t{} = zext i1 %t{} to i32", widened, loaded))?;
        Ok(Operand::Temp(widened))
    }

    // ----- lvalues and assignment ----------------------------------------

    /// Compute the address an lvalue expression designates, without
    /// loading from it. Returns the address operand and the pointee type.
    pub(crate) fn lvalue_address(
        &mut self,
        expr: &Expr,
    ) -> io::Result<Option<(Operand, TypeInfo)>> {
        match expr {
            Expr::Identifier(id) => Ok(self.name_address(&id.name)),
            Expr::Dereference(deref) => {
                let ptr = self.emit_expr(&deref.operand)?;
                let ty = match &deref.ty {
                    Some(ty) => ty.clone(),
                    None => self.table.expression_type(&deref.operand).dereferenced(),
                };
                Ok(Some((ptr, ty)))
            }
            Expr::Index(index) => self.index_address(&index.base, &index.index, index.ty.as_ref()),
            Expr::Member(member) => self.member_address(member),
            _ => Ok(None),
        }
    }

    /// Address of a named scalar or pointer variable.
    fn name_address(&mut self, name: &str) -> Option<(Operand, TypeInfo)> {
        let sym = match self.table.find_symbol(name) {
            Some(sym) => sym.clone(),
            None => {
                self.diag(format!("undefined variable in assignment: {}", name));
                return None;
            }
        };
        let slot = if sym.is_parameter {
            format!("%{}.addr", sym.llvm_name)
        } else if sym.is_global {
            format!("@{}", sym.llvm_name)
        } else {
            format!("%{}", sym.llvm_name)
        };
        Some((Operand::Slot(slot), sym.ty))
    }

    /// Address of `base[index]`.
    fn index_address(
        &mut self,
        base: &Expr,
        index: &Expr,
        cached_elem: Option<&TypeInfo>,
    ) -> io::Result<Option<(Operand, TypeInfo)>> {
        let idx = self.emit_expr(index)?;

        if let Expr::Identifier(id) = base {
            let sym = match self.table.find_symbol(&id.name) {
                Some(sym) => sym.clone(),
                None => {
                    self.diag(format!("undefined array: {}", id.name));
                    return Ok(None);
                }
            };
            if !sym.ty.is_array && sym.ty.pointer_level == 0 {
                self.diag(format!(
                    "array access on non-array/pointer variable: {}",
                    id.name
                ));
                return Ok(None);
            }
            let elem_ty = match cached_elem {
                Some(ty) => ty.clone(),
                None => element_of(&sym.ty),
            };
            let elem = llvm_type(&elem_ty);
            let prefix = if sym.is_global { "@" } else { "%" };

            let addr = if sym.is_parameter {
                // parameters hold the decayed pointer in their .addr slot
                let ptr_ty = llvm_type(&sym.ty);
                let ptr = self.next_temp();
                self.inst(&format!(
                    "%t{} = load {}, {}* %{}.addr",
                    ptr, ptr_ty, ptr_ty, sym.llvm_name
                ))?;
                let addr = self.next_temp();
                self.inst(&format!(
                    "%t{} = getelementptr {}, {}* %t{}, i32 {}",
                    addr, elem, elem, ptr, idx
                ))?;
                addr
            } else if sym.ty.is_vla {
                let ptr = self.next_temp();
                self.inst(&format!(
                    "%t{} = load {}*, {}** %{}",
                    ptr, elem, elem, sym.llvm_name
                ))?;
                let addr = self.next_temp();
                self.inst(&format!(
                    "%t{} = getelementptr {}, {}* %t{}, i32 {}",
                    addr, elem, elem, ptr, idx
                ))?;
                addr
            } else if sym.ty.is_array {
                let len = self.array_length(&sym.ty, sym.size);
                let addr = self.next_temp();
                self.inst(&format!(
                    "%t{} = getelementptr [{} x {}], [{} x {}]* {}{}, i32 0, i32 {}",
                    addr, len, elem, len, elem, prefix, sym.llvm_name, idx
                ))?;
                addr
            } else {
                // plain pointer variable
                let ptr_ty = llvm_type(&sym.ty);
                let ptr = self.next_temp();
                self.inst(&format!(
                    "%t{} = load {}, {}* {}{}",
                    ptr, ptr_ty, ptr_ty, prefix, sym.llvm_name
                ))?;
                let addr = self.next_temp();
                self.inst(&format!(
                    "%t{} = getelementptr {}, {}* %t{}, i32 {}",
                    addr, elem, elem, ptr, idx
                ))?;
                addr
            };
            return Ok(Some((Operand::Temp(addr), elem_ty)));
        }

        // General case: the base expression evaluates to a pointer.
        let base_val = self.emit_expr(base)?;
        let base_ty = self.table.expression_type(base);
        let elem_ty = match cached_elem {
            Some(ty) => ty.clone(),
            None => element_of(&base_ty),
        };
        let elem = llvm_type(&elem_ty);
        let addr = self.next_temp();
        self.inst(&format!(
            "%t{} = getelementptr {}, {}* {}, i32 {}",
            addr, elem, elem, base_val, idx
        ))?;
        Ok(Some((Operand::Temp(addr), elem_ty)))
    }

    /// Address of `object.member` / `object->member`.
    fn member_address(&mut self, member: &MemberExpr) -> io::Result<Option<(Operand, TypeInfo)>> {
        let (base, record_ty) = match member.operator {
            MemberOperator::Direct => {
                let object_ty = self.table.expression_type(&member.object);
                if object_ty.pointer_level > 0 || !object_ty.is_record() {
                    self.diag("member access on non-struct/union");
                    return Ok(None);
                }
                match &member.object {
                    Expr::Identifier(id) => match self.name_address(&id.name) {
                        Some((addr, _)) => (addr, object_ty),
                        None => return Ok(None),
                    },
                    _ => {
                        self.diag("complex member access not implemented");
                        return Ok(None);
                    }
                }
            }
            MemberOperator::Indirect => {
                let ptr_ty = self.table.expression_type(&member.object);
                if !ptr_ty.is_pointerish() || !ptr_ty.is_record() {
                    self.diag("pointer member access on non-pointer-to-struct/union");
                    return Ok(None);
                }
                let ptr = self.emit_expr(&member.object)?;
                (ptr, ptr_ty.dereferenced())
            }
        };

        let record = match self.table.record_of(&record_ty) {
            Some(sym) => sym.clone(),
            None => {
                self.diag(format!("unknown struct/union type: {}", record_ty.base));
                return Ok(None);
            }
        };
        let found = match self.table.find_struct_member(&record, &member.member) {
            Some(m) => m.clone(),
            None => {
                self.diag(format!("unknown member: {}", member.member));
                return Ok(None);
            }
        };

        let record_str = llvm_type(&record_ty);
        let addr = self.next_temp();
        if record.kind == SymbolKind::Union {
            // A union is stored as its largest member; everything sits at
            // index 0 and other member types reach it through a bitcast.
            self.inst(&format!(
                "%t{} = getelementptr {}, {}* {}, i32 0, i32 0",
                addr, record_str, record_str, base
            ))?;
            let storage = record
                .members
                .iter()
                .max_by_key(|m| m.size)
                .map(|m| llvm_type(&m.ty))
                .unwrap_or_else(|| "i8".to_string());
            let member_str = llvm_type(&found.ty);
            if member_str != storage {
                let cast = self.next_temp();
                self.inst(&format!(
                    "%t{} = bitcast {}* %t{} to {}*",
                    cast, storage, addr, member_str
                ))?;
                return Ok(Some((Operand::Temp(cast), found.ty)));
            }
            return Ok(Some((Operand::Temp(addr), found.ty)));
        }

        self.inst(&format!(
            "%t{} = getelementptr {}, {}* {}, i32 0, i32 {}",
            addr, record_str, record_str, base, found.index
        ))?;
        Ok(Some((Operand::Temp(addr), found.ty)))
    }

    /// Simple and compound assignment. Returns the stored value so the
    /// assignment can be used inside a larger expression.
    pub(crate) fn emit_assignment(&mut self, assign: &AssignExpr) -> io::Result<Operand> {
        match assign.op {
            None => self.emit_simple_assignment(assign),
            Some(op) => self.emit_compound_assignment(assign, op),
        }
    }

    fn target_address(
        &mut self,
        target: &AssignTarget,
    ) -> io::Result<Option<(Operand, TypeInfo)>> {
        match target {
            AssignTarget::Name(name) => Ok(self.name_address(name)),
            AssignTarget::Lvalue(expr) => {
                let addr = self.lvalue_address(expr)?;
                if addr.is_none() {
                    self.diag("assignment target is not an lvalue");
                }
                Ok(addr)
            }
        }
    }

    fn emit_simple_assignment(&mut self, assign: &AssignExpr) -> io::Result<Operand> {
        let value = self.emit_expr(&assign.value)?;
        let (addr, dest_ty) = match self.target_address(&assign.target)? {
            Some(pair) => pair,
            None => return Ok(Operand::Imm(0)),
        };
        let value = if assign.value.is_literal() {
            value
        } else {
            let rhs_ty = self.table.expression_type(&assign.value);
            self.cast_operand(value, &rhs_ty, &dest_ty)?
        };
        self.store(value.clone(), &dest_ty, &addr)?;
        Ok(value)
    }

    /// `lhs op= rhs`: one address computation, load, operate, store back.
    fn emit_compound_assignment(
        &mut self,
        assign: &AssignExpr,
        op: BinaryOp,
    ) -> io::Result<Operand> {
        let (addr, dest_ty) = match self.target_address(&assign.target)? {
            Some(pair) => pair,
            None => return Ok(Operand::Imm(0)),
        };
        let dest_str = llvm_type(&dest_ty);
        let old = self.next_temp();
        self.inst(&format!(
            "%t{} = load {}, {}* {}",
            old, dest_str, dest_str, addr
        ))?;

        let rhs = self.emit_expr(&assign.value)?;
        let rhs_ty = self.table.expression_type(&assign.value);

        // Pointer += / -= steps by elements.
        if dest_ty.pointer_level > 0 && matches!(op, BinaryOp::Add | BinaryOp::Sub) {
            let idx = if op == BinaryOp::Sub {
                let neg = self.next_temp();
                self.inst(&format!("%t{} = sub i32 0, {}", neg, rhs))?;
                Operand::Temp(neg)
            } else {
                rhs
            };
            let elem = llvm_type(&element_of(&dest_ty));
            let stepped = self.next_temp();
            self.inst(&format!(
                "%t{} = getelementptr {}, {}* %t{}, i32 {}",
                stepped, elem, elem, old, idx
            ))?;
            self.store(Operand::Temp(stepped), &dest_ty, &addr)?;
            return Ok(Operand::Temp(stepped));
        }

        let int = TypeInfo::int();
        let old_i32 = self.cast_operand(Operand::Temp(old), &dest_ty, &int)?;
        let rhs_i32 = self.promote_operand(&assign.value, rhs, &rhs_ty, &int)?;

        let op_str = match op {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "sdiv",
            BinaryOp::Mod => "srem",
            BinaryOp::BitAnd => "and",
            BinaryOp::BitOr => "or",
            BinaryOp::BitXor => "xor",
            BinaryOp::Shl => "shl",
            BinaryOp::Shr => "ashr",
            other => {
                self.diag(format!("invalid compound assignment operator {:?}", other));
                return Ok(Operand::Imm(0));
            }
        };
        let combined = self.next_temp();
        self.inst(&format!(
            "%t{} = {} i32 {}, {}",
            combined, op_str, old_i32, rhs_i32
        ))?;
        let result = self.cast_operand(Operand::Temp(combined), &int, &dest_ty)?;
        self.store(result.clone(), &dest_ty, &addr)?;
        Ok(result)
    }

    /// Store `value` of type `ty` through `addr`, mapping a literal 0 to
    /// `null` when the destination is a pointer.
    pub(crate) fn store(
        &mut self,
        value: Operand,
        ty: &TypeInfo,
        addr: &Operand,
    ) -> io::Result<()> {
        let ty_str = llvm_type(ty);
        let value = if ty.pointer_level > 0 && value == Operand::Imm(0) {
            Operand::Null
        } else {
            value
        };
        self.inst(&format!("store {} {}, {}* {}", ty_str, value, ty_str, addr))
    }

    // ----- increment / decrement ------------------------------------------

    fn emit_incdec(&mut self, unary: &UnaryExpr) -> io::Result<Operand> {
        let (addr, ty) = match self.lvalue_address(&unary.operand)? {
            Some(pair) => pair,
            None => {
                self.diag("increment/decrement on non-lvalue");
                return Ok(Operand::Imm(0));
            }
        };
        let ty_str = llvm_type(&ty);
        let old = self.next_temp();
        self.inst(&format!("%t{} = load {}, {}* {}", old, ty_str, ty_str, addr))?;

        let increment = matches!(unary.op, UnaryOp::PreIncrement | UnaryOp::PostIncrement);
        let new = self.next_temp();
        if ty.pointer_level > 0 {
            let elem = llvm_type(&element_of(&ty));
            let offset = if increment { 1 } else { -1 };
            self.inst(&format!(
                "%t{} = getelementptr {}, {}* %t{}, i32 {}",
                new, elem, elem, old, offset
            ))?;
        } else {
            let op = if increment { "add" } else { "sub" };
            self.inst(&format!("%t{} = {} {} %t{}, 1", new, op, ty_str, old))?;
        }
        self.inst(&format!(
            "store {} %t{}, {}* {}",
            ty_str, new, ty_str, addr
        ))?;

        match unary.op {
            UnaryOp::PreIncrement | UnaryOp::PreDecrement => Ok(Operand::Temp(new)),
            _ => Ok(Operand::Temp(old)),
        }
    }

    // ----- conditional ----------------------------------------------------

    fn emit_conditional(&mut self, cond: &ConditionalExpr) -> io::Result<Operand> {
        let true_label = self.new_label("cond_true");
        let false_label = self.new_label("cond_false");
        let end_label = self.new_label("cond_end");

        let then_ty = self.table.expression_type(&cond.then_expr);
        let else_ty = self.table.expression_type(&cond.else_expr);
        let mut result_ty = match &cond.ty {
            Some(ty) => ty.clone(),
            None => {
                if then_ty.is_floating() || else_ty.is_floating() {
                    TypeInfo::named("double")
                } else {
                    TypeInfo::int()
                }
            }
        };
        // If both arms are pointers but the recorded type is not, adopt
        // the true branch's pointer type.
        if !result_ty.is_pointerish() && then_ty.is_pointerish() && else_ty.is_pointerish() {
            result_ty = then_ty.decayed();
        }
        let result_str = llvm_type(&result_ty);

        let result = self.next_temp();
        self.inst(&format!("%t{}.addr = alloca {}", result, result_str))?;

        let cond_val = self.emit_expr(&cond.condition)?;
        let cond_bool = self.to_bool(&cond.condition, cond_val)?;
        self.term(&format!(
            "br i1 {}, label %{}, label %{}",
            cond_bool, true_label, false_label
        ))?;

        self.label(&true_label)?;
        let true_val = self.emit_expr(&cond.then_expr)?;
        let true_val = if cond.then_expr.is_literal() {
            true_val
        } else {
            self.cast_operand(true_val, &then_ty, &result_ty)?
        };
        let slot = Operand::Slot(format!("%t{}.addr", result));
        self.store(true_val, &result_ty, &slot)?;
        self.term(&format!("br label %{}", end_label))?;

        self.label(&false_label)?;
        let false_val = self.emit_expr(&cond.else_expr)?;
        let false_val = if cond.else_expr.is_literal() {
            false_val
        } else {
            self.cast_operand(false_val, &else_ty, &result_ty)?
        };
        self.store(false_val, &result_ty, &slot)?;
        self.term(&format!("br label %{}", end_label))?;

        self.label(&end_label)?;
        let final_temp = self.next_temp();
        self.inst(&format!(
            "%t{} = load {}, {}* %t{}.addr",
            final_temp, result_str, result_str, result
        ))?;
        Ok(Operand::Temp(final_temp))
    }

    // ----- cast -----------------------------------------------------------

    fn emit_cast(&mut self, cast: &CastExpr) -> io::Result<Operand> {
        let operand = self.emit_expr(&cast.expression)?;
        if operand.is_literal() {
            return Ok(operand);
        }
        let src_ty = self.table.expression_type(&cast.expression);
        self.cast_operand(operand, &src_ty, &cast.target)
    }

    // ----- address-of -----------------------------------------------------

    fn emit_address_of(&mut self, operand: &Expr) -> io::Result<Operand> {
        match operand {
            Expr::Identifier(id) => {
                let (slot, ty) = match self.name_address(&id.name) {
                    Some(pair) => pair,
                    None => return Ok(Operand::Imm(0)),
                };
                let ty_str = llvm_type(&ty);
                let temp = self.next_temp();
                self.inst(&format!(
                    "%t{} = getelementptr {}, {}* {}, i32 0",
                    temp, ty_str, ty_str, slot
                ))?;
                Ok(Operand::Temp(temp))
            }
            // &*p simplifies to p
            Expr::Dereference(deref) => self.emit_expr(&deref.operand),
            Expr::Index(index) => {
                match self.index_address(&index.base, &index.index, index.ty.as_ref())? {
                    Some((addr, _)) => Ok(addr),
                    None => Ok(Operand::Imm(0)),
                }
            }
            Expr::Member(member) => match self.member_address(member)? {
                Some((addr, _)) => Ok(addr),
                None => Ok(Operand::Imm(0)),
            },
            _ => {
                self.diag("address-of on a non-lvalue expression");
                Ok(Operand::Imm(0))
            }
        }
    }

    // ----- calls ----------------------------------------------------------

    fn emit_call(&mut self, call: &CallExpr) -> io::Result<Operand> {
        let func = self.table.find_symbol(&call.name).cloned();

        let mut args: Vec<(Operand, String, bool)> = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            let value = self.emit_expr(arg)?;
            // arrays decay in argument position
            let ty = self.table.expression_type(arg).decayed();
            args.push((value, llvm_type(&ty), arg.is_literal()));
        }

        // Widen arguments narrower than the declared parameter; a literal 0
        // against a pointer parameter becomes null.
        if let Some(func) = &func {
            for (i, param) in func.params.iter().enumerate() {
                if i >= args.len() {
                    break;
                }
                let expected = llvm_type(&param.ty);
                let (value, got, is_literal) = &mut args[i];
                if param.ty.pointer_level > 0 && *value == Operand::Imm(0) {
                    *value = Operand::Null;
                    *got = expected;
                    continue;
                }
                if let (Some(gw), Some(ew)) = (int_width(got), int_width(&expected)) {
                    if gw < ew {
                        if *is_literal {
                            *got = expected;
                        } else {
                            let arg_ty = self.table.expression_type(&call.args[i]);
                            let op = if arg_ty.is_unsigned() { "zext" } else { "sext" };
                            let widened = self.next_temp();
                            self.inst(&format!(
                                "%t{} = {} {} {} to {}",
                                widened, op, got, value, expected
                            ))?;
                            *value = Operand::Temp(widened);
                            *got = expected;
                        }
                    }
                }
            }
        }

        let return_type = match &call.ty {
            Some(ty) => ty.clone(),
            None => func
                .as_ref()
                .map(|f| f.ty.clone())
                .unwrap_or_else(TypeInfo::int),
        };
        let ret = llvm_type(&return_type);
        let arg_text = args
            .iter()
            .map(|(value, ty, _)| format!("{} {}", ty, value))
            .collect::<Vec<_>>()
            .join(", ");

        if return_type.is_void() {
            self.inst(&format!("call void @{}({})", call.name, arg_text))?;
            Ok(Operand::Imm(0))
        } else {
            let temp = self.next_temp();
            self.inst(&format!(
                "%t{} = call {} @{}({})",
                temp, ret, call.name, arg_text
            ))?;
            Ok(Operand::Temp(temp))
        }
    }
}
