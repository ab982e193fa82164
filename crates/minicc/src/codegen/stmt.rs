//! Statement emission and control-flow labeling.
//!
//! Loop constructs save and restore the current break/continue targets
//! around their bodies, so nested loops always branch to the innermost
//! labels. Arm outcomes are combined when deciding whether an outer
//! construct terminated (an `if` with two terminated arms is itself
//! terminated and suppresses its end label).

use std::io;

use minicc_syntax::ast::{ArrayDecl, Declaration, Expr, Stmt};

use super::llty::llvm_type;
use super::{Emitter, Operand};
use crate::symtab::SymbolKind;

impl<'a> Emitter<'a> {
    pub(crate) fn emit_statement(&mut self, stmt: &Stmt) -> io::Result<()> {
        // Nothing after a terminator is emitted, except a label, which
        // reopens the block.
        if self.is_terminated() && !matches!(stmt, Stmt::Label(_)) {
            return Ok(());
        }

        match stmt {
            Stmt::Compound(stmts) => {
                self.table.enter_scope();
                for s in stmts {
                    self.emit_statement(s)?;
                }
                self.table.exit_scope();
                Ok(())
            }

            Stmt::Declaration(decl) => self.emit_declaration(decl),
            Stmt::Array(decl) => self.emit_array_decl(decl),

            Stmt::Struct(decl) => self.declare_record(decl, false),
            Stmt::Union(decl) => self.declare_record(decl, true),
            Stmt::Enum(decl) => self.declare_enum(decl),
            Stmt::Typedef(decl) => {
                self.table
                    .add_symbol(&decl.name, SymbolKind::Typedef, &decl.ty);
                Ok(())
            }

            Stmt::If(if_stmt) => {
                let then_label = self.new_label("if_then");
                let else_label = self.new_label("if_else");
                let end_label = self.new_label("if_end");

                let cond = self.emit_expr(&if_stmt.condition)?;
                let cond_bool = self.to_bool(&if_stmt.condition, cond)?;
                if if_stmt.else_stmt.is_some() {
                    self.term(&format!(
                        "br i1 {}, label %{}, label %{}",
                        cond_bool, then_label, else_label
                    ))?;
                } else {
                    self.term(&format!(
                        "br i1 {}, label %{}, label %{}",
                        cond_bool, then_label, end_label
                    ))?;
                }

                self.label(&then_label)?;
                self.table.enter_scope();
                self.emit_statement(&if_stmt.then_stmt)?;
                let then_terminates = self.is_terminated();
                self.term(&format!("br label %{}", end_label))?;
                self.table.exit_scope();

                let mut else_terminates = false;
                if let Some(else_stmt) = &if_stmt.else_stmt {
                    self.label(&else_label)?;
                    self.table.enter_scope();
                    self.emit_statement(else_stmt)?;
                    else_terminates = self.is_terminated();
                    self.term(&format!("br label %{}", end_label))?;
                    self.table.exit_scope();
                }

                // The end label exists only if some arm can reach it.
                if !then_terminates || !else_terminates {
                    self.label(&end_label)?;
                } else {
                    self.set_terminated(true);
                }
                Ok(())
            }

            Stmt::While(while_stmt) => {
                let cond_label = self.new_label("while_cond");
                let body_label = self.new_label("while_body");
                let end_label = self.new_label("while_end");

                let saved = self.push_loop_labels(&end_label, &cond_label);

                self.term(&format!("br label %{}", cond_label))?;
                self.label(&cond_label)?;
                let cond = self.emit_expr(&while_stmt.condition)?;
                let cond_bool = self.to_bool(&while_stmt.condition, cond)?;
                self.term(&format!(
                    "br i1 {}, label %{}, label %{}",
                    cond_bool, body_label, end_label
                ))?;

                self.label(&body_label)?;
                self.table.enter_scope();
                self.emit_statement(&while_stmt.body)?;
                self.term(&format!("br label %{}", cond_label))?;
                self.table.exit_scope();

                self.label(&end_label)?;
                self.pop_loop_labels(saved);
                Ok(())
            }

            Stmt::For(for_stmt) => {
                let cond_label = self.new_label("for_cond");
                let body_label = self.new_label("for_body");
                let update_label = self.new_label("for_update");
                let end_label = self.new_label("for_end");

                // continue targets the update clause, not the condition
                let saved = self.push_loop_labels(&end_label, &update_label);

                // init-clause declarations live in a scope enclosing the
                // condition, update and body
                self.table.enter_scope();
                if let Some(init) = &for_stmt.init {
                    self.emit_statement(init)?;
                }

                self.term(&format!("br label %{}", cond_label))?;
                self.label(&cond_label)?;
                match &for_stmt.condition {
                    Some(condition) => {
                        let cond = self.emit_expr(condition)?;
                        let cond_bool = self.to_bool(condition, cond)?;
                        self.term(&format!(
                            "br i1 {}, label %{}, label %{}",
                            cond_bool, body_label, end_label
                        ))?;
                    }
                    None => {
                        self.term(&format!("br label %{}", body_label))?;
                    }
                }

                self.label(&body_label)?;
                self.emit_statement(&for_stmt.body)?;
                self.term(&format!("br label %{}", update_label))?;

                self.label(&update_label)?;
                if let Some(update) = &for_stmt.update {
                    self.emit_expr(update)?;
                }
                self.term(&format!("br label %{}", cond_label))?;

                self.label(&end_label)?;
                self.table.exit_scope();
                self.pop_loop_labels(saved);
                Ok(())
            }

            Stmt::DoWhile(do_stmt) => {
                let body_label = self.new_label("do_body");
                let cond_label = self.new_label("do_cond");
                let end_label = self.new_label("do_end");

                let saved = self.push_loop_labels(&end_label, &cond_label);

                // the body runs once before the condition is tested
                self.term(&format!("br label %{}", body_label))?;
                self.label(&body_label)?;
                self.table.enter_scope();
                self.emit_statement(&do_stmt.body)?;
                self.term(&format!("br label %{}", cond_label))?;
                self.table.exit_scope();

                self.label(&cond_label)?;
                let cond = self.emit_expr(&do_stmt.condition)?;
                let cond_bool = self.to_bool(&do_stmt.condition, cond)?;
                self.term(&format!(
                    "br i1 {}, label %{}, label %{}",
                    cond_bool, body_label, end_label
                ))?;

                self.label(&end_label)?;
                self.pop_loop_labels(saved);
                Ok(())
            }

            Stmt::Switch(switch_stmt) => {
                // Simplified lowering: route unconditionally into the body;
                // `break` jumps to the end label.
                let end_label = self.new_label("switch_end");
                let body_label = self.new_label("switch_default");

                let saved_break = self.break_label_replace(Some(end_label.clone()));
                let saved_switch = self.switch_end_replace(Some(end_label.clone()));

                let _ = self.emit_expr(&switch_stmt.expression)?;
                self.term(&format!("br label %{}", body_label))?;
                self.label(&body_label)?;

                self.table.enter_scope();
                self.emit_statement(&switch_stmt.body)?;
                self.term(&format!("br label %{}", end_label))?;
                self.table.exit_scope();

                self.label(&end_label)?;
                self.break_label_replace(saved_break);
                self.switch_end_replace(saved_switch);
                Ok(())
            }

            // Case and default labels are emitted in declaration order
            // inside the routed switch body.
            Stmt::Case(case_stmt) => self.emit_statement(&case_stmt.statement),
            Stmt::Default(default_stmt) => self.emit_statement(&default_stmt.statement),

            Stmt::Break => {
                let target = match self.break_label_clone() {
                    Some(label) => label,
                    None => {
                        self.diag("break statement outside of loop or switch");
                        return Ok(());
                    }
                };
                self.term(&format!("br label %{}", target))
            }

            Stmt::Continue => {
                let target = match self.continue_label_clone() {
                    Some(label) => label,
                    None => {
                        self.diag("continue statement outside of loop");
                        return Ok(());
                    }
                };
                self.term(&format!("br label %{}", target))
            }

            Stmt::Goto(label) => {
                if self.table.find_label(label).is_none() {
                    // forward reference: bind the label now, undefined
                    if let Some(sym) = self.table.add_label(label) {
                        sym.label_defined = false;
                    }
                }
                self.term(&format!("br label %{}", label))
            }

            Stmt::Label(label_stmt) => {
                match self.table.find_label_mut(&label_stmt.label) {
                    Some(sym) => sym.label_defined = true,
                    None => {
                        self.table.add_label(&label_stmt.label);
                    }
                }
                // close the fallthrough block before opening the label
                self.term(&format!("br label %{}", label_stmt.label))?;
                self.label(&label_stmt.label)?;
                self.emit_statement(&label_stmt.statement)
            }

            Stmt::Return(value) => {
                match value {
                    Some(expr) => {
                        let value = self.emit_expr(expr)?;
                        let value = if expr.is_literal() {
                            value
                        } else {
                            let expr_ty = self.table.expression_type(expr);
                            let ret_ty = self.return_type_clone();
                            self.cast_operand(value, &expr_ty, &ret_ty)?
                        };
                        let ret_ty = self.return_type_clone();
                        let ret_str = llvm_type(&ret_ty);
                        let value = if ret_ty.pointer_level > 0 && value == Operand::Imm(0) {
                            Operand::Null
                        } else {
                            value
                        };
                        self.term(&format!("ret {} {}", ret_str, value))
                    }
                    None => self.term("ret void"),
                }
            }

            Stmt::Expr(expr) => {
                self.emit_expr(expr)?;
                Ok(())
            }

            Stmt::Empty => Ok(()),
        }
    }

    // ----- declarations ---------------------------------------------------

    pub(crate) fn emit_declaration(&mut self, decl: &Declaration) -> io::Result<()> {
        let (llvm_name, ty, is_global) =
            match self
                .table
                .add_symbol(&decl.name, SymbolKind::Variable, &decl.ty)
            {
                Some(sym) => (sym.llvm_name.clone(), sym.ty.clone(), sym.is_global),
                None => {
                    self.diag(format!("failed to add symbol: {}", decl.name));
                    return Ok(());
                }
            };
        let ty_str = llvm_type(&ty);

        if is_global {
            let init = match &decl.init {
                Some(Expr::Number(0)) if ty.pointer_level > 0 => "null".to_string(),
                Some(Expr::Number(n)) => n.to_string(),
                Some(Expr::Character(c)) => i64::from(*c).to_string(),
                Some(Expr::StringLiteral(s)) => {
                    let id = self.intern_string(s);
                    let len = s.len() + 1;
                    format!(
                        "getelementptr inbounds ([{} x i8], [{} x i8]* @.str{}, i32 0, i32 0)",
                        len, len, id
                    )
                }
                Some(other) => match other.const_value() {
                    Some(v) => v.to_string(),
                    None => {
                        self.diag(format!(
                            "global initializer for `{}` is not a constant",
                            decl.name
                        ));
                        "0".to_string()
                    }
                },
                None => {
                    if ty.is_array || ty.is_record() {
                        "zeroinitializer".to_string()
                    } else if ty.pointer_level > 0 {
                        "null".to_string()
                    } else {
                        "0".to_string()
                    }
                }
            };
            self.raw(&format!("@{} = global {} {}", llvm_name, ty_str, init))?;
        } else {
            self.inst(&format!("%{} = alloca {}", llvm_name, ty_str))?;
            if let Some(init) = &decl.init {
                let value = self.emit_expr(init)?;
                let value = if init.is_literal() {
                    value
                } else {
                    let init_ty = self.table.expression_type(init);
                    self.cast_operand(value, &init_ty, &ty)?
                };
                let slot = Operand::Slot(format!("%{}", llvm_name));
                self.store(value, &ty, &slot)?;
            }
        }
        Ok(())
    }

    pub(crate) fn emit_array_decl(&mut self, decl: &ArrayDecl) -> io::Result<()> {
        let (llvm_name, ty, is_global) =
            match self
                .table
                .add_symbol(&decl.name, SymbolKind::Variable, &decl.ty)
            {
                Some(sym) => (sym.llvm_name.clone(), sym.ty.clone(), sym.is_global),
                None => {
                    self.diag(format!("failed to add symbol: {}", decl.name));
                    return Ok(());
                }
            };
        // the element type: the array flag is not part of the LLVM scalar
        let elem = llvm_type(&ty);

        if decl.is_vla {
            let size_expr = match &decl.size {
                Some(expr) => expr,
                None => {
                    self.diag(format!("VLA `{}` without a size expression", decl.name));
                    return Ok(());
                }
            };
            let size = self.emit_expr(size_expr)?;
            let backing = self.next_temp();
            self.inst(&format!("%t{} = alloca {}, i32 {}", backing, elem, size))?;
            // companion pointer slot; later accesses load this pointer
            self.inst(&format!("%{} = alloca {}*", llvm_name, elem))?;
            self.inst(&format!(
                "store {}* %t{}, {}** %{}",
                elem, backing, elem, llvm_name
            ))?;
            return Ok(());
        }

        let len = match decl.size.as_ref().and_then(|e| e.const_value()) {
            Some(n) => n,
            None => {
                self.diag(format!("array `{}` has no constant size", decl.name));
                return Ok(());
            }
        };
        if is_global {
            self.raw(&format!(
                "@{} = global [{} x {}] zeroinitializer",
                llvm_name, len, elem
            ))?;
        } else {
            self.inst(&format!("%{} = alloca [{} x {}]", llvm_name, len, elem))?;
        }
        Ok(())
    }

    // ----- label bookkeeping ----------------------------------------------

    fn push_loop_labels(
        &mut self,
        break_to: &str,
        continue_to: &str,
    ) -> (Option<String>, Option<String>) {
        let saved_break = self.break_label_replace(Some(break_to.to_string()));
        let saved_continue = self.continue_label_replace(Some(continue_to.to_string()));
        (saved_break, saved_continue)
    }

    fn pop_loop_labels(&mut self, saved: (Option<String>, Option<String>)) {
        self.break_label_replace(saved.0);
        self.continue_label_replace(saved.1);
    }
}
