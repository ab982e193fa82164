//! LLVM IR emission.
//!
//! The emitter walks the AST and streams textual IR: nothing emitted is
//! retained. All counters (SSA temporaries, labels, string ids) live on
//! the [`Emitter`]; there is no global state, so independent compilations
//! just use independent emitters.
//!
//! Basic-block discipline is tracked by a single `terminated` flag: it is
//! set by every block terminator (`ret`, `br`) and cleared by printing a
//! label. While set, instruction emission is suppressed, which is what
//! makes code after `return`/`break`/`continue`/`goto` disappear from the
//! output.

pub mod expr;
pub mod llty;
pub mod stmt;
pub mod strings;

#[cfg(test)]
mod tests;

use std::fmt;
use std::io::{self, Write};

use minicc_syntax::ast::{EnumDecl, ExternalDecl, FunctionDef, Program, RecordDecl};
use minicc_syntax::ty::TypeInfo;

use crate::symtab::{SymbolKind, SymbolTable};
use llty::llvm_type;
use strings::StringPool;

/// A value operand: a literal printed inline, a previously emitted
/// temporary, the pointer literal `null`, or a named slot (`%x`, `@g`).
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Imm(i64),
    Temp(usize),
    Null,
    Slot(String),
}

impl Operand {
    pub fn is_literal(&self) -> bool {
        matches!(self, Operand::Imm(_))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Imm(v) => write!(f, "{}", v),
            Operand::Temp(n) => write!(f, "%t{}", n),
            Operand::Null => f.write_str("null"),
            Operand::Slot(s) => f.write_str(s),
        }
    }
}

/// Result of a whole-program emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmitReport {
    /// Count of fail-open diagnostics produced during emission.
    pub diagnostics: usize,
}

pub struct Emitter<'a> {
    out: &'a mut dyn Write,
    pub table: SymbolTable,
    temp_counter: usize,
    label_counter: usize,
    strings: StringPool,
    terminated: bool,
    break_label: Option<String>,
    continue_label: Option<String>,
    switch_end_label: Option<String>,
    current_function: String,
    current_return_type: TypeInfo,
    diagnostics: usize,
}

/// Emit LLVM IR for a whole translation unit.
pub fn generate(program: &Program, out: &mut dyn Write) -> io::Result<EmitReport> {
    let mut emitter = Emitter::new(out);
    emitter.emit_program(program)?;
    Ok(EmitReport {
        diagnostics: emitter.diagnostics,
    })
}

impl<'a> Emitter<'a> {
    pub fn new(out: &'a mut dyn Write) -> Emitter<'a> {
        Emitter {
            out,
            table: SymbolTable::new(),
            temp_counter: 0,
            label_counter: 0,
            strings: StringPool::new(),
            terminated: false,
            break_label: None,
            continue_label: None,
            switch_end_label: None,
            current_function: String::new(),
            current_return_type: TypeInfo::void(),
            diagnostics: 0,
        }
    }

    // ----- low-level output helpers --------------------------------------

    pub(crate) fn next_temp(&mut self) -> usize {
        self.temp_counter += 1;
        self.temp_counter
    }

    pub(crate) fn new_label(&mut self, prefix: &str) -> String {
        self.label_counter += 1;
        format!("{}{}", prefix, self.label_counter)
    }

    /// Emit one instruction line, unless the current block is terminated.
    pub(crate) fn inst(&mut self, line: &str) -> io::Result<()> {
        if !self.terminated {
            writeln!(self.out, "  {}", line)?;
        }
        Ok(())
    }

    /// Emit a block terminator and close the current block.
    pub(crate) fn term(&mut self, line: &str) -> io::Result<()> {
        if !self.terminated {
            writeln!(self.out, "  {}", line)?;
            self.terminated = true;
        }
        Ok(())
    }

    /// Print a label definition, opening a fresh block.
    pub(crate) fn label(&mut self, name: &str) -> io::Result<()> {
        writeln!(self.out, "{}:", name)?;
        self.terminated = false;
        Ok(())
    }

    /// Module-level output (type definitions, globals, function headers).
    pub(crate) fn raw(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "{}", line)
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub(crate) fn set_terminated(&mut self, value: bool) {
        self.terminated = value;
    }

    /// Fail-open diagnostic: record it, emit nothing, let the caller
    /// return a sentinel.
    pub(crate) fn diag(&mut self, message: impl AsRef<str>) {
        log::warn!("{}", message.as_ref());
        self.diagnostics += 1;
    }

    pub(crate) fn intern_string(&mut self, content: &str) -> u32 {
        self.strings.intern(content)
    }

    // ----- control-flow label state --------------------------------------

    pub(crate) fn break_label_replace(&mut self, new: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.break_label, new)
    }

    pub(crate) fn continue_label_replace(&mut self, new: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.continue_label, new)
    }

    pub(crate) fn switch_end_replace(&mut self, new: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.switch_end_label, new)
    }

    pub(crate) fn break_label_clone(&self) -> Option<String> {
        self.break_label.clone()
    }

    pub(crate) fn continue_label_clone(&self) -> Option<String> {
        self.continue_label.clone()
    }

    pub(crate) fn return_type_clone(&self) -> TypeInfo {
        self.current_return_type.clone()
    }

    // ----- program structure ---------------------------------------------

    fn emit_program(&mut self, program: &Program) -> io::Result<()> {
        self.raw("; MiniCC - Generated LLVM IR")?;
        self.raw("")?;

        // First pass: type definitions.
        for decl in &program.decls {
            match decl {
                ExternalDecl::Struct(d) => self.declare_record(d, false)?,
                ExternalDecl::Union(d) => self.declare_record(d, true)?,
                ExternalDecl::Enum(d) => self.declare_enum(d)?,
                _ => {}
            }
        }

        // Second pass: extern prototypes.
        for decl in &program.decls {
            if let ExternalDecl::Function(def) = decl {
                if !def.is_defined() {
                    self.declare_function(def)?;
                }
            }
        }
        self.raw("")?;

        // Third pass: definitions, in source order.
        for decl in &program.decls {
            match decl {
                ExternalDecl::Function(def) if def.is_defined() => {
                    self.emit_function(def)?;
                }
                ExternalDecl::Function(_) => {}
                ExternalDecl::Declaration(d) => self.emit_declaration(d)?,
                ExternalDecl::Array(d) => self.emit_array_decl(d)?,
                ExternalDecl::Typedef(d) => {
                    self.table
                        .add_symbol(&d.name, SymbolKind::Typedef, &d.ty);
                }
                // handled in the first pass
                ExternalDecl::Struct(_) | ExternalDecl::Union(_) | ExternalDecl::Enum(_) => {}
            }
        }

        self.strings.emit_all(&mut *self.out)
    }

    /// Register a struct/union tag, lay out its members and print the
    /// `%struct.N = type { ... }` line.
    pub(crate) fn declare_record(&mut self, decl: &RecordDecl, is_union: bool) -> io::Result<()> {
        let kind = if is_union {
            SymbolKind::Union
        } else {
            SymbolKind::Struct
        };
        let tag_ty = TypeInfo::record(
            &decl.name,
            if is_union {
                minicc_syntax::ty::TypeKind::Union
            } else {
                minicc_syntax::ty::TypeKind::Struct
            },
        );
        let existed = self.table.add_symbol(&decl.name, kind, &tag_ty).is_none();
        if !decl.is_definition {
            if !existed {
                if let Some(sym) = self.table.find_symbol_mut(&decl.name) {
                    sym.ty.is_incomplete = true;
                }
            }
            return Ok(());
        }
        if existed {
            // completing a forward declaration is fine, a second body is not
            let already_defined = self
                .table
                .find_symbol(&decl.name)
                .map(|s| !s.members.is_empty())
                .unwrap_or(false);
            if already_defined {
                self.diag(format!("redefinition of `{}`", decl.name));
                return Ok(());
            }
            if let Some(sym) = self.table.find_symbol_mut(&decl.name) {
                sym.ty.is_incomplete = false;
            }
        }

        for member in &decl.members {
            self.table
                .add_struct_member(&decl.name, &member.name, member.ty.clone());
        }

        let record = match self.table.find_symbol(&decl.name) {
            Some(sym) => sym.clone(),
            None => return Ok(()),
        };

        if is_union {
            // A union is modeled as a struct of its largest member.
            let storage = record
                .members
                .iter()
                .max_by_key(|m| m.size)
                .map(|m| member_type_text(m))
                .unwrap_or_else(|| "i8".to_string());
            self.raw(&format!("%union.{} = type {{ {} }}", decl.name, storage))?;
        } else {
            let fields: Vec<String> = record.members.iter().map(member_type_text).collect();
            self.raw(&format!(
                "%struct.{} = type {{ {} }}",
                decl.name,
                fields.join(", ")
            ))?;
        }
        Ok(())
    }

    /// Register the tag and the constants of an enum. Emits nothing: enums
    /// are just `i32` in the IR.
    pub(crate) fn declare_enum(&mut self, decl: &EnumDecl) -> io::Result<()> {
        let tag_ty = TypeInfo::record(&decl.name, minicc_syntax::ty::TypeKind::Enum);
        self.table.add_symbol(&decl.name, SymbolKind::Enum, &tag_ty);
        if !decl.is_definition {
            return Ok(());
        }
        let mut next_value = 0i64;
        for value in &decl.values {
            let v = match &value.value {
                Some(expr) => match expr.const_value() {
                    Some(v) => v,
                    None => {
                        self.diag(format!(
                            "enum value `{}` is not a constant expression",
                            value.name
                        ));
                        next_value
                    }
                },
                None => next_value,
            };
            self.table.add_enum_constant(&value.name, v);
            next_value = v + 1;
        }
        Ok(())
    }

    fn declare_function(&mut self, def: &FunctionDef) -> io::Result<()> {
        let ret = llvm_type(&def.return_type);
        let mut params: Vec<String> = def.params.iter().map(|p| llvm_type(&p.ty)).collect();
        if def.variadic {
            params.push("...".to_string());
        }
        self.raw(&format!("declare {} @{}({})", ret, def.name, params.join(", ")))?;

        if let Some(sym) =
            self.table
                .add_symbol(&def.name, SymbolKind::Function, &def.return_type)
        {
            sym.is_extern = true;
            sym.is_function_defined = false;
            sym.params = def.params.clone();
            sym.variadic = def.variadic;
        }
        Ok(())
    }

    fn emit_function(&mut self, def: &FunctionDef) -> io::Result<()> {
        self.current_function = def.name.clone();
        self.current_return_type = def.return_type.clone();
        self.terminated = false;
        log::debug!("emitting function {}", self.current_function);

        if let Some(sym) =
            self.table
                .add_symbol(&def.name, SymbolKind::Function, &def.return_type)
        {
            sym.is_function_defined = true;
            sym.params = def.params.clone();
            sym.variadic = def.variadic;
        }
        self.table.set_current_function(&def.name);

        let ret = llvm_type(&def.return_type);
        let mut header = format!("define {} @{}(", ret, def.name);
        for (i, param) in def.params.iter().enumerate() {
            if i > 0 {
                header.push_str(", ");
            }
            header.push_str(&format!("{} %{}", llvm_type(&param.ty), param.name));
        }
        if def.variadic && !def.params.is_empty() {
            header.push_str(", ...");
        }
        header.push_str(") {");
        self.raw(&header)?;

        self.table.enter_scope();

        for param in &def.params {
            let llvm_name = match self
                .table
                .add_symbol(&param.name, SymbolKind::Variable, &param.ty)
            {
                Some(sym) => {
                    sym.is_parameter = true;
                    sym.llvm_name.clone()
                }
                None => {
                    self.diag(format!("duplicate parameter `{}`", param.name));
                    continue;
                }
            };
            let ty = llvm_type(&param.ty);
            self.inst(&format!("%{}.addr = alloca {}", llvm_name, ty))?;
            self.inst(&format!(
                "store {} %{}, {}* %{}.addr",
                ty, param.name, ty, llvm_name
            ))?;
        }

        if let Some(body) = &def.body {
            self.emit_statement(body)?;
        }

        if !self.terminated {
            if def.return_type.is_void() {
                self.term("ret void")?;
            } else {
                self.term(&format!("ret {} 0", ret))?;
            }
        }
        self.raw("}")?;
        self.raw("")?;

        self.table.exit_scope();
        Ok(())
    }
}

/// Type text for a struct/union field, expanding fixed arrays to
/// `[N x T]`.
fn member_type_text(member: &crate::symtab::Member) -> String {
    if member.ty.is_array && !member.ty.is_vla {
        if let Some(n) = member
            .ty
            .array_size
            .as_ref()
            .and_then(|e| e.const_value())
        {
            return format!("[{} x {}]", n, llvm_type(&member.ty));
        }
        // incomplete array member decays to a pointer
        return format!("{}*", llvm_type(&member.ty));
    }
    llvm_type(&member.ty)
}
