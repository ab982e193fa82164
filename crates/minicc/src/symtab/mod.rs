//! Scoped symbol table.
//!
//! Scopes form a stack; each frame holds a fixed number of hash buckets
//! (djb2a over the symbol name) with in-bucket chaining. Lookup walks from
//! the innermost scope outwards and the first hit wins. Popping a scope
//! drops every symbol it contained, so nothing can refer to a symbol from
//! an exited block.

mod expr_type;
mod layout;

#[cfg(test)]
mod tests;

use minicc_syntax::ast::ParamDecl;
use minicc_syntax::ty::{StorageClass, TypeInfo};

pub const SCOPE_BUCKETS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    Typedef,
    Struct,
    Union,
    Enum,
    EnumConstant,
    Label,
}

/// One struct/union member, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: String,
    pub ty: TypeInfo,
    pub size: u64,
    pub alignment: u64,
    /// Byte offset within the record; always 0 for union members.
    pub offset: u64,
    /// Ordinal position, used as the GEP index.
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    /// Unique name used in the emitted IR.
    pub llvm_name: String,
    pub kind: SymbolKind,
    pub ty: TypeInfo,
    pub scope_level: u32,
    pub is_global: bool,
    pub is_parameter: bool,
    pub is_static: bool,
    pub is_extern: bool,
    pub size: u64,
    pub alignment: u64,
    /// Members of a struct or union, in declaration order.
    pub members: Vec<Member>,
    pub total_size: u64,
    pub max_alignment: u64,
    /// Value of an enum constant.
    pub enum_value: i64,
    /// Declared parameters of a function.
    pub params: Vec<ParamDecl>,
    pub variadic: bool,
    pub is_function_defined: bool,
    /// For labels: whether the definition site has been seen yet.
    pub label_defined: bool,
}

impl Symbol {
    fn new(name: &str, kind: SymbolKind, ty: TypeInfo) -> Symbol {
        Symbol {
            name: name.to_string(),
            llvm_name: String::new(),
            kind,
            ty,
            scope_level: 0,
            is_global: false,
            is_parameter: false,
            is_static: false,
            is_extern: false,
            size: 0,
            alignment: 1,
            members: Vec::new(),
            total_size: 0,
            max_alignment: 1,
            enum_value: 0,
            params: Vec::new(),
            variadic: false,
            is_function_defined: false,
            label_defined: false,
        }
    }
}

#[derive(Debug)]
struct Scope {
    buckets: Vec<Vec<Symbol>>,
    level: u32,
    symbol_count: usize,
}

impl Scope {
    fn new(level: u32) -> Scope {
        Scope {
            buckets: (0..SCOPE_BUCKETS).map(|_| Vec::new()).collect(),
            level,
            symbol_count: 0,
        }
    }

    fn bucket_of(&self, name: &str) -> usize {
        (hash_name(name) % self.buckets.len() as u64) as usize
    }

    fn find(&self, name: &str) -> Option<&Symbol> {
        self.buckets[self.bucket_of(name)]
            .iter()
            .find(|s| s.name == name)
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        let idx = self.bucket_of(name);
        self.buckets[idx].iter_mut().find(|s| s.name == name)
    }
}

/// djb2a.
fn hash_name(name: &str) -> u64 {
    let mut hash: u64 = 5381;
    for &b in name.as_bytes() {
        hash = (hash << 5).wrapping_add(hash) ^ u64::from(b);
    }
    hash
}

#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    scope_counter: u32,
    name_counter: u32,
    current_function: Option<String>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable {
            scopes: vec![Scope::new(0)],
            scope_counter: 0,
            name_counter: 0,
            current_function: None,
        }
    }

    pub fn enter_scope(&mut self) {
        self.scope_counter += 1;
        self.scopes.push(Scope::new(self.scope_counter));
    }

    /// Pop the innermost scope, dropping every symbol declared in it. The
    /// global scope is never popped.
    pub fn exit_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
            self.scope_counter -= 1;
        }
    }

    pub fn at_global_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    pub fn scope_level(&self) -> u32 {
        self.scopes.last().expect("global scope always exists").level
    }

    pub fn set_current_function(&mut self, name: &str) {
        self.current_function = Some(name.to_string());
    }

    pub fn clear_current_function(&mut self) {
        self.current_function = None;
    }

    /// Unique IR name: `global.<name>.<counter>` at file scope, otherwise
    /// `<function>.<name>.<scope_level>.<counter>`.
    fn unique_name(&mut self, base: &str) -> String {
        self.name_counter += 1;
        match &self.current_function {
            Some(function) => format!(
                "{}.{}.{}.{}",
                function,
                base,
                self.scope_level(),
                self.name_counter
            ),
            None => format!("global.{}.{}", base, self.name_counter),
        }
    }

    /// Bind `name` in the current scope. Fails (returns `None`) when the
    /// name is already bound there; enclosing scopes may freely be
    /// shadowed.
    pub fn add_symbol(
        &mut self,
        name: &str,
        kind: SymbolKind,
        ty: &TypeInfo,
    ) -> Option<&mut Symbol> {
        if self
            .scopes
            .last()
            .expect("global scope always exists")
            .find(name)
            .is_some()
        {
            log::debug!(
                "symbol `{}` already defined in scope {}",
                name,
                self.scope_level()
            );
            return None;
        }

        let mut sym = Symbol::new(name, kind, ty.clone());
        sym.scope_level = self.scope_level();
        sym.is_global = self.at_global_scope();
        sym.is_static = ty.storage == StorageClass::Static;
        sym.is_extern = ty.storage == StorageClass::Extern;
        sym.llvm_name = match kind {
            SymbolKind::Variable | SymbolKind::Function => self.unique_name(name),
            _ => name.to_string(),
        };
        if kind == SymbolKind::Variable {
            sym.size = self.type_size(ty);
            sym.alignment = self.type_alignment(ty);
        }

        let scope = self.scopes.last_mut().expect("global scope always exists");
        let idx = scope.bucket_of(name);
        scope.buckets[idx].push(sym);
        scope.symbol_count += 1;
        scope.buckets[idx].last_mut()
    }

    pub fn find_symbol(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.find(name))
    }

    pub fn find_symbol_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.find_mut(name))
    }

    /// Enum constants always land in the global scope, regardless of where
    /// the enum was declared.
    pub fn add_enum_constant(&mut self, name: &str, value: i64) -> Option<&mut Symbol> {
        let global = &mut self.scopes[0];
        if global.find(name).is_some() {
            log::debug!("enum constant `{}` already defined", name);
            return None;
        }
        let mut sym = Symbol::new(name, SymbolKind::EnumConstant, TypeInfo::int());
        sym.llvm_name = name.to_string();
        sym.is_global = true;
        sym.enum_value = value;
        sym.size = layout::INT_SIZE;
        sym.alignment = layout::INT_ALIGN;
        let idx = global.bucket_of(name);
        global.buckets[idx].push(sym);
        global.symbol_count += 1;
        global.buckets[idx].last_mut()
    }

    /// Labels have function scope: they are bound in the scope where they
    /// appear but found from anywhere in the function.
    pub fn add_label(&mut self, name: &str) -> Option<&mut Symbol> {
        let ty = TypeInfo::void();
        let sym = self.add_symbol(name, SymbolKind::Label, &ty)?;
        sym.llvm_name = name.to_string();
        sym.label_defined = true;
        Some(sym)
    }

    pub fn find_label(&self, name: &str) -> Option<&Symbol> {
        for scope in self.scopes.iter().rev() {
            for bucket in &scope.buckets {
                for sym in bucket {
                    if sym.kind == SymbolKind::Label && sym.name == name {
                        return Some(sym);
                    }
                }
            }
        }
        None
    }

    pub fn find_label_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        for scope in self.scopes.iter_mut().rev() {
            for bucket in &mut scope.buckets {
                for sym in bucket {
                    if sym.kind == SymbolKind::Label && sym.name == name {
                        return Some(sym);
                    }
                }
            }
        }
        None
    }

    /// Append a member to a struct or union and rerun the layout
    /// algorithm over the whole member list.
    pub fn add_struct_member(&mut self, tag: &str, name: &str, ty: TypeInfo) {
        let size = self.member_size(&ty);
        let alignment = self.type_alignment(&ty);
        let record = match self.find_symbol_mut(tag) {
            Some(sym)
                if sym.kind == SymbolKind::Struct || sym.kind == SymbolKind::Union =>
            {
                sym
            }
            _ => {
                log::debug!("add_struct_member: no such record `{}`", tag);
                return;
            }
        };
        let index = record.members.len();
        record.members.push(Member {
            name: name.to_string(),
            ty,
            size,
            alignment,
            offset: 0,
            index,
        });
        if record.kind == SymbolKind::Struct {
            layout::layout_struct(record);
        } else {
            layout::layout_union(record);
        }
    }

    pub fn find_struct_member<'t>(&self, record: &'t Symbol, name: &str) -> Option<&'t Member> {
        record.members.iter().find(|m| m.name == name)
    }
}
