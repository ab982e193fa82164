//! Type descriptors and the arithmetic conversion rules.
//!
//! A [`TypeInfo`] describes a declared or derived C type: a base name (a
//! built-in keyword such as `int`, or the tag of a struct/union/enum), a
//! pointer level, array information, kind flags, a storage class, a
//! qualifier set and, for function types, a signature.

use std::fmt;

use bitflags::bitflags;

use crate::ast::Expr;

/// Storage class specifiers (C11 6.7.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    None,
    Auto,
    Register,
    Static,
    Extern,
    Typedef,
}

impl Default for StorageClass {
    fn default() -> Self {
        StorageClass::None
    }
}

bitflags! {
    /// Type qualifiers (C11 6.7.3).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Qualifiers: u8 {
        const CONST = 1;
        const VOLATILE = 2;
        const RESTRICT = 4;
    }
}

impl Default for Qualifiers {
    fn default() -> Self {
        Qualifiers::empty()
    }
}

/// What category of type the base name refers to.
///
/// At most one of these is ever set; plain scalar types use `Plain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Plain,
    Struct,
    Union,
    Enum,
    Function,
}

impl Default for TypeKind {
    fn default() -> Self {
        TypeKind::Plain
    }
}

/// Parameter list of a function type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    pub params: Vec<TypeInfo>,
    pub variadic: bool,
}

/// A full type descriptor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypeInfo {
    /// Built-in keyword (`int`, `unsigned long`, ...) or a tag name.
    pub base: String,
    /// Number of `*` in the declaration.
    pub pointer_level: usize,
    pub is_array: bool,
    /// Array whose size is not a compile-time constant.
    pub is_vla: bool,
    pub array_size: Option<Box<Expr>>,
    pub kind: TypeKind,
    /// Forward-declared tag without a definition.
    pub is_incomplete: bool,
    pub storage: StorageClass,
    pub qualifiers: Qualifiers,
    /// Present only when `kind == TypeKind::Function`.
    pub signature: Option<Signature>,
}

impl TypeInfo {
    pub fn named(base: &str) -> Self {
        TypeInfo {
            base: base.to_string(),
            ..Default::default()
        }
    }

    pub fn int() -> Self {
        Self::named("int")
    }

    pub fn char_() -> Self {
        Self::named("char")
    }

    pub fn bool_() -> Self {
        Self::named("_Bool")
    }

    pub fn void() -> Self {
        Self::named("void")
    }

    /// `char*`, the type of a string literal.
    pub fn char_ptr() -> Self {
        let mut ty = Self::named("char");
        ty.pointer_level = 1;
        ty
    }

    pub fn record(tag: &str, kind: TypeKind) -> Self {
        let mut ty = Self::named(tag);
        ty.kind = kind;
        ty
    }

    /// Base name with any `signed`/`unsigned` prefix removed.
    pub fn base_stem(&self) -> &str {
        let s = self.base.as_str();
        s.strip_prefix("unsigned ")
            .or_else(|| s.strip_prefix("signed "))
            .unwrap_or(s)
    }

    pub fn is_unsigned(&self) -> bool {
        self.base == "_Bool" || self.base.starts_with("unsigned")
    }

    pub fn is_pointer(&self) -> bool {
        self.pointer_level > 0
    }

    /// Pointer-like for value purposes: a pointer or a decaying array.
    pub fn is_pointerish(&self) -> bool {
        self.pointer_level > 0 || self.is_array
    }

    pub fn is_void(&self) -> bool {
        self.pointer_level == 0 && self.base == "void"
    }

    pub fn is_floating(&self) -> bool {
        if self.pointer_level > 0 || self.is_array {
            return false;
        }
        matches!(self.base_stem(), "float" | "double")
    }

    pub fn is_integer(&self) -> bool {
        if self.pointer_level > 0 || self.is_array {
            return false;
        }
        if self.kind == TypeKind::Enum {
            return true;
        }
        matches!(self.base_stem(), "char" | "short" | "int" | "long" | "_Bool")
    }

    pub fn is_arithmetic(&self) -> bool {
        self.is_integer() || self.is_floating()
    }

    pub fn is_struct(&self) -> bool {
        self.kind == TypeKind::Struct
    }

    pub fn is_union(&self) -> bool {
        self.kind == TypeKind::Union
    }

    pub fn is_record(&self) -> bool {
        self.is_struct() || self.is_union()
    }

    /// One more level of indirection: the type of `&expr`.
    pub fn referenced(&self) -> TypeInfo {
        let mut ty = self.clone();
        ty.pointer_level += 1;
        ty
    }

    /// One less level of indirection: the type of `*expr` or `expr[i]`.
    ///
    /// Arrays yield their element type; already-scalar types are returned
    /// unchanged (the caller reports the diagnostic).
    pub fn dereferenced(&self) -> TypeInfo {
        let mut ty = self.clone();
        if ty.is_array {
            ty.is_array = false;
            ty.is_vla = false;
            ty.array_size = None;
        } else if ty.pointer_level > 0 {
            ty.pointer_level -= 1;
        }
        ty
    }

    /// Array-to-pointer decay: `T[N]` used as a value becomes `T*`.
    pub fn decayed(&self) -> TypeInfo {
        if !self.is_array {
            return self.clone();
        }
        let mut ty = self.clone();
        ty.is_array = false;
        ty.is_vla = false;
        ty.array_size = None;
        ty.pointer_level += 1;
        ty
    }

    /// Integer promotion (C11 6.3.1.1): anything narrower than `int`
    /// becomes `int`. Enums promote too.
    pub fn promoted(&self) -> TypeInfo {
        if !self.is_integer() {
            return self.clone();
        }
        match self.base_stem() {
            "char" | "short" | "_Bool" => TypeInfo::int(),
            _ if self.kind == TypeKind::Enum => TypeInfo::int(),
            _ => self.clone(),
        }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TypeKind::Struct => write!(f, "struct {}", self.base)?,
            TypeKind::Union => write!(f, "union {}", self.base)?,
            TypeKind::Enum => write!(f, "enum {}", self.base)?,
            _ => f.write_str(&self.base)?,
        }
        for _ in 0..self.pointer_level {
            f.write_str("*")?;
        }
        if self.is_array {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

/// Usual arithmetic conversions (C11 6.3.1.8), reduced to the subset the
/// emitter distinguishes: `double` beats `float` beats `long` beats `int`.
pub fn usual_arithmetic(lhs: &TypeInfo, rhs: &TypeInfo) -> TypeInfo {
    if lhs.base_stem() == "double" || rhs.base_stem() == "double" {
        return TypeInfo::named("double");
    }
    if lhs.base_stem() == "float" || rhs.base_stem() == "float" {
        return TypeInfo::named("float");
    }
    if lhs.base_stem() == "long" || rhs.base_stem() == "long" {
        return TypeInfo::named("long");
    }
    TypeInfo::int()
}

/// Structural compatibility: same pointer level, same array flag, same
/// base name, same kind.
pub fn compatible(a: &TypeInfo, b: &TypeInfo) -> bool {
    a.pointer_level == b.pointer_level
        && a.is_array == b.is_array
        && a.base == b.base
        && a.kind == b.kind
}

/// Whether a value of type `from` is implicitly accepted where `to` is
/// expected: identity, arithmetic-to-arithmetic, `void*` in either
/// direction, pointers to the identical pointee, and array decay.
pub fn can_convert_to(from: &TypeInfo, to: &TypeInfo) -> bool {
    if compatible(from, to) {
        return true;
    }
    if from.is_arithmetic() && to.is_arithmetic() {
        return true;
    }
    let from_ptr = from.is_pointerish();
    let to_ptr = to.pointer_level > 0;
    if from_ptr && to_ptr {
        // void* converts both ways
        if from.base == "void" || to.base == "void" {
            return true;
        }
        let decayed = from.decayed();
        return decayed.base == to.base
            && decayed.pointer_level == to.pointer_level
            && decayed.kind == to.kind;
    }
    false
}
