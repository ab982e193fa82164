//! C type to LLVM type-name mapping, and the string-escape grammar.

use minicc_syntax::ty::{TypeInfo, TypeKind};

/// Render a type descriptor as LLVM type text. The array flag is ignored
/// here on purpose: callers that need `[N x T]` build it from the element
/// type themselves.
pub fn llvm_type(ty: &TypeInfo) -> String {
    let stem = ty.base_stem();
    let base = match ty.kind {
        TypeKind::Struct => format!("%struct.{}", ty.base),
        TypeKind::Union => format!("%union.{}", ty.base),
        TypeKind::Enum => "i32".to_string(),
        _ => match stem {
            "void" if ty.pointer_level > 0 => "i8".to_string(),
            "void" => "void".to_string(),
            "_Bool" => "i1".to_string(),
            "char" => "i8".to_string(),
            "short" => "i16".to_string(),
            "int" => "i32".to_string(),
            "long" => "i64".to_string(),
            "float" => "float".to_string(),
            "double" => "double".to_string(),
            _ => "i32".to_string(),
        },
    };
    let mut out = base;
    for _ in 0..ty.pointer_level {
        out.push('*');
    }
    out
}

/// Bit width of an integer LLVM type (`i1`, `i8`, ... `i64`); `None` for
/// pointers, floats and aggregates.
pub fn int_width(lltype: &str) -> Option<u32> {
    if lltype.contains('*') {
        return None;
    }
    lltype.strip_prefix('i')?.parse().ok()
}

/// Escape string-literal content for a `c"..."` constant. Printable ASCII
/// passes through; everything else becomes `\HH` (uppercase hex). The
/// terminating `\00` is appended by the caller.
pub fn escape_string(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for &byte in content.as_bytes() {
        match byte {
            b'\n' => out.push_str("\\0A"),
            b'\t' => out.push_str("\\09"),
            b'\r' => out.push_str("\\0D"),
            b'\\' => out.push_str("\\\\"),
            b'"' => out.push_str("\\22"),
            0 => out.push_str("\\00"),
            32..=126 => out.push(byte as char),
            other => out.push_str(&format!("\\{:02X}", other)),
        }
    }
    out
}
