//! Deduplicated string-literal pool.
//!
//! Literals are interned during expression emission and drained as
//! private constants at the very end of the output. Byte-equal content
//! shares one id.

use std::collections::HashMap;
use std::io::{self, Write};

use super::llty;

#[derive(Debug, Default)]
pub struct StringPool {
    entries: Vec<(String, u32)>,
    ids: HashMap<String, u32>,
    counter: u32,
}

impl StringPool {
    pub fn new() -> StringPool {
        StringPool::default()
    }

    /// Intern `content`, returning its id. The content is moved into the
    /// pool; equal content returns the existing id.
    pub fn intern(&mut self, content: &str) -> u32 {
        if let Some(&id) = self.ids.get(content) {
            return id;
        }
        self.counter += 1;
        let id = self.counter;
        self.ids.insert(content.to_string(), id);
        self.entries.push((content.to_string(), id));
        id
    }

    /// Emit one `@.str<id>` constant per distinct literal, in interning
    /// order.
    pub fn emit_all(&self, out: &mut dyn Write) -> io::Result<()> {
        for (content, id) in &self.entries {
            let len = content.len() + 1;
            writeln!(
                out,
                "@.str{} = private unnamed_addr constant [{} x i8] c\"{}\\00\"",
                id,
                len,
                llty::escape_string(content)
            )?;
        }
        Ok(())
    }
}
