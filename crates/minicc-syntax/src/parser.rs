//! Recursive-descent parser for the C subset.
//!
//! The parser owns the token stream and a set of typedef names; a name
//! registered by a `typedef` declaration parses as a type specifier from
//! that point on, which is the one piece of context-sensitivity the C
//! grammar forces on us. Typedefs are substituted eagerly, so later passes
//! never see them in type positions.

use std::collections::HashMap;
use std::fmt;

use crate::ast::*;
use crate::lex::{self, Lexeme, Punct, Token};
use crate::ty::{Qualifiers, Signature, StorageClass, TypeInfo, TypeKind};

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub line: u32,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

impl From<lex::LexError> for ParseError {
    fn from(e: lex::LexError) -> Self {
        ParseError {
            line: e.line,
            message: e.message,
        }
    }
}

/// Parse a whole translation unit.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let tokens = lex::tokenize(source)?;
    Parser::new(tokens).translation_unit()
}

struct Parser {
    tokens: Vec<Lexeme>,
    pos: usize,
    typedefs: HashMap<String, TypeInfo>,
    anon_counter: u32,
}

/// A parsed declarator, before merging with the declaration specifiers.
struct Declarator {
    name: String,
    pointer_level: usize,
    kind: DeclaratorKind,
}

enum DeclaratorKind {
    Plain,
    Array(Option<Expr>),
    Function(Vec<ParamDecl>, bool),
}

/// Declaration specifiers plus any record/enum definitions that appeared
/// inline and must be hoisted ahead of the declarators.
struct DeclSpec {
    base: TypeInfo,
    hoisted: Vec<Stmt>,
}

impl Parser {
    fn new(tokens: Vec<Lexeme>) -> Self {
        Parser {
            tokens,
            pos: 0,
            typedefs: HashMap::new(),
            anon_counter: 0,
        }
    }

    // ----- token plumbing -------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|l| &l.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|l| &l.token)
    }

    fn line(&self) -> u32 {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|l| l.line)
            .unwrap_or(0)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            line: self.line(),
            message: message.into(),
        }
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|l| l.token.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn at_punct(&self, p: Punct) -> bool {
        matches!(self.peek(), Some(Token::Punct(q)) if *q == p)
    }

    fn eat_punct(&mut self, p: Punct) -> bool {
        if self.at_punct(p) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: Punct) -> Result<(), ParseError> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected `{}`, found {:?}",
                p,
                self.peek().cloned()
            )))
        }
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(t) if t.is_keyword(kw))
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.at_keyword(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match self.bump() {
            Some(Token::Identifier(name)) => Ok(name),
            other => Err(self.error(format!("expected identifier, found {:?}", other))),
        }
    }

    // ----- translation unit ----------------------------------------------

    fn translation_unit(&mut self) -> Result<Program, ParseError> {
        let mut program = Program::default();
        while self.peek().is_some() {
            let decls = self.external_declaration()?;
            program.decls.extend(decls);
        }
        log::debug!("parsed {} top-level declarations", program.decls.len());
        Ok(program)
    }

    fn external_declaration(&mut self) -> Result<Vec<ExternalDecl>, ParseError> {
        let spec = self.declaration_specifiers()?;
        let mut out: Vec<ExternalDecl> = spec
            .hoisted
            .into_iter()
            .map(external_from_stmt)
            .collect();

        // `struct S { ... };` or `enum E { ... };` with no declarators
        if self.eat_punct(Punct::Semicolon) {
            return Ok(out);
        }

        let mut declarator = self.declarator(true)?;

        match std::mem::replace(&mut declarator.kind, DeclaratorKind::Plain) {
            DeclaratorKind::Function(params, variadic) => {
                let mut return_type = spec.base.clone();
                return_type.storage = StorageClass::None;
                return_type.pointer_level += declarator.pointer_level;
                let body = if self.at_punct(Punct::CurlyOpen) {
                    Some(self.compound_statement()?)
                } else {
                    self.expect_punct(Punct::Semicolon)?;
                    None
                };
                out.push(ExternalDecl::Function(Box::new(FunctionDef {
                    name: declarator.name,
                    return_type,
                    params,
                    variadic,
                    storage: spec.base.storage,
                    body,
                })));
                Ok(out)
            }
            kind => {
                declarator.kind = kind;
                let mut stmts = Vec::new();
                self.finish_declarators(&spec.base, declarator, &mut stmts)?;
                out.extend(stmts.into_iter().map(external_from_stmt));
                Ok(out)
            }
        }
    }

    /// Shared tail of declaration parsing: the first declarator is already
    /// consumed; handle its initializer, any further `, declarator` pairs
    /// and the closing semicolon.
    fn finish_declarators(
        &mut self,
        base: &TypeInfo,
        first: Declarator,
        out: &mut Vec<Stmt>,
    ) -> Result<(), ParseError> {
        let mut declarator = first;
        loop {
            if base.storage == StorageClass::Typedef {
                let ty = self.merge_declarator(base, &mut declarator)?;
                let mut target = ty;
                target.storage = StorageClass::None;
                self.typedefs.insert(declarator.name.clone(), target.clone());
                out.push(Stmt::Typedef(Box::new(TypedefDecl {
                    ty: target,
                    name: declarator.name,
                })));
            } else {
                out.push(self.declaration_from(base, declarator)?);
            }
            if self.eat_punct(Punct::Comma) {
                declarator = self.declarator(true)?;
            } else {
                self.expect_punct(Punct::Semicolon)?;
                return Ok(());
            }
        }
    }

    fn declaration_from(
        &mut self,
        base: &TypeInfo,
        mut declarator: Declarator,
    ) -> Result<Stmt, ParseError> {
        let ty = self.merge_declarator(base, &mut declarator)?;
        match declarator.kind {
            DeclaratorKind::Array(size) => {
                let is_vla = ty.is_vla;
                Ok(Stmt::Array(Box::new(ArrayDecl {
                    ty,
                    name: declarator.name,
                    size,
                    is_vla,
                })))
            }
            DeclaratorKind::Function(..) => {
                Err(self.error("function declarators are only supported as the first declarator at file scope"))
            }
            DeclaratorKind::Plain => {
                let init = if self.eat_punct(Punct::Assign) {
                    Some(self.initializer()?)
                } else {
                    None
                };
                Ok(Stmt::Declaration(Box::new(Declaration {
                    ty,
                    name: declarator.name,
                    init,
                })))
            }
        }
    }

    fn merge_declarator(
        &mut self,
        base: &TypeInfo,
        declarator: &mut Declarator,
    ) -> Result<TypeInfo, ParseError> {
        let mut ty = base.clone();
        ty.pointer_level += declarator.pointer_level;
        if let DeclaratorKind::Array(size) = &declarator.kind {
            ty.is_array = true;
            ty.array_size = size.clone().map(Box::new);
            ty.is_vla = match size {
                Some(expr) => expr.const_value().is_none(),
                None => false,
            };
        }
        if let DeclaratorKind::Function(params, variadic) = &declarator.kind {
            ty.kind = TypeKind::Function;
            ty.signature = Some(Signature {
                params: params.iter().map(|p| p.ty.clone()).collect(),
                variadic: *variadic,
            });
        }
        Ok(ty)
    }

    // ----- declaration specifiers ----------------------------------------

    fn starts_declaration(&self) -> bool {
        match self.peek() {
            Some(Token::Keyword(kw)) => matches!(
                kw.as_str(),
                "void"
                    | "_Bool"
                    | "char"
                    | "short"
                    | "int"
                    | "long"
                    | "float"
                    | "double"
                    | "signed"
                    | "unsigned"
                    | "struct"
                    | "union"
                    | "enum"
                    | "typedef"
                    | "static"
                    | "extern"
                    | "auto"
                    | "register"
                    | "const"
                    | "volatile"
                    | "restrict"
            ),
            Some(Token::Identifier(name)) => {
                // A typedef name only opens a declaration when followed by
                // something declarator-shaped.
                self.typedefs.contains_key(name)
                    && matches!(
                        self.peek_at(1),
                        Some(Token::Identifier(_)) | Some(Token::Punct(Punct::Star))
                    )
            }
            _ => false,
        }
    }

    /// Whether the current token could begin a type name (for casts and
    /// `sizeof(type)`).
    fn starts_type_name(&self) -> bool {
        match self.peek() {
            Some(Token::Keyword(kw)) => matches!(
                kw.as_str(),
                "void"
                    | "_Bool"
                    | "char"
                    | "short"
                    | "int"
                    | "long"
                    | "float"
                    | "double"
                    | "signed"
                    | "unsigned"
                    | "struct"
                    | "union"
                    | "enum"
                    | "const"
                    | "volatile"
            ),
            Some(Token::Identifier(name)) => self.typedefs.contains_key(name),
            _ => false,
        }
    }

    fn declaration_specifiers(&mut self) -> Result<DeclSpec, ParseError> {
        let mut storage = StorageClass::None;
        let mut qualifiers = Qualifiers::empty();
        let mut unsigned = false;
        let mut signed = false;
        let mut words: Vec<&'static str> = Vec::new();
        let mut tagged: Option<TypeInfo> = None;
        let mut hoisted = Vec::new();

        loop {
            let kw = match self.peek() {
                Some(Token::Keyword(kw)) => kw.clone(),
                Some(Token::Identifier(name))
                    if words.is_empty() && tagged.is_none() && !unsigned && !signed =>
                {
                    match self.typedefs.get(name) {
                        Some(target) => {
                            let target = target.clone();
                            self.bump();
                            tagged = Some(target);
                            continue;
                        }
                        None => break,
                    }
                }
                _ => break,
            };
            match kw.as_str() {
                "typedef" => storage = StorageClass::Typedef,
                "static" => storage = StorageClass::Static,
                "extern" => storage = StorageClass::Extern,
                "auto" => storage = StorageClass::Auto,
                "register" => storage = StorageClass::Register,
                "const" => qualifiers |= Qualifiers::CONST,
                "volatile" => qualifiers |= Qualifiers::VOLATILE,
                "restrict" => qualifiers |= Qualifiers::RESTRICT,
                "unsigned" => unsigned = true,
                "signed" => signed = true,
                "void" => words.push("void"),
                "_Bool" => words.push("_Bool"),
                "char" => words.push("char"),
                "short" => words.push("short"),
                "int" => words.push("int"),
                "long" => words.push("long"),
                "float" => words.push("float"),
                "double" => words.push("double"),
                "struct" | "union" | "enum" => {
                    self.bump();
                    let ty = if kw == "enum" {
                        self.enum_specifier(&mut hoisted)?
                    } else {
                        self.record_specifier(kw == "union", &mut hoisted)?
                    };
                    tagged = Some(ty);
                    continue;
                }
                _ => break,
            }
            self.bump();
        }

        let mut base = match tagged {
            Some(ty) => {
                if !words.is_empty() {
                    return Err(self.error("conflicting type specifiers"));
                }
                ty
            }
            None => {
                if words.is_empty() && !unsigned && !signed {
                    return Err(self.error(format!(
                        "expected type specifier, found {:?}",
                        self.peek().cloned()
                    )));
                }
                TypeInfo::named(&compose_base_name(&words, unsigned))
            }
        };
        base.storage = storage;
        base.qualifiers |= qualifiers;
        Ok(DeclSpec { base, hoisted })
    }

    fn anon_tag(&mut self, what: &str) -> String {
        self.anon_counter += 1;
        format!("__anon_{}{}", what, self.anon_counter)
    }

    fn record_specifier(
        &mut self,
        is_union: bool,
        hoisted: &mut Vec<Stmt>,
    ) -> Result<TypeInfo, ParseError> {
        let name = match self.peek() {
            Some(Token::Identifier(_)) => self.expect_identifier()?,
            _ => self.anon_tag(if is_union { "union" } else { "struct" }),
        };
        let kind = if is_union {
            TypeKind::Union
        } else {
            TypeKind::Struct
        };

        if self.eat_punct(Punct::CurlyOpen) {
            let mut members = Vec::new();
            while !self.eat_punct(Punct::CurlyClose) {
                let spec = self.declaration_specifiers()?;
                loop {
                    let mut declarator = self.declarator(true)?;
                    let ty = self.merge_declarator(&spec.base, &mut declarator)?;
                    members.push(MemberDecl {
                        name: declarator.name,
                        ty,
                    });
                    if !self.eat_punct(Punct::Comma) {
                        break;
                    }
                }
                self.expect_punct(Punct::Semicolon)?;
            }
            let decl = RecordDecl {
                name: name.clone(),
                members,
                is_definition: true,
            };
            hoisted.push(if is_union {
                Stmt::Union(Box::new(decl))
            } else {
                Stmt::Struct(Box::new(decl))
            });
        }

        Ok(TypeInfo::record(&name, kind))
    }

    fn enum_specifier(&mut self, hoisted: &mut Vec<Stmt>) -> Result<TypeInfo, ParseError> {
        let name = match self.peek() {
            Some(Token::Identifier(_)) => self.expect_identifier()?,
            _ => self.anon_tag("enum"),
        };

        if self.eat_punct(Punct::CurlyOpen) {
            let mut values = Vec::new();
            while !self.eat_punct(Punct::CurlyClose) {
                let value_name = self.expect_identifier()?;
                let value = if self.eat_punct(Punct::Assign) {
                    Some(self.conditional()?)
                } else {
                    None
                };
                values.push(EnumValueDecl {
                    name: value_name,
                    value,
                });
                if !self.eat_punct(Punct::Comma) {
                    self.expect_punct(Punct::CurlyClose)?;
                    break;
                }
            }
            hoisted.push(Stmt::Enum(Box::new(EnumDecl {
                name: name.clone(),
                values,
                is_definition: true,
            })));
        }

        Ok(TypeInfo::record(&name, TypeKind::Enum))
    }

    // ----- declarators ----------------------------------------------------

    fn declarator(&mut self, name_required: bool) -> Result<Declarator, ParseError> {
        let mut pointer_level = 0;
        while self.eat_punct(Punct::Star) {
            pointer_level += 1;
            // qualifiers on the pointer itself are accepted and dropped
            while self.eat_keyword("const") || self.eat_keyword("volatile")
                || self.eat_keyword("restrict")
            {}
        }

        let name = match self.peek() {
            Some(Token::Identifier(_)) => self.expect_identifier()?,
            _ if !name_required => String::new(),
            other => {
                return Err(self.error(format!("expected declarator name, found {:?}", other)))
            }
        };

        let kind = if self.eat_punct(Punct::ParenOpen) {
            let (params, variadic) = self.parameter_list()?;
            DeclaratorKind::Function(params, variadic)
        } else if self.eat_punct(Punct::SquareOpen) {
            let size = if self.at_punct(Punct::SquareClose) {
                None
            } else {
                Some(self.conditional()?)
            };
            self.expect_punct(Punct::SquareClose)?;
            if self.at_punct(Punct::SquareOpen) {
                return Err(self.error("multi-dimensional arrays are not supported"));
            }
            DeclaratorKind::Array(size)
        } else {
            DeclaratorKind::Plain
        };

        Ok(Declarator {
            name,
            pointer_level,
            kind,
        })
    }

    fn parameter_list(&mut self) -> Result<(Vec<ParamDecl>, bool), ParseError> {
        if self.eat_punct(Punct::ParenClose) {
            return Ok((Vec::new(), false));
        }
        if self.at_keyword("void") && self.peek_at(1) == Some(&Token::Punct(Punct::ParenClose)) {
            self.bump();
            self.bump();
            return Ok((Vec::new(), false));
        }

        let mut params = Vec::new();
        let mut variadic = false;
        loop {
            if self.eat_punct(Punct::Ellipsis) {
                variadic = true;
                break;
            }
            let spec = self.declaration_specifiers()?;
            let mut declarator = self.declarator(false)?;
            let mut ty = self.merge_declarator(&spec.base, &mut declarator)?;
            // Array parameters always decay to pointers.
            if ty.is_array {
                ty = ty.decayed();
            }
            params.push(ParamDecl {
                ty,
                name: declarator.name,
            });
            if !self.eat_punct(Punct::Comma) {
                break;
            }
        }
        self.expect_punct(Punct::ParenClose)?;
        Ok((params, variadic))
    }

    /// A type name for casts and `sizeof`: specifiers, stars, nothing else.
    fn type_name(&mut self) -> Result<TypeInfo, ParseError> {
        let mut hoisted = Vec::new();
        let spec = {
            let DeclSpec { base, hoisted: h } = self.declaration_specifiers()?;
            hoisted.extend(h);
            base
        };
        if !hoisted.is_empty() {
            return Err(self.error("type definitions are not allowed in a type name"));
        }
        let mut ty = spec;
        while self.eat_punct(Punct::Star) {
            ty.pointer_level += 1;
        }
        Ok(ty)
    }

    // ----- statements -----------------------------------------------------

    fn compound_statement(&mut self) -> Result<Stmt, ParseError> {
        self.expect_punct(Punct::CurlyOpen)?;
        let mut stmts = Vec::new();
        while !self.eat_punct(Punct::CurlyClose) {
            if self.peek().is_none() {
                return Err(self.error("unexpected end of input in compound statement"));
            }
            if self.starts_declaration() {
                let spec = self.declaration_specifiers()?;
                let mut out = spec.hoisted;
                if self.eat_punct(Punct::Semicolon) {
                    stmts.extend(out);
                    continue;
                }
                let declarator = self.declarator(true)?;
                self.finish_declarators(&spec.base, declarator, &mut out)?;
                stmts.extend(out);
            } else {
                stmts.push(self.statement()?);
            }
        }
        Ok(Stmt::Compound(stmts))
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek() {
            Some(Token::Punct(Punct::CurlyOpen)) => self.compound_statement(),
            Some(Token::Punct(Punct::Semicolon)) => {
                self.bump();
                Ok(Stmt::Empty)
            }
            Some(Token::Keyword(kw)) => match kw.clone().as_str() {
                "if" => self.if_statement(),
                "while" => self.while_statement(),
                "do" => self.do_while_statement(),
                "for" => self.for_statement(),
                "switch" => self.switch_statement(),
                "case" => {
                    self.bump();
                    let value = self.conditional()?;
                    self.expect_punct(Punct::Colon)?;
                    let statement = self.statement()?;
                    Ok(Stmt::Case(Box::new(CaseStmt { value, statement })))
                }
                "default" => {
                    self.bump();
                    self.expect_punct(Punct::Colon)?;
                    let statement = self.statement()?;
                    Ok(Stmt::Default(Box::new(DefaultStmt { statement })))
                }
                "break" => {
                    self.bump();
                    self.expect_punct(Punct::Semicolon)?;
                    Ok(Stmt::Break)
                }
                "continue" => {
                    self.bump();
                    self.expect_punct(Punct::Semicolon)?;
                    Ok(Stmt::Continue)
                }
                "goto" => {
                    self.bump();
                    let label = self.expect_identifier()?;
                    self.expect_punct(Punct::Semicolon)?;
                    Ok(Stmt::Goto(label))
                }
                "return" => {
                    self.bump();
                    let value = if self.at_punct(Punct::Semicolon) {
                        None
                    } else {
                        Some(self.expression()?)
                    };
                    self.expect_punct(Punct::Semicolon)?;
                    Ok(Stmt::Return(value))
                }
                other => Err(self.error(format!("unexpected keyword `{}`", other))),
            },
            Some(Token::Identifier(_))
                if self.peek_at(1) == Some(&Token::Punct(Punct::Colon)) =>
            {
                let label = self.expect_identifier()?;
                self.bump(); // colon
                let statement = self.statement()?;
                Ok(Stmt::Label(Box::new(LabelStmt { label, statement })))
            }
            Some(_) => {
                let expr = self.expression()?;
                self.expect_punct(Punct::Semicolon)?;
                Ok(Stmt::Expr(expr))
            }
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn if_statement(&mut self) -> Result<Stmt, ParseError> {
        self.bump();
        self.expect_punct(Punct::ParenOpen)?;
        let condition = self.expression()?;
        self.expect_punct(Punct::ParenClose)?;
        let then_stmt = self.statement()?;
        let else_stmt = if self.eat_keyword("else") {
            Some(self.statement()?)
        } else {
            None
        };
        Ok(Stmt::If(Box::new(IfStmt {
            condition,
            then_stmt,
            else_stmt,
        })))
    }

    fn while_statement(&mut self) -> Result<Stmt, ParseError> {
        self.bump();
        self.expect_punct(Punct::ParenOpen)?;
        let condition = self.expression()?;
        self.expect_punct(Punct::ParenClose)?;
        let body = self.statement()?;
        Ok(Stmt::While(Box::new(WhileStmt { condition, body })))
    }

    fn do_while_statement(&mut self) -> Result<Stmt, ParseError> {
        self.bump();
        let body = self.statement()?;
        if !self.eat_keyword("while") {
            return Err(self.error("expected `while` after do-statement body"));
        }
        self.expect_punct(Punct::ParenOpen)?;
        let condition = self.expression()?;
        self.expect_punct(Punct::ParenClose)?;
        self.expect_punct(Punct::Semicolon)?;
        Ok(Stmt::DoWhile(Box::new(DoWhileStmt { body, condition })))
    }

    fn for_statement(&mut self) -> Result<Stmt, ParseError> {
        self.bump();
        self.expect_punct(Punct::ParenOpen)?;

        let init = if self.eat_punct(Punct::Semicolon) {
            None
        } else if self.starts_declaration() {
            let spec = self.declaration_specifiers()?;
            let mut out = spec.hoisted;
            let declarator = self.declarator(true)?;
            self.finish_declarators(&spec.base, declarator, &mut out)?;
            Some(if out.len() == 1 {
                out.remove(0)
            } else {
                Stmt::Compound(out)
            })
        } else {
            let expr = self.expression()?;
            self.expect_punct(Punct::Semicolon)?;
            Some(Stmt::Expr(expr))
        };

        let condition = if self.at_punct(Punct::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(Punct::Semicolon)?;

        let update = if self.at_punct(Punct::ParenClose) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(Punct::ParenClose)?;

        let body = self.statement()?;
        Ok(Stmt::For(Box::new(ForStmt {
            init,
            condition,
            update,
            body,
        })))
    }

    fn switch_statement(&mut self) -> Result<Stmt, ParseError> {
        self.bump();
        self.expect_punct(Punct::ParenOpen)?;
        let expression = self.expression()?;
        self.expect_punct(Punct::ParenClose)?;
        let body = self.statement()?;
        Ok(Stmt::Switch(Box::new(SwitchStmt { expression, body })))
    }

    // ----- expressions ----------------------------------------------------

    fn initializer(&mut self) -> Result<Expr, ParseError> {
        if self.eat_punct(Punct::CurlyOpen) {
            let mut values = Vec::new();
            while !self.eat_punct(Punct::CurlyClose) {
                values.push(self.assignment()?);
                if !self.eat_punct(Punct::Comma) {
                    self.expect_punct(Punct::CurlyClose)?;
                    break;
                }
            }
            Ok(Expr::InitializerList(values))
        } else {
            self.assignment()
        }
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.conditional()?;
        let op = match self.peek() {
            Some(Token::Punct(Punct::Assign)) => None,
            Some(Token::Punct(Punct::PlusAssign)) => Some(BinaryOp::Add),
            Some(Token::Punct(Punct::MinusAssign)) => Some(BinaryOp::Sub),
            Some(Token::Punct(Punct::StarAssign)) => Some(BinaryOp::Mul),
            Some(Token::Punct(Punct::SlashAssign)) => Some(BinaryOp::Div),
            Some(Token::Punct(Punct::PercentAssign)) => Some(BinaryOp::Mod),
            Some(Token::Punct(Punct::ShiftLeftAssign)) => Some(BinaryOp::Shl),
            Some(Token::Punct(Punct::ShiftRightAssign)) => Some(BinaryOp::Shr),
            Some(Token::Punct(Punct::AmpAssign)) => Some(BinaryOp::BitAnd),
            Some(Token::Punct(Punct::PipeAssign)) => Some(BinaryOp::BitOr),
            Some(Token::Punct(Punct::CaretAssign)) => Some(BinaryOp::BitXor),
            _ => return Ok(lhs),
        };
        self.bump();
        let value = self.assignment()?;
        let target = match lhs {
            Expr::Identifier(id) => AssignTarget::Name(id.name),
            other => AssignTarget::Lvalue(other),
        };
        Ok(Expr::Assign(Box::new(AssignExpr { target, op, value })))
    }

    fn conditional(&mut self) -> Result<Expr, ParseError> {
        let condition = self.logical_or()?;
        if !self.eat_punct(Punct::Question) {
            return Ok(condition);
        }
        let then_expr = self.expression()?;
        self.expect_punct(Punct::Colon)?;
        let else_expr = self.conditional()?;
        Ok(Expr::Conditional(Box::new(ConditionalExpr {
            condition,
            then_expr,
            else_expr,
            ty: None,
        })))
    }

    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary(Box::new(BinaryExpr {
            op,
            lhs,
            rhs,
            ty: None,
        }))
    }

    fn logical_or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.logical_and()?;
        while self.eat_punct(Punct::PipePipe) {
            let rhs = self.logical_and()?;
            expr = Self::binary(BinaryOp::LogicalOr, expr, rhs);
        }
        Ok(expr)
    }

    fn logical_and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.bit_or()?;
        while self.eat_punct(Punct::AmpAmp) {
            let rhs = self.bit_or()?;
            expr = Self::binary(BinaryOp::LogicalAnd, expr, rhs);
        }
        Ok(expr)
    }

    fn bit_or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.bit_xor()?;
        while self.at_punct(Punct::Pipe) {
            self.bump();
            let rhs = self.bit_xor()?;
            expr = Self::binary(BinaryOp::BitOr, expr, rhs);
        }
        Ok(expr)
    }

    fn bit_xor(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.bit_and()?;
        while self.at_punct(Punct::Caret) {
            self.bump();
            let rhs = self.bit_and()?;
            expr = Self::binary(BinaryOp::BitXor, expr, rhs);
        }
        Ok(expr)
    }

    fn bit_and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.equality()?;
        while self.at_punct(Punct::Ampersand) {
            self.bump();
            let rhs = self.equality()?;
            expr = Self::binary(BinaryOp::BitAnd, expr, rhs);
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.relational()?;
        loop {
            let op = if self.eat_punct(Punct::EqualEqual) {
                BinaryOp::Eq
            } else if self.eat_punct(Punct::BangEqual) {
                BinaryOp::Ne
            } else {
                return Ok(expr);
            };
            let rhs = self.relational()?;
            expr = Self::binary(op, expr, rhs);
        }
    }

    fn relational(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.shift()?;
        loop {
            let op = if self.eat_punct(Punct::Less) {
                BinaryOp::Lt
            } else if self.eat_punct(Punct::LessEqual) {
                BinaryOp::Le
            } else if self.eat_punct(Punct::Greater) {
                BinaryOp::Gt
            } else if self.eat_punct(Punct::GreaterEqual) {
                BinaryOp::Ge
            } else {
                return Ok(expr);
            };
            let rhs = self.shift()?;
            expr = Self::binary(op, expr, rhs);
        }
    }

    fn shift(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.additive()?;
        loop {
            let op = if self.eat_punct(Punct::ShiftLeft) {
                BinaryOp::Shl
            } else if self.eat_punct(Punct::ShiftRight) {
                BinaryOp::Shr
            } else {
                return Ok(expr);
            };
            let rhs = self.additive()?;
            expr = Self::binary(op, expr, rhs);
        }
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.multiplicative()?;
        loop {
            let op = if self.eat_punct(Punct::Plus) {
                BinaryOp::Add
            } else if self.eat_punct(Punct::Minus) {
                BinaryOp::Sub
            } else {
                return Ok(expr);
            };
            let rhs = self.multiplicative()?;
            expr = Self::binary(op, expr, rhs);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.unary()?;
        loop {
            let op = if self.eat_punct(Punct::Star) {
                BinaryOp::Mul
            } else if self.eat_punct(Punct::Slash) {
                BinaryOp::Div
            } else if self.eat_punct(Punct::Percent) {
                BinaryOp::Mod
            } else {
                return Ok(expr);
            };
            let rhs = self.unary()?;
            expr = Self::binary(op, expr, rhs);
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(Token::Punct(Punct::PlusPlus)) => {
                self.bump();
                let operand = self.unary()?;
                Ok(unary(UnaryOp::PreIncrement, operand))
            }
            Some(Token::Punct(Punct::MinusMinus)) => {
                self.bump();
                let operand = self.unary()?;
                Ok(unary(UnaryOp::PreDecrement, operand))
            }
            Some(Token::Punct(Punct::Ampersand)) => {
                self.bump();
                let operand = self.unary()?;
                Ok(Expr::AddressOf(Box::new(AddressOfExpr {
                    operand,
                    ty: None,
                })))
            }
            Some(Token::Punct(Punct::Star)) => {
                self.bump();
                let operand = self.unary()?;
                Ok(Expr::Dereference(Box::new(DerefExpr { operand, ty: None })))
            }
            Some(Token::Punct(Punct::Plus)) => {
                self.bump();
                self.unary()
            }
            Some(Token::Punct(Punct::Minus)) => {
                self.bump();
                let operand = self.unary()?;
                Ok(unary(UnaryOp::Minus, operand))
            }
            Some(Token::Punct(Punct::Tilde)) => {
                self.bump();
                let operand = self.unary()?;
                Ok(unary(UnaryOp::Complement, operand))
            }
            Some(Token::Punct(Punct::Bang)) => {
                self.bump();
                let operand = self.unary()?;
                Ok(unary(UnaryOp::Negate, operand))
            }
            Some(Token::Keyword(kw)) if kw == "sizeof" => {
                self.bump();
                if self.at_punct(Punct::ParenOpen) {
                    // Distinguish `sizeof(type)` from `sizeof(expr)`.
                    let save = self.pos;
                    self.bump();
                    if self.starts_type_name() {
                        let ty = self.type_name()?;
                        self.expect_punct(Punct::ParenClose)?;
                        return Ok(Expr::Sizeof(Box::new(SizeofExpr {
                            arg: SizeofArg::Type(ty),
                            size: None,
                        })));
                    }
                    self.pos = save;
                }
                let operand = self.unary()?;
                Ok(Expr::Sizeof(Box::new(SizeofExpr {
                    arg: SizeofArg::Expr(operand),
                    size: None,
                })))
            }
            Some(Token::Punct(Punct::ParenOpen)) => {
                // Cast or parenthesized expression.
                let save = self.pos;
                self.bump();
                if self.starts_type_name() {
                    let target = self.type_name()?;
                    self.expect_punct(Punct::ParenClose)?;
                    let expression = self.unary()?;
                    return Ok(Expr::Cast(Box::new(CastExpr { target, expression })));
                }
                self.pos = save;
                self.postfix()
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::Punct(Punct::SquareOpen)) => {
                    self.bump();
                    let index = self.expression()?;
                    self.expect_punct(Punct::SquareClose)?;
                    expr = Expr::Index(Box::new(IndexExpr {
                        base: expr,
                        index,
                        ty: None,
                    }));
                }
                Some(Token::Punct(Punct::ParenOpen)) => {
                    let name = match &expr {
                        Expr::Identifier(id) => id.name.clone(),
                        _ => return Err(self.error("called object is not a function name")),
                    };
                    self.bump();
                    let mut args = Vec::new();
                    if !self.eat_punct(Punct::ParenClose) {
                        loop {
                            args.push(self.assignment()?);
                            if !self.eat_punct(Punct::Comma) {
                                break;
                            }
                        }
                        self.expect_punct(Punct::ParenClose)?;
                    }
                    expr = Expr::Call(Box::new(CallExpr {
                        name,
                        args,
                        ty: None,
                    }));
                }
                Some(Token::Punct(Punct::Dot)) => {
                    self.bump();
                    let member = self.expect_identifier()?;
                    expr = Expr::Member(Box::new(MemberExpr {
                        operator: MemberOperator::Direct,
                        object: expr,
                        member,
                        ty: None,
                    }));
                }
                Some(Token::Punct(Punct::Arrow)) => {
                    self.bump();
                    let member = self.expect_identifier()?;
                    expr = Expr::Member(Box::new(MemberExpr {
                        operator: MemberOperator::Indirect,
                        object: expr,
                        member,
                        ty: None,
                    }));
                }
                Some(Token::Punct(Punct::PlusPlus)) => {
                    self.bump();
                    expr = unary(UnaryOp::PostIncrement, expr);
                }
                Some(Token::Punct(Punct::MinusMinus)) => {
                    self.bump();
                    expr = unary(UnaryOp::PostDecrement, expr);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        match self.bump() {
            Some(Token::Integer(value)) => Ok(Expr::Number(value)),
            Some(Token::CharLiteral(value)) => Ok(Expr::Character(value)),
            Some(Token::StringLiteral(mut content)) => {
                // Adjacent string literals concatenate.
                while let Some(Token::StringLiteral(next)) = self.peek() {
                    content.push_str(next);
                    self.bump();
                }
                Ok(Expr::StringLiteral(content))
            }
            Some(Token::Identifier(name)) => {
                Ok(Expr::Identifier(Box::new(IdentifierExpr::new(&name))))
            }
            Some(Token::Punct(Punct::ParenOpen)) => {
                let expr = self.expression()?;
                self.expect_punct(Punct::ParenClose)?;
                Ok(expr)
            }
            other => Err(self.error(format!("expected expression, found {:?}", other))),
        }
    }
}

fn unary(op: UnaryOp, operand: Expr) -> Expr {
    Expr::Unary(Box::new(UnaryExpr {
        op,
        operand,
        ty: None,
    }))
}

fn external_from_stmt(stmt: Stmt) -> ExternalDecl {
    match stmt {
        Stmt::Declaration(d) => ExternalDecl::Declaration(d),
        Stmt::Array(d) => ExternalDecl::Array(d),
        Stmt::Struct(d) => ExternalDecl::Struct(d),
        Stmt::Union(d) => ExternalDecl::Union(d),
        Stmt::Enum(d) => ExternalDecl::Enum(d),
        Stmt::Typedef(d) => ExternalDecl::Typedef(d),
        other => panic!("not an external declaration: {:?}", other),
    }
}

fn compose_base_name(words: &[&'static str], unsigned: bool) -> String {
    let stem = if words.contains(&"void") {
        "void"
    } else if words.contains(&"_Bool") {
        "_Bool"
    } else if words.contains(&"float") {
        "float"
    } else if words.contains(&"double") {
        "double"
    } else if words.contains(&"char") {
        "char"
    } else if words.contains(&"short") {
        "short"
    } else if words.contains(&"long") {
        "long"
    } else {
        "int"
    };
    if unsigned {
        format!("unsigned {}", stem)
    } else {
        stem.to_string()
    }
}
