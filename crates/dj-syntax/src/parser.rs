use dj_core::{Modifiers, NodeId, NodeIdGen, Options, PrimitiveType, Span};

use crate::ast::*;
use crate::lexer::{is_reserved, Lexer, Token, TokenKind};
use crate::literals;
use crate::ParseError;

type PResult<T> = Result<T, ParseError>;

/// Parses a whole source file.
///
/// Semicolons are always required in file mode, except that a missing `;` after a `package`
/// or `import` declaration is tolerated when the next token starts another declaration.
pub fn parse_compilation_unit(
    text: &str,
    options: &Options,
    ids: &mut NodeIdGen,
) -> Result<CompilationUnit, ParseError> {
    tracing::trace!(len = text.len(), "parsing compilation unit");
    let tokens = Lexer::new(text).tokenize()?;
    let mut parser = Parser::new(tokens, text.len(), ids, options, false);
    parser.parse_compilation_unit()
}

/// Parses the items of one interactive entry.
///
/// When `options.require_semicolon` is off, the last statement of the entry may omit its
/// `;`. A trailing expression without `;` becomes [`Entry::Expr`] so its value is shown.
pub fn parse_entries(
    text: &str,
    options: &Options,
    ids: &mut NodeIdGen,
) -> Result<Vec<Entry>, ParseError> {
    tracing::trace!(len = text.len(), "parsing interactive entry");
    let tokens = Lexer::new(text).tokenize()?;
    let mut parser = Parser::new(tokens, text.len(), ids, options, true);
    parser.parse_entries()
}

/// Parses a single standalone expression.
pub fn parse_expression(text: &str, ids: &mut NodeIdGen) -> Result<Expr, ParseError> {
    let tokens = Lexer::new(text).tokenize()?;
    let options = Options::default();
    let mut parser = Parser::new(tokens, text.len(), ids, &options, false);
    let expr = parser.parse_expression()?;
    if !parser.is_eof() {
        return Err(parser.error_expected("end of input"));
    }
    Ok(expr)
}

/// Deepest nesting of expressions, statements and types the parser accepts. The checker
/// and the evaluator recurse once per level, so this also bounds their stack use.
pub const MAX_NESTING: usize = 512;

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    text_len: usize,
    ids: &'a mut NodeIdGen,
    options: &'a Options,
    repl: bool,
    /// Set when a statement ended at end of input without its `;`.
    missing_semi: bool,
}

impl<'a> Parser<'a> {
    fn new(
        tokens: Vec<Token>,
        text_len: usize,
        ids: &'a mut NodeIdGen,
        options: &'a Options,
        repl: bool,
    ) -> Self {
        Parser {
            tokens,
            pos: 0,
            depth: 0,
            text_len,
            ids,
            options,
            repl,
            missing_semi: false,
        }
    }

    // ---------------------------------------------------------------------
    // Token cursor
    // ---------------------------------------------------------------------

    fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn kind_at(&self, i: usize) -> Option<TokenKind> {
        self.tokens.get(i).map(|t| t.kind)
    }

    fn at_kind(&self, kind: TokenKind) -> bool {
        self.kind_at(self.pos) == Some(kind)
    }

    fn at_kind_n(&self, n: usize, kind: TokenKind) -> bool {
        self.kind_at(self.pos + n) == Some(kind)
    }

    fn keyword_at(&self, i: usize, keyword: &str) -> bool {
        self.tokens
            .get(i)
            .is_some_and(|t| t.kind == TokenKind::Ident && t.text == keyword)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.keyword_at(self.pos, keyword)
    }

    fn ident_at(&self, i: usize) -> bool {
        self.tokens
            .get(i)
            .is_some_and(|t| t.kind == TokenKind::Ident && !is_reserved(&t.text))
    }

    /// Two tokens with no whitespace between them, used to glue `>` tokens.
    fn adjacent(&self, i: usize) -> bool {
        match (self.tokens.get(i), self.tokens.get(i + 1)) {
            (Some(a), Some(b)) => a.span.end == b.span.start,
            _ => false,
        }
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        self.pos += 1;
        token
    }

    fn eat_kind(&mut self, kind: TokenKind) -> bool {
        if self.at_kind(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn current_start(&self) -> usize {
        self.peek().map_or(self.text_len, |t| t.span.start)
    }

    fn last_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].span.end
        }
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.last_end().max(start))
    }

    fn new_id(&mut self) -> NodeId {
        self.ids.next_id()
    }

    fn error_expected(&self, what: &str) -> ParseError {
        match self.peek() {
            Some(tok) => ParseError::new(format!("Expected {what}, found `{}`", tok.text), tok.span),
            None => ParseError::incomplete(
                format!("Expected {what}, found end of input"),
                Span::new(self.text_len, self.text_len),
            ),
        }
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        match self.peek() {
            Some(tok) => ParseError::new(message, tok.span),
            None => ParseError::incomplete(message, Span::new(self.text_len, self.text_len)),
        }
    }

    /// Enters one more level of nesting. Callers undo it by decrementing `depth`.
    fn descend(&mut self) -> PResult<()> {
        if self.depth >= MAX_NESTING {
            let span = self
                .peek()
                .map_or(Span::new(self.text_len, self.text_len), |tok| tok.span);
            return Err(ParseError::new(
                format!("Nesting deeper than {MAX_NESTING} levels is not supported"),
                span,
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        self.descend()?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn expect_kind(&mut self, kind: TokenKind, what: &str) -> PResult<Token> {
        if self.at_kind(kind) {
            Ok(self.bump())
        } else {
            Err(self.error_expected(what))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> PResult<Token> {
        if self.at_keyword(keyword) {
            Ok(self.bump())
        } else {
            Err(self.error_expected(&format!("`{keyword}`")))
        }
    }

    fn expect_ident(&mut self) -> PResult<Token> {
        if self.ident_at(self.pos) {
            Ok(self.bump())
        } else {
            Err(self.error_expected("identifier"))
        }
    }

    /// Consumes a statement-terminating `;`. Returns `false` when the `;` was omitted at the
    /// very end of an interactive entry, which is allowed unless semicolons are required.
    fn expect_semi(&mut self) -> PResult<bool> {
        if self.eat_kind(TokenKind::Semi) {
            return Ok(true);
        }
        if self.is_eof() && self.repl && !self.options.require_semicolon {
            self.missing_semi = true;
            return Ok(false);
        }
        Err(self.error_expected("`;`"))
    }

    /// `;` after `package`/`import`, tolerated when the next declaration follows directly.
    fn expect_header_semi(&mut self) -> PResult<()> {
        if self.eat_kind(TokenKind::Semi) {
            return Ok(());
        }
        if self.at_declaration_keyword() {
            tracing::debug!("recovered missing `;` after package or import declaration");
            return Ok(());
        }
        self.expect_semi().map(|_| ())
    }

    fn at_declaration_keyword(&self) -> bool {
        let Some(tok) = self.peek() else {
            return false;
        };
        tok.kind == TokenKind::At
            || (tok.kind == TokenKind::Ident
                && (matches!(
                    tok.text.as_str(),
                    "package" | "import" | "class" | "interface" | "enum"
                ) || Modifiers::from_keyword(&tok.text).is_some()))
    }

    // ---------------------------------------------------------------------
    // Top level
    // ---------------------------------------------------------------------

    fn parse_compilation_unit(&mut self) -> PResult<CompilationUnit> {
        let package = if self.at_keyword("package") {
            Some(self.parse_package_decl()?)
        } else {
            None
        };

        let mut imports = Vec::new();
        while self.at_keyword("import") {
            imports.push(self.parse_import_decl()?);
        }

        let mut types = Vec::new();
        while !self.is_eof() {
            if self.eat_kind(TokenKind::Semi) {
                continue;
            }
            if self.at_keyword("package") || self.at_keyword("import") {
                return Err(self.error_here("Package and import declarations must come first"));
            }
            let start = self.current_start();
            let modifiers = self.parse_modifiers()?;
            types.push(self.parse_type_decl(modifiers, start)?);
        }

        Ok(CompilationUnit {
            package,
            imports,
            types,
            span: Span::new(0, self.text_len),
        })
    }

    fn parse_entries(&mut self) -> PResult<Vec<Entry>> {
        let mut entries = Vec::new();
        while !self.is_eof() {
            if self.at_keyword("package") {
                entries.push(Entry::Package(self.parse_package_decl()?));
                continue;
            }
            if self.at_keyword("import") {
                entries.push(Entry::Import(self.parse_import_decl()?));
                continue;
            }

            let save = self.pos;
            let start = self.current_start();
            let modifiers = self.parse_modifiers()?;
            if self.at_keyword("class")
                || self.at_keyword("interface")
                || self.at_keyword("enum")
            {
                entries.push(Entry::Type(self.parse_type_decl(modifiers, start)?));
                continue;
            }
            if self.at_method_header() {
                let method = self.parse_method_or_field_after_modifiers(modifiers, start, None)?;
                match method {
                    Member::Method(method) => entries.push(Entry::Method(method)),
                    Member::Fields(_) | Member::Ctor(_) => {
                        return Err(ParseError::new("Expected method declaration", self.span_from(start)))
                    }
                }
                continue;
            }
            self.pos = save;

            self.missing_semi = false;
            let stmt = self.parse_statement()?;
            match stmt.kind {
                StmtKind::Expr(expr) if self.missing_semi => entries.push(Entry::Expr(expr)),
                _ => entries.push(Entry::Stmt(stmt)),
            }
        }
        Ok(entries)
    }

    /// `[<T>] Type name (` or `void name (` at the cursor.
    fn at_method_header(&self) -> bool {
        if self.at_kind(TokenKind::Lt) {
            return true;
        }
        let after_type = if self.at_keyword("void") {
            Some(self.pos + 1)
        } else {
            self.scan_type(self.pos)
        };
        after_type.is_some_and(|i| self.ident_at(i) && self.kind_at(i + 1) == Some(TokenKind::LParen))
    }

    fn parse_package_decl(&mut self) -> PResult<PackageDecl> {
        let kw = self.expect_keyword("package")?;
        let (name, _) = self.parse_qualified_name()?;
        self.expect_header_semi()?;
        Ok(PackageDecl {
            name,
            span: self.span_from(kw.span.start),
        })
    }

    fn parse_import_decl(&mut self) -> PResult<ImportDecl> {
        let kw = self.expect_keyword("import")?;
        let is_static = self.eat_keyword("static");

        let mut parts = vec![self.expect_ident()?.text];
        let mut is_star = false;
        while self.eat_kind(TokenKind::Dot) {
            if self.eat_kind(TokenKind::Star) {
                is_star = true;
                break;
            }
            parts.push(self.expect_ident()?.text);
        }
        self.expect_header_semi()?;

        Ok(ImportDecl {
            is_static,
            is_star,
            path: parts.join("."),
            span: self.span_from(kw.span.start),
        })
    }

    fn parse_qualified_name(&mut self) -> PResult<(String, Span)> {
        let first = self.expect_ident()?;
        let start = first.span.start;
        let mut parts = vec![first.text];
        while self.at_kind(TokenKind::Dot) && self.ident_at(self.pos + 1) {
            self.bump();
            parts.push(self.bump().text);
        }
        Ok((parts.join("."), self.span_from(start)))
    }

    // ---------------------------------------------------------------------
    // Declarations
    // ---------------------------------------------------------------------

    fn skip_annotation(&mut self) -> PResult<()> {
        self.expect_kind(TokenKind::At, "`@`")?;
        self.parse_qualified_name()?;
        if self.at_kind(TokenKind::LParen) {
            let mut depth = 0usize;
            loop {
                if self.is_eof() {
                    return Err(self.error_expected("`)`"));
                }
                match self.bump().kind {
                    TokenKind::LParen => depth += 1,
                    TokenKind::RParen => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn parse_modifiers(&mut self) -> PResult<Modifiers> {
        let mut modifiers = Modifiers::NONE;
        loop {
            if self.at_kind(TokenKind::At) && !self.keyword_at(self.pos + 1, "interface") {
                self.skip_annotation()?;
                continue;
            }
            let Some(flag) = self
                .peek()
                .filter(|t| t.kind == TokenKind::Ident)
                .and_then(|t| Modifiers::from_keyword(&t.text))
            else {
                break;
            };
            // `default:` inside a switch is never reached here, but `default` followed by
            // anything other than a declaration is not a modifier.
            if flag == Modifiers::DEFAULT && self.at_kind_n(1, TokenKind::Colon) {
                break;
            }
            if modifiers.contains(flag) {
                return Err(self.error_here("Repeated modifier"));
            }
            modifiers.insert(flag);
            self.bump();
        }
        Ok(modifiers)
    }

    fn parse_type_decl(&mut self, mut modifiers: Modifiers, start: usize) -> PResult<TypeDecl> {
        let kind = if self.eat_keyword("class") {
            TypeKind::Class
        } else if self.eat_keyword("interface") {
            modifiers.insert(Modifiers::INTERFACE.union(Modifiers::ABSTRACT));
            TypeKind::Interface
        } else if self.at_keyword("enum") || self.at_kind(TokenKind::At) {
            return Err(self.error_here("Enum and annotation declarations are not supported"));
        } else {
            return Err(self.error_expected("`class` or `interface`"));
        };

        let id = self.new_id();
        let name = self.expect_ident()?;
        let type_params = if self.at_kind(TokenKind::Lt) {
            self.parse_type_params()?
        } else {
            Vec::new()
        };

        let mut extends = Vec::new();
        let mut implements = Vec::new();
        if self.eat_keyword("extends") {
            extends.push(self.parse_type()?);
            if kind == TypeKind::Interface {
                while self.eat_kind(TokenKind::Comma) {
                    extends.push(self.parse_type()?);
                }
            }
        }
        if kind == TypeKind::Class && self.eat_keyword("implements") {
            implements.push(self.parse_type()?);
            while self.eat_kind(TokenKind::Comma) {
                implements.push(self.parse_type()?);
            }
        }

        let members = self.parse_class_body(&name.text, kind)?;
        Ok(TypeDecl {
            id,
            kind,
            modifiers,
            name: name.text,
            name_span: name.span,
            type_params,
            extends,
            implements,
            members,
            span: self.span_from(start),
        })
    }

    fn parse_type_params(&mut self) -> PResult<Vec<TypeParam>> {
        self.expect_kind(TokenKind::Lt, "`<`")?;
        let mut params = Vec::new();
        loop {
            let name = self.expect_ident()?;
            let mut bounds = Vec::new();
            if self.eat_keyword("extends") {
                bounds.push(self.parse_type()?);
                while self.eat_kind(TokenKind::Amp) {
                    bounds.push(self.parse_type()?);
                }
            }
            params.push(TypeParam {
                name: name.text,
                bounds,
                span: self.span_from(name.span.start),
            });
            if !self.eat_kind(TokenKind::Comma) {
                break;
            }
        }
        self.expect_kind(TokenKind::Gt, "`>`")?;
        Ok(params)
    }

    fn parse_class_body(&mut self, class_name: &str, kind: TypeKind) -> PResult<Vec<MemberDecl>> {
        self.expect_kind(TokenKind::LBrace, "`{`")?;
        let in_interface = kind == TypeKind::Interface;
        let mut members = Vec::new();
        loop {
            if self.eat_kind(TokenKind::RBrace) {
                break;
            }
            if self.is_eof() {
                return Err(self.error_expected("`}`"));
            }
            if self.eat_kind(TokenKind::Semi) {
                continue;
            }

            let start = self.current_start();
            if self.at_kind(TokenKind::LBrace)
                || (self.at_keyword("static") && self.at_kind_n(1, TokenKind::LBrace))
            {
                let is_static = self.eat_keyword("static");
                let id = self.new_id();
                let body = self.parse_block()?;
                members.push(MemberDecl::Initializer(InitializerDecl {
                    id,
                    is_static,
                    body,
                    span: self.span_from(start),
                }));
                continue;
            }

            let mut modifiers = self.parse_modifiers()?;
            if self.at_keyword("class") || self.at_keyword("interface") || self.at_keyword("enum") {
                // Member types never capture an outer instance.
                modifiers.insert(Modifiers::STATIC);
                if in_interface {
                    modifiers.insert(Modifiers::PUBLIC);
                }
                members.push(MemberDecl::Type(self.nested(|p| p.parse_type_decl(modifiers, start))?));
                continue;
            }

            match self.parse_method_or_field_after_modifiers(modifiers, start, Some(class_name))? {
                Member::Method(mut method) => {
                    if in_interface {
                        method.modifiers.insert(Modifiers::PUBLIC);
                        if method.body.is_none() && !method.modifiers.is_static() {
                            method.modifiers.insert(Modifiers::ABSTRACT);
                        }
                    }
                    members.push(MemberDecl::Method(method));
                }
                Member::Ctor(ctor) => {
                    if in_interface {
                        return Err(ParseError::new("Interfaces cannot declare constructors", ctor.name_span));
                    }
                    members.push(MemberDecl::Constructor(ctor));
                }
                Member::Fields(fields) => {
                    for mut field in fields {
                        if in_interface {
                            field.modifiers.insert(
                                Modifiers::PUBLIC
                                    .union(Modifiers::STATIC)
                                    .union(Modifiers::FINAL),
                            );
                        }
                        members.push(MemberDecl::Field(field));
                    }
                }
            }
        }
        Ok(members)
    }

    fn parse_method_or_field_after_modifiers(
        &mut self,
        modifiers: Modifiers,
        start: usize,
        class_name: Option<&str>,
    ) -> PResult<Member> {
        let type_params = if self.at_kind(TokenKind::Lt) {
            self.parse_type_params()?
        } else {
            Vec::new()
        };

        if let Some(class_name) = class_name {
            if self.keyword_at(self.pos, class_name) && self.at_kind_n(1, TokenKind::LParen) {
                let id = self.new_id();
                let name = self.bump();
                let params = self.parse_params()?;
                let throws = self.parse_throws()?;
                let body = self.parse_block()?;
                return Ok(Member::Ctor(ConstructorDecl {
                    id,
                    modifiers,
                    name: name.text,
                    name_span: name.span,
                    params,
                    throws,
                    body,
                    span: self.span_from(start),
                }));
            }
        }

        let return_ty = if self.at_keyword("void") {
            let tok = self.bump();
            TypeRef {
                kind: TypeRefKind::Void,
                span: tok.span,
            }
        } else {
            self.parse_type()?
        };

        let name = self.expect_ident()?;
        if self.at_kind(TokenKind::LParen) {
            let id = self.new_id();
            let params = self.parse_params()?;
            let dims = self.parse_dims();
            let return_ty = if dims > 0 {
                let span = return_ty.span;
                return_ty.array_of(dims, span)
            } else {
                return_ty
            };
            let throws = self.parse_throws()?;
            let body = if self.eat_kind(TokenKind::Semi) {
                None
            } else {
                Some(self.parse_block()?)
            };
            let mut modifiers = modifiers;
            if params.last().is_some_and(|p| p.var_args) {
                modifiers.insert(Modifiers::VARARGS);
            }
            return Ok(Member::Method(MethodDecl {
                id,
                modifiers,
                type_params,
                return_ty,
                name: name.text,
                name_span: name.span,
                params,
                throws,
                body,
                span: self.span_from(start),
            }));
        }

        if return_ty.is_void() {
            return Err(ParseError::new("Fields cannot have type `void`", return_ty.span));
        }
        if !type_params.is_empty() {
            return Err(ParseError::new("Fields cannot declare type parameters", name.span));
        }

        let mut fields = Vec::new();
        let mut name = name;
        loop {
            let id = self.new_id();
            let dims = self.parse_dims();
            let ty = return_ty.clone().array_of(dims, return_ty.span);
            let init = if self.eat_kind(TokenKind::Eq) {
                Some(self.parse_var_init()?)
            } else {
                None
            };
            fields.push(FieldDecl {
                id,
                modifiers,
                ty,
                name: name.text,
                name_span: name.span,
                init,
                span: self.span_from(start),
            });
            if !self.eat_kind(TokenKind::Comma) {
                break;
            }
            name = self.expect_ident()?;
        }
        self.expect_kind(TokenKind::Semi, "`;`")?;
        Ok(Member::Fields(fields))
    }

    fn parse_params(&mut self) -> PResult<Vec<Param>> {
        self.expect_kind(TokenKind::LParen, "`(`")?;
        let mut params: Vec<Param> = Vec::new();
        if !self.at_kind(TokenKind::RParen) {
            loop {
                let start = self.current_start();
                let modifiers = self.parse_modifiers()?;
                if modifiers.0 & !Modifiers::FINAL.0 != 0 {
                    return Err(ParseError::new(
                        "Only `final` is allowed on a parameter",
                        self.span_from(start),
                    ));
                }
                let ty = self.parse_type()?;
                let var_args = self.eat_kind(TokenKind::Ellipsis);
                let name = self.expect_ident()?;
                let dims = self.parse_dims() + usize::from(var_args);
                let span = self.span_from(start);
                let ty = ty.array_of(dims, span);
                params.push(Param {
                    id: self.new_id(),
                    is_final: modifiers.is_final(),
                    ty,
                    var_args,
                    name: name.text,
                    name_span: name.span,
                    span,
                });
                if !self.eat_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect_kind(TokenKind::RParen, "`)`")?;

        let var_args: Vec<&Param> = params.iter().filter(|p| p.var_args).collect();
        if var_args.len() > 1 {
            return Err(ParseError::new(
                "Only one variable-arity parameter is allowed",
                var_args[1].span,
            ));
        }
        if let Some(pos) = params.iter().position(|p| p.var_args) {
            if pos + 1 != params.len() {
                return Err(ParseError::new(
                    "A variable-arity parameter must be the last parameter",
                    params[pos].span,
                ));
            }
        }
        Ok(params)
    }

    fn parse_throws(&mut self) -> PResult<Vec<TypeRef>> {
        let mut throws = Vec::new();
        if self.eat_keyword("throws") {
            throws.push(self.parse_type()?);
            while self.eat_kind(TokenKind::Comma) {
                throws.push(self.parse_type()?);
            }
        }
        Ok(throws)
    }

    fn parse_dims(&mut self) -> usize {
        let mut dims = 0;
        while self.at_kind(TokenKind::LBracket) && self.at_kind_n(1, TokenKind::RBracket) {
            self.pos += 2;
            dims += 1;
        }
        dims
    }

    // ---------------------------------------------------------------------
    // Types
    // ---------------------------------------------------------------------

    fn parse_type(&mut self) -> PResult<TypeRef> {
        self.nested(Self::parse_type_at)
    }

    fn parse_type_at(&mut self) -> PResult<TypeRef> {
        let start = self.current_start();
        let base = self.parse_non_array_type()?;
        let dims = self.parse_dims();
        let span = self.span_from(start);
        Ok(base.array_of(dims, span))
    }

    fn parse_non_array_type(&mut self) -> PResult<TypeRef> {
        let Some(tok) = self.peek().filter(|t| t.kind == TokenKind::Ident) else {
            return Err(self.error_expected("type"));
        };
        if let Some(prim) = PrimitiveType::from_keyword(&tok.text) {
            let span = tok.span;
            self.bump();
            return Ok(TypeRef {
                kind: TypeRefKind::Primitive(prim),
                span,
            });
        }

        let first = self.expect_ident()?;
        let start = first.span.start;
        let mut parts = vec![first.text];
        let mut args = Vec::new();
        loop {
            if self.at_kind(TokenKind::Lt) {
                args = self.parse_type_args()?;
            }
            if self.at_kind(TokenKind::Dot) && self.ident_at(self.pos + 1) {
                self.bump();
                parts.push(self.bump().text);
                // Arguments of an outer segment do not apply to the member type.
                args.clear();
                continue;
            }
            break;
        }
        Ok(TypeRef {
            kind: TypeRefKind::Named {
                name: parts.join("."),
                args,
            },
            span: self.span_from(start),
        })
    }

    /// `<...>`; the diamond `<>` yields an empty list.
    fn parse_type_args(&mut self) -> PResult<Vec<TypeArg>> {
        self.expect_kind(TokenKind::Lt, "`<`")?;
        let mut args = Vec::new();
        if self.eat_kind(TokenKind::Gt) {
            return Ok(args);
        }
        loop {
            if self.at_kind(TokenKind::Question) {
                let start = self.bump().span.start;
                let bound = if self.eat_keyword("extends") {
                    Some((WildcardKind::Extends, self.parse_type()?))
                } else if self.eat_keyword("super") {
                    Some((WildcardKind::Super, self.parse_type()?))
                } else {
                    None
                };
                args.push(TypeArg::Wildcard {
                    bound,
                    span: self.span_from(start),
                });
            } else {
                let ty = self.parse_type()?;
                if matches!(ty.kind, TypeRefKind::Primitive(_)) {
                    return Err(ParseError::new("Type arguments must be reference types", ty.span));
                }
                args.push(TypeArg::Type(ty));
            }
            if !self.eat_kind(TokenKind::Comma) {
                break;
            }
        }
        self.expect_kind(TokenKind::Gt, "`>`")?;
        Ok(args)
    }

    /// Lookahead: the index just past a syntactically valid type starting at `i`.
    fn scan_type(&self, i: usize) -> Option<usize> {
        self.scan_type_at(i, 0)
    }

    fn scan_type_at(&self, mut i: usize, depth: usize) -> Option<usize> {
        if depth > MAX_NESTING {
            return None;
        }
        let tok = self.tokens.get(i)?;
        if tok.kind != TokenKind::Ident {
            return None;
        }
        if PrimitiveType::from_keyword(&tok.text).is_some() {
            i += 1;
        } else if is_reserved(&tok.text) {
            return None;
        } else {
            i += 1;
            loop {
                if self.kind_at(i) == Some(TokenKind::Lt) {
                    i = self.scan_type_args(i, depth)?;
                }
                if self.kind_at(i) == Some(TokenKind::Dot) && self.ident_at(i + 1) {
                    i += 2;
                    continue;
                }
                break;
            }
        }
        while self.kind_at(i) == Some(TokenKind::LBracket)
            && self.kind_at(i + 1) == Some(TokenKind::RBracket)
        {
            i += 2;
        }
        Some(i)
    }

    fn scan_type_args(&self, i: usize, depth: usize) -> Option<usize> {
        let mut i = i + 1;
        if self.kind_at(i) == Some(TokenKind::Gt) {
            return Some(i + 1);
        }
        loop {
            if self.kind_at(i) == Some(TokenKind::Question) {
                i += 1;
                if self.keyword_at(i, "extends") || self.keyword_at(i, "super") {
                    i = self.scan_type_at(i + 1, depth + 1)?;
                }
            } else {
                i = self.scan_type_at(i, depth + 1)?;
            }
            match self.kind_at(i) {
                Some(TokenKind::Comma) => i += 1,
                Some(TokenKind::Gt) => return Some(i + 1),
                _ => return None,
            }
        }
    }

    // ---------------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------------

    fn parse_block(&mut self) -> PResult<Block> {
        let start = self.expect_kind(TokenKind::LBrace, "`{`")?.span.start;
        let id = self.new_id();
        let mut stmts = Vec::new();
        loop {
            if self.eat_kind(TokenKind::RBrace) {
                break;
            }
            if self.is_eof() {
                return Err(self.error_expected("`}`"));
            }
            stmts.push(self.parse_statement()?);
        }
        Ok(Block {
            id,
            stmts,
            span: self.span_from(start),
        })
    }

    fn stmt(&mut self, kind: StmtKind, start: usize) -> Stmt {
        Stmt {
            id: self.new_id(),
            kind,
            span: self.span_from(start),
        }
    }

    fn parse_statement(&mut self) -> PResult<Stmt> {
        self.nested(Self::parse_statement_at)
    }

    fn parse_statement_at(&mut self) -> PResult<Stmt> {
        let start = self.current_start();
        let Some(tok) = self.peek() else {
            return Err(self.error_expected("statement"));
        };

        match tok.kind {
            TokenKind::LBrace => {
                let block = self.parse_block()?;
                return Ok(self.stmt(StmtKind::Block(block), start));
            }
            TokenKind::Semi => {
                self.bump();
                return Ok(self.stmt(StmtKind::Empty, start));
            }
            TokenKind::Ident => {}
            _ => return self.parse_expression_statement(start),
        }

        let keyword = tok.text.clone();
        match keyword.as_str() {
            "if" => {
                self.bump();
                let cond = self.parse_paren_expr()?;
                let then_branch = Box::new(self.parse_statement()?);
                let else_branch = if self.eat_keyword("else") {
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(self.stmt(
                    StmtKind::If {
                        cond,
                        then_branch,
                        else_branch,
                    },
                    start,
                ))
            }
            "while" => {
                self.bump();
                let cond = self.parse_paren_expr()?;
                let body = Box::new(self.parse_statement()?);
                Ok(self.stmt(StmtKind::While { cond, body }, start))
            }
            "do" => {
                self.bump();
                let body = Box::new(self.parse_statement()?);
                self.expect_keyword("while")?;
                let cond = self.parse_paren_expr()?;
                self.expect_semi()?;
                Ok(self.stmt(StmtKind::DoWhile { body, cond }, start))
            }
            "for" => self.parse_for(start),
            "return" => {
                self.bump();
                let value = if self.at_kind(TokenKind::Semi) || self.is_eof() {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.expect_semi()?;
                Ok(self.stmt(StmtKind::Return(value), start))
            }
            "break" | "continue" => {
                self.bump();
                let label = if self.ident_at(self.pos) {
                    Some(self.bump().text)
                } else {
                    None
                };
                self.expect_semi()?;
                let kind = if keyword == "break" {
                    StmtKind::Break(label)
                } else {
                    StmtKind::Continue(label)
                };
                Ok(self.stmt(kind, start))
            }
            "throw" => {
                self.bump();
                let value = self.parse_expression()?;
                self.expect_semi()?;
                Ok(self.stmt(StmtKind::Throw(value), start))
            }
            "try" => self.parse_try(start),
            "switch" => self.parse_switch(start),
            "this" | "super" if self.at_kind_n(1, TokenKind::LParen) => {
                self.bump();
                let args = self.parse_args()?;
                self.expect_semi()?;
                Ok(self.stmt(
                    StmtKind::ConstructorCall {
                        is_super: keyword == "super",
                        args,
                    },
                    start,
                ))
            }
            "final" => {
                self.bump();
                let modifiers = self.parse_modifiers()?;
                if modifiers != Modifiers::NONE {
                    return Err(ParseError::new(
                        "Only `final` is allowed on a local variable",
                        self.span_from(start),
                    ));
                }
                let kind = self.parse_local_var_rest(true)?;
                self.expect_semi()?;
                Ok(self.stmt(kind, start))
            }
            "class" | "interface" | "enum" | "abstract" => {
                Err(self.error_here("Local type declarations are not supported"))
            }
            "synchronized" | "assert" => {
                Err(self.error_here(format!("`{keyword}` statements are not supported")))
            }
            "else" | "case" | "default" | "catch" | "finally" => {
                Err(self.error_here(format!("Unexpected `{keyword}`")))
            }
            _ if self.ident_at(self.pos) && self.at_kind_n(1, TokenKind::Colon) => {
                let label = self.bump().text;
                self.bump();
                let body = Box::new(self.parse_statement()?);
                Ok(self.stmt(StmtKind::Labeled { label, body }, start))
            }
            _ if self.at_local_var_decl() => {
                let kind = self.parse_local_var_rest(false)?;
                self.expect_semi()?;
                Ok(self.stmt(kind, start))
            }
            _ => self.parse_expression_statement(start),
        }
    }

    fn parse_expression_statement(&mut self, start: usize) -> PResult<Stmt> {
        let expr = self.parse_expression()?;
        self.expect_semi()?;
        Ok(self.stmt(StmtKind::Expr(expr), start))
    }

    fn parse_paren_expr(&mut self) -> PResult<Expr> {
        self.expect_kind(TokenKind::LParen, "`(`")?;
        let expr = self.parse_expression()?;
        self.expect_kind(TokenKind::RParen, "`)`")?;
        Ok(expr)
    }

    fn at_local_var_decl(&self) -> bool {
        self.scan_type(self.pos).is_some_and(|i| self.ident_at(i))
    }

    /// `Type a = 1, b[] = {}` after any `final`.
    fn parse_local_var_rest(&mut self, is_final: bool) -> PResult<StmtKind> {
        let ty = self.parse_type()?;
        let mut declarators = Vec::new();
        loop {
            let name = self.expect_ident()?;
            let dims = self.parse_dims();
            let var_ty = ty.clone().array_of(dims, ty.span);
            let init = if self.eat_kind(TokenKind::Eq) {
                Some(self.parse_var_init()?)
            } else {
                None
            };
            declarators.push(VarDeclarator {
                id: self.new_id(),
                ty: var_ty,
                name: name.text,
                name_span: name.span,
                init,
            });
            if !self.eat_kind(TokenKind::Comma) {
                break;
            }
        }
        Ok(StmtKind::LocalVar {
            is_final,
            declarators,
        })
    }

    fn parse_var_init(&mut self) -> PResult<Expr> {
        if self.at_kind(TokenKind::LBrace) {
            self.nested(Self::parse_array_init)
        } else {
            self.parse_expression()
        }
    }

    fn parse_for(&mut self, start: usize) -> PResult<Stmt> {
        self.expect_keyword("for")?;
        self.expect_kind(TokenKind::LParen, "`(`")?;

        let header_start = self.current_start();
        let modifiers = self.parse_modifiers()?;
        let has_modifiers = modifiers != Modifiers::NONE;
        if has_modifiers || self.at_local_var_decl() {
            if modifiers.0 & !Modifiers::FINAL.0 != 0 {
                return Err(ParseError::new(
                    "Only `final` is allowed on a loop variable",
                    self.span_from(header_start),
                ));
            }
            let is_final = modifiers.is_final();
            let after_type = self.scan_type(self.pos);
            let is_foreach = after_type.is_some_and(|i| {
                self.ident_at(i) && {
                    let mut j = i + 1;
                    while self.kind_at(j) == Some(TokenKind::LBracket)
                        && self.kind_at(j + 1) == Some(TokenKind::RBracket)
                    {
                        j += 2;
                    }
                    self.kind_at(j) == Some(TokenKind::Colon)
                }
            });

            if is_foreach {
                let ty = self.parse_type()?;
                let name = self.expect_ident()?;
                let dims = self.parse_dims();
                let ty = ty.clone().array_of(dims, ty.span);
                self.expect_kind(TokenKind::Colon, "`:`")?;
                let iterable = self.parse_expression()?;
                self.expect_kind(TokenKind::RParen, "`)`")?;
                let var = VarDeclarator {
                    id: self.new_id(),
                    ty,
                    name: name.text,
                    name_span: name.span,
                    init: None,
                };
                let body = Box::new(self.parse_statement()?);
                return Ok(self.stmt(
                    StmtKind::ForEach {
                        is_final,
                        var,
                        iterable,
                        body,
                    },
                    start,
                ));
            }

            let kind = self.parse_local_var_rest(is_final)?;
            let init = vec![self.stmt(kind, header_start)];
            return self.parse_for_rest(init, start);
        }

        let mut init = Vec::new();
        if !self.at_kind(TokenKind::Semi) {
            loop {
                let expr_start = self.current_start();
                let expr = self.parse_expression()?;
                init.push(self.stmt(StmtKind::Expr(expr), expr_start));
                if !self.eat_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.parse_for_rest(init, start)
    }

    fn parse_for_rest(&mut self, init: Vec<Stmt>, start: usize) -> PResult<Stmt> {
        self.expect_kind(TokenKind::Semi, "`;`")?;
        let cond = if self.at_kind(TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_kind(TokenKind::Semi, "`;`")?;
        let mut update = Vec::new();
        if !self.at_kind(TokenKind::RParen) {
            loop {
                update.push(self.parse_expression()?);
                if !self.eat_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect_kind(TokenKind::RParen, "`)`")?;
        let body = Box::new(self.parse_statement()?);
        Ok(self.stmt(
            StmtKind::For {
                init,
                cond,
                update,
                body,
            },
            start,
        ))
    }

    fn parse_try(&mut self, start: usize) -> PResult<Stmt> {
        self.expect_keyword("try")?;
        if self.at_kind(TokenKind::LParen) {
            return Err(self.error_here("try-with-resources is not supported"));
        }
        let body = self.parse_block()?;
        let mut catches = Vec::new();
        while self.at_keyword("catch") {
            let catch_start = self.bump().span.start;
            self.expect_kind(TokenKind::LParen, "`(`")?;
            let modifiers = self.parse_modifiers()?;
            if modifiers.0 & !Modifiers::FINAL.0 != 0 {
                return Err(ParseError::new(
                    "Only `final` is allowed on a catch parameter",
                    self.span_from(catch_start),
                ));
            }
            let mut types = vec![self.parse_type()?];
            while self.eat_kind(TokenKind::Pipe) {
                types.push(self.parse_type()?);
            }
            let name = self.expect_ident()?;
            self.expect_kind(TokenKind::RParen, "`)`")?;
            let id = self.new_id();
            let body = self.parse_block()?;
            catches.push(CatchClause {
                id,
                types,
                name: name.text,
                name_span: name.span,
                body,
                span: self.span_from(catch_start),
            });
        }
        let finally = if self.eat_keyword("finally") {
            Some(self.parse_block()?)
        } else {
            None
        };
        if catches.is_empty() && finally.is_none() {
            return Err(self.error_expected("`catch` or `finally`"));
        }
        Ok(self.stmt(
            StmtKind::Try {
                body,
                catches,
                finally,
            },
            start,
        ))
    }

    fn parse_switch(&mut self, start: usize) -> PResult<Stmt> {
        self.expect_keyword("switch")?;
        let selector = self.parse_paren_expr()?;
        self.expect_kind(TokenKind::LBrace, "`{`")?;
        let mut cases = Vec::new();
        loop {
            if self.eat_kind(TokenKind::RBrace) {
                break;
            }
            let case_start = self.current_start();
            let mut labels = Vec::new();
            let is_default = if self.eat_keyword("default") {
                true
            } else if self.eat_keyword("case") {
                labels.push(self.parse_conditional()?);
                while self.eat_kind(TokenKind::Comma) {
                    labels.push(self.parse_conditional()?);
                }
                false
            } else {
                return Err(self.error_expected("`case`, `default` or `}`"));
            };
            if self.at_kind(TokenKind::Arrow) {
                return Err(self.error_here("Arrow-form switch labels are not supported"));
            }
            self.expect_kind(TokenKind::Colon, "`:`")?;

            let mut body = Vec::new();
            while !self.at_keyword("case") && !self.at_keyword("default") && !self.at_kind(TokenKind::RBrace) {
                if self.is_eof() {
                    return Err(self.error_expected("`}`"));
                }
                body.push(self.parse_statement()?);
            }
            cases.push(SwitchCase {
                labels,
                is_default,
                body,
                span: self.span_from(case_start),
            });
        }
        Ok(self.stmt(StmtKind::Switch { selector, cases }, start))
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    fn expr(&mut self, kind: ExprKind, start: usize) -> Expr {
        Expr {
            id: self.new_id(),
            kind,
            span: self.span_from(start),
        }
    }

    fn parse_expression(&mut self) -> PResult<Expr> {
        self.nested(Self::parse_assignment)
    }

    fn parse_assignment(&mut self) -> PResult<Expr> {
        let start = self.current_start();
        let target = self.parse_conditional()?;
        let Some((op, len)) = self.peek_assign_op() else {
            return Ok(target);
        };
        if !matches!(
            target.kind,
            ExprKind::Name(_) | ExprKind::FieldAccess { .. } | ExprKind::ArrayAccess { .. }
        ) {
            return Err(ParseError::new("Invalid assignment target", target.span));
        }
        self.pos += len;
        let value = self.nested(Self::parse_assignment)?;
        Ok(self.expr(
            ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            start,
        ))
    }

    /// The assignment operator at the cursor and how many tokens it spans.
    fn peek_assign_op(&self) -> Option<(Option<BinaryOp>, usize)> {
        use TokenKind as K;
        let kind = self.kind_at(self.pos)?;
        let simple = match kind {
            K::Eq => Some(None),
            K::PlusEq => Some(Some(BinaryOp::Add)),
            K::MinusEq => Some(Some(BinaryOp::Sub)),
            K::StarEq => Some(Some(BinaryOp::Mul)),
            K::SlashEq => Some(Some(BinaryOp::Div)),
            K::PercentEq => Some(Some(BinaryOp::Rem)),
            K::AmpEq => Some(Some(BinaryOp::BitAnd)),
            K::PipeEq => Some(Some(BinaryOp::BitOr)),
            K::CaretEq => Some(Some(BinaryOp::BitXor)),
            K::ShlEq => Some(Some(BinaryOp::Shl)),
            _ => None,
        };
        if let Some(op) = simple {
            return Some((op, 1));
        }
        if kind != K::Gt || !self.at_kind_n(1, K::Gt) || !self.adjacent(self.pos) {
            return None;
        }
        if self.at_kind_n(2, K::Eq) && self.adjacent(self.pos + 1) {
            return Some((Some(BinaryOp::Shr), 3));
        }
        if self.at_kind_n(2, K::Gt)
            && self.at_kind_n(3, K::Eq)
            && self.adjacent(self.pos + 1)
            && self.adjacent(self.pos + 2)
        {
            return Some((Some(BinaryOp::UShr), 4));
        }
        None
    }

    fn parse_conditional(&mut self) -> PResult<Expr> {
        let start = self.current_start();
        let cond = self.parse_binary(1)?;
        if !self.eat_kind(TokenKind::Question) {
            return Ok(cond);
        }
        let then_expr = self.parse_expression()?;
        self.expect_kind(TokenKind::Colon, "`:`")?;
        let else_expr = self.nested(Self::parse_conditional)?;
        Ok(self.expr(
            ExprKind::Conditional {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            start,
        ))
    }

    /// The binary operator at the cursor and how many tokens it spans. Compound shift
    /// assignments are left for [`Self::peek_assign_op`].
    fn peek_binary_op(&self) -> Option<(BinaryOp, usize)> {
        use TokenKind as K;
        let op = match self.kind_at(self.pos)? {
            K::PipePipe => BinaryOp::Or,
            K::AmpAmp => BinaryOp::And,
            K::Pipe => BinaryOp::BitOr,
            K::Caret => BinaryOp::BitXor,
            K::Amp => BinaryOp::BitAnd,
            K::EqEq => BinaryOp::Eq,
            K::BangEq => BinaryOp::Ne,
            K::Lt => BinaryOp::Lt,
            K::LtEq => BinaryOp::Le,
            K::Shl => BinaryOp::Shl,
            K::Plus => BinaryOp::Add,
            K::Minus => BinaryOp::Sub,
            K::Star => BinaryOp::Mul,
            K::Slash => BinaryOp::Div,
            K::Percent => BinaryOp::Rem,
            K::Gt => {
                let glued = |n: usize, kind: K| {
                    self.at_kind_n(n, kind) && self.adjacent(self.pos + n - 1)
                };
                if glued(1, K::Gt) {
                    if glued(2, K::Gt) {
                        if glued(3, K::Eq) {
                            return None;
                        }
                        return Some((BinaryOp::UShr, 3));
                    }
                    if glued(2, K::Eq) {
                        return None;
                    }
                    return Some((BinaryOp::Shr, 2));
                }
                if glued(1, K::Eq) {
                    return Some((BinaryOp::Ge, 2));
                }
                BinaryOp::Gt
            }
            _ => return None,
        };
        Some((op, 1))
    }

    fn parse_binary(&mut self, min_prec: u8) -> PResult<Expr> {
        let start = self.current_start();
        let mut lhs = self.parse_unary()?;
        // Left-associative chains nest without recursing here.
        let mut chain = 0;
        loop {
            if self.at_keyword("instanceof") && BinaryOp::Lt.precedence() >= min_prec {
                self.descend()?;
                chain += 1;
                self.bump();
                let ty = self.parse_type()?;
                lhs = self.expr(
                    ExprKind::InstanceOf {
                        expr: Box::new(lhs),
                        ty,
                    },
                    start,
                );
                continue;
            }
            let Some((op, len)) = self.peek_binary_op() else {
                break;
            };
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.descend()?;
            chain += 1;
            self.pos += len;
            let rhs = self.parse_binary(prec + 1)?;
            lhs = self.expr(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                start,
            );
        }
        self.depth -= chain;
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let start = self.current_start();
        let op = match self.kind_at(self.pos) {
            Some(TokenKind::Plus) => UnaryOp::Plus,
            Some(TokenKind::Minus) => {
                if let Some(expr) = self.try_negative_literal(start)? {
                    return Ok(expr);
                }
                UnaryOp::Minus
            }
            Some(TokenKind::PlusPlus) => UnaryOp::PreInc,
            Some(TokenKind::MinusMinus) => UnaryOp::PreDec,
            Some(TokenKind::Bang) => UnaryOp::Not,
            Some(TokenKind::Tilde) => UnaryOp::BitNot,
            Some(TokenKind::LParen) => {
                if let Some(cast) = self.try_parse_cast(start)? {
                    return Ok(cast);
                }
                return self.parse_postfix();
            }
            _ => return self.parse_postfix(),
        };
        self.bump();
        let operand = self.nested(Self::parse_unary)?;
        Ok(self.expr(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            start,
        ))
    }

    /// `-2147483648` and `-9223372036854775808L` are only representable with the sign folded
    /// into the literal.
    fn try_negative_literal(&mut self, start: usize) -> PResult<Option<Expr>> {
        let Some(tok) = self.tokens.get(self.pos + 1) else {
            return Ok(None);
        };
        if !literals::is_decimal_literal(&tok.text) {
            return Ok(None);
        }
        let literal = match tok.kind {
            TokenKind::IntLiteral => Literal::Int(
                literals::parse_negated_int_literal(&tok.text)
                    .map_err(|e| ParseError::number_format(e.message, tok.span))?,
            ),
            TokenKind::LongLiteral => Literal::Long(
                literals::parse_negated_long_literal(&tok.text)
                    .map_err(|e| ParseError::number_format(e.message, tok.span))?,
            ),
            _ => return Ok(None),
        };
        self.pos += 2;
        Ok(Some(self.expr(ExprKind::Literal(literal), start)))
    }

    fn try_parse_cast(&mut self, start: usize) -> PResult<Option<Expr>> {
        let type_start = self.pos + 1;
        let Some(after) = self.scan_type(type_start) else {
            return Ok(None);
        };
        if self.kind_at(after) != Some(TokenKind::RParen) {
            return Ok(None);
        }
        let primitive = self
            .tokens
            .get(type_start)
            .is_some_and(|t| PrimitiveType::from_keyword(&t.text).is_some())
            && after == type_start + 1;
        if !primitive && !self.starts_cast_operand(after + 1) {
            return Ok(None);
        }

        self.bump();
        let ty = self.parse_type()?;
        self.expect_kind(TokenKind::RParen, "`)`")?;
        let operand = self.nested(Self::parse_unary)?;
        Ok(Some(self.expr(
            ExprKind::Cast {
                ty,
                expr: Box::new(operand),
            },
            start,
        )))
    }

    /// Whether a reference-type cast `(T)` may be followed by the token at `i`.
    fn starts_cast_operand(&self, i: usize) -> bool {
        let Some(tok) = self.tokens.get(i) else {
            return false;
        };
        match tok.kind {
            TokenKind::Ident => {
                !is_reserved(&tok.text)
                    || matches!(
                        tok.text.as_str(),
                        "this" | "super" | "new" | "true" | "false" | "null"
                    )
            }
            TokenKind::IntLiteral
            | TokenKind::LongLiteral
            | TokenKind::FloatLiteral
            | TokenKind::DoubleLiteral
            | TokenKind::CharLiteral
            | TokenKind::StringLiteral
            | TokenKind::LParen
            | TokenKind::Bang
            | TokenKind::Tilde => true,
            _ => false,
        }
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let start = self.current_start();
        let mut expr = self.parse_primary()?;
        let mut chain = 0;
        loop {
            if matches!(
                self.kind_at(self.pos),
                Some(TokenKind::Dot | TokenKind::LBracket | TokenKind::PlusPlus | TokenKind::MinusMinus)
            ) {
                self.descend()?;
                chain += 1;
            }
            if self.eat_kind(TokenKind::Dot) {
                if self.at_keyword("new") || self.at_keyword("this") || self.at_keyword("class") {
                    return Err(self.error_here(
                        "Qualified `new`, qualified `this` and class literals are not supported",
                    ));
                }
                if self.at_kind(TokenKind::Lt) {
                    return Err(self.error_here("Explicit method type arguments are not supported"));
                }
                let name = self.expect_ident()?;
                if self.at_kind(TokenKind::LParen) {
                    let args = self.parse_args()?;
                    expr = self.expr(
                        ExprKind::MethodCall {
                            receiver: Some(Box::new(expr)),
                            name: name.text,
                            name_span: name.span,
                            args,
                        },
                        start,
                    );
                } else {
                    expr = self.expr(
                        ExprKind::FieldAccess {
                            receiver: Box::new(expr),
                            name: name.text,
                            name_span: name.span,
                        },
                        start,
                    );
                }
                continue;
            }
            if self.eat_kind(TokenKind::LBracket) {
                let index = self.parse_expression()?;
                self.expect_kind(TokenKind::RBracket, "`]`")?;
                expr = self.expr(
                    ExprKind::ArrayAccess {
                        array: Box::new(expr),
                        index: Box::new(index),
                    },
                    start,
                );
                continue;
            }
            let op = if self.at_kind(TokenKind::PlusPlus) {
                UnaryOp::PostInc
            } else if self.at_kind(TokenKind::MinusMinus) {
                UnaryOp::PostDec
            } else {
                break;
            };
            self.bump();
            expr = self.expr(
                ExprKind::Unary {
                    op,
                    operand: Box::new(expr),
                },
                start,
            );
        }
        self.depth -= chain;
        if matches!(expr.kind, ExprKind::Super) {
            return Err(ParseError::new("`super` must be followed by a member access", expr.span));
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> PResult<Vec<Expr>> {
        self.expect_kind(TokenKind::LParen, "`(`")?;
        let mut args = Vec::new();
        if !self.at_kind(TokenKind::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.eat_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect_kind(TokenKind::RParen, "`)`")?;
        Ok(args)
    }

    fn parse_literal(&self, tok: &Token) -> PResult<Literal> {
        let number = |e: literals::LiteralError| ParseError::number_format(e.message, tok.span);
        let other = |e: literals::LiteralError| ParseError::new(e.message, tok.span);
        Ok(match tok.kind {
            TokenKind::IntLiteral => Literal::Int(literals::parse_int_literal(&tok.text).map_err(number)?),
            TokenKind::LongLiteral => {
                Literal::Long(literals::parse_long_literal(&tok.text).map_err(number)?)
            }
            TokenKind::FloatLiteral => {
                Literal::Float(literals::parse_float_literal(&tok.text).map_err(number)?)
            }
            TokenKind::DoubleLiteral => {
                Literal::Double(literals::parse_double_literal(&tok.text).map_err(number)?)
            }
            TokenKind::CharLiteral => {
                Literal::Char(literals::unescape_char_literal(&tok.text).map_err(other)?)
            }
            TokenKind::StringLiteral => {
                Literal::String(literals::unescape_string_literal(&tok.text).map_err(other)?)
            }
            _ => return Err(ParseError::new("Expected literal", tok.span)),
        })
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let start = self.current_start();
        let Some(tok) = self.peek().cloned() else {
            return Err(self.error_expected("expression"));
        };

        match tok.kind {
            TokenKind::IntLiteral
            | TokenKind::LongLiteral
            | TokenKind::FloatLiteral
            | TokenKind::DoubleLiteral
            | TokenKind::CharLiteral
            | TokenKind::StringLiteral => {
                let literal = self.parse_literal(&tok)?;
                self.bump();
                Ok(self.expr(ExprKind::Literal(literal), start))
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expression()?;
                self.expect_kind(TokenKind::RParen, "`)`")?;
                Ok(inner)
            }
            TokenKind::Ident => match tok.text.as_str() {
                "true" | "false" => {
                    self.bump();
                    Ok(self.expr(ExprKind::Literal(Literal::Boolean(tok.text == "true")), start))
                }
                "null" => {
                    self.bump();
                    Ok(self.expr(ExprKind::Literal(Literal::Null), start))
                }
                "this" => {
                    self.bump();
                    Ok(self.expr(ExprKind::This, start))
                }
                "super" => {
                    self.bump();
                    if !self.at_kind(TokenKind::Dot) {
                        return Err(ParseError::new("`super` must be followed by a member access", tok.span));
                    }
                    Ok(self.expr(ExprKind::Super, start))
                }
                "new" => self.parse_new(start),
                _ if self.ident_at(self.pos) => {
                    self.bump();
                    if self.at_kind(TokenKind::LParen) {
                        let args = self.parse_args()?;
                        Ok(self.expr(
                            ExprKind::MethodCall {
                                receiver: None,
                                name: tok.text,
                                name_span: tok.span,
                                args,
                            },
                            start,
                        ))
                    } else {
                        Ok(self.expr(ExprKind::Name(tok.text), start))
                    }
                }
                _ => Err(self.error_expected("expression")),
            },
            TokenKind::Arrow | TokenKind::ColonColon => {
                Err(self.error_here("Lambda expressions and method references are not supported"))
            }
            _ => Err(self.error_expected("expression")),
        }
    }

    fn parse_new(&mut self, start: usize) -> PResult<Expr> {
        self.expect_keyword("new")?;
        let ty = self.parse_non_array_type()?;

        if self.at_kind(TokenKind::LBracket) {
            let mut dims = Vec::new();
            let mut extra_dims = 0;
            while self.at_kind(TokenKind::LBracket) {
                if self.at_kind_n(1, TokenKind::RBracket) {
                    self.pos += 2;
                    extra_dims += 1;
                    continue;
                }
                if extra_dims > 0 {
                    return Err(self.error_here("Dimension expressions must come first"));
                }
                self.bump();
                dims.push(self.parse_expression()?);
                self.expect_kind(TokenKind::RBracket, "`]`")?;
            }
            let init = if dims.is_empty() {
                Some(Box::new(self.nested(Self::parse_array_init)?))
            } else {
                None
            };
            return Ok(self.expr(
                ExprKind::NewArray {
                    elem: ty,
                    dims,
                    extra_dims,
                    init,
                },
                start,
            ));
        }

        if matches!(ty.kind, TypeRefKind::Primitive(_)) {
            return Err(self.error_expected("`[`"));
        }
        let args = self.parse_args()?;
        if self.at_kind(TokenKind::LBrace) {
            return Err(self.error_here("Anonymous classes are not supported"));
        }
        Ok(self.expr(ExprKind::New { ty, args }, start))
    }

    fn parse_array_init(&mut self) -> PResult<Expr> {
        let start = self.expect_kind(TokenKind::LBrace, "`{`")?.span.start;
        let mut elements = Vec::new();
        loop {
            if self.eat_kind(TokenKind::RBrace) {
                break;
            }
            elements.push(self.parse_var_init()?);
            if !self.eat_kind(TokenKind::Comma) {
                self.expect_kind(TokenKind::RBrace, "`}`")?;
                break;
            }
        }
        Ok(self.expr(ExprKind::ArrayInit(elements), start))
    }
}

enum Member {
    Method(MethodDecl),
    Ctor(ConstructorDecl),
    Fields(Vec<FieldDecl>),
}
