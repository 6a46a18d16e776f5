use super::ast::{
    BinOp, DeclKind, Expr, ExprKind, ForStmt, FuncDecl, IfStmt, MemberDecl, Param, Program,
    StructDecl, Stmt, UnOp, VarDecl,
};
use super::parsercore::Parser;
use super::token::{
    Token,
    TokenKind::{self, *},
};
use crate::error::ParseError;

/// Tokens that can open a top-level declaration; error recovery skips
/// ahead to one of these.
const DECL_START: [TokenKind; 3] = [KwInt, KwVoid, KwStruct];

impl<I: Iterator<Item = Token>> Parser<I> {
    pub fn parse(mut self) -> (Program, Vec<ParseError>) {
        let program = self.parse_program();
        (program, self.into_errors())
    }
}

impl<I: Iterator<Item = Token>> Parser<I> {
    fn parse_program(&mut self) -> Program {
        let mut program = Program::default();
        while !self.at_end() {
            if let Err(err) = self.parse_decl(&mut program) {
                self.error(err);
                self.sync(&DECL_START);
            }
        }
        program
    }

    fn at_type_start(&mut self) -> bool {
        matches!(self.peek_kind(), Some(KwInt | KwVoid | KwStruct))
    }

    /// decl = struct-def | global-var | function
    fn parse_decl(&mut self, program: &mut Program) -> Result<(), ParseError> {
        let line = self.line();

        // "struct" opens either a definition or a struct-typed declaration
        if self.eat(&KwStruct) {
            let name = self.ident()?;
            if self.at(&LCurly) {
                let decl = self.parse_struct_body(name, line)?;
                program.structs.push(decl);
                program.order.push(DeclKind::Struct);
                return Ok(());
            }
            let mut spec = format!("struct {}", name);
            while self.eat(&Star) {
                spec.push('*');
            }
            return self.parse_decl_tail(spec, line, program);
        }

        let spec = self.parse_type_spec()?;
        self.parse_decl_tail(spec, line, program)
    }

    fn parse_decl_tail(
        &mut self,
        spec: String,
        line: usize,
        program: &mut Program,
    ) -> Result<(), ParseError> {
        let name = self.ident()?;
        if self.at(&LParen) {
            let func = self.parse_function(spec, name, line)?;
            program.functions.push(func);
            program.order.push(DeclKind::Function);
        } else {
            let var = self.parse_var_tail(spec, name, line)?;
            program.globals.push(var);
            program.order.push(DeclKind::Global);
        }
        Ok(())
    }

    /// type-spec = ("int" | "void" | "struct" ident) { "*" }
    fn parse_type_spec(&mut self) -> Result<String, ParseError> {
        let mut spec = if self.eat(&KwInt) {
            String::from("int")
        } else if self.eat(&KwVoid) {
            String::from("void")
        } else if self.eat(&KwStruct) {
            format!("struct {}", self.ident()?)
        } else {
            return Err(self.unexpected());
        };
        while self.eat(&Star) {
            spec.push('*');
        }
        Ok(spec)
    }

    /// struct-body = "{" { member ";" } "}" ";"
    fn parse_struct_body(&mut self, name: String, line: usize) -> Result<StructDecl, ParseError> {
        self.expect(&LCurly)?;
        let mut members = Vec::new();
        while !self.eat(&RCurly) {
            let mline = self.line();
            let type_spec = self.parse_type_spec()?;
            let mname = self.ident()?;
            let dims = self.parse_dims()?;
            self.expect(&Semicolon)?;
            members.push(MemberDecl {
                type_spec,
                name: mname,
                dims,
                line: mline,
            });
        }
        self.expect(&Semicolon)?;
        Ok(StructDecl { name, members, line })
    }

    /// dims = { "[" number "]" }
    fn parse_dims(&mut self) -> Result<Vec<usize>, ParseError> {
        let mut dims = Vec::new();
        while self.eat(&LBracket) {
            let size = self.number()?;
            self.expect(&RBracket)?;
            dims.push(size as usize);
        }
        Ok(dims)
    }

    /// var-tail = dims [ "=" initializer ] ";"
    fn parse_var_tail(
        &mut self,
        type_spec: String,
        name: String,
        line: usize,
    ) -> Result<VarDecl, ParseError> {
        let dims = self.parse_dims()?;
        let init = if self.eat(&Equal) {
            Some(self.parse_initializer()?)
        } else {
            None
        };
        self.expect(&Semicolon)?;
        Ok(VarDecl {
            type_spec,
            name,
            dims,
            init,
            line,
            ty: None,
        })
    }

    /// initializer = "{" [ initializer { "," initializer } ] "}" | expr
    fn parse_initializer(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        if !self.eat(&LCurly) {
            return self.parse_expr();
        }
        let mut elements = Vec::new();
        if !self.at(&RCurly) {
            elements.push(self.parse_initializer()?);
            while self.eat(&Comma) {
                elements.push(self.parse_initializer()?);
            }
        }
        self.expect(&RCurly)?;
        Ok(Expr::new(ExprKind::InitList(elements), line))
    }

    /// function = "(" [ param { "," param } ] ")" "{" { stmt } "}"
    fn parse_function(
        &mut self,
        ret_spec: String,
        name: String,
        line: usize,
    ) -> Result<FuncDecl, ParseError> {
        self.expect(&LParen)?;
        let mut params = Vec::new();
        if !self.at(&RParen) {
            params.push(self.parse_param()?);
            while self.eat(&Comma) {
                params.push(self.parse_param()?);
            }
        }
        self.expect(&RParen)?;
        let body = self.parse_block()?;
        Ok(FuncDecl {
            ret_spec,
            name,
            params,
            body,
            line,
            ret_ty: None,
        })
    }

    fn parse_param(&mut self) -> Result<Param, ParseError> {
        let type_spec = self.parse_type_spec()?;
        let name = self.ident()?;
        Ok(Param {
            type_spec,
            name,
            ty: None,
        })
    }

    /// block = "{" { stmt } "}"
    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(&LCurly)?;
        let mut stmts = Vec::new();
        while !self.eat(&RCurly) {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    /// stmt = block | var-decl | return | if | while | for | do-while
    ///      | break | continue | empty | expr-stmt
    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();

        if self.at(&LCurly) {
            return Ok(Stmt::Block(self.parse_block()?));
        }

        if self.eat(&Semicolon) {
            return Ok(Stmt::Empty);
        }

        if self.at_type_start() {
            return self.parse_var_decl_stmt();
        }

        if self.eat(&KwReturn) {
            if self.eat(&Semicolon) {
                return Ok(Stmt::Return(None, line));
            }
            let expr = self.parse_expr()?;
            self.expect(&Semicolon)?;
            return Ok(Stmt::Return(Some(expr), line));
        }

        if self.at(&KwIf) {
            return self.parse_if();
        }

        if self.eat(&KwWhile) {
            self.expect(&LParen)?;
            let cond = self.parse_expr()?;
            self.expect(&RParen)?;
            let body = self.parse_stmt()?;
            return Ok(Stmt::While(cond, Box::new(body)));
        }

        if self.eat(&KwDo) {
            let body = self.parse_stmt()?;
            self.expect(&KwWhile)?;
            self.expect(&LParen)?;
            let cond = self.parse_expr()?;
            self.expect(&RParen)?;
            self.expect(&Semicolon)?;
            return Ok(Stmt::DoWhile(Box::new(body), cond));
        }

        if self.at(&KwFor) {
            return self.parse_for();
        }

        if self.eat(&KwBreak) {
            self.expect(&Semicolon)?;
            return Ok(Stmt::Break);
        }

        if self.eat(&KwContinue) {
            self.expect(&Semicolon)?;
            return Ok(Stmt::Continue);
        }

        let expr = self.parse_expr()?;
        self.expect(&Semicolon)?;
        Ok(Stmt::Expr(expr))
    }

    fn parse_var_decl_stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();
        let type_spec = self.parse_type_spec()?;
        let name = self.ident()?;
        let decl = self.parse_var_tail(type_spec, name, line)?;
        Ok(Stmt::VarDecl(decl))
    }

    /// if = "if" "(" expr ")" stmt { "else" "if" "(" expr ")" stmt } [ "else" stmt ]
    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&KwIf)?;
        self.expect(&LParen)?;
        let cond = self.parse_expr()?;
        self.expect(&RParen)?;
        let then = self.parse_stmt()?;

        let mut else_ifs = Vec::new();
        let mut els = None;
        while self.eat(&KwElse) {
            if self.eat(&KwIf) {
                self.expect(&LParen)?;
                let cond = self.parse_expr()?;
                self.expect(&RParen)?;
                let body = self.parse_stmt()?;
                else_ifs.push((cond, body));
            } else {
                els = Some(self.parse_stmt()?);
                break;
            }
        }
        Ok(Stmt::If(Box::new(IfStmt {
            cond,
            then,
            else_ifs,
            els,
        })))
    }

    /// for = "for" "(" [ init ] ";" [ cond ] ";" [ step ] ")" stmt
    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&KwFor)?;
        self.expect(&LParen)?;

        let init = if self.eat(&Semicolon) {
            None
        } else if self.at_type_start() {
            Some(self.parse_var_decl_stmt()?)
        } else {
            let expr = self.parse_expr()?;
            self.expect(&Semicolon)?;
            Some(Stmt::Expr(expr))
        };

        let cond = if self.at(&Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&Semicolon)?;

        let step = if self.at(&RParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&RParen)?;

        let body = self.parse_stmt()?;
        Ok(Stmt::For(Box::new(ForStmt {
            init,
            cond,
            step,
            body,
        })))
    }
}

// ----------------------------------------------------------------------------
// Expressions, precedence climbing
// ----------------------------------------------------------------------------

impl<I: Iterator<Item = Token>> Parser<I> {
    /// expr = assign
    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_assign()
    }

    /// assign = or [ "=" assign ]   (right-associative)
    fn parse_assign(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_or()?;
        let line = self.line();
        if self.eat(&Equal) {
            let rhs = self.parse_assign()?;
            return Ok(Expr::new(
                ExprKind::Binary(BinOp::Assign, Box::new(lhs), Box::new(rhs)),
                line,
            ));
        }
        Ok(lhs)
    }

    /// or = and { "||" and }
    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        loop {
            let line = self.line();
            if !self.eat(&PipePipe) {
                return Ok(lhs);
            }
            let rhs = self.parse_and()?;
            lhs = Expr::new(ExprKind::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs)), line);
        }
    }

    /// and = equality { "&&" equality }
    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_equality()?;
        loop {
            let line = self.line();
            if !self.eat(&AmpAmp) {
                return Ok(lhs);
            }
            let rhs = self.parse_equality()?;
            lhs = Expr::new(ExprKind::Binary(BinOp::And, Box::new(lhs), Box::new(rhs)), line);
        }
    }

    /// equality = relational { ("==" | "!=") relational }
    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_relational()?;
        loop {
            let line = self.line();
            let op = if self.eat(&EqualEqual) {
                BinOp::Eq
            } else if self.eat(&ExclEqual) {
                BinOp::Ne
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_relational()?;
            lhs = Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), line);
        }
    }

    /// relational = additive { ("<" | "<=" | ">" | ">=") additive }
    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let line = self.line();
            let op = if self.eat(&LAngle) {
                BinOp::Lt
            } else if self.eat(&LAngleEqual) {
                BinOp::Le
            } else if self.eat(&RAngle) {
                BinOp::Gt
            } else if self.eat(&RAngleEqual) {
                BinOp::Ge
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_additive()?;
            lhs = Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), line);
        }
    }

    /// additive = term { ("+" | "-") term }
    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_term()?;
        loop {
            let line = self.line();
            let op = if self.eat(&Plus) {
                BinOp::Add
            } else if self.eat(&Minus) {
                BinOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_term()?;
            lhs = Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), line);
        }
    }

    /// term = unary { ("*" | "/" | "%") unary }
    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let line = self.line();
            let op = if self.eat(&Star) {
                BinOp::Mul
            } else if self.eat(&Slash) {
                BinOp::Div
            } else if self.eat(&Percent) {
                BinOp::Mod
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_unary()?;
            lhs = Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), line);
        }
    }

    /// unary = ("+" | "-" | "!" | "*" | "&") unary | postfix
    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        let op = if self.eat(&Plus) {
            UnOp::Pos
        } else if self.eat(&Minus) {
            UnOp::Neg
        } else if self.eat(&Excl) {
            UnOp::Not
        } else if self.eat(&Star) {
            UnOp::Deref
        } else if self.eat(&Amp) {
            UnOp::Ref
        } else {
            return self.parse_postfix();
        };
        let operand = self.parse_unary()?;
        Ok(Expr::new(ExprKind::Unary(op, Box::new(operand)), line))
    }

    /// postfix = primary { "[" expr "]" | "." ident | "->" ident }
    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            let line = self.line();
            if self.eat(&LBracket) {
                let index = self.parse_expr()?;
                self.expect(&RBracket)?;
                expr = Expr::new(ExprKind::Index(Box::new(expr), Box::new(index)), line);
            } else if self.eat(&Period) {
                let member = self.ident()?;
                expr = Expr::new(ExprKind::Member(Box::new(expr), member), line);
            } else if self.eat(&Arrow) {
                // p->m desugars to (*p).m
                let member = self.ident()?;
                let deref = Expr::new(ExprKind::Unary(UnOp::Deref, Box::new(expr)), line);
                expr = Expr::new(ExprKind::Member(Box::new(deref), member), line);
            } else {
                return Ok(expr);
            }
        }
    }

    /// primary = number | ident [ "(" args ")" ] | "(" expr ")"
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();

        if matches!(self.peek_kind(), Some(Number(_))) {
            let value = self.number()?;
            return Ok(Expr::new(ExprKind::Number(value), line));
        }

        if matches!(self.peek_kind(), Some(Ident(_))) {
            let name = self.ident()?;
            if self.eat(&LParen) {
                let mut args = Vec::new();
                if !self.at(&RParen) {
                    args.push(self.parse_expr()?);
                    while self.eat(&Comma) {
                        args.push(self.parse_expr()?);
                    }
                }
                self.expect(&RParen)?;
                return Ok(Expr::new(ExprKind::Call(name, args), line));
            }
            return Ok(Expr::new(ExprKind::Variable(name), line));
        }

        if self.eat(&LParen) {
            let expr = self.parse_expr()?;
            self.expect(&RParen)?;
            return Ok(expr);
        }

        Err(self.unexpected())
    }
}
