// This module implements the expression evaluator. Expressions are parsed by precedence
// climbing directly over the character stream and code is emitted while parsing, so every
// sub-expression comes back as an Expr: a plain word, the address of a word (an lvalue),
// or a function named directly. Binary operators are recognised only when the current
// level allows them; otherwise the characters are pushed back and the caller takes over.
// Levels, tightest first: postfix/unary, * / % (3), + - (4), << >> (5), < <= > >= (6),
// == != (7), & (8), | (10), ?: (13), = and the =op compound assignments (14). B spells
// compound assignment with the operator after the '=' (x =+ 1), and the spelling is taken
// as soon as the character after '=' matches, so x=-1 subtracts while x = -1 assigns.

//! Operator-precedence expression evaluator.

use super::builder::{Expr, FunctionBuilder};
use super::lexer::{is_identifier_start, Lexer};
use crate::core::{CompileError, CompileResult, Found};
use crate::ir::{BinaryOp, Callee, Operand, Predicate};

/// Loosest level: a full expression including assignment.
const FULL: u8 = 15;
const ASSIGNMENT: u8 = 14;
const CONDITIONAL: u8 = 13;

#[derive(Debug, Clone, Copy)]
enum Op {
    Binary(BinaryOp),
    Compare(Predicate),
}

/// What the `=` handler did with the operator.
enum Step {
    /// Equality; keep climbing with the new left operand.
    Continue(Expr),
    /// Assignment; it consumed the rest of the expression.
    Done(Operand),
    /// Not allowed at this level; characters pushed back.
    Stop(Expr),
}

impl<'c> FunctionBuilder<'c> {
    /// Evaluate a full expression to a word.
    pub fn expression(&mut self, lx: &mut Lexer<'_>) -> CompileResult<Operand> {
        self.expression_at(lx, FULL)
    }

    /// Word held by an evaluation result. Lvalues are loaded, functions yield their address.
    pub fn rvalue(&mut self, expr: Expr) -> Operand {
        match expr {
            Expr::Value(v) => v,
            Expr::Address(addr) => self.load(addr),
            Expr::Function(name) => self.ptr_to_int(Operand::Symbol(name)),
        }
    }

    fn expression_at(&mut self, lx: &mut Lexer<'_>, level: u8) -> CompileResult<Operand> {
        let mut left = self.unary(lx)?;
        loop {
            lx.whitespace()?;
            let Some(ch) = lx.read_char() else { break };
            let (op, right_level) = match ch {
                '?' if level >= CONDITIONAL => return self.conditional(lx, left),
                '=' if level >= 7 => match self.equals(lx, level, left)? {
                    Step::Continue(expr) => {
                        left = expr;
                        continue;
                    }
                    Step::Done(value) => return Ok(value),
                    Step::Stop(expr) => {
                        left = expr;
                        break;
                    }
                },
                '|' if level >= 10 => (Op::Binary(BinaryOp::Or), 9),
                '&' if level >= 8 => (Op::Binary(BinaryOp::And), 7),
                '!' if level >= 7 => match lx.read_char() {
                    Some('=') => (Op::Compare(Predicate::Ne), 6),
                    other => {
                        if let Some(c) = other {
                            lx.unread_char(c);
                        }
                        lx.unread_char('!');
                        break;
                    }
                },
                '<' | '>' if level >= 5 => {
                    let next = lx.read_char();
                    if next == Some(ch) {
                        let shift = if ch == '<' { BinaryOp::Shl } else { BinaryOp::Shr };
                        (Op::Binary(shift), 4)
                    } else if level < 6 {
                        if let Some(c) = next {
                            lx.unread_char(c);
                        }
                        lx.unread_char(ch);
                        break;
                    } else if next == Some('=') {
                        let pred = if ch == '<' { Predicate::Le } else { Predicate::Ge };
                        (Op::Compare(pred), 5)
                    } else {
                        if let Some(c) = next {
                            lx.unread_char(c);
                        }
                        let pred = if ch == '<' { Predicate::Lt } else { Predicate::Gt };
                        (Op::Compare(pred), 5)
                    }
                }
                '+' | '-' if level >= 4 => {
                    if lx.peek_char() == Some(ch) {
                        lx.unread_char(ch);
                        break;
                    }
                    let op = if ch == '+' { BinaryOp::Add } else { BinaryOp::Sub };
                    (Op::Binary(op), 3)
                }
                '*' | '/' | '%' if level >= 3 => {
                    let op = match ch {
                        '*' => BinaryOp::Mul,
                        '/' => BinaryOp::Div,
                        _ => BinaryOp::Rem,
                    };
                    (Op::Binary(op), 2)
                }
                _ => {
                    lx.unread_char(ch);
                    break;
                }
            };
            let lhs = self.rvalue(left);
            let rhs = self.expression_at(lx, right_level)?;
            left = Expr::Value(self.apply(op, lhs, rhs));
        }
        Ok(self.rvalue(left))
    }

    fn apply(&mut self, op: Op, lhs: Operand, rhs: Operand) -> Operand {
        match op {
            Op::Binary(op) => self.binary(op, lhs, rhs),
            Op::Compare(pred) => self.compare(pred, lhs, rhs),
        }
    }

    /// Handle everything spelled with a leading `=`: equality, plain and compound assignment.
    fn equals(&mut self, lx: &mut Lexer<'_>, level: u8, left: Expr) -> CompileResult<Step> {
        let next = lx.read_char();
        if next == Some('=') {
            if level >= ASSIGNMENT {
                match lx.read_char() {
                    Some('=') => {
                        let op = Op::Compare(Predicate::Eq);
                        return Ok(Step::Done(self.compound(lx, left, op, "===")?));
                    }
                    Some(c) => lx.unread_char(c),
                    None => {}
                }
            }
            let lhs = self.rvalue(left);
            let rhs = self.expression_at(lx, 6)?;
            return Ok(Step::Continue(Expr::Value(self.compare(Predicate::Eq, lhs, rhs))));
        }
        if level < ASSIGNMENT {
            if let Some(c) = next {
                lx.unread_char(c);
            }
            lx.unread_char('=');
            return Ok(Step::Stop(left));
        }

        let (op, spelling) = match next {
            Some('+') => (Op::Binary(BinaryOp::Add), "=+"),
            Some('-') => (Op::Binary(BinaryOp::Sub), "=-"),
            Some('*') => (Op::Binary(BinaryOp::Mul), "=*"),
            Some('/') => (Op::Binary(BinaryOp::Div), "=/"),
            Some('%') => (Op::Binary(BinaryOp::Rem), "=%"),
            Some('&') => (Op::Binary(BinaryOp::And), "=&"),
            Some('|') => (Op::Binary(BinaryOp::Or), "=|"),
            Some(c @ ('<' | '>')) => {
                let less = c == '<';
                match lx.read_char() {
                    Some(d) if d == c => {
                        let shift = if less { BinaryOp::Shl } else { BinaryOp::Shr };
                        (Op::Binary(shift), if less { "=<<" } else { "=>>" })
                    }
                    Some('=') => {
                        let pred = if less { Predicate::Le } else { Predicate::Ge };
                        (Op::Compare(pred), if less { "=<=" } else { "=>=" })
                    }
                    other => {
                        if let Some(d) = other {
                            lx.unread_char(d);
                        }
                        let pred = if less { Predicate::Lt } else { Predicate::Gt };
                        (Op::Compare(pred), if less { "=<" } else { "=>" })
                    }
                }
            }
            Some('!') => match lx.read_char() {
                Some('=') => (Op::Compare(Predicate::Ne), "=!="),
                other => {
                    if let Some(d) = other {
                        lx.unread_char(d);
                    }
                    lx.unread_char('!');
                    return Ok(Step::Done(self.assign(lx, left)?));
                }
            },
            other => {
                if let Some(c) = other {
                    lx.unread_char(c);
                }
                return Ok(Step::Done(self.assign(lx, left)?));
            }
        };
        Ok(Step::Done(self.compound(lx, left, op, spelling)?))
    }

    fn assign(&mut self, lx: &mut Lexer<'_>, left: Expr) -> CompileResult<Operand> {
        let Expr::Address(addr) = left else {
            return Err(CompileError::NotAnLvalue { operator: "=" });
        };
        let value = self.expression_at(lx, ASSIGNMENT)?;
        self.store(value.clone(), addr);
        Ok(value)
    }

    fn compound(
        &mut self,
        lx: &mut Lexer<'_>,
        left: Expr,
        op: Op,
        spelling: &'static str,
    ) -> CompileResult<Operand> {
        let Expr::Address(addr) = left else {
            return Err(CompileError::NotAnLvalue { operator: spelling });
        };
        let rhs = self.expression_at(lx, ASSIGNMENT)?;
        let old = self.load(addr.clone());
        let value = self.apply(op, old, rhs);
        self.store(value.clone(), addr);
        Ok(value)
    }

    /// `cond ? a : b`, merged with a phi in the end block.
    fn conditional(&mut self, lx: &mut Lexer<'_>, cond: Expr) -> CompileResult<Operand> {
        let cond = self.rvalue(cond);
        let id = self.fresh_id();
        let then_block = self.new_block(format!("cond.{id}.then"));
        let else_block = self.new_block(format!("cond.{id}.else"));
        let end_block = self.new_block(format!("cond.{id}.end"));
        self.cond_branch(cond, then_block, else_block)?;

        self.switch_to(then_block);
        let then_value = self.expression_at(lx, 12)?;
        let then_exit = self.current_block();
        self.branch(end_block)?;
        lx.expect(':', "in conditional expression")?;

        self.switch_to(else_block);
        let else_value = self.expression_at(lx, CONDITIONAL)?;
        let else_exit = self.current_block();
        self.branch(end_block)?;

        self.switch_to(end_block);
        Ok(self.phi(vec![(then_value, then_exit), (else_value, else_exit)]))
    }

    fn unary(&mut self, lx: &mut Lexer<'_>) -> CompileResult<Expr> {
        lx.whitespace()?;
        let Some(ch) = lx.read_char() else {
            return Err(CompileError::expected("expression", Found::EndOfFile));
        };
        match ch {
            '!' => {
                let operand = self.unary(lx)?;
                let value = self.rvalue(operand);
                Ok(Expr::Value(self.compare(Predicate::Eq, value, Operand::Const(0))))
            }
            '-' if lx.peek_char() == Some('-') => {
                lx.read_char();
                self.prefix_step(lx, BinaryOp::Sub, "--")
            }
            '-' => {
                let operand = self.unary(lx)?;
                let value = self.rvalue(operand);
                Ok(Expr::Value(self.binary(BinaryOp::Sub, Operand::Const(0), value)))
            }
            '+' => match lx.read_char() {
                Some('+') => self.prefix_step(lx, BinaryOp::Add, "++"),
                found => Err(CompileError::expected("'+' after '+'", found)),
            },
            '*' => {
                let operand = self.unary(lx)?;
                let word = self.rvalue(operand);
                Ok(Expr::Address(self.int_to_ptr(word)))
            }
            '&' => match self.unary(lx)? {
                Expr::Address(addr) => Ok(Expr::Value(self.ptr_to_int(addr))),
                _ => Err(CompileError::NotAnLvalue { operator: "&" }),
            },
            _ => {
                lx.unread_char(ch);
                self.postfix(lx)
            }
        }
    }

    /// Prefix `++`/`--`; the result stays an lvalue.
    fn prefix_step(
        &mut self,
        lx: &mut Lexer<'_>,
        op: BinaryOp,
        spelling: &'static str,
    ) -> CompileResult<Expr> {
        let Expr::Address(addr) = self.unary(lx)? else {
            return Err(CompileError::NotAnLvalue { operator: spelling });
        };
        let old = self.load(addr.clone());
        let new = self.binary(op, old, Operand::Const(1));
        self.store(new, addr.clone());
        Ok(Expr::Address(addr))
    }

    fn postfix(&mut self, lx: &mut Lexer<'_>) -> CompileResult<Expr> {
        let mut expr = self.primary(lx)?;
        loop {
            lx.whitespace()?;
            let Some(ch) = lx.read_char() else { break };
            match ch {
                '[' => {
                    let base = self.rvalue(expr);
                    let base = self.int_to_ptr(base);
                    let index = self.expression(lx)?;
                    lx.expect(']', "after subscript")?;
                    expr = Expr::Address(self.element_ptr(base, index));
                }
                '(' => expr = Expr::Value(self.call_expression(lx, expr)?),
                '+' | '-' if lx.peek_char() == Some(ch) => {
                    lx.read_char();
                    let (op, spelling) = if ch == '+' {
                        (BinaryOp::Add, "++")
                    } else {
                        (BinaryOp::Sub, "--")
                    };
                    let Expr::Address(addr) = expr else {
                        return Err(CompileError::NotAnLvalue { operator: spelling });
                    };
                    let old = self.load(addr.clone());
                    let new = self.binary(op, old.clone(), Operand::Const(1));
                    self.store(new, addr);
                    expr = Expr::Value(old);
                }
                _ => {
                    lx.unread_char(ch);
                    break;
                }
            }
        }
        Ok(expr)
    }

    /// Call `callee` with the argument list that follows; the `(` is already consumed.
    fn call_expression(&mut self, lx: &mut Lexer<'_>, callee: Expr) -> CompileResult<Operand> {
        let callee = match callee {
            Expr::Function(name) => Callee::Direct(name),
            Expr::Address(addr) => {
                let word = self.load(addr);
                Callee::Indirect(self.int_to_ptr(word))
            }
            Expr::Value(word) => Callee::Indirect(self.int_to_ptr(word)),
        };
        let mut args = Vec::new();
        if !lx.try_read(')')? {
            loop {
                args.push(self.expression(lx)?);
                lx.whitespace()?;
                match lx.read_char() {
                    Some(',') => continue,
                    Some(')') => break,
                    found => return Err(CompileError::expected("',' or ')' in argument list", found)),
                }
            }
        }
        Ok(self.call(callee, args))
    }

    fn primary(&mut self, lx: &mut Lexer<'_>) -> CompileResult<Expr> {
        lx.whitespace()?;
        match lx.read_char() {
            Some('\'') => Ok(Expr::Value(Operand::Const(lx.character()?))),
            Some('"') => {
                let text = lx.string()?;
                Ok(Expr::Value(self.string(&text)))
            }
            Some('(') => {
                let value = self.expression(lx)?;
                lx.expect(')', "after parenthesized expression")?;
                Ok(Expr::Value(value))
            }
            Some(c) if c.is_ascii_digit() => {
                lx.unread_char(c);
                Ok(Expr::Value(Operand::Const(lx.number()?)))
            }
            Some(c) if is_identifier_start(c) => {
                lx.unread_char(c);
                let name = lx.identifier()?;
                lx.whitespace()?;
                if lx.peek_char() == Some('(') {
                    Ok(self.resolve_callee(&name))
                } else {
                    self.resolve(&name)
                }
            }
            found => Err(CompileError::expected("expression", found)),
        }
    }
}
