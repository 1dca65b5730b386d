//! Recursive-descent parser over the token stream (C7, §4.7 grammar).
//! Produces the typed `Query` AST from `query::ast`; `parse()` is the crate's
//! public parse entry point and is an exact inverse of nothing (parsing is
//! not invertible) but is used alongside `ast::Query` to satisfy "tokenize
//! and parse the query language into a typed AST".

use crate::core::error::QueryParseError;
use crate::core::match_set::Granularity;
use crate::query::ast::{Condition, CountKind, JoinCondition, JoinKind, OrderColumn, Query, SelectColumn, Subquery, VarOrLiteral};
use crate::query::lexer::{tokenize, SpannedToken, Token};
use crate::temporal::TempPred;
use chrono::NaiveDate;

pub fn parse(input: &str) -> Result<Query, QueryParseError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let query = parser.parse_query()?;
    parser.expect_eof()?;
    Ok(query)
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos].offset
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, message: impl Into<String>) -> QueryParseError {
        QueryParseError { message: message.into(), offset: self.offset() }
    }

    fn expect_eof(&self) -> Result<(), QueryParseError> {
        if *self.peek() == Token::Eof { Ok(()) } else { Err(self.error("unexpected trailing input")) }
    }

    /// Consumes the next token as an identifier and requires it to match
    /// `keyword` case-insensitively (grammar keywords are written upper-case
    /// but the lexer doesn't special-case casing).
    fn expect_keyword(&mut self, keyword: &str) -> Result<(), QueryParseError> {
        match self.advance() {
            Token::Ident(name) if name.eq_ignore_ascii_case(keyword) => Ok(()),
            other => Err(QueryParseError { message: format!("expected '{keyword}', found {other:?}"), offset: self.tokens[self.pos - 1].offset }),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Ident(name) if name.eq_ignore_ascii_case(keyword))
    }

    fn take_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self) -> Result<String, QueryParseError> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            other => Err(QueryParseError { message: format!("expected identifier, found {other:?}"), offset: self.tokens[self.pos - 1].offset }),
        }
    }

    fn expect_var(&mut self) -> Result<String, QueryParseError> {
        match self.advance() {
            Token::Var(name) => Ok(name),
            other => Err(QueryParseError { message: format!("expected '?name', found {other:?}"), offset: self.tokens[self.pos - 1].offset }),
        }
    }

    fn expect_str(&mut self) -> Result<String, QueryParseError> {
        match self.advance() {
            Token::Str(s) => Ok(s),
            other => Err(QueryParseError { message: format!("expected string literal, found {other:?}"), offset: self.tokens[self.pos - 1].offset }),
        }
    }

    fn expect_int(&mut self) -> Result<i64, QueryParseError> {
        match self.advance() {
            Token::Int(n) => Ok(n),
            other => Err(QueryParseError { message: format!("expected integer, found {other:?}"), offset: self.tokens[self.pos - 1].offset }),
        }
    }

    fn expect_date(&mut self) -> Result<NaiveDate, QueryParseError> {
        let offset = self.offset();
        match self.advance() {
            Token::Date(text) => parse_date_literal(&text).ok_or_else(|| QueryParseError { message: format!("invalid date literal '{text}'"), offset }),
            other => Err(QueryParseError { message: format!("expected date literal, found {other:?}"), offset }),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), QueryParseError> {
        let got = self.advance();
        if got == expected { Ok(()) } else { Err(QueryParseError { message: format!("expected {expected:?}, found {got:?}"), offset: self.tokens[self.pos - 1].offset }) }
    }

    fn parse_query(&mut self) -> Result<Query, QueryParseError> {
        self.expect_keyword("FROM")?;
        let source = self.expect_ident()?;
        let mut query = Query::new(source);

        if self.take_keyword("AS") {
            query.main_alias = Some(self.expect_ident()?);
        }

        if self.take_keyword("SELECT") {
            query.select_columns = self.parse_select_list()?;
        }

        if self.take_keyword("WHERE") {
            query.conditions = Some(self.parse_or_cond()?);
        }

        while self.take_keyword("JOIN") {
            self.expect(Token::LParen)?;
            let sub_query = self.parse_query()?;
            self.expect(Token::RParen)?;
            self.expect_keyword("AS")?;
            let alias = self.expect_ident()?;

            let exported_columns = if matches!(self.peek(), Token::LParen) {
                self.advance();
                let mut cols = vec![self.expect_ident()?];
                while matches!(self.peek(), Token::Comma) {
                    self.advance();
                    cols.push(self.expect_ident()?);
                }
                self.expect(Token::RParen)?;
                Some(cols)
            } else {
                None
            };

            query.subqueries.push(Subquery { alias, query: Box::new(sub_query), exported_columns });
        }

        if self.take_keyword("ON") {
            query.join_condition = Some(self.parse_join_condition()?);
        }

        if self.take_keyword("ORDER") {
            self.expect_keyword("BY")?;
            query.order_by = self.parse_order_list()?;
        }

        if self.take_keyword("LIMIT") {
            let n = self.expect_int()?;
            if n < 0 {
                return Err(self.error("LIMIT must be non-negative"));
            }
            query.limit = Some(n as u64);
        }

        if self.take_keyword("GRANULARITY") {
            if self.take_keyword("DOCUMENT") {
                query.granularity = Granularity::Document;
            } else if self.take_keyword("SENTENCE") {
                query.granularity = Granularity::Sentence;
            } else {
                return Err(self.error("expected DOCUMENT or SENTENCE after GRANULARITY"));
            }
            if let Token::Int(_) = self.peek() {
                query.granularity_size = Some(self.expect_int()? as u32);
            }
        }

        Ok(query)
    }

    fn parse_select_list(&mut self) -> Result<Vec<SelectColumn>, QueryParseError> {
        let mut cols = vec![self.parse_select_column()?];
        while matches!(self.peek(), Token::Comma) {
            self.advance();
            cols.push(self.parse_select_column()?);
        }
        Ok(cols)
    }

    fn parse_select_column(&mut self) -> Result<SelectColumn, QueryParseError> {
        match self.peek().clone() {
            Token::Var(_) => {
                let name = self.expect_var()?;
                Ok(SelectColumn::Var(name))
            }
            Token::Ident(name) if name.eq_ignore_ascii_case("COUNT") => {
                self.advance();
                self.expect(Token::LParen)?;
                let kind = if matches!(self.peek(), Token::Star) {
                    self.advance();
                    CountKind::Star
                } else if self.take_keyword("UNIQUE") {
                    CountKind::UniqueVar(self.expect_var()?)
                } else if self.take_keyword("DOCUMENTS") {
                    CountKind::Documents
                } else {
                    return Err(self.error("expected '*', UNIQUE ?var, or DOCUMENTS inside COUNT(...)"));
                };
                self.expect(Token::RParen)?;
                Ok(SelectColumn::Count(kind))
            }
            Token::Ident(name) if name.eq_ignore_ascii_case("SNIPPET") => {
                self.advance();
                self.expect(Token::LParen)?;
                let var = self.expect_var()?;
                let window = if matches!(self.peek(), Token::Comma) {
                    self.advance();
                    Some(self.expect_int()? as u32)
                } else {
                    None
                };
                self.expect(Token::RParen)?;
                Ok(SelectColumn::Snippet { var, window })
            }
            Token::Ident(name) if name.eq_ignore_ascii_case("TITLE") => {
                self.advance();
                Ok(SelectColumn::Title)
            }
            Token::Ident(name) if name.eq_ignore_ascii_case("TIMESTAMP") => {
                self.advance();
                Ok(SelectColumn::Timestamp)
            }
            Token::Ident(name) if name.eq_ignore_ascii_case("METADATA") => {
                self.advance();
                let field = if matches!(self.peek(), Token::LParen) {
                    self.advance();
                    let field = self.expect_str()?;
                    self.expect(Token::RParen)?;
                    Some(field)
                } else {
                    None
                };
                Ok(SelectColumn::Metadata(field))
            }
            Token::Ident(alias) => {
                self.advance();
                self.expect(Token::Dot)?;
                let var = self.expect_var()?;
                Ok(SelectColumn::AliasVar { alias, var })
            }
            other => Err(self.error(format!("unexpected token in select list: {other:?}"))),
        }
    }

    fn parse_or_cond(&mut self) -> Result<Condition, QueryParseError> {
        let mut branches = vec![self.parse_and_cond()?];
        while self.take_keyword("OR") {
            branches.push(self.parse_and_cond()?);
        }
        Ok(if branches.len() == 1 { branches.pop().unwrap() } else { Condition::Or(branches) })
    }

    fn parse_and_cond(&mut self) -> Result<Condition, QueryParseError> {
        let mut branches = vec![self.parse_not_cond()?];
        while self.take_keyword("AND") {
            branches.push(self.parse_not_cond()?);
        }
        Ok(if branches.len() == 1 { branches.pop().unwrap() } else { Condition::And(branches) })
    }

    fn parse_not_cond(&mut self) -> Result<Condition, QueryParseError> {
        if self.take_keyword("NOT") {
            Ok(Condition::Not(Box::new(self.parse_atom()?)))
        } else {
            self.parse_atom()
        }
    }

    fn parse_atom(&mut self) -> Result<Condition, QueryParseError> {
        if matches!(self.peek(), Token::LParen) {
            self.advance();
            let inner = self.parse_or_cond()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }

        let name = self.expect_ident()?;
        self.expect(Token::LParen)?;
        let condition = match name.to_ascii_uppercase().as_str() {
            "CONTAINS" => self.parse_contains_args()?,
            "NER" => {
                let entity_type = self.expect_ident()?;
                self.expect(Token::Comma)?;
                let target = self.parse_var_or_literal()?;
                Condition::Ner { entity_type, target }
            }
            "POS" => {
                let tag = self.expect_ident()?;
                self.expect(Token::Comma)?;
                let target = self.parse_var_or_literal()?;
                Condition::Pos { tag, target }
            }
            "DEP" => {
                let head = self.parse_dep_arg()?;
                self.expect(Token::Comma)?;
                let relation = self.parse_dep_arg()?;
                self.expect(Token::Comma)?;
                let dependent = self.parse_dep_arg()?;
                Condition::Dep { head, relation, dependent }
            }
            "HYPERNYM" => {
                let category = self.parse_dep_arg()?;
                self.expect(Token::Comma)?;
                let instance = self.parse_dep_arg()?;
                Condition::Hypernym { category, instance }
            }
            "DATE" => {
                let pred = self.parse_date_pred()?;
                self.expect(Token::LBracket)?;
                let start = self.expect_date()?;
                self.expect(Token::Comma)?;
                let end = self.expect_date()?;
                self.expect(Token::RBracket)?;
                let bind = if matches!(self.peek(), Token::Comma) {
                    self.advance();
                    Some(self.expect_var()?)
                } else {
                    None
                };
                Condition::Date { pred, range: (start, end), bind }
            }
            other => return Err(self.error(format!("unknown condition '{other}'"))),
        };
        self.expect(Token::RParen)?;
        Ok(condition)
    }

    fn parse_contains_args(&mut self) -> Result<Condition, QueryParseError> {
        if let Token::Var(_) = self.peek() {
            let bind = self.expect_var()?;
            self.expect(Token::Comma)?;
            let term = self.expect_str()?;
            return Ok(Condition::Contains { terms: vec![term], bind: Some(bind) });
        }
        let mut terms = vec![self.expect_str()?];
        while matches!(self.peek(), Token::Comma) {
            self.advance();
            terms.push(self.expect_str()?);
        }
        Ok(Condition::Contains { terms, bind: None })
    }

    fn parse_dep_arg(&mut self) -> Result<String, QueryParseError> {
        match self.peek() {
            Token::Star => {
                self.advance();
                Ok("*".to_string())
            }
            Token::Str(_) => self.expect_str(),
            Token::Ident(_) => self.expect_ident(),
            other => Err(self.error(format!("expected a string, identifier, or '*', found {other:?}"))),
        }
    }

    fn parse_var_or_literal(&mut self) -> Result<VarOrLiteral, QueryParseError> {
        match self.peek() {
            Token::Var(_) => Ok(VarOrLiteral::Var(self.expect_var()?)),
            Token::Str(_) => Ok(VarOrLiteral::Literal(self.expect_str()?)),
            other => Err(self.error(format!("expected '?var' or a string literal, found {other:?}"))),
        }
    }

    fn parse_date_pred(&mut self) -> Result<TempPred, QueryParseError> {
        let name = self.expect_ident()?;
        match name.to_ascii_uppercase().as_str() {
            "CONTAINS" => Ok(TempPred::Contains),
            "CONTAINED_BY" => Ok(TempPred::ContainedBy),
            "INTERSECT" => Ok(TempPred::Intersect),
            "BEFORE" => Ok(TempPred::Before),
            "AFTER" => Ok(TempPred::After),
            "EQUAL" => Ok(TempPred::Equal),
            "PROXIMITY" => {
                if matches!(self.peek(), Token::LParen) {
                    self.advance();
                    let window = self.expect_int()?;
                    self.expect(Token::RParen)?;
                    Ok(TempPred::Proximity(window))
                } else {
                    Ok(TempPred::Proximity(0))
                }
            }
            other => Err(self.error(format!("unknown temporal predicate '{other}'"))),
        }
    }

    fn parse_join_condition(&mut self) -> Result<JoinCondition, QueryParseError> {
        let kind = if self.take_keyword("LEFT") {
            JoinKind::Left
        } else if self.take_keyword("RIGHT") {
            JoinKind::Right
        } else {
            JoinKind::Inner
        };

        let (left_alias, left_var) = self.parse_ref()?;
        let pred = self.parse_date_pred()?;
        let (right_alias, right_var) = self.parse_ref()?;
        let window = if self.take_keyword("WINDOW") { Some(self.expect_int()?) } else { None };

        Ok(JoinCondition { left_alias, left_var, pred, right_alias, right_var, window, kind })
    }

    fn parse_ref(&mut self) -> Result<(String, String), QueryParseError> {
        let alias = self.expect_ident()?;
        self.expect(Token::Dot)?;
        let var = self.expect_var()?;
        Ok((alias, var))
    }

    fn parse_order_list(&mut self) -> Result<Vec<OrderColumn>, QueryParseError> {
        let mut cols = vec![self.parse_order_column()?];
        while matches!(self.peek(), Token::Comma) {
            self.advance();
            cols.push(self.parse_order_column()?);
        }
        Ok(cols)
    }

    fn parse_order_column(&mut self) -> Result<OrderColumn, QueryParseError> {
        let descending = matches!(self.peek(), Token::Minus);
        if descending {
            self.advance();
        }
        let name = match self.advance() {
            Token::Ident(name) => name,
            Token::Var(name) => format!("?{name}"),
            other => return Err(QueryParseError { message: format!("expected an order-by column, found {other:?}"), offset: self.tokens[self.pos - 1].offset }),
        };
        Ok(OrderColumn { name, descending })
    }
}

fn parse_date_literal(text: &str) -> Option<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(d);
    }
    chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S").ok().map(|dt| dt.date())
}
