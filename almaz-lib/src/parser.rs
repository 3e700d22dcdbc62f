//! Turns source text into the [`Program`] AST.
//!
//! Every node that gets an id pushes its span to the span vector, the id is the index of that
//! span. The span vector is used to point error messages at the source.

use pest::error::{Error, ErrorVariant};
use pest::{Parser, Position, Span};
use pest_derive::Parser;

use crate::core::*;
use crate::utils;

#[derive(Parser)]
#[grammar = "grammar.pest"]
pub struct AlmazParser;

pub type SpanVec<'a> = Vec<Span<'a>>;
pub type ParseError = Error<Rule>;
pub type ParseResult<T> = Result<T, ParseError>;

pub type Pair<'a> = pest::iterators::Pair<'a, Rule>;

pub fn parse(src: &str) -> ParseResult<(Program, SpanVec<'_>)> {
    let mut pairs = AlmazParser::parse(Rule::file, src)?;
    let mut span_vec = vec![];
    let Some(program_pair) = pairs.find(|p| p.as_rule() == Rule::program) else {
        return Err(Error::new_from_pos(
            ErrorVariant::CustomError {
                message: "expected a program".into(),
            },
            Position::from_start(src),
        ));
    };
    let res = parse_program(program_pair, &mut span_vec)?;
    Ok((res, span_vec))
}

/// builds an error that points at span
pub fn custom_error(message: impl Into<String>, span: Span) -> ParseError {
    Error::new_from_span(
        ErrorVariant::CustomError {
            message: message.into(),
        },
        span,
    )
}

fn unexpected(pair: &Pair) -> ParseError {
    custom_error(format!("unexpected {:?}", pair.as_rule()), pair.as_span())
}

fn push_span<'a>(pair: &Pair<'a>, span_vec: &mut SpanVec<'a>) -> usize {
    span_vec.push(pair.as_span());
    span_vec.len() - 1
}

fn parse_program<'a>(pair: Pair<'a>, span_vec: &mut SpanVec<'a>) -> ParseResult<Program> {
    let id = push_span(&pair, span_vec);
    let statements =
        utils::sequence_result(pair.into_inner().map(|p| parse_statement(p, span_vec)))?;
    Ok(Program(id, statements))
}

fn parse_statement<'a>(pair: Pair<'a>, span_vec: &mut SpanVec<'a>) -> ParseResult<Statement> {
    let id = push_span(&pair, span_vec);
    let span = pair.as_span();
    match pair.as_rule() {
        Rule::print_stmt => {
            let Some(expr) = pair.into_inner().find(|p| p.as_rule() == Rule::expression) else {
                return Err(custom_error("print without an expression", span));
            };
            Ok(Statement::Print(id, parse_expression(expr, span_vec)?))
        }
        Rule::let_stmt => {
            let mut symbol_name = None;
            let mut value_expr = None;
            for child in pair.into_inner() {
                match child.as_rule() {
                    Rule::kw_let => {}
                    Rule::ident => symbol_name = Some(child.as_str().to_owned()),
                    Rule::expression => value_expr = Some(parse_expression(child, span_vec)?),
                    _ => return Err(unexpected(&child)),
                }
            }
            match (symbol_name, value_expr) {
                (Some(symbol_name), Some(value_expr)) => Ok(Statement::Let {
                    id,
                    symbol_name,
                    value_expr,
                }),
                _ => Err(custom_error("incomplete let statement", span)),
            }
        }
        _ => Err(unexpected(&pair)),
    }
}

fn parse_expression<'a>(pair: Pair<'a>, span_vec: &mut SpanVec<'a>) -> ParseResult<Expression> {
    let id = push_span(&pair, span_vec);
    let mut terms = vec![];
    let mut operators = vec![];
    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::term => terms.push(parse_term(child, span_vec)?),
            Rule::add_op => operators.push(match child.as_str() {
                "+" => AddOp::Add,
                "-" => AddOp::Sub,
                _ => return Err(unexpected(&child)),
            }),
            _ => return Err(unexpected(&child)),
        }
    }
    Ok(Expression {
        id,
        terms,
        operators,
    })
}

fn parse_term<'a>(pair: Pair<'a>, span_vec: &mut SpanVec<'a>) -> ParseResult<Term> {
    let id = push_span(&pair, span_vec);
    let mut factors = vec![];
    let mut operators = vec![];
    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::factor => factors.push(parse_factor(child, span_vec)?),
            Rule::mul_op => operators.push(match child.as_str() {
                "*" => MulOp::Mul,
                "/" => MulOp::Div,
                _ => return Err(unexpected(&child)),
            }),
            _ => return Err(unexpected(&child)),
        }
    }
    Ok(Term {
        id,
        factors,
        operators,
    })
}

fn parse_factor<'a>(pair: Pair<'a>, span_vec: &mut SpanVec<'a>) -> ParseResult<Factor> {
    let id = push_span(&pair, span_vec);
    let span = pair.as_span();
    let Some(child) = pair.into_inner().next() else {
        return Err(custom_error("empty factor", span));
    };
    Ok(match child.as_rule() {
        Rule::expression => Factor::SubExpr(id, Box::new(parse_expression(child, span_vec)?)),
        Rule::int => {
            let val = child.as_str().parse::<i64>().map_err(|e| {
                custom_error(format!("invalid integer literal: {}", e), child.as_span())
            })?;
            Factor::IntLit(id, val)
        }
        Rule::string => Factor::StrLit(id, child.as_str().into()),
        Rule::ident => Factor::Symbol(id, child.as_str().into()),
        _ => return Err(unexpected(&child)),
    })
}
