//! Template parser implementation using chumsky

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use serde_json::Value;

use crate::engine::ast::*;
use crate::engine::lexer::{self, Token};
use crate::error::ParseError;

/// Parse template source into top-level items
///
/// Only the first error is reported; the engine treats any syntax error
/// as fatal for the unit being parsed.
pub fn parse(input: &str) -> Result<Vec<Item>, ParseError> {
    let len = input.len();
    let tokens = lexer::lex(input)?;

    let token_iter = tokens.into_iter().map(|(tok, span)| (tok, span.into()));

    // Turn the token iterator into a stream that chumsky can use
    let token_stream = Stream::from_iter(token_iter)
        // Split (Token, SimpleSpan) into token and span parts
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    unit_parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errs| match errs.into_iter().next() {
            Some(err) => err.into(),
            None => ParseError::Syntax {
                span: 0..len,
                message: "invalid template".to_string(),
                expected: vec![],
            },
        })
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> std::ops::Range<usize> {
    e.start()..e.end()
}

fn pipeline_parser<'a, I>() -> impl Parser<'a, I, Pipeline, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    recursive(|pipeline| {
        let fields = select! { Token::Fields(f) => f };

        let literal = select! {
            Token::Str(s) => Value::String(s),
            Token::Int(n) => Value::from(n),
            Token::Float(f) => Value::from(f),
            Token::True => Value::Bool(true),
            Token::False => Value::Bool(false),
            Token::Nil => Value::Null,
        }
        .map(Expr::Literal);

        // Parenthesized sub-pipeline, optionally followed by a field chain
        let group = pipeline
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose))
            .then(fields.clone().or_not())
            .map(|(p, f): (Pipeline, Option<Vec<String>>)| Expr::Group {
                pipeline: Box::new(p),
                fields: f.unwrap_or_default(),
            });

        let operand = choice((
            just(Token::Dot).to(Expr::Dot),
            fields.map(Expr::Field),
            select! {
                Token::Variable(v) => Expr::Variable { name: v.name, fields: v.fields },
            },
            literal,
            group,
        ));

        let ident = select! {
            Token::Ident(name) => name,
        }
        .map_with(|name, e| (name, span_range(&e.span())));

        // A bare identifier in argument position is a niladic call
        let argument = choice((
            operand.clone(),
            ident
                .clone()
                .map(|(name, span)| Expr::Func { name, span }),
        ));

        let command = choice((
            ident
                .then(argument.repeated().collect::<Vec<_>>())
                .map(|((name, span), args)| Command::Call { name, args, span }),
            operand.map(Command::Value),
        ));

        let variable_name = select! {
            Token::Variable(v) => v,
        }
        .try_map(|v, span: SimpleSpan| {
            if v.fields.is_empty() {
                Ok(v.name)
            } else {
                Err(Rich::custom(span, "cannot declare a field chain as a variable"))
            }
        });

        let decls = variable_name
            .separated_by(just(Token::Comma))
            .at_least(1)
            .collect::<Vec<_>>()
            .then_ignore(just(Token::Declare))
            .try_map(|names: Vec<String>, span: SimpleSpan| {
                if names.len() > 2 {
                    Err(Rich::custom(span, "too many declarations in pipeline"))
                } else {
                    Ok(names)
                }
            });

        decls
            .or_not()
            .then(
                command
                    .separated_by(just(Token::Pipe))
                    .at_least(1)
                    .collect::<Vec<_>>(),
            )
            .map(|(decls, commands)| Pipeline {
                decls: decls.unwrap_or_default(),
                commands,
            })
    })
}

fn unit_parser<'a, I>() -> impl Parser<'a, I, Vec<Item>, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let pipeline = pipeline_parser();
    let open = just(Token::Open);
    let close = just(Token::Close);
    let string = select! { Token::Str(s) => s };

    let end_tag = open
        .clone()
        .then(just(Token::End))
        .then(close.clone())
        .ignored();

    let else_tag = open
        .clone()
        .then(just(Token::Else))
        .then(close.clone())
        .ignored();

    let node = recursive(|node| {
        let nodes = node.repeated().collect::<Vec<Node>>();

        let text = select! { Token::Text(s) => Node::Text(s) };

        let else_branch = else_tag
            .clone()
            .ignore_then(nodes.clone())
            .or_not()
            .map(Option::unwrap_or_default);

        // `{{ else if p }}` chains nest as an `If` inside the else branch
        let if_tail = recursive(|tail| {
            choice((
                open.clone()
                    .then(just(Token::Else))
                    .then(just(Token::If))
                    .ignore_then(pipeline.clone())
                    .then_ignore(close.clone())
                    .then(nodes.clone())
                    .then(tail.or_not())
                    .map(|((cond, then), otherwise): ((Pipeline, Nodes), Option<Nodes>)| {
                        vec![Node::If {
                            cond,
                            then,
                            otherwise: otherwise.unwrap_or_default(),
                        }]
                    }),
                else_tag.clone().ignore_then(nodes.clone()),
            ))
        });

        let if_node = open
            .clone()
            .ignore_then(just(Token::If))
            .ignore_then(pipeline.clone())
            .then_ignore(close.clone())
            .then(nodes.clone())
            .then(if_tail.or_not())
            .then_ignore(end_tag.clone())
            .map(|((cond, then), otherwise)| Node::If {
                cond,
                then,
                otherwise: otherwise.unwrap_or_default(),
            });

        let range_node = open
            .clone()
            .ignore_then(just(Token::Range))
            .ignore_then(pipeline.clone())
            .then_ignore(close.clone())
            .then(nodes.clone())
            .then(else_branch.clone())
            .then_ignore(end_tag.clone())
            .map(|((pipeline, body), otherwise)| Node::Range {
                pipeline,
                body,
                otherwise,
            });

        let with_node = open
            .clone()
            .ignore_then(just(Token::With))
            .ignore_then(pipeline.clone())
            .then_ignore(close.clone())
            .then(nodes.clone())
            .then(else_branch)
            .then_ignore(end_tag.clone())
            .map(|((pipeline, body), otherwise)| Node::With {
                pipeline,
                body,
                otherwise,
            });

        let template_node = open
            .clone()
            .ignore_then(just(Token::Template))
            .ignore_then(string.clone())
            .then(pipeline.clone().or_not())
            .then_ignore(close.clone())
            .map(|(name, pipeline)| Node::Template { name, pipeline });

        let output = open
            .clone()
            .ignore_then(pipeline.clone())
            .then_ignore(close.clone())
            .map(Node::Output);

        choice((text, if_node, range_node, with_node, template_node, output))
    });

    let define = open
        .clone()
        .ignore_then(just(Token::Define))
        .ignore_then(string)
        .then_ignore(close)
        .then(node.clone().repeated().collect::<Vec<Node>>())
        .then_ignore(end_tag)
        .map(|(name, body)| Item::Define { name, body });

    choice((define, node.map(Item::Node)))
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(end())
}
