//! This module provides the parser for text programs (`.tm` files), utilizing the `pest` crate.
//! A text program describes a symbolic table: optional state flags followed by one block of
//! transitions per source state. Parsing produces a [`TableConfig`], so text and JSON
//! descriptions are built and validated by the same code.

use crate::{
    action::{Action, Direction},
    analyzer::analyze,
    config::{ControllerConfig, EdgeConfig, Program, StateConfig, TableConfig},
    controller::AnyController,
    types::{ControlError, Status, Word},
};
use pest::{
    error::{Error, ErrorVariant},
    iterators::Pair,
    Parser as PestParser, Span,
};
use pest_derive::Parser as PestParser;
use std::collections::HashSet;

/// Derives a `PestParser` for the program grammar defined in `grammar.pest`.
#[derive(PestParser)]
#[grammar = "grammar.pest"]
pub struct ProgramParser;

/// Parses and validates a text program.
///
/// The parsed table is checked by [`analyze`] before it is returned.
///
/// # Returns
///
/// * `Ok(Program)` holding a symbolic table.
/// * `Err(ControlError::ParseError)` for syntax errors and duplicate declarations.
/// * `Err(ControlError::ValidationError)` for missing sections or a table that fails analysis.
pub fn parse(input: &str) -> Result<Program, ControlError> {
    let config = parse_config(input)?;
    let program = ControllerConfig::Table(config).build()?;

    if let AnyController::Table(table) = &program.controller {
        analyze(table)?;
    }

    Ok(program)
}

/// Parses a text program into its description without building it.
pub fn parse_config(input: &str) -> Result<TableConfig, ControlError> {
    let root = ProgramParser::parse(Rule::program, input.trim())
        .map_err(|e| ControlError::ParseError(Box::new(e)))?
        .next()
        .ok_or_else(|| ControlError::ValidationError("Empty program".to_string()))?;

    parse_program(root)
}

/// Parses the top-level sections of a program.
fn parse_program(pair: Pair<Rule>) -> Result<TableConfig, ControlError> {
    let mut name: Option<String> = None;
    let mut states: Option<Vec<StateConfig>> = None;
    let mut edges: Option<(Vec<EdgeConfig>, i64)> = None;
    let mut seen = HashSet::new();

    for p in pair.into_inner() {
        let span = p.as_span();
        let rule = p.as_rule();

        check_unique_rule(rule, span, &mut seen)?;

        match rule {
            Rule::name => name = Some(parse_name(p)?),
            Rule::states => states = Some(parse_states(p)?),
            Rule::rules => edges = Some(parse_rules(p)?),
            _ => {}
        }
    }

    let name = check_required_rule(name, "name")?;
    let (edges, first) = check_required_rule(edges, "rules")?;
    let mut states = states.unwrap_or_default();

    // Without an explicit root, the first rule block starts the machine.
    if !states.iter().any(|s| s.root) {
        match states.iter_mut().find(|s| s.label == first) {
            Some(state) => state.root = true,
            None => states.push(StateConfig {
                label: first,
                root: true,
                terminal: false,
                status: Status::Success.code() as i64,
            }),
        }
    }

    Ok(TableConfig {
        name,
        states,
        edges,
    })
}

fn parse_name(pair: Pair<Rule>) -> Result<String, ControlError> {
    let span = pair.as_span();
    let text = pair
        .into_inner()
        .next()
        .map(|p| p.as_str().trim().to_string())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(parse_error("Program name cannot be empty", span));
    }
    Ok(text)
}

/// Parses the `states:` section.
///
/// `success` and `failure` mark a state terminal with that status; `root` marks the initial
/// state.
fn parse_states(pair: Pair<Rule>) -> Result<Vec<StateConfig>, ControlError> {
    let mut states: Vec<StateConfig> = Vec::new();

    for decl in pair.into_inner() {
        let span = decl.as_span();
        let mut inner = decl.into_inner();
        let label = parse_label(inner.next(), span)?;

        if states.iter().any(|s| s.label == label) {
            return Err(parse_error(&format!("Duplicate state declaration: {label}"), span));
        }

        let mut state = StateConfig {
            label,
            root: false,
            terminal: false,
            status: Status::Success.code() as i64,
        };
        let mut status: Option<Status> = None;

        for flag in inner {
            match flag.as_str() {
                "root" => state.root = true,
                "success" | "failure" => {
                    let flagged = if flag.as_str() == "success" {
                        Status::Success
                    } else {
                        Status::Failure
                    };
                    if status.is_some_and(|s| s != flagged) {
                        return Err(parse_error(
                            &format!("State {label} cannot be both success and failure"),
                            span,
                        ));
                    }
                    status = Some(flagged);
                }
                other => {
                    return Err(parse_error(&format!("Unknown state flag: {other}"), span));
                }
            }
        }

        if let Some(status) = status {
            state.terminal = true;
            state.status = status.code() as i64;
        }
        states.push(state);
    }

    Ok(states)
}

/// Parses the `rules:` section into edges, returning them with the label of the first block.
fn parse_rules(pair: Pair<Rule>) -> Result<(Vec<EdgeConfig>, i64), ControlError> {
    let span = pair.as_span();
    let mut edges = Vec::new();
    let mut blocks = HashSet::new();
    let mut first = None;

    for block in pair.into_inner() {
        let block_span = block.as_span();
        let mut inner = block.into_inner();
        let source = parse_label(inner.next(), block_span)?;

        if !blocks.insert(source) {
            return Err(parse_error(
                &format!("Duplicate transition rule: {source}"),
                block_span,
            ));
        }
        first.get_or_insert(source);

        let mut conditions = HashSet::new();
        for transition in inner {
            let edge = parse_transition(source, transition)?;
            if !conditions.insert(edge.condition.clone()) {
                return Err(parse_error(
                    &format!(
                        "Duplicate transition for '{}' in state {}",
                        edge.condition, source
                    ),
                    block_span,
                ));
            }
            edges.push(edge);
        }
    }

    let first = first.ok_or_else(|| parse_error("No rule blocks defined", span))?;
    Ok((edges, first))
}

/// Parses `symbol -> action, target`.
fn parse_transition(source: i64, pair: Pair<Rule>) -> Result<EdgeConfig, ControlError> {
    let span = pair.as_span();
    let mut inner = pair.into_inner();

    let condition = inner
        .next()
        .map(|p| parse_symbol(p.as_str()))
        .ok_or_else(|| parse_error("Missing condition symbol", span))?;
    let action = inner
        .next()
        .ok_or_else(|| parse_error("Missing action", span))
        .and_then(parse_action)?;
    let target = parse_label(inner.next(), span)?;

    Ok(EdgeConfig {
        source,
        condition,
        action,
        target,
    })
}

/// Parses `write <symbol>`, `L` or `R`.
fn parse_action(pair: Pair<Rule>) -> Result<Action, ControlError> {
    let span = pair.as_span();
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| parse_error("Missing action", span))?;

    match inner.as_rule() {
        Rule::write => {
            let symbol = inner
                .into_inner()
                .next()
                .map(|p| parse_symbol(p.as_str()))
                .ok_or_else(|| parse_error("Missing symbol to write", span))?;
            Ok(Action::Write(Word::new(&symbol)?))
        }
        Rule::direction => match inner.as_str() {
            "L" => Ok(Action::Move(Direction::Left)),
            "R" => Ok(Action::Move(Direction::Right)),
            other => Err(parse_error(&format!("Unsupported direction: {other}"), span)),
        },
        _ => Err(parse_error("Unsupported action", span)),
    }
}

fn parse_label(pair: Option<Pair<Rule>>, span: Span) -> Result<i64, ControlError> {
    let pair = pair.ok_or_else(|| parse_error("Missing state label", span))?;
    pair.as_str()
        .parse::<i64>()
        .map_err(|_| parse_error(&format!("Invalid state label: {}", pair.as_str()), pair.as_span()))
}

/// Strips the quotes from a quoted symbol.
fn parse_symbol(input: &str) -> String {
    let quoted = input.len() > 2 && input.starts_with('\'') && input.ends_with('\'');
    if quoted {
        input[1..input.len() - 1].to_string()
    } else {
        input.to_string()
    }
}

/// Creates a `ControlError::ParseError` from a message and a `Span`.
fn parse_error(msg: &str, span: Span) -> ControlError {
    ControlError::ParseError(Box::new(Error::new_from_span(
        ErrorVariant::CustomError {
            message: msg.to_string(),
        },
        span,
    )))
}

/// Checks if a top-level section has already been declared.
fn check_unique_rule(
    rule: Rule,
    span: Span,
    seen: &mut HashSet<Rule>,
) -> Result<(), ControlError> {
    if !matches!(rule, Rule::name | Rule::states | Rule::rules) {
        return Ok(());
    };

    if !seen.insert(rule) {
        return Err(parse_error(
            &format!("Duplicate \"{rule:?}:\" declaration"),
            span,
        ));
    }

    Ok(())
}

/// Checks if a required section is present, returning an `Err` if it's missing.
fn check_required_rule<T>(value: Option<T>, name: &str) -> Result<T, ControlError> {
    value.ok_or_else(|| ControlError::ValidationError(format!("Missing '{name}' section")))
}
