//! Binding raw argument tokens to a command's argument descriptors
//!
//! Accepted forms: `--long value`, `--long=value`, `-s value`, `-s=value`,
//! `-sVALUE`, clustered flags `-abc`, positionals in declaration order, and
//! `--` to end option parsing.

use std::collections::HashMap;

use super::dispatch::DispatchError;
use crate::domain::{ArgValue, ArgumentDescriptor, BoundArgs, CommandDescriptor, TreePath};

/// Values seen for one argument
#[derive(Default)]
struct Seen {
    flag: bool,
    values: Vec<String>,
}

struct Binder<'a> {
    path: &'a TreePath,
    command: &'a CommandDescriptor,
    tokens: &'a [String],
    seen: HashMap<&'a str, Seen>,
    positionals: Vec<&'a str>,
}

/// Binds `tokens` against `command`, coercing types and applying defaults
///
/// Flags are always bound (to `false` when absent). Value arguments that
/// were neither given nor defaulted are left out.
pub fn bind(
    path: &TreePath,
    command: &CommandDescriptor,
    tokens: &[String],
) -> Result<BoundArgs, DispatchError> {
    let mut binder = Binder {
        path,
        command,
        tokens,
        seen: HashMap::new(),
        positionals: Vec::new(),
    };
    binder.scan()?;
    binder.assign_positionals()?;
    binder.finish()
}

impl<'a> Binder<'a> {
    fn scan(&mut self) -> Result<(), DispatchError> {
        let tokens = self.tokens;
        let command = self.command;
        let mut index = 0;
        let mut options_done = false;

        while index < tokens.len() {
            let token = tokens[index].as_str();
            index += 1;

            if options_done {
                self.positionals.push(token);
            } else if token == "--" {
                options_done = true;
            } else if let Some(body) = token.strip_prefix("--") {
                let (name, inline) = match body.split_once('=') {
                    Some((name, value)) => (name, Some(value)),
                    None => (body, None),
                };
                let argument = command
                    .find_long(name)
                    .ok_or_else(|| self.unknown(token))?;
                index = self.take(argument, inline, index)?;
            } else if token.len() > 1 && token.starts_with('-') && !is_negative_number(token) {
                index = self.short_cluster(token, index)?;
            } else {
                self.positionals.push(token);
            }
        }
        Ok(())
    }

    /// Handles `-s`, `-s=v`, `-sV` and `-abc`
    fn short_cluster(&mut self, token: &'a str, index: usize) -> Result<usize, DispatchError> {
        let command = self.command;
        let body = &token[1..];
        for (offset, short) in body.char_indices() {
            let argument = command
                .find_short(short)
                .ok_or_else(|| self.unknown(token))?;

            if argument.is_flag() {
                let rest = &body[offset + short.len_utf8()..];
                if rest.starts_with('=') {
                    return Err(self.error_unexpected(argument));
                }
                self.entry(argument).flag = true;
                continue;
            }

            let rest = &body[offset + short.len_utf8()..];
            let inline = if rest.is_empty() {
                None
            } else if let Some(value) = rest.strip_prefix('=') {
                Some(value)
            } else if argument.requires_equals() {
                return Err(self.error_require_equals(argument));
            } else {
                Some(rest)
            };
            return self.take(argument, inline, index);
        }
        Ok(index)
    }

    /// Records an option occurrence; returns the index of the next token
    fn take(
        &mut self,
        argument: &'a ArgumentDescriptor,
        inline: Option<&'a str>,
        mut index: usize,
    ) -> Result<usize, DispatchError> {
        if argument.is_flag() {
            if inline.is_some() {
                return Err(self.error_unexpected(argument));
            }
            self.entry(argument).flag = true;
            return Ok(index);
        }

        if let Some(value) = inline {
            self.entry(argument).values.push(value.to_string());
            return Ok(index);
        }
        if argument.requires_equals() {
            return Err(self.error_require_equals(argument));
        }

        let (_, max) = argument.arity();
        let already = self.seen.get(argument.name.as_str()).map_or(0, |s| s.values.len());
        let room = if argument.is_multi() {
            max.map_or(usize::MAX, |m| (m as usize).saturating_sub(already).max(1))
        } else {
            1
        };

        let tokens = self.tokens;
        let mut taken = 0;
        while taken < room && index < tokens.len() {
            let next = tokens[index].as_str();
            if next == "--" || looks_like_option(next) {
                break;
            }
            self.entry(argument).values.push(next.to_string());
            index += 1;
            taken += 1;
        }

        if taken == 0 {
            return Err(DispatchError::MissingValue {
                command: self.path.clone(),
                argument: argument.display_flag(),
            });
        }
        Ok(index)
    }

    fn assign_positionals(&mut self) -> Result<(), DispatchError> {
        let command = self.command;
        let mut remaining = std::mem::take(&mut self.positionals).into_iter().peekable();

        for argument in command.positionals() {
            if remaining.peek().is_none() {
                break;
            }
            let (_, max) = argument.arity();
            let limit = max.map_or(usize::MAX, |m| m as usize);
            let mut values = Vec::new();
            while values.len() < limit {
                match remaining.next() {
                    Some(value) => values.push(value.to_string()),
                    None => break,
                }
            }
            self.entry(argument).values.extend(values);
        }

        match remaining.next() {
            Some(extra) => Err(self.unknown(extra)),
            None => Ok(()),
        }
    }

    fn finish(self) -> Result<BoundArgs, DispatchError> {
        let mut bound = BoundArgs::new();

        for argument in &self.command.arguments {
            let seen = self.seen.get(argument.name.as_str());

            if argument.is_flag() {
                let value = match (seen, &argument.default_value) {
                    (Some(seen), _) if seen.flag => ArgValue::Bool(true),
                    (_, Some(default)) => self.coerce(argument, default)?,
                    _ => ArgValue::Bool(false),
                };
                bound.insert(argument.name.clone(), value);
                continue;
            }

            let given = seen.map(|s| s.values.as_slice()).unwrap_or_default();
            if given.is_empty() {
                match &argument.default_value {
                    Some(_) if argument.is_multi() => {
                        let items = argument
                            .default_items()
                            .unwrap_or_default()
                            .into_iter()
                            .map(|raw| self.coerce(argument, raw))
                            .collect::<Result<Vec<_>, _>>()?;
                        bound.insert(argument.name.clone(), ArgValue::List(items));
                    }
                    Some(default) => {
                        bound.insert(argument.name.clone(), self.coerce(argument, default)?);
                    }
                    None if argument.is_required() => {
                        return Err(DispatchError::MissingArgument {
                            command: self.path.clone(),
                            argument: argument.display_flag(),
                        });
                    }
                    None => {}
                }
                continue;
            }

            let (min, max) = argument.arity();
            let count = given.len();
            if count < min as usize || max.map_or(false, |m| count > m as usize) {
                return Err(DispatchError::InvalidArity {
                    command: self.path.clone(),
                    argument: argument.display_flag(),
                    expected: describe_arity(min, max),
                    got: count,
                });
            }

            let mut values = given
                .iter()
                .map(|raw| self.coerce(argument, raw))
                .collect::<Result<Vec<_>, _>>()?;
            let value = if argument.is_multi() {
                ArgValue::List(values)
            } else {
                values.remove(0)
            };
            bound.insert(argument.name.clone(), value);
        }

        Ok(bound)
    }

    fn entry(&mut self, argument: &'a ArgumentDescriptor) -> &mut Seen {
        self.seen.entry(argument.name.as_str()).or_default()
    }

    fn coerce(&self, argument: &ArgumentDescriptor, raw: &str) -> Result<ArgValue, DispatchError> {
        let value_type = argument.value_type();
        value_type
            .coerce(raw)
            .ok_or_else(|| DispatchError::ArgumentTypeError {
                command: self.path.clone(),
                argument: argument.display_flag(),
                value: raw.to_string(),
                expected: value_type,
            })
    }

    fn unknown(&self, token: &str) -> DispatchError {
        DispatchError::UnknownArgument {
            command: self.path.clone(),
            token: token.to_string(),
        }
    }

    fn error_unexpected(&self, argument: &ArgumentDescriptor) -> DispatchError {
        DispatchError::UnexpectedValue {
            command: self.path.clone(),
            argument: argument.display_flag(),
        }
    }

    fn error_require_equals(&self, argument: &ArgumentDescriptor) -> DispatchError {
        DispatchError::RequireEquals {
            command: self.path.clone(),
            argument: argument.display_flag(),
        }
    }
}

fn describe_arity(min: u32, max: Option<u32>) -> String {
    match max {
        Some(max) if max == min => min.to_string(),
        Some(max) => format!("{} to {}", min, max),
        None => format!("at least {}", min),
    }
}

fn is_negative_number(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-') && token[1..].parse::<f64>().is_ok()
}

fn looks_like_option(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-') && !is_negative_number(token)
}
