//! Line-level reader for `runtime.def`: comments, directive calls,
//! argument lists and signature strings.

use ks_il::Type;

use super::{RegistryError, Signature};

/// `NAME(arg, ...)` with quotes stripped from each argument.
#[derive(Debug, PartialEq)]
pub(crate) struct Directive<'a> {
    pub(crate) name: &'a str,
    pub(crate) args: Vec<String>,
}

/// Text before the first `#` or `//` that is not inside a string.
fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_quotes = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'#' if !in_quotes => return &line[..i],
            b'/' if !in_quotes && bytes.get(i + 1) == Some(&b'/') => return &line[..i],
            _ => {}
        }
    }
    line
}

fn unquote(arg: &str) -> String {
    let arg = arg.trim();
    if arg.len() >= 2 && arg.starts_with('"') && arg.ends_with('"') {
        arg[1..arg.len() - 1].to_string()
    } else {
        arg.to_string()
    }
}

/// Splits on commas outside quotes and parentheses.
fn split_args(inner: &str) -> Vec<String> {
    if inner.trim().is_empty() {
        return Vec::new();
    }
    let mut args = Vec::new();
    let mut depth = 0u32;
    let mut in_quotes = false;
    let mut start = 0;
    for (i, b) in inner.bytes().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'(' if !in_quotes => depth += 1,
            b')' if !in_quotes => depth = depth.saturating_sub(1),
            b',' if !in_quotes && depth == 0 => {
                args.push(unquote(&inner[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }
    args.push(unquote(&inner[start..]));
    args
}

/// Parses one line. Blank and comment-only lines yield `None`.
pub(crate) fn directive(line: &str, lineno: usize) -> Result<Option<Directive<'_>>, RegistryError> {
    let text = strip_comment(line).trim();
    if text.is_empty() {
        return Ok(None);
    }
    let syntax = |msg: &str| RegistryError::Syntax {
        line: lineno,
        msg: msg.to_string(),
    };

    let name_end = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    let name = &text[..name_end];
    if name.is_empty() {
        return Err(syntax("expected a directive name"));
    }
    let rest = text[name_end..].trim_start();
    let Some(rest) = rest.strip_prefix('(') else {
        return Err(syntax("expected `(` after the directive name"));
    };

    let mut depth = 1u32;
    let mut in_quotes = false;
    let mut close = None;
    for (i, b) in rest.bytes().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'(' if !in_quotes => depth += 1,
            b')' if !in_quotes => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    if in_quotes {
        return Err(syntax("unterminated string"));
    }
    let Some(close) = close else {
        return Err(syntax("missing `)`"));
    };
    if !rest[close + 1..].trim().is_empty() {
        return Err(syntax("trailing text after `)`"));
    }

    Ok(Some(Directive {
        name,
        args: split_args(&rest[..close]),
    }))
}

/// Type names accepted in signatures and properties; `obj` lowers to `ptr`.
pub(crate) fn def_type(name: &str) -> Option<Type> {
    match name {
        "obj" => Some(Type::Ptr),
        "void" | "i1" | "i16" | "i32" | "i64" | "f64" | "ptr" | "str" => Type::parse(name),
        _ => None,
    }
}

/// `ret(param, ...)`.
pub(crate) fn signature(text: &str, lineno: usize) -> Result<Signature, RegistryError> {
    let bad = || RegistryError::BadSignature {
        line: lineno,
        sig: text.to_string(),
    };
    let text = text.trim();
    let open = text.find('(').ok_or_else(bad)?;
    let inner = text[open + 1..].strip_suffix(')').ok_or_else(bad)?;
    let ret = def_type(text[..open].trim()).ok_or_else(bad)?;
    let mut params = Vec::new();
    if !inner.trim().is_empty() {
        for p in inner.split(',') {
            match def_type(p.trim()) {
                Some(Type::Void) | None => return Err(bad()),
                Some(ty) => params.push(ty),
            }
        }
    }
    Ok(Signature { ret, params })
}

/// Hex with a `0x` prefix or decimal; `_` separators allowed.
pub(crate) fn type_id(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(|&c| c != '_').collect();
    match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => digits.parse().ok(),
    }
}
