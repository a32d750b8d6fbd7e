//! Script dialect of graph manifests
//!
//! Authoring tools save graphs as small scripts:
//!
//! ```text
//! def render_graph_Example():
//!     g = RenderGraph('Example')
//!     g.create_pass('ToneMapper', 'ToneMapper', {'operator': ToneMapOp.Aces})
//!     g.add_edge('AccumulatePass.output', 'ToneMapper.src')
//!     g.mark_output('ToneMapper.dst')
//!     return g
//! ```
//!
//! Statements are recognized line by line. The camelCase forms `addEdge` and
//! `markOutput` are accepted, as is the older `X = createPass('Type', {...})`
//! followed by `g.addPass(X, 'Instance')`. Lines that are not graph statements
//! (imports, function headers, library loading) are skipped, but any call on
//! the graph variable that is not understood is an error.
//!
//! Configuration values are `True`/`False`, numbers, quoted strings with
//! backslash escapes, dotted enum variants such as `ToneMapOp.Aces` (only the
//! variant name is kept) and constructor calls such as
//! `RTXDIOptions(mode=RTXDIMode.SpatiotemporalResampling, spatialIterations=5)`.

use super::{EdgeDecl, GraphManifest, ManifestError, PassDecl};
use crate::config::{ConfigMap, ConfigObject, ConfigValue};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::LazyLock;

/// Configuration key that maps to the enabled flag instead of a pass option
const ENABLED_KEY: &str = "enabled";

/// A single or double quoted string literal, with backslash escapes
fn quoted(group: &str) -> String {
    format!(r#"(?<{group}>'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*")"#)
}

static RE_GRAPH: LazyLock<Regex> = LazyLock::new(|| Regex::new(&format!(r"^(?<var>\w+)\s*=\s*RenderGraph\(\s*{}\s*\)$", quoted("name"))).unwrap());
static RE_CREATE_PASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?<var>\w+)\.create_pass\(\s*{}\s*,\s*{}\s*(?:,\s*(?<config>\{{.*\}}))?\s*\)$",
        quoted("instance"),
        quoted("type")
    ))
    .unwrap()
});
static RE_LEGACY_CREATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^(?<var>\w+)\s*=\s*createPass\(\s*{}\s*(?:,\s*(?<config>\{{.*\}}))?\s*\)$", quoted("type"))).unwrap());
static RE_ADD_PASS: LazyLock<Regex> = LazyLock::new(|| Regex::new(&format!(r"^(?<var>\w+)\.addPass\(\s*(?<pass>\w+)\s*,\s*{}\s*\)$", quoted("instance"))).unwrap());
static RE_ADD_EDGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^(?<var>\w+)\.(?:add_edge|addEdge)\(\s*{}\s*,\s*{}\s*\)$", quoted("src"), quoted("dst"))).unwrap());
static RE_MARK_OUTPUT: LazyLock<Regex> = LazyLock::new(|| Regex::new(&format!(r"^(?<var>\w+)\.(?:mark_output|markOutput)\(\s*{}\s*\)$", quoted("socket"))).unwrap());
static RE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-+]?[0-9][0-9.eE+-]*$").unwrap());
static RE_ENUM_VARIANT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_]\w*(?:\.[A-Za-z_]\w*)+$").unwrap());
static RE_CONSTRUCTOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?<type>[A-Za-z_]\w*)\((?<args>.*)\)$").unwrap());
static RE_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_]\w*$").unwrap());

fn script_error(line: usize, message: impl Into<String>) -> ManifestError {
    ManifestError::Script { line, message: message.into() }
}

/// Unescapes the string literal captured as `group`
fn string_arg(caps: &Captures, group: &str, line: usize) -> Result<String, ManifestError> {
    let literal = &caps[group];
    unquote(literal).ok_or_else(|| script_error(line, format!("invalid string literal {literal}")))
}

/// Parses a script into a manifest
pub fn parse(source: &str) -> Result<GraphManifest, ManifestError> {
    let mut graph_var: Option<String> = None;
    let mut manifest = GraphManifest::new("");
    // Legacy `X = createPass(...)` declarations waiting for `g.addPass(X, ...)`
    let mut pending: HashMap<String, PassDecl> = HashMap::new();

    for (index, raw_line) in source.lines().enumerate() {
        let line_number = index + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(caps) = RE_GRAPH.captures(line) {
            if graph_var.is_some() {
                return Err(script_error(line_number, "a script may only declare one graph"));
            }
            graph_var = Some(caps["var"].to_string());
            manifest.name = string_arg(&caps, "name", line_number)?;
            continue;
        }

        if let Some(caps) = RE_LEGACY_CREATE.captures(line) {
            let type_name = string_arg(&caps, "type", line_number)?;
            let decl = pass_decl(String::new(), type_name, caps.name("config").map(|m| m.as_str()), line_number)?;
            pending.insert(caps["var"].to_string(), decl);
            continue;
        }

        let Some(var) = graph_var.as_deref() else {
            continue;
        };
        let Some(statement) = line.strip_prefix(var).and_then(|rest| rest.strip_prefix('.')) else {
            continue;
        };

        if let Some(caps) = RE_CREATE_PASS.captures(line).filter(|caps| &caps["var"] == var) {
            let instance = string_arg(&caps, "instance", line_number)?;
            let type_name = string_arg(&caps, "type", line_number)?;
            manifest
                .passes
                .push(pass_decl(instance, type_name, caps.name("config").map(|m| m.as_str()), line_number)?);
        } else if let Some(caps) = RE_ADD_PASS.captures(line).filter(|caps| &caps["var"] == var) {
            let mut decl = pending
                .remove(&caps["pass"])
                .ok_or_else(|| script_error(line_number, format!("'{}' was not created with createPass", &caps["pass"])))?;
            decl.instance = string_arg(&caps, "instance", line_number)?;
            manifest.passes.push(decl);
        } else if let Some(caps) = RE_ADD_EDGE.captures(line).filter(|caps| &caps["var"] == var) {
            manifest.edges.push(EdgeDecl {
                src: string_arg(&caps, "src", line_number)?,
                dst: string_arg(&caps, "dst", line_number)?,
            });
        } else if let Some(caps) = RE_MARK_OUTPUT.captures(line).filter(|caps| &caps["var"] == var) {
            manifest.outputs.push(string_arg(&caps, "socket", line_number)?);
        } else {
            return Err(script_error(line_number, format!("unsupported graph statement '{statement}'")));
        }
    }

    if graph_var.is_none() {
        return Err(script_error(source.lines().count().max(1), "no RenderGraph declaration found"));
    }
    tracing::debug!(graph = %manifest.name, passes = manifest.passes.len(), edges = manifest.edges.len(), "parsed graph script");
    Ok(manifest)
}

fn pass_decl(instance: String, type_name: String, dict: Option<&str>, line: usize) -> Result<PassDecl, ManifestError> {
    let mut config = match dict {
        Some(dict) => parse_dict(dict, line)?,
        None => ConfigMap::new(),
    };
    let enabled = match config.remove(ENABLED_KEY) {
        None => true,
        Some(ConfigValue::Bool(enabled)) => enabled,
        Some(other) => return Err(script_error(line, format!("'{ENABLED_KEY}' must be True or False, found {other}"))),
    };
    Ok(PassDecl {
        instance,
        type_name,
        enabled,
        config,
    })
}

/// Splits `text` at each `separator` outside string literals and brackets
///
/// Returns `None` when a literal is unterminated or brackets are unbalanced.
fn split_top_level(text: &str, separator: char) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (index, c) in text.char_indices() {
        if let Some(delimiter) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == delimiter {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.checked_sub(1)?,
            c if c == separator && depth == 0 => {
                parts.push(&text[start..index]);
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }
    if quote.is_some() || depth != 0 {
        return None;
    }
    parts.push(&text[start..]);
    // Trailing separator
    if parts.len() > 1 && parts.last().is_some_and(|part| part.trim().is_empty()) {
        parts.pop();
    }
    Some(parts)
}

/// Parses a dictionary literal such as `{'a': True, 'b': 1.5, 'c': Mode.Fast}`
fn parse_dict(dict: &str, line: usize) -> Result<ConfigMap, ManifestError> {
    let inner = dict
        .trim()
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| script_error(line, "configuration must be a dictionary literal"))?;

    let mut map = ConfigMap::new();
    if inner.trim().is_empty() {
        return Ok(map);
    }
    let entries = split_top_level(inner, ',').ok_or_else(|| script_error(line, "unbalanced configuration dictionary"))?;
    for entry in entries {
        let entry_error = || script_error(line, format!("cannot parse configuration entry near '{}'", entry.trim()));
        let (key, literal) = match split_top_level(entry, ':').as_deref() {
            Some([key, literal]) => (unquote(key.trim()).ok_or_else(entry_error)?, literal.trim()),
            _ => return Err(entry_error()),
        };
        let value = parse_value(literal).ok_or_else(|| script_error(line, format!("invalid value '{literal}' for '{key}'")))?;
        map.insert(key, value);
    }
    Ok(map)
}

fn parse_value(literal: &str) -> Option<ConfigValue> {
    match literal {
        "True" => return Some(ConfigValue::Bool(true)),
        "False" => return Some(ConfigValue::Bool(false)),
        // No configuration value stands for an absent one
        "None" => return None,
        _ => {}
    }
    if literal.starts_with(['\'', '"']) {
        return unquote(literal).map(ConfigValue::String);
    }
    if RE_NUMBER.is_match(literal) {
        if literal.contains(['.', 'e', 'E']) {
            return literal.parse().ok().map(ConfigValue::Float);
        }
        return literal.parse().ok().map(ConfigValue::Int);
    }
    if let Some(caps) = RE_CONSTRUCTOR.captures(literal) {
        return parse_constructor(&caps["type"], &caps["args"]).map(ConfigValue::Object);
    }
    // Enum literals such as `ToneMapOp.Aces` keep only the variant name
    if RE_ENUM_VARIANT.is_match(literal) {
        return literal.rsplit('.').next().map(|variant| ConfigValue::String(variant.to_string()));
    }
    None
}

/// Parses the keyword arguments of `Type(key=value, ...)`
fn parse_constructor(type_name: &str, args: &str) -> Option<ConfigObject> {
    let mut object = ConfigObject::new(type_name);
    if args.trim().is_empty() {
        return Some(object);
    }
    for arg in split_top_level(args, ',')? {
        let parts = split_top_level(arg, '=')?;
        let [key, literal] = parts.as_slice() else {
            return None;
        };
        let key = key.trim();
        if !RE_IDENTIFIER.is_match(key) {
            return None;
        }
        object.fields.insert(key, parse_value(literal.trim())?);
    }
    Some(object)
}

/// Undoes [`quote`], also accepting the other delimiter and the usual escapes
fn unquote(literal: &str) -> Option<String> {
    let mut chars = literal.chars();
    let delimiter = chars.next().filter(|c| matches!(c, '\'' | '"'))?;
    let body = chars.as_str().strip_suffix(delimiter)?;

    let mut text = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == delimiter {
            return None;
        }
        if c != '\\' {
            text.push(c);
            continue;
        }
        match chars.next()? {
            'n' => text.push('\n'),
            't' => text.push('\t'),
            'r' => text.push('\r'),
            escaped @ ('\\' | '\'' | '"') => text.push(escaped),
            other => {
                text.push('\\');
                text.push(other);
            }
        }
    }
    Some(text)
}

/// Quotes `text` as a string literal, preferring single quotes
fn quote(text: &str) -> String {
    let delimiter = if text.contains('\'') && !text.contains('"') { '"' } else { '\'' };
    let mut literal = String::with_capacity(text.len() + 2);
    literal.push(delimiter);
    for c in text.chars() {
        match c {
            '\\' => literal.push_str(r"\\"),
            '\n' => literal.push_str(r"\n"),
            '\t' => literal.push_str(r"\t"),
            '\r' => literal.push_str(r"\r"),
            c if c == delimiter => {
                literal.push('\\');
                literal.push(c);
            }
            c => literal.push(c),
        }
    }
    literal.push(delimiter);
    literal
}

fn emit_value(value: &ConfigValue) -> String {
    match value {
        ConfigValue::Bool(true) => "True".to_string(),
        ConfigValue::Bool(false) => "False".to_string(),
        ConfigValue::Int(v) => v.to_string(),
        ConfigValue::Float(v) => format!("{v:?}"),
        ConfigValue::String(s) => quote(s),
        ConfigValue::Object(object) => {
            let args: Vec<String> = object.fields.iter().map(|(key, value)| format!("{key}={}", emit_value(value))).collect();
            format!("{}({})", object.type_name, args.join(", "))
        }
    }
}

fn emit_dict(pass: &PassDecl) -> String {
    let mut entries = Vec::new();
    if !pass.enabled {
        entries.push(format!("'{ENABLED_KEY}': False"));
    }
    entries.extend(pass.config.iter().map(|(key, value)| format!("{}: {}", quote(key), emit_value(value))));
    format!("{{{}}}", entries.join(", "))
}

/// Writes a manifest in the canonical script form
pub fn emit(manifest: &GraphManifest) -> String {
    let ident: String = manifest.name.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect();
    let ident = if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        format!("graph_{ident}")
    } else {
        ident
    };

    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = writeln!(out, "from falcor import *");
    let _ = writeln!(out);
    let _ = writeln!(out, "def render_graph_{ident}():");
    let _ = writeln!(out, "    g = RenderGraph({})", quote(&manifest.name));
    for pass in &manifest.passes {
        let _ = writeln!(out, "    g.create_pass({}, {}, {})", quote(&pass.instance), quote(&pass.type_name), emit_dict(pass));
    }
    for edge in &manifest.edges {
        let _ = writeln!(out, "    g.add_edge({}, {})", quote(&edge.src), quote(&edge.dst));
    }
    for output in &manifest.outputs {
        let _ = writeln!(out, "    g.mark_output({})", quote(output));
    }
    let _ = writeln!(out, "    return g");
    let _ = writeln!(out);
    let _ = writeln!(out, "{ident} = render_graph_{ident}()");
    let _ = writeln!(out, "try: m.addGraph({ident})");
    let _ = writeln!(out, "except NameError: None");
    out
}
