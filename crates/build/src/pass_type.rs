//! Declared interface of a pass type
//!
//! A [`PassType`] is everything the compiler knows about a pass: its input and
//! output sockets and its configuration schema. Pass internals stay opaque.

use crate::config::ConfigSchema;
use crate::resource::{Format, ResourceKind, SizePolicy};
use std::fmt;

/// Direction of a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketDirection {
    Input,
    Output,
}

impl fmt::Display for SocketDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// An input socket declared by a pass type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSocket {
    pub name: String,
    pub kind: ResourceKind,
    /// Optional inputs may be left unconnected
    pub optional: bool,
}

/// An output socket declared by a pass type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSocket {
    pub name: String,
    pub kind: ResourceKind,
    pub format: Format,
    pub size: SizePolicy,
    /// Optional outputs are only allocated when something reads them
    pub optional: bool,
    /// Persistent outputs keep their contents across frames (history buffers)
    pub persistent: bool,
}

impl OutputSocket {
    pub fn new(name: &str, kind: ResourceKind, format: Format) -> Self {
        Self {
            name: name.to_string(),
            kind,
            format,
            size: SizePolicy::Reference,
            optional: false,
            persistent: false,
        }
    }

    pub fn size(mut self, size: SizePolicy) -> Self {
        self.size = size;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }
}

/// Identity, sockets and configuration schema of a pass type
#[derive(Debug, Clone, PartialEq)]
pub struct PassType {
    name: String,
    inputs: Vec<InputSocket>,
    outputs: Vec<OutputSocket>,
    config: ConfigSchema,
    bypass: Option<(String, String)>,
}

impl PassType {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            config: ConfigSchema::new(),
            bypass: None,
        }
    }

    pub fn input(mut self, name: &str, kind: ResourceKind) -> Self {
        self.inputs.push(InputSocket {
            name: name.to_string(),
            kind,
            optional: false,
        });
        self
    }

    pub fn optional_input(mut self, name: &str, kind: ResourceKind) -> Self {
        self.inputs.push(InputSocket {
            name: name.to_string(),
            kind,
            optional: true,
        });
        self
    }

    pub fn output(mut self, socket: OutputSocket) -> Self {
        self.outputs.push(socket);
        self
    }

    pub fn config(mut self, schema: ConfigSchema) -> Self {
        self.config = schema;
        self
    }

    /// Declares the input/output pair a disabled instance forwards through
    pub fn bypass(mut self, input: &str, output: &str) -> Self {
        self.bypass = Some((input.to_string(), output.to_string()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[InputSocket] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputSocket] {
        &self.outputs
    }

    pub fn config_schema(&self) -> &ConfigSchema {
        &self.config
    }

    pub fn find_input(&self, name: &str) -> Option<&InputSocket> {
        self.inputs.iter().find(|socket| socket.name == name)
    }

    pub fn find_output(&self, name: &str) -> Option<&OutputSocket> {
        self.outputs.iter().find(|socket| socket.name == name)
    }

    /// The sockets a disabled instance of this type forwards between, if any
    ///
    /// An explicit bypass declaration wins. Otherwise a type with exactly one
    /// input and one output of compatible kind forwards implicitly.
    pub fn pass_through(&self) -> Option<(&InputSocket, &OutputSocket)> {
        if let Some((input, output)) = &self.bypass {
            return Some((self.find_input(input)?, self.find_output(output)?));
        }
        match (self.inputs.as_slice(), self.outputs.as_slice()) {
            ([input], [output]) if output.kind.can_feed(input.kind) || input.kind.can_feed(output.kind) => Some((input, output)),
            _ => None,
        }
    }
}
