//! The circuit tree and its textual format.
//!
//! A circuit file contains a single expression of the grammar
//!
//! ```text
//! gate  := "GATE" "(" type "," ident "," input [ "," input ] ")"
//! input := ident | gate
//! type  := AND | OR | XOR | NAND | XNOR | NOT
//! ```
//!
//! with insignificant whitespace. NOT takes exactly one input, every other
//! type exactly two. Identifiers are `[A-Za-z0-9_]+`; leaf identifiers name
//! the input wires of the circuit and may repeat (a repeated identifier is
//! fed the same input bit on independent wires).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::gate::{Gate, GateInput, GateKind, InputWire};
use crate::wire::Wire;

/// A malformed circuit file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The input ended in the middle of an expression.
    UnexpectedEnd,
    /// An unexpected character at the given byte offset.
    Unexpected {
        /// What the parser was looking for.
        expected: &'static str,
        /// The offending character.
        found: char,
        /// Byte offset into the circuit text.
        at: usize,
    },
    /// A gate type token that is not part of the grammar.
    UnknownGateType(String),
    /// A NOT gate with two inputs or a binary gate with one.
    WrongArity(GateKind),
    /// Text remaining after the closing parenthesis of the root gate.
    TrailingInput(usize),
}

/// The circuit, a tree of gates rooted at the output gate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    /// The output gate.
    pub root: Gate,
}

impl Circuit {
    /// Parses a circuit from its textual form.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut parser = Parser {
            bytes: text.as_bytes(),
            pos: 0,
        };
        parser.skip_whitespace();
        let root = parser.gate()?;
        parser.skip_whitespace();
        if parser.pos < parser.bytes.len() {
            return Err(ParseError::TrailingInput(parser.pos));
        }
        Ok(Self { root })
    }

    /// Re-emits the circuit in the source grammar. `parse(to_text(c))`
    /// reproduces `c` structurally.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        emit_gate(&self.root, &mut out);
        out
    }

    /// The leaf identifiers in evaluation order (left-to-right depth-first),
    /// one entry per occurrence. This is the order in which input labels are
    /// transferred and consumed.
    pub fn input_identifiers(&self) -> Vec<String> {
        let mut ids = Vec::new();
        collect_leaves(&self.root, &mut |leaf| ids.push(leaf.id.clone()));
        ids
    }

    /// The input wires in the same order as [`Circuit::input_identifiers`].
    ///
    /// Panics if the circuit has not been garbled; the garbler only calls
    /// this after [`crate::garble::garble`].
    pub fn input_wires(&self) -> Vec<(String, Wire)> {
        let mut wires = Vec::new();
        collect_leaves(&self.root, &mut |leaf| {
            let wire = leaf.wire.clone().expect("circuit has not been garbled");
            wires.push((leaf.id.clone(), wire));
        });
        wires
    }

    /// The output wire of the root gate, once garbled.
    pub fn output_wire(&self) -> Option<&Wire> {
        self.root.output.as_ref()
    }

    /// A clone fit for transmission: garbled tables and structure survive,
    /// labels, offsets and internal wire identifiers are stripped. Only the
    /// leaf identifiers remain, so the evaluator can position the label
    /// transfers.
    pub fn clean(&self) -> Self {
        let mut cleaned = self.clone();
        clean_gate(&mut cleaned.root);
        cleaned
    }
}

fn clean_gate(gate: &mut Gate) {
    gate.id = String::new();
    gate.output = None;
    clean_input(&mut gate.left);
    if let Some(right) = &mut gate.right {
        clean_input(right);
    }
}

fn clean_input(input: &mut GateInput) {
    match input {
        GateInput::Leaf(leaf) => leaf.wire = None,
        GateInput::Gate(gate) => clean_gate(gate),
    }
}

fn collect_leaves<'c>(gate: &'c Gate, f: &mut impl FnMut(&'c InputWire)) {
    for input in std::iter::once(&gate.left).chain(gate.right.iter()) {
        match input {
            GateInput::Leaf(leaf) => f(leaf),
            GateInput::Gate(gate) => collect_leaves(gate, f),
        }
    }
}

fn emit_gate(gate: &Gate, out: &mut String) {
    out.push_str("GATE(");
    out.push_str(gate.kind.token());
    out.push_str(", ");
    out.push_str(&gate.id);
    for input in std::iter::once(&gate.left).chain(gate.right.iter()) {
        out.push_str(", ");
        match input {
            GateInput::Leaf(leaf) => out.push_str(&leaf.id),
            GateInput::Gate(gate) => emit_gate(gate, out),
        }
    }
    out.push(')');
}

struct Parser<'t> {
    bytes: &'t [u8],
    pos: usize,
}

impl Parser<'_> {
    fn skip_whitespace(&mut self) {
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.bytes.get(self.pos).map(|&b| b as char)
    }

    fn expect(&mut self, wanted: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(found) if found == wanted => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(ParseError::Unexpected {
                expected: match wanted {
                    '(' => "'('",
                    ')' => "')'",
                    ',' => "','",
                    _ => "punctuation",
                },
                found,
                at: self.pos,
            }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
        {
            self.pos += 1;
        }
        if self.pos == start {
            return match self.peek() {
                Some(found) => Err(ParseError::Unexpected {
                    expected: "identifier",
                    found,
                    at: self.pos,
                }),
                None => Err(ParseError::UnexpectedEnd),
            };
        }
        Ok(String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned())
    }

    fn gate(&mut self) -> Result<Gate, ParseError> {
        let keyword = self.ident()?;
        if keyword != "GATE" {
            return Err(ParseError::Unexpected {
                expected: "'GATE'",
                found: keyword.chars().next().unwrap_or('?'),
                at: self.pos - keyword.len(),
            });
        }
        self.expect('(')?;
        let token = self.ident()?;
        let kind = GateKind::from_token(&token).ok_or(ParseError::UnknownGateType(token))?;
        self.expect(',')?;
        let id = self.ident()?;
        self.expect(',')?;
        let left = self.input()?;
        self.skip_whitespace();
        let right = if kind.is_unary() {
            if self.peek() == Some(',') {
                return Err(ParseError::WrongArity(kind));
            }
            None
        } else {
            if self.peek() == Some(')') {
                return Err(ParseError::WrongArity(kind));
            }
            self.expect(',')?;
            Some(self.input()?)
        };
        self.expect(')')?;
        Ok(Gate::new(kind, id, left, right))
    }

    fn input(&mut self) -> Result<GateInput, ParseError> {
        self.skip_whitespace();
        // a nested gate starts with the keyword GATE followed by '('
        let checkpoint = self.pos;
        let token = self.ident()?;
        if token == "GATE" {
            self.skip_whitespace();
            if self.peek() == Some('(') {
                self.pos = checkpoint;
                return Ok(GateInput::Gate(Box::new(self.gate()?)));
            }
        }
        Ok(GateInput::Leaf(InputWire {
            id: token,
            wire: None,
        }))
    }
}

impl fmt::Display for Circuit {
    /// Renders the gate tree one node per line, children indented under
    /// their parent.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn render(gate: &Gate, depth: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            writeln!(f, "{:indent$}{} {}", "", gate.kind.token(), gate.id, indent = depth * 2)?;
            for input in std::iter::once(&gate.left).chain(gate.right.iter()) {
                match input {
                    GateInput::Leaf(leaf) => {
                        writeln!(f, "{:indent$}{}", "", leaf.id, indent = (depth + 1) * 2)?
                    }
                    GateInput::Gate(gate) => render(gate, depth + 1, f)?,
                }
            }
            Ok(())
        }
        render(&self.root, 0, f)
    }
}
